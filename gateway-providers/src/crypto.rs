//! Crypto deposits via static addresses.
//!
//! There is no processor API: initialize hands out the configured address for
//! the asset with an expiry, and an external chain monitor reports confirmed
//! deposits to the webhook intake, signed with HMAC-SHA256 in `x-signature`.
//! The adapter also serves spot rates from a CoinGecko-compatible API.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{debug, info};

use fee_rules::Currency;
use gateway_types::{
    ExchangeRateProvider, InitializePayment, PaymentInitialization, PaymentProvider,
    ProcessorPayment, ProviderCapabilities, ProviderError, RateError, TransactionStatus,
    WebhookNotification,
};

use crate::config::CryptoConfig;
use crate::http::{ApiClient, str_field};
use crate::signature;
use crate::units::decimal_from_json;

pub struct CryptoProvider {
    config: CryptoConfig,
    rates: ApiClient,
}

/// CoinGecko id for a symbol; ids pass through unchanged.
fn coingecko_id(asset: &str) -> Option<&'static str> {
    match asset.to_ascii_lowercase().as_str() {
        "btc" | "bitcoin" => Some("bitcoin"),
        "eth" | "ethereum" => Some("ethereum"),
        "usdt" | "tether" => Some("tether"),
        "usdc" | "usd-coin" => Some("usd-coin"),
        _ => None,
    }
}

impl CryptoProvider {
    pub const CODE: &'static str = "crypto";

    pub fn new(config: CryptoConfig) -> Result<Self, ProviderError> {
        let rates = ApiClient::new(Self::CODE, config.rates.clone())?;
        Ok(Self { config, rates })
    }

    fn address_for(&self, currency: Currency) -> Option<&str> {
        match currency {
            Currency::BTC => self.config.btc_address.as_deref(),
            Currency::ETH => self.config.eth_address.as_deref(),
            _ => None,
        }
    }
}

#[async_trait]
impl PaymentProvider for CryptoProvider {
    fn code(&self) -> &'static str {
        Self::CODE
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            refund: false,
            payout: false,
            requires_email: false,
            requires_phone: false,
            payout_kinds: Vec::new(),
        }
    }

    fn signature_header(&self) -> &'static str {
        "x-signature"
    }

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError> {
        let address = self.address_for(req.currency).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "crypto: no deposit address configured for {}",
                req.currency
            ))
        })?;
        let expires_at = Utc::now() + Duration::hours(self.config.address_ttl_hours);
        info!(reference = %req.reference, asset = %req.currency, "Crypto deposit address issued");

        Ok(PaymentInitialization {
            redirect_target: Some(address.to_string()),
            provider_reference: req.reference.clone(),
            expires_at: Some(expires_at),
            acknowledged_status: TransactionStatus::Processing,
            provider_data: json!({
                "address": address,
                "asset": req.currency.code(),
                "amount": req.amount.to_string(),
            }),
        })
    }

    /// Settlement is observed on-chain by the monitor, never polled here.
    async fn verify_payment(
        &self,
        _provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: Self::CODE,
            operation: "verify_payment",
        })
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        signature::verify_sha256_hex(&self.config.webhook_secret, raw_body, signature)
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ProviderError::MalformedResponse(format!("crypto webhook: {}", e)))?;
        let event = str_field(&payload, "/event")?.to_string();
        let reference = str_field(&payload, "/reference")?.to_string();
        let status = match event.as_str() {
            "deposit.confirmed" => Some(TransactionStatus::Completed),
            "deposit.failed" | "deposit.expired" => Some(TransactionStatus::Failed),
            _ => None,
        };

        Ok(WebhookNotification {
            event,
            provider_reference: Some(reference.clone()),
            reference: Some(reference),
            status,
            amount: payload.get("amount").and_then(decimal_from_json),
            currency: payload
                .get("asset")
                .and_then(Value::as_str)
                .and_then(|a| a.parse().ok()),
            fee: None,
            payload,
        })
    }

    fn rates(&self) -> Option<&dyn ExchangeRateProvider> {
        Some(self)
    }
}

#[async_trait]
impl ExchangeRateProvider for CryptoProvider {
    async fn rate(&self, asset: &str, fiat: Currency) -> Result<Option<Decimal>, RateError> {
        let Some(id) = coingecko_id(asset) else {
            return Ok(None);
        };
        let vs = fiat.code().to_ascii_lowercase();
        let body = self
            .rates
            .send(
                self.rates
                    .get("/simple/price")
                    .query(&[("ids", id), ("vs_currencies", vs.as_str())]),
            )
            .await
            .map_err(|e| match e {
                ProviderError::MalformedResponse(m) => RateError::MalformedResponse(m),
                other => RateError::ServiceUnavailable(other.to_string()),
            })?;
        let rate = body.get(id).and_then(|quotes| quotes.get(&vs));
        debug!(asset = id, fiat = %fiat, found = rate.is_some(), "Rate lookup");
        match rate {
            Some(value) => decimal_from_json(value)
                .map(Some)
                .ok_or_else(|| RateError::MalformedResponse(format!("rate for {} is not a number", id))),
            None => Ok(None),
        }
    }
}
