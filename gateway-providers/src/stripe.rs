//! Stripe adapter (PaymentIntents).
//!
//! Requests are form-encoded with amounts in the smallest currency unit.
//! Webhooks use Stripe's `t=…,v1=…` signature scheme: the signed payload is
//! `"{t}.{raw body}"`, any `v1` entry may match, and `t` must fall within the
//! tolerance window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use fee_rules::Currency;
use gateway_types::{
    InitializePayment, PaymentInitialization, PaymentProvider, ProcessorPayment,
    ProviderCapabilities, ProviderError, ProviderReceipt, RefundRequest, TransactionStatus,
    WebhookNotification,
};

use crate::config::StripeConfig;
use crate::http::{ApiClient, str_field};
use crate::signature;
use crate::units::{from_minor, to_minor};

pub struct StripeProvider {
    config: StripeConfig,
    api: ApiClient,
}

/// A parsed `Stripe-Signature` header.
#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: i64,
    v1: Vec<&'a str>,
}

fn parse_signature_header(header: &str) -> Option<SignatureHeader<'_>> {
    let mut timestamp = None;
    let mut v1 = Vec::new();
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => v1.push(value),
            _ => {}
        }
    }
    match (timestamp, v1.is_empty()) {
        (Some(timestamp), false) => Some(SignatureHeader { timestamp, v1 }),
        _ => None,
    }
}

impl StripeProvider {
    pub const CODE: &'static str = "stripe";

    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let api = ApiClient::new(Self::CODE, config.http.clone())?;
        Ok(Self { config, api })
    }

    /// Signature check against an explicit clock.
    pub fn verify_signature_at(&self, raw_body: &[u8], header: &str, now: DateTime<Utc>) -> bool {
        let Some(parsed) = parse_signature_header(header) else {
            return false;
        };
        if (now.timestamp() - parsed.timestamp).abs() > self.config.tolerance_secs {
            warn!(timestamp = parsed.timestamp, "Stripe signature outside tolerance");
            return false;
        }
        let mut signed = format!("{}.", parsed.timestamp).into_bytes();
        signed.extend_from_slice(raw_body);
        let Some(expected) =
            signature::hmac_sha256_hex(self.config.webhook_secret.as_bytes(), &signed)
        else {
            return false;
        };
        parsed
            .v1
            .iter()
            .any(|candidate| signature::hex_digest_matches(&expected, candidate))
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        self.api
            .send(request.bearer_auth(&self.config.secret_key))
            .await
    }
}

fn intent_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw {
        "succeeded" => Ok(TransactionStatus::Completed),
        "canceled" => Ok(TransactionStatus::Failed),
        "processing"
        | "requires_payment_method"
        | "requires_confirmation"
        | "requires_action"
        | "requires_capture" => Ok(TransactionStatus::Processing),
        other => Err(ProviderError::MalformedResponse(format!(
            "stripe: unknown intent status {}",
            other
        ))),
    }
}

fn refund_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw {
        "succeeded" => Ok(TransactionStatus::Completed),
        "failed" | "canceled" => Ok(TransactionStatus::Failed),
        "pending" | "requires_action" => Ok(TransactionStatus::Processing),
        other => Err(ProviderError::MalformedResponse(format!(
            "stripe: unknown refund status {}",
            other
        ))),
    }
}

fn parse_currency(raw: &str) -> Result<Currency, ProviderError> {
    raw.parse()
        .map_err(|e| ProviderError::MalformedResponse(format!("{}", e)))
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn code(&self) -> &'static str {
        Self::CODE
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            refund: true,
            payout: false,
            requires_email: false,
            requires_phone: false,
            payout_kinds: Vec::new(),
        }
    }

    fn signature_header(&self) -> &'static str {
        "stripe-signature"
    }

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError> {
        let amount = to_minor(req.amount, req.currency)?.to_string();
        let currency = req.currency.code().to_lowercase();
        let mut form = vec![
            ("amount", amount),
            ("currency", currency),
            ("metadata[reference]", req.reference.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        if let Some(email) = &req.payer.email {
            form.push(("receipt_email", email.clone()));
        }
        if let Some(description) = &req.description {
            form.push(("description", description.clone()));
        }

        let intent = self
            .call(
                self.api
                    .post("/v1/payment_intents")
                    .header("Idempotency-Key", &req.reference)
                    .form(&form),
            )
            .await?;
        let id = str_field(&intent, "/id")?;
        let client_secret = str_field(&intent, "/client_secret")?;
        info!(reference = %req.reference, intent = id, "Stripe payment intent created");

        Ok(PaymentInitialization {
            redirect_target: Some(client_secret.to_string()),
            provider_reference: id.to_string(),
            expires_at: None,
            acknowledged_status: TransactionStatus::Processing,
            provider_data: json!({ "status": intent.get("status") }),
        })
    }

    async fn verify_payment(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let intent = self
            .call(
                self.api
                    .get(&format!("/v1/payment_intents/{}", provider_reference)),
            )
            .await?;
        let currency = parse_currency(str_field(&intent, "/currency")?)?;
        let amount = intent
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| ProviderError::MalformedResponse("stripe: missing amount".into()))?;
        Ok(ProcessorPayment {
            id: str_field(&intent, "/id")?.to_string(),
            reference: str_field(&intent, "/metadata/reference")?.to_string(),
            status: intent_status(str_field(&intent, "/status")?)?,
            amount: Some(from_minor(amount, currency)),
            currency: Some(currency),
            fee: None,
            description: intent
                .pointer("/last_payment_error/message")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: intent.clone(),
        })
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        self.verify_signature_at(raw_body, signature, Utc::now())
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ProviderError::MalformedResponse(format!("stripe webhook: {}", e)))?;
        let event = str_field(&payload, "/type")?.to_string();
        let object = payload.pointer("/data/object").ok_or_else(|| {
            ProviderError::MalformedResponse("stripe webhook: no data.object".into())
        })?;

        // Refund events carry the Refund object, matched by its own id.
        // `charge.refunded` carries the charge and moves no record.
        let status = match event.as_str() {
            "payment_intent.succeeded" => Some(TransactionStatus::Completed),
            "payment_intent.payment_failed" | "payment_intent.canceled" => {
                Some(TransactionStatus::Failed)
            }
            "refund.created" | "refund.updated" | "refund.failed" | "charge.refund.updated" => {
                object
                    .get("status")
                    .and_then(Value::as_str)
                    .map(refund_status)
                    .transpose()?
            }
            _ => None,
        };
        let currency = object
            .get("currency")
            .and_then(Value::as_str)
            .and_then(|c| c.parse::<Currency>().ok());

        Ok(WebhookNotification {
            reference: object
                .pointer("/metadata/reference")
                .and_then(Value::as_str)
                .map(str::to_string),
            provider_reference: object.get("id").and_then(Value::as_str).map(str::to_string),
            status,
            amount: object
                .get("amount")
                .and_then(Value::as_i64)
                .zip(currency)
                .map(|(a, c)| from_minor(a, c)),
            currency,
            fee: None,
            event,
            payload,
        })
    }

    async fn refund(&self, req: &RefundRequest) -> Result<ProviderReceipt, ProviderError> {
        let mut form = vec![("payment_intent", req.provider_reference.clone())];
        if let Some(amount) = req.amount {
            form.push(("amount", to_minor(amount, req.currency)?.to_string()));
        }
        let refund = self
            .call(
                self.api
                    .post("/v1/refunds")
                    .header("Idempotency-Key", format!("refund-{}", req.reference))
                    .form(&form),
            )
            .await?;
        let status = refund_status(str_field(&refund, "/status")?)?;
        Ok(ProviderReceipt {
            provider_reference: str_field(&refund, "/id")?.to_string(),
            status,
            raw: refund,
        })
    }

    async fn verify_refund(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let refund = self
            .call(self.api.get(&format!("/v1/refunds/{}", provider_reference)))
            .await?;
        let currency = parse_currency(str_field(&refund, "/currency")?)?;
        let amount = refund
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| ProviderError::MalformedResponse("stripe: missing amount".into()))?;
        let id = str_field(&refund, "/id")?.to_string();
        Ok(ProcessorPayment {
            reference: refund
                .get("payment_intent")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            id,
            status: refund_status(str_field(&refund, "/status")?)?,
            amount: Some(from_minor(amount, currency)),
            currency: Some(currency),
            fee: None,
            description: refund
                .get("failure_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: refund.clone(),
        })
    }
}
