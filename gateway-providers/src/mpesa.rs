//! M-Pesa (Safaricom Daraja) adapter: STK push deposits and B2C payouts.
//!
//! Daraja takes whole shillings. Each STK request carries a password of
//! `base64(shortcode + passkey + timestamp)`. Daraja's callbacks are relayed
//! to us with a hex HMAC-SHA256 of the raw body in `x-mpesa-signature`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};

use fee_rules::Currency;
use gateway_types::{
    InitializePayment, PaymentInitialization, PaymentProvider, PayoutRecipient, PayoutRequest,
    ProcessorPayment, ProviderCapabilities, ProviderError, ProviderReceipt, TransactionStatus,
    WebhookNotification, WithdrawalMethodKind,
};

use crate::config::MpesaConfig;
use crate::http::{ApiClient, str_field};
use crate::signature;
use crate::units::{decimal_from_json, to_whole};

/// Daraja limits `AccountReference` to 12 characters.
const ACCOUNT_REFERENCE_MAX: usize = 12;

struct CachedToken {
    value: String,
    expires: Instant,
}

pub struct MpesaProvider {
    config: MpesaConfig,
    api: ApiClient,
    token: Mutex<Option<CachedToken>>,
}

/// `YYYYMMDDHHMMSS`, the timestamp format Daraja signs.
pub fn daraja_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// Normalizes Kenyan numbers to the `2547XXXXXXXX` form Daraja expects.
pub fn normalize_msisdn(phone: &str) -> Result<String, ProviderError> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let msisdn = match digits.len() {
        12 if digits.starts_with("254") => digits,
        10 if digits.starts_with('0') => format!("254{}", &digits[1..]),
        9 => format!("254{}", digits),
        _ => {
            return Err(ProviderError::Rejected(format!(
                "mpesa: unsupported phone number {}",
                phone
            )));
        }
    };
    Ok(msisdn)
}

fn result_code(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Daraja result codes: 0 is success, everything else is a final failure
/// (1032 cancelled by user, 1037 unreachable, 2001 wrong PIN, ...).
fn status_from_result(code: i64) -> TransactionStatus {
    if code == 0 {
        TransactionStatus::Completed
    } else {
        TransactionStatus::Failed
    }
}

impl MpesaProvider {
    pub const CODE: &'static str = "mpesa";

    pub fn new(config: MpesaConfig) -> Result<Self, ProviderError> {
        let api = ApiClient::new(Self::CODE, config.http.clone())?;
        Ok(Self {
            config,
            api,
            token: Mutex::new(None),
        })
    }

    /// OAuth token, cached until shortly before it expires.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let body = self
            .api
            .send(
                self.api
                    .get("/oauth/v1/generate")
                    .query(&[("grant_type", "client_credentials")])
                    .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret)),
            )
            .await?;
        let value = str_field(&body, "/access_token")?.to_string();
        let ttl = result_code(body.get("expires_in")).unwrap_or(3599).max(60) as u64;
        debug!(ttl, "M-Pesa access token refreshed");
        *cached = Some(CachedToken {
            value: value.clone(),
            expires: Instant::now() + Duration::from_secs(ttl - 30),
        });
        Ok(value)
    }

    async fn call(&self, path: &str, payload: &Value) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let body = self
            .api
            .send(self.api.post(path).bearer_auth(token).json(payload))
            .await?;
        match result_code(body.get("ResponseCode")) {
            Some(0) => Ok(body),
            Some(_) => Err(ProviderError::Rejected(format!(
                "mpesa: {}",
                body.get("ResponseDescription")
                    .and_then(Value::as_str)
                    .unwrap_or("request declined")
            ))),
            None => Err(ProviderError::MalformedResponse(
                "mpesa: missing ResponseCode".into(),
            )),
        }
    }

    fn password_now(&self) -> (String, String) {
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);
        (password, timestamp)
    }
}

#[async_trait]
impl PaymentProvider for MpesaProvider {
    fn code(&self) -> &'static str {
        Self::CODE
    }

    fn capabilities(&self) -> ProviderCapabilities {
        let payout = self.config.b2c.is_some();
        ProviderCapabilities {
            refund: false,
            payout,
            requires_email: false,
            requires_phone: true,
            payout_kinds: if payout {
                vec![WithdrawalMethodKind::MobileMoney]
            } else {
                Vec::new()
            },
        }
    }

    fn signature_header(&self) -> &'static str {
        "x-mpesa-signature"
    }

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError> {
        let phone = req
            .payer
            .phone
            .as_deref()
            .ok_or_else(|| ProviderError::Rejected("mpesa: payer phone is required".into()))?;
        let msisdn = normalize_msisdn(phone)?;
        let callback_url = req.callback_url.as_deref().ok_or_else(|| {
            ProviderError::Configuration("mpesa: STK push needs a callback URL".into())
        })?;
        let (password, timestamp) = self.password_now();
        let account_reference: String = req.reference.chars().take(ACCOUNT_REFERENCE_MAX).collect();

        let payload = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": to_whole(req.amount, req.currency)?,
            "PartyA": msisdn,
            "PartyB": self.config.shortcode,
            "PhoneNumber": msisdn,
            "CallBackURL": callback_url,
            "AccountReference": account_reference,
            "TransactionDesc": req.description.as_deref().unwrap_or("Deposit"),
        });
        let body = self.call("/mpesa/stkpush/v1/processrequest", &payload).await?;
        let checkout_id = str_field(&body, "/CheckoutRequestID")?;
        info!(reference = %req.reference, checkout_id, "M-Pesa STK push sent");

        Ok(PaymentInitialization {
            redirect_target: None,
            provider_reference: checkout_id.to_string(),
            expires_at: None,
            acknowledged_status: TransactionStatus::Processing,
            provider_data: json!({
                "merchant_request_id": body.get("MerchantRequestID"),
                "customer_message": body.get("CustomerMessage"),
            }),
        })
    }

    async fn verify_payment(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let (password, timestamp) = self.password_now();
        let payload = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "CheckoutRequestID": provider_reference,
        });
        let body = self.call("/mpesa/stkpushquery/v1/query", &payload).await?;
        let code = result_code(body.get("ResultCode")).ok_or_else(|| {
            ProviderError::MalformedResponse("mpesa: missing ResultCode".into())
        })?;

        Ok(ProcessorPayment {
            id: provider_reference.to_string(),
            reference: body
                .get("MerchantRequestID")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: status_from_result(code),
            amount: None,
            currency: Some(Currency::KES),
            fee: None,
            description: body
                .get("ResultDesc")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: body.clone(),
        })
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        signature::verify_sha256_hex(&self.config.webhook_secret, raw_body, signature)
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ProviderError::MalformedResponse(format!("mpesa webhook: {}", e)))?;

        if let Some(stk) = payload.pointer("/Body/stkCallback") {
            let code = result_code(stk.get("ResultCode")).ok_or_else(|| {
                ProviderError::MalformedResponse("mpesa webhook: missing ResultCode".into())
            })?;
            let amount = stk
                .pointer("/CallbackMetadata/Item")
                .and_then(Value::as_array)
                .and_then(|items| {
                    items
                        .iter()
                        .find(|item| item.get("Name").and_then(Value::as_str) == Some("Amount"))
                })
                .and_then(|item| item.get("Value"))
                .and_then(decimal_from_json);
            return Ok(WebhookNotification {
                event: "stk_callback".into(),
                reference: None,
                provider_reference: Some(str_field(stk, "/CheckoutRequestID")?.to_string()),
                status: Some(status_from_result(code)),
                amount,
                currency: Some(Currency::KES),
                fee: None,
                payload,
            });
        }

        if let Some(result) = payload.get("Result") {
            let code = result_code(result.get("ResultCode")).ok_or_else(|| {
                ProviderError::MalformedResponse("mpesa webhook: missing ResultCode".into())
            })?;
            let originator = str_field(result, "/OriginatorConversationID")?.to_string();
            return Ok(WebhookNotification {
                event: "b2c_result".into(),
                reference: Some(originator.clone()),
                provider_reference: Some(originator),
                status: Some(status_from_result(code)),
                amount: None,
                currency: Some(Currency::KES),
                fee: None,
                payload,
            });
        }

        Err(ProviderError::MalformedResponse(
            "mpesa webhook: neither stkCallback nor Result".into(),
        ))
    }

    async fn payout(&self, req: &PayoutRequest) -> Result<ProviderReceipt, ProviderError> {
        let b2c = self.config.b2c.as_ref().ok_or(ProviderError::Unsupported {
            provider: Self::CODE,
            operation: "payout",
        })?;
        let PayoutRecipient::MobileMoney { phone, .. } = &req.recipient else {
            return Err(ProviderError::Rejected(
                "mpesa: payouts go to mobile wallets only".into(),
            ));
        };

        let payload = json!({
            "OriginatorConversationID": req.reference,
            "InitiatorName": b2c.initiator_name,
            "SecurityCredential": b2c.security_credential,
            "CommandID": "BusinessPayment",
            "Amount": to_whole(req.amount, req.currency)?,
            "PartyA": b2c.shortcode,
            "PartyB": normalize_msisdn(phone)?,
            "Remarks": req.reason.as_deref().unwrap_or("Withdrawal"),
            "QueueTimeOutURL": b2c.timeout_url,
            "ResultURL": b2c.result_url,
            "Occasion": req.reference,
        });
        let body = self.call("/mpesa/b2c/v3/paymentrequest", &payload).await?;
        let originator = body
            .get("OriginatorConversationID")
            .and_then(Value::as_str)
            .unwrap_or(&req.reference)
            .to_string();
        info!(reference = %req.reference, "M-Pesa B2C request accepted");

        Ok(ProviderReceipt {
            provider_reference: originator,
            status: TransactionStatus::Processing,
            raw: body,
        })
    }
}
