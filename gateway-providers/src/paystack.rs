//! Paystack adapter (NGN, GHS, ZAR).
//!
//! Amounts go over the wire in kobo/pesewas/cents. Webhooks are signed with
//! HMAC-SHA512 of the raw body, keyed by the secret key.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use fee_rules::Currency;
use gateway_types::{
    InitializePayment, PaymentInitialization, PaymentProvider, PayoutRecipient, PayoutRequest,
    ProcessorPayment, ProviderCapabilities, ProviderError, ProviderReceipt, RefundRequest,
    TransactionStatus, WebhookNotification, WithdrawalMethodKind,
};

use crate::config::PaystackConfig;
use crate::http::{ApiClient, id_field, str_field};
use crate::signature;
use crate::units::{from_minor, to_minor};

pub struct PaystackProvider {
    config: PaystackConfig,
    api: ApiClient,
}

impl PaystackProvider {
    pub const CODE: &'static str = "paystack";

    pub fn new(config: PaystackConfig) -> Result<Self, ProviderError> {
        let api = ApiClient::new(Self::CODE, config.http.clone())?;
        Ok(Self { config, api })
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let body = self
            .api
            .send(request.bearer_auth(&self.config.secret_key))
            .await?;
        unwrap_envelope(body)
    }

    fn to_payment(data: &Value) -> Result<ProcessorPayment, ProviderError> {
        let currency: Currency = str_field(data, "/currency")?
            .parse()
            .map_err(|e| ProviderError::MalformedResponse(format!("{}", e)))?;
        let amount = data
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| ProviderError::MalformedResponse("missing field /amount".into()))?;
        let status = charge_status(str_field(data, "/status")?)?;
        Ok(ProcessorPayment {
            id: id_field(data, "/id")?,
            reference: str_field(data, "/reference")?.to_string(),
            status,
            amount: Some(from_minor(amount, currency)),
            currency: Some(currency),
            fee: data
                .get("fees")
                .and_then(Value::as_i64)
                .map(|f| from_minor(f, currency)),
            description: data
                .get("gateway_response")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: data.clone(),
        })
    }

    fn recipient_payload(req: &PayoutRequest) -> Result<Value, ProviderError> {
        match &req.recipient {
            PayoutRecipient::BankAccount {
                account_number,
                bank_code,
                account_name,
                country_code,
                ..
            } => {
                let bank_code = bank_code.as_deref().ok_or_else(|| {
                    ProviderError::Rejected("paystack: bank_code is required for transfers".into())
                })?;
                let kind = match country_code.as_str() {
                    "GH" => "ghipss",
                    "ZA" => "basa",
                    _ => "nuban",
                };
                Ok(json!({
                    "type": kind,
                    "name": account_name,
                    "account_number": account_number,
                    "bank_code": bank_code,
                    "currency": req.currency.code(),
                }))
            }
            PayoutRecipient::MobileMoney { phone, provider } => Ok(json!({
                "type": "mobile_money",
                "name": phone,
                "account_number": phone,
                "bank_code": provider.as_deref().unwrap_or("MTN").to_uppercase(),
                "currency": req.currency.code(),
            })),
        }
    }
}

fn unwrap_envelope(body: Value) -> Result<Value, ProviderError> {
    match body.get("status").and_then(Value::as_bool) {
        Some(true) => body
            .get("data")
            .cloned()
            .ok_or_else(|| ProviderError::MalformedResponse("paystack: missing data".into())),
        Some(false) => Err(ProviderError::Rejected(format!(
            "paystack: {}",
            body.get("message").and_then(Value::as_str).unwrap_or("request failed")
        ))),
        None => Err(ProviderError::MalformedResponse(
            "paystack: missing status flag".into(),
        )),
    }
}

fn charge_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw {
        "success" => Ok(TransactionStatus::Completed),
        "failed" | "reversed" => Ok(TransactionStatus::Failed),
        "abandoned" | "ongoing" | "pending" | "processing" | "queued" => {
            Ok(TransactionStatus::Processing)
        }
        other => Err(ProviderError::MalformedResponse(format!(
            "paystack: unknown charge status {}",
            other
        ))),
    }
}

fn transfer_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw {
        "success" => Ok(TransactionStatus::Completed),
        "failed" | "reversed" | "rejected" => Ok(TransactionStatus::Failed),
        "pending" | "otp" | "received" | "queued" | "processing" => {
            Ok(TransactionStatus::Processing)
        }
        other => Err(ProviderError::MalformedResponse(format!(
            "paystack: unknown transfer status {}",
            other
        ))),
    }
}

fn refund_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw {
        "processed" => Ok(TransactionStatus::Completed),
        "failed" => Ok(TransactionStatus::Failed),
        "pending" | "processing" | "needs-attention" => Ok(TransactionStatus::Processing),
        other => Err(ProviderError::MalformedResponse(format!(
            "paystack: unknown refund status {}",
            other
        ))),
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    fn code(&self) -> &'static str {
        Self::CODE
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            refund: true,
            payout: true,
            requires_email: true,
            requires_phone: false,
            payout_kinds: vec![
                WithdrawalMethodKind::BankAccount,
                WithdrawalMethodKind::MobileMoney,
            ],
        }
    }

    fn signature_header(&self) -> &'static str {
        "x-paystack-signature"
    }

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError> {
        let email = req.payer.email.as_deref().ok_or_else(|| {
            ProviderError::Rejected("paystack: payer email is required".into())
        })?;
        let mut payload = json!({
            "email": email,
            "amount": to_minor(req.amount, req.currency)?,
            "currency": req.currency.code(),
            "reference": req.reference,
            "metadata": req.metadata,
        });
        if let Some(callback_url) = &req.callback_url {
            payload["callback_url"] = Value::String(callback_url.clone());
        }

        let data = self
            .call(self.api.post("/transaction/initialize").json(&payload))
            .await?;
        let authorization_url = str_field(&data, "/authorization_url")?;
        let reference = str_field(&data, "/reference")?;
        info!(reference, "Paystack payment initialized");

        Ok(PaymentInitialization {
            redirect_target: Some(authorization_url.to_string()),
            provider_reference: reference.to_string(),
            expires_at: None,
            acknowledged_status: TransactionStatus::Processing,
            provider_data: json!({ "access_code": data.get("access_code") }),
        })
    }

    async fn verify_payment(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let data = self
            .call(
                self.api
                    .get(&format!("/transaction/verify/{}", provider_reference)),
            )
            .await?;
        Self::to_payment(&data)
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        signature::verify_sha512_hex(&self.config.secret_key, raw_body, signature)
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ProviderError::MalformedResponse(format!("paystack webhook: {}", e)))?;
        let event = str_field(&payload, "/event")?.to_string();
        let data = payload
            .get("data")
            .ok_or_else(|| ProviderError::MalformedResponse("paystack webhook: no data".into()))?;

        let status = match event.as_str() {
            "charge.success" | "transfer.success" | "refund.processed" => {
                Some(TransactionStatus::Completed)
            }
            "charge.failed" | "transfer.failed" | "transfer.reversed" | "refund.failed" => {
                Some(TransactionStatus::Failed)
            }
            "refund.pending" | "refund.processing" => Some(TransactionStatus::Processing),
            _ => None,
        };
        let currency: Option<Currency> = data
            .get("currency")
            .and_then(Value::as_str)
            .and_then(|c| c.parse().ok());
        let minor = |field: &str| {
            data.get(field)
                .and_then(Value::as_i64)
                .zip(currency)
                .map(|(v, c)| from_minor(v, c))
        };
        // A refund names the charge it reverses in `transaction_reference`;
        // the refund record itself is found by the refund id.
        let (reference, provider_reference) = if event.starts_with("refund.") {
            (None, id_field(data, "/id").ok())
        } else {
            let reference = data
                .get("reference")
                .and_then(Value::as_str)
                .map(str::to_string);
            (reference.clone(), reference)
        };

        Ok(WebhookNotification {
            event,
            provider_reference,
            reference,
            status,
            amount: minor("amount"),
            currency,
            fee: minor("fees"),
            payload,
        })
    }

    async fn refund(&self, req: &RefundRequest) -> Result<ProviderReceipt, ProviderError> {
        let mut payload = json!({ "transaction": req.provider_reference });
        if let Some(amount) = req.amount {
            payload["amount"] = json!(to_minor(amount, req.currency)?);
        }
        let data = self.call(self.api.post("/refund").json(&payload)).await?;
        let status = refund_status(str_field(&data, "/status")?)?;
        info!(reference = %req.reference, %status, "Paystack refund queued");
        Ok(ProviderReceipt {
            provider_reference: id_field(&data, "/id")?,
            status,
            raw: data,
        })
    }

    async fn payout(&self, req: &PayoutRequest) -> Result<ProviderReceipt, ProviderError> {
        let recipient = self
            .call(
                self.api
                    .post("/transferrecipient")
                    .json(&Self::recipient_payload(req)?),
            )
            .await?;
        let recipient_code = str_field(&recipient, "/recipient_code")?;

        let mut payload = json!({
            "source": "balance",
            "amount": to_minor(req.amount, req.currency)?,
            "recipient": recipient_code,
            "reference": req.reference,
            "currency": req.currency.code(),
        });
        if let Some(reason) = &req.reason {
            payload["reason"] = Value::String(reason.clone());
        }
        let transfer = self.call(self.api.post("/transfer").json(&payload)).await?;
        let status = transfer_status(str_field(&transfer, "/status")?)?;
        info!(reference = %req.reference, %status, "Paystack transfer queued");

        Ok(ProviderReceipt {
            provider_reference: str_field(&transfer, "/reference")?.to_string(),
            status,
            raw: json!({
                "transfer_code": transfer.get("transfer_code"),
                "recipient_code": recipient_code,
                "status": transfer.get("status"),
            }),
        })
    }

    async fn verify_payout(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let data = self
            .call(
                self.api
                    .get(&format!("/transfer/verify/{}", provider_reference)),
            )
            .await?;
        let currency: Currency = str_field(&data, "/currency")?
            .parse()
            .map_err(|e| ProviderError::MalformedResponse(format!("{}", e)))?;
        Ok(ProcessorPayment {
            id: id_field(&data, "/transfer_code")?,
            reference: str_field(&data, "/reference")?.to_string(),
            status: transfer_status(str_field(&data, "/status")?)?,
            amount: data
                .get("amount")
                .and_then(Value::as_i64)
                .map(|a| from_minor(a, currency)),
            currency: Some(currency),
            fee: None,
            description: data
                .get("failure_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: data.clone(),
        })
    }

    async fn verify_refund(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let data = self
            .call(self.api.get(&format!("/refund/{}", provider_reference)))
            .await?;
        let currency: Currency = str_field(&data, "/currency")?
            .parse()
            .map_err(|e| ProviderError::MalformedResponse(format!("{}", e)))?;
        let amount = data
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| ProviderError::MalformedResponse("missing field /amount".into()))?;
        let id = id_field(&data, "/id")?;
        Ok(ProcessorPayment {
            reference: data
                .get("transaction_reference")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            id,
            status: refund_status(str_field(&data, "/status")?)?,
            amount: Some(from_minor(amount, currency)),
            currency: Some(currency),
            fee: None,
            description: data
                .get("merchant_note")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: data.clone(),
        })
    }
}
