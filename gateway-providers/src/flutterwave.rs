//! Flutterwave adapter (v3 API).
//!
//! Flutterwave takes amounts in major units. Webhooks carry a hex
//! HMAC-SHA256 of the raw body in `verif-hash`, keyed by the webhook hash.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use fee_rules::Currency;
use gateway_types::{
    InitializePayment, PaymentInitialization, PaymentProvider, PayoutRecipient, PayoutRequest,
    ProcessorPayment, ProviderCapabilities, ProviderError, ProviderReceipt, RefundRequest,
    TransactionStatus, WebhookNotification, WithdrawalMethodKind,
};

use crate::config::FlutterwaveConfig;
use crate::http::{ApiClient, id_field, str_field};
use crate::signature;
use crate::units::decimal_from_json;

pub struct FlutterwaveProvider {
    config: FlutterwaveConfig,
    api: ApiClient,
}

impl FlutterwaveProvider {
    pub const CODE: &'static str = "flutterwave";

    pub fn new(config: FlutterwaveConfig) -> Result<Self, ProviderError> {
        let api = ApiClient::new(Self::CODE, config.http.clone())?;
        Ok(Self { config, api })
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let body = self
            .api
            .send(request.bearer_auth(&self.config.secret_key))
            .await?;
        match body.get("status").and_then(Value::as_str) {
            Some("success") => body.get("data").cloned().ok_or_else(|| {
                ProviderError::MalformedResponse("flutterwave: missing data".into())
            }),
            Some(_) => Err(ProviderError::Rejected(format!(
                "flutterwave: {}",
                body.get("message").and_then(Value::as_str).unwrap_or("request failed")
            ))),
            None => Err(ProviderError::MalformedResponse(
                "flutterwave: missing status".into(),
            )),
        }
    }

    async fn fetch_charge(&self, tx_ref: &str) -> Result<Value, ProviderError> {
        let request = self
            .api
            .get("/v3/transactions/verify_by_reference")
            .query(&[("tx_ref", tx_ref)]);
        self.call(request).await
    }
}

fn charge_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw.to_ascii_lowercase().as_str() {
        "successful" => Ok(TransactionStatus::Completed),
        "failed" | "cancelled" => Ok(TransactionStatus::Failed),
        "pending" | "new" => Ok(TransactionStatus::Processing),
        other => Err(ProviderError::MalformedResponse(format!(
            "flutterwave: unknown status {}",
            other
        ))),
    }
}

fn refund_status(raw: &str) -> Result<TransactionStatus, ProviderError> {
    match raw.to_ascii_lowercase().as_str() {
        "completed" | "successful" => Ok(TransactionStatus::Completed),
        "failed" => Ok(TransactionStatus::Failed),
        "pending" | "new" | "processing" => Ok(TransactionStatus::Processing),
        other => Err(ProviderError::MalformedResponse(format!(
            "flutterwave: unknown refund status {}",
            other
        ))),
    }
}

fn parse_currency(data: &Value) -> Result<Currency, ProviderError> {
    str_field(data, "/currency")?
        .parse()
        .map_err(|e| ProviderError::MalformedResponse(format!("{}", e)))
}

fn amount_field(data: &Value, field: &str) -> Result<rust_decimal::Decimal, ProviderError> {
    data.get(field)
        .and_then(decimal_from_json)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("missing field /{}", field)))
}

#[async_trait]
impl PaymentProvider for FlutterwaveProvider {
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
        "verif-hash"
    }

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError> {
        let email = req.payer.email.as_deref().ok_or_else(|| {
            ProviderError::Rejected("flutterwave: payer email is required".into())
        })?;
        let mut payload = json!({
            "tx_ref": req.reference,
            "amount": req.amount.to_string(),
            "currency": req.currency.code(),
            "customer": {
                "email": email,
                "phonenumber": req.payer.phone,
                "name": req.payer.name,
            },
            "meta": req.metadata,
        });
        if let Some(callback_url) = &req.callback_url {
            payload["redirect_url"] = Value::String(callback_url.clone());
        }
        if let Some(description) = &req.description {
            payload["customizations"] = json!({ "description": description });
        }

        let data = self.call(self.api.post("/v3/payments").json(&payload)).await?;
        let link = str_field(&data, "/link")?;
        info!(reference = %req.reference, "Flutterwave checkout created");

        Ok(PaymentInitialization {
            redirect_target: Some(link.to_string()),
            provider_reference: req.reference.clone(),
            expires_at: None,
            acknowledged_status: TransactionStatus::Processing,
            provider_data: json!({}),
        })
    }

    async fn verify_payment(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let data = self.fetch_charge(provider_reference).await?;
        Ok(ProcessorPayment {
            id: id_field(&data, "/id")?,
            reference: str_field(&data, "/tx_ref")?.to_string(),
            status: charge_status(str_field(&data, "/status")?)?,
            amount: Some(amount_field(&data, "amount")?),
            currency: Some(parse_currency(&data)?),
            fee: data.get("app_fee").and_then(decimal_from_json),
            description: data
                .get("processor_response")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: data.clone(),
        })
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        signature::verify_sha256_hex(&self.config.webhook_hash, raw_body, signature)
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
        let payload: Value = serde_json::from_slice(raw_body).map_err(|e| {
            ProviderError::MalformedResponse(format!("flutterwave webhook: {}", e))
        })?;
        let event = str_field(&payload, "/event")?.to_string();
        let data = payload.get("data").ok_or_else(|| {
            ProviderError::MalformedResponse("flutterwave webhook: no data".into())
        })?;

        let status = match event.as_str() {
            "charge.completed" | "transfer.completed" => data
                .get("status")
                .and_then(Value::as_str)
                .map(charge_status)
                .transpose()?,
            _ => None,
        };
        // Charges echo our reference as tx_ref, transfers as reference.
        let reference = data
            .get("tx_ref")
            .or_else(|| data.get("reference"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let provider_reference = if event.starts_with("transfer.") {
            id_field(data, "/id").ok()
        } else {
            reference.clone()
        };

        Ok(WebhookNotification {
            event,
            reference,
            provider_reference,
            status,
            amount: data.get("amount").and_then(decimal_from_json),
            currency: data
                .get("currency")
                .and_then(Value::as_str)
                .and_then(|c| c.parse().ok()),
            fee: data.get("app_fee").and_then(decimal_from_json),
            payload,
        })
    }

    async fn refund(&self, req: &RefundRequest) -> Result<ProviderReceipt, ProviderError> {
        // Refunds are keyed by Flutterwave's numeric id, not our reference.
        let charge = self.fetch_charge(&req.provider_reference).await?;
        let id = id_field(&charge, "/id")?;
        let mut payload = json!({});
        if let Some(amount) = req.amount {
            payload["amount"] = Value::String(amount.to_string());
        }
        let data = self
            .call(
                self.api
                    .post(&format!("/v3/transactions/{}/refund", id))
                    .json(&payload),
            )
            .await?;
        let status = refund_status(str_field(&data, "/status")?)?;
        Ok(ProviderReceipt {
            provider_reference: id_field(&data, "/id")?,
            status,
            raw: data,
        })
    }

    async fn payout(&self, req: &PayoutRequest) -> Result<ProviderReceipt, ProviderError> {
        let (account_bank, account_number, beneficiary) = match &req.recipient {
            PayoutRecipient::BankAccount {
                account_number,
                bank_code,
                account_name,
                ..
            } => {
                let bank_code = bank_code.clone().ok_or_else(|| {
                    ProviderError::Rejected(
                        "flutterwave: bank_code is required for transfers".into(),
                    )
                })?;
                (bank_code, account_number.clone(), Some(account_name.clone()))
            }
            PayoutRecipient::MobileMoney { phone, provider } => (
                provider.as_deref().unwrap_or("MPS").to_uppercase(),
                phone.trim_start_matches('+').to_string(),
                None,
            ),
        };
        let payload = json!({
            "account_bank": account_bank,
            "account_number": account_number,
            "amount": req.amount.to_string(),
            "currency": req.currency.code(),
            "reference": req.reference,
            "narration": req.reason.clone().unwrap_or_else(|| format!("Payout {}", req.reference)),
            "beneficiary_name": beneficiary,
            "meta": req.metadata,
        });
        let data = self.call(self.api.post("/v3/transfers").json(&payload)).await?;
        let status = charge_status(str_field(&data, "/status")?)?;
        info!(reference = %req.reference, %status, "Flutterwave transfer queued");

        Ok(ProviderReceipt {
            provider_reference: id_field(&data, "/id")?,
            status,
            raw: data,
        })
    }

    async fn verify_payout(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        let data = self
            .call(self.api.get(&format!("/v3/transfers/{}", provider_reference)))
            .await?;
        Ok(ProcessorPayment {
            id: id_field(&data, "/id")?,
            reference: str_field(&data, "/reference")?.to_string(),
            status: charge_status(str_field(&data, "/status")?)?,
            amount: Some(amount_field(&data, "amount")?),
            currency: Some(parse_currency(&data)?),
            fee: data.get("fee").and_then(decimal_from_json),
            description: data
                .get("complete_message")
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
            .call(self.api.get(&format!("/v3/refunds/{}", provider_reference)))
            .await?;
        let id = id_field(&data, "/id")?;
        Ok(ProcessorPayment {
            reference: data
                .get("flw_ref")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            id,
            status: refund_status(str_field(&data, "/status")?)?,
            amount: Some(amount_field(&data, "amount_refunded")?),
            currency: None,
            fee: None,
            description: None,
            metadata: data.clone(),
        })
    }
}
