//! # Gateway Client SDK
//!
//! A typed Rust client for the payment gateway API. Every user-scoped call
//! sends the configured user id in the `X-User-Id` header.

use chrono::NaiveDate;
use fee_rules::{Direction, MethodType, PaymentMethod, RegionConfig};
use gateway_types::{
    Balance, BankAccount, BankAccountId, BankAccountQuery, CancelBody, CreateBankAccountRequest,
    CreateDepositRequest, CreateWithdrawalMethodRequest, CreateWithdrawalRequest, Currency,
    DailySummary, DepositResponse, ExternalRate, FeeQuoteRequest, FeeQuoteResponse,
    ReconcileReport, RefundBody, Transaction, TransactionFilter, TransactionId, TransactionPage,
    UpdateBankAccountRequest, UserId, WithdrawalMethodId, WithdrawalMethodPreference,
};
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Header carrying the caller's identity.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No user id configured for a user-scoped call")]
    MissingUser,
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Payment gateway API client.
pub struct GatewayClient {
    base_url: String,
    user_id: Option<UserId>,
    http: Client,
}

impl GatewayClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: None,
            http: Client::new(),
        }
    }

    /// Acts on behalf of the given user.
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    // ── Registry ────────────────────────────────────────────────────────────

    /// Lists the methods offered in a country, optionally of one type.
    pub async fn list_methods(
        &self,
        country: &str,
        method_type: Option<MethodType>,
    ) -> Result<Vec<PaymentMethod>, ClientError> {
        let mut query = vec![("country", country.to_string())];
        if let Some(method_type) = method_type {
            query.push(("method_type", method_type.to_string()));
        }
        let req = self.public(Method::GET, "/api/methods").query(&query);
        self.execute(req).await
    }

    pub async fn get_method(&self, id: &str) -> Result<PaymentMethod, ClientError> {
        self.execute(self.public(Method::GET, &format!("/api/methods/{}", id)))
            .await
    }

    pub async fn list_regions(&self) -> Result<Vec<RegionConfig>, ClientError> {
        self.execute(self.public(Method::GET, "/api/regions")).await
    }

    pub async fn get_region(&self, country: &str) -> Result<RegionConfig, ClientError> {
        self.execute(self.public(Method::GET, &format!("/api/regions/{}", country)))
            .await
    }

    /// Quotes the fee for moving `amount` through a method.
    pub async fn quote_fee(
        &self,
        method_id: &str,
        amount: Decimal,
        direction: Direction,
    ) -> Result<FeeQuoteResponse, ClientError> {
        let req = FeeQuoteRequest {
            method_id: method_id.to_string(),
            amount,
            direction,
        };
        self.execute(self.public(Method::POST, "/api/fees/quote").json(&req))
            .await
    }

    /// Spot rate for a crypto asset in a fiat currency.
    pub async fn external_rate(
        &self,
        asset: &str,
        fiat: Currency,
    ) -> Result<ExternalRate, ClientError> {
        let req = self
            .public(Method::GET, "/api/rates")
            .query(&[("asset", asset), ("fiat", fiat.code())]);
        self.execute(req).await
    }

    // ── Money movement ──────────────────────────────────────────────────────

    /// Starts a deposit. The response carries the payer's next step.
    pub async fn create_deposit(
        &self,
        req: &CreateDepositRequest,
    ) -> Result<DepositResponse, ClientError> {
        self.execute(self.scoped(Method::POST, "/api/deposits")?.json(req))
            .await
    }

    pub async fn create_withdrawal(
        &self,
        req: &CreateWithdrawalRequest,
    ) -> Result<Transaction, ClientError> {
        self.execute(self.scoped(Method::POST, "/api/withdrawals")?.json(req))
            .await
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<TransactionPage, ClientError> {
        let req = self.scoped(Method::GET, "/api/transactions")?.query(filter);
        self.execute(req).await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, ClientError> {
        self.execute(self.scoped(Method::GET, &format!("/api/transactions/{}", id))?)
            .await
    }

    pub async fn cancel_transaction(
        &self,
        id: TransactionId,
        reason: Option<String>,
    ) -> Result<Transaction, ClientError> {
        let req = self
            .scoped(Method::POST, &format!("/api/transactions/{}/cancel", id))?
            .json(&CancelBody { reason });
        self.execute(req).await
    }

    /// Asks the provider for the record's current status.
    pub async fn verify_transaction(&self, id: TransactionId) -> Result<Transaction, ClientError> {
        self.execute(self.scoped(Method::POST, &format!("/api/transactions/{}/verify", id))?)
            .await
    }

    /// Refunds a completed deposit, fully when `amount` is `None`.
    pub async fn refund_transaction(
        &self,
        id: TransactionId,
        amount: Option<Decimal>,
        reason: Option<String>,
    ) -> Result<Transaction, ClientError> {
        let req = self
            .scoped(Method::POST, &format!("/api/transactions/{}/refund", id))?
            .json(&RefundBody { amount, reason });
        self.execute(req).await
    }

    pub async fn balances(&self) -> Result<Vec<Balance>, ClientError> {
        self.execute(self.scoped(Method::GET, "/api/balances")?).await
    }

    pub async fn daily_summary(&self, date: Option<NaiveDate>) -> Result<DailySummary, ClientError> {
        let mut req = self.scoped(Method::GET, "/api/summary/daily")?;
        if let Some(date) = date {
            req = req.query(&[("date", date.to_string())]);
        }
        self.execute(req).await
    }

    // ── Bank accounts ───────────────────────────────────────────────────────

    pub async fn create_bank_account(
        &self,
        req: &CreateBankAccountRequest,
    ) -> Result<BankAccount, ClientError> {
        self.execute(self.scoped(Method::POST, "/api/bank-accounts")?.json(req))
            .await
    }

    pub async fn list_bank_accounts(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<BankAccount>, ClientError> {
        let query = BankAccountQuery {
            country: country.map(str::to_string),
        };
        let req = self.scoped(Method::GET, "/api/bank-accounts")?.query(&query);
        self.execute(req).await
    }

    pub async fn get_bank_account(&self, id: BankAccountId) -> Result<BankAccount, ClientError> {
        self.execute(self.scoped(Method::GET, &format!("/api/bank-accounts/{}", id))?)
            .await
    }

    pub async fn set_bank_account_verified(
        &self,
        id: BankAccountId,
        is_verified: bool,
    ) -> Result<BankAccount, ClientError> {
        let req = self
            .scoped(Method::PATCH, &format!("/api/bank-accounts/{}", id))?
            .json(&UpdateBankAccountRequest { is_verified });
        self.execute(req).await
    }

    pub async fn delete_bank_account(&self, id: BankAccountId) -> Result<(), ClientError> {
        self.execute_empty(self.scoped(Method::DELETE, &format!("/api/bank-accounts/{}", id))?)
            .await
    }

    pub async fn set_default_bank_account(
        &self,
        id: BankAccountId,
    ) -> Result<BankAccount, ClientError> {
        self.execute(self.scoped(Method::POST, &format!("/api/bank-accounts/{}/default", id))?)
            .await
    }

    // ── Withdrawal methods ──────────────────────────────────────────────────

    pub async fn create_withdrawal_method(
        &self,
        req: &CreateWithdrawalMethodRequest,
    ) -> Result<WithdrawalMethodPreference, ClientError> {
        self.execute(self.scoped(Method::POST, "/api/withdrawal-methods")?.json(req))
            .await
    }

    pub async fn list_withdrawal_methods(
        &self,
    ) -> Result<Vec<WithdrawalMethodPreference>, ClientError> {
        self.execute(self.scoped(Method::GET, "/api/withdrawal-methods")?)
            .await
    }

    pub async fn set_default_withdrawal_method(
        &self,
        id: WithdrawalMethodId,
    ) -> Result<WithdrawalMethodPreference, ClientError> {
        let path = format!("/api/withdrawal-methods/{}/default", id);
        self.execute(self.scoped(Method::POST, &path)?).await
    }

    pub async fn deactivate_withdrawal_method(
        &self,
        id: WithdrawalMethodId,
    ) -> Result<(), ClientError> {
        let path = format!("/api/withdrawal-methods/{}", id);
        self.execute_empty(self.scoped(Method::DELETE, &path)?).await
    }

    // ── Operations ──────────────────────────────────────────────────────────

    /// Runs one reconciliation pass now.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ClientError> {
        self.execute(self.public(Method::POST, "/api/reconcile"))
            .await
    }

    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    fn scoped(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let user_id = self.user_id.ok_or(ClientError::MissingUser)?;
        Ok(self
            .public(method, path)
            .header(USER_ID_HEADER, user_id.to_string()))
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.send().await?;
        let body = Self::check(resp).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn execute_empty(&self, req: RequestBuilder) -> Result<(), ClientError> {
        Self::check(req.send().await?).await?;
        Ok(())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
