//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use gateway_types::{
    AppError, BankAccountId, BankAccountQuery, CancelBody, CreateBankAccountRequest,
    CreateDepositRequest, CreateWithdrawalMethodRequest, CreateWithdrawalRequest,
    DailySummaryQuery, FeeQuoteRequest, LedgerRepository, MethodsQuery, RateQuery, RefundBody,
    TransactionFilter, TransactionId, UpdateBankAccountRequest, WebhookAck, WithdrawalMethodId,
};

use super::auth::Caller;
use crate::PaymentOrchestrator;

/// Application state shared across handlers.
pub struct AppState<R: LedgerRepository> {
    pub orchestrator: Arc<PaymentOrchestrator<R>>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry & Quotes
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state))]
pub async fn list_methods<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<MethodsQuery>,
) -> impl IntoResponse {
    Json(state.orchestrator.methods(&query))
}

pub async fn get_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.method(&id)?))
}

pub async fn list_regions<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> impl IntoResponse {
    Json(state.orchestrator.regions())
}

pub async fn get_region<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(country): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.region(&country)?))
}

#[tracing::instrument(skip(state), fields(method_id = %req.method_id, amount = %req.amount))]
pub async fn quote_fee<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<FeeQuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.quote_fee(&req)?))
}

#[tracing::instrument(skip(state))]
pub async fn external_rate<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<RateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.external_rate(&query).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Deposits & Withdrawals
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(user_id = %caller.0, method_id = %req.method_id))]
pub async fn create_deposit<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Json(req): Json<CreateDepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.orchestrator.create_deposit(caller.0, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state, req), fields(user_id = %caller.0, method_id = %req.method_id))]
pub async fn create_withdrawal<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Json(req): Json<CreateWithdrawalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state.orchestrator.create_withdrawal(caller.0, req).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state), fields(user_id = %caller.0))]
pub async fn list_transactions<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Query(filter): Query<TransactionFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.orchestrator.list_transactions(caller.0, filter).await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, tx_id = %id))]
pub async fn get_transaction<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(state.orchestrator.get_transaction(caller.0, id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %caller.0, tx_id = %id))]
pub async fn cancel_transaction<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TransactionId = parse_id(&id, "transaction")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(state.orchestrator.cancel(caller.0, id, body).await?))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, tx_id = %id))]
pub async fn verify_transaction<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(state.orchestrator.verify(caller.0, id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %caller.0, tx_id = %id))]
pub async fn refund_transaction<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
    body: Option<Json<RefundBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TransactionId = parse_id(&id, "transaction")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let refund = state.orchestrator.refund(caller.0, id, body).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0))]
pub async fn balances<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.balances(caller.0).await?))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0))]
pub async fn daily_summary<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Query(query): Query<DailySummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.orchestrator.daily_summary(caller.0, query.date).await?;
    Ok(Json(summary))
}

// ─────────────────────────────────────────────────────────────────────────────
// Bank Accounts
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(user_id = %caller.0))]
pub async fn create_bank_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Json(req): Json<CreateBankAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.orchestrator.create_bank_account(caller.0, req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0))]
pub async fn list_bank_accounts<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Query(query): Query<BankAccountQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.list_bank_accounts(caller.0, query).await?))
}

pub async fn get_bank_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: BankAccountId = parse_id(&id, "bank account")?;
    Ok(Json(state.orchestrator.get_bank_account(caller.0, id).await?))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, bank_account_id = %id))]
pub async fn update_bank_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateBankAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: BankAccountId = parse_id(&id, "bank account")?;
    Ok(Json(
        state
            .orchestrator
            .update_bank_account(caller.0, id, req)
            .await?,
    ))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, bank_account_id = %id))]
pub async fn delete_bank_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: BankAccountId = parse_id(&id, "bank account")?;
    state.orchestrator.delete_bank_account(caller.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, bank_account_id = %id))]
pub async fn set_default_bank_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: BankAccountId = parse_id(&id, "bank account")?;
    Ok(Json(
        state
            .orchestrator
            .set_default_bank_account(caller.0, id)
            .await?,
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Withdrawal Methods
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(user_id = %caller.0))]
pub async fn create_withdrawal_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Json(req): Json<CreateWithdrawalMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state
        .orchestrator
        .create_withdrawal_method(caller.0, req)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn list_withdrawal_methods<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.list_withdrawal_methods(caller.0).await?))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, withdrawal_method_id = %id))]
pub async fn set_default_withdrawal_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: WithdrawalMethodId = parse_id(&id, "withdrawal method")?;
    Ok(Json(
        state
            .orchestrator
            .set_default_withdrawal_method(caller.0, id)
            .await?,
    ))
}

#[tracing::instrument(skip(state), fields(user_id = %caller.0, withdrawal_method_id = %id))]
pub async fn deactivate_withdrawal_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: WithdrawalMethodId = parse_id(&id, "withdrawal method")?;
    state
        .orchestrator
        .deactivate_withdrawal_method(caller.0, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider Webhooks & Reconciliation
// ─────────────────────────────────────────────────────────────────────────────

/// Provider callback. The body is taken raw so the signature is checked
/// against exactly the bytes the provider signed.
#[tracing::instrument(skip(state, headers, body), fields(gateway = %gateway))]
pub async fn provider_webhook<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = state
        .orchestrator
        .providers()
        .get(&gateway)
        .and_then(|p| headers.get(p.signature_header()))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let outcome = state
        .orchestrator
        .handle_webhook(&gateway, signature.as_deref(), &body)
        .await?;
    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}

#[tracing::instrument(skip(state))]
pub async fn reconcile<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.reconcile().await?))
}
