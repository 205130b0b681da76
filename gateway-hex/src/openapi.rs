//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use fee_rules::{Currency, Direction, FeeSchedule, MethodType, PaymentMethod, RegionConfig};
use gateway_types::domain::{
    BankAccount, BankAccountId, PayerDetails, PayoutDestination, Transaction, TransactionId,
    TransactionStatus, TransactionType, UserId, WithdrawalMethodId, WithdrawalMethodKind,
    WithdrawalMethodPreference,
};
use gateway_types::dto::{
    Balance, BankAccountQuery, CancelBody, CreateBankAccountRequest, CreateDepositRequest,
    CreateWithdrawalMethodRequest, CreateWithdrawalRequest, DailySummary, DailySummaryQuery,
    DailyTotals, DepositResponse, ExternalRate, FeeQuoteRequest, FeeQuoteResponse, MethodsQuery,
    RateQuery, ReconcileReport, RefundBody, TransactionFilter, TransactionPage,
    UpdateBankAccountRequest, WebhookAck, WebhookOutcome,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// List payment methods offered in a country
#[utoipa::path(
    get,
    path = "/api/methods",
    tag = "registry",
    params(MethodsQuery),
    responses(
        (status = 200, description = "Methods for the country plus universal ones", body = Vec<PaymentMethod>)
    )
)]
async fn list_methods() {}

/// Get one payment method
#[utoipa::path(
    get,
    path = "/api/methods/{id}",
    tag = "registry",
    params(("id" = String, Path, description = "Registry method id")),
    responses(
        (status = 200, description = "Payment method", body = PaymentMethod),
        (status = 404, description = "Unknown method")
    )
)]
async fn get_method() {}

/// List region configurations
#[utoipa::path(
    get,
    path = "/api/regions",
    tag = "registry",
    responses((status = 200, description = "All regions", body = Vec<RegionConfig>))
)]
async fn list_regions() {}

/// Get a country's region configuration
#[utoipa::path(
    get,
    path = "/api/regions/{country}",
    tag = "registry",
    params(("country" = String, Path, description = "ISO country code")),
    responses(
        (status = 200, description = "Region", body = RegionConfig),
        (status = 404, description = "Unknown country")
    )
)]
async fn get_region() {}

/// Quote the fee for a deposit or withdrawal
#[utoipa::path(
    post,
    path = "/api/fees/quote",
    tag = "registry",
    request_body = FeeQuoteRequest,
    responses(
        (status = 200, description = "Fee quote", body = FeeQuoteResponse),
        (status = 400, description = "Unknown method, unsupported direction or amount out of bounds")
    )
)]
async fn quote_fee() {}

/// Spot rate for a crypto asset
#[utoipa::path(
    get,
    path = "/api/rates",
    tag = "registry",
    params(RateQuery),
    responses(
        (status = 200, description = "Rate", body = ExternalRate),
        (status = 404, description = "Pair not quoted or no rate source configured"),
        (status = 502, description = "Rate source unavailable")
    )
)]
async fn external_rate() {}

/// Start a deposit
#[utoipa::path(
    post,
    path = "/api/deposits",
    tag = "transactions",
    request_body = CreateDepositRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Deposit started (or the existing record for a reused reference)", body = DepositResponse),
        (status = 400, description = "Validation failed; no record was written"),
        (status = 409, description = "Reference used by a different request"),
        (status = 502, description = "Provider failed or its outcome is unknown")
    )
)]
async fn create_deposit() {}

/// Start a withdrawal
#[utoipa::path(
    post,
    path = "/api/withdrawals",
    tag = "transactions",
    request_body = CreateWithdrawalRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Withdrawal started", body = Transaction),
        (status = 400, description = "Validation failed; no record was written"),
        (status = 422, description = "Insufficient funds"),
        (status = 502, description = "Provider failed or its outcome is unknown")
    )
)]
async fn create_withdrawal() {}

/// List the caller's transactions, newest first
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    params(TransactionFilter),
    security(("user_id" = [])),
    responses((status = 200, description = "One page of transactions", body = TransactionPage))
)]
async fn list_transactions() {}

/// Get one of the caller's transactions
#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    tag = "transactions",
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Transaction", body = Transaction),
        (status = 404, description = "Not found")
    )
)]
async fn get_transaction() {}

/// Cancel a pending or processing transaction
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/cancel",
    tag = "transactions",
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    request_body(content = Option<CancelBody>),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Cancelled", body = Transaction),
        (status = 409, description = "Already terminal")
    )
)]
async fn cancel_transaction() {}

/// Poll the provider and apply what it reports
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/verify",
    tag = "transactions",
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Current record", body = Transaction),
        (status = 502, description = "Provider unreachable")
    )
)]
async fn verify_transaction() {}

/// Refund a completed deposit
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/refund",
    tag = "transactions",
    params(("id" = TransactionId, Path, description = "Deposit ID (UUID)")),
    request_body(content = Option<RefundBody>),
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Refund record", body = Transaction),
        (status = 400, description = "Not a deposit, or the gateway cannot refund"),
        (status = 409, description = "Deposit not completed")
    )
)]
async fn refund_transaction() {}

/// Per-currency balances
#[utoipa::path(
    get,
    path = "/api/balances",
    tag = "transactions",
    security(("user_id" = [])),
    responses((status = 200, description = "Balances", body = Vec<Balance>))
)]
async fn balances() {}

/// Completed activity for one UTC day
#[utoipa::path(
    get,
    path = "/api/summary/daily",
    tag = "transactions",
    params(DailySummaryQuery),
    security(("user_id" = [])),
    responses((status = 200, description = "Daily summary", body = DailySummary))
)]
async fn daily_summary() {}

/// Save a bank account
#[utoipa::path(
    post,
    path = "/api/bank-accounts",
    tag = "bank-accounts",
    request_body = CreateBankAccountRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Saved", body = BankAccount),
        (status = 400, description = "Invalid account details")
    )
)]
async fn create_bank_account() {}

/// List saved bank accounts
#[utoipa::path(
    get,
    path = "/api/bank-accounts",
    tag = "bank-accounts",
    params(BankAccountQuery),
    security(("user_id" = [])),
    responses((status = 200, description = "Bank accounts", body = Vec<BankAccount>))
)]
async fn list_bank_accounts() {}

/// Get a bank account
#[utoipa::path(
    get,
    path = "/api/bank-accounts/{id}",
    tag = "bank-accounts",
    params(("id" = BankAccountId, Path, description = "Bank account ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Bank account", body = BankAccount),
        (status = 404, description = "Not found")
    )
)]
async fn get_bank_account() {}

/// Update a bank account's verification flag
#[utoipa::path(
    patch,
    path = "/api/bank-accounts/{id}",
    tag = "bank-accounts",
    params(("id" = BankAccountId, Path, description = "Bank account ID (UUID)")),
    request_body = UpdateBankAccountRequest,
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Updated", body = BankAccount),
        (status = 404, description = "Not found")
    )
)]
async fn update_bank_account() {}

/// Delete a bank account
#[utoipa::path(
    delete,
    path = "/api/bank-accounts/{id}",
    tag = "bank-accounts",
    params(("id" = BankAccountId, Path, description = "Bank account ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
async fn delete_bank_account() {}

/// Make a bank account the default
#[utoipa::path(
    post,
    path = "/api/bank-accounts/{id}/default",
    tag = "bank-accounts",
    params(("id" = BankAccountId, Path, description = "Bank account ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "New default", body = BankAccount),
        (status = 404, description = "Not found")
    )
)]
async fn set_default_bank_account() {}

/// Save a payout destination
#[utoipa::path(
    post,
    path = "/api/withdrawal-methods",
    tag = "withdrawal-methods",
    request_body = CreateWithdrawalMethodRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Saved", body = WithdrawalMethodPreference),
        (status = 400, description = "Invalid destination")
    )
)]
async fn create_withdrawal_method() {}

/// List active payout destinations, default first
#[utoipa::path(
    get,
    path = "/api/withdrawal-methods",
    tag = "withdrawal-methods",
    security(("user_id" = [])),
    responses((status = 200, description = "Preferences", body = Vec<WithdrawalMethodPreference>))
)]
async fn list_withdrawal_methods() {}

/// Deactivate a payout destination
#[utoipa::path(
    delete,
    path = "/api/withdrawal-methods/{id}",
    tag = "withdrawal-methods",
    params(("id" = WithdrawalMethodId, Path, description = "Withdrawal method ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 204, description = "Deactivated"),
        (status = 404, description = "Not found")
    )
)]
async fn deactivate_withdrawal_method() {}

/// Make a payout destination the default
#[utoipa::path(
    post,
    path = "/api/withdrawal-methods/{id}/default",
    tag = "withdrawal-methods",
    params(("id" = WithdrawalMethodId, Path, description = "Withdrawal method ID (UUID)")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "New default", body = WithdrawalMethodPreference),
        (status = 404, description = "Not found")
    )
)]
async fn set_default_withdrawal_method() {}

/// Provider webhook intake
#[utoipa::path(
    post,
    path = "/api/webhooks/{gateway}",
    tag = "webhooks",
    params(("gateway" = String, Path, description = "Gateway code, e.g. `paystack`")),
    request_body(content = String, description = "Raw provider payload, verified against the provider's signature header"),
    responses(
        (status = 200, description = "Authenticated and acknowledged", body = WebhookAck),
        (status = 401, description = "Signature missing or invalid"),
        (status = 404, description = "Unknown gateway")
    )
)]
async fn provider_webhook() {}

/// Run one reconciliation pass now
#[utoipa::path(
    post,
    path = "/api/reconcile",
    tag = "operations",
    responses((status = 200, description = "Pass summary", body = ReconcileReport))
)]
async fn reconcile() {}

/// OpenAPI documentation for the Gateway API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payment Gateway API",
        version = "1.0.0",
        description = "Payment gateway abstraction and transaction ledger: deposits, withdrawals, refunds and provider webhooks across Paystack, Flutterwave, Stripe, M-Pesa and crypto.\n\n## Caller identity\n\nAuthentication is handled upstream. User-scoped endpoints read the authenticated user's id from the `X-User-Id` header:\n\n```\nX-User-Id: 123e4567-e89b-12d3-a456-426614174000\n```",
        license(name = "MIT"),
    ),
    paths(
        health,
        list_methods,
        get_method,
        list_regions,
        get_region,
        quote_fee,
        external_rate,
        create_deposit,
        create_withdrawal,
        list_transactions,
        get_transaction,
        cancel_transaction,
        verify_transaction,
        refund_transaction,
        balances,
        daily_summary,
        create_bank_account,
        list_bank_accounts,
        get_bank_account,
        update_bank_account,
        delete_bank_account,
        set_default_bank_account,
        create_withdrawal_method,
        list_withdrawal_methods,
        deactivate_withdrawal_method,
        set_default_withdrawal_method,
        provider_webhook,
        reconcile,
    ),
    components(
        schemas(
            PaymentMethod,
            RegionConfig,
            FeeSchedule,
            MethodType,
            Direction,
            Currency,
            FeeQuoteRequest,
            FeeQuoteResponse,
            ExternalRate,
            CreateDepositRequest,
            CreateWithdrawalRequest,
            DepositResponse,
            PayerDetails,
            Transaction,
            TransactionId,
            TransactionStatus,
            TransactionType,
            TransactionPage,
            CancelBody,
            RefundBody,
            Balance,
            DailySummary,
            DailyTotals,
            UserId,
            BankAccount,
            BankAccountId,
            CreateBankAccountRequest,
            UpdateBankAccountRequest,
            PayoutDestination,
            WithdrawalMethodKind,
            WithdrawalMethodId,
            WithdrawalMethodPreference,
            CreateWithdrawalMethodRequest,
            WebhookAck,
            WebhookOutcome,
            ReconcileReport,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "registry", description = "Payment method catalog, fee quotes and rates"),
        (name = "transactions", description = "Deposits, withdrawals, refunds and history"),
        (name = "bank-accounts", description = "Saved bank accounts"),
        (name = "withdrawal-methods", description = "Saved payout destinations"),
        (name = "webhooks", description = "Provider callbacks"),
        (name = "operations", description = "Reconciliation"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for the upstream-supplied caller header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-User-Id"))),
            );
        }
    }
}
