//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use fee_rules::{Currency, Direction, MethodType};

use crate::domain::{
    PayerDetails, PaymentInitialization, PayoutDestination, Transaction, TransactionStatus,
    TransactionType, WithdrawalMethodId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Deposit / Withdrawal DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to start a deposit through a registry payment method.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDepositRequest {
    /// Registry method id
    #[schema(example = "paystack_ng")]
    pub method_id: String,
    /// Amount in major units of the method's currency
    #[schema(value_type = String, example = "1000.00")]
    pub amount: Decimal,
    /// Idempotency key. Generated (`DEP-…`) when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Wallet to credit once the deposit completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_wallet: Option<String>,
    #[serde(default)]
    pub payer: PayerDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// Request to start a withdrawal.
///
/// Exactly one of `destination` and `withdrawal_method_id` must be given.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateWithdrawalRequest {
    #[schema(example = "access_bank_ng")]
    pub method_id: String,
    /// Amount debited from the user's balance, in major units
    #[schema(value_type = String, example = "5000.00")]
    pub amount: Decimal,
    /// Idempotency key. Generated (`WD-…`) when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PayoutDestination>,
    /// A saved withdrawal-method preference to pay out to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_method_id: Option<WithdrawalMethodId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// A deposit record plus what the payer needs to finish paying.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepositResponse {
    pub transaction: Transaction,
    /// Checkout URL, client secret, or deposit address
    pub redirect_target: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DepositResponse {
    /// Rebuilds the response from a stored record.
    ///
    /// The provider's initialization is kept in `processor_response` until a
    /// later provider event replaces it.
    pub fn from_transaction(transaction: Transaction) -> Self {
        let init = transaction
            .processor_response
            .clone()
            .and_then(|v| serde_json::from_value::<PaymentInitialization>(v).ok());
        let (redirect_target, expires_at) = match init {
            Some(init) => (init.redirect_target, init.expires_at),
            None => (None, None),
        };
        Self {
            transaction,
            redirect_target,
            expires_at,
        }
    }
}

/// Request to refund a completed deposit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RefundBody {
    /// Partial amount; the full amount when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Request to cancel a non-terminal record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CancelBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// History & Balance DTOs
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filters for listing a user's transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// Inclusive lower bound on `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// Page size, default 50, capped at 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl TransactionFilter {
    /// Effective page size.
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Whether a record passes every filter. Paging is not applied.
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.status.is_none_or(|s| tx.status == s)
            && self.transaction_type.is_none_or(|t| tx.transaction_type == t)
            && self.from.is_none_or(|from| tx.created_at >= from)
            && self.to.is_none_or(|to| tx.created_at < to)
    }
}

/// One page of a user's transactions, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    /// Matching records across all pages
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// A user's balance in one currency, reconstructed from ledger records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Balance {
    pub currency: Currency,
    /// Completed credits minus withdrawals that have not failed or been cancelled
    #[schema(value_type = String)]
    pub available: Decimal,
    /// Net amount of deposits not yet settled
    #[schema(value_type = String)]
    pub pending_deposits: Decimal,
}

impl Balance {
    pub fn zero(currency: Currency) -> Self {
        Self {
            currency,
            available: Decimal::ZERO,
            pending_deposits: Decimal::ZERO,
        }
    }

    /// Folds one record into the balance.
    pub fn apply(&mut self, tx: &Transaction) {
        use TransactionStatus::*;
        match (tx.transaction_type.is_credit(), tx.status) {
            (true, Completed) => self.available += tx.net_amount,
            (true, Pending | Processing) => self.pending_deposits += tx.net_amount,
            (_, Failed | Cancelled) => {}
            (false, Pending | Processing | Completed) => self.available -= tx.debit_amount(),
        }
    }

    /// Per-currency balances over a set of records, sorted by currency code.
    pub fn from_transactions<'a>(txs: impl IntoIterator<Item = &'a Transaction>) -> Vec<Balance> {
        let mut by_currency: std::collections::BTreeMap<&'static str, Balance> =
            std::collections::BTreeMap::new();
        for tx in txs {
            by_currency
                .entry(tx.currency.code())
                .or_insert_with(|| Balance::zero(tx.currency))
                .apply(tx);
        }
        by_currency.into_values().collect()
    }
}

/// Completed activity for one user on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub totals: Vec<DailyTotals>,
}

/// Completed activity in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyTotals {
    pub currency: Currency,
    pub deposit_count: u32,
    #[schema(value_type = String)]
    pub deposit_total: Decimal,
    pub withdrawal_count: u32,
    #[schema(value_type = String)]
    pub withdrawal_total: Decimal,
    #[schema(value_type = String)]
    pub fee_total: Decimal,
}

impl DailySummary {
    /// Summarizes the records completed on `date`.
    pub fn from_transactions<'a>(
        date: NaiveDate,
        txs: impl IntoIterator<Item = &'a Transaction>,
    ) -> Self {
        let mut by_currency: std::collections::BTreeMap<&'static str, DailyTotals> =
            std::collections::BTreeMap::new();
        for tx in txs {
            let completed_on = tx.completed_at.map(|at| at.date_naive());
            if tx.status != TransactionStatus::Completed || completed_on != Some(date) {
                continue;
            }
            let totals = by_currency
                .entry(tx.currency.code())
                .or_insert_with(|| DailyTotals {
                    currency: tx.currency,
                    deposit_count: 0,
                    deposit_total: Decimal::ZERO,
                    withdrawal_count: 0,
                    withdrawal_total: Decimal::ZERO,
                    fee_total: Decimal::ZERO,
                });
            match tx.transaction_type {
                TransactionType::Deposit => {
                    totals.deposit_count += 1;
                    totals.deposit_total += tx.amount;
                }
                TransactionType::Withdrawal => {
                    totals.withdrawal_count += 1;
                    totals.withdrawal_total += tx.amount;
                }
                TransactionType::Transfer | TransactionType::Earned => continue,
            }
            totals.fee_total += tx.fee_amount;
        }
        Self {
            date,
            totals: by_currency.into_values().collect(),
        }
    }
}

/// Query for the daily summary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailySummaryQuery {
    /// UTC date, `YYYY-MM-DD`; today when omitted
    pub date: Option<NaiveDate>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Bank Account & Withdrawal Method DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to save a bank account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBankAccountRequest {
    #[schema(example = "Ada Obi")]
    pub account_name: String,
    #[schema(example = "0123456789")]
    pub account_number: String,
    #[schema(example = "Access Bank")]
    pub bank_name: String,
    #[serde(default)]
    #[schema(example = "044")]
    pub bank_code: Option<String>,
    pub account_holder_name: String,
    #[serde(default)]
    pub account_holder_phone: Option<String>,
    #[schema(example = "NG")]
    pub country_code: String,
    pub currency: Currency,
}

/// Request to change a bank account's verification flag.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateBankAccountRequest {
    pub is_verified: bool,
}

/// Query for listing bank accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BankAccountQuery {
    /// ISO country code filter
    pub country: Option<String>,
}

/// Request to save a payout destination for reuse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateWithdrawalMethodRequest {
    pub destination: PayoutDestination,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Make this the user's default preference
    #[serde(default)]
    pub make_default: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry & Quote DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for listing registry methods.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MethodsQuery {
    /// ISO country code
    pub country: String,
    /// Restrict to one method type
    pub method_type: Option<MethodType>,
}

/// Request for a fee quote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeeQuoteRequest {
    #[schema(example = "paystack_ng")]
    pub method_id: String,
    #[schema(value_type = String, example = "1000")]
    pub amount: Decimal,
    pub direction: Direction,
}

/// Fee quote for a method and amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeeQuoteResponse {
    pub method_id: String,
    pub direction: Direction,
    pub currency: Currency,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub fee: Decimal,
    /// Deposits only: amount plus fee
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub total: Option<Decimal>,
    /// Withdrawals only: amount minus fee
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub net: Option<Decimal>,
}

/// Query for an external crypto rate.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RateQuery {
    /// Asset symbol, e.g. `BTC`
    pub asset: String,
    pub fiat: Currency,
}

/// A spot rate from an external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExternalRate {
    pub asset: String,
    pub fiat: Currency,
    #[schema(value_type = String)]
    pub rate: Decimal,
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook & Reconciliation DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// What a verified webhook did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The record moved to a new status
    Applied,
    /// The record already had that status or was terminal
    Duplicate,
    /// The event does not move the state machine
    Ignored,
    /// No record matches the event's reference
    UnknownReference,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconcileReport {
    /// Stale records looked at
    pub examined: u32,
    /// Records moved to a terminal or processing status
    pub resolved: u32,
    /// Records flagged for manual follow-up
    pub escalated: u32,
    /// Records the provider still reports as unsettled
    pub still_pending: u32,
    /// Records whose provider could not be reached
    pub errors: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use rust_decimal_macros::dec;

    fn tx(kind: TransactionType, status: TransactionStatus, amount: Decimal, fee: Decimal) -> Transaction {
        let mut tx = Transaction::pending(
            UserId::new(),
            format!("REF-{}", uuid::Uuid::new_v4()),
            kind,
            amount,
            Currency::NGN,
            fee,
            None,
            None,
        );
        tx.status = status;
        if status == TransactionStatus::Completed {
            tx.completed_at = Some(tx.created_at);
        }
        tx
    }

    #[test]
    fn test_filter_limit_defaults_and_caps() {
        let mut filter = TransactionFilter::default();
        assert_eq!(filter.limit(), 50);
        filter.limit = Some(500);
        assert_eq!(filter.limit(), 100);
        filter.limit = Some(0);
        assert_eq!(filter.limit(), 1);
    }

    #[test]
    fn test_filter_matches_status_and_type() {
        let filter = TransactionFilter {
            status: Some(TransactionStatus::Completed),
            transaction_type: Some(TransactionType::Deposit),
            ..Default::default()
        };
        let done = tx(TransactionType::Deposit, TransactionStatus::Completed, dec!(10), dec!(0));
        let pending = tx(TransactionType::Deposit, TransactionStatus::Pending, dec!(10), dec!(0));
        assert!(filter.matches(&done));
        assert!(!filter.matches(&pending));
    }

    #[test]
    fn test_balance_reconstruction() {
        let records = vec![
            tx(TransactionType::Deposit, TransactionStatus::Completed, dec!(1000), dec!(15)),
            tx(TransactionType::Earned, TransactionStatus::Completed, dec!(50), dec!(0)),
            tx(TransactionType::Deposit, TransactionStatus::Pending, dec!(200), dec!(3)),
            tx(TransactionType::Withdrawal, TransactionStatus::Processing, dec!(300), dec!(10)),
            tx(TransactionType::Withdrawal, TransactionStatus::Failed, dec!(400), dec!(10)),
            tx(TransactionType::Deposit, TransactionStatus::Failed, dec!(999), dec!(0)),
        ];
        let balances = Balance::from_transactions(&records);
        assert_eq!(balances.len(), 1);
        // 985 + 50 - 300
        assert_eq!(balances[0].available, dec!(735));
        assert_eq!(balances[0].pending_deposits, dec!(197));
    }

    #[test]
    fn test_daily_summary_counts_completed_only() {
        let done = tx(TransactionType::Deposit, TransactionStatus::Completed, dec!(1000), dec!(15));
        let date = done.created_at.date_naive();
        let records = vec![
            done,
            tx(TransactionType::Withdrawal, TransactionStatus::Completed, dec!(100), dec!(5)),
            tx(TransactionType::Deposit, TransactionStatus::Pending, dec!(70), dec!(0)),
        ];
        let summary = DailySummary::from_transactions(date, &records);
        assert_eq!(summary.totals.len(), 1);
        let totals = &summary.totals[0];
        assert_eq!(totals.deposit_count, 1);
        assert_eq!(totals.deposit_total, dec!(1000));
        assert_eq!(totals.withdrawal_count, 1);
        assert_eq!(totals.fee_total, dec!(20));
    }

    #[test]
    fn test_deposit_response_reads_initialization() {
        let mut record = tx(TransactionType::Deposit, TransactionStatus::Processing, dec!(10), dec!(0));
        let init = PaymentInitialization {
            redirect_target: Some("https://checkout.example/abc".into()),
            provider_reference: "abc".into(),
            expires_at: None,
            acknowledged_status: TransactionStatus::Processing,
            provider_data: serde_json::json!({}),
        };
        record.processor_response = Some(serde_json::to_value(&init).unwrap());
        let response = DepositResponse::from_transaction(record);
        assert_eq!(
            response.redirect_target.as_deref(),
            Some("https://checkout.example/abc")
        );
    }
}
