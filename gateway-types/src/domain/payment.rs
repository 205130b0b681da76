//! Normalized payloads exchanged with provider adapters.
//!
//! Everything here is in major units. Adapters convert to and from a
//! provider's minor units internally.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use fee_rules::Currency;

use super::transaction::TransactionStatus;
use super::withdrawal_method::WithdrawalMethodKind;

/// A provider's view of a payment, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessorPayment {
    /// Provider-assigned identifier
    pub id: String,
    /// Our reference (the ledger's `reference_id`)
    pub reference: String,
    pub status: TransactionStatus,
    /// `None` when the provider's status call does not echo the amount
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub fee: Option<Decimal>,
    pub description: Option<String>,
    /// Retained for audit, never interpreted by the ledger
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

/// Who is paying, as far as a provider needs to know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayerDetails {
    #[schema(example = "ada@example.com")]
    pub email: Option<String>,
    #[schema(example = "+254712345678")]
    pub phone: Option<String>,
    pub name: Option<String>,
}

/// Input to [`PaymentProvider::initialize_payment`](crate::ports::PaymentProvider::initialize_payment).
#[derive(Debug, Clone, PartialEq)]
pub struct InitializePayment {
    pub reference: String,
    pub amount: Decimal,
    pub currency: Currency,
    /// Where the provider should send the payer back to
    pub callback_url: Option<String>,
    pub payer: PayerDetails,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

/// What a provider handed back when a payment was started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentInitialization {
    /// Checkout URL, client secret, or deposit address, depending on the rail.
    /// Push-style rails (STK push) have none.
    pub redirect_target: Option<String>,
    pub provider_reference: String,
    /// After this instant the payment can no longer be completed
    pub expires_at: Option<DateTime<Utc>>,
    /// Status the ledger record moves to now the provider has accepted it
    pub acknowledged_status: TransactionStatus,
    /// Provider-specific extras worth keeping for audit
    #[schema(value_type = Object)]
    pub provider_data: serde_json::Value,
}

/// A payout destination resolved to the fields a provider needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutRecipient {
    BankAccount {
        account_number: String,
        bank_code: Option<String>,
        bank_name: String,
        account_name: String,
        country_code: String,
    },
    MobileMoney {
        phone: String,
        provider: Option<String>,
    },
}

impl PayoutRecipient {
    pub fn kind(&self) -> WithdrawalMethodKind {
        match self {
            PayoutRecipient::BankAccount { .. } => WithdrawalMethodKind::BankAccount,
            PayoutRecipient::MobileMoney { .. } => WithdrawalMethodKind::MobileMoney,
        }
    }
}

/// Input to [`PaymentProvider::payout`](crate::ports::PaymentProvider::payout).
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRequest {
    pub reference: String,
    /// Amount the recipient receives (the record's net amount)
    pub amount: Decimal,
    pub currency: Currency,
    pub recipient: PayoutRecipient,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
}

/// Input to [`PaymentProvider::refund`](crate::ports::PaymentProvider::refund).
#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    pub provider_reference: String,
    pub reference: String,
    /// `None` refunds the full amount
    pub amount: Option<Decimal>,
    pub currency: Currency,
}

/// Provider acknowledgement of a refund or payout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReceipt {
    pub provider_reference: String,
    pub status: TransactionStatus,
    pub raw: serde_json::Value,
}

/// A verified webhook, normalized by its adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotification {
    /// Event name as the provider sent it
    pub event: String,
    /// Our reference, when the provider echoes it
    pub reference: Option<String>,
    pub provider_reference: Option<String>,
    /// `None` for events that do not move the state machine
    pub status: Option<TransactionStatus>,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub fee: Option<Decimal>,
    pub payload: serde_json::Value,
}

/// What an adapter can do beyond initialize and verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub refund: bool,
    pub payout: bool,
    /// Payer email is mandatory for initialize
    pub requires_email: bool,
    /// Payer phone is mandatory for initialize
    pub requires_phone: bool,
    pub payout_kinds: Vec<WithdrawalMethodKind>,
}

impl ProviderCapabilities {
    pub fn supports_payout_to(&self, kind: WithdrawalMethodKind) -> bool {
        self.payout && self.payout_kinds.contains(&kind)
    }
}
