//! Transaction domain model and its state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use fee_rules::{Currency, MethodType};

use super::id::{UserId, uuid_id};
use super::withdrawal_method::PayoutDestination;

uuid_id!(
    /// Unique identifier for a Transaction.
    TransactionId
);

/// The type/direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money coming in from an external processor
    Deposit,
    /// Money leaving to an external destination
    Withdrawal,
    /// Money moving out to another party inside the platform
    Transfer,
    /// Credit granted by the platform itself
    Earned,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
            TransactionType::Earned => "earned",
        }
    }

    /// Whether a completed record of this type adds to the user's balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Earned)
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "transfer" => Ok(TransactionType::Transfer),
            "earned" => Ok(TransactionType::Earned),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// Lifecycle status of a ledger record.
///
/// ```text
/// pending ──► processing ──► completed | failed
///    │             │
///    ├──► completed | failed      (webhook beat the acknowledgement)
///    └─────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub const NON_TERMINAL: [TransactionStatus; 2] =
        [TransactionStatus::Pending, TransactionStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Whether the state machine defines an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "processing" => Ok(TransactionStatus::Processing),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

/// A durable ledger record.
///
/// Records are created `pending`, advanced only through [`Transaction::plan`]
/// and the ledger's compare-and-set update, and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    /// Idempotency key, unique across the ledger
    pub reference_id: String,
    pub transaction_type: TransactionType,
    /// Requested amount in major units
    pub amount: Decimal,
    pub currency: Currency,
    pub fee_amount: Decimal,
    /// `amount - fee_amount`
    pub net_amount: Decimal,
    pub status: TransactionStatus,
    /// Registry method the money moved through
    pub method_id: Option<String>,
    /// Adapter that processed the movement
    pub gateway: Option<String>,
    /// Provider-assigned id used for verification
    pub provider_reference: Option<String>,
    /// Rail used for a deposit
    pub deposit_method: Option<MethodType>,
    /// Payout destination for a withdrawal
    pub payout_destination: Option<PayoutDestination>,
    /// Wallet credited by a deposit, if the caller named one
    pub destination_wallet: Option<String>,
    /// Human-readable outcome
    pub description: Option<String>,
    /// Normalized provider payload, kept for audit
    #[schema(value_type = Option<Object>)]
    pub processor_response: Option<serde_json::Value>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped once, on the transition into `completed`
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of comparing a record against a requested status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// The edge exists; the ledger should write it.
    Apply,
    /// Nothing to write: the record already has that status or is terminal,
    /// or the state machine has no such edge.
    NoOp,
}

impl Transaction {
    /// Builds a fresh `pending` record.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        user_id: UserId,
        reference_id: String,
        transaction_type: TransactionType,
        amount: Decimal,
        currency: Currency,
        fee_amount: Decimal,
        method_id: Option<String>,
        gateway: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            user_id,
            reference_id,
            transaction_type,
            amount,
            currency,
            fee_amount,
            net_amount: amount - fee_amount,
            status: TransactionStatus::Pending,
            method_id,
            gateway,
            provider_reference: None,
            deposit_method: None,
            payout_destination: None,
            destination_wallet: None,
            description: None,
            processor_response: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Decides whether moving to `next` is a real transition.
    pub fn plan(&self, next: TransactionStatus) -> TransitionPlan {
        if self.status.can_transition_to(next) {
            TransitionPlan::Apply
        } else {
            TransitionPlan::NoOp
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Amount this record removes from the user's available balance while
    /// it is pending, processing, or completed.
    pub fn debit_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Withdrawal | TransactionType::Transfer => self.amount,
            TransactionType::Deposit | TransactionType::Earned => Decimal::ZERO,
        }
    }
}

/// Outcome of an idempotent create.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Transaction),
    /// A record with the same `reference_id` already existed.
    Existing(Transaction),
}

impl CreateOutcome {
    pub fn into_inner(self) -> Transaction {
        match self {
            CreateOutcome::Created(tx) | CreateOutcome::Existing(tx) => tx,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Fields written together with a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub provider_reference: Option<String>,
    pub processor_response: Option<serde_json::Value>,
    /// Replaces the stored metadata when set
    pub metadata: Option<serde_json::Value>,
}

impl StatusUpdate {
    pub fn to(status: TransactionStatus) -> Self {
        Self {
            status,
            description: None,
            provider_reference: None,
            processor_response: None,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_provider_reference(mut self, reference: impl Into<String>) -> Self {
        self.provider_reference = Some(reference.into());
        self
    }

    pub fn with_processor_response(mut self, response: serde_json::Value) -> Self {
        self.processor_response = Some(response);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Applies the update to an in-memory copy, mirroring what the ledger
    /// persists.
    pub fn apply_to(&self, tx: &mut Transaction, now: DateTime<Utc>) {
        tx.status = self.status;
        if let Some(description) = &self.description {
            tx.description = Some(description.clone());
        }
        if let Some(reference) = &self.provider_reference {
            tx.provider_reference = Some(reference.clone());
        }
        if let Some(response) = &self.processor_response {
            tx.processor_response = Some(response.clone());
        }
        if let Some(metadata) = &self.metadata {
            tx.metadata = metadata.clone();
        }
        if self.status == TransactionStatus::Completed && tx.completed_at.is_none() {
            tx.completed_at = Some(now);
        }
        tx.updated_at = now;
    }
}
