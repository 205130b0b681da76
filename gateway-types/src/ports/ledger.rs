//! Ledger repository port.
//!
//! This is the primary storage port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory mocks) implement this trait.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    BankAccount, BankAccountId, CreateOutcome, StatusUpdate, Transaction, TransactionId,
    TransactionStatus, UserId, WithdrawalMethodId, WithdrawalMethodPreference,
};
use crate::dto::{Balance, DailySummary, TransactionFilter, TransactionPage};
use crate::error::RepoError;

/// The storage port for ledger records and payout destinations.
///
/// Status changes are compare-and-set on the current status so that racing
/// writers (webhook vs. verification vs. cancel) resolve to a single winner.
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction Records
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a `pending` record unless its `reference_id` already exists.
    ///
    /// When another record holds the reference, that record is returned as
    /// [`CreateOutcome::Existing`] and nothing is written. For withdrawals and
    /// transfers the available balance is checked in the same atomic unit as
    /// the insert; a shortfall fails with `DomainError::InsufficientFunds`.
    async fn create_transaction(&self, tx: Transaction) -> Result<CreateOutcome, RepoError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError>;

    async fn find_by_reference(&self, reference_id: &str)
    -> Result<Option<Transaction>, RepoError>;

    /// Looks a record up by the id its gateway assigned.
    async fn find_by_provider_reference(
        &self,
        gateway: &str,
        provider_reference: &str,
    ) -> Result<Option<Transaction>, RepoError>;

    /// Lists a user's records, newest first.
    async fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<TransactionPage, RepoError>;

    /// Writes `update` only if the record's status is still `expected`.
    ///
    /// Returns the updated record, or `None` when the status had already
    /// moved on. `completed_at` is stamped only when entering `completed`
    /// for the first time.
    async fn transition_status(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Option<Transaction>, RepoError>;

    /// Replaces description and metadata without touching the status.
    async fn annotate_transaction(
        &self,
        id: TransactionId,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(), RepoError>;

    /// Pending and processing records created before `created_before`,
    /// oldest first. Records already flagged `escalated` in their metadata
    /// sort after every unflagged one, so they cannot crowd newer records
    /// out of a bounded batch.
    async fn list_non_terminal(
        &self,
        created_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transaction>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Balances & Summaries
    // ─────────────────────────────────────────────────────────────────────────────

    async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, RepoError>;

    async fn daily_summary(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<DailySummary, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Bank Accounts
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_bank_account(&self, account: BankAccount) -> Result<BankAccount, RepoError>;

    async fn get_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<Option<BankAccount>, RepoError>;

    /// Default account first, then newest.
    async fn list_bank_accounts(
        &self,
        user_id: UserId,
        country_code: Option<&str>,
    ) -> Result<Vec<BankAccount>, RepoError>;

    async fn set_bank_account_verified(
        &self,
        user_id: UserId,
        id: BankAccountId,
        verified: bool,
    ) -> Result<BankAccount, RepoError>;

    async fn delete_bank_account(&self, user_id: UserId, id: BankAccountId)
    -> Result<(), RepoError>;

    /// Clears the old default and sets the new one in one atomic unit.
    async fn set_default_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<BankAccount, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Withdrawal Method Preferences
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_withdrawal_method(
        &self,
        method: WithdrawalMethodPreference,
    ) -> Result<WithdrawalMethodPreference, RepoError>;

    async fn get_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<Option<WithdrawalMethodPreference>, RepoError>;

    /// Active preferences, default first, then most recently used.
    async fn list_withdrawal_methods(
        &self,
        user_id: UserId,
    ) -> Result<Vec<WithdrawalMethodPreference>, RepoError>;

    /// Clears the old default and sets the new one in one atomic unit.
    async fn set_default_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<WithdrawalMethodPreference, RepoError>;

    /// Stamps `last_used_at`.
    async fn touch_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<(), RepoError>;

    /// Marks a preference inactive; it also stops being the default.
    async fn deactivate_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<(), RepoError>;
}
