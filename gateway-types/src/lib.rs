//! # Gateway Types
//!
//! Domain types and port traits for the payment gateway and transaction
//! ledger. This crate has ZERO IO dependencies - only data structures,
//! state-machine rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate is the **innermost core** of the hexagonal architecture:
//! - `domain/` - Transactions, bank accounts, withdrawal preferences, and
//!   the normalized provider payloads
//! - `ports/` - Traits implemented by the ledger storage, the provider
//!   adapters, and the rate lookup
//! - `dto/` - Request/response types for the API boundary
//! - `error/` - Domain, repository, provider, and application errors

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

pub use domain::{
    BankAccount, BankAccountId, CreateOutcome, InitializePayment, PayerDetails,
    PaymentInitialization, PayoutDestination, PayoutRecipient, PayoutRequest, ProcessorPayment,
    ProviderCapabilities, ProviderReceipt, RefundRequest, StatusUpdate, Transaction,
    TransactionId, TransactionStatus, TransactionType, TransitionPlan, UserId, WebhookNotification,
    WithdrawalMethodId, WithdrawalMethodKind, WithdrawalMethodPreference,
};
pub use dto::*;
pub use error::{AppError, DomainError, ProviderError, RepoError};
pub use fee_rules::Currency;
pub use ports::{ExchangeRateProvider, LedgerRepository, PaymentProvider, RateError};
