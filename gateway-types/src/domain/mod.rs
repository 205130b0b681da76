//! Domain models for the payment gateway.

pub mod bank_account;
mod id;
pub mod payment;
pub mod transaction;
pub mod withdrawal_method;

pub use bank_account::{BankAccount, BankAccountId};
pub use id::UserId;
pub use payment::{
    InitializePayment, PayerDetails, PaymentInitialization, PayoutRecipient, PayoutRequest,
    ProcessorPayment, ProviderCapabilities, ProviderReceipt, RefundRequest, WebhookNotification,
};
pub use transaction::{
    CreateOutcome, StatusUpdate, Transaction, TransactionId, TransactionStatus, TransactionType,
    TransitionPlan,
};
pub use withdrawal_method::{
    PayoutDestination, WithdrawalMethodId, WithdrawalMethodKind, WithdrawalMethodPreference,
};
