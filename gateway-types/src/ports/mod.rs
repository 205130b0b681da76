//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The orchestrator depends on these traits, not concrete implementations.

mod exchange;
mod ledger;
mod provider;

pub use exchange::{ExchangeRateProvider, RateError};
pub use ledger::LedgerRepository;
pub use provider::PaymentProvider;
