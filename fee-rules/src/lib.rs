//! Payment Method Catalog and Fee Rules
//!
//! This library holds the static, read-only description of every payment
//! method the gateway can route: which countries offer it, which directions
//! (deposit / withdrawal) it supports, its amount bounds, and its fee formula.
//!
//! The registry is built once at process start (from the built-in catalog or
//! a JSON catalog file) and then shared across all requests without locking.
//!
//! # Example
//! ```
//! use fee_rules::{FeeRulesRegistry, deposit_fee};
//! use rust_decimal_macros::dec;
//!
//! let registry = FeeRulesRegistry::builtin().unwrap();
//! let method = registry.method("paystack_ng").unwrap();
//!
//! let quote = deposit_fee(dec!(1000), method).unwrap();
//! assert_eq!(quote.fee, dec!(15.00));
//! assert_eq!(quote.total, dec!(1015.00));
//! ```

mod catalog;
mod currency;
mod error;
mod fees;
mod method;
mod registry;

pub use currency::Currency;
pub use error::{FeeError, RegistryError};
pub use fees::{DepositQuote, WithdrawalQuote, deposit_fee, withdrawal_fee};
pub use method::{Direction, FeeSchedule, MethodType, PaymentMethod};
pub use registry::{FeeRulesRegistry, RegionConfig, RegionSpec, UNIVERSAL_COUNTRY};
