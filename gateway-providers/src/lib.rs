//! Provider adapters behind the `PaymentProvider` port.
//!
//! Each adapter converts between major-unit decimal amounts and the
//! processor's wire format, verifies its webhook signatures, and maps the
//! processor's statuses onto the ledger's lifecycle.

pub mod config;
pub mod crypto;
pub mod flutterwave;
pub mod http;
pub mod mpesa;
pub mod paystack;
pub mod registry;
pub mod signature;
pub mod stripe;
pub mod units;

pub use config::{ConfigError, ProvidersConfig};
pub use crypto::CryptoProvider;
pub use flutterwave::FlutterwaveProvider;
pub use mpesa::MpesaProvider;
pub use paystack::PaystackProvider;
pub use registry::ProviderRegistry;
pub use stripe::StripeProvider;
