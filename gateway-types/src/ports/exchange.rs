//! External rate lookup port.

use rust_decimal::Decimal;

use fee_rules::Currency;

/// Error type for rate lookups.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Rate service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Malformed rate response: {0}")]
    MalformedResponse(String),
}

/// Port trait for spot rates of assets the gateway accepts.
#[async_trait::async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// How many units of `fiat` one unit of `asset` is worth.
    ///
    /// `Ok(None)` means the source does not quote that pair.
    async fn rate(&self, asset: &str, fiat: Currency) -> Result<Option<Decimal>, RateError>;
}
