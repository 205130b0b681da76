use rust_decimal::Decimal;

/// Errors raised while loading or validating the method catalog.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid payment method {id}: {reason}")]
    InvalidMethod { id: String, reason: String },

    #[error("Duplicate payment method id: {0}")]
    DuplicateMethod(String),

    #[error("Duplicate region config for country: {0}")]
    DuplicateRegion(String),

    #[error("Catalog parse error: {0}")]
    Catalog(#[from] serde_json::Error),
}

/// Errors raised by the fee calculator.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FeeError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    /// The method's withdrawal fee exceeds the amount. This is a catalog
    /// authoring defect, never a condition to clamp away.
    #[error("Fee {fee} exceeds amount {amount} for method {method_id}")]
    NegativeNet {
        method_id: String,
        amount: Decimal,
        fee: Decimal,
    },
}
