//! Column codecs shared by the SQLite and PostgreSQL adapters.

use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "postgres")]
use serde::de::DeserializeOwned;

use fee_rules::Currency;
use gateway_types::RepoError;

/// Every column of `transactions`, in row-struct order.
pub const TX_COLUMNS: &str = "id, user_id, reference_id, transaction_type, amount, currency, \
    fee_amount, net_amount, status, method_id, gateway, provider_reference, deposit_method, \
    payout_destination, destination_wallet, description, processor_response, metadata, \
    created_at, updated_at, completed_at";

pub const BANK_ACCOUNT_COLUMNS: &str = "id, user_id, account_name, account_number, bank_name, \
    bank_code, account_holder_name, account_holder_phone, country_code, currency, is_default, \
    is_verified, created_at, updated_at";

pub const WITHDRAWAL_METHOD_COLUMNS: &str = "id, user_id, destination, display_name, is_default, \
    is_active, created_at, updated_at, last_used_at";

pub fn db_err(e: impl Display) -> RepoError {
    RepoError::Database(e.to_string())
}

pub fn tx_err(e: impl Display) -> RepoError {
    RepoError::Transaction(e.to_string())
}

/// Parses a text column through the type's `FromStr`.
pub fn parse_column<T>(column: &str, raw: &str) -> Result<T, RepoError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| RepoError::Database(format!("column {}: {}", column, e)))
}

pub fn parse_currency(raw: &str) -> Result<Currency, RepoError> {
    parse_column("currency", raw)
}

#[cfg(feature = "postgres")]
pub fn from_json<T: DeserializeOwned>(column: &str, value: serde_json::Value) -> Result<T, RepoError> {
    serde_json::from_value(value)
        .map_err(|e| RepoError::Database(format!("column {}: {}", column, e)))
}

#[cfg(feature = "postgres")]
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RepoError> {
    serde_json::to_value(value).map_err(db_err)
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite text encodings
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub mod text {
    use chrono::{DateTime, SecondsFormat, Utc};
    use rust_decimal::Decimal;
    use serde::de::DeserializeOwned;

    use gateway_types::RepoError;

    use super::parse_column;

    /// Fixed-width UTC timestamps so that text comparison orders by time.
    pub fn ts(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse_ts(column: &str, raw: &str) -> Result<DateTime<Utc>, RepoError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepoError::Database(format!("column {}: {}", column, e)))
    }

    pub fn parse_opt_ts(column: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, RepoError> {
        raw.map(|s| parse_ts(column, &s)).transpose()
    }

    pub fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepoError> {
        parse_column::<Decimal>(column, raw)
    }

    pub fn parse_json_text<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, RepoError> {
        serde_json::from_str(raw)
            .map_err(|e| RepoError::Database(format!("column {}: {}", column, e)))
    }

    pub fn json_text<T: serde::Serialize>(value: &T) -> Result<String, RepoError> {
        serde_json::to_string(value).map_err(super::db_err)
    }
}
