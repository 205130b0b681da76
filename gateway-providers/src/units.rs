//! Conversions between ledger major units and provider wire amounts.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use fee_rules::Currency;
use gateway_types::ProviderError;

/// Major units to the currency's minor units (kobo, cents, satoshi).
///
/// Amounts finer than the currency's precision are refused rather than
/// rounded, so the provider never charges something other than the record.
pub fn to_minor(amount: Decimal, currency: Currency) -> Result<i64, ProviderError> {
    let factor = Decimal::from(10_i64.pow(currency.decimal_places().min(18)));
    let scaled = amount.checked_mul(factor).ok_or_else(|| {
        ProviderError::Rejected(format!("{} {} is out of range", amount, currency.code()))
    })?;
    if !scaled.fract().is_zero() {
        return Err(ProviderError::Rejected(format!(
            "{} {} has more precision than {} allows",
            amount,
            currency.code(),
            currency.minor_unit()
        )));
    }
    scaled.to_i64().ok_or_else(|| {
        ProviderError::Rejected(format!("{} {} is out of range", amount, currency.code()))
    })
}

/// Minor units back to major units.
pub fn from_minor(minor: i64, currency: Currency) -> Decimal {
    Decimal::new(minor, currency.decimal_places())
}

/// Whole major units, for rails that do not accept fractions (M-Pesa).
pub fn to_whole(amount: Decimal, currency: Currency) -> Result<i64, ProviderError> {
    if !amount.fract().is_zero() {
        return Err(ProviderError::Rejected(format!(
            "{} {} must be a whole amount",
            amount,
            currency.code()
        )));
    }
    amount.to_i64().ok_or_else(|| {
        ProviderError::Rejected(format!("{} {} is out of range", amount, currency.code()))
    })
}

/// Reads a decimal out of a JSON number or numeric string.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}
