//! Payment method catalog entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::currency::Currency;
use crate::error::RegistryError;

/// Kind of payment rail a method uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MethodType {
    Bank,
    Mobile,
    Ewallet,
    Card,
    Crypto,
}

impl std::fmt::Display for MethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodType::Bank => write!(f, "bank"),
            MethodType::Mobile => write!(f, "mobile"),
            MethodType::Ewallet => write!(f, "ewallet"),
            MethodType::Card => write!(f, "card"),
            MethodType::Crypto => write!(f, "crypto"),
        }
    }
}

impl std::str::FromStr for MethodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bank" => Ok(MethodType::Bank),
            "mobile" => Ok(MethodType::Mobile),
            "ewallet" => Ok(MethodType::Ewallet),
            "card" => Ok(MethodType::Card),
            "crypto" => Ok(MethodType::Crypto),
            _ => Err(format!("Unknown method type: {}", s)),
        }
    }
}

/// Direction of a money movement relative to the user's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Withdrawal,
}

/// Fee formula: `amount * percentage / 100 + flat`. Either term may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeeSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat: Option<Decimal>,
}

impl FeeSchedule {
    pub const FREE: FeeSchedule = FeeSchedule {
        percentage: None,
        flat: None,
    };

    pub fn percentage(pct: Decimal) -> Self {
        Self {
            percentage: Some(pct),
            flat: None,
        }
    }

    pub fn flat(flat: Decimal) -> Self {
        Self {
            percentage: None,
            flat: Some(flat),
        }
    }

    pub fn mixed(pct: Decimal, flat: Decimal) -> Self {
        Self {
            percentage: Some(pct),
            flat: Some(flat),
        }
    }
}

/// A catalog entry describing one way to move money in or out.
///
/// Entries are immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethod {
    /// Stable identifier, e.g. `mpesa_ke`
    pub id: String,
    pub region: String,
    /// ISO-3166 alpha-2 code, or `XX` for methods available everywhere
    pub country_code: String,
    pub country_name: String,
    pub method_type: MethodType,
    pub provider_code: String,
    pub provider_name: String,
    /// Adapter that processes this method. `None` means the method is
    /// listed for display but cannot be routed.
    #[serde(default)]
    pub gateway: Option<String>,
    pub currency: Currency,
    pub deposit_enabled: bool,
    pub withdrawal_enabled: bool,
    /// Lower bound in major units, inclusive
    pub min_amount: Decimal,
    /// Upper bound in major units, inclusive
    pub max_amount: Decimal,
    #[serde(default)]
    pub deposit_fee: FeeSchedule,
    #[serde(default)]
    pub withdrawal_fee: FeeSchedule,
    pub processing_time_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PaymentMethod {
    /// Checks the authoring invariants of a catalog entry.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidMethod {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id cannot be empty"));
        }
        if !self.deposit_enabled && !self.withdrawal_enabled {
            return Err(invalid("at least one of deposit or withdrawal must be enabled"));
        }
        if self.min_amount < Decimal::ZERO {
            return Err(invalid("min_amount cannot be negative"));
        }
        if self.min_amount > self.max_amount {
            return Err(invalid("min_amount exceeds max_amount"));
        }
        for schedule in [&self.deposit_fee, &self.withdrawal_fee] {
            let negative = schedule.percentage.is_some_and(|p| p < Decimal::ZERO)
                || schedule.flat.is_some_and(|f| f < Decimal::ZERO);
            if negative {
                return Err(invalid("fee fields cannot be negative"));
            }
        }
        Ok(())
    }

    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Deposit => self.deposit_enabled,
            Direction::Withdrawal => self.withdrawal_enabled,
        }
    }

    /// Whether `amount` lies within `[min_amount, max_amount]`.
    pub fn accepts_amount(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }

    pub fn fee_schedule(&self, direction: Direction) -> &FeeSchedule {
        match direction {
            Direction::Deposit => &self.deposit_fee,
            Direction::Withdrawal => &self.withdrawal_fee,
        }
    }
}
