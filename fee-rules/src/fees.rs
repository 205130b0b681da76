//! Deterministic fee calculation.
//!
//! Both functions are pure: the same `(amount, method)` pair always yields
//! the same quote. Amounts are major units; results are rounded half away
//! from zero to the method currency's minor-unit precision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FeeError;
use crate::method::{FeeSchedule, PaymentMethod};

/// Fee breakdown for a deposit: `total` is `amount` grossed up by the fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DepositQuote {
    pub fee: Decimal,
    pub total: Decimal,
}

/// Fee breakdown for a withdrawal. The recipient receives `net`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WithdrawalQuote {
    pub fee: Decimal,
    pub net: Decimal,
}

fn compute_fee(amount: Decimal, schedule: &FeeSchedule) -> Decimal {
    let mut fee = Decimal::ZERO;
    if let Some(pct) = schedule.percentage {
        fee += amount * pct / Decimal::ONE_HUNDRED;
    }
    if let Some(flat) = schedule.flat {
        fee += flat;
    }
    fee
}

/// `fee = amount * pct / 100 + flat`, `total = amount + fee`.
pub fn deposit_fee(amount: Decimal, method: &PaymentMethod) -> Result<DepositQuote, FeeError> {
    if amount < Decimal::ZERO {
        return Err(FeeError::NegativeAmount);
    }
    let fee = method
        .currency
        .round(compute_fee(amount, &method.deposit_fee));
    Ok(DepositQuote {
        fee,
        total: amount + fee,
    })
}

/// `fee = amount * pct / 100 + flat`, `net = amount - fee`.
///
/// A negative `net` means the catalog entry is misconfigured and is reported
/// as [`FeeError::NegativeNet`].
pub fn withdrawal_fee(amount: Decimal, method: &PaymentMethod) -> Result<WithdrawalQuote, FeeError> {
    if amount < Decimal::ZERO {
        return Err(FeeError::NegativeAmount);
    }
    let fee = method
        .currency
        .round(compute_fee(amount, &method.withdrawal_fee));
    let net = amount - fee;
    if net < Decimal::ZERO {
        return Err(FeeError::NegativeNet {
            method_id: method.id.clone(),
            amount,
            fee,
        });
    }
    Ok(WithdrawalQuote { fee, net })
}
