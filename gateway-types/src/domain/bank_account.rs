//! Bank account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use fee_rules::Currency;

use super::id::{UserId, uuid_id};
use crate::dto::CreateBankAccountRequest;
use crate::error::DomainError;

uuid_id!(
    /// Unique identifier for a BankAccount.
    BankAccountId
);

const MIN_ACCOUNT_NUMBER_DIGITS: usize = 10;

/// A user's saved bank account, usable as a payout destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub user_id: UserId,
    pub account_name: String,
    #[schema(example = "0123456789")]
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: Option<String>,
    pub account_holder_name: String,
    pub account_holder_phone: Option<String>,
    #[schema(example = "NG")]
    pub country_code: String,
    pub currency: Currency,
    /// At most one account per user carries this flag
    pub is_default: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankAccount {
    /// Validates a create request and builds an unverified, non-default account.
    ///
    /// # Validation
    /// - Name, number, bank, holder, and country are required
    /// - The account number holds at least ten digits and nothing else
    pub fn new(user_id: UserId, req: CreateBankAccountRequest) -> Result<Self, DomainError> {
        let required = [
            ("account_name", &req.account_name),
            ("account_number", &req.account_number),
            ("bank_name", &req.bank_name),
            ("account_holder_name", &req.account_holder_name),
            ("country_code", &req.country_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::ValidationError(format!("{} is required", field)));
            }
        }

        let number = req.account_number.trim();
        if !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::ValidationError(
                "account_number must contain digits only".into(),
            ));
        }
        if number.len() < MIN_ACCOUNT_NUMBER_DIGITS {
            return Err(DomainError::ValidationError(format!(
                "account_number must have at least {} digits",
                MIN_ACCOUNT_NUMBER_DIGITS
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: BankAccountId::new(),
            user_id,
            account_name: req.account_name.trim().to_string(),
            account_number: number.to_string(),
            bank_name: req.bank_name.trim().to_string(),
            bank_code: req.bank_code.filter(|c| !c.trim().is_empty()),
            account_holder_name: req.account_holder_name.trim().to_string(),
            account_holder_phone: req.account_holder_phone.filter(|p| !p.trim().is_empty()),
            country_code: req.country_code.trim().to_ascii_uppercase(),
            currency: req.currency,
            is_default: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Account number with all but the last four digits hidden.
    pub fn masked_number(&self) -> String {
        let visible = self.account_number.len().saturating_sub(4);
        format!(
            "{}{}",
            "*".repeat(visible),
            &self.account_number[visible..]
        )
    }
}
