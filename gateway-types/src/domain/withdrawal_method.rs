//! Payout destinations and saved withdrawal-method preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::bank_account::BankAccountId;
use super::id::{UserId, uuid_id};
use crate::dto::CreateWithdrawalMethodRequest;
use crate::error::DomainError;

uuid_id!(
    /// Unique identifier for a WithdrawalMethodPreference.
    WithdrawalMethodId
);

/// Discriminator for the kinds of payout destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMethodKind {
    BankAccount,
    Username,
    Email,
    MobileMoney,
}

impl WithdrawalMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalMethodKind::BankAccount => "bank_account",
            WithdrawalMethodKind::Username => "username",
            WithdrawalMethodKind::Email => "email",
            WithdrawalMethodKind::MobileMoney => "mobile_money",
        }
    }
}

impl std::fmt::Display for WithdrawalMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WithdrawalMethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_account" => Ok(WithdrawalMethodKind::BankAccount),
            "username" => Ok(WithdrawalMethodKind::Username),
            "email" => Ok(WithdrawalMethodKind::Email),
            "mobile_money" => Ok(WithdrawalMethodKind::MobileMoney),
            _ => Err(format!("Unknown withdrawal method kind: {}", s)),
        }
    }
}

/// Where a withdrawal's money goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutDestination {
    /// One of the user's saved bank accounts
    BankAccount { bank_account_id: BankAccountId },
    /// Another platform user, by handle
    Username { username: String },
    /// Another platform user, by email
    Email { email: String },
    /// A mobile-money wallet
    MobileMoney {
        phone: String,
        /// Operator name, e.g. `mpesa` or `mtn`
        provider: Option<String>,
    },
}

impl PayoutDestination {
    pub fn kind(&self) -> WithdrawalMethodKind {
        match self {
            PayoutDestination::BankAccount { .. } => WithdrawalMethodKind::BankAccount,
            PayoutDestination::Username { .. } => WithdrawalMethodKind::Username,
            PayoutDestination::Email { .. } => WithdrawalMethodKind::Email,
            PayoutDestination::MobileMoney { .. } => WithdrawalMethodKind::MobileMoney,
        }
    }

    /// Checks the recipient identity fields for the destination's kind.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            PayoutDestination::BankAccount { .. } => Ok(()),
            PayoutDestination::Username { username } => {
                let username = username.trim_start_matches('@');
                let valid = (3..=30).contains(&username.len())
                    && username
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                if valid {
                    Ok(())
                } else {
                    Err(DomainError::ValidationError(format!(
                        "Invalid username: {}",
                        username
                    )))
                }
            }
            PayoutDestination::Email { email } => {
                let valid = match email.split_once('@') {
                    Some((local, domain)) => {
                        !local.is_empty()
                            && domain.contains('.')
                            && !domain.starts_with('.')
                            && !domain.ends_with('.')
                            && !email.contains(char::is_whitespace)
                    }
                    None => false,
                };
                if valid {
                    Ok(())
                } else {
                    Err(DomainError::ValidationError(format!("Invalid email: {}", email)))
                }
            }
            PayoutDestination::MobileMoney { phone, .. } => {
                let digits = phone.strip_prefix('+').unwrap_or(phone);
                let valid = (9..=15).contains(&digits.len())
                    && digits.chars().all(|c| c.is_ascii_digit());
                if valid {
                    Ok(())
                } else {
                    Err(DomainError::ValidationError(format!(
                        "Invalid phone number: {}",
                        phone
                    )))
                }
            }
        }
    }

    /// Default label shown for a saved preference.
    pub fn default_display_name(&self) -> String {
        match self {
            PayoutDestination::BankAccount { .. } => "Bank account".to_string(),
            PayoutDestination::Username { username } => format!("@{}", username.trim_start_matches('@')),
            PayoutDestination::Email { email } => email.clone(),
            PayoutDestination::MobileMoney { phone, provider } => match provider {
                Some(p) => format!("{} {}", p, phone),
                None => phone.clone(),
            },
        }
    }
}

/// A saved, reusable payout destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WithdrawalMethodPreference {
    pub id: WithdrawalMethodId,
    pub user_id: UserId,
    pub destination: PayoutDestination,
    pub display_name: String,
    /// At most one active preference per user carries this flag
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl WithdrawalMethodPreference {
    /// Validates the destination and builds an active, non-default preference.
    pub fn new(user_id: UserId, req: CreateWithdrawalMethodRequest) -> Result<Self, DomainError> {
        req.destination.validate()?;
        let display_name = req
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| req.destination.default_display_name());
        let now = Utc::now();
        Ok(Self {
            id: WithdrawalMethodId::new(),
            user_id,
            destination: req.destination,
            display_name,
            is_default: false,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        })
    }

    pub fn kind(&self) -> WithdrawalMethodKind {
        self.destination.kind()
    }
}
