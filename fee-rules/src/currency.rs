//! Currencies handled by the gateway, generated from a single table.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::RegistryError;

/// Defines the `Currency` enum together with its metadata accessors.
///
/// # Syntax
/// ```ignore
/// define_currencies! {
///     Name => ("CODE", "SYMBOL", "minor_unit", decimal_places, is_crypto),
/// }
/// ```
macro_rules! define_currencies {
    (
        $(
            $name:ident => ($code:literal, $symbol:literal, $minor:literal, $places:expr, $crypto:expr)
        ),* $(,)?
    ) => {
        /// ISO-4217 (or ticker, for crypto assets) currency code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum Currency {
            $($name),*
        }

        impl Currency {
            pub fn code(&self) -> &'static str {
                match self {
                    $(Currency::$name => $code),*
                }
            }

            pub fn symbol(&self) -> &'static str {
                match self {
                    $(Currency::$name => $symbol),*
                }
            }

            /// Name of the smallest denomination (kobo, cent, satoshi, ...).
            pub fn minor_unit(&self) -> &'static str {
                match self {
                    $(Currency::$name => $minor),*
                }
            }

            /// Number of decimal places of the minor unit.
            pub fn decimal_places(&self) -> u32 {
                match self {
                    $(Currency::$name => $places),*
                }
            }

            pub fn is_crypto(&self) -> bool {
                match self {
                    $(Currency::$name => $crypto),*
                }
            }

            pub fn all() -> &'static [Currency] {
                &[$(Currency::$name),*]
            }
        }

        impl std::str::FromStr for Currency {
            type Err = RegistryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($code => Ok(Currency::$name),)*
                    _ => Err(RegistryError::UnknownCurrency(s.to_string())),
                }
            }
        }
    };
}

define_currencies! {
    NGN => ("NGN", "₦", "kobo", 2, false),
    KES => ("KES", "KSh", "cent", 2, false),
    GHS => ("GHS", "GH₵", "pesewa", 2, false),
    ZAR => ("ZAR", "R", "cent", 2, false),
    INR => ("INR", "₹", "paisa", 2, false),
    PHP => ("PHP", "₱", "sentimo", 2, false),
    USD => ("USD", "$", "cent", 2, false),
    BTC => ("BTC", "₿", "satoshi", 8, true),
    ETH => ("ETH", "Ξ", "wei", 18, true),
}

impl Currency {
    /// Rounds a major-unit amount to this currency's minor-unit precision,
    /// half away from zero.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.decimal_places(), RoundingStrategy::MidpointAwayFromZero)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("ngn".parse::<Currency>().unwrap(), Currency::NGN);
        assert_eq!("BTC".parse::<Currency>().unwrap(), Currency::BTC);
        assert!(matches!(
            "XYZ".parse::<Currency>(),
            Err(RegistryError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(Currency::KES.to_string(), "KES");
    }

    #[test]
    fn test_rounding_uses_minor_unit_precision() {
        assert_eq!(Currency::USD.round(dec!(30.125)), dec!(30.13));
        assert_eq!(Currency::NGN.round(dec!(0.004)), dec!(0.00));
        assert_eq!(Currency::BTC.round(dec!(0.000000015)), dec!(0.00000002));
    }

    #[test]
    fn test_crypto_flags() {
        assert!(Currency::ETH.is_crypto());
        assert!(!Currency::ZAR.is_crypto());
        assert_eq!(Currency::all().len(), 9);
    }
}
