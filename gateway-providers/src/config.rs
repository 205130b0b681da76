//! Provider credentials and HTTP settings, loaded from the environment.
//!
//! Every adapter is optional: a provider whose credential variable is unset
//! is simply not configured. Secrets are redacted from `Debug` output.

use std::fmt;

/// Errors raised while reading provider configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set when {1} is set")]
    Missing(&'static str, &'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_required(name: &'static str, because: &'static str) -> Result<String, ConfigError> {
    env_opt(name).ok_or(ConfigError::Missing(name, because))
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_opt(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            reason: format!("cannot parse {:?}", raw),
        }),
        None => Ok(default),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Transport settings shared by every adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Retries after the first attempt, for 429, 5xx, and network errors
    pub max_retries: u32,
    /// Base of the exponential backoff between retries, in milliseconds
    pub backoff_base_ms: u64,
}

impl HttpSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1000,
        }
    }

    /// Reads `{PREFIX}_BASE_URL`, `{PREFIX}_TIMEOUT_SECS`, `{PREFIX}_MAX_RETRIES`.
    fn from_env(
        base_var: &'static str,
        timeout_var: &'static str,
        retries_var: &'static str,
        default_base: &str,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::new(default_base);
        Ok(Self {
            base_url: env_opt(base_var)
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: env_parse(timeout_var, defaults.timeout_secs)?,
            max_retries: env_parse(retries_var, defaults.max_retries)?,
            backoff_base_ms: defaults.backoff_base_ms,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-Provider Configs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PaystackConfig {
    /// Used both as the bearer token and as the webhook HMAC key
    pub secret_key: String,
    pub http: HttpSettings,
}

impl PaystackConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.paystack.co";

    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env_opt("PAYSTACK_SECRET_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            secret_key,
            http: HttpSettings::from_env(
                "PAYSTACK_BASE_URL",
                "PAYSTACK_TIMEOUT_SECS",
                "PAYSTACK_MAX_RETRIES",
                Self::DEFAULT_BASE_URL,
            )?,
        }))
    }
}

impl fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("secret_key", &"[REDACTED]")
            .field("http", &self.http)
            .finish()
    }
}

#[derive(Clone)]
pub struct FlutterwaveConfig {
    pub secret_key: String,
    /// Shared secret for webhook HMACs
    pub webhook_hash: String,
    pub http: HttpSettings,
}

impl FlutterwaveConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.flutterwave.com";

    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env_opt("FLUTTERWAVE_SECRET_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            secret_key,
            webhook_hash: env_required("FLUTTERWAVE_WEBHOOK_HASH", "FLUTTERWAVE_SECRET_KEY")?,
            http: HttpSettings::from_env(
                "FLUTTERWAVE_BASE_URL",
                "FLUTTERWAVE_TIMEOUT_SECS",
                "FLUTTERWAVE_MAX_RETRIES",
                Self::DEFAULT_BASE_URL,
            )?,
        }))
    }
}

impl fmt::Debug for FlutterwaveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlutterwaveConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_hash", &"[REDACTED]")
            .field("http", &self.http)
            .finish()
    }
}

#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// `whsec_…` endpoint secret
    pub webhook_secret: String,
    /// Maximum age of a signed webhook
    pub tolerance_secs: i64,
    pub http: HttpSettings,
}

impl StripeConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com";
    pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env_opt("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            secret_key,
            webhook_secret: env_required("STRIPE_WEBHOOK_SECRET", "STRIPE_SECRET_KEY")?,
            tolerance_secs: env_parse(
                "STRIPE_WEBHOOK_TOLERANCE_SECS",
                Self::DEFAULT_TOLERANCE_SECS,
            )?,
            http: HttpSettings::from_env(
                "STRIPE_BASE_URL",
                "STRIPE_TIMEOUT_SECS",
                "STRIPE_MAX_RETRIES",
                Self::DEFAULT_BASE_URL,
            )?,
        }))
    }
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .field("http", &self.http)
            .finish()
    }
}

/// Daraja credentials for STK push and B2C payouts.
#[derive(Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Paybill / till receiving STK payments
    pub shortcode: String,
    pub passkey: String,
    /// Shared secret of the callback relay
    pub webhook_secret: String,
    pub b2c: Option<MpesaB2cConfig>,
    pub http: HttpSettings,
}

#[derive(Clone)]
pub struct MpesaB2cConfig {
    pub shortcode: String,
    pub initiator_name: String,
    pub security_credential: String,
    pub result_url: String,
    pub timeout_url: String,
}

impl MpesaConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://sandbox.safaricom.co.ke";

    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(consumer_key) = env_opt("MPESA_CONSUMER_KEY") else {
            return Ok(None);
        };
        const WHEN: &str = "MPESA_CONSUMER_KEY";
        let b2c = match env_opt("MPESA_B2C_SHORTCODE") {
            Some(shortcode) => Some(MpesaB2cConfig {
                shortcode,
                initiator_name: env_required("MPESA_B2C_INITIATOR_NAME", "MPESA_B2C_SHORTCODE")?,
                security_credential: env_required(
                    "MPESA_B2C_SECURITY_CREDENTIAL",
                    "MPESA_B2C_SHORTCODE",
                )?,
                result_url: env_required("MPESA_B2C_RESULT_URL", "MPESA_B2C_SHORTCODE")?,
                timeout_url: env_required("MPESA_B2C_TIMEOUT_URL", "MPESA_B2C_SHORTCODE")?,
            }),
            None => None,
        };
        Ok(Some(Self {
            consumer_key,
            consumer_secret: env_required("MPESA_CONSUMER_SECRET", WHEN)?,
            shortcode: env_required("MPESA_SHORTCODE", WHEN)?,
            passkey: env_required("MPESA_PASSKEY", WHEN)?,
            webhook_secret: env_required("MPESA_WEBHOOK_SECRET", WHEN)?,
            b2c,
            http: HttpSettings::from_env(
                "MPESA_BASE_URL",
                "MPESA_TIMEOUT_SECS",
                "MPESA_MAX_RETRIES",
                Self::DEFAULT_BASE_URL,
            )?,
        }))
    }
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("consumer_key", &"[REDACTED]")
            .field("consumer_secret", &"[REDACTED]")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("b2c", &self.b2c.as_ref().map(|b| &b.shortcode))
            .field("http", &self.http)
            .finish()
    }
}

/// Static deposit addresses plus the chain monitor's shared secret.
#[derive(Clone)]
pub struct CryptoConfig {
    pub btc_address: Option<String>,
    pub eth_address: Option<String>,
    pub webhook_secret: String,
    pub address_ttl_hours: i64,
    /// Rate source (CoinGecko-compatible)
    pub rates: HttpSettings,
}

impl CryptoConfig {
    pub const DEFAULT_RATES_URL: &'static str = "https://api.coingecko.com/api/v3";
    pub const DEFAULT_ADDRESS_TTL_HOURS: i64 = 24;

    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(webhook_secret) = env_opt("CRYPTO_WEBHOOK_SECRET") else {
            return Ok(None);
        };
        let btc_address = env_opt("CRYPTO_BTC_ADDRESS");
        let eth_address = env_opt("CRYPTO_ETH_ADDRESS");
        if btc_address.is_none() && eth_address.is_none() {
            return Err(ConfigError::Missing(
                "CRYPTO_BTC_ADDRESS or CRYPTO_ETH_ADDRESS",
                "CRYPTO_WEBHOOK_SECRET",
            ));
        }
        Ok(Some(Self {
            btc_address,
            eth_address,
            webhook_secret,
            address_ttl_hours: env_parse(
                "CRYPTO_ADDRESS_TTL_HOURS",
                Self::DEFAULT_ADDRESS_TTL_HOURS,
            )?,
            rates: HttpSettings::from_env(
                "CRYPTO_RATES_BASE_URL",
                "CRYPTO_TIMEOUT_SECS",
                "CRYPTO_MAX_RETRIES",
                Self::DEFAULT_RATES_URL,
            )?,
        }))
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("btc_address", &self.btc_address)
            .field("eth_address", &self.eth_address)
            .field("webhook_secret", &"[REDACTED]")
            .field("address_ttl_hours", &self.address_ttl_hours)
            .field("rates", &self.rates)
            .finish()
    }
}

/// Every adapter's configuration; `None` means the adapter is disabled.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    pub paystack: Option<PaystackConfig>,
    pub flutterwave: Option<FlutterwaveConfig>,
    pub stripe: Option<StripeConfig>,
    pub mpesa: Option<MpesaConfig>,
    pub crypto: Option<CryptoConfig>,
}

impl ProvidersConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            paystack: PaystackConfig::from_env()?,
            flutterwave: FlutterwaveConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            mpesa: MpesaConfig::from_env()?,
            crypto: CryptoConfig::from_env()?,
        })
    }
}
