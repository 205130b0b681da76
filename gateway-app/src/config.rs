//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use gateway_hex::OrchestratorSettings;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 100;
const MAX_ESCALATION_FACTOR: u32 = 1000;

/// Application configuration.
///
/// Provider credentials are read separately by
/// [`gateway_providers::ProvidersConfig::from_env`].
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Base URL providers use to reach this service's webhooks
    pub public_url: Option<String>,
    /// JSON catalog replacing the built-in fee rules
    pub fee_rules_path: Option<String>,
    pub reconcile_interval: Duration,
    pub reconcile_batch_size: u32,
    pub escalation_factor: u32,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = OrchestratorSettings::default();

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let escalation_factor: u32 = parse(
            get("RECONCILE_ESCALATION_FACTOR"),
            "RECONCILE_ESCALATION_FACTOR",
            defaults.escalation_factor,
        )?;
        if !(1..=MAX_ESCALATION_FACTOR).contains(&escalation_factor) {
            anyhow::bail!(
                "RECONCILE_ESCALATION_FACTOR must be between 1 and {}",
                MAX_ESCALATION_FACTOR
            );
        }

        let interval_secs: u64 = parse(
            get("RECONCILE_INTERVAL_SECS"),
            "RECONCILE_INTERVAL_SECS",
            DEFAULT_RECONCILE_INTERVAL_SECS,
        )?;
        if interval_secs == 0 {
            anyhow::bail!("RECONCILE_INTERVAL_SECS must be at least 1");
        }

        Ok(Self {
            port: parse(get("PORT"), "PORT", DEFAULT_PORT)?,
            database_url,
            public_url: get("GATEWAY_PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string()),
            fee_rules_path: get("GATEWAY_FEE_RULES_PATH"),
            reconcile_interval: Duration::from_secs(interval_secs),
            reconcile_batch_size: parse(
                get("RECONCILE_BATCH_SIZE"),
                "RECONCILE_BATCH_SIZE",
                defaults.reconcile_batch_size,
            )?,
            escalation_factor,
            rate_limit_per_minute: parse(
                get("RATE_LIMIT_PER_MINUTE"),
                "RATE_LIMIT_PER_MINUTE",
                DEFAULT_RATE_LIMIT_PER_MINUTE,
            )?,
        })
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            public_url: self.public_url.clone(),
            escalation_factor: self.escalation_factor,
            reconcile_batch_size: self.reconcile_batch_size,
        }
    }
}

fn parse<T: FromStr>(raw: Option<String>, name: &str, default: T) -> anyhow::Result<T> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is invalid: {:?}", name, raw)),
        None => Ok(default),
    }
}
