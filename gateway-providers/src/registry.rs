use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use gateway_types::{PaymentProvider, ProviderError};

use crate::config::ProvidersConfig;
use crate::crypto::CryptoProvider;
use crate::flutterwave::FlutterwaveProvider;
use crate::mpesa::MpesaProvider;
use crate::paystack::PaystackProvider;
use crate::stripe::StripeProvider;

/// Adapters keyed by gateway code, as referenced by payment methods.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own code, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        let code = provider.code();
        if self.providers.insert(code, provider).is_some() {
            warn!(gateway = code, "Replacing registered provider adapter");
        }
    }

    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.providers.contains_key(code)
    }

    /// Registered codes, sorted.
    pub fn codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.providers.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First registered adapter that can quote exchange rates.
    pub fn rates(&self) -> Option<Arc<dyn PaymentProvider>> {
        self.codes()
            .into_iter()
            .filter_map(|code| self.get(code))
            .find(|p| p.rates().is_some())
    }

    /// Builds every adapter whose credentials are configured.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        if let Some(c) = &config.paystack {
            registry.register(Arc::new(PaystackProvider::new(c.clone())?));
        }
        if let Some(c) = &config.flutterwave {
            registry.register(Arc::new(FlutterwaveProvider::new(c.clone())?));
        }
        if let Some(c) = &config.stripe {
            registry.register(Arc::new(StripeProvider::new(c.clone())?));
        }
        if let Some(c) = &config.mpesa {
            registry.register(Arc::new(MpesaProvider::new(c.clone())?));
        }
        if let Some(c) = &config.crypto {
            registry.register(Arc::new(CryptoProvider::new(c.clone())?));
        }
        info!(gateways = ?registry.codes(), "Provider adapters registered");
        Ok(registry)
    }
}
