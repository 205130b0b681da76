//! Read-only registry of payment methods and region configs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog;
use crate::currency::Currency;
use crate::error::RegistryError;
use crate::method::{MethodType, PaymentMethod};

/// Pseudo-country for methods available regardless of the caller's country.
pub const UNIVERSAL_COUNTRY: &str = "XX";

/// Per-country settings as authored in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionSpec {
    pub region: String,
    pub country_code: String,
    pub country_name: String,
    pub currency: Currency,
    pub locale: String,
    pub phone_prefix: String,
}

/// Region settings plus the methods grouped the way a checkout shows them.
///
/// `banks`, `mobile_providers` and `ewallets` are country-specific; `cards`
/// and `crypto` list every card and crypto method in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionConfig {
    pub region: String,
    pub country_code: String,
    pub country_name: String,
    pub currency: Currency,
    pub locale: String,
    pub phone_prefix: String,
    pub banks: Vec<PaymentMethod>,
    pub mobile_providers: Vec<PaymentMethod>,
    pub ewallets: Vec<PaymentMethod>,
    pub cards: Vec<PaymentMethod>,
    pub crypto: Vec<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    methods: Vec<PaymentMethod>,
    #[serde(default)]
    regions: Vec<RegionSpec>,
}

/// Immutable method catalog with indexed lookups.
///
/// Built once at startup; there is no mutation API, so a shared reference
/// (or `Arc`) can be read from any number of tasks without locking.
#[derive(Debug)]
pub struct FeeRulesRegistry {
    methods: Vec<PaymentMethod>,
    by_id: HashMap<String, usize>,
    by_country: HashMap<String, Vec<usize>>,
    by_country_type: HashMap<(String, MethodType), Vec<usize>>,
    regions: Vec<RegionConfig>,
    region_index: HashMap<String, usize>,
}

impl FeeRulesRegistry {
    /// Registry loaded from the built-in catalog.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_parts(catalog::builtin_methods(), catalog::builtin_regions())
    }

    /// Registry loaded from a JSON catalog of the form
    /// `{"methods": [...], "regions": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_parts(file.methods, file.regions)
    }

    /// Validates every entry and builds the lookup indexes.
    pub fn from_parts(
        methods: Vec<PaymentMethod>,
        regions: Vec<RegionSpec>,
    ) -> Result<Self, RegistryError> {
        let mut by_id = HashMap::with_capacity(methods.len());
        let mut by_country: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_country_type: HashMap<(String, MethodType), Vec<usize>> = HashMap::new();

        for (idx, method) in methods.iter().enumerate() {
            method.validate()?;
            if by_id.insert(method.id.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateMethod(method.id.clone()));
            }
            let country = method.country_code.to_uppercase();
            by_country.entry(country.clone()).or_default().push(idx);
            by_country_type
                .entry((country, method.method_type))
                .or_default()
                .push(idx);
        }

        let pick = |country: Option<&str>, method_type: MethodType| -> Vec<PaymentMethod> {
            methods
                .iter()
                .filter(|m| m.method_type == method_type)
                .filter(|m| country.is_none_or(|c| m.country_code.eq_ignore_ascii_case(c)))
                .cloned()
                .collect()
        };

        let mut region_index = HashMap::with_capacity(regions.len());
        let mut configs = Vec::with_capacity(regions.len());
        for spec in regions {
            let code = spec.country_code.to_uppercase();
            if region_index.insert(code.clone(), configs.len()).is_some() {
                return Err(RegistryError::DuplicateRegion(code));
            }
            configs.push(RegionConfig {
                banks: pick(Some(&code), MethodType::Bank),
                mobile_providers: pick(Some(&code), MethodType::Mobile),
                ewallets: pick(Some(&code), MethodType::Ewallet),
                cards: pick(None, MethodType::Card),
                crypto: pick(None, MethodType::Crypto),
                region: spec.region,
                country_code: code,
                country_name: spec.country_name,
                currency: spec.currency,
                locale: spec.locale,
                phone_prefix: spec.phone_prefix,
            });
        }

        tracing::debug!(
            methods = methods.len(),
            regions = configs.len(),
            "fee rules registry loaded"
        );

        Ok(Self {
            methods,
            by_id,
            by_country,
            by_country_type,
            regions: configs,
            region_index,
        })
    }

    /// Looks up a method by its id.
    pub fn method(&self, id: &str) -> Option<&PaymentMethod> {
        self.by_id.get(id).map(|&idx| &self.methods[idx])
    }

    /// Methods offered in `country_code` plus the universal ones.
    pub fn methods_for_country(&self, country_code: &str) -> Vec<&PaymentMethod> {
        let country = country_code.to_uppercase();
        let mut indexes: Vec<usize> = self
            .by_country
            .get(&country)
            .cloned()
            .unwrap_or_default();
        if country != UNIVERSAL_COUNTRY {
            if let Some(universal) = self.by_country.get(UNIVERSAL_COUNTRY) {
                indexes.extend(universal);
            }
        }
        indexes.into_iter().map(|idx| &self.methods[idx]).collect()
    }

    /// Methods of one type offered in `country_code` plus the universal ones.
    pub fn methods_by_type(
        &self,
        country_code: &str,
        method_type: MethodType,
    ) -> Vec<&PaymentMethod> {
        let country = country_code.to_uppercase();
        let exact = self.by_country_type.get(&(country.clone(), method_type));
        let universal = if country != UNIVERSAL_COUNTRY {
            self.by_country_type
                .get(&(UNIVERSAL_COUNTRY.to_string(), method_type))
        } else {
            None
        };
        exact
            .into_iter()
            .chain(universal)
            .flatten()
            .map(|&idx| &self.methods[idx])
            .collect()
    }

    pub fn region_config(&self, country_code: &str) -> Option<&RegionConfig> {
        self.region_index
            .get(&country_code.to_uppercase())
            .map(|&idx| &self.regions[idx])
    }

    pub fn regions(&self) -> &[RegionConfig] {
        &self.regions
    }

    pub fn methods(&self) -> &[PaymentMethod] {
        &self.methods
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
