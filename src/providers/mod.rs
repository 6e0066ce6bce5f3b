//! Verification provider adapters.
//!
//! Every provider implements [`KycProvider`]: it mints the link an applicant
//! follows to verify with it, and turns its webhook body into a normalized
//! [`ProviderCallback`]. Which providers serve which country is decided by
//! [`RoutingTable`], checked against the [`ProviderRegistry`] at startup.

pub mod creditchek;
pub mod idenfy;
pub mod okra;
pub mod onebrick;

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::kyc::ProviderCallback;
use crate::services::storage::ObjectStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Idenfy,
    OneBrick,
    CreditChek,
    Okra,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Idenfy,
        ProviderKind::OneBrick,
        ProviderKind::CreditChek,
        ProviderKind::Okra,
    ];

    /// Path segment of the provider's webhook, `/{name}/callback`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Idenfy => "idenfy",
            ProviderKind::OneBrick => "onebrick",
            ProviderKind::CreditChek => "creditcheck",
            ProviderKind::Okra => "okra",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::UnsupportedProvider(s.to_string()))
    }
}

#[async_trait]
pub trait KycProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_link(&self, submission_id: &Uuid, first_name: &str, last_name: &str) -> Result<String>;

    /// Unknown event types come back as an empty callback rather than an error.
    async fn parse_callback(&self, body: &[u8]) -> Result<ProviderCallback>;
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn KycProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn KycProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn KycProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn KycProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::UnsupportedProvider(kind.to_string()))
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// All four production adapters sharing one HTTP client.
    pub fn from_config(config: &AppConfig, client: Client, storage: Arc<dyn ObjectStorage>) -> Self {
        Self::new()
            .with(Arc::new(idenfy::IdenfyProvider::new(client.clone(), config.idenfy.clone(), storage)))
            .with(Arc::new(onebrick::OneBrickProvider::new(client.clone(), config.onebrick.clone())))
            .with(Arc::new(creditchek::CreditChekProvider::new(client, config.creditchek.clone())))
            .with(Arc::new(okra::OkraProvider::new(config.okra.clone())))
    }
}

/// Providers covering the financial checks for one country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryRoute {
    pub income: ProviderKind,
    pub employment: ProviderKind,
    /// The employment provider for this country only echoes the applicant's
    /// national ID number, so at most one queued submission per number is allowed.
    pub guard_by_id_number: bool,
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    document: ProviderKind,
    countries: HashMap<String, CountryRoute>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(ProviderKind::Idenfy)
            .with_route(
                "nigeria",
                CountryRoute {
                    income: ProviderKind::CreditChek,
                    employment: ProviderKind::Okra,
                    guard_by_id_number: true,
                },
            )
            .with_route(
                "indonesia",
                CountryRoute {
                    income: ProviderKind::OneBrick,
                    employment: ProviderKind::OneBrick,
                    guard_by_id_number: false,
                },
            )
    }
}

impl RoutingTable {
    pub fn new(document: ProviderKind) -> Self {
        Self {
            document,
            countries: HashMap::new(),
        }
    }

    pub fn with_route(mut self, country: &str, route: CountryRoute) -> Self {
        self.countries.insert(country.to_lowercase(), route);
        self
    }

    pub fn document_provider(&self) -> ProviderKind {
        self.document
    }

    pub fn resolve(&self, country: &str) -> Result<CountryRoute> {
        self.countries
            .get(country)
            .copied()
            .ok_or_else(|| AppError::UnsupportedCountry(country.to_string()))
    }

    /// Fails when a route names a provider the registry cannot serve.
    pub fn validate(&self, registry: &ProviderRegistry) -> Result<()> {
        if !registry.contains(self.document) {
            return Err(AppError::ConfigurationError(format!(
                "document provider {} is not registered",
                self.document
            )));
        }
        for (country, route) in &self.countries {
            for kind in [route.income, route.employment] {
                if !registry.contains(kind) {
                    return Err(AppError::ConfigurationError(format!(
                        "provider {} for {} is not registered",
                        kind, country
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
}

/// `None` for blank provider strings.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

pub(crate) fn malformed(kind: ProviderKind, err: serde_json::Error) -> AppError {
    AppError::ProviderError(format!("malformed {} callback: {}", kind, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(ProviderKind);

    #[async_trait]
    impl KycProvider for StaticProvider {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        async fn create_link(&self, _: &Uuid, _: &str, _: &str) -> Result<String> {
            Ok(format!("https://{}.test", self.0))
        }

        async fn parse_callback(&self, _: &[u8]) -> Result<ProviderCallback> {
            Ok(ProviderCallback::empty())
        }
    }

    fn full_registry() -> ProviderRegistry {
        ProviderKind::ALL
            .into_iter()
            .fold(ProviderRegistry::new(), |r, kind| r.with(Arc::new(StaticProvider(kind))))
    }

    #[test]
    fn test_provider_names() {
        assert_eq!("creditcheck".parse::<ProviderKind>().unwrap(), ProviderKind::CreditChek);
        assert!(matches!("acme".parse::<ProviderKind>(), Err(AppError::UnsupportedProvider(_))));
    }

    #[test]
    fn test_default_routes() {
        let table = RoutingTable::default();
        assert_eq!(table.document_provider(), ProviderKind::Idenfy);

        let nigeria = table.resolve("nigeria").unwrap();
        assert_eq!(nigeria.income, ProviderKind::CreditChek);
        assert_eq!(nigeria.employment, ProviderKind::Okra);
        assert!(nigeria.guard_by_id_number);

        let indonesia = table.resolve("indonesia").unwrap();
        assert_eq!(indonesia.income, ProviderKind::OneBrick);
        assert!(!indonesia.guard_by_id_number);

        assert!(matches!(table.resolve("ghana"), Err(AppError::UnsupportedCountry(_))));
    }

    #[test]
    fn test_validate_against_registry() {
        let table = RoutingTable::default();
        assert!(table.validate(&full_registry()).is_ok());

        let partial = ProviderRegistry::new()
            .with(Arc::new(StaticProvider(ProviderKind::Idenfy)))
            .with(Arc::new(StaticProvider(ProviderKind::OneBrick)));
        assert!(matches!(table.validate(&partial), Err(AppError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = full_registry();
        let okra = registry.get(ProviderKind::Okra).unwrap();
        assert_eq!(okra.create_link(&Uuid::new_v4(), "a", "b").await.unwrap(), "https://okra.test");
        assert!(ProviderRegistry::new().get(ProviderKind::Okra).is_err());
    }
}
