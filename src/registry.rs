use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, SubseekError};
use crate::provider::{ProviderFactory, SubtitleProvider};

/// Ordered, read-only set of subtitle providers.
///
/// Built once at startup and shared by every search; there is no way to add
/// or remove a provider afterwards.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<[Arc<dyn SubtitleProvider>]>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Register every provider enabled in `config`, in configured order
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder();
        for kind in &config.search.providers {
            debug!("Registering provider '{}'", kind.as_str());
            builder = builder.register(ProviderFactory::create_provider(*kind, config)?);
        }
        builder.build()
    }

    pub fn providers(&self) -> &[Arc<dyn SubtitleProvider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: Vec<Arc<dyn SubtitleProvider>>,
}

impl ProviderRegistryBuilder {
    pub fn register(mut self, provider: Arc<dyn SubtitleProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with<P: SubtitleProvider + 'static>(self, provider: P) -> Self {
        self.register(Arc::new(provider))
    }

    /// Fails when two providers share a name
    pub fn build(self) -> Result<ProviderRegistry> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name().to_string()) {
                return Err(SubseekError::Config(format!(
                    "provider '{}' registered twice",
                    provider.name()
                )));
            }
        }

        Ok(ProviderRegistry {
            providers: self.providers.into(),
        })
    }
}
