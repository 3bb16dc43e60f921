use crate::{hh, superjob, Source, SourceConfig};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Builds one adapter from its registered config.
pub type Constructor = fn(&SourceConfig) -> anyhow::Result<Arc<dyn Source>>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("source type not registered: {0}")]
    NotRegistered(String),
    #[error("failed to create source {name}")]
    Build {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Registry maps source names to `(config, constructor)` pairs so that the
/// enabled upstream set is decided by configuration, not call sites.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, (SourceConfig, Constructor)>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the adapters this build ships.
    pub fn standard(hh_config: SourceConfig, superjob_config: SourceConfig) -> Self {
        let registry = Self::new();
        registry.register(hh::NAME, hh_config, |config| {
            Ok(Arc::new(hh::HeadHunter::new(config)?))
        });
        registry.register(superjob::NAME, superjob_config, |config| {
            Ok(Arc::new(superjob::SuperJob::new(config)?))
        });
        registry
    }

    pub fn register(&self, name: &str, config: SourceConfig, constructor: Constructor) {
        self.entries
            .write()
            .unwrap()
            .insert(name.to_string(), (config, constructor));
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Source>, RegistryError> {
        let entries = self.entries.read().unwrap();
        let (config, constructor) = entries
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;

        constructor(config).map_err(|err| RegistryError::Build {
            name: name.to_string(),
            source: err,
        })
    }

    /// Create every requested adapter, in order. Any failure aborts the
    /// whole batch.
    pub fn create_enabled(&self, names: &[String]) -> Result<Vec<Arc<dyn Source>>, RegistryError> {
        names.iter().map(|name| self.create(name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Registry, RegistryError};
    use crate::{hh, superjob, SourceConfig};
    use crate::Source;

    #[tokio::test]
    async fn creates_registered_sources() {
        let registry = Registry::standard(SourceConfig::default(), SourceConfig::default());

        let source = registry.create("hh").unwrap();
        assert_eq!(source.name(), hh::NAME);
        source.shutdown().await;

        let source = registry.create("superjob").unwrap();
        assert_eq!(source.name(), superjob::NAME);
        source.shutdown().await;
    }

    #[test]
    fn unregistered_name_is_an_error() {
        let registry = Registry::new();
        assert!(matches!(
            registry.create("rabota"),
            Err(RegistryError::NotRegistered(name)) if name == "rabota"
        ));
    }

    #[tokio::test]
    async fn create_enabled_aborts_on_first_failure() {
        let registry = Registry::standard(SourceConfig::default(), SourceConfig::default());

        let names: Vec<String> = vec!["hh".to_string(), "linkedin".to_string()];
        assert!(registry.create_enabled(&names).is_err());

        let names: Vec<String> = vec!["hh".to_string(), "superjob".to_string()];
        let sources = registry.create_enabled(&names).unwrap();
        assert_eq!(sources.len(), 2);
        for source in sources {
            source.shutdown().await;
        }
    }
}
