//! Application configuration: built-in defaults, overlaid by an optional
//! YAML file, overlaid by a handful of environment variables.

use anyhow::Context;
use sources::SourceConfig;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Fan-out wall-clock budget override, in whole seconds.
pub const ENV_CONC_SEARCH_TIMEOUT: &str = "CONC_SEARCH_TIMEOUT";
/// SuperJob application key.
pub const ENV_SJ_API_KEY: &str = "SJ_API_KEY";
/// HTTP facade bind address.
pub const ENV_SERVER_ADDR: &str = "SERVER_ADDR";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Wall-clock budget of one fan-out across all sources.
    #[serde(with = "humantime_serde")]
    pub concurrent_search_timeout: Duration,
    pub cache: CacheConfig,
    pub manager: manager::Config,
    pub health: health::Config,
    pub server: ServerConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Shard count shared by all three caches.
    pub num_of_shards: usize,
    pub search: CacheTuning,
    pub vacancy: CacheTuning,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheTuning {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep: Duration,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub hh: SourceConfig,
    pub superjob: SourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            concurrent_search_timeout: Duration::from_secs(15),
            cache: CacheConfig::default(),
            manager: manager::Config::default(),
            health: health::Config::default(),
            server: ServerConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            num_of_shards: 7,
            search: CacheTuning::default(),
            vacancy: CacheTuning::default(),
        }
    }
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            sweep: Duration::from_secs(30),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            hh: SourceConfig {
                base_url: Url::parse("https://api.hh.ru/").unwrap(),
                ..SourceConfig::default()
            },
            superjob: SourceConfig {
                base_url: Url::parse("https://api.superjob.ru/").unwrap(),
                ..SourceConfig::default()
            },
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid by the YAML file at `path` when given, overlaid by
    /// environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(raw) = std::env::var(ENV_CONC_SEARCH_TIMEOUT) {
            let seconds: u64 = raw
                .parse()
                .with_context(|| format!("{ENV_CONC_SEARCH_TIMEOUT} must be whole seconds"))?;
            self.concurrent_search_timeout = Duration::from_secs(seconds);
        }
        if let Ok(key) = std::env::var(ENV_SJ_API_KEY) {
            self.sources.superjob.api_key = key;
        }
        if let Ok(addr) = std::env::var(ENV_SERVER_ADDR) {
            self.server.addr = addr;
        }
        Ok(())
    }

    /// Manager tuning with the cross-section settings (fan-out budget and
    /// cache TTLs) folded in.
    pub fn manager_config(&self) -> manager::Config {
        let mut config = self.manager.clone();
        config.concurrent_search_timeout = self.concurrent_search_timeout;
        config.search_ttl = self.cache.search.ttl;
        config.vacancy_ttl = self.cache.vacancy.ttl;
        config
    }

    /// Names of the sources enabled by this configuration, in registry
    /// order.
    pub fn enabled_sources(&self) -> Vec<String> {
        let mut enabled = Vec::new();
        if self.sources.hh.enabled {
            enabled.push(sources::hh::NAME.to_string());
        }
        if self.sources.superjob.enabled {
            enabled.push(sources::superjob::NAME.to_string());
        }
        enabled
    }

    /// Registry pre-loaded with this configuration's per-source settings.
    pub fn registry(&self) -> sources::Registry {
        sources::Registry::standard(self.sources.hh.clone(), self.sources.superjob.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.cache.num_of_shards, 7);
        assert_eq!(config.manager.workers, 4);
        assert_eq!(config.sources.hh.base_url.as_str(), "https://api.hh.ru/");
        assert_eq!(
            config.enabled_sources(),
            vec!["hh".to_string(), "superjob".to_string()]
        );
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let yaml = r#"
concurrent_search_timeout: 20s
cache:
  num_of_shards: 16
  search:
    ttl: 2m
    sweep: 45s
manager:
  workers: 8
sources:
  hh:
    enabled: false
  superjob:
    api_key: from-yaml
    rate_limit: 5s
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.concurrent_search_timeout, Duration::from_secs(20));
        assert_eq!(config.cache.num_of_shards, 16);
        assert_eq!(config.cache.search.ttl, Duration::from_secs(120));
        // Untouched sections keep their defaults.
        assert_eq!(config.cache.vacancy.ttl, Duration::from_secs(60));
        assert_eq!(config.manager.workers, 8);
        assert_eq!(config.manager.queue_capacity, 64);
        assert!(!config.sources.hh.enabled);
        assert_eq!(config.sources.superjob.api_key, "from-yaml");
        assert_eq!(
            config.sources.superjob.rate_limit,
            Duration::from_secs(5)
        );
        assert_eq!(config.enabled_sources(), vec!["superjob".to_string()]);
    }

    #[test]
    fn manager_config_folds_in_shared_settings() {
        let mut config = AppConfig::default();
        config.concurrent_search_timeout = Duration::from_secs(7);
        config.cache.search.ttl = Duration::from_secs(90);
        config.cache.vacancy.ttl = Duration::from_secs(45);

        let manager = config.manager_config();
        assert_eq!(manager.concurrent_search_timeout, Duration::from_secs(7));
        assert_eq!(manager.search_ttl, Duration::from_secs(90));
        assert_eq!(manager.vacancy_ttl, Duration::from_secs(45));
    }

    #[test]
    fn environment_overrides_win() {
        std::env::set_var(ENV_CONC_SEARCH_TIMEOUT, "25");
        std::env::set_var(ENV_SJ_API_KEY, "from-env");
        std::env::set_var(ENV_SERVER_ADDR, "0.0.0.0:9000");

        let config = AppConfig::load(None).unwrap();

        std::env::remove_var(ENV_CONC_SEARCH_TIMEOUT);
        std::env::remove_var(ENV_SJ_API_KEY);
        std::env::remove_var(ENV_SERVER_ADDR);

        assert_eq!(config.concurrent_search_timeout, Duration::from_secs(25));
        assert_eq!(config.sources.superjob.api_key, "from-env");
        assert_eq!(config.server.addr, "0.0.0.0:9000");
    }
}
