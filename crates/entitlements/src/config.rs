//! Store configuration.
//!
//! Values come from the environment (`from_env`) or any serde source; an
//! invalid value is logged and replaced by its default rather than failing
//! startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use entitlekit_core::ProductId;

pub const ENV_QUERY_TIMEOUT_MS: &str = "ENTITLEKIT_QUERY_TIMEOUT_MS";
pub const ENV_LISTENER_TICK_MS: &str = "ENTITLEKIT_LISTENER_TICK_MS";
pub const ENV_PRODUCT_IDS: &str = "ENTITLEKIT_PRODUCT_IDS";
pub const ENV_ROOT_KEY: &str = "ENTITLEKIT_ROOT_KEY";

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LISTENER_TICK_MS: u64 = 250;

const DEFAULT_PRODUCT_IDS: &[&str] = &[
    "com.apple.mac",
    "com.apple.pad",
    "com.apple.phone",
    "com.apple.watch",
    "com.amzn.backpack",
    "com.amzn.scooter",
    "com.amzn.headphone",
    "com.sub.home",
    "com.sub.living",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound on every call to an external source.
    pub query_timeout_ms: u64,
    /// How often the listener wakes up to check for shutdown while idle.
    pub listener_tick_ms: u64,
    /// Products requested from the catalog source at startup.
    pub product_ids: Vec<ProductId>,
    /// Base64 Ed25519 public key of the commerce backend.
    pub root_key: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            listener_tick_ms: DEFAULT_LISTENER_TICK_MS,
            product_ids: default_product_ids(),
            root_key: None,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_QUERY_TIMEOUT_MS) {
            config.query_timeout_ms = parse_millis(ENV_QUERY_TIMEOUT_MS, &raw, DEFAULT_QUERY_TIMEOUT_MS);
        }
        if let Some(raw) = lookup(ENV_LISTENER_TICK_MS) {
            config.listener_tick_ms = parse_millis(ENV_LISTENER_TICK_MS, &raw, DEFAULT_LISTENER_TICK_MS);
        }
        if let Some(raw) = lookup(ENV_PRODUCT_IDS) {
            let ids: Vec<ProductId> = raw
                .split(',')
                .filter_map(|s| ProductId::new(s).ok())
                .collect();
            if ids.is_empty() {
                warn!(key = ENV_PRODUCT_IDS, "no valid product ids; using defaults");
            } else {
                config.product_ids = ids;
            }
        }
        config.root_key = lookup(ENV_ROOT_KEY).filter(|k| !k.trim().is_empty());

        config
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn listener_tick(&self) -> Duration {
        Duration::from_millis(self.listener_tick_ms)
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_listener_tick(mut self, tick: Duration) -> Self {
        self.listener_tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_product_ids(mut self, ids: Vec<ProductId>) -> Self {
        self.product_ids = ids;
        self
    }
}

fn default_product_ids() -> Vec<ProductId> {
    DEFAULT_PRODUCT_IDS
        .iter()
        .filter_map(|id| ProductId::new(*id).ok())
        .collect()
}

fn parse_millis(key: &str, raw: &str, default: u64) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!(key, value = raw, default, "invalid duration; using default");
            default
        }
        Ok(ms) => ms,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = StoreConfig::from_lookup(lookup(&[]));

        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.product_ids.len(), 9);
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_QUERY_TIMEOUT_MS, "1500"),
            (ENV_LISTENER_TICK_MS, "50"),
            (ENV_PRODUCT_IDS, "com.sub.home, ,com.apple.mac"),
            (ENV_ROOT_KEY, "c29tZS1rZXk="),
        ]));

        assert_eq!(config.query_timeout(), Duration::from_millis(1500));
        assert_eq!(config.listener_tick(), Duration::from_millis(50));
        assert_eq!(
            config.product_ids,
            vec![ProductId::new("com.sub.home").unwrap(), ProductId::new("com.apple.mac").unwrap()]
        );
        assert_eq!(config.root_key.as_deref(), Some("c29tZS1rZXk="));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_QUERY_TIMEOUT_MS, "soon"),
            (ENV_LISTENER_TICK_MS, "0"),
            (ENV_PRODUCT_IDS, " , "),
            (ENV_ROOT_KEY, "  "),
        ]));

        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"query_timeout_ms": 200}"#).unwrap();

        assert_eq!(config.query_timeout_ms, 200);
        assert_eq!(config.listener_tick_ms, DEFAULT_LISTENER_TICK_MS);
        assert_eq!(config.product_ids.len(), 9);
    }
}
