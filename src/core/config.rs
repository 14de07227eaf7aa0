//! Configuration store: validated, atomically replaced, lock-free reads

use std::path::Path;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::error::{ConfigError, StoreError};
use crate::types::{ConfigUpdate, DetectionConfig};

/// Live detection configuration
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<DetectionConfig>,
    /// Serialises read-modify-write of partial updates
    write: Mutex<()>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            current: ArcSwap::from_pointee(DetectionConfig::default()),
            write: Mutex::new(()),
        }
    }
}

impl ConfigStore {
    /// Create store holding `initial`, which must itself be valid
    pub fn new(initial: DetectionConfig) -> Result<Self, ConfigError> {
        initial.validate()?;
        Ok(Self {
            current: ArcSwap::from_pointee(initial),
            write: Mutex::new(()),
        })
    }

    /// Load a JSON file; missing fields take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        let config: DetectionConfig = serde_json::from_str(&text)?;
        Ok(Self::new(config)?)
    }

    /// Config in effect right now
    pub fn get(&self) -> DetectionConfig {
        **self.current.load()
    }

    /// Apply a partial or full update. Either everything applies or nothing does.
    pub fn set(&self, update: &ConfigUpdate) -> Result<DetectionConfig, ConfigError> {
        let _guard = self.write.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = self.get().merged(update)?;
        if let Err(err) = next.validate() {
            warn!(%err, "configuration rejected");
            return Err(err);
        }
        self.current.store(Arc::new(next));
        info!(?next, "configuration updated");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_update_keeps_prior_config() {
        let store = ConfigStore::default();
        let before = store.get();

        let err = store
            .set(&ConfigUpdate {
                impact_threshold: Some(16.0),
                fall_threshold: Some(15.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOrder { .. }));
        assert_eq!(store.get(), before);
    }

    #[test]
    fn test_partial_update_is_all_or_nothing() {
        let store = ConfigStore::default();
        // valid countdown paired with an invalid window
        let res = store.set(&ConfigUpdate {
            countdown_ms: Some(5_000),
            min_free_fall_ms: Some(900),
            ..Default::default()
        });
        assert!(res.is_err());
        assert_eq!(store.get().countdown_ms, DetectionConfig::default().countdown_ms);
    }

    #[test]
    fn test_partial_update_applies() {
        let store = ConfigStore::default();
        let next = store
            .set(&ConfigUpdate { countdown_ms: Some(3_000), ..Default::default() })
            .unwrap();
        assert_eq!(next.countdown_ms, 3_000);
        assert_eq!(store.get().fall_threshold, DetectionConfig::default().fall_threshold);
    }

    #[test]
    fn test_bad_sensitivity_rejected() {
        let store = ConfigStore::default();
        assert!(store
            .set(&ConfigUpdate { sensitivity: Some(-0.1), ..Default::default() })
            .is_err());
    }

    #[test]
    fn test_new_rejects_invalid_initial() {
        let bad = DetectionConfig { impact_threshold: 20.0, ..Default::default() };
        assert!(ConfigStore::new(bad).is_err());
    }
}
