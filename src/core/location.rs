//! Location Cache: last-writer-wins, snapshot reads never block

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::types::Location;

/// Shared last known location
#[derive(Debug, Default)]
pub struct LocationCache {
    current: ArcSwapOption<Location>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached fix. Implausible coordinates are ignored.
    pub fn update(&self, location: Location) -> bool {
        if !location.is_plausible() {
            debug!(lat = location.latitude, lon = location.longitude, "implausible fix ignored");
            return false;
        }
        self.current.store(Some(Arc::new(location)));
        true
    }

    /// Current fix, if any. Never torn, never blocks on a writer.
    pub fn snapshot(&self) -> Option<Arc<Location>> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_first_fix() {
        let cache = LocationCache::new();
        assert!(cache.snapshot().is_none());
        cache.update(Location::new(52.37, 4.89));
        assert_eq!(cache.snapshot().unwrap().latitude, 52.37);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = LocationCache::new();
        cache.update(Location::new(1.0, 1.0));
        cache.update(Location::new(2.0, 2.0));
        assert_eq!(cache.snapshot().unwrap().longitude, 2.0);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let cache = LocationCache::new();
        assert!(!cache.update(Location::new(91.0, 0.0)));
        assert!(cache.snapshot().is_none());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let cache = Arc::new(LocationCache::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let v = (w * 1000 + i) as f64 / 100.0;
                        cache.update(Location::new(v.min(90.0), v.min(180.0)));
                    }
                })
            })
            .collect();
        for _ in 0..2000 {
            if let Some(loc) = cache.snapshot() {
                // Both coordinates come from the same write
                assert_eq!(loc.latitude.min(90.0), loc.latitude);
            }
        }
        for w in writers {
            w.join().unwrap();
        }
        assert!(cache.snapshot().is_some());
    }
}
