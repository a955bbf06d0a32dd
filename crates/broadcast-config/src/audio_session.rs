//! Process-wide audio session strategy.
//!
//! The strategy governs audio routing for the whole application, not a
//! single broadcast session. It has one writer contract: it may be changed
//! freely while no session is live, and every live session holds a lease
//! that pins the current value until the session is torn down.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::selectors::AudioSessionStrategy;
use crate::ConfigResult;

#[derive(Debug, Default)]
struct RegistryState {
    strategy: AudioSessionStrategy,
    leases: usize,
}

/// Holder of the process-wide audio session strategy.
#[derive(Debug, Default)]
pub struct AudioSessionRegistry {
    state: Mutex<RegistryState>,
}

impl AudioSessionRegistry {
    /// Create a standalone registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<AudioSessionRegistry> {
        static GLOBAL: OnceLock<Arc<AudioSessionRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(AudioSessionRegistry::new())))
    }

    /// The strategy currently in effect.
    pub fn strategy(&self) -> AudioSessionStrategy {
        self.state.lock().strategy
    }

    /// Number of live sessions pinning the strategy.
    pub fn leases(&self) -> usize {
        self.state.lock().leases
    }

    /// Change the strategy.
    ///
    /// Setting the value already in effect always succeeds. Switching to a
    /// different value fails while any session holds a lease.
    pub fn set_strategy(&self, strategy: AudioSessionStrategy) -> ConfigResult<()> {
        let mut state = self.state.lock();

        if state.strategy == strategy {
            return Ok(());
        }

        if state.leases > 0 {
            return Err(ConfigError::AudioSessionLocked {
                current: state.strategy.name(),
                requested: strategy.name(),
                leases: state.leases,
            });
        }

        info!(
            previous = state.strategy.name(),
            current = strategy.name(),
            "Audio session strategy changed"
        );
        state.strategy = strategy;
        Ok(())
    }

    /// Pin the current strategy for the lifetime of the returned lease.
    pub fn acquire(registry: &Arc<Self>) -> AudioSessionLease {
        let strategy = {
            let mut state = registry.state.lock();
            state.leases += 1;
            debug!(leases = state.leases, "Audio session lease acquired");
            state.strategy
        };

        AudioSessionLease {
            registry: Arc::clone(registry),
            strategy,
        }
    }
}

/// Keeps the audio session strategy pinned while a session is live.
#[derive(Debug)]
pub struct AudioSessionLease {
    registry: Arc<AudioSessionRegistry>,
    strategy: AudioSessionStrategy,
}

impl AudioSessionLease {
    /// The strategy pinned by this lease.
    pub fn strategy(&self) -> AudioSessionStrategy {
        self.strategy
    }
}

impl Drop for AudioSessionLease {
    fn drop(&mut self) {
        let mut state = self.registry.state.lock();
        state.leases = state.leases.saturating_sub(1);
        debug!(leases = state.leases, "Audio session lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_is_free_without_sessions() {
        let registry = AudioSessionRegistry::new();
        assert_eq!(registry.strategy(), AudioSessionStrategy::PlayAndRecord);

        registry.set_strategy(AudioSessionStrategy::RecordOnly).unwrap();
        assert_eq!(registry.strategy(), AudioSessionStrategy::RecordOnly);
    }

    #[test]
    fn test_lease_pins_strategy() {
        let registry = Arc::new(AudioSessionRegistry::new());
        registry.set_strategy(AudioSessionStrategy::NoAction).unwrap();

        let lease = AudioSessionRegistry::acquire(&registry);
        assert_eq!(lease.strategy(), AudioSessionStrategy::NoAction);

        // Re-asserting the pinned value is fine, switching is not.
        assert!(registry.set_strategy(AudioSessionStrategy::NoAction).is_ok());
        assert!(matches!(
            registry.set_strategy(AudioSessionStrategy::RecordOnly),
            Err(ConfigError::AudioSessionLocked { leases: 1, .. })
        ));

        drop(lease);
        assert_eq!(registry.leases(), 0);
        assert!(registry.set_strategy(AudioSessionStrategy::RecordOnly).is_ok());
    }

    #[test]
    fn test_global_registry_is_shared() {
        let first = AudioSessionRegistry::global();
        let second = AudioSessionRegistry::global();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
