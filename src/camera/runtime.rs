//! Process-wide camera transport lifecycle.
//!
//! The transport layer is initialized when the first [`RuntimeGuard`] is
//! acquired and torn down when the last one is released, or explicitly via
//! [`shutdown`].

use parking_lot::Mutex;
use tracing::{debug, info};

struct RuntimeState {
    active_guards: usize,
    initialized: bool,
    generation: u64,
}

static RUNTIME: Mutex<RuntimeState> = parking_lot::const_mutex(RuntimeState {
    active_guards: 0,
    initialized: false,
    generation: 0,
});

/// Keeps the transport runtime alive while held
#[derive(Debug)]
pub struct RuntimeGuard {
    generation: u64,
}

impl RuntimeGuard {
    /// Acquire the runtime, initializing it on first use
    pub fn acquire() -> Self {
        let mut state = RUNTIME.lock();
        if !state.initialized {
            state.initialized = true;
            state.generation += 1;
            info!(
                "Camera transport initialized (generation {})",
                state.generation
            );
        }
        state.active_guards += 1;
        debug!("Camera transport guards active: {}", state.active_guards);

        Self {
            generation: state.generation,
        }
    }

    /// Initialization generation this guard was acquired under
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        let mut state = RUNTIME.lock();
        if state.generation != self.generation {
            // Torn down by an explicit shutdown since this guard was taken
            return;
        }
        state.active_guards = state.active_guards.saturating_sub(1);
        if state.active_guards == 0 && state.initialized {
            state.initialized = false;
            info!("Camera transport terminated");
        }
    }
}

/// Whether the transport runtime is currently initialized
pub fn is_initialized() -> bool {
    RUNTIME.lock().initialized
}

/// Tear the runtime down regardless of outstanding guards
pub fn shutdown() {
    let mut state = RUNTIME.lock();
    if state.initialized {
        state.initialized = false;
        state.active_guards = 0;
        info!("Camera transport shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(transport_runtime)]
    fn test_last_guard_tears_down() {
        shutdown();
        assert!(!is_initialized());

        let first = RuntimeGuard::acquire();
        let second = RuntimeGuard::acquire();
        assert!(is_initialized());
        assert_eq!(first.generation(), second.generation());

        drop(first);
        assert!(is_initialized());
        drop(second);
        assert!(!is_initialized());
    }

    #[test]
    #[serial(transport_runtime)]
    fn test_reinitializes_after_teardown() {
        shutdown();
        let first = RuntimeGuard::acquire();
        let generation = first.generation();
        drop(first);

        let again = RuntimeGuard::acquire();
        assert!(again.generation() > generation);
        drop(again);
    }

    #[test]
    #[serial(transport_runtime)]
    fn test_explicit_shutdown_outlives_guards() {
        shutdown();
        let stale = RuntimeGuard::acquire();
        shutdown();
        assert!(!is_initialized());

        let fresh = RuntimeGuard::acquire();
        drop(stale);
        assert!(is_initialized());
        drop(fresh);
        assert!(!is_initialized());
    }
}
