//! Background expiry monitor.
//!
//! One monitor thread runs per populated cache entry. It wakes every poll
//! interval (or when signalled) and ends in one of two ways: it clears the
//! entry itself because the timeout elapsed, or it finds the entry already
//! cleared by the wrapper's destructor. After either, it never takes the
//! entry lock again.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use descry_core::StoreError;

use crate::expiring::Shared;

pub(crate) struct MonitorSettings {
    /// Log header identifying the entry.
    pub(crate) label: String,
    pub(crate) timeout: Duration,
    pub(crate) poll_interval: Duration,
}

/// Spawn the monitor thread for a freshly populated entry.
///
/// Called with the entry lock held; the monitor blocks on that lock until
/// the caller has finished populating the entry.
pub(crate) fn spawn(
    shared: Arc<Shared>,
    settings: MonitorSettings,
) -> Result<JoinHandle<()>, StoreError> {
    tracing::debug!(entry = %settings.label, "Spawning cache expiry monitor");
    thread::Builder::new()
        .name("descry-expiry".to_string())
        .spawn(move || run(&shared, &settings))
        .map_err(|e| StoreError::Backend {
            backend: "expiry-monitor".to_string(),
            reason: e.to_string(),
        })
}

/// Why a monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Expired,
    Invalidated,
    Poisoned,
}

fn run(shared: &Shared, settings: &MonitorSettings) {
    let exit = watch(shared, settings);
    match exit {
        Exit::Expired => {
            tracing::debug!(entry = %settings.label, "Cache expired");
        }
        Exit::Invalidated => {
            tracing::debug!(entry = %settings.label, "Cache was invalidated for us");
        }
        Exit::Poisoned => {
            tracing::warn!(entry = %settings.label, "Cache lock poisoned, monitor giving up");
        }
    }
    tracing::debug!(entry = %settings.label, "Monitor exiting");
}

fn watch(shared: &Shared, settings: &MonitorSettings) -> Exit {
    let Ok(mut entry) = shared.entry.lock() else {
        return Exit::Poisoned;
    };

    loop {
        entry = match shared.wake.wait_timeout(entry, settings.poll_interval) {
            Ok((guard, _)) => guard,
            Err(_) => return Exit::Poisoned,
        };

        if entry.vector.is_none() {
            return Exit::Invalidated;
        }
        if Instant::now().saturating_duration_since(entry.last_access) >= settings.timeout {
            entry.vector = None;
            // Counted under the lock, together with the clear.
            shared.counters.expirations.fetch_add(1, Ordering::Relaxed);
            return Exit::Expired;
        }
    }
}
