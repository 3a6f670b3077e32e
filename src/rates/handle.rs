//! Shared reference to the active rate schedule.
//!
//! Readers take a snapshot (`Arc` clone) and compute entirely against it.
//! A reload builds and validates the new schedule first, then swaps the
//! `Arc` under a short write lock, so a run sees either the old or the new
//! schedule in full.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::RateSchedule;
use crate::types::EstimateError;

/// Both sides of one swap, taken under the same write lock.
#[derive(Debug, Clone)]
pub struct ScheduleSwap {
    pub previous: Arc<RateSchedule>,
    pub installed: Arc<RateSchedule>,
}

#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    current: Arc<RwLock<Arc<RateSchedule>>>,
}

impl ScheduleHandle {
    pub fn new(schedule: RateSchedule) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(schedule))),
        }
    }

    /// Snapshot of the active schedule.
    pub async fn current(&self) -> Arc<RateSchedule> {
        self.current.read().await.clone()
    }

    /// Install a new schedule, returning the one it replaced.
    pub async fn replace(&self, schedule: RateSchedule) -> Arc<RateSchedule> {
        self.install(Arc::new(schedule)).await.previous
    }

    async fn install(&self, next: Arc<RateSchedule>) -> ScheduleSwap {
        let mut guard = self.current.write().await;
        let previous = std::mem::replace(&mut *guard, next.clone());
        info!(
            from = %previous.version(),
            to = %next.version(),
            "Rate schedule swapped"
        );
        ScheduleSwap {
            previous,
            installed: next,
        }
    }

    /// Re-read a schedule file and swap it in, returning exactly the pair
    /// this call exchanged. On any error the active schedule is left
    /// untouched.
    pub async fn reload_from(&self, path: impl AsRef<Path>) -> Result<ScheduleSwap, EstimateError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            EstimateError::Configuration(format!(
                "failed to read rate schedule {}: {e}",
                path.display()
            ))
        })?;

        let schedule = match RateSchedule::from_toml_str(&contents) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rate schedule reload rejected");
                return Err(e);
            }
        };

        Ok(self.install(Arc::new(schedule)).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
