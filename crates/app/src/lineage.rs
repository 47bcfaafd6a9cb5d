//! In-process single-writer lock per manifest lineage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// Registry of per-lineage locks. Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct LineageLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Exclusive access to one lineage, released on drop.
#[derive(Debug)]
pub struct LineageGuard {
    lineage: String,
    _guard: OwnedMutexGuard<()>,
}

impl LineageGuard {
    #[must_use]
    pub fn lineage(&self) -> &str {
        &self.lineage
    }
}

impl LineageLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `lineage`.
    pub async fn acquire(&self, lineage: &str) -> LineageGuard {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(lineage.to_string()).or_default())
        };
        LineageGuard {
            lineage: lineage.to_string(),
            _guard: lock.lock_owned().await,
        }
    }
}
