use crate::types::EventId;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process advisory locks, one per event under analysis.
///
/// Entries are dropped once no attempt holds or waits on them.
#[derive(Clone, Default)]
pub struct EventLocks {
    inner: Arc<Mutex<HashMap<EventId, Weak<Mutex<()>>>>>,
}

pub struct EventLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, event_id: EventId) -> EventLockGuard {
        let lock = {
            let mut guard = self.inner.lock().await;
            guard.retain(|_, weak| weak.strong_count() > 0);
            if let Some(existing) = guard.get(&event_id).and_then(Weak::upgrade) {
                existing
            } else {
                let lock = Arc::new(Mutex::new(()));
                guard.insert(event_id, Arc::downgrade(&lock));
                lock
            }
        };
        EventLockGuard {
            _guard: lock.lock_owned().await,
        }
    }

    pub async fn tracked(&self) -> usize {
        let guard = self.inner.lock().await;
        guard.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
