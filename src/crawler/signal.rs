//! Stop signals polled by the crawl loop and its workers

use crate::storage::{lock_storage, SharedStorage, Storage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Something that can ask a running crawl to stop
///
/// Checked at the start of every batch and by each worker before it fetches.
pub trait StopSignal: Send + Sync {
    fn is_stopped(&self) -> bool;
}

/// In-process stop flag, e.g. set from a Ctrl-C handler
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl StopSignal for StopFlag {
    fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reads the `stop_requested` flag of a session row
///
/// Lets another process (`sitegraph <CONFIG> --stop`) stop a running crawl.
pub struct SessionStopSignal {
    storage: SharedStorage,
    session_id: i64,
}

impl SessionStopSignal {
    pub fn new(storage: SharedStorage, session_id: i64) -> Self {
        Self {
            storage,
            session_id,
        }
    }
}

impl StopSignal for SessionStopSignal {
    fn is_stopped(&self) -> bool {
        let result = lock_storage(&self.storage)
            .and_then(|storage| storage.is_stop_requested(self.session_id));
        match result {
            Ok(stopped) => stopped,
            Err(e) => {
                tracing::warn!("Could not read stop flag for session {}: {}", self.session_id, e);
                false
            }
        }
    }
}

/// Fires when any of its signals fires
#[derive(Clone, Default)]
pub struct AnySignal(Vec<Arc<dyn StopSignal>>);

impl AnySignal {
    pub fn new(signals: Vec<Arc<dyn StopSignal>>) -> Self {
        Self(signals)
    }
}

impl StopSignal for AnySignal {
    fn is_stopped(&self) -> bool {
        self.0.iter().any(|s| s.is_stopped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use std::sync::Mutex;

    #[test]
    fn test_stop_flag_is_shared_between_clones() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(!other.is_stopped());
        flag.trigger();
        assert!(other.is_stopped());
    }

    #[test]
    fn test_session_stop_signal_reads_storage() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session = storage
            .create_session("https://x.test/", 10, 1, "hash")
            .unwrap();
        let shared = Arc::new(Mutex::new(storage));
        let signal = SessionStopSignal::new(Arc::clone(&shared), session);

        assert!(!signal.is_stopped());
        shared.lock().unwrap().request_stop(session).unwrap();
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_any_signal() {
        let a = StopFlag::new();
        let b = StopFlag::new();
        let any = AnySignal::new(vec![Arc::new(a.clone()), Arc::new(b.clone())]);

        assert!(!any.is_stopped());
        b.trigger();
        assert!(any.is_stopped());
        assert!(!AnySignal::default().is_stopped());
    }
}
