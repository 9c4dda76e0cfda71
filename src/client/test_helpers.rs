use super::store::{HistoryStore, RateHistory, StoreError};
use std::io::ErrorKind;
use std::sync::{Mutex, PoisonError};

/// In-process store holding the raw serialized string.
#[derive(Default)]
pub struct MemoryHistoryStore {
    raw: Mutex<Option<String>>,
    read_only: bool,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            read_only: false,
        }
    }

    // Every save fails, like a full or locked-down storage area
    pub fn read_only() -> Self {
        Self {
            raw: Mutex::new(None),
            read_only: true,
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<RateHistory, StoreError> {
        match self.raw.lock().unwrap_or_else(PoisonError::into_inner).as_deref() {
            Some(raw) => RateHistory::parse(raw),
            None => Ok(RateHistory::default()),
        }
    }

    fn save(&self, history: &RateHistory) -> Result<(), StoreError> {
        if self.read_only {
            return Err(std::io::Error::new(ErrorKind::PermissionDenied, "history store is read-only").into());
        }
        let raw = serde_json::to_string(history)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }
}

#[test]
fn read_only_memory_store_fails_saves() {
    let store = MemoryHistoryStore::read_only();
    assert!(store.save(&RateHistory::default()).is_err());
    assert_eq!(store.raw(), None);
}
