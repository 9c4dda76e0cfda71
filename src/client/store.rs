use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::rate_limit::RateWindowEntry;

// Fixed key the client history is stored under
pub const RATE_STORE_KEY: &str = "portfolio_ai_rate_state_v1";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("history storage unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("history is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable form of the client windows: `{ minuteHits: [...], dayHits: [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateHistory {
    pub minute_hits: Vec<i64>,
    pub day_hits: Vec<i64>,
}

impl RateHistory {
    /// Parse stored history. Fields that aren't arrays read as empty and
    /// non-numeric members are skipped; only unparseable JSON is an error.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self {
            minute_hits: hits(&value, "minuteHits"),
            day_hits: hits(&value, "dayHits"),
        })
    }

    pub fn into_entry(self) -> RateWindowEntry {
        RateWindowEntry {
            minute_hits: self.minute_hits.into(),
            day_hits: self.day_hits.into(),
            last_at: None,
        }
    }

    pub fn from_entry(entry: &RateWindowEntry) -> Self {
        Self {
            minute_hits: entry.minute_hits.iter().copied().collect(),
            day_hits: entry.day_hits.iter().copied().collect(),
        }
    }
}

fn hits(value: &Value, key: &str) -> Vec<i64> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<RateHistory, StoreError>;
    fn save(&self, history: &RateHistory) -> Result<(), StoreError>;
}

/// JSON file named after [`RATE_STORE_KEY`] inside a state directory.
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(format!("{RATE_STORE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self) -> Result<RateHistory, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(RateHistory::default()),
            Ok(raw) => RateHistory::parse(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RateHistory::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, history: &RateHistory) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(history)?)?;
        Ok(())
    }
}
