//! Persisted build state.
//!
//! Source of truth for incremental decisions and for teardown. Records are
//! keyed by the compact component key form and kept sorted, so the
//! serialized payload is canonical: loading a payload and re-serializing it
//! yields the identical string.
//!
//! Commit discipline: the driver commits only after a fully successful,
//! non-truncated executor run. An aborted or stopped-early run leaves the
//! store byte-for-byte unchanged.

use crate::error::{BuildError, Result};
use rigguide_model::{BuildRecord, ComponentKey};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildStateStore {
    records: BTreeMap<String, BuildRecord>,
}

impl BuildStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: HashMap<ComponentKey, BuildRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Parse a payload produced by [`BuildStateStore::payload`].
    pub fn load(payload: &str) -> Result<Self> {
        let records: BTreeMap<String, BuildRecord> = serde_json::from_str(payload)
            .map_err(|e| BuildError::StoreCorruption(e.to_string()))?;
        Ok(Self { records })
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let payload = std::fs::read_to_string(path)?;
        Self::load(&payload)
    }

    pub fn get(&self, key: &ComponentKey) -> Option<&BuildRecord> {
        self.records.get(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owned snapshot keyed by component key, the shape the resolver reads.
    pub fn snapshot(&self) -> HashMap<ComponentKey, BuildRecord> {
        self.records
            .values()
            .map(|record| (record.key.clone(), record.clone()))
            .collect()
    }

    /// Merge new or updated records. Same-key records are replaced;
    /// unrelated keys are never dropped.
    pub fn commit(&mut self, records: Vec<BuildRecord>) {
        info!(count = records.len(), "committing build records");
        for record in records {
            debug!(component = %record.key, "record committed");
            self.records.insert(record.key.to_string(), record);
        }
    }

    /// Drop one record. Must only be called after the corresponding
    /// generated artifacts have been torn down.
    pub fn remove(&mut self, key: &ComponentKey) -> Option<BuildRecord> {
        self.records.remove(&key.to_string())
    }

    /// Canonical JSON snapshot, stored as an opaque string payload on the
    /// generated root artifact.
    pub fn payload(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records)
            .map_err(|e| BuildError::StoreCorruption(e.to_string()))
    }

    /// Standalone file export. Written to a sibling temp file first, then
    /// renamed into place, so a crash never leaves a torn file.
    pub fn export(&self, path: &Path) -> Result<()> {
        let payload = self.payload()?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
