use crate::descriptor::{ComponentKey, Settings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted metadata for one built component.
///
/// Created on the first successful build of a component, replaced on every
/// successful rebuild, removed on deletion. The recorded object and
/// attribute name lists are what teardown removes; nothing else is queried
/// from the scene at delete time.
///
/// A `Bilateral` key never appears in a record: bilateral components are
/// only ever recorded as their two concrete `Left`/`Right` instances, each
/// flagged `split_from_bilateral`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub key: ComponentKey,
    /// Settings exactly as last applied.
    pub settings: Settings,
    /// True when this concrete instance was derived from a bilateral
    /// descriptor; classification re-derives the split from the shared
    /// descriptor before reading the connections.
    #[serde(default)]
    pub split_from_bilateral: bool,
    /// Root object handles created during the last CreateObjects phase.
    #[serde(default)]
    pub objects: Vec<String>,
    /// Attribute names created during the last CreateAttributes phase.
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Slot name -> object handle, as exposed by the last build. Later
    /// runs resolve references into this component without querying the
    /// scene.
    #[serde(default)]
    pub slots: HashMap<String, String>,
    pub built_at: DateTime<Utc>,
}

impl BuildRecord {
    pub fn new(key: ComponentKey, settings: Settings, split_from_bilateral: bool) -> Self {
        Self {
            key,
            settings,
            split_from_bilateral,
            objects: Vec::new(),
            attributes: Vec::new(),
            slots: HashMap::new(),
            built_at: Utc::now(),
        }
    }
}
