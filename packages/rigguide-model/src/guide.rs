//! The guide document: layer forest, global settings, build state snapshot.
//!
//! # Adapter surface
//!
//! The build orchestrator only ever reads the guide through the adapter
//! methods here (`components`, `find`, `connections`, `build_state`).
//! Mutations flow through `BuildStateStore` commits and the explicit
//! descriptor editing calls used by the delete path.
//!
//! # Persistence
//!
//! The whole document serializes to a single versioned JSON payload. The
//! payload is stored as an opaque string on the generated root artifact and
//! optionally exported to a standalone file.

use crate::descriptor::{ComponentDescriptor, ComponentKey, ConnectionRef};
use crate::error::{ModelError, Result};
use crate::phase::Phase;
use crate::record::BuildRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current document format version. Bumped on breaking layout changes.
pub const FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Global guide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuideSettings {
    /// External hook source run once per built component before any scene
    /// mutation.
    #[serde(default)]
    pub pre_script: Option<String>,
    /// External hook source run once per built component after everything
    /// else.
    #[serde(default)]
    pub post_script: Option<String>,
    /// Default display colors per side tag.
    #[serde(default)]
    pub side_colors: HashMap<String, [f32; 3]>,
    /// Debug truncation point: halt after this phase's barrier. Completed
    /// phases keep their artifacts; the build state is not updated at all.
    #[serde(default)]
    pub stop_after: Option<Phase>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Named grouping of components and sub-layers.
///
/// Purely organizational: layers carry no build semantics beyond supplying
/// the default build-all traversal order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
    #[serde(default)]
    pub children: Vec<Layer>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a ComponentDescriptor>) {
        out.extend(self.components.iter());
        for child in &self.children {
            child.visit(out);
        }
    }
}

/// Root document. One guide per editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub settings: GuideSettings,
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Build state snapshot: component key -> last successful build record.
    #[serde(default)]
    pub build_state: HashMap<ComponentKey, BuildRecord>,
}

impl Guide {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            ..Default::default()
        }
    }

    /// All descriptors, depth-first in document order. This is the default
    /// build-all traversal.
    pub fn components(&self) -> Vec<&ComponentDescriptor> {
        let mut out = Vec::new();
        for layer in &self.layers {
            layer.visit(&mut out);
        }
        out
    }

    pub fn find(&self, key: &ComponentKey) -> Option<&ComponentDescriptor> {
        self.components().into_iter().find(|c| &c.key() == key)
    }

    /// Connection references of one component, by port name.
    pub fn connections(&self, key: &ComponentKey) -> Option<&HashMap<String, ConnectionRef>> {
        self.find(key).map(|c| &c.connections)
    }

    pub fn build_state(&self) -> &HashMap<ComponentKey, BuildRecord> {
        &self.build_state
    }

    /// Add a descriptor to a named top-level layer, creating it on demand.
    pub fn add_component(&mut self, layer_name: &str, descriptor: ComponentDescriptor) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.name == layer_name) {
            layer.components.push(descriptor);
            return;
        }
        let mut layer = Layer::new(layer_name);
        layer.components.push(descriptor);
        self.layers.push(layer);
    }

    /// Remove a descriptor anywhere in the layer forest. Returns it if found.
    pub fn remove_component(&mut self, key: &ComponentKey) -> Option<ComponentDescriptor> {
        fn remove_in(layer: &mut Layer, key: &ComponentKey) -> Option<ComponentDescriptor> {
            if let Some(pos) = layer.components.iter().position(|c| &c.key() == key) {
                return Some(layer.components.remove(pos));
            }
            layer
                .children
                .iter_mut()
                .find_map(|child| remove_in(child, key))
        }
        self.layers
            .iter_mut()
            .find_map(|layer| remove_in(layer, key))
    }

    /// Serialize to the versioned JSON payload.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ModelError::corrupt)
    }

    /// Parse a payload produced by [`Guide::to_payload`].
    pub fn from_payload(payload: &str) -> Result<Self> {
        let guide: Guide = serde_json::from_str(payload).map_err(ModelError::corrupt)?;
        if guide.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: guide.format_version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(guide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ConnectionRef, Side};

    fn sample_guide() -> Guide {
        let mut guide = Guide::new();
        guide.add_component(
            "body",
            ComponentDescriptor::new("Spine", Side::Middle, "spine"),
        );
        guide.add_component(
            "body",
            ComponentDescriptor::new("Arm", Side::Bilateral, "chain").with_connection(
                "root",
                ConnectionRef::structural(ComponentKey::new("Spine", Side::Middle), "end"),
            ),
        );
        let mut face = Layer::new("face");
        face.components
            .push(ComponentDescriptor::new("Jaw", Side::Bottom, "chain"));
        guide.layers.push(face);
        guide
    }

    #[test]
    fn test_components_traversal_order() {
        let guide = sample_guide();
        let keys: Vec<String> = guide
            .components()
            .iter()
            .map(|c| c.key().to_string())
            .collect();
        assert_eq!(keys, vec!["Spine_M", "Arm_X", "Jaw_B"]);
    }

    #[test]
    fn test_find_and_connections() {
        let guide = sample_guide();
        let key = ComponentKey::new("Arm", Side::Bilateral);
        assert!(guide.find(&key).is_some());
        let conns = guide.connections(&key).unwrap();
        assert_eq!(conns.len(), 1);
        assert!(guide
            .connections(&ComponentKey::new("Missing", Side::Middle))
            .is_none());
    }

    #[test]
    fn test_remove_component_nested() {
        let mut guide = sample_guide();
        let key = ComponentKey::new("Jaw", Side::Bottom);
        let removed = guide.remove_component(&key).unwrap();
        assert_eq!(removed.key(), key);
        assert!(guide.find(&key).is_none());
        assert!(guide.remove_component(&key).is_none());
    }

    #[test]
    fn test_payload_roundtrip() {
        let guide = sample_guide();
        let payload = guide.to_payload().unwrap();
        let back = Guide::from_payload(&payload).unwrap();
        assert_eq!(back, guide);
    }

    #[test]
    fn test_payload_rejects_corrupt() {
        assert!(matches!(
            Guide::from_payload("not json at all"),
            Err(ModelError::Corrupt(_))
        ));
    }

    #[test]
    fn test_payload_rejects_future_version() {
        let mut guide = sample_guide();
        guide.format_version = 99;
        let payload = serde_json::to_string(&guide).unwrap();
        assert!(matches!(
            Guide::from_payload(&payload),
            Err(ModelError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
