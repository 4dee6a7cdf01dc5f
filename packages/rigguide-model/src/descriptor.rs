//! Component descriptors and connection references.
//!
//! A descriptor is one node of the build graph: a typed, versioned
//! procedural unit identified by `(name, side)`, carrying an owned settings
//! map and a port-keyed map of connection references to other components.
//! Edges of the graph are discovered from these references, not from any
//! static structure.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placement side of a component.
///
/// `Bilateral` never reaches the executor directly: it is expanded into two
/// concrete `Left`/`Right` instances before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Middle,
    Left,
    Right,
    Top,
    Bottom,
    Bilateral,
}

impl Side {
    /// One-letter tag used in the compact key form (`Arm_L`, `Spine_M`).
    pub fn tag(&self) -> &'static str {
        match self {
            Side::Middle => "M",
            Side::Left => "L",
            Side::Right => "R",
            Side::Top => "T",
            Side::Bottom => "B",
            Side::Bilateral => "X",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "M" => Ok(Side::Middle),
            "L" => Ok(Side::Left),
            "R" => Ok(Side::Right),
            "T" => Ok(Side::Top),
            "B" => Ok(Side::Bottom),
            "X" => Ok(Side::Bilateral),
            _ => Err(ModelError::parse(format!("invalid side tag: {}", tag))),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Unique component identity: `(name, side)`.
///
/// Serialized in the compact `name_tag` form so keys stay readable in the
/// persisted document and usable as JSON map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentKey {
    pub name: String,
    pub side: Side,
}

impl ComponentKey {
    pub fn new(name: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            side,
        }
    }

    /// Same name, different side.
    pub fn with_side(&self, side: Side) -> Self {
        Self {
            name: self.name.clone(),
            side,
        }
    }

    pub fn is_bilateral(&self) -> bool {
        self.side == Side::Bilateral
    }
}

impl std::fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.name, self.side.tag())
    }
}

impl std::str::FromStr for ComponentKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, tag) = s
            .rsplit_once('_')
            .ok_or_else(|| ModelError::parse(format!("invalid component key: {}", s)))?;
        if name.is_empty() {
            return Err(ModelError::parse(format!("invalid component key: {}", s)));
        }
        Ok(Self {
            name: name.to_string(),
            side: Side::from_tag(tag)?,
        })
    }
}

impl TryFrom<String> for ComponentKey {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ComponentKey> for String {
    fn from(key: ComponentKey) -> Self {
        key.to_string()
    }
}

/// Connection reference kind.
///
/// `UiHost` exposes animatable attributes on a foreign host component and
/// carries no geometric dependency; `Structural` is a real build-order edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Structural,
    UiHost,
}

/// A typed edge from one component's port to another component's slot.
///
/// Unresolved references (no target) are legal: optional inputs stay null
/// until the author wires them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub kind: RefKind,
    #[serde(default)]
    pub target: Option<ComponentKey>,
    #[serde(default)]
    pub slot: Option<String>,
}

impl ConnectionRef {
    pub fn structural(target: ComponentKey, slot: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Structural,
            target: Some(target),
            slot: Some(slot.into()),
        }
    }

    pub fn ui_host(target: ComponentKey) -> Self {
        Self {
            kind: RefKind::UiHost,
            target: Some(target),
            slot: None,
        }
    }

    pub fn unresolved(kind: RefKind) -> Self {
        Self {
            kind,
            target: None,
            slot: None,
        }
    }
}

/// Owned settings snapshot.
///
/// Descriptors own their map; runtime instances receive a deep copy at
/// construction. No live map is ever shared between a descriptor and an
/// instance, or between the two halves of a bilateral split.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// One node of the build graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub side: Side,
    /// Component type tag, resolved against the closed type registry.
    pub type_tag: String,
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    /// Port name -> connection reference.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionRef>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, side: Side, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            side,
            type_tag: type_tag.into(),
            version: 1,
            settings: Settings::new(),
            connections: HashMap::new(),
        }
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.name.clone(), self.side)
    }

    pub fn is_bilateral(&self) -> bool {
        self.side == Side::Bilateral
    }

    pub fn with_setting(mut self, name: &str, value: serde_json::Value) -> Self {
        self.settings.insert(name.to_string(), value);
        self
    }

    pub fn with_connection(mut self, port: &str, reference: ConnectionRef) -> Self {
        self.connections.insert(port.to_string(), reference);
        self
    }
}
