//! Scene collaborator boundary.
//!
//! The orchestrator never talks to a concrete 3D engine; it depends only on
//! the capabilities below. The collaborator is assumed non-reentrant, which
//! is why the executor drives it strictly sequentially.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Opaque handle to a generated scene object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub String);

impl ObjectHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to an attribute on a scene object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrHandle {
    pub host: ObjectHandle,
    pub name: String,
}

impl AttrHandle {
    pub fn new(host: ObjectHandle, name: impl Into<String>) -> Self {
        Self {
            host,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for AttrHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.host, self.name)
    }
}

/// Placement of a generated object. Carried through untouched; the domain
/// math that computes it is outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub translate: [f64; 3],
    pub rotate: [f64; 3],
    pub scale: [f64; 3],
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            translate: [0.0; 3],
            rotate: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Capability surface of the external scene collaborator.
///
/// Non-reentrant: callers must not interleave phase executions across
/// components while a call is in flight.
pub trait SceneBackend {
    fn create_object(
        &mut self,
        kind: &str,
        parent: Option<&ObjectHandle>,
        placement: Placement,
    ) -> Result<ObjectHandle>;

    fn create_attribute(
        &mut self,
        host: &ObjectHandle,
        name: &str,
        ty: AttrType,
        default: AttrValue,
    ) -> Result<AttrHandle>;

    fn connect_attribute(&mut self, src: &AttrHandle, dst: &AttrHandle) -> Result<()>;

    fn parent(&mut self, child: &ObjectHandle, parent: &ObjectHandle) -> Result<()>;

    /// Delete an object and everything parented under it.
    fn delete_subtree(&mut self, handle: &ObjectHandle) -> Result<()>;

    fn delete_attribute(&mut self, host: &ObjectHandle, name: &str) -> Result<()>;
}
