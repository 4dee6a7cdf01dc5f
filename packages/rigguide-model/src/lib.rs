//! Declarative guide document model.
//!
//! A *guide* is the serializable description of everything the build
//! orchestrator consumes: an ordered forest of layers holding component
//! descriptors (settings + typed connection references), global guide
//! settings, and the persisted build-state snapshot from previous runs.
//!
//! This package is a leaf: it knows nothing about scenes, phases beyond
//! their names, or how a build is scheduled. The orchestrator lives in
//! `rigguide-build`.

pub mod descriptor;
pub mod error;
pub mod guide;
pub mod phase;
pub mod record;

pub use descriptor::{
    ComponentDescriptor, ComponentKey, ConnectionRef, RefKind, Settings, Side,
};
pub use error::{ModelError, Result};
pub use guide::{Guide, GuideSettings, Layer, FORMAT_VERSION};
pub use phase::Phase;
pub use record::BuildRecord;
