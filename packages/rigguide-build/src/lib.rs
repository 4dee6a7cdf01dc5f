/*
 * rigguide-build - incremental guide-build orchestrator
 *
 * Compiles a declarative guide (rigguide-model) into a generated artifact
 * tree through a fixed sequence of construction phases with global
 * barriers, rebuilding only what an edit actually requires.
 *
 * Architecture:
 * - Symmetry splitter (bilateral -> left/right expansion)
 * - Dependency resolver (disjoint action sets from the reference graph)
 * - Staged executor (phase barriers, fail-fast, compensating teardown)
 * - Build state store (persisted records driving incremental decisions)
 * - Scene backend boundary (the external, non-reentrant collaborator)
 */

pub mod builder;
pub mod component;
pub mod error;
pub mod executor;
pub mod memory;
pub mod registry;
pub mod resolver;
pub mod scene;
pub mod split;
pub mod store;

pub use builder::{BuildReport, DeleteReport, GuideBuilder};
pub use component::ComponentInstance;
pub use error::{BuildError, Result};
pub use executor::{
    BuildOptions, ComponentStaging, PhaseContext, RunReport, ScriptContext, ScriptHook,
    StagedExecutor,
};
pub use memory::MemoryScene;
pub use registry::{ComponentBehavior, ComponentRegistry, RegisteredType, TypeSpec, ROOT_SLOT};
pub use resolver::{resolve, BuildPlan};
pub use scene::{AttrHandle, AttrType, AttrValue, ObjectHandle, Placement, SceneBackend};
pub use split::{split, SplitPair};
pub use store::BuildStateStore;
