//! Closed component type registry.
//!
//! Type tags resolve against a registry populated at startup; there is no
//! name-constructed dynamic lookup. A registered type bundles its
//! declarative spec (which ports accept which reference kinds, which slots
//! it exposes) with the behavior object carrying the out-of-scope
//! procedural math for each scene-touching phase.

use crate::error::{BuildError, Result};
use crate::executor::PhaseContext;
use rigguide_model::RefKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Slot every component type exposes implicitly; the fallback endpoint for
/// unresolved slot references.
pub const ROOT_SLOT: &str = "root";

/// Declarative spec of a component type.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub tag: &'static str,
    pub version: u32,
    /// Port name -> reference kind the port accepts.
    pub ports: HashMap<&'static str, RefKind>,
    /// Named output slots other components may reference. `root` is always
    /// present.
    pub slots: Vec<&'static str>,
}

impl TypeSpec {
    pub fn new(tag: &'static str, version: u32) -> Self {
        Self {
            tag,
            version,
            ports: HashMap::new(),
            slots: vec![ROOT_SLOT],
        }
    }

    pub fn with_port(mut self, name: &'static str, kind: RefKind) -> Self {
        self.ports.insert(name, kind);
        self
    }

    pub fn with_slot(mut self, name: &'static str) -> Self {
        if !self.slots.contains(&name) {
            self.slots.push(name);
        }
        self
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.iter().any(|s| *s == name)
    }
}

/// Per-phase procedural behavior of one component type.
///
/// Implementations live outside this crate (kinematic chain placement,
/// curve math, ...). Errors raised here abort the whole run.
///
/// `CreateOperators` may only address the component's own staged objects
/// and attributes; `ConnectSystem` is the one phase allowed to resolve
/// slots on other components.
pub trait ComponentBehavior: Send + Sync {
    fn create_objects(&self, cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()>;

    fn create_attributes(&self, cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()>;

    fn create_operators(&self, _cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn connect_system(&self, _cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A registered component type: spec + behavior.
pub struct RegisteredType {
    pub spec: TypeSpec,
    pub behavior: Arc<dyn ComponentBehavior>,
}

/// Registry mapping type tags to registered types. Populated once at
/// startup; lookups after that never construct names dynamically.
#[derive(Default)]
pub struct ComponentRegistry {
    types: HashMap<&'static str, Arc<RegisteredType>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: TypeSpec, behavior: Arc<dyn ComponentBehavior>) {
        self.types
            .insert(spec.tag, Arc::new(RegisteredType { spec, behavior }));
    }

    pub fn get(&self, tag: &str) -> Result<Arc<RegisteredType>> {
        self.types
            .get(tag)
            .cloned()
            .ok_or_else(|| BuildError::UnknownType(tag.to_string()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopBehavior;

    impl ComponentBehavior for NoopBehavior {
        fn create_objects(&self, _cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()> {
            Ok(())
        }

        fn create_attributes(&self, _cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_type_spec_root_slot_always_present() {
        let spec = TypeSpec::new("chain", 1).with_slot("end");
        assert!(spec.has_slot(ROOT_SLOT));
        assert!(spec.has_slot("end"));
        assert!(!spec.has_slot("mid"));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ComponentRegistry::new();
        registry.register(
            TypeSpec::new("chain", 1).with_port("root", RefKind::Structural),
            Arc::new(NoopBehavior),
        );

        assert_eq!(registry.len(), 1);
        assert!(registry.get("chain").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(BuildError::UnknownType(_))
        ));
    }
}
