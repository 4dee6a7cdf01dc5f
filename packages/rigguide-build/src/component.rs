use crate::error::Result;
use crate::registry::{ComponentRegistry, RegisteredType};
use rigguide_model::{ComponentDescriptor, ComponentKey, Settings, Side};
use std::sync::Arc;

/// Runtime wrapper around one resolved, non-bilateral descriptor.
///
/// Construction has no side effects and takes an owned settings snapshot
/// (a deep copy of the descriptor's map); nothing here aliases the guide
/// document. Side effects happen only when the executor invokes a phase.
pub struct ComponentInstance {
    descriptor: ComponentDescriptor,
    settings: Settings,
    registered: Arc<RegisteredType>,
    /// True when this instance was derived from a bilateral descriptor.
    split_from_bilateral: bool,
}

impl ComponentInstance {
    pub fn new(
        descriptor: ComponentDescriptor,
        registry: &ComponentRegistry,
        split_from_bilateral: bool,
    ) -> Result<Self> {
        debug_assert_ne!(descriptor.side, Side::Bilateral);
        let registered = registry.get(&descriptor.type_tag)?;
        let settings = descriptor.settings.clone();
        Ok(Self {
            descriptor,
            settings,
            registered,
            split_from_bilateral,
        })
    }

    pub fn key(&self) -> ComponentKey {
        self.descriptor.key()
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Writers replace the snapshot wholesale instead of mutating a shared
    /// map.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn registered(&self) -> &Arc<RegisteredType> {
        &self.registered
    }

    pub fn split_from_bilateral(&self) -> bool {
        self.split_from_bilateral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ComponentBehavior, TypeSpec};
    use crate::executor::PhaseContext;

    struct NoopBehavior;

    impl ComponentBehavior for NoopBehavior {
        fn create_objects(&self, _cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()> {
            Ok(())
        }

        fn create_attributes(&self, _cx: &mut PhaseContext<'_, '_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registry() -> ComponentRegistry {
        let mut r = ComponentRegistry::new();
        r.register(TypeSpec::new("chain", 1), Arc::new(NoopBehavior));
        r
    }

    #[test]
    fn test_instance_owns_settings_snapshot() {
        let registry = registry();
        let desc = ComponentDescriptor::new("Arm", Side::Left, "chain")
            .with_setting("joints", serde_json::json!(3));

        let mut instance = ComponentInstance::new(desc.clone(), &registry, true).unwrap();

        let mut updated = instance.settings().clone();
        updated.insert("joints".to_string(), serde_json::json!(5));
        instance.set_settings(updated);

        // The descriptor's map is untouched by the snapshot write.
        assert_eq!(instance.descriptor().settings["joints"], 3);
        assert_eq!(instance.settings()["joints"], 5);
        assert!(instance.split_from_bilateral());
    }

    #[test]
    fn test_instance_rejects_unknown_type() {
        let registry = registry();
        let desc = ComponentDescriptor::new("Arm", Side::Left, "no_such_type");
        assert!(ComponentInstance::new(desc, &registry, false).is_err());
    }
}
