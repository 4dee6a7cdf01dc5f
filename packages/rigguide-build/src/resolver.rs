//! Incremental build planning.
//!
//! Given the explicitly requested keys, the prior build records, and the
//! reference graph discovered from the guide, the resolver partitions the
//! known components into three pairwise-disjoint action sets:
//!
//! - `to_build`: requested components, bilateral keys expanded into their
//!   concrete left/right instances;
//! - `to_refresh_attributes`: already-built components holding a UI-host
//!   reference into the build set (their CreateAttributes must re-run so
//!   hosted controls land on the rebuilt target);
//! - `to_reconnect`: already-built components holding a structural
//!   reference into the build set (their ConnectSystem must re-run).
//!
//! Classification is UI-host-first: a component with both kinds of
//! reference into the build set lands in `to_refresh_attributes` only.
//! Edge direction matters throughout — only *dependents* of something
//! rebuilt are touched, never the things it depends on.

use crate::component::ComponentInstance;
use crate::error::{BuildError, Result};
use crate::registry::ComponentRegistry;
use crate::split;
use rigguide_model::{
    BuildRecord, ComponentDescriptor, ComponentKey, Guide, RefKind, Side,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Disjoint action sets for one run. Iteration order within each map is
/// intentionally unordered; phase barriers are what make execution safe.
pub struct BuildPlan {
    pub to_build: HashMap<ComponentKey, ComponentInstance>,
    pub to_refresh_attributes: HashMap<ComponentKey, ComponentInstance>,
    pub to_reconnect: HashMap<ComponentKey, ComponentInstance>,
}

impl BuildPlan {
    pub fn is_empty(&self) -> bool {
        self.to_build.is_empty()
            && self.to_refresh_attributes.is_empty()
            && self.to_reconnect.is_empty()
    }
}

/// Partition the known components into action sets for one run.
///
/// # Errors
///
/// - `UnknownComponent` when a requested key has no descriptor (a concrete
///   side of an existing bilateral descriptor is resolved through the
///   splitter instead of failing);
/// - `UnknownType` when a participating descriptor's type tag is not
///   registered.
pub fn resolve(
    requested: &[ComponentKey],
    guide: &Guide,
    prior_records: &HashMap<ComponentKey, BuildRecord>,
    registry: &ComponentRegistry,
) -> Result<BuildPlan> {
    let mut to_build: HashMap<ComponentKey, ComponentInstance> = HashMap::new();

    for key in requested {
        for (descriptor, was_split) in resolve_requested(key, guide)? {
            to_build.insert(
                descriptor.key(),
                ComponentInstance::new(descriptor, registry, was_split)?,
            );
        }
    }

    let mut to_refresh_attributes = HashMap::new();
    let mut to_reconnect = HashMap::new();

    for (key, record) in prior_records {
        if to_build.contains_key(key) {
            continue;
        }

        let descriptor = match recorded_descriptor(key, record, guide) {
            Some(d) => d,
            None => {
                warn!(component = %key, "stale build record, descriptor missing; skipping");
                continue;
            }
        };

        let ui_hit = hits_build_set(&descriptor, RefKind::UiHost, &to_build);
        let structural_hit = hits_build_set(&descriptor, RefKind::Structural, &to_build);

        if ui_hit {
            debug!(component = %key, "classified for attribute refresh");
            to_refresh_attributes.insert(
                key.clone(),
                ComponentInstance::new(descriptor, registry, record.split_from_bilateral)?,
            );
        } else if structural_hit {
            debug!(component = %key, "classified for reconnect");
            to_reconnect.insert(
                key.clone(),
                ComponentInstance::new(descriptor, registry, record.split_from_bilateral)?,
            );
        }
    }

    Ok(BuildPlan {
        to_build,
        to_refresh_attributes,
        to_reconnect,
    })
}

/// Resolve one requested key into concrete descriptors.
fn resolve_requested(
    key: &ComponentKey,
    guide: &Guide,
) -> Result<Vec<(ComponentDescriptor, bool)>> {
    if let Some(descriptor) = guide.find(key) {
        if descriptor.is_bilateral() {
            let pair = split::split(descriptor)?;
            return Ok(vec![(pair.left, true), (pair.right, true)]);
        }
        return Ok(vec![(descriptor.clone(), false)]);
    }

    // A concrete side of a bilateral descriptor may be requested directly.
    if matches!(key.side, Side::Left | Side::Right) {
        let bilateral = key.with_side(Side::Bilateral);
        if let Some(descriptor) = guide.find(&bilateral) {
            let pair = split::split(descriptor)?;
            let side = pair
                .side(key.side)
                .ok_or_else(|| BuildError::UnknownComponent(key.clone()))?;
            return Ok(vec![(side.clone(), true)]);
        }
    }

    Err(BuildError::UnknownComponent(key.clone()))
}

/// Descriptor for a recorded component, re-derived through the splitter for
/// split records (the record only stores one side's metadata plus the flag;
/// the retargeted references live on the derived side).
fn recorded_descriptor(
    key: &ComponentKey,
    record: &BuildRecord,
    guide: &Guide,
) -> Option<ComponentDescriptor> {
    if record.split_from_bilateral {
        let bilateral = key.with_side(Side::Bilateral);
        let descriptor = guide.find(&bilateral)?;
        let pair = split::split(descriptor).ok()?;
        return pair.side(key.side).cloned();
    }
    guide.find(key).cloned()
}

/// Does any outgoing reference of the given kind point into the build set?
///
/// A bilateral target key counts when either of its derived concrete keys
/// is being built.
fn hits_build_set(
    descriptor: &ComponentDescriptor,
    kind: RefKind,
    to_build: &HashMap<ComponentKey, ComponentInstance>,
) -> bool {
    descriptor.connections.values().any(|reference| {
        reference.kind == kind
            && reference
                .target
                .as_ref()
                .map(|target| target_in_build(target, to_build))
                .unwrap_or(false)
    })
}

fn target_in_build(
    target: &ComponentKey,
    to_build: &HashMap<ComponentKey, ComponentInstance>,
) -> bool {
    if to_build.contains_key(target) {
        return true;
    }
    target.is_bilateral()
        && (to_build.contains_key(&target.with_side(Side::Left))
            || to_build.contains_key(&target.with_side(Side::Right)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PhaseContext;
    use crate::registry::{ComponentBehavior, TypeSpec};
    use rigguide_model::{ConnectionRef, Settings};
    use std::sync::Arc;

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
        r.register(TypeSpec::new("chain", 1).with_slot("end"), Arc::new(NoopBehavior));
        r.register(TypeSpec::new("spine", 1).with_slot("end"), Arc::new(NoopBehavior));
        r
    }

    fn key(s: &str) -> ComponentKey {
        s.parse().unwrap()
    }

    fn record_for(k: &str, split_flag: bool) -> (ComponentKey, BuildRecord) {
        let k = key(k);
        (
            k.clone(),
            BuildRecord::new(k, Settings::new(), split_flag),
        )
    }

    /// Spine_M built; Arm_X references Spine_M. The arm depends on the
    /// spine, not the other way round.
    fn arm_spine_guide() -> Guide {
        let mut guide = Guide::new();
        guide.add_component(
            "body",
            ComponentDescriptor::new("Spine", Side::Middle, "spine"),
        );
        guide.add_component(
            "body",
            ComponentDescriptor::new("Arm", Side::Bilateral, "chain")
                .with_connection("root", ConnectionRef::structural(key("Spine_M"), "end")),
        );
        guide
    }

    #[test]
    fn test_requested_bilateral_expands() {
        let guide = arm_spine_guide();
        let plan = resolve(&[key("Arm_X")], &guide, &HashMap::new(), &registry()).unwrap();

        assert_eq!(plan.to_build.len(), 2);
        assert!(plan.to_build.contains_key(&key("Arm_L")));
        assert!(plan.to_build.contains_key(&key("Arm_R")));
        assert!(plan.to_build[&key("Arm_L")].split_from_bilateral());
    }

    #[test]
    fn test_requested_concrete_side_of_bilateral() {
        let guide = arm_spine_guide();
        let plan = resolve(&[key("Arm_L")], &guide, &HashMap::new(), &registry()).unwrap();

        assert_eq!(plan.to_build.len(), 1);
        assert!(plan.to_build.contains_key(&key("Arm_L")));
    }

    #[test]
    fn test_unknown_requested_key() {
        let guide = arm_spine_guide();
        let result = resolve(&[key("Tail_M")], &guide, &HashMap::new(), &registry());
        assert!(matches!(result, Err(BuildError::UnknownComponent(_))));
    }

    /// Spine_M has no outgoing reference to the arm, so rebuilding the arm
    /// leaves the spine untouched: edge direction matters.
    #[test]
    fn test_dependency_edge_direction() {
        let guide = arm_spine_guide();
        let prior: HashMap<_, _> = [record_for("Spine_M", false)].into_iter().collect();

        let plan = resolve(&[key("Arm_X")], &guide, &prior, &registry()).unwrap();

        assert!(plan.to_reconnect.is_empty());
        assert!(plan.to_refresh_attributes.is_empty());
    }

    /// Give the spine an outgoing structural reference to the bilateral arm:
    /// now it is a dependent and must reconnect when the arm rebuilds.
    #[test]
    fn test_dependent_moves_to_reconnect() {
        let mut guide = Guide::new();
        guide.add_component(
            "body",
            ComponentDescriptor::new("Spine", Side::Middle, "spine")
                .with_connection("follow", ConnectionRef::structural(key("Arm_X"), "root")),
        );
        guide.add_component(
            "body",
            ComponentDescriptor::new("Arm", Side::Bilateral, "chain"),
        );
        let prior: HashMap<_, _> = [record_for("Spine_M", false)].into_iter().collect();

        let plan = resolve(&[key("Arm_X")], &guide, &prior, &registry()).unwrap();

        assert!(plan.to_reconnect.contains_key(&key("Spine_M")));
        assert!(plan.to_refresh_attributes.is_empty());
    }

    /// UI-host-first tie-break: both reference kinds into the build set
    /// yields an attribute refresh only.
    #[test]
    fn test_ui_host_wins_over_structural() {
        let mut guide = Guide::new();
        guide.add_component("body", ComponentDescriptor::new("B", Side::Middle, "chain"));
        guide.add_component("body", ComponentDescriptor::new("C", Side::Middle, "chain"));
        guide.add_component(
            "body",
            ComponentDescriptor::new("A", Side::Middle, "chain")
                .with_connection("host", ConnectionRef::ui_host(key("B_M")))
                .with_connection("root", ConnectionRef::structural(key("C_M"), "end")),
        );
        let prior: HashMap<_, _> = [record_for("A_M", false)].into_iter().collect();

        let plan = resolve(&[key("B_M"), key("C_M")], &guide, &prior, &registry()).unwrap();

        assert!(plan.to_refresh_attributes.contains_key(&key("A_M")));
        assert!(!plan.to_reconnect.contains_key(&key("A_M")));
    }

    /// A UI-host reference to a target that is not being rebuilt triggers
    /// nothing, even when the component has other, unrelated references.
    #[test]
    fn test_no_dependency_no_action() {
        let mut guide = Guide::new();
        guide.add_component("body", ComponentDescriptor::new("B", Side::Middle, "chain"));
        guide.add_component("body", ComponentDescriptor::new("D", Side::Middle, "chain"));
        guide.add_component(
            "body",
            ComponentDescriptor::new("A", Side::Middle, "chain")
                .with_connection("host", ConnectionRef::ui_host(key("D_M"))),
        );
        let prior: HashMap<_, _> = [record_for("A_M", false), record_for("D_M", false)]
            .into_iter()
            .collect();

        let plan = resolve(&[key("B_M")], &guide, &prior, &registry()).unwrap();

        assert!(plan.to_refresh_attributes.is_empty());
        assert!(plan.to_reconnect.is_empty());
    }

    /// Split records are re-derived through the splitter, so their
    /// classification sees the side-retargeted references.
    #[test]
    fn test_split_record_rederived_before_classification() {
        let mut guide = Guide::new();
        guide.add_component(
            "body",
            ComponentDescriptor::new("Hand", Side::Bilateral, "chain"),
        );
        guide.add_component(
            "body",
            ComponentDescriptor::new("Arm", Side::Bilateral, "chain")
                .with_connection("hand", ConnectionRef::structural(key("Hand_X"), "root")),
        );
        let prior: HashMap<_, _> = [record_for("Arm_L", true), record_for("Arm_R", true)]
            .into_iter()
            .collect();

        let plan = resolve(&[key("Hand_X")], &guide, &prior, &registry()).unwrap();

        assert!(plan.to_reconnect.contains_key(&key("Arm_L")));
        assert!(plan.to_reconnect.contains_key(&key("Arm_R")));
    }

    #[test]
    fn test_stale_record_skipped() {
        let guide = arm_spine_guide();
        let prior: HashMap<_, _> = [record_for("Ghost_M", false)].into_iter().collect();

        let plan = resolve(&[key("Arm_X")], &guide, &prior, &registry()).unwrap();

        assert!(plan.to_refresh_attributes.is_empty());
        assert!(plan.to_reconnect.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Random flat guides: a handful of middle-side components with
        /// random references at random kinds, a random requested subset,
        /// and records for everyone.
        fn arbitrary_case() -> impl Strategy<
            Value = (Guide, Vec<ComponentKey>, HashMap<ComponentKey, BuildRecord>),
        > {
            let names = prop::collection::vec(0usize..6, 1..6);
            (names, prop::collection::vec((0usize..6, 0usize..6, prop::bool::ANY), 0..10))
                .prop_map(|(requested_idx, edges)| {
                    let mut guide = Guide::new();
                    let all: Vec<ComponentKey> = (0..6)
                        .map(|i| ComponentKey::new(format!("C{}", i), Side::Middle))
                        .collect();

                    let mut descriptors: Vec<ComponentDescriptor> = all
                        .iter()
                        .map(|k| ComponentDescriptor::new(k.name.clone(), Side::Middle, "chain"))
                        .collect();

                    for (port_idx, (from, to, ui)) in edges.into_iter().enumerate() {
                        if from == to {
                            continue;
                        }
                        let reference = if ui {
                            ConnectionRef::ui_host(all[to].clone())
                        } else {
                            ConnectionRef::structural(all[to].clone(), "end")
                        };
                        descriptors[from]
                            .connections
                            .insert(format!("port{}", port_idx), reference);
                    }
                    for descriptor in descriptors {
                        guide.add_component("main", descriptor);
                    }

                    let requested: Vec<ComponentKey> = requested_idx
                        .into_iter()
                        .map(|i| all[i].clone())
                        .collect();

                    let prior: HashMap<ComponentKey, BuildRecord> = all
                        .iter()
                        .map(|k| {
                            (k.clone(), BuildRecord::new(k.clone(), Settings::new(), false))
                        })
                        .collect();

                    (guide, requested, prior)
                })
        }

        proptest! {
            #[test]
            fn action_sets_are_pairwise_disjoint(
                (guide, requested, prior) in arbitrary_case()
            ) {
                let plan = resolve(&requested, &guide, &prior, &registry()).unwrap();

                for k in plan.to_build.keys() {
                    prop_assert!(!plan.to_refresh_attributes.contains_key(k));
                    prop_assert!(!plan.to_reconnect.contains_key(k));
                }
                for k in plan.to_refresh_attributes.keys() {
                    prop_assert!(!plan.to_reconnect.contains_key(k));
                }
                for k in &requested {
                    prop_assert!(plan.to_build.contains_key(k));
                }
            }
        }
    }
}
