//! Staged phase execution with global barriers.
//!
//! The phase order is fixed (see [`Phase::ORDER`]): every component in the
//! active batch completes phase *N* before any component begins phase
//! *N+1*. The barrier is what makes `ConnectSystem` safe — a reconnecting
//! component may dereference a freshly rebuilt target because that target's
//! objects, attributes and operators already exist by then.
//!
//! Iteration within a batch is over map order and therefore unordered;
//! nothing here may depend on which component of a batch runs first.
//!
//! Failure is fail-fast: the first failing component aborts the run after
//! compensating teardown of everything staged this run, and the caller
//! never commits the build state for an aborted or truncated run.

use crate::component::ComponentInstance;
use crate::error::{BuildError, Result};
use crate::registry::ROOT_SLOT;
use crate::resolver::BuildPlan;
use crate::scene::{AttrHandle, AttrType, AttrValue, ObjectHandle, Placement, SceneBackend};
use rigguide_model::{BuildRecord, ComponentKey, Phase, Settings, Side};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Context handed to guide-level script hooks.
pub struct ScriptContext<'a> {
    pub run_id: Uuid,
    pub guide_root: &'a ObjectHandle,
    pub component: &'a ComponentKey,
    pub settings: &'a Settings,
}

/// Externally supplied side-effect-only hook.
pub type ScriptHook = Box<dyn Fn(&ScriptContext<'_>) -> anyhow::Result<()>>;

/// Per-run options.
#[derive(Default)]
pub struct BuildOptions {
    /// Halt after this phase's barrier. Inspection aid: completed phases
    /// keep their artifacts, the build state is left untouched.
    pub stop_after: Option<Phase>,
    pub pre_script: Option<ScriptHook>,
    pub post_script: Option<ScriptHook>,
}

/// In-memory staging for one component during one run. Becomes a
/// [`BuildRecord`] only when the whole run succeeds.
#[derive(Debug, Default, Clone)]
pub struct ComponentStaging {
    /// Top-level objects created this run (teardown roots).
    pub objects: Vec<ObjectHandle>,
    pub attributes: Vec<AttrHandle>,
    /// Slot name -> object exposed to other components.
    pub slots: HashMap<String, ObjectHandle>,
}

/// Outcome of one executor run.
pub struct RunReport {
    pub run_id: Uuid,
    /// False when the run was truncated by `stop_after`. The store must not
    /// be committed for an incomplete run.
    pub completed: bool,
    pub records: Vec<BuildRecord>,
    /// Unresolved-reference fallbacks and other recoverable conditions.
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

/// Per-phase view a [`crate::registry::ComponentBehavior`] works through.
///
/// Scene access is funneled here so the executor can record everything a
/// component creates (for build records and compensating teardown) and
/// police the cross-component boundary.
pub struct PhaseContext<'run, 'scene> {
    phase: Phase,
    run_id: Uuid,
    instance: &'run ComponentInstance,
    backend: &'scene mut dyn SceneBackend,
    guide_root: &'run ObjectHandle,
    staging: &'run mut ComponentStaging,
    peer_stagings: &'run HashMap<ComponentKey, ComponentStaging>,
    prior_records: &'run HashMap<ComponentKey, BuildRecord>,
    warnings: &'run mut Vec<String>,
}

impl<'run, 'scene> PhaseContext<'run, 'scene> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn key(&self) -> ComponentKey {
        self.instance.key()
    }

    pub fn settings(&self) -> &Settings {
        self.instance.settings()
    }

    pub fn guide_root(&self) -> &ObjectHandle {
        self.guide_root
    }

    /// Create an object. With no explicit parent the object is parented
    /// under the guide root and tracked as a teardown root of this
    /// component; the first such object also becomes the `root` slot.
    pub fn create_object(
        &mut self,
        kind: &str,
        parent: Option<&ObjectHandle>,
        placement: Placement,
    ) -> Result<ObjectHandle> {
        let effective_parent = parent.unwrap_or(self.guide_root);
        let handle = self
            .backend
            .create_object(kind, Some(effective_parent), placement)?;
        if parent.is_none() {
            self.staging.objects.push(handle.clone());
            self.staging
                .slots
                .entry(ROOT_SLOT.to_string())
                .or_insert_with(|| handle.clone());
        }
        Ok(handle)
    }

    /// Expose an object under a slot name. Undeclared names are accepted
    /// with a warning so a half-edited type spec never blocks a build.
    pub fn register_slot(&mut self, name: &str, handle: &ObjectHandle) {
        if !self.instance.registered().spec.has_slot(name) {
            let msg = format!(
                "{}: registering undeclared slot '{}'",
                self.instance.key(),
                name
            );
            warn!("{}", msg);
            self.warnings.push(msg);
        }
        self.staging.slots.insert(name.to_string(), handle.clone());
    }

    pub fn create_attribute(
        &mut self,
        host: &ObjectHandle,
        name: &str,
        ty: AttrType,
        default: AttrValue,
    ) -> Result<AttrHandle> {
        let handle = self.backend.create_attribute(host, name, ty, default)?;
        self.staging.attributes.push(handle.clone());
        Ok(handle)
    }

    pub fn connect_attribute(&mut self, src: &AttrHandle, dst: &AttrHandle) -> Result<()> {
        self.backend.connect_attribute(src, dst)
    }

    pub fn parent(&mut self, child: &ObjectHandle, parent: &ObjectHandle) -> Result<()> {
        self.backend.parent(child, parent)
    }

    /// Objects this component staged so far (own artifacts only; available
    /// in every phase).
    pub fn own_objects(&self) -> &[ObjectHandle] {
        &self.staging.objects
    }

    pub fn own_slot(&self, name: &str) -> Option<&ObjectHandle> {
        self.staging.slots.get(name)
    }

    /// This component's root object: the one staged this run, or, for a
    /// component that is only refreshing or reconnecting, the persisted
    /// root from its build record.
    pub fn own_root(&self) -> Option<ObjectHandle> {
        if let Some(root) = self.staging.slots.get(ROOT_SLOT) {
            return Some(root.clone());
        }
        let record = self.prior_records.get(&self.instance.key())?;
        record
            .slots
            .get(ROOT_SLOT)
            .or_else(|| record.objects.first())
            .map(|name| ObjectHandle(name.clone()))
    }

    /// Resolve the connection reference on one of this component's ports to
    /// a concrete object on the target component.
    ///
    /// Only legal during `ConnectSystem` — the one phase allowed to reach
    /// across component boundaries. Returns `Ok(None)` for unresolved
    /// (optional) references. A target slot that does not exist degrades to
    /// the target's root with a warning; it is never a silent no-op and
    /// never fatal.
    pub fn resolve_port(&mut self, port: &str) -> Result<Option<ObjectHandle>> {
        if self.phase != Phase::ConnectSystem {
            return Err(BuildError::scene(format!(
                "{}: cross-component resolution attempted during {}",
                self.instance.key(),
                self.phase
            )));
        }

        let reference = match self.instance.descriptor().connections.get(port) {
            Some(r) => r,
            None => return Ok(None),
        };
        let target = match &reference.target {
            Some(t) => t.clone(),
            None => return Ok(None),
        };
        let slot = reference.slot.as_deref().unwrap_or(ROOT_SLOT);

        // A reference kept in bilateral form resolves against whichever
        // concrete side exists.
        let candidates: Vec<ComponentKey> = if target.is_bilateral() {
            vec![target.with_side(Side::Left), target.with_side(Side::Right)]
        } else {
            vec![target]
        };

        for key in &candidates {
            if let Some(found) = self.lookup_slot(key, slot) {
                return Ok(Some(found));
            }
        }

        // Slot missing everywhere: fall back to the first candidate's root.
        for key in &candidates {
            if let Some(found) = self.lookup_slot(key, ROOT_SLOT) {
                let msg = format!(
                    "{}: port '{}' references missing slot '{}' on {}; falling back to root",
                    self.instance.key(),
                    port,
                    slot,
                    key
                );
                warn!("{}", msg);
                self.warnings.push(msg);
                return Ok(Some(found));
            }
        }

        let msg = format!(
            "{}: port '{}' references {} which has no resolvable endpoint",
            self.instance.key(),
            port,
            candidates[0]
        );
        warn!("{}", msg);
        self.warnings.push(msg);
        Ok(None)
    }

    fn lookup_slot(&self, key: &ComponentKey, slot: &str) -> Option<ObjectHandle> {
        // Components active this run expose their staged slot map; anything
        // untouched resolves through its persisted build record.
        if key == &self.instance.key() {
            return self.staging.slots.get(slot).cloned();
        }
        if let Some(staging) = self.peer_stagings.get(key) {
            return staging.slots.get(slot).cloned();
        }
        self.prior_records
            .get(key)
            .and_then(|record| record.slots.get(slot))
            .map(|name| ObjectHandle(name.clone()))
    }
}

/// Runs the fixed phase sequence over a [`BuildPlan`].
pub struct StagedExecutor<'scene> {
    backend: &'scene mut dyn SceneBackend,
    guide_root: ObjectHandle,
}

impl<'scene> StagedExecutor<'scene> {
    pub fn new(backend: &'scene mut dyn SceneBackend, guide_root: ObjectHandle) -> Self {
        Self {
            backend,
            guide_root,
        }
    }

    pub fn run(
        &mut self,
        plan: &BuildPlan,
        options: &BuildOptions,
        prior_records: &HashMap<ComponentKey, BuildRecord>,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        info!(
            %run_id,
            to_build = plan.to_build.len(),
            to_refresh_attributes = plan.to_refresh_attributes.len(),
            to_reconnect = plan.to_reconnect.len(),
            "starting staged run"
        );

        let mut stagings: HashMap<ComponentKey, ComponentStaging> = plan
            .to_build
            .keys()
            .chain(plan.to_refresh_attributes.keys())
            .chain(plan.to_reconnect.keys())
            .map(|k| (k.clone(), ComponentStaging::default()))
            .collect();
        let mut warnings = Vec::new();
        let mut completed = true;

        for phase in Phase::ORDER {
            let batch = Self::batch_for(plan, phase);
            info!(%run_id, phase = %phase, batch = batch.len(), "phase barrier opened");

            for (key, instance) in batch {
                let result = self.run_component_phase(
                    phase,
                    run_id,
                    key,
                    instance,
                    options,
                    &mut stagings,
                    prior_records,
                    &mut warnings,
                );
                if let Err(err) = result {
                    warn!(%run_id, component = %key, phase = %phase, "run aborted");
                    self.teardown(plan, &stagings);
                    return Err(err);
                }
            }

            if options.stop_after == Some(phase) {
                // Stopping at the final phase truncates nothing: every
                // phase ran, so the run commits like any other.
                if phase == Phase::PostScript {
                    break;
                }
                info!(%run_id, phase = %phase, "stop-after reached, truncating run");
                completed = false;
                break;
            }
        }

        let records = if completed {
            Self::collect_records(plan, &stagings, prior_records)
        } else {
            Vec::new()
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(%run_id, completed, duration_ms, "staged run finished");

        Ok(RunReport {
            run_id,
            completed,
            records,
            warnings,
            duration_ms,
        })
    }

    /// Active components for one phase. Refresh members join only for
    /// `CreateAttributes`, reconnect members only for `ConnectSystem`.
    fn batch_for(plan: &BuildPlan, phase: Phase) -> Vec<(&ComponentKey, &ComponentInstance)> {
        let extra: Option<&HashMap<ComponentKey, ComponentInstance>> = match phase {
            Phase::CreateAttributes => Some(&plan.to_refresh_attributes),
            Phase::ConnectSystem => Some(&plan.to_reconnect),
            _ => None,
        };
        plan.to_build
            .iter()
            .chain(extra.into_iter().flatten())
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn run_component_phase(
        &mut self,
        phase: Phase,
        run_id: Uuid,
        key: &ComponentKey,
        instance: &ComponentInstance,
        options: &BuildOptions,
        stagings: &mut HashMap<ComponentKey, ComponentStaging>,
        prior_records: &HashMap<ComponentKey, BuildRecord>,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        // Detach this component's staging so the peers stay readable while
        // it is mutated.
        let mut staging = stagings.remove(key).unwrap_or_default();

        let outcome = {
            let mut cx = PhaseContext {
                phase,
                run_id,
                instance,
                backend: &mut *self.backend,
                guide_root: &self.guide_root,
                staging: &mut staging,
                peer_stagings: stagings,
                prior_records,
                warnings,
            };

            match phase {
                Phase::PreScript => Self::run_hook(options.pre_script.as_ref(), &cx),
                Phase::PostScript => Self::run_hook(options.post_script.as_ref(), &cx),
                Phase::CreateObjects => instance.registered().behavior.create_objects(&mut cx),
                Phase::CreateAttributes => {
                    instance.registered().behavior.create_attributes(&mut cx)
                }
                Phase::CreateOperators => instance.registered().behavior.create_operators(&mut cx),
                Phase::ConnectSystem => instance.registered().behavior.connect_system(&mut cx),
            }
        };

        stagings.insert(key.clone(), staging);

        outcome.map_err(|source| {
            // PhaseContext errors keep their own kind; external failures
            // become PhaseExecution.
            match source.downcast::<BuildError>() {
                Ok(build_err) => build_err,
                Err(other) => BuildError::phase(phase, key.clone(), other),
            }
        })
    }

    fn run_hook(hook: Option<&ScriptHook>, cx: &PhaseContext<'_, '_>) -> anyhow::Result<()> {
        if let Some(hook) = hook {
            let component = cx.instance.key();
            let script_cx = ScriptContext {
                run_id: cx.run_id,
                guide_root: cx.guide_root,
                component: &component,
                settings: cx.instance.settings(),
            };
            hook(&script_cx)?;
        }
        Ok(())
    }

    /// Compensating teardown: delete every object staged this run for the
    /// components being (re)built. Refresh/reconnect members created no
    /// objects, so their prior artifacts stay intact.
    fn teardown(&mut self, plan: &BuildPlan, stagings: &HashMap<ComponentKey, ComponentStaging>) {
        for key in plan.to_build.keys() {
            let Some(staging) = stagings.get(key) else {
                continue;
            };
            for handle in &staging.objects {
                if let Err(e) = self.backend.delete_subtree(handle) {
                    warn!(component = %key, object = %handle, error = %e, "teardown failed");
                }
            }
        }
    }

    fn collect_records(
        plan: &BuildPlan,
        stagings: &HashMap<ComponentKey, ComponentStaging>,
        prior_records: &HashMap<ComponentKey, BuildRecord>,
    ) -> Vec<BuildRecord> {
        let mut records = Vec::new();

        for (key, instance) in &plan.to_build {
            let staging = stagings.get(key).cloned().unwrap_or_default();
            let mut record = BuildRecord::new(
                key.clone(),
                instance.settings().clone(),
                instance.split_from_bilateral(),
            );
            record.objects = staging.objects.iter().map(|h| h.0.clone()).collect();
            record.attributes = staging.attributes.iter().map(|a| a.name.clone()).collect();
            record.slots = staging
                .slots
                .iter()
                .map(|(name, handle)| (name.clone(), handle.0.clone()))
                .collect();
            records.push(record);
        }

        // Attribute refreshes update the recorded attribute list in place;
        // everything else about the prior record is preserved.
        for (key, staging) in stagings {
            if !plan.to_refresh_attributes.contains_key(key) {
                continue;
            }
            if let Some(prior) = prior_records.get(key) {
                let mut record = prior.clone();
                record.attributes = staging.attributes.iter().map(|a| a.name.clone()).collect();
                record.built_at = chrono::Utc::now();
                records.push(record);
            }
        }

        records
    }
}
