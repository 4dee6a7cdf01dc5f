//! Build/delete driver.
//!
//! Ties the resolver, executor and store together behind the two entry
//! points the editing surface needs: `build(requested)` and
//! `delete(requested, also_remove_descriptors)`. The store is committed and
//! the payload written back only after a run completes every phase.

use crate::error::Result;
use crate::executor::{BuildOptions, RunReport, StagedExecutor};
use crate::registry::ComponentRegistry;
use crate::resolver::{self, BuildPlan};
use crate::scene::{AttrType, AttrValue, ObjectHandle, Placement, SceneBackend};
use crate::store::BuildStateStore;
use rigguide_model::{ComponentKey, Guide, Side};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Attribute on the guide root artifact holding the opaque state payload.
const STATE_ATTRIBUTE: &str = "rigguide_state";

/// Object kind of the generated root artifact.
const ROOT_KIND: &str = "guide_root";

/// Outcome of [`GuideBuilder::build`].
#[derive(Debug)]
pub struct BuildReport {
    pub run_id: Uuid,
    pub completed: bool,
    pub built: Vec<ComponentKey>,
    pub refreshed: Vec<ComponentKey>,
    pub reconnected: Vec<ComponentKey>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

/// Outcome of [`GuideBuilder::delete`].
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<ComponentKey>,
    /// Requested keys with no build record (nothing to tear down).
    pub skipped: Vec<ComponentKey>,
}

pub struct GuideBuilder<B: SceneBackend> {
    guide: Guide,
    registry: ComponentRegistry,
    store: BuildStateStore,
    backend: B,
    guide_root: Option<ObjectHandle>,
}

impl<B: SceneBackend> GuideBuilder<B> {
    pub fn new(guide: Guide, registry: ComponentRegistry, backend: B) -> Self {
        let store = BuildStateStore::from_records(guide.build_state().clone());
        Self {
            guide,
            registry,
            store,
            backend,
            guide_root: None,
        }
    }

    pub fn guide(&self) -> &Guide {
        &self.guide
    }

    pub fn guide_mut(&mut self) -> &mut Guide {
        &mut self.guide
    }

    pub fn store(&self) -> &BuildStateStore {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Build the requested components incrementally. An empty request
    /// builds everything, in the default layer-forest traversal order.
    pub fn build(
        &mut self,
        requested: &[ComponentKey],
        mut options: BuildOptions,
    ) -> Result<BuildReport> {
        let start = Instant::now();

        let requested: Vec<ComponentKey> = if requested.is_empty() {
            self.guide.components().iter().map(|c| c.key()).collect()
        } else {
            requested.to_vec()
        };

        // The document's debug setting applies unless the caller already
        // asked for an earlier stop.
        if options.stop_after.is_none() {
            options.stop_after = self.guide.settings.stop_after;
        }

        let prior = self.store.snapshot();
        let plan = resolver::resolve(&requested, &self.guide, &prior, &self.registry)?;

        if plan.is_empty() {
            info!("nothing to build");
            return Ok(BuildReport {
                run_id: Uuid::new_v4(),
                completed: true,
                built: Vec::new(),
                refreshed: Vec::new(),
                reconnected: Vec::new(),
                warnings: Vec::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let root = self.ensure_root()?;
        let report = {
            let mut executor = StagedExecutor::new(&mut self.backend, root);
            executor.run(&plan, &options, &prior)?
        };

        if report.completed {
            // The old generation of every rebuilt component is removed only
            // now, once the replacement fully exists; an aborted run leaves
            // the previous artifacts in place.
            self.teardown_previous_generation(&plan, &prior);
            self.store.commit(report.records.clone());
            self.write_back_state()?;
        } else {
            info!(run_id = %report.run_id, "truncated run, build state left untouched");
        }

        Ok(Self::build_report(&plan, report, start))
    }

    /// Tear down the requested components and drop their build records.
    ///
    /// Bilateral keys expand to whichever concrete side records exist.
    /// Exactly the recorded attribute and object sets are removed; records
    /// of other components are untouched.
    pub fn delete(
        &mut self,
        requested: &[ComponentKey],
        also_remove_descriptors: bool,
    ) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();

        for requested_key in requested {
            let concrete: Vec<ComponentKey> = if requested_key.is_bilateral() {
                vec![
                    requested_key.with_side(Side::Left),
                    requested_key.with_side(Side::Right),
                ]
            } else {
                vec![requested_key.clone()]
            };

            let mut any_removed = false;
            for key in concrete {
                let Some(record) = self.store.get(&key).cloned() else {
                    warn!(component = %key, "no build record, nothing to delete");
                    report.skipped.push(key);
                    continue;
                };

                // Attributes first (they live on the recorded objects),
                // then the object subtrees themselves.
                if let Some(root_object) = record.objects.first() {
                    let host = ObjectHandle(root_object.clone());
                    for name in &record.attributes {
                        if let Err(e) = self.backend.delete_attribute(&host, name) {
                            warn!(component = %key, attribute = name, error = %e,
                                "attribute teardown failed");
                        }
                    }
                }
                for object in &record.objects {
                    self.backend.delete_subtree(&ObjectHandle(object.clone()))?;
                }

                self.store.remove(&key);
                info!(component = %key, "deleted");
                report.removed.push(key);
                any_removed = true;
            }

            if also_remove_descriptors {
                if self.guide.remove_component(requested_key).is_none() && !any_removed {
                    warn!(component = %requested_key, "no descriptor to remove");
                }
            }
        }

        self.write_back_state()?;
        Ok(report)
    }

    /// Export the build state to a standalone file.
    pub fn export_state(&self, path: &std::path::Path) -> Result<()> {
        self.store.export(path)
    }

    fn teardown_previous_generation(
        &mut self,
        plan: &BuildPlan,
        prior: &std::collections::HashMap<ComponentKey, rigguide_model::BuildRecord>,
    ) {
        for key in plan.to_build.keys() {
            let Some(record) = prior.get(key) else {
                continue;
            };
            if let Some(root_object) = record.objects.first() {
                let host = ObjectHandle(root_object.clone());
                for name in &record.attributes {
                    if let Err(e) = self.backend.delete_attribute(&host, name) {
                        warn!(component = %key, attribute = name, error = %e,
                            "stale attribute cleanup failed");
                    }
                }
            }
            for object in &record.objects {
                if let Err(e) = self.backend.delete_subtree(&ObjectHandle(object.clone())) {
                    warn!(component = %key, object = object.as_str(), error = %e,
                        "stale object cleanup failed");
                }
            }
        }
    }

    fn ensure_root(&mut self) -> Result<ObjectHandle> {
        if let Some(root) = &self.guide_root {
            return Ok(root.clone());
        }
        let root = self
            .backend
            .create_object(ROOT_KIND, None, Placement::default())?;
        self.guide_root = Some(root.clone());
        Ok(root)
    }

    /// Mirror the store into the document and stamp the opaque payload on
    /// the root artifact.
    fn write_back_state(&mut self) -> Result<()> {
        self.guide.build_state = self.store.snapshot();
        if let Some(root) = self.guide_root.clone() {
            let payload = self.store.payload()?;
            self.backend.create_attribute(
                &root,
                STATE_ATTRIBUTE,
                AttrType::String,
                AttrValue::String(payload),
            )?;
        }
        Ok(())
    }

    fn build_report(plan: &BuildPlan, report: RunReport, start: Instant) -> BuildReport {
        let out = BuildReport {
            run_id: report.run_id,
            completed: report.completed,
            built: plan.to_build.keys().cloned().collect(),
            refreshed: plan.to_refresh_attributes.keys().cloned().collect(),
            reconnected: plan.to_reconnect.keys().cloned().collect(),
            warnings: report.warnings,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            run_id = %out.run_id,
            built = out.built.len(),
            refreshed = out.refreshed.len(),
            reconnected = out.reconnected.len(),
            completed = out.completed,
            duration_ms = out.duration_ms,
            "build finished"
        );
        out
    }
}
