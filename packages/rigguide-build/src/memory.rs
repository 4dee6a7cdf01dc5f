//! In-memory scene backend.
//!
//! A real hierarchy with no engine behind it: handles are generated
//! deterministically, parenting and deletion behave like a scene graph.
//! Used for dry runs and throughout the test suite.

use crate::error::{BuildError, Result};
use crate::scene::{AttrHandle, AttrType, AttrValue, ObjectHandle, Placement, SceneBackend};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub kind: String,
    pub parent: Option<String>,
    pub placement: Placement,
    pub attributes: BTreeMap<String, (AttrType, AttrValue)>,
}

#[derive(Debug, Default)]
pub struct MemoryScene {
    counter: u64,
    objects: HashMap<String, MemoryObject>,
    connections: Vec<(String, String)>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn has_object(&self, handle: &str) -> bool {
        self.objects.contains_key(handle)
    }

    pub fn object(&self, handle: &str) -> Option<&MemoryObject> {
        self.objects.get(handle)
    }

    /// Objects of a given kind, sorted by handle.
    pub fn objects_of_kind(&self, kind: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .objects
            .iter()
            .filter(|(_, o)| o.kind == kind)
            .map(|(h, _)| h.clone())
            .collect();
        out.sort();
        out
    }

    pub fn connections(&self) -> &[(String, String)] {
        &self.connections
    }

    pub fn attribute(&self, handle: &str, name: &str) -> Option<&(AttrType, AttrValue)> {
        self.objects.get(handle)?.attributes.get(name)
    }

    fn descendants(&self, handle: &str) -> Vec<String> {
        let mut out = vec![handle.to_string()];
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            for (h, o) in &self.objects {
                if o.parent.as_deref() == Some(current.as_str()) {
                    out.push(h.clone());
                }
            }
            i += 1;
        }
        out
    }
}

impl SceneBackend for MemoryScene {
    fn create_object(
        &mut self,
        kind: &str,
        parent: Option<&ObjectHandle>,
        placement: Placement,
    ) -> Result<ObjectHandle> {
        if let Some(p) = parent {
            if !self.objects.contains_key(p.as_str()) {
                return Err(BuildError::scene(format!("unknown parent: {}", p)));
            }
        }
        self.counter += 1;
        let handle = format!("{}#{}", kind, self.counter);
        self.objects.insert(
            handle.clone(),
            MemoryObject {
                kind: kind.to_string(),
                parent: parent.map(|p| p.0.clone()),
                placement,
                attributes: BTreeMap::new(),
            },
        );
        Ok(ObjectHandle(handle))
    }

    fn create_attribute(
        &mut self,
        host: &ObjectHandle,
        name: &str,
        ty: AttrType,
        default: AttrValue,
    ) -> Result<AttrHandle> {
        let object = self
            .objects
            .get_mut(host.as_str())
            .ok_or_else(|| BuildError::scene(format!("unknown object: {}", host)))?;
        object.attributes.insert(name.to_string(), (ty, default));
        Ok(AttrHandle::new(host.clone(), name))
    }

    fn connect_attribute(&mut self, src: &AttrHandle, dst: &AttrHandle) -> Result<()> {
        for attr in [src, dst] {
            let host = self
                .objects
                .get(attr.host.as_str())
                .ok_or_else(|| BuildError::scene(format!("unknown object: {}", attr.host)))?;
            if !host.attributes.contains_key(&attr.name) {
                return Err(BuildError::scene(format!("unknown attribute: {}", attr)));
            }
        }
        self.connections.push((src.to_string(), dst.to_string()));
        Ok(())
    }

    fn parent(&mut self, child: &ObjectHandle, parent: &ObjectHandle) -> Result<()> {
        if !self.objects.contains_key(parent.as_str()) {
            return Err(BuildError::scene(format!("unknown parent: {}", parent)));
        }
        let object = self
            .objects
            .get_mut(child.as_str())
            .ok_or_else(|| BuildError::scene(format!("unknown object: {}", child)))?;
        object.parent = Some(parent.0.clone());
        Ok(())
    }

    fn delete_subtree(&mut self, handle: &ObjectHandle) -> Result<()> {
        if !self.objects.contains_key(handle.as_str()) {
            return Err(BuildError::scene(format!("unknown object: {}", handle)));
        }
        for h in self.descendants(handle.as_str()) {
            self.objects.remove(&h);
            // Endpoints are "host.attr"; compare the host segment exactly so
            // "ctl#1" never matches "ctl#10".
            let hosted = |endpoint: &str| {
                endpoint
                    .split_once('.')
                    .is_some_and(|(host, _)| host == h)
            };
            self.connections
                .retain(|(src, dst)| !hosted(src) && !hosted(dst));
        }
        Ok(())
    }

    fn delete_attribute(&mut self, host: &ObjectHandle, name: &str) -> Result<()> {
        let object = self
            .objects
            .get_mut(host.as_str())
            .ok_or_else(|| BuildError::scene(format!("unknown object: {}", host)))?;
        object.attributes.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_delete_subtree() {
        let mut scene = MemoryScene::new();
        let root = scene.create_object("root", None, Placement::default()).unwrap();
        let child = scene
            .create_object("joint", Some(&root), Placement::default())
            .unwrap();
        let _grandchild = scene
            .create_object("joint", Some(&child), Placement::default())
            .unwrap();
        assert_eq!(scene.object_count(), 3);

        scene.delete_subtree(&child).unwrap();
        assert_eq!(scene.object_count(), 1);
        assert!(scene.has_object(root.as_str()));
    }

    #[test]
    fn test_connect_requires_existing_attributes() {
        let mut scene = MemoryScene::new();
        let a = scene.create_object("ctl", None, Placement::default()).unwrap();
        let b = scene.create_object("ctl", None, Placement::default()).unwrap();

        let src = scene
            .create_attribute(&a, "out", AttrType::Float, AttrValue::Float(0.0))
            .unwrap();
        let missing = AttrHandle::new(b.clone(), "in");
        assert!(scene.connect_attribute(&src, &missing).is_err());

        let dst = scene
            .create_attribute(&b, "in", AttrType::Float, AttrValue::Float(0.0))
            .unwrap();
        scene.connect_attribute(&src, &dst).unwrap();
        assert_eq!(scene.connections().len(), 1);
    }

    #[test]
    fn test_delete_subtree_matches_connection_hosts_exactly() {
        let mut scene = MemoryScene::new();
        // Enough objects that "ctl#1" is a handle prefix of "ctl#10".
        let handles: Vec<_> = (0..11)
            .map(|_| scene.create_object("ctl", None, Placement::default()).unwrap())
            .collect();
        for handle in [&handles[0], &handles[9], &handles[10]] {
            scene
                .create_attribute(handle, "v", AttrType::Float, AttrValue::Float(0.0))
                .unwrap();
        }
        let attr = |h: &ObjectHandle| AttrHandle::new(h.clone(), "v");
        scene.connect_attribute(&attr(&handles[0]), &attr(&handles[9])).unwrap();
        scene.connect_attribute(&attr(&handles[9]), &attr(&handles[10])).unwrap();

        scene.delete_subtree(&handles[0]).unwrap();

        // Only the connection touching ctl#1 goes; ctl#10's survives.
        assert_eq!(scene.connections().len(), 1);
        assert_eq!(
            scene.connections()[0],
            (attr(&handles[9]).to_string(), attr(&handles[10]).to_string())
        );
    }

    #[test]
    fn test_delete_attribute() {
        let mut scene = MemoryScene::new();
        let a = scene.create_object("ctl", None, Placement::default()).unwrap();
        scene
            .create_attribute(&a, "ikfk", AttrType::Float, AttrValue::Float(0.0))
            .unwrap();
        assert!(scene.attribute(a.as_str(), "ikfk").is_some());

        scene.delete_attribute(&a, "ikfk").unwrap();
        assert!(scene.attribute(a.as_str(), "ikfk").is_none());
    }
}
