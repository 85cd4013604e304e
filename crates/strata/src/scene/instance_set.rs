//! Instance storage shared by one or more layers
//!
//! [`InstanceSet`] holds the opaque/transparent draw lists and the shadow
//! caster list a layer feeds into culling, plus the per-camera-pass
//! [`VisibleList`]s culling fills each frame. Two layers configured to
//! render the same objects ("layer reference") share one `InstanceSet`
//! through [`SharedInstanceSet`]; the set is dropped only when the last
//! layer referencing it goes away.

use std::cell::RefCell;
use std::rc::Rc;

use crate::scene::mesh_instance::MeshInstanceKey;

/// Shared handle to an [`InstanceSet`]
///
/// The subsystem is single-threaded and frame-synchronous, so plain
/// reference counting without locks is sufficient.
pub type SharedInstanceSet = Rc<RefCell<InstanceSet>>;

/// Per-camera, per-pass list of currently visible mesh instances
///
/// Backing storage is reused across frames: `clear` only resets the
/// logical length, and entries past it are stale and must be ignored.
#[derive(Debug, Default)]
pub struct VisibleList {
    list: Vec<MeshInstanceKey>,
    len: usize,
}

impl VisibleList {
    /// Create an empty visible list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of meaningful entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list holds no meaningful entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a key, reusing stale storage when available
    pub fn push(&mut self, key: MeshInstanceKey) {
        if self.len < self.list.len() {
            self.list[self.len] = key;
        } else {
            self.list.push(key);
        }
        self.len += 1;
    }

    /// Reset the logical length without releasing storage
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The meaningful entries
    pub fn entries(&self) -> &[MeshInstanceKey] {
        &self.list[..self.len]
    }

    /// Mutable view of the meaningful entries
    pub fn entries_mut(&mut self) -> &mut [MeshInstanceKey] {
        &mut self.list[..self.len]
    }

    /// Drop stale trailing storage so the whole backing vec is meaningful
    ///
    /// Sorting operates on the backing storage, so the tail must be cut
    /// first when storage and logical length differ.
    pub fn truncate_storage(&mut self) {
        if self.list.len() != self.len {
            self.list.truncate(self.len);
        }
    }
}

/// Draw lists owned (or shared) by layers
#[derive(Debug, Default)]
pub struct InstanceSet {
    /// Opaque mesh instances, identity-deduplicated
    pub opaque: Vec<MeshInstanceKey>,

    /// Transparent mesh instances, identity-deduplicated
    pub transparent: Vec<MeshInstanceKey>,

    /// Shadow casters; an instance appears here at most once
    pub shadow_casters: Vec<MeshInstanceKey>,

    /// Visible opaque instances per camera pass
    pub visible_opaque: Vec<VisibleList>,

    /// Visible transparent instances per camera pass
    pub visible_transparent: Vec<VisibleList>,
}

impl InstanceSet {
    /// Create an empty instance set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty instance set behind a shared handle
    pub fn shared() -> SharedInstanceSet {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Visible list for a pass, growing the per-pass storage on demand
    pub fn visible_list_mut(&mut self, transparent: bool, camera_pass: usize) -> &mut VisibleList {
        let lists = if transparent {
            &mut self.visible_transparent
        } else {
            &mut self.visible_opaque
        };
        while lists.len() <= camera_pass {
            lists.push(VisibleList::new());
        }
        &mut lists[camera_pass]
    }

    /// Visible list for a pass, if one has been created
    pub fn visible_list(&self, transparent: bool, camera_pass: usize) -> Option<&VisibleList> {
        let lists = if transparent {
            &self.visible_transparent
        } else {
            &self.visible_opaque
        };
        lists.get(camera_pass)
    }

    /// Reset both visible lists for a camera pass
    ///
    /// Called when a camera leaves a layer; the lists are not refreshed by
    /// culling afterwards, so leftover entries must not be iterated.
    pub fn clear_visible(&mut self, camera_pass: usize) {
        if let Some(list) = self.visible_opaque.get_mut(camera_pass) {
            list.clear();
            list.truncate_storage();
        }
        if let Some(list) = self.visible_transparent.get_mut(camera_pass) {
            list.clear();
            list.truncate_storage();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    use crate::foundation::math::Aabb;
    use crate::scene::mesh_instance::{BlendMode, MeshInstance, MeshStore};

    fn key(store: &mut MeshStore) -> MeshInstanceKey {
        store.insert(MeshInstance::new(Aabb::default(), BlendMode::None))
    }

    #[test]
    fn test_visible_list_reuses_storage() {
        let mut store: MeshStore = SlotMap::with_key();
        let a = key(&mut store);
        let b = key(&mut store);

        let mut list = VisibleList::new();
        list.push(a);
        list.push(b);
        assert_eq!(list.len(), 2);

        list.clear();
        assert!(list.is_empty());
        assert!(list.entries().is_empty());

        // storage from the previous frame is reused, not reallocated
        list.push(b);
        assert_eq!(list.entries(), &[b]);
    }

    #[test]
    fn test_truncate_storage_cuts_stale_tail() {
        let mut store: MeshStore = SlotMap::with_key();
        let a = key(&mut store);
        let b = key(&mut store);

        let mut list = VisibleList::new();
        list.push(a);
        list.push(b);
        list.clear();
        list.push(b);
        list.truncate_storage();
        assert_eq!(list.entries(), &[b]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_clear_visible_resets_both_passes() {
        let mut store: MeshStore = SlotMap::with_key();
        let a = key(&mut store);

        let mut set = InstanceSet::new();
        set.visible_list_mut(false, 1).push(a);
        set.visible_list_mut(true, 1).push(a);
        set.clear_visible(1);
        assert!(set.visible_list(false, 1).unwrap().is_empty());
        assert!(set.visible_list(true, 1).unwrap().is_empty());
        // passes never touched stay absent
        assert!(set.visible_list(false, 3).is_none());
    }
}
