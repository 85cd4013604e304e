//! Visibility list sorting
//!
//! Four comparator strategies, selected per layer and per pass, plus the
//! camera-relative distance projection that feeds the distance-dependent
//! comparators. Distances are computed once per sort and cached on the
//! instances, so each comparison stays O(1).

use std::cmp::Ordering;

use crate::foundation::math::Vec3;
use crate::scene::mesh_instance::{MeshInstance, MeshInstanceKey, MeshStore};

/// Method used to order a visibility list before rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SortMode {
    /// No sorting; the list stays in culling order
    None,
    /// Ascending by the instance's explicit draw order
    Manual,
    /// Descending by sort key with a descending mesh-id tie-break, so
    /// instances sharing GPU state end up adjacent
    #[default]
    MaterialMesh,
    /// Descending by camera distance, for correct alpha blending
    BackToFront,
    /// Ascending by camera distance, for early-z friendly opaque order
    FrontToBack,
}

impl SortMode {
    /// Whether this mode needs camera-relative distances computed first
    pub fn needs_distances(self) -> bool {
        matches!(self, SortMode::BackToFront | SortMode::FrontToBack)
    }
}

/// Project each instance's bounds center onto the camera forward axis and
/// cache the signed distance on the instance.
///
/// Command entries are non-spatial and keep whatever distance they had.
pub(crate) fn calculate_sort_distances(
    store: &mut MeshStore,
    keys: &[MeshInstanceKey],
    cam_pos: Vec3,
    cam_fwd: Vec3,
) {
    for &key in keys {
        let Some(instance) = store.get_mut(key) else {
            continue;
        };
        if instance.command {
            continue;
        }
        let to_center = instance.aabb.center() - cam_pos;
        instance.zdist = to_center.dot(&cam_fwd);
    }
}

fn cmp_manual(a: &MeshInstance, b: &MeshInstance) -> Ordering {
    a.draw_order.cmp(&b.draw_order)
}

fn cmp_material_mesh(a: &MeshInstance, b: &MeshInstance) -> Ordering {
    b.sort_key
        .cmp(&a.sort_key)
        .then_with(|| b.mesh_id.cmp(&a.mesh_id))
}

fn cmp_back_to_front(a: &MeshInstance, b: &MeshInstance) -> Ordering {
    b.zdist.partial_cmp(&a.zdist).unwrap_or(Ordering::Equal)
}

fn cmp_front_to_back(a: &MeshInstance, b: &MeshInstance) -> Ordering {
    a.zdist.partial_cmp(&b.zdist).unwrap_or(Ordering::Equal)
}

/// Sort a slice of instance keys with the given mode's comparator.
///
/// Keys no longer present in the store compare equal to everything and are
/// left where the stable sort keeps them.
pub(crate) fn sort_keys(store: &MeshStore, keys: &mut [MeshInstanceKey], mode: SortMode) {
    let cmp = match mode {
        SortMode::None => return,
        SortMode::Manual => cmp_manual,
        SortMode::MaterialMesh => cmp_material_mesh,
        SortMode::BackToFront => cmp_back_to_front,
        SortMode::FrontToBack => cmp_front_to_back,
    };
    keys.sort_by(|&ka, &kb| match (store.get(ka), store.get(kb)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => Ordering::Equal,
    });
}
