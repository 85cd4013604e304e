//! Mesh instance handles
//!
//! A [`MeshInstance`] is the cached per-draw-call data the layer system
//! needs to classify, sort and submit an object: blend state, bounding
//! volume, shadow-cast flag and the externally assigned sort tokens.
//! Instances live in a [`MeshStore`] arena and are referenced everywhere
//! else by [`MeshInstanceKey`].

use slotmap::SlotMap;

use crate::foundation::math::Aabb;
use crate::scene::layer::ShaderPass;

slotmap::new_key_type! {
    /// Arena key identifying a [`MeshInstance`]
    pub struct MeshInstanceKey;
}

/// Arena storage for mesh instances
pub type MeshStore = SlotMap<MeshInstanceKey, MeshInstance>;

/// Blend state of a mesh instance's material
///
/// Classification into the opaque or transparent draw list is a pure
/// function of this enum, decided at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    /// No blending; the instance goes to the opaque list
    #[default]
    None,
    /// Standard alpha blending
    Alpha,
    /// Additive blending
    Additive,
    /// Premultiplied alpha blending
    Premultiplied,
}

impl BlendMode {
    /// Whether this blend mode routes the instance to the transparent list
    pub fn is_transparent(self) -> bool {
        !matches!(self, BlendMode::None)
    }
}

/// Cached rendering data for one draw call
#[derive(Debug, Clone)]
pub struct MeshInstance {
    /// World-space bounding volume; its center feeds distance sorting
    pub aabb: Aabb,

    /// Blend state used to classify into opaque/transparent lists
    pub blend_mode: BlendMode,

    /// Whether this instance is added to layers' shadow caster lists
    pub cast_shadow: bool,

    /// Whether this instance survived culling this frame
    pub visible: bool,

    /// Non-spatial command entry (e.g. an explicit GPU state change
    /// embedded in the draw list); excluded from distance computation
    pub command: bool,

    /// Explicit draw order for [`SortMode::Manual`](crate::scene::SortMode::Manual)
    pub draw_order: u32,

    /// Material/shader identity folded with the pass index; higher keys
    /// draw first under material/mesh sorting
    pub sort_key: u64,

    /// Material identity used when folding the sort key
    pub material_id: u32,

    /// Mesh identity, the material/mesh sort tie-break
    pub mesh_id: u32,

    /// Signed distance along the camera forward axis, cached by the sort
    /// pass for the duration of one sort
    pub(crate) zdist: f32,
}

impl MeshInstance {
    /// Create a new mesh instance with the given bounds and blend state
    pub fn new(aabb: Aabb, blend_mode: BlendMode) -> Self {
        Self {
            aabb,
            blend_mode,
            cast_shadow: true,
            visible: true,
            command: false,
            draw_order: 0,
            sort_key: 0,
            material_id: 0,
            mesh_id: 0,
            zdist: 0.0,
        }
    }

    /// Whether the blend state routes this instance to the transparent list
    pub fn is_transparent(&self) -> bool {
        self.blend_mode.is_transparent()
    }

    /// Refold the sort key from the material identity and shader pass
    ///
    /// Instances sharing material and pass get equal keys, so material/mesh
    /// sorting makes them adjacent and minimizes GPU state changes.
    pub fn update_sort_key(&mut self, pass: ShaderPass) {
        self.sort_key = (u64::from(self.material_id) << 8) | u64::from(pass.index());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_mode_classification() {
        assert!(!BlendMode::None.is_transparent());
        assert!(BlendMode::Alpha.is_transparent());
        assert!(BlendMode::Additive.is_transparent());
        assert!(BlendMode::Premultiplied.is_transparent());
    }

    #[test]
    fn test_sort_key_groups_by_material_and_pass() {
        let mut a = MeshInstance::new(Aabb::default(), BlendMode::None);
        let mut b = MeshInstance::new(Aabb::default(), BlendMode::None);
        a.material_id = 7;
        b.material_id = 7;
        a.mesh_id = 1;
        b.mesh_id = 2;
        a.update_sort_key(ShaderPass::Forward);
        b.update_sort_key(ShaderPass::Forward);
        assert_eq!(a.sort_key, b.sort_key);

        b.update_sort_key(ShaderPass::Depth);
        assert_ne!(a.sort_key, b.sort_key);

        b.material_id = 8;
        b.update_sort_key(ShaderPass::Forward);
        assert_ne!(a.sort_key, b.sort_key);
    }
}
