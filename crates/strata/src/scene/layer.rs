//! Render layers
//!
//! A [`Layer`] is a named bucket of mesh instances, lights and cameras with
//! its own sort policy, shader pass, clear settings and enable state.
//! Layers are ordered inside a
//! [`LayerComposition`](crate::scene::LayerComposition) and mutated by
//! scene-graph code as objects attach and detach. The renderer walks the
//! composition each frame, invokes the layer's lifecycle hooks at the
//! documented points and asks the layer to sort its visibility lists.

use std::fmt;

use crate::scene::camera::{CameraKey, CameraStore};
use crate::scene::hash;
use crate::scene::instance_set::{InstanceSet, SharedInstanceSet};
use crate::scene::light::{LightKey, LightStore};
use crate::scene::mesh_instance::{MeshInstanceKey, MeshStore};
use crate::scene::sort::{self, SortMode};
use crate::foundation::math::Vec3;

/// Identifier of a layer within a [`LayerRegistry`](crate::scene::LayerRegistry)
///
/// Small, dense and reused first-fit after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Shader variant a layer renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ShaderPass {
    /// Standard forward shading
    #[default]
    Forward,
    /// Forward shading with HDR output
    ForwardHdr,
    /// Depth-only pass
    Depth,
    /// Application-defined pass selector
    Custom(u8),
}

impl ShaderPass {
    /// Stable index folded into mesh instance sort keys
    pub fn index(self) -> u8 {
        match self {
            ShaderPass::Forward => 0,
            ShaderPass::ForwardHdr => 1,
            ShaderPass::Depth => 2,
            ShaderPass::Custom(index) => index,
        }
    }
}

bitflags::bitflags! {
    /// Buffers a layer clears before its cameras render, when
    /// `override_clear` is set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClearFlags: u32 {
        /// Clear the color buffer
        const COLOR = 1;
        /// Clear the depth buffer
        const DEPTH = 2;
        /// Clear the stencil buffer
        const STENCIL = 4;
    }
}

/// Optional lifecycle hooks invoked by the renderer
///
/// A layer with no hooks set behaves as a pure data bucket. Pass-indexed
/// hooks receive the camera pass currently being processed.
#[derive(Default)]
pub struct LayerHooks {
    /// Called when the layer transitions to enabled
    pub on_enable: Option<Box<dyn FnMut()>>,
    /// Called when the layer transitions to disabled
    pub on_disable: Option<Box<dyn FnMut()>>,
    /// Called before visibility culling runs for this layer
    pub on_pre_cull: Option<Box<dyn FnMut(usize)>>,
    /// Called after visibility culling ran for this layer
    pub on_post_cull: Option<Box<dyn FnMut(usize)>>,
    /// Called before the first sublayer of this layer renders
    pub on_pre_render: Option<Box<dyn FnMut(usize)>>,
    /// Called before the opaque sublayer renders
    pub on_pre_render_opaque: Option<Box<dyn FnMut(usize)>>,
    /// Called before the transparent sublayer renders
    pub on_pre_render_transparent: Option<Box<dyn FnMut(usize)>>,
    /// Called after the last sublayer of this layer rendered
    pub on_post_render: Option<Box<dyn FnMut(usize)>>,
    /// Called after the opaque sublayer rendered
    pub on_post_render_opaque: Option<Box<dyn FnMut(usize)>>,
    /// Called after the transparent sublayer rendered
    pub on_post_render_transparent: Option<Box<dyn FnMut(usize)>>,
    /// Called before every draw call issued from this layer
    pub on_draw_call: Option<Box<dyn FnMut(MeshInstanceKey, usize)>>,
}

impl fmt::Debug for LayerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = [
            ("on_enable", self.on_enable.is_some()),
            ("on_disable", self.on_disable.is_some()),
            ("on_pre_cull", self.on_pre_cull.is_some()),
            ("on_post_cull", self.on_post_cull.is_some()),
            ("on_pre_render", self.on_pre_render.is_some()),
            ("on_pre_render_opaque", self.on_pre_render_opaque.is_some()),
            (
                "on_pre_render_transparent",
                self.on_pre_render_transparent.is_some(),
            ),
            ("on_post_render", self.on_post_render.is_some()),
            ("on_post_render_opaque", self.on_post_render_opaque.is_some()),
            (
                "on_post_render_transparent",
                self.on_post_render_transparent.is_some(),
            ),
            ("on_draw_call", self.on_draw_call.is_some()),
        ]
        .iter()
        .filter(|(_, is_set)| *is_set)
        .map(|(name, _)| *name)
        .collect();
        f.debug_struct("LayerHooks").field("set", &set).finish()
    }
}

/// Construction parameters for a [`Layer`]
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    /// Display name
    pub name: String,
    /// Whether the layer starts enabled (reference count 1)
    pub enabled: bool,
    /// Sort mode for the opaque pass
    pub opaque_sort_mode: SortMode,
    /// Sort mode for the transparent pass
    pub transparent_sort_mode: SortMode,
    /// Shader pass selector
    pub shader_pass: ShaderPass,
    /// Opaque render-target handle, if rendering off-screen
    pub render_target: Option<u32>,
    /// Pass-through layers skip dirty tracking; used for trivial
    /// draw-a-bunch-of-instances layers
    pub pass_through: bool,
    /// Use the layer's clear settings instead of the camera's
    pub override_clear: bool,
    /// Clear color applied when `override_clear` is set
    pub clear_color: [f32; 4],
    /// Buffers cleared when `override_clear` is set
    pub clear_flags: ClearFlags,
    /// Visibility mask tested against mesh instance masks by culling
    pub culling_mask: u32,
}

impl Default for LayerDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            opaque_sort_mode: SortMode::MaterialMesh,
            transparent_sort_mode: SortMode::BackToFront,
            shader_pass: ShaderPass::Forward,
            render_target: None,
            pass_through: false,
            override_clear: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_flags: ClearFlags::empty(),
            culling_mask: u32::MAX,
        }
    }
}

impl LayerDescriptor {
    /// Descriptor with a name and default settings
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A renderable subset of the scene
pub struct Layer {
    pub(crate) id: LayerId,

    /// Display name
    pub name: String,
    /// Sort mode for the opaque pass
    pub opaque_sort_mode: SortMode,
    /// Sort mode for the transparent pass
    pub transparent_sort_mode: SortMode,
    /// Shader pass selector
    pub shader_pass: ShaderPass,
    /// Opaque render-target handle
    pub render_target: Option<u32>,
    /// Pass-through layers skip dirty tracking
    pub pass_through: bool,
    /// Use the layer's clear settings instead of the camera's
    pub override_clear: bool,
    /// Clear color applied when `override_clear` is set
    pub clear_color: [f32; 4],
    /// Buffers cleared when `override_clear` is set
    pub clear_flags: ClearFlags,
    /// Visibility mask tested against mesh instance masks by culling
    pub culling_mask: u32,
    /// Lifecycle hooks invoked by the renderer
    pub hooks: LayerHooks,

    instances: SharedInstanceSet,
    lights: Vec<LightKey>,
    cameras: Vec<CameraKey>,

    // sorted token snapshots backing the cached hashes; kept allocated
    // and refilled on every set mutation
    static_light_tokens: Vec<u64>,
    dynamic_light_tokens: Vec<u64>,
    camera_tokens: Vec<u64>,
    light_hash: u64,
    static_light_hash: u64,
    camera_hash: u64,

    ref_count: u32,

    pub(crate) dirty: bool,
    pub(crate) dirty_lights: bool,
    pub(crate) dirty_cameras: bool,
}

impl Layer {
    /// Create a layer with its own instance set
    pub fn new(descriptor: LayerDescriptor) -> Self {
        Self::with_instances(descriptor, InstanceSet::shared())
    }

    /// Create a layer rendering another layer's instance set
    ///
    /// Both layers see each other's instance mutations; the set is dropped
    /// when the last layer referencing it goes away. The layers are
    /// expected to share cameras, since culling runs only once per set.
    pub fn with_instances(descriptor: LayerDescriptor, instances: SharedInstanceSet) -> Self {
        Self {
            id: LayerId(u32::MAX),
            name: descriptor.name,
            opaque_sort_mode: descriptor.opaque_sort_mode,
            transparent_sort_mode: descriptor.transparent_sort_mode,
            shader_pass: descriptor.shader_pass,
            render_target: descriptor.render_target,
            pass_through: descriptor.pass_through,
            override_clear: descriptor.override_clear,
            clear_color: descriptor.clear_color,
            clear_flags: descriptor.clear_flags,
            culling_mask: descriptor.culling_mask,
            hooks: LayerHooks::default(),
            instances,
            lights: Vec::new(),
            cameras: Vec::new(),
            static_light_tokens: Vec::new(),
            dynamic_light_tokens: Vec::new(),
            camera_tokens: Vec::new(),
            light_hash: hash::EMPTY_HASH,
            static_light_hash: hash::EMPTY_HASH,
            camera_hash: hash::EMPTY_HASH,
            ref_count: u32::from(descriptor.enabled),
            dirty: false,
            dirty_lights: false,
            dirty_cameras: false,
        }
    }

    /// The registry-assigned identifier
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Shared handle to this layer's instance set
    pub fn instances(&self) -> SharedInstanceSet {
        self.instances.clone()
    }

    /// Lights attached to this layer
    pub fn lights(&self) -> &[LightKey] {
        &self.lights
    }

    /// Cameras rendering this layer
    pub fn cameras(&self) -> &[CameraKey] {
        &self.cameras
    }

    /// Hash of the non-static light set; `0` when it is empty
    pub fn light_hash(&self) -> u64 {
        self.light_hash
    }

    /// Hash of the static light set; `0` when no lights are static
    ///
    /// Two layers with equal static-light hashes can share baked lighting
    /// work without a full set comparison.
    pub fn static_light_hash(&self) -> u64 {
        self.static_light_hash
    }

    /// Hash of the camera set; `0` for one camera or none
    ///
    /// Equal non-zero hashes mark sublayer runs the renderer can iterate
    /// camera-major, reusing per-camera work across the run.
    pub fn camera_hash(&self) -> u64 {
        self.camera_hash
    }

    // ---- enable state ------------------------------------------------

    /// Whether the layer currently renders
    ///
    /// Derived from the reference count; there is no independent boolean
    /// to drift out of sync.
    pub fn enabled(&self) -> bool {
        self.ref_count > 0
    }

    /// Current number of "keep enabled" holders
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Enable or disable the layer by adjusting the reference count once
    ///
    /// Setting `false` while other holders keep the layer alive decrements
    /// a single reference; the layer stays enabled until they release it.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled() {
            if enabled {
                self.increment_counter();
            } else {
                self.decrement_counter();
            }
        }
    }

    /// Register one more holder keeping the layer enabled
    ///
    /// The 0 → 1 transition enables the layer and fires `on_enable`.
    pub fn increment_counter(&mut self) {
        self.ref_count += 1;
        if self.ref_count == 1 {
            if let Some(hook) = self.hooks.on_enable.as_mut() {
                hook();
            }
        }
    }

    /// Release one holder
    ///
    /// The 1 → 0 transition disables the layer and fires `on_disable`.
    /// Decrementing at 0 is a misuse: it is logged and changes nothing.
    pub fn decrement_counter(&mut self) {
        match self.ref_count {
            0 => {
                log::warn!("{}: decrement_counter at ref count 0", self.id);
            }
            1 => {
                self.ref_count = 0;
                if let Some(hook) = self.hooks.on_disable.as_mut() {
                    hook();
                }
            }
            _ => {
                self.ref_count -= 1;
            }
        }
    }

    // ---- mesh instances ----------------------------------------------

    /// Add mesh instances to this layer
    ///
    /// Each instance is classified by its blend mode into the opaque or
    /// transparent list; duplicates (by identity) are no-ops. Shadow
    /// casting instances are also added to the shadow caster list unless
    /// `skip_shadow_casters` is set.
    pub fn add_mesh_instances(
        &mut self,
        store: &MeshStore,
        keys: &[MeshInstanceKey],
        skip_shadow_casters: bool,
    ) {
        let mut set = self.instances.borrow_mut();
        for &key in keys {
            let Some(instance) = store.get(key) else {
                continue;
            };
            let list = if instance.is_transparent() {
                &mut set.transparent
            } else {
                &mut set.opaque
            };
            if !list.contains(&key) {
                list.push(key);
            }
            if !skip_shadow_casters && instance.cast_shadow && !set.shadow_casters.contains(&key) {
                set.shadow_casters.push(key);
            }
        }
        if !self.pass_through {
            self.dirty = true;
        }
    }

    /// Remove mesh instances from this layer
    ///
    /// Removing an instance that was never added is a silent no-op.
    pub fn remove_mesh_instances(&mut self, keys: &[MeshInstanceKey], skip_shadow_casters: bool) {
        let mut set = self.instances.borrow_mut();
        for &key in keys {
            if let Some(index) = set.opaque.iter().position(|&k| k == key) {
                set.opaque.remove(index);
            }
            if let Some(index) = set.transparent.iter().position(|&k| k == key) {
                set.transparent.remove(index);
            }
            if skip_shadow_casters {
                continue;
            }
            if let Some(index) = set.shadow_casters.iter().position(|&k| k == key) {
                set.shadow_casters.remove(index);
            }
        }
        self.dirty = true;
    }

    /// Remove all mesh instances from this layer
    ///
    /// A no-op when the lists are already empty, so no spurious dirty flag
    /// is raised.
    pub fn clear_mesh_instances(&mut self, skip_shadow_casters: bool) {
        let mut set = self.instances.borrow_mut();
        if set.opaque.is_empty()
            && set.transparent.is_empty()
            && (skip_shadow_casters || set.shadow_casters.is_empty())
        {
            return;
        }
        set.opaque.clear();
        set.transparent.clear();
        if !skip_shadow_casters {
            set.shadow_casters.clear();
        }
        drop(set);
        if !self.pass_through {
            self.dirty = true;
        }
    }

    /// Add instances as shadow casters only
    ///
    /// They will not be rendered by this layer, only cast shadows on it.
    /// Instances that do not cast shadows are skipped.
    pub fn add_shadow_casters(&mut self, store: &MeshStore, keys: &[MeshInstanceKey]) {
        let mut set = self.instances.borrow_mut();
        for &key in keys {
            let Some(instance) = store.get(key) else {
                continue;
            };
            if !instance.cast_shadow {
                continue;
            }
            if !set.shadow_casters.contains(&key) {
                set.shadow_casters.push(key);
            }
        }
        self.dirty_lights = true;
    }

    /// Remove instances from the shadow caster list only
    pub fn remove_shadow_casters(&mut self, keys: &[MeshInstanceKey]) {
        let mut set = self.instances.borrow_mut();
        for &key in keys {
            if let Some(index) = set.shadow_casters.iter().position(|&k| k == key) {
                set.shadow_casters.remove(index);
            }
        }
        self.dirty_lights = true;
    }

    // ---- lights -------------------------------------------------------

    /// Add a light to this layer; duplicates are no-ops
    pub fn add_light(&mut self, store: &LightStore, key: LightKey) {
        if self.lights.contains(&key) {
            return;
        }
        self.lights.push(key);
        self.dirty_lights = true;
        self.refresh_light_hashes(store);
    }

    /// Remove a light from this layer; absent lights are no-ops
    pub fn remove_light(&mut self, store: &LightStore, key: LightKey) {
        let Some(index) = self.lights.iter().position(|&k| k == key) else {
            return;
        };
        self.lights.remove(index);
        self.dirty_lights = true;
        self.refresh_light_hashes(store);
    }

    /// Remove all lights from this layer
    pub fn clear_lights(&mut self) {
        if self.lights.is_empty() {
            return;
        }
        self.lights.clear();
        self.static_light_tokens.clear();
        self.dynamic_light_tokens.clear();
        self.light_hash = hash::EMPTY_HASH;
        self.static_light_hash = hash::EMPTY_HASH;
        self.dirty_lights = true;
    }

    fn refresh_light_hashes(&mut self, store: &LightStore) {
        self.static_light_tokens.clear();
        self.dynamic_light_tokens.clear();
        for &key in &self.lights {
            let Some(light) = store.get(key) else {
                continue;
            };
            if light.is_static {
                self.static_light_tokens.push(light.token);
            } else {
                self.dynamic_light_tokens.push(light.token);
            }
        }
        self.static_light_tokens.sort_unstable();
        self.dynamic_light_tokens.sort_unstable();
        self.static_light_hash = hash::combine_sorted(&self.static_light_tokens);
        self.light_hash = hash::combine_sorted(&self.dynamic_light_tokens);
    }

    // ---- cameras ------------------------------------------------------

    /// Add a camera to this layer; duplicates are no-ops
    pub fn add_camera(&mut self, store: &CameraStore, key: CameraKey) {
        if self.cameras.contains(&key) {
            return;
        }
        self.cameras.push(key);
        self.refresh_camera_hash(store);
    }

    /// Remove a camera from this layer; absent cameras are no-ops
    ///
    /// The visible lists for the vacated camera pass are reset, since
    /// culling will not refresh them anymore.
    pub fn remove_camera(&mut self, store: &CameraStore, key: CameraKey) {
        let Some(index) = self.cameras.iter().position(|&k| k == key) else {
            return;
        };
        self.cameras.remove(index);
        self.refresh_camera_hash(store);
        self.instances.borrow_mut().clear_visible(index);
    }

    /// Remove all cameras from this layer
    pub fn clear_cameras(&mut self) {
        self.cameras.clear();
        self.camera_tokens.clear();
        self.camera_hash = hash::EMPTY_HASH;
        self.dirty_cameras = true;
    }

    fn refresh_camera_hash(&mut self, store: &CameraStore) {
        // a single camera (or none) never needs sublayer-group dedup
        if self.cameras.len() > 1 {
            self.camera_tokens.clear();
            for &key in &self.cameras {
                if let Some(camera) = store.get(key) {
                    self.camera_tokens.push(camera.token);
                }
            }
            self.camera_tokens.sort_unstable();
            self.camera_hash = hash::combine_sorted(&self.camera_tokens);
        } else {
            self.camera_tokens.clear();
            self.camera_hash = hash::EMPTY_HASH;
        }
        self.dirty_cameras = true;
    }

    // ---- sorting ------------------------------------------------------

    /// Sort mode configured for the requested pass
    pub fn sort_mode(&self, transparent: bool) -> SortMode {
        if transparent {
            self.transparent_sort_mode
        } else {
            self.opaque_sort_mode
        }
    }

    /// Sort the visibility list of one pass for one camera
    ///
    /// With [`SortMode::None`] this returns immediately. Distance-based
    /// modes first project every visible instance onto the camera forward
    /// axis and cache the result, bounded by the list's logical length.
    /// The list's stale tail storage is cut before sorting.
    pub fn sort_visible(
        &mut self,
        store: &mut MeshStore,
        transparent: bool,
        cam_pos: Vec3,
        cam_fwd: Vec3,
        camera_pass: usize,
    ) {
        let mode = self.sort_mode(transparent);
        if mode == SortMode::None {
            return;
        }

        let mut set = self.instances.borrow_mut();
        let visible = set.visible_list_mut(transparent, camera_pass);

        if mode.needs_distances() {
            sort::calculate_sort_distances(store, visible.entries(), cam_pos, cam_fwd);
        }

        visible.truncate_storage();
        sort::sort_keys(store, visible.entries_mut(), mode);
    }

    // ---- hook invocation ----------------------------------------------

    /// Fire `on_pre_cull` for a camera pass
    pub fn fire_pre_cull(&mut self, camera_pass: usize) {
        if let Some(hook) = self.hooks.on_pre_cull.as_mut() {
            hook(camera_pass);
        }
    }

    /// Fire `on_post_cull` for a camera pass
    pub fn fire_post_cull(&mut self, camera_pass: usize) {
        if let Some(hook) = self.hooks.on_post_cull.as_mut() {
            hook(camera_pass);
        }
    }

    /// Fire `on_pre_render` for a camera pass
    pub fn fire_pre_render(&mut self, camera_pass: usize) {
        if let Some(hook) = self.hooks.on_pre_render.as_mut() {
            hook(camera_pass);
        }
    }

    /// Fire the pre-render hook of one sublayer
    pub fn fire_pre_render_pass(&mut self, transparent: bool, camera_pass: usize) {
        let hook = if transparent {
            self.hooks.on_pre_render_transparent.as_mut()
        } else {
            self.hooks.on_pre_render_opaque.as_mut()
        };
        if let Some(hook) = hook {
            hook(camera_pass);
        }
    }

    /// Fire `on_post_render` for a camera pass
    pub fn fire_post_render(&mut self, camera_pass: usize) {
        if let Some(hook) = self.hooks.on_post_render.as_mut() {
            hook(camera_pass);
        }
    }

    /// Fire the post-render hook of one sublayer
    pub fn fire_post_render_pass(&mut self, transparent: bool, camera_pass: usize) {
        let hook = if transparent {
            self.hooks.on_post_render_transparent.as_mut()
        } else {
            self.hooks.on_post_render_opaque.as_mut()
        };
        if let Some(hook) = hook {
            hook(camera_pass);
        }
    }

    /// Fire `on_draw_call` for one instance
    pub fn fire_draw_call(&mut self, key: MeshInstanceKey, camera_pass: usize) {
        if let Some(hook) = self.hooks.on_draw_call.as_mut() {
            hook(key, camera_pass);
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled())
            .field("ref_count", &self.ref_count)
            .field("opaque_sort_mode", &self.opaque_sort_mode)
            .field("transparent_sort_mode", &self.transparent_sort_mode)
            .field("lights", &self.lights.len())
            .field("cameras", &self.cameras.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use slotmap::SlotMap;

    use crate::foundation::math::Aabb;
    use crate::scene::camera::Camera;
    use crate::scene::light::Light;
    use crate::scene::mesh_instance::{BlendMode, MeshInstance};

    fn mesh(store: &mut MeshStore, blend: BlendMode, cast_shadow: bool) -> MeshInstanceKey {
        let mut mi = MeshInstance::new(Aabb::default(), blend);
        mi.cast_shadow = cast_shadow;
        store.insert(mi)
    }

    #[test]
    fn test_add_mesh_instances_is_idempotent() {
        let mut store: MeshStore = SlotMap::with_key();
        let key = mesh(&mut store, BlendMode::None, true);

        let mut layer = Layer::new(LayerDescriptor::named("world"));
        layer.add_mesh_instances(&store, &[key], false);
        layer.add_mesh_instances(&store, &[key], false);

        let set = layer.instances();
        let set = set.borrow();
        assert_eq!(set.opaque, vec![key]);
        assert!(set.transparent.is_empty());
        assert_eq!(set.shadow_casters, vec![key]);
    }

    #[test]
    fn test_blend_mode_classifies_exactly_one_list() {
        let mut store: MeshStore = SlotMap::with_key();
        let opaque = mesh(&mut store, BlendMode::None, false);
        let blended = mesh(&mut store, BlendMode::Alpha, false);

        let mut layer = Layer::new(LayerDescriptor::named("world"));
        layer.add_mesh_instances(&store, &[opaque, blended], false);

        let set = layer.instances();
        let set = set.borrow();
        assert_eq!(set.opaque, vec![opaque]);
        assert_eq!(set.transparent, vec![blended]);
    }

    #[test]
    fn test_remove_absent_instance_is_noop() {
        let mut store: MeshStore = SlotMap::with_key();
        let present = mesh(&mut store, BlendMode::None, true);
        let absent = mesh(&mut store, BlendMode::None, true);

        let mut layer = Layer::new(LayerDescriptor::named("world"));
        layer.add_mesh_instances(&store, &[present], false);
        layer.remove_mesh_instances(&[absent], false);

        let set = layer.instances();
        assert_eq!(set.borrow().opaque, vec![present]);
    }

    #[test]
    fn test_clear_when_empty_raises_no_dirty_flag() {
        let mut layer = Layer::new(LayerDescriptor::named("world"));
        layer.dirty = false;
        layer.clear_mesh_instances(false);
        assert!(!layer.dirty);

        let mut store: MeshStore = SlotMap::with_key();
        let key = mesh(&mut store, BlendMode::None, true);
        layer.add_mesh_instances(&store, &[key], false);
        layer.dirty = false;
        layer.clear_mesh_instances(false);
        assert!(layer.dirty);
        assert!(layer.instances().borrow().opaque.is_empty());
    }

    #[test]
    fn test_clear_skipping_shadow_casters_keeps_them() {
        let mut store: MeshStore = SlotMap::with_key();
        let key = mesh(&mut store, BlendMode::None, true);

        let mut layer = Layer::new(LayerDescriptor::named("world"));
        layer.add_mesh_instances(&store, &[key], false);
        layer.clear_mesh_instances(true);

        let set = layer.instances();
        let set = set.borrow();
        assert!(set.opaque.is_empty());
        assert_eq!(set.shadow_casters, vec![key]);
    }

    #[test]
    fn test_counter_transitions_fire_hooks_once() {
        let enables = Rc::new(Cell::new(0u32));
        let disables = Rc::new(Cell::new(0u32));

        let mut layer = Layer::new(LayerDescriptor::named("fx"));
        let e = enables.clone();
        layer.hooks.on_enable = Some(Box::new(move || e.set(e.get() + 1)));
        let d = disables.clone();
        layer.hooks.on_disable = Some(Box::new(move || d.set(d.get() + 1)));

        // freshly constructed enabled layer has ref count 1
        assert!(layer.enabled());
        assert_eq!(layer.ref_count(), 1);

        layer.decrement_counter();
        assert!(!layer.enabled());
        assert_eq!(disables.get(), 1);

        // underflow: state unchanged, no second hook
        layer.decrement_counter();
        assert!(!layer.enabled());
        assert_eq!(layer.ref_count(), 0);
        assert_eq!(disables.get(), 1);

        layer.increment_counter();
        layer.increment_counter();
        assert_eq!(enables.get(), 1);
        assert_eq!(layer.ref_count(), 2);

        // still held by one counter: stays enabled
        layer.decrement_counter();
        assert!(layer.enabled());
        assert_eq!(disables.get(), 1);
    }

    #[test]
    fn test_set_enabled_delegates_to_counter() {
        let mut layer = Layer::new(LayerDescriptor {
            enabled: false,
            ..LayerDescriptor::named("fx")
        });
        assert!(!layer.enabled());

        layer.set_enabled(true);
        assert_eq!(layer.ref_count(), 1);
        layer.set_enabled(true);
        assert_eq!(layer.ref_count(), 1);
        layer.set_enabled(false);
        assert!(!layer.enabled());
    }

    #[test]
    fn test_light_hash_order_independent_and_static_only() {
        let mut lights: LightStore = SlotMap::with_key();
        let color = Vec3::new(1.0, 1.0, 1.0);
        let s1 = lights.insert(Light::omni(101, color, 1.0).with_static(true));
        let s2 = lights.insert(Light::omni(202, color, 1.0).with_static(true));
        let dynamic = lights.insert(Light::directional(303, color, 1.0));

        let mut a = Layer::new(LayerDescriptor::named("a"));
        a.add_light(&lights, s1);
        a.add_light(&lights, s2);
        a.add_light(&lights, dynamic);

        let mut b = Layer::new(LayerDescriptor::named("b"));
        b.add_light(&lights, dynamic);
        b.add_light(&lights, s2);
        b.add_light(&lights, s1);

        assert_ne!(a.static_light_hash(), hash::EMPTY_HASH);
        assert_eq!(a.static_light_hash(), b.static_light_hash());
        assert_eq!(a.light_hash(), b.light_hash());

        // dynamic-only layer: static hash stays the empty sentinel
        let mut c = Layer::new(LayerDescriptor::named("c"));
        c.add_light(&lights, dynamic);
        assert_eq!(c.static_light_hash(), hash::EMPTY_HASH);
        assert_ne!(c.light_hash(), hash::EMPTY_HASH);
    }

    #[test]
    fn test_light_hash_membership_sensitivity() {
        let mut lights: LightStore = SlotMap::with_key();
        let color = Vec3::new(1.0, 1.0, 1.0);
        let s1 = lights.insert(Light::omni(11, color, 1.0).with_static(true));
        let s2 = lights.insert(Light::omni(22, color, 1.0).with_static(true));

        let mut layer = Layer::new(LayerDescriptor::named("a"));
        layer.add_light(&lights, s1);
        let one = layer.static_light_hash();
        layer.add_light(&lights, s2);
        let two = layer.static_light_hash();
        assert_ne!(one, two);

        layer.remove_light(&lights, s2);
        assert_eq!(layer.static_light_hash(), one);

        layer.clear_lights();
        assert_eq!(layer.static_light_hash(), hash::EMPTY_HASH);
        assert_eq!(layer.light_hash(), hash::EMPTY_HASH);
    }

    #[test]
    fn test_camera_hash_zero_for_single_camera() {
        let mut cameras: CameraStore = SlotMap::with_key();
        let fwd = Vec3::new(0.0, 0.0, -1.0);
        let c1 = cameras.insert(Camera::new(1, Vec3::zeros(), fwd));
        let c2 = cameras.insert(Camera::new(2, Vec3::zeros(), fwd));

        let mut layer = Layer::new(LayerDescriptor::named("world"));
        assert_eq!(layer.camera_hash(), hash::EMPTY_HASH);

        layer.add_camera(&cameras, c1);
        assert_eq!(layer.camera_hash(), hash::EMPTY_HASH);

        layer.add_camera(&cameras, c2);
        assert_ne!(layer.camera_hash(), hash::EMPTY_HASH);

        layer.remove_camera(&cameras, c2);
        assert_eq!(layer.camera_hash(), hash::EMPTY_HASH);
    }

    #[test]
    fn test_camera_hash_order_independent() {
        let mut cameras: CameraStore = SlotMap::with_key();
        let fwd = Vec3::new(0.0, 0.0, -1.0);
        let c1 = cameras.insert(Camera::new(1, Vec3::zeros(), fwd));
        let c2 = cameras.insert(Camera::new(2, Vec3::zeros(), fwd));

        let mut a = Layer::new(LayerDescriptor::named("a"));
        a.add_camera(&cameras, c1);
        a.add_camera(&cameras, c2);

        let mut b = Layer::new(LayerDescriptor::named("b"));
        b.add_camera(&cameras, c2);
        b.add_camera(&cameras, c1);

        assert_eq!(a.camera_hash(), b.camera_hash());
    }

    #[test]
    fn test_shared_instance_set_mutations_visible_to_both() {
        let mut store: MeshStore = SlotMap::with_key();
        let key = mesh(&mut store, BlendMode::None, false);

        let mut world = Layer::new(LayerDescriptor::named("world"));
        let mut mirror =
            Layer::with_instances(LayerDescriptor::named("mirror"), world.instances());

        world.add_mesh_instances(&store, &[key], false);
        assert_eq!(mirror.instances().borrow().opaque, vec![key]);

        mirror.remove_mesh_instances(&[key], false);
        assert!(world.instances().borrow().opaque.is_empty());
    }

    #[test]
    fn test_sort_visible_back_to_front_through_layer() {
        let mut store: MeshStore = SlotMap::with_key();
        let near = store.insert(MeshInstance::new(
            Aabb::from_center_extents(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.5, 0.5, 0.5)),
            BlendMode::Alpha,
        ));
        let far = store.insert(MeshInstance::new(
            Aabb::from_center_extents(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.5, 0.5, 0.5)),
            BlendMode::Alpha,
        ));

        let mut layer = Layer::new(LayerDescriptor::named("world"));
        layer.add_mesh_instances(&store, &[near, far], false);
        {
            let instances = layer.instances();
            let mut set = instances.borrow_mut();
            let visible = set.visible_list_mut(true, 0);
            visible.push(near);
            visible.push(far);
        }

        layer.sort_visible(&mut store, true, Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), 0);

        let instances = layer.instances();
        let set = instances.borrow();
        let sorted = set.visible_list(true, 0).unwrap();
        assert_eq!(sorted.entries(), &[far, near]);
    }

    #[test]
    fn test_sort_visible_none_leaves_culling_order() {
        let mut store: MeshStore = SlotMap::with_key();
        let a = mesh(&mut store, BlendMode::None, false);
        let b = mesh(&mut store, BlendMode::None, false);

        let mut layer = Layer::new(LayerDescriptor {
            opaque_sort_mode: SortMode::None,
            ..LayerDescriptor::named("ui")
        });
        {
            let instances = layer.instances();
            let mut set = instances.borrow_mut();
            let visible = set.visible_list_mut(false, 0);
            visible.push(b);
            visible.push(a);
        }

        layer.sort_visible(&mut store, false, Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), 0);

        let instances = layer.instances();
        let set = instances.borrow();
        assert_eq!(set.visible_list(false, 0).unwrap().entries(), &[b, a]);
    }
}
