//! Layer composition
//!
//! A [`LayerComposition`] is the ordered full-frame sequence of sublayers
//! (the opaque and transparent halves of each layer) that defines draw
//! order. It is built once per scene configuration, edited incrementally,
//! and read every frame: [`LayerComposition::update`] propagates layer
//! dirty flags, regathers the scene-wide instance/light/camera lists and
//! rebuilds the render list the renderer walks.

use std::collections::HashMap;

use crate::scene::camera::CameraKey;
use crate::scene::layer::LayerId;
use crate::scene::light::{LightKey, LightKind, LightStore};
use crate::scene::mesh_instance::MeshInstanceKey;
use crate::scene::registry::LayerRegistry;

/// Errors from composition edits whose preconditions were violated
///
/// Failed edits never partially mutate the composition; the parallel
/// sublayer sequences stay consistent.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionError {
    /// The layer is already present and may not be pushed again through
    /// the whole-layer API
    #[error("{0} is already in the composition")]
    LayerAlreadyAdded(LayerId),

    /// The reference layer for a relative insert was not found
    #[error("reference {0} is not in the composition")]
    LayerNotFound(LayerId),

    /// A sublayer index was out of bounds
    #[error("sublayer index {index} out of bounds (length {len})")]
    IndexOutOfBounds {
        /// The offending index
        index: usize,
        /// Current number of sublayers
        len: usize,
    },
}

bitflags::bitflags! {
    /// What a call to [`LayerComposition::update`] changed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompositionUpdate: u32 {
        /// The gathered mesh instance list changed
        const INSTANCES = 1;
        /// The gathered light lists changed
        const LIGHTS = 2;
        /// The camera list and render list changed
        const CAMERAS = 4;
    }
}

/// One step of the frame's rendering sequence
///
/// Identical to walking the sublayer list directly when every layer has a
/// single camera; with multi-camera layers, consecutive sublayers sharing
/// a camera set are expanded camera-major so per-camera work is reused
/// across the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderListEntry {
    /// Index into the sublayer sequence
    pub sublayer: usize,
    /// Index into the layer's camera list
    pub camera_slot: usize,
}

/// Ordered sequence of sublayers defining full-frame draw order
#[derive(Debug, Default)]
pub struct LayerComposition {
    layer_list: Vec<LayerId>,
    sublayer_transparent: Vec<bool>,
    // more granular control on top of layer enable state (ANDed)
    sublayer_enabled: Vec<bool>,

    opaque_order: HashMap<LayerId, usize>,
    transparent_order: HashMap<LayerId, usize>,

    dirty: bool,
    dirty_lights: bool,
    dirty_cameras: bool,

    mesh_instances: Vec<MeshInstanceKey>,
    lights: Vec<LightKey>,
    sorted_lights: [Vec<LightKey>; 3],
    cameras: Vec<CameraKey>,
    render_list: Vec<RenderListEntry>,
}

impl LayerComposition {
    /// Create an empty composition
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sublayer entries
    pub fn len(&self) -> usize {
        self.layer_list.len()
    }

    /// Whether the composition holds no sublayers
    pub fn is_empty(&self) -> bool {
        self.layer_list.is_empty()
    }

    /// The ordered layer ids, one per sublayer entry
    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_list
    }

    /// Whether a layer has any sublayer entry
    pub fn contains(&self, layer: LayerId) -> bool {
        self.layer_list.contains(&layer)
    }

    /// Iterate `(layer, transparent, enabled)` over the sublayer sequence
    pub fn sublayers(&self) -> impl Iterator<Item = (LayerId, bool, bool)> + '_ {
        self.layer_list
            .iter()
            .zip(&self.sublayer_transparent)
            .zip(&self.sublayer_enabled)
            .map(|((&layer, &transparent), &enabled)| (layer, transparent, enabled))
    }

    // ---- whole-layer API ---------------------------------------------

    /// Append a layer's opaque and transparent sublayers, in that order
    pub fn push_layer(&mut self, layer: LayerId) -> Result<(), CompositionError> {
        self.check_not_added(layer)?;
        self.insert_pair(self.layer_list.len(), layer);
        Ok(())
    }

    /// Insert both sublayers immediately before the first occurrence of
    /// `before`
    pub fn insert_layer_before(
        &mut self,
        layer: LayerId,
        before: LayerId,
    ) -> Result<(), CompositionError> {
        self.check_not_added(layer)?;
        let Some(index) = self.layer_list.iter().position(|&id| id == before) else {
            log::error!("can't insert {layer}: reference {before} not in composition");
            return Err(CompositionError::LayerNotFound(before));
        };
        self.insert_pair(index, layer);
        Ok(())
    }

    /// Insert both sublayers immediately after the last occurrence of
    /// `after`
    pub fn insert_layer_after(
        &mut self,
        layer: LayerId,
        after: LayerId,
    ) -> Result<(), CompositionError> {
        self.check_not_added(layer)?;
        let Some(index) = self.layer_list.iter().rposition(|&id| id == after) else {
            log::error!("can't insert {layer}: reference {after} not in composition");
            return Err(CompositionError::LayerNotFound(after));
        };
        self.insert_pair(index + 1, layer);
        Ok(())
    }

    /// Remove every sublayer entry referencing `layer`
    ///
    /// There may be more than two if entries were added through the
    /// sublayer API.
    pub fn remove_layer(&mut self, layer: LayerId) {
        let mut removed = false;
        while let Some(index) = self.layer_list.iter().position(|&id| id == layer) {
            self.layer_list.remove(index);
            self.sublayer_transparent.remove(index);
            self.sublayer_enabled.remove(index);
            removed = true;
        }
        if removed {
            self.mark_dirty();
        }
    }

    // ---- sublayer API ------------------------------------------------

    /// Index of the (layer, transparent) sublayer, if present
    ///
    /// Scans the whole sequence, so the two halves of a layer are found
    /// even when they are not adjacent.
    pub fn get_sublayer_index(&self, layer: LayerId, transparent: bool) -> Option<usize> {
        self.layer_list
            .iter()
            .zip(&self.sublayer_transparent)
            .position(|(&id, &t)| id == layer && t == transparent)
    }

    /// Insert a single sublayer entry at an index
    pub fn insert_sublayer_at(
        &mut self,
        index: usize,
        layer: LayerId,
        transparent: bool,
    ) -> Result<(), CompositionError> {
        if index > self.layer_list.len() {
            log::error!(
                "can't insert sublayer of {layer}: index {index} out of bounds (length {})",
                self.layer_list.len()
            );
            return Err(CompositionError::IndexOutOfBounds {
                index,
                len: self.layer_list.len(),
            });
        }
        self.layer_list.insert(index, layer);
        self.sublayer_transparent.insert(index, transparent);
        self.sublayer_enabled.insert(index, true);
        self.mark_dirty();
        Ok(())
    }

    /// Remove the single sublayer entry at an index
    pub fn remove_sublayer_at(&mut self, index: usize) -> Result<(), CompositionError> {
        if index >= self.layer_list.len() {
            log::error!(
                "can't remove sublayer: index {index} out of bounds (length {})",
                self.layer_list.len()
            );
            return Err(CompositionError::IndexOutOfBounds {
                index,
                len: self.layer_list.len(),
            });
        }
        self.layer_list.remove(index);
        self.sublayer_transparent.remove(index);
        self.sublayer_enabled.remove(index);
        self.mark_dirty();
        Ok(())
    }

    /// Whether the sublayer at an index is enabled
    pub fn sublayer_enabled(&self, index: usize) -> bool {
        self.sublayer_enabled.get(index).copied().unwrap_or(false)
    }

    /// Enable or disable a single sublayer entry
    ///
    /// ANDed with the layer's own enable state by the renderer.
    pub fn set_sublayer_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(slot) = self.sublayer_enabled.get_mut(index) {
            *slot = enabled;
        }
    }

    // ---- order comparison helpers ------------------------------------

    /// Compare two layer-id sets by their topmost opaque sublayer
    ///
    /// Returns [`std::cmp::Ordering::Less`] when `layers_a` holds the
    /// sublayer drawn last (on top), so sorting with this comparator puts
    /// the topmost set first. A set with no sublayer in the composition
    /// orders after one that has.
    pub fn sort_opaque_layers(
        &self,
        layers_a: &[LayerId],
        layers_b: &[LayerId],
    ) -> std::cmp::Ordering {
        Self::compare_topmost(layers_a, layers_b, &self.opaque_order)
    }

    /// Compare two layer-id sets by their topmost transparent sublayer
    pub fn sort_transparent_layers(
        &self,
        layers_a: &[LayerId],
        layers_b: &[LayerId],
    ) -> std::cmp::Ordering {
        Self::compare_topmost(layers_a, layers_b, &self.transparent_order)
    }

    fn compare_topmost(
        layers_a: &[LayerId],
        layers_b: &[LayerId],
        order: &HashMap<LayerId, usize>,
    ) -> std::cmp::Ordering {
        let top = |layers: &[LayerId]| {
            layers
                .iter()
                .filter_map(|id| order.get(id).copied())
                .max()
        };
        match (top(layers_a), top(layers_b)) {
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (a, b) => b.cmp(&a),
        }
    }

    // ---- frame update -------------------------------------------------

    /// Gathered scene-wide mesh instance list (valid after [`Self::update`])
    pub fn mesh_instances(&self) -> &[MeshInstanceKey] {
        &self.mesh_instances
    }

    /// Gathered unique lights across all layers
    pub fn lights(&self) -> &[LightKey] {
        &self.lights
    }

    /// Gathered enabled lights of one kind
    pub fn lights_of_kind(&self, kind: LightKind) -> &[LightKey] {
        &self.sorted_lights[Self::kind_index(kind)]
    }

    /// Gathered unique cameras across all layers, in encounter order
    pub fn cameras(&self) -> &[CameraKey] {
        &self.cameras
    }

    /// The rendering sequence produced by the last [`Self::update`]
    pub fn render_list(&self) -> &[RenderListEntry] {
        &self.render_list
    }

    /// Layer id and transparency flag of a sublayer entry
    pub fn sublayer(&self, index: usize) -> Option<(LayerId, bool)> {
        Some((
            *self.layer_list.get(index)?,
            *self.sublayer_transparent.get(index)?,
        ))
    }

    /// Refresh the gathered lists and render list from the layers' state
    ///
    /// Propagates dirty flags raised on layers since the last call,
    /// regathers whatever they affect and clears the flags on both sides.
    /// Returns a mask of what changed; empty means the frame can reuse
    /// everything from the previous one.
    pub fn update(
        &mut self,
        registry: &mut LayerRegistry,
        lights: &LightStore,
    ) -> CompositionUpdate {
        for &id in &self.layer_list {
            if let Some(layer) = registry.get(id) {
                self.dirty |= layer.dirty;
                self.dirty_lights |= layer.dirty_lights;
                self.dirty_cameras |= layer.dirty_cameras;
            }
        }

        let mut result = CompositionUpdate::empty();

        if self.dirty {
            result |= CompositionUpdate::INSTANCES;
            self.gather_mesh_instances(registry);
            self.dirty = false;
            for &id in &self.layer_list {
                if let Some(layer) = registry.get_mut(id) {
                    layer.dirty = false;
                }
            }
        }

        if self.dirty_lights {
            result |= CompositionUpdate::LIGHTS;
            self.gather_lights(registry, lights);
            self.dirty_lights = false;
            for &id in &self.layer_list {
                if let Some(layer) = registry.get_mut(id) {
                    layer.dirty_lights = false;
                }
            }
        }

        if self.dirty_cameras {
            result |= CompositionUpdate::CAMERAS;
            self.gather_cameras(registry);
            self.rebuild_render_list(registry);
            self.dirty_cameras = false;
            for &id in &self.layer_list {
                if let Some(layer) = registry.get_mut(id) {
                    layer.dirty_cameras = false;
                }
            }
        }

        result
    }

    fn gather_mesh_instances(&mut self, registry: &LayerRegistry) {
        self.mesh_instances.clear();
        for &id in &self.layer_list {
            let Some(layer) = registry.get(id) else {
                continue;
            };
            if layer.pass_through {
                continue;
            }
            let instances = layer.instances();
            let set = instances.borrow();
            for &key in set.opaque.iter().chain(set.transparent.iter()) {
                if !self.mesh_instances.contains(&key) {
                    self.mesh_instances.push(key);
                }
            }
        }
    }

    fn gather_lights(&mut self, registry: &LayerRegistry, store: &LightStore) {
        self.lights.clear();
        for bucket in &mut self.sorted_lights {
            bucket.clear();
        }
        for &id in &self.layer_list {
            let Some(layer) = registry.get(id) else {
                continue;
            };
            for &key in layer.lights() {
                if self.lights.contains(&key) {
                    continue;
                }
                self.lights.push(key);
                if let Some(light) = store.get(key) {
                    if light.enabled {
                        self.sorted_lights[Self::kind_index(light.kind)].push(key);
                    }
                }
            }
        }
    }

    fn gather_cameras(&mut self, registry: &LayerRegistry) {
        self.cameras.clear();
        for &id in &self.layer_list {
            let Some(layer) = registry.get(id) else {
                continue;
            };
            for &key in layer.cameras() {
                if !self.cameras.contains(&key) {
                    self.cameras.push(key);
                }
            }
        }
    }

    /// Rebuild the render list, grouping consecutive sublayers whose
    /// camera sets hash identically so the group is iterated camera-major.
    fn rebuild_render_list(&mut self, registry: &LayerRegistry) {
        self.render_list.clear();
        let len = self.layer_list.len();
        let mut i = 0;
        while i < len {
            let Some(layer) = registry.get(self.layer_list[i]) else {
                i += 1;
                continue;
            };
            let camera_count = layer.cameras().len();
            if camera_count == 0 {
                i += 1;
                continue;
            }

            let hash = layer.camera_hash();
            if hash == 0 {
                // single camera in the layer
                self.render_list.push(RenderListEntry {
                    sublayer: i,
                    camera_slot: 0,
                });
                i += 1;
                continue;
            }

            let mut run = 1;
            while i + run < len {
                let next = registry.get(self.layer_list[i + run]);
                if next.map(crate::scene::layer::Layer::camera_hash) == Some(hash) {
                    run += 1;
                } else {
                    break;
                }
            }
            for camera_slot in 0..camera_count {
                for offset in 0..run {
                    self.render_list.push(RenderListEntry {
                        sublayer: i + offset,
                        camera_slot,
                    });
                }
            }
            i += run;
        }
    }

    // ---- internals ----------------------------------------------------

    fn kind_index(kind: LightKind) -> usize {
        match kind {
            LightKind::Directional => 0,
            LightKind::Omni => 1,
            LightKind::Spot => 2,
        }
    }

    fn check_not_added(&self, layer: LayerId) -> Result<(), CompositionError> {
        if self.contains(layer) {
            log::error!("{layer} is already in the composition");
            return Err(CompositionError::LayerAlreadyAdded(layer));
        }
        Ok(())
    }

    fn insert_pair(&mut self, index: usize, layer: LayerId) {
        self.layer_list.insert(index, layer);
        self.layer_list.insert(index + 1, layer);
        self.sublayer_transparent.insert(index, false);
        self.sublayer_transparent.insert(index + 1, true);
        self.sublayer_enabled.insert(index, true);
        self.sublayer_enabled.insert(index + 1, true);
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.dirty_lights = true;
        self.dirty_cameras = true;
        self.rebuild_order_maps();
    }

    fn rebuild_order_maps(&mut self) {
        self.opaque_order.clear();
        self.transparent_order.clear();
        for (index, (&layer, &transparent)) in self
            .layer_list
            .iter()
            .zip(&self.sublayer_transparent)
            .enumerate()
        {
            let order = if transparent {
                &mut self.transparent_order
            } else {
                &mut self.opaque_order
            };
            order.insert(layer, index);
        }
    }
}
