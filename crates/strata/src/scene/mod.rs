//! Scene layer and visibility composition
//!
//! Drawable objects are partitioned into named, orderable [`Layer`]s; a
//! [`LayerComposition`] orders their opaque/transparent sublayers into the
//! full-frame draw sequence. Per frame and per camera, the renderer asks
//! each active layer to sort the visibility lists culling produced and
//! walks the composition's render list to issue draws.
//!
//! ## Frame flow
//!
//! ```text
//! scene update      render loop (per frame)
//! ------------      -----------------------
//! layer.add_*   →   composition.update(...)
//! layer.remove_*    for entry in composition.render_list():
//! layer.set_enabled     layer.fire_pre_cull(...)
//!                       <external culling fills the visible lists>
//!                       layer.fire_post_cull(...)
//!                       layer.sort_visible(...)
//!                       layer.fire_pre_render(...) / draws / post hooks
//! ```
//!
//! Mutation happens strictly before the render phase of a frame; the
//! subsystem is single-threaded and uses no locks.

mod camera;
mod composition;
pub mod hash;
mod instance_set;
mod layer;
mod light;
mod mesh_instance;
mod registry;
mod sort;

pub use camera::{Camera, CameraKey, CameraStore};
pub use composition::{CompositionError, CompositionUpdate, LayerComposition, RenderListEntry};
pub use instance_set::{InstanceSet, SharedInstanceSet, VisibleList};
pub use layer::{ClearFlags, Layer, LayerDescriptor, LayerHooks, LayerId, ShaderPass};
pub use light::{Light, LightKey, LightKind, LightStore};
pub use mesh_instance::{BlendMode, MeshInstance, MeshInstanceKey, MeshStore};
pub use registry::LayerRegistry;
pub use sort::SortMode;
