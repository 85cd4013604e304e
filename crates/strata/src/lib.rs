//! # strata
//!
//! Scene layer and visibility composition for 3D renderers.
//!
//! The crate decides *what* to draw, *in what order*, and *for which
//! camera*: drawable objects are bucketed into named [`scene::Layer`]s,
//! a [`scene::LayerComposition`] orders their opaque and transparent
//! sublayers into the full-frame sequence, and per camera each layer's
//! visibility list is sorted under one of several ordering policies
//! (manual order, material/mesh key, back-to-front, front-to-back).
//! Identical light and camera configurations are detected through stable
//! combination hashes so a renderer can reuse batched work across layers.
//!
//! GPU submission, culling, materials and asset loading are external
//! collaborators: this crate consumes opaque mesh/light/camera handles and
//! produces ordered draw lists.
//!
//! ## Quick start
//!
//! ```rust
//! use strata::prelude::*;
//! use strata::foundation::math::Aabb;
//!
//! let mut meshes = MeshStore::default();
//! let cube = meshes.insert(MeshInstance::new(Aabb::default(), BlendMode::None));
//!
//! let mut registry = LayerRegistry::new();
//! let world = registry.add(Layer::new(LayerDescriptor::named("world")));
//! registry
//!     .get_mut(world)
//!     .unwrap()
//!     .add_mesh_instances(&meshes, &[cube], false);
//!
//! let mut composition = LayerComposition::new();
//! composition.push_layer(world).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod scene;

/// Common imports for crate users
pub mod prelude {
    pub use crate::config::{Config, ConfigError, LayersConfig};
    pub use crate::scene::{
        BlendMode, Camera, CameraStore, CompositionError, CompositionUpdate, Layer,
        LayerComposition, LayerDescriptor, LayerId, LayerRegistry, Light, LightKind, LightStore,
        MeshInstance, MeshStore, ShaderPass, SortMode,
    };
}
