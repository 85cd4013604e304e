//! Layer ownership and id allocation
//!
//! [`LayerRegistry`] owns every layer of one scene and hands out the small
//! integer [`LayerId`]s the composition orders. Ids are reused first-fit
//! once released, and the registry is an ordinary value owned by whatever
//! assembles the scene, so independent scenes (and tests) never share
//! state.

use crate::scene::layer::{Layer, LayerId};

/// Owns the layers of one scene and allocates their ids
#[derive(Debug, Default)]
pub struct LayerRegistry {
    slots: Vec<Option<Layer>>,
}

impl LayerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a layer and assign it an id
    ///
    /// The first vacant slot is reused; otherwise the id space grows by
    /// one.
    pub fn add(&mut self, mut layer: Layer) -> LayerId {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len());
        let id = LayerId(index as u32);
        layer.id = id;
        if index == self.slots.len() {
            self.slots.push(Some(layer));
        } else {
            self.slots[index] = Some(layer);
        }
        id
    }

    /// Remove a layer, releasing its id for reuse
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        self.slots.get_mut(id.0 as usize).and_then(Option::take)
    }

    /// Look up a layer by id
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Look up a layer mutably by id
    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Find a layer by display name
    pub fn get_by_name(&self, name: &str) -> Option<&Layer> {
        self.iter().find(|layer| layer.name == name)
    }

    /// Iterate over live layers
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Iterate mutably over live layers
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Number of live layers
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether the registry holds no layers
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
