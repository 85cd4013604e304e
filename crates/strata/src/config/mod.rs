//! Configuration system
//!
//! A layer stack can be described in RON or TOML and instantiated into a
//! [`LayerRegistry`] plus [`LayerComposition`] in declaration order.

pub use serde::{Deserialize, Serialize};

use crate::scene::{
    ClearFlags, Layer, LayerComposition, LayerDescriptor, LayerRegistry, ShaderPass, SortMode,
};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Declarative description of a layer stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayersConfig {
    /// Layers in composition order
    pub layers: Vec<LayerConfigEntry>,
}

impl Config for LayersConfig {}

/// One layer in a [`LayersConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfigEntry {
    /// Display name
    pub name: String,

    /// Whether the layer starts enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sort mode for the opaque pass
    #[serde(default)]
    pub opaque_sort_mode: SortMode,

    /// Sort mode for the transparent pass
    #[serde(default = "default_transparent_sort")]
    pub transparent_sort_mode: SortMode,

    /// Shader pass selector
    #[serde(default)]
    pub shader_pass: ShaderPass,

    /// Pass-through layers skip dirty tracking
    #[serde(default)]
    pub pass_through: bool,

    /// Use the layer's clear settings instead of the camera's
    #[serde(default)]
    pub override_clear: bool,

    /// Clear color applied when `override_clear` is set
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// Clear the color buffer before rendering
    #[serde(default)]
    pub clear_color_buffer: bool,

    /// Clear the depth buffer before rendering
    #[serde(default)]
    pub clear_depth_buffer: bool,

    /// Clear the stencil buffer before rendering
    #[serde(default)]
    pub clear_stencil_buffer: bool,
}

fn default_true() -> bool {
    true
}

fn default_transparent_sort() -> SortMode {
    SortMode::BackToFront
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl LayerConfigEntry {
    fn clear_flags(&self) -> ClearFlags {
        let mut flags = ClearFlags::empty();
        if self.clear_color_buffer {
            flags |= ClearFlags::COLOR;
        }
        if self.clear_depth_buffer {
            flags |= ClearFlags::DEPTH;
        }
        if self.clear_stencil_buffer {
            flags |= ClearFlags::STENCIL;
        }
        flags
    }

    fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            name: self.name.clone(),
            enabled: self.enabled,
            opaque_sort_mode: self.opaque_sort_mode,
            transparent_sort_mode: self.transparent_sort_mode,
            shader_pass: self.shader_pass,
            pass_through: self.pass_through,
            override_clear: self.override_clear,
            clear_color: self.clear_color,
            clear_flags: self.clear_flags(),
            ..LayerDescriptor::default()
        }
    }
}

impl LayersConfig {
    /// Instantiate the described layers in declaration order
    pub fn build(&self) -> (LayerRegistry, LayerComposition) {
        let mut registry = LayerRegistry::new();
        let mut composition = LayerComposition::new();
        for entry in &self.layers {
            let id = registry.add(Layer::new(entry.descriptor()));
            // ids from a fresh registry are unique, so this cannot reject
            composition.push_layer(id).ok();
        }
        (registry, composition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ron_round_trip_with_defaults() {
        let text = r#"(
            layers: [
                (name: "world"),
                (
                    name: "ui",
                    opaque_sort_mode: Manual,
                    transparent_sort_mode: Manual,
                    clear_depth_buffer: true,
                ),
            ],
        )"#;
        let config: LayersConfig = ron::from_str(text).unwrap();
        assert_eq!(config.layers.len(), 2);

        let world = &config.layers[0];
        assert!(world.enabled);
        assert_eq!(world.opaque_sort_mode, SortMode::MaterialMesh);
        assert_eq!(world.transparent_sort_mode, SortMode::BackToFront);
        assert_eq!(world.shader_pass, ShaderPass::Forward);

        let ui = &config.layers[1];
        assert_eq!(ui.opaque_sort_mode, SortMode::Manual);
        assert!(ui.clear_depth_buffer);
        assert_eq!(ui.clear_flags(), ClearFlags::DEPTH);
    }

    #[test]
    fn test_build_creates_registry_and_composition_in_order() {
        let config: LayersConfig =
            ron::from_str(r#"(layers: [(name: "world"), (name: "ui")])"#).unwrap();

        let (registry, composition) = config.build();
        assert_eq!(registry.len(), 2);
        assert_eq!(composition.len(), 4);

        let world = registry.get_by_name("world").unwrap();
        let ui = registry.get_by_name("ui").unwrap();
        assert_eq!(composition.get_sublayer_index(world.id(), false), Some(0));
        assert_eq!(composition.get_sublayer_index(ui.id(), true), Some(3));
    }
}
