//! Light handles
//!
//! Lights are consumed opaquely by the layer system: membership in a
//! layer's light set, the `is_static` flag and the stable identity token
//! are all it reads. Color and intensity ride along for the renderer.

use slotmap::SlotMap;

use crate::foundation::math::Vec3;

slotmap::new_key_type! {
    /// Arena key identifying a [`Light`]
    pub struct LightKey;
}

/// Arena storage for lights
pub type LightStore = SlotMap<LightKey, Light>;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Directional light (like sunlight)
    Directional,
    /// Omnidirectional point light
    Omni,
    /// Spot light with a cone
    Spot,
}

/// Light source
#[derive(Debug, Clone)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Stable identity token used for layer light-set hashing
    pub token: u64,
    /// Whether this light's contribution can be baked rather than
    /// evaluated per frame; only static lights feed the static-light hash
    pub is_static: bool,
    /// Disabled lights are skipped when the composition gathers lights
    pub enabled: bool,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
}

impl Light {
    /// Create a directional light
    pub fn directional(token: u64, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            token,
            is_static: false,
            enabled: true,
            color,
            intensity,
        }
    }

    /// Create an omni light
    pub fn omni(token: u64, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Omni,
            token,
            is_static: false,
            enabled: true,
            color,
            intensity,
        }
    }

    /// Create a spot light
    pub fn spot(token: u64, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Spot,
            token,
            is_static: false,
            enabled: true,
            color,
            intensity,
        }
    }

    /// Mark this light as static (bakeable)
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }
}
