//! Camera handles
//!
//! The layer system reads a camera's position and forward axis for
//! distance sorting, its priority for deterministic hashing order and its
//! stable identity token for the camera-set hash. Projection math lives
//! with the renderer, outside this crate.

use slotmap::SlotMap;

use crate::foundation::math::Vec3;

slotmap::new_key_type! {
    /// Arena key identifying a [`Camera`]
    pub struct CameraKey;
}

/// Arena storage for cameras
pub type CameraStore = SlotMap<CameraKey, Camera>;

/// Camera handle consumed by layers
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Normalized forward axis; distance sorting projects onto this
    pub forward: Vec3,

    /// Render priority; lower priorities render first
    pub priority: i32,

    /// Stable identity token used for layer camera-set hashing
    pub token: u64,

    /// Opaque render-target handle, if the camera renders off-screen
    pub render_target: Option<u32>,
}

impl Camera {
    /// Create a camera at a position looking along a forward axis
    pub fn new(token: u64, position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward: forward.normalize(),
            priority: 0,
            token,
            render_target: None,
        }
    }

    /// Set the render priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_is_normalized() {
        let camera = Camera::new(1, Vec3::zeros(), Vec3::new(0.0, 0.0, -2.0));
        assert_relative_eq!(camera.forward.norm(), 1.0);
    }
}
