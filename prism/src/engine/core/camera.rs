use nalgebra::{Matrix4, Perspective3};

/// Perspective projection parameters of a camera node.
///
/// The horizontal field of view is stored in radians; the vertical field of
/// view handed to the projection is derived from it through the aspect ratio.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Projection {
    hfov: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Projection {
            hfov: std::f32::consts::FRAC_PI_3,
            aspect: 4.0 / 3.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Returns the horizontal field of view in radians.
    pub fn hfov(&self) -> f32 {
        self.hfov
    }

    pub fn set_hfov(&mut self, hfov: f32) {
        self.hfov = hfov;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn near_clip(&self) -> f32 {
        self.near
    }

    pub fn set_near_clip(&mut self, near: f32) {
        self.near = near;
    }

    pub fn far_clip(&self) -> f32 {
        self.far
    }

    pub fn set_far_clip(&mut self, far: f32) {
        self.far = far;
    }

    /// Builds the projection matrix for the current parameters.
    pub fn matrix(&self) -> Matrix4<f32> {
        let vfov = 2.0 * ((self.hfov * 0.5).tan() / self.aspect).atan();
        Perspective3::new(self.aspect, vfov, self.near, self.far).to_homogeneous()
    }
}
