use nalgebra::Vector3;

/// The kind of a light source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// Parameter block of a light node, pushed to the backend on every change.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LightParams {
    pub kind: LightKind,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub intensity: f32,
    /// Attenuation range for point and spot lights.
    pub range: f32,
    /// Beam direction for directional and spot lights.
    pub direction: Vector3<f32>,
    pub spot_inner_angle: f32,
    pub spot_outer_angle: f32,
    pub cast_shadows: bool,
}

impl LightParams {
    pub fn new(kind: LightKind) -> Self {
        LightParams {
            kind,
            diffuse: Vector3::new(1.0, 1.0, 1.0),
            specular: Vector3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            range: 100.0,
            direction: Vector3::new(0.0, 0.0, -1.0),
            spot_inner_angle: 0.4,
            spot_outer_angle: 0.8,
            cast_shadows: true,
        }
    }
}
