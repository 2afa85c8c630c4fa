use nalgebra::Vector3;

/// Surface parameters of a material entity.
///
/// The cast-shadows flag is the material-level shadow policy; assigning the
/// material to a submesh propagates it to the owning mesh.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialData {
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub emissive: Vector3<f32>,
    pub cast_shadows: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        MaterialData {
            diffuse: Vector3::new(1.0, 1.0, 1.0),
            specular: Vector3::new(0.0, 0.0, 0.0),
            emissive: Vector3::new(0.0, 0.0, 0.0),
            cast_shadows: true,
        }
    }
}
