use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use num_traits::AsPrimitive;

/// Plain copy of a node's local TRS, as handed to the render backend on every
/// write-through.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalTransform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for LocalTransform {
    fn default() -> Self {
        LocalTransform {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Stores the local translation, rotation and scale of a scene-graph node.
///
/// The abstraction side is authoritative for reads; every mutation is pushed
/// through the backend contract so the native object never drifts.
#[derive(Debug, Clone)]
pub struct Transform {
    pos: Vector3<f32>,
    rot: UnitQuaternion<f32>,
    scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    /// Creates a transform at the origin with no rotation and a uniform scale
    /// of `1.0`.
    pub fn new() -> Self {
        Transform {
            pos: Vector3::zeros(),
            rot: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Sets the local position of the transform.
    #[inline]
    pub fn set_local_position(
        &mut self,
        x: impl AsPrimitive<f32>,
        y: impl AsPrimitive<f32>,
        z: impl AsPrimitive<f32>,
    ) {
        self.set_local_position_vec(Vector3::new(x.as_(), y.as_(), z.as_()));
    }

    /// Sets the local position using a vector.
    pub fn set_local_position_vec(&mut self, position: Vector3<f32>) {
        self.pos = position;
    }

    /// Returns a reference to the local position vector.
    pub fn local_position(&self) -> &Vector3<f32> {
        &self.pos
    }

    /// Adds the given offset to the local position.
    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.pos += offset;
    }

    /// Sets the local model-space rotation of this transform.
    pub fn set_local_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rot = rotation;
    }

    /// Returns a reference to the local rotation quaternion.
    pub fn local_rotation(&self) -> &UnitQuaternion<f32> {
        &self.rot
    }

    /// Applies a relative rotation to the transform.
    pub fn rotate(&mut self, rot: UnitQuaternion<f32>) {
        self.rot *= rot;
    }

    /// Sets the local scale using three independent factors.
    ///
    /// Values are stored exactly as given so that reads round-trip; callers
    /// are expected not to pass zero components.
    pub fn set_local_scale_vec(&mut self, scale: Vector3<f32>) {
        debug_assert_ne!(scale.x * scale.y * scale.z, 0.0);
        self.scale = scale;
    }

    /// Sets the local scale uniformly.
    pub fn set_uniform_local_scale(&mut self, factor: f32) {
        self.set_local_scale_vec(Vector3::new(factor, factor, factor));
    }

    /// Returns a reference to the local scale vector.
    pub fn local_scale(&self) -> &Vector3<f32> {
        &self.scale
    }

    /// Snapshot of the full local TRS.
    pub fn local(&self) -> LocalTransform {
        LocalTransform {
            position: self.pos,
            rotation: self.rot,
            scale: self.scale,
        }
    }

    /// Rigid part of the local transform (rotation + translation, no scale).
    pub fn local_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.pos), self.rot)
    }
}
