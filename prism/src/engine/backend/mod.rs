//! Backend contract for render-engine integrations.
//!
//! The abstraction layer never talks to a rendering engine directly. Each
//! integration implements [`RenderContext`] and hands out opaque native
//! handles (`Box<dyn Any>`) for the objects it allocates. The contract per
//! entity kind is:
//!
//! - **Nodes** — allocate/destroy by name, attach/detach to other native
//!   nodes, accept local-transform and visibility write-throughs. Cameras and
//!   lights are nodes with an extra parameter block pushed through
//!   [`RenderContext::update_camera`] / [`RenderContext::update_light`].
//! - **Meshes** — allocated from a [`MeshDescriptor`], attached to nodes as
//!   geometry, and carrying the skeleton/animation state the mesh API
//!   operates on.
//! - **Materials** — allocated by name, bound to submeshes by index.
//!
//! Operations on a native handle after [`RenderContext::shutdown`] are
//! undefined at the native layer; the scene guards every destructive call
//! with [`RenderContext::is_initialized`] before delegating.
//!
//! Every context instance has a unique [`ContextId`]. Entities carry the id
//! of the context that created them, and every cross-entity operation narrows
//! the foreign handle against the receiver's context before any mutation.
//! Because of that single choke point a backend may assume that the handles
//! it receives are its own; a failed downcast inside a backend is a
//! programming error, not a recoverable condition.

pub mod headless;

use crate::core::{LightParams, LocalTransform, MaterialData, MeshDescriptor, Projection};
use nalgebra::Isometry3;
use std::any::Any;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

pub use headless::HeadlessContext;

/// Identity of one live render-context instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(NonZeroU64);

impl ContextId {
    /// Allocates a fresh, process-unique context id.
    pub fn next() -> ContextId {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let raw = COUNTER.fetch_add(1, Ordering::Relaxed);
        ContextId(NonZeroU64::new(raw).expect("context id counter overflowed"))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// Capability contract implemented by every render-engine integration.
///
/// The `Any` supertrait lets embedders recover the concrete context (e.g. to
/// inspect native state in tests) the same way backends recover their native
/// handle types.
pub trait RenderContext: Any {
    fn id(&self) -> ContextId;

    /// Whether the context is still usable. Once this returns `false` the
    /// teardown is irreversible and all destructive scene operations become
    /// no-ops.
    fn is_initialized(&self) -> bool;

    /// Tears the context down and releases every native object it owns.
    fn shutdown(&mut self);

    // node kinds

    fn create_node(&mut self, name: &str) -> Box<dyn Any>;
    fn destroy_node(&mut self, node: &dyn Any);
    fn attach_node(&mut self, parent: &dyn Any, child: &dyn Any);
    fn detach_node(&mut self, parent: &dyn Any, child: &dyn Any);
    fn set_node_transform(&mut self, node: &dyn Any, transform: &LocalTransform);
    fn set_node_visible(&mut self, node: &dyn Any, visible: bool);
    fn set_inherit_scale(&mut self, node: &dyn Any, inherit: bool);
    fn update_camera(&mut self, node: &dyn Any, projection: &Projection);
    fn update_light(&mut self, node: &dyn Any, params: &LightParams);

    // meshes

    fn create_mesh(&mut self, descriptor: &MeshDescriptor) -> Box<dyn Any>;
    fn destroy_mesh(&mut self, mesh: &dyn Any);
    fn attach_geometry(&mut self, node: &dyn Any, mesh: &dyn Any);
    fn detach_geometry(&mut self, node: &dyn Any, mesh: &dyn Any);
    fn set_mesh_cast_shadows(&mut self, mesh: &dyn Any, cast_shadows: bool);

    // skeletons; all of these are no-ops (or report "absent") when the mesh
    // has no skeleton

    fn has_skeleton(&self, mesh: &dyn Any) -> bool;
    /// Local bone poses in bone-index order; empty without a skeleton.
    fn bone_poses(&self, mesh: &dyn Any) -> Vec<(String, Isometry3<f32>)>;
    /// Sets one bone's local pose and flags it as manually controlled.
    /// Returns `false` when the skeleton has no bone of that name.
    fn set_bone_pose(&mut self, mesh: &dyn Any, bone: &str, pose: &Isometry3<f32>) -> bool;
    /// Returns `false` when no animation of that name exists. Enabling an
    /// animation clears the manual-control flag on every bone.
    fn set_animation_enabled(
        &mut self,
        mesh: &dyn Any,
        name: &str,
        enabled: bool,
        looped: bool,
        weight: f32,
    ) -> bool;
    /// `None` when no animation of that name exists.
    fn animation_enabled(&self, mesh: &dyn Any, name: &str) -> Option<bool>;
    /// Moves every *enabled* animation state to `seconds`, then recomputes
    /// the aggregate skeleton pose.
    fn advance_animation(&mut self, mesh: &dyn Any, seconds: f32);

    // materials

    fn create_material(&mut self, name: &str) -> Box<dyn Any>;
    fn destroy_material(&mut self, material: &dyn Any);
    fn update_material(&mut self, material: &dyn Any, data: &MaterialData);
    fn set_submesh_material(&mut self, mesh: &dyn Any, index: usize, material: &dyn Any);
}
