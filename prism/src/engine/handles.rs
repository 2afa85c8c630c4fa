//! Typed handles over the entity registry.
//!
//! Abstract APIs hand out and accept these wrappers; each derefs down to the
//! generic [`EntityRef`] so identity, liveness and destruction are shared.
//! The node kinds (`Visual`, `Camera`, `Light`) additionally deref through
//! [`Node`], which carries the transform and graph surface common to all of
//! them.

use crate::core::{EntityKind, EntityRef, LightKind, LightParams, MaterialData, Projection};
use crate::scene::{SceneCore, StoreKind};
use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};
use num_traits::AsPrimitive;
use prism_utils::BoundingBox;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;
use std::time::Duration;

/// Generic handle to any node kind: transform access plus the parent/child
/// graph protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node(pub(crate) EntityRef);

impl Deref for Node {
    type Target = EntityRef;

    fn deref(&self) -> &EntityRef {
        &self.0
    }
}

impl Node {
    fn core(&self) -> Option<Rc<RefCell<SceneCore>>> {
        self.0.scene()
    }

    //
    // transform
    //

    pub fn local_position(&self) -> Vector3<f32> {
        self.core()
            .and_then(|core| core.borrow().with_transform(self.id(), |t| *t.local_position()))
            .unwrap_or_else(Vector3::zeros)
    }

    #[inline]
    pub fn set_local_position(
        &self,
        x: impl AsPrimitive<f32>,
        y: impl AsPrimitive<f32>,
        z: impl AsPrimitive<f32>,
    ) {
        self.set_local_position_vec(Vector3::new(x.as_(), y.as_(), z.as_()));
    }

    pub fn set_local_position_vec(&self, position: Vector3<f32>) {
        if let Some(core) = self.core() {
            core.borrow_mut()
                .update_transform(self.id(), |t| t.set_local_position_vec(position));
        }
    }

    pub fn local_rotation(&self) -> UnitQuaternion<f32> {
        self.core()
            .and_then(|core| core.borrow().with_transform(self.id(), |t| *t.local_rotation()))
            .unwrap_or_else(UnitQuaternion::identity)
    }

    pub fn set_local_rotation(&self, rotation: UnitQuaternion<f32>) {
        if let Some(core) = self.core() {
            core.borrow_mut()
                .update_transform(self.id(), |t| t.set_local_rotation(rotation));
        }
    }

    pub fn local_scale(&self) -> Vector3<f32> {
        self.core()
            .and_then(|core| core.borrow().with_transform(self.id(), |t| *t.local_scale()))
            .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn set_local_scale(&self, scale: Vector3<f32>) {
        if let Some(core) = self.core() {
            core.borrow_mut()
                .update_transform(self.id(), |t| t.set_local_scale_vec(scale));
        }
    }

    pub fn set_uniform_local_scale(&self, factor: f32) {
        self.set_local_scale(Vector3::new(factor, factor, factor));
    }

    /// Derived world-space position.
    pub fn world_position(&self) -> Vector3<f32> {
        self.core()
            .and_then(|core| core.borrow().world_pose(self.id()))
            .map(|(pos, _, _)| pos)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Derived world-space rotation.
    pub fn world_rotation(&self) -> UnitQuaternion<f32> {
        self.core()
            .and_then(|core| core.borrow().world_pose(self.id()))
            .map(|(_, rot, _)| rot)
            .unwrap_or_else(UnitQuaternion::identity)
    }

    /// Derived world-space scale, honoring scale inheritance.
    pub fn world_scale(&self) -> Vector3<f32> {
        self.core()
            .and_then(|core| core.borrow().world_pose(self.id()))
            .map(|(_, _, scale)| scale)
            .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0))
    }

    //
    // graph
    //

    /// Attaches `child` under this node. Fails (with a diagnostic, and
    /// without mutating either side) when the child belongs to another render
    /// context, when the attachment would form a cycle, or when a child of
    /// the same name is already present.
    pub fn attach_child(&self, child: &Node) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let attached = core.borrow_mut().attach_child(self.id(), &child.0);
        attached
    }

    /// Detaches `child` from this node without destroying it.
    pub fn detach_child(&self, child: &Node) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let detached = core.borrow_mut().detach_child(self.id(), &child.0);
        detached
    }

    pub fn child_count(&self) -> usize {
        self.core()
            .map(|core| core.borrow().store_len(self.id(), StoreKind::Children))
            .unwrap_or(0)
    }

    pub fn child_by_name(&self, name: &str) -> Option<Node> {
        let core = self.core()?;
        let id = core
            .borrow()
            .child_in_store(self.id(), StoreKind::Children, name)?;
        let entity = core.borrow_mut().make_ref(id)?;
        Some(Node(entity))
    }

    pub fn child_by_index(&self, index: usize) -> Option<Node> {
        let core = self.core()?;
        let id = core
            .borrow()
            .index_in_store(self.id(), StoreKind::Children, index)?;
        let entity = core.borrow_mut().make_ref(id)?;
        Some(Node(entity))
    }

    pub fn has_child(&self, child: &Node) -> bool {
        self.core().is_some_and(|core| {
            core.borrow()
                .store_contains(self.id(), StoreKind::Children, child.id())
        })
    }

    /// The node's current parent, if any.
    pub fn parent(&self) -> Option<Node> {
        let core = self.core()?;
        let parent = core.borrow().parent_of(self.id())?;
        let entity = core.borrow_mut().make_ref(parent)?;
        Some(Node(entity))
    }

    //
    // kind recovery
    //

    pub fn as_visual(&self) -> Option<Visual> {
        (self.kind() == EntityKind::Visual).then(|| Visual(self.clone()))
    }

    pub fn as_camera(&self) -> Option<Camera> {
        (self.kind() == EntityKind::Camera).then(|| Camera(self.clone()))
    }

    pub fn as_light(&self) -> Option<Light> {
        (self.kind() == EntityKind::Light).then(|| Light(self.clone()))
    }
}

/// A node that owns geometries and renders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visual(pub(crate) Node);

impl Deref for Visual {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl Visual {
    /// Attaches a geometry. The geometry must have been created by the same
    /// render context and must not currently be attached anywhere.
    pub fn attach_geometry(&self, geometry: &Mesh) -> bool {
        let Some(core) = self.0.core() else {
            return false;
        };
        let attached = core.borrow_mut().attach_geometry(self.id(), &geometry.0);
        attached
    }

    /// Detaches a geometry without destroying it; the geometry can be
    /// attached elsewhere afterwards.
    pub fn detach_geometry(&self, geometry: &Mesh) -> bool {
        let Some(core) = self.0.core() else {
            return false;
        };
        let detached = core.borrow_mut().detach_geometry(self.id(), &geometry.0);
        detached
    }

    pub fn geometry_count(&self) -> usize {
        self.0
            .core()
            .map(|core| core.borrow().store_len(self.id(), StoreKind::Geometries))
            .unwrap_or(0)
    }

    pub fn geometry_by_name(&self, name: &str) -> Option<Mesh> {
        let core = self.0.core()?;
        let id = core
            .borrow()
            .child_in_store(self.id(), StoreKind::Geometries, name)?;
        let entity = core.borrow_mut().make_ref(id)?;
        Some(Mesh(entity))
    }

    pub fn geometry_by_index(&self, index: usize) -> Option<Mesh> {
        let core = self.0.core()?;
        let id = core
            .borrow()
            .index_in_store(self.id(), StoreKind::Geometries, index)?;
        let entity = core.borrow_mut().make_ref(id)?;
        Some(Mesh(entity))
    }

    pub fn has_geometry(&self, geometry: &Mesh) -> bool {
        self.0.core().is_some_and(|core| {
            core.borrow()
                .store_contains(self.id(), StoreKind::Geometries, geometry.id())
        })
    }

    pub fn inherit_scale(&self) -> bool {
        self.0
            .core()
            .and_then(|core| core.borrow().visual_block(self.id()))
            .map(|b| b.inherit_scale)
            .unwrap_or(true)
    }

    /// Toggles scale inheritance independently of rotation/position
    /// inheritance.
    pub fn set_inherit_scale(&self, inherit: bool) {
        if let Some(core) = self.0.core() {
            core.borrow_mut().set_inherit_scale(self.id(), inherit);
        }
    }

    pub fn visible(&self) -> bool {
        self.0
            .core()
            .and_then(|core| core.borrow().visual_block(self.id()))
            .map(|b| b.visible)
            .unwrap_or(true)
    }

    pub fn set_visible(&self, visible: bool) {
        if let Some(core) = self.0.core() {
            core.borrow_mut().set_visible(self.id(), visible);
        }
    }

    /// Applies `material` to every submesh of every attached geometry.
    pub fn set_material(&self, material: &Material) -> bool {
        let Some(core) = self.0.core() else {
            return false;
        };
        let applied = core.borrow_mut().set_visual_material(self.id(), &material.0);
        applied
    }
}

/// A perspective camera node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Camera(pub(crate) Node);

impl Deref for Camera {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl Camera {
    fn projection(&self) -> Projection {
        self.0
            .core()
            .and_then(|core| core.borrow().projection(self.id()))
            .unwrap_or_default()
    }

    fn update_projection(&self, f: impl FnOnce(&mut Projection)) {
        if let Some(core) = self.0.core() {
            core.borrow_mut().update_projection(self.id(), f);
        }
    }

    /// Horizontal field of view in radians.
    pub fn hfov(&self) -> f32 {
        self.projection().hfov()
    }

    pub fn set_hfov(&self, hfov: f32) {
        self.update_projection(|p| p.set_hfov(hfov));
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.projection().aspect_ratio()
    }

    pub fn set_aspect_ratio(&self, aspect: f32) {
        self.update_projection(|p| p.set_aspect_ratio(aspect));
    }

    pub fn near_clip(&self) -> f32 {
        self.projection().near_clip()
    }

    pub fn set_near_clip(&self, near: f32) {
        self.update_projection(|p| p.set_near_clip(near));
    }

    pub fn far_clip(&self) -> f32 {
        self.projection().far_clip()
    }

    pub fn set_far_clip(&self, far: f32) {
        self.update_projection(|p| p.set_far_clip(far));
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection().matrix()
    }

    /// View matrix: inverse of the camera's rigid world pose.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let Some(core) = self.0.core() else {
            return Matrix4::identity();
        };
        let pose = core.borrow().world_pose(self.id());
        match pose {
            Some((pos, rot, _)) => {
                Isometry3::from_parts(Translation3::from(pos), rot)
                    .inverse()
                    .to_homogeneous()
            }
            None => Matrix4::identity(),
        }
    }

    /// Points the camera at `target` on every [`Camera::update_tracking`]
    /// call. Passing `None` stops tracking. Tracking a node from another
    /// render context is rejected.
    pub fn set_track_target(&self, target: Option<&Node>) -> bool {
        let Some(core) = self.0.core() else {
            return false;
        };
        let set = core
            .borrow_mut()
            .set_track_target(self.id(), target.map(|n| &n.0));
        set
    }

    pub fn track_target(&self) -> Option<Node> {
        let core = self.0.core()?;
        let target = core.borrow().track_target(self.id())?;
        if !core.borrow().is_alive(target) {
            return None;
        }
        let entity = core.borrow_mut().make_ref(target)?;
        Some(Node(entity))
    }

    /// Re-derives the camera rotation so it faces the track target.
    pub fn update_tracking(&self) -> bool {
        let Some(core) = self.0.core() else {
            return false;
        };
        let updated = core.borrow_mut().update_tracking(self.id());
        updated
    }
}

/// A light-source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Light(pub(crate) Node);

impl Deref for Light {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl Light {
    /// Full parameter block of the light.
    pub fn params(&self) -> LightParams {
        self.0
            .core()
            .and_then(|core| core.borrow().light_params(self.id()))
            .unwrap_or_else(|| LightParams::new(LightKind::Point))
    }

    fn update(&self, f: impl FnOnce(&mut LightParams)) {
        if let Some(core) = self.0.core() {
            core.borrow_mut().update_light(self.id(), f);
        }
    }

    pub fn light_kind(&self) -> LightKind {
        self.params().kind
    }

    pub fn diffuse(&self) -> Vector3<f32> {
        self.params().diffuse
    }

    pub fn set_diffuse(&self, diffuse: Vector3<f32>) {
        self.update(|p| p.diffuse = diffuse);
    }

    pub fn specular(&self) -> Vector3<f32> {
        self.params().specular
    }

    pub fn set_specular(&self, specular: Vector3<f32>) {
        self.update(|p| p.specular = specular);
    }

    pub fn intensity(&self) -> f32 {
        self.params().intensity
    }

    pub fn set_intensity(&self, intensity: f32) {
        self.update(|p| p.intensity = intensity);
    }

    pub fn attenuation_range(&self) -> f32 {
        self.params().range
    }

    pub fn set_attenuation_range(&self, range: f32) {
        self.update(|p| p.range = range);
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.params().direction
    }

    pub fn set_direction(&self, direction: Vector3<f32>) {
        self.update(|p| p.direction = direction);
    }

    pub fn set_spot_angles(&self, inner: f32, outer: f32) {
        self.update(|p| {
            p.spot_inner_angle = inner;
            p.spot_outer_angle = outer;
        });
    }

    pub fn cast_shadows(&self) -> bool {
        self.params().cast_shadows
    }

    pub fn set_cast_shadows(&self, cast: bool) {
        self.update(|p| p.cast_shadows = cast);
    }
}

/// A mesh geometry: submeshes plus the optional skeleton surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh(pub(crate) EntityRef);

impl Deref for Mesh {
    type Target = EntityRef;

    fn deref(&self) -> &EntityRef {
        &self.0
    }
}

impl Mesh {
    fn core(&self) -> Option<Rc<RefCell<SceneCore>>> {
        self.0.scene()
    }

    /// The visual this geometry is currently attached to.
    pub fn owner(&self) -> Option<Visual> {
        let core = self.core()?;
        let owner = core.borrow().parent_of(self.id())?;
        let entity = core.borrow_mut().make_ref(owner)?;
        Some(Visual(Node(entity)))
    }

    pub fn submesh_count(&self) -> usize {
        self.core()
            .map(|core| core.borrow().store_len(self.id(), StoreKind::SubMeshes))
            .unwrap_or(0)
    }

    pub fn submesh_by_name(&self, name: &str) -> Option<SubMesh> {
        let core = self.core()?;
        let id = core
            .borrow()
            .child_in_store(self.id(), StoreKind::SubMeshes, name)?;
        let entity = core.borrow_mut().make_ref(id)?;
        Some(SubMesh(entity))
    }

    pub fn submesh_by_index(&self, index: usize) -> Option<SubMesh> {
        let core = self.core()?;
        let id = core
            .borrow()
            .index_in_store(self.id(), StoreKind::SubMeshes, index)?;
        let entity = core.borrow_mut().make_ref(id)?;
        Some(SubMesh(entity))
    }

    /// Mesh-level cast-shadows flag; follows the material shadow policy of
    /// the most recent submesh material assignment.
    pub fn cast_shadows(&self) -> bool {
        self.core()
            .and_then(|core| core.borrow().mesh_block(self.id()))
            .map(|b| b.cast_shadows)
            .unwrap_or(true)
    }

    /// Axis-aligned bounds accumulated from the mesh descriptor.
    pub fn local_bounds(&self) -> BoundingBox {
        self.core()
            .and_then(|core| core.borrow().mesh_block(self.id()))
            .map(|b| b.bounds)
            .unwrap_or_default()
    }

    //
    // skeleton
    //

    pub fn has_skeleton(&self) -> bool {
        self.core()
            .is_some_and(|core| core.borrow().mesh_has_skeleton(self.id()))
    }

    /// Name → local pose mapping for all bones; empty when the mesh has no
    /// skeleton or the skeleton has no bones.
    pub fn skeleton_local_transforms(&self) -> HashMap<String, Isometry3<f32>> {
        self.core()
            .map(|core| core.borrow().skeleton_local_transforms(self.id()))
            .unwrap_or_default()
    }

    /// Sets explicit local poses for the named bones and marks exactly those
    /// bones as manually controlled. Bones absent from the skeleton are
    /// skipped; the remaining entries are still applied.
    pub fn set_skeleton_local_transforms(&self, transforms: &HashMap<String, Isometry3<f32>>) {
        if let Some(core) = self.core() {
            core.borrow_mut()
                .set_skeleton_local_transforms(self.id(), transforms);
        }
    }

    /// Enables or disables a named animation. Unknown names are reported and
    /// ignored. Enabling disables manual control on every bone of the
    /// skeleton.
    pub fn set_skeleton_animation_enabled(&self, name: &str, enabled: bool, looped: bool, weight: f32) {
        if let Some(core) = self.core() {
            core.borrow_mut().set_skeleton_animation_enabled(
                self.id(),
                name,
                enabled,
                looped,
                weight,
            );
        }
    }

    /// Whether the named animation is enabled; unknown names are reported
    /// and read as disabled.
    pub fn skeleton_animation_enabled(&self, name: &str) -> bool {
        self.core()
            .is_some_and(|core| core.borrow().skeleton_animation_enabled(self.id(), name))
    }

    /// Advances every currently enabled animation state to `time`, then
    /// resynchronizes the skeleton's aggregate pose.
    pub fn update_skeleton_animation(&self, time: Duration) {
        if let Some(core) = self.core() {
            core.borrow_mut()
                .update_skeleton_animation(self.id(), time.as_secs_f32());
        }
    }
}

/// One sub-object of a mesh, bound to exactly one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMesh(pub(crate) EntityRef);

impl Deref for SubMesh {
    type Target = EntityRef;

    fn deref(&self) -> &EntityRef {
        &self.0
    }
}

impl SubMesh {
    fn core(&self) -> Option<Rc<RefCell<SceneCore>>> {
        self.0.scene()
    }

    /// Index of the native sub-object within the parent mesh.
    pub fn index(&self) -> usize {
        self.core()
            .and_then(|core| core.borrow().submesh_block(self.id()))
            .map(|b| b.index)
            .unwrap_or(0)
    }

    /// Assigns a material. The material must have been created by the same
    /// render context; on success the parent mesh's cast-shadows flag is
    /// synchronized from the material.
    pub fn set_material(&self, material: &Material) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let assigned = core.borrow_mut().set_submesh_material(self.id(), &material.0);
        assigned
    }

    pub fn material(&self) -> Option<Material> {
        let core = self.core()?;
        let material = core.borrow().submesh_material(self.id())?;
        if !core.borrow().is_alive(material) {
            return None;
        }
        let entity = core.borrow_mut().make_ref(material)?;
        Some(Material(entity))
    }
}

/// A material entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material(pub(crate) EntityRef);

impl Deref for Material {
    type Target = EntityRef;

    fn deref(&self) -> &EntityRef {
        &self.0
    }
}

impl Material {
    fn core(&self) -> Option<Rc<RefCell<SceneCore>>> {
        self.0.scene()
    }

    pub fn data(&self) -> MaterialData {
        self.core()
            .and_then(|core| core.borrow().material_data(self.id()))
            .unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut MaterialData)) {
        if let Some(core) = self.core() {
            core.borrow_mut().update_material(self.id(), f);
        }
    }

    pub fn diffuse(&self) -> Vector3<f32> {
        self.data().diffuse
    }

    pub fn set_diffuse(&self, diffuse: Vector3<f32>) {
        self.update(|m| m.diffuse = diffuse);
    }

    pub fn specular(&self) -> Vector3<f32> {
        self.data().specular
    }

    pub fn set_specular(&self, specular: Vector3<f32>) {
        self.update(|m| m.specular = specular);
    }

    pub fn emissive(&self) -> Vector3<f32> {
        self.data().emissive
    }

    pub fn set_emissive(&self, emissive: Vector3<f32>) {
        self.update(|m| m.emissive = emissive);
    }

    pub fn cast_shadows(&self) -> bool {
        self.data().cast_shadows
    }

    /// Material-level shadow policy; propagated to meshes on assignment.
    pub fn set_cast_shadows(&self, cast: bool) {
        self.update(|m| m.cast_shadows = cast);
    }
}
