use crate::backend::{ContextId, RenderContext};
use crate::core::{
    CameraBlock, Entity, EntityId, EntityKind, EntityRef, LightKind, LightParams, MaterialData,
    MeshBlock, MeshDescriptor, Projection, Store, SubMeshBlock, Transform, VisualBlock,
};
use crate::handles::{Camera, Light, Material, Mesh, Node, Visual};
use itertools::Itertools;
use nalgebra::{Isometry3, UnitQuaternion, Vector3};
use slotmap::SlotMap;
use snafu::{Snafu, ensure};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::error;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum SceneError {
    #[snafu(display("Render context is not initialized"))]
    ContextNotInitialized,

    #[snafu(display("Duplicate submesh name {name:?} in mesh descriptor"))]
    DuplicateSubMesh { name: String },
}

/// A scene: one entity arena bound to one render context.
///
/// All entities of a scene are created through its factory methods and carry
/// the identity of the scene's context. Handles stay valid across `clone`s of
/// the scene; dropping the last `Scene` clone drops the arena and with it the
/// backing store of every outstanding handle.
#[derive(Clone)]
pub struct Scene {
    core: Rc<RefCell<SceneCore>>,
    root: EntityRef,
}

impl Scene {
    /// Creates a scene on top of an initialized render context.
    pub fn new(context: Box<dyn RenderContext>) -> Result<Scene, SceneError> {
        ensure!(context.is_initialized(), ContextNotInitializedErr);

        let core = Rc::new_cyclic(|weak| {
            RefCell::new(SceneCore {
                context,
                entities: SlotMap::with_key(),
                ref_counts: HashMap::new(),
                self_weak: weak.clone(),
            })
        });

        let root = {
            let mut inner = core.borrow_mut();
            let id = inner.create_node_entity(EntityKind::Visual, "root");
            inner.make_ref(id).expect("root visual was just inserted")
        };

        Ok(Scene { core, root })
    }

    /// Identity of the render context this scene drives.
    pub fn context_id(&self) -> ContextId {
        self.core.borrow().context.id()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.borrow().context.is_initialized()
    }

    /// The scene-owned root node all other visuals hang off.
    pub fn root_visual(&self) -> Visual {
        Visual(Node(self.root.clone()))
    }

    pub fn create_visual(&self, name: &str) -> Result<Visual, SceneError> {
        let mut core = self.core.borrow_mut();
        ensure!(core.context.is_initialized(), ContextNotInitializedErr);
        let id = core.create_node_entity(EntityKind::Visual, name);
        let entity = core.make_ref(id).expect("visual was just inserted");
        Ok(Visual(Node(entity)))
    }

    pub fn create_camera(&self, name: &str) -> Result<Camera, SceneError> {
        let mut core = self.core.borrow_mut();
        ensure!(core.context.is_initialized(), ContextNotInitializedErr);
        let id = core.create_node_entity(EntityKind::Camera, name);
        let entity = core.make_ref(id).expect("camera was just inserted");
        Ok(Camera(Node(entity)))
    }

    pub fn create_light(&self, name: &str, kind: LightKind) -> Result<Light, SceneError> {
        let mut core = self.core.borrow_mut();
        ensure!(core.context.is_initialized(), ContextNotInitializedErr);
        let id = core.create_node_entity(EntityKind::Light, name);
        let params = LightParams::new(kind);
        core.entities[id].light = Some(params);
        {
            let SceneCore {
                context, entities, ..
            } = &mut *core;
            if let Some(native) = entities[id].native.as_deref() {
                context.update_light(native, &params);
            }
        }
        let entity = core.make_ref(id).expect("light was just inserted");
        Ok(Light(Node(entity)))
    }

    pub fn create_mesh(&self, descriptor: &MeshDescriptor) -> Result<Mesh, SceneError> {
        let mut core = self.core.borrow_mut();
        ensure!(core.context.is_initialized(), ContextNotInitializedErr);

        if let Some(name) = descriptor
            .submeshes
            .iter()
            .map(|s| s.name.as_str())
            .duplicates()
            .next()
        {
            return DuplicateSubMeshErr { name }.fail();
        }

        let id = core.create_mesh_entity(descriptor);
        let entity = core.make_ref(id).expect("mesh was just inserted");
        Ok(Mesh(entity))
    }

    pub fn create_material(&self, name: &str) -> Result<Material, SceneError> {
        let mut core = self.core.borrow_mut();
        ensure!(core.context.is_initialized(), ContextNotInitializedErr);

        let mut entity = Entity::new(EntityKind::Material, name);
        entity.material = Some(MaterialData::default());
        entity.native = Some(core.context.create_material(name));
        let id = core.insert(entity);
        let entity = core.make_ref(id).expect("material was just inserted");
        Ok(Material(entity))
    }

    /// Read-only access to the render context backing this scene.
    pub fn with_context<R>(&self, f: impl FnOnce(&dyn RenderContext) -> R) -> R {
        f(self.core.borrow().context.as_ref())
    }

    /// Number of live entities, the scene root included.
    pub fn live_entities(&self) -> usize {
        self.core
            .borrow()
            .entities
            .values()
            .filter(|e| e.alive)
            .count()
    }

    /// Destroys every entity, then tears the render context down.
    ///
    /// The teardown is irreversible: afterwards creation fails with
    /// [`SceneError::ContextNotInitialized`] and `destroy` on any surviving
    /// handle is a no-op.
    pub fn shutdown(&self) {
        let mut core = self.core.borrow_mut();
        let ids: Vec<EntityId> = core.entities.keys().collect();
        for id in ids {
            core.destroy_entity(id);
        }
        core.context.shutdown();
    }
}

/// Arena and composition engine shared by all handles of one scene.
pub(crate) struct SceneCore {
    pub(crate) context: Box<dyn RenderContext>,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    ref_counts: HashMap<EntityId, u32>,
    self_weak: Weak<RefCell<SceneCore>>,
}

impl SceneCore {
    //
    // registry
    //

    fn insert(&mut self, mut entity: Entity) -> EntityId {
        self.entities.insert_with_key(|key| {
            entity.id = key;
            entity
        })
    }

    /// Mints a strong handle for `id`, retaining it.
    pub(crate) fn make_ref(&mut self, id: EntityId) -> Option<EntityRef> {
        let entity = self.entities.get(id)?;
        let kind = entity.kind;
        *self.ref_counts.entry(id).or_insert(0) += 1;
        Some(EntityRef::from_parts(
            id,
            kind,
            self.context.id(),
            self.self_weak.clone(),
        ))
    }

    pub(crate) fn retain(&mut self, id: EntityId) {
        if self.entities.contains_key(id) {
            *self.ref_counts.entry(id).or_insert(0) += 1;
        }
    }

    /// Releases one strong reference; frees the arena slot once a destroyed
    /// entity loses its last reference.
    pub(crate) fn release(&mut self, id: EntityId) {
        let Some(count) = self.ref_counts.get_mut(&id) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count != 0 {
            return;
        }
        self.ref_counts.remove(&id);
        if self.entities.get(id).is_some_and(|e| !e.alive) {
            self.entities.remove(id);
        }
    }

    pub(crate) fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(id).is_some_and(|e| e.alive)
    }

    pub(crate) fn entity_name(&self, id: EntityId) -> String {
        self.entities
            .get(id)
            .map(|e| e.name.clone())
            .unwrap_or_default()
    }

    pub(crate) fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(id).and_then(|e| e.parent)
    }

    //
    // dispatch guard
    //

    /// The single narrowing choke point: every cross-entity operation runs
    /// the foreign handle through this check before any mutation. A handle
    /// minted by a different render context is reported and rejected.
    fn narrow(&self, handle: &EntityRef, action: &str) -> Option<EntityId> {
        if handle.context_id() != self.context.id() {
            error!("Cannot {action} created by another render engine");
            return None;
        }
        Some(handle.id())
    }

    //
    // factory internals
    //

    pub(crate) fn create_node_entity(&mut self, kind: EntityKind, name: &str) -> EntityId {
        debug_assert!(kind.is_node());
        let mut entity = Entity::new(kind, name);
        entity.transform = Some(Transform::new());
        entity.children = Some(Store::new());
        match kind {
            EntityKind::Visual => {
                entity.geometries = Some(Store::new());
                entity.visual = Some(VisualBlock::default());
            }
            EntityKind::Camera => {
                entity.camera = Some(CameraBlock::default());
            }
            _ => {}
        }
        entity.native = Some(self.context.create_node(name));
        self.insert(entity)
    }

    fn create_mesh_entity(&mut self, descriptor: &MeshDescriptor) -> EntityId {
        let mut entity = Entity::new(EntityKind::Mesh, &descriptor.name);
        entity.mesh = Some(MeshBlock {
            cast_shadows: true,
            bounds: descriptor.local_bounds(),
        });
        entity.submeshes = Some(Store::new());
        entity.native = Some(self.context.create_mesh(descriptor));
        let mesh_id = self.insert(entity);

        for (index, sub) in descriptor.submeshes.iter().enumerate() {
            let mut entity = Entity::new(EntityKind::SubMesh, &sub.name);
            entity.parent = Some(mesh_id);
            entity.submesh = Some(SubMeshBlock {
                index,
                material: None,
            });
            let sub_id = self.insert(entity);
            self.entities[mesh_id]
                .submeshes
                .as_mut()
                .expect("meshes carry a submesh store")
                .add(&sub.name, sub_id);
        }

        mesh_id
    }

    //
    // composition engine
    //

    /// Returns whether `ancestor` appears in the parent chain of `id`
    /// (including `id` itself).
    fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    /// Removes `id` from its current parent, native attachment included.
    fn unlink(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let Some(parent) = entity.parent else {
            return;
        };
        let kind = entity.kind;

        if let Some(parent_entity) = self.entities.get_mut(parent) {
            let store = match kind {
                EntityKind::Mesh => parent_entity.geometries.as_mut(),
                EntityKind::SubMesh => parent_entity.submeshes.as_mut(),
                _ => parent_entity.children.as_mut(),
            };
            if let Some(store) = store {
                store.remove(id);
            }
        }

        let SceneCore {
            context, entities, ..
        } = self;
        if let (Some(parent_entity), Some(entity)) = (entities.get(parent), entities.get(id))
            && let (Some(parent_native), Some(native)) =
                (parent_entity.native.as_deref(), entity.native.as_deref())
        {
            match kind {
                EntityKind::Mesh => context.detach_geometry(parent_native, native),
                EntityKind::SubMesh => {}
                _ => context.detach_node(parent_native, native),
            }
        }

        self.entities[id].parent = None;
    }

    pub(crate) fn attach_child(&mut self, parent: EntityId, child: &EntityRef) -> bool {
        let Some(child_id) = self.narrow(child, "attach node") else {
            return false;
        };
        let Some(parent_entity) = self.entities.get(parent) else {
            return false;
        };
        let Some(child_entity) = self.entities.get(child_id) else {
            return false;
        };
        if !parent_entity.alive || !child_entity.alive {
            return false;
        }

        let key = child_entity.name.clone();
        if parent_entity
            .children
            .as_ref()
            .is_some_and(|s| s.contains_key(&key))
        {
            error!("A child named {key:?} is already attached to {:?}", parent_entity.name);
            return false;
        }
        if self.is_ancestor(child_id, parent) {
            error!("Cannot attach node {key:?} to its own descendant");
            return false;
        }

        // re-parenting implies detach from the previous parent
        self.unlink(child_id);

        self.entities[child_id].parent = Some(parent);
        if let Some(store) = self.entities[parent].children.as_mut() {
            store.add(key, child_id);
        }

        let SceneCore {
            context, entities, ..
        } = self;
        if let (Some(parent_native), Some(child_native)) = (
            entities[parent].native.as_deref(),
            entities[child_id].native.as_deref(),
        ) {
            context.attach_node(parent_native, child_native);
        }
        true
    }

    pub(crate) fn detach_child(&mut self, parent: EntityId, child: &EntityRef) -> bool {
        let Some(child_id) = self.narrow(child, "detach node") else {
            return false;
        };
        let is_child = self
            .entities
            .get(child_id)
            .is_some_and(|c| c.parent == Some(parent));
        if !is_child {
            return false;
        }
        self.unlink(child_id);
        true
    }

    pub(crate) fn attach_geometry(&mut self, visual: EntityId, geometry: &EntityRef) -> bool {
        let Some(geometry_id) = self.narrow(geometry, "attach geometry") else {
            return false;
        };
        let Some(visual_entity) = self.entities.get(visual) else {
            return false;
        };
        let Some(geometry_entity) = self.entities.get(geometry_id) else {
            return false;
        };
        if !visual_entity.alive || !geometry_entity.alive {
            return false;
        }
        if geometry_entity.kind != EntityKind::Mesh || visual_entity.geometries.is_none() {
            return false;
        }
        if geometry_entity.parent.is_some() {
            error!(
                "Geometry {:?} is already attached to a visual; detach it first",
                geometry_entity.name
            );
            return false;
        }

        let key = geometry_entity.name.clone();
        if visual_entity
            .geometries
            .as_ref()
            .is_some_and(|s| s.contains_key(&key))
        {
            error!("A geometry named {key:?} is already attached to {:?}", visual_entity.name);
            return false;
        }

        self.entities[geometry_id].parent = Some(visual);
        if let Some(store) = self.entities[visual].geometries.as_mut() {
            store.add(key, geometry_id);
        }

        let SceneCore {
            context, entities, ..
        } = self;
        if let (Some(visual_native), Some(geometry_native)) = (
            entities[visual].native.as_deref(),
            entities[geometry_id].native.as_deref(),
        ) {
            context.attach_geometry(visual_native, geometry_native);
        }
        true
    }

    pub(crate) fn detach_geometry(&mut self, visual: EntityId, geometry: &EntityRef) -> bool {
        let Some(geometry_id) = self.narrow(geometry, "detach geometry") else {
            return false;
        };
        let is_owned = self
            .entities
            .get(geometry_id)
            .is_some_and(|g| g.parent == Some(visual));
        if !is_owned {
            return false;
        }
        self.unlink(geometry_id);
        true
    }

    //
    // lifecycle
    //

    /// Destroys an entity and everything its stores own.
    ///
    /// Order: owned entries, then the parent link, then the native object.
    /// A second call observes the liveness flag already cleared and returns;
    /// a call after context teardown returns without touching anything.
    pub(crate) fn destroy_entity(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        if !entity.alive {
            return;
        }
        if !self.context.is_initialized() {
            return;
        }

        let owned: Vec<EntityId> = [&entity.submeshes, &entity.geometries, &entity.children]
            .into_iter()
            .flatten()
            .flat_map(|s| s.ids())
            .collect();
        for child in owned {
            self.destroy_entity(child);
        }

        self.unlink(id);

        let SceneCore {
            context, entities, ..
        } = self;
        let Some(entity) = entities.get_mut(id) else {
            return;
        };
        if let Some(native) = entity.native.take() {
            match entity.kind {
                EntityKind::Mesh => context.destroy_mesh(&*native),
                EntityKind::Material => context.destroy_material(&*native),
                EntityKind::SubMesh => {}
                _ => context.destroy_node(&*native),
            }
        }
        entity.alive = false;
        entity.parent = None;
        for store in [
            entity.children.as_mut(),
            entity.geometries.as_mut(),
            entity.submeshes.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            *store = Store::new();
        }

        if self.ref_counts.get(&id).copied().unwrap_or(0) == 0 {
            self.entities.remove(id);
        }
    }

    //
    // transforms
    //

    pub(crate) fn with_transform<R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&Transform) -> R,
    ) -> Option<R> {
        self.entities.get(id)?.transform.as_ref().map(f)
    }

    /// Mutates a node transform and pushes the result through the backend.
    pub(crate) fn update_transform(&mut self, id: EntityId, f: impl FnOnce(&mut Transform)) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(transform) = entity.transform.as_mut() else {
            return false;
        };
        f(transform);
        let local = transform.local();

        let SceneCore {
            context, entities, ..
        } = self;
        if let Some(native) = entities.get(id).and_then(|e| e.native.as_deref()) {
            context.set_node_transform(native, &local);
        }
        true
    }

    /// Derived world-space TRS of a node, honoring per-node scale
    /// inheritance.
    pub(crate) fn world_pose(
        &self,
        id: EntityId,
    ) -> Option<(Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>)> {
        let entity = self.entities.get(id)?;
        let transform = entity.transform.as_ref()?;
        let pos = *transform.local_position();
        let rot = *transform.local_rotation();
        let scale = *transform.local_scale();

        let Some(parent) = entity.parent else {
            return Some((pos, rot, scale));
        };
        let Some((parent_pos, parent_rot, parent_scale)) = self.world_pose(parent) else {
            return Some((pos, rot, scale));
        };

        let inherit = entity.visual.map(|v| v.inherit_scale).unwrap_or(true);
        let derived_scale = if inherit {
            parent_scale.component_mul(&scale)
        } else {
            scale
        };
        let derived_rot = parent_rot * rot;
        let derived_pos = parent_pos + parent_rot * parent_scale.component_mul(&pos);
        Some((derived_pos, derived_rot, derived_scale))
    }

    //
    // visuals
    //

    pub(crate) fn visual_block(&self, id: EntityId) -> Option<VisualBlock> {
        self.entities.get(id)?.visual
    }

    pub(crate) fn set_inherit_scale(&mut self, id: EntityId, inherit: bool) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(block) = entity.visual.as_mut() else {
            return false;
        };
        block.inherit_scale = inherit;

        let SceneCore {
            context, entities, ..
        } = self;
        if let Some(native) = entities.get(id).and_then(|e| e.native.as_deref()) {
            context.set_inherit_scale(native, inherit);
        }
        true
    }

    pub(crate) fn set_visible(&mut self, id: EntityId, visible: bool) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(block) = entity.visual.as_mut() else {
            return false;
        };
        block.visible = visible;

        let SceneCore {
            context, entities, ..
        } = self;
        if let Some(native) = entities.get(id).and_then(|e| e.native.as_deref()) {
            context.set_node_visible(native, visible);
        }
        true
    }

    //
    // stores
    //

    pub(crate) fn child_in_store(
        &self,
        owner: EntityId,
        store: StoreKind,
        key: &str,
    ) -> Option<EntityId> {
        self.store_of(owner, store)?.by_key(key)
    }

    pub(crate) fn index_in_store(
        &self,
        owner: EntityId,
        store: StoreKind,
        index: usize,
    ) -> Option<EntityId> {
        self.store_of(owner, store)?.by_index(index)
    }

    pub(crate) fn store_len(&self, owner: EntityId, store: StoreKind) -> usize {
        self.store_of(owner, store).map(Store::len).unwrap_or(0)
    }

    pub(crate) fn store_contains(&self, owner: EntityId, store: StoreKind, id: EntityId) -> bool {
        self.store_of(owner, store)
            .is_some_and(|s| s.contains(id))
    }

    fn store_of(&self, owner: EntityId, store: StoreKind) -> Option<&Store> {
        let entity = self.entities.get(owner)?;
        match store {
            StoreKind::Children => entity.children.as_ref(),
            StoreKind::Geometries => entity.geometries.as_ref(),
            StoreKind::SubMeshes => entity.submeshes.as_ref(),
        }
    }

    //
    // cameras
    //

    pub(crate) fn projection(&self, id: EntityId) -> Option<Projection> {
        self.entities.get(id)?.camera.map(|c| c.projection)
    }

    pub(crate) fn update_projection(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Projection),
    ) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(block) = entity.camera.as_mut() else {
            return false;
        };
        f(&mut block.projection);
        let projection = block.projection;

        let SceneCore {
            context, entities, ..
        } = self;
        if let Some(native) = entities.get(id).and_then(|e| e.native.as_deref()) {
            context.update_camera(native, &projection);
        }
        true
    }

    pub(crate) fn set_track_target(
        &mut self,
        camera: EntityId,
        target: Option<&EntityRef>,
    ) -> bool {
        let target_id = match target {
            None => None,
            Some(handle) => {
                let Some(id) = self.narrow(handle, "track node") else {
                    return false;
                };
                if !self.is_alive(id) {
                    return false;
                }
                Some(id)
            }
        };

        let Some(entity) = self.entities.get_mut(camera) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(block) = entity.camera.as_mut() else {
            return false;
        };
        block.track_target = target_id;
        true
    }

    pub(crate) fn track_target(&self, camera: EntityId) -> Option<EntityId> {
        self.entities.get(camera)?.camera.and_then(|c| c.track_target)
    }

    /// Re-derives the camera's local rotation so that it faces its track
    /// target. Does nothing without a target or when either world pose is
    /// unavailable.
    pub(crate) fn update_tracking(&mut self, camera: EntityId) -> bool {
        let Some(target) = self.track_target(camera) else {
            return false;
        };
        if !self.is_alive(target) {
            return false;
        }
        let Some((camera_pos, _, _)) = self.world_pose(camera) else {
            return false;
        };
        let Some((target_pos, _, _)) = self.world_pose(target) else {
            return false;
        };

        let direction = target_pos - camera_pos;
        if direction.norm_squared() < f32::EPSILON {
            return false;
        }

        // cameras look down -Z
        let desired = UnitQuaternion::face_towards(&-direction, &Vector3::y());
        let parent_rot = self
            .parent_of(camera)
            .and_then(|p| self.world_pose(p))
            .map(|(_, rot, _)| rot)
            .unwrap_or_else(UnitQuaternion::identity);
        let local = parent_rot.inverse() * desired;

        self.update_transform(camera, |t| t.set_local_rotation(local))
    }

    //
    // lights
    //

    pub(crate) fn light_params(&self, id: EntityId) -> Option<LightParams> {
        self.entities.get(id)?.light
    }

    pub(crate) fn update_light(&mut self, id: EntityId, f: impl FnOnce(&mut LightParams)) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(params) = entity.light.as_mut() else {
            return false;
        };
        f(params);
        let params = *params;

        let SceneCore {
            context, entities, ..
        } = self;
        if let Some(native) = entities.get(id).and_then(|e| e.native.as_deref()) {
            context.update_light(native, &params);
        }
        true
    }

    //
    // materials
    //

    pub(crate) fn material_data(&self, id: EntityId) -> Option<MaterialData> {
        self.entities.get(id)?.material
    }

    pub(crate) fn update_material(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut MaterialData),
    ) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }
        let Some(data) = entity.material.as_mut() else {
            return false;
        };
        f(data);
        let data = *data;

        let SceneCore {
            context, entities, ..
        } = self;
        if let Some(native) = entities.get(id).and_then(|e| e.native.as_deref()) {
            context.update_material(native, &data);
        }
        true
    }

    /// Binds a material to one submesh and synchronizes the owning mesh's
    /// cast-shadows flag with the material's shadow policy.
    pub(crate) fn set_submesh_material(&mut self, submesh: EntityId, material: &EntityRef) -> bool {
        let Some(material_id) = self.narrow(material, "assign material") else {
            return false;
        };
        let Some(sub) = self.entities.get(submesh) else {
            return false;
        };
        if !sub.alive {
            return false;
        }
        let Some(block) = sub.submesh else {
            return false;
        };
        let Some(mesh_id) = sub.parent else {
            return false;
        };
        let Some(material_entity) = self.entities.get(material_id) else {
            return false;
        };
        if !material_entity.alive || material_entity.kind != EntityKind::Material {
            return false;
        }
        let cast_shadows = material_entity
            .material
            .map(|m| m.cast_shadows)
            .unwrap_or(true);

        let SceneCore {
            context, entities, ..
        } = self;
        if let (Some(mesh_entity), Some(material_entity)) =
            (entities.get(mesh_id), entities.get(material_id))
            && let (Some(mesh_native), Some(material_native)) = (
                mesh_entity.native.as_deref(),
                material_entity.native.as_deref(),
            )
        {
            context.set_submesh_material(mesh_native, block.index, material_native);
            context.set_mesh_cast_shadows(mesh_native, cast_shadows);
        }

        if let Some(sub) = self.entities.get_mut(submesh)
            && let Some(block) = sub.submesh.as_mut()
        {
            block.material = Some(material_id);
        }
        if let Some(mesh_entity) = self.entities.get_mut(mesh_id)
            && let Some(mesh_block) = mesh_entity.mesh.as_mut()
        {
            mesh_block.cast_shadows = cast_shadows;
        }
        true
    }

    pub(crate) fn submesh_material(&self, submesh: EntityId) -> Option<EntityId> {
        self.entities.get(submesh)?.submesh.and_then(|b| b.material)
    }

    /// Applies one material to every submesh of every geometry currently
    /// attached to the visual.
    pub(crate) fn set_visual_material(&mut self, visual: EntityId, material: &EntityRef) -> bool {
        if self.narrow(material, "assign material").is_none() {
            return false;
        }

        let submeshes: Vec<EntityId> = self
            .store_of(visual, StoreKind::Geometries)
            .map(|geometries| geometries.ids().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|mesh| self.store_of(mesh, StoreKind::SubMeshes))
            .flat_map(|s| s.ids())
            .collect();

        let mut all = true;
        for submesh in submeshes {
            all &= self.set_submesh_material(submesh, material);
        }
        all
    }

    //
    // meshes
    //

    pub(crate) fn mesh_block(&self, id: EntityId) -> Option<MeshBlock> {
        self.entities.get(id)?.mesh
    }

    pub(crate) fn submesh_block(&self, id: EntityId) -> Option<SubMeshBlock> {
        self.entities.get(id)?.submesh
    }

    fn mesh_native(&self, id: EntityId) -> Option<&dyn std::any::Any> {
        let entity = self.entities.get(id)?;
        if entity.kind != EntityKind::Mesh {
            return None;
        }
        entity.native.as_deref()
    }

    pub(crate) fn mesh_has_skeleton(&self, id: EntityId) -> bool {
        self.mesh_native(id)
            .is_some_and(|native| self.context.has_skeleton(native))
    }

    /// Name → local pose mapping; empty without a skeleton or bones.
    pub(crate) fn skeleton_local_transforms(
        &self,
        id: EntityId,
    ) -> HashMap<String, Isometry3<f32>> {
        self.mesh_native(id)
            .map(|native| self.context.bone_poses(native).into_iter().collect())
            .unwrap_or_default()
    }

    /// Applies explicit local poses to the named bones, marking exactly those
    /// bones as manually controlled. Names absent from the skeleton are
    /// skipped; a mesh without a skeleton ignores the call entirely.
    pub(crate) fn set_skeleton_local_transforms(
        &mut self,
        id: EntityId,
        transforms: &HashMap<String, Isometry3<f32>>,
    ) {
        if !self.is_alive(id) {
            return;
        }
        let SceneCore {
            context, entities, ..
        } = self;
        let Some(native) = entities
            .get(id)
            .filter(|e| e.kind == EntityKind::Mesh)
            .and_then(|e| e.native.as_deref())
        else {
            return;
        };
        for (bone, pose) in transforms {
            context.set_bone_pose(native, bone, pose);
        }
    }

    pub(crate) fn set_skeleton_animation_enabled(
        &mut self,
        id: EntityId,
        name: &str,
        enabled: bool,
        looped: bool,
        weight: f32,
    ) {
        if !self.is_alive(id) {
            return;
        }
        let SceneCore {
            context, entities, ..
        } = self;
        let Some(native) = entities
            .get(id)
            .filter(|e| e.kind == EntityKind::Mesh)
            .and_then(|e| e.native.as_deref())
        else {
            return;
        };
        if !context.set_animation_enabled(native, name, enabled, looped, weight) {
            error!("Skeleton animation name not found: {name}");
        }
    }

    pub(crate) fn skeleton_animation_enabled(&self, id: EntityId, name: &str) -> bool {
        let Some(native) = self.mesh_native(id) else {
            return false;
        };
        match self.context.animation_enabled(native, name) {
            Some(enabled) => enabled,
            None => {
                error!("Skeleton animation name not found: {name}");
                false
            }
        }
    }

    pub(crate) fn update_skeleton_animation(&mut self, id: EntityId, seconds: f32) {
        if !self.is_alive(id) {
            return;
        }
        let SceneCore {
            context, entities, ..
        } = self;
        let Some(native) = entities
            .get(id)
            .filter(|e| e.kind == EntityKind::Mesh)
            .and_then(|e| e.native.as_deref())
        else {
            return;
        };
        context.advance_animation(native, seconds);
    }
}

/// Which store of an owner a lookup goes through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StoreKind {
    Children,
    Geometries,
    SubMeshes,
}
