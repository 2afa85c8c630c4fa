use crate::backend::ContextId;
use crate::core::{LightParams, MaterialData, Projection, Store, Transform};
use crate::scene::SceneCore;
use prism_utils::BoundingBox;
use slotmap::new_key_type;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

new_key_type! {
    /// Uniquely identifies an entity within its scene.
    pub struct EntityId;
}

/// Kind tag of an entity record. Operations are dispatched on the kind and on
/// which capability blocks the record carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Visual,
    Camera,
    Light,
    Mesh,
    SubMesh,
    Material,
}

impl EntityKind {
    /// Node kinds take part in the parent/child graph and carry a transform.
    pub fn is_node(&self) -> bool {
        matches!(self, EntityKind::Visual | EntityKind::Camera | EntityKind::Light)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Visual => "visual",
            EntityKind::Camera => "camera",
            EntityKind::Light => "light",
            EntityKind::Mesh => "mesh",
            EntityKind::SubMesh => "submesh",
            EntityKind::Material => "material",
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct VisualBlock {
    pub inherit_scale: bool,
    pub visible: bool,
}

impl Default for VisualBlock {
    fn default() -> Self {
        VisualBlock {
            inherit_scale: true,
            visible: true,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct CameraBlock {
    pub projection: Projection,
    pub track_target: Option<EntityId>,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct MeshBlock {
    pub cast_shadows: bool,
    pub bounds: BoundingBox,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct SubMeshBlock {
    /// Index of the native sub-object within the parent mesh.
    pub index: usize,
    pub material: Option<EntityId>,
}

/// A single entity record: kind tag plus the capability blocks present for
/// that kind. Owned by the scene arena; addressed by [`EntityId`].
pub(crate) struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Whether the entity is still alive inside the scene. A dead entity may
    /// linger in the arena while strong handles to it exist; every mutating
    /// call on it is a no-op.
    pub alive: bool,
    pub kind: EntityKind,
    /// Owning parent: node parent, owning visual for geometries, owning mesh
    /// for submeshes. Back-reference only, never an owning link.
    pub parent: Option<EntityId>,
    /// Backend-native object wrapped by this entity.
    pub native: Option<Box<dyn Any>>,
    pub transform: Option<Transform>,
    pub children: Option<Store>,
    pub geometries: Option<Store>,
    pub submeshes: Option<Store>,
    pub visual: Option<VisualBlock>,
    pub camera: Option<CameraBlock>,
    pub light: Option<LightParams>,
    pub material: Option<MaterialData>,
    pub mesh: Option<MeshBlock>,
    pub submesh: Option<SubMeshBlock>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Entity {
        Entity {
            id: EntityId::default(),
            name: name.into(),
            alive: true,
            kind,
            parent: None,
            native: None,
            transform: None,
            children: None,
            geometries: None,
            submeshes: None,
            visual: None,
            camera: None,
            light: None,
            material: None,
            mesh: None,
            submesh: None,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("alive", &self.alive)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Strong reference to an entity that keeps its arena slot alive until all
/// references are dropped.
///
/// Cloning retains, dropping releases. `destroy` is independent of the
/// reference count: a destroyed entity stays addressable through outstanding
/// handles, but every further mutating call on it is a no-op.
pub struct EntityRef {
    id: EntityId,
    kind: EntityKind,
    context: ContextId,
    scene: Weak<RefCell<SceneCore>>,
}

impl EntityRef {
    pub(crate) fn from_parts(
        id: EntityId,
        kind: EntityKind,
        context: ContextId,
        scene: Weak<RefCell<SceneCore>>,
    ) -> EntityRef {
        EntityRef {
            id,
            kind,
            context,
            scene,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Identity of the render context this entity was created by.
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    pub(crate) fn scene(&self) -> Option<Rc<RefCell<SceneCore>>> {
        self.scene.upgrade()
    }

    pub fn name(&self) -> String {
        self.scene()
            .map(|scene| scene.borrow().entity_name(self.id))
            .unwrap_or_default()
    }

    /// Returns whether this entity is still alive inside the scene.
    pub fn is_alive(&self) -> bool {
        self.scene()
            .is_some_and(|scene| scene.borrow().is_alive(self.id))
    }

    /// Destroys the entity and everything its stores own, releases the native
    /// object, and detaches it from its parent. Destroying twice, or after
    /// the render context was shut down, is a no-op.
    pub fn destroy(&self) {
        if let Some(scene) = self.scene() {
            scene.borrow_mut().destroy_entity(self.id);
        }
    }

    /// Creates a weak reference that can later be upgraded while the entity
    /// is alive.
    pub fn downgrade(&self) -> EntityWeak {
        EntityWeak {
            id: self.id,
            kind: self.kind,
            context: self.context,
            scene: self.scene.clone(),
        }
    }
}

impl Clone for EntityRef {
    fn clone(&self) -> Self {
        if let Some(scene) = self.scene() {
            scene.borrow_mut().retain(self.id);
        }
        EntityRef {
            id: self.id,
            kind: self.kind,
            context: self.context,
            scene: self.scene.clone(),
        }
    }
}

impl Drop for EntityRef {
    fn drop(&mut self) {
        if let Some(scene) = self.scene.upgrade() {
            scene.borrow_mut().release(self.id);
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.context == other.context
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.context.hash(state);
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("context", &self.context)
            .finish()
    }
}

/// Weak reference to an entity. Upgrading fails once the entity has been
/// destroyed; weak references never revive dead entities.
#[derive(Clone)]
pub struct EntityWeak {
    id: EntityId,
    kind: EntityKind,
    context: ContextId,
    scene: Weak<RefCell<SceneCore>>,
}

impl EntityWeak {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn upgrade(&self) -> Option<EntityRef> {
        let scene = self.scene.upgrade()?;
        let mut core = scene.borrow_mut();
        if !core.is_alive(self.id) {
            return None;
        }
        core.make_ref(self.id)
    }
}

impl fmt::Debug for EntityWeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityWeak")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
