//! Reference backend backed by plain data structures.
//!
//! The headless context implements the full capability contract without any
//! GPU surface: native nodes, meshes and materials live in slotmaps, and
//! skeletons are sampled on the CPU. It is what the integration tests (and
//! any consumer that needs scene-graph semantics without rendering) run
//! against.

use crate::backend::{ContextId, RenderContext};
use crate::core::{
    AnimationClip, Bones, LightParams, LocalTransform, MaterialData, MeshDescriptor, Projection,
    SkeletonDescriptor,
};
use itertools::izip;
use nalgebra::Isometry3;
use prism_utils::debug_panic;
use slotmap::{SlotMap, new_key_type};
use std::any::Any;

new_key_type! {
    struct NodeKey;
    struct MeshKey;
    struct MaterialKey;
}

/// Narrows an incoming `&dyn Any` native handle to one of this backend's
/// handle types. The scene's context check makes a mismatch unreachable for
/// well-formed callers, so failing here is a programming error.
macro_rules! native {
    ($any:expr, $ty:ty) => {
        match $any.downcast_ref::<$ty>() {
            Some(native) => native,
            None => {
                debug_panic!("Native handle does not belong to this render context");
                return Default::default();
            }
        }
    };
}

#[derive(Debug, Copy, Clone)]
struct HeadlessNode {
    key: NodeKey,
}

#[derive(Debug, Copy, Clone)]
struct HeadlessMesh {
    key: MeshKey,
}

#[derive(Debug, Copy, Clone)]
struct HeadlessMaterial {
    key: MaterialKey,
}

struct NodeRecord {
    name: String,
    transform: LocalTransform,
    visible: bool,
    inherit_scale: bool,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    geometries: Vec<MeshKey>,
    camera: Option<Projection>,
    light: Option<LightParams>,
}

struct SubMeshRecord {
    name: String,
    material: Option<MaterialKey>,
}

struct MeshRecord {
    name: String,
    submeshes: Vec<SubMeshRecord>,
    cast_shadows: bool,
    attached_to: Option<NodeKey>,
    skeleton: Option<SkeletonInstance>,
}

struct MaterialRecord {
    name: String,
    data: MaterialData,
}

#[derive(Debug, Copy, Clone, Default)]
struct AnimationState {
    enabled: bool,
    looped: bool,
    weight: f32,
    time: f32,
}

/// Per-mesh skeleton state: current local poses, manual-control flags, and
/// one animation state per clip.
struct SkeletonInstance {
    bones: Bones,
    clips: Vec<AnimationClip>,
    states: Vec<AnimationState>,
    local_poses: Vec<Isometry3<f32>>,
    manual: Vec<bool>,
    globals: Vec<Isometry3<f32>>,
}

impl SkeletonInstance {
    fn new(desc: &SkeletonDescriptor) -> SkeletonInstance {
        let bones = Bones::from_descriptor(desc);
        let clips: Vec<_> = desc
            .animations
            .iter()
            .map(|a| AnimationClip::from_descriptor(a, &bones))
            .collect();
        let n = bones.len();

        SkeletonInstance {
            states: vec![AnimationState::default(); clips.len()],
            local_poses: bones.bind_local.clone(),
            manual: vec![false; n],
            globals: vec![Isometry3::identity(); n],
            bones,
            clips,
        }
    }

    fn clip_index(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.name == name)
    }

    fn set_bone_pose(&mut self, bone: &str, pose: &Isometry3<f32>) -> bool {
        let Some(index) = self.bones.index(bone) else {
            return false;
        };
        self.local_poses[index] = *pose;
        self.manual[index] = true;
        self.propagate();
        true
    }

    fn set_animation_enabled(&mut self, name: &str, enabled: bool, looped: bool, weight: f32) -> bool {
        let Some(index) = self.clip_index(name) else {
            return false;
        };

        // animation playback and manual posing are mutually exclusive
        if enabled {
            self.manual.fill(false);
        }

        let state = &mut self.states[index];
        state.enabled = enabled;
        state.looped = looped;
        state.weight = weight;
        true
    }

    fn animation_enabled(&self, name: &str) -> Option<bool> {
        self.clip_index(name).map(|i| self.states[i].enabled)
    }

    fn advance(&mut self, seconds: f32) {
        for (clip, state) in izip!(&self.clips, &mut self.states) {
            if !state.enabled {
                continue;
            }
            state.time = if state.looped && clip.length > 0.0 {
                seconds.rem_euclid(clip.length)
            } else {
                seconds.clamp(0.0, clip.length)
            };
        }
        self.recompute_pose();
    }

    /// Rebuilds local poses from the union of all enabled animation states,
    /// then refreshes the global pose of every bone. Manually controlled
    /// bones keep their explicit local pose.
    fn recompute_pose(&mut self) {
        for i in 0..self.bones.len() {
            if self.manual[i] {
                continue;
            }
            let mut pose = self.bones.bind_local[i];
            for (clip, state) in izip!(&self.clips, &self.states) {
                if !state.enabled {
                    continue;
                }
                if let Some(sampled) = clip.sample(i, state.time) {
                    pose = pose.lerp_slerp(&sampled, state.weight.clamp(0.0, 1.0));
                }
            }
            self.local_poses[i] = pose;
        }

        self.propagate();
    }

    fn propagate(&mut self) {
        fn visit(
            i: usize,
            bones: &Bones,
            locals: &[Isometry3<f32>],
            globals: &mut [Isometry3<f32>],
            parent_global: Isometry3<f32>,
        ) {
            let g = parent_global * locals[i];
            globals[i] = g;
            for &c in &bones.children[i] {
                visit(c, bones, locals, globals, g);
            }
        }

        for &root in &self.bones.roots {
            visit(
                root,
                &self.bones,
                &self.local_poses,
                &mut self.globals,
                Isometry3::identity(),
            );
        }
    }

    fn bone_poses(&self) -> Vec<(String, Isometry3<f32>)> {
        izip!(&self.bones.names, &self.local_poses)
            .map(|(name, pose)| (name.clone(), *pose))
            .collect()
    }
}

/// The in-tree reference implementation of [`RenderContext`].
pub struct HeadlessContext {
    id: ContextId,
    initialized: bool,
    nodes: SlotMap<NodeKey, NodeRecord>,
    meshes: SlotMap<MeshKey, MeshRecord>,
    materials: SlotMap<MaterialKey, MaterialRecord>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessContext {
    pub fn new() -> HeadlessContext {
        HeadlessContext {
            id: ContextId::next(),
            initialized: true,
            nodes: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            materials: SlotMap::with_key(),
        }
    }

    /// Number of live native nodes; used to observe teardown from tests.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    fn node_by_name(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.values().find(|n| n.name == name)
    }

    fn mesh_by_name(&self, name: &str) -> Option<&MeshRecord> {
        self.meshes.values().find(|m| m.name == name)
    }

    /// Local transform last written through for the named node.
    pub fn node_transform(&self, name: &str) -> Option<LocalTransform> {
        self.node_by_name(name).map(|n| n.transform)
    }

    pub fn node_visible(&self, name: &str) -> Option<bool> {
        self.node_by_name(name).map(|n| n.visible)
    }

    pub fn node_inherits_scale(&self, name: &str) -> Option<bool> {
        self.node_by_name(name).map(|n| n.inherit_scale)
    }

    /// Whether the named child hangs off the named parent in the native
    /// graph.
    pub fn nodes_linked(&self, parent: &str, child: &str) -> bool {
        let Some((child_key, _)) = self.nodes.iter().find(|(_, n)| n.name == child) else {
            return false;
        };
        self.node_by_name(parent)
            .is_some_and(|p| p.children.contains(&child_key))
    }

    /// Name of the node the named mesh is attached to.
    pub fn geometry_owner(&self, mesh: &str) -> Option<String> {
        let node = self.mesh_by_name(mesh)?.attached_to?;
        self.nodes.get(node).map(|n| n.name.clone())
    }

    pub fn camera_projection(&self, name: &str) -> Option<Projection> {
        self.node_by_name(name)?.camera
    }

    pub fn light_params(&self, name: &str) -> Option<LightParams> {
        self.node_by_name(name)?.light
    }

    pub fn mesh_casts_shadows(&self, name: &str) -> Option<bool> {
        self.mesh_by_name(name).map(|m| m.cast_shadows)
    }

    /// Name of the material bound to the named submesh.
    pub fn submesh_material(&self, mesh: &str, submesh: &str) -> Option<String> {
        let material = self
            .mesh_by_name(mesh)?
            .submeshes
            .iter()
            .find(|s| s.name == submesh)?
            .material?;
        self.materials.get(material).map(|m| m.name.clone())
    }

    pub fn material_data(&self, name: &str) -> Option<MaterialData> {
        self.materials
            .values()
            .find(|m| m.name == name)
            .map(|m| m.data)
    }
}

impl RenderContext for HeadlessContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.nodes.clear();
        self.meshes.clear();
        self.materials.clear();
    }

    fn create_node(&mut self, name: &str) -> Box<dyn Any> {
        let key = self.nodes.insert(NodeRecord {
            name: name.to_owned(),
            transform: LocalTransform::default(),
            visible: true,
            inherit_scale: true,
            parent: None,
            children: Vec::new(),
            geometries: Vec::new(),
            camera: None,
            light: None,
        });
        Box::new(HeadlessNode { key })
    }

    fn destroy_node(&mut self, node: &dyn Any) {
        let node = native!(node, HeadlessNode);
        let Some(record) = self.nodes.remove(node.key) else {
            return;
        };
        if let Some(parent) = record.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| *c != node.key);
        }
        for child in record.children {
            if let Some(child) = self.nodes.get_mut(child) {
                child.parent = None;
            }
        }
        for mesh in record.geometries {
            if let Some(mesh) = self.meshes.get_mut(mesh) {
                mesh.attached_to = None;
            }
        }
    }

    fn attach_node(&mut self, parent: &dyn Any, child: &dyn Any) {
        let parent = native!(parent, HeadlessNode);
        let child = native!(child, HeadlessNode);
        let Some(child_record) = self.nodes.get_mut(child.key) else {
            return;
        };
        child_record.parent = Some(parent.key);
        if let Some(parent_record) = self.nodes.get_mut(parent.key) {
            parent_record.children.push(child.key);
        }
    }

    fn detach_node(&mut self, parent: &dyn Any, child: &dyn Any) {
        let parent = native!(parent, HeadlessNode);
        let child = native!(child, HeadlessNode);
        if let Some(parent_record) = self.nodes.get_mut(parent.key) {
            parent_record.children.retain(|c| *c != child.key);
        }
        if let Some(child_record) = self.nodes.get_mut(child.key) {
            child_record.parent = None;
        }
    }

    fn set_node_transform(&mut self, node: &dyn Any, transform: &LocalTransform) {
        let node = native!(node, HeadlessNode);
        if let Some(record) = self.nodes.get_mut(node.key) {
            record.transform = *transform;
        }
    }

    fn set_node_visible(&mut self, node: &dyn Any, visible: bool) {
        let node = native!(node, HeadlessNode);
        if let Some(record) = self.nodes.get_mut(node.key) {
            record.visible = visible;
        }
    }

    fn set_inherit_scale(&mut self, node: &dyn Any, inherit: bool) {
        let node = native!(node, HeadlessNode);
        if let Some(record) = self.nodes.get_mut(node.key) {
            record.inherit_scale = inherit;
        }
    }

    fn update_camera(&mut self, node: &dyn Any, projection: &Projection) {
        let node = native!(node, HeadlessNode);
        if let Some(record) = self.nodes.get_mut(node.key) {
            record.camera = Some(*projection);
        }
    }

    fn update_light(&mut self, node: &dyn Any, params: &LightParams) {
        let node = native!(node, HeadlessNode);
        if let Some(record) = self.nodes.get_mut(node.key) {
            record.light = Some(*params);
        }
    }

    fn create_mesh(&mut self, descriptor: &MeshDescriptor) -> Box<dyn Any> {
        let key = self.meshes.insert(MeshRecord {
            name: descriptor.name.clone(),
            submeshes: descriptor
                .submeshes
                .iter()
                .map(|s| SubMeshRecord {
                    name: s.name.clone(),
                    material: None,
                })
                .collect(),
            cast_shadows: true,
            attached_to: None,
            skeleton: descriptor.skeleton.as_ref().map(SkeletonInstance::new),
        });
        Box::new(HeadlessMesh { key })
    }

    fn destroy_mesh(&mut self, mesh: &dyn Any) {
        let mesh = native!(mesh, HeadlessMesh);
        let Some(record) = self.meshes.remove(mesh.key) else {
            return;
        };
        if let Some(node) = record.attached_to.and_then(|n| self.nodes.get_mut(n)) {
            node.geometries.retain(|g| *g != mesh.key);
        }
    }

    fn attach_geometry(&mut self, node: &dyn Any, mesh: &dyn Any) {
        let node = native!(node, HeadlessNode);
        let mesh = native!(mesh, HeadlessMesh);
        let Some(mesh_record) = self.meshes.get_mut(mesh.key) else {
            return;
        };
        mesh_record.attached_to = Some(node.key);
        if let Some(node_record) = self.nodes.get_mut(node.key) {
            node_record.geometries.push(mesh.key);
        }
    }

    fn detach_geometry(&mut self, node: &dyn Any, mesh: &dyn Any) {
        let node = native!(node, HeadlessNode);
        let mesh = native!(mesh, HeadlessMesh);
        if let Some(node_record) = self.nodes.get_mut(node.key) {
            node_record.geometries.retain(|g| *g != mesh.key);
        }
        if let Some(mesh_record) = self.meshes.get_mut(mesh.key) {
            mesh_record.attached_to = None;
        }
    }

    fn set_mesh_cast_shadows(&mut self, mesh: &dyn Any, cast_shadows: bool) {
        let mesh = native!(mesh, HeadlessMesh);
        if let Some(record) = self.meshes.get_mut(mesh.key) {
            record.cast_shadows = cast_shadows;
        }
    }

    fn has_skeleton(&self, mesh: &dyn Any) -> bool {
        let mesh = native!(mesh, HeadlessMesh);
        self.meshes
            .get(mesh.key)
            .is_some_and(|m| m.skeleton.is_some())
    }

    fn bone_poses(&self, mesh: &dyn Any) -> Vec<(String, Isometry3<f32>)> {
        let mesh = native!(mesh, HeadlessMesh);
        self.meshes
            .get(mesh.key)
            .and_then(|m| m.skeleton.as_ref())
            .map(|s| s.bone_poses())
            .unwrap_or_default()
    }

    fn set_bone_pose(&mut self, mesh: &dyn Any, bone: &str, pose: &Isometry3<f32>) -> bool {
        let mesh = native!(mesh, HeadlessMesh);
        self.meshes
            .get_mut(mesh.key)
            .and_then(|m| m.skeleton.as_mut())
            .is_some_and(|s| s.set_bone_pose(bone, pose))
    }

    fn set_animation_enabled(
        &mut self,
        mesh: &dyn Any,
        name: &str,
        enabled: bool,
        looped: bool,
        weight: f32,
    ) -> bool {
        let mesh = native!(mesh, HeadlessMesh);
        self.meshes
            .get_mut(mesh.key)
            .and_then(|m| m.skeleton.as_mut())
            .is_some_and(|s| s.set_animation_enabled(name, enabled, looped, weight))
    }

    fn animation_enabled(&self, mesh: &dyn Any, name: &str) -> Option<bool> {
        let mesh = native!(mesh, HeadlessMesh);
        self.meshes
            .get(mesh.key)
            .and_then(|m| m.skeleton.as_ref())
            .and_then(|s| s.animation_enabled(name))
    }

    fn advance_animation(&mut self, mesh: &dyn Any, seconds: f32) {
        let mesh = native!(mesh, HeadlessMesh);
        if let Some(skeleton) = self
            .meshes
            .get_mut(mesh.key)
            .and_then(|m| m.skeleton.as_mut())
        {
            skeleton.advance(seconds);
        }
    }

    fn create_material(&mut self, name: &str) -> Box<dyn Any> {
        let key = self.materials.insert(MaterialRecord {
            name: name.to_owned(),
            data: MaterialData::default(),
        });
        Box::new(HeadlessMaterial { key })
    }

    fn destroy_material(&mut self, material: &dyn Any) {
        let material = native!(material, HeadlessMaterial);
        if self.materials.remove(material.key).is_some() {
            for mesh in self.meshes.values_mut() {
                for submesh in &mut mesh.submeshes {
                    if submesh.material == Some(material.key) {
                        submesh.material = None;
                    }
                }
            }
        }
    }

    fn update_material(&mut self, material: &dyn Any, data: &MaterialData) {
        let material = native!(material, HeadlessMaterial);
        if let Some(record) = self.materials.get_mut(material.key) {
            record.data = *data;
        }
    }

    fn set_submesh_material(&mut self, mesh: &dyn Any, index: usize, material: &dyn Any) {
        let mesh = native!(mesh, HeadlessMesh);
        let material = native!(material, HeadlessMaterial);
        if let Some(submesh) = self
            .meshes
            .get_mut(mesh.key)
            .and_then(|m| m.submeshes.get_mut(index))
        {
            submesh.material = Some(material.key);
        }
    }
}
