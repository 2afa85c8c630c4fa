use nalgebra::Vector3;
use prism::backend::HeadlessContext;
use prism::core::{LightKind, MeshDescriptor, SubMeshDescriptor};
use prism::{Scene, SceneError};
use prism_utils::BoundingBox;
use std::any::Any;

fn scene() -> Scene {
    Scene::new(Box::new(HeadlessContext::new())).expect("headless context starts initialized")
}

fn headless_node_count(scene: &Scene) -> usize {
    scene.with_context(|ctx| {
        (ctx as &dyn Any)
            .downcast_ref::<HeadlessContext>()
            .expect("scene runs on the headless context")
            .node_count()
    })
}

fn headless_mesh_count(scene: &Scene) -> usize {
    scene.with_context(|ctx| {
        (ctx as &dyn Any)
            .downcast_ref::<HeadlessContext>()
            .expect("scene runs on the headless context")
            .mesh_count()
    })
}

fn with_headless<R>(scene: &Scene, f: impl FnOnce(&HeadlessContext) -> R) -> R {
    scene.with_context(|ctx| {
        f((ctx as &dyn Any)
            .downcast_ref::<HeadlessContext>()
            .expect("scene runs on the headless context"))
    })
}

fn box_mesh(scene: &Scene, name: &str) -> prism::Mesh {
    let descriptor = MeshDescriptor::new(name)
        .with_submesh(
            SubMeshDescriptor::new("shell").with_bounds(BoundingBox::from_min_max(
                Vector3::new(-1.0, -1.0, -1.0),
                Vector3::new(1.0, 1.0, 1.0),
            )),
        )
        .with_submesh(SubMeshDescriptor::new("lid"));
    scene.create_mesh(&descriptor).expect("mesh creation succeeds")
}

#[test]
fn attach_and_enumerate_children() {
    let scene = scene();
    let root = scene.root_visual();
    let a = scene.create_visual("a").unwrap();
    let b = scene.create_visual("b").unwrap();
    let camera = scene.create_camera("cam").unwrap();

    assert!(root.attach_child(&a));
    assert!(root.attach_child(&b));
    assert!(root.attach_child(&camera));

    assert_eq!(root.child_count(), 3);
    assert_eq!(root.child_by_index(0).unwrap().name(), "a");
    assert_eq!(root.child_by_index(1).unwrap().name(), "b");
    assert_eq!(root.child_by_name("cam").unwrap().id(), camera.id());
    assert_eq!(a.parent().unwrap().id(), root.id());

    let recovered = root.child_by_name("cam").unwrap();
    assert!(recovered.as_camera().is_some());
    assert!(recovered.as_visual().is_none());
}

#[test]
fn reattaching_relinks_from_previous_parent() {
    let scene = scene();
    let first = scene.create_visual("first").unwrap();
    let second = scene.create_visual("second").unwrap();
    let child = scene.create_visual("child").unwrap();

    assert!(first.attach_child(&child));
    assert!(second.attach_child(&child));

    assert_eq!(first.child_count(), 0);
    assert_eq!(second.child_count(), 1);
    assert_eq!(child.parent().unwrap().id(), second.id());
}

#[test]
fn detach_child_does_not_destroy() {
    let scene = scene();
    let parent = scene.create_visual("parent").unwrap();
    let child = scene.create_visual("child").unwrap();

    assert!(parent.attach_child(&child));
    assert!(parent.detach_child(&child));

    assert!(child.is_alive());
    assert!(child.parent().is_none());
    assert_eq!(parent.child_count(), 0);

    // a detached node is attachable elsewhere
    let other = scene.create_visual("other").unwrap();
    assert!(other.attach_child(&child));
}

#[test]
fn detaching_a_non_child_fails() {
    let scene = scene();
    let parent = scene.create_visual("parent").unwrap();
    let stranger = scene.create_visual("stranger").unwrap();

    assert!(!parent.detach_child(&stranger));
}

#[test]
fn duplicate_child_names_are_rejected() {
    let scene = scene();
    let parent = scene.create_visual("parent").unwrap();
    let a = scene.create_visual("twin").unwrap();
    let b = scene.create_visual("twin").unwrap();

    assert!(parent.attach_child(&a));
    assert!(!parent.attach_child(&b));
    assert_eq!(parent.child_count(), 1);
    assert!(b.parent().is_none());
}

#[test]
fn cyclic_attachment_is_rejected() {
    let scene = scene();
    let grandparent = scene.create_visual("grandparent").unwrap();
    let parent = scene.create_visual("parent").unwrap();
    let child = scene.create_visual("child").unwrap();

    assert!(grandparent.attach_child(&parent));
    assert!(parent.attach_child(&child));

    assert!(!child.attach_child(&grandparent));
    assert!(!child.attach_child(&child));
    assert_eq!(grandparent.parent().map(|p| p.id()), None);
}

#[test]
fn local_scale_round_trips_exactly() {
    let scene = scene();
    let visual = scene.create_visual("scaled").unwrap();

    let scale = Vector3::new(1.5, -2.0, 0.25);
    visual.set_local_scale(scale);
    assert_eq!(visual.local_scale(), scale);

    visual.set_uniform_local_scale(3.0);
    assert_eq!(visual.local_scale(), Vector3::new(3.0, 3.0, 3.0));
}

#[test]
fn world_pose_honors_scale_inheritance() {
    let scene = scene();
    let parent = scene.create_visual("parent").unwrap();
    let child = scene.create_visual("child").unwrap();
    scene.root_visual().attach_child(&parent);
    parent.attach_child(&child);

    parent.set_local_scale(Vector3::new(2.0, 2.0, 2.0));
    child.set_local_scale(Vector3::new(3.0, 3.0, 3.0));
    assert_eq!(child.world_scale(), Vector3::new(6.0, 6.0, 6.0));

    child.set_inherit_scale(false);
    assert!(!child.inherit_scale());
    assert_eq!(child.world_scale(), Vector3::new(3.0, 3.0, 3.0));

    parent.set_local_position(1.0, 0.0, 0.0);
    child.set_local_position(1.0, 0.0, 0.0);
    // parent scale still applies to the child's position offset
    assert_eq!(child.world_position(), Vector3::new(3.0, 0.0, 0.0));
}

#[test]
fn geometry_attach_detach_tracks_ownership() {
    let scene = scene();
    let visual = scene.create_visual("holder").unwrap();
    let mesh = box_mesh(&scene, "box");

    assert!(visual.attach_geometry(&mesh));
    assert_eq!(mesh.owner().unwrap().id(), visual.id());
    assert_eq!(visual.geometry_count(), 1);
    assert!(visual.has_geometry(&mesh));

    // re-attachment requires an explicit detach first
    let other = scene.create_visual("other").unwrap();
    assert!(!other.attach_geometry(&mesh));
    assert_eq!(other.geometry_count(), 0);

    assert!(visual.detach_geometry(&mesh));
    assert!(mesh.owner().is_none());
    assert!(mesh.is_alive());
    assert_eq!(visual.geometry_count(), 0);

    assert!(other.attach_geometry(&mesh));
    assert_eq!(mesh.owner().unwrap().id(), other.id());
}

#[test]
fn mesh_exposes_submeshes_and_bounds() {
    let scene = scene();
    let mesh = box_mesh(&scene, "box");

    assert_eq!(mesh.submesh_count(), 2);
    assert_eq!(mesh.submesh_by_index(0).unwrap().name(), "shell");
    assert_eq!(mesh.submesh_by_name("lid").unwrap().index(), 1);

    let bounds = mesh.local_bounds();
    assert_eq!(bounds.min, Vector3::new(-1.0, -1.0, -1.0));
    assert_eq!(bounds.max, Vector3::new(1.0, 1.0, 1.0));
}

#[test]
fn duplicate_submesh_names_fail_creation() {
    let scene = scene();
    let descriptor = MeshDescriptor::new("broken")
        .with_submesh(SubMeshDescriptor::new("side"))
        .with_submesh(SubMeshDescriptor::new("side"));

    assert!(matches!(
        scene.create_mesh(&descriptor),
        Err(SceneError::DuplicateSubMesh { .. })
    ));
}

#[test]
fn destroy_cascades_through_stores() {
    let scene = scene();
    let parent = scene.create_visual("parent").unwrap();
    let child = scene.create_visual("child").unwrap();
    let mesh = box_mesh(&scene, "box");
    parent.attach_child(&child);
    child.attach_geometry(&mesh);

    let submesh = mesh.submesh_by_index(0).unwrap();
    let nodes_before = headless_node_count(&scene);
    let meshes_before = headless_mesh_count(&scene);

    parent.destroy();

    assert!(!parent.is_alive());
    assert!(!child.is_alive());
    assert!(!mesh.is_alive());
    assert!(!submesh.is_alive());
    assert_eq!(headless_node_count(&scene), nodes_before - 2);
    assert_eq!(headless_mesh_count(&scene), meshes_before - 1);
}

#[test]
fn destroy_twice_is_idempotent() {
    let scene = scene();
    let visual = scene.create_visual("v").unwrap();
    scene.root_visual().attach_child(&visual);

    visual.destroy();
    let nodes_after_first = headless_node_count(&scene);
    let live_after_first = scene.live_entities();

    visual.destroy();

    assert_eq!(headless_node_count(&scene), nodes_after_first);
    assert_eq!(scene.live_entities(), live_after_first);
}

#[test]
fn destroyed_entities_reject_further_mutation() {
    let scene = scene();
    let visual = scene.create_visual("v").unwrap();
    visual.set_local_position(1.0, 2.0, 3.0);
    visual.destroy();

    visual.set_local_position(9.0, 9.0, 9.0);
    assert_eq!(visual.local_position(), Vector3::new(1.0, 2.0, 3.0));

    let child = scene.create_visual("child").unwrap();
    assert!(!visual.attach_child(&child));
}

#[test]
fn weak_handles_do_not_revive_destroyed_entities() {
    let scene = scene();
    let visual = scene.create_visual("v").unwrap();
    let weak = visual.downgrade();

    assert!(weak.upgrade().is_some());
    visual.destroy();
    assert!(
        weak.upgrade().is_none(),
        "weak refs should not revive destroyed entities"
    );
}

#[test]
fn destroy_after_shutdown_is_a_silent_noop() {
    let scene = scene();
    let visual = scene.create_visual("survivor").unwrap();
    scene.root_visual().attach_child(&visual);

    scene.shutdown();

    assert!(!scene.is_initialized());
    assert!(!visual.is_alive());
    // already torn down; must not panic or mutate anything
    visual.destroy();
    scene.root_visual().destroy();
}

#[test]
fn creation_fails_after_shutdown() {
    let scene = scene();
    scene.shutdown();

    assert!(matches!(
        scene.create_visual("late"),
        Err(SceneError::ContextNotInitialized)
    ));
    assert!(matches!(
        scene.create_mesh(&MeshDescriptor::new("late")),
        Err(SceneError::ContextNotInitialized)
    ));
}

#[test]
fn shutdown_releases_all_native_objects() {
    let scene = scene();
    let visual = scene.create_visual("v").unwrap();
    let mesh = box_mesh(&scene, "box");
    visual.attach_geometry(&mesh);
    scene.root_visual().attach_child(&visual);

    scene.shutdown();

    assert_eq!(headless_node_count(&scene), 0);
    assert_eq!(headless_mesh_count(&scene), 0);
    assert_eq!(scene.live_entities(), 0);
}

#[test]
fn visibility_toggles() {
    let scene = scene();
    let visual = scene.create_visual("blinker").unwrap();

    assert!(visual.visible());
    visual.set_visible(false);
    assert!(!visual.visible());
    assert_eq!(with_headless(&scene, |c| c.node_visible("blinker")), Some(false));
}

#[test]
fn mutations_write_through_to_the_native_graph() {
    let scene = scene();
    let parent = scene.create_visual("parent").unwrap();
    let child = scene.create_visual("child").unwrap();
    let mesh = box_mesh(&scene, "box");

    parent.attach_child(&child);
    child.attach_geometry(&mesh);
    child.set_local_position(1.0, 2.0, 3.0);
    child.set_inherit_scale(false);

    with_headless(&scene, |c| {
        assert!(c.nodes_linked("parent", "child"));
        assert_eq!(c.geometry_owner("box").as_deref(), Some("child"));
        let transform = c.node_transform("child").unwrap();
        assert_eq!(transform.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(c.node_inherits_scale("child"), Some(false));
    });

    parent.detach_child(&child);
    child.detach_geometry(&mesh);

    with_headless(&scene, |c| {
        assert!(!c.nodes_linked("parent", "child"));
        assert_eq!(c.geometry_owner("box"), None);
    });
}

#[test]
fn lights_carry_their_parameters() {
    let scene = scene();
    let light = scene.create_light("sun", LightKind::Directional).unwrap();
    scene.root_visual().attach_child(&light);

    assert_eq!(light.light_kind(), LightKind::Directional);
    light.set_diffuse(Vector3::new(1.0, 0.9, 0.8));
    light.set_intensity(2.5);
    light.set_cast_shadows(false);

    assert_eq!(light.diffuse(), Vector3::new(1.0, 0.9, 0.8));
    assert_eq!(light.intensity(), 2.5);
    assert!(!light.cast_shadows());
    assert_eq!(scene.root_visual().child_by_name("sun").unwrap().id(), light.id());

    let native = with_headless(&scene, |c| c.light_params("sun")).unwrap();
    assert_eq!(native.intensity, 2.5);
    assert!(!native.cast_shadows);
}
