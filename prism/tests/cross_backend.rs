//! Entities produced by one render context must never leak into another:
//! every cross-context operation fails, reports, and leaves both sides
//! untouched.

use prism::Scene;
use prism::backend::HeadlessContext;
use prism::core::{MeshDescriptor, SubMeshDescriptor};

fn scene() -> Scene {
    Scene::new(Box::new(HeadlessContext::new())).expect("headless context starts initialized")
}

fn simple_mesh(scene: &Scene, name: &str) -> prism::Mesh {
    let descriptor = MeshDescriptor::new(name).with_submesh(SubMeshDescriptor::new("surface"));
    scene.create_mesh(&descriptor).expect("mesh creation succeeds")
}

#[test]
fn attach_child_across_contexts_fails_without_mutation() {
    let scene_a = scene();
    let scene_b = scene();

    let parent = scene_a.create_visual("parent").unwrap();
    let foreign = scene_b.create_visual("foreign").unwrap();

    assert!(!parent.attach_child(&foreign));

    assert_eq!(parent.child_count(), 0);
    assert!(foreign.parent().is_none());
    assert_eq!(scene_b.root_visual().child_count(), 0);
}

#[test]
fn detach_child_across_contexts_fails() {
    let scene_a = scene();
    let scene_b = scene();

    let parent = scene_a.create_visual("parent").unwrap();
    let own = scene_a.create_visual("own").unwrap();
    let foreign = scene_b.create_visual("foreign").unwrap();
    assert!(parent.attach_child(&own));

    assert!(!parent.detach_child(&foreign));
    assert_eq!(parent.child_count(), 1);
}

#[test]
fn attach_geometry_across_contexts_fails_without_mutation() {
    let scene_a = scene();
    let scene_b = scene();

    let visual = scene_a.create_visual("visual").unwrap();
    let foreign_mesh = simple_mesh(&scene_b, "foreign");

    assert!(!visual.attach_geometry(&foreign_mesh));

    assert_eq!(visual.geometry_count(), 0);
    assert!(foreign_mesh.owner().is_none());

    // the rejected geometry is still attachable in its own scene
    let home = scene_b.create_visual("home").unwrap();
    assert!(home.attach_geometry(&foreign_mesh));
}

#[test]
fn material_assignment_across_contexts_fails_without_mutation() {
    let scene_a = scene();
    let scene_b = scene();

    let mesh = simple_mesh(&scene_a, "mesh");
    let submesh = mesh.submesh_by_index(0).unwrap();
    let foreign_material = scene_b.create_material("chrome").unwrap();
    foreign_material.set_cast_shadows(false);

    assert!(!submesh.set_material(&foreign_material));

    assert!(submesh.material().is_none());
    assert!(mesh.cast_shadows(), "shadow flag must stay untouched");
}

#[test]
fn visual_level_material_across_contexts_fails() {
    let scene_a = scene();
    let scene_b = scene();

    let visual = scene_a.create_visual("visual").unwrap();
    let mesh = simple_mesh(&scene_a, "mesh");
    visual.attach_geometry(&mesh);
    let foreign_material = scene_b.create_material("chrome").unwrap();

    assert!(!visual.set_material(&foreign_material));
    assert!(mesh.submesh_by_index(0).unwrap().material().is_none());
}

#[test]
fn tracking_a_foreign_node_fails() {
    let scene_a = scene();
    let scene_b = scene();

    let camera = scene_a.create_camera("camera").unwrap();
    let foreign = scene_b.create_visual("foreign").unwrap();
    foreign.set_local_position(5.0, 0.0, 0.0);

    assert!(!camera.set_track_target(Some(&foreign)));
    assert!(camera.track_target().is_none());
    assert!(!camera.update_tracking());
}

#[test]
fn mixed_pairs_fail_both_ways() {
    let scene_a = scene();
    let scene_b = scene();

    let a_visual = scene_a.create_visual("a").unwrap();
    let b_visual = scene_b.create_visual("b").unwrap();

    assert!(!a_visual.attach_child(&b_visual));
    assert!(!b_visual.attach_child(&a_visual));
    assert_eq!(a_visual.child_count(), 0);
    assert_eq!(b_visual.child_count(), 0);
}

#[test]
fn same_context_operations_still_work() {
    // guards against the narrow check being overly eager
    let scene = scene();
    let visual = scene.create_visual("visual").unwrap();
    let mesh = simple_mesh(&scene, "mesh");
    let material = scene.create_material("steel").unwrap();

    assert!(visual.attach_geometry(&mesh));
    assert!(mesh.submesh_by_index(0).unwrap().set_material(&material));
    assert_eq!(
        mesh.submesh_by_index(0).unwrap().material().unwrap().id(),
        material.id()
    );
}
