use nalgebra::Vector3;
use prism::Scene;
use prism::backend::HeadlessContext;
use prism::core::{MeshDescriptor, SubMeshDescriptor};
use std::any::Any;

fn scene() -> Scene {
    Scene::new(Box::new(HeadlessContext::new())).expect("headless context starts initialized")
}

fn with_headless<R>(scene: &Scene, f: impl FnOnce(&HeadlessContext) -> R) -> R {
    scene.with_context(|ctx| {
        f((ctx as &dyn Any)
            .downcast_ref::<HeadlessContext>()
            .expect("scene runs on the headless context"))
    })
}

fn two_part_mesh(scene: &Scene, name: &str) -> prism::Mesh {
    let descriptor = MeshDescriptor::new(name)
        .with_submesh(SubMeshDescriptor::new("body"))
        .with_submesh(SubMeshDescriptor::new("trim"));
    scene.create_mesh(&descriptor).expect("mesh creation succeeds")
}

#[test]
fn material_data_round_trips() {
    let scene = scene();
    let material = scene.create_material("steel").unwrap();

    material.set_diffuse(Vector3::new(0.3, 0.3, 0.35));
    material.set_specular(Vector3::new(0.9, 0.9, 0.9));
    material.set_emissive(Vector3::new(0.0, 0.1, 0.0));

    assert_eq!(material.diffuse(), Vector3::new(0.3, 0.3, 0.35));
    assert_eq!(material.specular(), Vector3::new(0.9, 0.9, 0.9));
    assert_eq!(material.emissive(), Vector3::new(0.0, 0.1, 0.0));
    assert!(material.cast_shadows());
}

#[test]
fn submesh_binding_synchronizes_shadow_policy() {
    let scene = scene();
    let mesh = two_part_mesh(&scene, "mesh");
    let matte = scene.create_material("matte").unwrap();
    matte.set_cast_shadows(false);

    let body = mesh.submesh_by_name("body").unwrap();
    assert!(body.set_material(&matte));

    assert_eq!(body.material().unwrap().id(), matte.id());
    assert!(
        !mesh.cast_shadows(),
        "the material's shadow policy propagates to the mesh"
    );
    with_headless(&scene, |c| {
        assert_eq!(c.submesh_material("mesh", "body").as_deref(), Some("matte"));
        assert_eq!(c.mesh_casts_shadows("mesh"), Some(false));
    });

    let lit = scene.create_material("lit").unwrap();
    assert!(body.set_material(&lit));
    assert!(mesh.cast_shadows());
}

#[test]
fn material_colors_write_through() {
    let scene = scene();
    let material = scene.create_material("paint").unwrap();
    material.set_diffuse(Vector3::new(0.2, 0.4, 0.6));

    let native = with_headless(&scene, |c| c.material_data("paint")).unwrap();
    assert_eq!(native.diffuse, Vector3::new(0.2, 0.4, 0.6));
}

#[test]
fn rebinding_replaces_the_material() {
    let scene = scene();
    let mesh = two_part_mesh(&scene, "mesh");
    let first = scene.create_material("first").unwrap();
    let second = scene.create_material("second").unwrap();

    let trim = mesh.submesh_by_name("trim").unwrap();
    assert!(trim.set_material(&first));
    assert!(trim.set_material(&second));
    assert_eq!(trim.material().unwrap().id(), second.id());
}

#[test]
fn visual_level_assignment_reaches_every_submesh() {
    let scene = scene();
    let visual = scene.create_visual("visual").unwrap();
    let mesh_a = two_part_mesh(&scene, "a");
    let mesh_b = two_part_mesh(&scene, "b");
    visual.attach_geometry(&mesh_a);
    visual.attach_geometry(&mesh_b);

    let coat = scene.create_material("coat").unwrap();
    assert!(visual.set_material(&coat));

    for mesh in [&mesh_a, &mesh_b] {
        for index in 0..mesh.submesh_count() {
            let submesh = mesh.submesh_by_index(index).unwrap();
            assert_eq!(submesh.material().unwrap().id(), coat.id());
        }
    }
}

#[test]
fn destroyed_materials_disappear_from_submeshes() {
    let scene = scene();
    let mesh = two_part_mesh(&scene, "mesh");
    let material = scene.create_material("gone").unwrap();

    let body = mesh.submesh_by_name("body").unwrap();
    assert!(body.set_material(&material));

    material.destroy();
    assert!(!material.is_alive());
    assert!(body.material().is_none());
}

#[test]
fn destroyed_submeshes_reject_binding() {
    let scene = scene();
    let mesh = two_part_mesh(&scene, "mesh");
    let material = scene.create_material("late").unwrap();

    let body = mesh.submesh_by_name("body").unwrap();
    mesh.destroy();

    assert!(!body.set_material(&material));
}
