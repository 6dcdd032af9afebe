//! Structure registration, lookup, and removal through a session.

use geoscope::*;

fn triangle() -> Vec<Vec3> {
    vec![Vec3::ZERO, Vec3::X, Vec3::Y]
}

#[test]
fn test_register_and_lookup() {
    let mut session = Session::headless();
    session
        .register_surface_mesh("mesh", triangle(), &[[0u32, 1, 2]])
        .unwrap();
    session.register_point_cloud("cloud", triangle()).unwrap();

    assert!(session.has_surface_mesh("mesh"));
    assert!(session.has_point_cloud("cloud"));
    assert!(!session.has_surface_mesh("cloud"));
    assert!(session.get_surface_mesh("nonexistent").is_none());
    assert_eq!(session.get_point_cloud("cloud").unwrap().num_points(), 3);
    assert_eq!(
        session.get_structure("mesh").unwrap().type_name(),
        "SurfaceMesh"
    );
    assert_eq!(session.structure_names(), vec!["cloud", "mesh"]);
}

#[test]
fn test_duplicate_name_keeps_existing() {
    let mut session = Session::headless();
    session.register_point_cloud("pts", triangle()).unwrap();
    let err = session
        .register_point_cloud("pts", vec![Vec3::ONE])
        .err()
        .unwrap();
    assert!(matches!(err, GeoscopeError::StructureExists(ref name) if name == "pts"));
    assert_eq!(session.get_point_cloud("pts").unwrap().num_points(), 3);

    // The same name under a different type is a separate structure.
    session
        .register_surface_mesh("pts", triangle(), &[[0u32, 1, 2]])
        .unwrap();
    assert_eq!(session.num_structures(), 2);
}

#[test]
fn test_invalid_mesh_is_not_registered() {
    let mut session = Session::headless();
    let result = session.register_surface_mesh("bad", triangle(), &[[0u32, 1, 7]]);
    assert!(matches!(result, Err(GeoscopeError::InvalidMesh(_))));
    assert!(!session.has_surface_mesh("bad"));
}

#[test]
fn test_remove_structures() {
    let mut session = Session::headless();
    session.register_point_cloud("a", triangle()).unwrap();
    session
        .register_surface_mesh("a", triangle(), &[[0u32, 1, 2]])
        .unwrap();
    session.register_point_cloud("b", triangle()).unwrap();

    session.remove_point_cloud("b").unwrap();
    assert!(!session.has_point_cloud("b"));
    assert!(matches!(
        session.remove_point_cloud("b"),
        Err(GeoscopeError::StructureNotFound(_))
    ));

    session.remove_structure("a").unwrap();
    assert_eq!(session.num_structures(), 0);
    assert!(session.remove_structure("a").is_err());

    session.register_point_cloud("c", triangle()).unwrap();
    session.remove_all_structures();
    assert!(session.structure_names().is_empty());
}

#[test]
fn test_scene_extents_follow_registration() {
    let mut session = Session::headless();
    session
        .register_point_cloud("near", vec![Vec3::ZERO, Vec3::ONE])
        .unwrap();
    session
        .register_point_cloud("far", vec![Vec3::splat(-1.0), Vec3::ZERO])
        .unwrap();
    assert_eq!(
        session.scene_bounding_box(),
        (Vec3::splat(-1.0), Vec3::ONE)
    );
    assert!((session.length_scale() - 12.0f32.sqrt()).abs() < 1e-5);

    session.remove_point_cloud("far").unwrap();
    assert_eq!(session.scene_bounding_box(), (Vec3::ZERO, Vec3::ONE));
}

#[test]
fn test_manual_scene_extents() {
    let options = Options {
        auto_compute_scene_extents: false,
        ..Options::default()
    };
    let mut session = Session::new(options);
    session
        .register_point_cloud("big", vec![Vec3::splat(-5.0), Vec3::splat(5.0)])
        .unwrap();
    assert_eq!(session.scene_bounding_box(), (Vec3::ZERO, Vec3::ONE));

    session.update_scene_extents();
    assert_eq!(
        session.scene_bounding_box(),
        (Vec3::splat(-5.0), Vec3::splat(5.0))
    );
}

#[test]
fn test_build_ui_in_name_order() {
    let mut session = Session::headless();
    session.register_point_cloud("zeta", triangle()).unwrap();
    session
        .register_surface_mesh("alpha", triangle(), &[[0u32, 1, 2]])
        .unwrap();
    session.register_point_cloud("mid", triangle()).unwrap();

    let mut ui = RecordingUi::new();
    session.build_ui(&mut ui);
    let headers: Vec<String> = ui
        .events()
        .iter()
        .filter_map(|event| match event {
            UiEvent::TreeNode(label) if ["alpha", "mid", "zeta"].contains(&label.as_str()) => {
                Some(label.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(headers, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_disable_from_ui() {
    let mut session = Session::headless();
    session.register_point_cloud("pts", triangle()).unwrap();

    let mut ui = RecordingUi::new();
    ui.toggle("Enabled");
    session.build_ui(&mut ui);
    assert!(!session.get_point_cloud("pts").unwrap().is_enabled());

    session.draw().unwrap();
    assert!(session.engine().draw_log().is_empty());
}
