use primgl::prelude::*;
use primgl::shader::{compose_shader, DefineSet, DefineValue, POINT_TEMPLATE};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn layer() -> (Rc<HeadlessResourceLayer>, Rc<dyn ResourceLayer>) {
    init_logger();
    let layer = Rc::new(HeadlessResourceLayer::new());
    let dyn_layer: Rc<dyn ResourceLayer> = layer.clone();
    (layer, dyn_layer)
}

fn quad(object_id: u32) -> MeshProps {
    MeshProps {
        object_id,
        position: ValueCell::new(vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
        ]),
        normal: None,
        id: ValueCell::new(vec![0.0, 0.0, 1.0, 1.0]),
        color: ColorSource::Uniform(RED),
        transform: ValueCell::new(flatten_transforms(&[Mat4::IDENTITY])),
        index: ValueCell::new(vec![0, 1, 2, 0, 2, 3]),
        index_count: 2,
        instance_count: 1,
        element_count: 2,
        position_count: 4,
    }
}

fn cloud(object_id: u32, count: usize) -> PointProps {
    PointProps {
        object_id,
        position: ValueCell::new((0..count * 3).map(|i| i as f32).collect()),
        id: ValueCell::new(vec![0.0; count]),
        color: ColorSource::Uniform(BLUE),
        transform: ValueCell::new(flatten_transforms(&[Mat4::IDENTITY])),
        instance_count: 1,
        element_count: 1,
        position_count: count as u32,
    }
}

fn normals() -> ValueCell<Vec<f32>> {
    ValueCell::new([0.0, 0.0, 1.0].repeat(4))
}

#[test]
fn defines_depend_on_shape_only() {
    let (_, layer) = layer();

    let a = MeshRenderable::create(layer.clone(), quad(1)).unwrap();
    let mut props = quad(2);
    props.color = ColorSource::Uniform(YELLOW);
    props.position.write([5.0; 12].to_vec());
    let b = MeshRenderable::create(layer, props).unwrap();

    assert_eq!(a.defs(), b.defs());
    assert_eq!(a.defs().shader.key, b.defs().shader.key);
    assert!(Rc::ptr_eq(&a.program().unwrap(), &b.program().unwrap()));
}

#[test]
fn content_update_patches_in_place() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    let program = mesh.program().unwrap();

    let props = mesh.props().clone();
    props.position.write([2.0; 12].to_vec());
    mesh.update(props).unwrap();

    assert!(Rc::ptr_eq(&program, &mesh.program().unwrap()));
    assert_eq!(headless.stats().items_created, 1);
    assert_eq!(headless.updates(), vec![(1, ValueFlags::POSITION)]);
    assert!(!mesh.props().position.is_dirty());
}

#[test]
fn update_without_changes_uploads_nothing() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    let uploads = headless.stats().uploads;

    let props = mesh.props().clone();
    mesh.update(props).unwrap();

    assert_eq!(headless.stats().uploads, uploads);
    assert!(headless.updates().is_empty());
}

#[test]
fn adding_normals_rebuilds() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    let program = mesh.program().unwrap();
    assert!(!mesh.defs().shader.defines.contains("dNormal"));

    let mut props = mesh.props().clone();
    props.normal = Some(normals());
    mesh.update(props).unwrap();

    assert!(mesh.defs().shader.defines.contains("dNormal"));
    assert!(!Rc::ptr_eq(&program, &mesh.program().unwrap()));
    assert_eq!(headless.stats().items_created, 2);
    assert_eq!(headless.stats().items_disposed, 1);
    assert_eq!(headless.live_items(), 1);
}

#[test]
fn repeated_draws_are_identical() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(3)).unwrap();

    for _ in 0..5 {
        mesh.draw().unwrap();
    }

    let draws = headless.draws();
    assert_eq!(draws.len(), 5);
    assert!(draws.iter().all(|draw| *draw == draws[0]));
    assert_eq!(draws[0].program, mesh.program().unwrap().id);
}

#[test]
fn mesh_draws_three_indices_per_triangle() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    mesh.draw().unwrap();

    let draws = headless.draws();
    let draw = &draws[0];
    assert_eq!(draw.draw_count, 6);
    assert_eq!(draw.draw_mode, DrawMode::Triangles);
    assert_eq!(draw.elements_kind, Some(ElementsKind::Uint32));
    assert_eq!(
        mesh.defs().elements_kind.map(ElementsKind::as_str),
        Some("uint32")
    );
    assert_eq!(mesh.values().draw_count, 6);
}

#[test]
fn shared_cell_change_reaches_every_renderable() {
    let (headless, layer) = layer();
    let transform = ValueCell::new(flatten_transforms(&[Mat4::IDENTITY]));

    let mut a = cloud(1, 3);
    a.transform = transform.clone();
    let mut b = cloud(2, 3);
    b.transform = transform.clone();
    let mut a = PointRenderable::create(layer.clone(), a).unwrap();
    let mut b = PointRenderable::create(layer, b).unwrap();

    transform.write(flatten_transforms(&[Mat4::from_translation(Vec3::X)]));
    let props = a.props().clone();
    a.update(props).unwrap();
    let props = b.props().clone();
    b.update(props).unwrap();

    assert_eq!(
        headless.updates(),
        vec![(1, ValueFlags::TRANSFORM), (2, ValueFlags::TRANSFORM)]
    );

    // Both saw the write, so nothing is left to upload.
    let props = a.props().clone();
    a.update(props).unwrap();
    let props = b.props().clone();
    b.update(props).unwrap();
    assert_eq!(headless.updates().len(), 2);
}

#[test]
fn point_cloud_draws_one_vertex_per_point() {
    let (headless, layer) = layer();
    let mut points = PointRenderable::create(layer, cloud(4, 100)).unwrap();
    points.draw().unwrap();

    let draws = headless.draws();
    let draw = &draws[0];
    assert_eq!(draw.draw_count, 100);
    assert_eq!(draw.draw_mode, DrawMode::Points);
    assert_eq!(draw.elements_kind, None);
    assert!(points.values().elements.is_none());
}

#[test]
fn partial_triangles_are_rejected_before_allocation() {
    let (headless, layer) = layer();
    let mut props = quad(1);
    props.index = ValueCell::new(vec![0, 1, 2, 3]);

    let err = MeshRenderable::create(layer, props).err().unwrap();

    assert!(matches!(
        err,
        RenderableError::ShapeMismatch(ShapeMismatchError::NotMultiple { field: "index", .. })
    ));
    assert_eq!(headless.stats().items_created, 0);
    assert_eq!(headless.stats().programs_compiled, 0);
}

#[test]
fn color_variant_change_rebuilds() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    let program = mesh.program().unwrap();

    let mut props = mesh.props().clone();
    props.color = ColorSource::Attribute(ValueCell::new(vec![1.0; 12]));
    mesh.update(props).unwrap();

    assert_eq!(
        mesh.defs().shader.defines.get("dColorType"),
        Some(DefineValue::Variant("attribute"))
    );
    assert!(!Rc::ptr_eq(&program, &mesh.program().unwrap()));
    assert_eq!(headless.stats().items_created, 2);
}

#[test]
fn uniform_color_change_patches_uniforms_only() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    let program = mesh.program().unwrap();

    let mut props = mesh.props().clone();
    props.color = ColorSource::Uniform(LIME);
    mesh.update(props).unwrap();
    mesh.draw().unwrap();

    assert!(Rc::ptr_eq(&program, &mesh.program().unwrap()));
    assert_eq!(headless.updates(), vec![(1, ValueFlags::UNIFORMS)]);
    assert_eq!(headless.draws()[0].color, to_array(LIME));
}

#[test]
fn element_colors_are_patched_in_place() {
    let (headless, layer) = layer();
    let colors = ValueCell::new(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let mut props = quad(1);
    props.color = ColorSource::Element(colors.clone());
    let mut mesh = MeshRenderable::create(layer, props).unwrap();

    colors.update(|c| c[0] = 0.5);
    let props = mesh.props().clone();
    mesh.update(props).unwrap();

    assert_eq!(headless.updates(), vec![(1, ValueFlags::COLOR)]);
    assert!(!colors.is_dirty());
}

#[test]
fn failed_validation_keeps_cells_dirty() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();

    let mut props = mesh.props().clone();
    props.position.write([3.0; 12].to_vec());
    props.index_count = 3;

    let err = mesh.update(props).unwrap_err();
    assert!(matches!(
        err,
        RenderableError::ShapeMismatch(ShapeMismatchError::BufferLength { field: "index", .. })
    ));
    assert!(mesh.props().position.is_dirty());
    assert_eq!(mesh.props().index_count, 2);
    assert!(headless.updates().is_empty());

    // A valid bag later still picks the pending change up.
    let props = mesh.props().clone();
    mesh.update(props).unwrap();
    assert_eq!(headless.updates(), vec![(1, ValueFlags::POSITION)]);
}

#[test]
fn object_id_is_immutable() {
    let (_, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();

    let mut props = mesh.props().clone();
    props.object_id = 2;

    assert_eq!(
        mesh.update(props).unwrap_err(),
        RenderableError::ShapeMismatch(ShapeMismatchError::ImmutableField {
            field: "object_id",
            expected: 1,
            found: 2,
        })
    );
}

#[test]
fn allocation_failure_keeps_old_item() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    let program = mesh.program().unwrap();
    let defs = mesh.defs().clone();

    let mut props = mesh.props().clone();
    let normal = normals();
    props.normal = Some(normal.clone());
    headless.fail_next_allocation();

    assert!(matches!(
        mesh.update(props),
        Err(RenderableError::Resource(ResourceError::Allocation { .. }))
    ));
    assert_eq!(mesh.state(), RenderableState::Ready);
    assert_eq!(mesh.defs(), &defs);
    assert!(Rc::ptr_eq(&program, &mesh.program().unwrap()));
    assert!(normal.is_dirty());
    assert_eq!(headless.live_items(), 1);

    mesh.draw().unwrap();
    assert_eq!(headless.draws().len(), 1);
}

#[test]
fn dispose_is_terminal() {
    let (headless, layer) = layer();
    let mut points = PointRenderable::create(layer, cloud(1, 3)).unwrap();

    points.dispose().unwrap();
    assert_eq!(points.state(), RenderableState::Disposed);
    assert_eq!(headless.live_items(), 0);

    let invalid = |operation| {
        RenderableError::InvalidState(InvalidStateError {
            name: "point",
            operation,
        })
    };
    assert_eq!(points.dispose().unwrap_err(), invalid("dispose"));
    assert_eq!(points.draw().unwrap_err(), invalid("draw"));
    assert_eq!(points.update(cloud(1, 3)).unwrap_err(), invalid("update"));
    assert!(points.program().is_err());
    assert_eq!(headless.stats().items_disposed, 1);
}

#[test]
fn dropping_a_renderable_releases_its_item() {
    let (headless, layer) = layer();
    {
        let _mesh = MeshRenderable::create(layer, quad(1)).unwrap();
        assert_eq!(headless.live_items(), 1);
    }
    assert_eq!(headless.live_items(), 0);
}

#[test]
fn programs_are_shared_and_released() {
    let (headless, layer) = layer();
    let a = PointRenderable::create(layer.clone(), cloud(1, 10)).unwrap();
    let mut b = PointRenderable::create(layer.clone(), cloud(2, 20)).unwrap();
    let mut mesh = MeshRenderable::create(layer, quad(3)).unwrap();

    assert!(Rc::ptr_eq(&a.program().unwrap(), &b.program().unwrap()));
    assert_eq!(headless.stats().programs_compiled, 2);

    mesh.dispose().unwrap();
    headless.release_unused_programs();
    assert_eq!(headless.program_count(), 1);

    b.dispose().unwrap();
    headless.release_unused_programs();
    assert_eq!(headless.program_count(), 1);
}

#[test]
fn destroyed_context_surfaces_resource_errors() {
    let (headless, layer) = layer();
    let mut mesh = MeshRenderable::create(layer, quad(1)).unwrap();
    headless.destroy();

    assert_eq!(
        mesh.draw().unwrap_err(),
        RenderableError::Resource(ResourceError::ContextDestroyed)
    );
    assert_eq!(mesh.state(), RenderableState::Ready);
}

#[test]
fn instance_count_change_updates_counts() {
    let (headless, layer) = layer();
    let mut points = PointRenderable::create(layer, cloud(1, 4)).unwrap();

    let mut props = points.props().clone();
    props.transform.write(flatten_transforms(&[
        Mat4::IDENTITY,
        Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
    ]));
    props.instance_count = 2;
    points.update(props).unwrap();
    points.draw().unwrap();

    assert_eq!(
        headless.updates(),
        vec![(
            1,
            ValueFlags::TRANSFORM | ValueFlags::UNIFORMS | ValueFlags::COUNTS
        )]
    );
    assert_eq!(headless.draws()[0].instance_count, 2);
}

#[test]
fn any_renderable_rejects_other_kinds() {
    let (_, layer) = layer();
    let mut any = AnyRenderable::create(layer, quad(1)).unwrap();
    assert_eq!(any.name(), "mesh");

    assert_eq!(
        any.update(cloud(1, 3).into()).unwrap_err(),
        RenderableError::KindMismatch {
            expected: "mesh",
            found: "point",
        }
    );

    let mut props = quad(1);
    props.normal = Some(normals());
    any.update(props.into()).unwrap();
    assert!(any.defs().shader.defines.contains("dNormal"));

    any.dispose().unwrap();
    assert!(matches!(
        any.update(cloud(1, 3).into()),
        Err(RenderableError::InvalidState(_))
    ));
}

#[test]
fn unknown_define_is_a_composition_error() {
    let mut defines = DefineSet::new();
    defines.set_flag("dUnknown", true);

    assert_eq!(
        compose_shader(&POINT_TEMPLATE, &defines).unwrap_err(),
        ShaderCompositionError::UnknownDefine {
            template: "point",
            define: "dUnknown",
        }
    );
}
