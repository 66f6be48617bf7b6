//! These tests need a GPU adapter. They return early when none is available.

use primgl::prelude::*;
use primgl::shader::{DefineSet, ShaderCode};

const SIZE: u32 = 4;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn layer() -> Option<Rc<WgpuResourceLayer>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctxt = Context::headless_blocking(FORMAT)?;
    let settings = RenderSettings {
        color_format: Some(FORMAT),
        depth_format: None,
        alpha_blending: false,
        ..Default::default()
    };
    Some(Rc::new(WgpuResourceLayer::new(ctxt, settings)))
}

fn single_point() -> PointProps {
    PointProps {
        object_id: 1,
        position: ValueCell::new(vec![0.0, 0.0, 0.0]),
        id: ValueCell::new(vec![0.0]),
        color: ColorSource::Element(ValueCell::new(vec![1.0, 0.0, 0.0])),
        transform: ValueCell::new(flatten_transforms(&[Mat4::IDENTITY])),
        instance_count: 1,
        element_count: 1,
        position_count: 1,
    }
}

fn full_screen_quad(color: Color) -> MeshProps {
    MeshProps {
        object_id: 2,
        position: ValueCell::new(vec![
            -1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0,
        ]),
        normal: None,
        id: ValueCell::new(vec![0.0, 0.0, 1.0, 1.0]),
        color: ColorSource::Uniform(color),
        transform: ValueCell::new(flatten_transforms(&[Mat4::IDENTITY])),
        index: ValueCell::new(vec![0, 1, 2, 0, 2, 3]),
        index_count: 2,
        instance_count: 1,
        element_count: 2,
        position_count: 4,
    }
}

/// Renders the queued draws into a `SIZE`x`SIZE` texture cleared to black and reads it back.
fn render_to_pixels(layer: &WgpuResourceLayer) -> Vec<u8> {
    let ctxt = layer.context();
    let texture = ctxt.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("primgl_test_target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_bytes_per_row = (SIZE as usize * 4).div_ceil(align) * align;
    let staging = ctxt.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("primgl_test_staging"),
        size: (padded_bytes_per_row * SIZE as usize) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctxt
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("primgl_test_encoder"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("primgl_test_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        layer.render(&mut pass);
    }
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row as u32),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    let _ = ctxt.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).unwrap();
    });
    ctxt.device
        .poll(wgpu::PollType::wait_indefinitely())
        .unwrap();
    rx.recv().unwrap().unwrap();

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for row in 0..SIZE as usize {
        let start = row * padded_bytes_per_row;
        pixels.extend_from_slice(&data[start..start + SIZE as usize * 4]);
    }
    pixels
}

#[test]
fn full_screen_quad_covers_every_pixel() {
    let layer = match layer() {
        Some(layer) => layer,
        None => return,
    };
    layer.set_view_projection(Mat4::IDENTITY, Mat4::IDENTITY);

    let mut quad = MeshRenderable::create(layer.clone(), full_screen_quad(LIME)).unwrap();
    assert_eq!(
        quad.defs().elements_kind.map(ElementsKind::as_str),
        Some("uint32")
    );
    quad.draw().unwrap();
    assert_eq!(layer.queued_draws(), 1);

    let pixels = render_to_pixels(&layer);
    assert_eq!(layer.queued_draws(), 0);
    for pixel in pixels.chunks(4) {
        assert_eq!(pixel, &[0, 255, 0, 255]);
    }
}

#[test]
fn uniform_color_patch_reaches_the_gpu() {
    let layer = match layer() {
        Some(layer) => layer,
        None => return,
    };

    let mut quad = MeshRenderable::create(layer.clone(), full_screen_quad(RED)).unwrap();
    let mut props = quad.props().clone();
    props.color = ColorSource::Uniform(BLUE);
    quad.update(props).unwrap();
    quad.draw().unwrap();

    let pixels = render_to_pixels(&layer);
    assert_eq!(&pixels[..4], &[0, 0, 255, 255]);
}

#[test]
fn growing_buffers_are_reallocated() {
    let layer = match layer() {
        Some(layer) => layer,
        None => return,
    };

    let mut points = PointRenderable::create(layer.clone(), single_point()).unwrap();
    let program = points.program().unwrap();

    let mut props = points.props().clone();
    props.position.write((0..300).map(|i| (i % 3) as f32 * 0.01).collect());
    props.id.write((0..100).map(|i| i as f32).collect());
    if let ColorSource::Element(colors) = &props.color {
        colors.write([0.0, 1.0, 0.0].repeat(100));
    }
    props.position_count = 100;
    props.element_count = 100;
    points.update(props).unwrap();

    assert!(Rc::ptr_eq(&program, &points.program().unwrap()));
    assert_eq!(points.values().draw_count, 100);

    // Drawing with the reallocated buffers must pass wgpu validation.
    points.draw().unwrap();
    let _ = render_to_pixels(&layer);
}

#[test]
fn invalid_wgsl_is_a_compilation_error() {
    let layer = match layer() {
        Some(layer) => layer,
        None => return,
    };
    let points = PointRenderable::create(layer.clone(), single_point()).unwrap();

    let defs = RenderItemDefs {
        shader: ShaderCode {
            template: "broken",
            key: "broken|".to_string(),
            source: Rc::from("this is not wgsl"),
            defines: DefineSet::new(),
        },
        draw_mode: DrawMode::Points,
        elements_kind: None,
    };
    let programs = layer.program_count();

    let err = layer
        .create_render_item(&defs, points.values())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ResourceError::Compilation { ref label, .. } if label == "broken|"
    ));
    assert_eq!(layer.program_count(), programs);
}

#[test]
fn destroyed_layer_rejects_draws() {
    let layer = match layer() {
        Some(layer) => layer,
        None => return,
    };
    let mut points = PointRenderable::create(layer.clone(), single_point()).unwrap();

    layer.destroy();

    assert_eq!(
        points.draw(),
        Err(RenderableError::Resource(ResourceError::ContextDestroyed))
    );
    assert_eq!(layer.queued_draws(), 0);
}
