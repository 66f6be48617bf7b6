use primgl::prelude::*;

const SIZE: u32 = 256;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn main() {
    env_logger::init();

    let ctxt = match Context::headless_blocking(FORMAT) {
        Some(ctxt) => ctxt,
        None => {
            eprintln!("no GPU adapter available");
            return;
        }
    };
    let layer = Rc::new(WgpuResourceLayer::new(
        ctxt.clone(),
        RenderSettings {
            color_format: Some(FORMAT),
            ..Default::default()
        },
    ));

    let target = ctxt.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth = ctxt.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_depth"),
        size: target.size(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: Context::depth_format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

    let transform = ValueCell::new(flatten_transforms(&[Mat4::IDENTITY]));
    let mut triangle = MeshRenderable::create(
        layer.clone(),
        MeshProps {
            object_id: 0,
            position: ValueCell::new(vec![-0.5, -0.5, 0.5, 0.5, -0.5, 0.5, 0.0, 0.5, 0.5]),
            normal: None,
            id: ValueCell::new(vec![0.0; 3]),
            color: ColorSource::Uniform(RED),
            transform: transform.clone(),
            index: ValueCell::new(vec![0, 1, 2]),
            index_count: 1,
            instance_count: 1,
            element_count: 1,
            position_count: 3,
        },
    )
    .expect("failed to create the triangle");

    let count = 64;
    let mut points = PointRenderable::create(
        layer.clone(),
        PointProps {
            object_id: 1,
            position: ValueCell::new(
                (0..count)
                    .flat_map(|i| {
                        let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                        vec![angle.cos() * 0.8, angle.sin() * 0.8, 0.2]
                    })
                    .collect(),
            ),
            id: ValueCell::new(vec![0.0; count]),
            color: ColorSource::Uniform(WHITE),
            transform,
            instance_count: 1,
            element_count: 1,
            position_count: count as u32,
        },
    )
    .expect("failed to create the point cloud");

    let rot = Quat::from_axis_angle(Vec3::Z, 0.1);
    let mut model = Mat4::IDENTITY;

    for frame in 0..10 {
        // The transform cell is shared: both renderables pick the rotation up.
        model = Mat4::from_quat(rot) * model;
        triangle.props().transform.write(flatten_transforms(&[model]));

        let props = triangle.props().clone();
        triangle.update(props).expect("failed to update the triangle");
        let props = points.props().clone();
        points.update(props).expect("failed to update the point cloud");

        triangle.draw().expect("failed to draw the triangle");
        points.draw().expect("failed to draw the point cloud");

        let mut encoder = ctxt
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("offscreen_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            layer.render(&mut pass);
        }
        let _ = ctxt.queue.submit(std::iter::once(encoder.finish()));
        println!("frame {}: {} programs", frame, layer.program_count());
    }
}
