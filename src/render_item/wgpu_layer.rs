//! wgpu implementation of the resource layer.
//!
//! Render items do not record into a render pass directly: [`RenderItem::draw`] queues the
//! item, and [`WgpuResourceLayer::render`] replays the queue into the frame's render pass.

use crate::context::Context;
use crate::error::ResourceError;
use crate::render_item::{
    color_data, DrawMode, ElementsKind, GpuBuffer, Program, ProgramId, RenderItem, RenderItemDefs,
    RenderItemValues, ResourceLayer, ValueFlags,
};
use crate::renderable::ColorSource;
use crate::shader::{DefineValue, COLOR_TYPE, NORMAL};
use bytemuck::{Pod, Zeroable};
use glamx::Mat4;
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const ID_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32];
const TRANSFORM_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    2 => Float32x4,
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4
];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![6 => Float32x3];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![7 => Float32x3];

/// Pipeline configuration shared by every program of a [`WgpuResourceLayer`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Format of the color attachment; the context's surface format if `None`.
    pub color_format: Option<wgpu::TextureFormat>,
    /// Format of the depth attachment; no depth testing if `None`.
    pub depth_format: Option<wgpu::TextureFormat>,
    /// The sample count for MSAA.
    pub sample_count: u32,
    /// Cull back faces of triangles.
    pub cull_back_faces: bool,
    /// Blend fragments with the alpha of the object color.
    pub alpha_blending: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            color_format: None,
            depth_format: Some(Context::depth_format()),
            sample_count: 1,
            cull_back_faces: false,
            alpha_blending: true,
        }
    }
}

/// Frame uniforms.
/// Layout must match the FrameUniforms struct of the shader templates.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FrameUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

/// Object uniforms.
/// Layout must match the ObjectUniforms struct of the shader templates.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ObjectUniforms {
    color: [f32; 4],
    object_id: u32,
    instance_count: u32,
    element_count: u32,
    _pad: u32,
}

impl ObjectUniforms {
    fn new(values: &RenderItemValues) -> ObjectUniforms {
        ObjectUniforms {
            color: crate::color::to_array(values.base.color.uniform()),
            object_id: values.base.object_id,
            instance_count: values.base.instance_count,
            element_count: values.base.element_count,
            _pad: 0,
        }
    }
}

struct Shared {
    ctxt: Context,
    settings: RenderSettings,
    frame_uniform_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    queue: RefCell<Vec<QueuedDraw>>,
    alive: Cell<bool>,
}

impl Shared {
    fn check_alive(&self) -> Result<(), ResourceError> {
        if self.alive.get() {
            Ok(())
        } else {
            Err(ResourceError::ContextDestroyed)
        }
    }

    fn object_bind_group(&self, uniforms: &wgpu::Buffer, colors: &GpuBuffer) -> wgpu::BindGroup {
        self.ctxt.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("primgl_object_bind_group"),
            layout: &self.object_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: colors.buffer().as_entire_binding(),
                },
            ],
        })
    }
}

struct CompiledProgram {
    program: Rc<Program>,
    pipeline: wgpu::RenderPipeline,
    has_normal: bool,
    has_color_attribute: bool,
}

struct ItemBuffers {
    position: GpuBuffer,
    id: GpuBuffer,
    transform: GpuBuffer,
    normal: Option<GpuBuffer>,
    color_attribute: Option<GpuBuffer>,
    // Per-instance or per-element colors; a placeholder for other color types.
    colors: GpuBuffer,
    elements: Option<GpuBuffer>,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct QueuedDraw {
    program: Rc<CompiledProgram>,
    buffers: Rc<RefCell<ItemBuffers>>,
    index_format: Option<wgpu::IndexFormat>,
    draw_count: u32,
    instance_count: u32,
}

/// Resource layer allocating wgpu buffers and pipelines.
pub struct WgpuResourceLayer {
    shared: Rc<Shared>,
    programs: RefCell<HashMap<String, Rc<CompiledProgram>>>,
    next_program_id: Cell<u32>,
}

impl WgpuResourceLayer {
    /// Creates a resource layer on `ctxt`.
    pub fn new(ctxt: Context, settings: RenderSettings) -> WgpuResourceLayer {
        let frame_bind_group_layout =
            ctxt.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("primgl_frame_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let object_bind_group_layout =
            ctxt.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("primgl_object_bind_group_layout"),
                entries: &[
                    // Object uniforms (binding 0)
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Color storage buffer (binding 1)
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = ctxt.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("primgl_pipeline_layout"),
            bind_group_layouts: &[&frame_bind_group_layout, &object_bind_group_layout],
            push_constant_ranges: &[],
        });

        let identity = FrameUniforms {
            view: Mat4::IDENTITY.to_cols_array_2d(),
            proj: Mat4::IDENTITY.to_cols_array_2d(),
        };
        let frame_uniform_buffer = ctxt.create_buffer_init(
            Some("primgl_frame_uniform_buffer"),
            bytemuck::bytes_of(&identity),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let frame_bind_group = ctxt.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("primgl_frame_bind_group"),
            layout: &frame_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniform_buffer.as_entire_binding(),
            }],
        });

        WgpuResourceLayer {
            shared: Rc::new(Shared {
                ctxt,
                settings,
                frame_uniform_buffer,
                frame_bind_group,
                object_bind_group_layout,
                pipeline_layout,
                queue: RefCell::new(Vec::new()),
                alive: Cell::new(true),
            }),
            programs: RefCell::new(HashMap::new()),
            next_program_id: Cell::new(0),
        }
    }

    /// The rendering context of this layer.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.shared.ctxt
    }

    /// Sets the camera matrices used by every subsequent [`WgpuResourceLayer::render`].
    pub fn set_view_projection(&self, view: Mat4, proj: Mat4) {
        let uniforms = FrameUniforms {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        };
        self.shared.ctxt.write_buffer(
            &self.shared.frame_uniform_buffer,
            0,
            bytemuck::bytes_of(&uniforms),
        );
    }

    /// Number of draws queued since the last [`WgpuResourceLayer::render`].
    pub fn queued_draws(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    /// Replays the queued draws into `render_pass`, then clears the queue.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        let queued = std::mem::take(&mut *self.shared.queue.borrow_mut());
        if queued.is_empty() {
            return;
        }

        render_pass.set_bind_group(0, &self.shared.frame_bind_group, &[]);

        for draw in &queued {
            let buffers = draw.buffers.borrow();
            render_pass.set_pipeline(&draw.program.pipeline);
            render_pass.set_bind_group(1, &buffers.bind_group, &[]);
            render_pass.set_vertex_buffer(0, buffers.position.slice());
            render_pass.set_vertex_buffer(1, buffers.id.slice());
            render_pass.set_vertex_buffer(2, buffers.transform.slice());

            let mut slot = 3;
            if let Some(normal) = &buffers.normal {
                render_pass.set_vertex_buffer(slot, normal.slice());
                slot += 1;
            }
            if let Some(color) = &buffers.color_attribute {
                render_pass.set_vertex_buffer(slot, color.slice());
            }

            match (draw.index_format, &buffers.elements) {
                (Some(format), Some(elements)) => {
                    render_pass.set_index_buffer(elements.slice(), format);
                    render_pass.draw_indexed(0..draw.draw_count, 0, 0..draw.instance_count);
                }
                _ => render_pass.draw(0..draw.draw_count, 0..draw.instance_count),
            }
        }
    }

    /// Drops cached programs no render item uses anymore.
    pub fn release_unused_programs(&self) {
        self.programs
            .borrow_mut()
            .retain(|_, program| Rc::strong_count(program) > 1);
    }

    /// Number of cached programs.
    pub fn program_count(&self) -> usize {
        self.programs.borrow().len()
    }

    /// Tears the layer down. Render items created by it fail from now on.
    pub fn destroy(&self) {
        debug!("destroying wgpu resource layer");
        self.shared.alive.set(false);
        self.shared.queue.borrow_mut().clear();
        self.programs.borrow_mut().clear();
    }

    fn program(&self, defs: &RenderItemDefs) -> Result<Rc<CompiledProgram>, ResourceError> {
        let key = format!("{}|{:?}", defs.shader.key, defs.draw_mode);
        if let Some(program) = self.programs.borrow().get(&key) {
            return Ok(program.clone());
        }

        let program = Rc::new(self.compile(defs)?);
        let _ = self.programs.borrow_mut().insert(key, program.clone());
        Ok(program)
    }

    fn compile(&self, defs: &RenderItemDefs) -> Result<CompiledProgram, ResourceError> {
        let shader = &defs.shader;
        let has_normal = shader.defines.get(NORMAL) == Some(DefineValue::Flag(true));
        let has_color_attribute =
            shader.defines.get(COLOR_TYPE) == Some(DefineValue::Variant("attribute"));

        let (pipeline, error) = self
            .shared
            .ctxt
            .with_error_scope(wgpu::ErrorFilter::Validation, || {
                self.create_pipeline(defs, has_normal, has_color_attribute)
            });
        if let Some(error) = error {
            return Err(ResourceError::Compilation {
                label: shader.key.clone(),
                details: error.to_string(),
            });
        }

        let id = ProgramId(self.next_program_id.get());
        self.next_program_id.set(id.0 + 1);
        debug!("compiled program {:?}: {}", id, shader.key);

        Ok(CompiledProgram {
            program: Rc::new(Program {
                id,
                key: shader.key.clone(),
            }),
            pipeline,
            has_normal,
            has_color_attribute,
        })
    }

    fn create_pipeline(
        &self,
        defs: &RenderItemDefs,
        has_normal: bool,
        has_color_attribute: bool,
    ) -> wgpu::RenderPipeline {
        let ctxt = &self.shared.ctxt;
        let settings = &self.shared.settings;
        let shader = &defs.shader;
        let module = ctxt.create_shader_module(Some(shader.template), &shader.source);

        let mut buffers = vec![
            wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &ID_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: 64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &TRANSFORM_ATTRIBUTES,
            },
        ];
        if has_normal {
            buffers.push(wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &NORMAL_ATTRIBUTES,
            });
        }
        if has_color_attribute {
            buffers.push(wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &COLOR_ATTRIBUTES,
            });
        }

        let cull_mode = if settings.cull_back_faces && defs.draw_mode == DrawMode::Triangles {
            Some(wgpu::Face::Back)
        } else {
            None
        };
        let blend = if settings.alpha_blending {
            Some(wgpu::BlendState::ALPHA_BLENDING)
        } else {
            None
        };

        ctxt.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(shader.template),
            layout: Some(&self.shared.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: settings.color_format.unwrap_or(ctxt.surface_format),
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: defs.draw_mode.to_wgpu(),
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: settings
                .depth_format
                .map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
            multisample: wgpu::MultisampleState {
                count: settings.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    fn allocate(&self, program: &CompiledProgram, values: &RenderItemValues) -> ItemBuffers {
        let ctxt = &self.shared.ctxt;
        let base = &values.base;
        let vertex = wgpu::BufferUsages::VERTEX;

        let position = GpuBuffer::new(
            ctxt,
            "primgl_position",
            base.position.read().as_slice(),
            vertex,
        );
        let id = GpuBuffer::new(ctxt, "primgl_id", base.id.read().as_slice(), vertex);
        let transform = GpuBuffer::new(
            ctxt,
            "primgl_transform",
            base.transform.read().as_slice(),
            vertex,
        );
        let normal = match (&base.normal, program.has_normal) {
            (Some(cell), true) => Some(GpuBuffer::new(
                ctxt,
                "primgl_normal",
                cell.read().as_slice(),
                vertex,
            )),
            _ => None,
        };

        let (color_attribute, colors) = match &base.color {
            ColorSource::Attribute(cell) if program.has_color_attribute => (
                Some(GpuBuffer::new(
                    ctxt,
                    "primgl_color_attribute",
                    cell.read().as_slice(),
                    vertex,
                )),
                GpuBuffer::new::<f32>(ctxt, "primgl_colors", &[], wgpu::BufferUsages::STORAGE),
            ),
            other => (
                None,
                GpuBuffer::new(
                    ctxt,
                    "primgl_colors",
                    &color_data(other),
                    wgpu::BufferUsages::STORAGE,
                ),
            ),
        };

        let elements = values.elements.as_ref().map(|cell| {
            GpuBuffer::new(
                ctxt,
                "primgl_elements",
                cell.read().as_slice(),
                wgpu::BufferUsages::INDEX,
            )
        });

        let uniforms = ctxt.create_buffer_init(
            Some("primgl_object_uniforms"),
            bytemuck::bytes_of(&ObjectUniforms::new(values)),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let bind_group = self.shared.object_bind_group(&uniforms, &colors);

        ItemBuffers {
            position,
            id,
            transform,
            normal,
            color_attribute,
            colors,
            elements,
            uniforms,
            bind_group,
        }
    }
}

impl ResourceLayer for WgpuResourceLayer {
    fn create_render_item(
        &self,
        defs: &RenderItemDefs,
        values: &RenderItemValues,
    ) -> Result<Box<dyn RenderItem>, ResourceError> {
        self.shared.check_alive()?;

        let program = self.program(defs)?;
        let (buffers, error) = self
            .shared
            .ctxt
            .with_error_scope(wgpu::ErrorFilter::OutOfMemory, || {
                self.allocate(&program, values)
            });
        if let Some(error) = error {
            return Err(ResourceError::Allocation {
                label: defs.shader.key.clone(),
                details: error.to_string(),
            });
        }

        Ok(Box::new(WgpuRenderItem {
            shared: self.shared.clone(),
            program,
            buffers: Rc::new(RefCell::new(buffers)),
            elements_kind: defs.elements_kind,
            draw_count: values.draw_count,
            instance_count: values.base.instance_count,
        }))
    }
}

struct WgpuRenderItem {
    shared: Rc<Shared>,
    program: Rc<CompiledProgram>,
    buffers: Rc<RefCell<ItemBuffers>>,
    elements_kind: Option<ElementsKind>,
    draw_count: u32,
    instance_count: u32,
}

impl RenderItem for WgpuRenderItem {
    fn program(&self) -> Rc<Program> {
        self.program.program.clone()
    }

    fn draw(&mut self) -> Result<(), ResourceError> {
        self.shared.check_alive()?;
        trace!(
            "queueing draw of program {:?}: {} x {}",
            self.program.program.id,
            self.draw_count,
            self.instance_count
        );
        self.shared.queue.borrow_mut().push(QueuedDraw {
            program: self.program.clone(),
            buffers: self.buffers.clone(),
            index_format: self.elements_kind.map(ElementsKind::to_wgpu),
            draw_count: self.draw_count,
            instance_count: self.instance_count,
        });
        Ok(())
    }

    fn update(
        &mut self,
        values: &RenderItemValues,
        changed: ValueFlags,
    ) -> Result<(), ResourceError> {
        self.shared.check_alive()?;

        let shared = self.shared.clone();
        let ((), error) = shared
            .ctxt
            .with_error_scope(wgpu::ErrorFilter::OutOfMemory, || {
                self.write_changes(values, changed)
            });
        match error {
            Some(error) => Err(ResourceError::Allocation {
                label: self.program.program.key.clone(),
                details: error.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn dispose(self: Box<Self>) {
        trace!("releasing buffers of program {:?}", self.program.program.id);
    }
}

impl WgpuRenderItem {
    fn write_changes(&mut self, values: &RenderItemValues, changed: ValueFlags) {
        let ctxt = &self.shared.ctxt;
        let base = &values.base;
        let mut buffers = self.buffers.borrow_mut();
        let mut rebind = false;

        if changed.contains(ValueFlags::POSITION) {
            let _ = buffers.position.write(ctxt, base.position.read().as_slice());
        }
        if changed.contains(ValueFlags::ID) {
            let _ = buffers.id.write(ctxt, base.id.read().as_slice());
        }
        if changed.contains(ValueFlags::TRANSFORM) {
            let _ = buffers
                .transform
                .write(ctxt, base.transform.read().as_slice());
        }
        if changed.contains(ValueFlags::NORMAL) {
            if let (Some(buffer), Some(cell)) = (buffers.normal.as_mut(), base.normal.as_ref()) {
                let _ = buffer.write(ctxt, cell.read().as_slice());
            }
        }
        if changed.contains(ValueFlags::COLOR) {
            match &base.color {
                ColorSource::Attribute(cell) => {
                    if let Some(buffer) = buffers.color_attribute.as_mut() {
                        let _ = buffer.write(ctxt, cell.read().as_slice());
                    }
                }
                other => {
                    if let Some(cell) = other.cell() {
                        rebind |= buffers.colors.write(ctxt, cell.read().as_slice());
                    }
                }
            }
        }
        if changed.contains(ValueFlags::ELEMENTS) {
            if let (Some(buffer), Some(cell)) = (buffers.elements.as_mut(), values.elements.as_ref())
            {
                let _ = buffer.write(ctxt, cell.read().as_slice());
            }
        }
        if changed.contains(ValueFlags::UNIFORMS) {
            ctxt.write_buffer(
                &buffers.uniforms,
                0,
                bytemuck::bytes_of(&ObjectUniforms::new(values)),
            );
        }
        if changed.contains(ValueFlags::COUNTS) {
            self.draw_count = values.draw_count;
            self.instance_count = base.instance_count;
        }

        if rebind {
            let bind_group = self
                .shared
                .object_bind_group(&buffers.uniforms, &buffers.colors);
            buffers.bind_group = bind_group;
        }
    }
}
