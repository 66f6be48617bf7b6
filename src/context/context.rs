//! wgpu rendering context management.
//!
//! A [`Context`] is passed explicitly to the resource layer that owns GPU resources. There is
//! no process-wide context: several contexts (for several windows or offscreen targets) may
//! coexist, each with its own resource layer.

use std::sync::Arc;

/// The wgpu rendering context containing all GPU resources needed for rendering.
///
/// This struct is cloneable. It wraps wgpu resources in Arc to allow sharing across the
/// application.
#[derive(Clone)]
pub struct Context {
    /// The wgpu instance used for creating surfaces.
    pub instance: Arc<wgpu::Instance>,
    /// The wgpu device used for creating GPU resources.
    pub device: Arc<wgpu::Device>,
    /// The wgpu queue used for submitting commands.
    pub queue: Arc<wgpu::Queue>,
    /// The wgpu adapter.
    pub adapter: Arc<wgpu::Adapter>,
    /// The preferred texture format for color attachments.
    pub surface_format: wgpu::TextureFormat,
}

impl Context {
    /// Wraps already created wgpu objects.
    ///
    /// # Arguments
    /// * `instance` - The wgpu instance
    /// * `device` - The wgpu device
    /// * `queue` - The wgpu queue
    /// * `adapter` - The wgpu adapter
    /// * `surface_format` - The preferred surface texture format
    pub fn new(
        instance: wgpu::Instance,
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter: wgpu::Adapter,
        surface_format: wgpu::TextureFormat,
    ) -> Context {
        Context {
            instance: Arc::new(instance),
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter: Arc::new(adapter),
            surface_format,
        }
    }

    /// Creates a context without any surface, for offscreen rendering.
    ///
    /// Returns `None` if no adapter or device is available.
    pub async fn headless(surface_format: wgpu::TextureFormat) -> Option<Context> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("primgl device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await
            .ok()?;

        Some(Context::new(
            instance,
            device,
            queue,
            adapter,
            surface_format,
        ))
    }

    /// Blocking version of [`Context::headless`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn headless_blocking(surface_format: wgpu::TextureFormat) -> Option<Context> {
        pollster::block_on(Context::headless(surface_format))
    }

    /// Creates a new buffer initialized with data.
    ///
    /// # Arguments
    /// * `label` - Debug label for the buffer
    /// * `contents` - The data to initialize the buffer with
    /// * `usage` - Buffer usage flags
    pub fn create_buffer_init(
        &self,
        label: Option<&str>,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label,
                contents,
                usage,
            })
    }

    /// Writes data to a buffer.
    ///
    /// # Arguments
    /// * `buffer` - The buffer to write to
    /// * `offset` - Byte offset into the buffer
    /// * `data` - The data to write
    pub fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    /// Creates a new bind group layout.
    pub fn create_bind_group_layout(
        &self,
        desc: &wgpu::BindGroupLayoutDescriptor,
    ) -> wgpu::BindGroupLayout {
        self.device.create_bind_group_layout(desc)
    }

    /// Creates a new bind group.
    pub fn create_bind_group(&self, desc: &wgpu::BindGroupDescriptor) -> wgpu::BindGroup {
        self.device.create_bind_group(desc)
    }

    /// Creates a new pipeline layout.
    pub fn create_pipeline_layout(
        &self,
        desc: &wgpu::PipelineLayoutDescriptor,
    ) -> wgpu::PipelineLayout {
        self.device.create_pipeline_layout(desc)
    }

    /// Creates a new render pipeline.
    pub fn create_render_pipeline(
        &self,
        desc: &wgpu::RenderPipelineDescriptor,
    ) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(desc)
    }

    /// Creates a new shader module from WGSL source.
    ///
    /// # Arguments
    /// * `label` - Debug label for the shader
    /// * `source` - WGSL shader source code
    pub fn create_shader_module(&self, label: Option<&str>, source: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label,
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }

    /// Runs `f` inside a wgpu error scope catching errors of kind `filter`.
    ///
    /// Errors raised by `f` are returned instead of reaching the device's uncaptured error
    /// handler, which panics by default.
    pub fn with_error_scope<R>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce() -> R,
    ) -> (R, Option<wgpu::Error>) {
        self.device.push_error_scope(filter);
        let result = f();
        (result, self.pop_error_scope())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn pop_error_scope(&self) -> Option<wgpu::Error> {
        pollster::block_on(self.device.pop_error_scope())
    }

    // Browsers resolve error scopes asynchronously, so nothing can be reported synchronously.
    #[cfg(target_arch = "wasm32")]
    fn pop_error_scope(&self) -> Option<wgpu::Error> {
        drop(self.device.pop_error_scope());
        None
    }

    /// Gets the depth texture format used for depth attachments.
    pub fn depth_format() -> wgpu::TextureFormat {
        wgpu::TextureFormat::Depth32Float
    }
}
