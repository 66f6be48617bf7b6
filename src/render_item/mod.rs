//! Boundary with the layer that owns GPU resources.
//!
//! Renderables never allocate GPU memory themselves. They describe what they need with a
//! [`RenderItemDefs`] (shape-level state: shader variant, draw mode, index width) and a
//! [`RenderItemValues`] (buffer references and counts), and a [`ResourceLayer`] turns that
//! pair into a [`RenderItem`].

pub use self::gpu_buffer::GpuBuffer;
pub use self::headless::{DrawCall, HeadlessResourceLayer, HeadlessStats};
pub use self::wgpu_layer::{RenderSettings, WgpuResourceLayer};

mod gpu_buffer;
pub mod headless;
pub mod wgpu_layer;

use crate::error::ResourceError;
use crate::renderable::ColorSource;
use crate::shader::ShaderCode;
use crate::value_cell::ValueCell;
use std::rc::Rc;

/// Primitive topology of a render item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrawMode {
    /// One point per vertex.
    Points,
    /// Independent triangles, three vertices each.
    Triangles,
}

impl DrawMode {
    /// The matching wgpu topology.
    #[inline]
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            DrawMode::Points => wgpu::PrimitiveTopology::PointList,
            DrawMode::Triangles => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// Width of the indices of an indexed render item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementsKind {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl ElementsKind {
    /// Name of the index width, e.g. `"uint32"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementsKind::Uint16 => "uint16",
            ElementsKind::Uint32 => "uint32",
        }
    }

    /// The matching wgpu index format.
    #[inline]
    pub fn to_wgpu(self) -> wgpu::IndexFormat {
        match self {
            ElementsKind::Uint16 => wgpu::IndexFormat::Uint16,
            ElementsKind::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// Shape-level state of a render item.
///
/// Any change here requires a new render item: a new shader variant, a new topology or a
/// new index layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderItemDefs {
    /// The composed shader variant.
    pub shader: ShaderCode,
    /// Primitive topology.
    pub draw_mode: DrawMode,
    /// Index width, `None` for unindexed geometry.
    pub elements_kind: Option<ElementsKind>,
}

/// GPU state shared by all geometry kinds.
///
/// Buffers are held as [`ValueCell`] references, never copied.
#[derive(Clone, Debug)]
pub struct BaseValues {
    /// Picking identity of the renderable.
    pub object_id: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Number of elements (groups) of one instance.
    pub element_count: u32,
    /// Number of positions.
    pub position_count: u32,
    /// Flat xyz positions.
    pub position: ValueCell<Vec<f32>>,
    /// Flat xyz normals.
    pub normal: Option<ValueCell<Vec<f32>>>,
    /// One element id per position.
    pub id: ValueCell<Vec<f32>>,
    /// Column-major 4x4 matrices, one per instance.
    pub transform: ValueCell<Vec<f32>>,
    /// Color source.
    pub color: ColorSource,
}

/// GPU state of a render item: the base values plus the kind-specific ones.
#[derive(Clone, Debug)]
pub struct RenderItemValues {
    /// Values common to all geometry kinds.
    pub base: BaseValues,
    /// Number of vertices (or indices, for indexed geometry) per instance.
    pub draw_count: u32,
    /// Index buffer of indexed geometry.
    pub elements: Option<ValueCell<Vec<u32>>>,
}

bitflags! {
    /// Parts of a [`RenderItemValues`] that must be pushed to the GPU.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ValueFlags: u32 {
        /// The position buffer.
        const POSITION = 1 << 0;
        /// The normal buffer.
        const NORMAL = 1 << 1;
        /// The element id buffer.
        const ID = 1 << 2;
        /// The instance transform buffer.
        const TRANSFORM = 1 << 3;
        /// The color buffer.
        const COLOR = 1 << 4;
        /// The index buffer.
        const ELEMENTS = 1 << 5;
        /// Object uniforms (uniform color, object id, counts).
        const UNIFORMS = 1 << 6;
        /// Draw and instance counts.
        const COUNTS = 1 << 7;
    }
}

/// Identifier of a compiled program, unique within one resource layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// A compiled shader variant, shared by every render item using the same variant.
#[derive(Debug)]
pub struct Program {
    /// Identifier of the program.
    pub id: ProgramId,
    /// The shader variant key it was compiled from.
    pub key: String,
}

/// A GPU draw object: buffers plus a compiled program.
///
/// A render item is exclusively owned by one renderable.
pub trait RenderItem {
    /// The program currently used by this item.
    fn program(&self) -> Rc<Program>;

    /// Issues a draw with the current state.
    fn draw(&mut self) -> Result<(), ResourceError>;

    /// Pushes the parts of `values` selected by `changed` into the existing GPU resources.
    ///
    /// Never recompiles; may grow a buffer whose new content does not fit.
    fn update(&mut self, values: &RenderItemValues, changed: ValueFlags)
        -> Result<(), ResourceError>;

    /// Releases the GPU resources of this item.
    fn dispose(self: Box<Self>);
}

/// Creates render items on one rendering context.
pub trait ResourceLayer {
    /// Allocates the buffers and selects (or compiles) the program described by
    /// `defs` and `values`.
    fn create_render_item(
        &self,
        defs: &RenderItemDefs,
        values: &RenderItemValues,
    ) -> Result<Box<dyn RenderItem>, ResourceError>;
}

/// Flattens the rgb data of a color source; empty for uniform colors.
pub(crate) fn color_data(color: &ColorSource) -> Vec<f32> {
    color
        .cell()
        .map(|cell| cell.read().clone())
        .unwrap_or_default()
}
