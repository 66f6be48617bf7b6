//! Indexed triangle meshes.

use crate::error::ShapeMismatchError;
use crate::render_item::{DrawMode, ElementsKind, ValueFlags};
use crate::renderable::base::BaseProps;
use crate::renderable::{ColorSource, GeometryKind, RenderObject};
use crate::shader::{ShaderTemplate, MESH_TEMPLATE};
use crate::value_cell::{ValueCell, VersionLog};

/// Number of indices of one triangle.
pub const VERTICES_PER_TRIANGLE: usize = 3;

/// Property bag of a mesh.
#[derive(Clone, Debug)]
pub struct MeshProps {
    /// Picking identity. Must not change over the renderable's lifetime.
    pub object_id: u32,

    /// Flat xyz positions.
    pub position: ValueCell<Vec<f32>>,
    /// Flat xyz normals. Meshes without normals are drawn unshaded.
    pub normal: Option<ValueCell<Vec<f32>>>,
    /// One element id per position.
    pub id: ValueCell<Vec<f32>>,

    /// Color source.
    pub color: ColorSource,
    /// Column-major 4x4 matrices, one per instance.
    pub transform: ValueCell<Vec<f32>>,
    /// Three position indices per triangle.
    pub index: ValueCell<Vec<u32>>,

    /// Number of triangles.
    pub index_count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// Number of elements of one instance.
    pub element_count: u32,
    /// Number of positions.
    pub position_count: u32,
}

/// The mesh geometry kind.
#[derive(Clone, Copy, Debug)]
pub struct Mesh;

/// A mesh renderable.
pub type MeshRenderable = RenderObject<Mesh>;

impl GeometryKind for Mesh {
    type Props = MeshProps;

    const NAME: &'static str = "mesh";

    fn template() -> &'static ShaderTemplate {
        &MESH_TEMPLATE
    }

    fn draw_mode() -> DrawMode {
        DrawMode::Triangles
    }

    fn base(props: &MeshProps) -> BaseProps<'_> {
        BaseProps {
            object_id: props.object_id,
            position: &props.position,
            normal: props.normal.as_ref(),
            id: &props.id,
            color: &props.color,
            transform: &props.transform,
            instance_count: props.instance_count,
            element_count: props.element_count,
            position_count: props.position_count,
        }
    }

    fn validate(props: &MeshProps) -> Result<(), ShapeMismatchError> {
        let len = props.index.len();
        if len % VERTICES_PER_TRIANGLE != 0 {
            return Err(ShapeMismatchError::NotMultiple {
                field: "index",
                len,
                multiple: VERTICES_PER_TRIANGLE,
            });
        }

        let expected = props.index_count as usize * VERTICES_PER_TRIANGLE;
        if len != expected {
            return Err(ShapeMismatchError::BufferLength {
                field: "index",
                expected,
                found: len,
            });
        }

        Ok(())
    }

    fn elements_kind(_: &MeshProps) -> Option<ElementsKind> {
        Some(ElementsKind::Uint32)
    }

    fn draw_count(props: &MeshProps) -> u32 {
        props.index_count * VERTICES_PER_TRIANGLE as u32
    }

    fn elements(props: &MeshProps) -> Option<ValueCell<Vec<u32>>> {
        Some(props.index.clone())
    }

    fn changes(_old: &MeshProps, new: &MeshProps, uploaded: &VersionLog) -> ValueFlags {
        if uploaded.is_stale(&new.index) {
            ValueFlags::ELEMENTS
        } else {
            ValueFlags::empty()
        }
    }

    fn consume(props: &MeshProps, uploaded: &mut VersionLog) {
        let _ = props.index.consume();
        uploaded.record(&props.index);
    }
}
