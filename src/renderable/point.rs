//! Unindexed point clouds.

use crate::render_item::DrawMode;
use crate::renderable::base::BaseProps;
use crate::renderable::{ColorSource, GeometryKind, RenderObject};
use crate::shader::{ShaderTemplate, POINT_TEMPLATE};
use crate::value_cell::ValueCell;

/// Property bag of a point cloud.
#[derive(Clone, Debug)]
pub struct PointProps {
    /// Picking identity. Must not change over the renderable's lifetime.
    pub object_id: u32,

    /// Flat xyz positions.
    pub position: ValueCell<Vec<f32>>,
    /// One element id per position.
    pub id: ValueCell<Vec<f32>>,

    /// Color source.
    pub color: ColorSource,
    /// Column-major 4x4 matrices, one per instance.
    pub transform: ValueCell<Vec<f32>>,

    /// Number of instances.
    pub instance_count: u32,
    /// Number of elements of one instance.
    pub element_count: u32,
    /// Number of positions, one point each.
    pub position_count: u32,
}

/// The point geometry kind.
#[derive(Clone, Copy, Debug)]
pub struct Point;

/// A point renderable.
pub type PointRenderable = RenderObject<Point>;

impl GeometryKind for Point {
    type Props = PointProps;

    const NAME: &'static str = "point";

    fn template() -> &'static ShaderTemplate {
        &POINT_TEMPLATE
    }

    fn draw_mode() -> DrawMode {
        DrawMode::Points
    }

    fn base(props: &PointProps) -> BaseProps<'_> {
        BaseProps {
            object_id: props.object_id,
            position: &props.position,
            normal: None,
            id: &props.id,
            color: &props.color,
            transform: &props.transform,
            instance_count: props.instance_count,
            element_count: props.element_count,
            position_count: props.position_count,
        }
    }

    fn draw_count(props: &PointProps) -> u32 {
        props.position_count
    }
}
