use crate::error::{InvalidStateError, RenderableError};
use crate::render_item::{Program, RenderItemDefs, RenderItemValues, ResourceLayer};
use crate::renderable::{
    GeometryKind, Mesh, MeshProps, MeshRenderable, Point, PointProps, PointRenderable,
    Renderable, RenderableState,
};
use std::rc::Rc;

/// A property bag of any geometry kind.
#[derive(Clone, Debug)]
pub enum GeometryProps {
    /// Properties of a mesh.
    Mesh(MeshProps),
    /// Properties of a point cloud.
    Point(PointProps),
}

impl GeometryProps {
    /// Name of the geometry kind of these properties.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GeometryProps::Mesh(_) => Mesh::NAME,
            GeometryProps::Point(_) => Point::NAME,
        }
    }
}

impl From<MeshProps> for GeometryProps {
    fn from(props: MeshProps) -> Self {
        GeometryProps::Mesh(props)
    }
}

impl From<PointProps> for GeometryProps {
    fn from(props: PointProps) -> Self {
        GeometryProps::Point(props)
    }
}

/// A renderable of any geometry kind.
///
/// The kind is selected once, when the renderable is created; every later call is a plain
/// match over this closed set.
pub enum AnyRenderable {
    /// A mesh renderable.
    Mesh(MeshRenderable),
    /// A point renderable.
    Point(PointRenderable),
}

impl AnyRenderable {
    /// Creates a renderable with the factory of the kind of `props`.
    pub fn create(
        layer: Rc<dyn ResourceLayer>,
        props: impl Into<GeometryProps>,
    ) -> Result<AnyRenderable, RenderableError> {
        match props.into() {
            GeometryProps::Mesh(props) => Ok(AnyRenderable::Mesh(MeshRenderable::create(
                layer, props,
            )?)),
            GeometryProps::Point(props) => Ok(AnyRenderable::Point(PointRenderable::create(
                layer, props,
            )?)),
        }
    }

    /// The current shape-level state.
    pub fn defs(&self) -> &RenderItemDefs {
        match self {
            AnyRenderable::Mesh(r) => r.defs(),
            AnyRenderable::Point(r) => r.defs(),
        }
    }

    /// The current GPU state.
    pub fn values(&self) -> &RenderItemValues {
        match self {
            AnyRenderable::Mesh(r) => r.values(),
            AnyRenderable::Point(r) => r.values(),
        }
    }
}

impl Renderable for AnyRenderable {
    type Props = GeometryProps;

    fn name(&self) -> &'static str {
        match self {
            AnyRenderable::Mesh(r) => r.name(),
            AnyRenderable::Point(r) => r.name(),
        }
    }

    fn state(&self) -> RenderableState {
        match self {
            AnyRenderable::Mesh(r) => r.state(),
            AnyRenderable::Point(r) => r.state(),
        }
    }

    fn program(&self) -> Result<Rc<Program>, InvalidStateError> {
        match self {
            AnyRenderable::Mesh(r) => r.program(),
            AnyRenderable::Point(r) => r.program(),
        }
    }

    fn draw(&mut self) -> Result<(), RenderableError> {
        match self {
            AnyRenderable::Mesh(r) => r.draw(),
            AnyRenderable::Point(r) => r.draw(),
        }
    }

    fn update(&mut self, new_props: GeometryProps) -> Result<(), RenderableError> {
        match (self, new_props) {
            (AnyRenderable::Mesh(r), GeometryProps::Mesh(props)) => r.update(props),
            (AnyRenderable::Point(r), GeometryProps::Point(props)) => r.update(props),
            (this, _) if this.state() == RenderableState::Disposed => Err(InvalidStateError {
                name: this.name(),
                operation: "update",
            }
            .into()),
            (this, props) => Err(RenderableError::KindMismatch {
                expected: this.name(),
                found: props.kind_name(),
            }),
        }
    }

    fn dispose(&mut self) -> Result<(), RenderableError> {
        match self {
            AnyRenderable::Mesh(r) => r.dispose(),
            AnyRenderable::Point(r) => r.dispose(),
        }
    }
}
