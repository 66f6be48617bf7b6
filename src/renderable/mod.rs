//! Renderables: caller-facing handles owning one GPU draw object each.
//!
//! A renderable is created by a geometry-kind factory from a typed property bag. It derives
//! a [`RenderItemDefs`](crate::render_item::RenderItemDefs) (shape-level state) and a
//! [`RenderItemValues`](crate::render_item::RenderItemValues) (buffers and counts) from the
//! bag, and asks a [`ResourceLayer`](crate::render_item::ResourceLayer) for a render item.
//!
//! On [`Renderable::update`], a change of the defines rebuilds the render item, while a
//! change of the values only is patched into the existing one.

pub use self::any::{AnyRenderable, GeometryProps};
pub use self::color_data::{ColorSource, ColorType};
pub use self::mesh::{Mesh, MeshProps, MeshRenderable};
pub use self::point::{Point, PointProps, PointRenderable};
pub use self::render_object::{GeometryKind, RenderObject};

mod any;
pub mod base;
mod color_data;
mod mesh;
mod point;
mod render_object;

use crate::error::{InvalidStateError, RenderableError};
use crate::render_item::Program;
use std::rc::Rc;

/// Lifecycle state of a renderable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderableState {
    /// Backed by a live render item.
    Ready,
    /// Disposed; every further operation fails.
    Disposed,
}

/// The contract every geometry kind satisfies.
pub trait Renderable {
    /// The property bag of this geometry kind.
    type Props;

    /// Name of the geometry kind, e.g. `"mesh"`.
    fn name(&self) -> &'static str;

    /// Current lifecycle state.
    fn state(&self) -> RenderableState;

    /// The program currently bound to the render item.
    ///
    /// This reads through to the render item, so a rebuild is observed as a new program.
    fn program(&self) -> Result<Rc<Program>, InvalidStateError>;

    /// Issues one draw call with the current state.
    fn draw(&mut self) -> Result<(), RenderableError>;

    /// Replaces the property bag.
    ///
    /// A shape change rebuilds the render item; a content change is patched in place.
    /// On error nothing is modified.
    fn update(&mut self, new_props: Self::Props) -> Result<(), RenderableError>;

    /// Releases the render item. Calling it twice is an error.
    fn dispose(&mut self) -> Result<(), RenderableError>;
}
