/*!
# primgl

Renderable primitives with change-tracked GPU state.

A renderable (a triangle [`Mesh`](renderable::Mesh) or a [`Point`](renderable::Point) cloud)
is created from a typed property bag. Buffers in the bag are wrapped in
[`ValueCell`](value_cell::ValueCell)s, which remember whether their content changed since the
last upload. From the bag, the renderable derives:

* the **defines** selecting its shader variant (color source, presence of normals),
* the **values** pushed to the GPU (buffers, counts, uniforms).

Updating a renderable with a new bag compares the two. When the defines differ, the GPU
draw object is rebuilt with a freshly composed shader. When only values differ, the changed
buffers are rewritten in place and the compiled program is kept.

```no_run
use primgl::prelude::*;

let layer = Rc::new(HeadlessResourceLayer::new());
let positions = ValueCell::new(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

let mut points = PointRenderable::create(
    layer.clone(),
    PointProps {
        object_id: 0,
        position: positions.clone(),
        id: ValueCell::new(vec![0.0, 1.0]),
        color: ColorSource::Uniform(RED),
        transform: ValueCell::new(flatten_transforms(&[Mat4::IDENTITY])),
        instance_count: 1,
        element_count: 2,
        position_count: 2,
    },
)
.unwrap();

// Content change: patched in place, same program.
positions.write(vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
let props = points.props().clone();
points.update(props).unwrap();
points.draw().unwrap();
```

GPU resources are owned by a [`ResourceLayer`](render_item::ResourceLayer).
[`WgpuResourceLayer`](render_item::WgpuResourceLayer) renders with wgpu, while
[`HeadlessResourceLayer`](render_item::HeadlessResourceLayer) only records what it is asked
to do.
*/

#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

#[macro_use]
extern crate bitflags;

pub use glamx;

#[cfg(not(target_arch = "wasm32"))]
#[doc(hidden)]
pub use pollster;

pub mod color;
pub mod context;
pub mod error;
pub mod render_item;
pub mod renderable;
pub mod shader;
pub mod value_cell;

/// Commonly used types.
pub mod prelude {
    pub use crate::color::*;
    pub use crate::context::*;
    pub use crate::error::*;
    pub use crate::render_item::{
        DrawMode, ElementsKind, HeadlessResourceLayer, Program, RenderItemDefs,
        RenderItemValues, RenderSettings, ResourceLayer, ValueFlags, WgpuResourceLayer,
    };
    pub use crate::renderable::base::flatten_transforms;
    pub use crate::renderable::*;
    pub use crate::value_cell::ValueCell;
    pub use glamx::{Mat4, Quat, Vec3};
    pub use std::rc::Rc;
}
