//! A resource layer that records what it is asked to do instead of talking to a GPU.
//!
//! Used to run renderables without a device, and to observe which programs, uploads and
//! draws a sequence of operations produces.

use crate::error::ResourceError;
use crate::render_item::{
    DrawMode, ElementsKind, Program, ProgramId, RenderItem, RenderItemDefs, RenderItemValues,
    ResourceLayer, ValueFlags,
};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

// Value flags that correspond to one buffer upload each.
const BUFFER_FLAGS: ValueFlags = ValueFlags::POSITION
    .union(ValueFlags::NORMAL)
    .union(ValueFlags::ID)
    .union(ValueFlags::TRANSFORM)
    .union(ValueFlags::COLOR)
    .union(ValueFlags::ELEMENTS);

/// Counters of a [`HeadlessResourceLayer`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Programs compiled, i.e. cache misses.
    pub programs_compiled: usize,
    /// Render items created.
    pub items_created: usize,
    /// Render items disposed.
    pub items_disposed: usize,
    /// Calls to [`RenderItem::update`].
    pub updates: usize,
    /// Buffers uploaded, at creation or by an update.
    pub uploads: usize,
    /// Draws issued.
    pub draw_calls: usize,
}

/// One recorded draw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    /// Program used.
    pub program: ProgramId,
    /// Picking identity of the drawn renderable.
    pub object_id: u32,
    /// Primitive topology.
    pub draw_mode: DrawMode,
    /// Index width, `None` for unindexed draws.
    pub elements_kind: Option<ElementsKind>,
    /// Vertices (or indices) per instance.
    pub draw_count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// The object color uniform.
    pub color: [f32; 4],
}

struct State {
    alive: Cell<bool>,
    fail_next_allocation: Cell<bool>,
    fail_next_compilation: Cell<bool>,
    programs: RefCell<HashMap<String, Rc<Program>>>,
    next_program_id: Cell<u32>,
    stats: RefCell<HeadlessStats>,
    draws: RefCell<Vec<DrawCall>>,
    updates: RefCell<Vec<(u32, ValueFlags)>>,
    live_items: Cell<usize>,
}

impl State {
    fn check_alive(&self) -> Result<(), ResourceError> {
        if self.alive.get() {
            Ok(())
        } else {
            Err(ResourceError::ContextDestroyed)
        }
    }
}

/// Resource layer without a GPU.
///
/// Cloning yields another handle on the same recorded state.
#[derive(Clone)]
pub struct HeadlessResourceLayer {
    state: Rc<State>,
}

impl Default for HeadlessResourceLayer {
    fn default() -> Self {
        HeadlessResourceLayer::new()
    }
}

impl HeadlessResourceLayer {
    /// Creates an empty layer.
    pub fn new() -> HeadlessResourceLayer {
        HeadlessResourceLayer {
            state: Rc::new(State {
                alive: Cell::new(true),
                fail_next_allocation: Cell::new(false),
                fail_next_compilation: Cell::new(false),
                programs: RefCell::new(HashMap::new()),
                next_program_id: Cell::new(0),
                stats: RefCell::new(HeadlessStats::default()),
                draws: RefCell::new(Vec::new()),
                updates: RefCell::new(Vec::new()),
                live_items: Cell::new(0),
            }),
        }
    }

    /// A snapshot of the counters.
    pub fn stats(&self) -> HeadlessStats {
        self.state.stats.borrow().clone()
    }

    /// The draws recorded so far.
    pub fn draws(&self) -> Vec<DrawCall> {
        self.state.draws.borrow().clone()
    }

    /// The `(object_id, changed)` pairs of every update so far.
    pub fn updates(&self) -> Vec<(u32, ValueFlags)> {
        self.state.updates.borrow().clone()
    }

    /// Number of render items created and not yet disposed.
    pub fn live_items(&self) -> usize {
        self.state.live_items.get()
    }

    /// Number of cached programs.
    pub fn program_count(&self) -> usize {
        self.state.programs.borrow().len()
    }

    /// Makes the next [`ResourceLayer::create_render_item`] fail with an allocation error.
    pub fn fail_next_allocation(&self) {
        self.state.fail_next_allocation.set(true);
    }

    /// Makes the next program compilation fail. Cached programs are not affected.
    pub fn fail_next_compilation(&self) {
        self.state.fail_next_compilation.set(true);
    }

    /// Returns `false` once [`HeadlessResourceLayer::destroy`] was called.
    pub fn is_alive(&self) -> bool {
        self.state.alive.get()
    }

    /// Simulates a lost context. Every later operation fails with
    /// [`ResourceError::ContextDestroyed`].
    pub fn destroy(&self) {
        debug!("destroying headless resource layer");
        self.state.alive.set(false);
        self.state.programs.borrow_mut().clear();
    }

    /// Drops cached programs no render item uses anymore.
    pub fn release_unused_programs(&self) {
        self.state
            .programs
            .borrow_mut()
            .retain(|_, program| Rc::strong_count(program) > 1);
    }

    fn program(&self, defs: &RenderItemDefs) -> Result<Rc<Program>, ResourceError> {
        let key = format!("{}|{:?}", defs.shader.key, defs.draw_mode);
        if let Some(program) = self.state.programs.borrow().get(&key) {
            return Ok(program.clone());
        }

        if self.state.fail_next_compilation.replace(false) {
            return Err(ResourceError::Compilation {
                label: defs.shader.key.clone(),
                details: "injected failure".to_string(),
            });
        }

        let id = ProgramId(self.state.next_program_id.get());
        self.state.next_program_id.set(id.0 + 1);
        self.state.stats.borrow_mut().programs_compiled += 1;
        debug!("compiling program {:?}: {}", id, defs.shader.key);

        let program = Rc::new(Program {
            id,
            key: defs.shader.key.clone(),
        });
        let _ = self
            .state
            .programs
            .borrow_mut()
            .insert(key, program.clone());
        Ok(program)
    }
}

fn initial_uploads(values: &RenderItemValues) -> usize {
    // position, id and transform are always present.
    3 + values.base.normal.is_some() as usize
        + values.base.color.cell().is_some() as usize
        + values.elements.is_some() as usize
}

impl ResourceLayer for HeadlessResourceLayer {
    fn create_render_item(
        &self,
        defs: &RenderItemDefs,
        values: &RenderItemValues,
    ) -> Result<Box<dyn RenderItem>, ResourceError> {
        self.state.check_alive()?;

        if self.state.fail_next_allocation.replace(false) {
            return Err(ResourceError::Allocation {
                label: defs.shader.key.clone(),
                details: "injected failure".to_string(),
            });
        }

        let program = self.program(defs)?;
        {
            let mut stats = self.state.stats.borrow_mut();
            stats.items_created += 1;
            stats.uploads += initial_uploads(values);
        }
        self.state.live_items.set(self.state.live_items.get() + 1);

        Ok(Box::new(HeadlessRenderItem {
            state: self.state.clone(),
            program,
            draw_mode: defs.draw_mode,
            elements_kind: defs.elements_kind,
            object_id: values.base.object_id,
            draw_count: values.draw_count,
            instance_count: values.base.instance_count,
            color: crate::color::to_array(values.base.color.uniform()),
        }))
    }
}

struct HeadlessRenderItem {
    state: Rc<State>,
    program: Rc<Program>,
    draw_mode: DrawMode,
    elements_kind: Option<ElementsKind>,
    object_id: u32,
    draw_count: u32,
    instance_count: u32,
    color: [f32; 4],
}

impl RenderItem for HeadlessRenderItem {
    fn program(&self) -> Rc<Program> {
        self.program.clone()
    }

    fn draw(&mut self) -> Result<(), ResourceError> {
        self.state.check_alive()?;
        self.state.stats.borrow_mut().draw_calls += 1;
        self.state.draws.borrow_mut().push(DrawCall {
            program: self.program.id,
            object_id: self.object_id,
            draw_mode: self.draw_mode,
            elements_kind: self.elements_kind,
            draw_count: self.draw_count,
            instance_count: self.instance_count,
            color: self.color,
        });
        Ok(())
    }

    fn update(
        &mut self,
        values: &RenderItemValues,
        changed: ValueFlags,
    ) -> Result<(), ResourceError> {
        self.state.check_alive()?;
        trace!("headless update of {}: {:?}", self.object_id, changed);

        if changed.contains(ValueFlags::UNIFORMS) {
            self.color = crate::color::to_array(values.base.color.uniform());
        }
        if changed.contains(ValueFlags::COUNTS) {
            self.draw_count = values.draw_count;
            self.instance_count = values.base.instance_count;
        }

        {
            let mut stats = self.state.stats.borrow_mut();
            stats.updates += 1;
            stats.uploads += changed.intersection(BUFFER_FLAGS).iter().count();
        }
        self.state
            .updates
            .borrow_mut()
            .push((self.object_id, changed));
        Ok(())
    }

    fn dispose(self: Box<Self>) {
        self.state.stats.borrow_mut().items_disposed += 1;
        self.state.live_items.set(self.state.live_items.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use crate::render_item::BaseValues;
    use crate::renderable::ColorSource;
    use crate::shader::{compose_shader, DefineSet, COLOR_TYPE, POINT_TEMPLATE};
    use crate::value_cell::ValueCell;

    fn defs() -> RenderItemDefs {
        let mut defines = DefineSet::new();
        defines.set_variant(COLOR_TYPE, "uniform");
        RenderItemDefs {
            shader: compose_shader(&POINT_TEMPLATE, &defines).unwrap(),
            draw_mode: DrawMode::Points,
            elements_kind: None,
        }
    }

    fn values(object_id: u32) -> RenderItemValues {
        RenderItemValues {
            base: BaseValues {
                object_id,
                instance_count: 1,
                element_count: 1,
                position_count: 1,
                position: ValueCell::new(vec![0.0; 3]),
                normal: None,
                id: ValueCell::new(vec![0.0]),
                transform: ValueCell::new(vec![0.0; 16]),
                color: ColorSource::Uniform(color::RED),
            },
            draw_count: 1,
            elements: None,
        }
    }

    #[test]
    fn programs_are_cached_by_key() {
        let layer = HeadlessResourceLayer::new();
        let a = layer.create_render_item(&defs(), &values(1)).unwrap();
        let b = layer.create_render_item(&defs(), &values(2)).unwrap();

        assert!(Rc::ptr_eq(&a.program(), &b.program()));
        assert_eq!(layer.stats().programs_compiled, 1);
        assert_eq!(layer.stats().uploads, 6);
        assert_eq!(layer.live_items(), 2);
    }

    #[test]
    fn unused_programs_are_released() {
        let layer = HeadlessResourceLayer::new();
        let item = layer.create_render_item(&defs(), &values(1)).unwrap();

        layer.release_unused_programs();
        assert_eq!(layer.program_count(), 1);

        item.dispose();
        layer.release_unused_programs();
        assert_eq!(layer.program_count(), 0);
        assert_eq!(layer.live_items(), 0);
    }

    #[test]
    fn injected_failure_hits_one_allocation() {
        let layer = HeadlessResourceLayer::new();
        layer.fail_next_allocation();

        assert!(matches!(
            layer.create_render_item(&defs(), &values(1)),
            Err(ResourceError::Allocation { .. })
        ));
        assert!(layer.create_render_item(&defs(), &values(1)).is_ok());
        assert_eq!(layer.stats().items_created, 1);
    }

    #[test]
    fn injected_compilation_failure_skips_the_cache() {
        let layer = HeadlessResourceLayer::new();
        layer.fail_next_compilation();

        assert!(matches!(
            layer.create_render_item(&defs(), &values(1)),
            Err(ResourceError::Compilation { .. })
        ));
        assert_eq!(layer.program_count(), 0);
        assert_eq!(layer.stats().programs_compiled, 0);

        let item = layer.create_render_item(&defs(), &values(1)).unwrap();
        layer.fail_next_compilation();
        assert!(layer.create_render_item(&defs(), &values(2)).is_ok());
        assert_eq!(item.program().id, ProgramId(0));
    }

    #[test]
    fn destroyed_layer_rejects_everything() {
        let layer = HeadlessResourceLayer::new();
        let mut item = layer.create_render_item(&defs(), &values(1)).unwrap();
        layer.destroy();

        assert_eq!(item.draw().unwrap_err(), ResourceError::ContextDestroyed);
        assert_eq!(
            item.update(&values(1), ValueFlags::POSITION).unwrap_err(),
            ResourceError::ContextDestroyed
        );
        assert!(matches!(
            layer.create_render_item(&defs(), &values(2)),
            Err(ResourceError::ContextDestroyed)
        ));
        assert!(!layer.is_alive());
    }

    #[test]
    fn updates_count_buffer_uploads() {
        let layer = HeadlessResourceLayer::new();
        let mut item = layer.create_render_item(&defs(), &values(7)).unwrap();
        let before = layer.stats().uploads;

        item.update(
            &values(7),
            ValueFlags::POSITION | ValueFlags::ID | ValueFlags::UNIFORMS,
        )
        .unwrap();

        assert_eq!(layer.stats().uploads, before + 2);
        assert_eq!(
            layer.updates(),
            vec![(7, ValueFlags::POSITION | ValueFlags::ID | ValueFlags::UNIFORMS)]
        );
    }
}
