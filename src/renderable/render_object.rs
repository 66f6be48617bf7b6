use crate::error::{InvalidStateError, RenderableError, ShapeMismatchError};
use crate::render_item::{
    DrawMode, ElementsKind, Program, RenderItem, RenderItemDefs, RenderItemValues,
    ResourceLayer, ValueFlags,
};
use crate::renderable::base::{
    base_changes, base_defines, base_values, consume_base, validate_base, BaseProps,
};
use crate::renderable::{Renderable, RenderableState};
use crate::shader::{compose_shader, DefineSet, ShaderTemplate};
use crate::value_cell::{ValueCell, VersionLog};
use log::{debug, trace};
use std::rc::Rc;

/// The derivation rules of one geometry kind.
///
/// Implemented by zero-sized tags ([`Mesh`](crate::renderable::Mesh),
/// [`Point`](crate::renderable::Point)); [`RenderObject`] runs the shared create/update
/// logic on top of them.
pub trait GeometryKind {
    /// The property bag of this kind.
    type Props: Clone;

    /// Name of the kind, e.g. `"mesh"`.
    const NAME: &'static str;

    /// The shader template of this kind.
    fn template() -> &'static ShaderTemplate;

    /// Primitive topology of this kind.
    fn draw_mode() -> DrawMode;

    /// The common subset of the properties.
    fn base(props: &Self::Props) -> BaseProps<'_>;

    /// Kind-specific shape checks, run after the common ones.
    fn validate(_props: &Self::Props) -> Result<(), ShapeMismatchError> {
        Ok(())
    }

    /// Kind-specific defines, merged over the common ones.
    fn defines(_props: &Self::Props) -> DefineSet {
        DefineSet::new()
    }

    /// Index width, `None` for unindexed kinds.
    fn elements_kind(_props: &Self::Props) -> Option<ElementsKind> {
        None
    }

    /// Number of vertices (or indices) drawn per instance.
    fn draw_count(props: &Self::Props) -> u32;

    /// Index buffer of indexed kinds.
    fn elements(_props: &Self::Props) -> Option<ValueCell<Vec<u32>>> {
        None
    }

    /// Kind-specific value changes between two bags of identical shape, with buffers
    /// compared against the versions in `uploaded`.
    fn changes(_old: &Self::Props, _new: &Self::Props, _uploaded: &VersionLog) -> ValueFlags {
        ValueFlags::empty()
    }

    /// Clears the dirty markers of the kind-specific buffers and records their versions.
    fn consume(_props: &Self::Props, _uploaded: &mut VersionLog) {}
}

struct Shape {
    defines: DefineSet,
    draw_mode: DrawMode,
    elements_kind: Option<ElementsKind>,
}

impl Shape {
    fn matches(&self, defs: &RenderItemDefs) -> bool {
        self.defines == defs.shader.defines
            && self.draw_mode == defs.draw_mode
            && self.elements_kind == defs.elements_kind
    }
}

/// A renderable of geometry kind `K`, backed by one render item.
pub struct RenderObject<K: GeometryKind> {
    layer: Rc<dyn ResourceLayer>,
    item: Option<Box<dyn RenderItem>>,
    props: K::Props,
    defs: RenderItemDefs,
    values: RenderItemValues,
    uploaded: VersionLog,
}

impl<K: GeometryKind> RenderObject<K> {
    /// Creates a renderable from a property bag.
    ///
    /// Fails before touching the resource layer if the bag is inconsistent or if its defines
    /// cannot be satisfied by the kind's shader template.
    pub fn create(
        layer: Rc<dyn ResourceLayer>,
        props: K::Props,
    ) -> Result<RenderObject<K>, RenderableError> {
        Self::validate(&props)?;
        let defs = Self::compose(Self::shape(&props))?;
        let values = Self::derive_values(&props);
        let item = layer.create_render_item(&defs, &values)?;
        let mut uploaded = VersionLog::new();
        Self::consume_all(&props, &mut uploaded);

        debug!(
            "created `{}` renderable {} with program {:?} ({})",
            K::NAME,
            values.base.object_id,
            item.program().id,
            defs.shader.key
        );

        Ok(RenderObject {
            layer,
            item: Some(item),
            props,
            defs,
            values,
            uploaded,
        })
    }

    /// The current property bag.
    #[inline]
    pub fn props(&self) -> &K::Props {
        &self.props
    }

    /// The current shape-level state.
    #[inline]
    pub fn defs(&self) -> &RenderItemDefs {
        &self.defs
    }

    /// The current GPU state.
    #[inline]
    pub fn values(&self) -> &RenderItemValues {
        &self.values
    }

    fn invalid(operation: &'static str) -> InvalidStateError {
        InvalidStateError {
            name: K::NAME,
            operation,
        }
    }

    fn validate(props: &K::Props) -> Result<(), ShapeMismatchError> {
        validate_base(&K::base(props))?;
        K::validate(props)
    }

    fn shape(props: &K::Props) -> Shape {
        let mut defines = base_defines(&K::base(props));
        defines.extend(K::defines(props));
        Shape {
            defines,
            draw_mode: K::draw_mode(),
            elements_kind: K::elements_kind(props),
        }
    }

    fn compose(shape: Shape) -> Result<RenderItemDefs, RenderableError> {
        let shader = compose_shader(K::template(), &shape.defines)?;
        Ok(RenderItemDefs {
            shader,
            draw_mode: shape.draw_mode,
            elements_kind: shape.elements_kind,
        })
    }

    fn derive_values(props: &K::Props) -> RenderItemValues {
        RenderItemValues {
            base: base_values(&K::base(props)),
            draw_count: K::draw_count(props),
            elements: K::elements(props),
        }
    }

    fn consume_all(props: &K::Props, uploaded: &mut VersionLog) {
        uploaded.clear();
        consume_base(&K::base(props), uploaded);
        K::consume(props, uploaded);
    }

    fn rebuild(
        &mut self,
        shape: Shape,
        new_props: &K::Props,
    ) -> Result<(RenderItemDefs, RenderItemValues), RenderableError> {
        let defs = Self::compose(shape)?;
        let values = Self::derive_values(new_props);
        let item = self.layer.create_render_item(&defs, &values)?;

        debug!(
            "rebuilt `{}` renderable {}: {} -> {}",
            K::NAME,
            values.base.object_id,
            self.defs.shader.key,
            defs.shader.key
        );

        if let Some(old) = self.item.replace(item) {
            old.dispose();
        }

        Ok((defs, values))
    }

    fn patch(&mut self, new_props: &K::Props) -> Result<RenderItemValues, RenderableError> {
        let values = Self::derive_values(new_props);
        let mut changed = base_changes(
            &K::base(&self.props),
            &K::base(new_props),
            &self.uploaded,
        );
        changed |= K::changes(&self.props, new_props, &self.uploaded);
        if values.draw_count != self.values.draw_count {
            changed |= ValueFlags::COUNTS;
        }

        if changed.is_empty() {
            trace!("`{}` renderable update without changes", K::NAME);
        } else {
            trace!("patching `{}` renderable: {:?}", K::NAME, changed);
            if let Some(item) = self.item.as_mut() {
                item.update(&values, changed)?;
            }
        }

        Ok(values)
    }
}

impl<K: GeometryKind> Renderable for RenderObject<K> {
    type Props = K::Props;

    fn name(&self) -> &'static str {
        K::NAME
    }

    fn state(&self) -> RenderableState {
        if self.item.is_some() {
            RenderableState::Ready
        } else {
            RenderableState::Disposed
        }
    }

    fn program(&self) -> Result<Rc<Program>, InvalidStateError> {
        self.item
            .as_ref()
            .map(|item| item.program())
            .ok_or_else(|| Self::invalid("program"))
    }

    fn draw(&mut self) -> Result<(), RenderableError> {
        let item = self.item.as_mut().ok_or_else(|| Self::invalid("draw"))?;
        item.draw()?;
        Ok(())
    }

    fn update(&mut self, new_props: K::Props) -> Result<(), RenderableError> {
        if self.item.is_none() {
            return Err(Self::invalid("update").into());
        }

        Self::validate(&new_props)?;

        let old_id = K::base(&self.props).object_id;
        let new_id = K::base(&new_props).object_id;
        if old_id != new_id {
            return Err(ShapeMismatchError::ImmutableField {
                field: "object_id",
                expected: old_id as u64,
                found: new_id as u64,
            }
            .into());
        }

        let shape = Self::shape(&new_props);
        if shape.matches(&self.defs) {
            self.values = self.patch(&new_props)?;
        } else {
            let (defs, values) = self.rebuild(shape, &new_props)?;
            self.defs = defs;
            self.values = values;
        }

        Self::consume_all(&new_props, &mut self.uploaded);
        self.props = new_props;
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), RenderableError> {
        let item = self.item.take().ok_or_else(|| Self::invalid("dispose"))?;
        debug!(
            "disposing `{}` renderable {}",
            K::NAME,
            self.values.base.object_id
        );
        item.dispose();
        Ok(())
    }
}

impl<K: GeometryKind> Drop for RenderObject<K> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            item.dispose();
        }
    }
}
