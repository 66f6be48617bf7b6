//! Properties shared by every geometry kind.
//!
//! [`base_defines`] and [`base_values`] only look at which optional properties are present,
//! at buffer lengths and at declared counts. They never read buffer contents, so defines
//! only change when the shape of a property bag changes.

use crate::error::ShapeMismatchError;
use crate::render_item::{BaseValues, ValueFlags};
use crate::renderable::ColorSource;
use crate::shader::{DefineSet, COLOR_TYPE, NORMAL};
use crate::value_cell::{ValueCell, VersionLog};
use glamx::Mat4;

/// Number of floats of one position or normal.
pub const POSITION_COMPONENTS: usize = 3;
/// Number of floats of one instance transform.
pub const TRANSFORM_COMPONENTS: usize = 16;
/// Number of floats of one color.
pub const COLOR_COMPONENTS: usize = 3;

/// A borrowed view of the properties common to all geometry kinds.
#[derive(Clone, Copy, Debug)]
pub struct BaseProps<'a> {
    /// Picking identity.
    pub object_id: u32,
    /// Flat xyz positions.
    pub position: &'a ValueCell<Vec<f32>>,
    /// Flat xyz normals, for shaded kinds.
    pub normal: Option<&'a ValueCell<Vec<f32>>>,
    /// One element id per position.
    pub id: &'a ValueCell<Vec<f32>>,
    /// Color source.
    pub color: &'a ColorSource,
    /// Column-major 4x4 matrices, one per instance.
    pub transform: &'a ValueCell<Vec<f32>>,
    /// Number of instances.
    pub instance_count: u32,
    /// Number of elements of one instance.
    pub element_count: u32,
    /// Number of positions.
    pub position_count: u32,
}

fn check_len(field: &'static str, found: usize, expected: usize) -> Result<(), ShapeMismatchError> {
    if found == expected {
        Ok(())
    } else {
        Err(ShapeMismatchError::BufferLength {
            field,
            expected,
            found,
        })
    }
}

/// Checks buffer lengths against the declared counts.
pub fn validate_base(props: &BaseProps) -> Result<(), ShapeMismatchError> {
    let positions = props.position_count as usize;
    let instances = props.instance_count as usize;
    let elements = props.element_count as usize;

    check_len(
        "position",
        props.position.len(),
        positions * POSITION_COMPONENTS,
    )?;
    if let Some(normal) = props.normal {
        check_len("normal", normal.len(), positions * POSITION_COMPONENTS)?;
    }
    check_len("id", props.id.len(), positions)?;
    check_len(
        "transform",
        props.transform.len(),
        instances * TRANSFORM_COMPONENTS,
    )?;

    if let (Some(cell), Some(colors)) = (
        props.color.cell(),
        props.color.expected_colors(positions, instances, elements),
    ) {
        check_len("color", cell.len(), colors * COLOR_COMPONENTS)?;
    }

    Ok(())
}

/// Shader defines driven by the shape of the common properties.
pub fn base_defines(props: &BaseProps) -> DefineSet {
    let mut defines = DefineSet::new();
    defines.set_variant(COLOR_TYPE, props.color.color_type().define());
    if props.normal.is_some() {
        defines.set_flag(NORMAL, true);
    }
    defines
}

/// GPU state common to all geometry kinds.
pub fn base_values(props: &BaseProps) -> BaseValues {
    BaseValues {
        object_id: props.object_id,
        instance_count: props.instance_count,
        element_count: props.element_count,
        position_count: props.position_count,
        position: props.position.clone(),
        normal: props.normal.cloned(),
        id: props.id.clone(),
        transform: props.transform.clone(),
        color: props.color.clone(),
    }
}

/// Collects the value changes between two bags of identical shape.
///
/// Buffers are compared against the versions in `uploaded`, so a cell replaced by another
/// one, or written since it was last uploaded, counts as changed.
pub(crate) fn base_changes(old: &BaseProps, new: &BaseProps, uploaded: &VersionLog) -> ValueFlags {
    let mut changed = ValueFlags::empty();

    if uploaded.is_stale(new.position) {
        changed |= ValueFlags::POSITION;
    }
    if let Some(normal) = new.normal {
        if uploaded.is_stale(normal) {
            changed |= ValueFlags::NORMAL;
        }
    }
    if uploaded.is_stale(new.id) {
        changed |= ValueFlags::ID;
    }
    if uploaded.is_stale(new.transform) {
        changed |= ValueFlags::TRANSFORM;
    }

    match new.color.cell() {
        Some(cell) => {
            if uploaded.is_stale(cell) {
                changed |= ValueFlags::COLOR;
            }
        }
        None => {
            if old.color.uniform() != new.color.uniform() {
                changed |= ValueFlags::UNIFORMS;
            }
        }
    }

    if old.instance_count != new.instance_count || old.element_count != new.element_count {
        changed |= ValueFlags::UNIFORMS | ValueFlags::COUNTS;
    }
    if old.position_count != new.position_count {
        changed |= ValueFlags::COUNTS;
    }

    changed
}

/// Clears the dirty markers of every buffer of `props` and records their versions.
pub(crate) fn consume_base(props: &BaseProps, uploaded: &mut VersionLog) {
    let _ = props.position.consume();
    uploaded.record(props.position);
    if let Some(normal) = props.normal {
        let _ = normal.consume();
        uploaded.record(normal);
    }
    let _ = props.id.consume();
    uploaded.record(props.id);
    let _ = props.transform.consume();
    uploaded.record(props.transform);
    if let Some(color) = props.color.cell() {
        let _ = color.consume();
        uploaded.record(color);
    }
}

/// Flattens instance matrices into a transform buffer.
pub fn flatten_transforms(transforms: &[Mat4]) -> Vec<f32> {
    transforms
        .iter()
        .flat_map(|m| m.to_cols_array())
        .collect()
}
