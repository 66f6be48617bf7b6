//! Color sources of renderables.

use crate::color::Color;
use crate::value_cell::ValueCell;

/// How the color of a renderable is fetched.
///
/// Switching from one variant to another changes the shader variant; changing the color
/// (or the content of a color buffer) does not.
#[derive(Clone, Debug)]
pub enum ColorSource {
    /// One color for the whole renderable.
    Uniform(Color),
    /// One rgb triplet per position.
    Attribute(ValueCell<Vec<f32>>),
    /// One rgb triplet per instance.
    Instance(ValueCell<Vec<f32>>),
    /// One rgb triplet per element (group).
    Element(ValueCell<Vec<f32>>),
    /// One rgb triplet per element of each instance.
    ElementInstance(ValueCell<Vec<f32>>),
}

/// The variant of a [`ColorSource`], without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// See [`ColorSource::Uniform`].
    Uniform,
    /// See [`ColorSource::Attribute`].
    Attribute,
    /// See [`ColorSource::Instance`].
    Instance,
    /// See [`ColorSource::Element`].
    Element,
    /// See [`ColorSource::ElementInstance`].
    ElementInstance,
}

impl ColorType {
    /// Value of the `dColorType` shader define.
    pub fn define(self) -> &'static str {
        match self {
            ColorType::Uniform => "uniform",
            ColorType::Attribute => "attribute",
            ColorType::Instance => "instance",
            ColorType::Element => "element",
            ColorType::ElementInstance => "element_instance",
        }
    }
}

impl ColorSource {
    /// The variant of this source.
    pub fn color_type(&self) -> ColorType {
        match self {
            ColorSource::Uniform(_) => ColorType::Uniform,
            ColorSource::Attribute(_) => ColorType::Attribute,
            ColorSource::Instance(_) => ColorType::Instance,
            ColorSource::Element(_) => ColorType::Element,
            ColorSource::ElementInstance(_) => ColorType::ElementInstance,
        }
    }

    /// The color buffer, `None` for a uniform color.
    pub fn cell(&self) -> Option<&ValueCell<Vec<f32>>> {
        match self {
            ColorSource::Uniform(_) => None,
            ColorSource::Attribute(c)
            | ColorSource::Instance(c)
            | ColorSource::Element(c)
            | ColorSource::ElementInstance(c) => Some(c),
        }
    }

    /// The uniform color; white when colors come from a buffer.
    pub fn uniform(&self) -> Color {
        match self {
            ColorSource::Uniform(c) => *c,
            _ => crate::color::WHITE,
        }
    }

    /// Number of rgb triplets the color buffer must hold.
    pub fn expected_colors(
        &self,
        position_count: usize,
        instance_count: usize,
        element_count: usize,
    ) -> Option<usize> {
        match self.color_type() {
            ColorType::Uniform => None,
            ColorType::Attribute => Some(position_count),
            ColorType::Instance => Some(instance_count),
            ColorType::Element => Some(element_count),
            ColorType::ElementInstance => Some(element_count * instance_count),
        }
    }
}
