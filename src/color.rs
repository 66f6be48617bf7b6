//! Color type and a few named constants.
//!
//! Colors are RGBA with f32 components in [0.0, 1.0]. Uniform colors of a renderable are
//! given as a [`Color`]; per-instance or per-element colors are flat `rgb` float buffers
//! (see [`ColorSource`](crate::renderable::ColorSource)).

pub use rgb::Rgba;

/// The color type used throughout primgl. RGBA with f32 components in [0.0, 1.0].
pub type Color = Rgba<f32>;

/// Black (0, 0, 0)
pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
/// White (255, 255, 255)
pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
/// Red (255, 0, 0)
pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
/// Lime (0, 255, 0), pure green.
pub const LIME: Color = Color::new(0.0, 1.0, 0.0, 1.0);
/// Blue (0, 0, 255)
pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);
/// Yellow (255, 255, 0)
pub const YELLOW: Color = Color::new(1.0, 1.0, 0.0, 1.0);
/// Gray (128, 128, 128)
pub const GRAY: Color = Color::new(0.5019608, 0.5019608, 0.5019608, 1.0);
/// Light gray (211, 211, 211)
pub const LIGHT_GRAY: Color = Color::new(0.827451, 0.827451, 0.827451, 1.0);
/// Transparent color (0, 0, 0, 0).
pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

/// Builds an opaque color from 8-bit channels.
#[inline]
pub fn from_rgb_u8(r: u8, g: u8, b: u8) -> Color {
    Color::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
}

/// Converts a color to the `[r, g, b, a]` layout used by GPU uniforms.
#[inline]
pub fn to_array(color: Color) -> [f32; 4] {
    [color.r, color.g, color.b, color.a]
}
