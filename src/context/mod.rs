//! wgpu rendering context handle.

pub use self::context::Context;

mod context;
