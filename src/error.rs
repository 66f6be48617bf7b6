//! Error types of the renderable layer.

use thiserror::Error;

/// A property bag whose declared counts disagree with its buffer lengths.
///
/// Always raised before any GPU resource is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeMismatchError {
    /// A buffer does not hold the number of values its counts require.
    #[error("`{field}` holds {found} values, expected {expected}")]
    BufferLength {
        /// The property holding the buffer.
        field: &'static str,
        /// Length derived from the declared counts.
        expected: usize,
        /// Actual buffer length.
        found: usize,
    },
    /// A buffer length is not a multiple of its element arity.
    #[error("`{field}` holds {len} values, which is not a multiple of {multiple}")]
    NotMultiple {
        /// The property holding the buffer.
        field: &'static str,
        /// Actual buffer length.
        len: usize,
        /// Required arity.
        multiple: usize,
    },
    /// A property that must stay constant over a renderable's lifetime was changed.
    #[error("`{field}` is immutable: expected {expected}, found {found}")]
    ImmutableField {
        /// The property that changed.
        field: &'static str,
        /// The value the renderable was created with.
        expected: u64,
        /// The value found in the new property bag.
        found: u64,
    },
}

/// A define set that a shader template cannot satisfy, or a malformed template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderCompositionError {
    /// The template does not declare this define.
    #[error("shader template `{template}` does not recognize define `{define}`")]
    UnknownDefine {
        /// Template name.
        template: &'static str,
        /// Offending define.
        define: &'static str,
    },
    /// A flag was given for a variant define, or the opposite.
    #[error("define `{define}` of shader template `{template}` expects a {expected} value")]
    KindMismatch {
        /// Template name.
        template: &'static str,
        /// Offending define.
        define: &'static str,
        /// `"flag"` or `"variant"`.
        expected: &'static str,
    },
    /// The variant value is not one the template declares.
    #[error("define `{define}` of shader template `{template}` has no variant `{value}`")]
    UnsupportedVariant {
        /// Template name.
        template: &'static str,
        /// Offending define.
        define: &'static str,
        /// Requested variant.
        value: &'static str,
    },
    /// `#else`/`#endif` without a matching `#ifdef`, or an `#ifdef` left open.
    #[error("unbalanced preprocessor directive in shader template `{template}` at line {line}")]
    UnbalancedDirective {
        /// Template name.
        template: &'static str,
        /// One-based line number.
        line: usize,
    },
}

/// An operation invoked on a renderable that was already disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("`{operation}` called on disposed `{name}` renderable")]
pub struct InvalidStateError {
    /// The geometry kind of the renderable.
    pub name: &'static str,
    /// The rejected operation.
    pub operation: &'static str,
}

/// A failure of the resource layer.
///
/// These are surfaced unchanged; the renderable layer never retries them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The layer that created the render item was destroyed.
    #[error("the rendering context was destroyed")]
    ContextDestroyed,
    /// A GPU buffer could not be allocated.
    #[error("failed to allocate `{label}`: {details}")]
    Allocation {
        /// Debug label of the resource.
        label: String,
        /// Backend message.
        details: String,
    },
    /// A shader or pipeline failed to compile.
    #[error("failed to compile `{label}`: {details}")]
    Compilation {
        /// Debug label of the program.
        label: String,
        /// Backend message.
        details: String,
    },
}

/// Any error returned by a [`Renderable`](crate::renderable::Renderable) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderableError {
    /// See [`ShapeMismatchError`].
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatchError),
    /// See [`ShaderCompositionError`].
    #[error(transparent)]
    ShaderComposition(#[from] ShaderCompositionError),
    /// See [`InvalidStateError`].
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
    /// See [`ResourceError`].
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// A property bag of one geometry kind was given to a renderable of another kind.
    #[error("cannot update a `{expected}` renderable with `{found}` properties")]
    KindMismatch {
        /// The renderable's kind.
        expected: &'static str,
        /// The kind of the given properties.
        found: &'static str,
    },
}
