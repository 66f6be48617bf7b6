//! Shader templates and define-driven shader variants.
//!
//! A [`ShaderTemplate`] is a WGSL source with `#ifdef`/`#ifndef`/`#else`/`#endif`
//! directives plus the list of defines it understands. [`compose_shader`] validates a
//! [`DefineSet`] against the template and produces the final source of one variant.

pub use self::define::{DefineSet, DefineValue};

mod define;
mod preprocess;

use crate::error::ShaderCompositionError;
use std::rc::Rc;

/// Name of the define selecting how colors are fetched.
pub const COLOR_TYPE: &str = "dColorType";
/// Name of the define set when per-position normals are available.
pub const NORMAL: &str = "dNormal";

/// Variants of [`COLOR_TYPE`].
pub const COLOR_TYPE_VARIANTS: &[&str] = &[
    "uniform",
    "attribute",
    "instance",
    "element",
    "element_instance",
];

/// The kind of values a define accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefineKind {
    /// An on/off switch.
    Flag,
    /// One of a fixed list of variants.
    Variant(&'static [&'static str]),
}

/// A define a template understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefineSpec {
    /// Name of the define, as used in the directives.
    pub name: &'static str,
    /// Accepted values.
    pub kind: DefineKind,
}

/// A named shader source and the defines it recognizes.
#[derive(Debug)]
pub struct ShaderTemplate {
    /// Name of the template, also the prefix of variant keys.
    pub name: &'static str,
    /// WGSL source with preprocessor directives.
    pub source: &'static str,
    /// Defines this template recognizes.
    pub defines: &'static [DefineSpec],
}

impl ShaderTemplate {
    /// Finds the spec of a define.
    pub fn define(&self, name: &str) -> Option<&DefineSpec> {
        self.defines.iter().find(|d| d.name == name)
    }
}

/// Template of the mesh geometry kind.
pub static MESH_TEMPLATE: ShaderTemplate = ShaderTemplate {
    name: "mesh",
    source: include_str!("mesh.wgsl"),
    defines: &[
        DefineSpec {
            name: COLOR_TYPE,
            kind: DefineKind::Variant(COLOR_TYPE_VARIANTS),
        },
        DefineSpec {
            name: NORMAL,
            kind: DefineKind::Flag,
        },
    ],
};

/// Template of the point geometry kind.
pub static POINT_TEMPLATE: ShaderTemplate = ShaderTemplate {
    name: "point",
    source: include_str!("point.wgsl"),
    defines: &[DefineSpec {
        name: COLOR_TYPE,
        kind: DefineKind::Variant(COLOR_TYPE_VARIANTS),
    }],
};

/// One compiled shader variant: the composed source and the key identifying it.
///
/// Two descriptors are equal iff their keys are equal; the resource layer uses the key to
/// reuse compiled programs.
#[derive(Clone, Debug)]
pub struct ShaderCode {
    /// Name of the template this variant was composed from.
    pub template: &'static str,
    /// Cache key: the template name followed by the sorted defines.
    pub key: String,
    /// Final WGSL source.
    pub source: Rc<str>,
    /// The defines this variant was composed with.
    pub defines: DefineSet,
}

impl PartialEq for ShaderCode {
    fn eq(&self, other: &ShaderCode) -> bool {
        self.key == other.key
    }
}

impl Eq for ShaderCode {}

/// Composes the variant of `template` selected by `defines`.
///
/// Fails if `defines` holds a define the template does not declare, a value of the wrong
/// kind, an undeclared variant, or if the template directives are unbalanced.
pub fn compose_shader(
    template: &ShaderTemplate,
    defines: &DefineSet,
) -> Result<ShaderCode, ShaderCompositionError> {
    for (name, value) in defines.iter() {
        let spec = template
            .define(name)
            .ok_or(ShaderCompositionError::UnknownDefine {
                template: template.name,
                define: name,
            })?;

        match (spec.kind, *value) {
            (DefineKind::Flag, DefineValue::Flag(_)) => {}
            (DefineKind::Variant(variants), DefineValue::Variant(v)) => {
                if !variants.contains(&v) {
                    return Err(ShaderCompositionError::UnsupportedVariant {
                        template: template.name,
                        define: name,
                        value: v,
                    });
                }
            }
            (DefineKind::Flag, DefineValue::Variant(_)) => {
                return Err(ShaderCompositionError::KindMismatch {
                    template: template.name,
                    define: name,
                    expected: "flag",
                })
            }
            (DefineKind::Variant(_), DefineValue::Flag(_)) => {
                return Err(ShaderCompositionError::KindMismatch {
                    template: template.name,
                    define: name,
                    expected: "variant",
                })
            }
        }
    }

    let source = preprocess::preprocess(template.name, template.source, &defines.symbols())?;

    Ok(ShaderCode {
        template: template.name,
        key: format!("{}|{}", template.name, defines.key()),
        source: source.into(),
        defines: defines.clone(),
    })
}
