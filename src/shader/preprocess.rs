use crate::error::ShaderCompositionError;

struct Frame {
    // The enclosing block is active.
    parent_active: bool,
    condition: bool,
    in_else: bool,
}

impl Frame {
    fn active(&self) -> bool {
        self.parent_active && (self.condition != self.in_else)
    }
}

/// Resolves `#ifdef`, `#ifndef`, `#else` and `#endif` directives.
///
/// Directive lines are dropped; lines of inactive blocks are dropped. Any other line is
/// copied unchanged.
pub(crate) fn preprocess(
    template: &'static str,
    source: &str,
    symbols: &[String],
) -> Result<String, ShaderCompositionError> {
    let defined = |name: &str| symbols.iter().any(|s| s == name);
    let unbalanced = |line: usize| ShaderCompositionError::UnbalancedDirective { template, line };

    let mut stack: Vec<Frame> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for (i, line) in source.lines().enumerate() {
        let active = stack.last().map_or(true, Frame::active);
        let trimmed = line.trim();

        if let Some(name) = trimmed.strip_prefix("#ifdef ") {
            stack.push(Frame {
                parent_active: active,
                condition: defined(name.trim()),
                in_else: false,
            });
        } else if let Some(name) = trimmed.strip_prefix("#ifndef ") {
            stack.push(Frame {
                parent_active: active,
                condition: !defined(name.trim()),
                in_else: false,
            });
        } else if trimmed == "#else" {
            match stack.last_mut() {
                Some(frame) if !frame.in_else => frame.in_else = true,
                _ => return Err(unbalanced(i + 1)),
            }
        } else if trimmed == "#endif" {
            if stack.pop().is_none() {
                return Err(unbalanced(i + 1));
            }
        } else if active {
            out.push_str(line);
            out.push('\n');
        }
    }

    if stack.is_empty() {
        Ok(out)
    } else {
        Err(unbalanced(source.lines().count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "a\n#ifdef X\nb\n#ifndef Y\nc\n#else\nd\n#endif\n#else\ne\n#endif\nf\n";

    fn run(symbols: &[&str]) -> String {
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        preprocess("test", SRC, &symbols).unwrap()
    }

    #[test]
    fn nested_blocks() {
        assert_eq!(run(&[]), "a\ne\nf\n");
        assert_eq!(run(&["X"]), "a\nb\nc\nf\n");
        assert_eq!(run(&["X", "Y"]), "a\nb\nd\nf\n");
        assert_eq!(run(&["Y"]), "a\ne\nf\n");
    }

    #[test]
    fn unbalanced_directives() {
        let err = preprocess("t", "#endif\n", &[]).unwrap_err();
        assert_eq!(
            err,
            ShaderCompositionError::UnbalancedDirective {
                template: "t",
                line: 1
            }
        );
        assert!(preprocess("t", "#ifdef A\nx\n", &[]).is_err());
        assert!(preprocess("t", "#ifdef A\n#else\n#else\n#endif\n", &[]).is_err());
        assert!(preprocess("t", "#else\n", &[]).is_err());
    }
}
