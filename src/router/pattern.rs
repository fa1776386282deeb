//! Route pattern compiler.
//!
//! Turns `/admin(/@module(/@controller))(/@id:[\d]+)` into an anchored regex:
//! literals are escaped, `(` opens a non-capturing group, every `)` closes it as
//! optional, and each `@name[:regex]` becomes a capture group. Groups are named
//! positionally (`p0`, `p1`, ...) because a parameter name may repeat.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::error::FrameworkError;

/// Capture used when a parameter has no `:regex` constraint
pub const DEFAULT_PARAM_REGEX: &str = "[^/?]+";

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    /// Parameter name for capture group `p{i}`, in declaration order
    names: Vec<Arc<str>>,
}

impl CompiledPattern {
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Parameter names in declaration order, duplicates included.
    #[must_use]
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }
}

/// Compile `pattern` into an anchored matcher.
///
/// # Errors
///
/// [`FrameworkError::InvalidPattern`] for unbalanced parentheses, a `@` with no
/// parameter name, or a custom regex the regex engine rejects.
pub fn compile(pattern: &str, case_sensitive: bool) -> Result<CompiledPattern, FrameworkError> {
    let invalid = |reason: String| FrameworkError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    // A trailing slash is always optional; drop it here and re-add it as `/?`.
    let body = pattern.strip_suffix('/').unwrap_or(pattern);

    let mut source = String::with_capacity(body.len() * 2 + 8);
    source.push('^');
    let mut names: Vec<Arc<str>> = Vec::new();
    let mut depth = 0usize;
    let mut chars = body.char_indices().peekable();
    let mut literal = [0u8; 4];

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '(' => {
                depth += 1;
                source.push_str("(?:");
            }
            ')' => {
                if depth == 0 {
                    return Err(invalid(format!("unmatched ')' at offset {pos}")));
                }
                depth -= 1;
                source.push_str(")?");
            }
            '@' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(invalid(format!("missing parameter name at offset {pos}")));
                }

                let mut custom = String::new();
                if matches!(chars.peek(), Some(&(_, ':'))) {
                    chars.next();
                    while let Some(&(_, c)) = chars.peek() {
                        if matches!(c, '/' | '(' | ')') {
                            break;
                        }
                        custom.push(c);
                        chars.next();
                    }
                }
                let capture = if custom.is_empty() {
                    DEFAULT_PARAM_REGEX
                } else {
                    custom.as_str()
                };

                source.push_str(&format!("(?P<p{}>{})", names.len(), capture));
                names.push(Arc::from(name));
            }
            other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }

    if depth != 0 {
        return Err(invalid(format!("{depth} unclosed '('")));
    }
    source.push_str("/?$");

    let regex = RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| invalid(e.to_string()))?;

    Ok(CompiledPattern { regex, names })
}

/// Collapse runs of `/` in a request path.
#[must_use]
pub fn collapse_slashes(path: &str) -> std::borrow::Cow<'_, str> {
    if !path.contains("//") {
        return std::borrow::Cow::Borrowed(path);
    }
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(ch);
    }
    std::borrow::Cow::Owned(out)
}
