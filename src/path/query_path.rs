//! Parsed field path and its SQL/JSON renditions.

use std::fmt;

use super::{EscapeMode, PathParser, PathStep};
use crate::error::QbeResult;

/// An immutable, parsed field path.
///
/// Renders to the three target syntaxes the compiler needs:
/// - `to_query_string`: relative path inside a `JSON_EXISTS` filter expression
/// - `to_singleton_string`: `$`-relative path without array steps, for
///   `JSON_VALUE` in ORDER BY and index expressions
/// - `to_lax_string`: `$`-relative path without array steps, for full-text search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPath {
    steps: Vec<PathStep>,
    starts_with_array: bool,
}

impl QueryPath {
    pub fn parse(path: &str) -> QbeResult<Self> {
        Ok(Self::from_steps(PathParser::parse(path)?))
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        let starts_with_array = steps.first().is_some_and(PathStep::is_array);
        Self {
            steps,
            starts_with_array,
        }
    }

    /// The document root.
    pub fn root() -> Self {
        Self::from_steps(Vec::new())
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn starts_with_array(&self) -> bool {
        self.starts_with_array
    }

    pub fn has_array_steps(&self) -> bool {
        self.steps.iter().any(PathStep::is_array)
    }

    pub fn has_wildcards(&self) -> bool {
        self.steps.iter().any(|s| match s {
            PathStep::Wildcard => true,
            PathStep::Array(sub) => sub.is_wildcard(),
            PathStep::Field { .. } => false,
        })
    }

    /// True when the path addresses at most one value: no array steps, no wildcards.
    pub fn is_singleton(&self) -> bool {
        !self.has_array_steps() && !self.has_wildcards()
    }

    /// Render relative to `base` (`@` or `$`). With `is_leaf`, a trailing `[*]`
    /// makes the terminal step match every array element.
    pub fn to_query_string(&self, base: char, is_leaf: bool) -> String {
        let mut out = String::new();
        out.push(base);
        for step in &self.steps {
            push_step(&mut out, step);
        }
        if is_leaf && !self.steps.last().is_some_and(PathStep::is_array) {
            out.push_str("[*]");
        }
        out
    }

    /// Render relative to `$`, dropping array steps. With `force_single`, `[0]`
    /// follows every retained step.
    pub fn to_singleton_string(&self, force_single: bool) -> String {
        let mut out = String::from("$");
        for step in self.steps.iter().filter(|s| !s.is_array()) {
            push_step(&mut out, step);
            if force_single {
                out.push_str("[0]");
            }
        }
        out
    }

    pub fn to_lax_string(&self) -> String {
        self.to_singleton_string(false)
    }
}

fn push_step(out: &mut String, step: &PathStep) {
    if !step.is_array() {
        out.push('.');
    }
    out.push_str(&step.render(EscapeMode::Sql));
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            let first = i == 0 && !self.starts_with_array;
            if !first && !step.is_array() {
                f.write_str(".")?;
            }
            f.write_str(&step.render(EscapeMode::Unescaped))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> QueryPath {
        QueryPath::parse(p).unwrap()
    }

    #[test]
    fn test_query_string() {
        assert_eq!(path("a.b").to_query_string('@', false), "@.a.b");
        assert_eq!(path("a[0].b").to_query_string('@', false), "@.a[0].b");
        assert_eq!(path("a.`weird key`.b").to_query_string('@', false), "@.a.\"weird key\".b");
        assert_eq!(path("a[1,3 to 5].b").to_query_string('$', false), "$.a[1,3 to 5].b");
    }

    #[test]
    fn test_query_string_leaf() {
        assert_eq!(path("a.b").to_query_string('@', true), "@.a.b[*]");
        assert_eq!(path("a[2]").to_query_string('@', true), "@.a[2]");
    }

    #[test]
    fn test_leading_array() {
        let p = path("[1].a");
        assert!(p.starts_with_array());
        assert_eq!(p.to_query_string('@', false), "@[1].a");
        assert_eq!(p.to_singleton_string(false), "$.a");
        assert_eq!(p.to_string(), "[1].a");
    }

    #[test]
    fn test_singleton_string() {
        let p = path("a[0].b[*].c");
        assert_eq!(p.to_singleton_string(false), "$.a.b.c");
        assert_eq!(p.to_singleton_string(true), "$.a[0].b[0].c[0]");
        assert_eq!(p.to_lax_string(), "$.a.b.c");
    }

    #[test]
    fn test_root() {
        let root = QueryPath::root();
        assert!(root.is_root());
        assert_eq!(root.to_query_string('@', false), "@");
        assert_eq!(root.to_singleton_string(true), "$");
    }

    #[test]
    fn test_equality_by_steps() {
        assert_eq!(
            path("a.b"),
            QueryPath::from_steps(vec![PathStep::field("a"), PathStep::field("b")])
        );
        assert_ne!(path("a.b"), path("a[0].b"));
    }

    #[test]
    fn test_singleton_checks() {
        assert!(path("a.b").is_singleton());
        assert!(!path("a[0]").is_singleton());
        assert!(!path("a.*").is_singleton());
    }

    #[test]
    fn test_display_unescaped() {
        assert_eq!(path("a.`b c`[0].d").to_string(), "a.`b c`[0].d");
    }
}
