//! Field path parsing.
//!
//! Turns a QBE field path such as `address.lines[0].`zip code`` into an ordered
//! list of steps. Steps are separated by `.`, backquotes quote a step explicitly
//! and `[...]` introduces an array subscript.
//!
//! Steps render in two modes:
//! - `EscapeMode::Sql`: quoted steps become SQL/JSON path string literals with
//!   JSON escapes, and single quotes are doubled for the enclosing SQL literal
//! - `EscapeMode::Unescaped`: raw field names, used to reconstruct the path text

mod query_path;
mod subscript;

pub use query_path::QueryPath;
pub use subscript::{ArraySubscript, SubscriptItem};

use crate::error::{PathErrorKind, QbeError, QbeResult};

/// How field steps are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    Sql,
    Unescaped,
}

/// A single step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// A field name. `quoted` is set when the name was backquoted or contains
    /// characters that cannot appear in an unquoted SQL/JSON path step.
    Field { name: String, quoted: bool },
    /// The `*` field wildcard.
    Wildcard,
    /// A bracketed array subscript.
    Array(ArraySubscript),
}

impl PathStep {
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        let quoted = needs_quoting(&name);
        PathStep::Field { name, quoted }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, PathStep::Array(_))
    }

    /// Render the step without its leading separator.
    pub fn render(&self, mode: EscapeMode) -> String {
        match self {
            PathStep::Field { name, quoted: true } => match mode {
                EscapeMode::Sql => escape_sql(name),
                EscapeMode::Unescaped => format!("`{}`", name),
            },
            PathStep::Field { name, quoted: false } => name.clone(),
            PathStep::Wildcard => "*".to_string(),
            PathStep::Array(sub) => sub.to_string(),
        }
    }
}

/// Whether a field name must be double-quoted inside a SQL/JSON path.
pub fn needs_quoting(name: &str) -> bool {
    match name.chars().next() {
        None => true,
        Some(first) if first.is_ascii_digit() => true,
        Some(_) => !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
    }
}

/// Quote a field name for a SQL/JSON path embedded in a SQL string literal.
fn escape_sql(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Character-level tokenizer for field paths.
pub struct PathParser {
    source: String,
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl PathParser {
    pub fn new(path: &str) -> Self {
        let input: Vec<char> = path.chars().collect();
        let current_char = input.first().copied();

        Self {
            source: path.to_string(),
            input,
            position: 0,
            current_char,
        }
    }

    /// Parse a path into typed steps.
    pub fn parse(path: &str) -> QbeResult<Vec<PathStep>> {
        PathParser::new(path).steps()
    }

    /// Parse a path and render every step in the requested mode.
    pub fn parse_to_strings(path: &str, mode: EscapeMode) -> QbeResult<Vec<String>> {
        Ok(PathParser::parse(path)?
            .iter()
            .map(|step| step.render(mode))
            .collect())
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Consume a step separator. A subscript cannot start the next step.
    fn skip_dot(&mut self) -> QbeResult<()> {
        self.advance();
        match self.current_char {
            Some('[') => Err(self.error(PathErrorKind::EmptyStep)),
            _ => Ok(()),
        }
    }

    fn error(&self, kind: PathErrorKind) -> QbeError {
        QbeError::path(&self.source, kind)
    }

    pub fn steps(mut self) -> QbeResult<Vec<PathStep>> {
        if self.input.is_empty() {
            return Err(self.error(PathErrorKind::EmptyPath));
        }

        let mut steps = Vec::new();

        loop {
            match self.current_char {
                None => return Err(self.error(PathErrorKind::EmptyStep)),
                Some('.') => return Err(self.error(PathErrorKind::EmptyStep)),
                Some('[') => {
                    steps.push(self.read_array_step()?);
                    // Arrays must be followed by a dot or the end of the path
                    match self.current_char {
                        None => break,
                        Some('.') => self.skip_dot()?,
                        Some(_) => return Err(self.error(PathErrorKind::MissingStepDot)),
                    }
                }
                Some('`') => {
                    steps.push(self.read_quoted_step()?);
                    match self.current_char {
                        None => break,
                        Some('.') => self.skip_dot()?,
                        Some('[') => continue,
                        Some(_) => return Err(self.error(PathErrorKind::MissingStepDot)),
                    }
                }
                Some(_) => {
                    steps.push(self.read_plain_step()?);
                    match self.current_char {
                        None => break,
                        Some('.') => self.skip_dot()?,
                        Some('[') => continue,
                        Some('`') => return Err(self.error(PathErrorKind::MissingStepDot)),
                        Some(_) => return Err(self.error(PathErrorKind::MalformedSubscript)),
                    }
                }
            }
        }

        Ok(steps)
    }

    fn read_array_step(&mut self) -> QbeResult<PathStep> {
        self.advance(); // '['
        let mut text = String::new();
        loop {
            match self.current_char {
                None => return Err(self.error(PathErrorKind::UnclosedArray)),
                Some(']') => {
                    self.advance();
                    break;
                }
                Some('[') => return Err(self.error(PathErrorKind::MalformedSubscript)),
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        ArraySubscript::parse(&text)
            .map(PathStep::Array)
            .ok_or_else(|| self.error(PathErrorKind::MalformedSubscript))
    }

    fn read_quoted_step(&mut self) -> QbeResult<PathStep> {
        self.advance(); // opening backquote
        let mut name = String::new();
        loop {
            match self.current_char {
                None => return Err(self.error(PathErrorKind::UnclosedQuote)),
                Some('`') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }

        match name.as_str() {
            "" => Err(self.error(PathErrorKind::EmptyStep)),
            "*" => Ok(PathStep::Wildcard),
            _ => Ok(PathStep::Field { name, quoted: true }),
        }
    }

    fn read_plain_step(&mut self) -> QbeResult<PathStep> {
        let mut name = String::new();
        while let Some(c) = self.current_char {
            if matches!(c, '.' | '[' | ']' | '`') {
                break;
            }
            name.push(c);
            self.advance();
        }

        match name.as_str() {
            "" => Err(self.error(PathErrorKind::MalformedSubscript)),
            "$" | "@" => Err(self.error(PathErrorKind::RootMarker)),
            "*" => Ok(PathStep::Wildcard),
            _ => Ok(PathStep::field(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(path: &str) -> PathErrorKind {
        match PathParser::parse(path) {
            Err(QbeError::InvalidPath { kind, .. }) => kind,
            other => panic!("expected path error for {:?}, got {:?}", path, other),
        }
    }

    #[test]
    fn test_simple_steps() {
        let steps = PathParser::parse("a.b_c.d1").unwrap();
        assert_eq!(
            steps,
            vec![PathStep::field("a"), PathStep::field("b_c"), PathStep::field("d1")]
        );
    }

    #[test]
    fn test_array_steps() {
        let steps = PathParser::parse_to_strings("a[0].b[1, 3 to 5]", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["a", "[0]", "b", "[1,3 to 5]"]);
    }

    #[test]
    fn test_quoting_detection() {
        let steps = PathParser::parse_to_strings("1st.my key.ok", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["\"1st\"", "\"my key\"", "ok"]);
    }

    #[test]
    fn test_backquoted_step() {
        let steps = PathParser::parse_to_strings("a.`b.c`.d", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["a", "\"b.c\"", "d"]);

        let steps = PathParser::parse_to_strings("a.`b.c`.d", EscapeMode::Unescaped).unwrap();
        assert_eq!(steps, vec!["a", "`b.c`", "d"]);
    }

    #[test]
    fn test_backquoted_plain_name_stays_quoted() {
        let steps = PathParser::parse("`abc`").unwrap();
        assert_eq!(
            steps,
            vec![PathStep::Field {
                name: "abc".to_string(),
                quoted: true
            }]
        );
    }

    #[test]
    fn test_wildcard_even_when_backquoted() {
        assert_eq!(PathParser::parse("a.*").unwrap()[1], PathStep::Wildcard);
        assert_eq!(PathParser::parse("a.`*`").unwrap()[1], PathStep::Wildcard);
    }

    #[test]
    fn test_sql_escaping() {
        let steps = PathParser::parse_to_strings("`it's \"x\"\\`", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["\"it''s \\\"x\\\"\\\\\""]);

        let steps = PathParser::parse_to_strings("`a\tb\u{1}`", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["\"a\\tb\\u0001\""]);
    }

    #[test]
    fn test_quoted_step_followed_by_array() {
        let steps = PathParser::parse_to_strings("`x y`[2]", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["\"x y\"", "[2]"]);
    }

    #[test]
    fn test_leading_array_step() {
        let steps = PathParser::parse("[0].a").unwrap();
        assert!(steps[0].is_array());
        assert_eq!(steps[1], PathStep::field("a"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(kind_of(""), PathErrorKind::EmptyPath);
        assert_eq!(kind_of("a..b"), PathErrorKind::EmptyStep);
        assert_eq!(kind_of(".a"), PathErrorKind::EmptyStep);
        assert_eq!(kind_of("a."), PathErrorKind::EmptyStep);
        assert_eq!(kind_of("a.``"), PathErrorKind::EmptyStep);
        assert_eq!(kind_of("a.[0]"), PathErrorKind::EmptyStep);
        assert_eq!(kind_of("a[0].[1]"), PathErrorKind::EmptyStep);
        assert_eq!(kind_of("`a`.[1]"), PathErrorKind::EmptyStep);
        assert_eq!(kind_of("$"), PathErrorKind::RootMarker);
        assert_eq!(kind_of("a.@.b"), PathErrorKind::RootMarker);
        assert_eq!(kind_of("a[x]"), PathErrorKind::MalformedSubscript);
        assert_eq!(kind_of("a]"), PathErrorKind::MalformedSubscript);
        assert_eq!(kind_of("a[[1]]"), PathErrorKind::MalformedSubscript);
        assert_eq!(kind_of("a[1"), PathErrorKind::UnclosedArray);
        assert_eq!(kind_of("a.`b"), PathErrorKind::UnclosedQuote);
        assert_eq!(kind_of("a[0]b"), PathErrorKind::MissingStepDot);
        assert_eq!(kind_of("a[0][1]"), PathErrorKind::MissingStepDot);
        assert_eq!(kind_of("`a`b"), PathErrorKind::MissingStepDot);
        assert_eq!(kind_of("a`b`"), PathErrorKind::MissingStepDot);
    }

    #[test]
    fn test_dollar_inside_name_is_quoted() {
        let steps = PathParser::parse_to_strings("a.$b", EscapeMode::Sql).unwrap();
        assert_eq!(steps, vec!["a", "\"$b\""]);
    }
}
