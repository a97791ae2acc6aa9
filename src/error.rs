//! Error types for the QBE compiler.
//!
//! Every malformed-input condition is a `QbeError` variant carrying the offending
//! key, path or value. `QbeError::code()` exposes a stable reason code that callers
//! translate into user-facing messages.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a field path was rejected by the path parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathErrorKind {
    EmptyPath,
    EmptyStep,
    RootMarker,
    MalformedSubscript,
    UnclosedArray,
    UnclosedQuote,
    MissingStepDot,
}

impl fmt::Display for PathErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PathErrorKind::EmptyPath => "path is empty",
            PathErrorKind::EmptyStep => "path contains an empty step",
            PathErrorKind::RootMarker => "'$' and '@' cannot be used as a step",
            PathErrorKind::MalformedSubscript => "malformed array subscript",
            PathErrorKind::UnclosedArray => "array subscript is not closed",
            PathErrorKind::UnclosedQuote => "quoted step is not closed",
            PathErrorKind::MissingStepDot => "missing '.' after array or quoted step",
        };
        f.write_str(msg)
    }
}

/// Stable reason code for a compilation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidJson,
    InvalidPath,
    ArraySubscript,
    TypeMismatch,
    EmptyContent,
    UnknownOperator,
    MisplacedOperator,
    MultipleClauses,
    MixedQueryEnvelope,
    MixedDownscope,
    NestedModifier,
    NotTopLevel,
    ConflictingErrorClauses,
    SingletonPathRequired,
    InvalidLiteral,
    BindCountMismatch,
    InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::ArraySubscript => "ARRAY_SUBSCRIPT",
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::EmptyContent => "EMPTY_CONTENT",
            ErrorCode::UnknownOperator => "UNKNOWN_OPERATOR",
            ErrorCode::MisplacedOperator => "MISPLACED_OPERATOR",
            ErrorCode::MultipleClauses => "MULTIPLE_CLAUSES",
            ErrorCode::MixedQueryEnvelope => "MIXED_QUERY_ENVELOPE",
            ErrorCode::MixedDownscope => "MIXED_DOWNSCOPE",
            ErrorCode::NestedModifier => "NESTED_MODIFIER",
            ErrorCode::NotTopLevel => "NOT_TOP_LEVEL",
            ErrorCode::ConflictingErrorClauses => "CONFLICTING_ERROR_CLAUSES",
            ErrorCode::SingletonPathRequired => "SINGLETON_PATH_REQUIRED",
            ErrorCode::InvalidLiteral => "INVALID_LITERAL",
            ErrorCode::BindCountMismatch => "BIND_COUNT_MISMATCH",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// QBE compilation error
#[derive(Error, Debug)]
pub enum QbeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid path '{path}': {kind}")]
    InvalidPath { path: String, kind: PathErrorKind },

    #[error("Type mismatch for '{key}': expected {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{0}' requires non-empty content")]
    EmptyContent(String),

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{0}' is not allowed here")]
    MisplacedOperator(String),

    #[error("Clause '{0}' may appear only once")]
    MultipleClauses(String),

    #[error("'$query' cannot be combined with '{0}'")]
    MixedQueryEnvelope(String),

    #[error("'{0}' mixes operators with nested field names")]
    MixedDownscope(String),

    #[error("Modifier '{inner}' cannot be nested under '{outer}'")]
    NestedModifier { outer: String, inner: String },

    #[error("'{0}' is only allowed at the top level of a filter")]
    NotTopLevel(String),

    #[error("'$lax' and '$scalarRequired' cannot both be set for '{0}'")]
    ConflictingErrorClauses(String),

    #[error("Path '{0}' must not contain array steps or wildcards")]
    SingletonPathRequired(String),

    #[error("Invalid literal for '{key}': {reason}")]
    InvalidLiteral { key: String, reason: String },

    #[error("Bind count mismatch: expression consumed {consumed} of {available} values")]
    BindCountMismatch { consumed: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for QBE compilation
pub type QbeResult<T> = Result<T, QbeError>;

impl QbeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            QbeError::InvalidJson(_) => ErrorCode::InvalidJson,
            QbeError::InvalidPath {
                kind: PathErrorKind::MalformedSubscript | PathErrorKind::UnclosedArray,
                ..
            } => ErrorCode::ArraySubscript,
            QbeError::InvalidPath { .. } => ErrorCode::InvalidPath,
            QbeError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            QbeError::EmptyContent(_) => ErrorCode::EmptyContent,
            QbeError::UnknownOperator(_) => ErrorCode::UnknownOperator,
            QbeError::MisplacedOperator(_) => ErrorCode::MisplacedOperator,
            QbeError::MultipleClauses(_) => ErrorCode::MultipleClauses,
            QbeError::MixedQueryEnvelope(_) => ErrorCode::MixedQueryEnvelope,
            QbeError::MixedDownscope(_) => ErrorCode::MixedDownscope,
            QbeError::NestedModifier { .. } => ErrorCode::NestedModifier,
            QbeError::NotTopLevel(_) => ErrorCode::NotTopLevel,
            QbeError::ConflictingErrorClauses(_) => ErrorCode::ConflictingErrorClauses,
            QbeError::SingletonPathRequired(_) => ErrorCode::SingletonPathRequired,
            QbeError::InvalidLiteral { .. } => ErrorCode::InvalidLiteral,
            QbeError::BindCountMismatch { .. } => ErrorCode::BindCountMismatch,
            QbeError::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }

    pub(crate) fn path(path: &str, kind: PathErrorKind) -> Self {
        QbeError::InvalidPath {
            path: path.to_string(),
            kind,
        }
    }

    pub(crate) fn type_mismatch(key: &str, expected: &'static str, found: &'static str) -> Self {
        QbeError::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
        }
    }

    pub(crate) fn literal(key: &str, reason: impl Into<String>) -> Self {
        QbeError::InvalidLiteral {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl serde::Serialize for QbeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QbeError::path("a..b", PathErrorKind::EmptyStep);
        assert_eq!(err.to_string(), "Invalid path 'a..b': path contains an empty step");

        let err = QbeError::type_mismatch("$in", "array", "string");
        assert_eq!(
            err.to_string(),
            "Type mismatch for '$in': expected array, got string"
        );

        let err = QbeError::UnknownOperator("$foo".to_string());
        assert_eq!(err.to_string(), "Unknown operator '$foo'");

        let err = QbeError::BindCountMismatch {
            consumed: 1,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Bind count mismatch: expression consumed 1 of 2 values"
        );
    }

    #[test]
    fn test_subscript_errors_share_code() {
        let err = QbeError::path("a[x]", PathErrorKind::MalformedSubscript);
        assert_eq!(err.code(), ErrorCode::ArraySubscript);

        let err = QbeError::path("a[1", PathErrorKind::UnclosedArray);
        assert_eq!(err.code(), ErrorCode::ArraySubscript);

        let err = QbeError::path("", PathErrorKind::EmptyPath);
        assert_eq!(err.code(), ErrorCode::InvalidPath);
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::MultipleClauses).unwrap();
        assert_eq!(json, "\"MULTIPLE_CLAUSES\"");
        assert_eq!(ErrorCode::MultipleClauses.to_string(), "MULTIPLE_CLAUSES");
    }

    #[test]
    fn test_error_serializes_as_message() {
        let err = QbeError::NotTopLevel("$id".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"'$id' is only allowed at the top level of a filter\"");
    }
}
