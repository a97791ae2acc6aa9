//! Path Parser Tests
//!
//! Tests for field path parsing and rendering through the public API:
//! - Query, singleton and lax renditions of representative paths
//! - Step equality
//! - Path errors surfacing from filters

mod common;

use qbe_sqljson::{
    ErrorCode, EscapeMode, PathErrorKind, PathParser, PathStep, QbeError, QueryPath,
};

fn path(p: &str) -> QueryPath {
    QueryPath::parse(p).unwrap_or_else(|e| panic!("Failed to parse path {}: {}", p, e))
}

// ============================================================================
// Renditions
// ============================================================================

#[test]
fn test_representative_paths() {
    let cases = [
        ("a.b", "@.a.b", "$.a[0].b[0]", "$.a.b"),
        ("a[0].b", "@.a[0].b", "$.a[0].b[0]", "$.a.b"),
        ("a.`weird key`.b", "@.a.\"weird key\".b", "$.a[0].\"weird key\"[0].b[0]", "$.a.\"weird key\".b"),
        ("a[1,3 to 5].b", "@.a[1,3 to 5].b", "$.a[0].b[0]", "$.a.b"),
    ];
    for (input, query, singleton, lax) in cases {
        let p = path(input);
        assert_eq!(p.to_query_string('@', false), query, "query string of {}", input);
        assert_eq!(p.to_singleton_string(true), singleton, "singleton of {}", input);
        assert_eq!(p.to_lax_string(), lax, "lax of {}", input);
    }
}

#[test]
fn test_leaf_rendering_adds_wildcard() {
    assert_eq!(path("a.b").to_query_string('$', true), "$.a.b[*]");
    assert_eq!(path("a[*]").to_query_string('$', true), "$.a[*]");
}

#[test]
fn test_unescaped_strings() {
    let steps = PathParser::parse_to_strings("a.`b c`[2].d", EscapeMode::Unescaped).unwrap();
    assert_eq!(steps, vec!["a", "`b c`", "[2]", "d"]);
}

#[test]
fn test_display_round_trips() {
    for input in ["a.b", "a[0].b", "a.`weird key`.b", "a[1,3 to 5].b", "[0].x"] {
        let p = path(input);
        assert_eq!(path(&p.to_string()), p, "display of {}", input);
    }
}

// ============================================================================
// Equality and cardinality
// ============================================================================

#[test]
fn test_step_equality() {
    assert_eq!(path("a.b"), path("a.b"));
    assert_ne!(path("a.b"), path("a.c"));
    assert_ne!(path("a.b"), path("a[0].b"));
    assert_eq!(path("a.b").steps(), &[PathStep::field("a"), PathStep::field("b")]);
}

#[test]
fn test_singleton_detection() {
    assert!(path("a.b").is_singleton());
    assert!(!path("a[0].b").is_singleton());
    assert!(!path("a.*.b").is_singleton());
    assert!(path("a[*]").has_wildcards());
    assert!(path("[0].a").starts_with_array());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_path_error_kinds() {
    let cases = [
        ("", PathErrorKind::EmptyPath),
        ("a..b", PathErrorKind::EmptyStep),
        ("a.[0]", PathErrorKind::EmptyStep),
        ("a[0].[1]", PathErrorKind::EmptyStep),
        ("a[1to5]", PathErrorKind::MalformedSubscript),
        ("a[1 to5]", PathErrorKind::MalformedSubscript),
        ("@", PathErrorKind::RootMarker),
        ("a[1 to]", PathErrorKind::MalformedSubscript),
        ("a[1", PathErrorKind::UnclosedArray),
        ("`a", PathErrorKind::UnclosedQuote),
        ("a[1]b", PathErrorKind::MissingStepDot),
    ];
    for (input, expected) in cases {
        match QueryPath::parse(input) {
            Err(QbeError::InvalidPath { kind, .. }) => assert_eq!(kind, expected, "path {:?}", input),
            other => panic!("expected path error for {:?}, got {:?}", input, other),
        }
    }
}

#[test]
fn test_filter_path_errors_have_codes() {
    let err = common::compile_err(r#"{"a..b": 1}"#);
    assert_eq!(err.code(), ErrorCode::InvalidPath);

    let err = common::compile_err(r#"{"a[x]": 1}"#);
    assert_eq!(err.code(), ErrorCode::ArraySubscript);
    assert_eq!(err.to_string(), "Invalid path 'a[x]': malformed array subscript");
}
