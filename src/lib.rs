//! QBE SQL/JSON - Query-By-Example filter compiler for SQL/JSON document stores.
//!
//! Translates a MongoDB-style JSON filter into a `JSON_EXISTS` path predicate with
//! ordered bind values, plus the side-channel SQL fragments that do not fit into a
//! path expression (ORDER BY, `$id` key restriction, `$sqlJson` comparisons,
//! spatial and full-text predicates).
//!
//! # Main Components
//!
//! - **Path**: parses field paths such as `` a.b[1,3 to 5].`c d` `` into typed steps
//! - **Tree**: builds the AND/OR tree from a filter document
//! - **Codegen**: renders the tree into a JSON_EXISTS expression and its binds
//! - **Clauses**: renders order-by, `$id`, `$sqlJson`, spatial and full-text clauses
//! - **Compiler**: ties the pipeline together for one collection configuration
//!
//! # Example
//!
//! ```rust
//! use qbe_sqljson::{BindValue, CompilerConfig, QbeCompiler};
//!
//! let compiler = QbeCompiler::new(CompilerConfig::default()).unwrap();
//! let compiled = compiler
//!     .compile_str(r#"{"name": "Ann", "age": {"$gte": 18}}"#)
//!     .unwrap();
//!
//! let clause = compiled.where_clause().unwrap();
//! assert_eq!(
//!     clause.sql,
//!     r#"JSON_EXISTS("JSON_DOCUMENT", '$?(@.name == $B0 && @.age >= $B1)' passing ? as "B0", ? as "B1")"#
//! );
//! assert_eq!(clause.binds, vec![BindValue::from("Ann"), BindValue::from(18)]);
//! ```

pub mod clauses;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod error;
pub mod operators;
pub mod path;
pub mod tree;
pub mod value;

// Re-export main types for convenience
pub use clauses::{
    KeyColumn, OrderByEntry, OrderBySpec, OrderByType, SortOrder, SpatialClause, SqlFragment,
    SqlJsonClause, SqlJsonOp, TextClause,
};
pub use codegen::{ExpressionGenerator, JsonExistsClause, PassingBind};
pub use compiler::{compile, parse_filter, CompiledFilter, QbeCompiler};
pub use config::{CompilerConfig, EmbeddedIdConfig, KeyType, SqlJsonFeatures};
pub use error::{ErrorCode, PathErrorKind, QbeError, QbeResult};
pub use operators::{classify, Keyword, Modifier, QbeOperator, SpatialOperator};
pub use path::{ArraySubscript, EscapeMode, PathParser, PathStep, QueryPath, SubscriptItem};
pub use tree::{AndOrNode, AndOrTree, NodeId, NodeOp, Predicate};
pub use value::{BindConversion, BindValue, JsonNode, ScalarValue, ValueTypePair};
