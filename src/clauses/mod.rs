//! Side-channel clauses.
//!
//! Predicates that cannot be expressed inside the `JSON_EXISTS` path expression
//! are rendered here as independent SQL fragments with their own bind lists:
//!
//! - `$orderby`: ORDER BY column expressions, with the primary-key rewrite
//! - `$id`: key column restriction
//! - `$sqlJson`: `JSON_VALUE` comparisons
//! - `$near` / `$within` / `$intersects`: spatial operators
//! - `$contains`: full-text search

mod keys;
mod order_by;
mod spatial;
mod sql_json;
mod text;

pub use keys::{render_keys, KeyColumn};
pub use order_by::{OrderByEntry, OrderBySpec, OrderByType, SortOrder};
pub use spatial::SpatialClause;
pub use sql_json::{SqlJsonClause, SqlJsonOp};
pub use text::TextClause;

pub(crate) use keys::parse_keys;
pub(crate) use sql_json::parse_sql_json;

use serde::Serialize;

use crate::error::{QbeError, QbeResult};
use crate::path::QueryPath;
use crate::value::{BindValue, JsonNode};

/// A rendered SQL fragment and the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlFragment {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, binds: Vec<BindValue>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }

    /// Join fragments with `separator`, concatenating binds in the same order.
    /// Returns `None` when there is nothing to join.
    pub fn join(fragments: Vec<SqlFragment>, separator: &str) -> Option<SqlFragment> {
        if fragments.is_empty() {
            return None;
        }
        let mut sql = String::new();
        let mut binds = Vec::new();
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(separator);
            }
            sql.push_str(&fragment.sql);
            binds.extend(fragment.binds);
        }
        Some(SqlFragment { sql, binds })
    }
}

/// How `JSON_VALUE` treats missing, non-scalar or multi-valued targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// `NULL ON ERROR` on a path forced to the first array element.
    #[default]
    Default,
    /// `NULL ON ERROR` on the lax path.
    Lax,
    /// `ERROR ON ERROR` on the plain singleton path.
    ScalarRequired,
}

impl ErrorMode {
    pub(crate) fn from_flags(key: &str, lax: bool, scalar_required: bool) -> QbeResult<Self> {
        match (lax, scalar_required) {
            (true, true) => Err(QbeError::ConflictingErrorClauses(key.to_string())),
            (true, false) => Ok(ErrorMode::Lax),
            (false, true) => Ok(ErrorMode::ScalarRequired),
            (false, false) => Ok(ErrorMode::Default),
        }
    }

    pub fn on_error(&self) -> &'static str {
        match self {
            ErrorMode::ScalarRequired => "ERROR ON ERROR",
            ErrorMode::Default | ErrorMode::Lax => "NULL ON ERROR",
        }
    }

    pub fn render_path(&self, path: &QueryPath) -> String {
        match self {
            ErrorMode::Default => path.to_singleton_string(true),
            ErrorMode::Lax => path.to_lax_string(),
            ErrorMode::ScalarRequired => path.to_singleton_string(false),
        }
    }
}

/// Read a boolean flag such as `$lax`.
pub(crate) fn flag(key: &str, node: &JsonNode) -> QbeResult<bool> {
    node.as_bool()
        .ok_or_else(|| QbeError::type_mismatch(key, "boolean", node.kind_name()))
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}
