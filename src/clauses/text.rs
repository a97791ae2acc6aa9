//! Full-text search: `$contains`.

use super::{quote_ident, SqlFragment};
use crate::error::{QbeError, QbeResult};
use crate::path::QueryPath;
use crate::value::{BindValue, JsonNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextClause {
    pub path: QueryPath,
    pub search: String,
}

impl TextClause {
    pub(crate) fn parse(path: QueryPath, operand: &JsonNode) -> QbeResult<Self> {
        match operand {
            JsonNode::String(s) if s.trim().is_empty() => {
                Err(QbeError::EmptyContent("$contains".to_string()))
            }
            JsonNode::String(s) => Ok(Self {
                path,
                search: s.clone(),
            }),
            other => Err(QbeError::type_mismatch("$contains", "string", other.kind_name())),
        }
    }

    pub fn render(&self, content_column: &str) -> SqlFragment {
        SqlFragment::new(
            format!(
                "JSON_TEXTCONTAINS({}, '{}', ?)",
                quote_ident(content_column),
                self.path.to_lax_string()
            ),
            vec![BindValue::String(self.search.clone())],
        )
    }
}
