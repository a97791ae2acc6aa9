//! `$id` key restriction.

use super::{quote_ident, SqlFragment};
use crate::config::KeyType;
use crate::error::{QbeError, QbeResult};
use crate::path::QueryPath;
use crate::value::{BindValue, JsonNode};

/// The key column and the content path it is materialized from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub path: QueryPath,
    pub column: String,
    pub key_type: KeyType,
}

/// Collect `$id` keys. Duplicates collapse to their first occurrence.
pub(crate) fn parse_keys(node: &JsonNode) -> QbeResult<Vec<BindValue>> {
    let mut keys = Vec::new();
    match node {
        JsonNode::Array(items) => {
            if items.is_empty() {
                return Err(QbeError::EmptyContent("$id".to_string()));
            }
            for item in items {
                let key = key_value(item)?;
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        other => keys.push(key_value(other)?),
    }
    Ok(keys)
}

fn key_value(node: &JsonNode) -> QbeResult<BindValue> {
    match node {
        JsonNode::String(s) => Ok(BindValue::String(s.clone())),
        JsonNode::Number(n) => Ok(BindValue::Number(n.clone())),
        other => Err(QbeError::type_mismatch(
            "$id",
            "string or number",
            other.kind_name(),
        )),
    }
}

/// `"<key>" = ?` for one key, `"<key>" in (?, ?, ...)` for several.
pub fn render_keys(keys: &[BindValue], key_column: &str) -> Option<SqlFragment> {
    let sql = match keys.len() {
        0 => return None,
        1 => format!("{} = ?", quote_ident(key_column)),
        n => format!(
            "{} in ({})",
            quote_ident(key_column),
            vec!["?"; n].join(", ")
        ),
    };
    Some(SqlFragment::new(sql, keys.to_vec()))
}
