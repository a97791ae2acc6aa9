//! `$orderby` parsing and rendering.
//!
//! Two input shapes are accepted:
//!
//! - map form: `{"a": 1, "b.c": -2}`; the absolute value gives the sort
//!   position, the sign gives the direction, ties keep document order
//! - field list: `{"$fields": [{"path": "a", "datatype": "number", "order": "desc"}],
//!   "$lax": false, "$scalarRequired": false}`, or a bare array of field entries

use super::{flag, quote_ident, ErrorMode, KeyColumn};
use crate::config::KeyType;
use crate::error::{QbeError, QbeResult};
use crate::path::QueryPath;
use crate::value::JsonNode;

const CLAUSE: &str = "$orderby";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Varchar,
    Number,
    Date,
    Timestamp,
}

impl OrderByType {
    fn parse(name: &str) -> QbeResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "varchar" | "varchar2" | "string" => Ok(OrderByType::Varchar),
            "number" => Ok(OrderByType::Number),
            "date" => Ok(OrderByType::Date),
            "datetime" | "timestamp" => Ok(OrderByType::Timestamp),
            _ => Err(QbeError::literal(
                "datatype",
                format!("unsupported order by datatype '{}'", name),
            )),
        }
    }

    pub fn returning(&self, max_length: Option<u32>) -> String {
        match self {
            OrderByType::Varchar => format!("VARCHAR2({})", max_length.unwrap_or(4000)),
            OrderByType::Number => "NUMBER".to_string(),
            OrderByType::Date => "DATE".to_string(),
            OrderByType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn matches_key(&self, key_type: KeyType) -> bool {
        matches!(
            (self, key_type),
            (OrderByType::Varchar, KeyType::Varchar) | (OrderByType::Number, KeyType::Number)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(node: &JsonNode) -> QbeResult<Self> {
        match node {
            JsonNode::String(s) => match s.to_ascii_lowercase().as_str() {
                "asc" => Ok(SortOrder::Asc),
                "desc" => Ok(SortOrder::Desc),
                _ => Err(QbeError::literal("order", format!("'{}' is not asc or desc", s))),
            },
            JsonNode::Number(n) => match n.as_i64() {
                Some(v) if v > 0 => Ok(SortOrder::Asc),
                Some(v) if v < 0 => Ok(SortOrder::Desc),
                _ => Err(QbeError::literal("order", format!("'{}' is not 1 or -1", n))),
            },
            other => Err(QbeError::type_mismatch("order", "string or number", other.kind_name())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByEntry {
    pub path: QueryPath,
    pub datatype: Option<OrderByType>,
    pub order: SortOrder,
    pub max_length: Option<u32>,
    pub sort_by_min_max: bool,
}

impl OrderByEntry {
    fn new(path: QueryPath, order: SortOrder) -> Self {
        Self {
            path,
            datatype: None,
            order,
            max_length: None,
            sort_by_min_max: false,
        }
    }

    fn parse(node: &JsonNode) -> QbeResult<Self> {
        let members = node
            .as_object()
            .ok_or_else(|| QbeError::type_mismatch("$fields", "object", node.kind_name()))?;

        let mut path = None;
        let mut entry = OrderByEntry::new(QueryPath::root(), SortOrder::Asc);
        for (key, value) in members {
            match key.as_str() {
                "path" => {
                    let text = value
                        .as_str()
                        .ok_or_else(|| QbeError::type_mismatch("path", "string", value.kind_name()))?;
                    path = Some(singleton_path(text)?);
                }
                "datatype" => {
                    let name = value.as_str().ok_or_else(|| {
                        QbeError::type_mismatch("datatype", "string", value.kind_name())
                    })?;
                    entry.datatype = Some(OrderByType::parse(name)?);
                }
                "order" => entry.order = SortOrder::parse(value)?,
                "maxLength" => {
                    let length = match value {
                        JsonNode::Number(n) => n.as_u64().filter(|v| *v > 0 && *v <= u32::MAX as u64),
                        other => {
                            return Err(QbeError::type_mismatch("maxLength", "number", other.kind_name()))
                        }
                    };
                    entry.max_length = Some(length.ok_or_else(|| {
                        QbeError::literal("maxLength", "must be a positive integer")
                    })? as u32);
                }
                "sortByMinMax" => entry.sort_by_min_max = flag(key, value)?,
                _ => return Err(QbeError::UnknownOperator(key.clone())),
            }
        }
        entry.path = path.ok_or_else(|| QbeError::literal("$fields", "entry has no path"))?;
        Ok(entry)
    }

    fn returning(&self) -> Option<String> {
        match (self.datatype, self.max_length) {
            (Some(datatype), max_length) => Some(datatype.returning(max_length)),
            (None, Some(max_length)) => Some(format!("VARCHAR2({})", max_length)),
            (None, None) => None,
        }
    }

    fn render(&self, content_column: &str, mode: ErrorMode) -> String {
        let path = if self.sort_by_min_max {
            let aggregate = match self.order {
                SortOrder::Asc => "min()",
                SortOrder::Desc => "max()",
            };
            format!("{}.{}", self.path.to_lax_string(), aggregate)
        } else {
            mode.render_path(&self.path)
        };

        let mut sql = format!("JSON_VALUE({}, '{}'", quote_ident(content_column), path);
        if let Some(returning) = self.returning() {
            sql.push_str(" RETURNING ");
            sql.push_str(&returning);
        }
        sql.push(' ');
        sql.push_str(mode.on_error());
        sql.push_str(") ");
        sql.push_str(self.order.as_sql());
        sql
    }
}

/// A parsed `$orderby` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBySpec {
    pub entries: Vec<OrderByEntry>,
    pub error_mode: ErrorMode,
}

impl OrderBySpec {
    pub(crate) fn parse(node: &JsonNode) -> QbeResult<Self> {
        match node {
            JsonNode::Object(members) if members.iter().any(|(k, _)| k == "$fields") => {
                Self::parse_field_list(members)
            }
            JsonNode::Object(members) => Self::parse_map(members),
            JsonNode::Array(items) => Ok(Self {
                entries: parse_entries(items)?,
                error_mode: ErrorMode::Default,
            }),
            other => Err(QbeError::type_mismatch(CLAUSE, "object or array", other.kind_name())),
        }
    }

    fn parse_map(members: &[(String, JsonNode)]) -> QbeResult<Self> {
        if members.is_empty() {
            return Err(QbeError::EmptyContent(CLAUSE.to_string()));
        }
        let mut ranked = Vec::with_capacity(members.len());
        for (key, value) in members {
            if key.starts_with('$') {
                return Err(QbeError::UnknownOperator(key.clone()));
            }
            let rank = match value {
                JsonNode::Number(n) => n.as_i64().filter(|v| *v != 0).ok_or_else(|| {
                    QbeError::literal(key, "order by position must be a non-zero integer")
                })?,
                other => return Err(QbeError::type_mismatch(key, "number", other.kind_name())),
            };
            let order = if rank < 0 { SortOrder::Desc } else { SortOrder::Asc };
            ranked.push((rank.unsigned_abs(), OrderByEntry::new(singleton_path(key)?, order)));
        }
        ranked.sort_by_key(|(rank, _)| *rank);
        Ok(Self {
            entries: ranked.into_iter().map(|(_, entry)| entry).collect(),
            error_mode: ErrorMode::Default,
        })
    }

    fn parse_field_list(members: &[(String, JsonNode)]) -> QbeResult<Self> {
        let mut entries = None;
        let mut lax = false;
        let mut scalar_required = false;
        for (key, value) in members {
            match key.as_str() {
                "$fields" => {
                    if entries.is_some() {
                        return Err(QbeError::MultipleClauses(key.clone()));
                    }
                    let items = value
                        .as_array()
                        .ok_or_else(|| QbeError::type_mismatch(key, "array", value.kind_name()))?;
                    entries = Some(parse_entries(items)?);
                }
                "$lax" => lax = flag(key, value)?,
                "$scalarRequired" => scalar_required = flag(key, value)?,
                _ if key.starts_with('$') => return Err(QbeError::UnknownOperator(key.clone())),
                _ => return Err(QbeError::MisplacedOperator(key.clone())),
            }
        }
        Ok(Self {
            entries: entries.unwrap_or_default(),
            error_mode: ErrorMode::from_flags(CLAUSE, lax, scalar_required)?,
        })
    }

    /// Comma-separated ORDER BY list, without the `ORDER BY` keywords.
    pub fn render(&self, content_column: &str, key: Option<&KeyColumn>, strict_types: bool) -> String {
        if let Some(sql) = self.primary_key_rewrite(key, strict_types) {
            return sql;
        }
        self.entries
            .iter()
            .map(|entry| entry.render(content_column, self.error_mode))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Order directly by the key column when the only entry is the materialized id.
    fn primary_key_rewrite(&self, key: Option<&KeyColumn>, strict_types: bool) -> Option<String> {
        let key = key?;
        let [entry] = self.entries.as_slice() else {
            return None;
        };
        if entry.path != key.path || entry.sort_by_min_max || self.error_mode == ErrorMode::Lax {
            return None;
        }
        let type_ok = match entry.datatype {
            None => true,
            Some(datatype) => !strict_types || datatype.matches_key(key.key_type),
        };
        if !type_ok {
            return None;
        }
        Some(format!("{} {}", quote_ident(&key.column), entry.order.as_sql()))
    }
}

fn parse_entries(items: &[JsonNode]) -> QbeResult<Vec<OrderByEntry>> {
    if items.is_empty() {
        return Err(QbeError::EmptyContent("$fields".to_string()));
    }
    items.iter().map(OrderByEntry::parse).collect()
}

fn singleton_path(text: &str) -> QbeResult<QueryPath> {
    let path = QueryPath::parse(text)?;
    if !path.is_singleton() {
        return Err(QbeError::SingletonPathRequired(text.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(text: &str) -> QbeResult<OrderBySpec> {
        OrderBySpec::parse(&JsonNode::from_slice(text.as_bytes()).unwrap())
    }

    fn key_column() -> KeyColumn {
        KeyColumn {
            path: QueryPath::parse("_id").unwrap(),
            column: "ID".to_string(),
            key_type: KeyType::Varchar,
        }
    }

    // ==================== Map form ====================

    #[test]
    fn test_map_form_orders_by_abs_value() {
        let spec = spec(r#"{"b": -2, "a": 1, "c": 2}"#).unwrap();
        let paths: Vec<String> = spec.entries.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["a", "b", "c"]);
        assert_eq!(spec.entries[1].order, SortOrder::Desc);
        assert_eq!(spec.entries[2].order, SortOrder::Asc);
    }

    #[test]
    fn test_map_form_render() {
        let spec = spec(r#"{"name": 1, "age": -2}"#).unwrap();
        assert_eq!(
            spec.render("JSON_DOCUMENT", None, true),
            "JSON_VALUE(\"JSON_DOCUMENT\", '$.name[0]' NULL ON ERROR) ASC, \
             JSON_VALUE(\"JSON_DOCUMENT\", '$.age[0]' NULL ON ERROR) DESC"
        );
    }

    #[test]
    fn test_map_form_rejects_zero_and_arrays() {
        assert!(matches!(spec(r#"{"a": 0}"#), Err(QbeError::InvalidLiteral { .. })));
        assert!(matches!(
            spec(r#"{"a[0]": 1}"#),
            Err(QbeError::SingletonPathRequired(_))
        ));
        assert!(matches!(spec("{}"), Err(QbeError::EmptyContent(_))));
    }

    // ==================== Field list ====================

    #[test]
    fn test_field_list_render() {
        let spec = spec(
            r#"{"$fields": [
                {"path": "price", "datatype": "number", "order": "desc"},
                {"path": "name", "datatype": "varchar2", "maxLength": 100}
            ], "$scalarRequired": true}"#,
        )
        .unwrap();
        assert_eq!(spec.error_mode, ErrorMode::ScalarRequired);
        assert_eq!(
            spec.render("DOC", None, true),
            "JSON_VALUE(\"DOC\", '$.price' RETURNING NUMBER ERROR ON ERROR) DESC, \
             JSON_VALUE(\"DOC\", '$.name' RETURNING VARCHAR2(100) ERROR ON ERROR) ASC"
        );
    }

    #[test]
    fn test_sort_by_min_max() {
        let spec = spec(
            r#"{"$fields": [{"path": "scores", "datatype": "number", "order": -1, "sortByMinMax": true}]}"#,
        )
        .unwrap();
        assert_eq!(
            spec.render("DOC", None, true),
            "JSON_VALUE(\"DOC\", '$.scores.max()' RETURNING NUMBER NULL ON ERROR) DESC"
        );
    }

    #[test]
    fn test_conflicting_flags() {
        let err = spec(r#"{"$fields": [{"path": "a"}], "$lax": true, "$scalarRequired": true}"#)
            .unwrap_err();
        assert!(matches!(err, QbeError::ConflictingErrorClauses(_)));
    }

    #[test]
    fn test_field_list_errors() {
        assert!(matches!(
            spec(r#"{"$fields": [{"path": "a", "datatype": "blob"}]}"#),
            Err(QbeError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            spec(r#"{"$fields": [{"path": "a", "colour": "red"}]}"#),
            Err(QbeError::UnknownOperator(_))
        ));
        assert!(matches!(
            spec(r#"{"$fields": []}"#),
            Err(QbeError::EmptyContent(_))
        ));
        assert!(matches!(
            spec(r#"{"$fields": [{"datatype": "number"}]}"#),
            Err(QbeError::InvalidLiteral { .. })
        ));
    }

    // ==================== Primary key rewrite ====================

    #[test]
    fn test_primary_key_rewrite() {
        let key = key_column();
        let spec = spec(r#"{"_id": -1}"#).unwrap();
        assert_eq!(spec.render("DOC", Some(&key), true), "\"ID\" DESC");
    }

    #[test]
    fn test_primary_key_rewrite_requires_materialized_key() {
        let spec = spec(r#"{"_id": 1}"#).unwrap();
        assert_eq!(
            spec.render("DOC", None, true),
            "JSON_VALUE(\"DOC\", '$._id[0]' NULL ON ERROR) ASC"
        );
    }

    #[test]
    fn test_primary_key_rewrite_type_check() {
        let key = key_column();
        let spec = spec(r#"{"$fields": [{"path": "_id", "datatype": "number"}]}"#).unwrap();
        assert!(spec.render("DOC", Some(&key), true).starts_with("JSON_VALUE"));
        assert_eq!(spec.render("DOC", Some(&key), false), "\"ID\" ASC");
    }

    #[test]
    fn test_primary_key_rewrite_skipped_for_lax_and_multiple_entries() {
        let key = key_column();
        let lax = spec(r#"{"$fields": [{"path": "_id"}], "$lax": true}"#).unwrap();
        assert!(lax.render("DOC", Some(&key), true).starts_with("JSON_VALUE"));

        let two = spec(r#"{"_id": 1, "name": 2}"#).unwrap();
        assert!(two.render("DOC", Some(&key), true).starts_with("JSON_VALUE"));
    }
}
