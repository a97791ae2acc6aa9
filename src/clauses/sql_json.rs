//! `$sqlJson`: index-friendly `JSON_VALUE` comparisons.
//!
//! Only the restricted operator set is accepted: `$eq $ne $gt $gte $lt $lte`,
//! optionally under one of `$number $string $date $timestamp`, which selects the
//! `RETURNING` type.

use tracing::trace;

use super::{quote_ident, SqlFragment};
use crate::error::{QbeError, QbeResult};
use crate::operators::{classify, Keyword, Modifier, QbeOperator};
use crate::path::QueryPath;
use crate::value::{JsonNode, ScalarValue, ValueTypePair};

const CLAUSE: &str = "$sqlJson";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlJsonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl SqlJsonOp {
    fn from_operator(op: QbeOperator) -> Option<Self> {
        match op {
            QbeOperator::Eq => Some(SqlJsonOp::Eq),
            QbeOperator::Ne => Some(SqlJsonOp::Ne),
            QbeOperator::Gt => Some(SqlJsonOp::Gt),
            QbeOperator::Gte => Some(SqlJsonOp::Gte),
            QbeOperator::Lt => Some(SqlJsonOp::Lt),
            QbeOperator::Lte => Some(SqlJsonOp::Lte),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlJsonOp::Eq => "=",
            SqlJsonOp::Ne => "<>",
            SqlJsonOp::Gt => ">",
            SqlJsonOp::Gte => ">=",
            SqlJsonOp::Lt => "<",
            SqlJsonOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlJsonClause {
    pub path: QueryPath,
    pub op: SqlJsonOp,
    pub returning: Option<Modifier>,
    pub operand: ValueTypePair,
}

impl SqlJsonClause {
    fn new(
        path: &QueryPath,
        op: SqlJsonOp,
        returning: Option<Modifier>,
        key: &str,
        operand: &JsonNode,
    ) -> QbeResult<Self> {
        let pair = ValueTypePair::from_node(key, operand)?;
        if pair.is_null() {
            return Err(QbeError::type_mismatch(key, "non-null scalar", "null"));
        }
        let operand = match returning {
            Some(Modifier::Date) => pair.into_date(key)?,
            Some(Modifier::Timestamp) => pair.into_timestamp(key)?,
            _ => pair,
        };
        Ok(Self {
            path: path.clone(),
            op,
            returning,
            operand,
        })
    }

    fn returning_type(&self) -> Option<&'static str> {
        match self.returning.and_then(|m| m.returning_type()) {
            Some(t) => Some(t),
            None if matches!(self.operand.value(), ScalarValue::Number(_)) => Some("NUMBER"),
            None => None,
        }
    }

    pub fn render(&self, content_column: &str) -> SqlFragment {
        let mut sql = format!(
            "JSON_VALUE({}, '{}'",
            quote_ident(content_column),
            self.path.to_singleton_string(false)
        );
        if let Some(returning) = self.returning_type() {
            sql.push_str(" RETURNING ");
            sql.push_str(returning);
        }
        sql.push_str(" ERROR ON ERROR NULL ON EMPTY) ");
        sql.push_str(self.op.as_sql());
        sql.push(' ');

        let mut binds = Vec::new();
        match (self.operand.value(), self.operand.to_bind()) {
            (ScalarValue::Boolean(b), _) => sql.push_str(&format!("'{}'", b)),
            (_, Some(bind)) => {
                sql.push_str(self.operand.conversion().placeholder());
                binds.push(bind);
            }
            (_, None) => sql.push_str("null"),
        }
        SqlFragment::new(sql, binds)
    }
}

pub(crate) fn parse_sql_json(node: &JsonNode) -> QbeResult<Vec<SqlJsonClause>> {
    let members = node
        .as_object()
        .ok_or_else(|| QbeError::type_mismatch(CLAUSE, "object", node.kind_name()))?;
    if members.is_empty() {
        return Err(QbeError::EmptyContent(CLAUSE.to_string()));
    }

    let mut clauses = Vec::new();
    for (field, value) in members {
        match classify(field) {
            Some(_) => return Err(QbeError::MisplacedOperator(field.clone())),
            None if field.starts_with('$') => return Err(QbeError::UnknownOperator(field.clone())),
            None => {}
        }
        let path = QueryPath::parse(field)?;
        if !path.is_singleton() {
            return Err(QbeError::SingletonPathRequired(field.clone()));
        }
        trace!("$sqlJson field '{}'", path);

        match value {
            JsonNode::Object(ops) if ops.is_empty() => {
                return Err(QbeError::EmptyContent(field.clone()));
            }
            JsonNode::Object(ops) => collect(&path, ops, None, &mut clauses)?,
            JsonNode::Array(_) => {
                return Err(QbeError::type_mismatch(field, "scalar or object", "array"));
            }
            scalar => clauses.push(SqlJsonClause::new(&path, SqlJsonOp::Eq, None, field, scalar)?),
        }
    }
    Ok(clauses)
}

fn collect(
    path: &QueryPath,
    ops: &[(String, JsonNode)],
    modifier: Option<Modifier>,
    out: &mut Vec<SqlJsonClause>,
) -> QbeResult<()> {
    for (key, value) in ops {
        match classify(key) {
            Some(Keyword::Operator(op)) => {
                let op = SqlJsonOp::from_operator(op)
                    .ok_or_else(|| QbeError::MisplacedOperator(key.clone()))?;
                out.push(SqlJsonClause::new(path, op, modifier, key, value)?);
            }
            Some(Keyword::Modifier(m)) if m.returning_type().is_some() => {
                if let Some(outer) = modifier {
                    return Err(QbeError::NestedModifier {
                        outer: outer.keyword().to_string(),
                        inner: key.clone(),
                    });
                }
                match value {
                    JsonNode::Object(inner) if inner.is_empty() => {
                        return Err(QbeError::EmptyContent(key.clone()));
                    }
                    JsonNode::Object(inner) => collect(path, inner, Some(m), out)?,
                    JsonNode::Array(_) => {
                        return Err(QbeError::type_mismatch(key, "scalar or object", "array"));
                    }
                    scalar => out.push(SqlJsonClause::new(path, SqlJsonOp::Eq, Some(m), key, scalar)?),
                }
            }
            Some(_) => return Err(QbeError::MisplacedOperator(key.clone())),
            None if key.starts_with('$') => return Err(QbeError::UnknownOperator(key.clone())),
            None => return Err(QbeError::MisplacedOperator(key.clone())),
        }
    }
    Ok(())
}
