//! Operator context: turning `{"$gt": 1, "$not": {...}, "$upper": {...}}` into
//! pending leaves for one field.

use super::builder::{Pending, PendingLeaf, Scope, TreeBuilder};
use super::{NodeOp, Predicate};
use crate::clauses::{SpatialClause, TextClause};
use crate::error::{QbeError, QbeResult};
use crate::operators::{classify, Keyword, Modifier, QbeOperator};
use crate::path::QueryPath;
use crate::value::{JsonNode, ValueTypePair};

/// What encloses an operator: at most one modifier and at most one `$not`.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct OperandContext {
    modifier: Option<Modifier>,
    negated: bool,
}

impl TreeBuilder {
    pub(super) fn collect_operators(
        &mut self,
        path: &QueryPath,
        field: &str,
        members: &[(String, JsonNode)],
        ctx: OperandContext,
        scope: Scope,
        out: &mut Vec<Pending>,
    ) -> QbeResult<()> {
        for (key, operand) in members {
            match classify(key) {
                Some(Keyword::Operator(op)) => {
                    let leaves = self.operator_leaves(path, key, op, operand, ctx)?;
                    out.extend(leaves.into_iter().map(Pending::Leaf));
                }
                Some(Keyword::Not) => {
                    if ctx.negated {
                        return Err(QbeError::NestedModifier {
                            outer: "$not".to_string(),
                            inner: key.clone(),
                        });
                    }
                    if let Some(outer) = ctx.modifier {
                        return Err(QbeError::NestedModifier {
                            outer: outer.keyword().to_string(),
                            inner: key.clone(),
                        });
                    }
                    let inner = operator_object(key, operand)?;
                    let mut negated = Vec::new();
                    let inner_ctx = OperandContext {
                        negated: true,
                        ..ctx
                    };
                    self.collect_operators(path, field, inner, inner_ctx, scope, &mut negated)?;

                    // !(a && b) == (!a || !b)
                    let mut leaves: Vec<PendingLeaf> = negated
                        .into_iter()
                        .flat_map(|pending| match pending {
                            Pending::Leaf(leaf) => vec![leaf],
                            Pending::Disjunction(leaves) => leaves,
                        })
                        .collect();
                    match leaves.len() {
                        0 => {}
                        1 => out.extend(leaves.pop().map(Pending::Leaf)),
                        _ => out.push(Pending::Disjunction(leaves)),
                    }
                }
                Some(Keyword::Modifier(m)) => {
                    if let Some(outer) = ctx.modifier {
                        return Err(QbeError::NestedModifier {
                            outer: outer.keyword().to_string(),
                            inner: key.clone(),
                        });
                    }
                    self.tree.requires_modern |= m.requires_modern();
                    let inner_ctx = OperandContext {
                        modifier: Some(m),
                        ..ctx
                    };
                    match operand {
                        JsonNode::Object(inner) => {
                            if inner.is_empty() {
                                return Err(QbeError::EmptyContent(key.clone()));
                            }
                            self.collect_operators(path, field, inner, inner_ctx, scope, out)?;
                        }
                        JsonNode::Array(_) => {
                            return Err(QbeError::type_mismatch(key, "object or scalar", "array"));
                        }
                        scalar => {
                            let leaves =
                                self.operator_leaves(path, key, QbeOperator::Eq, scalar, inner_ctx)?;
                            out.extend(leaves.into_iter().map(Pending::Leaf));
                        }
                    }
                }
                Some(Keyword::Spatial(op)) => {
                    self.check_side_channel(key, members, ctx, scope)?;
                    let clause = SpatialClause::parse(path.clone(), op, operand)?;
                    self.tree.spatial.push(clause);
                }
                Some(Keyword::Contains) => {
                    self.check_side_channel(key, members, ctx, scope)?;
                    let clause = TextClause::parse(path.clone(), operand)?;
                    self.tree.text.push(clause);
                }
                Some(_) => return Err(QbeError::MisplacedOperator(key.clone())),
                None if key.starts_with('$') => return Err(QbeError::UnknownOperator(key.clone())),
                None => return Err(QbeError::MixedDownscope(field.to_string())),
            }
        }
        Ok(())
    }

    /// Spatial and full-text operators must apply to a top-level field, on
    /// their own, with no `$not` or modifier around them.
    fn check_side_channel(
        &self,
        key: &str,
        members: &[(String, JsonNode)],
        ctx: OperandContext,
        scope: Scope,
    ) -> QbeResult<()> {
        self.require_top_level(key, scope)?;
        if ctx.negated || ctx.modifier.is_some() || members.len() != 1 {
            return Err(QbeError::MisplacedOperator(key.to_string()));
        }
        Ok(())
    }

    /// Lower one operator application to leaves. `key` names the operator (or
    /// the field, for implicit equality) in diagnostics.
    pub(super) fn operator_leaves(
        &mut self,
        path: &QueryPath,
        key: &str,
        op: QbeOperator,
        operand: &JsonNode,
        ctx: OperandContext,
    ) -> QbeResult<Vec<PendingLeaf>> {
        self.tree.requires_modern |= op.requires_modern();
        let leaf = |node_op: NodeOp, not: bool, values: Vec<ValueTypePair>| PendingLeaf {
            op: node_op,
            predicate: Predicate {
                path: path.clone(),
                modifier: ctx.modifier,
            },
            not: not ^ ctx.negated,
            values,
        };

        let leaves = match op {
            QbeOperator::In | QbeOperator::Nin | QbeOperator::All => {
                let values = scalar_list(key, operand)?
                    .into_iter()
                    .map(|v| coerce(key, v, ctx))
                    .collect::<QbeResult<Vec<_>>>()?;
                let node_op = if op == QbeOperator::All {
                    NodeOp::All
                } else {
                    NodeOp::In
                };
                vec![leaf(node_op, op == QbeOperator::Nin, values)]
            }
            QbeOperator::Exists => {
                let exists = ValueTypePair::from_node(key, operand)?.is_truthy();
                vec![leaf(NodeOp::Exists, !exists, Vec::new())]
            }
            QbeOperator::Between => {
                let bounds = operand
                    .as_array()
                    .ok_or_else(|| QbeError::type_mismatch(key, "array", operand.kind_name()))?;
                let [lo, hi] = bounds else {
                    return Err(QbeError::literal(key, "expected exactly two bounds"));
                };
                let lo = ValueTypePair::from_node(key, lo)?;
                let hi = ValueTypePair::from_node(key, hi)?;
                if lo.is_null() && hi.is_null() {
                    return Err(QbeError::literal(key, "both bounds are null"));
                }
                let mut leaves = Vec::with_capacity(2);
                if !lo.is_null() {
                    leaves.push(leaf(NodeOp::Gte, false, vec![coerce(key, lo, ctx)?]));
                }
                if !hi.is_null() {
                    leaves.push(leaf(NodeOp::Lte, false, vec![coerce(key, hi, ctx)?]));
                }
                leaves
            }
            _ => {
                let value = ValueTypePair::from_node(key, operand)?;
                if op.requires_string() && !matches!(operand, JsonNode::String(_)) {
                    return Err(QbeError::type_mismatch(key, "string", operand.kind_name()));
                }
                let (node_op, not) = comparison(op)
                    .ok_or_else(|| QbeError::MisplacedOperator(key.to_string()))?;
                vec![leaf(node_op, not, vec![coerce(key, value, ctx)?])]
            }
        };
        Ok(leaves)
    }
}

/// Node operator and negation for single-operand comparisons.
fn comparison(op: QbeOperator) -> Option<(NodeOp, bool)> {
    let mapped = match op {
        QbeOperator::Eq => (NodeOp::Eq, false),
        QbeOperator::Ne => (NodeOp::Eq, true),
        QbeOperator::Gt => (NodeOp::Gt, false),
        QbeOperator::Gte => (NodeOp::Gte, false),
        QbeOperator::Lt => (NodeOp::Lt, false),
        QbeOperator::Lte => (NodeOp::Lte, false),
        QbeOperator::StartsWith => (NodeOp::StartsWith, false),
        QbeOperator::Regex => (NodeOp::Regex, false),
        QbeOperator::Like => (NodeOp::Like, false),
        QbeOperator::HasSubstring => (NodeOp::HasSubstring, false),
        QbeOperator::In | QbeOperator::Nin | QbeOperator::All | QbeOperator::Exists | QbeOperator::Between => {
            return None
        }
    };
    Some(mapped)
}

/// A non-empty operator object, as required under `$not`.
fn operator_object<'a>(key: &str, operand: &'a JsonNode) -> QbeResult<&'a [(String, JsonNode)]> {
    let members = operand
        .as_object()
        .ok_or_else(|| QbeError::type_mismatch(key, "object", operand.kind_name()))?;
    if members.is_empty() {
        return Err(QbeError::EmptyContent(key.to_string()));
    }
    Ok(members)
}

fn scalar_list(key: &str, operand: &JsonNode) -> QbeResult<Vec<ValueTypePair>> {
    let items = operand
        .as_array()
        .ok_or_else(|| QbeError::type_mismatch(key, "array", operand.kind_name()))?;
    if items.is_empty() {
        return Err(QbeError::EmptyContent(key.to_string()));
    }
    items
        .iter()
        .map(|item| ValueTypePair::from_node(key, item))
        .collect()
}

/// Apply `$date` / `$timestamp` literal coercion.
fn coerce(key: &str, value: ValueTypePair, ctx: OperandContext) -> QbeResult<ValueTypePair> {
    match ctx.modifier {
        Some(Modifier::Date) if !value.is_null() => value.into_date(key),
        Some(Modifier::Timestamp) if !value.is_null() => value.into_timestamp(key),
        _ => Ok(value),
    }
}
