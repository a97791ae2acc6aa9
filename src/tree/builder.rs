//! Filter document → `AndOrTree`.
//!
//! The builder walks the filter once, threading the insertion point (`parent`)
//! and the scope through every call. Filter context handles connectives and field
//! names; operator context (see `field.rs`) turns an operator object into leaves.

use tracing::{debug, trace};

use super::{AndOrTree, NodeId, NodeOp, Predicate};
use crate::clauses::{parse_keys, parse_sql_json, OrderBySpec};
use crate::error::{QbeError, QbeResult};
use crate::operators::{classify, Keyword, QbeOperator};
use crate::path::QueryPath;
use crate::value::{JsonNode, ValueTypePair};

/// Where a filter object sits. Top-level-only clauses (`$id`, `$sqlJson`,
/// spatial and full-text operators) are rejected in nested scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Scope {
    TopLevel,
    Nested,
}

/// A leaf waiting to be placed in the tree.
#[derive(Debug)]
pub(super) struct PendingLeaf {
    pub op: NodeOp,
    pub predicate: Predicate,
    pub not: bool,
    pub values: Vec<ValueTypePair>,
}

/// Output of an operator object: single leaves, or the OR produced by
/// distributing `$not` over several leaves.
#[derive(Debug)]
pub(super) enum Pending {
    Leaf(PendingLeaf),
    Disjunction(Vec<PendingLeaf>),
}

pub(crate) struct TreeBuilder {
    pub(super) tree: AndOrTree,
    seen_id: bool,
    seen_sql_json: bool,
}

impl TreeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            tree: AndOrTree::new(),
            seen_id: false,
            seen_sql_json: false,
        }
    }

    pub(crate) fn build(mut self, filter: &JsonNode) -> QbeResult<AndOrTree> {
        let members = filter
            .as_object()
            .ok_or_else(|| QbeError::type_mismatch("filter", "object", filter.kind_name()))?;
        self.load_top_level(members)?;
        Ok(self.tree)
    }

    fn load_top_level(&mut self, members: &[(String, JsonNode)]) -> QbeResult<()> {
        let queries = members.iter().filter(|(k, _)| k == "$query").count();
        if queries > 1 {
            return Err(QbeError::MultipleClauses("$query".to_string()));
        }
        let has_query = queries == 1;
        let root = self.tree.root();

        for (key, value) in members {
            match classify(key) {
                Some(Keyword::Query) => {
                    let inner = value
                        .as_object()
                        .ok_or_else(|| QbeError::type_mismatch(key, "object", value.kind_name()))?;
                    self.load_filter(inner, root, Scope::TopLevel)?;
                }
                Some(Keyword::OrderBy) => {
                    if self.tree.order_by.is_some() {
                        return Err(QbeError::MultipleClauses(key.clone()));
                    }
                    self.tree.order_by = Some(OrderBySpec::parse(value)?);
                }
                Some(Keyword::Envelope) => debug!("skipping envelope key '{}'", key),
                _ if has_query => return Err(QbeError::MixedQueryEnvelope(key.clone())),
                _ => self.load_member(key, value, root, Scope::TopLevel)?,
            }
        }
        Ok(())
    }

    pub(super) fn load_filter(
        &mut self,
        members: &[(String, JsonNode)],
        parent: NodeId,
        scope: Scope,
    ) -> QbeResult<()> {
        for (key, value) in members {
            self.load_member(key, value, parent, scope)?;
        }
        Ok(())
    }

    fn load_member(&mut self, key: &str, value: &JsonNode, parent: NodeId, scope: Scope) -> QbeResult<()> {
        let keyword = classify(key);
        trace!("key '{}' classified as {:?} ({:?})", key, keyword, scope);
        match keyword {
            Some(Keyword::And) => self.load_connective(key, NodeOp::And, false, value, parent),
            Some(Keyword::Or) => self.load_connective(key, NodeOp::Or, false, value, parent),
            Some(Keyword::Nor) => self.load_connective(key, NodeOp::Or, true, value, parent),
            Some(Keyword::Not) => {
                let inner = filter_object(key, value)?;
                let group = self.tree.add_group(parent, NodeOp::And, true, None);
                self.load_filter(inner, group, Scope::Nested)
            }
            Some(Keyword::Id) => {
                self.require_top_level(key, scope)?;
                if self.seen_id {
                    return Err(QbeError::MultipleClauses(key.to_string()));
                }
                self.seen_id = true;
                self.tree.keys = parse_keys(value)?;
                Ok(())
            }
            Some(Keyword::SqlJson) => {
                self.require_top_level(key, scope)?;
                if self.seen_sql_json {
                    return Err(QbeError::MultipleClauses(key.to_string()));
                }
                self.seen_sql_json = true;
                self.tree.sql_json = parse_sql_json(value)?;
                Ok(())
            }
            Some(Keyword::Query | Keyword::OrderBy | Keyword::Envelope) => {
                Err(QbeError::NotTopLevel(key.to_string()))
            }
            Some(_) => Err(QbeError::MisplacedOperator(key.to_string())),
            None if key.starts_with('$') => Err(QbeError::UnknownOperator(key.to_string())),
            None => {
                let path = QueryPath::parse(key)?;
                self.load_field(key, path, value, parent, scope)
            }
        }
    }

    pub(super) fn require_top_level(&self, key: &str, scope: Scope) -> QbeResult<()> {
        match scope {
            Scope::TopLevel => Ok(()),
            Scope::Nested => Err(QbeError::NotTopLevel(key.to_string())),
        }
    }

    /// `$and` / `$or` / `$nor` over an array of filter objects.
    fn load_connective(
        &mut self,
        key: &str,
        op: NodeOp,
        not: bool,
        value: &JsonNode,
        parent: NodeId,
    ) -> QbeResult<()> {
        let items = value
            .as_array()
            .ok_or_else(|| QbeError::type_mismatch(key, "array", value.kind_name()))?;
        if items.is_empty() {
            return Err(QbeError::EmptyContent(key.to_string()));
        }

        let group = if !not && self.can_flatten_into(parent, op) {
            parent
        } else {
            self.tree.add_group(parent, op, not, None)
        };

        for item in items {
            let members = filter_object(key, item)?;
            if op == NodeOp::And || members.len() == 1 {
                self.load_filter(members, group, Scope::Nested)?;
            } else {
                let conjunction = self.tree.add_group(group, NodeOp::And, false, None);
                self.load_filter(members, conjunction, Scope::Nested)?;
            }
        }
        Ok(())
    }

    fn can_flatten_into(&self, parent: NodeId, op: NodeOp) -> bool {
        let node = self.tree.node(parent);
        node.op() == op && (op == NodeOp::And || !node.is_not())
    }

    /// A field key: literal equality, implicit `$all`, a downscope object, or an
    /// operator object.
    fn load_field(
        &mut self,
        key: &str,
        path: QueryPath,
        value: &JsonNode,
        parent: NodeId,
        scope: Scope,
    ) -> QbeResult<()> {
        let pending = match value {
            JsonNode::Object(members) => {
                if members.is_empty() {
                    return Err(QbeError::EmptyContent(key.to_string()));
                }
                if is_downscope(key, members)? {
                    let group = self.tree.add_group(parent, NodeOp::And, false, Some(path));
                    return self.load_filter(members, group, Scope::Nested);
                }
                let mut pending = Vec::new();
                self.collect_operators(&path, key, members, Default::default(), scope, &mut pending)?;
                pending
            }
            JsonNode::Array(_) => self
                .operator_leaves(&path, key, QbeOperator::All, value, Default::default())?
                .into_iter()
                .map(Pending::Leaf)
                .collect(),
            scalar => self
                .operator_leaves(&path, key, QbeOperator::Eq, scalar, Default::default())?
                .into_iter()
                .map(Pending::Leaf)
                .collect(),
        };
        self.attach(parent, pending);
        Ok(())
    }

    /// Place the leaves of one field. Several leaves under a parent that is not
    /// a conjunction get an AND of their own; a distributed `$not` joins an
    /// existing plain OR or opens a new one.
    fn attach(&mut self, parent: NodeId, pending: Vec<Pending>) {
        if pending.is_empty() {
            return;
        }
        let target = if pending.len() > 1 && self.tree.node(parent).op() != NodeOp::And {
            self.tree.add_group(parent, NodeOp::And, false, None)
        } else {
            parent
        };

        for item in pending {
            match item {
                Pending::Leaf(leaf) => self.add_leaf(target, leaf),
                Pending::Disjunction(leaves) => {
                    let node = self.tree.node(target);
                    let or = if node.op() == NodeOp::Or && !node.is_not() {
                        target
                    } else {
                        self.tree.add_group(target, NodeOp::Or, false, None)
                    };
                    for leaf in leaves {
                        self.add_leaf(or, leaf);
                    }
                }
            }
        }
    }

    fn add_leaf(&mut self, parent: NodeId, leaf: PendingLeaf) {
        self.tree
            .add_leaf(parent, leaf.op, leaf.predicate, leaf.not, leaf.values);
    }
}

/// A non-empty object where a filter is expected.
fn filter_object<'a>(key: &str, value: &'a JsonNode) -> QbeResult<&'a [(String, JsonNode)]> {
    let members = value
        .as_object()
        .ok_or_else(|| QbeError::type_mismatch(key, "object", value.kind_name()))?;
    if members.is_empty() {
        return Err(QbeError::EmptyContent(key.to_string()));
    }
    Ok(members)
}

/// True when the object's keys are field names or connectives, false when they
/// are operators. Mixing the two is an error.
fn is_downscope(field: &str, members: &[(String, JsonNode)]) -> QbeResult<bool> {
    let mut has_fields = false;
    let mut has_operators = false;
    for (key, _) in members {
        match classify(key) {
            Some(keyword) if keyword.is_connective() => has_fields = true,
            Some(_) => has_operators = true,
            None if key.starts_with('$') => return Err(QbeError::UnknownOperator(key.clone())),
            None => has_fields = true,
        }
    }
    if has_fields && has_operators {
        return Err(QbeError::MixedDownscope(field.to_string()));
    }
    Ok(has_fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> AndOrTree {
        TreeBuilder::new()
            .build(&JsonNode::from_slice(text.as_bytes()).unwrap())
            .unwrap()
    }

    fn error(text: &str) -> QbeError {
        TreeBuilder::new()
            .build(&JsonNode::from_slice(text.as_bytes()).unwrap())
            .unwrap_err()
    }

    // ==================== Filter context ====================

    #[test]
    fn test_fields_conjoin_at_root() {
        assert_eq!(tree(r#"{"a": 1, "b": "x"}"#).describe(), "and(eq a/1, eq b/1)");
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(tree("{}").is_match_all());
        assert!(tree(r#"{"$query": {}}"#).is_match_all());
    }

    #[test]
    fn test_array_value_means_all() {
        assert_eq!(tree(r#"{"tags": ["a", "b"]}"#).describe(), "and(all tags/2)");
    }

    #[test]
    fn test_and_flattens_into_root() {
        assert_eq!(
            tree(r#"{"$and": [{"a": 1}, {"$and": [{"b": 2}]}]}"#).describe(),
            "and(eq a/1, eq b/1)"
        );
    }

    #[test]
    fn test_or_of_single_and_multi_member_objects() {
        assert_eq!(
            tree(r#"{"$or": [{"a": 1}, {"b": 2, "c": 3}]}"#).describe(),
            "and(or(eq a/1, and(eq b/1, eq c/1)))"
        );
    }

    #[test]
    fn test_nested_or_flattens() {
        assert_eq!(
            tree(r#"{"$or": [{"a": 1}, {"$or": [{"b": 2}, {"c": 3}]}]}"#).describe(),
            "and(or(eq a/1, eq b/1, eq c/1))"
        );
    }

    #[test]
    fn test_nor_is_negated_or() {
        assert_eq!(
            tree(r#"{"$nor": [{"a": 1}, {"b": 2}]}"#).describe(),
            "and(!or(eq a/1, eq b/1))"
        );
    }

    #[test]
    fn test_filter_not_is_negated_and() {
        assert_eq!(
            tree(r#"{"$not": {"a": {"$lt": 5}}}"#).describe(),
            "and(!and(lt a/1))"
        );
    }

    #[test]
    fn test_downscope() {
        assert_eq!(
            tree(r#"{"address": {"city": "Paris", "zip": {"$gt": 75000}}}"#).describe(),
            "and(and@address(eq city/1, gt zip/1))"
        );
    }

    #[test]
    fn test_multiple_operators_inside_or_get_and() {
        assert_eq!(
            tree(r#"{"$or": [{"a": {"$gt": 1, "$lt": 5}}, {"b": 1}]}"#).describe(),
            "and(or(and(gt a/1, lt a/1), eq b/1))"
        );
    }

    // ==================== Top-level clauses ====================

    #[test]
    fn test_query_envelope() {
        let t = tree(r#"{"$query": {"a": 1}, "$orderby": {"a": 1}, "$project": {"a": true}}"#);
        assert_eq!(t.describe(), "and(eq a/1)");
        assert!(t.order_by().is_some());
    }

    #[test]
    fn test_query_mixed_with_fields() {
        assert!(matches!(
            error(r#"{"$query": {"a": 1}, "b": 2}"#),
            QbeError::MixedQueryEnvelope(ref k) if k == "b"
        ));
    }

    #[test]
    fn test_repeated_clauses() {
        assert!(matches!(
            error(r#"{"$orderby": {"a": 1}, "$orderby": {"b": 1}}"#),
            QbeError::MultipleClauses(_)
        ));
        assert!(matches!(
            error(r#"{"$query": {}, "$query": {}}"#),
            QbeError::MultipleClauses(_)
        ));
        assert!(matches!(
            error(r#"{"$id": "a", "$id": "b"}"#),
            QbeError::MultipleClauses(_)
        ));
    }

    #[test]
    fn test_id_only_at_top_level() {
        let t = tree(r#"{"$query": {"$id": ["k1", "k2"]}}"#);
        assert_eq!(t.keys().len(), 2);
        assert!(t.is_match_all());
        assert!(matches!(
            error(r#"{"$and": [{"$id": "k1"}]}"#),
            QbeError::NotTopLevel(_)
        ));
    }

    #[test]
    fn test_sql_json_side_channel() {
        let t = tree(r#"{"$sqlJson": {"age": {"$gt": 3}}, "name": "x"}"#);
        assert_eq!(t.sql_json_clauses().len(), 1);
        assert_eq!(t.describe(), "and(eq name/1)");
    }

    // ==================== Errors ====================

    #[test]
    fn test_filter_must_be_object() {
        assert!(matches!(error("[1]"), QbeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_connective_errors() {
        assert!(matches!(error(r#"{"$or": []}"#), QbeError::EmptyContent(_)));
        assert!(matches!(error(r#"{"$or": {"a": 1}}"#), QbeError::TypeMismatch { .. }));
        assert!(matches!(error(r#"{"$and": [{}]}"#), QbeError::EmptyContent(_)));
    }

    #[test]
    fn test_operator_in_filter_context() {
        assert!(matches!(error(r#"{"$gt": 1}"#), QbeError::MisplacedOperator(_)));
        assert!(matches!(error(r#"{"$bogus": 1}"#), QbeError::UnknownOperator(_)));
    }

    #[test]
    fn test_mixed_downscope() {
        assert!(matches!(
            error(r#"{"a": {"b": 1, "$gt": 2}}"#),
            QbeError::MixedDownscope(ref k) if k == "a"
        ));
        assert!(matches!(error(r#"{"a": {}}"#), QbeError::EmptyContent(_)));
    }

    #[test]
    fn test_nested_orderby_rejected() {
        assert!(matches!(
            error(r#"{"$query": {"$orderby": {"a": 1}}}"#),
            QbeError::NotTopLevel(_)
        ));
    }

    #[test]
    fn test_bad_path() {
        assert!(matches!(error(r#"{"a..b": 1}"#), QbeError::InvalidPath { .. }));
    }
}
