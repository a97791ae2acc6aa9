//! The AND/OR tree.
//!
//! A parsed filter is an arena of `AndOrNode`s addressed by `NodeId`. Node 0 is
//! the root and is always an AND node; an AND root without children matches every
//! document. Leaf nodes reference their operands by position: every leaf consumes
//! `value_count` entries of the tree's value array, in depth-first, left-to-right
//! order. The code generator relies on that order when it assigns bind names.
//!
//! Clauses that do not fit inside a `JSON_EXISTS` expression (`$orderby`, `$id`,
//! `$sqlJson`, spatial and full-text operators) are kept in side-channel lists.

mod builder;
mod field;

pub(crate) use builder::TreeBuilder;

use std::fmt::Write as _;

use crate::clauses::{OrderBySpec, SpatialClause, SqlJsonClause, TextClause};
use crate::operators::Modifier;
use crate::path::QueryPath;
use crate::value::{BindValue, ValueTypePair};

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The operation a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOp {
    And,
    Or,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    All,
    Exists,
    StartsWith,
    Regex,
    Like,
    HasSubstring,
}

impl NodeOp {
    pub fn is_group(&self) -> bool {
        matches!(self, NodeOp::And | NodeOp::Or)
    }

    /// SQL/JSON path operator token for binary leaf operators.
    pub fn sql_token(&self) -> &'static str {
        match self {
            NodeOp::And => "&&",
            NodeOp::Or => "||",
            NodeOp::Eq | NodeOp::In | NodeOp::All => "==",
            NodeOp::Gt => ">",
            NodeOp::Gte => ">=",
            NodeOp::Lt => "<",
            NodeOp::Lte => "<=",
            NodeOp::Exists => "exists",
            NodeOp::StartsWith => "starts with",
            NodeOp::Regex => "like_regex",
            NodeOp::Like => "like",
            NodeOp::HasSubstring => "has substring",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NodeOp::And => "and",
            NodeOp::Or => "or",
            NodeOp::Eq => "eq",
            NodeOp::Gt => "gt",
            NodeOp::Gte => "gte",
            NodeOp::Lt => "lt",
            NodeOp::Lte => "lte",
            NodeOp::In => "in",
            NodeOp::All => "all",
            NodeOp::Exists => "exists",
            NodeOp::StartsWith => "startsWith",
            NodeOp::Regex => "regex",
            NodeOp::Like => "like",
            NodeOp::HasSubstring => "hasSubstring",
        }
    }
}

/// The field a leaf tests, plus an optional item-method modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub path: QueryPath,
    pub modifier: Option<Modifier>,
}

impl Predicate {
    /// `@`-relative path with the modifier's item method appended.
    pub fn render(&self) -> String {
        let mut out = self.path.to_query_string('@', false);
        if let Some(m) = self.modifier {
            out.push('.');
            out.push_str(m.item_method());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndOrNode {
    op: NodeOp,
    predicate: Option<Predicate>,
    not: bool,
    value_count: usize,
    downscope: Option<QueryPath>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl AndOrNode {
    pub fn op(&self) -> NodeOp {
        self.op
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn is_not(&self) -> bool {
        self.not
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn downscope(&self) -> Option<&QueryPath> {
        self.downscope.as_ref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// A compiled-but-not-rendered filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AndOrTree {
    nodes: Vec<AndOrNode>,
    values: Vec<ValueTypePair>,
    pub(crate) keys: Vec<BindValue>,
    pub(crate) order_by: Option<OrderBySpec>,
    pub(crate) spatial: Vec<SpatialClause>,
    pub(crate) text: Vec<TextClause>,
    pub(crate) sql_json: Vec<SqlJsonClause>,
    pub(crate) requires_modern: bool,
}

impl AndOrTree {
    pub(crate) fn new() -> Self {
        let root = AndOrNode {
            op: NodeOp::And,
            predicate: None,
            not: false,
            value_count: 0,
            downscope: None,
            children: Vec::new(),
            parent: None,
        };
        Self {
            nodes: vec![root],
            values: Vec::new(),
            keys: Vec::new(),
            order_by: None,
            spatial: Vec::new(),
            text: Vec::new(),
            sql_json: Vec::new(),
            requires_modern: false,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &AndOrNode {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Operands in bind order.
    pub fn values(&self) -> &[ValueTypePair] {
        &self.values
    }

    /// Document keys collected from `$id`.
    pub fn keys(&self) -> &[BindValue] {
        &self.keys
    }

    pub fn order_by(&self) -> Option<&OrderBySpec> {
        self.order_by.as_ref()
    }

    pub fn spatial_clauses(&self) -> &[SpatialClause] {
        &self.spatial
    }

    pub fn text_clauses(&self) -> &[TextClause] {
        &self.text
    }

    pub fn sql_json_clauses(&self) -> &[SqlJsonClause] {
        &self.sql_json
    }

    /// Whether any operator used needs the modern SQL/JSON feature set.
    pub fn requires_modern_sql_json(&self) -> bool {
        self.requires_modern
    }

    /// True when the boolean tree places no restriction on documents.
    pub fn is_match_all(&self) -> bool {
        self.node(self.root()).children.is_empty()
    }

    pub(crate) fn add_group(
        &mut self,
        parent: NodeId,
        op: NodeOp,
        not: bool,
        downscope: Option<QueryPath>,
    ) -> NodeId {
        debug_assert!(op.is_group());
        self.push_node(
            parent,
            AndOrNode {
                op,
                predicate: None,
                not,
                value_count: 0,
                downscope,
                children: Vec::new(),
                parent: Some(parent),
            },
        )
    }

    pub(crate) fn add_leaf(
        &mut self,
        parent: NodeId,
        op: NodeOp,
        predicate: Predicate,
        not: bool,
        values: Vec<ValueTypePair>,
    ) -> NodeId {
        debug_assert!(!op.is_group());
        let value_count = values.len();
        self.values.extend(values);
        self.push_node(
            parent,
            AndOrNode {
                op,
                predicate: Some(predicate),
                not,
                value_count,
                downscope: None,
                children: Vec::new(),
                parent: Some(parent),
            },
        )
    }

    fn push_node(&mut self, parent: NodeId, node: AndOrNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Compact structural dump, e.g. `and(gt a/1, !in b/2)`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_node(self.root(), &mut out);
        out
    }

    fn describe_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        if node.not {
            out.push('!');
        }
        out.push_str(node.op.label());
        if let Some(scope) = &node.downscope {
            let _ = write!(out, "@{}", scope);
        }
        if node.op.is_group() {
            out.push('(');
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.describe_node(*child, out);
            }
            out.push(')');
        } else if let Some(pred) = &node.predicate {
            let _ = write!(out, " {}", pred.path);
            if let Some(m) = pred.modifier {
                let _ = write!(out, ".{}", m.item_method());
            }
            let _ = write!(out, "/{}", node.value_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarValue;

    fn pred(p: &str) -> Predicate {
        Predicate {
            path: QueryPath::parse(p).unwrap(),
            modifier: None,
        }
    }

    #[test]
    fn test_new_tree_matches_all() {
        let tree = AndOrTree::new();
        assert!(tree.is_match_all());
        assert_eq!(tree.node(tree.root()).op(), NodeOp::And);
        assert_eq!(tree.describe(), "and()");
    }

    #[test]
    fn test_arena_links_parents() {
        let mut tree = AndOrTree::new();
        let root = tree.root();
        let or = tree.add_group(root, NodeOp::Or, false, None);
        let leaf = tree.add_leaf(
            or,
            NodeOp::Eq,
            pred("a"),
            true,
            vec![ValueTypePair::new(ScalarValue::Number(1.into()))],
        );
        assert_eq!(tree.node(leaf).parent(), Some(or));
        assert_eq!(tree.node(or).parent(), Some(root));
        assert_eq!(tree.node(root).children(), &[or]);
        assert_eq!(tree.values().len(), 1);
        assert_eq!(tree.describe(), "and(or(!eq a/1))");
    }

    #[test]
    fn test_predicate_render_with_modifier() {
        let p = Predicate {
            path: QueryPath::parse("name").unwrap(),
            modifier: Some(Modifier::Upper),
        };
        assert_eq!(p.render(), "@.name.upper()");
    }
}
