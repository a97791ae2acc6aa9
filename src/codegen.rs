//! JSON_EXISTS expression generation.
//!
//! Walks the AND/OR tree depth-first, left to right, rendering each node into a
//! SQL/JSON path predicate and consuming the tree's value array through a cursor.
//! Literals that cannot be bound reliably (booleans, null and the strings
//! "true"/"false"/"null") are written into the expression; every other value
//! becomes a `$B<n>` variable passed to `JSON_EXISTS`.

use serde::Serialize;

use crate::config::SqlJsonFeatures;
use crate::error::{QbeError, QbeResult};
use crate::tree::{AndOrNode, AndOrTree, NodeId, NodeOp};
use crate::value::{BindConversion, BindValue};

/// One `passing <expr> as "B<n>"` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassingBind {
    pub name: String,
    pub value: BindValue,
    #[serde(skip)]
    pub conversion: BindConversion,
}

impl PassingBind {
    pub fn to_sql(&self) -> String {
        format!("{} as \"{}\"", self.conversion.placeholder(), self.name)
    }
}

/// The rendered boolean expression and its ordered binds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonExistsClause {
    pub expression: String,
    pub binds: Vec<PassingBind>,
}

impl JsonExistsClause {
    /// `JSON_EXISTS("<content>", '$?(<expr>)' passing ? as "B0", ...)`
    pub fn to_sql(&self, content_column: &str) -> String {
        let mut sql = format!(
            "JSON_EXISTS(\"{}\", '$?({})'",
            content_column, self.expression
        );
        if !self.binds.is_empty() {
            let passing: Vec<String> = self.binds.iter().map(PassingBind::to_sql).collect();
            sql.push_str(" passing ");
            sql.push_str(&passing.join(", "));
        }
        sql.push(')');
        sql
    }

    pub fn bind_values(&self) -> Vec<BindValue> {
        self.binds.iter().map(|b| b.value.clone()).collect()
    }
}

pub struct ExpressionGenerator<'a> {
    tree: &'a AndOrTree,
    features: SqlJsonFeatures,
    cursor: usize,
    binds: Vec<PassingBind>,
}

impl<'a> ExpressionGenerator<'a> {
    pub fn new(tree: &'a AndOrTree, features: SqlJsonFeatures) -> Self {
        Self {
            tree,
            features,
            cursor: 0,
            binds: Vec::new(),
        }
    }

    /// Render the tree. Returns `None` for a tree that matches every document.
    pub fn generate(mut self) -> QbeResult<Option<JsonExistsClause>> {
        let tree = self.tree;
        let root = tree.node(tree.root());
        let expression = if root.children().is_empty() {
            None
        } else {
            // The root conjunction sits directly inside `$?( ... )`.
            Some(self.join(root)?)
        };

        let available = self.tree.values().len();
        if self.cursor != available {
            return Err(QbeError::BindCountMismatch {
                consumed: self.cursor,
                available,
            });
        }

        Ok(expression.map(|expression| JsonExistsClause {
            expression,
            binds: self.binds,
        }))
    }

    fn render(&mut self, id: NodeId) -> QbeResult<String> {
        let tree = self.tree;
        let node = tree.node(id);
        match node.predicate() {
            Some(predicate) if !node.op().is_group() => self.render_leaf(node, predicate.render()),
            _ => self.render_group(node),
        }
    }

    fn join(&mut self, node: &AndOrNode) -> QbeResult<String> {
        let separator = match node.op() {
            NodeOp::Or => " || ",
            _ => " && ",
        };
        let mut parts = Vec::with_capacity(node.children().len());
        for child in node.children() {
            parts.push(self.render(*child)?);
        }
        Ok(parts.join(separator))
    }

    fn render_group(&mut self, node: &AndOrNode) -> QbeResult<String> {
        let joined = self.join(node)?;
        let rendered = match (node.downscope(), node.is_not()) {
            (Some(scope), false) => {
                format!("exists({}?({}))", scope.to_query_string('@', true), joined)
            }
            (Some(scope), true) => {
                format!("(!exists({}?({})))", scope.to_query_string('@', true), joined)
            }
            (None, true) if self.wraps_itself(node.children()) => format!("(!{})", joined),
            (None, true) => format!("(!({}))", joined),
            (None, false) if node.children().len() == 1 => joined,
            (None, false) => format!("({})", joined),
        };
        Ok(rendered)
    }

    /// Whether `children` is a single node whose rendering already carries
    /// outer parentheses.
    fn wraps_itself(&self, children: &[NodeId]) -> bool {
        let [only] = children else {
            return false;
        };
        let child = self.tree.node(*only);
        if child.op().is_group() {
            child.is_not() || (child.downscope().is_none() && child.children().len() > 1)
        } else {
            child.is_not()
        }
    }

    fn render_leaf(&mut self, node: &AndOrNode, path: String) -> QbeResult<String> {
        let count = node.value_count();

        let body = match node.op() {
            NodeOp::Exists => {
                return Ok(if node.is_not() {
                    format!("(!exists({}))", path)
                } else {
                    format!("exists({})", path)
                });
            }
            NodeOp::In if count > 1 => match self.features {
                SqlJsonFeatures::Modern => {
                    let operands = self.operands(count)?;
                    format!("{} in ({})", path, operands.join(","))
                }
                SqlJsonFeatures::Legacy => self.expand(&path, count, " || ")?,
            },
            NodeOp::All if count > 1 => self.expand(&path, count, " && ")?,
            op => {
                let operand = self.operand()?;
                format!("{} {} {}", path, op.sql_token(), operand)
            }
        };

        Ok(if node.is_not() {
            format!("(!({}))", body)
        } else {
            body
        })
    }

    /// `(<path> == $B0 <sep> <path> == $B1 ...)`
    fn expand(&mut self, path: &str, count: usize, separator: &str) -> QbeResult<String> {
        let comparisons: Vec<String> = self
            .operands(count)?
            .into_iter()
            .map(|operand| format!("{} == {}", path, operand))
            .collect();
        Ok(format!("({})", comparisons.join(separator)))
    }

    fn operands(&mut self, count: usize) -> QbeResult<Vec<String>> {
        (0..count).map(|_| self.operand()).collect()
    }

    /// Consume the next value: an inline literal or a new `$B<n>` variable.
    fn operand(&mut self) -> QbeResult<String> {
        let values = self.tree.values();
        let available = values.len();
        let Some(value) = values.get(self.cursor) else {
            return Err(QbeError::BindCountMismatch {
                consumed: self.cursor + 1,
                available,
            });
        };
        self.cursor += 1;

        let bind = match (value.inline_literal(), value.to_bind()) {
            (Some(literal), _) => return Ok(literal),
            (None, Some(bind)) => bind,
            (None, None) => return Ok("null".to_string()),
        };
        let name = format!("B{}", self.binds.len());
        let variable = format!("${}", name);
        self.binds.push(PassingBind {
            name,
            value: bind,
            conversion: value.conversion(),
        });
        Ok(variable)
    }
}
