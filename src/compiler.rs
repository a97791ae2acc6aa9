//! Compiler entry point.
//!
//! Ties the pipeline together: filter bytes → `JsonNode` → `AndOrTree` →
//! JSON_EXISTS expression plus side-channel fragments. Every call owns its tree;
//! a `QbeCompiler` holds only immutable configuration and can be shared freely.

use serde::Serialize;
use tracing::{debug, warn};

use crate::clauses::{render_keys, KeyColumn, SqlFragment};
use crate::codegen::{ExpressionGenerator, JsonExistsClause};
use crate::config::{CompilerConfig, SqlJsonFeatures};
use crate::error::QbeResult;
use crate::tree::{AndOrTree, TreeBuilder};
use crate::value::{BindValue, JsonNode};

/// Everything the row-access layer needs to run a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledFilter {
    pub json_exists: Option<JsonExistsClause>,
    /// Keys from `$id`
    pub keys: Vec<BindValue>,
    /// ORDER BY list without the `ORDER BY` keywords
    pub order_by: Option<String>,
    pub key_clause: Option<SqlFragment>,
    pub sql_json: Vec<SqlFragment>,
    pub spatial: Vec<SqlFragment>,
    pub text: Vec<SqlFragment>,
    pub requires_modern_sql_json: bool,
    content_column: String,
}

impl CompiledFilter {
    /// Conditions joined with `AND`, in the order JSON_EXISTS, `$id`,
    /// `$sqlJson`, spatial, full text. `None` when the filter matches everything.
    pub fn where_clause(&self) -> Option<SqlFragment> {
        let mut fragments = Vec::new();
        if let Some(exists) = &self.json_exists {
            fragments.push(SqlFragment::new(
                exists.to_sql(&self.content_column),
                exists.bind_values(),
            ));
        }
        fragments.extend(self.key_clause.iter().cloned());
        fragments.extend(self.sql_json.iter().cloned());
        fragments.extend(self.spatial.iter().cloned());
        fragments.extend(self.text.iter().cloned());
        SqlFragment::join(fragments, " AND ")
    }

    pub fn order_by_clause(&self) -> Option<String> {
        self.order_by.clone()
    }

    /// Every bind value in WHERE-clause order.
    pub fn binds(&self) -> Vec<BindValue> {
        self.where_clause()
            .map(|fragment| fragment.binds)
            .unwrap_or_default()
    }
}

/// QBE filter compiler bound to one collection's configuration.
#[derive(Debug, Clone)]
pub struct QbeCompiler {
    config: CompilerConfig,
    key_column: Option<KeyColumn>,
}

impl QbeCompiler {
    pub fn new(config: CompilerConfig) -> QbeResult<Self> {
        config.validate()?;
        if !config.restricted_sql_json {
            warn!("unrestricted $sqlJson is not supported; the restricted operator set is used");
        }
        let key_column = if config.embedded_id.materialized {
            Some(KeyColumn {
                path: config.embedded_id_path()?,
                column: config.key_column.clone(),
                key_type: config.key_type,
            })
        } else {
            None
        };
        Ok(Self { config, key_column })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(&self, filter: &[u8]) -> QbeResult<CompiledFilter> {
        self.compile_node(&JsonNode::from_slice(filter)?)
    }

    pub fn compile_str(&self, filter: &str) -> QbeResult<CompiledFilter> {
        self.compile(filter.as_bytes())
    }

    pub fn compile_value(&self, filter: serde_json::Value) -> QbeResult<CompiledFilter> {
        self.compile_node(&JsonNode::from(filter))
    }

    pub fn compile_node(&self, filter: &JsonNode) -> QbeResult<CompiledFilter> {
        let tree = TreeBuilder::new().build(filter)?;
        self.compile_tree(&tree)
    }

    /// Render an already-built tree.
    pub fn compile_tree(&self, tree: &AndOrTree) -> QbeResult<CompiledFilter> {
        let content = self.config.content_column.as_str();
        let json_exists = ExpressionGenerator::new(tree, self.config.sql_json).generate()?;

        let order_by = tree.order_by().map(|spec| {
            spec.render(
                content,
                self.key_column.as_ref(),
                self.config.strict_order_by_types,
            )
        });

        let compiled = CompiledFilter {
            json_exists,
            keys: tree.keys().to_vec(),
            order_by,
            key_clause: render_keys(tree.keys(), &self.config.key_column),
            sql_json: tree.sql_json_clauses().iter().map(|c| c.render(content)).collect(),
            spatial: tree.spatial_clauses().iter().map(|c| c.render(content)).collect(),
            text: tree.text_clauses().iter().map(|c| c.render(content)).collect(),
            requires_modern_sql_json: tree.requires_modern_sql_json(),
            content_column: self.config.content_column.clone(),
        };

        if compiled.requires_modern_sql_json && self.config.sql_json == SqlJsonFeatures::Legacy {
            warn!("filter uses operators that need the modern SQL/JSON feature set");
        }
        debug!(
            "Compiled filter: expression={:?}, binds={}, sql_json={}, spatial={}, text={}, modern={}",
            compiled.json_exists.as_ref().map(|c| c.expression.as_str()),
            compiled.json_exists.as_ref().map_or(0, |c| c.binds.len()),
            compiled.sql_json.len(),
            compiled.spatial.len(),
            compiled.text.len(),
            compiled.requires_modern_sql_json
        );
        Ok(compiled)
    }
}

/// Compile a filter document with the given configuration.
pub fn compile(filter: &[u8], config: &CompilerConfig) -> QbeResult<CompiledFilter> {
    QbeCompiler::new(config.clone())?.compile(filter)
}

/// Build the AND/OR tree for a filter document without rendering it.
pub fn parse_filter(filter: &[u8]) -> QbeResult<AndOrTree> {
    TreeBuilder::new().build(&JsonNode::from_slice(filter)?)
}
