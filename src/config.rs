//! Compiler configuration.
//!
//! Describes the target collection table as far as the compiler needs it: the
//! content column the SQL/JSON operators read from, the key column used by `$id`
//! and the primary-key ORDER BY rewrite, and which SQL/JSON feature level the
//! engine offers.
//!
//! ```toml
//! content_column = "JSON_DOCUMENT"
//! key_column = "ID"
//! key_type = "varchar"
//! sql_json = "modern"
//!
//! [embedded_id]
//! path = "_id"
//! materialized = true
//! ```

use serde::Deserialize;

use crate::error::{QbeError, QbeResult};
use crate::path::QueryPath;

/// SQL type of the key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Varchar,
    Number,
    Raw,
}

/// SQL/JSON feature level of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlJsonFeatures {
    /// No `in (...)` list predicate; `$in` renders as a disjunction.
    Legacy,
    Modern,
}

/// Where the document key lives inside the content, and whether it is
/// extracted into the key column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmbeddedIdConfig {
    pub path: String,
    pub materialized: bool,
}

impl Default for EmbeddedIdConfig {
    fn default() -> Self {
        Self {
            path: "_id".to_string(),
            materialized: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub content_column: String,
    pub key_column: String,
    pub key_type: KeyType,
    pub embedded_id: EmbeddedIdConfig,
    pub sql_json: SqlJsonFeatures,
    pub restricted_sql_json: bool,
    pub strict_order_by_types: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            content_column: "JSON_DOCUMENT".to_string(),
            key_column: "ID".to_string(),
            key_type: KeyType::Varchar,
            embedded_id: EmbeddedIdConfig::default(),
            sql_json: SqlJsonFeatures::Modern,
            restricted_sql_json: true,
            strict_order_by_types: true,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(text: &str) -> QbeResult<Self> {
        let config: CompilerConfig =
            toml::from_str(text).map_err(|e| QbeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_content_column(mut self, column: impl Into<String>) -> Self {
        self.content_column = column.into();
        self
    }

    pub fn with_key_column(mut self, column: impl Into<String>, key_type: KeyType) -> Self {
        self.key_column = column.into();
        self.key_type = key_type;
        self
    }

    pub fn with_materialized_id(mut self, path: impl Into<String>) -> Self {
        self.embedded_id = EmbeddedIdConfig {
            path: path.into(),
            materialized: true,
        };
        self
    }

    pub fn with_sql_json(mut self, features: SqlJsonFeatures) -> Self {
        self.sql_json = features;
        self
    }

    pub fn with_strict_order_by_types(mut self, strict: bool) -> Self {
        self.strict_order_by_types = strict;
        self
    }

    pub fn validate(&self) -> QbeResult<()> {
        for (name, column) in [
            ("content_column", &self.content_column),
            ("key_column", &self.key_column),
        ] {
            if column.is_empty() || column.contains('"') {
                return Err(QbeError::InvalidConfig(format!(
                    "{} must be a non-empty identifier without double quotes",
                    name
                )));
            }
        }
        self.embedded_id_path()?;
        Ok(())
    }

    /// The parsed embedded-id path.
    pub fn embedded_id_path(&self) -> QbeResult<QueryPath> {
        let path = QueryPath::parse(&self.embedded_id.path)
            .map_err(|e| QbeError::InvalidConfig(format!("embedded_id.path: {}", e)))?;
        if !path.is_singleton() {
            return Err(QbeError::InvalidConfig(
                "embedded_id.path must be a singleton path".to_string(),
            ));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.content_column, "JSON_DOCUMENT");
        assert_eq!(config.key_column, "ID");
        assert_eq!(config.sql_json, SqlJsonFeatures::Modern);
        assert!(config.restricted_sql_json);
        assert!(!config.embedded_id.materialized);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_toml_str(
            r#"
            content_column = "DATA"
            key_type = "number"
            sql_json = "legacy"

            [embedded_id]
            materialized = true
            "#,
        )
        .unwrap();
        assert_eq!(config.content_column, "DATA");
        assert_eq!(config.key_column, "ID");
        assert_eq!(config.key_type, KeyType::Number);
        assert_eq!(config.sql_json, SqlJsonFeatures::Legacy);
        assert_eq!(config.embedded_id.path, "_id");
        assert!(config.embedded_id.materialized);
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = CompilerConfig::from_toml_str("key_type = \"blob\"").unwrap_err();
        assert!(matches!(err, QbeError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_quoted_column() {
        let config = CompilerConfig::default().with_content_column("A\"B");
        assert!(matches!(config.validate(), Err(QbeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_array_id_path() {
        let config = CompilerConfig::default().with_materialized_id("ids[0]");
        assert!(matches!(config.validate(), Err(QbeError::InvalidConfig(_))));
    }
}
