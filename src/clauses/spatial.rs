//! Spatial operators: `$near`, `$within`, `$intersects`.

use serde_json::Number;

use super::{flag, quote_ident, ErrorMode, SqlFragment};
use crate::error::{QbeError, QbeResult};
use crate::operators::SpatialOperator;
use crate::path::QueryPath;
use crate::value::{BindValue, JsonNode};

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialClause {
    pub path: QueryPath,
    pub operator: SpatialOperator,
    /// GeoJSON text of `$geometry`
    pub geometry: String,
    pub distance: Option<Number>,
    pub unit: Option<String>,
    pub error_mode: ErrorMode,
}

impl SpatialClause {
    pub(crate) fn parse(path: QueryPath, operator: SpatialOperator, operand: &JsonNode) -> QbeResult<Self> {
        let key = operator.keyword();
        let members = operand
            .as_object()
            .ok_or_else(|| QbeError::type_mismatch(key, "object", operand.kind_name()))?;
        if members.is_empty() {
            return Err(QbeError::EmptyContent(key.to_string()));
        }

        let mut geometry = None;
        let mut distance = None;
        let mut unit = None;
        let mut lax = false;
        let mut scalar_required = false;
        for (name, value) in members {
            match name.as_str() {
                "$geometry" => match value {
                    JsonNode::Object(_) => geometry = Some(value.to_json_string()?),
                    other => return Err(QbeError::type_mismatch(name, "object", other.kind_name())),
                },
                "$distance" | "$unit" if operator != SpatialOperator::Near => {
                    return Err(QbeError::MisplacedOperator(name.clone()));
                }
                "$distance" => match value {
                    JsonNode::Number(n) => distance = Some(n.clone()),
                    other => return Err(QbeError::type_mismatch(name, "number", other.kind_name())),
                },
                "$unit" => match value {
                    JsonNode::String(s) => unit = Some(s.clone()),
                    other => return Err(QbeError::type_mismatch(name, "string", other.kind_name())),
                },
                "$lax" => lax = flag(name, value)?,
                "$scalarRequired" => scalar_required = flag(name, value)?,
                _ => return Err(QbeError::UnknownOperator(name.clone())),
            }
        }

        let geometry = geometry.ok_or_else(|| QbeError::EmptyContent("$geometry".to_string()))?;
        if operator == SpatialOperator::Near && distance.is_none() {
            return Err(QbeError::EmptyContent("$distance".to_string()));
        }
        Ok(Self {
            path,
            operator,
            geometry,
            distance,
            unit,
            error_mode: ErrorMode::from_flags(key, lax, scalar_required)?,
        })
    }

    pub fn render(&self, content_column: &str) -> SqlFragment {
        let mut binds = vec![BindValue::String(self.geometry.clone())];
        let mut sql = format!(
            "{}(JSON_VALUE({}, '{}' RETURNING SDO_GEOMETRY {} NULL ON EMPTY), \
             JSON_VALUE(?, '$' RETURNING SDO_GEOMETRY ERROR ON ERROR)",
            self.operator.sql_function(),
            quote_ident(content_column),
            self.error_mode.render_path(&self.path),
            self.error_mode.on_error(),
        );
        if let Some(distance) = &self.distance {
            let mut params = format!("distance={}", distance);
            if let Some(unit) = &self.unit {
                params.push_str(" unit=");
                params.push_str(unit);
            }
            sql.push_str(", ?");
            binds.push(BindValue::String(params));
        }
        sql.push_str(") = 'TRUE'");
        SqlFragment::new(sql, binds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(op: SpatialOperator, text: &str) -> QbeResult<SpatialClause> {
        SpatialClause::parse(
            QueryPath::parse("location").unwrap(),
            op,
            &JsonNode::from_slice(text.as_bytes()).unwrap(),
        )
    }

    #[test]
    fn test_near_render() {
        let clause = parse(
            SpatialOperator::Near,
            r#"{"$geometry": {"type": "Point", "coordinates": [1, 2]}, "$distance": 5, "$unit": "KM"}"#,
        )
        .unwrap();
        let fragment = clause.render("DOC");
        assert_eq!(
            fragment.sql,
            "SDO_WITHIN_DISTANCE(JSON_VALUE(\"DOC\", '$.location[0]' RETURNING SDO_GEOMETRY NULL ON ERROR NULL ON EMPTY), \
             JSON_VALUE(?, '$' RETURNING SDO_GEOMETRY ERROR ON ERROR), ?) = 'TRUE'"
        );
        assert_eq!(
            fragment.binds,
            vec![
                BindValue::from(r#"{"type":"Point","coordinates":[1,2]}"#),
                BindValue::from("distance=5 unit=KM"),
            ]
        );
    }

    #[test]
    fn test_within_render() {
        let clause = parse(
            SpatialOperator::Within,
            r#"{"$geometry": {"type": "Polygon", "coordinates": []}, "$scalarRequired": true}"#,
        )
        .unwrap();
        let fragment = clause.render("DOC");
        assert!(fragment.sql.starts_with(
            "SDO_INSIDE(JSON_VALUE(\"DOC\", '$.location' RETURNING SDO_GEOMETRY ERROR ON ERROR NULL ON EMPTY)"
        ));
        assert_eq!(fragment.binds.len(), 1);
    }

    #[test]
    fn test_near_requires_distance() {
        let err = parse(SpatialOperator::Near, r#"{"$geometry": {"type": "Point"}}"#).unwrap_err();
        assert!(matches!(err, QbeError::EmptyContent(ref k) if k == "$distance"));
    }

    #[test]
    fn test_distance_only_for_near() {
        let err = parse(
            SpatialOperator::Intersects,
            r#"{"$geometry": {"type": "Point"}, "$distance": 1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, QbeError::MisplacedOperator(_)));
    }

    #[test]
    fn test_geometry_must_be_object() {
        let err = parse(SpatialOperator::Within, r#"{"$geometry": "POINT(1 2)"}"#).unwrap_err();
        assert!(matches!(err, QbeError::TypeMismatch { .. }));
    }
}
