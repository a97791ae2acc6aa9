//! QBE keyword tables.
//!
//! Maps every `$`-keyword the compiler understands to its role, and each role to
//! the SQL/JSON token it renders as. The keyword map is built once on first use
//! and never mutated.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Comparison-style operators applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QbeOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Exists,
    Between,
    StartsWith,
    Regex,
    Like,
    HasSubstring,
}

impl QbeOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            QbeOperator::Eq => "$eq",
            QbeOperator::Ne => "$ne",
            QbeOperator::Gt => "$gt",
            QbeOperator::Gte => "$gte",
            QbeOperator::Lt => "$lt",
            QbeOperator::Lte => "$lte",
            QbeOperator::In => "$in",
            QbeOperator::Nin => "$nin",
            QbeOperator::All => "$all",
            QbeOperator::Exists => "$exists",
            QbeOperator::Between => "$between",
            QbeOperator::StartsWith => "$startsWith",
            QbeOperator::Regex => "$regex",
            QbeOperator::Like => "$like",
            QbeOperator::HasSubstring => "$hasSubstring",
        }
    }

    /// Operators whose SQL/JSON rendering needs the modern engine feature set.
    pub fn requires_modern(&self) -> bool {
        matches!(self, QbeOperator::Like | QbeOperator::HasSubstring)
    }

    /// Operators whose operand must be a string.
    pub fn requires_string(&self) -> bool {
        matches!(
            self,
            QbeOperator::StartsWith | QbeOperator::Regex | QbeOperator::Like | QbeOperator::HasSubstring
        )
    }
}

/// Item-method modifiers that coerce the field value before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Abs,
    Ceiling,
    Floor,
    Double,
    Number,
    String,
    Upper,
    Lower,
    Length,
    Type,
    Size,
    Boolean,
    Date,
    Timestamp,
}

impl Modifier {
    pub fn keyword(&self) -> &'static str {
        match self {
            Modifier::Abs => "$abs",
            Modifier::Ceiling => "$ceiling",
            Modifier::Floor => "$floor",
            Modifier::Double => "$double",
            Modifier::Number => "$number",
            Modifier::String => "$string",
            Modifier::Upper => "$upper",
            Modifier::Lower => "$lower",
            Modifier::Length => "$length",
            Modifier::Type => "$type",
            Modifier::Size => "$size",
            Modifier::Boolean => "$boolean",
            Modifier::Date => "$date",
            Modifier::Timestamp => "$timestamp",
        }
    }

    /// The SQL/JSON item method appended to the path.
    pub fn item_method(&self) -> &'static str {
        match self {
            Modifier::Abs => "abs()",
            Modifier::Ceiling => "ceiling()",
            Modifier::Floor => "floor()",
            Modifier::Double => "double()",
            Modifier::Number => "number()",
            Modifier::String => "string()",
            Modifier::Upper => "upper()",
            Modifier::Lower => "lower()",
            Modifier::Length => "length()",
            Modifier::Type => "type()",
            Modifier::Size => "size()",
            Modifier::Boolean => "boolean()",
            Modifier::Date => "date()",
            Modifier::Timestamp => "timestamp()",
        }
    }

    pub fn requires_modern(&self) -> bool {
        matches!(self, Modifier::Boolean | Modifier::Length)
    }

    /// `RETURNING` type used when the modifier selects a `JSON_VALUE` type.
    pub fn returning_type(&self) -> Option<&'static str> {
        match self {
            Modifier::Number => Some("NUMBER"),
            Modifier::String => Some("VARCHAR2(4000)"),
            Modifier::Date => Some("DATE"),
            Modifier::Timestamp => Some("TIMESTAMP"),
            _ => None,
        }
    }
}

/// Spatial operators, rendered through the side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialOperator {
    Near,
    Within,
    Intersects,
}

impl SpatialOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            SpatialOperator::Near => "$near",
            SpatialOperator::Within => "$within",
            SpatialOperator::Intersects => "$intersects",
        }
    }

    pub fn sql_function(&self) -> &'static str {
        match self {
            SpatialOperator::Near => "SDO_WITHIN_DISTANCE",
            SpatialOperator::Within => "SDO_INSIDE",
            SpatialOperator::Intersects => "SDO_ANYINTERACT",
        }
    }
}

/// Every recognised `$`-keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    And,
    Or,
    Nor,
    Not,
    Query,
    OrderBy,
    Id,
    SqlJson,
    /// `$project`, `$patch`, `$merge`: owned by the envelope layer
    Envelope,
    Operator(QbeOperator),
    Modifier(Modifier),
    Spatial(SpatialOperator),
    Contains,
}

impl Keyword {
    /// Keywords that introduce a nested filter rather than apply to a value.
    pub fn is_connective(&self) -> bool {
        matches!(self, Keyword::And | Keyword::Or | Keyword::Nor)
    }
}

static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("$and", Keyword::And);
    map.insert("$or", Keyword::Or);
    map.insert("$nor", Keyword::Nor);
    map.insert("$not", Keyword::Not);
    map.insert("$query", Keyword::Query);
    map.insert("$orderby", Keyword::OrderBy);
    map.insert("$id", Keyword::Id);
    map.insert("$sqlJson", Keyword::SqlJson);
    map.insert("$project", Keyword::Envelope);
    map.insert("$patch", Keyword::Envelope);
    map.insert("$merge", Keyword::Envelope);
    map.insert("$contains", Keyword::Contains);

    for op in [
        QbeOperator::Eq,
        QbeOperator::Ne,
        QbeOperator::Gt,
        QbeOperator::Gte,
        QbeOperator::Lt,
        QbeOperator::Lte,
        QbeOperator::In,
        QbeOperator::Nin,
        QbeOperator::All,
        QbeOperator::Exists,
        QbeOperator::Between,
        QbeOperator::StartsWith,
        QbeOperator::Regex,
        QbeOperator::Like,
        QbeOperator::HasSubstring,
    ] {
        map.insert(op.keyword(), Keyword::Operator(op));
    }
    // $instr is an older spelling of $hasSubstring
    map.insert("$instr", Keyword::Operator(QbeOperator::HasSubstring));

    for m in [
        Modifier::Abs,
        Modifier::Ceiling,
        Modifier::Floor,
        Modifier::Double,
        Modifier::Number,
        Modifier::String,
        Modifier::Upper,
        Modifier::Lower,
        Modifier::Length,
        Modifier::Type,
        Modifier::Size,
        Modifier::Boolean,
        Modifier::Date,
        Modifier::Timestamp,
    ] {
        map.insert(m.keyword(), Keyword::Modifier(m));
    }

    for op in [
        SpatialOperator::Near,
        SpatialOperator::Within,
        SpatialOperator::Intersects,
    ] {
        map.insert(op.keyword(), Keyword::Spatial(op));
    }

    map
});

/// Look up a `$`-keyword. Plain field names and unknown keywords return `None`.
pub fn classify(key: &str) -> Option<Keyword> {
    KEYWORDS.get(key).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_operators() {
        assert_eq!(classify("$gt"), Some(Keyword::Operator(QbeOperator::Gt)));
        assert_eq!(
            classify("$instr"),
            Some(Keyword::Operator(QbeOperator::HasSubstring))
        );
        assert_eq!(classify("$upper"), Some(Keyword::Modifier(Modifier::Upper)));
        assert_eq!(
            classify("$near"),
            Some(Keyword::Spatial(SpatialOperator::Near))
        );
        assert_eq!(classify("$patch"), Some(Keyword::Envelope));
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("$frobnicate"), None);
        assert_eq!(classify("name"), None);
        assert_eq!(classify("$GT"), None);
    }

    #[test]
    fn test_keyword_round_trip() {
        for (key, kw) in KEYWORDS.iter() {
            match kw {
                Keyword::Operator(op) if *key != "$instr" => assert_eq!(op.keyword(), *key),
                Keyword::Modifier(m) => assert_eq!(m.keyword(), *key),
                Keyword::Spatial(s) => assert_eq!(s.keyword(), *key),
                _ => {}
            }
        }
    }

    #[test]
    fn test_modern_flags() {
        assert!(QbeOperator::Like.requires_modern());
        assert!(!QbeOperator::Regex.requires_modern());
        assert!(Modifier::Boolean.requires_modern());
        assert!(!Modifier::Upper.requires_modern());
    }
}
