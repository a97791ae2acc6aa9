//! Filter document values.
//!
//! `JsonNode` is the closed set of JSON shapes the tree builder matches on. Unlike
//! `serde_json::Value` it keeps object members in document order and keeps
//! duplicate keys, so repeated clauses such as two `$orderby` members can be
//! rejected instead of silently overwritten.
//!
//! `ValueTypePair` is a scalar literal lifted out of the filter plus the
//! date/timestamp flags set by the `$date` / `$timestamp` modifiers.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;

use crate::error::{QbeError, QbeResult};

/// Map key serde_json uses to hand over the source digits of a number.
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// A parsed JSON value with ordered, possibly duplicated object members.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<JsonNode>),
    Object(Vec<(String, JsonNode)>),
}

impl JsonNode {
    pub fn from_slice(bytes: &[u8]) -> QbeResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            JsonNode::Null => "null",
            JsonNode::Bool(_) => "boolean",
            JsonNode::Number(_) => "number",
            JsonNode::String(_) => "string",
            JsonNode::Array(_) => "array",
            JsonNode::Object(_) => "object",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, JsonNode::Array(_) | JsonNode::Object(_))
    }

    pub fn as_object(&self) -> Option<&[(String, JsonNode)]> {
        match self {
            JsonNode::Object(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonNode]> {
        match self {
            JsonNode::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Serialize back to compact JSON text.
    pub fn to_json_string(&self) -> QbeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<serde_json::Value> for JsonNode {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsonNode::Null,
            serde_json::Value::Bool(b) => JsonNode::Bool(b),
            serde_json::Value::Number(n) => JsonNode::Number(n),
            serde_json::Value::String(s) => JsonNode::String(s),
            serde_json::Value::Array(items) => {
                JsonNode::Array(items.into_iter().map(JsonNode::from).collect())
            }
            serde_json::Value::Object(map) => JsonNode::Object(
                map.into_iter()
                    .map(|(k, v)| (k, JsonNode::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for JsonNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(JsonNodeVisitor)
    }
}

struct JsonNodeVisitor;

impl<'de> Visitor<'de> for JsonNodeVisitor {
    type Value = JsonNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<JsonNode, E> {
        Ok(JsonNode::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<JsonNode, E> {
        Ok(JsonNode::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<JsonNode, E> {
        Ok(JsonNode::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<JsonNode, E> {
        Number::from_f64(v)
            .map(JsonNode::Number)
            .ok_or_else(|| E::custom("non-finite number"))
    }

    fn visit_str<E>(self, v: &str) -> Result<JsonNode, E> {
        Ok(JsonNode::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<JsonNode, E> {
        Ok(JsonNode::String(v))
    }

    fn visit_unit<E>(self) -> Result<JsonNode, E> {
        Ok(JsonNode::Null)
    }

    fn visit_none<E>(self) -> Result<JsonNode, E> {
        Ok(JsonNode::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<JsonNode, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<JsonNode, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonNode::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<JsonNode, A::Error>
    where
        A: MapAccess<'de>,
    {
        let Some(first) = map.next_key::<String>()? else {
            return Ok(JsonNode::Object(Vec::new()));
        };
        if first == NUMBER_TOKEN {
            let digits: String = map.next_value()?;
            return digits
                .parse::<Number>()
                .map(JsonNode::Number)
                .map_err(de::Error::custom);
        }

        let mut members = vec![(first, map.next_value::<JsonNode>()?)];
        while let Some((key, value)) = map.next_entry::<String, JsonNode>()? {
            members.push((key, value));
        }
        Ok(JsonNode::Object(members))
    }
}

impl Serialize for JsonNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JsonNode::Null => serializer.serialize_unit(),
            JsonNode::Bool(b) => serializer.serialize_bool(*b),
            JsonNode::Number(n) => n.serialize(serializer),
            JsonNode::String(s) => serializer.serialize_str(s),
            JsonNode::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonNode::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (k, v) in members {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// The tagged scalar carried by a `ValueTypePair`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Number(Number),
    String(String),
    Boolean(bool),
    Null,
}

impl ScalarValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarValue::Number(_) => "number",
            ScalarValue::String(_) => "string",
            ScalarValue::Boolean(_) => "boolean",
            ScalarValue::Null => "null",
        }
    }
}

/// A literal operand taken from the filter document.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTypePair {
    value: ScalarValue,
    is_date: bool,
    is_timestamp: bool,
}

impl ValueTypePair {
    pub fn new(value: ScalarValue) -> Self {
        Self {
            value,
            is_date: false,
            is_timestamp: false,
        }
    }

    /// Lift a scalar JSON node; `key` names the operator for diagnostics.
    pub fn from_node(key: &str, node: &JsonNode) -> QbeResult<Self> {
        let value = match node {
            JsonNode::Null => ScalarValue::Null,
            JsonNode::Bool(b) => ScalarValue::Boolean(*b),
            JsonNode::Number(n) => ScalarValue::Number(n.clone()),
            JsonNode::String(s) => ScalarValue::String(s.clone()),
            other => return Err(QbeError::type_mismatch(key, "scalar", other.kind_name())),
        };
        Ok(Self::new(value))
    }

    pub fn value(&self) -> &ScalarValue {
        &self.value
    }

    pub fn is_date(&self) -> bool {
        self.is_date
    }

    pub fn is_timestamp(&self) -> bool {
        self.is_timestamp
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, ScalarValue::Null)
    }

    /// Apply `$date`: strings must be ISO-8601 dates (or date-times, truncated
    /// to the date) and are normalised to `YYYY-MM-DD`; numbers are epoch millis.
    pub fn into_date(self, key: &str) -> QbeResult<Self> {
        let value = match self.value {
            ScalarValue::String(s) => ScalarValue::String(
                parse_temporal(&s)
                    .ok_or_else(|| QbeError::literal(key, format!("'{}' is not an ISO-8601 date", s)))?
                    .date()
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            ScalarValue::Number(n) => ScalarValue::Number(n),
            other => return Err(QbeError::type_mismatch(key, "string or number", other.kind_name())),
        };
        Ok(Self {
            value,
            is_date: true,
            is_timestamp: false,
        })
    }

    /// Apply `$timestamp`: strings are normalised to UTC
    /// `YYYY-MM-DDTHH:MM:SS.ffffff`; numbers are epoch millis.
    pub fn into_timestamp(self, key: &str) -> QbeResult<Self> {
        let value = match self.value {
            ScalarValue::String(s) => ScalarValue::String(
                parse_temporal(&s)
                    .ok_or_else(|| {
                        QbeError::literal(key, format!("'{}' is not an ISO-8601 timestamp", s))
                    })?
                    .format("%Y-%m-%dT%H:%M:%S%.6f")
                    .to_string(),
            ),
            ScalarValue::Number(n) => ScalarValue::Number(n),
            other => return Err(QbeError::type_mismatch(key, "string or number", other.kind_name())),
        };
        Ok(Self {
            value,
            is_date: false,
            is_timestamp: true,
        })
    }

    /// Literal text for values that are written into the path expression
    /// instead of being bound: booleans, null, and the strings "true",
    /// "false" and "null".
    pub fn inline_literal(&self) -> Option<String> {
        match &self.value {
            ScalarValue::Boolean(b) => Some(b.to_string()),
            ScalarValue::Null => Some("null".to_string()),
            ScalarValue::String(s) if matches!(s.as_str(), "true" | "false" | "null") => {
                Some(format!("\"{}\"", s))
            }
            _ => None,
        }
    }

    /// `$exists` truthiness: false, null and zero are falsy.
    pub fn is_truthy(&self) -> bool {
        match &self.value {
            ScalarValue::Boolean(b) => *b,
            ScalarValue::Null => false,
            ScalarValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            ScalarValue::String(_) => true,
        }
    }

    /// The value as it is handed to the SQL driver, or `None` for values that
    /// are never bound.
    pub fn to_bind(&self) -> Option<BindValue> {
        match &self.value {
            ScalarValue::Number(n) => Some(BindValue::Number(n.clone())),
            ScalarValue::String(s) => Some(BindValue::String(s.clone())),
            ScalarValue::Boolean(_) | ScalarValue::Null => None,
        }
    }

    /// How the bind placeholder is wrapped in SQL.
    pub fn conversion(&self) -> BindConversion {
        let numeric = matches!(self.value, ScalarValue::Number(_));
        match (self.is_date, self.is_timestamp, numeric) {
            (true, _, false) => BindConversion::DateString,
            (true, _, true) => BindConversion::DateMillis,
            (_, true, false) => BindConversion::TimestampString,
            (_, true, true) => BindConversion::TimestampMillis,
            _ => BindConversion::Plain,
        }
    }
}

fn parse_temporal(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// A value handed to the SQL driver.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Number(Number),
    String(String),
}

impl From<&str> for BindValue {
    fn from(s: &str) -> Self {
        BindValue::String(s.to_string())
    }
}

impl From<i64> for BindValue {
    fn from(n: i64) -> Self {
        BindValue::Number(n.into())
    }
}

/// SQL wrapping applied around a `?` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindConversion {
    Plain,
    DateString,
    TimestampString,
    /// Epoch milliseconds converted through Julian-day arithmetic.
    DateMillis,
    TimestampMillis,
}

impl BindConversion {
    pub fn placeholder(&self) -> &'static str {
        match self {
            BindConversion::Plain => "?",
            BindConversion::DateString => "TO_DATE(?, 'YYYY-MM-DD')",
            BindConversion::TimestampString => "TO_TIMESTAMP(?, 'YYYY-MM-DD\"T\"HH24:MI:SS.FF')",
            BindConversion::DateMillis => "(TO_DATE('2440588', 'J') + ?/86400000)",
            BindConversion::TimestampMillis => {
                "(CAST(TO_DATE('2440588', 'J') AS TIMESTAMP) + NUMTODSINTERVAL(?/1000, 'SECOND'))"
            }
        }
    }
}
