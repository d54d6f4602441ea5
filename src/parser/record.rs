use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::RecordError;
use crate::schema::TableSchema;

/// A canonical row ready for insertion, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<&'static str, SqlValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn bind_to(&self, idx: usize, stmt: &mut rusqlite::Statement) -> rusqlite::Result<()> {
        match self {
            SqlValue::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null)?,
            SqlValue::Integer(i) => stmt.raw_bind_parameter(idx, i)?,
            SqlValue::Real(f) => stmt.raw_bind_parameter(idx, f)?,
            SqlValue::Text(s) => stmt.raw_bind_parameter(idx, s.as_str())?,
        }
        Ok(())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column assignment
    pub fn with(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> &SqlValue {
        self.values.get(column).unwrap_or(&SqlValue::Null)
    }

    /// Values in the table's column order; unset columns are NULL
    pub fn values_for<'a>(&'a self, schema: &TableSchema) -> impl Iterator<Item = &'a SqlValue> {
        schema.columns.iter().map(move |col| self.get(col.name))
    }

    /// Conflict-key values rendered as a single string, for logs and dedup
    pub fn key_for(&self, schema: &TableSchema) -> String {
        schema
            .conflict_key
            .iter()
            .map(|col| self.get(col).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

// =============================================================================
// Tolerant field accessors
// =============================================================================

/// Borrow a record as a JSON object, or report it as malformed
pub fn as_object(record: &Value) -> Result<&serde_json::Map<String, Value>, RecordError> {
    record.as_object().ok_or(RecordError::NotAnObject)
}

/// Non-empty string field; numbers are rendered as text
pub fn text(record: &Value, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub fn required_text(record: &Value, key: &'static str) -> Result<String, RecordError> {
    text(record, key).ok_or(RecordError::MissingField(key))
}

/// Integer field accepting integers, floats (truncated) and digit strings
pub fn int(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn int_or(record: &Value, key: &str, default: i64) -> i64 {
    int(record, key).unwrap_or(default)
}

pub fn real(record: &Value, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn flag(record: &Value, key: &str) -> bool {
    matches!(record.get(key), Some(Value::Bool(true)))
}

/// JSON sub-document stored as text; absent or null becomes `default`
pub fn json(record: &Value, key: &str, default: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(v) => v.to_string(),
    }
}

/// Array field; anything that is not an array reads as empty
pub fn array<'a>(record: &'a Value, key: &str) -> &'a [Value] {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ITEMS;
    use serde_json::json;

    #[test]
    fn test_int_accepts_loose_encodings() {
        let rec = json!({"a": 3, "b": 4.9, "c": "12", "d": "x", "e": null});
        assert_eq!(int(&rec, "a"), Some(3));
        assert_eq!(int(&rec, "b"), Some(4));
        assert_eq!(int(&rec, "c"), Some(12));
        assert_eq!(int(&rec, "d"), None);
        assert_eq!(int(&rec, "e"), None);
        assert_eq!(int_or(&rec, "missing", 7), 7);
    }

    #[test]
    fn test_text_skips_empty_and_renders_numbers() {
        let rec = json!({"name": "", "icon": 30011, "desc": "ok"});
        assert_eq!(text(&rec, "name"), None);
        assert_eq!(text(&rec, "icon").as_deref(), Some("30011"));
        assert_eq!(text(&rec, "desc").as_deref(), Some("ok"));
        assert!(matches!(
            required_text(&rec, "name"),
            Err(RecordError::MissingField("name"))
        ));
    }

    #[test]
    fn test_json_and_array_defaults() {
        let rec = json!({"grids": [{"row": 0, "col": 1}], "bad": 5});
        assert_eq!(json(&rec, "grids", "[]"), r#"[{"col":1,"row":0}]"#);
        assert_eq!(json(&rec, "missing", "[]"), "[]");
        assert_eq!(array(&rec, "grids").len(), 1);
        assert!(array(&rec, "bad").is_empty());
    }

    #[test]
    fn test_row_values_follow_schema_order() {
        let row = Row::new()
            .with("rarity", 2)
            .with("item_code", "30011")
            .with("name", "Orirock");
        let values: Vec<_> = row.values_for(&ITEMS).cloned().collect();

        assert_eq!(values[0], SqlValue::Text("30011".into()));
        assert_eq!(values[1], SqlValue::Text("Orirock".into()));
        assert_eq!(values[2], SqlValue::Integer(2));
        assert_eq!(values[3], SqlValue::Null);
        assert_eq!(row.key_for(&ITEMS), "\"30011\"");
    }
}
