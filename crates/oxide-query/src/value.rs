//! Bind values and result records.

use serde_json::Value;

/// A result row keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Converts a scalar criteria value.
    ///
    /// Arrays and objects have no single bind value and are bound as their
    /// JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Looks up a dotted path (`user.addresses.0.city`) inside a JSON value.
///
/// Numeric segments index arrays. An empty path returns the value itself.
#[must_use]
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Looks up a dotted path inside a record.
#[must_use]
pub fn record_value_at<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    record.get(head).and_then(|v| value_at(v, rest))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_json() {
        assert_eq!(SqlValue::from(&json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from(&json!(7)), SqlValue::Int(7));
        assert_eq!(SqlValue::from(&json!(1.5)), SqlValue::Float(1.5));
        assert_eq!(SqlValue::from(&json!("x")), SqlValue::Text("x".into()));
        assert_eq!(
            SqlValue::from(&json!({"a": 1})),
            SqlValue::Text(r#"{"a":1}"#.into())
        );
    }

    #[test]
    fn test_value_at() {
        let value = json!({"user": {"tags": ["a", "b"], "id": 3}});
        assert_eq!(value_at(&value, "user.id"), Some(&json!(3)));
        assert_eq!(value_at(&value, "user.tags.1"), Some(&json!("b")));
        assert_eq!(value_at(&value, "user.missing"), None);
        assert_eq!(value_at(&value, "user.id.deeper"), None);
    }

    #[test]
    fn test_record_value_at() {
        let Value::Object(record) = json!({"order": {"id": 9}, "id": 1}) else {
            unreachable!()
        };
        assert_eq!(record_value_at(&record, "id"), Some(&json!(1)));
        assert_eq!(record_value_at(&record, "order.id"), Some(&json!(9)));
    }
}
