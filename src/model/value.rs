//! Core value type for mapped attribute content

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Value carried by a leaf node of the output attribute tree, or by a
/// source record property.
///
/// Source records may hold multi-valued properties; those surface as
/// [`AttributeValue::List`], and grouping-key equality over them is
/// list-wise by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Decimal value with fixed precision
    Decimal(Decimal),

    /// String value
    String(String),

    /// Date value (without time)
    Date(NaiveDate),

    /// DateTime value with timezone
    DateTime(DateTime<FixedOffset>),

    /// Ordered list of values (multi-valued source property)
    List(Vec<AttributeValue>),

    /// Explicit null
    Null,
}

impl AttributeValue {
    /// Human-readable type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Boolean(_) => "Boolean",
            AttributeValue::Integer(_) => "Integer",
            AttributeValue::Decimal(_) => "Decimal",
            AttributeValue::String(_) => "String",
            AttributeValue::Date(_) => "Date",
            AttributeValue::DateTime(_) => "DateTime",
            AttributeValue::List(_) => "List",
            AttributeValue::Null => "Null",
        }
    }

    /// True for [`AttributeValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Convert a JSON value. Integral numbers become `Integer`, other
    /// numbers `Decimal` (falling back to `Null` when unrepresentable),
    /// objects are flattened to their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => AttributeValue::Null,
            JsonValue::Bool(b) => AttributeValue::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttributeValue::Integer(i)
                } else {
                    match n.as_f64().map(Decimal::try_from) {
                        Some(Ok(d)) => AttributeValue::Decimal(d),
                        _ => AttributeValue::Null,
                    }
                }
            }
            JsonValue::String(s) => AttributeValue::String(s.clone()),
            JsonValue::Array(items) => {
                AttributeValue::List(items.iter().map(AttributeValue::from_json).collect())
            }
            JsonValue::Object(_) => AttributeValue::String(value.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Boolean(b) => write!(f, "{b}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Decimal(d) => write!(f, "{d}"),
            AttributeValue::String(s) => write!(f, "{s}"),
            AttributeValue::Date(d) => write!(f, "{d}"),
            AttributeValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            AttributeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            AttributeValue::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<Decimal> for AttributeValue {
    fn from(value: Decimal) -> Self {
        AttributeValue::Decimal(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(
            AttributeValue::from_json(&serde_json::json!(42)),
            AttributeValue::Integer(42)
        );
        assert_eq!(
            AttributeValue::from_json(&serde_json::json!("abc")),
            AttributeValue::String("abc".to_string())
        );
        assert_eq!(
            AttributeValue::from_json(&serde_json::json!(null)),
            AttributeValue::Null
        );
    }

    #[test]
    fn test_from_json_list_equality_is_listwise() {
        let a = AttributeValue::from_json(&serde_json::json!([1, "x"]));
        let b = AttributeValue::from_json(&serde_json::json!([1, "x"]));
        let c = AttributeValue::from_json(&serde_json::json!([1, "y"]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        assert_eq!(AttributeValue::Integer(7).to_string(), "7");
        assert_eq!(
            AttributeValue::List(vec![1i64.into(), 2i64.into()]).to_string(),
            "[1, 2]"
        );
    }
}
