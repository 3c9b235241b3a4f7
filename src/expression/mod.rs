//! Source expression seam
//!
//! Mappings pull values out of source records through the [`Expression`]
//! trait. The engine never inspects expressions beyond the two evaluation
//! forms and the set of referenced property names (needed for projection
//! building and classifier checks). The shipped implementations (property
//! access, literals, concatenation) are the ones mapping configurations
//! need most; richer languages plug in behind the same trait.

use crate::model::AttributeValue;
use crate::source::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Name of a source record property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyName(String);

impl PropertyName {
    /// Wrap a property name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PropertyName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Result type for expression evaluation
pub type ExpressionResult = Result<Option<AttributeValue>, ExpressionError>;

/// Errors raised while evaluating a source expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// A value had a type the expression cannot operate on
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name found
        actual: String,
    },

    /// Evaluation failed for an expression-specific reason
    #[error("evaluation failed: {message}")]
    Failed {
        /// Failure description
        message: String,
    },
}

/// One row of a group's cached projections: every referenced property's
/// value at a fixed record index. This is the lookup form identifier and
/// child-mapping expressions see inside a lazily indexed property.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionRow<'a> {
    projections: &'a IndexMap<PropertyName, Vec<Option<AttributeValue>>>,
    index: usize,
}

impl<'a> ProjectionRow<'a> {
    /// View `projections` at record position `index`
    pub fn new(
        projections: &'a IndexMap<PropertyName, Vec<Option<AttributeValue>>>,
        index: usize,
    ) -> Self {
        Self { projections, index }
    }

    /// Value of a property for this row, if the property was projected and
    /// the record contributed one
    pub fn get(&self, name: &PropertyName) -> Option<&'a AttributeValue> {
        self.projections
            .get(name)?
            .get(self.index)?
            .as_ref()
    }
}

/// A source expression: evaluates against a raw record or against a
/// projection row. `Ok(None)` means "no value" (e.g. the property was
/// pruned from the query projection) and is never an error.
pub trait Expression: fmt::Debug {
    /// Evaluate against a raw source record
    fn evaluate(&self, record: &Record) -> ExpressionResult;

    /// Evaluate against a group projection row
    fn evaluate_projected(&self, row: &ProjectionRow<'_>) -> ExpressionResult;

    /// Source properties this expression reads
    fn referenced_properties(&self) -> Vec<PropertyName>;
}

/// Shared handle to a source expression
pub type Expr = Arc<dyn Expression>;

/// Property access expression
#[derive(Debug, Clone)]
struct PropertyExpr {
    name: PropertyName,
}

impl Expression for PropertyExpr {
    fn evaluate(&self, record: &Record) -> ExpressionResult {
        Ok(record.get(&self.name).cloned())
    }

    fn evaluate_projected(&self, row: &ProjectionRow<'_>) -> ExpressionResult {
        Ok(row.get(&self.name).cloned())
    }

    fn referenced_properties(&self) -> Vec<PropertyName> {
        vec![self.name.clone()]
    }
}

/// Constant expression
#[derive(Debug, Clone)]
struct LiteralExpr {
    value: AttributeValue,
}

impl Expression for LiteralExpr {
    fn evaluate(&self, _record: &Record) -> ExpressionResult {
        Ok(Some(self.value.clone()))
    }

    fn evaluate_projected(&self, _row: &ProjectionRow<'_>) -> ExpressionResult {
        Ok(Some(self.value.clone()))
    }

    fn referenced_properties(&self) -> Vec<PropertyName> {
        Vec::new()
    }
}

/// String concatenation over part expressions, used mostly for identifier
/// derivation. Parts evaluating to no value are skipped; list values are a
/// type mismatch.
#[derive(Debug, Clone)]
struct ConcatExpr {
    parts: Vec<Expr>,
    separator: String,
}

impl ConcatExpr {
    fn join(&self, parts: Vec<Option<AttributeValue>>) -> ExpressionResult {
        let mut rendered = Vec::with_capacity(parts.len());
        for value in parts.into_iter().flatten() {
            if matches!(value, AttributeValue::List(_)) {
                return Err(ExpressionError::TypeMismatch {
                    expected: "scalar".to_string(),
                    actual: value.type_name().to_string(),
                });
            }
            if !value.is_null() {
                rendered.push(value.to_string());
            }
        }
        if rendered.is_empty() {
            return Ok(None);
        }
        Ok(Some(AttributeValue::String(
            rendered.join(&self.separator),
        )))
    }
}

impl Expression for ConcatExpr {
    fn evaluate(&self, record: &Record) -> ExpressionResult {
        let parts = self
            .parts
            .iter()
            .map(|p| p.evaluate(record))
            .collect::<Result<Vec<_>, _>>()?;
        self.join(parts)
    }

    fn evaluate_projected(&self, row: &ProjectionRow<'_>) -> ExpressionResult {
        let parts = self
            .parts
            .iter()
            .map(|p| p.evaluate_projected(row))
            .collect::<Result<Vec<_>, _>>()?;
        self.join(parts)
    }

    fn referenced_properties(&self) -> Vec<PropertyName> {
        let mut names = Vec::new();
        for part in &self.parts {
            for name in part.referenced_properties() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Expression reading one source property
pub fn property(name: impl Into<PropertyName>) -> Expr {
    Arc::new(PropertyExpr { name: name.into() })
}

/// Expression yielding a constant value
pub fn literal(value: impl Into<AttributeValue>) -> Expr {
    Arc::new(LiteralExpr {
        value: value.into(),
    })
}

/// Expression joining part results with a separator
pub fn concat(parts: Vec<Expr>, separator: impl Into<String>) -> Expr {
    Arc::new(ConcatExpr {
        parts,
        separator: separator.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::from_json(&serde_json::json!({
            "station": "A",
            "result": 12,
        }))
        .unwrap()
    }

    #[test]
    fn test_property_access() {
        let expr = property("station");
        assert_eq!(
            expr.evaluate(&record()).unwrap(),
            Some(AttributeValue::String("A".to_string()))
        );
        // Absent property is no value, not an error
        assert_eq!(property("missing").evaluate(&record()).unwrap(), None);
    }

    #[test]
    fn test_concat_for_identifiers() {
        let expr = concat(vec![literal("st"), property("station")], ".");
        assert_eq!(
            expr.evaluate(&record()).unwrap(),
            Some(AttributeValue::String("st.A".to_string()))
        );
        assert_eq!(
            expr.referenced_properties(),
            vec![PropertyName::new("station")]
        );
    }

    #[test]
    fn test_concat_skips_missing_parts() {
        let expr = concat(vec![property("missing"), property("result")], "-");
        assert_eq!(
            expr.evaluate(&record()).unwrap(),
            Some(AttributeValue::String("12".to_string()))
        );
    }

    #[test]
    fn test_projected_lookup() {
        let mut projections = IndexMap::new();
        projections.insert(
            PropertyName::new("result"),
            vec![Some(AttributeValue::Integer(1)), None],
        );
        let row0 = ProjectionRow::new(&projections, 0);
        let row1 = ProjectionRow::new(&projections, 1);
        let expr = property("result");
        assert_eq!(
            expr.evaluate_projected(&row0).unwrap(),
            Some(AttributeValue::Integer(1))
        );
        assert_eq!(expr.evaluate_projected(&row1).unwrap(), None);
    }
}
