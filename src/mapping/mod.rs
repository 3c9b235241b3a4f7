//! Declarative feature mappings and the engine that applies them
//!
//! An [`AttributeMapping`] is one rule: evaluate a source expression per
//! row and place the result at an XPath-like target location. A
//! [`FeatureTypeMapping`] bundles the rules for one output feature type
//! together with the grouping properties that fold consecutive source rows
//! into one instance. [`MappingFeatureIterator`] drives the whole thing.

pub mod classifier;
pub mod group;
pub mod iterator;
pub mod lazy;
pub mod tree;

pub use classifier::MappingPartition;
pub use group::GroupCursor;
pub use iterator::MappingFeatureIterator;
pub use lazy::LazyMultiValuedProperty;
pub use tree::{AttributeTreeBuilder, NodeFactory};

use crate::error::{MappingError, Result};
use crate::expression::{Expr, PropertyName};
use crate::path::{QName, StepList};
use crate::schema::ComplexType;
use indexmap::IndexMap;
use std::sync::Arc;

/// One declarative mapping rule: source expression → target path
#[derive(Debug, Clone)]
pub struct AttributeMapping {
    source_expression: Expr,
    target_path: StepList,
    identifier_expression: Option<Expr>,
    target_node_type: Option<QName>,
    multi_valued: bool,
    client_properties: IndexMap<QName, Expr>,
}

impl AttributeMapping {
    /// Mapping of `source_expression` to `target_path`
    pub fn new(source_expression: Expr, target_path: StepList) -> Self {
        Self {
            source_expression,
            target_path,
            identifier_expression: None,
            target_node_type: None,
            multi_valued: false,
            client_properties: IndexMap::new(),
        }
    }

    /// Derive target node identifiers from `expression`
    pub fn with_identifier(mut self, expression: Expr) -> Self {
        self.identifier_expression = Some(expression);
        self
    }

    /// Override the declared target node type (polymorphic substitution)
    pub fn with_target_type(mut self, type_name: impl Into<QName>) -> Self {
        self.target_node_type = Some(type_name.into());
        self
    }

    /// Declare the target property multi-valued: one instance per grouped
    /// source row
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Attach a named client property computed by `expression`
    pub fn with_client_property(mut self, name: impl Into<QName>, expression: Expr) -> Self {
        self.client_properties.insert(name.into(), expression);
        self
    }

    /// The source expression
    pub fn source_expression(&self) -> &Expr {
        &self.source_expression
    }

    /// The target location path
    pub fn target_path(&self) -> &StepList {
        &self.target_path
    }

    /// Identifier expression, if declared
    pub fn identifier_expression(&self) -> Option<&Expr> {
        self.identifier_expression.as_ref()
    }

    /// Target node type override, if declared
    pub fn target_node_type(&self) -> Option<&QName> {
        self.target_node_type.as_ref()
    }

    /// True for multi-valued mappings
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Client property expressions in declaration order
    pub fn client_properties(&self) -> &IndexMap<QName, Expr> {
        &self.client_properties
    }
}

/// The full mapping configuration for one output feature type
#[derive(Debug, Clone)]
pub struct FeatureTypeMapping {
    target: Arc<ComplexType>,
    mappings: Vec<Arc<AttributeMapping>>,
    group_by: Vec<PropertyName>,
}

impl FeatureTypeMapping {
    /// Validate and assemble a feature type mapping.
    ///
    /// Each multivalued property must have exactly one declaring mapping;
    /// two multivalued mappings on the same target path are rejected.
    pub fn new(
        target: Arc<ComplexType>,
        mappings: Vec<AttributeMapping>,
        group_by: Vec<PropertyName>,
    ) -> Result<Self> {
        let mappings: Vec<Arc<AttributeMapping>> = mappings.into_iter().map(Arc::new).collect();
        for (i, a) in mappings.iter().enumerate() {
            if !a.multi_valued {
                continue;
            }
            for b in mappings.iter().skip(i + 1) {
                if b.multi_valued && a.target_path.equals_ignoring_index(&b.target_path) {
                    return Err(MappingError::InvalidMapping {
                        reason: format!(
                            "duplicate multivalued mapping for target path {}",
                            a.target_path
                        ),
                    });
                }
            }
        }
        if !group_by.is_empty() && !mappings.iter().any(|m| m.multi_valued) {
            // Caller contract, not an error: grouping without a multivalued
            // mapping folds rows into features that ignore the extra rows
            log::warn!(
                "grouping on {group_by:?} declared for {} but no mapping is multivalued",
                target.name
            );
        }
        Ok(Self {
            target,
            mappings,
            group_by,
        })
    }

    /// Target feature type
    pub fn target(&self) -> &Arc<ComplexType> {
        &self.target
    }

    /// All mappings in declaration order
    pub fn mappings(&self) -> &[Arc<AttributeMapping>] {
        &self.mappings
    }

    /// Grouping property names
    pub fn group_by(&self) -> &[PropertyName] {
        &self.group_by
    }

    /// The mapping addressing the feature root itself (single-step path
    /// equal to the target type name), which carries the feature id
    /// expression and root client properties
    pub fn root_mapping(&self) -> Option<&Arc<AttributeMapping>> {
        self.mappings
            .iter()
            .find(|m| m.target_path.len() == 1 && m.target_path.first().name == self.target.name)
    }
}
