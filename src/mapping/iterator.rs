//! The mapping feature iterator
//!
//! Drives the group cursor and yields one output instance per group:
//! simple mappings are resolved eagerly against the group's representative
//! record through the tree builder; each multivalued root gets a
//! [`LazyMultiValuedProperty`] installed at its parent node instead.

use super::classifier::MappingPartition;
use super::group::GroupCursor;
use super::lazy::LazyMultiValuedProperty;
use super::tree::{AttributeTreeBuilder, NodeFactory};
use super::{AttributeMapping, FeatureTypeMapping};
use crate::error::{MappingError, Result};
use crate::model::NodeHandle;
use crate::schema::SchemaResolver;
use crate::source::{Query, Record, RecordSource};
use std::sync::Arc;

/// Pull iterator over mapped output instances
///
/// Single-threaded and synchronous; `next()`/`has_next()` may block on the
/// underlying source. Any failure while resolving a group's simple
/// mappings closes resources and aborts the whole iteration; instances
/// already yielded stay valid, there is no per-feature skip.
pub struct MappingFeatureIterator {
    mapping: FeatureTypeMapping,
    partition: MappingPartition,
    groups: GroupCursor,
    resolver: Arc<dyn SchemaResolver>,
    factory: NodeFactory,
    max_features: Option<usize>,
    yielded: usize,
    closed: bool,
}

impl MappingFeatureIterator {
    /// Open an iterator: unroll the output query against `source`, start a
    /// grouped cursor, and classify the mapping list once.
    pub fn new(
        source: &dyn RecordSource,
        query: &Query,
        mapping: FeatureTypeMapping,
        resolver: Arc<dyn SchemaResolver>,
    ) -> Result<Self> {
        let source_query = source.unroll_query(query);
        let cursor = source.iterate(&source_query)?;
        let partition = MappingPartition::classify(mapping.mappings(), mapping.group_by());
        let groups = GroupCursor::new(cursor, mapping.group_by().to_vec());
        Ok(Self {
            mapping,
            partition,
            groups,
            resolver,
            factory: NodeFactory,
            max_features: query.max_features,
            yielded: 0,
            closed: false,
        })
    }

    /// True if another instance can be yielded. Idempotent: probing never
    /// consumes a group.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.max_features.is_some_and(|max| self.yielded >= max) {
            return Ok(false);
        }
        self.groups.has_next()
    }

    /// Build and yield the next output instance
    pub fn next(&mut self) -> Result<NodeHandle> {
        if self.closed {
            return Err(MappingError::ClosedIterator);
        }
        if !self.has_next()? {
            self.close();
            return Err(MappingError::ClosedIterator);
        }
        let result = self.build_next();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn build_next(&mut self) -> Result<NodeHandle> {
        let group = self
            .groups
            .next_group()?
            .ok_or(MappingError::ClosedIterator)?;
        let representative = &group[0];

        let root = self.factory.create_feature(self.mapping.target());
        let feature_id = self.derive_feature_id(representative)?;
        root.borrow_mut().set_id(Some(feature_id));

        let builder = AttributeTreeBuilder::new(self.resolver.as_ref(), &self.factory);
        let target_name = self.mapping.target().name.clone();

        for mapping in self.partition.simple() {
            let is_root_mapping =
                mapping.target_path().len() == 1 && mapping.target_path().first().name == target_name;
            let handle = if is_root_mapping {
                // The feature id was derived above; only client properties
                // remain to apply on the root
                root.clone()
            } else {
                let value = Self::evaluate_fatal(mapping, mapping.source_expression(), representative)?;
                let id = match mapping.identifier_expression() {
                    Some(expr) => {
                        Self::evaluate_fatal(mapping, expr, representative)?.map(|v| v.to_string())
                    }
                    None => None,
                };
                builder.set(
                    &root,
                    mapping.target_path(),
                    value,
                    id,
                    mapping.target_node_type(),
                )?
            };
            for (name, expr) in mapping.client_properties() {
                if let Some(value) = Self::evaluate_fatal(mapping, expr, representative)? {
                    handle.borrow_mut().set_client_property(name.clone(), value);
                }
            }
        }

        for root_mapping in self.partition.multivalued_roots() {
            let parent = builder.get_or_create_parent(&root, root_mapping.target_path())?;
            let parent_type = {
                let node = parent.borrow();
                self.resolver.type_of(node.descriptor()).ok_or_else(|| {
                    MappingError::SchemaMismatch {
                        parent: node.name().to_string(),
                        step: root_mapping.target_path().last().name.to_string(),
                    }
                })?
            };
            let children = self
                .partition
                .children_of(root_mapping.target_path())
                .to_vec();
            let lazy = LazyMultiValuedProperty::build(
                root_mapping.clone(),
                children,
                &group,
                self.resolver.clone(),
                self.factory.clone(),
                parent_type,
            );
            parent.borrow_mut().install_lazy(lazy);
        }

        self.yielded += 1;
        let capped = self.max_features.is_some_and(|max| self.yielded >= max);
        if capped || !self.groups.has_next()? {
            // Release the source before handing the instance out
            self.close();
        }
        Ok(root)
    }

    /// Simple-mapping evaluation: any failure aborts the whole iteration
    fn evaluate_fatal(
        mapping: &AttributeMapping,
        expr: &crate::expression::Expr,
        record: &Record,
    ) -> Result<Option<crate::model::AttributeValue>> {
        expr.evaluate(record).map_err(|e| MappingError::Evaluation {
            target: mapping.target_path().to_string(),
            source: e,
        })
    }

    /// Feature id from the root mapping's identifier expression, or a
    /// synthetic `Type.N` fallback
    fn derive_feature_id(&self, representative: &Record) -> Result<String> {
        if let Some(root_mapping) = self.mapping.root_mapping() {
            if let Some(expr) = root_mapping.identifier_expression() {
                let value =
                    Self::evaluate_fatal(root_mapping, expr, representative)?;
                if let Some(value) = value {
                    return Ok(value.to_string());
                }
            }
        }
        Ok(format!(
            "{}.{}",
            self.mapping.target().name.local,
            self.yielded + 1
        ))
    }

    /// Number of instances yielded so far
    pub fn features_yielded(&self) -> usize {
        self.yielded
    }

    /// True once closed (explicitly, on exhaustion, or on error)
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the record source; idempotent and safe mid-group
    pub fn close(&mut self) {
        if !self.closed {
            self.groups.close();
            self.closed = true;
            log::debug!("mapping iterator closed after {} feature(s)", self.yielded);
        }
    }
}

impl Drop for MappingFeatureIterator {
    fn drop(&mut self) {
        self.close();
    }
}
