//! Lazily indexed multivalued properties
//!
//! A [`LazyMultiValuedProperty`] is the deferred child collection installed
//! at the parent of a multivalued mapping's target path: one member per
//! grouped source record, materialized only on indexed access. Tree-shape
//! construction (schema lookups, descriptor resolution) is paid once per
//! target path: a single skeleton node chain is cached per path and merely
//! rebound (value, id, client properties) to the requested row on each
//! access. Returned handles therefore alias the shared skeleton; read a
//! member's values before indexing the next one.

use super::AttributeMapping;
use crate::error::{MappingError, Result};
use crate::expression::{ProjectionRow, PropertyName};
use crate::model::{AttributeValue, NodeHandle};
use crate::path::{QName, Step, StepList};
use crate::schema::{ComplexType, SchemaResolver};
use crate::source::Record;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use super::tree::NodeFactory;

/// Deferred, index-addressable member collection for one multivalued
/// mapping plus its child mappings, over one buffered group
pub struct LazyMultiValuedProperty {
    root: Arc<AttributeMapping>,
    children: Vec<Arc<AttributeMapping>>,
    /// Per referenced source property: one value slot per grouped record.
    /// Built once when the group is buffered, never mutated afterwards.
    projections: IndexMap<PropertyName, Vec<Option<AttributeValue>>>,
    size: usize,
    resolver: Arc<dyn SchemaResolver>,
    factory: NodeFactory,
    parent_type: Arc<ComplexType>,
    /// One shared skeleton node per target path, owned by this property
    /// and discarded with it when the iterator moves past the group
    skeletons: RefCell<FxHashMap<StepList, NodeHandle>>,
}

impl fmt::Debug for LazyMultiValuedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMultiValuedProperty")
            .field("target", &self.root.target_path().to_string())
            .field("size", &self.size)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl LazyMultiValuedProperty {
    /// Project `group` through every source property referenced by the
    /// root mapping, its identifier, its client properties, and all child
    /// mappings (each property evaluated once per record), and capture the
    /// result as this property's backing state.
    pub fn build(
        root: Arc<AttributeMapping>,
        children: Vec<Arc<AttributeMapping>>,
        group: &[Record],
        resolver: Arc<dyn SchemaResolver>,
        factory: NodeFactory,
        parent_type: Arc<ComplexType>,
    ) -> Self {
        let mut names: Vec<PropertyName> = Vec::new();
        let mut collect = |mapping: &AttributeMapping| {
            let mut exprs = vec![mapping.source_expression().clone()];
            exprs.extend(mapping.identifier_expression().cloned());
            exprs.extend(mapping.client_properties().values().cloned());
            for expr in exprs {
                for name in expr.referenced_properties() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        };
        collect(&root);
        for child in &children {
            collect(child);
        }

        let mut projections = IndexMap::new();
        for name in names {
            let values = group.iter().map(|r| r.get(&name).cloned()).collect();
            projections.insert(name, values);
        }

        Self {
            root,
            children,
            projections,
            size: group.len(),
            resolver,
            factory,
            parent_type,
            skeletons: RefCell::new(FxHashMap::default()),
        }
    }

    /// Number of members (the group's record count)
    pub fn size(&self) -> usize {
        self.size
    }

    /// The declaring multivalued mapping
    pub fn mapping(&self) -> &Arc<AttributeMapping> {
        &self.root
    }

    /// Materialize the member for record `index` (0-based within the
    /// group). A child mapping's expression failing for this record is not
    /// an error; that sub-property is simply left without a value.
    pub fn get(&self, index: usize) -> Result<NodeHandle> {
        if index >= self.size {
            return Err(MappingError::IndexOutOfBounds {
                index,
                size: self.size,
            });
        }
        let member = self.member_skeleton()?;
        let row = ProjectionRow::new(&self.projections, index);
        self.rebind(&member, &self.root, &row);
        for child in &self.children {
            let node = self.child_skeleton(&member, child)?;
            self.rebind(&node, child, &row);
        }
        log::trace!(
            "materialized member {index} of {}",
            self.root.target_path()
        );
        Ok(member)
    }

    /// Skeleton node for the member itself (the root mapping's last step
    /// under the parent type)
    fn member_skeleton(&self) -> Result<NodeHandle> {
        if let Some(handle) = self.skeletons.borrow().get(self.root.target_path()) {
            return Ok(handle.clone());
        }
        let step = self.root.target_path().last();
        let descriptor = match self.root.target_node_type() {
            Some(explicit) => {
                self.resolver
                    .descriptor_for_with_type(&self.parent_type, &step.name, explicit)
            }
            None => self.resolver.descriptor_for(&self.parent_type, &step.name),
        }
        .ok_or_else(|| MappingError::SchemaMismatch {
            parent: self.parent_type.name.to_string(),
            step: step.name.to_string(),
        })?;
        let node = self.factory.create(descriptor);
        self.skeletons
            .borrow_mut()
            .insert(self.root.target_path().clone(), node.clone());
        Ok(node)
    }

    /// Skeleton chain for one child mapping's path relative to the member
    fn child_skeleton(
        &self,
        member: &NodeHandle,
        mapping: &Arc<AttributeMapping>,
    ) -> Result<NodeHandle> {
        if let Some(handle) = self.skeletons.borrow().get(mapping.target_path()) {
            return Ok(handle.clone());
        }
        let relative = mapping
            .target_path()
            .strip_prefix_len(self.root.target_path().len());
        let mut current = member.clone();
        let last = relative.len() - 1;
        for (pos, step) in relative.iter().enumerate() {
            let hint = if pos == last {
                mapping.target_node_type()
            } else {
                None
            };
            current = self.ensure_child(&current, step, hint)?;
        }
        self.skeletons
            .borrow_mut()
            .insert(mapping.target_path().clone(), current.clone());
        Ok(current)
    }

    /// Reuse or create the single skeleton child for a step. Step indices
    /// are irrelevant here: the skeleton holds exactly one node per path.
    fn ensure_child(
        &self,
        parent: &NodeHandle,
        step: &Step,
        type_hint: Option<&QName>,
    ) -> Result<NodeHandle> {
        let (parent_type, existing) = {
            let node = parent.borrow();
            let parent_type = self.resolver.type_of(node.descriptor()).ok_or_else(|| {
                MappingError::SchemaMismatch {
                    parent: node.name().to_string(),
                    step: step.name.to_string(),
                }
            })?;
            (parent_type, node.children_named(&step.name))
        };
        if let Some(last) = existing.last() {
            return Ok(last.clone());
        }
        let descriptor = match type_hint {
            Some(explicit) => {
                self.resolver
                    .descriptor_for_with_type(&parent_type, &step.name, explicit)
            }
            None => self.resolver.descriptor_for(&parent_type, &step.name),
        }
        .ok_or_else(|| MappingError::SchemaMismatch {
            parent: parent_type.name.to_string(),
            step: step.name.to_string(),
        })?;
        let child = self.factory.create(descriptor);
        parent.borrow_mut().append_child(child.clone());
        Ok(child)
    }

    /// Point a skeleton node at one row: bind value (scalar kinds), id
    /// (complex kinds), and client properties. Expression failures here
    /// are per-record best effort, not fatal.
    fn rebind(&self, node: &NodeHandle, mapping: &AttributeMapping, row: &ProjectionRow<'_>) {
        let mut node = node.borrow_mut();
        if node.descriptor().is_complex() {
            let id = mapping.identifier_expression().and_then(|expr| {
                match expr.evaluate_projected(row) {
                    Ok(value) => value.map(|v| v.to_string()),
                    Err(e) => {
                        log::debug!(
                            "skipping id for {}: {e}",
                            mapping.target_path()
                        );
                        None
                    }
                }
            });
            node.set_id(id);
        } else {
            match mapping.source_expression().evaluate_projected(row) {
                Ok(Some(value)) => node.set_value(value),
                Ok(None) => node.clear_value(),
                Err(e) => {
                    log::debug!(
                        "skipping value for {}: {e}",
                        mapping.target_path()
                    );
                    node.clear_value();
                }
            }
        }
        node.clear_client_properties();
        for (name, expr) in mapping.client_properties() {
            match expr.evaluate_projected(row) {
                Ok(Some(value)) => node.set_client_property(name.clone(), value),
                Ok(None) => {}
                Err(e) => {
                    log::debug!(
                        "skipping client property {name} for {}: {e}",
                        mapping.target_path()
                    );
                }
            }
        }
    }
}
