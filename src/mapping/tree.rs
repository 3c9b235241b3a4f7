//! Path-addressed construction of the output attribute tree
//!
//! [`AttributeTreeBuilder`] walks a target path from the root instance,
//! creating correctly indexed intermediate containers on demand. Node
//! construction goes through an explicit [`NodeFactory`] handed in at
//! construction time.
//!
//! Paths are relative to the root node: each step names a child of the
//! node reached so far. The one exception is the degenerate single-step
//! path equal to the root type name, which addresses the root itself and
//! is how the feature-level mapping carries the instance id.

use crate::error::{MappingError, Result};
use crate::model::{AttributeValue, NodeHandle};
use crate::path::{QName, Step, StepList};
use crate::schema::{AttributeDescriptor, AttributeKind, ComplexType, Occurs, SchemaResolver};
use std::sync::Arc;

/// Factory for attribute nodes: a plain dependency, not process-wide state
#[derive(Debug, Clone, Default)]
pub struct NodeFactory;

impl NodeFactory {
    /// Create an empty node for `descriptor`
    pub fn create(&self, descriptor: Arc<AttributeDescriptor>) -> NodeHandle {
        crate::model::AttributeNode::new_handle(descriptor)
    }

    /// Create the root feature instance for a target type
    pub fn create_feature(&self, target: &Arc<ComplexType>) -> NodeHandle {
        self.create(Arc::new(AttributeDescriptor {
            name: target.name.clone(),
            kind: AttributeKind::Feature,
            type_name: Some(target.name.clone()),
            max_occurs: Occurs::One,
        }))
    }
}

/// Builds and addresses nodes along target paths
pub struct AttributeTreeBuilder<'a> {
    resolver: &'a dyn SchemaResolver,
    factory: &'a NodeFactory,
}

impl<'a> AttributeTreeBuilder<'a> {
    /// Builder over `resolver`, constructing nodes through `factory`
    pub fn new(resolver: &'a dyn SchemaResolver, factory: &'a NodeFactory) -> Self {
        Self { resolver, factory }
    }

    /// Walk or create the node addressed by `path`, assign `value` and
    /// `id`, and return its handle.
    ///
    /// Intermediate steps without an index resolve to the last existing
    /// same-named sibling (append semantics); the final step without an
    /// index always appends a fresh sibling, so repeated calls produce
    /// siblings in call order. An explicit index addresses exactly that
    /// 1-based sibling, which must already exist or be the next position.
    pub fn set(
        &self,
        root: &NodeHandle,
        path: &StepList,
        value: Option<AttributeValue>,
        id: Option<String>,
        type_hint: Option<&QName>,
    ) -> Result<NodeHandle> {
        if self.addresses_root(root, path) {
            let mut node = root.borrow_mut();
            if id.is_some() {
                node.set_id(id);
            }
            if let Some(v) = value {
                node.set_value(v);
            }
            drop(node);
            return Ok(root.clone());
        }

        let mut current = root.clone();
        let last = path.len() - 1;
        for (pos, step) in path.iter().enumerate() {
            let is_last = pos == last;
            let hint = if is_last { type_hint } else { None };
            current = self.descend(&current, step, hint, is_last)?;
        }

        let mut node = current.borrow_mut();
        if let Some(v) = value {
            node.set_value(v);
        }
        if id.is_some() {
            node.set_id(id);
        }
        drop(node);
        Ok(current)
    }

    /// Walk or create along `path` stopping one step short of the last
    /// segment; used to attach a lazy multivalued collection at the parent
    pub fn get_or_create_parent(&self, root: &NodeHandle, path: &StepList) -> Result<NodeHandle> {
        let Some(parent_path) = path.parent() else {
            return Ok(root.clone());
        };
        let mut current = root.clone();
        for step in parent_path.iter() {
            current = self.descend(&current, step, None, false)?;
        }
        Ok(current)
    }

    fn addresses_root(&self, root: &NodeHandle, path: &StepList) -> bool {
        path.len() == 1 && path.first().name == *root.borrow().name()
    }

    /// Resolve one step under `parent`, creating the child if absent
    fn descend(
        &self,
        parent: &NodeHandle,
        step: &Step,
        type_hint: Option<&QName>,
        append_new: bool,
    ) -> Result<NodeHandle> {
        let (parent_type, siblings) = {
            let node = parent.borrow();
            let parent_type = self.resolver.type_of(node.descriptor()).ok_or_else(|| {
                MappingError::SchemaMismatch {
                    parent: node.name().to_string(),
                    step: step.name.to_string(),
                }
            })?;
            (parent_type, node.children_named(&step.name))
        };

        match step.index {
            Some(index) => {
                let position = index.get();
                if position <= siblings.len() {
                    return Ok(siblings[position - 1].clone());
                }
                if position == siblings.len() + 1 {
                    return self.create_child(parent, &parent_type, step, type_hint);
                }
                // Holes are unsupported: indices must arrive in increasing
                // order of first use, matching the group's row order
                Err(MappingError::InvalidMapping {
                    reason: format!(
                        "step {step} skips positions: {} sibling(s) exist",
                        siblings.len()
                    ),
                })
            }
            None => {
                if !append_new {
                    if let Some(last) = siblings.last() {
                        return Ok(last.clone());
                    }
                }
                self.create_child(parent, &parent_type, step, type_hint)
            }
        }
    }

    fn create_child(
        &self,
        parent: &NodeHandle,
        parent_type: &ComplexType,
        step: &Step,
        type_hint: Option<&QName>,
    ) -> Result<NodeHandle> {
        let descriptor = match type_hint {
            Some(explicit) => {
                self.resolver
                    .descriptor_for_with_type(parent_type, &step.name, explicit)
            }
            None => self.resolver.descriptor_for(parent_type, &step.name),
        }
        .ok_or_else(|| MappingError::SchemaMismatch {
            parent: parent_type.name.to_string(),
            step: step.name.to_string(),
        })?;
        let child = self.factory.create(descriptor);
        parent.borrow_mut().append_child(child.clone());
        Ok(child)
    }
}
