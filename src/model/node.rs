//! Output attribute tree nodes
//!
//! The mapped output instance is a tree of [`AttributeNode`]s rooted at a
//! feature-kind node. A complex node's children are an ordered sequence of
//! [`ChildSource`] segments: fully built nodes ([`ChildSource::Eager`]) and
//! deferred per-group collections ([`ChildSource::Lazy`]) that materialize
//! members on indexed access. Readers branch on the segment tag once at
//! the parent; there are no nested list adapters behind it.

use crate::error::{MappingError, Result};
use crate::mapping::LazyMultiValuedProperty;
use crate::model::AttributeValue;
use crate::path::QName;
use crate::schema::AttributeDescriptor;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Shared, interiorly mutable handle to a tree node
///
/// The engine is single-threaded and pull-based; handles are not safe to
/// share across threads.
pub type NodeHandle = Rc<RefCell<AttributeNode>>;

/// Content of a node
#[derive(Debug, Default)]
pub enum NodeContent {
    /// No content assigned yet
    #[default]
    Empty,
    /// Scalar leaf value
    Value(AttributeValue),
    /// Child segments of a complex node, in attachment order
    Children(Vec<ChildSource>),
}

/// One segment of a complex node's children
#[derive(Debug)]
pub enum ChildSource {
    /// Fully built child nodes in sibling order
    Eager(Vec<NodeHandle>),
    /// Deferred per-group collection, expanded on indexed access
    Lazy(LazyMultiValuedProperty),
}

impl ChildSource {
    fn len(&self) -> usize {
        match self {
            ChildSource::Eager(children) => children.len(),
            ChildSource::Lazy(lazy) => lazy.size(),
        }
    }
}

/// One node of the output attribute tree
#[derive(Debug)]
pub struct AttributeNode {
    descriptor: Arc<AttributeDescriptor>,
    id: Option<String>,
    content: NodeContent,
    client_properties: IndexMap<QName, AttributeValue>,
}

impl AttributeNode {
    /// Create an empty node declared by `descriptor`
    pub fn new(descriptor: Arc<AttributeDescriptor>) -> Self {
        Self {
            descriptor,
            id: None,
            content: NodeContent::Empty,
            client_properties: IndexMap::new(),
        }
    }

    /// Create an empty node wrapped in a handle
    pub fn new_handle(descriptor: Arc<AttributeDescriptor>) -> NodeHandle {
        Rc::new(RefCell::new(Self::new(descriptor)))
    }

    /// Node name, per its descriptor
    pub fn name(&self) -> &QName {
        &self.descriptor.name
    }

    /// Declaring descriptor
    pub fn descriptor(&self) -> &Arc<AttributeDescriptor> {
        &self.descriptor
    }

    /// Identifier, for feature/complex kinds
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Assign or clear the identifier
    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// Scalar value, if this node holds one
    pub fn value(&self) -> Option<&AttributeValue> {
        match &self.content {
            NodeContent::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Assign a scalar value
    pub fn set_value(&mut self, value: AttributeValue) {
        self.content = NodeContent::Value(value);
    }

    /// Drop any scalar value
    pub fn clear_value(&mut self) {
        if matches!(self.content, NodeContent::Value(_)) {
            self.content = NodeContent::Empty;
        }
    }

    /// Raw content
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// First lazy child collection, if any was installed
    pub fn lazy(&self) -> Option<&LazyMultiValuedProperty> {
        self.lazy_collections().into_iter().next()
    }

    /// All lazy child collections in install order
    pub fn lazy_collections(&self) -> Vec<&LazyMultiValuedProperty> {
        match &self.content {
            NodeContent::Children(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    ChildSource::Lazy(lazy) => Some(lazy),
                    ChildSource::Eager(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Total number of children across all segments; lazy collections
    /// report the group size without materializing members
    pub fn child_count(&self) -> usize {
        match &self.content {
            NodeContent::Children(segments) => segments.iter().map(ChildSource::len).sum(),
            _ => 0,
        }
    }

    /// Child at `index` (0-based across segments in attachment order),
    /// materializing members of lazy segments on demand
    pub fn child_at(&self, index: usize) -> Result<NodeHandle> {
        let NodeContent::Children(segments) = &self.content else {
            return Err(MappingError::IndexOutOfBounds { index, size: 0 });
        };
        let mut offset = index;
        for segment in segments {
            let len = segment.len();
            if offset < len {
                return match segment {
                    ChildSource::Eager(children) => Ok(children[offset].clone()),
                    ChildSource::Lazy(lazy) => lazy.get(offset),
                };
            }
            offset -= len;
        }
        Err(MappingError::IndexOutOfBounds {
            index,
            size: self.child_count(),
        })
    }

    /// Eager children with the given name, in sibling order. Lazy members
    /// are not searched; path walking only ever addresses built nodes.
    pub fn children_named(&self, name: &QName) -> Vec<NodeHandle> {
        match &self.content {
            NodeContent::Children(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    ChildSource::Eager(children) => Some(children),
                    ChildSource::Lazy(_) => None,
                })
                .flatten()
                .filter(|c| c.borrow().name() == name)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Append an eager child. Only meaningful on empty or children-bearing
    /// nodes; the tree builder never appends past a scalar value.
    pub fn append_child(&mut self, child: NodeHandle) {
        match &mut self.content {
            NodeContent::Children(segments) => {
                if let Some(ChildSource::Eager(children)) = segments.last_mut() {
                    children.push(child);
                } else {
                    segments.push(ChildSource::Eager(vec![child]));
                }
            }
            NodeContent::Empty => {
                self.content = NodeContent::Children(vec![ChildSource::Eager(vec![child])]);
            }
            NodeContent::Value(_) => {
                debug_assert!(false, "appended child to a scalar-valued node");
            }
        }
    }

    /// Install a lazy child collection as the next child segment
    pub fn install_lazy(&mut self, lazy: LazyMultiValuedProperty) {
        match &mut self.content {
            NodeContent::Children(segments) => segments.push(ChildSource::Lazy(lazy)),
            NodeContent::Empty => {
                self.content = NodeContent::Children(vec![ChildSource::Lazy(lazy)]);
            }
            NodeContent::Value(_) => {
                debug_assert!(false, "installed lazy children on a scalar-valued node");
            }
        }
    }

    /// Client property value by name
    pub fn client_property(&self, name: &QName) -> Option<&AttributeValue> {
        self.client_properties.get(name)
    }

    /// Set a client property
    pub fn set_client_property(&mut self, name: QName, value: AttributeValue) {
        self.client_properties.insert(name, value);
    }

    /// Drop all client properties (used when rebinding a shared skeleton
    /// node to a different group row)
    pub fn clear_client_properties(&mut self) {
        self.client_properties.clear();
    }

    /// All client properties in insertion order
    pub fn client_properties(&self) -> &IndexMap<QName, AttributeValue> {
        &self.client_properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeKind, Occurs};

    fn descriptor(name: &str) -> Arc<AttributeDescriptor> {
        Arc::new(AttributeDescriptor {
            name: QName::local(name),
            kind: AttributeKind::Scalar,
            type_name: None,
            max_occurs: Occurs::Unbounded,
        })
    }

    #[test]
    fn test_value_assignment() {
        let mut node = AttributeNode::new(descriptor("name"));
        assert!(node.value().is_none());
        node.set_value(AttributeValue::from("A"));
        assert_eq!(node.value(), Some(&AttributeValue::from("A")));
        node.clear_value();
        assert!(node.value().is_none());
    }

    #[test]
    fn test_eager_children_keep_sibling_order() {
        let mut parent = AttributeNode::new(descriptor("parent"));
        let a = AttributeNode::new_handle(descriptor("m"));
        let b = AttributeNode::new_handle(descriptor("m"));
        parent.append_child(a.clone());
        parent.append_child(b.clone());
        assert_eq!(parent.child_count(), 2);
        assert!(Rc::ptr_eq(&parent.child_at(0).unwrap(), &a));
        assert!(Rc::ptr_eq(&parent.child_at(1).unwrap(), &b));
        assert!(matches!(
            parent.child_at(2),
            Err(MappingError::IndexOutOfBounds { index: 2, size: 2 })
        ));
        assert_eq!(parent.children_named(&QName::local("m")).len(), 2);
    }

    #[test]
    fn test_client_properties() {
        let mut node = AttributeNode::new(descriptor("name"));
        node.set_client_property(QName::from("xlink:title"), "t".into());
        assert_eq!(
            node.client_property(&QName::from("xlink:title")),
            Some(&AttributeValue::from("t"))
        );
        node.clear_client_properties();
        assert!(node.client_property(&QName::from("xlink:title")).is_none());
    }
}
