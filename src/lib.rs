//! Complex-feature mapping engine
//!
//! Maps rows from a flat or joined relational source into instances of a
//! nested, schema-defined feature type, following declarative
//! source-expression → target-path mappings. Consecutive rows sharing the
//! configured grouping properties fold into one output instance, with
//! multivalued target properties materialized lazily per indexed access.

#![warn(missing_docs)]

pub mod error;
pub mod expression;
pub mod mapping;
pub mod model;
pub mod path;
pub mod schema;
pub mod source;

// Re-export main types
pub use error::{MappingError, Result};
pub use expression::{Expr, Expression, ExpressionError, PropertyName};
pub use mapping::{
    AttributeMapping, AttributeTreeBuilder, FeatureTypeMapping, GroupCursor,
    LazyMultiValuedProperty, MappingFeatureIterator, MappingPartition, NodeFactory,
};
pub use model::{AttributeNode, AttributeValue, ChildSource, NodeContent, NodeHandle};
pub use path::{QName, Step, StepList};
pub use schema::{
    AttributeDescriptor, AttributeKind, ComplexType, ComplexTypeBuilder, Occurs, Schema,
    SchemaBuilder, SchemaResolver,
};
pub use source::{MemorySource, Query, Record, RecordCursor, RecordSource};
