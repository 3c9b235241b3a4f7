//! Data model for mapped output
//!
//! The value type carried by leaves and records, and the attribute tree
//! nodes the engine builds per group.

pub mod node;
pub mod value;

pub use node::{AttributeNode, ChildSource, NodeContent, NodeHandle};
pub use value::AttributeValue;
