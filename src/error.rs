//! Error taxonomy for the mapping engine

use crate::expression::ExpressionError;
use thiserror::Error;

/// Result type for mapping operations
pub type Result<T> = std::result::Result<T, MappingError>;

/// Errors that can abort feature mapping
///
/// All variants are fatal for the iterator that raised them. The only
/// locally recovered case, a child mapping's expression failing for one
/// grouped record, never surfaces here: the record simply contributes no
/// value for that sub-property.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// A target path step names an attribute absent from the schema
    #[error("schema mismatch: type {parent} declares no attribute {step}")]
    SchemaMismatch {
        /// Parent complex type name
        parent: String,
        /// Offending step name
        step: String,
    },

    /// A mapping's expression failed while resolving a group
    #[error("failed to evaluate mapping for {target}: {source}")]
    Evaluation {
        /// Target path of the failing mapping
        target: String,
        /// Underlying expression failure
        source: ExpressionError,
    },

    /// The underlying record source failed mid-read
    #[error("source read failed: {message}")]
    SourceRead {
        /// Source-reported failure description
        message: String,
    },

    /// Indexed access past the end of a group
    #[error("index {index} out of bounds for group of size {size}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Group size
        size: usize,
    },

    /// Operation invoked after `close()`
    #[error("iterator used after close")]
    ClosedIterator,

    /// Mapping configuration violates an invariant
    #[error("invalid mapping configuration: {reason}")]
    InvalidMapping {
        /// Violated invariant
        reason: String,
    },
}
