//! XPath-like target paths: qualified names, steps, and step lists
//!
//! A [`StepList`] addresses one node in the output attribute tree. Each
//! [`Step`] is a qualified name with an optional 1-based repetition index,
//! following the XPath convention for repeated siblings (`measurement[2]`).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::num::NonZeroUsize;
use thiserror::Error;

/// Qualified name of a path step or schema attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    /// Optional namespace prefix
    pub namespace: Option<String>,
    /// Local part of the name
    pub local: String,
}

impl QName {
    /// Create a name without a namespace
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: name.into(),
        }
    }

    /// Create a namespaced name
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}:{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

impl From<&str> for QName {
    fn from(s: &str) -> Self {
        match s.split_once(':') {
            Some((ns, local)) => Self::namespaced(ns, local),
            None => Self::local(s),
        }
    }
}

/// One step of a target path, optionally carrying a 1-based index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    /// Name of the addressed attribute
    pub name: QName,
    /// 1-based position among same-named siblings, when explicit
    pub index: Option<NonZeroUsize>,
}

impl Step {
    /// Create an unindexed step
    pub fn named(name: impl Into<QName>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// Create a step with an explicit 1-based index
    pub fn indexed(name: impl Into<QName>, index: NonZeroUsize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }

    /// Compare two steps by name only
    pub fn equals_ignoring_index(&self, other: &Step) -> bool {
        self.name == other.name
    }
}

impl From<&str> for Step {
    fn from(s: &str) -> Self {
        Self::named(QName::from(s))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{i}]", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Error produced when parsing a textual path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathParseError {
    /// The input contained no steps
    #[error("a target path must contain at least one step")]
    Empty,
    /// A step carried a malformed or zero index
    #[error("invalid step index in {step:?}: indices are 1-based integers")]
    InvalidIndex {
        /// The offending step text
        step: String,
    },
}

/// Ordered, non-empty sequence of steps addressing a node in the target tree
///
/// Immutable by convention: index substitution returns a new list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepList(SmallVec<[Step; 4]>);

impl StepList {
    /// Build a path from steps. Panics if `steps` is empty; an attribute
    /// path is never empty.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let steps: SmallVec<[Step; 4]> = steps.into_iter().collect();
        assert!(!steps.is_empty(), "a target path must not be empty");
        Self(steps)
    }

    /// Build a single-step path
    pub fn of(step: impl Into<Step>) -> Self {
        Self::new([step.into()])
    }

    /// Parse a `a/b[2]/c` style textual path
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        let mut steps = SmallVec::new();
        for raw in text.split('/').filter(|s| !s.is_empty()) {
            let step = match raw.split_once('[') {
                Some((name, rest)) => {
                    let digits = rest.strip_suffix(']').ok_or_else(|| {
                        PathParseError::InvalidIndex {
                            step: raw.to_string(),
                        }
                    })?;
                    let index: usize =
                        digits
                            .parse()
                            .map_err(|_| PathParseError::InvalidIndex {
                                step: raw.to_string(),
                            })?;
                    let index =
                        NonZeroUsize::new(index).ok_or_else(|| PathParseError::InvalidIndex {
                            step: raw.to_string(),
                        })?;
                    Step::indexed(QName::from(name), index)
                }
                None => Step::named(QName::from(raw)),
            };
            steps.push(step);
        }
        if steps.is_empty() {
            return Err(PathParseError::Empty);
        }
        Ok(Self(steps))
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collection types
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the steps
    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.0.iter()
    }

    /// First step
    pub fn first(&self) -> &Step {
        &self.0[0]
    }

    /// Last step
    pub fn last(&self) -> &Step {
        &self.0[self.0.len() - 1]
    }

    /// Step at `position` (0-based), if within bounds
    pub fn get(&self, position: usize) -> Option<&Step> {
        self.0.get(position)
    }

    /// Compare two paths step-wise by name only
    pub fn equals_ignoring_index(&self, other: &StepList) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.equals_ignoring_index(b))
    }

    /// Length of the longest common name-only prefix with `other`
    pub fn shared_name_prefix_len(&self, other: &StepList) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a.equals_ignoring_index(b))
            .count()
    }

    /// True iff `parent` is a strict name-only prefix of this path
    pub fn is_child_of(&self, parent: &StepList) -> bool {
        parent.len() < self.len() && self.shared_name_prefix_len(parent) == parent.len()
    }

    /// Return a copy with the step at `position` (0-based) carrying `index`
    pub fn with_index_at(&self, position: usize, index: NonZeroUsize) -> StepList {
        let mut steps = self.0.clone();
        if let Some(step) = steps.get_mut(position) {
            step.index = Some(index);
        }
        Self(steps)
    }

    /// Return a copy extended by one child step
    pub fn child(&self, step: impl Into<Step>) -> StepList {
        let mut steps = self.0.clone();
        steps.push(step.into());
        Self(steps)
    }

    /// Path of all but the last step, or `None` for a single-step path
    pub fn parent(&self) -> Option<StepList> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].iter().cloned().collect()))
    }

    /// Steps after the first `prefix_len`, as a new path
    ///
    /// Used to express a child mapping's path relative to its multivalued
    /// root. Panics if nothing remains past the prefix.
    pub fn strip_prefix_len(&self, prefix_len: usize) -> StepList {
        Self::new(self.0[prefix_len..].iter().cloned())
    }
}

impl fmt::Display for StepList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StepList {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
