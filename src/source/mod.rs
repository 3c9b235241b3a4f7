//! Record sources: the flat/joined input side of the mapping engine
//!
//! Grouping correctness depends on records sharing a group key being
//! contiguous in iteration order; the source (or its upstream sort/join)
//! guarantees that, not this crate.

use crate::error::Result;
use crate::expression::PropertyName;
use crate::model::AttributeValue;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// One flat source row: an ordered property-name → value map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: IndexMap<PropertyName, AttributeValue>,
}

impl Record {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object; `None` for any other JSON kind
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        let mut record = Record::new();
        for (name, value) in object {
            record.insert(PropertyName::new(name), AttributeValue::from_json(value));
        }
        Some(record)
    }

    /// Set a property value
    pub fn insert(&mut self, name: PropertyName, value: AttributeValue) {
        self.values.insert(name, value);
    }

    /// Read a property value
    pub fn get(&self, name: &PropertyName) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    /// Property names in record order
    pub fn property_names(&self) -> impl Iterator<Item = &PropertyName> {
        self.values.keys()
    }

    /// Keep only the listed properties (query projection)
    pub fn project(&self, properties: &[PropertyName]) -> Record {
        let values = self
            .values
            .iter()
            .filter(|(name, _)| properties.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Record { values }
    }
}

/// Query handed to a record source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Cap on yielded output instances. Enforced by the feature iterator,
    /// not the source: N source rows collapse into one grouped feature.
    pub max_features: Option<usize>,
    /// Requested source properties; `None` means all
    pub properties: Option<Vec<PropertyName>>,
}

impl Query {
    /// Query for everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Query capped at `max` output features
    pub fn with_max_features(mut self, max: usize) -> Self {
        self.max_features = Some(max);
        self
    }

    /// Query restricted to the listed properties
    pub fn with_properties(mut self, properties: Vec<PropertyName>) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Pull cursor over source records
pub trait RecordCursor {
    /// Next record in source order, or `None` when exhausted
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Release underlying resources; idempotent
    fn close(&mut self);
}

/// A queryable source of flat records
pub trait RecordSource {
    /// Translate an output-side query into the source-side query this
    /// source will actually run
    fn unroll_query(&self, query: &Query) -> Query;

    /// Open a cursor for the (already unrolled) source query
    fn iterate(&self, query: &Query) -> Result<Box<dyn RecordCursor>>;
}

/// In-memory record source with deterministic iteration order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<Record>,
}

impl MemorySource {
    /// Source over the given records, in the given order
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Source over records parsed from a JSON array of objects
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let rows = value.as_array()?;
        let records = rows.iter().map(Record::from_json).collect::<Option<_>>()?;
        Some(Self::new(records))
    }
}

impl RecordSource for MemorySource {
    fn unroll_query(&self, query: &Query) -> Query {
        // max_features does not survive unrolling: the output bound is in
        // features (groups), not source rows
        Query {
            max_features: None,
            properties: query.properties.clone(),
        }
    }

    fn iterate(&self, query: &Query) -> Result<Box<dyn RecordCursor>> {
        let records = match &query.properties {
            Some(properties) => self.records.iter().map(|r| r.project(properties)).collect(),
            None => self.records.clone(),
        };
        Ok(Box::new(MemoryCursor {
            records: records.into_iter(),
            closed: false,
        }))
    }
}

struct MemoryCursor {
    records: std::vec::IntoIter<Record>,
    closed: bool,
}

impl RecordCursor for MemoryCursor {
    fn next_record(&mut self) -> Result<Option<Record>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.records.next())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
