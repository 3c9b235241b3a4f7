//! Streaming group-by over a sorted record cursor
//!
//! [`GroupCursor`] buffers one group at a time: a maximal run of
//! consecutive records whose projections onto the grouping properties are
//! list-wise equal. Only a single lookahead record is held between groups,
//! so memory stays bounded by the widest group, never the result set.

use crate::error::Result;
use crate::expression::PropertyName;
use crate::model::AttributeValue;
use crate::source::{Record, RecordCursor};

/// Group-by wrapper over a raw record cursor
pub struct GroupCursor {
    cursor: Box<dyn RecordCursor>,
    group_by: Vec<PropertyName>,
    lookahead: Option<Record>,
    closed: bool,
}

impl GroupCursor {
    /// Wrap `cursor`, grouping on `group_by`. With no grouping properties
    /// every record forms its own group.
    pub fn new(cursor: Box<dyn RecordCursor>, group_by: Vec<PropertyName>) -> Self {
        Self {
            cursor,
            group_by,
            lookahead: None,
            closed: false,
        }
    }

    /// True if another group is available. Idempotent: repeated probes
    /// buffer at most one lookahead record and never consume a group.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.lookahead.is_some() {
            return Ok(true);
        }
        match self.cursor.next_record() {
            Ok(Some(record)) => {
                self.lookahead = Some(record);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Buffer and return the current group (size ≥ 1), advancing the
    /// cursor to the first record of the next group. `None` when the
    /// source is exhausted or the cursor closed.
    ///
    /// A source failure mid-group closes the cursor and propagates; the
    /// partially read group is lost, never yielded.
    pub fn next_group(&mut self) -> Result<Option<Vec<Record>>> {
        if !self.has_next()? {
            return Ok(None);
        }
        // has_next guarantees a buffered lookahead here
        let Some(first) = self.lookahead.take() else {
            return Ok(None);
        };
        let key = self.group_key(&first);
        let mut group = vec![first];
        if !self.group_by.is_empty() {
            loop {
                match self.cursor.next_record() {
                    Ok(Some(record)) => {
                        if self.group_key(&record) == key {
                            group.push(record);
                        } else {
                            self.lookahead = Some(record);
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        self.close();
                        return Err(e);
                    }
                }
            }
        }
        log::trace!("buffered group of {} record(s)", group.len());
        Ok(Some(group))
    }

    /// Projection of a record onto the grouping properties. Multi-valued
    /// properties project as lists, so key equality is list-wise.
    fn group_key(&self, record: &Record) -> Vec<Option<AttributeValue>> {
        self.group_by
            .iter()
            .map(|name| record.get(name).cloned())
            .collect()
    }

    /// Release the underlying cursor; idempotent
    pub fn close(&mut self) {
        if !self.closed {
            self.cursor.close();
            self.lookahead = None;
            self.closed = true;
        }
    }

    /// True once closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use crate::source::{MemorySource, Query, RecordSource};

    fn grouped_cursor(rows: serde_json::Value, group_by: &[&str]) -> GroupCursor {
        let source = MemorySource::from_json(&rows).unwrap();
        let cursor = source.iterate(&Query::all()).unwrap();
        GroupCursor::new(
            cursor,
            group_by.iter().map(|n| PropertyName::new(*n)).collect(),
        )
    }

    #[test]
    fn test_consecutive_equal_keys_form_one_group() {
        let mut groups = grouped_cursor(
            serde_json::json!([
                {"station": "A", "result": 1},
                {"station": "A", "result": 2},
                {"station": "B", "result": 3},
            ]),
            &["station"],
        );
        let first = groups.next_group().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let second = groups.next_group().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(groups.next_group().unwrap().is_none());
    }

    #[test]
    fn test_group_sizes_one_through_n() {
        let mut rows = Vec::new();
        for size in 1..=4usize {
            for i in 0..size {
                rows.push(serde_json::json!({"k": size, "i": i}));
            }
        }
        let mut groups = grouped_cursor(serde_json::Value::Array(rows), &["k"]);
        for size in 1..=4usize {
            assert_eq!(groups.next_group().unwrap().unwrap().len(), size);
        }
        assert!(groups.next_group().unwrap().is_none());
    }

    #[test]
    fn test_has_next_is_idempotent() {
        let mut groups = grouped_cursor(
            serde_json::json!([
                {"station": "A"},
                {"station": "B"},
            ]),
            &["station"],
        );
        for _ in 0..5 {
            assert!(groups.has_next().unwrap());
        }
        assert_eq!(groups.next_group().unwrap().unwrap().len(), 1);
        for _ in 0..5 {
            assert!(groups.has_next().unwrap());
        }
        assert_eq!(groups.next_group().unwrap().unwrap().len(), 1);
        assert!(!groups.has_next().unwrap());
    }

    #[test]
    fn test_empty_group_by_yields_one_group_per_record() {
        let mut groups = grouped_cursor(
            serde_json::json!([
                {"station": "A"},
                {"station": "A"},
            ]),
            &[],
        );
        assert_eq!(groups.next_group().unwrap().unwrap().len(), 1);
        assert_eq!(groups.next_group().unwrap().unwrap().len(), 1);
        assert!(groups.next_group().unwrap().is_none());
    }

    #[test]
    fn test_listwise_key_equality() {
        let mut groups = grouped_cursor(
            serde_json::json!([
                {"k": [1, 2]},
                {"k": [1, 2]},
                {"k": [1, 3]},
            ]),
            &["k"],
        );
        assert_eq!(groups.next_group().unwrap().unwrap().len(), 2);
        assert_eq!(groups.next_group().unwrap().unwrap().len(), 1);
    }

    struct FailingCursor {
        yielded: usize,
        fail_at: usize,
    }

    impl RecordCursor for FailingCursor {
        fn next_record(&mut self) -> Result<Option<Record>> {
            if self.yielded == self.fail_at {
                return Err(MappingError::SourceRead {
                    message: "connection reset".to_string(),
                });
            }
            self.yielded += 1;
            Record::from_json(&serde_json::json!({"station": "A"}))
                .map(Some)
                .ok_or_else(|| MappingError::SourceRead {
                    message: "bad fixture".to_string(),
                })
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_mid_group_failure_loses_partial_group() {
        let cursor = Box::new(FailingCursor {
            yielded: 0,
            fail_at: 2,
        });
        let mut groups = GroupCursor::new(cursor, vec![PropertyName::new("station")]);
        let err = groups.next_group().unwrap_err();
        assert!(matches!(err, MappingError::SourceRead { .. }));
        assert!(groups.is_closed());
        assert!(!groups.has_next().unwrap());
        assert!(groups.next_group().unwrap().is_none());
    }
}
