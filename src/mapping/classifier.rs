//! Mapping classification
//!
//! Splits a mapping list into three partitions: multivalued roots, the
//! transitive children of each root (paths beneath the root's path, by
//! name-only prefix), and the remaining simple mappings, which are resolved
//! once per group against the representative record.

use super::AttributeMapping;
use crate::expression::PropertyName;
use crate::path::StepList;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The classified mapping list, computed once and cached on the iterator
#[derive(Debug, Clone, Default)]
pub struct MappingPartition {
    simple: Vec<Arc<AttributeMapping>>,
    roots: Vec<Arc<AttributeMapping>>,
    children: FxHashMap<StepList, Vec<Arc<AttributeMapping>>>,
}

impl MappingPartition {
    /// Classify `mappings`. Every mapping lands in exactly one partition:
    /// multivalued mappings are roots; a non-root whose path is a strict
    /// name-prefix extension of a root's path is a child of that root,
    /// first-declared root winning when the prefix test matches several;
    /// everything else is simple.
    pub fn classify(mappings: &[Arc<AttributeMapping>], group_by: &[PropertyName]) -> Self {
        let roots: Vec<Arc<AttributeMapping>> = mappings
            .iter()
            .filter(|m| m.is_multi_valued())
            .cloned()
            .collect();

        let mut children: FxHashMap<StepList, Vec<Arc<AttributeMapping>>> = FxHashMap::default();
        let mut simple = Vec::new();

        for mapping in mappings {
            if mapping.is_multi_valued() {
                continue;
            }
            let matching: Vec<&Arc<AttributeMapping>> = roots
                .iter()
                .filter(|root| mapping.target_path().is_child_of(root.target_path()))
                .collect();
            if matching.len() > 1 {
                log::warn!(
                    "mapping {} is a structural child of {} multivalued roots; \
                     grouping it under the first-declared root {}",
                    mapping.target_path(),
                    matching.len(),
                    matching[0].target_path()
                );
            }
            match matching.first() {
                Some(root) => children
                    .entry(root.target_path().clone())
                    .or_default()
                    .push(mapping.clone()),
                None => {
                    Self::check_grouping_coverage(mapping, group_by);
                    simple.push(mapping.clone());
                }
            }
        }

        Self {
            simple,
            roots,
            children,
        }
    }

    /// A simple mapping reading properties outside the grouping set takes
    /// its value from whichever record happens to represent the group; that
    /// is a modeling inconsistency worth surfacing, not an error.
    fn check_grouping_coverage(mapping: &AttributeMapping, group_by: &[PropertyName]) {
        if group_by.is_empty() {
            return;
        }
        let outside: Vec<PropertyName> = mapping
            .source_expression()
            .referenced_properties()
            .into_iter()
            .filter(|p| !group_by.contains(p))
            .collect();
        if !outside.is_empty() {
            log::warn!(
                "simple mapping {} reads {outside:?}, which are not grouping properties",
                mapping.target_path()
            );
        }
    }

    /// Simple mappings, in declaration order
    pub fn simple(&self) -> &[Arc<AttributeMapping>] {
        &self.simple
    }

    /// Multivalued root mappings, in declaration order
    pub fn multivalued_roots(&self) -> &[Arc<AttributeMapping>] {
        &self.roots
    }

    /// Child mappings of the root declared at `root_path` (excluding the
    /// root itself)
    pub fn children_of(&self, root_path: &StepList) -> &[Arc<AttributeMapping>] {
        self.children
            .get(root_path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::property;
    use crate::path::StepList;

    fn mapping(prop: &str, target: &str) -> Arc<AttributeMapping> {
        Arc::new(AttributeMapping::new(
            property(prop),
            StepList::parse(target).unwrap(),
        ))
    }

    fn multi(prop: &str, target: &str) -> Arc<AttributeMapping> {
        Arc::new(
            AttributeMapping::new(property(prop), StepList::parse(target).unwrap()).multi_valued(),
        )
    }

    #[test]
    fn test_descendant_of_multivalued_path_is_a_child() {
        let mappings = vec![multi("m", "a/b/c"), mapping("d", "a/b/c/d")];
        let partition = MappingPartition::classify(&mappings, &[]);
        assert_eq!(partition.multivalued_roots().len(), 1);
        let children = partition.children_of(&StepList::parse("a/b/c").unwrap());
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].target_path().to_string(), "a/b/c/d");
        assert!(partition.simple().is_empty());
    }

    #[test]
    fn test_sibling_paths_stay_simple() {
        let mappings = vec![
            multi("m", "a/b"),
            mapping("x", "a/c"),
            mapping("y", "name"),
        ];
        let partition = MappingPartition::classify(&mappings, &[]);
        assert_eq!(partition.simple().len(), 2);
        assert!(
            partition
                .children_of(&StepList::parse("a/b").unwrap())
                .is_empty()
        );
    }

    #[test]
    fn test_every_mapping_lands_in_exactly_one_partition() {
        let mappings = vec![
            mapping("station", "name"),
            multi("m", "measurement"),
            mapping("r", "measurement/result"),
            mapping("u", "measurement/unit"),
            multi("o", "observation"),
            mapping("v", "observation/value"),
        ];
        let partition = MappingPartition::classify(&mappings, &[]);
        let total = partition.simple().len()
            + partition.multivalued_roots().len()
            + partition
                .multivalued_roots()
                .iter()
                .map(|r| partition.children_of(r.target_path()).len())
                .sum::<usize>();
        assert_eq!(total, mappings.len());
    }

    #[test]
    fn test_ambiguous_child_goes_to_first_declared_root() {
        // a/b is a child of both roots by the name-prefix rule once a/b/c
        // extends both a and a/b paths; construct overlapping roots
        let mappings = vec![multi("m1", "a"), multi("m2", "a/b"), mapping("x", "a/b/c")];
        let partition = MappingPartition::classify(&mappings, &[]);
        let first = partition.children_of(&StepList::parse("a").unwrap());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].target_path().to_string(), "a/b/c");
        assert!(
            partition
                .children_of(&StepList::parse("a/b").unwrap())
                .is_empty()
        );
    }

    #[test]
    fn test_index_differences_ignored_for_classification() {
        let mappings = vec![multi("m", "a/b"), mapping("x", "a/b[2]/c")];
        let partition = MappingPartition::classify(&mappings, &[]);
        assert_eq!(
            partition
                .children_of(&StepList::parse("a/b").unwrap())
                .len(),
            1
        );
    }
}
