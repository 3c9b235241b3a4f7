//! Lazy multivalued property behavior through the full iterator


use featuremap::{
    AttributeValue, MappingFeatureIterator, MemorySource, PropertyName, QName, Query,
};
use pretty_assertions::assert_eq;
use test_utils::{station_mapping, station_rows, station_schema};

fn scalar_child(member: &featuremap::NodeHandle, name: &str) -> Option<AttributeValue> {
    let member = member.borrow();
    let children = member.children_named(&QName::local(name));
    children.first().and_then(|c| c.borrow().value().cloned())
}

#[test]
fn test_members_equal_independent_evaluation() {
    let rows = serde_json::json!([
        {"station": "A", "result": 10, "unit": "m"},
        {"station": "A", "result": 20, "unit": "ft"},
        {"station": "A", "result": 30, "unit": "m"},
    ]);
    let source = MemorySource::from_json(&rows).unwrap();
    let schema = station_schema();
    let mut iter =
        MappingFeatureIterator::new(&source, &Query::all(), station_mapping(&schema), schema.clone())
            .unwrap();

    let instance = iter.next().unwrap();
    let instance = instance.borrow();
    let lazy = instance.lazy().unwrap();
    assert_eq!(lazy.size(), 3);
    for (i, row) in rows.as_array().unwrap().iter().enumerate() {
        let member = lazy.get(i).unwrap();
        assert_eq!(
            scalar_child(&member, "result"),
            Some(AttributeValue::from_json(&row["result"]))
        );
        assert_eq!(
            scalar_child(&member, "unit"),
            Some(AttributeValue::from_json(&row["unit"]))
        );
        assert_eq!(
            member.borrow().id(),
            Some(format!("m.{}", row["result"]).as_str())
        );
    }
}

#[test]
fn test_members_reachable_through_child_at() {
    let schema = station_schema();
    let mut iter = MappingFeatureIterator::new(
        &station_rows(),
        &Query::all(),
        station_mapping(&schema),
        schema.clone(),
    )
    .unwrap();

    let instance = iter.next().unwrap();
    let instance = instance.borrow();
    // One eager `name` child followed by the lazy measurement collection
    assert_eq!(instance.child_count(), 3);
    let first_member = instance.child_at(1).unwrap();
    assert_eq!(
        scalar_child(&first_member, "result"),
        Some(AttributeValue::Integer(10))
    );
    let second_member = instance.child_at(2).unwrap();
    assert_eq!(
        scalar_child(&second_member, "result"),
        Some(AttributeValue::Integer(20))
    );
}

#[test]
fn test_pruned_projection_leaves_subproperty_empty() {
    // `unit` excluded from the query projection: its nodes carry no value,
    // and nothing fails
    let schema = station_schema();
    let query = Query::all().with_properties(vec![
        PropertyName::new("station"),
        PropertyName::new("result"),
    ]);
    let mut iter = MappingFeatureIterator::new(
        &station_rows(),
        &query,
        station_mapping(&schema),
        schema.clone(),
    )
    .unwrap();

    let instance = iter.next().unwrap();
    let instance = instance.borrow();
    let lazy = instance.lazy().unwrap();
    for i in 0..lazy.size() {
        let member = lazy.get(i).unwrap();
        assert!(scalar_child(&member, "result").is_some());
        assert!(scalar_child(&member, "unit").is_none());
    }
}

#[test]
fn test_projections_are_per_group() {
    let schema = station_schema();
    let mut iter = MappingFeatureIterator::new(
        &station_rows(),
        &Query::all(),
        station_mapping(&schema),
        schema.clone(),
    )
    .unwrap();

    // Consume both groups before indexing: each instance owns its own
    // projection snapshot
    let first = iter.next().unwrap();
    let second = iter.next().unwrap();
    let first = first.borrow();
    let second = second.borrow();
    assert_eq!(
        scalar_child(&first.lazy().unwrap().get(1).unwrap(), "result"),
        Some(AttributeValue::Integer(20))
    );
    assert_eq!(
        scalar_child(&second.lazy().unwrap().get(0).unwrap(), "result"),
        Some(AttributeValue::Integer(30))
    );
}
