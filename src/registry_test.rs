use super::*;

fn handle(id: &str, topic: &str) -> SubscriptionHandle {
    SubscriptionHandle { id: id.into(), topic: topic.into(), session: 1 }
}

#[test]
fn insert_and_lookup_by_id() {
    let mut registry = SubscriptionRegistry::new();
    let id = RecordId::from("o-9");
    assert!(!registry.contains(&id));

    assert!(registry.insert(&id, handle("sub-0", "/topic/dashboard/o-9")).is_none());
    assert!(registry.contains(&id));
    assert_eq!(registry.get(&id).map(|h| h.topic.as_str()), Some("/topic/dashboard/o-9"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn numeric_and_text_ids_share_a_slot() {
    let mut registry = SubscriptionRegistry::new();
    registry.insert(&RecordId::from(17_i64), handle("sub-0", "/topic/dashboard/17"));
    assert!(registry.contains(&RecordId::from("17")));

    let displaced = registry.insert(&RecordId::from("17"), handle("sub-1", "/topic/dashboard/17"));
    assert_eq!(displaced.map(|h| h.id), Some("sub-0".to_owned()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn drain_empties_registry() {
    let mut registry = SubscriptionRegistry::new();
    registry.insert(&RecordId::from("b"), handle("sub-1", "/topic/dashboard/b"));
    registry.insert(&RecordId::from("a"), handle("sub-0", "/topic/dashboard/a"));
    assert_eq!(registry.ids(), vec!["a".to_owned(), "b".to_owned()]);

    let mut drained: Vec<String> = registry.drain().into_iter().map(|h| h.id).collect();
    drained.sort();
    assert_eq!(drained, vec!["sub-0".to_owned(), "sub-1".to_owned()]);
    assert!(registry.is_empty());
    assert!(registry.drain().is_empty());
}
