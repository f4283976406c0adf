//! Batch-splitting behaviour of the descriptor set against a store that
//! enforces its boolean clause limit.

use std::sync::Arc;

use descry_docstore::{
    DocumentDescriptorSet, DocumentStore, InMemoryDocumentStore, Query, StoreCall,
};
use descry_test_utils::{
    clause_limit_strategy, descriptor_strategy, distinct_uuids_strategy, make_descriptors,
    DescriptorUuid, DescryResult, DocumentSetConfig,
};
use proptest::prelude::*;

type Set = DocumentDescriptorSet<Arc<InMemoryDocumentStore>>;

fn limited_set(max_clauses: usize, page_size: usize) -> (Arc<InMemoryDocumentStore>, Set) {
    let store = Arc::new(
        InMemoryDocumentStore::new()
            .with_max_boolean_clauses(max_clauses)
            .with_page_size(page_size),
    );
    let config = DocumentSetConfig::new("batch").with_max_boolean_clauses(max_clauses);
    let set = DocumentDescriptorSet::new(Arc::clone(&store), config).unwrap();
    (store, set)
}

fn selects(calls: &[StoreCall]) -> Vec<&str> {
    calls
        .iter()
        .filter_map(|c| match c {
            StoreCall::Select { query } => Some(query.as_str()),
            _ => None,
        })
        .collect()
}

fn deletes(calls: &[StoreCall]) -> Vec<&str> {
    calls
        .iter()
        .filter_map(|c| match c {
            StoreCall::Delete { query } => Some(query.as_str()),
            _ => None,
        })
        .collect()
}

fn or_clauses(query: &str) -> usize {
    // Every sub-query is `set AND (u1 OR u2 ...)`, so one clause is the set.
    Query::parse(query).unwrap().clause_count() - 1
}

#[test]
fn ten_uuids_with_limit_four_split_three_three_three_one() {
    let (store, set) = limited_set(4, 2);
    let descriptors = make_descriptors("sift", "d", 10);
    set.add_many(&descriptors).unwrap();
    store.reset_calls();

    let uuids: Vec<DescriptorUuid> = descriptors.iter().map(|d| d.uuid().clone()).collect();
    let fetched = set.get_many(uuids).unwrap();

    assert!(fetched.is_complete());
    assert_eq!(fetched.found.len(), 10);

    let calls = store.calls();
    let batch_sizes: Vec<usize> = selects(&calls).into_iter().map(or_clauses).collect();
    assert_eq!(batch_sizes, vec![3, 3, 3, 1]);

    // Page size 2 forces a continuation page for every full batch.
    let continuations = calls
        .iter()
        .filter(|c| matches!(c, StoreCall::NextPage { .. }))
        .count();
    assert_eq!(continuations, 3);
}

#[test]
fn remove_many_sends_every_batch() {
    let (store, set) = limited_set(4, 10);
    let descriptors = make_descriptors("sift", "r", 10);
    set.add_many(&descriptors).unwrap();
    store.reset_calls();

    set.remove_many(descriptors.iter().map(|d| d.uuid().clone())).unwrap();

    let calls = store.calls();
    let batch_sizes: Vec<usize> = deletes(&calls).into_iter().map(or_clauses).collect();
    assert_eq!(batch_sizes, vec![3, 3, 3, 1]);
    assert_eq!(calls.last(), Some(&StoreCall::Commit));
    assert_eq!(set.count().unwrap(), 0);
}

#[test]
fn enumeration_drains_every_page() {
    let (store, set) = limited_set(8, 3);
    let descriptors = make_descriptors("sift", "e", 11);
    set.add_many(&descriptors).unwrap();

    let mut keys: Vec<String> = set
        .keys()
        .map(|k| k.map(|k| k.to_string()))
        .collect::<DescryResult<_>>()
        .unwrap();
    keys.sort();
    let mut expected: Vec<String> = descriptors.iter().map(|d| d.uuid().to_string()).collect();
    expected.sort();
    assert_eq!(keys, expected);

    assert_eq!(set.descriptors().count(), 11);
    assert_eq!(set.items().count(), 11);
    assert_eq!(set.count().unwrap(), 11);
    assert_eq!(store.page_size(), 3);
}

#[test]
fn enumeration_skips_other_sets_and_bare_documents() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let set_for = |set_id: &str| {
        DocumentDescriptorSet::new(Arc::clone(&store), DocumentSetConfig::new(set_id)).unwrap()
    };
    let mine = set_for("mine");
    let theirs = set_for("theirs");

    mine.add_many(&make_descriptors("sift", "m", 3)).unwrap();
    theirs.add_many(&make_descriptors("sift", "t", 5)).unwrap();

    // A document tagged with the set but carrying no descriptor.
    store
        .add(
            descry_docstore::Document::new("mine-empty")
                .with("set_id_s", descry_docstore::FieldValue::Text("mine".to_string()))
                .with("uuid_s", descry_docstore::FieldValue::Text("empty".to_string())),
            true,
        )
        .unwrap();

    assert_eq!(mine.count().unwrap(), 3);
    assert_eq!(mine.descriptors().count(), 3);
    assert_eq!(mine.keys().count(), 4);
    assert_eq!(theirs.count().unwrap(), 5);
}

#[test]
fn commit_flag_off_leaves_writes_staged() {
    let store = Arc::new(InMemoryDocumentStore::new().with_max_boolean_clauses(4));
    let config = DocumentSetConfig::new("lazy")
        .with_max_boolean_clauses(4)
        .with_commit_on_add(false);
    let set = DocumentDescriptorSet::new(Arc::clone(&store), config).unwrap();

    let descriptors = make_descriptors("sift", "l", 5);
    set.add_many(&descriptors).unwrap();
    assert_eq!(store.staged_len(), 5);
    assert_eq!(set.count().unwrap(), 0);

    store.commit().unwrap();
    assert_eq!(set.count().unwrap(), 5);

    set.remove(descriptors[0].uuid()).unwrap();
    assert_eq!(set.count().unwrap(), 5);
    store.commit().unwrap();
    assert_eq!(set.count().unwrap(), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: every multi-uuid operation issues ceil(N / (M - 1)) store
    /// queries, none of which the clause-limited store rejects.
    #[test]
    fn prop_batch_count_matches_clause_budget(
        max_clauses in clause_limit_strategy(),
        uuids in distinct_uuids_strategy(120),
    ) {
        let (store, set) = limited_set(max_clauses, 1000);
        let expected = uuids.len().div_ceil(max_clauses - 1);

        let fetched = set.get_many(uuids.clone()).unwrap();
        prop_assert!(fetched.found.is_empty());
        prop_assert_eq!(fetched.missing, uuids.clone());
        prop_assert_eq!(selects(&store.calls()).len(), expected);

        store.reset_calls();
        set.remove_many(uuids.clone()).unwrap();
        prop_assert_eq!(deletes(&store.calls()).len(), expected);
    }

    /// Property: add_many splits into at most M - 1 documents per call and
    /// every added descriptor reads back unchanged.
    #[test]
    fn prop_add_many_then_get_many(
        max_clauses in clause_limit_strategy(),
        descriptors in prop::collection::vec(descriptor_strategy("sift"), 0..40),
    ) {
        let (store, set) = limited_set(max_clauses, 7);

        // Later duplicates overwrite earlier ones.
        let mut latest = std::collections::BTreeMap::new();
        for d in &descriptors {
            latest.insert(d.uuid().clone(), d.clone());
        }

        set.add_many(&descriptors).unwrap();
        let sizes: Vec<usize> = store
            .calls()
            .iter()
            .filter_map(|c| match c {
                StoreCall::AddMany { count } => Some(*count),
                _ => None,
            })
            .collect();
        prop_assert_eq!(sizes.len(), descriptors.len().div_ceil(max_clauses - 1));
        prop_assert!(sizes.iter().all(|&n| n < max_clauses));

        let fetched = set.get_many(latest.keys().cloned()).unwrap();
        prop_assert!(fetched.is_complete());
        prop_assert_eq!(fetched.found.len(), latest.len());
        for d in fetched.found {
            prop_assert_eq!(Some(&d), latest.get(d.uuid()));
        }
        prop_assert_eq!(set.count().unwrap(), latest.len());
    }
}
