//! In-memory document store.
//!
//! Emulates the remote store semantics the descriptor set depends on:
//! textual queries, upsert by id, writes staged until commit, fixed-size
//! result pages, and rejection of queries over the clause limit. Every call
//! is recorded so tests can inspect how operations were batched.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use descry_core::{DescryResult, StoreError};

use crate::document::{Document, FieldValue};
use crate::query::Query;
use crate::store::{DocumentStore, ResultPage};

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Select { query: String },
    NextPage { query: String, start: usize },
    Add { id: String },
    AddMany { count: usize },
    Delete { query: String },
    Commit,
}

enum Staged {
    Upsert(Document),
    Delete(Query),
}

#[derive(Default)]
struct State {
    committed: BTreeMap<String, Document>,
    staged: Vec<Staged>,
    calls: Vec<StoreCall>,
}

impl State {
    fn apply_staged(&mut self) {
        for op in std::mem::take(&mut self.staged) {
            match op {
                Staged::Upsert(document) => {
                    if let Some(id) = document.id().map(str::to_string) {
                        self.committed.insert(id, document);
                    }
                }
                Staged::Delete(query) => self.committed.retain(|_, doc| !matches(&query, doc)),
            }
        }
    }
}

/// Document store held entirely in process memory.
pub struct InMemoryDocumentStore {
    state: Mutex<State>,
    page_size: usize,
    max_boolean_clauses: Option<usize>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            max_boolean_clauses: None,
        }
    }

    /// Results returned per page. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Reject queries with more leaf clauses than this.
    pub fn with_max_boolean_clauses(mut self, max: usize) -> Self {
        self.max_boolean_clauses = Some(max);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Forget recorded calls, keeping documents.
    pub fn reset_calls(&self) {
        if let Ok(mut state) = self.lock() {
            state.calls.clear();
        }
    }

    /// Number of committed documents.
    pub fn committed_len(&self) -> usize {
        self.lock().map(|s| s.committed.len()).unwrap_or(0)
    }

    /// Number of writes waiting for a commit.
    pub fn staged_len(&self) -> usize {
        self.lock().map(|s| s.staged.len()).unwrap_or(0)
    }

    /// A committed document by id.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.lock().ok().and_then(|s| s.committed.get(id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn parse(&self, text: &str) -> Result<Query, StoreError> {
        let query = Query::parse(text)?;
        if let Some(max) = self.max_boolean_clauses {
            let clauses = query.clause_count();
            if clauses > max {
                return Err(StoreError::QueryRejected {
                    reason: format!("too many boolean clauses: {} > {}", clauses, max),
                });
            }
        }
        Ok(query)
    }

    fn page(&self, state: &State, query_text: &str, query: &Query, start: usize) -> ResultPage {
        let matching: Vec<&Document> = state
            .committed
            .values()
            .filter(|doc| matches(query, doc))
            .collect();
        ResultPage {
            query: query_text.to_string(),
            start,
            rows: self.page_size,
            results: matching
                .iter()
                .skip(start)
                .take(self.page_size)
                .map(|doc| (*doc).clone())
                .collect(),
            total_matches: matching.len(),
        }
    }
}

fn missing_id() -> StoreError {
    StoreError::Backend {
        backend: "memory".to_string(),
        reason: "document has no id".to_string(),
    }
}

/// Whether a document satisfies a query.
fn matches(query: &Query, doc: &Document) -> bool {
    match query {
        Query::Term { field, value } => match doc.get(field) {
            Some(FieldValue::Text(text)) => text == value,
            Some(FieldValue::Float(number)) => number.to_string() == *value,
            _ => false,
        },
        Query::Any { field } => doc.get(field).is_some_and(|v| !v.is_empty()),
        Query::And(children) => children.iter().all(|c| matches(c, doc)),
        Query::Or(children) => children.iter().any(|c| matches(c, doc)),
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn select(&self, query: &str) -> DescryResult<ResultPage> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Select {
            query: query.to_string(),
        });
        let parsed = self.parse(query)?;
        Ok(self.page(&state, query, &parsed, 0))
    }

    fn next_page(&self, page: &ResultPage) -> DescryResult<ResultPage> {
        let mut state = self.lock()?;
        let start = page.next_start();
        state.calls.push(StoreCall::NextPage {
            query: page.query.clone(),
            start,
        });
        let parsed = self.parse(&page.query)?;
        Ok(self.page(&state, &page.query, &parsed, start))
    }

    fn add(&self, document: Document, commit: bool) -> DescryResult<()> {
        let mut state = self.lock()?;
        let id = document.id().ok_or_else(missing_id)?.to_string();
        state.calls.push(StoreCall::Add { id });
        state.staged.push(Staged::Upsert(document));
        if commit {
            state.apply_staged();
        }
        Ok(())
    }

    fn add_many(&self, documents: Vec<Document>, commit: bool) -> DescryResult<()> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::AddMany {
            count: documents.len(),
        });
        if documents.iter().any(|doc| doc.id().is_none()) {
            return Err(missing_id().into());
        }
        state
            .staged
            .extend(documents.into_iter().map(Staged::Upsert));
        if commit {
            state.apply_staged();
        }
        Ok(())
    }

    fn delete(&self, query: &str) -> DescryResult<()> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Delete {
            query: query.to_string(),
        });
        let parsed = self.parse(query)?;
        state.staged.push(Staged::Delete(parsed));
        Ok(())
    }

    fn commit(&self) -> DescryResult<()> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Commit);
        state.apply_staged();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentPages;

    fn make_test_doc(id: &str, set: &str) -> Document {
        Document::new(id)
            .with("set", FieldValue::Text(set.to_string()))
            .with("uid", FieldValue::Text(id.to_string()))
            .with("blob", FieldValue::Binary(vec![1]))
    }

    #[test]
    fn test_staged_until_commit() {
        let store = InMemoryDocumentStore::new();
        store.add(make_test_doc("a", "s"), false).unwrap();
        assert_eq!(store.select("set:s").unwrap().total_matches, 0);
        assert_eq!(store.staged_len(), 1);

        store.commit().unwrap();
        assert_eq!(store.select("set:s").unwrap().total_matches, 1);
        assert_eq!(store.staged_len(), 0);
    }

    #[test]
    fn test_upsert_by_id() {
        let store = InMemoryDocumentStore::new();
        store.add(make_test_doc("a", "s"), true).unwrap();
        store
            .add(make_test_doc("a", "s").with("blob", FieldValue::Binary(vec![2])), true)
            .unwrap();
        assert_eq!(store.committed_len(), 1);
        assert_eq!(store.document("a").unwrap().binary("blob"), Some(&[2u8][..]));
    }

    #[test]
    fn test_delete_by_query() {
        let store = InMemoryDocumentStore::new();
        store
            .add_many(
                vec![make_test_doc("a", "s"), make_test_doc("b", "s"), make_test_doc("c", "t")],
                true,
            )
            .unwrap();
        store.delete("set:s AND (uid:a OR uid:zzz)").unwrap();
        assert_eq!(store.committed_len(), 3);
        store.commit().unwrap();
        assert_eq!(store.committed_len(), 2);
        assert!(store.document("a").is_none());
    }

    #[test]
    fn test_pagination_drains_all() {
        let store = InMemoryDocumentStore::new().with_page_size(3);
        let docs = (0..8).map(|i| make_test_doc(&format!("d{}", i), "s")).collect();
        store.add_many(docs, true).unwrap();

        let first = store.select("set:s").unwrap();
        assert_eq!(first.results.len(), 3);
        assert_eq!(first.total_matches, 8);

        let all: Vec<_> = DocumentPages::new(&store, "set:s")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(all.len(), 8);

        let next_pages = store
            .calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::NextPage { .. }))
            .count();
        assert_eq!(next_pages, 2);
    }

    #[test]
    fn test_any_requires_non_empty_value() {
        let store = InMemoryDocumentStore::new();
        store
            .add(
                Document::new("x")
                    .with("set", FieldValue::Text("s".to_string()))
                    .with("blob", FieldValue::Binary(vec![])),
                true,
            )
            .unwrap();
        assert_eq!(store.select("set:s AND blob:*").unwrap().total_matches, 0);
        assert_eq!(store.select("set:s").unwrap().total_matches, 1);
    }

    #[test]
    fn test_rejects_queries_over_clause_limit() {
        let store = InMemoryDocumentStore::new().with_max_boolean_clauses(3);
        assert!(store.select("set:s AND (uid:a OR uid:b)").is_ok());
        let err = store
            .select("set:s AND (uid:a OR uid:b OR uid:c)")
            .unwrap_err();
        assert!(matches!(
            err,
            descry_core::DescryError::Store(StoreError::QueryRejected { .. })
        ));
    }

    #[test]
    fn test_invalid_query_is_error() {
        let store = InMemoryDocumentStore::new();
        assert!(store.select("set:s AND (").is_err());
        assert!(store.delete("").is_err());
    }

    #[test]
    fn test_add_requires_id() {
        let store = InMemoryDocumentStore::new();
        let mut doc = Document::new("x");
        doc.insert(crate::ID_FIELD, FieldValue::Float(1.0));
        assert!(store.add(doc, true).is_err());
        assert_eq!(store.committed_len(), 0);
    }
}
