//! Remote document store contract and result-page draining.

use std::sync::Arc;

use descry_core::DescryResult;

use crate::document::Document;

/// One page of a query's results.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    /// Query text that produced this page.
    pub query: String,
    /// Offset of the first result within the whole result set.
    pub start: usize,
    /// The store's page size at the time of the query.
    pub rows: usize,
    pub results: Vec<Document>,
    /// Matches in the whole result set, across all pages.
    pub total_matches: usize,
}

impl ResultPage {
    /// Offset the following page starts at.
    pub fn next_start(&self) -> usize {
        self.start + self.rows
    }

    /// Whether results remain beyond this page.
    pub fn has_more(&self) -> bool {
        self.rows > 0 && self.next_start() < self.total_matches
    }
}

/// A networked document database with a textual boolean query surface.
///
/// Query strings use the syntax rendered by [`Query`](crate::Query). Writes
/// may be staged until [`commit`](Self::commit); documents are upserted by
/// their [`ID_FIELD`](crate::ID_FIELD).
pub trait DocumentStore: Send + Sync {
    /// Run a query and return its first page.
    fn select(&self, query: &str) -> DescryResult<ResultPage>;

    /// Fetch the page following `page`.
    fn next_page(&self, page: &ResultPage) -> DescryResult<ResultPage>;

    /// Upsert one document.
    fn add(&self, document: Document, commit: bool) -> DescryResult<()>;

    /// Upsert many documents in one call.
    fn add_many(&self, documents: Vec<Document>, commit: bool) -> DescryResult<()>;

    /// Delete every document matching the query.
    fn delete(&self, query: &str) -> DescryResult<()>;

    /// Make staged writes visible.
    fn commit(&self) -> DescryResult<()>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn select(&self, query: &str) -> DescryResult<ResultPage> {
        (**self).select(query)
    }

    fn next_page(&self, page: &ResultPage) -> DescryResult<ResultPage> {
        (**self).next_page(page)
    }

    fn add(&self, document: Document, commit: bool) -> DescryResult<()> {
        (**self).add(document, commit)
    }

    fn add_many(&self, documents: Vec<Document>, commit: bool) -> DescryResult<()> {
        (**self).add_many(documents, commit)
    }

    fn delete(&self, query: &str) -> DescryResult<()> {
        (**self).delete(query)
    }

    fn commit(&self) -> DescryResult<()> {
        (**self).commit()
    }
}

// ============================================================================
// PAGE DRAINING
// ============================================================================

/// Lazy, single-pass iterator over every document a query matches.
///
/// The first `select` is issued on the first call to `next`; continuation
/// pages are fetched as earlier ones are exhausted. After an error the
/// iterator is finished.
pub struct DocumentPages<'s, S: ?Sized> {
    store: &'s S,
    query: String,
    cursor: Option<ResultPage>,
    buffer: std::vec::IntoIter<Document>,
    done: bool,
}

impl<'s, S: DocumentStore + ?Sized> DocumentPages<'s, S> {
    pub fn new(store: &'s S, query: impl Into<String>) -> Self {
        Self {
            store,
            query: query.into(),
            cursor: None,
            buffer: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Total matches reported by the store, once the first page is in.
    pub fn total_matches(&self) -> Option<usize> {
        self.cursor.as_ref().map(|page| page.total_matches)
    }
}

impl<S: DocumentStore + ?Sized> Iterator for DocumentPages<'_, S> {
    type Item = DescryResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(document) = self.buffer.next() {
                return Some(Ok(document));
            }
            if self.done {
                return None;
            }

            let fetched = match &self.cursor {
                None => self.store.select(&self.query),
                Some(page) if page.has_more() => self.store.next_page(page),
                Some(_) => {
                    self.done = true;
                    return None;
                }
            };

            match fetched {
                Ok(mut page) => {
                    // An empty page means the result set shrank under us.
                    if page.results.is_empty() {
                        self.done = true;
                    }
                    self.buffer = std::mem::take(&mut page.results).into_iter();
                    self.cursor = Some(page);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
