//! DESCRY Docstore - Chunked Descriptor Sets
//!
//! Persists descriptors as documents in a remote, searchable document store.
//! Each descriptor becomes one document tagged with its set identifier; any
//! operation touching more uuids than the store's boolean clause limit allows
//! is split into bounded sub-queries.
//!
//! The store itself is reached through the [`DocumentStore`] trait, which
//! speaks a flat textual boolean query language built with [`Query`].
//! [`InMemoryDocumentStore`] emulates such a store for tests and local use.

pub mod document;
pub mod memory;
pub mod query;
pub mod set;
pub mod store;

pub use document::{Document, FieldValue, ID_FIELD};
pub use memory::{InMemoryDocumentStore, StoreCall};
pub use query::Query;
pub use set::{DocumentDescriptorSet, FetchedDescriptors};
pub use store::{DocumentPages, DocumentStore, ResultPage};
