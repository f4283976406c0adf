//! Descriptor set persisted in a remote document store.
//!
//! Each descriptor is one document:
//!
//! | field              | content                                 |
//! |--------------------|-----------------------------------------|
//! | `id`               | `"{set_id}-{uuid}"`, the upsert key     |
//! | `set_id_field`     | the set identifier                      |
//! | `uuid_field`       | the descriptor uuid                     |
//! | `descriptor_field` | the codec-serialized descriptor         |
//! | `timestamp_field`  | UNIX seconds of the last add            |
//!
//! # Clause budget
//!
//! The store rejects queries with more than `max_boolean_clauses` clauses.
//! Every multi-uuid operation is split into sub-batches of at most
//! `max_boolean_clauses - 1` uuids, so each sub-query carries that many OR
//! clauses plus the one AND clause restricting it to this set.

use std::collections::HashSet;

use chrono::Utc;
use descry_core::{
    Descriptor, DescriptorCodec, DescriptorUuid, DescryResult, DocumentSetConfig, JsonCodec,
    StoreError,
};

use crate::document::{Document, FieldValue};
use crate::query::Query;
use crate::store::{DocumentPages, DocumentStore};

/// Outcome of a batch lookup.
///
/// `found` is in the store's result order, not the request order. `missing`
/// lists every requested uuid without a document, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedDescriptors {
    pub found: Vec<Descriptor>,
    pub missing: Vec<DescriptorUuid>,
}

impl FetchedDescriptors {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// All found descriptors, or [`StoreError::Missing`] naming the
    /// unresolved uuids.
    pub fn into_complete(self) -> DescryResult<Vec<Descriptor>> {
        if self.missing.is_empty() {
            Ok(self.found)
        } else {
            Err(StoreError::Missing {
                uuids: self.missing,
            }
            .into())
        }
    }
}

/// Chunked batch client for one descriptor set.
///
/// Holds only the store handle and configuration; concurrent use from many
/// threads is fine, with write conflicts on one uuid resolved by the store
/// (last writer wins).
pub struct DocumentDescriptorSet<S, C = JsonCodec> {
    store: S,
    config: DocumentSetConfig,
    codec: C,
}

impl<S: DocumentStore> DocumentDescriptorSet<S, JsonCodec> {
    /// Create a set client using the JSON codec.
    pub fn new(store: S, config: DocumentSetConfig) -> DescryResult<Self> {
        Self::with_codec(store, config, JsonCodec)
    }
}

impl<S: DocumentStore, C: DescriptorCodec> DocumentDescriptorSet<S, C> {
    /// Create a set client with a custom descriptor codec.
    pub fn with_codec(store: S, config: DocumentSetConfig, codec: C) -> DescryResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            codec,
        })
    }

    pub fn config(&self) -> &DocumentSetConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Query building
    // ------------------------------------------------------------------

    fn in_set(&self) -> Query {
        Query::term(&self.config.set_id_field, &self.config.set_id)
    }

    fn restricted(&self, clause: Query) -> Query {
        Query::and([self.in_set(), clause])
    }

    fn uuid_batch(&self, batch: &[DescriptorUuid]) -> Query {
        self.restricted(Query::or(
            batch
                .iter()
                .map(|uuid| Query::term(&self.config.uuid_field, uuid)),
        ))
    }

    fn document_id(&self, uuid: &DescriptorUuid) -> String {
        format!("{}-{}", self.config.set_id, uuid)
    }

    fn document_for(&self, descriptor: &Descriptor, timestamp: f64) -> DescryResult<Document> {
        let uuid = descriptor.uuid();
        // An empty uuid renders as `field:` and could never be queried again.
        if uuid.as_str().is_empty() {
            return Err(StoreError::InvalidDescriptor {
                id: descriptor.id.to_string(),
                reason: "descriptor uuid must not be empty".to_string(),
            }
            .into());
        }
        Ok(Document::new(self.document_id(uuid))
            .with(
                &self.config.set_id_field,
                FieldValue::Text(self.config.set_id.clone()),
            )
            .with(&self.config.uuid_field, FieldValue::Text(uuid.to_string()))
            .with(
                &self.config.descriptor_field,
                FieldValue::Binary(self.codec.encode(descriptor)?),
            )
            .with(&self.config.timestamp_field, FieldValue::Float(timestamp)))
    }

    fn decode(&self, document: &Document) -> DescryResult<Descriptor> {
        let bytes = document
            .binary(&self.config.descriptor_field)
            .ok_or_else(|| StoreError::Serialization {
                reason: format!(
                    "document {} has no '{}' field",
                    document.id().unwrap_or("<no id>"),
                    self.config.descriptor_field
                ),
            })?;
        Ok(self.codec.decode(bytes)?)
    }

    fn uuid_of(&self, document: &Document) -> DescryResult<DescriptorUuid> {
        document
            .text(&self.config.uuid_field)
            .map(DescriptorUuid::from)
            .ok_or_else(|| {
                StoreError::Serialization {
                    reason: format!(
                        "document {} has no '{}' field",
                        document.id().unwrap_or("<no id>"),
                        self.config.uuid_field
                    ),
                }
                .into()
            })
    }

    fn batches<'u>(&self, uuids: &'u [DescriptorUuid]) -> std::slice::Chunks<'u, DescriptorUuid> {
        uuids.chunks(self.config.batch_size())
    }

    // ------------------------------------------------------------------
    // Set-wide operations
    // ------------------------------------------------------------------

    /// Number of documents in this set carrying a descriptor value.
    pub fn count(&self) -> DescryResult<usize> {
        let query = self.restricted(Query::any(&self.config.descriptor_field));
        Ok(self.store.select(&query.to_string())?.total_matches)
    }

    pub fn len(&self) -> DescryResult<usize> {
        self.count()
    }

    pub fn is_empty(&self) -> DescryResult<bool> {
        Ok(self.count()? == 0)
    }

    /// Delete every document of this set and commit.
    pub fn clear(&self) -> DescryResult<()> {
        tracing::debug!(set_id = %self.config.set_id, "Clearing descriptor set");
        self.store.delete(&self.in_set().to_string())?;
        self.store.commit()
    }

    /// Whether a document exists for `uuid` in this set.
    pub fn has(&self, uuid: &DescriptorUuid) -> DescryResult<bool> {
        if uuid.as_str().is_empty() {
            return Ok(false);
        }
        let query = self.restricted(Query::term(&self.config.uuid_field, uuid));
        Ok(self.store.select(&query.to_string())?.total_matches > 0)
    }

    // ------------------------------------------------------------------
    // Adding
    // ------------------------------------------------------------------

    /// Upsert one descriptor, committing immediately when configured to.
    pub fn add(&self, descriptor: &Descriptor) -> DescryResult<()> {
        let document = self.document_for(descriptor, unix_now())?;
        self.store.add(document, self.config.commit_on_add)
    }

    /// Upsert many descriptors in batches, committing once at the end when
    /// configured to. Returns how many descriptors were sent.
    pub fn add_many<'d, I>(&self, descriptors: I) -> DescryResult<usize>
    where
        I: IntoIterator<Item = &'d Descriptor>,
    {
        let timestamp = unix_now();
        let documents = descriptors
            .into_iter()
            .map(|d| self.document_for(d, timestamp))
            .collect::<DescryResult<Vec<_>>>()?;
        if documents.is_empty() {
            return Ok(0);
        }

        let batch_size = self.config.batch_size();
        let batches = documents.len().div_ceil(batch_size);
        for (i, batch) in documents.chunks(batch_size).enumerate() {
            tracing::debug!(
                set_id = %self.config.set_id,
                batch = i + 1,
                batches,
                size = batch.len(),
                "Adding descriptor batch"
            );
            self.store.add_many(batch.to_vec(), false)?;
        }
        if self.config.commit_on_add {
            self.store.commit()?;
        }
        Ok(documents.len())
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// The descriptor stored for `uuid`, or [`StoreError::NotFound`].
    pub fn get(&self, uuid: &DescriptorUuid) -> DescryResult<Descriptor> {
        let mut fetched = self.get_many([uuid.clone()])?;
        match fetched.found.pop() {
            Some(descriptor) => Ok(descriptor),
            None => Err(StoreError::NotFound { uuid: uuid.clone() }.into()),
        }
    }

    /// Fetch many descriptors, one sub-query per batch, draining every page
    /// of a batch's results before moving on.
    pub fn get_many<I>(&self, uuids: I) -> DescryResult<FetchedDescriptors>
    where
        I: IntoIterator,
        I::Item: Into<DescriptorUuid>,
    {
        let uuids: Vec<DescriptorUuid> = uuids.into_iter().map(Into::into).collect();
        let queried = addressable(&uuids);
        let batches = queried.len().div_ceil(self.config.batch_size());
        let mut fetched = FetchedDescriptors::default();
        let mut resolved = HashSet::with_capacity(queried.len());

        for (i, batch) in self.batches(&queried).enumerate() {
            let query = self.uuid_batch(batch).to_string();
            tracing::debug!(
                set_id = %self.config.set_id,
                batch = i + 1,
                batches,
                size = batch.len(),
                "Fetching descriptor batch"
            );

            for document in DocumentPages::new(&self.store, query) {
                let document = document?;
                let descriptor = self.decode(&document)?;
                let uuid = match document.text(&self.config.uuid_field) {
                    Some(text) => DescriptorUuid::from(text),
                    None => descriptor.uuid().clone(),
                };
                resolved.insert(uuid);
                fetched.found.push(descriptor);
            }
        }

        fetched.missing = uuids
            .into_iter()
            .filter(|uuid| !resolved.contains(uuid))
            .collect();

        if !fetched.missing.is_empty() {
            tracing::debug!(
                set_id = %self.config.set_id,
                missing = fetched.missing.len(),
                "Unresolved descriptor uuids"
            );
        }
        Ok(fetched)
    }

    // ------------------------------------------------------------------
    // Removing
    // ------------------------------------------------------------------

    /// Remove the document for `uuid`. Removing an absent uuid is not an
    /// error; use [`has`](Self::has) to learn whether it was present.
    pub fn remove(&self, uuid: &DescriptorUuid) -> DescryResult<()> {
        self.remove_many([uuid.clone()])
    }

    /// Remove many descriptors, one delete query per batch, committing once
    /// at the end when configured to.
    pub fn remove_many<I>(&self, uuids: I) -> DescryResult<()>
    where
        I: IntoIterator,
        I::Item: Into<DescriptorUuid>,
    {
        let uuids: Vec<DescriptorUuid> = uuids.into_iter().map(Into::into).collect();
        let uuids = addressable(&uuids);
        if uuids.is_empty() {
            return Ok(());
        }

        let batches = uuids.len().div_ceil(self.config.batch_size());
        for (i, batch) in self.batches(&uuids).enumerate() {
            tracing::debug!(
                set_id = %self.config.set_id,
                batch = i + 1,
                batches,
                size = batch.len(),
                "Removing descriptor batch"
            );
            self.store.delete(&self.uuid_batch(batch).to_string())?;
        }
        if self.config.commit_on_add {
            self.store.commit()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    fn enumerate(&self, clauses: Vec<Query>) -> DocumentPages<'_, S> {
        let mut all = vec![self.in_set()];
        all.extend(clauses);
        DocumentPages::new(&self.store, Query::and(all).to_string())
    }

    /// Lazily iterate every uuid in the set.
    pub fn keys(&self) -> impl Iterator<Item = DescryResult<DescriptorUuid>> + '_ {
        self.enumerate(vec![Query::any(&self.config.uuid_field)])
            .map(move |document| document.and_then(|d| self.uuid_of(&d)))
    }

    /// Lazily iterate every descriptor in the set.
    pub fn descriptors(&self) -> impl Iterator<Item = DescryResult<Descriptor>> + '_ {
        self.enumerate(vec![Query::any(&self.config.descriptor_field)])
            .map(move |document| document.and_then(|d| self.decode(&d)))
    }

    /// Lazily iterate `(uuid, descriptor)` pairs.
    pub fn items(
        &self,
    ) -> impl Iterator<Item = DescryResult<(DescriptorUuid, Descriptor)>> + '_ {
        self.enumerate(vec![
            Query::any(&self.config.uuid_field),
            Query::any(&self.config.descriptor_field),
        ])
        .map(move |document| -> DescryResult<(DescriptorUuid, Descriptor)> {
            let document = document?;
            Ok((self.uuid_of(&document)?, self.decode(&document)?))
        })
    }
}

/// Uuids that can be named in a query. No document is ever written for an
/// empty uuid, so those are left out of store queries.
fn addressable(uuids: &[DescriptorUuid]) -> Vec<DescriptorUuid> {
    uuids
        .iter()
        .filter(|uuid| !uuid.as_str().is_empty())
        .cloned()
        .collect()
}

fn unix_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
}

// =============================================================================
// TESTS
// =============================================================================
