// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use super::{INDEX_KEY, IndexDocument, PersistencePort};
use crate::{AnnotationRecord, BlobStore, Error, Fingerprint, RecordStore};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// Maps a record store onto a blob store.
///
/// Every distinct fingerprint is written once as a blob; the index document
/// records membership and order. The codec remembers which blobs it has
/// already written or read, so saving after each mutation only writes the
/// new ones. A new codec starts with an empty memory and rewrites blobs on
/// its first save, which is harmless since blob writes are idempotent.
#[derive(Debug)]
pub struct PersistenceCodec<S> {
    storage: S,
    index_key: String,
    stored: HashSet<Fingerprint>,
}

impl<S: BlobStore> PersistenceCodec<S> {
    pub fn new(storage: S) -> Self {
        PersistenceCodec {
            storage,
            index_key: INDEX_KEY.to_string(),
            stored: HashSet::new(),
        }
    }

    /// Store the index under `key` instead of [`INDEX_KEY`].
    pub fn with_index_key(mut self, key: impl Into<String>) -> Self {
        self.index_key = key.into();
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Write the blobs not yet stored and return the index of `store`.
    ///
    /// Records sharing a fingerprint produce a single blob holding the bytes
    /// of the last of them; the index still lists the fingerprint once per
    /// record.
    pub async fn serialize(&mut self, store: &RecordStore) -> Result<IndexDocument, Error> {
        let mut latest: HashMap<&Fingerprint, &AnnotationRecord> = HashMap::new();
        let mut order = Vec::new();
        for record in store.iter() {
            let fingerprint = record.fingerprint();
            if latest.insert(fingerprint, record).is_none() {
                order.push(fingerprint);
            }
        }

        let mut written = 0;
        for fingerprint in order {
            if self.stored.contains(fingerprint) {
                continue;
            }
            let record = latest[fingerprint];
            self.storage
                .set(fingerprint.as_str(), &record.to_data_url())
                .await?;
            self.stored.insert(fingerprint.clone());
            written += 1;
        }
        debug!("Wrote {} new blobs for {} records", written, store.len());

        Ok(IndexDocument {
            events: store.iter().map(|r| r.fingerprint().clone()).collect(),
        })
    }

    /// Rebuild the records listed in `index` from their blobs.
    ///
    /// Each distinct blob is fetched once. A missing blob fails the whole
    /// call with [`Error::MissingBlob`].
    pub async fn deserialize(
        &mut self,
        index: &IndexDocument,
    ) -> Result<Vec<AnnotationRecord>, Error> {
        let mut fetched: HashMap<&Fingerprint, AnnotationRecord> = HashMap::new();
        let mut records = Vec::with_capacity(index.events.len());

        for fingerprint in &index.events {
            if let Some(record) = fetched.get(fingerprint) {
                records.push(record.clone());
                continue;
            }
            let blob = self
                .storage
                .get(fingerprint.as_str())
                .await?
                .ok_or_else(|| Error::MissingBlob(fingerprint.to_string()))?;
            let record = AnnotationRecord::from_data_url(&blob)?;
            if record.fingerprint() != fingerprint {
                warn!(
                    "Blob {} decodes to fingerprint {}",
                    fingerprint,
                    record.fingerprint()
                );
            }
            self.stored.insert(fingerprint.clone());
            records.push(record.clone());
            fetched.insert(fingerprint, record);
        }

        Ok(records)
    }
}

impl<S: BlobStore> PersistencePort for PersistenceCodec<S> {
    async fn load(&mut self) -> Result<Vec<AnnotationRecord>, Error> {
        let Some(json) = self.storage.get(&self.index_key).await? else {
            info!("No saved index under {:?}, starting empty", self.index_key);
            return Ok(Vec::new());
        };
        let index: IndexDocument = serde_json::from_str(&json)?;
        let records = self.deserialize(&index).await?;
        info!("Loaded {} records", records.len());
        Ok(records)
    }

    async fn save(&mut self, store: &RecordStore) -> Result<(), Error> {
        let index = self.serialize(store).await?;
        let json = serde_json::to_string(&index)?;
        self.storage.set(&self.index_key, &json).await?;
        info!("Saved {} records", index.events.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBlobStore, StorageError, testing::sample_jpeg};
    use chrono::{TimeZone as _, Utc};
    use std::sync::Arc;

    fn record(seed: u8, comment: &str) -> AnnotationRecord {
        let mut record = AnnotationRecord::from_bytes(sample_jpeg(seed));
        record.set_comment(comment);
        record.set_location("1.5,2.5".parse().unwrap());
        record.set_captured_at(Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap());
        record.commit().unwrap();
        record
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let storage = Arc::new(MemoryBlobStore::new());
        let mut codec = PersistenceCodec::new(Arc::clone(&storage));
        let store = RecordStore::from_records(vec![record(1, "a"), record(2, "b")]);
        codec.save(&store).await.unwrap();

        // Two blobs plus the index
        assert_eq!(storage.len(), 3);
        assert!(storage.get(INDEX_KEY).await.unwrap().is_some());

        let mut fresh = PersistenceCodec::new(Arc::clone(&storage));
        let loaded = fresh.load().await.unwrap();
        let fingerprints: Vec<_> = loaded.iter().map(|r| r.fingerprint().clone()).collect();
        let expected: Vec<_> = store.iter().map(|r| r.fingerprint().clone()).collect();
        assert_eq!(fingerprints, expected);
        assert_eq!(loaded[0].bytes(), store.records()[0].bytes());
    }

    #[tokio::test]
    async fn test_load_empty_storage() {
        let mut codec = PersistenceCodec::new(MemoryBlobStore::new());
        assert!(codec.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_fingerprints_share_one_blob() {
        let storage = Arc::new(MemoryBlobStore::new());
        let mut codec = PersistenceCodec::new(Arc::clone(&storage));
        let first = record(1, "same");
        let second = record(2, "same");
        assert_eq!(first.fingerprint(), second.fingerprint());

        let store = RecordStore::from_records(vec![first.clone(), second.clone()]);
        let index = codec.serialize(&store).await.unwrap();

        assert_eq!(
            index.events,
            vec![first.fingerprint().clone(), first.fingerprint().clone()]
        );
        assert_eq!(storage.len(), 1);
        let blob = storage.get(first.fingerprint().as_str()).await.unwrap();
        assert_eq!(blob, Some(second.to_data_url()));
    }

    #[tokio::test]
    async fn test_stored_blobs_are_not_rewritten() {
        let storage = Arc::new(MemoryBlobStore::new());
        let mut codec = PersistenceCodec::new(Arc::clone(&storage));
        let mut store = RecordStore::new();
        store.add(record(1, "a"));
        codec.serialize(&store).await.unwrap();

        // Tamper with the stored blob; a second serialize must leave it.
        let key = store.records()[0].fingerprint().to_string();
        storage.set(&key, "sentinel").await.unwrap();
        store.add(record(2, "b"));
        codec.serialize(&store).await.unwrap();

        assert_eq!(storage.get(&key).await.unwrap().as_deref(), Some("sentinel"));
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_blob_fails_deserialize() {
        let mut codec = PersistenceCodec::new(MemoryBlobStore::new());
        let index = IndexDocument {
            events: vec![record(1, "gone").fingerprint().clone()],
        };
        assert!(matches!(
            codec.deserialize(&index).await,
            Err(Error::MissingBlob(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_index_entries_fetch_once() {
        let storage = Arc::new(MemoryBlobStore::new());
        let mut codec = PersistenceCodec::new(Arc::clone(&storage));
        let rec = record(3, "twice");
        let store = RecordStore::from_records(vec![rec.clone(), rec.clone()]);
        let index = codec.serialize(&store).await.unwrap();

        let loaded = PersistenceCodec::new(Arc::clone(&storage))
            .deserialize(&index)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].fingerprint(), loaded[1].fingerprint());
    }

    #[tokio::test]
    async fn test_corrupt_index_fails_load() {
        let storage = Arc::new(MemoryBlobStore::new());
        storage.set(INDEX_KEY, "{\"events\": [\"nope\"]}").await.unwrap();
        let mut codec = PersistenceCodec::new(Arc::clone(&storage));
        assert!(matches!(codec.load().await, Err(Error::JsonError(_))));
    }

    #[tokio::test]
    async fn test_custom_index_key() {
        let storage = Arc::new(MemoryBlobStore::new());
        let mut codec = PersistenceCodec::new(Arc::clone(&storage)).with_index_key("events");
        codec.save(&RecordStore::new()).await.unwrap();
        assert_eq!(storage.keys(), vec!["events".to_string()]);
        assert_eq!(codec.index_key(), "events");
    }

    struct FailingStore;

    impl BlobStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::ReadError("offline".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteError("offline".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let mut codec = PersistenceCodec::new(FailingStore);
        assert!(matches!(
            codec.load().await,
            Err(Error::StorageError(StorageError::ReadError(_)))
        ));
        let store = RecordStore::from_records(vec![record(1, "a")]);
        assert!(matches!(
            codec.save(&store).await,
            Err(Error::StorageError(StorageError::WriteError(_)))
        ));
    }
}
