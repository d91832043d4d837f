// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use crate::{
    AnnotationRecord, Error, Fingerprint,
    persistence::{
        PersistencePort,
        interchange::{self, ExportDocument, ImportSummary},
    },
};
use log::{debug, info, warn};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Change notification sent to store subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// A record with this fingerprint was appended.
    Added(Fingerprint),
    /// The first record with this fingerprint was removed.
    Removed(Fingerprint),
    /// The whole sequence was replaced.
    Reset,
}

/// Ordered, in-memory collection of records.
///
/// Insertion order is display order. Fingerprints are not required to be
/// unique; deduplication happens on import. Observers subscribe to a
/// broadcast channel of [`StoreEvent`]s and re-read the sequence.
#[derive(Debug)]
pub struct RecordStore {
    records: Vec<AnnotationRecord>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::from_records(Vec::new())
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<AnnotationRecord>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        RecordStore { records, events }
    }

    /// Receive an event for every subsequent mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnnotationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with the given fingerprint.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&AnnotationRecord> {
        self.records.iter().find(|r| r.fingerprint() == fingerprint)
    }

    /// Append a record.
    pub fn add(&mut self, record: AnnotationRecord) -> StoreEvent {
        let event = StoreEvent::Added(record.fingerprint().clone());
        self.records.push(record);
        self.notify(event.clone());
        event
    }

    /// Remove the first record with the same fingerprint as `record`.
    pub fn delete_by_fingerprint(&mut self, record: &AnnotationRecord) -> Option<StoreEvent> {
        self.remove(record.fingerprint())
    }

    /// Remove the first record with `fingerprint`, keeping the order of the
    /// rest. Returns `None` if there is no such record.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<StoreEvent> {
        self.take(fingerprint).map(|_| StoreEvent::Removed(fingerprint.clone()))
    }

    /// Like [`remove`](Self::remove), returning the record and where it was.
    pub(crate) fn take(&mut self, fingerprint: &Fingerprint) -> Option<(usize, AnnotationRecord)> {
        let index = self
            .records
            .iter()
            .position(|r| r.fingerprint() == fingerprint)?;
        let record = self.records.remove(index);
        self.notify(StoreEvent::Removed(fingerprint.clone()));
        Some((index, record))
    }

    /// Put back a record removed by [`take`](Self::take).
    pub(crate) fn restore(&mut self, index: usize, record: AnnotationRecord) {
        self.records.insert(index.min(self.records.len()), record);
        self.notify(StoreEvent::Reset);
    }

    /// Drop every record past the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.records.len() {
            self.records.truncate(len);
            self.notify(StoreEvent::Reset);
        }
    }

    /// Replace the whole sequence.
    pub fn replace(&mut self, records: Vec<AnnotationRecord>) -> StoreEvent {
        self.records = records;
        self.notify(StoreEvent::Reset);
        StoreEvent::Reset
    }

    fn notify(&self, event: StoreEvent) {
        // Sending only fails when nobody is subscribed.
        if self.events.send(event).is_err() {
            debug!("Store changed with no subscribers");
        }
    }
}

/// A [`RecordStore`] that saves itself through a [`PersistencePort`] after
/// every mutation.
///
/// A mutation whose save fails is rolled back before the error is returned,
/// so the records in memory are always the ones last saved. Subscribers see
/// the mutation's event followed by [`StoreEvent::Reset`].
///
/// ```rust,no_run
/// use land_annotation::{
///     AnnotationRecord, FileBlobStore, PersistenceCodec, PersistentStore,
/// };
///
/// # async fn example(jpeg: Vec<u8>) -> Result<(), land_annotation::Error> {
/// let codec = PersistenceCodec::new(FileBlobStore::new()?);
/// let mut store = PersistentStore::open(codec).await?;
///
/// let mut record = AnnotationRecord::from_bytes(jpeg);
/// record.set_comment("north gate");
/// record.commit()?;
/// store.add_event(record).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PersistentStore<P> {
    store: RecordStore,
    port: P,
}

impl<P: PersistencePort> PersistentStore<P> {
    /// Load the saved records through `port`.
    pub async fn open(mut port: P) -> Result<Self, Error> {
        let records = port.load().await?;
        info!("Opened store with {} records", records.len());
        Ok(PersistentStore {
            store: RecordStore::from_records(records),
            port,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        self.store.records()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Append a committed record and save.
    pub async fn add_event(&mut self, record: AnnotationRecord) -> Result<StoreEvent, Error> {
        let len = self.store.len();
        let event = self.store.add(record);
        self.save_or_truncate(len).await?;
        Ok(event)
    }

    /// Remove the first record sharing `record`'s fingerprint and save.
    pub async fn delete_event(
        &mut self,
        record: &AnnotationRecord,
    ) -> Result<Option<StoreEvent>, Error> {
        self.delete(record.fingerprint()).await
    }

    /// Remove the first record with `fingerprint` and save. Nothing is
    /// written when no record matches.
    pub async fn delete(&mut self, fingerprint: &Fingerprint) -> Result<Option<StoreEvent>, Error> {
        let Some((index, record)) = self.store.take(fingerprint) else {
            return Ok(None);
        };
        if let Err(err) = self.port.save(&self.store).await {
            warn!("Save failed, restoring {}: {}", fingerprint, err);
            self.store.restore(index, record);
            return Err(err);
        }
        Ok(Some(StoreEvent::Removed(fingerprint.clone())))
    }

    /// Merge an export document and save if anything was added.
    pub async fn import(&mut self, json: &str) -> Result<ImportSummary, Error> {
        let len = self.store.len();
        let summary = interchange::import_merge(json, &mut self.store)?;
        if summary.added > 0 {
            self.save_or_truncate(len).await?;
        }
        Ok(summary)
    }

    pub fn export(&self) -> ExportDocument {
        interchange::export(&self.store)
    }

    /// Save, or drop the records appended past `len` if that fails.
    async fn save_or_truncate(&mut self, len: usize) -> Result<(), Error> {
        if let Err(err) = self.port.save(&self.store).await {
            warn!(
                "Save failed, dropping {} unsaved records: {}",
                self.store.len() - len,
                err
            );
            self.store.truncate(len);
            return Err(err);
        }
        Ok(())
    }
}
