// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! # Land Annotation Library
//!
//! Record model and persistence layer for geotagged photo annotations. An
//! annotation is a JPEG whose comment, location, capture time and title live
//! inside its own Exif segment, so the photo alone carries everything needed
//! to rebuild the record.
//!
//! ## Features
//!
//! - **Metadata codec**: Read and write the annotation fields in a JPEG's
//!   Exif segment without touching unrelated tags or segments
//! - **Fingerprints**: Stable content hash of comment, location and time,
//!   independent of the pixels
//! - **Record store**: Ordered collection with change notifications
//! - **Persistence**: Content-addressed blobs plus a compact index, with
//!   deduplicating import and portable export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use land_annotation::{
//!     AnnotationRecord, Error, FileBlobStore, PersistenceCodec, PersistentStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let codec = PersistenceCodec::new(FileBlobStore::new()?);
//!     let mut store = PersistentStore::open(codec).await?;
//!
//!     let mut record = AnnotationRecord::from_file("gate.jpg").await?;
//!     record.set_comment("Fence down at the north gate");
//!     record.set_location("36.073362,-82.731789".parse()?);
//!     record.commit()?;
//!
//!     println!("Saving {}", record.fingerprint());
//!     store.add_event(record).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod fingerprint;
mod location;
pub mod metadata;
pub mod persistence;
mod record;
mod settings;
mod storage;
mod store;

#[cfg(test)]
mod testing;

pub use crate::{
    error::Error,
    fingerprint::Fingerprint,
    location::GeoCoordinate,
    persistence::{
        INDEX_KEY, IndexDocument, PersistenceCodec, PersistencePort,
        interchange::{ExportDocument, ExportEvent, ImportSummary},
    },
    record::AnnotationRecord,
    settings::{Settings, default_config_file, default_data_dir},
    storage::{BlobStore, FileBlobStore, MemoryBlobStore, StorageError},
    store::{PersistentStore, RecordStore, StoreEvent},
};
