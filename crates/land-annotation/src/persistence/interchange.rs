// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! Portable export/import documents.
//!
//! An export lists every record as a data URL:
//!
//! ```json
//! { "events": [ { "_base64": "data:image/jpeg;base64,/9j/4AAQ..." } ] }
//! ```
//!
//! Imports additionally accept events in the older pre-Exif shape, where the
//! annotation lived next to the photo instead of inside it:
//!
//! ```json
//! { "events": [ {
//!     "title": "North gate",
//!     "description": "Fence down",
//!     "location": { "latitude": 36.07, "longitude": -82.73 },
//!     "image": { "base64": "data:image/jpeg;base64,/9j/4AAQ..." }
//! } ] }
//! ```
//!
//! Unknown fields are ignored in both shapes.

use crate::{AnnotationRecord, Error, Fingerprint, GeoCoordinate, RecordStore};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub events: Vec<ExportEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportEvent {
    #[serde(rename = "_base64")]
    pub base64: String,
}

#[derive(Deserialize)]
struct ImportDocument {
    events: Vec<ImportEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportEvent {
    Current(ExportEvent),
    Legacy(LegacyEvent),
}

#[derive(Deserialize)]
struct LegacyEvent {
    title: String,
    #[serde(default)]
    description: Option<String>,
    location: GeoCoordinate,
    image: LegacyImage,
}

#[derive(Deserialize)]
struct LegacyImage {
    base64: String,
}

/// Outcome of [`import_merge`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records appended to the store.
    pub added: usize,
    /// Records skipped because their fingerprint was already present.
    pub skipped: usize,
}

impl ImportEvent {
    fn into_record(self) -> Result<AnnotationRecord, Error> {
        match self {
            ImportEvent::Current(event) => AnnotationRecord::from_data_url(&event.base64),
            ImportEvent::Legacy(event) => {
                let mut record = AnnotationRecord::from_data_url(&event.image.base64)?;
                let comment = match event.description.as_deref() {
                    Some(description) if !description.is_empty() => {
                        format!("{} - {}", event.title, description)
                    }
                    _ => event.title.clone(),
                };
                record.set_location(event.location);
                record.set_comment(comment);
                record.set_title(Some(event.title));
                record.commit()?;
                debug!("Converted legacy event to {}", record.fingerprint());
                Ok(record)
            }
        }
    }
}

/// Export every record of `store`, in order.
pub fn export(store: &RecordStore) -> ExportDocument {
    ExportDocument {
        events: store
            .iter()
            .map(|record| ExportEvent {
                base64: record.to_data_url(),
            })
            .collect(),
    }
}

/// [`export`] rendered as JSON.
pub fn export_json(store: &RecordStore) -> Result<String, Error> {
    Ok(serde_json::to_string(&export(store))?)
}

/// Decode every event of an export document into records.
///
/// Fails on the first malformed event; nothing is returned partially.
pub fn decode_import(json: &str) -> Result<Vec<AnnotationRecord>, Error> {
    let document: ImportDocument = serde_json::from_str(json)?;
    document
        .events
        .into_iter()
        .map(ImportEvent::into_record)
        .collect()
}

/// Merge the records of an export document into `store`.
///
/// Records whose fingerprint is already present, in the store or earlier in
/// the document, are skipped; existing records are never replaced. The whole
/// document is decoded before the store is touched, so a malformed document
/// leaves it unchanged.
pub fn import_merge(json: &str, store: &mut RecordStore) -> Result<ImportSummary, Error> {
    let incoming = decode_import(json)?;
    let mut present: HashSet<Fingerprint> =
        store.iter().map(|r| r.fingerprint().clone()).collect();

    let mut summary = ImportSummary::default();
    for record in incoming {
        if present.insert(record.fingerprint().clone()) {
            store.add(record);
            summary.added += 1;
        } else {
            summary.skipped += 1;
        }
    }

    info!(
        "Imported {} records, skipped {} duplicates",
        summary.added, summary.skipped
    );
    Ok(summary)
}
