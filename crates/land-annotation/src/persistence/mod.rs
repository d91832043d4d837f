// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! Durable persistence of a record store.
//!
//! The durable layout has two parts:
//!
//! - a content-addressed blob per record, keyed by its [`Fingerprint`] and
//!   holding the photo as a data URL;
//! - an index document under [`INDEX_KEY`] listing the fingerprints of the
//!   store in display order.
//!
//! [`PersistenceCodec`] maps between a [`RecordStore`](crate::RecordStore) and
//! that layout on top of any [`BlobStore`](crate::BlobStore). The
//! [`interchange`] module handles the portable export/import documents.

mod codec;
pub mod interchange;

pub use codec::PersistenceCodec;

use crate::{AnnotationRecord, Error, Fingerprint, RecordStore};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Default storage key of the index document.
pub const INDEX_KEY: &str = "state";

/// Durable index: the fingerprint of every record, in store order.
///
/// ```json
/// { "events": ["image3f1c...", "image9a07..."] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub events: Vec<Fingerprint>,
}

/// Load/save pair a [`PersistentStore`](crate::PersistentStore) persists
/// through.
pub trait PersistencePort: Send {
    /// Records of the last saved store; empty if nothing was saved yet.
    fn load(&mut self) -> impl Future<Output = Result<Vec<AnnotationRecord>, Error>> + Send;

    /// Persist the full contents of `store`.
    fn save(&mut self, store: &RecordStore) -> impl Future<Output = Result<(), Error>> + Send;
}
