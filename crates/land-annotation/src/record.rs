// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use crate::{
    Error, Fingerprint, GeoCoordinate,
    metadata::{self, MetadataBag},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, SubsecRound as _, Utc};
use log::debug;
use std::{path::Path, sync::OnceLock};

const DEFAULT_MIME: &str = "image/jpeg";

/// An annotated photo: the JPEG bytes plus the fields decoded from, and
/// eventually written back into, its Exif segment.
///
/// Field setters only touch the in-memory values; [`commit`](Self::commit)
/// writes them into the bytes. The [fingerprint](Self::fingerprint) is
/// computed from the in-memory values and cached until the next change.
///
/// Locations are kept at the precision of the Exif GPS encoding and capture
/// times at whole seconds, so a record reloaded from its committed bytes has
/// the same fingerprint as the record that wrote them.
#[derive(Clone, Debug)]
pub struct AnnotationRecord {
    bytes: Vec<u8>,
    metadata: MetadataBag,
    comment: String,
    title: Option<String>,
    location: Option<GeoCoordinate>,
    captured_at: DateTime<Utc>,
    fingerprint: OnceLock<Fingerprint>,
}

impl AnnotationRecord {
    /// Build a record from raw image bytes.
    ///
    /// Never fails: bytes without readable metadata produce a record with
    /// an empty comment, no location and the current time.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let metadata = metadata::decode(&bytes).unwrap_or_else(|e| {
            debug!("No usable metadata, using defaults: {}", e);
            MetadataBag::default()
        });

        AnnotationRecord {
            comment: metadata.comment(),
            title: metadata.title(),
            location: metadata.location(),
            captured_at: metadata
                .captured_at()
                .unwrap_or_else(|| Utc::now().trunc_subsecs(0)),
            metadata,
            bytes,
            fingerprint: OnceLock::new(),
        }
    }

    /// Read a record from an image file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        debug!("Read {} bytes from {:?}", bytes.len(), path);
        Ok(Self::from_bytes(bytes))
    }

    /// Build a record from a `data:<mime>;base64,<payload>` URL. A bare
    /// base64 payload is accepted as well.
    pub fn from_data_url(url: &str) -> Result<Self, Error> {
        let url = url.trim();
        let payload = match url.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| Error::InvalidDataUrl("missing ',' separator".to_string()))?;
                if !header.ends_with(";base64") {
                    return Err(Error::InvalidDataUrl(format!(
                        "unsupported encoding in {:?}",
                        header
                    )));
                }
                payload
            }
            None => url,
        };
        Ok(Self::from_bytes(STANDARD.decode(payload)?))
    }

    /// The bytes as a data URL, with the MIME type sniffed from the content.
    pub fn to_data_url(&self) -> String {
        let mime = infer::get(&self.bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or(DEFAULT_MIME);
        format!("data:{};base64,{}", mime, STANDARD.encode(&self.bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Metadata as of the last decode or commit.
    pub fn metadata(&self) -> &MetadataBag {
        &self.metadata
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
        self.fingerprint.take();
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    /// Location of the photo, `0,0` when unknown.
    pub fn location(&self) -> GeoCoordinate {
        self.location.unwrap_or_default()
    }

    /// Whether the photo carries a location at all.
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn set_location(&mut self, location: GeoCoordinate) {
        self.location = Some(location.quantized());
        self.fingerprint.take();
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn set_captured_at(&mut self, when: DateTime<Utc>) {
        self.captured_at = when.trunc_subsecs(0);
        self.fingerprint.take();
    }

    /// Content fingerprint of the current comment, location and capture time.
    pub fn fingerprint(&self) -> &Fingerprint {
        self.fingerprint.get_or_init(|| {
            Fingerprint::digest(&self.comment, &self.location(), self.captured_at)
        })
    }

    /// Write the in-memory fields into the image bytes.
    ///
    /// Only fields that differ from the current metadata are rewritten; a
    /// record without changes keeps its bytes untouched. On error the record
    /// is left as it was.
    pub fn commit(&mut self) -> Result<(), Error> {
        let mut bag = self.metadata.clone();
        bag.set_comment(&self.comment);
        bag.set_title(self.title.as_deref());
        // Legacy encodings that already decode to this location stay as-is.
        if let Some(location) = self.location.filter(|l| bag.location() != Some(*l)) {
            bag.set_location(location);
        }
        bag.set_timestamp(self.captured_at);

        self.bytes = metadata::encode(&bag, &self.bytes)?;
        self.metadata = bag.into_committed();
        debug!("Committed {} ({} bytes)", self.fingerprint(), self.bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{corrupt_ascii_offset, jpeg_with_exif, sample_jpeg};
    use chrono::TimeZone as _;

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 13, 10, 20, 30).unwrap()
    }

    fn annotated(seed: u8, comment: &str) -> AnnotationRecord {
        let mut record = AnnotationRecord::from_bytes(sample_jpeg(seed));
        record.set_comment(comment);
        record.set_location("36.073362,-82.731789".parse().unwrap());
        record.set_captured_at(when());
        record
    }

    #[test]
    fn test_defaults_without_metadata() {
        let before = Utc::now().trunc_subsecs(0);
        let record = AnnotationRecord::from_bytes(sample_jpeg(1));
        assert_eq!(record.comment(), "");
        assert_eq!(record.title(), None);
        assert_eq!(record.location(), GeoCoordinate::default());
        assert!(!record.has_location());
        assert!(record.captured_at() >= before);
        assert_eq!(record.captured_at().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_garbage_bytes_do_not_fail() {
        let record = AnnotationRecord::from_bytes(b"not an image".to_vec());
        assert_eq!(record.comment(), "");
        assert_eq!(record.bytes(), b"not an image");
    }

    #[test]
    fn test_fingerprint_ignores_image_bytes() {
        let a = annotated(1, "same");
        let b = annotated(2, "same");
        assert_ne!(a.bytes(), b.bytes());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), annotated(1, "other").fingerprint());
    }

    #[test]
    fn test_fingerprint_cache_invalidated_by_setters() {
        let mut record = annotated(1, "first");
        let first = record.fingerprint().clone();
        record.set_comment("second");
        assert_ne!(record.fingerprint(), &first);
        record.set_comment("first");
        assert_eq!(record.fingerprint(), &first);
    }

    #[test]
    fn test_commit_round_trip_keeps_fingerprint() {
        let mut record = annotated(3, "Fjällstuga");
        record.set_title(Some("Cabin".to_string()));
        let before = record.fingerprint().clone();
        record.commit().unwrap();
        assert_eq!(record.fingerprint(), &before);

        let reloaded = AnnotationRecord::from_bytes(record.bytes().to_vec());
        assert_eq!(reloaded.comment(), "Fjällstuga");
        assert_eq!(reloaded.title(), Some("Cabin"));
        assert_eq!(reloaded.captured_at(), when());
        assert_eq!(reloaded.location(), record.location());
        assert_eq!(reloaded.fingerprint(), &before);
    }

    #[test]
    fn test_commit_without_changes_keeps_bytes() {
        let mut record = annotated(4, "note");
        record.commit().unwrap();
        let committed = record.bytes().to_vec();

        let mut reloaded = AnnotationRecord::from_bytes(committed.clone());
        reloaded.commit().unwrap();
        assert_eq!(reloaded.bytes(), committed.as_slice());
    }

    #[test]
    fn test_commit_writes_default_timestamp() {
        let mut record = AnnotationRecord::from_bytes(sample_jpeg(5));
        record.commit().unwrap();
        assert_eq!(
            record.metadata().captured_at(),
            Some(record.captured_at())
        );
        let reloaded = AnnotationRecord::from_bytes(record.bytes().to_vec());
        assert_eq!(reloaded.fingerprint(), record.fingerprint());
    }

    #[test]
    fn test_commit_failure_leaves_record() {
        let mut record = AnnotationRecord::from_bytes(b"not an image".to_vec());
        record.set_comment("x");
        assert!(matches!(record.commit(), Err(Error::CorruptContainer(_))));
        assert_eq!(record.bytes(), b"not an image");
        assert_eq!(record.comment(), "x");
    }

    #[test]
    fn test_commit_keeps_fields_beside_unreadable_entry() {
        let source = jpeg_with_exif(7, false, |dir| {
            dir.set(
                exif::Tag::Make,
                exif::Value::Ascii(vec![b"Acme Survey Equipment".to_vec()]),
            );
        });
        let mut record = AnnotationRecord::from_bytes(source);
        record.set_comment("keep me");
        record.set_location(GeoCoordinate::new(10.0, 20.0).unwrap());
        record.commit().unwrap();
        let mut bytes = record.into_bytes();
        corrupt_ascii_offset(&mut bytes, 0x010F, false, 0xFFFF_FF00);

        let mut record = AnnotationRecord::from_bytes(bytes);
        assert_eq!(record.comment(), "keep me");
        assert!(record.has_location());
        let fingerprint = record.fingerprint().clone();

        record.set_title(Some("gate".to_string()));
        record.commit().unwrap();
        let reloaded = AnnotationRecord::from_bytes(record.bytes().to_vec());
        assert_eq!(reloaded.comment(), "keep me");
        assert_eq!(reloaded.location(), GeoCoordinate::new(10.0, 20.0).unwrap());
        assert_eq!(reloaded.title(), Some("gate"));
        assert_eq!(reloaded.fingerprint(), &fingerprint);
    }

    #[test]
    fn test_data_url_round_trip() {
        let mut record = annotated(6, "url");
        record.commit().unwrap();
        let url = record.to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let parsed = AnnotationRecord::from_data_url(&url).unwrap();
        assert_eq!(parsed.bytes(), record.bytes());
        assert_eq!(parsed.fingerprint(), record.fingerprint());

        let bare = url.split_once(',').unwrap().1;
        let parsed = AnnotationRecord::from_data_url(bare).unwrap();
        assert_eq!(parsed.bytes(), record.bytes());
    }

    #[test]
    fn test_invalid_data_urls() {
        assert!(matches!(
            AnnotationRecord::from_data_url("data:image/jpeg;base64"),
            Err(Error::InvalidDataUrl(_))
        ));
        assert!(matches!(
            AnnotationRecord::from_data_url("data:text/plain,hello"),
            Err(Error::InvalidDataUrl(_))
        ));
        assert!(matches!(
            AnnotationRecord::from_data_url("data:image/jpeg;base64,***"),
            Err(Error::Base64Error(_))
        ));
    }

    #[test]
    fn test_unknown_content_defaults_to_jpeg_mime() {
        let record = AnnotationRecord::from_bytes(vec![1, 2, 3]);
        assert_eq!(record.to_data_url(), "data:image/jpeg;base64,AQID");
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        let mut record = annotated(7, "from disk");
        record.commit().unwrap();
        tokio::fs::write(&path, record.bytes()).await.unwrap();

        let loaded = AnnotationRecord::from_file(&path).await.unwrap();
        assert_eq!(loaded.comment(), "from disk");
        assert_eq!(loaded.fingerprint(), record.fingerprint());

        let missing = AnnotationRecord::from_file(dir.path().join("missing.jpg")).await;
        assert!(matches!(missing, Err(Error::IoError(_))));
    }
}
