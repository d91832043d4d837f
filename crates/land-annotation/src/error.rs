// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use crate::storage::StorageError;

/// Error type for annotation record, metadata and persistence operations.
///
/// Decoding a photo without usable metadata is deliberately not represented
/// here: records fall back to default field values instead. The variants
/// below cover caller mistakes (bad coordinates, bad fingerprints), damaged
/// containers that must be rewritten, and storage failures.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// Base64 payload could not be decoded.
    Base64Error(base64::DecodeError),
    /// The Exif directory could not be written.
    ExifError(String),
    /// The durable key-value store failed.
    StorageError(StorageError),
    /// A coordinate string or value is malformed.
    FormatError(String),
    /// The image container or its Exif segment is not readable.
    CorruptContainer(String),
    /// The encoded Exif segment does not fit into a single APP1 segment.
    ExifTooLarge(usize),
    /// A fingerprint string does not have the `image<hex>` shape.
    InvalidFingerprint(String),
    /// A data URL could not be parsed.
    InvalidDataUrl(String),
    /// The index references a blob that is not in the blob store.
    MissingBlob(String),
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64Error(err)
    }
}

impl From<exif::Error> for Error {
    fn from(err: exif::Error) -> Self {
        Error::ExifError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::StorageError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::Base64Error(e) => write!(f, "Base64 error: {}", e),
            Error::ExifError(e) => write!(f, "Exif error: {}", e),
            Error::StorageError(e) => write!(f, "Storage error: {}", e),
            Error::FormatError(s) => write!(f, "Invalid location format: {}", s),
            Error::CorruptContainer(s) => write!(f, "Corrupt image container: {}", s),
            Error::ExifTooLarge(n) => {
                write!(f, "Exif segment of {} bytes exceeds the APP1 limit", n)
            }
            Error::InvalidFingerprint(s) => write!(f, "Invalid fingerprint: {}", s),
            Error::InvalidDataUrl(s) => write!(f, "Invalid data URL: {}", s),
            Error::MissingBlob(s) => write!(f, "Missing blob: {}", s),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::Base64Error(e) => Some(e),
            Error::StorageError(e) => Some(e),
            _ => None,
        }
    }
}
