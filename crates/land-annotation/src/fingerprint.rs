// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use crate::{Error, GeoCoordinate};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

const PREFIX: &str = "image";
const HEX_LEN: usize = 64;

/// Content fingerprint of an annotation.
///
/// The fingerprint hashes the comment, location and capture time only, so two
/// photos with the same annotation but different pixels are the same record
/// for deduplication. It doubles as the blob store key.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use land_annotation::{Fingerprint, GeoCoordinate};
///
/// let when = Utc.with_ymd_and_hms(2022, 1, 13, 10, 20, 30).unwrap();
/// let location = GeoCoordinate::new(1.0, 2.0).unwrap();
/// let fp = Fingerprint::digest("hello", &location, when);
///
/// assert!(fp.as_str().starts_with("image"));
/// assert_eq!(fp, Fingerprint::digest("hello", &location, when));
/// assert_eq!(fp, fp.as_str().parse().unwrap());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash `comment + "L" + location + "T" + ISO-8601 time`.
    pub fn digest(comment: &str, location: &GeoCoordinate, captured_at: DateTime<Utc>) -> Self {
        let key = format!(
            "{}L{}T{}",
            comment,
            location,
            captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        Fingerprint(format!("{}{:x}", PREFIX, Sha256::digest(key.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.strip_prefix(PREFIX).is_some_and(|hex| {
            hex.len() == HEX_LEN
                && hex
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        });
        if !valid {
            return Err(Error::InvalidFingerprint(s.to_string()));
        }
        Ok(Fingerprint(s.to_string()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
