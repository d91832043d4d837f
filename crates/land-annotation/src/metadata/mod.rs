// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! # Photo Metadata Codec
//!
//! Reads and writes the handful of Exif fields an annotation needs directly
//! inside the JPEG that carries them:
//!
//! | Field      | Directory | Tag                                   |
//! |------------|-----------|---------------------------------------|
//! | comment    | Exif      | `UserComment` (0x9286)                |
//! | title      | IFD0      | `ImageDescription` (0x010E)           |
//! | timestamp  | IFD0      | `DateTime` (0x0132)                   |
//! | location   | GPS       | `GPSLatitude[Ref]`, `GPSLongitude[Ref]` |
//!
//! [`decode`] turns the container's Exif segment into a [`MetadataBag`], a
//! typed view over the generic tag directory. [`encode`] writes the bag back,
//! touching only the fields that changed since decode; if nothing changed,
//! the input bytes are returned as-is.
//!
//! ```rust,no_run
//! use land_annotation::{metadata, GeoCoordinate};
//!
//! # fn example(jpeg: &[u8]) -> Result<(), land_annotation::Error> {
//! let mut bag = metadata::decode(jpeg).unwrap_or_default();
//! bag.set_comment("north gate");
//! bag.set_location("36.073362,-82.731789".parse::<GeoCoordinate>()?);
//! let updated = metadata::encode(&bag, jpeg)?;
//! # Ok(())
//! # }
//! ```

mod directory;
mod gps;

pub use directory::ExifDirectory;
pub use gps::{Dms, Hemisphere, Rational, SECONDS_DENOMINATOR, quantize};

use crate::{Error, GeoCoordinate};
use chrono::{DateTime, NaiveDateTime, Timelike as _, Utc};
use exif::{Context, Tag, Value};
use img_parts::{
    Bytes, ImageEXIF as _,
    jpeg::{Jpeg, JpegSegment, markers},
};
use log::debug;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest APP1 payload: the 16-bit segment length includes its own two bytes.
const MAX_APP1_CONTENTS: usize = u16::MAX as usize - 2;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

const ASCII_PREFIX: &[u8; 8] = b"ASCII\0\0\0";
const UNICODE_PREFIX: &[u8; 8] = b"UNICODE\0";
const JIS_PREFIX: &[u8; 8] = b"JIS\0\0\0\0\0";
const UNDEFINED_PREFIX: &[u8; 8] = &[0; 8];

/// Raw GPS tags. Location is only meaningful when all four are present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GpsTags {
    pub latitude: Option<Dms>,
    pub latitude_ref: Option<String>,
    pub longitude: Option<Dms>,
    pub longitude_ref: Option<String>,
}

/// Typed values of the tags the annotation model uses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataTags {
    pub comment: Option<String>,
    pub title: Option<String>,
    pub datetime: Option<String>,
    pub gps: GpsTags,
}

impl MetadataTags {
    fn read(directory: &ExifDirectory) -> Self {
        let ascii = |tag| directory.get(tag).and_then(|f| read_ascii(&f.value));
        let dms = |tag| directory.get(tag).and_then(|f| read_dms(&f.value));

        MetadataTags {
            comment: directory
                .get(Tag::UserComment)
                .and_then(|f| read_user_comment(&f.value, directory.little_endian())),
            title: ascii(Tag::ImageDescription),
            datetime: ascii(Tag::DateTime),
            gps: GpsTags {
                latitude: dms(Tag::GPSLatitude),
                latitude_ref: ascii(Tag::GPSLatitudeRef),
                longitude: dms(Tag::GPSLongitude),
                longitude_ref: ascii(Tag::GPSLongitudeRef),
            },
        }
    }
}

/// Typed metadata of one photo plus the directory it was decoded from.
///
/// The default bag is what a photo without any Exif segment decodes to:
/// every field absent, and a fresh big-endian directory to write into.
#[derive(Clone, Debug, Default)]
pub struct MetadataBag {
    tags: MetadataTags,
    decoded: MetadataTags,
    directory: ExifDirectory,
}

impl MetadataBag {
    pub fn tags(&self) -> &MetadataTags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut MetadataTags {
        &mut self.tags
    }

    /// The tag directory as it was decoded.
    pub fn directory(&self) -> &ExifDirectory {
        &self.directory
    }

    /// Whether any field differs from its decoded value.
    pub fn is_modified(&self) -> bool {
        self.tags != self.decoded
    }

    /// The user comment, empty when absent.
    pub fn comment(&self) -> String {
        self.tags.comment.clone().unwrap_or_default()
    }

    pub fn set_comment(&mut self, value: &str) {
        if self.comment() == value {
            return;
        }
        self.tags.comment = Some(value.to_string());
    }

    pub fn title(&self) -> Option<String> {
        self.tags.title.clone()
    }

    pub fn set_title(&mut self, value: Option<&str>) {
        if self.tags.title.as_deref() == value {
            return;
        }
        self.tags.title = value.map(str::to_string);
    }

    /// Location from the four GPS tags, `None` unless all of them are present
    /// and well formed.
    pub fn location(&self) -> Option<GeoCoordinate> {
        let gps = &self.tags.gps;
        let (Some(lat), Some(lat_ref), Some(lon), Some(lon_ref)) = (
            gps.latitude.as_ref(),
            gps.latitude_ref.as_deref(),
            gps.longitude.as_ref(),
            gps.longitude_ref.as_deref(),
        ) else {
            return None;
        };

        let lat_hemisphere = Hemisphere::from_ref(lat_ref).filter(|h| h.is_latitude())?;
        let lon_hemisphere = Hemisphere::from_ref(lon_ref).filter(|h| !h.is_latitude())?;
        let latitude = lat_hemisphere.sign() * lat.to_degrees()?;
        let longitude = lon_hemisphere.sign() * lon.to_degrees()?;
        GeoCoordinate::new(latitude, longitude).ok()
    }

    /// Encode `coord` into the GPS tags. Hemisphere references follow the
    /// sign of each component.
    pub fn set_location(&mut self, coord: GeoCoordinate) {
        let gps = GpsTags {
            latitude: Some(Dms::from_degrees(coord.latitude())),
            latitude_ref: Some(
                Hemisphere::for_latitude(coord.latitude())
                    .as_ref_str()
                    .to_string(),
            ),
            longitude: Some(Dms::from_degrees(coord.longitude())),
            longitude_ref: Some(
                Hemisphere::for_longitude(coord.longitude())
                    .as_ref_str()
                    .to_string(),
            ),
        };
        if self.tags.gps == gps {
            return;
        }
        self.tags.gps = gps;
    }

    /// Capture time from `DateTime`, `None` when absent or malformed.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.tags.datetime.as_deref()?;
        let parsed = parse_exif_datetime(raw);
        if parsed.is_none() {
            debug!("Ignoring malformed DateTime tag {:?}", raw);
        }
        parsed
    }

    /// Capture time, falling back to the current time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.captured_at().unwrap_or_else(Utc::now)
    }

    pub fn set_timestamp(&mut self, when: DateTime<Utc>) {
        let when = when.with_nanosecond(0).unwrap_or(when);
        if self.captured_at() == Some(when) {
            return;
        }
        self.tags.datetime = Some(when.format(EXIF_DATETIME_FORMAT).to_string());
    }

    /// Directory with every changed field written into it.
    fn updated_directory(&self) -> ExifDirectory {
        let mut directory = self.directory.clone();
        let little_endian = directory.little_endian();
        let (new, old) = (&self.tags, &self.decoded);

        if new.comment != old.comment {
            let value = new
                .comment
                .as_deref()
                .map(|text| Value::Undefined(encode_user_comment(text, little_endian), 0));
            set_value(&mut directory, Tag::UserComment, value);
        }
        if new.title != old.title {
            set_value(&mut directory, Tag::ImageDescription, ascii_value(new.title.as_deref()));
        }
        if new.datetime != old.datetime {
            set_value(&mut directory, Tag::DateTime, ascii_value(new.datetime.as_deref()));
        }

        if new.gps != old.gps {
            if !directory.has_context(Context::Gps) {
                directory.set(Tag::GPSVersionID, Value::Byte(vec![2, 2, 0, 0]));
            }
            if new.gps.latitude_ref != old.gps.latitude_ref {
                let value = ascii_value(new.gps.latitude_ref.as_deref());
                set_value(&mut directory, Tag::GPSLatitudeRef, value);
            }
            if new.gps.latitude != old.gps.latitude {
                set_value(&mut directory, Tag::GPSLatitude, new.gps.latitude.map(dms_value));
            }
            if new.gps.longitude_ref != old.gps.longitude_ref {
                let value = ascii_value(new.gps.longitude_ref.as_deref());
                set_value(&mut directory, Tag::GPSLongitudeRef, value);
            }
            if new.gps.longitude != old.gps.longitude {
                set_value(&mut directory, Tag::GPSLongitude, new.gps.longitude.map(dms_value));
            }
        }

        directory
    }

    /// The bag as it reads back after a successful [`encode`].
    pub(crate) fn into_committed(self) -> MetadataBag {
        let directory = self.updated_directory();
        MetadataBag {
            decoded: self.tags.clone(),
            tags: self.tags,
            directory,
        }
    }
}

/// Decode the Exif segment of a JPEG.
///
/// Fails with [`Error::CorruptContainer`] when the bytes are not a JPEG,
/// carry no Exif segment, or the segment header is unreadable. Entries that
/// cannot be read are skipped and the rest still decode. Callers that only
/// need field values should treat that as "no metadata" and fall back to
/// [`MetadataBag::default`].
pub fn decode(bytes: &[u8]) -> Result<MetadataBag, Error> {
    let jpeg = parse_jpeg(bytes)?;
    let exif = jpeg
        .exif()
        .ok_or_else(|| Error::CorruptContainer("no Exif segment".to_string()))?;
    let directory = ExifDirectory::parse(&exif)?;
    let tags = MetadataTags::read(&directory);

    debug!(
        "Decoded Exif: {} tags, {} byte order",
        directory.len(),
        if directory.little_endian() { "little" } else { "big" }
    );

    Ok(MetadataBag {
        decoded: tags.clone(),
        tags,
        directory,
    })
}

/// Write `bag` into the JPEG `bytes`, returning the new container.
///
/// The Exif segment is replaced in place, or inserted after a leading
/// APP0/JFIF segment when the photo had none. Every other segment is copied
/// through unchanged. An unmodified bag returns `bytes` untouched.
pub fn encode(bag: &MetadataBag, bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if !bag.is_modified() {
        return Ok(bytes.to_vec());
    }

    let tiff = bag.updated_directory().dump()?;
    let size = EXIF_HEADER.len() + tiff.len();
    if size > MAX_APP1_CONTENTS {
        return Err(Error::ExifTooLarge(size));
    }
    let mut contents = Vec::with_capacity(size);
    contents.extend_from_slice(EXIF_HEADER);
    contents.extend_from_slice(&tiff);

    let mut jpeg = parse_jpeg(bytes)?;
    let position = jpeg.segments().iter().position(is_exif_segment);
    jpeg.set_exif(None);

    let segments = jpeg.segments_mut();
    let index = position
        .unwrap_or_else(|| {
            usize::from(
                segments
                    .first()
                    .is_some_and(|s| s.marker() == markers::APP0),
            )
        })
        .min(segments.len());
    segments.insert(
        index,
        JpegSegment::new_with_contents(markers::APP1, Bytes::from(contents)),
    );

    debug!("Encoded {} byte Exif segment at index {}", size, index);
    Ok(jpeg.encoder().bytes().to_vec())
}

fn parse_jpeg(bytes: &[u8]) -> Result<Jpeg, Error> {
    Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| Error::CorruptContainer(format!("not a JPEG: {}", e)))
}

fn is_exif_segment(segment: &JpegSegment) -> bool {
    segment.marker() == markers::APP1 && segment.contents().starts_with(EXIF_HEADER)
}

fn set_value(directory: &mut ExifDirectory, tag: Tag, value: Option<Value>) {
    match value {
        Some(value) => directory.set(tag, value),
        None => {
            directory.remove(tag);
        }
    }
}

fn ascii_value(text: Option<&str>) -> Option<Value> {
    text.map(|text| Value::Ascii(vec![text.as_bytes().to_vec()]))
}

fn dms_value(dms: Dms) -> Value {
    Value::Rational(dms.rationals().into_iter().map(exif::Rational::from).collect())
}

fn read_ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(values) => {
            let text = values.first()?;
            Some(String::from_utf8_lossy(text).trim_end_matches('\0').to_string())
        }
        _ => None,
    }
}

/// DMS from three RATIONALs. Some writers use SRATIONAL, accepted when no
/// component is negative.
fn read_dms(value: &Value) -> Option<Dms> {
    let rationals: Vec<Rational> = match value {
        Value::Rational(values) => values
            .iter()
            .map(|r| Rational::new(r.num, r.denom))
            .collect(),
        Value::SRational(values) => values
            .iter()
            .map(|r| Some(Rational::new(r.num.try_into().ok()?, r.denom.try_into().ok()?)))
            .collect::<Option<_>>()?,
        _ => return None,
    };
    Dms::from_rationals(&rationals)
}

fn read_user_comment(value: &Value, little_endian: bool) -> Option<String> {
    match value {
        Value::Undefined(data, _) | Value::Byte(data) => {
            Some(decode_user_comment(data, little_endian))
        }
        Value::Ascii(_) => read_ascii(value),
        _ => None,
    }
}

/// Parse `YYYY:MM:DD HH:MM:SS` as UTC. Only the date part uses `:` as its
/// separator.
fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let mut tokens = raw
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .split_whitespace();
    let date = tokens.next()?.replace(':', "-");
    let time = tokens.next()?;
    NaiveDateTime::parse_from_str(&format!("{}T{}", date, time), "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn decode_user_comment(data: &[u8], little_endian: bool) -> String {
    let text = match data.split_at_checked(8) {
        Some((prefix, rest)) if prefix == UNICODE_PREFIX => {
            let units = rest.chunks_exact(2).map(|c| {
                if little_endian {
                    u16::from_le_bytes([c[0], c[1]])
                } else {
                    u16::from_be_bytes([c[0], c[1]])
                }
            });
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        Some((prefix, rest))
            if prefix == ASCII_PREFIX || prefix == JIS_PREFIX || prefix == UNDEFINED_PREFIX =>
        {
            String::from_utf8_lossy(rest).into_owned()
        }
        // Older clients stored the bare text without a character code.
        _ => String::from_utf8_lossy(data).into_owned(),
    };
    text.trim_end_matches('\0').to_string()
}

fn encode_user_comment(text: &str, little_endian: bool) -> Vec<u8> {
    if text.is_ascii() {
        let mut data = ASCII_PREFIX.to_vec();
        data.extend_from_slice(text.as_bytes());
        return data;
    }
    let mut data = UNICODE_PREFIX.to_vec();
    for unit in text.encode_utf16() {
        if little_endian {
            data.extend_from_slice(&unit.to_le_bytes());
        } else {
            data.extend_from_slice(&unit.to_be_bytes());
        }
    }
    data
}
