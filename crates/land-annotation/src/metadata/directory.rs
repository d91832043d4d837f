// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! Editable view of the TIFF directories inside an Exif payload.
//!
//! Parsing goes through [`exif::Reader`] with `continue_on_error`, so a
//! single unreadable entry is skipped instead of failing the whole payload.
//! Writing goes through [`exif::experimental::Writer`], which lays out the
//! sub-IFD pointers and the IFD1 thumbnail offsets itself.

use crate::Error;
use exif::{Field, In, Reader, Tag, Value, experimental::Writer};
use log::debug;
use std::io::Cursor;

/// TIFF type 13, an offset to a private IFD. The reader has no decoder for
/// it, so such entries are carried as LONG values.
const IFD_TYPE: u16 = 13;

/// Tags whose values are offsets into the payload. The writer regenerates
/// them from the layout it produces.
const STRUCTURAL: [Tag; 9] = [
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
];

/// Every field of an Exif payload, in IFD and tag order, plus the byte order
/// and JPEG thumbnail needed to write it back.
#[derive(Clone, Debug)]
pub struct ExifDirectory {
    fields: Vec<Field>,
    little_endian: bool,
    thumbnail: Option<Vec<u8>>,
}

impl Default for ExifDirectory {
    fn default() -> Self {
        ExifDirectory::new(false)
    }
}

impl ExifDirectory {
    /// An empty directory written in the given byte order.
    pub fn new(little_endian: bool) -> Self {
        ExifDirectory {
            fields: Vec::new(),
            little_endian,
            thumbnail: None,
        }
    }

    /// Parse a TIFF payload (the APP1 contents after `Exif\0\0`).
    ///
    /// Fails with [`Error::CorruptContainer`] only when the header or the
    /// IFD0 chain is unreadable. Individual entries that cannot be read are
    /// logged and skipped.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let exif = Reader::new()
            .continue_on_error(true)
            .read_raw(data.to_vec())
            .or_else(|e| {
                e.distill_partial_result(|errors| {
                    for error in errors {
                        debug!("Skipping unreadable Exif entry: {}", error);
                    }
                })
            })
            .map_err(|e| Error::CorruptContainer(format!("invalid Exif payload: {}", e)))?;

        let little_endian = exif.little_endian();
        let thumbnail = read_thumbnail(&exif);
        let mut fields = Vec::new();
        for field in exif.fields() {
            if STRUCTURAL.contains(&field.tag) {
                continue;
            }
            if field.ifd_num == In::THUMBNAIL && thumbnail.is_none() {
                continue;
            }
            match field.value {
                Value::Unknown(typ, count, offset) => {
                    match read_ifd_offsets(exif.buf(), little_endian, typ, count, offset) {
                        Some(values) => fields.push(Field {
                            tag: field.tag,
                            ifd_num: field.ifd_num,
                            value: Value::Long(values),
                        }),
                        None => debug!("Dropping {} of unsupported type {}", field.tag, typ),
                    }
                }
                _ => fields.push(field.clone()),
            }
        }

        let mut directory = ExifDirectory {
            fields,
            little_endian,
            thumbnail,
        };
        directory.sort();
        Ok(directory)
    }

    /// Serialize to a TIFF payload in the original byte order.
    pub fn dump(&self) -> Result<Vec<u8>, Error> {
        let mut writer = Writer::new();
        for field in &self.fields {
            writer.push_field(field);
        }
        if let Some(jpeg) = &self.thumbnail {
            writer.set_jpeg(jpeg, In::THUMBNAIL);
        }
        let mut out = Cursor::new(Vec::new());
        writer.write(&mut out, self.little_endian)?;
        Ok(out.into_inner())
    }

    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    /// The field `tag` of the primary image.
    pub fn get(&self, tag: Tag) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.tag == tag && f.ifd_num == In::PRIMARY)
    }

    /// Set `tag` of the primary image, replacing any previous value.
    pub fn set(&mut self, tag: Tag, value: Value) {
        match self
            .fields
            .iter_mut()
            .find(|f| f.tag == tag && f.ifd_num == In::PRIMARY)
        {
            Some(field) => field.value = value,
            None => {
                self.fields.push(Field {
                    tag,
                    ifd_num: In::PRIMARY,
                    value,
                });
                self.sort();
            }
        }
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Field> {
        let index = self
            .fields
            .iter()
            .position(|f| f.tag == tag && f.ifd_num == In::PRIMARY)?;
        Some(self.fields.remove(index))
    }

    /// Whether any field of the primary image belongs to `context`.
    pub fn has_context(&self, context: exif::Context) -> bool {
        self.fields
            .iter()
            .any(|f| f.tag.context() == context && f.ifd_num == In::PRIMARY)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn sort(&mut self) {
        self.fields.sort_by_key(|f| (f.ifd_num.index(), f.tag.number()));
    }
}

fn read_thumbnail(exif: &exif::Exif) -> Option<Vec<u8>> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let thumbnail = exif.buf().get(offset..offset.checked_add(len)?);
    if thumbnail.is_none() {
        debug!("Dropping thumbnail at {}+{} outside the payload", offset, len);
    }
    thumbnail.map(<[u8]>::to_vec)
}

/// Values of an IFD-typed entry. Counts up to one are stored inline at
/// `offset`; longer arrays are referenced from there.
fn read_ifd_offsets(
    buf: &[u8],
    little_endian: bool,
    typ: u16,
    count: u32,
    offset: u32,
) -> Option<Vec<u32>> {
    if typ != IFD_TYPE {
        return None;
    }
    let load = |at: usize| -> Option<u32> {
        let bytes: [u8; 4] = buf.get(at..at.checked_add(4)?)?.try_into().ok()?;
        Some(if little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    };
    let start = if count <= 1 {
        offset as usize
    } else {
        load(offset as usize)? as usize
    };
    (0..count as usize)
        .map(|i| load(start.checked_add(i.checked_mul(4)?)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::{Context, Rational};

    fn sample(little_endian: bool) -> ExifDirectory {
        let mut dir = ExifDirectory::new(little_endian);
        dir.set(Tag::Make, Value::Ascii(vec![b"Acme".to_vec()]));
        dir.set(Tag::DateTime, Value::Ascii(vec![b"2022:01:13 10:20:30".to_vec()]));
        dir.set(Tag::ExifVersion, Value::Undefined(b"0231".to_vec(), 0));
        dir.set(Tag::GPSLatitudeRef, Value::Ascii(vec![b"N".to_vec()]));
        dir.set(
            Tag::GPSLatitude,
            Value::Rational(vec![
                Rational { num: 36, denom: 1 },
                Rational { num: 4, denom: 1 },
                Rational { num: 2410, denom: 100 },
            ]),
        );
        dir
    }

    fn ascii(dir: &ExifDirectory, tag: Tag) -> Option<Vec<u8>> {
        match &dir.get(tag)?.value {
            Value::Ascii(values) => values.first().cloned(),
            _ => None,
        }
    }

    #[test]
    fn test_dump_parse_both_byte_orders() {
        for little_endian in [true, false] {
            let bytes = sample(little_endian).dump().unwrap();
            let marker: &[u8] = if little_endian { b"II" } else { b"MM" };
            assert_eq!(&bytes[..2], marker);

            let parsed = ExifDirectory::parse(&bytes).unwrap();
            assert_eq!(parsed.little_endian(), little_endian);
            assert_eq!(parsed.len(), 5);
            assert_eq!(ascii(&parsed, Tag::Make), Some(b"Acme".to_vec()));
            assert!(parsed.has_context(Context::Gps));
            assert!(parsed.has_context(Context::Exif));
            match &parsed.get(Tag::GPSLatitude).unwrap().value {
                Value::Rational(values) => {
                    assert_eq!(values.len(), 3);
                    assert_eq!((values[2].num, values[2].denom), (2410, 100));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_structural_tags_are_rebuilt() {
        let parsed = ExifDirectory::parse(&sample(true).dump().unwrap()).unwrap();
        for tag in STRUCTURAL {
            assert!(parsed.iter().all(|f| f.tag != tag), "{} kept", tag);
        }
    }

    #[test]
    fn test_fields_sorted_by_tag() {
        let mut dir = ExifDirectory::new(false);
        dir.set(Tag::DateTime, Value::Ascii(vec![b"2022:01:13 10:20:30".to_vec()]));
        dir.set(Tag::ImageDescription, Value::Ascii(vec![b"title".to_vec()]));
        let seen: Vec<Tag> = dir.iter().map(|f| f.tag).collect();
        assert_eq!(seen, vec![Tag::ImageDescription, Tag::DateTime]);
    }

    #[test]
    fn test_set_replaces_and_remove() {
        let mut dir = sample(false);
        dir.set(Tag::Make, Value::Ascii(vec![b"Other".to_vec()]));
        assert_eq!(ascii(&dir, Tag::Make), Some(b"Other".to_vec()));
        assert_eq!(dir.len(), 5);
        assert!(dir.remove(Tag::Make).is_some());
        assert!(dir.remove(Tag::Make).is_none());
        assert!(dir.get(Tag::Make).is_none());
    }

    #[test]
    fn test_rejects_garbage() {
        for data in [
            &b"II*"[..],
            &b"XX\0\x2a\0\0\0\x08"[..],
            &b"II\x2b\0\x08\0\0\0"[..],
        ] {
            assert!(matches!(
                ExifDirectory::parse(data),
                Err(Error::CorruptContainer(_))
            ));
        }
    }

    #[test]
    fn test_ifd_offsets() {
        let buf = [0, 0, 0, 7, 0, 0, 0, 8, 0, 0, 0, 9, 0, 0, 0, 4];
        assert_eq!(read_ifd_offsets(&buf, false, IFD_TYPE, 1, 0), Some(vec![7]));
        assert_eq!(
            read_ifd_offsets(&buf, false, IFD_TYPE, 2, 12),
            Some(vec![8, 9])
        );
        assert_eq!(read_ifd_offsets(&buf, false, IFD_TYPE, 4, 12), None);
        assert_eq!(read_ifd_offsets(&buf, false, 99, 1, 0), None);
    }
}
