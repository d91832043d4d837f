// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! JPEG fixtures for unit tests.

use crate::metadata::ExifDirectory;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use img_parts::{Bytes, ImageEXIF as _, jpeg::Jpeg};
use std::io::Cursor;

/// Small JPEG without any Exif segment. Different seeds give different
/// pixel data.
pub fn sample_jpeg(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(16, 16, |x, y| {
        Rgb([seed.wrapping_mul(37), (x * 16) as u8, (y * 16) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode fixture");
    out.into_inner()
}

/// JPEG carrying an Exif segment populated by `fill`, written in the given
/// byte order.
pub fn jpeg_with_exif(
    seed: u8,
    little_endian: bool,
    fill: impl FnOnce(&mut ExifDirectory),
) -> Vec<u8> {
    let mut dir = ExifDirectory::new(little_endian);
    fill(&mut dir);
    jpeg_with_tiff(seed, dir.dump().expect("dump fixture"))
}

/// JPEG whose Exif segment holds the raw TIFF payload `tiff`.
pub fn jpeg_with_tiff(seed: u8, tiff: Vec<u8>) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(sample_jpeg(seed))).expect("parse fixture");
    jpeg.set_exif(Some(Bytes::from(tiff)));
    jpeg.encoder().bytes().to_vec()
}

/// Replace the 4-byte value offset of the first IFD entry for `tag` (written
/// with ASCII type) in `jpeg`, in the given byte order.
pub fn corrupt_ascii_offset(jpeg: &mut [u8], tag: u16, little_endian: bool, offset: u32) {
    let (entry, offset) = if little_endian {
        ([tag.to_le_bytes(), 2u16.to_le_bytes()].concat(), offset.to_le_bytes())
    } else {
        ([tag.to_be_bytes(), 2u16.to_be_bytes()].concat(), offset.to_be_bytes())
    };
    let at = jpeg
        .windows(entry.len())
        .position(|w| w == entry.as_slice())
        .expect("entry in fixture");
    jpeg[at + 8..at + 12].copy_from_slice(&offset);
}
