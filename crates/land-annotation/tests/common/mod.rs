// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use chrono::{DateTime, TimeZone as _, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use land_annotation::AnnotationRecord;
use std::io::Cursor;

#[ctor::ctor]
fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Small JPEG without metadata; the seed changes the pixels.
pub fn jpeg(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(24, 16, |x, y| {
        Rgb([seed.wrapping_mul(53), (x * 10) as u8, (y * 15) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode fixture");
    out.into_inner()
}

pub fn captured() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 13, 10, 20, 30).unwrap()
}

/// Committed record with a fixed location and capture time.
pub fn annotated(seed: u8, comment: &str) -> AnnotationRecord {
    let mut record = AnnotationRecord::from_bytes(jpeg(seed));
    record.set_comment(comment);
    record.set_location("36.073362,-82.731789".parse().expect("valid location"));
    record.set_captured_at(captured());
    record.commit().expect("commit fixture");
    record
}
