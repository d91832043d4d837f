// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

//! Degrees/minutes/seconds rational encoding of GPS coordinates.

/// Unsigned TIFF RATIONAL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Rational {
            numerator,
            denominator,
        }
    }

    /// `None` for a zero denominator.
    pub fn to_f64(self) -> Option<f64> {
        (self.denominator != 0).then(|| self.numerator as f64 / self.denominator as f64)
    }
}

impl From<exif::Rational> for Rational {
    fn from(value: exif::Rational) -> Self {
        Rational::new(value.num, value.denom)
    }
}

impl From<Rational> for exif::Rational {
    fn from(value: Rational) -> Self {
        exif::Rational {
            num: value.numerator,
            denom: value.denominator,
        }
    }
}

/// Denominator used for the seconds component when encoding.
///
/// 1/10000 of an arc second is roughly 3 mm on the ground, and 60 seconds
/// scaled by it still fits comfortably in a `u32`.
pub const SECONDS_DENOMINATOR: u32 = 10_000;

/// Unsigned DMS triple as stored in `GPSLatitude` / `GPSLongitude`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dms {
    pub degrees: Rational,
    pub minutes: Rational,
    pub seconds: Rational,
}

impl Dms {
    /// Encode the absolute value of `value` decimal degrees.
    pub fn from_degrees(value: f64) -> Dms {
        let value = value.abs();
        let mut degrees = value.trunc() as u32;
        let minutes = value.fract() * 60.0;
        let mut whole_minutes = minutes.trunc() as u32;
        let mut seconds = (minutes.fract() * 60.0 * SECONDS_DENOMINATOR as f64).round() as u32;

        // Rounding may push seconds (and then minutes) up to a full unit.
        if seconds >= 60 * SECONDS_DENOMINATOR {
            seconds -= 60 * SECONDS_DENOMINATOR;
            whole_minutes += 1;
        }
        if whole_minutes >= 60 {
            whole_minutes -= 60;
            degrees += 1;
        }

        Dms {
            degrees: Rational::new(degrees, 1),
            minutes: Rational::new(whole_minutes, 1),
            seconds: Rational::new(seconds, SECONDS_DENOMINATOR),
        }
    }

    pub fn from_rationals(values: &[Rational]) -> Option<Dms> {
        match values {
            [degrees, minutes, seconds] => Some(Dms {
                degrees: *degrees,
                minutes: *minutes,
                seconds: *seconds,
            }),
            _ => None,
        }
    }

    pub fn rationals(&self) -> [Rational; 3] {
        [self.degrees, self.minutes, self.seconds]
    }

    /// Unsigned decimal degrees, `None` if any denominator is zero.
    pub fn to_degrees(&self) -> Option<f64> {
        Some(
            self.degrees.to_f64()?
                + self.minutes.to_f64()? / 60.0
                + self.seconds.to_f64()? / 3600.0,
        )
    }
}

/// Hemisphere reference written next to each DMS value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Parse a `GPSLatitudeRef` / `GPSLongitudeRef` value.
    pub fn from_ref(value: &str) -> Option<Hemisphere> {
        match value.trim_matches(|c: char| c == '\0' || c.is_whitespace()) {
            "N" | "n" => Some(Hemisphere::North),
            "S" | "s" => Some(Hemisphere::South),
            "E" | "e" => Some(Hemisphere::East),
            "W" | "w" => Some(Hemisphere::West),
            _ => None,
        }
    }

    pub fn for_latitude(value: f64) -> Hemisphere {
        if value < 0.0 {
            Hemisphere::South
        } else {
            Hemisphere::North
        }
    }

    pub fn for_longitude(value: f64) -> Hemisphere {
        if value < 0.0 {
            Hemisphere::West
        } else {
            Hemisphere::East
        }
    }

    pub fn is_latitude(self) -> bool {
        matches!(self, Hemisphere::North | Hemisphere::South)
    }

    pub fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }

    pub fn as_ref_str(self) -> &'static str {
        match self {
            Hemisphere::North => "N",
            Hemisphere::South => "S",
            Hemisphere::East => "E",
            Hemisphere::West => "W",
        }
    }
}

/// Round `value` through the DMS encoding, yielding exactly what a decode of
/// the encoded rationals returns.
pub fn quantize(value: f64) -> f64 {
    let magnitude = Dms::from_degrees(value).to_degrees().unwrap_or(0.0);
    if value < 0.0 { -magnitude } else { magnitude }
}
