// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use crate::{Error, metadata::quantize};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Geographic position in decimal degrees.
///
/// Both components are always finite. The string form is `"lat,lng"`, the
/// same text the annotation form shows and the fingerprint hashes.
///
/// # Examples
///
/// ```
/// use land_annotation::GeoCoordinate;
///
/// let coord: GeoCoordinate = "36.073362,-82.731789".parse().unwrap();
/// assert_eq!(coord.latitude(), 36.073362);
/// assert_eq!(coord.longitude(), -82.731789);
/// assert_eq!(coord.to_string(), "36.073362,-82.731789");
///
/// assert!("bad".parse::<GeoCoordinate>().is_err());
/// ```
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(try_from = "RawCoordinate")]
pub struct GeoCoordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for GeoCoordinate {
    type Error = Error;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        GeoCoordinate::new(raw.latitude, raw.longitude)
    }
}

impl GeoCoordinate {
    /// Create a coordinate, rejecting NaN and infinite components.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(Error::FormatError(format!(
                "coordinates must be finite: {},{}",
                latitude, longitude
            )));
        }
        Ok(GeoCoordinate {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The coordinate as it reads back from the Exif GPS encoding.
    pub fn quantized(&self) -> GeoCoordinate {
        GeoCoordinate {
            latitude: quantize(self.latitude),
            longitude: quantize(self.longitude),
        }
    }

    /// Validate the coordinate is within geographic ranges.
    ///
    /// Parsing does not enforce ranges; this is for callers that want to
    /// reject obviously broken positions before storing them.
    ///
    /// # Valid Ranges
    /// - Latitude: -90.0 to +90.0 degrees
    /// - Longitude: -180.0 to +180.0 degrees
    pub fn validate(&self) -> Result<(), Error> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidParameters(format!(
                "latitude out of range [-90, 90]: {}",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidParameters(format!(
                "longitude out of range [-180, 180]: {}",
                self.longitude
            )));
        }
        Ok(())
    }
}

impl FromStr for GeoCoordinate {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = raw.split(',').collect();
        if tokens.len() != 2 {
            return Err(Error::FormatError(format!(
                "expected \"lat,lng\", got {:?}",
                raw
            )));
        }

        let parse = |token: &str| {
            token
                .trim()
                .parse::<f64>()
                .map_err(|e| Error::FormatError(format!("{:?}: {}", token, e)))
        };
        GeoCoordinate::new(parse(tokens[0])?, parse(tokens[1])?)
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -0.0 must print as "0" or the fingerprint of a southern/western
        // origin would differ from the plain origin.
        let normalize = |v: f64| if v == 0.0 { 0.0 } else { v };
        write!(
            f,
            "{},{}",
            normalize(self.latitude),
            normalize(self.longitude)
        )
    }
}
