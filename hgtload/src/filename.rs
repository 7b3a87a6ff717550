//! Grid filename utilities.
//!
//! This module converts between one-degree cell origins and SRTM `.hgt`
//! filenames.
//!
//! # Filename Format
//!
//! SRTM files follow the naming convention: `{N|S}{lat}{E|W}{lon}.hgt`
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N35, S12)
//! - Longitude: 3 digits with E/W prefix (e.g., E138, W077)
//!
//! The filename represents the **southwest corner** of the 1° × 1° cell.
//! Provider suffixes such as `N35E138.SRTMGL1.hgt` are accepted when parsing;
//! everything after the longitude digits is ignored.

use std::fmt;
use std::path::Path;

use crate::error::{HgtError, Result};

/// Southwest corner of a one-degree grid cell, in integer degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Origin {
    lat: i32,
    lng: i32,
}

impl Origin {
    /// Create an origin, validating that the cell lies on the globe.
    ///
    /// Returns `None` unless `lat` is in `-90..=89` and `lng` in `-180..=179`.
    pub fn new(lat: i32, lng: i32) -> Option<Self> {
        if (-90..=89).contains(&lat) && (-180..=179).contains(&lng) {
            Some(Self { lat, lng })
        } else {
            None
        }
    }

    /// Origin of the cell containing the given coordinates.
    pub fn containing(lat: f64, lng: f64) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        // The north pole and the antimeridian belong to the last cell.
        let lat_int = (lat.floor() as i32).min(89);
        let lng_int = (lng.floor() as i32).min(179);
        Self::new(lat_int, lng_int)
    }

    /// Southern latitude of the cell.
    pub fn lat(&self) -> i32 {
        self.lat
    }

    /// Western longitude of the cell.
    pub fn lng(&self) -> i32 {
        self.lng
    }

    /// Northern latitude of the cell.
    pub fn lat_max(&self) -> i32 {
        self.lat + 1
    }

    /// Canonical filename of the cell, e.g. `N35E138.hgt`.
    pub fn filename(&self) -> String {
        format!("{}.hgt", self)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lat_prefix = if self.lat >= 0 { 'N' } else { 'S' };
        let lng_prefix = if self.lng >= 0 { 'E' } else { 'W' };
        write!(
            f,
            "{}{:02}{}{:03}",
            lat_prefix,
            self.lat.abs(),
            lng_prefix,
            self.lng.abs()
        )
    }
}

/// Convert latitude and longitude to an SRTM `.hgt` filename.
///
/// # Examples
///
/// ```
/// use hgtload::filename::lat_lng_to_filename;
///
/// assert_eq!(lat_lng_to_filename(35.5, 138.7), "N35E138.hgt");
/// assert_eq!(lat_lng_to_filename(-12.3, -77.1), "S13W078.hgt");
/// assert_eq!(lat_lng_to_filename(0.5, -0.5), "N00W001.hgt");
/// ```
pub fn lat_lng_to_filename(lat: f64, lng: f64) -> String {
    let lat_int = lat.floor() as i32;
    let lng_int = lng.floor() as i32;

    let lat_prefix = if lat_int >= 0 { 'N' } else { 'S' };
    let lng_prefix = if lng_int >= 0 { 'E' } else { 'W' };

    format!(
        "{}{:02}{}{:03}.hgt",
        lat_prefix,
        lat_int.abs(),
        lng_prefix,
        lng_int.abs()
    )
}

/// Parse the cell origin encoded at the start of a grid filename.
///
/// Accepts a bare name or a path; directory components are ignored.
///
/// # Errors
///
/// Returns [`HgtError::InvalidFilename`] if the name does not start with
/// `{N|S}digits{E|W}digits` or the encoded cell is not on the globe.
///
/// # Examples
///
/// ```
/// use hgtload::filename::parse_origin;
///
/// let origin = parse_origin("N00E010.hgt").unwrap();
/// assert_eq!((origin.lat(), origin.lng()), (0, 10));
///
/// let origin = parse_origin("/data/S12W077.SRTMGL1.hgt").unwrap();
/// assert_eq!((origin.lat(), origin.lng()), (-12, -77));
///
/// assert!(parse_origin("invalid.hgt").is_err());
/// ```
pub fn parse_origin<P: AsRef<Path>>(path: P) -> Result<Origin> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    // Paths written on Windows may reach us as plain strings.
    let name = name.rsplit('\\').next().unwrap_or(&name).to_string();

    let invalid = || HgtError::InvalidFilename { name: name.clone() };

    let bytes = name.as_bytes();
    let mut pos = 0;

    let lat_sign = match bytes.first() {
        Some(b'N' | b'n') => 1,
        Some(b'S' | b's') => -1,
        _ => return Err(invalid()),
    };
    pos += 1;

    let (lat, next) = take_digits(bytes, pos).ok_or_else(invalid)?;
    pos = next;

    let lng_sign = match bytes.get(pos) {
        Some(b'E' | b'e') => 1,
        Some(b'W' | b'w') => -1,
        _ => return Err(invalid()),
    };
    pos += 1;

    let (lng, _) = take_digits(bytes, pos).ok_or_else(invalid)?;

    Origin::new(lat * lat_sign, lng * lng_sign).ok_or_else(invalid)
}

/// Read a run of ASCII digits starting at `start`, returning the value and
/// the index just past the run.
fn take_digits(bytes: &[u8], start: usize) -> Option<(i32, usize)> {
    let len = bytes[start.min(bytes.len())..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    // Three digits is the widest field in the naming convention.
    if len == 0 || len > 3 {
        return None;
    }
    let digits = std::str::from_utf8(&bytes[start..start + len]).ok()?;
    Some((digits.parse().ok()?, start + len))
}

/// Whether a path looks like a grid file (`.hgt` extension, any case).
pub fn is_grid_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|e| e.eq_ignore_ascii_case("hgt"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(lat: i32, lng: i32) -> Origin {
        Origin::new(lat, lng).unwrap()
    }

    #[test]
    fn test_positive_coords() {
        assert_eq!(lat_lng_to_filename(35.5, 138.7), "N35E138.hgt");
        assert_eq!(lat_lng_to_filename(0.5, 0.5), "N00E000.hgt");
        assert_eq!(lat_lng_to_filename(1.0, 1.0), "N01E001.hgt");
        assert_eq!(lat_lng_to_filename(59.9, 179.9), "N59E179.hgt");
    }

    #[test]
    fn test_negative_coords() {
        // floor(-12.3) = -13, floor(-77.1) = -78
        assert_eq!(lat_lng_to_filename(-12.3, -77.1), "S13W078.hgt");
        assert_eq!(lat_lng_to_filename(-0.5, -0.5), "S01W001.hgt");
        assert_eq!(lat_lng_to_filename(-1.0, -1.0), "S01W001.hgt");
    }

    #[test]
    fn test_origin_display_matches_filename() {
        assert_eq!(origin(0, 10).to_string(), "N00E010");
        assert_eq!(origin(-12, -77).filename(), "S12W077.hgt");
        assert_eq!(origin(35, -123).filename(), lat_lng_to_filename(35.5, -122.4));
    }

    #[test]
    fn test_origin_bounds() {
        assert!(Origin::new(89, 179).is_some());
        assert!(Origin::new(-90, -180).is_some());
        assert!(Origin::new(90, 0).is_none());
        assert!(Origin::new(0, 180).is_none());
        assert_eq!(origin(0, 10).lat_max(), 1);
    }

    #[test]
    fn test_origin_containing() {
        assert_eq!(Origin::containing(0.5, 10.5), Some(origin(0, 10)));
        assert_eq!(Origin::containing(-0.1, -0.1), Some(origin(-1, -1)));
        assert_eq!(Origin::containing(90.0, 180.0), Some(origin(89, 179)));
        assert_eq!(Origin::containing(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_parse_filename() {
        assert_eq!(parse_origin("N35E138.hgt").unwrap(), origin(35, 138));
        assert_eq!(parse_origin("S12W077.hgt").unwrap(), origin(-12, -77));
        assert_eq!(parse_origin("N00E000.hgt").unwrap(), origin(0, 0));
        assert_eq!(parse_origin("S00W000.hgt").unwrap(), origin(0, 0));
        assert_eq!(parse_origin("N00E010").unwrap(), origin(0, 10));
    }

    #[test]
    fn test_parse_filename_with_path_and_suffix() {
        assert_eq!(
            parse_origin("/path/to/data/N35E138.hgt").unwrap(),
            origin(35, 138)
        );
        assert_eq!(parse_origin("C:\\data\\S12W077.hgt").unwrap(), origin(-12, -77));
        assert_eq!(
            parse_origin("N35E138.SRTMGL1.hgt").unwrap(),
            origin(35, 138)
        );
    }

    #[test]
    fn test_parse_filename_invalid() {
        for name in [
            "invalid",
            "X35E138.hgt",
            "N35X138.hgt",
            "NAAE138.hgt",
            "N35E.hgt",
            "N1234E010.hgt",
            "N95E010.hgt",
            "N10E200.hgt",
        ] {
            let err = parse_origin(name).unwrap_err();
            assert!(
                matches!(err, HgtError::InvalidFilename { .. }),
                "{} should not parse",
                name
            );
        }
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(parse_origin("n35e138.hgt").unwrap(), origin(35, 138));
        assert_eq!(parse_origin("s12w077.hgt").unwrap(), origin(-12, -77));
    }

    #[test]
    fn test_is_grid_file() {
        assert!(is_grid_file("N00E010.hgt"));
        assert!(is_grid_file("/x/N00E010.HGT"));
        assert!(!is_grid_file("N00E010.hgt.zip"));
        assert!(!is_grid_file("README"));
    }
}
