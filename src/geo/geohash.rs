//! Geohash encoding and radius-to-range planning.
//!
//! A radius query is turned into a handful of `[start, end)` string ranges over
//! stored geohashes. Every point inside the circle hashes into one of them; the
//! converse is not true, so callers still filter candidates by real distance.

use crate::geo::EARTH_RADIUS_KM;
use crate::models::Coordinate;
use ::geohash::{Coord, GeohashError};
use std::f64::consts::PI;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const BITS_PER_CHAR: u32 = 5;

/// Cell budget for one query; the grid coarsens until the box fits in it
const MAX_QUERY_CELLS: u64 = 32;

/// Slack added around the bounding box, in degrees (about a metre)
const BOX_MARGIN_DEGREES: f64 = 1e-5;

/// Just under the north pole, still inside the top row of cells
const NORTHMOST_LATITUDE: f64 = 90.0 - 1e-9;

/// Longest geohash the encoder produces
pub const MAX_PRECISION: usize = 12;

/// Encode a coordinate as a geohash of `precision` characters.
///
/// The pole and the 180th meridian wrap to the opposite edge of the grid in
/// the underlying encoder, so they are folded onto the cells that hold their
/// neighbours first.
pub fn encode(location: Coordinate, precision: usize) -> Result<String, GeohashError> {
    let latitude = if location.latitude == 90.0 {
        NORTHMOST_LATITUDE
    } else {
        location.latitude
    };
    let longitude = if location.longitude == 180.0 {
        -180.0
    } else {
        location.longitude
    };
    ::geohash::encode(
        Coord {
            x: longitude,
            y: latitude,
        },
        precision,
    )
}

/// Half-open range of geohash strings, `start <= hash < end`.
///
/// `end` may be `~`, which sorts after every base32 character.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeohashRange {
    pub start: String,
    pub end: String,
}

impl GeohashRange {
    pub fn contains(&self, hash: &str) -> bool {
        hash >= self.start.as_str() && hash < self.end.as_str()
    }
}

/// Plan the geohash ranges covering a circle of `radius_km` around `center`.
///
/// The circle's latitude/longitude bounding box is laid over the finest
/// geohash grid (at most `max_precision` characters) that covers it in
/// `MAX_QUERY_CELLS` cells or fewer. Consecutive cells are merged.
pub fn query_ranges(
    center: Coordinate,
    radius_km: f64,
    max_precision: usize,
) -> Vec<GeohashRange> {
    let bounds = BoundingBox::around(center, radius_km);
    let max_bits = (max_precision.clamp(1, MAX_PRECISION) as u32) * BITS_PER_CHAR;
    let bits = (0..=max_bits)
        .rev()
        .find(|&bits| bounds.cell_count(bits) <= MAX_QUERY_CELLS)
        .unwrap_or(0);

    let mut cells = bounds.cell_codes(bits);
    cells.sort_unstable();

    let mut spans: Vec<(u64, u64)> = Vec::new();
    for code in cells {
        if let Some((_, end)) = spans.last_mut() {
            if *end >= code {
                *end = (*end).max(code + 1);
                continue;
            }
        }
        spans.push((code, code + 1));
    }

    spans
        .into_iter()
        .map(|(start, end)| GeohashRange {
            start: code_to_hash(start, bits),
            end: if end == 1 << bits {
                "~".to_string()
            } else {
                code_to_hash(end, bits)
            },
        })
        .collect()
}

/// Degrees enclosing a spherical cap. Longitudes are split in two when the
/// box crosses the 180th meridian.
#[derive(Debug, Clone, PartialEq)]
struct BoundingBox {
    south: f64,
    north: f64,
    longitudes: Vec<(f64, f64)>,
}

impl BoundingBox {
    fn around(center: Coordinate, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let latitude = center.latitude.to_radians();
        let south = (latitude - angular).to_degrees() - BOX_MARGIN_DEGREES;
        let north = (latitude + angular).to_degrees() + BOX_MARGIN_DEGREES;

        // A pole inside the circle means every longitude is too
        let all_longitudes = || vec![(-180.0, 180.0)];
        if angular >= PI || south <= -90.0 || north >= 90.0 {
            return Self {
                south: south.max(-90.0),
                north: north.min(90.0),
                longitudes: all_longitudes(),
            };
        }

        let ratio = angular.sin() / latitude.cos();
        let delta = if ratio < 1.0 {
            ratio.asin().to_degrees() + BOX_MARGIN_DEGREES
        } else {
            180.0
        };
        let west = center.longitude - delta;
        let east = center.longitude + delta;
        let longitudes = if delta >= 180.0 {
            all_longitudes()
        } else if west < -180.0 {
            vec![(west + 360.0, 180.0), (-180.0, east)]
        } else if east > 180.0 {
            vec![(west, 180.0), (-180.0, east - 360.0)]
        } else {
            vec![(west, east)]
        };

        Self {
            south,
            north,
            longitudes,
        }
    }

    fn latitude_cells(&self, bits: u32) -> (u64, u64) {
        let lat_bits = bits / 2;
        (
            cell_index(self.south, -90.0, 180.0, lat_bits),
            cell_index(self.north, -90.0, 180.0, lat_bits),
        )
    }

    fn longitude_cells(&self, bits: u32) -> impl Iterator<Item = (u64, u64)> + '_ {
        let lon_bits = bits.div_ceil(2);
        self.longitudes.iter().map(move |&(west, east)| {
            (
                cell_index(west, -180.0, 360.0, lon_bits),
                cell_index(east, -180.0, 360.0, lon_bits),
            )
        })
    }

    fn cell_count(&self, bits: u32) -> u64 {
        let (south, north) = self.latitude_cells(bits);
        let columns: u64 = self
            .longitude_cells(bits)
            .map(|(west, east)| east - west + 1)
            .sum();
        (north - south + 1).saturating_mul(columns)
    }

    fn cell_codes(&self, bits: u32) -> Vec<u64> {
        let (south, north) = self.latitude_cells(bits);
        let mut codes = Vec::new();
        for (west, east) in self.longitude_cells(bits) {
            for lon in west..=east {
                for lat in south..=north {
                    codes.push(interleave(lon, lat, bits));
                }
            }
        }
        codes
    }
}

/// Row or column of `value` on a grid of `2^bits` cells spanning `[min, min + span]`
fn cell_index(value: f64, min: f64, span: f64, bits: u32) -> u64 {
    let cells = 1u64 << bits;
    let scaled = ((value - min) / span * cells as f64).floor();
    (scaled.max(0.0) as u64).min(cells - 1)
}

/// Geohash bit order: longitude first, then alternating with latitude
fn interleave(lon: u64, lat: u64, bits: u32) -> u64 {
    let lon_bits = bits.div_ceil(2);
    let lat_bits = bits / 2;
    (0..bits).fold(0, |code, k| {
        let bit = if k % 2 == 0 {
            (lon >> (lon_bits - 1 - k / 2)) & 1
        } else {
            (lat >> (lat_bits - 1 - k / 2)) & 1
        };
        (code << 1) | bit
    })
}

/// Shortest base32 string for the first `bits` bits of `code`, zero padded
fn code_to_hash(code: u64, bits: u32) -> String {
    let chars = bits.div_ceil(BITS_PER_CHAR);
    let padded = code << (chars * BITS_PER_CHAR - bits);
    (0..chars)
        .rev()
        .map(|i| BASE32[((padded >> (i * BITS_PER_CHAR)) & 0x1f) as usize] as char)
        .collect()
}
