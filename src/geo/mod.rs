//! Distance math and geohash range planning for proximity search.

pub mod distance;
pub mod geohash;

pub use distance::{haversine_km, EARTH_RADIUS_KM};
pub use self::geohash::{encode, query_ranges, GeohashRange};
