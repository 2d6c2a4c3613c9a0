pub mod genre;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use genre::{Genre, GenreTag, GenreWithCount};

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside their valid ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Physical condition of the book on offer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookCondition {
    LikeNew,
    VeryGood,
    Good,
    Used,
    Acceptable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    #[default]
    Available,
    Sold,
}

/// A book offered for sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub seller_username: String,
    #[serde(default)]
    pub seller_rating: f32,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub genres: Vec<GenreTag>,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub currency: Option<String>,
    pub condition: BookCondition,
    #[serde(default)]
    pub shipping_offered: bool,
    pub location: Option<Coordinate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ListingStatus,
    /// Kilometers from the origin of the current proximity search.
    /// Populated per query, never stored.
    #[serde(skip)]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ListingError {
    #[error("listing {0} has a negative price")]
    NegativePrice(String),
    #[error("listing {0} has an out-of-range coordinate")]
    InvalidCoordinate(String),
}

impl Listing {
    pub fn validate(&self) -> Result<(), ListingError> {
        let invalid = |p: f64| p.is_nan() || p < 0.0;
        if invalid(self.price) || self.original_price.is_some_and(invalid) {
            return Err(ListingError::NegativePrice(self.id.clone()));
        }
        if let Some(location) = &self.location {
            if !location.is_valid() {
                return Err(ListingError::InvalidCoordinate(self.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn listing(id: &str, title: &str, author: &str, description: &str) -> Listing {
        Listing {
            id: id.to_string(),
            seller_id: "seller-1".to_string(),
            seller_username: "bookworm".to_string(),
            seller_rating: 4.5,
            title: title.to_string(),
            author: author.to_string(),
            isbn: String::new(),
            genres: Vec::new(),
            description: description.to_string(),
            price: 8.0,
            original_price: None,
            currency: None,
            condition: BookCondition::Good,
            shipping_offered: false,
            location: None,
            created_at: Utc::now(),
            status: ListingStatus::Available,
            distance_km: None,
        }
    }

    pub fn with_genres(id: &str, genres: &[GenreTag]) -> Listing {
        let mut listing = listing(id, id, "Anon", "");
        listing.genres = genres.to_vec();
        listing
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::listing;
    use super::*;

    #[test]
    fn distance_is_not_serialized() {
        let mut l = listing("l1", "Dune", "Frank Herbert", "");
        l.distance_km = Some(12.5);

        let value = serde_json::to_value(&l).unwrap();
        assert!(value.get("distance_km").is_none());

        let back: Listing = serde_json::from_value(value).unwrap();
        assert_eq!(back.distance_km, None);
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut l = listing("l1", "Dune", "Frank Herbert", "");
        l.price = -1.0;
        assert_eq!(l.validate(), Err(ListingError::NegativePrice("l1".into())));
    }

    #[test]
    fn out_of_range_coordinate_is_rejected() {
        let mut l = listing("l1", "Dune", "Frank Herbert", "");
        l.location = Some(Coordinate::new(91.0, 0.0));
        assert_eq!(
            l.validate(),
            Err(ListingError::InvalidCoordinate("l1".into()))
        );
    }
}
