use crate::models::{Coordinate, Listing};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ListingError;

/// Field holding the geohash on an indexed document
pub const GEOHASH_FIELD: &str = "g";
/// Field holding the indexed coordinate on an indexed document
pub const LOCATION_FIELD: &str = "l";

/// Raw document as delivered by the store
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: serde_json::Value,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Deserialize into a listing; the document id wins over any stored `id`
    pub fn to_listing(&self) -> Result<Listing, serde_json::Error> {
        let mut listing: Listing = serde_json::from_value(self.data.clone())?;
        listing.id = self.id.clone();
        Ok(listing)
    }
}

/// Geohash-augmented coordinate kept alongside a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoIndexEntry {
    pub geohash: String,
    pub location: Coordinate,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed geo index data for {id}: {reason}")]
    MalformedIndex { id: String, reason: String },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("document {0} not found")]
    NotFound(String),
    #[error(transparent)]
    InvalidListing(#[from] ListingError),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
