//! Nearby-listing search: geo query, parse, distance, filter, sort.

pub mod filter;
pub mod query;
pub mod types;

#[cfg(test)]
mod tests;

pub use filter::{annotate_distances, filter_and_sort, parse_snapshots};
pub use query::fetch_nearby;
pub use types::{SearchRequest, SearchState};

use crate::genres::{GenreCache, GenreMatcher};
use crate::models::Listing;
use crate::store::{GeoIndex, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("proximity query failed: {0}")]
    QueryFailed(StoreError),
    #[error("proximity query ended without a result")]
    Aborted,
}

impl SearchError {
    /// Whether trying again later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::QueryFailed(StoreError::InvalidQuery(_))
            | SearchError::QueryFailed(StoreError::PermissionDenied(_)) => false,
            SearchError::QueryFailed(_) | SearchError::Aborted => true,
        }
    }
}

/// Runs nearby searches against a geo index
pub struct ListingSearch {
    index: Arc<dyn GeoIndex>,
    genres: Arc<GenreCache>,
    matcher: GenreMatcher,
}

impl ListingSearch {
    pub fn new(index: Arc<dyn GeoIndex>, genres: Arc<GenreCache>, matcher: GenreMatcher) -> Self {
        Self {
            index,
            genres,
            matcher,
        }
    }

    /// Listings within the request radius matching its text and genres, nearest first
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Listing>, SearchError> {
        info!(
            query = %request.query,
            lat = request.origin.latitude,
            lon = request.origin.longitude,
            radius_km = request.radius_km,
            "searching nearby listings"
        );

        let snapshots = fetch_nearby(self.index.clone(), request.origin, request.radius_km).await?;
        let found = snapshots.len();

        let mut listings = parse_snapshots(snapshots);
        if !request.genres.is_empty() {
            let catalog = self.genres.genres();
            listings.retain(|listing| {
                self.matcher
                    .matches_genres(&listing.genres, &request.genres, &catalog)
            });
        }
        annotate_distances(&mut listings, request.origin);
        let results = filter_and_sort(listings, &request.query);

        debug!(found, kept = results.len(), "filtered nearby listings");
        info!("✅ {} listings nearby", results.len());
        Ok(results)
    }
}
