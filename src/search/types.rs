use crate::models::{Coordinate, Listing};
use crate::search::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Parameters for a nearby-listings search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free text matched against title, author and description
    pub query: String,
    pub origin: Coordinate,
    pub radius_km: f64,
    /// Catalog genre ids; empty means no genre filter
    pub genres: BTreeSet<String>,
}

impl SearchRequest {
    pub fn new(origin: Coordinate, radius_km: f64) -> Self {
        Self {
            query: String::new(),
            origin,
            radius_km,
            genres: BTreeSet::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }
}

/// What a screen should show for a finished search
#[derive(Debug)]
pub enum SearchState {
    Results(Vec<Listing>),
    /// The search worked but nothing nearby matched
    NoneNearby,
    Failed { message: String, retryable: bool },
}

impl SearchState {
    pub fn from_result(result: Result<Vec<Listing>, SearchError>) -> Self {
        match result {
            Ok(listings) if listings.is_empty() => SearchState::NoneNearby,
            Ok(listings) => SearchState::Results(listings),
            Err(error) => SearchState::Failed {
                message: error.to_string(),
                retryable: error.is_retryable(),
            },
        }
    }
}
