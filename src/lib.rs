//! Core of the TaleWeaver used-book marketplace: nearby-listing search over a
//! geohash-indexed store, and the genre matching and ranking helpers.

pub mod cart;
pub mod config;
pub mod genres;
pub mod geo;
pub mod models;
pub mod search;
pub mod store;

pub use config::Config;
pub use models::{Coordinate, Genre, GenreTag, GenreWithCount, Listing};
pub use search::{ListingSearch, SearchError, SearchRequest, SearchState};
