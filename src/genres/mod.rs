//! Catalog genres: matching listing tags, popularity, and the local catalog cache.

pub mod catalog;
pub mod matcher;
pub mod popularity;

pub use catalog::{
    is_stale, seed_catalog, sync_catalog, CatalogError, GenreCache, GenreCatalogSource,
    HttpCatalog, StaticCatalog, SyncOutcome,
};
pub use matcher::GenreMatcher;
pub use popularity::{rank_genres, remaining_genres, top_genres};
