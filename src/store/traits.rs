use crate::models::{Coordinate, Listing};
use crate::store::types::{DocumentSnapshot, StoreError};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle returned by [`GeoIndex::attach`]
pub type ListenerId = u64;

/// Callbacks fired by a live radius query.
///
/// Calls may arrive on any thread, in the order the index emits them.
pub trait GeoQueryListener: Send + Sync {
    fn on_document_entered(&self, snapshot: DocumentSnapshot, location: Coordinate);

    /// Still inside the region, payload changed
    fn on_document_changed(&self, snapshot: DocumentSnapshot, location: Coordinate);

    /// Still inside the region, location changed
    fn on_document_moved(&self, snapshot: DocumentSnapshot, location: Coordinate);

    fn on_document_exited(&self, snapshot: DocumentSnapshot);

    /// The initial scan is complete
    fn on_ready(&self);

    fn on_error(&self, error: StoreError);
}

/// Query side of a geohash-indexed collection
pub trait GeoIndex: Send + Sync {
    /// Start watching every document within `radius_km` of `center`
    fn attach(
        &self,
        center: Coordinate,
        radius_km: f64,
        listener: Arc<dyn GeoQueryListener>,
    ) -> Result<ListenerId, StoreError>;

    /// Stop delivering events to a listener. Unknown ids are ignored.
    fn detach(&self, id: ListenerId);
}

/// Write path for listings and their geo index entries
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Persist a listing, keeping its geo index entry in step with `location`
    async fn save_listing(&self, listing: &Listing) -> Result<(), StoreError>;

    async fn get_listing(&self, id: &str) -> Result<Option<Listing>, StoreError>;

    async fn delete_listing(&self, id: &str) -> Result<(), StoreError>;

    /// Set or move a listing's coordinate and recompute its geohash
    async fn set_location(&self, id: &str, location: Coordinate) -> Result<(), StoreError>;

    /// Clear a listing's coordinate and drop its geo index entry
    async fn remove_location(&self, id: &str) -> Result<(), StoreError>;
}
