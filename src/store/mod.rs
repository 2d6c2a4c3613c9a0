pub mod memory;
pub mod traits;
pub mod types;

pub use memory::MemoryStore;
pub use traits::{GeoIndex, GeoQueryListener, ListenerId, ListingStore};
pub use types::{DocumentSnapshot, GeoIndexEntry, StoreError};
