use crate::geo::{self, haversine_km, GeohashRange};
use crate::models::{Coordinate, Listing, ListingError};
use crate::store::traits::{GeoIndex, GeoQueryListener, ListenerId, ListingStore};
use crate::store::types::{
    DocumentSnapshot, GeoIndexEntry, StoreError, GEOHASH_FIELD, LOCATION_FIELD,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

enum GeoEvent {
    Entered(DocumentSnapshot, Coordinate),
    Changed(DocumentSnapshot, Coordinate),
    Moved(DocumentSnapshot, Coordinate),
    Exited(DocumentSnapshot),
    Ready,
    Failed(StoreError),
}

impl GeoEvent {
    fn deliver(self, listener: &dyn GeoQueryListener) {
        match self {
            GeoEvent::Entered(snapshot, location) => listener.on_document_entered(snapshot, location),
            GeoEvent::Changed(snapshot, location) => listener.on_document_changed(snapshot, location),
            GeoEvent::Moved(snapshot, location) => listener.on_document_moved(snapshot, location),
            GeoEvent::Exited(snapshot) => listener.on_document_exited(snapshot),
            GeoEvent::Ready => listener.on_ready(),
            GeoEvent::Failed(error) => listener.on_error(error),
        }
    }
}

struct StoredDocument {
    data: Value,
    entry: Option<GeoIndexEntry>,
}

struct ActiveQuery {
    center: Coordinate,
    radius_km: f64,
    members: HashSet<String>,
    events: mpsc::UnboundedSender<GeoEvent>,
}

impl ActiveQuery {
    fn covers(&self, location: Option<Coordinate>) -> bool {
        location.is_some_and(|l| haversine_km(self.center, l) <= self.radius_km)
    }

    fn emit(&self, event: GeoEvent) {
        // The delivery task is gone once the listener detached
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct StoreState {
    documents: HashMap<String, StoredDocument>,
    /// (geohash, document id), ordered for range scans
    index: BTreeSet<(String, String)>,
    queries: HashMap<ListenerId, ActiveQuery>,
    next_listener: ListenerId,
}

/// In-process document store with a geohash index and live radius queries.
///
/// Documents and their index entries change under one lock, so the index never
/// disagrees with a document's coordinate. Query events are delivered in order
/// from a tokio task per listener.
pub struct MemoryStore {
    precision: usize,
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// Create a store that indexes coordinates at `precision` geohash characters
    pub fn new(precision: usize) -> Self {
        Self {
            precision: precision.clamp(1, geo::geohash::MAX_PRECISION),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Number of listeners currently attached
    pub fn active_listeners(&self) -> usize {
        self.lock().queries.len()
    }

    pub fn index_entry(&self, id: &str) -> Option<GeoIndexEntry> {
        self.lock()
            .documents
            .get(id)
            .and_then(|doc| doc.entry.clone())
    }

    pub fn index_len(&self) -> usize {
        self.lock().index.len()
    }

    /// Write a raw document. Its index entry follows `location`.
    pub fn put_document(
        &self,
        id: &str,
        data: Value,
        location: Option<Coordinate>,
    ) -> Result<(), StoreError> {
        let entry = self.entry_for(id, location)?;
        let mut state = self.lock();
        apply_write(&mut state, id, data, entry)
    }

    /// Fail every attached query, as a dropped connection would
    pub fn fail_active_queries(&self, error: StoreError) {
        let state = self.lock();
        for query in state.queries.values() {
            query.emit(GeoEvent::Failed(error.clone()));
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry_for(
        &self,
        id: &str,
        location: Option<Coordinate>,
    ) -> Result<Option<GeoIndexEntry>, StoreError> {
        let Some(location) = location else {
            return Ok(None);
        };
        if !location.is_valid() {
            return Err(ListingError::InvalidCoordinate(id.to_string()).into());
        }
        let geohash =
            geo::encode(location, self.precision).map_err(|e| StoreError::MalformedIndex {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(GeoIndexEntry { geohash, location }))
    }

    fn document_data(state: &StoreState, id: &str) -> Result<Value, StoreError> {
        state
            .documents
            .get(id)
            .map(|doc| doc.data.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Store `data` under `id` and move its index entry in the same critical section
fn apply_write(
    state: &mut StoreState,
    id: &str,
    data: Value,
    entry: Option<GeoIndexEntry>,
) -> Result<(), StoreError> {
    let data = with_index_fields(id, data, entry.as_ref())?;

    let previous = state.documents.remove(id);
    let old_entry = previous.and_then(|doc| doc.entry);
    if let Some(old) = &old_entry {
        state.index.remove(&(old.geohash.clone(), id.to_string()));
    }
    if let Some(new) = &entry {
        state.index.insert((new.geohash.clone(), id.to_string()));
    }

    let old_location = old_entry.map(|e| e.location);
    let new_location = entry.as_ref().map(|e| e.location);
    let snapshot = DocumentSnapshot::new(id, data.clone());
    state
        .documents
        .insert(id.to_string(), StoredDocument { data, entry });

    for query in state.queries.values_mut() {
        let was_member = query.members.contains(id);
        let inside = query.covers(new_location);
        match (was_member, inside, new_location) {
            (false, true, Some(location)) => {
                query.members.insert(id.to_string());
                query.emit(GeoEvent::Entered(snapshot.clone(), location));
            }
            (true, false, _) => {
                query.members.remove(id);
                query.emit(GeoEvent::Exited(snapshot.clone()));
            }
            (true, true, Some(location)) if old_location != Some(location) => {
                query.emit(GeoEvent::Moved(snapshot.clone(), location));
            }
            (true, true, Some(location)) => {
                query.emit(GeoEvent::Changed(snapshot.clone(), location));
            }
            _ => {}
        }
    }
    Ok(())
}

fn with_index_fields(
    id: &str,
    mut data: Value,
    entry: Option<&GeoIndexEntry>,
) -> Result<Value, StoreError> {
    let fields = data.as_object_mut().ok_or_else(|| {
        StoreError::Serialization(format!("document {id} is not a JSON object"))
    })?;
    match entry {
        Some(entry) => {
            fields.insert(GEOHASH_FIELD.to_string(), json!(entry.geohash));
            fields.insert(
                LOCATION_FIELD.to_string(),
                json!([entry.location.latitude, entry.location.longitude]),
            );
        }
        None => {
            fields.remove(GEOHASH_FIELD);
            fields.remove(LOCATION_FIELD);
        }
    }
    Ok(data)
}

fn scan(
    state: &StoreState,
    ranges: &[GeohashRange],
    center: Coordinate,
    radius_km: f64,
) -> Vec<(DocumentSnapshot, Coordinate)> {
    let mut hits = BTreeMap::new();
    for range in ranges {
        let lower = (range.start.clone(), String::new());
        let upper = (range.end.clone(), String::new());
        for (_, id) in state.index.range(lower..upper) {
            let Some(doc) = state.documents.get(id) else {
                continue;
            };
            let Some(entry) = &doc.entry else {
                continue;
            };
            if haversine_km(center, entry.location) <= radius_km {
                hits.insert(
                    id.clone(),
                    (DocumentSnapshot::new(id.clone(), doc.data.clone()), entry.location),
                );
            }
        }
    }
    hits.into_values().collect()
}

impl GeoIndex for MemoryStore {
    fn attach(
        &self,
        center: Coordinate,
        radius_km: f64,
        listener: Arc<dyn GeoQueryListener>,
    ) -> Result<ListenerId, StoreError> {
        if !center.is_valid() {
            return Err(StoreError::InvalidQuery(format!(
                "center ({}, {}) is out of range",
                center.latitude, center.longitude
            )));
        }
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(StoreError::InvalidQuery(format!(
                "radius must be positive, got {radius_km}"
            )));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            StoreError::Unavailable("no async runtime to deliver query events".to_string())
        })?;
        let ranges = geo::query_ranges(center, radius_km, self.precision);

        let (events, mut inbox) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.lock();
            let hits = scan(&state, &ranges, center, radius_km);
            let mut members = HashSet::with_capacity(hits.len());
            for (snapshot, location) in hits {
                members.insert(snapshot.id.clone());
                let _ = events.send(GeoEvent::Entered(snapshot, location));
            }
            let _ = events.send(GeoEvent::Ready);

            let id = state.next_listener;
            state.next_listener += 1;
            state.queries.insert(
                id,
                ActiveQuery {
                    center,
                    radius_km,
                    members,
                    events,
                },
            );
            id
        };
        debug!(listener = id, ranges = ranges.len(), radius_km, "attached geo query");

        runtime.spawn(async move {
            while let Some(event) = inbox.recv().await {
                event.deliver(listener.as_ref());
            }
        });
        Ok(id)
    }

    fn detach(&self, id: ListenerId) {
        if self.lock().queries.remove(&id).is_some() {
            debug!(listener = id, "detached geo query");
        }
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn save_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        listing.validate()?;
        let data = serde_json::to_value(listing)?;
        let entry = self.entry_for(&listing.id, listing.location)?;
        let mut state = self.lock();
        apply_write(&mut state, &listing.id, data, entry)?;
        debug!(id = %listing.id, indexed = listing.location.is_some(), "saved listing");
        Ok(())
    }

    async fn get_listing(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        let state = self.lock();
        match state.documents.get(id) {
            Some(doc) => Ok(Some(
                DocumentSnapshot::new(id, doc.data.clone()).to_listing()?,
            )),
            None => Ok(None),
        }
    }

    async fn delete_listing(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let doc = state
            .documents
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(entry) = &doc.entry {
            state.index.remove(&(entry.geohash.clone(), id.to_string()));
        }
        let snapshot = DocumentSnapshot::new(id, doc.data);
        for query in state.queries.values_mut() {
            if query.members.remove(id) {
                query.emit(GeoEvent::Exited(snapshot.clone()));
            }
        }
        info!(id, "deleted listing");
        Ok(())
    }

    async fn set_location(&self, id: &str, location: Coordinate) -> Result<(), StoreError> {
        let entry = self.entry_for(id, Some(location))?;
        let mut state = self.lock();
        let mut data = Self::document_data(&state, id)?;
        if let Some(fields) = data.as_object_mut() {
            fields.insert("location".to_string(), serde_json::to_value(location)?);
        }
        apply_write(&mut state, id, data, entry)
    }

    async fn remove_location(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut data = Self::document_data(&state, id)?;
        if let Some(fields) = data.as_object_mut() {
            fields.insert("location".to_string(), Value::Null);
        }
        apply_write(&mut state, id, data, None)
    }
}
