//! One-shot radius query over a live [`GeoIndex`] subscription.
//!
//! The index streams enter/change/move/exit events and a final "ready".
//! [`fetch_nearby`] folds them into a map and resolves exactly once.

use crate::models::Coordinate;
use crate::search::SearchError;
use crate::store::{DocumentSnapshot, GeoIndex, GeoQueryListener, ListenerId, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

type Completion = oneshot::Sender<Result<Vec<DocumentSnapshot>, StoreError>>;

/// Lifecycle of a single query. Only `Collecting` accepts transitions.
#[derive(Debug)]
enum QueryState {
    Collecting(BTreeMap<String, DocumentSnapshot>),
    Resolved,
    Cancelled,
    Failed,
}

/// Listener that accumulates snapshots until the index reports ready
struct Collector {
    state: Mutex<QueryState>,
    completion: Mutex<Option<Completion>>,
}

impl Collector {
    fn new(completion: Completion) -> Self {
        Self {
            state: Mutex::new(QueryState::Collecting(BTreeMap::new())),
            completion: Mutex::new(Some(completion)),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn upsert(&self, snapshot: DocumentSnapshot) {
        match &mut *self.lock_state() {
            QueryState::Collecting(results) => {
                results.insert(snapshot.id.clone(), snapshot);
            }
            done => debug!(id = %snapshot.id, state = ?done, "ignoring late update"),
        }
    }

    fn remove(&self, id: &str) {
        if let QueryState::Collecting(results) = &mut *self.lock_state() {
            results.remove(id);
        }
    }

    /// Move out of `Collecting`, handing the result to the waiting caller.
    /// Later calls are no-ops.
    fn finish(&self, failure: Option<StoreError>) {
        let outcome = {
            let mut state = self.lock_state();
            let results = match &mut *state {
                QueryState::Collecting(results) => std::mem::take(results),
                done => {
                    debug!(state = ?done, "query already finished");
                    return;
                }
            };
            match failure {
                None => {
                    *state = QueryState::Resolved;
                    Ok(results.into_values().collect())
                }
                Some(error) => {
                    *state = QueryState::Failed;
                    Err(error)
                }
            }
        };

        let completion = self
            .completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(completion) = completion {
            // The caller may already be gone
            let _ = completion.send(outcome);
        }
    }

    fn cancel(&self) {
        let mut state = self.lock_state();
        if matches!(*state, QueryState::Collecting(_)) {
            *state = QueryState::Cancelled;
            self.completion
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }
}

impl GeoQueryListener for Collector {
    fn on_document_entered(&self, snapshot: DocumentSnapshot, _location: Coordinate) {
        self.upsert(snapshot);
    }

    fn on_document_changed(&self, snapshot: DocumentSnapshot, _location: Coordinate) {
        self.upsert(snapshot);
    }

    fn on_document_moved(&self, snapshot: DocumentSnapshot, _location: Coordinate) {
        self.upsert(snapshot);
    }

    fn on_document_exited(&self, snapshot: DocumentSnapshot) {
        self.remove(&snapshot.id);
    }

    fn on_ready(&self) {
        self.finish(None);
    }

    fn on_error(&self, error: StoreError) {
        self.finish(Some(error));
    }
}

/// Keeps the listener attached for as long as the caller waits
struct Registration {
    index: Arc<dyn GeoIndex>,
    id: ListenerId,
    collector: Arc<Collector>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.collector.cancel();
        self.index.detach(self.id);
    }
}

/// Fetch every document within `radius_km` of `center`.
///
/// Resolves with the region's contents once the index reports ready. Any error
/// before that fails the whole query. Dropping the returned future detaches
/// the listener.
pub async fn fetch_nearby(
    index: Arc<dyn GeoIndex>,
    center: Coordinate,
    radius_km: f64,
) -> Result<Vec<DocumentSnapshot>, SearchError> {
    let (completion, outcome) = oneshot::channel();
    let collector = Arc::new(Collector::new(completion));

    let id = index
        .attach(center, radius_km, collector.clone())
        .map_err(SearchError::QueryFailed)?;
    let _registration = Registration {
        index,
        id,
        collector,
    };

    match outcome.await {
        Ok(Ok(documents)) => Ok(documents),
        Ok(Err(error)) => Err(SearchError::QueryFailed(error)),
        Err(_) => Err(SearchError::Aborted),
    }
}
