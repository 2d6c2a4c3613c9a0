//! Search pipeline tests.
//!
//! Scripted index doubles drive the single-resolution and cancellation
//! behaviour of `fetch_nearby`; the in-memory store covers the full pipeline.

#[cfg(test)]
mod tests {
    use crate::genres::{GenreCache, GenreMatcher};
    use crate::models::fixtures::listing;
    use crate::models::{Coordinate, GenreTag, Listing};
    use crate::search::{fetch_nearby, ListingSearch, SearchError, SearchRequest, SearchState};
    use crate::store::{
        DocumentSnapshot, GeoIndex, GeoQueryListener, ListenerId, ListingStore, MemoryStore,
        StoreError,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const ORIGIN: Coordinate = Coordinate {
        latitude: 59.3293,
        longitude: 18.0686,
    };

    type Script = Box<dyn Fn(&dyn GeoQueryListener) + Send + Sync>;

    /// Index double that replays a script on attach and counts registrations
    struct ScriptedIndex {
        script: Script,
        attach_error: Option<StoreError>,
        attached: AtomicUsize,
        detached: AtomicUsize,
        listener: Mutex<Option<Arc<dyn GeoQueryListener>>>,
    }

    impl ScriptedIndex {
        fn new(script: impl Fn(&dyn GeoQueryListener) + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
                attach_error: None,
                attached: AtomicUsize::new(0),
                detached: AtomicUsize::new(0),
                listener: Mutex::new(None),
            })
        }

        fn failing(error: StoreError) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(|_| {}),
                attach_error: Some(error),
                attached: AtomicUsize::new(0),
                detached: AtomicUsize::new(0),
                listener: Mutex::new(None),
            })
        }

        fn listener(&self) -> Arc<dyn GeoQueryListener> {
            self.listener.lock().unwrap().clone().unwrap()
        }

        fn attached(&self) -> usize {
            self.attached.load(Ordering::SeqCst)
        }

        fn detached(&self) -> usize {
            self.detached.load(Ordering::SeqCst)
        }
    }

    impl GeoIndex for ScriptedIndex {
        fn attach(
            &self,
            _center: Coordinate,
            _radius_km: f64,
            listener: Arc<dyn GeoQueryListener>,
        ) -> Result<ListenerId, StoreError> {
            if let Some(error) = &self.attach_error {
                return Err(error.clone());
            }
            self.attached.fetch_add(1, Ordering::SeqCst);
            *self.listener.lock().unwrap() = Some(listener.clone());
            (self.script)(listener.as_ref());
            Ok(7)
        }

        fn detach(&self, id: ListenerId) {
            assert_eq!(id, 7);
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn doc(id: &str, version: u32) -> DocumentSnapshot {
        DocumentSnapshot::new(id, json!({ "version": version }))
    }

    fn ids(docs: &[DocumentSnapshot]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    // ============================================================
    // SINGLE RESOLUTION
    // ============================================================

    #[tokio::test]
    async fn resolves_with_latest_snapshot_per_document() {
        let index = ScriptedIndex::new(|l| {
            l.on_document_entered(doc("a", 1), ORIGIN);
            l.on_document_entered(doc("b", 1), ORIGIN);
            l.on_document_changed(doc("a", 2), ORIGIN);
            l.on_document_entered(doc("c", 1), ORIGIN);
            l.on_document_exited(doc("b", 1));
            l.on_document_moved(doc("c", 3), ORIGIN);
            l.on_ready();
        });

        let docs = fetch_nearby(index.clone(), ORIGIN, 5.0).await.unwrap();
        assert_eq!(ids(&docs), vec!["a", "c"]);
        assert_eq!(docs[0].data["version"], 2);
        assert_eq!(docs[1].data["version"], 3);

        assert_eq!(index.attached(), 1);
        assert_eq!(index.detached(), 1);
    }

    #[tokio::test]
    async fn duplicate_ready_and_late_error_are_ignored() {
        let index = ScriptedIndex::new(|l| {
            l.on_document_entered(doc("a", 1), ORIGIN);
            l.on_ready();
            l.on_ready();
            l.on_error(StoreError::Unavailable("late".into()));
            l.on_document_entered(doc("b", 1), ORIGIN);
        });

        let docs = fetch_nearby(index.clone(), ORIGIN, 5.0).await.unwrap();
        assert_eq!(ids(&docs), vec!["a"]);
        assert_eq!(index.detached(), 1);
    }

    #[tokio::test]
    async fn error_before_ready_discards_partial_results() {
        let index = ScriptedIndex::new(|l| {
            l.on_document_entered(doc("a", 1), ORIGIN);
            l.on_error(StoreError::PermissionDenied("listings".into()));
            l.on_ready();
        });

        let err = fetch_nearby(index.clone(), ORIGIN, 5.0).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::QueryFailed(StoreError::PermissionDenied(_))
        ));
        assert!(!err.is_retryable());
        assert_eq!(index.detached(), 1);
    }

    #[tokio::test]
    async fn attach_failure_is_a_query_failure() {
        let index = ScriptedIndex::failing(StoreError::Unavailable("offline".into()));

        let err = fetch_nearby(index.clone(), ORIGIN, 5.0).await.unwrap_err();
        assert!(matches!(err, SearchError::QueryFailed(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(index.attached(), 0);
        assert_eq!(index.detached(), 0);
    }

    // ============================================================
    // CANCELLATION
    // ============================================================

    #[tokio::test]
    async fn abandoning_before_ready_detaches_the_listener() {
        let index = ScriptedIndex::new(|l| {
            l.on_document_entered(doc("a", 1), ORIGIN);
        });

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            fetch_nearby(index.clone(), ORIGIN, 5.0),
        )
        .await;
        assert!(outcome.is_err(), "query should still be waiting for ready");

        assert_eq!(index.attached(), 1);
        assert_eq!(index.detached(), 1);

        // A straggling ready after cancellation goes nowhere
        let listener = index.listener();
        listener.on_ready();
        listener.on_error(StoreError::Unavailable("late".into()));
    }

    #[tokio::test]
    async fn abandoning_a_memory_store_query_leaves_no_listener() {
        let store = Arc::new(MemoryStore::default());
        let search = fetch_nearby(store.clone(), ORIGIN, 5.0);
        drop(search);
        assert_eq!(store.active_listeners(), 0);

        // Started, then dropped mid-flight
        let handle = tokio::spawn({
            let store = store.clone();
            async move { fetch_nearby(store, ORIGIN, 5.0).await }
        });
        handle.abort();
        let _ = handle.await;
        assert_eq!(store.active_listeners(), 0);
    }

    // ============================================================
    // FULL PIPELINE
    // ============================================================

    fn located(id: &str, title: &str, author: &str, location: Coordinate) -> Listing {
        let mut l = listing(id, title, author, "");
        l.location = Some(location);
        l
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        let mut dune = located("dune", "Dune", "Frank Herbert", Coordinate::new(59.3300, 18.0700));
        dune.genres = vec![GenreTag::SciFi];
        let mut hobbit = located(
            "hobbit",
            "The Hobbit",
            "J.R.R. Tolkien",
            Coordinate::new(59.3400, 18.0500),
        );
        hobbit.genres = vec![GenreTag::Fantasy];
        let mut herbs = located(
            "herbs",
            "Herbs for Every Kitchen",
            "Various",
            Coordinate::new(59.3000, 18.1000),
        );
        herbs.genres = vec![GenreTag::Cooking];
        let far = located("far", "Dune Messiah", "Frank Herbert", Coordinate::new(57.7089, 11.9746));
        let nowhere = listing("nowhere", "Children of Dune", "Frank Herbert", "");

        for l in [&dune, &hobbit, &herbs, &far, &nowhere] {
            store.save_listing(l).await.unwrap();
        }
        // Indexed but not a listing
        store
            .put_document("junk", json!({ "title": 5 }), Some(Coordinate::new(59.33, 18.07)))
            .unwrap();
        store
    }

    fn searcher(store: Arc<MemoryStore>) -> ListingSearch {
        ListingSearch::new(
            store,
            Arc::new(GenreCache::new(chrono::Duration::days(15))),
            GenreMatcher::default(),
        )
    }

    #[tokio::test]
    async fn finds_nearby_listings_nearest_first() {
        let store = seeded_store().await;
        let search = searcher(store.clone());

        let results = search
            .search(&SearchRequest::new(ORIGIN, 10.0))
            .await
            .unwrap();
        let found: Vec<&str> = results.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(found, vec!["dune", "hobbit", "herbs"]);

        let distances: Vec<f64> = results.iter().map(|l| l.distance_km.unwrap()).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(store.active_listeners(), 0);
    }

    #[tokio::test]
    async fn finds_listings_on_the_far_side_of_the_pole() {
        let store = Arc::new(MemoryStore::default());
        let polar = located("polar", "Polar Tales", "Anon", Coordinate::new(86.0, -20.0));
        store.save_listing(&polar).await.unwrap();

        let docs = fetch_nearby(store.clone(), Coordinate::new(85.0, 10.0), 800.0)
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["polar"]);
        assert_eq!(store.active_listeners(), 0);
    }

    #[tokio::test]
    async fn text_query_narrows_results() {
        let search = searcher(seeded_store().await);

        let results = search
            .search(&SearchRequest::new(ORIGIN, 10.0).with_query("herb"))
            .await
            .unwrap();
        let found: Vec<&str> = results.iter().map(|l| l.id.as_str()).collect();
        // "Frank Herbert" by author, "Herbs for Every Kitchen" by title
        assert_eq!(found, vec!["dune", "herbs"]);
    }

    #[tokio::test]
    async fn genre_selection_narrows_results() {
        let search = searcher(seeded_store().await);

        let results = search
            .search(&SearchRequest::new(ORIGIN, 10.0).with_genres(["fantasy"]))
            .await
            .unwrap();
        let found: Vec<&str> = results.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(found, vec!["hobbit"]);
    }

    #[tokio::test]
    async fn empty_results_are_not_an_error() {
        let search = searcher(seeded_store().await);

        let result = search
            .search(&SearchRequest::new(ORIGIN, 10.0).with_query("necronomicon"))
            .await;
        assert!(matches!(SearchState::from_result(result), SearchState::NoneNearby));
    }

    #[tokio::test]
    async fn invalid_radius_fails_without_retry() {
        let search = searcher(seeded_store().await);

        let result = search.search(&SearchRequest::new(ORIGIN, -1.0)).await;
        match SearchState::from_result(result) {
            SearchState::Failed { retryable, .. } => assert!(!retryable),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
