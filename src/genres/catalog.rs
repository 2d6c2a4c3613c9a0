use crate::models::Genre;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default time between catalog refreshes
pub const DEFAULT_REFRESH_DAYS: i64 = 15;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog source error: {0}")]
    Source(String),
    #[error("remote catalog is empty")]
    Empty,
}

/// Remote source of catalog genres
#[async_trait]
pub trait GenreCatalogSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Genre>, CatalogError>;

    /// When the remote catalog last changed, if known
    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, CatalogError>;

    fn source_name(&self) -> &'static str;
}

/// The initial catalog every install starts from
pub fn seed_catalog(now: DateTime<Utc>) -> Vec<Genre> {
    let entries: [(&str, &str, &[&str], &str); 15] = [
        ("fiction", "Fiction", &["Novel", "Novels"], "#5C6BC0"),
        ("non-fiction", "Non-Fiction", &["Nonfiction", "Non Fiction"], "#8D6E63"),
        ("sci-fi", "Science Fiction", &["Sci-Fi", "SciFi", "SF"], "#26A69A"),
        ("fantasy", "Fantasy", &["Epic Fantasy", "High Fantasy"], "#AB47BC"),
        ("mystery", "Mystery", &["Crime", "Detective"], "#455A64"),
        ("thriller", "Thriller", &["Suspense"], "#E53935"),
        ("romance", "Romance", &["Love Story"], "#EC407A"),
        ("horror", "Horror", &["Ghost Story"], "#212121"),
        ("biography", "Biography", &["Memoir", "Autobiography"], "#FFA726"),
        ("history", "History", &["Historical"], "#6D4C41"),
        ("young-adult", "Young Adult", &["YA", "Teen"], "#29B6F6"),
        ("children", "Children's", &["Kids", "Picture Book"], "#FFEE58"),
        ("poetry", "Poetry", &["Verse", "Poems"], "#7E57C2"),
        ("classics", "Classics", &["Classic"], "#9E9D24"),
        ("self-help", "Self-Help", &["Self Improvement", "Personal Development"], "#66BB6A"),
    ];

    entries
        .iter()
        .enumerate()
        .map(|(i, (id, name, variations, color))| Genre {
            id: id.to_string(),
            name: name.to_string(),
            variations: variations.iter().map(|v| v.to_string()).collect(),
            color: color.to_string(),
            sort_order: i as u32,
            last_updated: now,
        })
        .collect()
}

/// Serves a fixed genre list
pub struct StaticCatalog {
    genres: Vec<Genre>,
    updated_at: DateTime<Utc>,
}

impl StaticCatalog {
    pub fn new(genres: Vec<Genre>, updated_at: DateTime<Utc>) -> Self {
        Self { genres, updated_at }
    }

    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self::new(seed_catalog(now), now)
    }
}

#[async_trait]
impl GenreCatalogSource for StaticCatalog {
    async fn fetch_all(&self) -> Result<Vec<Genre>, CatalogError> {
        Ok(self.genres.clone())
    }

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, CatalogError> {
        Ok(Some(self.updated_at))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Deserialize)]
struct CatalogMeta {
    last_updated: Option<DateTime<Utc>>,
}

/// Genre catalog served as JSON over HTTP.
///
/// Reads `{base}/genres` (a list of genres) and `{base}/genres/meta`
/// (`{"last_updated": ...}`).
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("taleweaver/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching URL: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!("Catalog returned status: {}", response.status());
            return Err(CatalogError::Source(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenreCatalogSource for HttpCatalog {
    async fn fetch_all(&self) -> Result<Vec<Genre>, CatalogError> {
        self.get_json("/genres").await
    }

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, CatalogError> {
        let meta: CatalogMeta = self.get_json("/genres/meta").await?;
        Ok(meta.last_updated)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// True when a cache synced at `last_synced` is due for a refresh at `now`
pub fn is_stale(last_synced: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last_synced {
        None => true,
        Some(synced) => now - synced >= interval,
    }
}

#[derive(Debug)]
struct CacheState {
    genres: Vec<Genre>,
    last_synced: Option<DateTime<Utc>>,
}

/// Local copy of the genre catalog.
///
/// Starts from the seed list and is replaced wholesale by [`sync_catalog`].
/// Readers get a snapshot and may see stale data between refreshes.
#[derive(Debug)]
pub struct GenreCache {
    state: RwLock<CacheState>,
    refresh_interval: Duration,
}

static GLOBAL_CACHE: OnceCell<Arc<GenreCache>> = OnceCell::new();

impl GenreCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                genres: seed_catalog(Utc::now()),
                last_synced: None,
            }),
            refresh_interval,
        }
    }

    /// The process-wide cache. `refresh_interval` only applies to the first call.
    pub fn global(refresh_interval: Duration) -> Arc<GenreCache> {
        GLOBAL_CACHE
            .get_or_init(|| Arc::new(GenreCache::new(refresh_interval)))
            .clone()
    }

    /// Current genres ordered by `sort_order`
    pub fn genres(&self) -> Vec<Genre> {
        let mut genres = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .genres
            .clone();
        genres.sort_by_key(|g| g.sort_order);
        genres
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_synced
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        is_stale(self.last_synced(), now, self.refresh_interval)
    }

    pub fn replace(&self, genres: Vec<Genre>, synced_at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.genres = genres;
        state.last_synced = Some(synced_at);
    }
}

/// Outcome of a scheduled sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cache was fresh and the remote had nothing newer
    UpToDate,
    Refreshed { genres: usize },
}

/// Refresh `cache` from `source` if it is stale or the remote changed since
/// the last sync. On failure the cache keeps its previous contents.
pub async fn sync_catalog(
    cache: &GenreCache,
    source: &dyn GenreCatalogSource,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, CatalogError> {
    if !cache.needs_refresh(now) {
        let remote_changed = match (source.last_updated().await?, cache.last_synced()) {
            (Some(remote), Some(local)) => remote > local,
            _ => false,
        };
        if !remote_changed {
            debug!(source = source.source_name(), "genre catalog up to date");
            return Ok(SyncOutcome::UpToDate);
        }
    }

    let genres = source.fetch_all().await?;
    if genres.is_empty() {
        warn!(source = source.source_name(), "remote genre catalog is empty, keeping cache");
        return Err(CatalogError::Empty);
    }

    let count = genres.len();
    cache.replace(genres, now);
    info!(source = source.source_name(), genres = count, "🔄 refreshed genre catalog");
    Ok(SyncOutcome::Refreshed { genres: count })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCatalog;

    #[async_trait]
    impl GenreCatalogSource for FailingCatalog {
        async fn fetch_all(&self) -> Result<Vec<Genre>, CatalogError> {
            Err(CatalogError::Source("offline".into()))
        }

        async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, CatalogError> {
            Err(CatalogError::Source("offline".into()))
        }

        fn source_name(&self) -> &'static str {
            "failing"
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn staleness_uses_the_interval() {
        let interval = Duration::days(15);
        assert!(is_stale(None, now(), interval));
        assert!(!is_stale(Some(now() - Duration::days(14)), now(), interval));
        assert!(is_stale(Some(now() - Duration::days(15)), now(), interval));
    }

    #[test]
    fn seed_catalog_is_ordered_and_unique() {
        let seed = seed_catalog(now());
        for (i, genre) in seed.iter().enumerate() {
            assert_eq!(genre.sort_order, i as u32);
        }
        let mut ids: Vec<_> = seed.iter().map(|g| g.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), seed.len());
    }

    #[test]
    fn global_cache_is_shared() {
        let first = GenreCache::global(Duration::days(DEFAULT_REFRESH_DAYS));
        let second = GenreCache::global(Duration::days(1));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.refresh_interval(), Duration::days(DEFAULT_REFRESH_DAYS));
    }

    #[tokio::test]
    async fn first_sync_replaces_the_seed() {
        let cache = GenreCache::new(Duration::days(15));
        assert!(cache.needs_refresh(now()));

        let mut genres = seed_catalog(now());
        genres.truncate(3);
        let source = StaticCatalog::new(genres, now());

        let outcome = sync_catalog(&cache, &source, now()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Refreshed { genres: 3 });
        assert_eq!(cache.genres().len(), 3);
        assert!(!cache.needs_refresh(now() + Duration::days(1)));
    }

    #[tokio::test]
    async fn fresh_cache_skips_unchanged_remote() {
        let cache = GenreCache::new(Duration::days(15));
        cache.replace(seed_catalog(now()), now());

        let source = StaticCatalog::new(Vec::new(), now() - Duration::days(3));
        let outcome = sync_catalog(&cache, &source, now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::UpToDate);
    }

    #[tokio::test]
    async fn newer_remote_forces_refresh() {
        let cache = GenreCache::new(Duration::days(15));
        cache.replace(seed_catalog(now()), now());

        let mut genres = seed_catalog(now());
        genres.truncate(1);
        let source = StaticCatalog::new(genres, now() + Duration::hours(1));
        let outcome = sync_catalog(&cache, &source, now() + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Refreshed { genres: 1 });
    }

    #[tokio::test]
    async fn failed_sync_keeps_previous_genres() {
        let cache = GenreCache::new(Duration::days(15));
        let before = cache.genres();

        assert!(sync_catalog(&cache, &FailingCatalog, now()).await.is_err());
        assert_eq!(cache.genres(), before);
        assert!(cache.needs_refresh(now()));
    }

    #[tokio::test]
    async fn empty_remote_is_rejected() {
        let cache = GenreCache::new(Duration::days(15));
        let source = StaticCatalog::new(Vec::new(), now());
        assert!(matches!(
            sync_catalog(&cache, &source, now()).await,
            Err(CatalogError::Empty)
        ));
    }
}
