use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use taleweaver::cart::{check_cart, CartItem, MemoryCartStore};
use taleweaver::genres::{
    rank_genres, remaining_genres, sync_catalog, top_genres, GenreCache, GenreCatalogSource,
    GenreMatcher, HttpCatalog, StaticCatalog,
};
use taleweaver::models::{BookCondition, ListingStatus};
use taleweaver::store::{ListingStore, MemoryStore};
use taleweaver::{Config, Coordinate, GenreTag, Listing, ListingSearch, SearchRequest, SearchState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Nearby used-book search over a demo inventory
#[derive(Debug, Parser)]
#[command(name = "taleweaver", version)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Find listings near a coordinate
    Search {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in kilometres (defaults to TALEWEAVER_RADIUS_KM or 50)
        #[arg(short, long)]
        radius_km: Option<f64>,
        /// Text matched against title, author and description
        #[arg(short, long, default_value = "")]
        query: String,
        /// Catalog genre id to filter on, repeatable
        #[arg(short, long = "genre")]
        genres: Vec<String>,
        /// Write results as JSON to this file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Rank catalog genres by how many listings carry them
    Genres {
        #[arg(short, long, default_value_t = 5)]
        top: usize,
    },
    /// Run the abandoned-cart check for a demo cart
    CartReminder {
        #[arg(short, long, default_value = "demo_user")]
        user: String,
    },
}

#[derive(Serialize)]
struct SearchHit<'a> {
    distance_km: Option<f64>,
    listing: &'a Listing,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env()?;

    info!("📚 TaleWeaver - nearby used books");

    let cache = GenreCache::global(config.catalog_refresh_interval());
    refresh_catalog(&cache, &config).await;

    let store = Arc::new(MemoryStore::new(config.geohash_precision));
    for listing in demo_listings() {
        store
            .save_listing(&listing)
            .await
            .with_context(|| format!("Failed to store demo listing {}", listing.id))?;
    }

    match args.command {
        Commands::Search {
            lat,
            lon,
            radius_km,
            query,
            genres,
            output,
        } => {
            let request = SearchRequest::new(
                Coordinate::new(lat, lon),
                radius_km.unwrap_or(config.default_radius_km),
            )
            .with_query(query)
            .with_genres(genres);

            let search = ListingSearch::new(
                store.clone(),
                cache.clone(),
                GenreMatcher::new(config.genre_min_match_len),
            );
            let result = search.search(&request).await;

            match SearchState::from_result(result) {
                SearchState::Results(listings) => {
                    print_listings(&listings);
                    if let Some(path) = output {
                        save_results(&path, &listings).await?;
                    }
                }
                SearchState::NoneNearby => println!("No listings found nearby."),
                SearchState::Failed { message, retryable } => {
                    if retryable {
                        println!("Search failed: {message}. Please try again.");
                    } else {
                        anyhow::bail!("Search failed: {message}");
                    }
                }
            }
        }
        Commands::Genres { top } => {
            let catalog = cache.genres();
            let matcher = GenreMatcher::new(config.genre_min_match_len);
            let ranked = rank_genres(&demo_listings(), &catalog, &matcher);

            for entry in top_genres(&ranked, top) {
                println!("{:<20} {:>3}  {}", entry.genre.name, entry.count, entry.genre.color);
            }
            let rest: Vec<&str> = remaining_genres(&ranked, top)
                .iter()
                .map(|entry| entry.genre.name.as_str())
                .collect();
            if !rest.is_empty() {
                println!("More: {}", rest.join(", "));
            }
        }
        Commands::CartReminder { user } => {
            let carts = MemoryCartStore::default();
            for listing in demo_listings().into_iter().take(2) {
                carts.add_item(
                    &user,
                    CartItem {
                        listing_id: listing.id,
                        title: listing.title,
                        price: listing.price,
                        added_at: Utc::now() - Duration::hours(36),
                    },
                );
            }

            match check_cart(&carts, &user, Utc::now(), config.cart_reminder_threshold()).await? {
                Some(reminder) => println!(
                    "🛒 {} still has {} books ({:.2} SEK) waiting since {}",
                    user,
                    reminder.item_count,
                    reminder.total,
                    reminder.oldest_added_at.format("%Y-%m-%d %H:%M")
                ),
                None => println!("No cart reminder due for {user}"),
            }
        }
    }

    Ok(())
}

/// A failed refresh keeps whatever the cache already holds
async fn refresh_catalog(cache: &GenreCache, config: &Config) {
    let source: Box<dyn GenreCatalogSource> = match &config.catalog_url {
        Some(url) => match HttpCatalog::new(url.as_str()) {
            Ok(catalog) => Box::new(catalog),
            Err(e) => {
                warn!("Could not create catalog client: {}", e);
                return;
            }
        },
        None => Box::new(StaticCatalog::seeded(Utc::now())),
    };

    if let Err(e) = sync_catalog(cache, source.as_ref(), Utc::now()).await {
        warn!("Genre catalog sync failed, using cached genres: {}", e);
    }
}

fn print_listings(listings: &[Listing]) {
    info!("\n✅ Found {} listings\n", listings.len());

    for (i, listing) in listings.iter().enumerate() {
        let currency = listing.currency.as_deref().unwrap_or("SEK");
        println!("{}. {} by {} ({:.2} {})", i + 1, listing.title, listing.author, listing.price, currency);
        if let Some(distance) = listing.distance_km {
            println!("   {:.1} km away", distance);
        }
        if !listing.genres.is_empty() {
            let genres: Vec<&str> = listing.genres.iter().map(|g| g.display_name()).collect();
            println!("   Genres: {}", genres.join(", "));
        }
        println!("   Seller: {} ({:.1}★)", listing.seller_username, listing.seller_rating);
        println!("   ID: {}", listing.id);
        println!();
    }
}

async fn save_results(path: &str, listings: &[Listing]) -> Result<()> {
    let hits: Vec<SearchHit> = listings
        .iter()
        .map(|listing| SearchHit {
            distance_km: listing.distance_km,
            listing,
        })
        .collect();
    let json = serde_json::to_string_pretty(&hits)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {path}"))?;
    info!("💾 Saved {} results to {}", hits.len(), path);
    Ok(())
}

/// Demo inventory around Stockholm
fn demo_listings() -> Vec<Listing> {
    let now = Utc::now();
    let book = |id: &str,
                title: &str,
                author: &str,
                genres: &[GenreTag],
                price: f64,
                condition: BookCondition,
                location: Option<(f64, f64)>,
                days_old: i64| Listing {
        id: id.to_string(),
        seller_id: format!("seller_{}", id.len() % 3),
        seller_username: ["antikvariat_sofo", "bokmal", "pagesandcoffee"][id.len() % 3].to_string(),
        seller_rating: 4.0 + (id.len() % 10) as f32 / 10.0,
        title: title.to_string(),
        author: author.to_string(),
        isbn: String::new(),
        genres: genres.to_vec(),
        description: format!("{title} by {author}. Pick up in person or ask about shipping."),
        price,
        original_price: None,
        currency: Some("SEK".to_string()),
        condition,
        shipping_offered: id.len() % 2 == 0,
        location: location.map(|(lat, lon)| Coordinate::new(lat, lon)),
        created_at: now - Duration::days(days_old),
        status: ListingStatus::Available,
        distance_km: None,
    };

    vec![
        book("tw_dune", "Dune", "Frank Herbert", &[GenreTag::SciFi], 89.0, BookCondition::Good, Some((59.3145, 18.0736)), 3),
        book("tw_left_hand", "The Left Hand of Darkness", "Ursula K. Le Guin", &[GenreTag::SciFi, GenreTag::Classics], 120.0, BookCondition::VeryGood, Some((59.3178, 18.0548)), 10),
        book("tw_hobbit", "The Hobbit", "J.R.R. Tolkien", &[GenreTag::Fantasy, GenreTag::Children], 75.0, BookCondition::Used, Some((59.3326, 18.0649)), 1),
        book("tw_millennium", "The Girl with the Dragon Tattoo", "Stieg Larsson", &[GenreTag::Thriller, GenreTag::Mystery], 49.0, BookCondition::Acceptable, Some((59.3422, 18.0493)), 21),
        book("tw_pippi", "Pippi Longstocking", "Astrid Lindgren", &[GenreTag::Children, GenreTag::Classics], 59.0, BookCondition::LikeNew, Some((59.2986, 18.0799)), 5),
        book("tw_sapiens", "Sapiens", "Yuval Noah Harari", &[GenreTag::History, GenreTag::NonFiction], 110.0, BookCondition::Good, Some((59.8586, 17.6389)), 7),
        book("tw_gothenburg", "Doctor Glas", "Hjalmar Söderberg", &[GenreTag::LiteraryFiction, GenreTag::Classics], 65.0, BookCondition::Used, Some((57.7089, 11.9746)), 30),
        book("tw_pickup_only", "Tomas Tranströmer: Selected Poems", "Tomas Tranströmer", &[GenreTag::Poetry], 95.0, BookCondition::VeryGood, None, 2),
    ]
}
