use crate::geo::haversine_km;
use crate::models::{Coordinate, Listing};
use crate::store::DocumentSnapshot;
use std::cmp::Ordering;
use tracing::warn;

/// Deserialize snapshots into listings, dropping any that do not parse
pub fn parse_snapshots(snapshots: Vec<DocumentSnapshot>) -> Vec<Listing> {
    snapshots
        .into_iter()
        .filter_map(|snapshot| match snapshot.to_listing() {
            Ok(listing) => Some(listing),
            Err(error) => {
                warn!(id = %snapshot.id, %error, "skipping unparseable listing");
                None
            }
        })
        .collect()
}

/// Set `distance_km` from `origin` on every listing that has a coordinate
pub fn annotate_distances(listings: &mut [Listing], origin: Coordinate) {
    for listing in listings {
        listing.distance_km = listing.location.map(|loc| haversine_km(origin, loc));
    }
}

fn text_contains(listing: &Listing, needle: &str) -> bool {
    [&listing.title, &listing.author, &listing.description]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Ascending by distance; listings without one go last. Stable.
pub fn by_distance(a: &Listing, b: &Listing) -> Ordering {
    match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keep listings whose title, author or description contains `query`
/// (case-insensitive; blank matches all), nearest first.
/// Surrounding whitespace in a non-blank query is part of the match.
pub fn filter_and_sort(mut listings: Vec<Listing>, query: &str) -> Vec<Listing> {
    if !query.trim().is_empty() {
        let needle = query.to_lowercase();
        listings.retain(|listing| text_contains(listing, &needle));
    }
    listings.sort_by(by_distance);
    listings
}
