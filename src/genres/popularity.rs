use crate::genres::GenreMatcher;
use crate::models::{Genre, GenreTag, GenreWithCount, Listing};
use std::collections::HashMap;

/// Count how often each catalog genre occurs across `listings`, most popular first.
///
/// Tags are tallied once over the listing set, then each catalog genre sums the
/// tally of every tag it matches. Genres with no matches stay in the result,
/// after all the others. Equal counts keep catalog order.
pub fn rank_genres(
    listings: &[Listing],
    catalog: &[Genre],
    matcher: &GenreMatcher,
) -> Vec<GenreWithCount> {
    let mut tally: HashMap<GenreTag, usize> = HashMap::new();
    for tag in listings.iter().flat_map(|l| l.genres.iter()) {
        *tally.entry(*tag).or_default() += 1;
    }

    let mut ranked: Vec<GenreWithCount> = catalog
        .iter()
        .map(|genre| {
            let variations = genre.variation_set();
            let count = tally
                .iter()
                .filter(|(tag, _)| matcher.tag_matches(**tag, &variations))
                .map(|(_, n)| n)
                .sum();
            GenreWithCount {
                genre: genre.clone(),
                count,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

/// The first `n` entries of an already ranked list
pub fn top_genres(ranked: &[GenreWithCount], n: usize) -> &[GenreWithCount] {
    &ranked[..n.min(ranked.len())]
}

/// Everything after the first `n` entries
pub fn remaining_genres(ranked: &[GenreWithCount], n: usize) -> &[GenreWithCount] {
    &ranked[n.min(ranked.len())..]
}
