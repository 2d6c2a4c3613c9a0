use crate::models::{Genre, GenreTag};
use std::collections::BTreeSet;

/// Matches fine-grained listing tags against catalog genres.
///
/// A tag matches a catalog genre when its lowercased display name equals one of
/// the genre's variations, contains one, or is contained by one. Substring checks
/// only run when both strings are at least `min_containment_len` characters.
#[derive(Debug, Clone, Copy)]
pub struct GenreMatcher {
    pub min_containment_len: usize,
}

impl Default for GenreMatcher {
    fn default() -> Self {
        Self {
            min_containment_len: 3,
        }
    }
}

impl GenreMatcher {
    pub fn new(min_containment_len: usize) -> Self {
        Self {
            min_containment_len,
        }
    }

    /// Does `tag` match any of `variations` (already lowercased)?
    pub fn tag_matches(&self, tag: GenreTag, variations: &[String]) -> bool {
        let name = tag.display_name().to_lowercase();
        variations.iter().any(|variation| {
            if name == *variation {
                return true;
            }
            let long_enough = name.chars().count() >= self.min_containment_len
                && variation.chars().count() >= self.min_containment_len;
            long_enough && (name.contains(variation.as_str()) || variation.contains(&name))
        })
    }

    /// Every fine-grained tag matching `genre`
    pub fn matching_tags(&self, genre: &Genre) -> Vec<GenreTag> {
        let variations = genre.variation_set();
        GenreTag::ALL
            .into_iter()
            .filter(|tag| self.tag_matches(*tag, &variations))
            .collect()
    }

    /// True if any of `tags` matches any selected catalog genre.
    /// An empty selection matches everything.
    pub fn matches_genres(
        &self,
        tags: &[GenreTag],
        selected: &BTreeSet<String>,
        catalog: &[Genre],
    ) -> bool {
        if selected.is_empty() {
            return true;
        }
        selected_genres(selected, catalog).any(|genre| {
            let variations = genre.variation_set();
            tags.iter().any(|tag| self.tag_matches(*tag, &variations))
        })
    }

    /// All fine-grained tags that satisfy at least one selected catalog genre.
    /// Used to narrow a remote query that cannot run the matching itself.
    pub fn expand_selected(
        &self,
        selected: &BTreeSet<String>,
        catalog: &[Genre],
    ) -> BTreeSet<GenreTag> {
        selected_genres(selected, catalog)
            .flat_map(|genre| self.matching_tags(genre))
            .collect()
    }
}

fn selected_genres<'a>(
    selected: &'a BTreeSet<String>,
    catalog: &'a [Genre],
) -> impl Iterator<Item = &'a Genre> + 'a {
    catalog
        .iter()
        .filter(move |genre| selected.contains(&genre.id))
}
