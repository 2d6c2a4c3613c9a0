use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fine-grained genre stored on a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenreTag {
    Fiction,
    SciFi,
    Fantasy,
    Mystery,
    Thriller,
    Romance,
    Horror,
    HistoricalFiction,
    LiteraryFiction,
    YoungAdult,
    Children,
    NonFiction,
    Biography,
    History,
    Science,
    SelfHelp,
    Business,
    Poetry,
    GraphicNovel,
    Classics,
    Cooking,
    Travel,
    Philosophy,
    Psychology,
    Religion,
    Art,
    Other,
}

impl GenreTag {
    pub const ALL: [GenreTag; 27] = [
        GenreTag::Fiction,
        GenreTag::SciFi,
        GenreTag::Fantasy,
        GenreTag::Mystery,
        GenreTag::Thriller,
        GenreTag::Romance,
        GenreTag::Horror,
        GenreTag::HistoricalFiction,
        GenreTag::LiteraryFiction,
        GenreTag::YoungAdult,
        GenreTag::Children,
        GenreTag::NonFiction,
        GenreTag::Biography,
        GenreTag::History,
        GenreTag::Science,
        GenreTag::SelfHelp,
        GenreTag::Business,
        GenreTag::Poetry,
        GenreTag::GraphicNovel,
        GenreTag::Classics,
        GenreTag::Cooking,
        GenreTag::Travel,
        GenreTag::Philosophy,
        GenreTag::Psychology,
        GenreTag::Religion,
        GenreTag::Art,
        GenreTag::Other,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            GenreTag::Fiction => "Fiction",
            GenreTag::SciFi => "Science Fiction",
            GenreTag::Fantasy => "Fantasy",
            GenreTag::Mystery => "Mystery",
            GenreTag::Thriller => "Thriller",
            GenreTag::Romance => "Romance",
            GenreTag::Horror => "Horror",
            GenreTag::HistoricalFiction => "Historical Fiction",
            GenreTag::LiteraryFiction => "Literary Fiction",
            GenreTag::YoungAdult => "Young Adult",
            GenreTag::Children => "Children's",
            GenreTag::NonFiction => "Non-Fiction",
            GenreTag::Biography => "Biography",
            GenreTag::History => "History",
            GenreTag::Science => "Science",
            GenreTag::SelfHelp => "Self-Help",
            GenreTag::Business => "Business",
            GenreTag::Poetry => "Poetry",
            GenreTag::GraphicNovel => "Graphic Novel",
            GenreTag::Classics => "Classics",
            GenreTag::Cooking => "Cooking",
            GenreTag::Travel => "Travel",
            GenreTag::Philosophy => "Philosophy",
            GenreTag::Psychology => "Psychology",
            GenreTag::Religion => "Religion",
            GenreTag::Art => "Art",
            GenreTag::Other => "Other",
        }
    }
}

/// Curated catalog genre shown as a filter chip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Genre {
    pub id: String,
    pub name: String,
    /// Synonyms, compared case-insensitively
    #[serde(default)]
    pub variations: Vec<String>,
    pub color: String,
    #[serde(default)]
    pub sort_order: u32,
    pub last_updated: DateTime<Utc>,
}

impl Genre {
    /// The display name plus every synonym, lowercased and deduplicated
    pub fn variation_set(&self) -> Vec<String> {
        let mut set: Vec<String> = Vec::with_capacity(self.variations.len() + 1);
        for v in std::iter::once(&self.name).chain(self.variations.iter()) {
            let v = v.trim().to_lowercase();
            if !v.is_empty() && !set.contains(&v) {
                set.push(v);
            }
        }
        set
    }
}

/// A catalog genre paired with its occurrence count in some listing set
#[derive(Debug, Clone, PartialEq)]
pub struct GenreWithCount {
    pub genre: Genre,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variation_set_includes_name_and_synonyms_lowercased() {
        let genre = Genre {
            id: "scifi".into(),
            name: "Science Fiction".into(),
            variations: vec!["Sci-Fi".into(), "SCIENCE FICTION".into(), " ".into()],
            color: "#3F51B5".into(),
            sort_order: 1,
            last_updated: Utc::now(),
        };

        assert_eq!(genre.variation_set(), vec!["science fiction", "sci-fi"]);
    }

    #[test]
    fn tags_serialize_in_screaming_case() {
        let json = serde_json::to_string(&GenreTag::SciFi).unwrap();
        assert_eq!(json, "\"SCI_FI\"");
    }
}
