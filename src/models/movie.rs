use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{GenreId, MovieId};

/// A catalog movie
///
/// `average_rating` is a cached projection of the movie's reviews. It is only
/// ever written by the rating aggregator.
#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub average_rating: f64,
}

/// A movie together with the ids of the genres it is tagged with
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaggedMovie {
    #[serde(flatten)]
    pub movie: Movie,
    #[serde(rename = "genre_ids")]
    pub genres: BTreeSet<GenreId>,
}

impl TaggedMovie {
    pub fn new(movie: Movie, genres: impl IntoIterator<Item = GenreId>) -> Self {
        Self {
            movie,
            genres: genres.into_iter().collect(),
        }
    }

    /// Number of genres shared with `other`
    pub fn overlap(&self, other: &BTreeSet<GenreId>) -> usize {
        self.genres.intersection(other).count()
    }
}

/// Editable movie fields, used for both creation and update
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MovieDraft {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<GenreId>,
}
