use std::collections::{BTreeSet, HashMap};

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{GenreId, Movie, TaggedMovie, UserId},
};

/// Result cap used when the caller does not supply one
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 6;

/// How many of the user's most frequent genres drive the warm path
pub const TOP_GENRE_COUNT: usize = 3;

/// Generates personalized recommendations for a user
///
/// Content-based: the genres that occur most often across the user's
/// favorites select candidate movies the user has not favorited yet, ranked
/// by average rating. Users without any usable signal get the top-rated
/// catalog instead.
pub async fn get_recommendations(
    store: &dyn Store,
    user_id: UserId,
    limit: usize,
) -> AppResult<Vec<Movie>> {
    if store.find_user(user_id).await?.is_none() {
        return Err(AppError::not_found("user", user_id));
    }

    let favorites = store.favorite_movies(user_id).await?;
    let catalog = store.tagged_catalog().await?;
    let recommendations = recommend(&favorites, &catalog, limit);

    tracing::debug!(
        user_id,
        favorites = favorites.len(),
        returned = recommendations.len(),
        "Computed recommendations"
    );

    Ok(recommendations)
}

/// Pure recommendation over already loaded data
pub fn recommend(favorites: &[TaggedMovie], catalog: &[TaggedMovie], limit: usize) -> Vec<Movie> {
    let top = top_genres(favorites, TOP_GENRE_COUNT);
    if top.is_empty() {
        return top_rated(catalog.iter(), limit);
    }

    let top: BTreeSet<GenreId> = top.into_iter().collect();
    let favorited: BTreeSet<_> = favorites.iter().map(|f| f.movie.id).collect();

    let candidates: Vec<&TaggedMovie> = catalog
        .iter()
        .filter(|m| !favorited.contains(&m.movie.id))
        .filter(|m| m.overlap(&top) > 0)
        .collect();

    if candidates.is_empty() {
        return top_rated(catalog.iter(), limit);
    }

    top_rated(candidates.into_iter(), limit)
}

/// The `n` genres that occur most often across `favorites`
///
/// Equal counts are ordered by ascending genre id.
pub fn top_genres(favorites: &[TaggedMovie], n: usize) -> Vec<GenreId> {
    let mut counts: HashMap<GenreId, usize> = HashMap::new();
    for genre_id in favorites.iter().flat_map(|m| m.genres.iter()) {
        *counts.entry(*genre_id).or_default() += 1;
    }

    let mut ranked: Vec<(GenreId, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(genre_id, _)| genre_id).collect()
}

/// Movies ordered by average rating descending, then ascending id
fn top_rated<'a>(movies: impl Iterator<Item = &'a TaggedMovie>, limit: usize) -> Vec<Movie> {
    let mut ranked: Vec<&Movie> = movies.map(|m| &m.movie).collect();
    ranked.sort_by(|a, b| {
        b.average_rating
            .total_cmp(&a.average_rating)
            .then(a.id.cmp(&b.id))
    });
    ranked.into_iter().take(limit).cloned().collect()
}
