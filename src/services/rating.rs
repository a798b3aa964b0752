//! Rating aggregation
//!
//! A movie's `average_rating` is a cached projection of its reviews. It is
//! always recomputed from the full review set visible in the current
//! transaction, never adjusted incrementally.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    db::StoreTx,
    error::AppResult,
    models::{MovieId, Rating},
};

/// Outcome of one recomputation
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RatingUpdate {
    pub movie_id: MovieId,
    pub average_rating: f64,
    pub review_count: usize,
}

/// Arithmetic mean of the ratings, or exactly 0.0 for an empty set
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| r.value() as i64).sum();
    sum as f64 / ratings.len() as f64
}

/// Recomputes and stores one movie's average inside `tx`
pub async fn recompute_rating(tx: &mut dyn StoreTx, movie_id: MovieId) -> AppResult<RatingUpdate> {
    let ratings = tx.movie_ratings(movie_id).await?;
    let average = average_rating(&ratings);
    tx.store_average_rating(movie_id, average).await?;

    tracing::debug!(
        movie_id,
        average_rating = average,
        review_count = ratings.len(),
        "Recomputed average rating"
    );

    Ok(RatingUpdate {
        movie_id,
        average_rating: average,
        review_count: ratings.len(),
    })
}

/// Recomputes every distinct movie once, in ascending id order
pub async fn recompute_ratings(
    tx: &mut dyn StoreTx,
    movie_ids: &BTreeSet<MovieId>,
) -> AppResult<Vec<RatingUpdate>> {
    let mut updates = Vec::with_capacity(movie_ids.len());
    for movie_id in movie_ids {
        updates.push(recompute_rating(tx, *movie_id).await?);
    }
    Ok(updates)
}
