use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    audit::{self, DbAction, Entity},
    db::Store,
    error::{AppError, AppResult},
    models::{MovieId, NewReview, Rating, Review, ReviewId, User},
    services::rating::{self, RatingUpdate},
};

/// A newly stored review and the rating it produced
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostedReview {
    pub review: Review,
    pub rating: RatingUpdate,
}

/// A removed review and its movie's recomputed rating
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeletedReview {
    pub review: Review,
    pub rating: RatingUpdate,
}

/// Result of a batch deletion
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchDeletion {
    pub deleted: Vec<ReviewId>,
    /// Requested ids that matched no review
    pub missing: Vec<ReviewId>,
    /// One entry per distinct affected movie
    pub recomputed: Vec<RatingUpdate>,
}

/// Stores a review and refreshes the movie's average in the same transaction
pub async fn post_review(
    store: &dyn Store,
    author: &User,
    movie_id: MovieId,
    content: &str,
    rating: Rating,
) -> AppResult<PostedReview> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidInput(
            "review content must not be empty".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    let movie = tx
        .lock_movie(movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("movie", movie_id))?;

    let review = tx
        .insert_review(NewReview {
            content: content.to_string(),
            rating,
            user_id: author.id,
            movie_id,
        })
        .await?;
    let update = rating::recompute_rating(&mut *tx, movie_id).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Add,
        Entity::Review,
        Some(review.id),
        &movie.title,
        &author.username,
        Some(&format!("rating:{}", rating)),
    );

    Ok(PostedReview {
        review,
        rating: update,
    })
}

/// Removes one review and refreshes its movie's average
pub async fn delete_review(
    store: &dyn Store,
    operator: &User,
    review_id: ReviewId,
) -> AppResult<DeletedReview> {
    let mut tx = store.begin().await?;
    let review = tx
        .reviews_by_ids(&[review_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("review", review_id))?;

    let movie = tx
        .lock_movie(review.movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("movie", review.movie_id))?;
    tx.remove_review(review.id).await?;
    let update = rating::recompute_rating(&mut *tx, review.movie_id).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Delete,
        Entity::Review,
        Some(review.id),
        &movie.title,
        &operator.username,
        None,
    );

    Ok(DeletedReview {
        review,
        rating: update,
    })
}

/// Removes several reviews at once
///
/// Ids that match nothing are reported in `missing`. Each affected movie is
/// recomputed exactly once, after every deletion has been applied.
pub async fn delete_reviews(
    store: &dyn Store,
    operator: &User,
    review_ids: &[ReviewId],
) -> AppResult<BatchDeletion> {
    if review_ids.is_empty() {
        return Err(AppError::InvalidInput("no reviews selected".to_string()));
    }

    let mut tx = store.begin().await?;
    let candidates: BTreeSet<MovieId> = tx
        .reviews_by_ids(review_ids)
        .await?
        .iter()
        .map(|r| r.movie_id)
        .collect();
    let mut titles = BTreeMap::new();
    for movie_id in &candidates {
        if let Some(movie) = tx.lock_movie(*movie_id).await? {
            titles.insert(movie.id, movie.title);
        }
    }

    // Re-read under the locks; a concurrent deletion may have won the race
    let reviews: Vec<Review> = tx
        .reviews_by_ids(review_ids)
        .await?
        .into_iter()
        .filter(|r| titles.contains_key(&r.movie_id))
        .collect();

    let found: BTreeSet<ReviewId> = reviews.iter().map(|r| r.id).collect();
    let missing: Vec<ReviewId> = review_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|id| !found.contains(id))
        .collect();

    let affected: BTreeSet<MovieId> = reviews.iter().map(|r| r.movie_id).collect();
    for review in &reviews {
        tx.remove_review(review.id).await?;
    }
    let recomputed = rating::recompute_ratings(&mut *tx, &affected).await?;
    tx.commit().await?;

    for review in &reviews {
        audit::record(
            DbAction::BatchDelete,
            Entity::Review,
            Some(review.id),
            titles.get(&review.movie_id).map_or("", String::as_str),
            &operator.username,
            Some(&format!("author_id:{}", review.user_id)),
        );
    }
    tracing::warn!(
        target: "audit",
        count = reviews.len(),
        movies = affected.len(),
        operator = %operator.username,
        "Batch deleted reviews"
    );

    Ok(BatchDeletion {
        deleted: found.into_iter().collect(),
        missing,
        recomputed,
    })
}
