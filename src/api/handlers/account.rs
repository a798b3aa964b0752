use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    api::{extract::CurrentUser, AppState},
    error::AppResult,
    models::{Movie, MovieId, Rating, ReviewDetail, User},
    services::{
        accounts::{self, FavoriteToggle, Registration},
        reviews::{self, PostedReview},
    },
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PostReviewRequest {
    pub content: String,
    /// Validated into a [`Rating`] before the store is touched
    pub rating: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = accounts::register(
        state.store.as_ref(),
        &state.hasher,
        &state.super_admin_email,
        registration,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Verifies credentials; issuing a session is left to the upstream auth layer
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<User>> {
    let user = accounts::authenticate(
        state.store.as_ref(),
        &state.hasher,
        &request.email,
        &request.password,
    )
    .await?;
    Ok(Json(user))
}

pub async fn my_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Movie>>> {
    let favorites = state
        .store
        .favorite_movies(user.id)
        .await?
        .into_iter()
        .map(|tagged| tagged.movie)
        .collect();
    Ok(Json(favorites))
}

pub async fn my_reviews(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ReviewDetail>>> {
    Ok(Json(state.store.user_reviews(user.id).await?))
}

pub async fn post_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(movie_id): Path<MovieId>,
    Json(request): Json<PostReviewRequest>,
) -> AppResult<(StatusCode, Json<PostedReview>)> {
    let rating = Rating::new(request.rating)?;
    let posted = reviews::post_review(
        state.store.as_ref(),
        &user,
        movie_id,
        &request.content,
        rating,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(posted)))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<FavoriteToggle>> {
    Ok(Json(
        accounts::toggle_favorite(state.store.as_ref(), &user, movie_id).await?,
    ))
}
