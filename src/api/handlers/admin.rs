use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    api::{extract::AdminUser, AppState},
    error::{AppError, AppResult},
    models::{
        Genre, GenreId, Movie, MovieDraft, MovieId, MovieQuery, Page, PageRequest, ReviewDetail,
        ReviewId, ReviewQuery, TaggedMovie, User, UserId, UserQuery, UserUpdate,
    },
    services::{
        admin::{self, Dashboard, UserDeletion, UserProfile},
        reviews::{self, BatchDeletion, DeletedReview},
    },
};

#[derive(Debug, Deserialize)]
pub struct CreateGenreRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub review_ids: Vec<ReviewId>,
}

pub async fn dashboard(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Dashboard>> {
    Ok(Json(admin::dashboard(state.store.as_ref()).await?))
}

// Users

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UserQuery>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<User>>> {
    Ok(Json(state.store.list_users(&query, page).await?))
}

pub async fn user_detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(admin::user_profile(state.store.as_ref(), user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    acting: AdminUser,
    Path(user_id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> AppResult<Json<User>> {
    let user = admin::update_user(
        state.store.as_ref(),
        acting.operator(&state),
        user_id,
        update,
    )
    .await?;
    Ok(Json(user))
}

pub async fn toggle_user_status(
    State(state): State<AppState>,
    acting: AdminUser,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<User>> {
    let user =
        admin::toggle_user_status(state.store.as_ref(), acting.operator(&state), user_id).await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    acting: AdminUser,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<UserDeletion>> {
    let deletion =
        admin::delete_user(state.store.as_ref(), acting.operator(&state), user_id).await?;
    Ok(Json(deletion))
}

// Movies

pub async fn list_movies(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<MovieQuery>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<Movie>>> {
    Ok(Json(admin::list_movies(state.store.as_ref(), query, page).await?))
}

pub async fn create_movie(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Json(draft): Json<MovieDraft>,
) -> AppResult<(StatusCode, Json<TaggedMovie>)> {
    let movie = admin::create_movie(state.store.as_ref(), &operator, draft).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Path(movie_id): Path<MovieId>,
    Json(draft): Json<MovieDraft>,
) -> AppResult<Json<TaggedMovie>> {
    Ok(Json(
        admin::update_movie(state.store.as_ref(), &operator, movie_id, draft).await?,
    ))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Path(movie_id): Path<MovieId>,
) -> AppResult<StatusCode> {
    admin::delete_movie(state.store.as_ref(), &operator, movie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Genres

pub async fn list_genres(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.store.list_genres().await?))
}

pub async fn create_genre(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Json(request): Json<CreateGenreRequest>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    let genre = admin::create_genre(state.store.as_ref(), &operator, &request.name).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn delete_genre(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Path(genre_id): Path<GenreId>,
) -> AppResult<StatusCode> {
    admin::delete_genre(state.store.as_ref(), &operator, genre_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Reviews

pub async fn list_reviews(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ReviewQuery>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<ReviewDetail>>> {
    Ok(Json(state.store.list_reviews(&query, page).await?))
}

pub async fn review_detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(review_id): Path<ReviewId>,
) -> AppResult<Json<ReviewDetail>> {
    state
        .store
        .find_review(review_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("review", review_id))
}

pub async fn delete_review(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Path(review_id): Path<ReviewId>,
) -> AppResult<Json<DeletedReview>> {
    Ok(Json(
        reviews::delete_review(state.store.as_ref(), &operator, review_id).await?,
    ))
}

pub async fn batch_delete_reviews(
    State(state): State<AppState>,
    AdminUser(operator): AdminUser,
    Json(request): Json<BatchDeleteRequest>,
) -> AppResult<Json<BatchDeletion>> {
    Ok(Json(
        reviews::delete_reviews(state.store.as_ref(), &operator, &request.review_ids).await?,
    ))
}
