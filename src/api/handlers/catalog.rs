use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{extract::CurrentUser, extract::MaybeUser, AppState},
    error::AppResult,
    models::{Genre, Movie, MovieId, MovieQuery, Page, PageRequest, ReviewDetail},
    services::{
        catalog::{self, HomePage, MovieDetail, MOVIE_REVIEWS_PER_PAGE},
        recommendations::{self, DEFAULT_RECOMMENDATION_LIMIT},
        similarity::{self, DEFAULT_SIMILAR_LIMIT},
    },
};

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn home(State(state): State<AppState>, MaybeUser(visitor): MaybeUser) -> AppResult<Json<HomePage>> {
    let page = catalog::home(state.store.as_ref(), visitor.map(|u| u.id)).await?;
    Ok(Json(page))
}

pub async fn list_genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.store.list_genres().await?))
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<MovieQuery>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<Movie>>> {
    Ok(Json(state.store.list_movies(&query, page).await?))
}

pub async fn movie_detail(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<MovieDetail>> {
    Ok(Json(catalog::movie_detail(state.store.as_ref(), movie_id).await?))
}

pub async fn movie_reviews(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
    Query(params): Query<ReviewPageQuery>,
) -> AppResult<Json<Page<ReviewDetail>>> {
    let page = PageRequest::new(
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(MOVIE_REVIEWS_PER_PAGE),
    );
    Ok(Json(
        catalog::movie_reviews(state.store.as_ref(), movie_id, page).await?,
    ))
}

pub async fn similar_movies(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
    Query(params): Query<LimitQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let limit = params.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
    Ok(Json(
        similarity::get_similar(state.store.as_ref(), movie_id, limit).await?,
    ))
}

pub async fn recommendations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<LimitQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let limit = params.limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT);
    Ok(Json(
        recommendations::get_recommendations(state.store.as_ref(), user.id, limit).await?,
    ))
}
