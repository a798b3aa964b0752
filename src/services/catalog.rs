use serde::Serialize;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{Genre, Movie, MovieId, MovieQuery, Page, PageRequest, ReviewDetail, UserId},
    services::{
        recommendations::{self, DEFAULT_RECOMMENDATION_LIMIT},
        similarity::{self, DEFAULT_SIMILAR_LIMIT},
    },
};

/// How many of the newest reviews feed the "recently reviewed" strip
pub const RECENT_REVIEW_SCAN: u32 = 30;
/// Cap for each home page strip
pub const HOME_STRIP_LEN: u32 = 10;
/// Reviews shown per page on a movie's detail view
pub const MOVIE_REVIEWS_PER_PAGE: u32 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct HomePage {
    pub recently_reviewed: Vec<Movie>,
    pub top_rated: Vec<Movie>,
    /// Present only for an identified visitor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<Vec<Movie>>,
}

pub async fn home(store: &dyn Store, visitor: Option<UserId>) -> AppResult<HomePage> {
    let recently_reviewed = store
        .recently_reviewed_movies(RECENT_REVIEW_SCAN, HOME_STRIP_LEN)
        .await?;
    let top_rated = store
        .list_movies(&MovieQuery::default(), PageRequest::new(1, HOME_STRIP_LEN))
        .await?
        .items;

    let recommended = match visitor {
        Some(user_id) => Some(
            recommendations::get_recommendations(store, user_id, DEFAULT_RECOMMENDATION_LIMIT)
                .await?,
        ),
        None => None,
    };

    Ok(HomePage {
        recently_reviewed,
        top_rated,
        recommended,
    })
}

/// Everything the movie page shows
#[derive(Debug, Clone, Serialize)]
pub struct MovieDetail {
    pub movie: Movie,
    pub genres: Vec<Genre>,
    pub favorite_count: u64,
    pub reviews: Page<ReviewDetail>,
    pub similar: Vec<Movie>,
}

pub async fn movie_detail(store: &dyn Store, movie_id: MovieId) -> AppResult<MovieDetail> {
    let movie = store
        .find_movie(movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("movie", movie_id))?;

    let genres = store.movie_genres(movie_id).await?;
    let favorite_count = store.favorite_count(movie_id).await?;
    let reviews = store
        .movie_reviews(movie_id, PageRequest::new(1, MOVIE_REVIEWS_PER_PAGE))
        .await?;
    let similar = similarity::get_similar(store, movie_id, DEFAULT_SIMILAR_LIMIT).await?;

    Ok(MovieDetail {
        movie,
        genres,
        favorite_count,
        reviews,
        similar,
    })
}

/// One page of a movie's reviews, NotFound for an unknown movie
pub async fn movie_reviews(
    store: &dyn Store,
    movie_id: MovieId,
    page: PageRequest,
) -> AppResult<Page<ReviewDetail>> {
    if store.find_movie(movie_id).await?.is_none() {
        return Err(AppError::not_found("movie", movie_id));
    }
    store.movie_reviews(movie_id, page).await
}
