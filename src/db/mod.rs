//! Entity store abstraction
//!
//! Reads go straight through [`Store`]. Every mutation happens inside a
//! [`StoreTx`]: the unit of work is applied and made visible only by
//! [`StoreTx::commit`], and dropping it uncommitted discards everything it did.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        DashboardStats, Genre, GenreId, Movie, MovieDraft, MovieId, MovieQuery, NewReview,
        NewUser, Page, PageRequest, Rating, Review, ReviewDetail, ReviewId, ReviewQuery,
        TaggedMovie, User, UserId, UserQuery, UserUpdate,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Read access to the entity store plus transaction creation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transactional unit of work
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_movie(&self, id: MovieId) -> AppResult<Option<Movie>>;

    async fn find_review(&self, id: ReviewId) -> AppResult<Option<ReviewDetail>>;

    /// Genres of one movie, ordered by name
    async fn movie_genres(&self, movie_id: MovieId) -> AppResult<Vec<Genre>>;

    /// One movie with its genre ids
    async fn tagged_movie(&self, movie_id: MovieId) -> AppResult<Option<TaggedMovie>>;

    /// Every movie with its genre ids, ordered by id
    async fn tagged_catalog(&self) -> AppResult<Vec<TaggedMovie>>;

    /// Movies favorited by a user with their genre ids, ordered by id
    async fn favorite_movies(&self, user_id: UserId) -> AppResult<Vec<TaggedMovie>>;

    async fn favorite_count(&self, movie_id: MovieId) -> AppResult<u64>;

    async fn list_movies(&self, query: &MovieQuery, page: PageRequest) -> AppResult<Page<Movie>>;

    /// Distinct movies from the `scan` newest reviews, newest first, at most `limit`
    async fn recently_reviewed_movies(&self, scan: u32, limit: u32) -> AppResult<Vec<Movie>>;

    /// All genres ordered by name
    async fn list_genres(&self) -> AppResult<Vec<Genre>>;

    /// Reviews of one movie, newest first
    async fn movie_reviews(
        &self,
        movie_id: MovieId,
        page: PageRequest,
    ) -> AppResult<Page<ReviewDetail>>;

    /// Reviews written by one user, newest first
    async fn user_reviews(&self, user_id: UserId) -> AppResult<Vec<ReviewDetail>>;

    /// Users newest first
    async fn list_users(&self, query: &UserQuery, page: PageRequest) -> AppResult<Page<User>>;

    /// Reviews newest first
    async fn list_reviews(
        &self,
        query: &ReviewQuery,
        page: PageRequest,
    ) -> AppResult<Page<ReviewDetail>>;

    async fn dashboard_stats(&self) -> AppResult<DashboardStats>;
}

/// One transactional unit of work against the entity store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreTx: Send {
    /// Locks a movie row for the rest of the transaction
    async fn lock_movie(&mut self, movie_id: MovieId) -> AppResult<Option<Movie>>;

    async fn insert_review(&mut self, review: NewReview) -> AppResult<Review>;

    /// Reviews matching any of `ids`, ordered by id
    async fn reviews_by_ids(&mut self, ids: &[ReviewId]) -> AppResult<Vec<Review>>;

    async fn reviews_by_author(&mut self, user_id: UserId) -> AppResult<Vec<Review>>;

    async fn remove_review(&mut self, review_id: ReviewId) -> AppResult<()>;

    /// Current ratings of a movie's reviews, as seen inside this transaction
    async fn movie_ratings(&mut self, movie_id: MovieId) -> AppResult<Vec<Rating>>;

    async fn store_average_rating(&mut self, movie_id: MovieId, average: f64) -> AppResult<()>;

    /// Fails with `Conflict` when the username or email is taken
    async fn insert_user(&mut self, user: NewUser) -> AppResult<User>;

    async fn update_user(&mut self, user_id: UserId, update: UserUpdate) -> AppResult<User>;

    /// Removes the user and their favorites; reviews must already be gone
    async fn remove_user(&mut self, user_id: UserId) -> AppResult<()>;

    /// Inserts the movie with an average rating of 0.0 and tags it
    async fn insert_movie(&mut self, draft: MovieDraft) -> AppResult<Movie>;

    /// Overwrites the editable fields and replaces the genre tags
    async fn update_movie(&mut self, movie_id: MovieId, draft: MovieDraft) -> AppResult<Movie>;

    /// Removes the movie along with its reviews, genre tags and favorites
    async fn remove_movie(&mut self, movie_id: MovieId) -> AppResult<()>;

    /// Genres matching any of `ids`
    async fn genres_by_ids(&mut self, ids: &[GenreId]) -> AppResult<Vec<Genre>>;

    /// Fails with `Conflict` when the name is taken
    async fn insert_genre(&mut self, name: String) -> AppResult<Genre>;

    async fn find_genre(&mut self, genre_id: GenreId) -> AppResult<Option<Genre>>;

    /// Number of movies tagged with the genre
    async fn genre_usage(&mut self, genre_id: GenreId) -> AppResult<u64>;

    async fn remove_genre(&mut self, genre_id: GenreId) -> AppResult<()>;

    /// Adds the pair when absent, removes it when present; returns the new membership
    async fn toggle_favorite(&mut self, user_id: UserId, movie_id: MovieId) -> AppResult<bool>;

    async fn commit(&mut self) -> AppResult<()>;
}
