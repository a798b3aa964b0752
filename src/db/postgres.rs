use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};

use super::{Store, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        DashboardStats, Genre, GenreId, Movie, MovieDraft, MovieId, MovieQuery, MovieSort,
        NewReview, NewUser, Page, PageRequest, Rating, Review, ReviewDetail, ReviewId,
        ReviewQuery, RoleFilter, SortOrder, StatusFilter, TaggedMovie, User, UserId, UserQuery,
        UserUpdate,
    },
};

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const MOVIE_COLUMNS: &str =
    "m.id, m.title, m.year, m.director, m.description, m.poster_url, m.average_rating";

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, is_active, created_at";

const REVIEW_COLUMNS: &str = "id, content, rating, created_at, user_id, movie_id";

const REVIEW_DETAIL_SELECT: &str = "SELECT r.id, r.content, r.rating, r.created_at, r.user_id, \
     r.movie_id, u.username AS author, m.title AS movie_title \
     FROM reviews r JOIN users u ON u.id = r.user_id JOIN movies m ON m.id = r.movie_id";

/// `%needle%` with LIKE metacharacters escaped
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn push_movie_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &MovieQuery) {
    builder.push(" WHERE TRUE");
    if let Some(search) = query.search() {
        let pattern = like_pattern(search);
        builder
            .push(" AND (m.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR m.director ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(genre_id) = query.genre {
        builder
            .push(" AND EXISTS (SELECT 1 FROM movie_genres mg WHERE mg.movie_id = m.id AND mg.genre_id = ")
            .push_bind(genre_id)
            .push(")");
    }
    if let Some(year_min) = query.year_min {
        builder.push(" AND m.year >= ").push_bind(year_min);
    }
    if let Some(year_max) = query.year_max {
        builder.push(" AND m.year <= ").push_bind(year_max);
    }
}

fn push_movie_order(builder: &mut QueryBuilder<'_, Postgres>, query: &MovieQuery) {
    let key = match query.sort_by {
        MovieSort::Rating => "m.average_rating",
        MovieSort::Year => "m.year",
        MovieSort::Favorites => "(SELECT COUNT(*) FROM favorites f WHERE f.movie_id = m.id)",
    };
    // missing years sort as the smallest value
    let direction = match query.order {
        SortOrder::Asc => "ASC NULLS FIRST",
        SortOrder::Desc => "DESC NULLS LAST",
    };
    builder
        .push(" ORDER BY ")
        .push(key)
        .push(" ")
        .push(direction)
        .push(", m.id ASC");
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    builder.push(" WHERE TRUE");
    if let Some(search) = query.search() {
        let pattern = like_pattern(search);
        builder
            .push(" AND (username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    match query.role {
        RoleFilter::All => {}
        RoleFilter::Admin => {
            builder.push(" AND is_admin");
        }
        RoleFilter::User => {
            builder.push(" AND NOT is_admin");
        }
    }
    match query.status {
        StatusFilter::All => {}
        StatusFilter::Active => {
            builder.push(" AND is_active");
        }
        StatusFilter::Banned => {
            builder.push(" AND NOT is_active");
        }
    }
}

fn push_review_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ReviewQuery) {
    builder.push(" WHERE TRUE");
    if let Some(search) = query.search() {
        builder
            .push(" AND r.content ILIKE ")
            .push_bind(like_pattern(search));
    }
    if let Some(rating) = query.rating {
        builder.push(" AND r.rating = ").push_bind(rating);
    }
    if let Some(from) = query.date_from {
        builder
            .push(" AND r.created_at >= ")
            .push_bind(start_of_day(from));
    }
    if let Some(until) = query.date_to.and_then(|d| d.checked_add_days(Days::new(1))) {
        builder
            .push(" AND r.created_at < ")
            .push_bind(start_of_day(until));
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, page: PageRequest) {
    builder
        .push(" LIMIT ")
        .push_bind(page.limit() as i64)
        .push(" OFFSET ")
        .push_bind(page.offset() as i64);
}

/// Groups `(movie_id, genre_id)` rows onto their movies, keeping `movies` order
fn attach_genres(movies: Vec<Movie>, tags: Vec<(MovieId, GenreId)>) -> Vec<TaggedMovie> {
    let mut by_movie: BTreeMap<MovieId, BTreeSet<GenreId>> = BTreeMap::new();
    for (movie_id, genre_id) in tags {
        by_movie.entry(movie_id).or_default().insert(genre_id);
    }
    movies
        .into_iter()
        .map(|movie| {
            let genres = by_movie.remove(&movie.id).unwrap_or_default();
            TaggedMovie::new(movie, genres)
        })
        .collect()
}

/// PostgreSQL entity store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tags_for(&self, movie_ids: &[MovieId]) -> AppResult<Vec<(MovieId, GenreId)>> {
        let tags = sqlx::query_as::<_, (MovieId, GenreId)>(
            "SELECT movie_id, genre_id FROM movie_genres WHERE movie_id = ANY($1)",
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_movie(&self, id: MovieId) -> AppResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies m WHERE m.id = $1",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn find_review(&self, id: ReviewId) -> AppResult<Option<ReviewDetail>> {
        let review = sqlx::query_as::<_, ReviewDetail>(&format!(
            "{} WHERE r.id = $1",
            REVIEW_DETAIL_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn movie_genres(&self, movie_id: MovieId) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT g.id, g.name FROM genres g \
             JOIN movie_genres mg ON mg.genre_id = g.id \
             WHERE mg.movie_id = $1 ORDER BY g.name",
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn tagged_movie(&self, movie_id: MovieId) -> AppResult<Option<TaggedMovie>> {
        let Some(movie) = self.find_movie(movie_id).await? else {
            return Ok(None);
        };
        let tags = self.tags_for(&[movie_id]).await?;
        Ok(attach_genres(vec![movie], tags).into_iter().next())
    }

    async fn tagged_catalog(&self) -> AppResult<Vec<TaggedMovie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies m ORDER BY m.id",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        let tags = sqlx::query_as::<_, (MovieId, GenreId)>(
            "SELECT movie_id, genre_id FROM movie_genres",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(attach_genres(movies, tags))
    }

    async fn favorite_movies(&self, user_id: UserId) -> AppResult<Vec<TaggedMovie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies m JOIN favorites f ON f.movie_id = m.id \
             WHERE f.user_id = $1 ORDER BY m.id",
            MOVIE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let ids: Vec<MovieId> = movies.iter().map(|m| m.id).collect();
        let tags = self.tags_for(&ids).await?;
        Ok(attach_genres(movies, tags))
    }

    async fn favorite_count(&self, movie_id: MovieId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE movie_id = $1")
            .bind(movie_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn list_movies(&self, query: &MovieQuery, page: PageRequest) -> AppResult<Page<Movie>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM movies m");
        push_movie_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM movies m", MOVIE_COLUMNS));
        push_movie_filters(&mut select, query);
        push_movie_order(&mut select, query);
        push_page(&mut select, page);
        let movies = select
            .build_query_as::<Movie>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(movies, total as u64, page))
    }

    async fn recently_reviewed_movies(&self, scan: u32, limit: u32) -> AppResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM ( \
                 SELECT movie_id, MAX(created_at) AS last_at, MAX(id) AS last_id FROM ( \
                     SELECT id, movie_id, created_at FROM reviews \
                     ORDER BY created_at DESC, id DESC LIMIT $1 \
                 ) recent GROUP BY movie_id \
             ) r JOIN movies m ON m.id = r.movie_id \
             ORDER BY r.last_at DESC, r.last_id DESC LIMIT $2",
            MOVIE_COLUMNS
        ))
        .bind(scan as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }

    async fn movie_reviews(
        &self,
        movie_id: MovieId,
        page: PageRequest,
    ) -> AppResult<Page<ReviewDetail>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE movie_id = $1")
            .bind(movie_id)
            .fetch_one(&self.pool)
            .await?;
        let reviews = sqlx::query_as::<_, ReviewDetail>(&format!(
            "{} WHERE r.movie_id = $1 ORDER BY r.created_at DESC, r.id DESC LIMIT $2 OFFSET $3",
            REVIEW_DETAIL_SELECT
        ))
        .bind(movie_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(reviews, total as u64, page))
    }

    async fn user_reviews(&self, user_id: UserId) -> AppResult<Vec<ReviewDetail>> {
        let reviews = sqlx::query_as::<_, ReviewDetail>(&format!(
            "{} WHERE r.user_id = $1 ORDER BY r.created_at DESC, r.id DESC",
            REVIEW_DETAIL_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn list_users(&self, query: &UserQuery, page: PageRequest) -> AppResult<Page<User>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_user_filters(&mut select, query);
        select.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut select, page);
        let users = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Page::new(users, total as u64, page))
    }

    async fn list_reviews(
        &self,
        query: &ReviewQuery,
        page: PageRequest,
    ) -> AppResult<Page<ReviewDetail>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM reviews r");
        push_review_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(REVIEW_DETAIL_SELECT);
        push_review_filters(&mut select, query);
        select.push(" ORDER BY r.created_at DESC, r.id DESC");
        push_page(&mut select, page);
        let reviews = select
            .build_query_as::<ReviewDetail>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(reviews, total as u64, page))
    }

    async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let today = start_of_day(Utc::now().date_naive());
        let (users, movies, reviews, new_users): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM movies), \
             (SELECT COUNT(*) FROM reviews), (SELECT COUNT(*) FROM users WHERE created_at >= $1)",
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            total_users: users as u64,
            total_movies: movies as u64,
            total_reviews: reviews as u64,
            new_users_today: new_users as u64,
        })
    }
}

/// Unit of work over one sqlx transaction
///
/// Dropping it without [`StoreTx::commit`] rolls the transaction back.
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(|| AppError::Internal("transaction already committed".to_string()))
    }

    async fn tag(&mut self, movie_id: MovieId, genre_ids: &[GenreId]) -> AppResult<()> {
        sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
            .bind(movie_id)
            .execute(self.conn()?)
            .await?;
        if !genre_ids.is_empty() {
            sqlx::query(
                "INSERT INTO movie_genres (movie_id, genre_id) \
                 SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
            )
            .bind(movie_id)
            .bind(genre_ids)
            .execute(self.conn()?)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_movie(&mut self, movie_id: MovieId) -> AppResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies m WHERE m.id = $1 FOR UPDATE",
            MOVIE_COLUMNS
        ))
        .bind(movie_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(movie)
    }

    async fn insert_review(&mut self, review: NewReview) -> AppResult<Review> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "INSERT INTO reviews (content, rating, user_id, movie_id) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(review.content)
        .bind(review.rating)
        .bind(review.user_id)
        .bind(review.movie_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(review)
    }

    async fn reviews_by_ids(&mut self, ids: &[ReviewId]) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {} FROM reviews WHERE id = ANY($1) ORDER BY id",
            REVIEW_COLUMNS
        ))
        .bind(ids)
        .fetch_all(self.conn()?)
        .await?;
        Ok(reviews)
    }

    async fn reviews_by_author(&mut self, user_id: UserId) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {} FROM reviews WHERE user_id = $1 ORDER BY id",
            REVIEW_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(reviews)
    }

    async fn remove_review(&mut self, review_id: ReviewId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("review", review_id));
        }
        Ok(())
    }

    async fn movie_ratings(&mut self, movie_id: MovieId) -> AppResult<Vec<Rating>> {
        let ratings = sqlx::query_scalar::<_, Rating>("SELECT rating FROM reviews WHERE movie_id = $1")
            .bind(movie_id)
            .fetch_all(self.conn()?)
            .await?;
        Ok(ratings)
    }

    async fn store_average_rating(&mut self, movie_id: MovieId, average: f64) -> AppResult<()> {
        let result = sqlx::query("UPDATE movies SET average_rating = $2 WHERE id = $1")
            .bind(movie_id)
            .bind(average)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("movie", movie_id));
        }
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, is_admin) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.is_admin)
        .fetch_one(self.conn()?)
        .await?;
        Ok(user)
    }

    async fn update_user(&mut self, user_id: UserId, update: UserUpdate) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET username = $2, email = $3, is_admin = $4, is_active = $5 \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.username)
        .bind(update.email)
        .bind(update.is_admin)
        .bind(update.is_active)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))
    }

    async fn remove_user(&mut self, user_id: UserId) -> AppResult<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .execute(self.conn()?)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn insert_movie(&mut self, draft: MovieDraft) -> AppResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>(
            "INSERT INTO movies AS m (title, year, director, description, poster_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING m.id, m.title, m.year, m.director, m.description, m.poster_url, m.average_rating",
        )
        .bind(draft.title)
        .bind(draft.year)
        .bind(draft.director)
        .bind(draft.description)
        .bind(draft.poster_url)
        .fetch_one(self.conn()?)
        .await?;
        self.tag(movie.id, &draft.genre_ids).await?;
        Ok(movie)
    }

    async fn update_movie(&mut self, movie_id: MovieId, draft: MovieDraft) -> AppResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>(
            "UPDATE movies AS m SET title = $2, year = $3, director = $4, description = $5, \
             poster_url = $6 WHERE m.id = $1 \
             RETURNING m.id, m.title, m.year, m.director, m.description, m.poster_url, m.average_rating",
        )
        .bind(movie_id)
        .bind(draft.title)
        .bind(draft.year)
        .bind(draft.director)
        .bind(draft.description)
        .bind(draft.poster_url)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| AppError::not_found("movie", movie_id))?;
        self.tag(movie_id, &draft.genre_ids).await?;
        Ok(movie)
    }

    async fn remove_movie(&mut self, movie_id: MovieId) -> AppResult<()> {
        for statement in [
            "DELETE FROM reviews WHERE movie_id = $1",
            "DELETE FROM movie_genres WHERE movie_id = $1",
            "DELETE FROM favorites WHERE movie_id = $1",
        ] {
            sqlx::query(statement)
                .bind(movie_id)
                .execute(self.conn()?)
                .await?;
        }
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(movie_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("movie", movie_id));
        }
        Ok(())
    }

    async fn genres_by_ids(&mut self, ids: &[GenreId]) -> AppResult<Vec<Genre>> {
        let genres =
            sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE id = ANY($1) ORDER BY id")
                .bind(ids)
                .fetch_all(self.conn()?)
                .await?;
        Ok(genres)
    }

    async fn insert_genre(&mut self, name: String) -> AppResult<Genre> {
        let genre =
            sqlx::query_as::<_, Genre>("INSERT INTO genres (name) VALUES ($1) RETURNING id, name")
                .bind(name)
                .fetch_one(self.conn()?)
                .await?;
        Ok(genre)
    }

    async fn find_genre(&mut self, genre_id: GenreId) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE id = $1")
            .bind(genre_id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(genre)
    }

    async fn genre_usage(&mut self, genre_id: GenreId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movie_genres WHERE genre_id = $1")
            .bind(genre_id)
            .fetch_one(self.conn()?)
            .await?;
        Ok(count as u64)
    }

    async fn remove_genre(&mut self, genre_id: GenreId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(genre_id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("genre", genre_id));
        }
        Ok(())
    }

    async fn toggle_favorite(&mut self, user_id: UserId, movie_id: MovieId) -> AppResult<bool> {
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(self.conn()?)
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO favorites (user_id, movie_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(movie_id)
        .execute(self.conn()?)
        .await?;
        Ok(true)
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}
