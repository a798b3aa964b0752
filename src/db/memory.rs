use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

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

/// Every table of the store
///
/// Many-to-many relations are sets of id pairs, so membership can never
/// be duplicated.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    users: BTreeMap<UserId, User>,
    movies: BTreeMap<MovieId, Movie>,
    genres: BTreeMap<GenreId, Genre>,
    reviews: BTreeMap<ReviewId, Review>,
    movie_genres: BTreeSet<(MovieId, GenreId)>,
    favorites: BTreeSet<(UserId, MovieId)>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn genres_of(&self, movie_id: MovieId) -> BTreeSet<GenreId> {
        self.movie_genres
            .range((movie_id, GenreId::MIN)..=(movie_id, GenreId::MAX))
            .map(|(_, genre_id)| *genre_id)
            .collect()
    }

    fn tagged(&self, movie: &Movie) -> TaggedMovie {
        TaggedMovie::new(movie.clone(), self.genres_of(movie.id))
    }

    fn favorite_count(&self, movie_id: MovieId) -> u64 {
        self.favorites
            .iter()
            .filter(|(_, favorite)| *favorite == movie_id)
            .count() as u64
    }

    fn detail(&self, review: &Review) -> ReviewDetail {
        ReviewDetail {
            review: review.clone(),
            author: self
                .users
                .get(&review.user_id)
                .map(|u| u.username.clone())
                .unwrap_or_default(),
            movie_title: self
                .movies
                .get(&review.movie_id)
                .map(|m| m.title.clone())
                .unwrap_or_default(),
        }
    }

    /// Reviews matching `keep`, newest first
    fn newest_reviews(&self, keep: impl Fn(&Review) -> bool) -> Vec<ReviewDetail> {
        let mut reviews: Vec<&Review> = self.reviews.values().filter(|r| keep(r)).collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        reviews.into_iter().map(|r| self.detail(r)).collect()
    }

    /// Emails clash regardless of case, as with the `LOWER(email)` index
    fn ensure_unique_user(&self, username: &str, email: &str, except: Option<UserId>) -> AppResult<()> {
        let clash = self.users.values().find(|u| {
            Some(u.id) != except && (u.username == username || same_email(&u.email, email))
        });
        match clash {
            Some(u) if u.username == username => Err(AppError::Conflict(format!(
                "username {} is already taken",
                username
            ))),
            Some(_) => Err(AppError::Conflict(format!(
                "email {} is already registered",
                email
            ))),
            None => Ok(()),
        }
    }

    fn retag(&mut self, movie_id: MovieId, genre_ids: &[GenreId]) {
        self.movie_genres.retain(|(movie, _)| *movie != movie_id);
        self.movie_genres
            .extend(genre_ids.iter().map(|genre_id| (movie_id, *genre_id)));
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// In-process entity store
///
/// All units of work serialize on the table write lock. A transaction mutates a
/// staged copy of the tables and swaps it in on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.inner.clone().write_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| same_email(&u.email, email))
            .cloned())
    }

    async fn find_movie(&self, id: MovieId) -> AppResult<Option<Movie>> {
        Ok(self.inner.read().await.movies.get(&id).cloned())
    }

    async fn find_review(&self, id: ReviewId) -> AppResult<Option<ReviewDetail>> {
        let tables = self.inner.read().await;
        Ok(tables.reviews.get(&id).map(|r| tables.detail(r)))
    }

    async fn movie_genres(&self, movie_id: MovieId) -> AppResult<Vec<Genre>> {
        let tables = self.inner.read().await;
        let mut genres: Vec<Genre> = tables
            .genres_of(movie_id)
            .iter()
            .filter_map(|id| tables.genres.get(id).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn tagged_movie(&self, movie_id: MovieId) -> AppResult<Option<TaggedMovie>> {
        let tables = self.inner.read().await;
        Ok(tables.movies.get(&movie_id).map(|m| tables.tagged(m)))
    }

    async fn tagged_catalog(&self) -> AppResult<Vec<TaggedMovie>> {
        let tables = self.inner.read().await;
        Ok(tables.movies.values().map(|m| tables.tagged(m)).collect())
    }

    async fn favorite_movies(&self, user_id: UserId) -> AppResult<Vec<TaggedMovie>> {
        let tables = self.inner.read().await;
        Ok(tables
            .favorites
            .range((user_id, MovieId::MIN)..=(user_id, MovieId::MAX))
            .filter_map(|(_, movie_id)| tables.movies.get(movie_id))
            .map(|m| tables.tagged(m))
            .collect())
    }

    async fn favorite_count(&self, movie_id: MovieId) -> AppResult<u64> {
        Ok(self.inner.read().await.favorite_count(movie_id))
    }

    async fn list_movies(&self, query: &MovieQuery, page: PageRequest) -> AppResult<Page<Movie>> {
        let tables = self.inner.read().await;
        let search = query.search();

        let mut movies: Vec<&Movie> = tables
            .movies
            .values()
            .filter(|m| {
                search.map_or(true, |s| {
                    contains_ignore_case(&m.title, s)
                        || m.director
                            .as_deref()
                            .map_or(false, |d| contains_ignore_case(d, s))
                })
            })
            .filter(|m| {
                query
                    .genre
                    .map_or(true, |g| tables.movie_genres.contains(&(m.id, g)))
            })
            .filter(|m| query.year_min.map_or(true, |y| m.year.map_or(false, |my| my >= y)))
            .filter(|m| query.year_max.map_or(true, |y| m.year.map_or(false, |my| my <= y)))
            .collect();

        movies.sort_by(|a, b| {
            let primary = match query.sort_by {
                MovieSort::Rating => a.average_rating.total_cmp(&b.average_rating),
                MovieSort::Year => a.year.cmp(&b.year),
                MovieSort::Favorites => tables
                    .favorite_count(a.id)
                    .cmp(&tables.favorite_count(b.id)),
            };
            let primary = match query.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then(a.id.cmp(&b.id))
        });

        Ok(Page::from_vec(movies.into_iter().cloned().collect(), page))
    }

    async fn recently_reviewed_movies(&self, scan: u32, limit: u32) -> AppResult<Vec<Movie>> {
        let tables = self.inner.read().await;
        let mut seen = HashSet::new();
        Ok(tables
            .newest_reviews(|_| true)
            .into_iter()
            .take(scan as usize)
            .filter(|d| seen.insert(d.review.movie_id))
            .filter_map(|d| tables.movies.get(&d.review.movie_id).cloned())
            .take(limit as usize)
            .collect())
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let tables = self.inner.read().await;
        let mut genres: Vec<Genre> = tables.genres.values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn movie_reviews(
        &self,
        movie_id: MovieId,
        page: PageRequest,
    ) -> AppResult<Page<ReviewDetail>> {
        let tables = self.inner.read().await;
        Ok(Page::from_vec(
            tables.newest_reviews(|r| r.movie_id == movie_id),
            page,
        ))
    }

    async fn user_reviews(&self, user_id: UserId) -> AppResult<Vec<ReviewDetail>> {
        Ok(self
            .inner
            .read()
            .await
            .newest_reviews(|r| r.user_id == user_id))
    }

    async fn list_users(&self, query: &UserQuery, page: PageRequest) -> AppResult<Page<User>> {
        let tables = self.inner.read().await;
        let search = query.search();

        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| {
                search.map_or(true, |s| {
                    contains_ignore_case(&u.username, s) || contains_ignore_case(&u.email, s)
                })
            })
            .filter(|u| match query.role {
                RoleFilter::All => true,
                RoleFilter::Admin => u.is_admin,
                RoleFilter::User => !u.is_admin,
            })
            .filter(|u| match query.status {
                StatusFilter::All => true,
                StatusFilter::Active => u.is_active,
                StatusFilter::Banned => !u.is_active,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(Page::from_vec(users, page))
    }

    async fn list_reviews(
        &self,
        query: &ReviewQuery,
        page: PageRequest,
    ) -> AppResult<Page<ReviewDetail>> {
        let tables = self.inner.read().await;
        let search = query.search();
        let from = query.date_from.map(start_of_day);
        let until = query
            .date_to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(start_of_day);

        let reviews = tables.newest_reviews(|r| {
            search.map_or(true, |s| contains_ignore_case(&r.content, s))
                && query.rating.map_or(true, |rating| r.rating == rating)
                && from.map_or(true, |f| r.created_at >= f)
                && until.map_or(true, |u| r.created_at < u)
        });

        Ok(Page::from_vec(reviews, page))
    }

    async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let tables = self.inner.read().await;
        let today = start_of_day(Utc::now().date_naive());
        Ok(DashboardStats {
            total_users: tables.users.len() as u64,
            total_movies: tables.movies.len() as u64,
            total_reviews: tables.reviews.len() as u64,
            new_users_today: tables
                .users
                .values()
                .filter(|u| u.created_at >= today)
                .count() as u64,
        })
    }
}

/// Unit of work over a [`MemoryStore`]
pub struct MemoryTx {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_movie(&mut self, movie_id: MovieId) -> AppResult<Option<Movie>> {
        Ok(self.staged.movies.get(&movie_id).cloned())
    }

    async fn insert_review(&mut self, review: NewReview) -> AppResult<Review> {
        if !self.staged.users.contains_key(&review.user_id) {
            return Err(AppError::not_found("user", review.user_id));
        }
        if !self.staged.movies.contains_key(&review.movie_id) {
            return Err(AppError::not_found("movie", review.movie_id));
        }

        let review = Review {
            id: self.staged.allocate_id(),
            content: review.content,
            rating: review.rating,
            created_at: Utc::now(),
            user_id: review.user_id,
            movie_id: review.movie_id,
        };
        self.staged.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn reviews_by_ids(&mut self, ids: &[ReviewId]) -> AppResult<Vec<Review>> {
        let wanted: BTreeSet<ReviewId> = ids.iter().copied().collect();
        Ok(wanted
            .iter()
            .filter_map(|id| self.staged.reviews.get(id).cloned())
            .collect())
    }

    async fn reviews_by_author(&mut self, user_id: UserId) -> AppResult<Vec<Review>> {
        Ok(self
            .staged
            .reviews
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn remove_review(&mut self, review_id: ReviewId) -> AppResult<()> {
        self.staged
            .reviews
            .remove(&review_id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("review", review_id))
    }

    async fn movie_ratings(&mut self, movie_id: MovieId) -> AppResult<Vec<Rating>> {
        Ok(self
            .staged
            .reviews
            .values()
            .filter(|r| r.movie_id == movie_id)
            .map(|r| r.rating)
            .collect())
    }

    async fn store_average_rating(&mut self, movie_id: MovieId, average: f64) -> AppResult<()> {
        let movie = self
            .staged
            .movies
            .get_mut(&movie_id)
            .ok_or_else(|| AppError::not_found("movie", movie_id))?;
        movie.average_rating = average;
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> AppResult<User> {
        self.staged
            .ensure_unique_user(&user.username, &user.email, None)?;

        let user = User {
            id: self.staged.allocate_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            is_active: true,
            created_at: Utc::now(),
        };
        self.staged.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, user_id: UserId, update: UserUpdate) -> AppResult<User> {
        self.staged
            .ensure_unique_user(&update.username, &update.email, Some(user_id))?;

        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("user", user_id))?;
        user.username = update.username;
        user.email = update.email;
        user.is_admin = update.is_admin;
        user.is_active = update.is_active;
        Ok(user.clone())
    }

    async fn remove_user(&mut self, user_id: UserId) -> AppResult<()> {
        if self.staged.reviews.values().any(|r| r.user_id == user_id) {
            return Err(AppError::Internal(format!(
                "user {} still has reviews",
                user_id
            )));
        }
        self.staged.favorites.retain(|(user, _)| *user != user_id);
        self.staged
            .users
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("user", user_id))
    }

    async fn insert_movie(&mut self, draft: MovieDraft) -> AppResult<Movie> {
        let movie = Movie {
            id: self.staged.allocate_id(),
            title: draft.title,
            year: draft.year,
            director: draft.director,
            description: draft.description,
            poster_url: draft.poster_url,
            average_rating: 0.0,
        };
        self.staged.movies.insert(movie.id, movie.clone());
        self.staged.retag(movie.id, &draft.genre_ids);
        Ok(movie)
    }

    async fn update_movie(&mut self, movie_id: MovieId, draft: MovieDraft) -> AppResult<Movie> {
        let movie = self
            .staged
            .movies
            .get_mut(&movie_id)
            .ok_or_else(|| AppError::not_found("movie", movie_id))?;
        movie.title = draft.title;
        movie.year = draft.year;
        movie.director = draft.director;
        movie.description = draft.description;
        movie.poster_url = draft.poster_url;
        let movie = movie.clone();

        self.staged.retag(movie_id, &draft.genre_ids);
        Ok(movie)
    }

    async fn remove_movie(&mut self, movie_id: MovieId) -> AppResult<()> {
        self.staged.reviews.retain(|_, r| r.movie_id != movie_id);
        self.staged.movie_genres.retain(|(movie, _)| *movie != movie_id);
        self.staged.favorites.retain(|(_, movie)| *movie != movie_id);
        self.staged
            .movies
            .remove(&movie_id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("movie", movie_id))
    }

    async fn genres_by_ids(&mut self, ids: &[GenreId]) -> AppResult<Vec<Genre>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.genres.get(id).cloned())
            .collect())
    }

    async fn insert_genre(&mut self, name: String) -> AppResult<Genre> {
        if self.staged.genres.values().any(|g| g.name == name) {
            return Err(AppError::Conflict(format!("genre {} already exists", name)));
        }
        let genre = Genre {
            id: self.staged.allocate_id(),
            name,
        };
        self.staged.genres.insert(genre.id, genre.clone());
        Ok(genre)
    }

    async fn find_genre(&mut self, genre_id: GenreId) -> AppResult<Option<Genre>> {
        Ok(self.staged.genres.get(&genre_id).cloned())
    }

    async fn genre_usage(&mut self, genre_id: GenreId) -> AppResult<u64> {
        Ok(self
            .staged
            .movie_genres
            .iter()
            .filter(|(_, genre)| *genre == genre_id)
            .count() as u64)
    }

    async fn remove_genre(&mut self, genre_id: GenreId) -> AppResult<()> {
        self.staged
            .genres
            .remove(&genre_id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("genre", genre_id))
    }

    async fn toggle_favorite(&mut self, user_id: UserId, movie_id: MovieId) -> AppResult<bool> {
        let pair = (user_id, movie_id);
        if self.staged.favorites.remove(&pair) {
            Ok(false)
        } else {
            self.staged.favorites.insert(pair);
            Ok(true)
        }
    }

    async fn commit(&mut self) -> AppResult<()> {
        *self.guard = self.staged.clone();
        Ok(())
    }
}
