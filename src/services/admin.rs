//! Administration: dashboard, user moderation and catalog maintenance

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    audit::{self, DbAction, Entity},
    db::{Store, StoreTx},
    error::{AppError, AppResult},
    models::{
        DashboardStats, Genre, GenreId, Movie, MovieDraft, MovieId, MovieQuery, MovieSort, Page,
        PageRequest, ReviewDetail, ReviewQuery, SortOrder, TaggedMovie, User, UserId, UserQuery,
        UserUpdate,
    },
    services::{
        rating::{self, RatingUpdate},
        validate,
    },
};

/// Rows shown in each "newest" list of the dashboard
pub const DASHBOARD_RECENT: u32 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub recent_users: Vec<User>,
    pub recent_reviews: Vec<ReviewDetail>,
}

pub async fn dashboard(store: &dyn Store) -> AppResult<Dashboard> {
    let recent = PageRequest::new(1, DASHBOARD_RECENT);
    Ok(Dashboard {
        stats: store.dashboard_stats().await?,
        recent_users: store.list_users(&UserQuery::default(), recent).await?.items,
        recent_reviews: store
            .list_reviews(&ReviewQuery::default(), recent)
            .await?
            .items,
    })
}

// ============================================================================
// Users
// ============================================================================

/// Who is performing the change, and which account is protected
#[derive(Debug, Clone, Copy)]
pub struct Operator<'a> {
    pub user: &'a User,
    pub super_admin_email: &'a str,
}

impl Operator<'_> {
    fn is_super_admin(&self, user: &User) -> bool {
        validate::normalize_email(&user.email) == validate::normalize_email(self.super_admin_email)
    }

    /// Rejects demoting, banning or deleting oneself or the super admin
    fn guard(&self, target: &User, demote: bool, ban: bool, delete: bool) -> AppResult<()> {
        if !(demote || ban || delete) {
            return Ok(());
        }
        if target.id == self.user.id {
            return Err(AppError::Forbidden(
                "you cannot demote, ban or delete your own account".to_string(),
            ));
        }
        if self.is_super_admin(target) {
            return Err(AppError::Forbidden(
                "the super admin account cannot be demoted, banned or deleted".to_string(),
            ));
        }
        Ok(())
    }
}

/// One user with everything they own
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user: User,
    pub reviews: Vec<ReviewDetail>,
    pub favorites: Vec<Movie>,
}

pub async fn user_profile(store: &dyn Store, user_id: UserId) -> AppResult<UserProfile> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;
    let reviews = store.user_reviews(user_id).await?;
    let favorites = store
        .favorite_movies(user_id)
        .await?
        .into_iter()
        .map(|tagged| tagged.movie)
        .collect();

    Ok(UserProfile {
        user,
        reviews,
        favorites,
    })
}

pub async fn update_user(
    store: &dyn Store,
    operator: Operator<'_>,
    user_id: UserId,
    update: UserUpdate,
) -> AppResult<User> {
    let update = UserUpdate {
        username: update.username.trim().to_string(),
        email: validate::normalize_email(&update.email),
        ..update
    };
    validate::username(&update.username)?;
    validate::email(&update.email)?;

    let target = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;
    operator.guard(
        &target,
        target.is_admin && !update.is_admin,
        target.is_active && !update.is_active,
        false,
    )?;
    if operator.is_super_admin(&target) && update.email != validate::normalize_email(&target.email) {
        return Err(AppError::Forbidden(
            "the super admin email cannot be changed".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    let user = tx.update_user(user_id, update).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Edit,
        Entity::User,
        Some(user.id),
        &user.username,
        &operator.user.username,
        Some(&format!("admin:{} active:{}", user.is_admin, user.is_active)),
    );
    Ok(user)
}

/// Bans an active user or reinstates a banned one
pub async fn toggle_user_status(
    store: &dyn Store,
    operator: Operator<'_>,
    user_id: UserId,
) -> AppResult<User> {
    let target = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;
    operator.guard(&target, false, target.is_active, false)?;

    let mut tx = store.begin().await?;
    let user = tx
        .update_user(
            user_id,
            UserUpdate {
                username: target.username.clone(),
                email: target.email.clone(),
                is_admin: target.is_admin,
                is_active: !target.is_active,
            },
        )
        .await?;
    tx.commit().await?;

    let action = if user.is_active {
        DbAction::Enable
    } else {
        DbAction::Disable
    };
    audit::record(
        action,
        Entity::User,
        Some(user.id),
        &user.username,
        &operator.user.username,
        None,
    );
    Ok(user)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserDeletion {
    pub user_id: UserId,
    pub removed_reviews: usize,
    /// Movies whose average changed because the user's reviews went away
    pub recomputed: Vec<RatingUpdate>,
}

/// Deletes an account together with its reviews and favorites
pub async fn delete_user(
    store: &dyn Store,
    operator: Operator<'_>,
    user_id: UserId,
) -> AppResult<UserDeletion> {
    let target = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;
    operator.guard(&target, false, false, true)?;

    let mut tx = store.begin().await?;
    let reviews = tx.reviews_by_author(user_id).await?;
    let affected: BTreeSet<MovieId> = reviews.iter().map(|r| r.movie_id).collect();
    for movie_id in &affected {
        tx.lock_movie(*movie_id).await?;
    }
    for review in &reviews {
        tx.remove_review(review.id).await?;
    }
    let recomputed = rating::recompute_ratings(&mut *tx, &affected).await?;
    tx.remove_user(user_id).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Delete,
        Entity::User,
        Some(user_id),
        &target.username,
        &operator.user.username,
        Some(&format!("reviews:{}", reviews.len())),
    );

    Ok(UserDeletion {
        user_id,
        removed_reviews: reviews.len(),
        recomputed,
    })
}

// ============================================================================
// Movies
// ============================================================================

/// Admin catalog listing: same filters as browsing, newest year first
pub async fn list_movies(
    store: &dyn Store,
    query: MovieQuery,
    page: PageRequest,
) -> AppResult<Page<Movie>> {
    let query = MovieQuery {
        sort_by: MovieSort::Year,
        order: SortOrder::Desc,
        ..query
    };
    store.list_movies(&query, page).await
}

/// Trims the text fields, deduplicates genre ids and checks the field sizes
fn normalize_draft(draft: MovieDraft) -> AppResult<MovieDraft> {
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::InvalidInput("movie title is required".to_string()));
    }
    validate::max_len("title", &title, validate::TITLE_MAX_LEN)?;
    let trimmed = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let director = trimmed(draft.director);
    let poster_url = trimmed(draft.poster_url);
    if let Some(director) = &director {
        validate::max_len("director", director, validate::DIRECTOR_MAX_LEN)?;
    }
    if let Some(poster_url) = &poster_url {
        validate::max_len("poster_url", poster_url, validate::POSTER_URL_MAX_LEN)?;
    }
    let genre_ids: BTreeSet<GenreId> = draft.genre_ids.into_iter().collect();

    Ok(MovieDraft {
        title,
        year: draft.year,
        director,
        description: trimmed(draft.description),
        poster_url,
        genre_ids: genre_ids.into_iter().collect(),
    })
}

pub async fn create_movie(
    store: &dyn Store,
    operator: &User,
    draft: MovieDraft,
) -> AppResult<TaggedMovie> {
    let draft = normalize_draft(draft)?;

    let mut tx = store.begin().await?;
    ensure_genres_exist(&mut *tx, &draft.genre_ids).await?;
    let genre_ids = draft.genre_ids.clone();
    let movie = tx.insert_movie(draft).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Add,
        Entity::Movie,
        Some(movie.id),
        &movie.title,
        &operator.username,
        None,
    );
    Ok(TaggedMovie::new(movie, genre_ids))
}

pub async fn update_movie(
    store: &dyn Store,
    operator: &User,
    movie_id: MovieId,
    draft: MovieDraft,
) -> AppResult<TaggedMovie> {
    let draft = normalize_draft(draft)?;

    let mut tx = store.begin().await?;
    if tx.lock_movie(movie_id).await?.is_none() {
        return Err(AppError::not_found("movie", movie_id));
    }
    ensure_genres_exist(&mut *tx, &draft.genre_ids).await?;
    let genre_ids = draft.genre_ids.clone();
    let movie = tx.update_movie(movie_id, draft).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Edit,
        Entity::Movie,
        Some(movie.id),
        &movie.title,
        &operator.username,
        None,
    );
    Ok(TaggedMovie::new(movie, genre_ids))
}

/// Deletes a movie; its reviews, tags and favorites go with it
pub async fn delete_movie(store: &dyn Store, operator: &User, movie_id: MovieId) -> AppResult<()> {
    let mut tx = store.begin().await?;
    let movie = tx
        .lock_movie(movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("movie", movie_id))?;
    tx.remove_movie(movie_id).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Delete,
        Entity::Movie,
        Some(movie_id),
        &movie.title,
        &operator.username,
        None,
    );
    Ok(())
}

async fn ensure_genres_exist(tx: &mut dyn StoreTx, ids: &[GenreId]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let known: BTreeSet<GenreId> = tx.genres_by_ids(ids).await?.into_iter().map(|g| g.id).collect();
    let unknown: Vec<String> = ids
        .iter()
        .filter(|id| !known.contains(id))
        .map(|id| id.to_string())
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "unknown genre ids: {}",
            unknown.join(", ")
        )))
    }
}

// ============================================================================
// Genres
// ============================================================================

pub async fn create_genre(store: &dyn Store, operator: &User, name: &str) -> AppResult<Genre> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("genre name is required".to_string()));
    }
    validate::max_len("genre name", name, validate::GENRE_NAME_MAX_LEN)?;

    let mut tx = store.begin().await?;
    let genre = tx.insert_genre(name.to_string()).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Add,
        Entity::Genre,
        Some(genre.id),
        &genre.name,
        &operator.username,
        None,
    );
    Ok(genre)
}

/// Deletes an unused genre; `Conflict` while any movie is tagged with it
pub async fn delete_genre(store: &dyn Store, operator: &User, genre_id: GenreId) -> AppResult<()> {
    let mut tx = store.begin().await?;
    let genre = tx
        .find_genre(genre_id)
        .await?
        .ok_or_else(|| AppError::not_found("genre", genre_id))?;

    let usage = tx.genre_usage(genre_id).await?;
    if usage > 0 {
        return Err(AppError::Conflict(format!(
            "genre {} is used by {} movie(s)",
            genre.name, usage
        )));
    }
    tx.remove_genre(genre_id).await?;
    tx.commit().await?;

    audit::record(
        DbAction::Delete,
        Entity::Genre,
        Some(genre_id),
        &genre.name,
        &operator.username,
        None,
    );
    Ok(())
}
