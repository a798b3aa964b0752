use serde::{Deserialize, Serialize};

use crate::{
    audit::{self, DbAction, Entity},
    db::Store,
    error::{AppError, AppResult},
    models::{MovieId, NewUser, User},
    services::{password::PasswordHasher, validate},
};

const MIN_PASSWORD_LEN: usize = 6;

/// Sign-up payload
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    fn validate(&self) -> AppResult<()> {
        validate::username(self.username.trim())?;
        validate::email(&validate::normalize_email(&self.email))?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Creates an account
///
/// Emails are stored lowercased and are unique regardless of case. The first
/// account registered with the configured super admin email becomes an admin;
/// once it exists that address is taken, so the grant cannot be repeated.
pub async fn register(
    store: &dyn Store,
    hasher: &PasswordHasher,
    super_admin_email: &str,
    registration: Registration,
) -> AppResult<User> {
    registration.validate()?;

    let email = validate::normalize_email(&registration.email);
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "email {} is already registered",
            email
        )));
    }
    let is_admin = email == validate::normalize_email(super_admin_email);
    let password_hash = hasher.hash_password(&registration.password)?;

    let mut tx = store.begin().await?;
    let user = tx
        .insert_user(NewUser {
            username: registration.username.trim().to_string(),
            email,
            password_hash,
            is_admin,
        })
        .await?;
    tx.commit().await?;

    tracing::info!(
        target: "audit",
        user_id = user.id,
        username = %user.username,
        email = %user.email,
        is_admin = user.is_admin,
        "User registered"
    );

    Ok(user)
}

/// Checks credentials and returns the account they belong to
pub async fn authenticate(
    store: &dyn Store,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
) -> AppResult<User> {
    let email = validate::normalize_email(email);
    let user = match store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            tracing::warn!(target: "audit", %email, reason = "unknown email", "Login failed");
            return Err(AppError::Unauthorized("invalid email or password".to_string()));
        }
    };

    if !hasher.verify_password(password, &user.password_hash)? {
        tracing::warn!(target: "audit", %email, reason = "wrong password", "Login failed");
        return Err(AppError::Unauthorized("invalid email or password".to_string()));
    }

    if !user.is_active {
        tracing::warn!(target: "audit", %email, reason = "banned", "Login failed");
        return Err(AppError::Forbidden("account is disabled".to_string()));
    }

    tracing::info!(target: "audit", user_id = user.id, username = %user.username, "Login succeeded");
    Ok(user)
}

/// New favorite state of a movie for one user
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FavoriteToggle {
    pub movie_id: MovieId,
    pub favorited: bool,
    pub favorite_count: u64,
}

/// Adds the movie to the user's favorites, or removes it when already there
pub async fn toggle_favorite(
    store: &dyn Store,
    user: &User,
    movie_id: MovieId,
) -> AppResult<FavoriteToggle> {
    let mut tx = store.begin().await?;
    let movie = tx
        .lock_movie(movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("movie", movie_id))?;
    let favorited = tx.toggle_favorite(user.id, movie_id).await?;
    tx.commit().await?;
    drop(tx);

    let action = if favorited {
        DbAction::Add
    } else {
        DbAction::Delete
    };
    audit::record(action, Entity::Favorite, None, &movie.title, &user.username, None);

    Ok(FavoriteToggle {
        movie_id,
        favorited,
        favorite_count: store.favorite_count(movie_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{MovieDraft, PageRequest, RoleFilter, UserQuery},
    };

    fn registration(username: &str, email: &str, password: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new();

        let user = register(
            &store,
            &hasher,
            "admin@admin.com",
            registration("alice", "alice@example.com", "secret1"),
        )
        .await
        .unwrap();
        assert!(!user.is_admin);
        assert!(user.is_active);
        assert_ne!(user.password_hash, "secret1");

        let logged_in = authenticate(&store, &hasher, "alice@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let err = authenticate(&store, &hasher, "alice@example.com", "wrong!!")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_super_admin_email_registers_admin() {
        let store = MemoryStore::new();
        let user = register(
            &store,
            &PasswordHasher::new(),
            "admin@admin.com",
            registration("root", "Admin@Admin.com", "secret1"),
        )
        .await
        .unwrap();
        assert!(user.is_admin);
        assert_eq!(user.email, "admin@admin.com");
    }

    #[tokio::test]
    async fn test_super_admin_email_cannot_be_claimed_twice() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new();
        register(
            &store,
            &hasher,
            "admin@admin.com",
            registration("root", "admin@admin.com", "secret1"),
        )
        .await
        .unwrap();

        for variant in ["ADMIN@admin.com", " Admin@Admin.Com "] {
            let err = register(
                &store,
                &hasher,
                "admin@admin.com",
                registration("mallory", variant, "secret1"),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }
        assert!(store.find_user_by_email("mallory@admin.com").await.unwrap().is_none());
        let admins = store
            .list_users(
                &UserQuery {
                    role: RoleFilter::Admin,
                    ..Default::default()
                },
                PageRequest::new(1, 10),
            )
            .await
            .unwrap();
        assert_eq!(admins.total, 1);
    }

    #[tokio::test]
    async fn test_login_ignores_email_case() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new();
        register(
            &store,
            &hasher,
            "admin@admin.com",
            registration("alice", "Alice@Example.com", "secret1"),
        )
        .await
        .unwrap();

        let user = authenticate(&store, &hasher, "ALICE@example.COM", "secret1")
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new();

        for bad in [
            registration("al", "al@example.com", "secret1"),
            registration("alice", "not-an-email", "secret1"),
            registration("alice", "alice@example.com", "short"),
        ] {
            let err = register(&store, &hasher, "admin@admin.com", bad)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new();
        register(&store, &hasher, "admin@admin.com", registration("alice", "a@example.com", "secret1"))
            .await
            .unwrap();

        let err = register(&store, &hasher, "admin@admin.com", registration("alicia", "a@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_toggle_favorite_twice_restores_absence() {
        let store = MemoryStore::new();
        let user = register(
            &store,
            &PasswordHasher::new(),
            "admin@admin.com",
            registration("alice", "alice@example.com", "secret1"),
        )
        .await
        .unwrap();

        let mut tx = store.begin().await.unwrap();
        let movie = tx
            .insert_movie(MovieDraft {
                title: "Heat".to_string(),
                year: None,
                director: None,
                description: None,
                poster_url: None,
                genre_ids: vec![],
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let first = toggle_favorite(&store, &user, movie.id).await.unwrap();
        assert!(first.favorited);
        assert_eq!(first.favorite_count, 1);

        let second = toggle_favorite(&store, &user, movie.id).await.unwrap();
        assert!(!second.favorited);
        assert_eq!(second.favorite_count, 0);
        assert!(store.favorite_movies(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_favorite_missing_movie() {
        let store = MemoryStore::new();
        let user = register(
            &store,
            &PasswordHasher::new(),
            "admin@admin.com",
            registration("alice", "alice@example.com", "secret1"),
        )
        .await
        .unwrap();

        let err = toggle_favorite(&store, &user, 77).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
