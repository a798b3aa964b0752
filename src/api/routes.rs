use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{self, account, admin, catalog};
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/home", get(catalog::home))
        .route("/genres", get(catalog::list_genres))
        .route("/movies", get(catalog::list_movies))
        .route("/movies/:id", get(catalog::movie_detail))
        .route(
            "/movies/:id/reviews",
            get(catalog::movie_reviews).post(account::post_review),
        )
        .route("/movies/:id/similar", get(catalog::similar_movies))
        .route("/movies/:id/favorite", post(account::toggle_favorite))
        .route("/recommendations", get(catalog::recommendations))
        // Accounts
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route("/me/favorites", get(account::my_favorites))
        .route("/me/reviews", get(account::my_reviews))
        .nest("/admin", admin_routes())
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route(
            "/users/:id",
            get(admin::user_detail)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
        .route("/users/:id/toggle-status", post(admin::toggle_user_status))
        .route("/movies", get(admin::list_movies).post(admin::create_movie))
        .route(
            "/movies/:id",
            put(admin::update_movie).delete(admin::delete_movie),
        )
        .route("/genres", get(admin::list_genres).post(admin::create_genre))
        .route("/genres/:id", delete(admin::delete_genre))
        .route("/reviews", get(admin::list_reviews))
        .route("/reviews/batch-delete", post(admin::batch_delete_reviews))
        .route(
            "/reviews/:id",
            get(admin::review_detail).delete(admin::delete_review),
        )
}
