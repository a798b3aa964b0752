use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};

use movie_review_api::api::{create_router, AppState};

const SUPER_ADMIN: &str = "admin@admin.com";

fn create_test_server() -> TestServer {
    let state = AppState::in_memory(SUPER_ADMIN);
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

fn user_header() -> HeaderName {
    HeaderName::from_static("x-user-id")
}

fn as_user(id: i64) -> HeaderValue {
    HeaderValue::from_str(&id.to_string()).unwrap()
}

async fn register(server: &TestServer, username: &str, email: &str) -> i64 {
    let response = server
        .post("/api/v1/register")
        .json(&json!({
            "username": username,
            "email": email,
            "password": "secret123"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_genre(server: &TestServer, admin: i64, name: &str) -> i64 {
    let response = server
        .post("/api/v1/admin/genres")
        .add_header(user_header(), as_user(admin))
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_movie(server: &TestServer, admin: i64, title: &str, genre_ids: &[i64]) -> i64 {
    let response = server
        .post("/api/v1/admin/movies")
        .add_header(user_header(), as_user(admin))
        .json(&json!({ "title": title, "year": 2000, "genre_ids": genre_ids }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn post_review(server: &TestServer, user: i64, movie: i64, rating: i64) -> TestResponse {
    server
        .post(&format!("/api/v1/movies/{}/reviews", movie))
        .add_header(user_header(), as_user(user))
        .json(&json!({ "content": "Worth watching", "rating": rating }))
        .await
}

async fn average_rating(server: &TestServer, movie: i64) -> f64 {
    let response = server.get(&format!("/api/v1/movies/{}", movie)).await;
    response.assert_status_ok();
    response.json::<Value>()["movie"]["average_rating"]
        .as_f64()
        .unwrap()
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();
    let response = server.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_register_and_login() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    assert_ne!(admin, alice);

    let response = server
        .post("/api/v1/login")
        .json(&json!({ "email": "alice@example.com", "password": "secret123" }))
        .await;
    response.assert_status_ok();
    let user: Value = response.json();
    assert_eq!(user["username"], "alice");
    assert_eq!(user["is_admin"], false);
    assert!(user.get("password_hash").is_none());

    let response = server
        .post("/api/v1/login")
        .json(&json!({ "email": "alice@example.com", "password": "wrong-one" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/register")
        .json(&json!({ "username": "alice", "email": "other@example.com", "password": "secret123" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_acting_user_is_required() {
    let server = create_test_server();
    let response = server.get("/api/v1/recommendations").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/v1/recommendations")
        .add_header(user_header(), HeaderValue::from_static("abc"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let alice = register(&server, "alice", "alice@example.com").await;
    let response = server
        .get("/api/v1/admin/dashboard")
        .add_header(user_header(), as_user(alice))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_review_updates_average_rating() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    let movie = create_movie(&server, admin, "Heat", &[]).await;

    let mut review_ids = Vec::new();
    for rating in [5, 3, 4] {
        let response = post_review(&server, alice, movie, rating).await;
        response.assert_status(StatusCode::CREATED);
        review_ids.push(response.json::<Value>()["review"]["id"].as_i64().unwrap());
    }
    assert_eq!(average_rating(&server, movie).await, 4.0);

    let response = server
        .delete(&format!("/api/v1/admin/reviews/{}", review_ids[1]))
        .add_header(user_header(), as_user(admin))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["rating"]["average_rating"], 4.5);
    assert_eq!(average_rating(&server, movie).await, 4.5);

    let response = server
        .get(&format!("/api/v1/movies/{}/reviews", movie))
        .await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"][0]["author"], "alice");
}

#[tokio::test]
async fn test_out_of_range_rating_changes_nothing() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    let movie = create_movie(&server, admin, "Heat", &[]).await;
    post_review(&server, alice, movie, 2)
        .await
        .assert_status(StatusCode::CREATED);

    for rating in [0, 6] {
        post_review(&server, alice, movie, rating)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    assert_eq!(average_rating(&server, movie).await, 2.0);
    let response = server
        .get("/api/v1/me/reviews")
        .add_header(user_header(), as_user(alice))
        .await;
    assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_delete_recomputes_each_movie() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    let heat = create_movie(&server, admin, "Heat", &[]).await;
    let alien = create_movie(&server, admin, "Alien", &[]).await;

    let mut to_delete = Vec::new();
    for (movie, rating) in [(heat, 5), (heat, 1), (alien, 4)] {
        let response = post_review(&server, alice, movie, rating).await;
        to_delete.push(response.json::<Value>()["review"]["id"].as_i64().unwrap());
    }
    post_review(&server, alice, alien, 2).await;
    to_delete.push(424242);

    let response = server
        .post("/api/v1/admin/reviews/batch-delete")
        .add_header(user_header(), as_user(admin))
        .json(&json!({ "review_ids": to_delete }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["deleted"].as_array().unwrap().len(), 3);
    assert_eq!(body["missing"], json!([424242]));
    assert_eq!(body["recomputed"].as_array().unwrap().len(), 2);

    assert_eq!(average_rating(&server, heat).await, 0.0);
    assert_eq!(average_rating(&server, alien).await, 2.0);

    let response = server
        .post("/api/v1/admin/reviews/batch-delete")
        .add_header(user_header(), as_user(admin))
        .json(&json!({ "review_ids": [] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_follow_favorite_genres() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    let bob = register(&server, "bob", "bob@example.com").await;

    let action = create_genre(&server, admin, "Action").await;
    let drama = create_genre(&server, admin, "Drama").await;
    let comedy = create_genre(&server, admin, "Comedy").await;

    let favorite = create_movie(&server, admin, "Heat", &[action, drama]).await;
    let action_movie = create_movie(&server, admin, "Ronin", &[action]).await;
    let drama_movie = create_movie(&server, admin, "Magnolia", &[drama]).await;
    let comedy_movie = create_movie(&server, admin, "Airplane", &[comedy]).await;

    for (movie, rating) in [(action_movie, 3), (drama_movie, 4), (comedy_movie, 5)] {
        post_review(&server, bob, movie, rating)
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .post(&format!("/api/v1/movies/{}/favorite", favorite))
        .add_header(user_header(), as_user(alice))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["favorited"], true);

    let response = server
        .get("/api/v1/recommendations")
        .add_header(user_header(), as_user(alice))
        .await;
    response.assert_status_ok();
    assert_eq!(ids(&response.json()), vec![drama_movie, action_movie]);

    // no favorites: top rated overall
    let response = server
        .get("/api/v1/recommendations?limit=2")
        .add_header(user_header(), as_user(bob))
        .await;
    assert_eq!(ids(&response.json()), vec![comedy_movie, drama_movie]);

    let response = server
        .get("/api/v1/home")
        .add_header(user_header(), as_user(alice))
        .await;
    response.assert_status_ok();
    let home: Value = response.json();
    assert_eq!(ids(&home["recommended"]), vec![drama_movie, action_movie]);
    assert_eq!(home["recently_reviewed"][0]["id"], comedy_movie);
}

#[tokio::test]
async fn test_similar_movies_rank_by_overlap() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let a = create_genre(&server, admin, "Sci-Fi").await;
    let b = create_genre(&server, admin, "Horror").await;
    let c = create_genre(&server, admin, "Western").await;

    let reference = create_movie(&server, admin, "Alien", &[a, b]).await;
    let m1 = create_movie(&server, admin, "Solaris", &[a]).await;
    let m2 = create_movie(&server, admin, "The Thing", &[a, b]).await;
    create_movie(&server, admin, "Unforgiven", &[c]).await;

    let response = server
        .get(&format!("/api/v1/movies/{}/similar", reference))
        .await;
    response.assert_status_ok();
    assert_eq!(ids(&response.json()), vec![m2, m1]);

    let response = server.get("/api/v1/movies/9999/similar").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_favorite_toggle_twice_restores_absence() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    let movie = create_movie(&server, admin, "Heat", &[]).await;

    for expected in [true, false] {
        let response = server
            .post(&format!("/api/v1/movies/{}/favorite", movie))
            .add_header(user_header(), as_user(alice))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["favorited"], expected);
    }

    let response = server
        .get("/api/v1/me/favorites")
        .add_header(user_header(), as_user(alice))
        .await;
    assert!(response.json::<Value>().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_guards() {
    let server = create_test_server();
    let root = register(&server, "root", SUPER_ADMIN).await;
    let moderator = register(&server, "moderator", "mod@example.com").await;

    let response = server
        .put(&format!("/api/v1/admin/users/{}", moderator))
        .add_header(user_header(), as_user(root))
        .json(&json!({
            "username": "moderator",
            "email": "mod@example.com",
            "is_admin": true,
            "is_active": true
        }))
        .await;
    response.assert_status_ok();

    // cannot touch the super admin
    let response = server
        .delete(&format!("/api/v1/admin/users/{}", root))
        .add_header(user_header(), as_user(moderator))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post(&format!("/api/v1/admin/users/{}/toggle-status", root))
        .add_header(user_header(), as_user(moderator))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // cannot demote oneself
    let response = server
        .put(&format!("/api/v1/admin/users/{}", moderator))
        .add_header(user_header(), as_user(moderator))
        .json(&json!({
            "username": "moderator",
            "email": "mod@example.com",
            "is_admin": false,
            "is_active": true
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oversized_username_edit_is_bad_request() {
    let server = create_test_server();
    let root = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;

    let response = server
        .put(&format!("/api/v1/admin/users/{}", alice))
        .add_header(user_header(), as_user(root))
        .json(&json!({
            "username": "a".repeat(30),
            "email": "alice@example.com",
            "is_admin": false,
            "is_active": true
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_super_admin_email_case_variant_is_conflict() {
    let server = create_test_server();
    register(&server, "root", SUPER_ADMIN).await;

    let response = server
        .post("/api/v1/register")
        .json(&json!({
            "username": "mallory",
            "email": SUPER_ADMIN.to_uppercase(),
            "password": "secret1"
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_banned_user_is_rejected() {
    let server = create_test_server();
    let root = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;

    let response = server
        .post(&format!("/api/v1/admin/users/{}/toggle-status", alice))
        .add_header(user_header(), as_user(root))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["is_active"], false);

    let response = server
        .get("/api/v1/me/reviews")
        .add_header(user_header(), as_user(alice))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tagged_genre_delete_conflicts() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let drama = create_genre(&server, admin, "Drama").await;
    let movie = create_movie(&server, admin, "Heat", &[drama]).await;

    let response = server
        .delete(&format!("/api/v1/admin/genres/{}", drama))
        .add_header(user_header(), as_user(admin))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server
        .delete(&format!("/api/v1/admin/movies/{}", movie))
        .add_header(user_header(), as_user(admin))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .delete(&format!("/api/v1/admin/genres/{}", drama))
        .add_header(user_header(), as_user(admin))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/api/v1/genres").await;
    assert!(response.json::<Value>().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_genre_id_is_invalid_input() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let response = server
        .post("/api/v1/admin/movies")
        .add_header(user_header(), as_user(admin))
        .json(&json!({ "title": "Heat", "genre_ids": [77] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_user_recomputes_ratings() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let alice = register(&server, "alice", "alice@example.com").await;
    let bob = register(&server, "bob", "bob@example.com").await;
    let movie = create_movie(&server, admin, "Heat", &[]).await;

    post_review(&server, alice, movie, 1).await;
    post_review(&server, bob, movie, 5).await;
    assert_eq!(average_rating(&server, movie).await, 3.0);

    let response = server
        .delete(&format!("/api/v1/admin/users/{}", alice))
        .add_header(user_header(), as_user(admin))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["removed_reviews"], 1);
    assert_eq!(average_rating(&server, movie).await, 5.0);

    let response = server
        .get(&format!("/api/v1/admin/users/{}", alice))
        .add_header(user_header(), as_user(admin))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_browse_movies_with_filters() {
    let server = create_test_server();
    let admin = register(&server, "root", SUPER_ADMIN).await;
    let crime = create_genre(&server, admin, "Crime").await;
    let heat = create_movie(&server, admin, "Heat", &[crime]).await;
    create_movie(&server, admin, "Up", &[]).await;

    let response = server.get("/api/v1/movies?q=HEA").await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], heat);

    let response = server
        .get(&format!("/api/v1/movies?genre={}&per_page=1", crime))
        .await;
    let page: Value = response.json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["has_next"], false);

    let response = server.get("/api/v1/movies?per_page=1").await;
    let page: Value = response.json();
    assert_eq!(page["total"], 2);
    assert_eq!(page["next_page"], 2);
}
