use axum::{routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/signin", post(handlers::sign_in))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/signout", post(handlers::sign_out))
        .route("/auth/me", get(handlers::get_current_profile))
}

pub fn affirmations() -> Router<AppState> {
    Router::new()
        .route(
            "/affirmations",
            get(handlers::list_affirmations).post(handlers::create_affirmation),
        )
        .route("/affirmations/categories", get(handlers::list_categories))
        .route("/affirmations/daily", get(handlers::daily_affirmation))
        .route("/affirmations/liked", get(handlers::liked_affirmation_ids))
        .route("/affirmations/saved", get(handlers::saved_affirmation_ids))
        .route(
            "/affirmations/:id/like",
            post(handlers::like_affirmation).delete(handlers::unlike_affirmation),
        )
        .route(
            "/affirmations/:id/save",
            post(handlers::save_affirmation).delete(handlers::unsave_affirmation),
        )
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts).post(handlers::create_post))
        .route("/posts/liked", get(handlers::liked_post_ids))
        .route(
            "/posts/:id/like",
            post(handlers::like_post).delete(handlers::unlike_post),
        )
}

pub fn profiles() -> Router<AppState> {
    Router::new()
        .route("/profiles/:id", get(handlers::get_profile))
        .route("/profiles/:id/stats", get(handlers::get_profile_stats))
        .route("/profile", patch(handlers::update_profile))
        .route("/profile/saved", get(handlers::list_saved_affirmations))
}

pub fn resources() -> Router<AppState> {
    Router::new().route("/resources", get(handlers::list_resources))
}
