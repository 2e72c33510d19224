use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::affirmations())
        .merge(routes::posts())
        .merge(routes::profiles())
        .merge(routes::resources());

    Router::new().nest("/v1", api).with_state(state)
}
