use axum::Router;
use tower_http::cors::CorsLayer;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser, MaybeAuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::journeys())
        .merge(routes::photos())
        .merge(routes::locations())
        .merge(routes::images())
        .merge(routes::admin())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
