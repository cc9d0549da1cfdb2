use axum::{routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn journeys() -> Router<AppState> {
    Router::new()
        .route("/journeys", get(handlers::list_journeys))
        .route("/journeys/:id", get(handlers::get_journey))
        .route("/journeys/:id/photos", get(handlers::list_journey_photos))
}

pub fn photos() -> Router<AppState> {
    Router::new()
        .route("/photos", get(handlers::list_photos))
        .route("/photos/:id", get(handlers::get_photo))
}

pub fn locations() -> Router<AppState> {
    Router::new()
        .route("/locations", get(handlers::list_locations))
        .route("/locations/:id", get(handlers::get_location))
}

pub fn images() -> Router<AppState> {
    Router::new().route(
        "/image/:visibility/:kind/:journey_id/:filename",
        get(handlers::photo_file),
    )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/photos/:id", patch(handlers::update_photo))
        .route(
            "/admin/journeys/:journey_id/photos",
            post(handlers::import_photo),
        )
        .route(
            "/admin/thumbnails/regenerate",
            post(handlers::regenerate_thumbnails),
        )
}
