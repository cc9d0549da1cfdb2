pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::infra::{db::Db, storage::PhotoStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub store: PhotoStore,
    pub public_image_host: Option<String>,
    pub admin_token: Option<String>,
}
