use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub storage_root: PathBuf,
    pub photo_thumbnail_size: u32,
    pub public_image_host: Option<String>,
    pub admin_token: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let public_image_host = match std::env::var("PUBLIC_IMAGE_HOST_URL") {
            Ok(value) if !value.trim().is_empty() => Some(normalize_host_prefix(&value)?),
            _ => None,
        };

        Ok(Self {
            http_addr,
            database_url: env_or_err("DATABASE_URL")?,
            storage_root: PathBuf::from(env_or("STORAGE_ROOT", "storage")),
            photo_thumbnail_size: env_or_parse("PHOTO_THUMBNAIL_SIZE", "200")?,
            public_image_host,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
        })
    }
}

/// Public image URLs are built by appending `kind/journey/filename`, so the
/// configured prefix must end with a slash. Absolute URLs are validated up
/// front rather than at request time.
fn normalize_host_prefix(value: &str) -> Result<String> {
    let mut prefix = value.trim().to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    if prefix.contains("://") {
        Url::parse(&prefix).map_err(|err| anyhow!("invalid PUBLIC_IMAGE_HOST_URL: {}", err))?;
    } else if !prefix.starts_with('/') {
        return Err(anyhow!(
            "invalid PUBLIC_IMAGE_HOST_URL: expected an absolute URL or an absolute path"
        ));
    }
    Ok(prefix)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
