use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use tracing::warn;

use crate::domain::photo::Photo;
use crate::infra::db::Db;
use crate::infra::storage::PhotoStore;
use crate::infra::thumbs;

pub const PHOTO_PAGE_SIZE: i64 = 50;

const PHOTO_COLUMNS: &str = "id, name, latitude, longitude, description, timezone, \
     \"timestamp\", filename, filesize, height, width, hash, camera_make, camera_model, \
     focal_length, exposure, iso_speed, f_value, flash_fired, flash_manual, \
     confidentiality, journey_id, modified_at";

#[derive(Clone)]
pub struct PhotoService {
    db: Db,
    store: PhotoStore,
}

#[derive(Debug, Default)]
pub struct PhotoFilter {
    pub timestamp_gt: Option<OffsetDateTime>,
    pub timestamp_lt: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct PhotoPage {
    pub count: i64,
    pub page: i64,
    pub pages: i64,
    pub items: Vec<Photo>,
}

#[derive(Debug, Default)]
pub struct PhotoChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub confidentiality: Option<i16>,
}

#[derive(Debug)]
pub struct PhotoImport {
    pub filename: String,
    pub name: Option<String>,
    pub confidentiality: i16,
    pub timestamp: Option<OffsetDateTime>,
    pub timezone: String,
}

#[derive(Debug)]
pub enum ImportOutcome {
    Created(Photo),
    JourneyMissing,
    DuplicateFilename,
    InvalidImage,
}

impl PhotoService {
    pub fn new(db: Db, store: PhotoStore) -> Self {
        Self { db, store }
    }

    pub async fn list_photos(
        &self,
        journey_id: Option<i64>,
        filter: &PhotoFilter,
        page: i64,
    ) -> Result<PhotoPage> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM photos \
             WHERE ($1::bigint IS NULL OR journey_id = $1) \
               AND ($2::timestamptz IS NULL OR \"timestamp\" > $2) \
               AND ($3::timestamptz IS NULL OR \"timestamp\" < $3)",
        )
        .bind(journey_id)
        .bind(filter.timestamp_gt)
        .bind(filter.timestamp_lt)
        .fetch_one(self.db.pool())
        .await?;

        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos \
             WHERE ($1::bigint IS NULL OR journey_id = $1) \
               AND ($2::timestamptz IS NULL OR \"timestamp\" > $2) \
               AND ($3::timestamptz IS NULL OR \"timestamp\" < $3) \
             ORDER BY \"timestamp\", name \
             LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&sql)
            .bind(journey_id)
            .bind(filter.timestamp_gt)
            .bind(filter.timestamp_lt)
            .bind(PHOTO_PAGE_SIZE)
            .bind((page - 1) * PHOTO_PAGE_SIZE)
            .fetch_all(self.db.pool())
            .await?;

        let items = rows.iter().map(photo_from_row).collect();
        let pages = (count.max(1) + PHOTO_PAGE_SIZE - 1) / PHOTO_PAGE_SIZE;

        Ok(PhotoPage {
            count,
            page,
            pages,
            items,
        })
    }

    pub async fn get_photo(&self, photo_id: i64) -> Result<Option<Photo>> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(photo_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| photo_from_row(&row)))
    }

    /// Look a photo up by its identity pair, as the delivery endpoint does.
    pub async fn find_by_identity(&self, journey_id: i64, filename: &str) -> Result<Option<Photo>> {
        let sql =
            format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE journey_id = $1 AND filename = $2");
        let row = sqlx::query(&sql)
            .bind(journey_id)
            .bind(filename)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| photo_from_row(&row)))
    }

    /// Apply metadata changes. A confidentiality change relocates the
    /// photo's files between the public and private subtrees before the
    /// new value is persisted; any failure aborts the whole save, so a
    /// persisted confidentiality never outlives a failed file move. The
    /// `FOR UPDATE` row lock serializes concurrent saves on one photo.
    pub async fn update_photo(
        &self,
        photo_id: i64,
        changes: &PhotoChanges,
    ) -> Result<Option<Photo>> {
        let mut tx = self.db.pool().begin().await?;

        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(photo_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = row.map(|row| photo_from_row(&row)) else {
            return Ok(None);
        };

        let new_confidentiality = changes.confidentiality.unwrap_or(current.confidentiality);
        let relocated = new_confidentiality != current.confidentiality;
        if relocated {
            self.store
                .relocate(
                    current.journey_id,
                    &current.filename,
                    current.confidentiality,
                    new_confidentiality,
                )
                .context("failed to relocate photo files")?;
        }

        let update_sql = format!(
            "UPDATE photos \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 confidentiality = $4, \
                 modified_at = now() \
             WHERE id = $1 \
             RETURNING {PHOTO_COLUMNS}"
        );
        let updated = sqlx::query(&update_sql)
            .bind(photo_id)
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .bind(new_confidentiality)
            .fetch_one(&mut *tx)
            .await;

        let committed = match updated {
            Ok(row) => tx.commit().await.map(|_| row).map_err(anyhow::Error::from),
            Err(err) => Err(err.into()),
        };

        match committed {
            Ok(row) => Ok(Some(photo_from_row(&row))),
            Err(err) => {
                if relocated {
                    if let Err(undo) = self.store.relocate(
                        current.journey_id,
                        &current.filename,
                        new_confidentiality,
                        current.confidentiality,
                    ) {
                        warn!(
                            photo_id,
                            error = %undo,
                            "could not undo file relocation after failed save"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Register a new photo from raw image bytes: probe dimensions,
    /// fingerprint the content, write the original into the storage tree
    /// and insert the record. The file write happens between insert and
    /// commit so a failed write aborts the record.
    pub async fn import_photo(
        &self,
        journey_id: i64,
        import: &PhotoImport,
        data: Bytes,
    ) -> Result<ImportOutcome> {
        let journey_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM journeys WHERE id = $1)")
                .bind(journey_id)
                .fetch_one(self.db.pool())
                .await?;
        if !journey_exists {
            return Ok(ImportOutcome::JourneyMissing);
        }

        let probe = {
            let data = data.clone();
            tokio::task::spawn_blocking(move || thumbs::probe_image(&data)).await?
        };
        let Ok((width, height)) = probe else {
            return Ok(ImportOutcome::InvalidImage);
        };

        let hash = hex::encode(Sha256::digest(&data));
        let timestamp = import.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let name = import
            .name
            .clone()
            .unwrap_or_else(|| import.filename.clone());

        let mut tx = self.db.pool().begin().await?;
        let insert_sql = format!(
            "INSERT INTO photos (name, timezone, \"timestamp\", filename, filesize, \
                                 height, width, hash, confidentiality, journey_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (journey_id, filename) DO NOTHING \
             RETURNING {PHOTO_COLUMNS}"
        );
        let inserted = sqlx::query(&insert_sql)
            .bind(&name)
            .bind(&import.timezone)
            .bind(timestamp)
            .bind(&import.filename)
            .bind(data.len() as i64)
            .bind(height as i32)
            .bind(width as i32)
            .bind(&hash)
            .bind(import.confidentiality)
            .bind(journey_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = inserted else {
            return Ok(ImportOutcome::DuplicateFilename);
        };

        let written = {
            let store = self.store.clone();
            let filename = import.filename.clone();
            let confidentiality = import.confidentiality;
            let data = data.clone();
            tokio::task::spawn_blocking(move || {
                store.write_original(journey_id, &filename, confidentiality, &data)
            })
            .await?
        };
        written.context("failed to write photo file")?;

        match tx.commit().await {
            Ok(()) => Ok(ImportOutcome::Created(photo_from_row(&row))),
            Err(err) => {
                self.store
                    .remove_original(journey_id, &import.filename, import.confidentiality);
                Err(err.into())
            }
        }
    }

    pub async fn ensure_thumbnail(&self, photo: &Photo) -> Result<bool> {
        let store = self.store.clone();
        let journey_id = photo.journey_id;
        let filename = photo.filename.clone();
        let confidentiality = photo.confidentiality;
        let modified_at = photo.modified_at;

        tokio::task::spawn_blocking(move || {
            store.ensure_thumbnail(journey_id, &filename, confidentiality, modified_at)
        })
        .await?
    }

    /// Walk every photo and regenerate stale or missing thumbnails.
    /// Individual failures are logged and skipped; the returned count only
    /// covers thumbnails actually written.
    pub async fn regenerate_thumbnails(&self) -> Result<u64> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;
        let photos: Vec<Photo> = rows.iter().map(photo_from_row).collect();

        let store = self.store.clone();
        let regenerated = tokio::task::spawn_blocking(move || {
            let mut regenerated = 0u64;
            for photo in &photos {
                match store.ensure_thumbnail(
                    photo.journey_id,
                    &photo.filename,
                    photo.confidentiality,
                    photo.modified_at,
                ) {
                    Ok(true) => regenerated += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(photo_id = photo.id, error = %err, "thumbnail regeneration failed")
                    }
                }
            }
            regenerated
        })
        .await?;

        Ok(regenerated)
    }
}

fn photo_from_row(row: &PgRow) -> Photo {
    let id: i64 = row.get("id");
    Photo {
        url: format!("/photos/{}", id),
        id,
        name: row.get("name"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        description: row.get("description"),
        timestamp: row.get("timestamp"),
        timezone: row.get("timezone"),
        filename: row.get("filename"),
        filesize: row.get("filesize"),
        height: row.get("height"),
        width: row.get("width"),
        hash: row.get("hash"),
        camera_make: row.get("camera_make"),
        camera_model: row.get("camera_model"),
        focal_length: row.get("focal_length"),
        exposure: row.get("exposure"),
        iso_speed: row.get("iso_speed"),
        f_value: row.get("f_value"),
        flash_fired: row.get("flash_fired"),
        flash_manual: row.get("flash_manual"),
        confidentiality: row.get("confidentiality"),
        journey_id: row.get("journey_id"),
        modified_at: row.get("modified_at"),
        access_url: None,
        thumb_url: None,
    }
}
