use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::journeys::JourneyService;
use crate::app::locations::LocationService;
use crate::app::photos::{
    ImportOutcome, PhotoChanges, PhotoFilter, PhotoImport, PhotoPage, PhotoService,
};
use crate::domain::journey::Journey;
use crate::domain::location::Location;
use crate::domain::photo::Photo;
use crate::http::{AdminToken, AppError, MaybeAuthUser};
use crate::infra::storage::{is_safe_filename, ImageKind, Visibility, THUMBNAIL_SUFFIX};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Journeys
// ---------------------------------------------------------------------------

pub async fn list_journeys(State(state): State<AppState>) -> Result<Json<Vec<Journey>>, AppError> {
    let service = JourneyService::new(state.db.clone());
    let journeys = service.list_journeys().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list journeys");
        AppError::internal("failed to list journeys")
    })?;
    Ok(Json(journeys))
}

pub async fn get_journey(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Journey>, AppError> {
    let service = JourneyService::new(state.db.clone());
    let journey = service.get_journey(id).await.map_err(|err| {
        tracing::error!(error = ?err, journey_id = id, "failed to fetch journey");
        AppError::internal("failed to fetch journey")
    })?;

    match journey {
        Some(journey) => Ok(Json(journey)),
        None => Err(AppError::not_found("journey not found")),
    }
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PhotoListQuery {
    pub page: Option<i64>,
    #[serde(rename = "timestamp__gt")]
    pub timestamp_gt: Option<String>,
    #[serde(rename = "timestamp__lt")]
    pub timestamp_lt: Option<String>,
}

fn parse_timestamp(value: Option<&str>) -> Result<Option<OffsetDateTime>, AppError> {
    value
        .map(|value| {
            OffsetDateTime::parse(value, &Rfc3339)
                .map_err(|_| AppError::bad_request("invalid timestamp"))
        })
        .transpose()
}

fn photo_filter(query: &PhotoListQuery) -> Result<PhotoFilter, AppError> {
    Ok(PhotoFilter {
        timestamp_gt: parse_timestamp(query.timestamp_gt.as_deref())?,
        timestamp_lt: parse_timestamp(query.timestamp_lt.as_deref())?,
    })
}

fn page_number(page: Option<i64>) -> Result<i64, AppError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    Ok(page)
}

fn populate_photo_urls(state: &AppState, viewer: &MaybeAuthUser, photos: &mut [Photo]) {
    let present = viewer.is_present();
    let host = state.public_image_host.as_deref();
    for photo in photos {
        photo.populate_urls(present, false, host);
    }
}

pub async fn list_photos(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(query): Query<PhotoListQuery>,
) -> Result<Json<PhotoPage>, AppError> {
    let filter = photo_filter(&query)?;
    let page = page_number(query.page)?;

    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let mut photos = service
        .list_photos(None, &filter, page)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list photos");
            AppError::internal("failed to list photos")
        })?;

    populate_photo_urls(&state, &viewer, &mut photos.items);
    Ok(Json(photos))
}

pub async fn list_journey_photos(
    Path(journey_id): Path<i64>,
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(query): Query<PhotoListQuery>,
) -> Result<Json<PhotoPage>, AppError> {
    let filter = photo_filter(&query)?;
    let page = page_number(query.page)?;

    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let mut photos = service
        .list_photos(Some(journey_id), &filter, page)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, journey_id, "failed to list journey photos");
            AppError::internal("failed to list photos")
        })?;

    populate_photo_urls(&state, &viewer, &mut photos.items);
    Ok(Json(photos))
}

pub async fn get_photo(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
) -> Result<Json<Photo>, AppError> {
    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let photo = service.get_photo(id).await.map_err(|err| {
        tracing::error!(error = ?err, photo_id = id, "failed to fetch photo");
        AppError::internal("failed to fetch photo")
    })?;

    match photo {
        Some(mut photo) => {
            photo.populate_urls(viewer.is_present(), false, state.public_image_host.as_deref());
            Ok(Json(photo))
        }
        None => Err(AppError::not_found("photo not found")),
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

pub async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Location>>, AppError> {
    let service = LocationService::new(state.db.clone());
    let locations = service.list_locations().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list locations");
        AppError::internal("failed to list locations")
    })?;
    Ok(Json(locations))
}

pub async fn get_location(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Location>, AppError> {
    let service = LocationService::new(state.db.clone());
    let location = service.get_location(id).await.map_err(|err| {
        tracing::error!(error = ?err, location_id = id, "failed to fetch location");
        AppError::internal("failed to fetch location")
    })?;

    match location {
        Some(location) => Ok(Json(location)),
        None => Err(AppError::not_found("location not found")),
    }
}

// ---------------------------------------------------------------------------
// Image delivery
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ImageQuery {
    pub hash: Option<String>,
}

/// Every failure mode collapses to the same opaque 404 so a caller cannot
/// distinguish "no such photo" from "wrong hash" from "file missing".
fn opaque_not_found() -> Response {
    AppError::not_found("not found").into_response()
}

pub async fn photo_file(
    State(state): State<AppState>,
    Path((visibility, kind, journey_id, filename)): Path<(String, String, i64, String)>,
    Query(query): Query<ImageQuery>,
) -> Response {
    match serve_photo_file(
        &state,
        &visibility,
        &kind,
        journey_id,
        &filename,
        query.hash.as_deref(),
    )
    .await
    {
        Ok(Some(response)) => response,
        Ok(None) => opaque_not_found(),
        Err(err) => {
            tracing::warn!(error = ?err, journey_id, "failed to serve image");
            opaque_not_found()
        }
    }
}

async fn serve_photo_file(
    state: &AppState,
    visibility_segment: &str,
    kind_segment: &str,
    journey_id: i64,
    raw_filename: &str,
    supplied_hash: Option<&str>,
) -> anyhow::Result<Option<Response>> {
    let Some(visibility) = Visibility::from_segment(visibility_segment) else {
        return Ok(None);
    };
    let Some(kind) = ImageKind::from_segment(kind_segment) else {
        return Ok(None);
    };

    // Public thumbnail URLs carry the on-disk suffix; the stored filename
    // never does.
    let filename = if kind == ImageKind::Thumb {
        raw_filename
            .strip_suffix(THUMBNAIL_SUFFIX)
            .unwrap_or(raw_filename)
    } else {
        raw_filename
    };

    if !is_safe_filename(filename) {
        return Ok(None);
    }

    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let Some(photo) = service.find_by_identity(journey_id, filename).await? else {
        return Ok(None);
    };

    // The requested subtree must agree with the record's derived
    // visibility; a stale or forged segment is not honored.
    if photo.visibility() != visibility {
        return Ok(None);
    }

    if visibility == Visibility::Private {
        let Some(supplied) = supplied_hash else {
            return Ok(None);
        };
        if !bool::from(supplied.as_bytes().ct_eq(photo.hash.as_bytes())) {
            return Ok(None);
        }
    }

    if kind == ImageKind::Thumb {
        service.ensure_thumbnail(&photo).await?;
    }

    let path = state
        .store
        .file_path(kind, journey_id, filename, photo.confidentiality);
    let data = tokio::fs::read(&path).await?;

    let content_type = match kind {
        ImageKind::Thumb => "image/jpeg",
        ImageKind::Photo => content_type_for(filename),
    };
    Ok(Some(
        ([(header::CONTENT_TYPE, content_type)], data).into_response(),
    ))
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Administrative operations
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UpdatePhotoRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub confidentiality: Option<i16>,
}

pub async fn update_photo(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePhotoRequest>,
) -> Result<Json<Photo>, AppError> {
    if payload.confidentiality.is_some_and(|value| value < 0) {
        return Err(AppError::bad_request("confidentiality must not be negative"));
    }

    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let changes = PhotoChanges {
        name: payload.name,
        description: payload.description,
        confidentiality: payload.confidentiality,
    };
    let photo = service.update_photo(id, &changes).await.map_err(|err| {
        tracing::error!(error = ?err, photo_id = id, "failed to update photo");
        AppError::internal("failed to update photo")
    })?;

    match photo {
        Some(mut photo) => {
            photo.populate_urls(true, true, state.public_image_host.as_deref());
            Ok(Json(photo))
        }
        None => Err(AppError::not_found("photo not found")),
    }
}

#[derive(Deserialize)]
pub struct ImportPhotoQuery {
    pub filename: String,
    pub name: Option<String>,
    pub confidentiality: Option<i16>,
    pub timestamp: Option<String>,
    pub timezone: Option<String>,
}

pub async fn import_photo(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(journey_id): Path<i64>,
    Query(query): Query<ImportPhotoQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<Photo>), AppError> {
    if !is_safe_filename(&query.filename) {
        return Err(AppError::bad_request("invalid filename"));
    }
    if body.is_empty() {
        return Err(AppError::bad_request("empty request body"));
    }
    let confidentiality = query.confidentiality.unwrap_or(0);
    if confidentiality < 0 {
        return Err(AppError::bad_request("confidentiality must not be negative"));
    }

    let import = PhotoImport {
        filename: query.filename,
        name: query.name,
        confidentiality,
        timestamp: parse_timestamp(query.timestamp.as_deref())?,
        timezone: query.timezone.unwrap_or_else(|| "UTC".to_string()),
    };

    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let outcome = service
        .import_photo(journey_id, &import, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, journey_id, "failed to import photo");
            AppError::internal("failed to import photo")
        })?;

    match outcome {
        ImportOutcome::Created(mut photo) => {
            photo.populate_urls(true, true, state.public_image_host.as_deref());
            Ok((StatusCode::CREATED, Json(photo)))
        }
        ImportOutcome::JourneyMissing => Err(AppError::not_found("journey not found")),
        ImportOutcome::DuplicateFilename => Err(AppError::conflict("photo already exists")),
        ImportOutcome::InvalidImage => {
            Err(AppError::bad_request("unsupported or corrupt image data"))
        }
    }
}

#[derive(Serialize)]
pub struct RegenerateResponse {
    pub regenerated: u64,
}

pub async fn regenerate_thumbnails(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<RegenerateResponse>, AppError> {
    let service = PhotoService::new(state.db.clone(), state.store.clone());
    let regenerated = service.regenerate_thumbnails().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to regenerate thumbnails");
        AppError::internal("failed to regenerate thumbnails")
    })?;
    Ok(Json(RegenerateResponse { regenerated }))
}
