//! End-to-end API tests: resource listings with derived counts, the image
//! delivery endpoint's gating, confidentiality transitions and the
//! administrative operations. Requires a reachable Postgres (see
//! TEST_DATABASE_BASE_URL in common/mod.rs).

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use journeylog::infra::storage::ImageKind;

use common::{app, png_bytes};

fn ts(unix: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(unix).unwrap()
}

fn rfc3339(stamp: OffsetDateTime) -> String {
    stamp.format(&Rfc3339).unwrap()
}

// ===========================================================================
// Health
// ===========================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let resp = app.get("/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

// ===========================================================================
// Journeys and derived counts
// ===========================================================================

#[tokio::test]
async fn journey_detail_carries_counts_and_pages() {
    let app = app().await;
    let journey_id = app.create_journey("counts").await;

    let day1 = ts(1_539_993_600); // 2018-10-20T00:00:00Z
    let day1_noon = day1 + time::Duration::hours(12);
    let day30 = day1 + time::Duration::days(29);

    // A dated page covering day 1, a dateless SPECIAL page and a dateless
    // REGULAR page.
    app.create_journal_page(journey_id, "counts-day1", 1, "REGULAR", Some(day1), None)
        .await;
    app.create_journal_page(journey_id, "counts-special", 2, "SPECIAL", None, None)
        .await;
    app.create_journal_page(journey_id, "counts-all", 3, "REGULAR", None, None)
        .await;

    let image = png_bytes(4, 4);
    app.create_photo_at(journey_id, "day1.png", 0, day1_noon, &image)
        .await;
    app.create_photo_at(journey_id, "day30.png", 0, day30, &image)
        .await;

    let location_a = app.create_location("counts-a").await;
    let location_b = app.create_location("counts-b").await;
    app.create_visit(journey_id, location_a, day1).await;
    app.create_visit(journey_id, location_a, day1_noon).await;
    app.create_visit(journey_id, location_b, day30).await;

    let resp = app.get(&format!("/journeys/{}", journey_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();

    assert_eq!(body["journal_pages_count"], 3);
    assert_eq!(body["photos_count"], 2);
    assert_eq!(body["locations_count"], 2);
    assert_eq!(
        body["photos"],
        format!("/journeys/{}/photos", journey_id)
    );

    let pages = body["journal_pages"].as_array().unwrap();
    assert_eq!(pages.len(), 3);
    // Ordered by order_no; the dated page only sees the day-1 photo, the
    // dateless SPECIAL page sees nothing, the dateless REGULAR page sees
    // every journey photo.
    assert_eq!(pages[0]["slug"], "page-counts-day1");
    assert_eq!(pages[0]["photos_count"], 1);
    assert_eq!(pages[1]["page_type"], "SPECIAL");
    assert_eq!(pages[1]["photos_count"], 0);
    assert_eq!(pages[2]["photos_count"], 2);
}

#[tokio::test]
async fn journeys_list_includes_created_journey() {
    let app = app().await;
    let journey_id = app.create_journey("list").await;

    let resp = app.get("/journeys", None).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let journeys = body.as_array().unwrap();
    assert!(journeys
        .iter()
        .any(|journey| journey["id"] == journey_id && journey["slug"] == "journey-list"));
}

#[tokio::test]
async fn unknown_journey_is_not_found() {
    let app = app().await;
    let resp = app.get("/journeys/999999999", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Photo listings
// ===========================================================================

#[tokio::test]
async fn journey_photos_support_timestamp_filters() {
    let app = app().await;
    let journey_id = app.create_journey("filters").await;

    let image = png_bytes(4, 4);
    let t1 = ts(1_540_000_000);
    let t2 = ts(1_540_100_000);
    let t3 = ts(1_540_200_000);
    app.create_photo_at(journey_id, "one.png", 0, t1, &image).await;
    app.create_photo_at(journey_id, "two.png", 0, t2, &image).await;
    app.create_photo_at(journey_id, "three.png", 0, t3, &image)
        .await;

    let resp = app
        .get(&format!("/journeys/{}/photos", journey_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    // Ordered by timestamp.
    assert_eq!(body["items"][0]["filename"], "one.png");

    let resp = app
        .get(
            &format!(
                "/journeys/{}/photos?timestamp__gt={}",
                journey_id,
                rfc3339(t1)
            ),
            None,
        )
        .await;
    assert_eq!(resp.json()["count"], 2);

    let resp = app
        .get(
            &format!(
                "/journeys/{}/photos?timestamp__gt={}&timestamp__lt={}",
                journey_id,
                rfc3339(t1),
                rfc3339(t3)
            ),
            None,
        )
        .await;
    let body = resp.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["filename"], "two.png");
}

#[tokio::test]
async fn bad_photo_list_parameters_are_rejected() {
    let app = app().await;
    let journey_id = app.create_journey("badparams").await;

    let resp = app
        .get(
            &format!("/journeys/{}/photos?timestamp__gt=yesterday", journey_id),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid timestamp");

    let resp = app
        .get(&format!("/journeys/{}/photos?page=0", journey_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn photo_urls_depend_on_the_viewer() {
    let app = app().await;
    let journey_id = app.create_journey("urls").await;

    let image = png_bytes(4, 4);
    app.create_photo(journey_id, "open.png", 0, &image).await;
    let (_, private_hash) = app.create_photo(journey_id, "secret.png", 1, &image).await;

    let find = |body: &Value, filename: &str| -> Value {
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|item| item["filename"] == filename)
            .cloned()
            .unwrap()
    };

    // Anonymous: public URLs only, no capability leak.
    let resp = app
        .get(&format!("/journeys/{}/photos", journey_id), None)
        .await;
    let body = resp.json();

    let open = find(&body, "open.png");
    assert!(open["access_url"]
        .as_str()
        .unwrap()
        .starts_with(&format!("/image/public/photo/{}/open.png?refresh=", journey_id)));
    assert!(open["thumb_url"]
        .as_str()
        .unwrap()
        .starts_with(&format!(
            "/image/public/thumb/{}/open.png.th.jpg?refresh=",
            journey_id
        )));

    let secret = find(&body, "secret.png");
    assert_eq!(secret["access_url"], Value::Null);
    assert_eq!(secret["thumb_url"], Value::Null);
    // The content hash is a bearer capability and must never appear in
    // API payloads.
    assert!(secret.get("hash").is_none());

    // Authenticated: the private photo is addressed through the
    // hash-gated endpoint.
    app.create_session("viewer-token").await;
    let resp = app
        .get(
            &format!("/journeys/{}/photos", journey_id),
            Some("viewer-token"),
        )
        .await;
    let secret = find(&resp.json(), "secret.png");
    let url = secret["access_url"].as_str().unwrap();
    assert!(url.starts_with(&format!("/image/private/photo/{}/secret.png", journey_id)));
    assert!(url.contains(&format!("hash={}", private_hash)));
}

#[tokio::test]
async fn invalid_bearer_token_is_rejected() {
    let app = app().await;
    let resp = app.get("/photos", Some("no-such-token")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Locations
// ===========================================================================

#[tokio::test]
async fn location_detail_renders_localized_names() {
    let app = app().await;
    let location_id = app.create_location("names").await;
    app.add_location_name(location_id, "en_GB", "The Museum", Some("museum"))
        .await;
    app.add_location_name(location_id, "ja", "博物館", None).await;

    let resp = app.get(&format!("/locations/{}", location_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();

    assert_eq!(body["location_type"], "MUSEUM");
    assert_eq!(body["names"]["en_GB"]["name"], "The Museum");
    assert_eq!(body["names"]["en_GB"]["sort_key"], "museum");
    assert_eq!(body["names"]["ja"]["name"], "博物館");
    assert_eq!(body["names"]["ja"]["sort_key"], Value::Null);
}

// ===========================================================================
// Image delivery
// ===========================================================================

#[tokio::test]
async fn public_photo_is_streamed_as_is() {
    let app = app().await;
    let journey_id = app.create_journey("deliver-public").await;
    let image = png_bytes(32, 16);
    app.create_photo(journey_id, "pic.png", 0, &image).await;

    let resp = app
        .get(&format!("/image/public/photo/{}/pic.png", journey_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.content_type.as_deref(), Some("image/png"));
    assert_eq!(resp.bytes(), &image[..]);
}

#[tokio::test]
async fn public_thumbnail_is_generated_on_demand() {
    let app = app().await;
    let journey_id = app.create_journey("deliver-thumb").await;
    let image = png_bytes(256, 128);
    app.create_photo(journey_id, "wide.png", 0, &image).await;

    // Public thumb URLs carry the on-disk suffix.
    let resp = app
        .get(
            &format!("/image/public/thumb/{}/wide.png.th.jpg", journey_id),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.content_type.as_deref(), Some("image/jpeg"));
    // JPEG magic.
    assert_eq!(&resp.bytes()[..2], &[0xFF, 0xD8]);

    let thumb_path = app
        .store()
        .file_path(ImageKind::Thumb, journey_id, "wide.png", 0);
    assert!(thumb_path.exists());
}

#[tokio::test]
async fn private_photo_is_gated_by_the_content_hash() {
    let app = app().await;
    let journey_id = app.create_journey("deliver-private").await;
    let image = png_bytes(32, 16);
    let (_, hash) = app.create_photo(journey_id, "secret.png", 2, &image).await;

    let base = format!("/image/private/photo/{}/secret.png", journey_id);

    // No hash, wrong hash: the same opaque not-found.
    let resp = app.get(&base, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "not found");

    let resp = app.get(&format!("{}?hash=0000", base), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "not found");

    // The hash is the capability: no session needed.
    let resp = app.get(&format!("{}?hash={}", base, hash), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.bytes(), &image[..]);
}

#[tokio::test]
async fn visibility_segment_must_match_the_record() {
    let app = app().await;
    let journey_id = app.create_journey("deliver-segment").await;
    let image = png_bytes(8, 8);
    let (_, hash) = app.create_photo(journey_id, "open.png", 0, &image).await;

    // A public photo is not reachable through the private endpoint, even
    // with the correct hash.
    let resp = app
        .get(
            &format!(
                "/image/private/photo/{}/open.png?hash={}",
                journey_id, hash
            ),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_segments_and_records_are_not_found() {
    let app = app().await;
    let journey_id = app.create_journey("deliver-unknown").await;

    for path in [
        format!("/image/secret/photo/{}/a.png", journey_id),
        format!("/image/public/original/{}/a.png", journey_id),
        format!("/image/public/photo/{}/no-such-file.png", journey_id),
    ] {
        let resp = app.get(&path, None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{}", path);
        assert_eq!(resp.error_message(), "not found");
    }
}

// ===========================================================================
// Confidentiality transitions
// ===========================================================================

#[tokio::test]
async fn making_a_photo_private_relocates_its_files() {
    let app = app().await;
    let journey_id = app.create_journey("transition").await;
    let image = png_bytes(128, 64);
    let (photo_id, hash) = app.create_photo(journey_id, "move.png", 0, &image).await;

    // Materialize the thumbnail first so both kinds have to move.
    let resp = app
        .get(
            &format!("/image/public/thumb/{}/move.png.th.jpg", journey_id),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .patch_admin(
            &format!("/admin/photos/{}", photo_id),
            json!({ "confidentiality": 1 }),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["confidentiality"], 1);

    let store = app.store();
    assert!(store
        .file_path(ImageKind::Photo, journey_id, "move.png", 1)
        .exists());
    assert!(store
        .file_path(ImageKind::Thumb, journey_id, "move.png", 1)
        .exists());
    assert!(!store
        .file_path(ImageKind::Photo, journey_id, "move.png", 0)
        .exists());
    assert!(!store
        .file_path(ImageKind::Thumb, journey_id, "move.png", 0)
        .exists());

    // The old public URL is dead; the private one works with the hash.
    let resp = app
        .get(&format!("/image/public/photo/{}/move.png", journey_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .get(
            &format!(
                "/image/private/photo/{}/move.png?hash={}",
                journey_id, hash
            ),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn photo_updates_require_the_admin_token() {
    let app = app().await;
    let journey_id = app.create_journey("admin-gate").await;
    let (photo_id, _) = app
        .create_photo(journey_id, "gate.png", 0, &png_bytes(8, 8))
        .await;

    let resp = app
        .patch_admin(
            &format!("/admin/photos/{}", photo_id),
            json!({ "confidentiality": 1 }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .patch_admin(
            &format!("/admin/photos/{}", photo_id),
            json!({ "confidentiality": 1 }),
            Some("wrong-token"),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn updating_a_missing_photo_is_not_found() {
    let app = app().await;
    let resp = app
        .patch_admin(
            "/admin/photos/999999999",
            json!({ "name": "nope" }),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Administrative operations
// ===========================================================================

#[tokio::test]
async fn bulk_regeneration_reports_written_thumbnails() {
    let app = app().await;
    let journey_id = app.create_journey("regen").await;
    let image = png_bytes(64, 64);
    app.create_photo(journey_id, "r1.png", 0, &image).await;
    app.create_photo(journey_id, "r2.png", 1, &image).await;

    let resp = app
        .post_admin("/admin/thumbnails/regenerate", Some(app.admin_token()))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["regenerated"].as_u64().unwrap() >= 2);

    let store = app.store();
    assert!(store
        .file_path(ImageKind::Thumb, journey_id, "r1.png", 0)
        .exists());
    assert!(store
        .file_path(ImageKind::Thumb, journey_id, "r2.png", 1)
        .exists());

    let resp = app.post_admin("/admin/thumbnails/regenerate", None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn photo_import_registers_record_and_file() {
    let app = app().await;
    let journey_id = app.create_journey("import").await;
    let image = png_bytes(300, 200);

    let resp = app
        .post_admin_bytes(
            &format!(
                "/admin/journeys/{}/photos?filename=new.png&name=Imported",
                journey_id
            ),
            image.clone(),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["width"], 300);
    assert_eq!(body["height"], 200);
    assert_eq!(body["filesize"], image.len() as i64);
    assert_eq!(body["name"], "Imported");
    assert_eq!(body["confidentiality"], 0);

    let path = app
        .store()
        .file_path(ImageKind::Photo, journey_id, "new.png", 0);
    assert_eq!(std::fs::read(&path).unwrap(), image);

    // The imported photo is immediately deliverable.
    let resp = app
        .get(&format!("/image/public/photo/{}/new.png", journey_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    // Same identity again: conflict.
    let resp = app
        .post_admin_bytes(
            &format!("/admin/journeys/{}/photos?filename=new.png", journey_id),
            image.clone(),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn photo_import_validates_its_input() {
    let app = app().await;
    let journey_id = app.create_journey("import-bad").await;

    let resp = app
        .post_admin_bytes(
            &format!("/admin/journeys/{}/photos?filename=junk.png", journey_id),
            b"definitely not an image".to_vec(),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_admin_bytes(
            &format!(
                "/admin/journeys/{}/photos?filename=..%2Fescape.png",
                journey_id
            ),
            png_bytes(4, 4),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_admin_bytes(
            "/admin/journeys/999999999/photos?filename=orphan.png",
            png_bytes(4, 4),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
