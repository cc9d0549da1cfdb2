use serde::Serialize;
use time::OffsetDateTime;

use crate::infra::storage::{ImageKind, Visibility, THUMBNAIL_SUFFIX};

/// A photo record. `hash` is the content fingerprint used as the bearer
/// capability in private-image URLs; it is deliberately never serialized,
/// viewers get the derived `access_url`/`thumb_url` instead.
#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub url: String,
    pub id: i64,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub timezone: String,
    pub filename: String,
    pub filesize: i64,
    pub height: i32,
    pub width: i32,
    #[serde(skip_serializing)]
    pub hash: String,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub focal_length: Option<String>,
    pub exposure: Option<String>,
    pub iso_speed: Option<String>,
    pub f_value: Option<String>,
    pub flash_fired: bool,
    pub flash_manual: bool,
    pub confidentiality: i16,
    pub journey_id: i64,
    #[serde(skip_serializing)]
    pub modified_at: OffsetDateTime,
    pub access_url: Option<String>,
    pub thumb_url: Option<String>,
}

impl Photo {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_confidentiality(self.confidentiality)
    }

    /// Build the externally reachable URL for one kind of file.
    ///
    /// Private photos (and any admin-context request) are addressed
    /// through the delivery endpoint with the content hash as a capability
    /// token; without a viewer there is no URL. Public photos are
    /// addressed under the configurable public host prefix, where thumbs
    /// carry their on-disk suffix because a static host serves the storage
    /// tree directly. `modified_at` rides along as a cache buster.
    pub fn url_of_kind(
        &self,
        kind: ImageKind,
        viewer_present: bool,
        for_admin: bool,
        public_host: Option<&str>,
    ) -> Option<String> {
        let refresh = self.modified_at.unix_timestamp();

        if self.confidentiality > 0 || for_admin {
            if !viewer_present && !for_admin {
                return None;
            }
            // The delivery endpoint appends the thumbnail extension itself.
            return Some(format!(
                "/image/private/{}/{}/{}?hash={}&refresh={}",
                kind.segment(),
                self.journey_id,
                self.filename,
                self.hash,
                refresh
            ));
        }

        let host = public_host.unwrap_or("/image/public/");
        let suffix = if kind == ImageKind::Thumb {
            THUMBNAIL_SUFFIX
        } else {
            ""
        };
        Some(format!(
            "{}{}/{}/{}{}?refresh={}",
            host,
            kind.segment(),
            self.journey_id,
            self.filename,
            suffix,
            refresh
        ))
    }

    pub fn access_url(&self, viewer_present: bool, public_host: Option<&str>) -> Option<String> {
        self.url_of_kind(ImageKind::Photo, viewer_present, false, public_host)
    }

    pub fn thumb_url(&self, viewer_present: bool, public_host: Option<&str>) -> Option<String> {
        self.url_of_kind(ImageKind::Thumb, viewer_present, false, public_host)
    }

    pub fn populate_urls(
        &mut self,
        viewer_present: bool,
        for_admin: bool,
        public_host: Option<&str>,
    ) {
        self.access_url =
            self.url_of_kind(ImageKind::Photo, viewer_present, for_admin, public_host);
        self.thumb_url = self.url_of_kind(ImageKind::Thumb, viewer_present, for_admin, public_host);
    }
}
