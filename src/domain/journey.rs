use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::journal_page::JournalPage;

#[derive(Debug, Clone, Serialize)]
pub struct Journey {
    pub url: String,
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub background: Option<String>,
    pub languages: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_end: Option<OffsetDateTime>,
    pub journal_pages: Vec<JournalPage>,
    pub journal_pages_count: i64,
    /// Link to the nested photo collection.
    pub photos: String,
    pub photos_count: i64,
    pub locations_count: i64,
}
