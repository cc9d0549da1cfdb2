use serde::Serialize;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageType {
    Regular,
    Special,
}

impl PageType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "REGULAR" => Some(Self::Regular),
            "SPECIAL" => Some(Self::Special),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::Special => "SPECIAL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalPage {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub order_no: i16,
    pub text: String,
    pub page_type: PageType,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_end: Option<OffsetDateTime>,
    pub timezone_start: Option<String>,
    pub timezone_end: Option<String>,
    pub journey_id: i64,
    pub photos_count: i64,
}

impl JournalPage {
    /// A page with only a start date implicitly covers that whole day.
    pub fn effective_date_end(&self) -> Option<OffsetDateTime> {
        match (self.date_start, self.date_end) {
            (Some(start), None) => Some(start + Duration::days(1) - Duration::seconds(1)),
            (_, end) => end,
        }
    }

    pub fn effective_timezone_start(&self) -> &str {
        self.timezone_start.as_deref().unwrap_or("UTC")
    }

    pub fn effective_timezone_end(&self) -> &str {
        if self.date_end.is_none() {
            return self.effective_timezone_start();
        }
        self.timezone_end.as_deref().unwrap_or("UTC")
    }

    /// Whether a journey photo taken at `timestamp` belongs on this page.
    /// Dateless REGULAR pages collect every journey photo; dateless
    /// SPECIAL pages collect none.
    pub fn covers_timestamp(&self, timestamp: OffsetDateTime) -> bool {
        match (self.date_start, self.effective_date_end()) {
            (None, None) => self.page_type == PageType::Regular,
            (None, Some(end)) => timestamp <= end,
            (Some(start), Some(end)) => timestamp >= start && timestamp <= end,
            (Some(start), None) => timestamp >= start,
        }
    }
}
