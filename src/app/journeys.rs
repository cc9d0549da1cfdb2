use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use time::OffsetDateTime;

use crate::domain::journal_page::{JournalPage, PageType};
use crate::domain::journey::Journey;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct JourneyService {
    db: Db,
}

impl JourneyService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_journeys(&self) -> Result<Vec<Journey>> {
        let rows = sqlx::query(
            "SELECT j.id, j.slug, j.name, j.description, j.background, j.languages, \
                    j.date_start, j.date_end, \
                    (SELECT COUNT(*) FROM journal_pages p WHERE p.journey_id = j.id) AS journal_pages_count, \
                    (SELECT COUNT(*) FROM photos ph WHERE ph.journey_id = j.id) AS photos_count, \
                    (SELECT COUNT(DISTINCT v.location_id) FROM journey_location_visits v \
                     WHERE v.journey_id = j.id AND v.location_id IS NOT NULL) AS locations_count \
             FROM journeys j \
             ORDER BY j.date_start, j.name",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut journeys: Vec<Journey> = rows.iter().map(journey_from_row).collect();
        self.attach_pages(&mut journeys).await?;
        Ok(journeys)
    }

    pub async fn get_journey(&self, journey_id: i64) -> Result<Option<Journey>> {
        let row = sqlx::query(
            "SELECT j.id, j.slug, j.name, j.description, j.background, j.languages, \
                    j.date_start, j.date_end, \
                    (SELECT COUNT(*) FROM journal_pages p WHERE p.journey_id = j.id) AS journal_pages_count, \
                    (SELECT COUNT(*) FROM photos ph WHERE ph.journey_id = j.id) AS photos_count, \
                    (SELECT COUNT(DISTINCT v.location_id) FROM journey_location_visits v \
                     WHERE v.journey_id = j.id AND v.location_id IS NOT NULL) AS locations_count \
             FROM journeys j \
             WHERE j.id = $1",
        )
        .bind(journey_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut journeys = vec![journey_from_row(&row)];
        self.attach_pages(&mut journeys).await?;
        Ok(journeys.pop())
    }

    /// Load journal pages for the given journeys and compute each page's
    /// photo count from the journey's photo timestamps. Dateless REGULAR
    /// pages count every journey photo, so the counting happens here
    /// rather than in SQL.
    async fn attach_pages(&self, journeys: &mut [Journey]) -> Result<()> {
        if journeys.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = journeys.iter().map(|journey| journey.id).collect();

        let page_rows = sqlx::query(
            "SELECT id, slug, name, order_no, text, page_type, date_start, date_end, \
                    timezone_start, timezone_end, journey_id \
             FROM journal_pages \
             WHERE journey_id = ANY($1) \
             ORDER BY journey_id, order_no, date_start",
        )
        .bind(&ids)
        .fetch_all(self.db.pool())
        .await?;

        let photo_rows = sqlx::query(
            "SELECT journey_id, \"timestamp\" FROM photos WHERE journey_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut timestamps: HashMap<i64, Vec<OffsetDateTime>> = HashMap::new();
        for row in &photo_rows {
            timestamps
                .entry(row.get("journey_id"))
                .or_default()
                .push(row.get("timestamp"));
        }

        let mut pages: HashMap<i64, Vec<JournalPage>> = HashMap::new();
        for row in &page_rows {
            let mut page = page_from_row(row)?;
            page.photos_count = timestamps
                .get(&page.journey_id)
                .map(|stamps| {
                    stamps
                        .iter()
                        .filter(|stamp| page.covers_timestamp(**stamp))
                        .count() as i64
                })
                .unwrap_or(0);
            pages.entry(page.journey_id).or_default().push(page);
        }

        for journey in journeys {
            journey.journal_pages = pages.remove(&journey.id).unwrap_or_default();
        }
        Ok(())
    }
}

fn journey_from_row(row: &PgRow) -> Journey {
    let id: i64 = row.get("id");
    Journey {
        url: format!("/journeys/{}", id),
        id,
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        background: row.get("background"),
        languages: row.get("languages"),
        date_start: row.get("date_start"),
        date_end: row.get("date_end"),
        journal_pages: Vec::new(),
        journal_pages_count: row.get("journal_pages_count"),
        photos: format!("/journeys/{}/photos", id),
        photos_count: row.get("photos_count"),
        locations_count: row.get("locations_count"),
    }
}

fn page_from_row(row: &PgRow) -> Result<JournalPage> {
    let page_type: String = row.get("page_type");
    let page_type = PageType::from_db(&page_type)
        .ok_or_else(|| anyhow!("unknown journal page type: {}", page_type))?;

    Ok(JournalPage {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        order_no: row.get("order_no"),
        text: row.get("text"),
        page_type,
        date_start: row.get("date_start"),
        date_end: row.get("date_end"),
        timezone_start: row.get("timezone_start"),
        timezone_end: row.get("timezone_end"),
        journey_id: row.get("journey_id"),
        photos_count: 0,
    })
}
