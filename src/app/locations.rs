use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;

use crate::domain::location::{LocalizedName, Location};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct LocationService {
    db: Db,
}

impl LocationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        let rows = sqlx::query(
            "SELECT id, name, latitude, longitude, location_type, color \
             FROM locations ORDER BY name",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut locations: Vec<Location> = rows.iter().map(location_from_row).collect();
        self.attach_names(&mut locations).await?;
        Ok(locations)
    }

    pub async fn get_location(&self, location_id: i64) -> Result<Option<Location>> {
        let row = sqlx::query(
            "SELECT id, name, latitude, longitude, location_type, color \
             FROM locations WHERE id = $1",
        )
        .bind(location_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut locations = vec![location_from_row(&row)];
        self.attach_names(&mut locations).await?;
        Ok(locations.pop())
    }

    async fn attach_names(&self, locations: &mut [Location]) -> Result<()> {
        if locations.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = locations.iter().map(|location| location.id).collect();

        let rows = sqlx::query(
            "SELECT location_id, lang, name, sort_key \
             FROM location_names WHERE location_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut names: HashMap<i64, Vec<(String, LocalizedName)>> = HashMap::new();
        for row in &rows {
            names.entry(row.get("location_id")).or_default().push((
                row.get("lang"),
                LocalizedName {
                    name: row.get("name"),
                    sort_key: row.get("sort_key"),
                },
            ));
        }

        for location in locations {
            if let Some(entries) = names.remove(&location.id) {
                location.names = entries.into_iter().collect();
            }
        }
        Ok(())
    }
}

fn location_from_row(row: &PgRow) -> Location {
    let id: i64 = row.get("id");
    Location {
        url: format!("/locations/{}", id),
        id,
        name: row.get("name"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        location_type: row.get("location_type"),
        color: row.get("color"),
        names: Default::default(),
    }
}
