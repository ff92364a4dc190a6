use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::trace;

use crate::db::PgPool;
use crate::sightings::AircraftSighting;

#[derive(Clone)]
pub struct SightingsRepository {
    pool: PgPool,
}

impl SightingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one store cycle's worth of sightings in a single statement.
    pub async fn insert_batch(&self, sightings: Vec<AircraftSighting>) -> Result<usize> {
        if sightings.is_empty() {
            return Ok(0);
        }
        use crate::schema::aircraft_sightings::dsl::*;

        let pool = self.pool.clone();
        let inserted = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count = diesel::insert_into(aircraft_sightings)
                .values(&sightings)
                .execute(&mut conn)?;
            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        trace!("Inserted {} sightings", inserted);
        metrics::counter!("pipeline.sightings_stored_total").increment(inserted as u64);
        Ok(inserted)
    }

    /// Sightings seen since a cutoff, newest first. Feeds the statistics
    /// surface; bounded by `limit` to keep result sets sane.
    pub async fn get_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AircraftSighting>> {
        use crate::schema::aircraft_sightings::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = aircraft_sightings
                .filter(seen_at.ge(cutoff))
                .order(seen_at.desc())
                .limit(limit)
                .select(AircraftSighting::as_select())
                .load(&mut conn)?;
            Ok::<Vec<AircraftSighting>, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows)
    }
}
