use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use tracing::trace;
use uuid::Uuid;

use crate::db::PgPool;
use crate::sessions::AircraftSession;

#[derive(Clone)]
pub struct SessionsRepository {
    pool: PgPool,
}

impl SessionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, session: AircraftSession) -> Result<()> {
        use crate::schema::aircraft_sessions::dsl::*;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(aircraft_sessions)
                .values(&session)
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        metrics::counter!("pipeline.sessions_opened_total").increment(1);
        Ok(())
    }

    /// Write back the full session row (aggregates are maintained in memory
    /// and flushed whole).
    pub async fn update(&self, session: AircraftSession) -> Result<bool> {
        use crate::schema::aircraft_sessions::dsl::*;

        let pool = self.pool.clone();
        let session_id = session.id;
        let updated = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count = diesel::update(aircraft_sessions.filter(id.eq(session_id)))
                .set(&session)
                .execute(&mut conn)?;
            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        trace!("Updated session {} ({} rows)", session_id, updated);
        Ok(updated > 0)
    }

    pub async fn get_by_id(&self, session_id: Uuid) -> Result<Option<AircraftSession>> {
        use crate::schema::aircraft_sessions::dsl::*;

        let pool = self.pool.clone();
        let row = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let row = aircraft_sessions
                .filter(id.eq(session_id))
                .select(AircraftSession::as_select())
                .first(&mut conn)
                .optional()?;
            Ok::<Option<AircraftSession>, anyhow::Error>(row)
        })
        .await??;

        Ok(row)
    }

    /// Find the most recent session for an ICAO whose last_seen falls within
    /// the continuity window. Used to re-attach after a short gap.
    pub async fn find_recent(
        &self,
        icao: &str,
        source_channel: &str,
        window: Duration,
    ) -> Result<Option<AircraftSession>> {
        use crate::schema::aircraft_sessions::dsl::*;

        let pool = self.pool.clone();
        let icao = icao.to_string();
        let source_channel = source_channel.to_string();
        let cutoff = Utc::now() - window;
        let row = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let row = aircraft_sessions
                .filter(icao_hex.eq(icao))
                .filter(source.eq(source_channel))
                .filter(last_seen.gt(cutoff))
                .order(last_seen.desc())
                .select(AircraftSession::as_select())
                .first(&mut conn)
                .optional()?;
            Ok::<Option<AircraftSession>, anyhow::Error>(row)
        })
        .await??;

        Ok(row)
    }

    /// Sessions active since a cutoff, for the statistics surface.
    pub async fn get_active_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<AircraftSession>> {
        use crate::schema::aircraft_sessions::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = aircraft_sessions
                .filter(last_seen.ge(cutoff))
                .order(last_seen.desc())
                .select(AircraftSession::as_select())
                .load(&mut conn)?;
            Ok::<Vec<AircraftSession>, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows)
    }
}
