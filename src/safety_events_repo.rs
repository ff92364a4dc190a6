use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::trace;
use uuid::Uuid;

use crate::db::PgPool;
use crate::safety::SafetyEvent;

#[derive(Insertable)]
#[diesel(table_name = crate::schema::safety_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct NewSafetyEvent {
    id: Uuid,
    event_key: String,
    event_type: String,
    severity: String,
    icao_hex: String,
    icao_hex_2: Option<String>,
    callsign: Option<String>,
    callsign_2: Option<String>,
    message: String,
    details: Option<serde_json::Value>,
    aircraft_snapshot: Option<serde_json::Value>,
    aircraft_snapshot_2: Option<serde_json::Value>,
    acknowledged: bool,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl From<&SafetyEvent> for NewSafetyEvent {
    fn from(event: &SafetyEvent) -> Self {
        NewSafetyEvent {
            id: Uuid::new_v4(),
            event_key: event.id.clone(),
            event_type: event.event_type.to_string(),
            severity: event.severity.to_string(),
            icao_hex: event.icao.clone(),
            icao_hex_2: event.icao_2.clone(),
            callsign: event.callsign.clone(),
            callsign_2: event.callsign_2.clone(),
            message: event.message.clone(),
            details: Some(event.details.clone()),
            aircraft_snapshot: event.aircraft_snapshot.clone(),
            aircraft_snapshot_2: event.aircraft_snapshot_2.clone(),
            acknowledged: event.acknowledged,
            created_at: event.created_at,
            last_seen: event.last_seen,
        }
    }
}

#[derive(Clone)]
pub struct SafetyEventsRepository {
    pool: PgPool,
}

impl SafetyEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a newly created event, returning the durable row id that the
    /// monitor glues back onto the in-memory event.
    pub async fn insert(&self, event: &SafetyEvent) -> Result<Uuid> {
        use crate::schema::safety_events::dsl::*;

        let new_event = NewSafetyEvent::from(event);
        let row_id = new_event.id;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(safety_events)
                .values(&new_event)
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        trace!("Stored safety event {} as {}", event.id, row_id);
        metrics::counter!("safety.events_stored_total").increment(1);
        Ok(row_id)
    }

    /// Refresh the durable row while the condition persists.
    pub async fn refresh(
        &self,
        row_id: Uuid,
        seen: DateTime<Utc>,
        current_severity: &str,
        current_message: &str,
    ) -> Result<()> {
        use crate::schema::safety_events::dsl::*;

        let pool = self.pool.clone();
        let current_severity = current_severity.to_string();
        let current_message = current_message.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::update(safety_events.filter(id.eq(row_id)))
                .set((
                    last_seen.eq(seen),
                    severity.eq(current_severity),
                    message.eq(current_message),
                ))
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    /// Persist the acknowledgment overlay so it survives restarts.
    pub async fn set_acknowledged(&self, row_id: Uuid, value: bool) -> Result<bool> {
        use crate::schema::safety_events::dsl::*;

        let pool = self.pool.clone();
        let updated = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count = diesel::update(safety_events.filter(id.eq(row_id)))
                .set(acknowledged.eq(value))
                .execute(&mut conn)?;
            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(updated > 0)
    }
}
