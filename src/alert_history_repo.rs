use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alerts::AlertFire;
use crate::db::PgPool;

/// Append-only record of one rule firing
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::alert_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AlertHistoryRow {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub rule_name: String,
    pub icao_hex: String,
    pub callsign: Option<String>,
    pub message: String,
    pub priority: String,
    pub aircraft_data: Option<serde_json::Value>,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl From<&AlertFire> for AlertHistoryRow {
    fn from(fire: &AlertFire) -> Self {
        AlertHistoryRow {
            id: Uuid::new_v4(),
            rule_id: Some(fire.rule_id),
            rule_name: fire.rule_name.clone(),
            icao_hex: fire.icao.clone(),
            callsign: fire.callsign.clone(),
            message: fire.message.clone(),
            priority: fire.priority.clone(),
            aircraft_data: Some(fire.aircraft_data.clone()),
            triggered_at: fire.triggered_at,
            acknowledged: false,
        }
    }
}

#[derive(Clone)]
pub struct AlertHistoryRepository {
    pool: PgPool,
}

impl AlertHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, fire: &AlertFire) -> Result<Uuid> {
        use crate::schema::alert_history::dsl::*;

        let row = AlertHistoryRow::from(fire);
        let row_id = row.id;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(alert_history)
                .values(&row)
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        metrics::counter!("alerts.history_stored_total").increment(1);
        Ok(row_id)
    }

    /// History rows since a cutoff, newest first.
    pub async fn get_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AlertHistoryRow>> {
        use crate::schema::alert_history::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = alert_history
                .filter(triggered_at.ge(cutoff))
                .order(triggered_at.desc())
                .limit(limit)
                .select(AlertHistoryRow::as_select())
                .load(&mut conn)?;
            Ok::<Vec<AlertHistoryRow>, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows)
    }

    pub async fn acknowledge(&self, row_id: Uuid) -> Result<bool> {
        use crate::schema::alert_history::dsl::*;

        let pool = self.pool.clone();
        let updated = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count = diesel::update(alert_history.filter(id.eq(row_id)))
                .set(acknowledged.eq(true))
                .execute(&mut conn)?;
            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(updated > 0)
    }
}
