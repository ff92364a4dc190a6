use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::acars::AcarsMessage;
use crate::db::PgPool;

#[derive(Insertable)]
#[diesel(table_name = crate::schema::acars_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct NewAcarsMessage {
    id: Uuid,
    source: String,
    message_timestamp: DateTime<Utc>,
    frequency_mhz: Option<f64>,
    channel: Option<String>,
    icao_hex: Option<String>,
    registration: Option<String>,
    callsign: Option<String>,
    label: Option<String>,
    block_id: Option<String>,
    msg_num: Option<String>,
    ack: Option<String>,
    mode: Option<String>,
    text: Option<String>,
    signal_level: Option<f64>,
    error_count: Option<i32>,
    station_id: Option<String>,
    decoded: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<&AcarsMessage> for NewAcarsMessage {
    fn from(msg: &AcarsMessage) -> Self {
        let millis = (msg.timestamp * 1000.0) as i64;
        let message_timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now);

        NewAcarsMessage {
            id: Uuid::new_v4(),
            source: msg.source.clone(),
            message_timestamp,
            frequency_mhz: msg.frequency,
            channel: msg.channel.clone(),
            icao_hex: msg.icao_hex.clone(),
            registration: msg.registration.clone(),
            callsign: msg.callsign.clone(),
            label: msg.label.clone(),
            block_id: msg.block_id.clone(),
            msg_num: msg.msg_num.clone(),
            ack: msg.ack.clone(),
            mode: msg.mode.clone(),
            text: msg.text.clone(),
            signal_level: msg.signal_level,
            error_count: msg.error_count,
            station_id: msg.station_id.clone(),
            decoded: msg.decoded.clone(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct AcarsMessagesRepository {
    pool: PgPool,
}

impl AcarsMessagesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, msg: &AcarsMessage) -> Result<Uuid> {
        use crate::schema::acars_messages::dsl::*;

        let row = NewAcarsMessage::from(msg);
        let row_id = row.id;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(acars_messages)
                .values(&row)
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        metrics::counter!("acars.messages_stored_total").increment(1);
        Ok(row_id)
    }
}
