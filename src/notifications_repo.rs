use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::PgPool;

/// The singleton notification configuration row
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::notification_config)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationConfig {
    pub id: i32,
    pub enabled: bool,
    pub apprise_urls: serde_json::Value,
    pub cooldown_seconds: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::notification_config)]
struct NewNotificationConfig {
    id: i32,
    enabled: bool,
    apprise_urls: serde_json::Value,
    cooldown_seconds: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NotificationConfigRepository {
    pool: PgPool,
}

impl NotificationConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Option<NotificationConfig>> {
        use crate::schema::notification_config::dsl::*;

        let pool = self.pool.clone();
        let row = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let row = notification_config
                .select(NotificationConfig::as_select())
                .first(&mut conn)
                .optional()?;
            Ok::<Option<NotificationConfig>, anyhow::Error>(row)
        })
        .await??;

        Ok(row)
    }

    /// Seed the singleton row from settings when none exists yet.
    pub async fn ensure_seeded(&self, urls: &[String], cooldown: u64) -> Result<()> {
        if self.get().await?.is_some() {
            return Ok(());
        }
        use crate::schema::notification_config::dsl::*;

        let row = NewNotificationConfig {
            id: 1,
            enabled: !urls.is_empty(),
            apprise_urls: serde_json::json!(urls),
            cooldown_seconds: cooldown as i32,
            updated_at: Utc::now(),
        };
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(notification_config)
                .values(&row)
                .on_conflict(id)
                .do_nothing()
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::notification_log)]
struct NewNotificationLog {
    id: Uuid,
    title: String,
    body: String,
    notify_type: String,
    cooldown_key: String,
    icao_hex: Option<String>,
    success: bool,
    sent_at: DateTime<Utc>,
}

/// Append-only log of every attempted send
#[derive(Clone)]
pub struct NotificationLogRepository {
    pool: PgPool,
}

impl NotificationLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        log_title: &str,
        log_body: &str,
        log_type: &str,
        key: &str,
        icao: Option<&str>,
        delivered: bool,
    ) -> Result<()> {
        use crate::schema::notification_log::dsl::*;

        let row = NewNotificationLog {
            id: Uuid::new_v4(),
            title: log_title.to_string(),
            body: log_body.to_string(),
            notify_type: log_type.to_string(),
            cooldown_key: key.to_string(),
            icao_hex: icao.map(str::to_string),
            success: delivered,
            sent_at: Utc::now(),
        };
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(notification_log)
                .values(&row)
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
