use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::alerts::AlertRule;
use crate::db::PgPool;

/// CRUD over stored alert rules. Every mutation is expected to be followed
/// by an `AlertEngine::invalidate()` call at the composition layer so the
/// compiled snapshot is rebuilt.
#[derive(Clone)]
pub struct AlertRulesRepository {
    pool: PgPool,
}

impl AlertRulesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<AlertRule>> {
        use crate::schema::alert_rules::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = alert_rules
                .order(created_at.asc())
                .select(AlertRule::as_select())
                .load(&mut conn)?;
            Ok::<Vec<AlertRule>, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows)
    }

    pub async fn get_enabled(&self) -> Result<Vec<AlertRule>> {
        use crate::schema::alert_rules::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = alert_rules
                .filter(enabled.eq(true))
                .order(created_at.asc())
                .select(AlertRule::as_select())
                .load(&mut conn)?;
            Ok::<Vec<AlertRule>, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows)
    }

    pub async fn insert(&self, rule: AlertRule) -> Result<()> {
        use crate::schema::alert_rules::dsl::alert_rules;

        let pool = self.pool.clone();
        let rule_name = rule.name.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(alert_rules)
                .values(&rule)
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        debug!("Created alert rule '{}'", rule_name);
        Ok(())
    }

    pub async fn update(&self, rule: AlertRule) -> Result<bool> {
        use crate::schema::alert_rules::dsl::*;

        let pool = self.pool.clone();
        let rule_id = rule.id;
        let updated = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count = diesel::update(alert_rules.filter(id.eq(rule_id)))
                .set(&rule)
                .execute(&mut conn)?;
            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(updated > 0)
    }

    pub async fn delete(&self, rule_id: Uuid) -> Result<bool> {
        use crate::schema::alert_rules::dsl::*;

        let pool = self.pool.clone();
        let deleted = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count = diesel::delete(alert_rules.filter(id.eq(rule_id))).execute(&mut conn)?;
            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(deleted > 0)
    }

    pub async fn set_last_triggered(&self, rule_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        use crate::schema::alert_rules::dsl::*;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::update(alert_rules.filter(id.eq(rule_id)))
                .set(last_triggered.eq(at))
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
