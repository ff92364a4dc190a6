use anyhow::Result;
use async_nats::Client;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::fanout::{FanOut, Topic};

/// NATS-backed fan-out for multi-worker deployments. Events publish to
/// `skywatch.{topic}.{event}` subjects; downstream workers subscribe with
/// NATS wildcards (`skywatch.aircraft.>`), so no join bookkeeping lives
/// here.
pub struct NatsFanOut {
    client: Client,
}

impl NatsFanOut {
    pub async fn connect(nats_url: &str) -> Result<Self> {
        info!("Connecting fan-out to NATS at {}", nats_url);
        let client = async_nats::connect(nats_url).await?;
        Ok(NatsFanOut { client })
    }
}

#[async_trait]
impl FanOut for NatsFanOut {
    async fn publish(&self, topic: Topic, event: &str, payload: Value) -> Result<()> {
        let subject = format!("skywatch.{}.{}", topic, event);
        let body = serde_json::to_vec(&payload)?;
        self.client.publish(subject.clone(), body.into()).await?;
        debug!("Published {} to NATS", subject);
        metrics::counter!("fanout.nats_published_total").increment(1);
        Ok(())
    }
}
