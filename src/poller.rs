//! Upstream aircraft poller.
//!
//! Fetches the aggregator JSON on a fixed cadence and hands the merged list
//! (primary first) to the pipeline. Fetch failures yield an empty list from
//! that source; there is no retry within a tick and a slow tick never
//! double-fires.

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::{debug, info, warn};

use crate::observations::{self, AircraftObservation, SourceChannel};
use crate::pipeline::AircraftPipeline;
use crate::settings::Settings;

const FETCH_TIMEOUT_SECS: u64 = 5;

pub struct AircraftPoller {
    client: Client,
    primary_url: String,
    secondary_url: Option<String>,
    interval: Duration,
}

impl AircraftPoller {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        AircraftPoller {
            client,
            primary_url: format!("{}/tar1090/data/aircraft.json", settings.ultrafeeder_url),
            secondary_url: settings
                .dump978_url
                .as_ref()
                .map(|url| format!("{}/data/aircraft.json", url)),
            interval: Duration::from_secs(settings.polling_interval),
        }
    }

    /// Fetch one source. Network errors, non-2xx responses, and parse
    /// failures all collapse to an empty list; the primary logs at warn,
    /// the secondary at debug (a missing 978 receiver is routine).
    async fn fetch_source(
        &self,
        url: &str,
        source: SourceChannel,
        primary: bool,
    ) -> Vec<AircraftObservation> {
        let result: anyhow::Result<Value> = async {
            let response = self.client.get(url).send().await?;
            let response = response.error_for_status()?;
            Ok(response.json::<Value>().await?)
        }
        .await;

        match result {
            Ok(body) => {
                let observations = observations::parse_aircraft_json(&body, source, Utc::now());
                metrics::counter!("poller.fetch_success_total", "source" => source.to_string())
                    .increment(1);
                metrics::gauge!("poller.aircraft_count", "source" => source.to_string())
                    .set(observations.len() as f64);
                observations
            }
            Err(e) => {
                if primary {
                    warn!("Failed to fetch {} data from {}: {}", source, url, e);
                } else {
                    debug!("Failed to fetch {} data from {}: {}", source, url, e);
                }
                metrics::counter!("poller.fetch_failed_total", "source" => source.to_string())
                    .increment(1);
                Vec::new()
            }
        }
    }

    /// One tick: both sources, primary first.
    pub async fn poll_cycle(&self) -> Vec<AircraftObservation> {
        let mut all = self
            .fetch_source(&self.primary_url, SourceChannel::Adsb1090, true)
            .await;

        if let Some(url) = &self.secondary_url {
            let uat = self.fetch_source(url, SourceChannel::Uat978, false).await;
            all.extend(uat);
        }

        metrics::gauge!("poller.last_poll_timestamp").set(Utc::now().timestamp() as f64);
        all
    }

    /// The poll loop. Runs until cancelled; never emits a partial cycle
    /// after shutdown begins.
    pub async fn run(&self, pipeline: Arc<AircraftPipeline>, shutdown: CancellationToken) {
        info!(
            "Aircraft poller started (interval {:?}, primary {})",
            self.interval, self.primary_url
        );

        let mut interval = tokio::time::interval(self.interval);
        // A tick that overruns must not be made up with a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let observations = self.poll_cycle().await;
                    // Re-check after the fetch so a cycle that straddles
                    // shutdown is dropped whole
                    if shutdown.is_cancelled() {
                        break;
                    }
                    pipeline.process_cycle(observations).await;
                }
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Aircraft poller stopped");
    }
}

/// Spawn the poller under a supervisor: a panic inside the loop is logged
/// and the loop restarted, so the process stays up.
pub fn start(
    poller: AircraftPoller,
    pipeline: Arc<AircraftPipeline>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let poller = Arc::new(poller);
        loop {
            let task = {
                let poller = poller.clone();
                let pipeline = pipeline.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(
                    async move {
                        poller.run(pipeline, shutdown).await;
                    }
                    .instrument(tracing::info_span!("aircraft_poller")),
                )
            };

            match task.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    tracing::error!("Aircraft poller panicked, restarting: {}", e);
                }
                Err(_) => break,
            }

            if shutdown.is_cancelled() {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });
}
