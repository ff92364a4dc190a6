//! ACARS/VDL2 ingest service: UDP listeners, normalization, deduplication,
//! enrichment, the recent-message ring, and per-source statistics.

pub mod decoder;
pub mod dedup;
pub mod normalizer;

pub use normalizer::AcarsMessage;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::{debug, info, warn};

use dedup::DedupCache;

/// Recent-message ring capacity
const RING_CAPACITY: usize = 1000;
/// Largest datagram either demodulator emits
const MAX_DATAGRAM: usize = 65_536;

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SourceStats {
    pub total: u64,
    pub errors: u64,
    pub duplicates: u64,
}

#[derive(Default)]
struct ServiceStats {
    per_source: HashMap<String, SourceStats>,
    per_frequency: HashMap<String, u64>,
    /// Ingest timestamps for the rolling last-hour rate, pruned on read
    hourly: Vec<DateTime<Utc>>,
}

/// The normalizer/dedup/enrichment core. One instance per process; the UDP
/// listeners feed it and the pipeline consumes its output.
pub struct AcarsService {
    dedup_acars: DedupCache,
    dedup_vdlm2: DedupCache,
    stats: Mutex<ServiceStats>,
    ring: Mutex<VecDeque<AcarsMessage>>,
}

impl Default for AcarsService {
    fn default() -> Self {
        Self::new()
    }
}

impl AcarsService {
    pub fn new() -> Self {
        AcarsService {
            dedup_acars: DedupCache::with_defaults(),
            dedup_vdlm2: DedupCache::with_defaults(),
            stats: Mutex::new(ServiceStats::default()),
            ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        }
    }

    fn dedup_for(&self, source: &str) -> &DedupCache {
        if source == "vdlm2" {
            &self.dedup_vdlm2
        } else {
            &self.dedup_acars
        }
    }

    fn bump_error(&self, source: &str) {
        let mut stats = self.stats.lock().expect("acars stats lock poisoned");
        stats.per_source.entry(source.to_string()).or_default().errors += 1;
        metrics::counter!("acars.errors_total", "source" => source.to_string()).increment(1);
    }

    /// Process one raw datagram through parse, normalize, dedup, and enrich.
    /// Returns None for malformed, unknown-shape, and duplicate input;
    /// counters record which.
    pub fn process_datagram(&self, data: &[u8], source: &str) -> Option<AcarsMessage> {
        let raw: Value = match serde_json::from_slice(data) {
            Ok(value) => value,
            Err(e) => {
                debug!("Dropping malformed {} datagram: {}", source, e);
                self.bump_error(source);
                return None;
            }
        };

        let Some(mut msg) = normalizer::normalize_message(&raw, source) else {
            self.bump_error(source);
            return None;
        };

        let hash = dedup::message_hash(
            msg.timestamp,
            msg.icao_hex.as_deref(),
            msg.label.as_deref(),
            msg.text.as_deref(),
        );
        if self.dedup_for(source).is_duplicate(&hash) {
            let mut stats = self.stats.lock().expect("acars stats lock poisoned");
            stats
                .per_source
                .entry(source.to_string())
                .or_default()
                .duplicates += 1;
            metrics::counter!("acars.duplicates_total", "source" => source.to_string())
                .increment(1);
            return None;
        }

        msg.decoded = Some(decoder::enrich_message(
            msg.callsign.as_deref(),
            msg.label.as_deref(),
            msg.text.as_deref(),
        ));

        {
            let mut stats = self.stats.lock().expect("acars stats lock poisoned");
            stats.per_source.entry(source.to_string()).or_default().total += 1;
            if let Some(freq) = msg.frequency {
                *stats
                    .per_frequency
                    .entry(format!("{:.3}", freq))
                    .or_default() += 1;
            }
            stats.hourly.push(Utc::now());
        }
        metrics::counter!("acars.messages_total", "source" => source.to_string()).increment(1);

        {
            let mut ring = self.ring.lock().expect("acars ring lock poisoned");
            if ring.len() >= RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(msg.clone());
        }

        Some(msg)
    }

    /// Most recent messages, newest first.
    pub fn recent_messages(&self, limit: usize) -> Vec<AcarsMessage> {
        let ring = self.ring.lock().expect("acars ring lock poisoned");
        ring.iter().rev().take(limit).cloned().collect()
    }

    /// Statistics snapshot: per-source counters, busiest frequencies, and
    /// the rolling last-hour message count (pruned here, on read).
    pub fn get_stats(&self) -> Value {
        let mut stats = self.stats.lock().expect("acars stats lock poisoned");

        let hour_ago = Utc::now() - Duration::hours(1);
        stats.hourly.retain(|t| *t > hour_ago);
        let last_hour = stats.hourly.len();

        let mut top_frequencies: Vec<(String, u64)> = stats
            .per_frequency
            .iter()
            .map(|(freq, count)| (freq.clone(), *count))
            .collect();
        top_frequencies.sort_by(|a, b| b.1.cmp(&a.1));
        top_frequencies.truncate(10);

        json!({
            "sources": &stats.per_source,
            "top_frequencies": top_frequencies
                .into_iter()
                .map(|(freq, count)| json!({"frequency": freq, "count": count}))
                .collect::<Vec<_>>(),
            "messages_last_hour": last_hour,
        })
    }
}

/// Bind one UDP port and feed every datagram through the service; surviving
/// messages go to the pipeline via `tx`. Runs until cancelled.
pub async fn run_listener(
    service: std::sync::Arc<AcarsService>,
    port: u16,
    source: &'static str,
    tx: flume::Sender<AcarsMessage>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
    info!("Listening for {} on udp/{}", source, port);

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, _addr) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("{} listener recv error: {}", source, e);
                        continue;
                    }
                };
                if let Some(msg) = service.process_datagram(&buf[..len], source)
                    && tx.send_async(msg).await.is_err()
                {
                    // Consumer is gone; shutdown is underway
                    break;
                }
            }
            _ = shutdown.cancelled() => {
                info!("{} listener shutting down", source);
                break;
            }
        }
    }
    Ok(())
}

/// Spawn both configured listeners. Returns the receiving end the pipeline
/// consumes.
pub fn start_listeners(
    service: std::sync::Arc<AcarsService>,
    acars_port: u16,
    vdlm2_port: u16,
    shutdown: CancellationToken,
) -> flume::Receiver<AcarsMessage> {
    let (tx, rx) = flume::bounded::<AcarsMessage>(1000);

    for (port, source) in [(acars_port, "acars"), (vdlm2_port, "vdlm2")] {
        let service = service.clone();
        let tx = tx.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(
            async move {
                if let Err(e) = run_listener(service, port, source, tx, shutdown).await {
                    warn!("{} listener on udp/{} failed: {}", source, port, e);
                }
            }
            .instrument(tracing::info_span!("acars_listener", source = source)),
        );
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn datagram(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_process_valid_acars_datagram() {
        let service = AcarsService::new();
        let msg = service
            .process_datagram(
                &datagram(json!({
                    "timestamp": 1704067200.0,
                    "freq": 131.55,
                    "icao": "ABC123",
                    "flight": "UAL456",
                    "label": "10",
                    "text": "OUT report",
                })),
                "acars",
            )
            .expect("valid datagram should produce a message");

        assert_eq!(msg.icao_hex.as_deref(), Some("ABC123"));
        let decoded = msg.decoded.unwrap();
        assert_eq!(decoded["airline"]["icao"], "UAL");
        assert_eq!(decoded["label_info"]["name"], "Out");

        let stats = service.get_stats();
        assert_eq!(stats["sources"]["acars"]["total"], 1);
        assert_eq!(stats["messages_last_hour"], 1);
    }

    #[test]
    fn test_malformed_datagram_counted_and_dropped() {
        let service = AcarsService::new();
        assert!(service.process_datagram(b"not json{", "acars").is_none());
        let stats = service.get_stats();
        assert_eq!(stats["sources"]["acars"]["errors"], 1);
    }

    #[test]
    fn test_duplicate_datagram_idempotent() {
        let service = AcarsService::new();
        let data = datagram(json!({
            "timestamp": 1704067200.0,
            "icao": "ABC123",
            "label": "10",
            "text": "Same message",
        }));

        assert!(service.process_datagram(&data, "acars").is_some());
        // Identical datagram within the TTL drops and bumps the counter
        assert!(service.process_datagram(&data, "acars").is_none());

        let stats = service.get_stats();
        assert_eq!(stats["sources"]["acars"]["total"], 1);
        assert_eq!(stats["sources"]["acars"]["duplicates"], 1);
        assert_eq!(service.recent_messages(10).len(), 1);
    }

    #[test]
    fn test_dedup_is_per_source() {
        let service = AcarsService::new();
        let content = json!({
            "timestamp": 1704067200.0,
            "icao": "ABC123",
            "label": "10",
            "text": "Cross-source message",
        });
        assert!(service.process_datagram(&datagram(content.clone()), "acars").is_some());
        assert!(service.process_datagram(&datagram(content), "vdlm2").is_some());
    }

    #[test]
    fn test_recent_messages_newest_first() {
        let service = AcarsService::new();
        for i in 0..5 {
            service.process_datagram(
                &datagram(json!({
                    "timestamp": 1704067200.0 + i as f64,
                    "icao": format!("ABC12{}", i),
                    "text": format!("message {}", i),
                })),
                "acars",
            );
        }
        let recent = service.recent_messages(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].icao_hex.as_deref(), Some("ABC124"));
        assert_eq!(recent[2].icao_hex.as_deref(), Some("ABC122"));
    }

    #[test]
    fn test_frequency_tracking() {
        let service = AcarsService::new();
        for i in 0..3 {
            service.process_datagram(
                &datagram(json!({
                    "timestamp": 1704067200.0 + i as f64,
                    "icao": format!("ABC{:03}", i),
                    "freq": 131.55,
                    "text": format!("m{}", i),
                })),
                "acars",
            );
        }
        let stats = service.get_stats();
        assert_eq!(stats["top_frequencies"][0]["frequency"], "131.550");
        assert_eq!(stats["top_frequencies"][0]["count"], 3);
    }
}
