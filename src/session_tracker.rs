use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::observations::AircraftObservation;
use crate::sessions::AircraftSession;
use crate::sessions_repo::SessionsRepository;

/// Gap after which a new sighting opens a fresh session instead of
/// re-attaching to the previous one
const CONTINUITY_WINDOW_MINUTES: i64 = 5;
/// Cache entries idle longer than this are swept
const CACHE_STALE_MINUTES: i64 = 10;
/// Sweep cadence
pub const SWEEP_INTERVAL_SECS: u64 = 300;

struct CachedSession {
    session: AircraftSession,
    cached_at: DateTime<Utc>,
}

/// Outcome of tracking one observation
pub struct TrackedSession {
    pub session_id: Uuid,
    /// True when this observation opened a brand-new session. Alert rules
    /// are evaluated only for newly opened sessions so one aircraft loitering
    /// overhead doesn't re-fire on every store cycle.
    pub newly_opened: bool,
}

/// Maintains the open-session mapping (ICAO, source) -> session. The full
/// session row is cached in memory so aggregates fold without a read per
/// observation; every update is written through to storage.
///
/// Invariant: for each (ICAO, source) at most one session is open at a time.
#[derive(Clone)]
pub struct SessionTracker {
    repo: SessionsRepository,
    cache: Arc<DashMap<(String, String), CachedSession>>,
}

impl SessionTracker {
    pub fn new(repo: SessionsRepository) -> Self {
        Self {
            repo,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Record one observation against its session. Returns None when storage
    /// rejected the write; the caller drops the unit of work and proceeds.
    pub async fn track(
        &self,
        obs: &AircraftObservation,
        distance_nm: Option<f64>,
    ) -> Option<TrackedSession> {
        let key = (obs.icao.clone(), obs.source.to_string());
        let window = Duration::minutes(CONTINUITY_WINDOW_MINUTES);

        // Fast path: cached session still within the continuity window
        let cached = self.cache.get(&key).and_then(|entry| {
            let gap = obs.seen_at.signed_duration_since(entry.session.last_seen);
            if gap <= window && gap >= Duration::zero() - window {
                Some(entry.session.clone())
            } else {
                None
            }
        });

        if let Some(mut session) = cached {
            session.absorb(obs, distance_nm);
            match self.repo.update(session.clone()).await {
                Ok(true) => {
                    let session_id = session.id;
                    self.cache.insert(
                        key,
                        CachedSession {
                            session,
                            cached_at: Utc::now(),
                        },
                    );
                    return Some(TrackedSession {
                        session_id,
                        newly_opened: false,
                    });
                }
                Ok(false) => {
                    // Row vanished under us; fall through to re-attach/create
                    self.cache.remove(&key);
                }
                Err(e) => {
                    error!("Failed to update session for {}: {}", obs.icao, e);
                    return None;
                }
            }
        } else {
            self.cache.remove(&key);
        }

        // Slow path: adopt a recent session from storage or open a new one
        match self
            .repo
            .find_recent(&obs.icao, &key.1, window)
            .await
        {
            Ok(Some(mut session)) => {
                session.absorb(obs, distance_nm);
                if let Err(e) = self.repo.update(session.clone()).await {
                    error!("Failed to re-attach session for {}: {}", obs.icao, e);
                    return None;
                }
                let session_id = session.id;
                debug!("Re-attached {} to session {}", obs.icao, session_id);
                self.cache.insert(
                    key,
                    CachedSession {
                        session,
                        cached_at: Utc::now(),
                    },
                );
                Some(TrackedSession {
                    session_id,
                    newly_opened: false,
                })
            }
            Ok(None) => {
                let session = AircraftSession::open(obs, distance_nm);
                let session_id = session.id;
                if let Err(e) = self.repo.insert(session.clone()).await {
                    error!("Failed to open session for {}: {}", obs.icao, e);
                    return None;
                }
                debug!("Opened session {} for {}", session_id, obs.icao);
                self.cache.insert(
                    key,
                    CachedSession {
                        session,
                        cached_at: Utc::now(),
                    },
                );
                Some(TrackedSession {
                    session_id,
                    newly_opened: true,
                })
            }
            Err(e) => {
                error!("Failed to look up session for {}: {}", obs.icao, e);
                None
            }
        }
    }

    pub fn open_session_count(&self) -> usize {
        self.cache.len()
    }

    /// Drop cache entries that have not been touched recently.
    pub fn sweep_stale(&self) {
        let cutoff = Utc::now() - Duration::minutes(CACHE_STALE_MINUTES);
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.cached_at > cutoff);
        let removed = before - self.cache.len();
        if removed > 0 {
            info!("Swept {} stale session cache entries", removed);
            metrics::counter!("sessions.cache_swept_total").increment(removed as u64);
        }
        metrics::gauge!("sessions.open").set(self.cache.len() as f64);
    }

    /// Background sweeper; runs until the token is cancelled.
    pub fn start_sweeper(&self, shutdown: CancellationToken) {
        let tracker = self.clone();
        tokio::spawn(
            async move {
                let mut interval =
                    tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => tracker.sweep_stale(),
                        _ = shutdown.cancelled() => {
                            debug!("Session sweeper shutting down");
                            break;
                        }
                    }
                }
            }
            .instrument(tracing::info_span!("session_sweeper")),
        );
        info!(
            "Started session cache sweeper (every {} seconds)",
            SWEEP_INTERVAL_SECS
        );
    }
}
