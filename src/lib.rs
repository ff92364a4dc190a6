//! skywatch - real-time aviation telemetry ingestion and fan-out.
//!
//! Polls an upstream ADS-B aggregator, ingests ACARS/VDL2 digital messages
//! over UDP, detects safety events (proximity conflicts, TCAS-like
//! maneuvers, emergency squawks), evaluates user-defined alert rules, and
//! fans everything out to connected subscribers over a pluggable pub/sub
//! transport.

pub mod acars;
pub mod acars_messages_repo;
pub mod alert_history_repo;
pub mod alert_rules_repo;
pub mod alerts;
pub mod commands;
pub mod db;
pub mod fanout;
pub mod geo;
pub mod log_format;
pub mod metrics;
pub mod nats_fanout;
pub mod notifications;
pub mod notifications_repo;
pub mod observations;
pub mod pipeline;
pub mod poller;
pub mod safety;
pub mod safety_events_repo;
pub mod schema;
pub mod session_tracker;
pub mod sessions;
pub mod sessions_repo;
pub mod settings;
pub mod sightings;
pub mod sightings_repo;

pub use observations::{AircraftObservation, SourceChannel};
pub use pipeline::AircraftPipeline;
pub use safety::{SafetyEvent, SafetyMonitor};
pub use settings::Settings;
