use anyhow::{Context, Result, bail};
use std::env;

/// Runtime configuration, populated from environment variables once at
/// startup. Missing required keys and out-of-range thresholds are startup
/// errors; the process refuses to run rather than limping along with a
/// half-configured pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Receiver site location, used for sighting distance and fan-out payloads
    pub feeder_lat: f64,
    pub feeder_lon: f64,

    /// Primary (1090 MHz) aggregator base URL, e.g. http://ultrafeeder
    pub ultrafeeder_url: String,
    /// Optional secondary (978 MHz UAT) aggregator base URL
    pub dump978_url: Option<String>,

    /// Seconds between upstream polls
    pub polling_interval: u64,
    /// Seconds between database store cycles (observations still flow to
    /// safety/alerts/fan-out between stores)
    pub db_store_interval: u64,

    /// Safety monitor thresholds
    pub safety_enabled: bool,
    pub safety_vs_change_threshold: i32,
    pub safety_vs_extreme_threshold: i32,
    pub safety_tcas_vs_threshold: i32,
    pub safety_proximity_nm: f64,
    pub safety_altitude_diff_ft: i32,

    /// ACARS/VDL2 UDP ingest
    pub acars_enabled: bool,
    pub acars_port: u16,
    pub vdlm2_port: u16,

    /// Apprise-compatible notification endpoints (comma separated) and the
    /// per-key cooldown that throttles repeat sends
    pub apprise_urls: Vec<String>,
    pub notification_cooldown: u64,

    pub database_url: String,
    /// Optional NATS URL; when set, fan-out also publishes to NATS subjects
    /// for multi-worker deployments
    pub nats_url: Option<String>,
    /// Prometheus metrics port; 0 disables the metrics server
    pub metrics_port: u16,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}", key)),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match optional(key) {
        Some(raw) => matches!(raw.trim(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

impl Settings {
    /// Load and validate settings from the environment.
    pub fn from_env() -> Result<Self> {
        let feeder_lat: f64 = required("FEEDER_LAT")?
            .trim()
            .parse()
            .context("invalid FEEDER_LAT")?;
        let feeder_lon: f64 = required("FEEDER_LON")?
            .trim()
            .parse()
            .context("invalid FEEDER_LON")?;

        let settings = Settings {
            feeder_lat,
            feeder_lon,
            ultrafeeder_url: required("ULTRAFEEDER_URL")?
                .trim_end_matches('/')
                .to_string(),
            dump978_url: optional("DUMP978_URL").map(|u| u.trim_end_matches('/').to_string()),
            polling_interval: parse_or("POLLING_INTERVAL", 2)?,
            db_store_interval: parse_or("DB_STORE_INTERVAL", 15)?,
            safety_enabled: parse_bool("SAFETY_MONITORING_ENABLED", true),
            safety_vs_change_threshold: parse_or("SAFETY_VS_CHANGE_THRESHOLD", 1000)?,
            safety_vs_extreme_threshold: parse_or("SAFETY_VS_EXTREME_THRESHOLD", 6000)?,
            safety_tcas_vs_threshold: parse_or("SAFETY_TCAS_VS_THRESHOLD", 1500)?,
            safety_proximity_nm: parse_or("SAFETY_PROXIMITY_NM", 0.5)?,
            safety_altitude_diff_ft: parse_or("SAFETY_ALTITUDE_DIFF_FT", 500)?,
            acars_enabled: parse_bool("ACARS_ENABLED", false),
            acars_port: parse_or("ACARS_PORT", 5550)?,
            vdlm2_port: parse_or("VDLM2_PORT", 5555)?,
            apprise_urls: optional("APPRISE_URLS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            notification_cooldown: parse_or("NOTIFICATION_COOLDOWN", 300)?,
            database_url: required("DATABASE_URL")?,
            nats_url: optional("NATS_URL"),
            metrics_port: parse_or("METRICS_PORT", 9090)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.feeder_lat) {
            bail!("FEEDER_LAT out of range: {}", self.feeder_lat);
        }
        if !(-180.0..=180.0).contains(&self.feeder_lon) {
            bail!("FEEDER_LON out of range: {}", self.feeder_lon);
        }
        if self.polling_interval == 0 {
            bail!("POLLING_INTERVAL must be at least 1 second");
        }
        if self.db_store_interval < self.polling_interval {
            bail!(
                "DB_STORE_INTERVAL ({}) must not be shorter than POLLING_INTERVAL ({})",
                self.db_store_interval,
                self.polling_interval
            );
        }
        if self.safety_proximity_nm <= 0.0 {
            bail!(
                "SAFETY_PROXIMITY_NM must be positive, got {}",
                self.safety_proximity_nm
            );
        }
        if self.safety_altitude_diff_ft <= 0 {
            bail!(
                "SAFETY_ALTITUDE_DIFF_FT must be positive, got {}",
                self.safety_altitude_diff_ft
            );
        }
        if self.safety_vs_extreme_threshold < self.safety_vs_change_threshold {
            bail!("SAFETY_VS_EXTREME_THRESHOLD must not be below SAFETY_VS_CHANGE_THRESHOLD");
        }
        Ok(())
    }

    /// Settings for tests: local defaults, no external services required.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Settings {
            feeder_lat: 47.6062,
            feeder_lon: -122.3321,
            ultrafeeder_url: "http://localhost:8080".to_string(),
            dump978_url: None,
            polling_interval: 2,
            db_store_interval: 15,
            safety_enabled: true,
            safety_vs_change_threshold: 1000,
            safety_vs_extreme_threshold: 6000,
            safety_tcas_vs_threshold: 1500,
            safety_proximity_nm: 0.5,
            safety_altitude_diff_ft: 500,
            acars_enabled: false,
            acars_port: 5550,
            vdlm2_port: 5555,
            apprise_urls: Vec::new(),
            notification_cooldown: 300,
            database_url: "postgres://localhost/skywatch_test".to_string(),
            nats_url: None,
            metrics_port: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required_env() {
        unsafe {
            env::set_var("FEEDER_LAT", "47.6062");
            env::set_var("FEEDER_LON", "-122.3321");
            env::set_var("ULTRAFEEDER_URL", "http://ultrafeeder/");
            env::set_var("DATABASE_URL", "postgres://localhost/skywatch");
        }
    }

    fn clear_env() {
        for key in [
            "FEEDER_LAT",
            "FEEDER_LON",
            "ULTRAFEEDER_URL",
            "DATABASE_URL",
            "DUMP978_URL",
            "POLLING_INTERVAL",
            "DB_STORE_INTERVAL",
            "SAFETY_PROXIMITY_NM",
            "APPRISE_URLS",
        ] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        clear_env();
        set_required_env();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.polling_interval, 2);
        assert_eq!(settings.db_store_interval, 15);
        assert_eq!(settings.safety_vs_extreme_threshold, 6000);
        assert_eq!(settings.safety_proximity_nm, 0.5);
        assert_eq!(settings.acars_port, 5550);
        assert_eq!(settings.vdlm2_port, 5555);
        // Trailing slash trimmed so URL joining is predictable
        assert_eq!(settings.ultrafeeder_url, "http://ultrafeeder");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_required_key_fails() {
        clear_env();
        unsafe {
            env::set_var("FEEDER_LAT", "47.6062");
            env::set_var("FEEDER_LON", "-122.3321");
            env::set_var("DATABASE_URL", "postgres://localhost/skywatch");
        }
        assert!(Settings::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_out_of_range_threshold_fails() {
        clear_env();
        set_required_env();
        unsafe {
            env::set_var("SAFETY_PROXIMITY_NM", "-1.0");
        }
        assert!(Settings::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_apprise_urls_parsed() {
        clear_env();
        set_required_env();
        unsafe {
            env::set_var(
                "APPRISE_URLS",
                "pover://user@token, tgram://bottoken/chatid",
            );
        }
        let settings = Settings::from_env().unwrap();
        assert_eq!(
            settings.apprise_urls,
            vec!["pover://user@token", "tgram://bottoken/chatid"]
        );
        clear_env();
    }
}
