//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use survey_core::SimRules;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Wall-clock period between ticks of one mission
    pub tick_period: Duration,
    pub rules: SimRules,
    /// Broadcast buffer per subscriber before it starts lagging
    pub event_capacity: usize,
    /// JSON array of mission descriptors loaded at startup
    pub missions_file: Option<String>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        let rules = SimRules::default();
        Self {
            server_port: 3000,
            tick_period: Duration::from_millis((rules.tick_interval_s * 1000.0).round() as u64),
            rules,
            event_capacity: 1024,
            missions_file: None,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let base = defaults.rules.clone();

        let tick_ms: u64 = parse_var("SURVEY_TICK_MS", defaults.tick_period.as_millis() as u64).max(1);
        let rules = SimRules {
            tick_interval_s: tick_ms as f64 / 1000.0,
            time_scale: parse_var("SURVEY_TIME_SCALE", base.time_scale),
            arrival_radius_m: parse_var("SURVEY_ARRIVAL_RADIUS_M", base.arrival_radius_m),
            rth_battery_pct: parse_var("SURVEY_RTH_BATTERY_PCT", base.rth_battery_pct),
            hover_every_n: parse_var("SURVEY_HOVER_EVERY", base.hover_every_n),
            hover_duration_s: parse_var("SURVEY_HOVER_SECS", base.hover_duration_s),
            ..base
        };

        Self {
            server_port: parse_var("SURVEY_PORT", defaults.server_port),
            tick_period: Duration::from_millis(tick_ms),
            rules,
            event_capacity: parse_var("SURVEY_EVENT_CAPACITY", defaults.event_capacity).max(1),
            missions_file: env::var("SURVEY_MISSIONS_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            log_json: env::var("SURVEY_LOG_JSON")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

impl Config {
    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        self.rules
            .validate()
            .into_iter()
            .map(|e| format!("simulation rules: {e}"))
            .collect()
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
