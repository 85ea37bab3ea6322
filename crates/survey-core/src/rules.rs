//! Simulation rules and thresholds.

use serde::{Deserialize, Serialize};

/// Tunables for the per-mission state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimRules {
    /// Simulated seconds per tick before time scaling
    pub tick_interval_s: f64,
    /// Multiplier applied to the simulated dt (1.0 = real time)
    pub time_scale: f64,
    /// Distance at which a waypoint or home counts as reached
    pub arrival_radius_m: f64,
    /// Battery level that forces a return to home
    pub rth_battery_pct: f64,
    /// Hover at every N-th waypoint (0 disables)
    pub hover_every_n: usize,
    /// Hover when the path turns by at least this many degrees (0 disables)
    pub sharp_turn_deg: f64,
    pub hover_duration_s: f64,
    /// Start the maneuver drain this far ahead of a sharp turn
    pub maneuver_lead_m: f64,
    /// Emit progress every N ticks
    pub progress_interval_ticks: u64,
}

impl Default for SimRules {
    fn default() -> Self {
        Self {
            tick_interval_s: 0.05,
            time_scale: 1.0,
            arrival_radius_m: 5.0,
            rth_battery_pct: 20.0,
            hover_every_n: 0,
            sharp_turn_deg: 120.0,
            hover_duration_s: 2.0,
            maneuver_lead_m: 15.0,
            progress_interval_ticks: 20,
        }
    }
}

impl SimRules {
    /// Simulated seconds advanced by one tick.
    pub fn dt(&self) -> f64 {
        self.tick_interval_s * self.time_scale
    }

    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.tick_interval_s.is_finite() || self.tick_interval_s <= 0.0 {
            errors.push(format!("tick interval must be positive (got {})", self.tick_interval_s));
        }
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            errors.push(format!("time scale must be positive (got {})", self.time_scale));
        }
        if !self.arrival_radius_m.is_finite() || self.arrival_radius_m <= 0.0 {
            errors.push(format!("arrival radius must be positive (got {})", self.arrival_radius_m));
        }
        if !(0.0..100.0).contains(&self.rth_battery_pct) {
            errors.push(format!(
                "RTH battery threshold must be within [0, 100) (got {})",
                self.rth_battery_pct
            ));
        }
        if !self.hover_duration_s.is_finite() || self.hover_duration_s < 0.0 {
            errors.push(format!("hover duration must be non-negative (got {})", self.hover_duration_s));
        }
        if self.progress_interval_ticks == 0 {
            errors.push("progress interval must be at least one tick".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_tick_at_twenty_hertz() {
        let rules = SimRules::default();
        assert!(rules.validate().is_empty());
        assert!((rules.dt() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn time_scale_multiplies_dt() {
        let rules = SimRules {
            time_scale: 10.0,
            ..SimRules::default()
        };
        assert!((rules.dt() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_nonsense_thresholds() {
        let rules = SimRules {
            rth_battery_pct: 150.0,
            arrival_radius_m: f64::NAN,
            progress_interval_ticks: 0,
            ..SimRules::default()
        };
        assert_eq!(rules.validate().len(), 3);
    }
}
