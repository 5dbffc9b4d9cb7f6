//! Low-power degradation driven by an explicit resource reading.

use crate::config::DeployConfig;
use serde::{Deserialize, Serialize};

/// Operating mode, ordered from most to least capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    SimpleReactive,
    SafeStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceReading {
    pub battery_volts: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerThresholds {
    pub low_volts: f64,
    pub critical_volts: f64,
    pub recovery_margin: f64,
}

impl PowerThresholds {
    #[must_use]
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            low_volts: config.low_battery_volts,
            critical_volts: config.critical_battery_volts,
            recovery_margin: config.recovery_margin,
        }
    }

    fn classify(&self, volts: f64) -> RunMode {
        if volts >= self.low_volts {
            RunMode::Full
        } else if volts >= self.critical_volts {
            RunMode::SimpleReactive
        } else {
            RunMode::SafeStop
        }
    }
}

/// Mode for the next tick.
///
/// Degrades immediately; upgrades only once the reading clears the better
/// threshold by `recovery_margin`. Non-finite readings stop the device.
#[must_use]
pub fn next_mode(current: RunMode, reading: ResourceReading, thresholds: &PowerThresholds) -> RunMode {
    let volts = reading.battery_volts;
    if !volts.is_finite() {
        return RunMode::SafeStop;
    }
    let observed = thresholds.classify(volts);
    if observed >= current {
        return observed;
    }
    let confirmed = thresholds.classify(volts - thresholds.recovery_margin);
    confirmed.min(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> PowerThresholds {
        PowerThresholds::from_config(&DeployConfig::default())
    }

    fn volts(v: f64) -> ResourceReading {
        ResourceReading { battery_volts: v }
    }

    #[test]
    fn test_degrades_immediately() {
        let t = thresholds();
        assert_eq!(next_mode(RunMode::Full, volts(3.4), &t), RunMode::SimpleReactive);
        assert_eq!(next_mode(RunMode::Full, volts(3.0), &t), RunMode::SafeStop);
        assert_eq!(next_mode(RunMode::SimpleReactive, volts(3.1), &t), RunMode::SafeStop);
    }

    #[test]
    fn test_recovery_needs_margin() {
        let t = thresholds();
        assert_eq!(next_mode(RunMode::SimpleReactive, volts(3.55), &t), RunMode::SimpleReactive);
        assert_eq!(next_mode(RunMode::SimpleReactive, volts(3.65), &t), RunMode::Full);
        assert_eq!(next_mode(RunMode::SafeStop, volts(3.25), &t), RunMode::SafeStop);
        assert_eq!(next_mode(RunMode::SafeStop, volts(3.35), &t), RunMode::SimpleReactive);
        assert_eq!(next_mode(RunMode::SafeStop, volts(4.2), &t), RunMode::Full);
    }

    #[test]
    fn test_non_finite_reading_stops() {
        let t = thresholds();
        assert_eq!(next_mode(RunMode::Full, volts(f64::NAN), &t), RunMode::SafeStop);
        assert_eq!(next_mode(RunMode::Full, volts(f64::INFINITY), &t), RunMode::SafeStop);
    }

    #[test]
    fn test_steady_reading_keeps_mode() {
        let t = thresholds();
        assert_eq!(next_mode(RunMode::Full, volts(3.9), &t), RunMode::Full);
        assert_eq!(next_mode(RunMode::SimpleReactive, volts(3.3), &t), RunMode::SimpleReactive);
    }
}
