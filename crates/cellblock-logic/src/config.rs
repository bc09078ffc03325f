//! Facility tuning: timings, radii and thresholds.
//!
//! Every field has a default, and configs are deserialized with
//! `#[serde(default)]`, so a JSON file only needs the values it overrides.
//!
//! ```
//! use cellblock_logic::config::{validate_config, FacilityConfig};
//!
//! let config = FacilityConfig::default();
//! assert!(validate_config(&config).is_empty());
//! assert_eq!(config.ledger.max_open_seconds, 30.0);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Door-crossing timings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DoorTimings {
    /// Distance at which an actor counts as arrived at an anchor point.
    pub arrival_tolerance: f32,
    /// Seconds before a navigation wait gives up and proceeds anyway.
    pub navigation_timeout: f64,
    /// Default guard check pause before opening and after crossing.
    pub security_pause: f64,
    /// Open animation length.
    pub open_duration: f64,
    /// Delay between the exit check and the close command.
    pub pre_close_delay: f64,
    /// Seconds between reminders while waiting for an escorted actor.
    pub escort_reminder_interval: f64,
    /// Escorted actor within this distance of the exit counts as through.
    pub escort_pass_distance: f32,
}

impl Default for DoorTimings {
    fn default() -> Self {
        Self {
            arrival_tolerance: 0.5,
            navigation_timeout: 15.0,
            security_pause: 0.5,
            open_duration: 1.0,
            pre_close_delay: 0.5,
            escort_reminder_interval: 5.0,
            escort_pass_distance: 1.0,
        }
    }
}

/// Door security ledger policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub breach_check_interval: f64,
    pub max_open_seconds: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            breach_check_interval: 5.0,
            max_open_seconds: 30.0,
        }
    }
}

/// Guard behaviour tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    pub scan_interval: f64,
    pub scan_radius: f32,
    /// Suspicion strictly above this triggers an investigation.
    pub suspicion_threshold: f32,
    pub investigate_speed: f32,
    pub investigate_timeout: f64,
    pub pat_down_reach: f32,
    pub pat_down_duration: f64,
    pub intervention_speed: f32,
    pub intervention_reach: f32,
    /// Dwell at each patrol point before moving on.
    pub patrol_dwell: f64,
    /// Seconds between look-around rotations while idle.
    pub idle_look_interval: f64,
    /// Half-angle of the idle look-around sweep (radians).
    pub idle_look_angle: f32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            scan_interval: 2.0,
            scan_radius: 12.0,
            suspicion_threshold: 0.6,
            investigate_speed: 1.5,
            investigate_timeout: 15.0,
            pat_down_reach: 2.0,
            pat_down_duration: 5.0,
            intervention_speed: 2.0,
            intervention_reach: 3.0,
            patrol_dwell: 3.0,
            idle_look_interval: 4.0,
            idle_look_angle: 0.8,
        }
    }
}

/// Escort sequencing tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EscortConfig {
    /// Prisoner must be within this distance of the station anchor.
    pub check_radius: f32,
    /// Per-sample displacement below this counts as standing still.
    pub stationary_epsilon: f32,
    /// Hard cap on waiting at a single station.
    pub station_timeout: f64,
    /// Prisoner farther than `far_distance` this long gets a guidance prompt.
    pub guidance_delay: f64,
    pub far_distance: f32,
    /// Search radius for a fallback point when the route to a station is blocked.
    pub renavigate_radius: f32,
}

impl Default for EscortConfig {
    fn default() -> Self {
        Self {
            check_radius: 1.5,
            stationary_epsilon: 0.05,
            station_timeout: 30.0,
            guidance_delay: 10.0,
            far_distance: 4.0,
            renavigate_radius: 2.0,
        }
    }
}

/// Complete facility configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FacilityConfig {
    /// Number of numbered cells (`CellDoor_0` .. `CellDoor_{n-1}`).
    pub cell_count: u32,
    pub doors: DoorTimings,
    pub ledger: LedgerConfig,
    pub guard: GuardConfig,
    pub escort: EscortConfig,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            cell_count: 8,
            doors: DoorTimings::default(),
            ledger: LedgerConfig::default(),
            guard: GuardConfig::default(),
            escort: EscortConfig::default(),
        }
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("suspicion threshold {0} is outside 0..1")]
    ThresholdOutOfRange(f32),
    #[error("cell block needs at least one cell")]
    NoCells,
}

/// Check a configuration, returning every problem found.
pub fn validate_config(config: &FacilityConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    let mut positive = |field: &'static str, value: f64| {
        if value <= 0.0 {
            errors.push(ConfigError::NonPositive { field, value });
        }
    };
    positive("doors.arrival_tolerance", config.doors.arrival_tolerance as f64);
    positive("doors.navigation_timeout", config.doors.navigation_timeout);
    positive("doors.escort_reminder_interval", config.doors.escort_reminder_interval);
    positive("doors.escort_pass_distance", config.doors.escort_pass_distance as f64);
    positive("ledger.breach_check_interval", config.ledger.breach_check_interval);
    positive("ledger.max_open_seconds", config.ledger.max_open_seconds);
    positive("guard.scan_interval", config.guard.scan_interval);
    positive("guard.scan_radius", config.guard.scan_radius as f64);
    positive("guard.investigate_speed", config.guard.investigate_speed as f64);
    positive("guard.intervention_speed", config.guard.intervention_speed as f64);
    positive("guard.investigate_timeout", config.guard.investigate_timeout);
    positive("escort.check_radius", config.escort.check_radius as f64);
    positive("escort.station_timeout", config.escort.station_timeout);
    positive("escort.guidance_delay", config.escort.guidance_delay);

    let mut non_negative = |field: &'static str, value: f64| {
        if value < 0.0 {
            errors.push(ConfigError::Negative { field, value });
        }
    };
    non_negative("doors.security_pause", config.doors.security_pause);
    non_negative("doors.open_duration", config.doors.open_duration);
    non_negative("doors.pre_close_delay", config.doors.pre_close_delay);
    non_negative("guard.pat_down_duration", config.guard.pat_down_duration);
    non_negative("guard.patrol_dwell", config.guard.patrol_dwell);
    non_negative("escort.stationary_epsilon", config.escort.stationary_epsilon as f64);

    if !(0.0..=1.0).contains(&config.guard.suspicion_threshold) {
        errors.push(ConfigError::ThresholdOutOfRange(config.guard.suspicion_threshold));
    }
    if config.cell_count == 0 {
        errors.push(ConfigError::NoCells);
    }

    errors
}
