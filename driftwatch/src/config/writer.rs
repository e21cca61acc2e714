//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use crate::alert::AlertRule;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let t = &config.tracking;
    let a = &config.alerts;

    let accuracy_gate = t
        .accuracy_gate_m
        .map(|m| m.to_string())
        .unwrap_or_else(|| "none".to_string());
    let watch_status = a
        .watch_status
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "none".to_string());

    format!(
        r#"[tracking]
; Drift beyond this distance from the anchor means MOVING (default: 20)
immobility_radius_m = {}
; Time within the radius before STATIONARY is declared (default: 60)
immobility_delay_secs = {}
; Minimum interval between routine store writes; transitions are never delayed (default: 10)
throttle_interval_secs = {}
; No sample for this long means OFFLINE; must exceed fallback_interval_secs (default: 90)
offline_timeout_secs = {}
; Poll interval when the sensor cannot push updates (default: 30)
fallback_interval_secs = {}
; Status events kept per entity (default: 10)
event_log_capacity = {}
; Fixes less accurate than this need confirmation before asserting MOVING.
; Set to 'none' to trust every fix (default: 20)
accuracy_gate_m = {}
; Consecutive low-accuracy fixes beyond the radius needed to assert MOVING (default: 3)
low_accuracy_confirmations = {}
; Give up on a store write after this many seconds (default: 5)
write_timeout_secs = {}

[alerts]
; Master switch for every alert sound
enabled = {}
; Playback volume between 0 and 1 (default: 0.8)
volume = {}
{}
{}
{}
{}
; Battery level between 0 and 1 below which the battery alert fires (default: 0.5)
battery_threshold = {}
; Played when an entity raises its emergency override
{}
; Alert when an entity stays in this status: moving, stationary, offline, or none
watch_status = {}
; How long the watched status must persist (default: 60)
watch_minutes = {}
watch_sound = {}
watch_loop = {}

[logging]
; Log file path
file = {}
"#,
        t.immobility_radius_m,
        t.immobility_delay_secs,
        t.throttle_interval_secs,
        t.offline_timeout_secs,
        t.fallback_interval_secs,
        t.event_log_capacity,
        accuracy_gate,
        t.low_accuracy_confirmations,
        t.write_timeout_secs,
        a.enabled,
        a.volume,
        rule_lines("moving", &a.moving),
        rule_lines("stationary", &a.stationary),
        rule_lines("offline", &a.offline),
        rule_lines("battery", &a.battery),
        a.battery_threshold,
        rule_lines("emergency", &a.emergency),
        watch_status,
        a.watch_minutes,
        a.watch_sound,
        a.watch_loop,
        path_to_string(&config.logging.file),
    )
}

fn rule_lines(kind: &str, rule: &AlertRule) -> String {
    format!(
        "{kind}_enabled = {}\n{kind}_sound = {}\n{kind}_loop = {}",
        rule.enabled, rule.sound, rule.looping
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_config_contains_every_key() {
        let text = to_config_string(&ConfigFile::default());

        for key in [
            "immobility_radius_m = 20",
            "immobility_delay_secs = 60",
            "throttle_interval_secs = 10",
            "offline_timeout_secs = 90",
            "accuracy_gate_m = 20",
            "moving_sound = sonar",
            "stationary_loop = true",
            "watch_status = none",
            "battery_threshold = 0.5",
            "emergency_sound = military-sms",
            "emergency_loop = true",
        ] {
            assert!(text.contains(key), "missing '{key}' in:\n{text}");
        }
    }

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.alerts.volume = 0.35;
        config.alerts.battery.enabled = false;
        config.alerts.emergency.sound = "klaxon".to_string();

        let parsed = ConfigFile::from_ini_str(&to_config_string(&config)).unwrap();
        assert_eq!(parsed, config);
    }
}
