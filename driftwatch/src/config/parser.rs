//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct
//! fields. Every value is validated here, so a loaded `ConfigFile` always
//! converts into a valid engine configuration.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::alert::AlertRule;
use crate::tracking::MovementStatus;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        let t = &mut config.tracking;
        if let Some(v) = section.get("immobility_radius_m") {
            t.immobility_radius_m = parse_positive_f64("tracking", "immobility_radius_m", v)?;
        }
        if let Some(v) = section.get("immobility_delay_secs") {
            t.immobility_delay_secs =
                parse_number("tracking", "immobility_delay_secs", v, "must be an integer (seconds)")?;
        }
        if let Some(v) = section.get("throttle_interval_secs") {
            t.throttle_interval_secs = parse_number(
                "tracking",
                "throttle_interval_secs",
                v,
                "must be an integer (seconds)",
            )?;
        }
        if let Some(v) = section.get("offline_timeout_secs") {
            t.offline_timeout_secs = parse_number(
                "tracking",
                "offline_timeout_secs",
                v,
                "must be an integer (seconds)",
            )?;
        }
        if let Some(v) = section.get("fallback_interval_secs") {
            t.fallback_interval_secs = parse_number(
                "tracking",
                "fallback_interval_secs",
                v,
                "must be an integer (seconds)",
            )?;
        }
        if let Some(v) = section.get("event_log_capacity") {
            t.event_log_capacity =
                parse_number("tracking", "event_log_capacity", v, "must be a positive integer")?;
            if t.event_log_capacity == 0 {
                return Err(invalid("tracking", "event_log_capacity", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("accuracy_gate_m") {
            let v = v.trim();
            t.accuracy_gate_m = if v.is_empty() || v.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_positive_f64("tracking", "accuracy_gate_m", v)?)
            };
        }
        if let Some(v) = section.get("low_accuracy_confirmations") {
            t.low_accuracy_confirmations = parse_number(
                "tracking",
                "low_accuracy_confirmations",
                v,
                "must be a positive integer",
            )?;
            if t.low_accuracy_confirmations == 0 {
                return Err(invalid(
                    "tracking",
                    "low_accuracy_confirmations",
                    v,
                    "must be at least 1",
                ));
            }
        }
        if let Some(v) = section.get("write_timeout_secs") {
            t.write_timeout_secs =
                parse_number("tracking", "write_timeout_secs", v, "must be an integer (seconds)")?;
        }

        if t.offline_timeout_secs <= t.fallback_interval_secs {
            return Err(invalid(
                "tracking",
                "offline_timeout_secs",
                &t.offline_timeout_secs.to_string(),
                "must exceed fallback_interval_secs",
            ));
        }
    }

    // [alerts] section
    if let Some(section) = ini.section(Some("alerts")) {
        let a = &mut config.alerts;
        if let Some(v) = section.get("enabled") {
            a.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("volume") {
            a.volume = parse_fraction("alerts", "volume", v)?;
        }
        parse_rule(section, "moving", &mut a.moving);
        parse_rule(section, "stationary", &mut a.stationary);
        parse_rule(section, "offline", &mut a.offline);
        parse_rule(section, "battery", &mut a.battery);
        parse_rule(section, "emergency", &mut a.emergency);
        if let Some(v) = section.get("battery_threshold") {
            a.battery_threshold = parse_fraction("alerts", "battery_threshold", v)?;
        }
        if let Some(v) = section.get("watch_status") {
            let v = v.trim().to_lowercase();
            a.watch_status = match v.as_str() {
                "" | "none" => None,
                other => Some(MovementStatus::parse(other).ok_or_else(|| {
                    invalid(
                        "alerts",
                        "watch_status",
                        other,
                        "must be 'moving', 'stationary', 'offline', or 'none'",
                    )
                })?),
            };
        }
        if let Some(v) = section.get("watch_minutes") {
            a.watch_minutes =
                parse_number("alerts", "watch_minutes", v, "must be a positive integer (minutes)")?;
            if a.watch_minutes == 0 {
                return Err(invalid("alerts", "watch_minutes", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("watch_sound") {
            let v = v.trim();
            if !v.is_empty() {
                a.watch_sound = v.to_string();
            }
        }
        if let Some(v) = section.get("watch_loop") {
            a.watch_loop = parse_bool(v);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Overlay `<kind>_enabled`, `<kind>_sound` and `<kind>_loop`.
fn parse_rule(section: &Properties, kind: &str, rule: &mut AlertRule) {
    if let Some(v) = section.get(format!("{kind}_enabled").as_str()) {
        rule.enabled = parse_bool(v);
    }
    if let Some(v) = section.get(format!("{kind}_sound").as_str()) {
        let v = v.trim();
        if !v.is_empty() {
            rule.sound = v.to_string();
        }
    }
    if let Some(v) = section.get(format!("{kind}_loop").as_str()) {
        rule.looping = parse_bool(v);
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(invalid(section, key, value, "must be a positive number (meters)")),
    }
}

fn parse_fraction(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    match value.trim().parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(invalid(section, key, value, "must be a number between 0 and 1")),
    }
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> std::path::PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    std::path::PathBuf::from(path)
}
