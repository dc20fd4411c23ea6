//! Settings loading: compiled defaults, then the JSON file, then the
//! environment, then validation.
//!
//! The file is merged over the defaults key by key, so it only needs the
//! fields it changes. Nested objects merge recursively, arrays and scalars
//! replace, and `null` leaves the default in place.

use std::fmt::Display;
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::BarPiSettings;

/// Default settings file: `~/.barpi/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".barpi").join("settings.json")
}

/// Load from [`settings_path`].
pub fn load_settings() -> Result<BarPiSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path`. A missing file is not an error.
pub fn load_settings_from_path(path: &Path) -> Result<BarPiSettings> {
    let mut merged = serde_json::to_value(BarPiSettings::default())?;

    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "merging settings file");
            merged = deep_merge(merged, serde_json::from_str(&content)?);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    let mut settings: BarPiSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Merge `source` over `target`. Objects merge per key; anything else in
/// `source` replaces `target`, except `null`, which is skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut into), Value::Object(from)) => {
            for (key, value) in from.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match into.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = into.insert(key, merged);
            }
            Value::Object(into)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut BarPiSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Names follow the appliance's `.env` file. Empty values are treated as
/// unset; unparsable or out-of-range values are logged and skipped.
pub fn apply_overrides(settings: &mut BarPiSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader(lookup);

    if let Some(v) = env.string("APP_NAME") {
        settings.name = v;
    }
    if let Some(v) = env.string("APP_VERSION") {
        settings.version = v;
    }
    if let Some(v) = env.string("SERVER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.number("SERVER_PORT", 1..=u16::MAX) {
        settings.server.port = v;
    }

    let messaging = &mut settings.messaging;
    if let Some(v) = env.string("WS_PATH") {
        messaging.ws_path = v;
    }
    if let Some(v) = env.number("WS_MAILBOX_CAPACITY", 1..=65_536) {
        messaging.mailbox_capacity = v;
    }
    if let Some(v) = env.number("WS_HEARTBEAT_INTERVAL_SECS", 1..=3600) {
        messaging.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.number("WS_WRITE_TIMEOUT_SECS", 1..=600) {
        messaging.write_timeout_secs = v;
    }

    if let Some(v) = env.string("JWT_SECRET") {
        settings.jwt.secret = v;
    }
    if let Some(v) = env.string("LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.flag("LOG_JSON") {
        settings.logging.json = v;
    }
}

struct EnvReader<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn flag(&self, name: &str) -> Option<bool> {
        let raw = self.string(name)?;
        let parsed = parse_bool(&raw);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "expected a boolean, ignoring");
        }
        parsed
    }

    fn number<T>(&self, name: &str, range: RangeInclusive<T>) -> Option<T>
    where
        T: FromStr + PartialOrd + Display,
    {
        let raw = self.string(name)?;
        let parsed = parse_in_range(&raw, &range);
        if parsed.is_none() {
            warn!(
                key = name,
                value = %raw,
                min = %range.start(),
                max = %range.end(),
                "expected a number in range, ignoring"
            );
        }
        parsed
    }
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and accept it only inside `range`.
pub fn parse_in_range<T: FromStr + PartialOrd>(val: &str, range: &RangeInclusive<T>) -> Option<T> {
    let n: T = val.trim().parse().ok()?;
    range.contains(&n).then_some(n)
}
