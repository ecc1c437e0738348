//! Gateway settings.
//!
//! Loaded from an optional JSON file, then overridden field by field from
//! `BOXWIRE_*` environment variables.  Missing fields take their defaults.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Lifetime of an ephemeral response key.
    pub key_ttl_secs: u64,
    /// Lifetime of an issued access token.
    pub session_ttl_secs: u64,
    /// Allowed skew between `x-date` and the server clock.
    pub max_clock_drift_secs: u64,
    /// Enforce the HMAC, date and salt fields of the `Authorization` header.
    pub require_request_signature: bool,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            key_ttl_secs: 15 * 60,
            session_ttl_secs: 14 * 24 * 60 * 60,
            max_clock_drift_secs: 90,
            require_request_signature: true,
            log_filter: "info".into(),
        }
    }
}

impl GatewaySettings {
    pub fn key_ttl(&self) -> Duration {
        Duration::from_secs(self.key_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn max_clock_drift(&self) -> Duration {
        Duration::from_secs(self.max_clock_drift_secs)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BOXWIRE_KEY_TTL_SECS") {
            self.key_ttl_secs = parse_var("BOXWIRE_KEY_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("BOXWIRE_SESSION_TTL_SECS") {
            self.session_ttl_secs = parse_var("BOXWIRE_SESSION_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("BOXWIRE_MAX_CLOCK_DRIFT_SECS") {
            self.max_clock_drift_secs = parse_var("BOXWIRE_MAX_CLOCK_DRIFT_SECS", &v)?;
        }
        if let Some(v) = lookup("BOXWIRE_REQUIRE_REQUEST_SIGNATURE") {
            self.require_request_signature = parse_var("BOXWIRE_REQUIRE_REQUEST_SIGNATURE", &v)?;
        }
        if let Some(v) = lookup("BOXWIRE_LOG_FILTER") {
            self.log_filter = v;
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, GatewayError> {
    value
        .trim()
        .parse()
        .map_err(|_| GatewayError::Config(format!("{name}: cannot parse {value:?}")))
}

/// Read settings from `path` (if given), then apply `BOXWIRE_*` overrides.
pub fn load_settings(path: Option<&Path>) -> Result<GatewaySettings, GatewayError> {
    let mut settings = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))?
        }
        None => GatewaySettings::default(),
    };
    settings.apply_overrides(|name| std::env::var(name).ok())?;
    debug!(?settings, "settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, io::Write};

    #[test]
    fn defaults() {
        let s = GatewaySettings::default();
        assert_eq!(s.key_ttl(), Duration::from_secs(900));
        assert_eq!(s.session_ttl(), Duration::from_secs(1_209_600));
        assert_eq!(s.max_clock_drift(), Duration::from_secs(90));
        assert!(s.require_request_signature);
        assert_eq!(s.log_filter, "info");
    }

    #[test]
    fn file_fields_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"key_ttl_secs": 60, "require_request_signature": false}}"#).unwrap();
        let s = load_settings(Some(file.path())).unwrap();
        assert_eq!(s.key_ttl_secs, 60);
        assert!(!s.require_request_signature);
        assert_eq!(s.max_clock_drift_secs, 90);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("BOXWIRE_MAX_CLOCK_DRIFT_SECS", "30"),
            ("BOXWIRE_LOG_FILTER", "debug,sqlx=warn"),
        ]
        .into_iter()
        .collect();
        let mut s = GatewaySettings::default();
        s.apply_overrides(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.max_clock_drift_secs, 30);
        assert_eq!(s.log_filter, "debug,sqlx=warn");
    }

    #[test]
    fn bad_override_is_config_error() {
        let mut s = GatewaySettings::default();
        let err = s
            .apply_overrides(|k| (k == "BOXWIRE_KEY_TTL_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_settings(Some(Path::new("/nonexistent/boxwire.json"))).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
