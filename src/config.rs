//! # Runtime Configuration
//!
//! Reads the environment variables named in `spec.md` §6 into a typed
//! [`RuntimeConfig`], fail-closed: every `UNSAFE_*` toggle defaults to
//! `false`, and a malformed value is a hard [`ConfigError`] rather than a
//! silently ignored default.

use std::fmt;

use thiserror::Error;

use crate::crypto::SignatureVerifier;
use crate::jwks::JwkSet;

/// Severity of a non-fatal [`ConfigWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    /// Informational — the deployment probably intends this.
    Info,
    /// Likely unintended, but not rejected.
    Warning,
}

/// A configuration condition worth surfacing to an operator without
/// refusing to start (unlike a [`ConfigError`]).
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// Environment variable the warning concerns.
    pub field: &'static str,
    /// Human-readable explanation.
    pub message: String,
    /// How severe this warning is.
    pub severity: WarningSeverity,
}

/// A fatal configuration problem: an environment variable was present but
/// could not be parsed into the shape it names.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `PEAC_VERIFY_KEYS` was present but not a valid JWKS document.
    #[error("{0} is not a valid JWKS document: {1}")]
    InvalidJwks(&'static str, String),
    /// `PEAC_TRUSTED_ISSUERS_JSON` was present but not a JSON array of
    /// strings.
    #[error("{0} is not a JSON array of issuer origins: {1}")]
    InvalidIssuerList(&'static str, String),
    /// A boolean-valued variable held something other than
    /// `true`/`false`/`1`/`0`.
    #[error("{0} must be true/false/1/0, got {1:?}")]
    InvalidBool(&'static str, String),
}

/// Parsed runtime configuration, read once at process startup.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Statically configured trust anchors from `PEAC_VERIFY_KEYS`, used in
    /// place of (or alongside) live JWKS discovery.
    pub verify_keys: Vec<SignatureVerifier>,
    /// Issuer origins trusted regardless of discovery, from
    /// `PEAC_TRUSTED_ISSUERS_JSON`.
    pub trusted_issuers: Vec<String>,
    /// Whether to trust `X-Forwarded-*`-style proxy headers for client
    /// identity (`PEAC_TRUST_PROXY`).
    pub trust_proxy: bool,
    /// Issuer allowlist a [`crate::verifier::VerifyPolicy`] should enforce
    /// (`ISSUER_ALLOWLIST`, comma-separated).
    pub issuer_allowlist: Vec<String>,
    /// Path prefixes a [`crate::gateway::GatewayConfig`] should bypass
    /// (`BYPASS_PATHS`, comma-separated).
    pub bypass_paths: Vec<String>,
    /// Disables issuer-allowlist enforcement entirely. Fail-closed default:
    /// `false`.
    pub unsafe_allow_any_issuer: bool,
    /// Allows unrecognized `ext` or purpose tags instead of rejecting them.
    /// Fail-closed default: `false`.
    pub unsafe_allow_unknown_tags: bool,
    /// Disables replay protection, serving every receipt as unseen. Only
    /// ever appropriate for local development. Fail-closed default: `false`.
    pub unsafe_allow_no_replay: bool,
}

impl RuntimeConfig {
    /// Read the full configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a present variable does not parse into
    /// its expected shape. Absent variables fall back to their fail-closed
    /// defaults and never error.
    pub fn from_env() -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let mut warnings = Vec::new();

        let verify_keys = match env_var("PEAC_VERIFY_KEYS") {
            Some(raw) => {
                let set: JwkSet = serde_json::from_str(&raw)
                    .map_err(|e| ConfigError::InvalidJwks("PEAC_VERIFY_KEYS", e.to_string()))?;
                set.keys
                    .iter()
                    .map(|k| {
                        k.to_verifier()
                            .map_err(|e| ConfigError::InvalidJwks("PEAC_VERIFY_KEYS", e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => Vec::new(),
        };

        let trusted_issuers = match env_var("PEAC_TRUSTED_ISSUERS_JSON") {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| ConfigError::InvalidIssuerList("PEAC_TRUSTED_ISSUERS_JSON", e.to_string()))?,
            None => Vec::new(),
        };

        let trust_proxy = env_bool("PEAC_TRUST_PROXY")?;
        let issuer_allowlist = env_list("ISSUER_ALLOWLIST");
        let bypass_paths = env_list("BYPASS_PATHS");

        let unsafe_allow_any_issuer = env_bool("UNSAFE_ALLOW_ANY_ISSUER")?;
        let unsafe_allow_unknown_tags = env_bool("UNSAFE_ALLOW_UNKNOWN_TAGS")?;
        let unsafe_allow_no_replay = env_bool("UNSAFE_ALLOW_NO_REPLAY")?;

        for (enabled, field) in [
            (unsafe_allow_any_issuer, "UNSAFE_ALLOW_ANY_ISSUER"),
            (unsafe_allow_unknown_tags, "UNSAFE_ALLOW_UNKNOWN_TAGS"),
            (unsafe_allow_no_replay, "UNSAFE_ALLOW_NO_REPLAY"),
        ] {
            if enabled {
                warnings.push(ConfigWarning {
                    field,
                    message: format!("{field}=true disables a safety check; do not run this in production"),
                    severity: WarningSeverity::Warning,
                });
            }
        }

        if issuer_allowlist.is_empty() && trusted_issuers.is_empty() && !unsafe_allow_any_issuer {
            warnings.push(ConfigWarning {
                field: "ISSUER_ALLOWLIST",
                message: "no issuer allowlist or trusted issuers configured; every receipt will be rejected \
                          with E_ISSUER_NOT_ALLOWED until one is set"
                    .to_string(),
                severity: WarningSeverity::Info,
            });
        }

        Ok((
            Self {
                verify_keys,
                trusted_issuers,
                trust_proxy,
                issuer_allowlist,
                bypass_paths,
                unsafe_allow_any_issuer,
                unsafe_allow_unknown_tags,
                unsafe_allow_no_replay,
            },
            warnings,
        ))
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_bool(name: &'static str) -> Result<bool, ConfigError> {
    match env_var(name) {
        None => Ok(false),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ConfigError::InvalidBool(name, other.to_string())),
        },
    }
}

fn env_list(name: &str) -> Vec<String> {
    env_var(name)
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            "PEAC_VERIFY_KEYS",
            "PEAC_TRUSTED_ISSUERS_JSON",
            "PEAC_TRUST_PROXY",
            "ISSUER_ALLOWLIST",
            "BYPASS_PATHS",
            "UNSAFE_ALLOW_ANY_ISSUER",
            "UNSAFE_ALLOW_UNKNOWN_TAGS",
            "UNSAFE_ALLOW_NO_REPLAY",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn defaults_are_fail_closed() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let (config, warnings) = RuntimeConfig::from_env().unwrap();
        assert!(!config.unsafe_allow_any_issuer);
        assert!(!config.unsafe_allow_unknown_tags);
        assert!(!config.unsafe_allow_no_replay);
        assert!(!config.trust_proxy);
        assert!(warnings.iter().any(|w| w.field == "ISSUER_ALLOWLIST"));
        clear_all();
    }

    #[test]
    fn parses_comma_separated_lists() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("BYPASS_PATHS", "/healthz, /metrics ,/ready");
        let (config, _) = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.bypass_paths, vec!["/healthz", "/metrics", "/ready"]);
        clear_all();
    }

    #[test]
    fn rejects_invalid_bool_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("UNSAFE_ALLOW_NO_REPLAY", "maybe");
        let err = RuntimeConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool("UNSAFE_ALLOW_NO_REPLAY", _)));
        clear_all();
    }

    #[test]
    fn unsafe_flags_produce_warnings() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("ISSUER_ALLOWLIST", "https://issuer.example");
        std::env::set_var("UNSAFE_ALLOW_NO_REPLAY", "true");
        let (config, warnings) = RuntimeConfig::from_env().unwrap();
        assert!(config.unsafe_allow_no_replay);
        assert!(warnings.iter().any(|w| w.field == "UNSAFE_ALLOW_NO_REPLAY"));
        clear_all();
    }
}
