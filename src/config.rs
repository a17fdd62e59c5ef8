//! Monitoring configuration, read once at startup from `SENTRY_*` variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `SENTRY_DSN` | unset (monitoring disabled) |
//! | `SENTRY_ENVIRONMENT` | `development` |
//! | `SENTRY_RELEASE` | unset |
//! | `SENTRY_SAMPLE_RATE` | `1.0` |
//! | `SENTRY_TRACES_SAMPLE_RATE` | `0.1` |
//! | `SENTRY_DEBUG` | `false` |
//! | `SENTRY_REPORT_CLIENT_ERRORS` | `true` |
//! | `SENTRY_REPORT_PERFORMANCE` | `false` |

use figment::providers::Env;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    pub dsn: Option<String>,
    pub environment: String,
    pub release: Option<String>,
    pub sample_rate: f64,
    pub traces_sample_rate: f64,
    pub debug: bool,
    /// Report 4xx responses as warnings.
    pub report_client_errors: bool,
    /// Report sub-400 responses as informational performance events.
    pub report_performance: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: "development".to_owned(),
            release: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.1,
            debug: false,
            report_client_errors: true,
            report_performance: false,
        }
    }
}

impl MonitorConfig {
    /// Defaults overlaid with `SENTRY_*` environment variables.
    ///
    /// Variables are read one by one as raw strings. A value that does not
    /// parse keeps that field's default and logs a warning; every other
    /// variable, the DSN included, still applies.
    pub fn from_env() -> Self {
        Self::from_vars(
            Env::prefixed("SENTRY_")
                .iter()
                .map(|(key, value)| (key.as_str().to_owned(), value)),
        )
    }

    /// Builds a config from `(key, value)` pairs with the `SENTRY_` prefix
    /// already stripped. Keys are matched case-insensitively.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cfg = Self::default();
        for (key, value) in vars {
            let key = key.as_ref().to_ascii_lowercase();
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "dsn" => cfg.dsn = Some(value.to_owned()),
                "environment" => cfg.environment = value.to_owned(),
                "release" => cfg.release = Some(value.to_owned()),
                "sample_rate" => cfg.sample_rate = parse_rate(&key, value, cfg.sample_rate),
                "traces_sample_rate" => {
                    cfg.traces_sample_rate = parse_rate(&key, value, cfg.traces_sample_rate)
                }
                "debug" => cfg.debug = parse_flag(&key, value, cfg.debug),
                "report_client_errors" => {
                    cfg.report_client_errors = parse_flag(&key, value, cfg.report_client_errors)
                }
                "report_performance" => {
                    cfg.report_performance = parse_flag(&key, value, cfg.report_performance)
                }
                _ => {}
            }
        }
        cfg
    }

    /// The DSN, if set to something non-blank.
    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }
}

/// Parses a rate and clamps it to `[0, 1]`.
fn parse_rate(key: &str, value: &str, default: f64) -> f64 {
    match value.parse::<f64>() {
        Ok(rate) if !rate.is_nan() => rate.clamp(0.0, 1.0),
        _ => {
            warn!(var = %env_name(key), value, "not a number, keeping default {default}");
            default
        }
    }
}

fn parse_flag(key: &str, value: &str, default: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            warn!(var = %env_name(key), value, "not a boolean, keeping default {default}");
            default
        }
    }
}

fn env_name(key: &str) -> String {
    format!("SENTRY_{}", key.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_environment() {
        Jail::expect_with(|_jail| {
            let cfg = MonitorConfig::from_env();
            assert_eq!(cfg, MonitorConfig::default());
            assert!(cfg.dsn().is_none());
            Ok(())
        });
    }

    #[test]
    fn reads_prefixed_variables() {
        Jail::expect_with(|jail| {
            jail.set_env("SENTRY_DSN", "https://abc@o1.ingest.example.com/42");
            jail.set_env("SENTRY_ENVIRONMENT", "staging");
            jail.set_env("SENTRY_RELEASE", "bin-api@1.2.3");
            jail.set_env("SENTRY_TRACES_SAMPLE_RATE", "0.5");
            jail.set_env("SENTRY_DEBUG", "true");
            jail.set_env("SENTRY_REPORT_PERFORMANCE", "true");

            let cfg = MonitorConfig::from_env();
            assert_eq!(cfg.dsn(), Some("https://abc@o1.ingest.example.com/42"));
            assert_eq!(cfg.environment, "staging");
            assert_eq!(cfg.release.as_deref(), Some("bin-api@1.2.3"));
            assert_eq!(cfg.sample_rate, 1.0);
            assert_eq!(cfg.traces_sample_rate, 0.5);
            assert!(cfg.debug);
            assert!(cfg.report_client_errors);
            assert!(cfg.report_performance);
            Ok(())
        });
    }

    #[test]
    fn rates_are_clamped() {
        Jail::expect_with(|jail| {
            jail.set_env("SENTRY_SAMPLE_RATE", "7");
            jail.set_env("SENTRY_TRACES_SAMPLE_RATE", "-1");
            let cfg = MonitorConfig::from_env();
            assert_eq!(cfg.sample_rate, 1.0);
            assert_eq!(cfg.traces_sample_rate, 0.0);
            Ok(())
        });
    }

    #[test]
    fn blank_dsn_counts_as_unset() {
        let cfg = MonitorConfig { dsn: Some("  ".into()), ..MonitorConfig::default() };
        assert!(cfg.dsn().is_none());
    }

    const DSN: &str = "https://abc@o1.ingest.example.com/42";

    #[test]
    fn numeric_release_is_kept_verbatim() {
        Jail::expect_with(|jail| {
            jail.set_env("SENTRY_DSN", DSN);
            jail.set_env("SENTRY_RELEASE", "1234567");
            jail.set_env("SENTRY_ENVIRONMENT", "1.10");
            let cfg = MonitorConfig::from_env();
            assert_eq!(cfg.dsn(), Some(DSN));
            assert_eq!(cfg.release.as_deref(), Some("1234567"));
            assert_eq!(cfg.environment, "1.10");
            Ok(())
        });
    }

    #[test]
    fn numeric_debug_flag_is_accepted() {
        Jail::expect_with(|jail| {
            jail.set_env("SENTRY_DSN", DSN);
            jail.set_env("SENTRY_DEBUG", "1");
            let cfg = MonitorConfig::from_env();
            assert_eq!(cfg.dsn(), Some(DSN));
            assert!(cfg.debug);
            Ok(())
        });
    }

    #[test]
    fn unparsable_values_keep_their_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("SENTRY_DSN", DSN);
            jail.set_env("SENTRY_SAMPLE_RATE", "lots");
            jail.set_env("SENTRY_REPORT_CLIENT_ERRORS", "maybe");
            let cfg = MonitorConfig::from_env();
            let defaults = MonitorConfig::default();
            assert_eq!(cfg.dsn(), Some(DSN));
            assert_eq!(cfg.sample_rate, defaults.sample_rate);
            assert_eq!(cfg.traces_sample_rate, defaults.traces_sample_rate);
            assert_eq!(cfg.report_client_errors, defaults.report_client_errors);
            assert_eq!(cfg.environment, defaults.environment);
            Ok(())
        });
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = MonitorConfig::from_vars([("environment", ""), ("sample_rate", " ")]);
        assert_eq!(cfg, MonitorConfig::default());
    }
}
