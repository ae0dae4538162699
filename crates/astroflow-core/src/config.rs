use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AstroflowError, Result};

/// Top-level Astroflow settings.
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Run loop pacing and observer hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Delay between two automatic steps, in milliseconds.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Ask observers to center their view on each newly visited node.
    #[serde(default = "default_center_on_step")]
    pub center_on_step: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            center_on_step: default_center_on_step(),
        }
    }
}

fn default_step_delay_ms() -> u64 { 1000 }
fn default_center_on_step() -> bool { true }

/// Simulated device behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Seed for simulated readings. Unset means a fresh random seed per process.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String { "astroflow=info,warn".to_string() }

impl Settings {
    /// Load settings from a TOML file, expanding `${ENV_VAR}` references first.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AstroflowError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse settings from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| AstroflowError::Config(e.to_string()))
    }

    /// Load settings if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Settings file absent, using defaults");
            Ok(Self::default())
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string. Unset variables are kept verbatim.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_ASTROFLOW_DELAY", "250");
        let result = expand_env_vars("step_delay_ms = ${TEST_ASTROFLOW_DELAY}");
        assert_eq!(result, "step_delay_ms = 250");
        std::env::remove_var("TEST_ASTROFLOW_DELAY");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("filter = \"${NONEXISTENT_ASTROFLOW_VAR}\"");
        assert_eq!(result, "filter = \"${NONEXISTENT_ASTROFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.execution.step_delay_ms, 1000);
        assert!(settings.execution.center_on_step);
        assert!(settings.simulation.seed.is_none());
        assert_eq!(settings.log.filter, "astroflow=info,warn");
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::parse(
            r#"
[execution]
step_delay_ms = 50

[simulation]
seed = 42
"#,
        )
        .unwrap();
        assert_eq!(settings.execution.step_delay_ms, 50);
        assert!(settings.execution.center_on_step);
        assert_eq!(settings.simulation.seed, Some(42));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Settings::parse("[execution\nstep_delay_ms = 1").unwrap_err();
        assert!(matches!(err, AstroflowError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/astroflow.toml")).unwrap_err();
        assert!(matches!(err, AstroflowError::ConfigNotFound(_)));

        let settings = Settings::load_or_default(Path::new("/nonexistent/astroflow.toml")).unwrap();
        assert_eq!(settings.execution.step_delay_ms, 1000);
    }
}
