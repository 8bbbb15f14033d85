// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::consts::{DEFAULT_EDGE_CAPACITY, DEFAULT_LOG_FILTER, MAX_EDGE_CAPACITY};
use crate::errors::{ConfigError, FailurePolicy};

/// Engine-wide settings for a pipeline run.
///
/// These are pipeline-scoped knobs (scheduler choice, buffering, failure
/// handling, diagnostics). They are handed to the pipeline at construction
/// rather than living in process-wide globals.
///
/// # Fields
/// * `scheduler` - Which scheduler drives the graph
/// * `failure_policy` - How node failures propagate (optional, defaults to FailFast)
/// * `edges` - Edge buffering options (optional)
/// * `max_ticks` - Upper bound on `advance()` calls for sync runs (optional)
/// * `logging` - Diagnostic settings (optional)
///
/// # Example
/// ```yaml
/// scheduler: async
/// failure_policy: continue_on_error
/// edges:
///   default_capacity: 4
/// max_ticks: 1000
/// logging:
///   filter: "framegraph=debug"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerKind,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub edges: EdgeOptions,
    #[serde(default)]
    pub max_ticks: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::default(),
            failure_policy: FailurePolicy::default(),
            edges: EdgeOptions::default(),
            max_ticks: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check value bounds that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacity = self.edges.get_default_capacity();
        if capacity == 0 || capacity > MAX_EDGE_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "edges.default_capacity",
                reason: format!("{} is outside [1, {}]", capacity, MAX_EDGE_CAPACITY),
            });
        }
        if self.max_ticks == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_ticks",
                reason: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }
}

/// Scheduler used to drive the pipeline.
///
/// # Variants
/// * `Sync` - Single thread, one `advance()` per frame, deterministic
/// * `Async` - One worker per node, edges provide backpressure
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    #[default]
    Sync,
    Async,
}

/// Edge buffering options.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EdgeOptions {
    pub default_capacity: Option<usize>,
}

impl EdgeOptions {
    /// Capacity for connections that do not specify one.
    pub fn get_default_capacity(&self) -> usize {
        self.default_capacity.unwrap_or(DEFAULT_EDGE_CAPACITY)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Load engine settings from a YAML, JSON or TOML file (chosen by extension).
pub fn load_engine_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let cfg: EngineConfig = match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        }
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_yaml_config() {
        let yaml = r#"
scheduler: async
failure_policy: continue_on_error
edges:
  default_capacity: 4
max_ticks: 250
"#;
        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.scheduler, SchedulerKind::Async);
        assert_eq!(cfg.failure_policy, FailurePolicy::ContinueOnError);
        assert_eq!(cfg.edges.get_default_capacity(), 4);
        assert_eq!(cfg.max_ticks, Some(250));
    }

    #[test]
    fn test_defaults_when_empty() {
        let cfg: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.scheduler, SchedulerKind::Sync);
        assert_eq!(cfg.failure_policy, FailurePolicy::FailFast);
        assert_eq!(cfg.edges.get_default_capacity(), DEFAULT_EDGE_CAPACITY);
        assert_eq!(cfg.logging.get_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_temp(".yaml", "scheduler: sync\nlogging:\n  filter: debug\n");
        let cfg = load_engine_config(file.path()).unwrap();
        assert_eq!(cfg.scheduler, SchedulerKind::Sync);
        assert_eq!(cfg.logging.get_filter(), "debug");
    }

    #[test]
    fn test_load_json_file() {
        let file = write_temp(".json", r#"{"scheduler": "async", "edges": {"default_capacity": 2}}"#);
        let cfg = load_engine_config(file.path()).unwrap();
        assert_eq!(cfg.scheduler, SchedulerKind::Async);
        assert_eq!(cfg.edges.get_default_capacity(), 2);
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_temp(
            ".toml",
            "scheduler = \"async\"\nfailure_policy = \"fail_fast\"\n[edges]\ndefault_capacity = 8\n",
        );
        let cfg = load_engine_config(file.path()).unwrap();
        assert_eq!(cfg.scheduler, SchedulerKind::Async);
        assert_eq!(cfg.edges.get_default_capacity(), 8);
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let file = write_temp(".yaml", "edges:\n  default_capacity: 0\n");
        let result = load_engine_config(file.path());
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "edges.default_capacity", .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".ini", "scheduler=sync");
        assert!(matches!(
            load_engine_config(file.path()),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_parse_error_names_file() {
        let file = write_temp(".yaml", "scheduler: [not, a, scheduler]\n");
        match load_engine_config(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = load_engine_config("/definitely/not/here.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
