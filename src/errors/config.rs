// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigKind;

/// Errors raised while validating process options or loading engine settings.
///
/// Option errors surface at `initialize` time and abort the pipeline build;
/// they are never silently ignored.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The option is not part of the process's declared schema.
    #[error("unknown option '{option}'")]
    UnknownOption { option: String },

    #[error("option '{option}' expects a {expected} value, got {found}")]
    TypeMismatch {
        option: String,
        expected: ConfigKind,
        found: ConfigKind,
    },

    #[error("option '{option}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        option: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("option '{option}' = '{value}' is not one of {allowed:?}")]
    InvalidChoice {
        option: String,
        value: String,
        allowed: Vec<String>,
    },

    /// A required option has no default and was not supplied.
    #[error("required option '{option}' is missing")]
    MissingOption { option: String },

    /// The process refused a configuration that passed schema validation.
    #[error("configuration rejected: {reason}")]
    Rejected { reason: String },

    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config file format: {path:?} (expected .yaml, .yml, .json or .toml)")]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid engine setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
