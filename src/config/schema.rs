// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process option maps and the schemas they are validated against.
//!
//! Every process declares the options it recognizes as a [`ConfigSchema`].
//! When a pipeline is built, the option map supplied for each node is
//! checked against that schema:
//!
//! 1. **Unknown keys** are rejected, never ignored
//! 2. **Missing required options** are rejected; optional ones get their default
//! 3. **Type** is checked (an integer is accepted where a float is expected)
//! 4. **Range / choice** constraints are enforced
//!
//! Only a map that passes all four reaches `Process::initialize`.
//!
//! # Examples
//! ```
//! use framegraph::config::{ConfigMap, ConfigSchema, OptionSpec};
//!
//! let schema = ConfigSchema::new()
//!     .option(OptionSpec::int("window", "frames kept for lookback").default(3).range(1.0, 64.0))
//!     .option(OptionSpec::string("mode", "difference mode").default("abs").choices(&["abs", "signed"]));
//!
//! let validated = schema.validate(&ConfigMap::new().with("window", 5)).unwrap();
//! assert_eq!(validated.get_int("window"), Some(5));
//! assert_eq!(validated.get_str("mode"), Some("abs"));
//!
//! assert!(schema.validate(&ConfigMap::new().with("window", 0)).is_err());
//! assert!(schema.validate(&ConfigMap::new().with("colour", "red")).is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigValue::Bool(_) => ConfigKind::Bool,
            ConfigValue::Int(_) => ConfigKind::Int,
            ConfigValue::Float(_) => ConfigKind::Float,
            ConfigValue::Str(_) => ConfigKind::Str,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(v) => Some(*v as f64),
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(value as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

/// Type tag of a [`ConfigValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    Bool,
    Int,
    Float,
    Str,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigKind::Bool => "bool",
            ConfigKind::Int => "integer",
            ConfigKind::Float => "float",
            ConfigKind::Str => "string",
        };
        f.write_str(name)
    }
}

/// Newtype wrapper for a flat option map (option name -> value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(pub BTreeMap<String, ConfigValue>);

impl ConfigMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, option: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(option, value);
        self
    }

    pub fn insert(&mut self, option: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(option.into(), value.into());
    }

    pub fn get(&self, option: &str) -> Option<&ConfigValue> {
        self.0.get(option)
    }

    /// A copy of this map with every entry of `overrides` applied on top.
    pub fn merged(&self, overrides: &ConfigMap) -> ConfigMap {
        let mut merged = self.clone();
        for (option, value) in &overrides.0 {
            merged.0.insert(option.clone(), value.clone());
        }
        merged
    }

    pub fn contains_key(&self, option: &str) -> bool {
        self.0.contains_key(option)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_bool(&self, option: &str) -> Option<bool> {
        match self.0.get(option) {
            Some(ConfigValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, option: &str) -> Option<i64> {
        match self.0.get(option) {
            Some(ConfigValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Floats and integers both read as `f64`.
    pub fn get_float(&self, option: &str) -> Option<f64> {
        self.0.get(option).and_then(ConfigValue::as_number)
    }

    pub fn get_str(&self, option: &str) -> Option<&str> {
        match self.0.get(option) {
            Some(ConfigValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigMap {
    fn from(map: BTreeMap<String, ConfigValue>) -> Self {
        Self(map)
    }
}

/// Declaration of one recognized option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    pub kind: ConfigKind,
    pub description: String,
    pub default: Option<ConfigValue>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: Vec<String>,
}

impl OptionSpec {
    fn new(name: &str, kind: ConfigKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default: None,
            min: None,
            max: None,
            choices: Vec::new(),
        }
    }

    pub fn bool(name: &str, description: &str) -> Self {
        Self::new(name, ConfigKind::Bool, description)
    }

    pub fn int(name: &str, description: &str) -> Self {
        Self::new(name, ConfigKind::Int, description)
    }

    pub fn float(name: &str, description: &str) -> Self {
        Self::new(name, ConfigKind::Float, description)
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ConfigKind::Str, description)
    }

    /// Options without a default are required.
    pub fn default(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Inclusive numeric bounds.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn choices(mut self, allowed: &[&str]) -> Self {
        self.choices = allowed.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    fn check(&self, value: ConfigValue) -> Result<ConfigValue, ConfigError> {
        let value = match (self.kind, value) {
            (ConfigKind::Float, ConfigValue::Int(v)) => ConfigValue::Float(v as f64),
            (expected, value) if value.kind() != expected => {
                return Err(ConfigError::TypeMismatch {
                    option: self.name.clone(),
                    expected,
                    found: value.kind(),
                });
            }
            (_, value) => value,
        };

        if let Some(number) = value.as_number() {
            let min = self.min.unwrap_or(f64::NEG_INFINITY);
            let max = self.max.unwrap_or(f64::INFINITY);
            if number < min || number > max {
                return Err(ConfigError::OutOfRange {
                    option: self.name.clone(),
                    value: number,
                    min,
                    max,
                });
            }
        }

        if let ConfigValue::Str(text) = &value {
            if !self.choices.is_empty() && !self.choices.iter().any(|c| c == text) {
                return Err(ConfigError::InvalidChoice {
                    option: self.name.clone(),
                    value: text.clone(),
                    allowed: self.choices.clone(),
                });
            }
        }

        Ok(value)
    }
}

/// The set of options a process recognizes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSchema {
    options: Vec<OptionSpec>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.name == name)
    }

    /// Validate `supplied` and return it with defaults filled in.
    ///
    /// Unknown keys are reported first (in key order) so a typo is not
    /// masked by a downstream "missing option" error.
    pub fn validate(&self, supplied: &ConfigMap) -> Result<ConfigMap, ConfigError> {
        if let Some(unknown) = supplied.keys().find(|key| self.get(key).is_none()) {
            return Err(ConfigError::UnknownOption {
                option: unknown.clone(),
            });
        }

        let mut validated = ConfigMap::new();
        for spec in &self.options {
            let value = match supplied.get(&spec.name).or(spec.default.as_ref()) {
                Some(value) => value.clone(),
                None => {
                    return Err(ConfigError::MissingOption {
                        option: spec.name.clone(),
                    })
                }
            };
            validated.0.insert(spec.name.clone(), spec.check(value)?);
        }
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_schema() -> ConfigSchema {
        ConfigSchema::new()
            .option(OptionSpec::int("window", "frames").default(3).range(1.0, 10.0))
            .option(OptionSpec::float("gain", "scale factor").range(0.0, 2.0))
            .option(OptionSpec::bool("verbose", "chatty").default(false))
            .option(OptionSpec::string("mode", "how").default("abs").choices(&["abs", "signed"]))
    }

    #[test]
    fn test_defaults_are_filled_in() {
        let validated = window_schema()
            .validate(&ConfigMap::new().with("gain", 1.5))
            .unwrap();

        assert_eq!(validated.get_int("window"), Some(3));
        assert_eq!(validated.get_bool("verbose"), Some(false));
        assert_eq!(validated.get_str("mode"), Some("abs"));
        assert_eq!(validated.get_float("gain"), Some(1.5));
        assert_eq!(validated.len(), 4);
    }

    #[test]
    fn test_merged_overrides_win() {
        let base = ConfigMap::new().with("window", 3).with("mode", "abs");
        let merged = base.merged(&ConfigMap::new().with("window", 7).with("gain", 0.5));

        assert_eq!(merged.get_int("window"), Some(7));
        assert_eq!(merged.get_str("mode"), Some("abs"));
        assert_eq!(merged.get_float("gain"), Some(0.5));
        assert_eq!(base.get_int("window"), Some(3));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let result = window_schema().validate(&ConfigMap::new().with("gain", 1.0).with("windw", 2));
        match result {
            Err(ConfigError::UnknownOption { option }) => assert_eq!(option, "windw"),
            other => panic!("Expected UnknownOption, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_option() {
        match window_schema().validate(&ConfigMap::new()) {
            Err(ConfigError::MissingOption { option }) => assert_eq!(option, "gain"),
            other => panic!("Expected MissingOption, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_value() {
        let result = window_schema().validate(&ConfigMap::new().with("gain", 1.0).with("window", 11));
        match result {
            Err(ConfigError::OutOfRange { option, value, min, max }) => {
                assert_eq!(option, "window");
                assert_eq!(value, 11.0);
                assert_eq!(min, 1.0);
                assert_eq!(max, 10.0);
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let result = window_schema().validate(&ConfigMap::new().with("gain", "loud"));
        assert!(matches!(
            result,
            Err(ConfigError::TypeMismatch {
                expected: ConfigKind::Float,
                found: ConfigKind::Str,
                ..
            })
        ));
    }

    #[test]
    fn test_integer_widens_to_float() {
        let validated = window_schema().validate(&ConfigMap::new().with("gain", 2)).unwrap();
        assert_eq!(validated.get("gain"), Some(&ConfigValue::Float(2.0)));
    }

    #[test]
    fn test_invalid_choice() {
        let result = window_schema().validate(&ConfigMap::new().with("gain", 1.0).with("mode", "squared"));
        assert!(matches!(result, Err(ConfigError::InvalidChoice { .. })));
    }

    #[test]
    fn test_config_map_deserializes_untagged_values() {
        let map: ConfigMap = serde_yaml::from_str("window: 4\ngain: 0.5\nverbose: true\nmode: signed\n").unwrap();
        assert_eq!(map.get_int("window"), Some(4));
        assert_eq!(map.get_float("gain"), Some(0.5));
        assert_eq!(map.get_bool("verbose"), Some(true));
        assert_eq!(map.get_str("mode"), Some("signed"));
    }
}
