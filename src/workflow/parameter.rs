//! Uniform representation of plugin configuration parameters.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::ConfigDescriptor;

pub const DEFAULT_PRIORITY: i64 = 2;
pub const DEFAULT_DESCRIPTION: &str = "No description";

/// Target name for parameters that do not belong to a service.
pub const GENERAL_TARGET: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Bool,
    Dropdown,
}

impl ParamType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "string" => Some(ParamType::String),
            "int" => Some(ParamType::Int),
            "bool" => Some(ParamType::Bool),
            "dropdown" => Some(ParamType::Dropdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::Dropdown => "dropdown",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which template a parameter configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigScope {
    Cluster,
    Node,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::Cluster => "cluster",
            ConfigScope::Node => "node",
        }
    }
}

/// A `(value, label)` option of a select control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// A choice whose label is its value.
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }

    fn from_value(raw: &Value) -> Self {
        match raw {
            Value::Array(pair) => match pair.as_slice() {
                [value, label, ..] => Choice::new(scalar_text(value), scalar_text(label)),
                [value] => Choice::same(scalar_text(value)),
                [] => Choice::same(String::new()),
            },
            other => Choice::same(scalar_text(other)),
        }
    }
}

/// Canonical text of a scalar, used wherever two values are compared loosely.
///
/// Strings are taken verbatim, `null` is empty, everything else uses its JSON
/// form (`3`, `true`).
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default_value: Option<Value>,
    /// Value pre-filled in the form; starts at the default.
    pub initial_value: Option<Value>,
    pub param_type: ParamType,
    pub choices: Vec<Choice>,
    pub priority: i64,
}

/// A descriptor whose `config_type` has no control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("parameter {name}: unsupported config type {config_type:?}")]
pub struct UnsupportedParameterType {
    pub name: String,
    pub target: String,
    pub config_type: String,
}

impl Parameter {
    pub fn from_descriptor(desc: &ConfigDescriptor) -> Result<Self, UnsupportedParameterType> {
        let param_type =
            ParamType::parse(&desc.config_type).ok_or_else(|| UnsupportedParameterType {
                name: desc.name.clone(),
                target: desc.applicable_target.clone(),
                config_type: desc.config_type.clone(),
            })?;
        let choices = match param_type {
            ParamType::Dropdown => desc
                .config_values
                .iter()
                .flatten()
                .map(Choice::from_value)
                .collect(),
            _ => Vec::new(),
        };
        let description = desc
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string();
        Ok(Self {
            name: desc.name.clone(),
            description,
            required: !desc.is_optional,
            default_value: desc.default_value.clone(),
            initial_value: desc.default_value.clone(),
            param_type,
            choices,
            priority: desc.priority.unwrap_or(DEFAULT_PRIORITY),
        })
    }

    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }
}

/// Parameters of one target plus the descriptors that could not be modelled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedParameters {
    pub parameters: Vec<Parameter>,
    pub unsupported: Vec<UnsupportedParameterType>,
}

impl ExtractedParameters {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Picks the descriptors for `scope` and `target`, in the order reported.
pub fn extract_parameters(
    configs: &[ConfigDescriptor],
    scope: ConfigScope,
    target: &str,
) -> ExtractedParameters {
    let mut extracted = ExtractedParameters::default();
    for desc in configs
        .iter()
        .filter(|d| d.scope == scope.as_str() && d.applicable_target == target)
    {
        match Parameter::from_descriptor(desc) {
            Ok(param) => extracted.parameters.push(param),
            Err(unsupported) => extracted.unsupported.push(unsupported),
        }
    }
    extracted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: Value) -> ConfigDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn fills_description_and_priority_defaults() {
        let param = Parameter::from_descriptor(&descriptor(json!({
            "name": "dfs.replication",
            "config_type": "int",
            "is_optional": true,
            "default_value": 3,
            "scope": "cluster",
            "applicable_target": "HDFS"
        })))
        .unwrap();
        assert_eq!(param.description, DEFAULT_DESCRIPTION);
        assert_eq!(param.priority, DEFAULT_PRIORITY);
        assert!(!param.required);
        assert_eq!(param.initial_value, Some(json!(3)));
    }

    #[test]
    fn dropdown_accepts_pairs_and_scalars() {
        let param = Parameter::from_descriptor(&descriptor(json!({
            "name": "mode",
            "config_type": "dropdown",
            "config_values": [["fast", "Fast mode"], "safe", 3]
        })))
        .unwrap();
        assert_eq!(
            param.choices,
            vec![
                Choice::new("fast", "Fast mode"),
                Choice::same("safe"),
                Choice::same("3")
            ]
        );
    }

    #[test]
    fn unknown_type_is_reported_not_dropped() {
        let err = Parameter::from_descriptor(&descriptor(json!({
            "name": "topology",
            "config_type": "map",
            "applicable_target": "general"
        })))
        .unwrap_err();
        assert_eq!(err.config_type, "map");
        assert_eq!(err.target, "general");
    }

    #[test]
    fn extraction_filters_by_scope_and_target() {
        let configs = vec![
            descriptor(json!({"name": "a", "config_type": "int", "scope": "cluster", "applicable_target": "HDFS"})),
            descriptor(json!({"name": "b", "config_type": "int", "scope": "node", "applicable_target": "HDFS"})),
            descriptor(json!({"name": "c", "config_type": "map", "scope": "cluster", "applicable_target": "HDFS"})),
            descriptor(json!({"name": "d", "config_type": "bool", "scope": "cluster", "applicable_target": "general"})),
        ];
        let hdfs = extract_parameters(&configs, ConfigScope::Cluster, "HDFS");
        assert_eq!(hdfs.parameters.len(), 1);
        assert_eq!(hdfs.parameters[0].name, "a");
        assert_eq!(hdfs.unsupported.len(), 1);

        let general = extract_parameters(&configs, ConfigScope::Cluster, GENERAL_TARGET);
        assert_eq!(general.parameters[0].param_type, ParamType::Bool);
    }

    #[test]
    fn scalar_text_matches_loose_comparison() {
        assert_eq!(scalar_text(&json!(3)), "3");
        assert_eq!(scalar_text(&json!("3")), "3");
        assert_eq!(scalar_text(&json!(true)), "true");
        assert_eq!(scalar_text(&Value::Null), "");
    }
}
