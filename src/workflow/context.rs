//! Submitted form data, the validated workflow context, and payload
//! minimization against recorded defaults.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::parameter::{scalar_text, Parameter};
use super::step::{parse_config_key, FieldIssue, Scope};
use crate::types::ConfigsPayload;

/// Raw submitted values; a key may carry several values (multi-selects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: BTreeMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First non-blank value under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)?
            .iter()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = FormData::new();
        for (key, value) in iter {
            form.insert(key, value);
        }
        form
    }
}

/// Cleaned values keyed by context key, filled step by step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowContext {
    values: BTreeMap<String, Value>,
}

impl WorkflowContext {
    /// Adds a value. Keys are unique across the whole context.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<(), FieldIssue> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(FieldIssue::new(key, "value contributed twice"));
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Non-empty string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_strings(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Default value of every rendered parameter, per scope.
///
/// Built once when a workflow is assembled and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultsTable {
    scopes: BTreeMap<String, BTreeMap<String, Option<Value>>>,
}

impl DefaultsTable {
    pub(crate) fn record(&mut self, scope: &Scope, parameters: &[Parameter]) {
        let defaults = self.scopes.entry(scope.as_str().to_string()).or_default();
        for param in parameters {
            defaults.insert(param.name.clone(), param.default_value.clone());
        }
    }

    pub fn default_for(&self, scope: &str, name: &str) -> Option<&Value> {
        self.scopes.get(scope)?.get(name)?.as_ref()
    }

    pub fn contains(&self, scope: &str, name: &str) -> bool {
        self.scopes
            .get(scope)
            .map(|params| params.contains_key(name))
            .unwrap_or(false)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }
}

/// Values submitted under `CONF:<scope>:<param>` keys, grouped by scope.
///
/// Every scope seen in the context gets an entry, even when all of its values
/// are omitted. A value is omitted when it is null or has the same canonical
/// text as the recorded default.
pub fn collect_configs(context: &WorkflowContext, defaults: &DefaultsTable) -> ConfigsPayload {
    let mut payload = ConfigsPayload::new();
    for (key, value) in context.iter() {
        let Some((scope, name)) = parse_config_key(key) else {
            continue;
        };
        let entry = payload.entry(scope.to_string()).or_default();
        if value.is_null() {
            continue;
        }
        let unchanged = defaults
            .default_for(scope, name)
            .map(|default| scalar_text(default) == scalar_text(value))
            .unwrap_or(false);
        if unchanged {
            continue;
        }
        entry.insert(name.to_string(), value.clone());
    }
    payload
}
