//! Steps: ordered groups of fields, fixed or synthesized from parameters.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Serialize;
use serde_json::Value;

use super::context::FormData;
use super::control::{
    CheckboxControl, Control, IntegerControl, SelectControl, TextControl, WidgetKind,
};
use super::parameter::{Choice, ParamType, Parameter, GENERAL_TARGET};
use crate::identifiers::ServiceName;

pub const CONFIG_KEY_PREFIX: &str = "CONF";
pub const PARAMETERS_HELP_TEMPLATE: &str = "project/templates/_configure_general_help.html";

/// Grouping key for configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    General,
    Service(ServiceName),
}

impl Scope {
    pub fn service(name: impl Into<ServiceName>) -> Self {
        Scope::Service(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scope::General => GENERAL_TARGET,
            Scope::Service(name) => name.as_str(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Scope::General => "General Parameters".to_string(),
            Scope::Service(name) => format!("{name} Parameters"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `CONF:<scope>:<param>`.
pub fn config_key(scope: &Scope, name: &str) -> String {
    format!("{CONFIG_KEY_PREFIX}:{scope}:{name}")
}

/// Splits a `CONF:<scope>:<param>` key. Parameter names may contain `:`.
pub fn parse_config_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.splitn(3, ':');
    if parts.next()? != CONFIG_KEY_PREFIX {
        return None;
    }
    let scope = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some((scope, name))
}

/// A validation message bound to a form key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    key: String,
    label: String,
    help_text: Option<String>,
    required: bool,
    initial: Option<Value>,
    placeholder: Option<Value>,
    priority: Option<i64>,
    control: Arc<dyn Control>,
}

impl Field {
    pub fn new(key: impl Into<String>, label: impl Into<String>, control: impl Control + 'static) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            help_text: None,
            required: false,
            initial: None,
            placeholder: None,
            priority: None,
            control: Arc::new(control),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Field for one configuration parameter under `CONF:<scope>:<name>`.
    ///
    /// Strings are required only when the parameter is required and has no
    /// default; checkboxes are never required.
    pub fn from_parameter(scope: &Scope, param: &Parameter) -> Self {
        let key = config_key(scope, &param.name);
        let (control, required): (Arc<dyn Control>, bool) = match param.param_type {
            ParamType::String => (
                Arc::new(TextControl),
                param.required && param.default_value.is_none(),
            ),
            ParamType::Int => (Arc::new(IntegerControl::default()), param.required),
            ParamType::Bool => (Arc::new(CheckboxControl), false),
            ParamType::Dropdown => (
                Arc::new(SelectControl::new(param.choices.clone())),
                param.required,
            ),
        };
        Self {
            key,
            label: param.name.clone(),
            help_text: Some(param.description.clone()),
            required,
            initial: param.initial_value.clone(),
            placeholder: param.default_value.clone(),
            priority: Some(param.priority),
            control,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn initial_value(&self) -> Option<&Value> {
        self.initial.as_ref()
    }

    pub fn kind(&self) -> WidgetKind {
        self.control.kind()
    }

    pub fn clean(&self, form: &FormData) -> Result<Value, FieldIssue> {
        self.control
            .clean(form.get_all(&self.key), self.required)
            .map_err(|message| FieldIssue::new(self.key.clone(), message))
    }

    pub fn view(&self) -> FieldView {
        FieldView {
            key: self.key.clone(),
            label: self.label.clone(),
            widget: self.control.kind(),
            required: self.required,
            initial: self.initial.clone(),
            placeholder: self.placeholder.clone(),
            help_text: self.help_text.clone(),
            priority: self.priority,
            choices: self.control.choices().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Declared by the template workflow.
    Fixed,
    /// Synthesized from plugin parameters.
    Parameters,
}

/// Extra validation run after a step's fields, producing additional context
/// entries (keys are relative to the step prefix).
pub type StepValidator = fn(&FormData, &str) -> Result<Vec<(String, Value)>, Vec<FieldIssue>>;

#[derive(Debug, Clone)]
pub struct Step {
    slug: String,
    title: String,
    kind: StepKind,
    scope: Option<Scope>,
    prefix: String,
    fields: Vec<Field>,
    help_template: Option<String>,
    validator: Option<StepValidator>,
}

impl Step {
    /// A fixed step whose field keys are prefixed with `prefix`.
    pub fn fixed(slug: impl Into<String>, title: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            kind: StepKind::Fixed,
            scope: None,
            prefix: prefix.into(),
            fields: Vec::new(),
            help_template: None,
            validator: None,
        }
    }

    fn parameters(scope: Scope) -> Self {
        Self {
            slug: scope.as_str().to_string(),
            title: scope.title(),
            kind: StepKind::Parameters,
            scope: Some(scope),
            prefix: String::new(),
            fields: Vec::new(),
            help_template: Some(PARAMETERS_HELP_TEMPLATE.to_string()),
            validator: None,
        }
    }

    /// Adds a field; its key is prefixed with the step prefix.
    pub fn field(mut self, mut field: Field) -> Self {
        field.key = format!("{}{}", self.prefix, field.key);
        self.fields.push(field);
        self
    }

    pub fn help_template(mut self, template: impl Into<String>) -> Self {
        self.help_template = Some(template.into());
        self
    }

    pub fn validator(mut self, validator: StepValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Overrides field initial values from `values`, keyed by field key.
    pub(crate) fn apply_initial(&mut self, values: &BTreeMap<String, Value>) {
        for field in &mut self.fields {
            if let Some(value) = values.get(&field.key) {
                field.initial = Some(value.clone());
            }
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_by_key(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Cleans every field, collecting all issues instead of stopping at the
    /// first one.
    pub fn clean(&self, form: &FormData) -> Result<Vec<(String, Value)>, Vec<FieldIssue>> {
        let mut values = Vec::with_capacity(self.fields.len());
        let mut issues = Vec::new();
        for field in &self.fields {
            match field.clean(form) {
                Ok(value) => values.push((field.key.clone(), value)),
                Err(issue) => issues.push(issue),
            }
        }
        if let Some(validator) = self.validator {
            match validator(form, &self.prefix) {
                Ok(extra) => values.extend(
                    extra
                        .into_iter()
                        .map(|(key, value)| (format!("{}{}", self.prefix, key), value)),
                ),
                Err(mut more) => issues.append(&mut more),
            }
        }
        if issues.is_empty() {
            Ok(values)
        } else {
            Err(issues)
        }
    }

    pub fn view(&self) -> StepView {
        StepView {
            slug: self.slug.clone(),
            title: self.title.clone(),
            kind: self.kind,
            help_template: self.help_template.clone(),
            fields: self.fields.iter().map(Field::view).collect(),
        }
    }
}

/// Builds the step for one scope, or `None` when the scope has no parameters.
pub fn synthesize_step(scope: &Scope, parameters: &[Parameter]) -> Option<Step> {
    if parameters.is_empty() {
        return None;
    }
    let mut step = Step::parameters(scope.clone());
    step.fields = parameters
        .iter()
        .map(|param| Field::from_parameter(scope, param))
        .collect();
    Some(step)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub key: String,
    pub label: String,
    pub widget: WidgetKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub slug: String,
    pub title: String,
    pub kind: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_template: Option<String>,
    pub fields: Vec<FieldView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfigDescriptor;
    use serde_json::json;

    fn param(value: Value) -> Parameter {
        let desc: ConfigDescriptor = serde_json::from_value(value).unwrap();
        Parameter::from_descriptor(&desc).unwrap()
    }

    #[test]
    fn config_keys_round_trip_names_with_colons() {
        let key = config_key(&Scope::service("YARN"), "a:b");
        assert_eq!(key, "CONF:YARN:a:b");
        assert_eq!(parse_config_key(&key), Some(("YARN", "a:b")));
        assert_eq!(parse_config_key("general_name"), None);
        assert_eq!(parse_config_key("CONF::x"), None);
    }

    #[test]
    fn empty_scope_yields_no_step() {
        assert!(synthesize_step(&Scope::General, &[]).is_none());
    }

    #[test]
    fn required_rules_follow_widget_kind() {
        let scope = Scope::service("HDFS");
        let step = synthesize_step(
            &scope,
            &[
                param(json!({"name": "with_default", "config_type": "string", "default_value": "x"})),
                param(json!({"name": "no_default", "config_type": "string"})),
                param(json!({"name": "count", "config_type": "int"})),
                param(json!({"name": "flag", "config_type": "bool"})),
                param(json!({"name": "optional_count", "config_type": "int", "is_optional": true})),
            ],
        )
        .unwrap();
        let required: Vec<bool> = step.fields().iter().map(Field::is_required).collect();
        assert_eq!(required, vec![false, true, true, false, false]);
        assert_eq!(step.slug(), "HDFS");
        assert_eq!(step.title(), "HDFS Parameters");
        assert_eq!(step.kind(), StepKind::Parameters);
    }

    #[test]
    fn clean_collects_every_issue() {
        let step = Step::fixed("details", "Details", "general_")
            .field(Field::new("name", "Name", TextControl).required())
            .field(Field::new("count", "Count", IntegerControl::default()).required());
        let issues = step.clean(&FormData::new()).unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["general_name", "general_count"]);
    }

    #[test]
    fn validator_entries_are_prefixed() {
        fn rows(form: &FormData, prefix: &str) -> Result<Vec<(String, Value)>, Vec<FieldIssue>> {
            let count = form.get(&format!("{prefix}rows")).unwrap_or("0").len();
            Ok(vec![("row_count".to_string(), json!(count))])
        }
        let step = Step::fixed("ng", "Node Groups", "ng_").validator(rows);
        let values = step.clean(&FormData::new().with("ng_rows", "abc")).unwrap();
        assert_eq!(values, vec![("ng_row_count".to_string(), json!(3))]);
    }

    #[test]
    fn view_exposes_widget_and_choices() {
        let step = synthesize_step(
            &Scope::General,
            &[param(json!({"name": "mode", "config_type": "dropdown", "config_values": ["a", "b"], "default_value": "a"}))],
        )
        .unwrap();
        let view = serde_json::to_value(step.view()).unwrap();
        assert_eq!(view["fields"][0]["key"], json!("CONF:general:mode"));
        assert_eq!(view["fields"][0]["widget"], json!("select"));
        assert_eq!(view["fields"][0]["choices"][1]["value"], json!("b"));
        assert_eq!(view["help_template"], json!(PARAMETERS_HELP_TEMPLATE));
    }
}
