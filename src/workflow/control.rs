//! Form controls: how a submitted value is cleaned for each widget kind.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::parameter::Choice;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Text,
    Integer,
    Checkbox,
    Select,
    MultiSelect,
}

/// Cleans raw submitted strings into a typed value.
///
/// `Value::Null` means "nothing submitted" and is only produced for optional
/// fields.
pub trait Control: fmt::Debug + Send + Sync {
    fn kind(&self) -> WidgetKind;

    fn choices(&self) -> &[Choice] {
        &[]
    }

    fn clean(&self, raw: &[String], required: bool) -> Result<Value, String>;
}

fn first_non_blank(raw: &[String]) -> Option<&str> {
    raw.iter().map(|s| s.trim()).find(|s| !s.is_empty())
}

fn blank(required: bool) -> Result<Value, String> {
    if required {
        Err(REQUIRED_MESSAGE.to_string())
    } else {
        Ok(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextControl;

impl Control for TextControl {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Text
    }

    fn clean(&self, raw: &[String], required: bool) -> Result<Value, String> {
        match first_non_blank(raw) {
            Some(text) => Ok(Value::String(text.to_string())),
            None => blank(required),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerControl {
    pub min: Option<i64>,
}

impl IntegerControl {
    pub fn at_least(min: i64) -> Self {
        Self { min: Some(min) }
    }
}

impl Control for IntegerControl {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Integer
    }

    fn clean(&self, raw: &[String], required: bool) -> Result<Value, String> {
        let Some(text) = first_non_blank(raw) else {
            return blank(required);
        };
        let number: i64 = text
            .parse()
            .map_err(|_| "Enter a whole number.".to_string())?;
        if let Some(min) = self.min {
            if number < min {
                return Err(format!(
                    "Ensure this value is greater than or equal to {min}."
                ));
            }
        }
        Ok(Value::from(number))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckboxControl;

impl Control for CheckboxControl {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Checkbox
    }

    fn clean(&self, raw: &[String], required: bool) -> Result<Value, String> {
        let checked = match first_non_blank(raw) {
            None => false,
            Some(text) => !matches!(
                text.to_ascii_lowercase().as_str(),
                "false" | "off" | "0" | "no"
            ),
        };
        if required && !checked {
            return Err(REQUIRED_MESSAGE.to_string());
        }
        Ok(Value::Bool(checked))
    }
}

fn invalid_choice(value: &str) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}

#[derive(Debug, Clone, Default)]
pub struct SelectControl {
    choices: Vec<Choice>,
}

impl SelectControl {
    pub fn new(choices: Vec<Choice>) -> Self {
        Self { choices }
    }
}

impl Control for SelectControl {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Select
    }

    fn choices(&self) -> &[Choice] {
        &self.choices
    }

    fn clean(&self, raw: &[String], required: bool) -> Result<Value, String> {
        let Some(value) = first_non_blank(raw) else {
            return blank(required);
        };
        if self.choices.iter().any(|c| c.value == value) {
            Ok(Value::String(value.to_string()))
        } else {
            Err(invalid_choice(value))
        }
    }
}

/// Multiple selection. With `free_form` any submitted value is accepted.
#[derive(Debug, Clone, Default)]
pub struct MultiSelectControl {
    choices: Vec<Choice>,
    free_form: bool,
}

impl MultiSelectControl {
    pub fn new(choices: Vec<Choice>) -> Self {
        Self {
            choices,
            free_form: false,
        }
    }

    pub fn free_form(choices: Vec<Choice>) -> Self {
        Self {
            choices,
            free_form: true,
        }
    }
}

impl Control for MultiSelectControl {
    fn kind(&self) -> WidgetKind {
        WidgetKind::MultiSelect
    }

    fn choices(&self) -> &[Choice] {
        &self.choices
    }

    fn clean(&self, raw: &[String], required: bool) -> Result<Value, String> {
        let selected: Vec<&str> = raw
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if selected.is_empty() {
            return if required {
                Err(REQUIRED_MESSAGE.to_string())
            } else {
                Ok(Value::Array(Vec::new()))
            };
        }
        if !self.free_form {
            if let Some(bad) = selected
                .iter()
                .find(|v| !self.choices.iter().any(|c| c.value == **v))
            {
                return Err(invalid_choice(bad));
            }
        }
        Ok(Value::Array(
            selected
                .into_iter()
                .map(|v| Value::String(v.to_string()))
                .collect(),
        ))
    }
}
