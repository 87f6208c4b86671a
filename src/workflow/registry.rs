use std::collections::{HashMap, HashSet};

use super::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowBuildIssueCode {
    EmptyStepSlug,
    DuplicateFieldKey,
    StepSlugConflict,
    UnsupportedParameterType,
    NoSteps,
}

impl WorkflowBuildIssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowBuildIssueCode::EmptyStepSlug => "empty_step_slug",
            WorkflowBuildIssueCode::DuplicateFieldKey => "duplicate_field_key",
            WorkflowBuildIssueCode::StepSlugConflict => "step_slug_conflict",
            WorkflowBuildIssueCode::UnsupportedParameterType => "unsupported_parameter_type",
            WorkflowBuildIssueCode::NoSteps => "no_steps",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowBuildIssue {
    pub code: WorkflowBuildIssueCode,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowBuildError {
    pub issues: Vec<WorkflowBuildIssue>,
}

impl std::fmt::Display for WorkflowBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "invalid workflow");
        }
        if self.issues.len() == 1 {
            return write!(f, "{}", self.issues[0].message);
        }
        write!(
            f,
            "{} (and {} more)",
            self.issues[0].message,
            self.issues.len() - 1
        )
    }
}

impl std::error::Error for WorkflowBuildError {}

/// Ordered steps of one workflow instance.
///
/// Each workflow construction owns a fresh registry; nothing is shared between
/// instances. Registering a slug that is already present is a no-op.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
    slugs: HashSet<String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `step` unless a step with the same slug exists. Returns whether
    /// the step was added.
    pub fn register(&mut self, step: Step) -> bool {
        if !self.slugs.insert(step.slug().to_string()) {
            return false;
        }
        self.steps.push(step);
        true
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Structural problems: blank slugs and field keys used by two fields.
    pub fn validate(&self) -> Vec<WorkflowBuildIssue> {
        let mut issues = Vec::new();
        if self.steps.is_empty() {
            issues.push(WorkflowBuildIssue {
                code: WorkflowBuildIssueCode::NoSteps,
                message: "workflow has no steps".to_string(),
            });
        }
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for step in &self.steps {
            if step.slug().trim().is_empty() {
                issues.push(WorkflowBuildIssue {
                    code: WorkflowBuildIssueCode::EmptyStepSlug,
                    message: format!("step {:?} has an empty slug", step.title()),
                });
            }
            for field in step.fields() {
                if let Some(owner) = owners.insert(field.key(), step.slug()) {
                    issues.push(WorkflowBuildIssue {
                        code: WorkflowBuildIssueCode::DuplicateFieldKey,
                        message: format!(
                            "field key {} is used by steps {} and {}",
                            field.key(),
                            owner,
                            step.slug()
                        ),
                    });
                }
            }
        }
        issues
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::control::TextControl;
    use crate::workflow::step::Field;

    #[test]
    fn registering_same_slug_twice_is_idempotent() {
        let mut registry = StepRegistry::new();
        assert!(registry.register(Step::fixed("details", "Details", "general_")));
        assert!(!registry.register(Step::fixed("details", "Details again", "general_")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.iter().next().map(|s| s.title()), Some("Details"));
    }

    #[test]
    fn duplicate_field_keys_are_reported() {
        let mut registry = StepRegistry::new();
        registry.register(
            Step::fixed("a", "A", "general_").field(Field::new("name", "Name", TextControl)),
        );
        registry.register(
            Step::fixed("b", "B", "general_").field(Field::new("name", "Name", TextControl)),
        );
        let issues = registry.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, WorkflowBuildIssueCode::DuplicateFieldKey);
        assert!(issues[0].message.contains("general_name"));
    }

    #[test]
    fn build_error_summarizes_issues() {
        let err = WorkflowBuildError {
            issues: vec![
                WorkflowBuildIssue {
                    code: WorkflowBuildIssueCode::NoSteps,
                    message: "first".into(),
                },
                WorkflowBuildIssue {
                    code: WorkflowBuildIssueCode::EmptyStepSlug,
                    message: "second".into(),
                },
            ],
        };
        assert_eq!(err.to_string(), "first (and 1 more)");
    }
}
