//! Workflow assembly, validation and submission.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::context::{collect_configs, DefaultsTable, FormData, WorkflowContext};
use super::parameter::{
    extract_parameters, Choice, ConfigScope, Parameter, UnsupportedParameterType, GENERAL_TARGET,
};
use super::registry::{StepRegistry, WorkflowBuildError, WorkflowBuildIssue, WorkflowBuildIssueCode};
use super::step::{synthesize_step, FieldIssue, Scope, Step, StepView};
use crate::backend::{BoxFuture, DataProcessingBackend};
use crate::compat::ApiVersion;
use crate::errors::{Error, Result};
use crate::plugins::PluginSelection;
use crate::types::{ConfigsPayload, PluginVersionDetails};

/// Whether a submission creates a template or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Create,
    Update(Uuid),
}

/// What a template workflow adds on top of the generic engine.
pub trait TemplateKind: Send + Sync {
    type Request: fmt::Debug + Send + Sync;
    type Output: Send;

    const SLUG: &'static str;
    /// Human name used in status messages, e.g. "Cluster Template".
    const NAME: &'static str;
    const CONFIG_SCOPE: ConfigScope;
    /// Context key holding the template name.
    const NAME_KEY: &'static str;

    /// Fixed steps, in display order.
    fn base_steps(&self, details: &PluginVersionDetails, options: &WorkflowOptions) -> Vec<Step>;

    /// Whether `step` takes part in validation of `form`.
    fn should_validate(&self, _step: &Step, _form: &FormData) -> bool {
        true
    }

    fn build_request(
        &self,
        selection: &PluginSelection,
        options: &WorkflowOptions,
        context: &WorkflowContext,
        configs: ConfigsPayload,
    ) -> std::result::Result<Self::Request, Vec<FieldIssue>>;

    fn submit<'a>(
        &'a self,
        backend: &'a dyn DataProcessingBackend,
        mode: SubmitMode,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Self::Output>>;
}

/// Construction options shared by all template workflows.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub api_version: ApiVersion,
    /// Domains offered by the DNS service; `None` when DNS is not enabled.
    pub dns_domains: Option<Vec<String>>,
    /// Shares offered by the file share service; `None` when it is not enabled.
    pub shares: Option<Vec<Choice>>,
    /// Treat unsupported parameter types as build errors.
    pub strict: bool,
    /// Configs of an existing template, used as initial parameter values.
    pub initial_configs: Option<ConfigsPayload>,
    /// Initial values for fixed fields, keyed by form key.
    pub initial_values: BTreeMap<String, Value>,
    /// Template to update instead of creating a new one.
    pub edit_target: Option<Uuid>,
}

impl WorkflowOptions {
    pub fn new(api_version: ApiVersion) -> Self {
        Self {
            api_version,
            ..Default::default()
        }
    }

    pub fn with_dns_domains(mut self, domains: Vec<String>) -> Self {
        self.dns_domains = Some(domains);
        self
    }

    pub fn with_shares(mut self, shares: Vec<Choice>) -> Self {
        self.shares = Some(shares);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Starts from the configs of an existing template.
    pub fn copy_configs(mut self, configs: ConfigsPayload) -> Self {
        self.initial_configs = Some(configs);
        self
    }

    pub fn with_initial(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_values.insert(key.into(), value.into());
        self
    }

    /// Submits as an update of template `id`.
    pub fn edit(mut self, id: Uuid) -> Self {
        self.edit_target = Some(id);
        self
    }

    pub fn submit_mode(&self) -> SubmitMode {
        self.edit_target
            .map(SubmitMode::Update)
            .unwrap_or(SubmitMode::Create)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Initial,
    StepsRendered,
    Validating,
    Submitted,
    Succeeded,
    Failed,
}

impl WorkflowState {
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Initial, StepsRendered)
                | (StepsRendered, Validating)
                | (Validating, StepsRendered)
                | (Validating, Submitted)
                | (Submitted, Succeeded)
                | (Submitted, Failed)
                | (Failed, StepsRendered)
        )
    }
}

/// Validation issues of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepErrors {
    pub step: String,
    pub title: String,
    pub issues: Vec<FieldIssue>,
}

/// Every validation issue of a submission, grouped by step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub steps: Vec<StepErrors>,
}

impl ValidationReport {
    pub fn push(&mut self, step: impl Into<String>, title: impl Into<String>, issues: Vec<FieldIssue>) {
        if issues.is_empty() {
            return;
        }
        let step = step.into();
        match self.steps.iter_mut().find(|s| s.step == step) {
            Some(existing) => existing.issues.extend(issues),
            None => self.steps.push(StepErrors {
                step,
                title: title.into(),
                issues,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.steps.iter().map(|s| s.issues.len()).sum()
    }

    pub fn for_step(&self, slug: &str) -> Option<&StepErrors> {
        self.steps.iter().find(|s| s.step == slug)
    }

    pub fn issues(&self) -> impl Iterator<Item = &FieldIssue> {
        self.steps.iter().flat_map(|s| s.issues.iter())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut issues = self.issues();
        let Some(first) = issues.next() else {
            return write!(f, "invalid form");
        };
        let rest = issues.count();
        if rest == 0 {
            write!(f, "{first}")
        } else {
            write!(f, "{first} (and {rest} more)")
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Build(#[from] WorkflowBuildError),

    #[error("unable to load plugin configuration: {0}")]
    Schema(#[source] Error),

    #[error("{0}")]
    Invalid(ValidationReport),

    /// The service refused the submission; `message` is shown to the operator.
    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: Error,
    },

    #[error("workflow cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
}

impl WorkflowError {
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            WorkflowError::Invalid(report) => Some(report),
            _ => None,
        }
    }
}

/// Serializable description of a workflow for a rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub slug: String,
    pub name: String,
    pub plugin_name: String,
    pub plugin_version: String,
    pub state: WorkflowState,
    pub steps: Vec<StepView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_parameters: Vec<UnsupportedParameterType>,
}

/// A multi-step template form for one plugin version.
///
/// Steps are the template's fixed steps in declared order, then the
/// `general` parameter step, then one step per service in lexicographic
/// order of service name. Scopes without parameters get no step.
pub struct ConfigureWorkflow<K: TemplateKind> {
    kind: K,
    selection: PluginSelection,
    options: WorkflowOptions,
    steps: Vec<Step>,
    defaults: DefaultsTable,
    skipped: Vec<UnsupportedParameterType>,
    state: WorkflowState,
    context: WorkflowContext,
}

impl<K: TemplateKind> fmt::Debug for ConfigureWorkflow<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigureWorkflow")
            .field("slug", &K::SLUG)
            .field("selection", &self.selection)
            .field("state", &self.state)
            .field("steps", &self.step_slugs())
            .finish()
    }
}

fn copied_initial(param: Parameter, scope: &Scope, configs: Option<&ConfigsPayload>) -> Parameter {
    let copied = configs
        .and_then(|c| c.get(scope.as_str()))
        .and_then(|values| values.get(&param.name))
        .cloned();
    match copied {
        Some(value) => param.with_initial_value(value),
        None => param,
    }
}

impl<K: TemplateKind> ConfigureWorkflow<K> {
    /// Fetches the plugin schema from `backend` and assembles the workflow.
    pub async fn load(
        kind: K,
        backend: &dyn DataProcessingBackend,
        selection: PluginSelection,
        options: WorkflowOptions,
    ) -> std::result::Result<Self, WorkflowError> {
        let details = backend
            .plugin_version_details(&selection.plugin, &selection.version)
            .await
            .map_err(WorkflowError::Schema)?;
        Ok(Self::from_details(kind, selection, &details, options)?)
    }

    /// Assembles the workflow from an already fetched schema.
    pub fn from_details(
        kind: K,
        selection: PluginSelection,
        details: &PluginVersionDetails,
        options: WorkflowOptions,
    ) -> std::result::Result<Self, WorkflowBuildError> {
        let mut registry = StepRegistry::new();
        for step in kind.base_steps(details, &options) {
            registry.register(step);
        }

        // node_processes is a BTreeMap, so services come out sorted.
        let scopes = std::iter::once(Scope::General).chain(
            details
                .node_processes
                .keys()
                .filter(|service| service.as_str() != GENERAL_TARGET)
                .map(|service| Scope::service(service.as_str())),
        );

        let mut defaults = DefaultsTable::default();
        let mut skipped = Vec::new();
        let mut conflicts = Vec::new();
        for scope in scopes {
            let extracted = extract_parameters(&details.configs, K::CONFIG_SCOPE, scope.as_str());
            for unsupported in &extracted.unsupported {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    parameter = %unsupported.name,
                    target = %unsupported.target,
                    config_type = %unsupported.config_type,
                    "skipping parameter with unsupported type"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = unsupported;
            }
            skipped.extend(extracted.unsupported);

            let params: Vec<Parameter> = extracted
                .parameters
                .into_iter()
                .map(|p| copied_initial(p, &scope, options.initial_configs.as_ref()))
                .collect();
            if let Some(step) = synthesize_step(&scope, &params) {
                if registry.register(step) {
                    defaults.record(&scope, &params);
                } else {
                    conflicts.push(WorkflowBuildIssue {
                        code: WorkflowBuildIssueCode::StepSlugConflict,
                        message: format!(
                            "parameters of {:?} clash with an existing step of the same name",
                            scope.as_str()
                        ),
                    });
                }
            }
        }

        let mut issues = registry.validate();
        issues.append(&mut conflicts);
        if options.strict {
            issues.extend(skipped.iter().map(|s| WorkflowBuildIssue {
                code: WorkflowBuildIssueCode::UnsupportedParameterType,
                message: s.to_string(),
            }));
        }
        if !issues.is_empty() {
            return Err(WorkflowBuildError { issues });
        }

        let mut steps = registry.into_steps();
        if !options.initial_values.is_empty() {
            for step in &mut steps {
                step.apply_initial(&options.initial_values);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            workflow = K::SLUG,
            plugin = %selection.plugin,
            version = %selection.version,
            steps = steps.len(),
            skipped = skipped.len(),
            "workflow assembled"
        );

        Ok(Self {
            kind,
            selection,
            options,
            steps,
            defaults,
            skipped,
            state: WorkflowState::Initial,
            context: WorkflowContext::default(),
        })
    }

    pub fn selection(&self) -> &PluginSelection {
        &self.selection
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, slug: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.slug() == slug)
    }

    pub fn step_slugs(&self) -> Vec<&str> {
        self.steps.iter().map(Step::slug).collect()
    }

    pub fn defaults(&self) -> &DefaultsTable {
        &self.defaults
    }

    /// Parameters left out because their type has no control.
    pub fn skipped_parameters(&self) -> &[UnsupportedParameterType] {
        &self.skipped
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Context of the last successful validation.
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    fn transition(&mut self, next: WorkflowState) -> std::result::Result<(), WorkflowError> {
        if !self.state.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    fn ensure_rendered(&mut self) -> std::result::Result<(), WorkflowError> {
        if self.state == WorkflowState::StepsRendered {
            return Ok(());
        }
        self.transition(WorkflowState::StepsRendered)
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            slug: K::SLUG.to_string(),
            name: K::NAME.to_string(),
            plugin_name: self.selection.plugin.to_string(),
            plugin_version: self.selection.version.to_string(),
            state: self.state,
            steps: self.steps.iter().map(Step::view).collect(),
            skipped_parameters: self.skipped.clone(),
        }
    }

    /// Marks the steps as shown to the user and returns their view.
    pub fn render(&mut self) -> std::result::Result<WorkflowView, WorkflowError> {
        self.ensure_rendered()?;
        Ok(self.view())
    }

    /// Validates every applicable step, collecting all issues.
    ///
    /// On failure the workflow goes back to `StepsRendered` so the form can be
    /// corrected and resubmitted.
    pub fn validate(
        &mut self,
        form: &FormData,
    ) -> std::result::Result<&WorkflowContext, WorkflowError> {
        self.ensure_rendered()?;
        self.transition(WorkflowState::Validating)?;

        let mut report = ValidationReport::default();
        let mut context = WorkflowContext::default();
        for step in &self.steps {
            if !self.kind.should_validate(step, form) {
                continue;
            }
            match step.clean(form) {
                Ok(values) => {
                    let mut collisions = Vec::new();
                    for (key, value) in values {
                        if let Err(issue) = context.insert(key, value) {
                            collisions.push(issue);
                        }
                    }
                    report.push(step.slug(), step.title(), collisions);
                }
                Err(issues) => report.push(step.slug(), step.title(), issues),
            }
        }

        if !report.is_empty() {
            self.transition(WorkflowState::StepsRendered)?;
            return Err(WorkflowError::Invalid(report));
        }
        self.context = context;
        Ok(&self.context)
    }

    /// Validates `form` and sends exactly one create or update call.
    pub async fn submit(
        &mut self,
        form: &FormData,
        backend: &dyn DataProcessingBackend,
    ) -> std::result::Result<K::Output, WorkflowError> {
        self.validate(form)?;
        let configs = collect_configs(&self.context, &self.defaults);
        let request =
            match self
                .kind
                .build_request(&self.selection, &self.options, &self.context, configs)
            {
                Ok(request) => request,
                Err(issues) => {
                    self.transition(WorkflowState::StepsRendered)?;
                    let mut report = ValidationReport::default();
                    report.push(K::SLUG, K::NAME, issues);
                    return Err(WorkflowError::Invalid(report));
                }
            };

        self.transition(WorkflowState::Submitted)?;
        let mode = self.options.submit_mode();
        let result = self.kind.submit(backend, mode, &request).await;
        match result {
            Ok(output) => {
                self.transition(WorkflowState::Succeeded)?;
                #[cfg(feature = "tracing")]
                tracing::debug!(workflow = K::SLUG, "template submitted");
                Ok(output)
            }
            Err(err) => {
                self.transition(WorkflowState::Failed)?;
                let fallback = self.failure_message(mode);
                #[cfg(feature = "tracing")]
                tracing::warn!(workflow = K::SLUG, error = %err, "template submission rejected");
                Err(WorkflowError::Rejected {
                    message: err.user_message(&fallback),
                    source: err,
                })
            }
        }
    }

    fn failure_message(&self, mode: SubmitMode) -> String {
        match mode {
            SubmitMode::Create => format!("{} creation failed", K::NAME),
            SubmitMode::Update(_) => format!("{} update failed", K::NAME),
        }
    }

    /// Status line after a successful submission.
    pub fn success_message(&self) -> Option<String> {
        if self.state != WorkflowState::Succeeded {
            return None;
        }
        let verb = match self.options.submit_mode() {
            SubmitMode::Create => "Created",
            SubmitMode::Update(_) => "Updated",
        };
        let name = self.context.get_str(K::NAME_KEY).unwrap_or_default();
        Some(format!("{verb} {} {name}", K::NAME).trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_allows_documented_transitions() {
        use WorkflowState::*;
        assert!(Initial.can_transition_to(StepsRendered));
        assert!(Validating.can_transition_to(StepsRendered));
        assert!(Failed.can_transition_to(StepsRendered));
        assert!(!Succeeded.can_transition_to(StepsRendered));
        assert!(!Initial.can_transition_to(Submitted));
        assert!(!StepsRendered.can_transition_to(Submitted));
    }

    #[test]
    fn report_merges_issues_per_step() {
        let mut report = ValidationReport::default();
        report.push("details", "Details", vec![FieldIssue::new("general_name", "required")]);
        report.push("details", "Details", vec![FieldIssue::new("general_flavor", "required")]);
        report.push("HDFS", "HDFS Parameters", Vec::new());
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.issue_count(), 2);
        assert_eq!(report.to_string(), "general_name: required (and 1 more)");
    }

    #[test]
    fn options_select_submit_mode() {
        let id = Uuid::new_v4();
        assert_eq!(WorkflowOptions::default().submit_mode(), SubmitMode::Create);
        assert_eq!(WorkflowOptions::default().edit(id).submit_mode(), SubmitMode::Update(id));
    }
}
