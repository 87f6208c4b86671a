//! Configuration wizards for cluster and node group templates.
//!
//! A workflow is assembled from the plugin version's configuration schema:
//!
//! - **[`parameter`]** - descriptor filtering and typed parameters
//! - **[`control`]** - widget kinds and input cleaning
//! - **[`step`]** - fixed and synthesized steps, `CONF:<scope>:<name>` keys
//! - **[`registry`]** - ordered, idempotent step registration
//! - **[`shares`]** - the optional file share step
//! - **[`context`]** - form input, cleaned context and config collection
//! - **[`engine`]** - [`ConfigureWorkflow`], validation and submission
//!
//! ## Example
//!
//! ```ignore
//! use sahara_dashboard::workflow::{ConfigureClusterTemplate, ClusterTemplateWorkflow, FormData, WorkflowOptions};
//! use sahara_dashboard::{ApiVersion, PluginSelection};
//!
//! let mut wf = ConfigureClusterTemplate::load(
//!     ClusterTemplateWorkflow,
//!     &client,
//!     PluginSelection::new("vanilla", "2.7.1"),
//!     WorkflowOptions::new(ApiVersion::V2),
//! )
//! .await?;
//! let form = FormData::new().with("general_cluster_template_name", "small");
//! let template = wf.submit(&form, &client).await?;
//! ```

pub mod cluster_template;
pub mod context;
pub mod control;
pub mod engine;
pub mod node_group_template;
pub mod parameter;
pub mod registry;
pub mod shares;
pub mod step;

pub use cluster_template::{ClusterTemplateWorkflow, ConfigureClusterTemplate};
pub use context::{collect_configs, DefaultsTable, FormData, WorkflowContext};
pub use control::{Control, WidgetKind, REQUIRED_MESSAGE};
pub use engine::{
    ConfigureWorkflow, StepErrors, SubmitMode, TemplateKind, ValidationReport, WorkflowError,
    WorkflowOptions, WorkflowState, WorkflowView,
};
pub use node_group_template::{ConfigureNodegroupTemplate, NodeGroupTemplateWorkflow};
pub use parameter::{
    extract_parameters, Choice, ConfigScope, ExtractedParameters, ParamType, Parameter,
    UnsupportedParameterType,
};
pub use registry::{StepRegistry, WorkflowBuildError, WorkflowBuildIssue, WorkflowBuildIssueCode};
pub use step::{
    config_key, parse_config_key, synthesize_step, Field, FieldIssue, FieldView, Scope, Step,
    StepKind, StepView,
};
