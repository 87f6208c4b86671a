//! The node group template wizard.

use std::collections::BTreeSet;

use super::context::{FormData, WorkflowContext};
use super::control::{
    CheckboxControl, IntegerControl, MultiSelectControl, SelectControl, TextControl,
    REQUIRED_MESSAGE,
};
use super::engine::{ConfigureWorkflow, SubmitMode, TemplateKind, WorkflowOptions};
use super::parameter::{Choice, ConfigScope};
use super::shares::{selected_shares, shares_step};
use super::step::{Field, FieldIssue, Scope, Step, StepKind};
use crate::backend::{BoxFuture, DataProcessingBackend};
use crate::errors::Result;
use crate::plugins::{node_process_choices, PluginSelection};
use crate::types::{ConfigsPayload, NodeGroupTemplate, NodeGroupTemplateRequest, PluginVersionDetails};

pub const NAME_KEY: &str = "general_nodegroup_name";
pub const PROCESSES_KEY: &str = "general_processes";

pub const STORAGE_EPHEMERAL: &str = "ephemeral_drive";
pub const STORAGE_CINDER: &str = "cinder_volume";

/// Node group template flavour of [`ConfigureWorkflow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeGroupTemplateWorkflow;

pub type ConfigureNodegroupTemplate = ConfigureWorkflow<NodeGroupTemplateWorkflow>;

fn storage_choices() -> Vec<Choice> {
    vec![
        Choice::new(STORAGE_EPHEMERAL, "Ephemeral Drive"),
        Choice::new(STORAGE_CINDER, "Cinder Volume"),
    ]
}

/// Services owning at least one selected `service:process` value.
fn selected_services(form: &FormData) -> BTreeSet<&str> {
    form.get_all(PROCESSES_KEY)
        .iter()
        .filter_map(|value| value.split_once(':').map(|(service, _)| service.trim()))
        .collect()
}

fn process_name(value: &str) -> &str {
    value.split_once(':').map(|(_, process)| process).unwrap_or(value)
}

fn to_u32(context: &WorkflowContext, key: &str) -> Option<u32> {
    context.get_i64(key).and_then(|n| u32::try_from(n).ok())
}

fn text(context: &WorkflowContext, key: &str) -> Option<String> {
    context.get_str(key).map(str::to_string)
}

impl TemplateKind for NodeGroupTemplateWorkflow {
    type Request = NodeGroupTemplateRequest;
    type Output = NodeGroupTemplate;

    const SLUG: &'static str = "configure_nodegroup_template";
    const NAME: &'static str = "Node Group Template";
    const CONFIG_SCOPE: ConfigScope = ConfigScope::Node;
    const NAME_KEY: &'static str = NAME_KEY;

    fn base_steps(&self, details: &PluginVersionDetails, options: &WorkflowOptions) -> Vec<Step> {
        let mut general = Step::fixed("details", "Configure Node Group Template", "general_")
            .help_template("project/data_processing.nodegroup_templates/_configure_general_help.html")
            .field(Field::new("nodegroup_name", "Template Name", TextControl).required())
            .field(Field::new("description", "Description", TextControl))
            .field(Field::new("flavor", "OpenStack Flavor", TextControl).required())
            .field(Field::new("availability_zone", "Availability Zone", TextControl))
            .field(
                Field::new("storage", "Storage location", SelectControl::new(storage_choices()))
                    .required()
                    .initial(STORAGE_EPHEMERAL)
                    .help("Choose a storage location"),
            )
            .field(Field::new("volumes_per_node", "Volumes per node", IntegerControl::at_least(1)).initial(1))
            .field(Field::new("volumes_size", "Volumes size (GB)", IntegerControl::at_least(1)).initial(10))
            .field(Field::new("volume_type", "Volumes type", TextControl))
            .field(Field::new("volumes_availability_zone", "Volumes Availability Zone", TextControl))
            .field(Field::new("volume_local_to_instance", "Volume local to instance", CheckboxControl))
            .field(Field::new("floating_ip_pool", "Floating IP Pool", TextControl))
            .field(Field::new("image", "Base Image", TextControl))
            .field(Field::new("proxygateway", "Proxy Gateway", CheckboxControl))
            .field(Field::new("use_autoconfig", "Auto-configure", CheckboxControl).initial(true))
            .field(Field::new("is_public", "Public", CheckboxControl))
            .field(Field::new("is_protected", "Protected", CheckboxControl));
        if options.api_version.supports_boot_from_volume() {
            general = general
                .field(
                    Field::new("boot_storage", "Boot storage location", SelectControl::new(storage_choices()))
                        .initial(STORAGE_EPHEMERAL),
                )
                .field(Field::new("boot_volume_type", "Boot volume type", TextControl))
                .field(Field::new(
                    "boot_volume_availability_zone",
                    "Boot volume availability zone",
                    TextControl,
                ))
                .field(Field::new(
                    "boot_volume_local_to_instance",
                    "Boot volume local to instance",
                    CheckboxControl,
                ));
        }

        let processes = Step::fixed("processes", "Node Processes", "general_")
            .help_template("project/data_processing.nodegroup_templates/_node_processes_help.html")
            .field(
                Field::new(
                    "processes",
                    "Select Node Group Processes",
                    MultiSelectControl::new(node_process_choices(details)),
                )
                .required(),
            );

        let security = Step::fixed("security", "Security", "security_")
            .field(
                Field::new("autogroup", "Auto Security Group", CheckboxControl)
                    .initial(true)
                    .help("Create security group for this Node Group."),
            )
            .field(Field::new(
                "groups",
                "Security Groups",
                MultiSelectControl::free_form(Vec::new()),
            ));

        let mut steps = vec![general, processes, security];
        if let Some(shares) = &options.shares {
            steps.push(shares_step(shares, "Select the manila shares for this node group"));
        }
        steps
    }

    /// Parameters of a service are only checked when one of its processes was
    /// selected.
    fn should_validate(&self, step: &Step, form: &FormData) -> bool {
        match (step.kind(), step.scope()) {
            (StepKind::Parameters, Some(Scope::Service(service))) => {
                selected_services(form).contains(service.as_str())
            }
            _ => true,
        }
    }

    fn build_request(
        &self,
        selection: &PluginSelection,
        options: &WorkflowOptions,
        context: &WorkflowContext,
        configs: ConfigsPayload,
    ) -> std::result::Result<NodeGroupTemplateRequest, Vec<FieldIssue>> {
        let mut issues = Vec::new();
        let name = text(context, NAME_KEY);
        if name.is_none() {
            issues.push(FieldIssue::new(NAME_KEY, REQUIRED_MESSAGE));
        }
        let flavor = text(context, "general_flavor");
        if flavor.is_none() {
            issues.push(FieldIssue::new("general_flavor", REQUIRED_MESSAGE));
        }

        let mut request = NodeGroupTemplateRequest {
            name: name.unwrap_or_default(),
            plugin_name: selection.plugin.clone(),
            plugin_version: selection.version.clone(),
            flavor_id: flavor.unwrap_or_default(),
            description: text(context, "general_description"),
            node_processes: context
                .get_strings(PROCESSES_KEY)
                .iter()
                .map(|value| process_name(value).to_string())
                .collect(),
            node_configs: configs,
            floating_ip_pool: text(context, "general_floating_ip_pool"),
            security_groups: Some(context.get_strings("security_groups")),
            auto_security_group: context.get_bool("security_autogroup"),
            availability_zone: text(context, "general_availability_zone"),
            image_id: text(context, "general_image"),
            is_proxy_gateway: context.get_bool("general_proxygateway"),
            use_autoconfig: Some(context.get_bool("general_use_autoconfig")),
            is_public: Some(context.get_bool("general_is_public")),
            is_protected: Some(context.get_bool("general_is_protected")),
            ..Default::default()
        };

        if context.get_str("general_storage") == Some(STORAGE_CINDER) {
            for key in ["general_volumes_per_node", "general_volumes_size"] {
                if to_u32(context, key).is_none() {
                    issues.push(FieldIssue::new(key, REQUIRED_MESSAGE));
                }
            }
            request.volumes_per_node = to_u32(context, "general_volumes_per_node");
            request.volumes_size = to_u32(context, "general_volumes_size");
            request.volume_type = text(context, "general_volume_type");
            request.volumes_availability_zone = text(context, "general_volumes_availability_zone");
            request.volume_local_to_instance = context.get_bool("general_volume_local_to_instance");
        }

        // Boot settings are only sent for volume-backed boots.
        if options.api_version.supports_boot_from_volume()
            && context.get_str("general_boot_storage") == Some(STORAGE_CINDER)
        {
            request.boot_from_volume = Some(true);
            request.boot_volume_type = text(context, "general_boot_volume_type");
            request.boot_volume_availability_zone =
                text(context, "general_boot_volume_availability_zone");
            request.boot_volume_local_to_instance =
                Some(context.get_bool("general_boot_volume_local_to_instance"));
        }

        match selected_shares(context) {
            Ok(shares) => request.shares = shares,
            Err(mut more) => issues.append(&mut more),
        }

        if issues.is_empty() {
            Ok(request)
        } else {
            Err(issues)
        }
    }

    fn submit<'a>(
        &'a self,
        backend: &'a dyn DataProcessingBackend,
        mode: SubmitMode,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>> {
        match mode {
            SubmitMode::Create => backend.create_node_group_template(request),
            SubmitMode::Update(id) => backend.update_node_group_template(id, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::ApiVersion;
    use serde_json::json;

    fn context(values: serde_json::Value) -> WorkflowContext {
        let mut ctx = WorkflowContext::default();
        if let serde_json::Value::Object(map) = values {
            for (key, value) in map {
                ctx.insert(key, value).unwrap();
            }
        }
        ctx
    }

    #[test]
    fn cinder_storage_sets_volume_fields() {
        let ctx = context(json!({
            "general_nodegroup_name": "worker",
            "general_flavor": "2",
            "general_storage": "cinder_volume",
            "general_volumes_per_node": 2,
            "general_volumes_size": 50,
            "general_volume_type": "ssd",
            "general_processes": ["HDFS:datanode", "YARN:nodemanager"],
            "security_autogroup": true,
            "security_groups": ["default"]
        }));
        let req = NodeGroupTemplateWorkflow
            .build_request(
                &PluginSelection::new("vanilla", "2.7.1"),
                &WorkflowOptions::new(ApiVersion::V1_1),
                &ctx,
                ConfigsPayload::new(),
            )
            .unwrap();
        assert_eq!(req.node_processes, vec!["datanode", "nodemanager"]);
        assert_eq!(req.volumes_per_node, Some(2));
        assert_eq!(req.volumes_size, Some(50));
        assert_eq!(req.volume_type.as_deref(), Some("ssd"));
        assert!(req.auto_security_group);
        assert_eq!(req.security_groups, Some(vec!["default".to_string()]));
        assert_eq!(req.boot_from_volume, None);
    }

    #[test]
    fn ephemeral_storage_leaves_volumes_unset() {
        let ctx = context(json!({
            "general_nodegroup_name": "worker",
            "general_flavor": "2",
            "general_storage": "ephemeral_drive",
            "general_volumes_per_node": 1,
            "general_boot_storage": "cinder_volume",
            "general_boot_volume_type": "ssd",
            "general_processes": ["HDFS:datanode"]
        }));
        let req = NodeGroupTemplateWorkflow
            .build_request(
                &PluginSelection::new("vanilla", "2.7.1"),
                &WorkflowOptions::new(ApiVersion::V2),
                &ctx,
                ConfigsPayload::new(),
            )
            .unwrap();
        assert_eq!(req.volumes_per_node, None);
        assert_eq!(req.boot_from_volume, Some(true));
        assert_eq!(req.boot_volume_type.as_deref(), Some("ssd"));
    }

    #[test]
    fn ephemeral_boot_omits_boot_fields() {
        let ctx = context(json!({
            "general_nodegroup_name": "worker",
            "general_flavor": "2",
            "general_storage": "ephemeral_drive",
            "general_boot_storage": "ephemeral_drive",
            "general_boot_volume_type": "ssd",
            "general_processes": ["HDFS:datanode"]
        }));
        let req = NodeGroupTemplateWorkflow
            .build_request(
                &PluginSelection::new("vanilla", "2.7.1"),
                &WorkflowOptions::new(ApiVersion::V2),
                &ctx,
                ConfigsPayload::new(),
            )
            .unwrap();
        assert_eq!(req.boot_from_volume, None);
        assert_eq!(req.boot_volume_type, None);
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("boot_from_volume").is_none());
    }

    #[test]
    fn shares_step_follows_security() {
        let details = PluginVersionDetails::default();
        let steps = NodeGroupTemplateWorkflow.base_steps(
            &details,
            &WorkflowOptions::new(ApiVersion::V2).with_shares(vec![Choice::new("8a1c2f3e", "datasets")]),
        );
        let slugs: Vec<&str> = steps.iter().map(|s| s.slug()).collect();
        assert_eq!(slugs, vec!["details", "processes", "security", "shares"]);

        let mut ctx = context(json!({
            "general_nodegroup_name": "worker",
            "general_flavor": "2",
            "general_processes": ["HDFS:datanode"]
        }));
        let form = FormData::new().with("shares_0", "8a1c2f3e").with("shares_1", "/mnt/datasets");
        for (key, value) in steps[3].clean(&form).unwrap() {
            ctx.insert(key, value).unwrap();
        }
        let req = NodeGroupTemplateWorkflow
            .build_request(
                &PluginSelection::new("vanilla", "2.7.1"),
                &WorkflowOptions::new(ApiVersion::V2),
                &ctx,
                ConfigsPayload::new(),
            )
            .unwrap();
        assert_eq!(req.shares.len(), 1);
        assert_eq!(req.shares[0].id, "8a1c2f3e");
        assert_eq!(req.shares[0].access_level, "rw");
    }

    #[test]
    fn boot_fields_only_on_v2() {
        let details = PluginVersionDetails::default();
        let legacy = NodeGroupTemplateWorkflow.base_steps(&details, &WorkflowOptions::new(ApiVersion::V1_1));
        assert!(legacy[0].field_by_key("general_boot_storage").is_none());
        let current = NodeGroupTemplateWorkflow.base_steps(&details, &WorkflowOptions::new(ApiVersion::V2));
        assert!(current[0].field_by_key("general_boot_storage").is_some());
    }

    #[test]
    fn selected_services_come_from_processes() {
        let form = FormData::new()
            .with(PROCESSES_KEY, "HDFS:datanode")
            .with(PROCESSES_KEY, "YARN:nodemanager");
        let services = selected_services(&form);
        assert!(services.contains("HDFS"));
        assert!(services.contains("YARN"));
        assert!(!services.contains("Spark"));
    }
}
