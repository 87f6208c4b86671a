//! The cluster template wizard.

use std::collections::BTreeSet;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde_json::{Map, Value};

use super::context::{FormData, WorkflowContext};
use super::control::{CheckboxControl, MultiSelectControl, SelectControl, TextControl, REQUIRED_MESSAGE};
use super::engine::{ConfigureWorkflow, SubmitMode, TemplateKind, WorkflowOptions};
use super::parameter::{scalar_text, Choice, ConfigScope};
use super::shares::{selected_shares, shares_step};
use super::step::{Field, FieldIssue, Step};
use crate::backend::{BoxFuture, DataProcessingBackend};
use crate::errors::Result;
use crate::plugins::PluginSelection;
use crate::types::{
    ClusterTemplate, ClusterTemplateRequest, ConfigsPayload, NodeGroup, PluginVersionDetails,
};

pub const NAME_KEY: &str = "general_cluster_template_name";
pub const DESCRIPTION_KEY: &str = "general_description";
pub const AUTOCONFIG_KEY: &str = "general_use_autoconfig";
pub const PUBLIC_KEY: &str = "general_is_public";
pub const PROTECTED_KEY: &str = "general_is_protected";
pub const ANTI_AFFINITY_KEY: &str = "general_anti_affinity";
pub const NODE_GROUPS_KEY: &str = "ng_node_groups";
pub const DOMAIN_KEY: &str = "dns_domain_name";

const NO_DOMAIN: &str = "No domain is specified";

/// Cluster template flavour of [`ConfigureWorkflow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterTemplateWorkflow;

pub type ConfigureClusterTemplate = ConfigureWorkflow<ClusterTemplateWorkflow>;

fn anti_affinity_choices(details: &PluginVersionDetails) -> Vec<Choice> {
    let processes: BTreeSet<&str> = details
        .node_processes
        .values()
        .flatten()
        .map(String::as_str)
        .collect();
    processes.into_iter().map(Choice::same).collect()
}

/// Decodes a `serialized_<id>` payload: URL-safe base64 of a JSON object.
/// A literal `null`, encoded or not, means no extra attributes.
fn decode_serialized(raw: &str) -> Option<Map<String, Value>> {
    if raw == "null" {
        return Some(Map::new());
    }
    let bytes = URL_SAFE.decode(raw).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}

/// Reads the node group rows: `forms_ids` holds a JSON list of row ids and
/// each row has `group_name_<id>`, `count_<id>`, `template_id_<id>` and an
/// optional `serialized_<id>` node group copy.
fn node_group_rows(
    form: &FormData,
    prefix: &str,
) -> std::result::Result<Vec<(String, Value)>, Vec<FieldIssue>> {
    let ids_key = format!("{prefix}forms_ids");
    let ids: Vec<Value> = match form.get(&ids_key) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| vec![FieldIssue::new(&ids_key, "Invalid node group list.")])?,
        None => Vec::new(),
    };

    let mut groups = Vec::with_capacity(ids.len());
    let mut issues = Vec::new();
    for id in ids.iter().map(scalar_text) {
        let name_key = format!("{prefix}group_name_{id}");
        let count_key = format!("{prefix}count_{id}");
        let Some(name) = form.get(&name_key) else {
            issues.push(FieldIssue::new(name_key, REQUIRED_MESSAGE));
            continue;
        };
        let count = match form.get(&count_key).map(str::parse::<u32>) {
            Some(Ok(count)) => count,
            Some(Err(_)) => {
                issues.push(FieldIssue::new(count_key, "Enter a whole number."));
                continue;
            }
            None => {
                issues.push(FieldIssue::new(count_key, REQUIRED_MESSAGE));
                continue;
            }
        };
        let serialized_key = format!("{prefix}serialized_{id}");
        let extra = match form.get(&serialized_key) {
            Some(raw) => match decode_serialized(raw) {
                Some(map) => map,
                None => {
                    issues.push(FieldIssue::new(serialized_key, "Invalid node group data."));
                    continue;
                }
            },
            None => Map::new(),
        };
        let mut group = NodeGroup {
            name: name.to_string(),
            count,
            node_group_template_id: form
                .get(&format!("{prefix}template_id_{id}"))
                .filter(|t| *t != "None")
                .map(str::to_string),
            extra,
        };
        // Row fields win over serialized copies.
        group.extra.remove("name");
        group.extra.remove("count");
        group.extra.remove("node_group_template_id");
        groups.push(group);
    }

    if !issues.is_empty() {
        return Err(issues);
    }
    let value = serde_json::to_value(&groups)
        .map_err(|err| vec![FieldIssue::new(&ids_key, err.to_string())])?;
    Ok(vec![("node_groups".to_string(), value)])
}

impl TemplateKind for ClusterTemplateWorkflow {
    type Request = ClusterTemplateRequest;
    type Output = ClusterTemplate;

    const SLUG: &'static str = "configure_cluster_template";
    const NAME: &'static str = "Cluster Template";
    const CONFIG_SCOPE: ConfigScope = ConfigScope::Cluster;
    const NAME_KEY: &'static str = NAME_KEY;

    fn base_steps(&self, details: &PluginVersionDetails, options: &WorkflowOptions) -> Vec<Step> {
        let mut steps = vec![
            Step::fixed("details", "Details", "general_")
                .help_template("project/data_processing.cluster_templates/_configure_general_help.html")
                .field(Field::new("cluster_template_name", "Template Name", TextControl).required())
                .field(Field::new("description", "Description", TextControl))
                .field(
                    Field::new("use_autoconfig", "Auto-configure", CheckboxControl)
                        .initial(true)
                        .help("If selected, instances of a cluster will be automatically configured during creation."),
                )
                .field(Field::new("is_public", "Public", CheckboxControl))
                .field(Field::new("is_protected", "Protected", CheckboxControl))
                .field(
                    Field::new(
                        "anti_affinity",
                        "Use anti-affinity groups for",
                        MultiSelectControl::new(anti_affinity_choices(details)),
                    )
                    .help("Use anti-affinity groups for processes"),
                ),
            Step::fixed("node_groups", "Node Groups", "ng_")
                .help_template("project/data_processing.cluster_templates/cluster_node_groups_template.html")
                .field(Field::new("forms_ids", "Node group rows", TextControl))
                .validator(node_group_rows),
        ];
        if let Some(shares) = &options.shares {
            steps.push(shares_step(shares, "Select the manila shares for this cluster"));
        }
        if let Some(domains) = &options.dns_domains {
            let choices = std::iter::once(Choice::new("", NO_DOMAIN))
                .chain(domains.iter().map(|d| Choice::same(d.as_str())))
                .collect();
            steps.push(
                Step::fixed("dns", "DNS Domain Names", "dns_").field(
                    Field::new("domain_name", "Domain Name", SelectControl::new(choices))
                        .help("Domain name for internal and external hostname resolution."),
                ),
            );
        }
        steps
    }

    fn build_request(
        &self,
        selection: &PluginSelection,
        _options: &WorkflowOptions,
        context: &WorkflowContext,
        configs: ConfigsPayload,
    ) -> std::result::Result<ClusterTemplateRequest, Vec<FieldIssue>> {
        let name = context
            .get_str(NAME_KEY)
            .ok_or_else(|| vec![FieldIssue::new(NAME_KEY, REQUIRED_MESSAGE)])?;
        let node_groups: Vec<NodeGroup> = match context.get(NODE_GROUPS_KEY) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|err| vec![FieldIssue::new(NODE_GROUPS_KEY, err.to_string())])?,
            None => Vec::new(),
        };
        let shares = selected_shares(context)?;
        Ok(ClusterTemplateRequest {
            name: name.to_string(),
            plugin_name: selection.plugin.clone(),
            plugin_version: selection.version.clone(),
            description: context.get_str(DESCRIPTION_KEY).map(str::to_string),
            cluster_configs: configs,
            node_groups,
            anti_affinity: context.get_strings(ANTI_AFFINITY_KEY),
            use_autoconfig: Some(context.get_bool(AUTOCONFIG_KEY)),
            is_public: Some(context.get_bool(PUBLIC_KEY)),
            is_protected: Some(context.get_bool(PROTECTED_KEY)),
            domain_name: context.get_str(DOMAIN_KEY).map(str::to_string),
            shares,
        })
    }

    fn submit<'a>(
        &'a self,
        backend: &'a dyn DataProcessingBackend,
        mode: SubmitMode,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>> {
        match mode {
            SubmitMode::Create => backend.create_cluster_template(request),
            SubmitMode::Update(id) => backend.update_cluster_template(id, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use serde_json::json;

    #[test]
    fn rows_become_node_groups() {
        let form = FormData::new()
            .with("ng_forms_ids", "[1, 2]")
            .with("ng_group_name_1", "master")
            .with("ng_count_1", "1")
            .with("ng_template_id_1", "7c3c1c4e-0000-4000-8000-000000000001")
            .with("ng_group_name_2", "worker")
            .with("ng_count_2", "3")
            .with("ng_template_id_2", "None")
            .with("ng_serialized_1", "null")
            .with(
                "ng_serialized_2",
                URL_SAFE.encode(r#"{"flavor_id": "2", "node_processes": ["datanode"]}"#),
            );
        let values = node_group_rows(&form, "ng_").unwrap();
        assert_eq!(values[0].0, "node_groups");
        assert_eq!(
            values[0].1,
            json!([
                {"name": "master", "count": 1, "node_group_template_id": "7c3c1c4e-0000-4000-8000-000000000001"},
                {"name": "worker", "count": 3, "flavor_id": "2", "node_processes": ["datanode"]}
            ])
        );
    }

    #[test]
    fn serialized_rows_must_be_encoded_objects() {
        let row = |serialized: String| {
            FormData::new()
                .with("ng_forms_ids", "[1]")
                .with("ng_group_name_1", "worker")
                .with("ng_count_1", "2")
                .with("ng_serialized_1", serialized)
        };
        let values = node_group_rows(&row("eyJmbGF2b3JfaWQiOiAiMiJ9".into()), "ng_").unwrap();
        assert_eq!(values[0].1, json!([{"name": "worker", "count": 2, "flavor_id": "2"}]));

        let values = node_group_rows(&row(URL_SAFE.encode("null")), "ng_").unwrap();
        assert_eq!(values[0].1, json!([{"name": "worker", "count": 2}]));

        for bad in [r#"{"flavor_id": "2"}"#.to_string(), URL_SAFE.encode("[1, 2]")] {
            let issues = node_group_rows(&row(bad), "ng_").unwrap_err();
            assert_eq!(issues[0].field, "ng_serialized_1");
        }
    }

    #[test]
    fn bad_rows_report_each_problem() {
        let form = FormData::new()
            .with("ng_forms_ids", "[1, 2]")
            .with("ng_count_1", "2")
            .with("ng_group_name_2", "worker")
            .with("ng_count_2", "many");
        let issues = node_group_rows(&form, "ng_").unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["ng_group_name_1", "ng_count_2"]);
    }

    #[test]
    fn dns_step_only_when_enabled() {
        let details = PluginVersionDetails::default();
        let without = ClusterTemplateWorkflow.base_steps(&details, &WorkflowOptions::default());
        assert_eq!(without.len(), 2);
        let with = ClusterTemplateWorkflow.base_steps(
            &details,
            &WorkflowOptions::default().with_dns_domains(vec!["example.org.".into()]),
        );
        assert_eq!(with.last().map(|s| s.slug()), Some("dns"));
    }

    #[test]
    fn shares_step_precedes_dns_and_feeds_the_request() {
        let details = PluginVersionDetails::default();
        let options = WorkflowOptions::default()
            .with_shares(vec![Choice::new("8a1c2f3e", "datasets")])
            .with_dns_domains(vec!["example.org.".into()]);
        let steps = ClusterTemplateWorkflow.base_steps(&details, &options);
        let slugs: Vec<&str> = steps.iter().map(|s| s.slug()).collect();
        assert_eq!(slugs, vec!["details", "node_groups", "shares", "dns"]);

        let form = FormData::new()
            .with("shares_0", "8a1c2f3e")
            .with("shares_1", "/mnt/datasets")
            .with("shares_2", "ro");
        let mut ctx = WorkflowContext::default();
        ctx.insert(NAME_KEY, json!("small")).unwrap();
        for (key, value) in steps[2].clean(&form).unwrap() {
            ctx.insert(key, value).unwrap();
        }
        let req = ClusterTemplateWorkflow
            .build_request(
                &PluginSelection::new("vanilla", "2.7.1"),
                &options,
                &ctx,
                ConfigsPayload::new(),
            )
            .unwrap();
        assert_eq!(req.shares.len(), 1);
        assert_eq!(req.shares[0].path.as_deref(), Some("/mnt/datasets"));
        assert_eq!(req.shares[0].access_level, "ro");
    }
}
