//! Resources exchanged with the data-processing service.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{Error, Result, ValidationError};
use crate::identifiers::{PluginName, PluginVersion};

/// Configuration values grouped by scope (`general` or a service name).
pub type ConfigsPayload = BTreeMap<String, BTreeMap<String, Value>>;

fn default_true() -> bool {
    true
}

/// Status label attached to a plugin or a plugin version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default = "default_true")]
    pub status: bool,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Label {
    pub fn new(status: bool) -> Self {
        Self {
            status,
            mutable: true,
            description: None,
        }
    }
}

pub type Labels = BTreeMap<String, Label>;

/// Plugin summary as returned by the plugin listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plugin {
    pub name: PluginName,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub versions: Vec<PluginVersion>,
    pub plugin_labels: Labels,
    pub version_labels: BTreeMap<String, Labels>,
}

/// Raw configuration descriptor reported for a plugin version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    pub config_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// `cluster` or `node`.
    #[serde(default)]
    pub scope: String,
    /// `general` or the service the parameter belongs to.
    #[serde(default)]
    pub applicable_target: String,
}

/// Full description of one plugin version, including its configuration schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginVersionDetails {
    pub name: PluginName,
    pub title: String,
    pub versions: Vec<PluginVersion>,
    pub configs: Vec<ConfigDescriptor>,
    /// Processes offered by each service.
    pub node_processes: BTreeMap<String, Vec<String>>,
    pub required_image_tags: Vec<String>,
    pub plugin_labels: Labels,
    pub version_labels: BTreeMap<String, Labels>,
}

/// A node group inside a cluster template.
///
/// Attributes copied from a serialized node group are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_group_template_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_access_level() -> String {
    Share::READ_WRITE.to_string()
}

/// A file share mounted into the instances of a cluster or node group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub id: String,
    /// Mount point inside the instance; the service picks one when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_access_level")]
    pub access_level: String,
}

impl Share {
    pub const READ_WRITE: &'static str = "rw";
    pub const READ_ONLY: &'static str = "ro";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterTemplate {
    pub id: Uuid,
    pub name: String,
    pub plugin_name: PluginName,
    #[serde(alias = "hadoop_version")]
    pub plugin_version: PluginVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cluster_configs: ConfigsPayload,
    pub node_groups: Vec<NodeGroup>,
    pub anti_affinity: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_autoconfig: Option<bool>,
    pub is_public: bool,
    pub is_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    pub shares: Vec<Share>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeGroupTemplate {
    pub id: Uuid,
    pub name: String,
    pub plugin_name: PluginName,
    #[serde(alias = "hadoop_version")]
    pub plugin_version: PluginVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub flavor_id: String,
    pub node_processes: Vec<String>,
    pub node_configs: ConfigsPayload,
    pub volumes_per_node: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes_availability_zone: Option<String>,
    pub volume_local_to_instance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floating_ip_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
    pub auto_security_group: bool,
    pub is_proxy_gateway: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_autoconfig: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub is_public: bool,
    pub is_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_from_volume: Option<bool>,
    pub shares: Vec<Share>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

/// Create/update body for a cluster template.
///
/// The plugin version is written under an API-version specific key, see
/// [`crate::compat::versioned_payload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterTemplateRequest {
    pub name: String,
    pub plugin_name: PluginName,
    #[serde(skip)]
    pub plugin_version: PluginVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cluster_configs: ConfigsPayload,
    pub node_groups: Vec<NodeGroup>,
    pub anti_affinity: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_autoconfig: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shares: Vec<Share>,
}

/// Create/update body for a node group template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeGroupTemplateRequest {
    pub name: String,
    pub plugin_name: PluginName,
    #[serde(skip)]
    pub plugin_version: PluginVersion,
    pub flavor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes_per_node: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes_availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    pub volume_local_to_instance: bool,
    pub node_processes: Vec<String>,
    pub node_configs: ConfigsPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floating_ip_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
    pub auto_security_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub is_proxy_gateway: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_autoconfig: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_from_volume: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_volume_availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_volume_local_to_instance: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shares: Vec<Share>,
}

/// Trait for template requests that share common validation.
pub(crate) trait TemplateRequestFields {
    fn name(&self) -> &str;
    fn plugin_name(&self) -> &PluginName;
    fn plugin_version(&self) -> &PluginVersion;
}

impl TemplateRequestFields for ClusterTemplateRequest {
    fn name(&self) -> &str {
        &self.name
    }
    fn plugin_name(&self) -> &PluginName {
        &self.plugin_name
    }
    fn plugin_version(&self) -> &PluginVersion {
        &self.plugin_version
    }
}

impl TemplateRequestFields for NodeGroupTemplateRequest {
    fn name(&self) -> &str {
        &self.name
    }
    fn plugin_name(&self) -> &PluginName {
        &self.plugin_name
    }
    fn plugin_version(&self) -> &PluginVersion {
        &self.plugin_version
    }
}

pub(crate) fn validate_template_request<T: TemplateRequestFields>(req: &T) -> Result<()> {
    if req.name().trim().is_empty() {
        return Err(Error::Validation(
            ValidationError::new("name is required").with_field("name"),
        ));
    }
    if req.plugin_name().is_empty() {
        return Err(Error::Validation(
            ValidationError::new("plugin name is required").with_field("plugin_name"),
        ));
    }
    if req.plugin_version().is_empty() {
        return Err(Error::Validation(
            ValidationError::new("plugin version is required").with_field("plugin_version"),
        ));
    }
    Ok(())
}

impl ClusterTemplateRequest {
    pub fn validate(&self) -> Result<()> {
        validate_template_request(self)
    }
}

impl NodeGroupTemplateRequest {
    pub fn validate(&self) -> Result<()> {
        validate_template_request(self)?;
        if self.flavor_id.trim().is_empty() {
            return Err(Error::Validation(
                ValidationError::new("flavor is required").with_field("flavor_id"),
            ));
        }
        if self.node_processes.is_empty() {
            return Err(Error::Validation(
                ValidationError::new("at least one node process is required")
                    .with_field("node_processes"),
            ));
        }
        Ok(())
    }
}

/// Public/protected flag update. Unset flags are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AclUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_protected: Option<bool>,
}

impl AclUpdate {
    pub fn public(mut self, value: bool) -> Self {
        self.is_public = Some(value);
        self
    }

    pub fn protected(mut self, value: bool) -> Self {
        self.is_protected = Some(value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_public.is_none() && self.is_protected.is_none() {
            return Err(Error::Validation(ValidationError::new(
                "acl update must set is_public or is_protected",
            )));
        }
        Ok(())
    }
}

/// Template lookup filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFilter {
    pub name: Option<String>,
    pub plugin_name: Option<PluginName>,
    pub plugin_version: Option<PluginVersion>,
}

impl TemplateFilter {
    pub fn for_plugin(plugin: impl Into<PluginName>, version: impl Into<PluginVersion>) -> Self {
        Self {
            name: None,
            plugin_name: Some(plugin.into()),
            plugin_version: Some(version.into()),
        }
    }
}

/// Marker-based pagination request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub marker: Option<String>,
    /// Defaults to the client's configured page size.
    pub limit: Option<u32>,
}

impl ListOptions {
    pub fn after(marker: impl Into<String>) -> Self {
        Self {
            marker: Some(marker.into()),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of a listing plus the markers to navigate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
    pub prev_marker: Option<String>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next_marker.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cluster_template_accepts_legacy_version_key() {
        let ct: ClusterTemplate = serde_json::from_value(json!({
            "id": "6f3c2a8e-1d43-4a4c-8f39-0c1f6f3a9b10",
            "name": "ct",
            "plugin_name": "vanilla",
            "hadoop_version": "2.7.1",
            "cluster_configs": {"HDFS": {"dfs.replication": 2}},
            "created_at": "2014-06-04T20:02:14"
        }))
        .unwrap();
        assert_eq!(ct.plugin_version.as_str(), "2.7.1");
        assert_eq!(ct.cluster_configs["HDFS"]["dfs.replication"], json!(2));
        assert!(ct.created_at.is_some());
    }

    #[test]
    fn label_status_defaults_to_true() {
        let label: Label = serde_json::from_value(json!({"mutable": false})).unwrap();
        assert!(label.status);
    }

    #[test]
    fn node_group_keeps_serialized_attributes() {
        let ng: NodeGroup = serde_json::from_value(json!({
            "name": "worker",
            "count": 3,
            "flavor_id": "2",
            "node_processes": ["datanode"]
        }))
        .unwrap();
        assert_eq!(ng.count, 3);
        assert_eq!(ng.extra["flavor_id"], json!("2"));
        let back = serde_json::to_value(&ng).unwrap();
        assert_eq!(back["node_processes"], json!(["datanode"]));
    }

    #[test]
    fn node_group_request_requires_flavor_and_processes() {
        let mut req = NodeGroupTemplateRequest {
            name: "worker".into(),
            plugin_name: "vanilla".into(),
            plugin_version: "2.7.1".into(),
            ..Default::default()
        };
        assert!(req.validate().is_err());
        req.flavor_id = "2".into();
        assert!(req.validate().is_err());
        req.node_processes = vec!["datanode".into()];
        assert!(req.validate().is_ok());
    }

    #[test]
    fn acl_update_requires_a_flag() {
        assert!(AclUpdate::default().validate().is_err());
        let update = AclUpdate::default().public(true);
        assert!(update.validate().is_ok());
        assert_eq!(serde_json::to_value(update).unwrap(), json!({"is_public": true}));
    }
}
