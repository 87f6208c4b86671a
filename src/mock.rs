#![cfg(any(test, feature = "mock"))]

//! In-memory [`DataProcessingBackend`] for offline tests.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};

use uuid::Uuid;

use crate::{
    backend::{BoxFuture, DataProcessingBackend},
    errors::{APIError, Error, Result},
    identifiers::{PluginName, PluginVersion},
    types::{
        ClusterTemplate, ClusterTemplateRequest, NodeGroupTemplate, NodeGroupTemplateRequest,
        PluginVersionDetails,
    },
};

/// In-memory mock configuration.
///
/// Queued results are handed out in order. When a queue is empty the request
/// is echoed back as a freshly created template.
#[derive(Default)]
pub struct MockConfig {
    pub version_details: BTreeMap<(String, String), PluginVersionDetails>,
    pub cluster_template_results: Vec<Result<ClusterTemplate>>,
    pub node_group_template_results: Vec<Result<NodeGroupTemplate>>,
}

impl MockConfig {
    pub fn with_version_details(
        mut self,
        plugin: impl Into<PluginName>,
        version: impl Into<PluginVersion>,
        details: PluginVersionDetails,
    ) -> Self {
        let key = (plugin.into().to_string(), version.into().to_string());
        self.version_details.insert(key, details);
        self
    }

    pub fn with_cluster_template(mut self, template: ClusterTemplate) -> Self {
        self.cluster_template_results.push(Ok(template));
        self
    }

    pub fn with_cluster_template_error(mut self, err: Error) -> Self {
        self.cluster_template_results.push(Err(err));
        self
    }

    pub fn with_node_group_template(mut self, template: NodeGroupTemplate) -> Self {
        self.node_group_template_results.push(Ok(template));
        self
    }

    pub fn with_node_group_template_error(mut self, err: Error) -> Self {
        self.node_group_template_results.push(Err(err));
        self
    }
}

/// A call observed by [`MockClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    PluginVersionDetails {
        plugin: PluginName,
        version: PluginVersion,
    },
    CreateClusterTemplate(ClusterTemplateRequest),
    UpdateClusterTemplate(Uuid, ClusterTemplateRequest),
    CreateNodeGroupTemplate(NodeGroupTemplateRequest),
    UpdateNodeGroupTemplate(Uuid, NodeGroupTemplateRequest),
}

#[derive(Clone)]
pub struct MockClient {
    inner: Arc<MockInner>,
}

impl MockClient {
    pub fn new(cfg: MockConfig) -> Self {
        Self {
            inner: Arc::new(MockInner::new(cfg)),
        }
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().expect("lock poisoned").clone()
    }

    /// Number of create/update calls made so far.
    pub fn submissions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !matches!(call, RecordedCall::PluginVersionDetails { .. }))
            .count()
    }
}

struct MockInner {
    version_details: BTreeMap<(String, String), PluginVersionDetails>,
    cluster_templates: Mutex<VecDeque<Result<ClusterTemplate>>>,
    node_group_templates: Mutex<VecDeque<Result<NodeGroupTemplate>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockInner {
    fn new(cfg: MockConfig) -> Self {
        Self {
            version_details: cfg.version_details,
            cluster_templates: Mutex::new(VecDeque::from(cfg.cluster_template_results)),
            node_group_templates: Mutex::new(VecDeque::from(cfg.node_group_template_results)),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }

    fn details(&self, plugin: &PluginName, version: &PluginVersion) -> Result<PluginVersionDetails> {
        self.record(RecordedCall::PluginVersionDetails {
            plugin: plugin.clone(),
            version: version.clone(),
        });
        self.version_details
            .get(&(plugin.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::Api(
                    APIError::new(404, format!("Plugin {plugin} {version} not found"))
                        .with_code("NOT_FOUND"),
                )
            })
    }

    fn next_cluster_template(&self, id: Option<Uuid>, req: &ClusterTemplateRequest) -> Result<ClusterTemplate> {
        req.validate()?;
        let queued = self
            .cluster_templates
            .lock()
            .expect("lock poisoned")
            .pop_front();
        queued.unwrap_or_else(|| Ok(echo_cluster_template(id, req)))
    }

    fn next_node_group_template(
        &self,
        id: Option<Uuid>,
        req: &NodeGroupTemplateRequest,
    ) -> Result<NodeGroupTemplate> {
        req.validate()?;
        let queued = self
            .node_group_templates
            .lock()
            .expect("lock poisoned")
            .pop_front();
        queued.unwrap_or_else(|| Ok(echo_node_group_template(id, req)))
    }
}

fn echo_cluster_template(id: Option<Uuid>, req: &ClusterTemplateRequest) -> ClusterTemplate {
    ClusterTemplate {
        id: id.unwrap_or_else(Uuid::new_v4),
        name: req.name.clone(),
        plugin_name: req.plugin_name.clone(),
        plugin_version: req.plugin_version.clone(),
        description: req.description.clone(),
        cluster_configs: req.cluster_configs.clone(),
        node_groups: req.node_groups.clone(),
        anti_affinity: req.anti_affinity.clone(),
        use_autoconfig: req.use_autoconfig,
        is_public: req.is_public.unwrap_or(false),
        is_protected: req.is_protected.unwrap_or(false),
        domain_name: req.domain_name.clone(),
        shares: req.shares.clone(),
        ..Default::default()
    }
}

fn echo_node_group_template(id: Option<Uuid>, req: &NodeGroupTemplateRequest) -> NodeGroupTemplate {
    NodeGroupTemplate {
        id: id.unwrap_or_else(Uuid::new_v4),
        name: req.name.clone(),
        plugin_name: req.plugin_name.clone(),
        plugin_version: req.plugin_version.clone(),
        description: req.description.clone(),
        flavor_id: req.flavor_id.clone(),
        node_processes: req.node_processes.clone(),
        node_configs: req.node_configs.clone(),
        volumes_per_node: req.volumes_per_node.unwrap_or(0),
        volumes_size: req.volumes_size,
        volume_type: req.volume_type.clone(),
        volumes_availability_zone: req.volumes_availability_zone.clone(),
        volume_local_to_instance: req.volume_local_to_instance,
        availability_zone: req.availability_zone.clone(),
        floating_ip_pool: req.floating_ip_pool.clone(),
        security_groups: req.security_groups.clone(),
        auto_security_group: req.auto_security_group,
        is_proxy_gateway: req.is_proxy_gateway,
        use_autoconfig: req.use_autoconfig,
        image_id: req.image_id.clone(),
        is_public: req.is_public.unwrap_or(false),
        is_protected: req.is_protected.unwrap_or(false),
        boot_from_volume: req.boot_from_volume,
        shares: req.shares.clone(),
        ..Default::default()
    }
}

impl DataProcessingBackend for MockClient {
    fn plugin_version_details<'a>(
        &'a self,
        plugin: &'a PluginName,
        version: &'a PluginVersion,
    ) -> BoxFuture<'a, Result<PluginVersionDetails>> {
        Box::pin(async move { self.inner.details(plugin, version) })
    }

    fn create_cluster_template<'a>(
        &'a self,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>> {
        Box::pin(async move {
            self.inner
                .record(RecordedCall::CreateClusterTemplate(request.clone()));
            self.inner.next_cluster_template(None, request)
        })
    }

    fn update_cluster_template<'a>(
        &'a self,
        id: Uuid,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>> {
        Box::pin(async move {
            self.inner
                .record(RecordedCall::UpdateClusterTemplate(id, request.clone()));
            self.inner.next_cluster_template(Some(id), request)
        })
    }

    fn create_node_group_template<'a>(
        &'a self,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>> {
        Box::pin(async move {
            self.inner
                .record(RecordedCall::CreateNodeGroupTemplate(request.clone()));
            self.inner.next_node_group_template(None, request)
        })
    }

    fn update_node_group_template<'a>(
        &'a self,
        id: Uuid,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>> {
        Box::pin(async move {
            self.inner
                .record(RecordedCall::UpdateNodeGroupTemplate(id, request.clone()));
            self.inner.next_node_group_template(Some(id), request)
        })
    }
}

pub mod fixtures {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::types::{ConfigDescriptor, Label, Plugin, PluginVersionDetails};

    fn processes(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(service, procs)| {
                (
                    service.to_string(),
                    procs.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect()
    }

    fn int_config(name: &str, target: &str, scope: &str, default: i64) -> ConfigDescriptor {
        ConfigDescriptor {
            name: name.into(),
            description: Some(format!("{name} for {target}")),
            is_optional: true,
            default_value: Some(json!(default)),
            config_type: "int".into(),
            config_values: None,
            priority: Some(1),
            scope: scope.into(),
            applicable_target: target.into(),
        }
    }

    /// Vanilla 2.7.1 with services but no configuration parameters.
    pub fn vanilla_details() -> PluginVersionDetails {
        PluginVersionDetails {
            name: "vanilla".into(),
            title: "Vanilla Apache Hadoop".into(),
            versions: vec!["2.7.1".into()],
            node_processes: processes(&[
                ("HDFS", &["namenode", "datanode", "secondarynamenode"]),
                ("YARN", &["resourcemanager", "nodemanager"]),
            ]),
            ..Default::default()
        }
    }

    /// HDP 2.0 with one cluster-scope HDFS parameter, `dfs.replication`
    /// (default 3), and one node-scope HDFS parameter.
    pub fn hdp_details() -> PluginVersionDetails {
        PluginVersionDetails {
            name: "hdp".into(),
            title: "Hortonworks Data Platform".into(),
            versions: vec!["2.0".into()],
            configs: vec![
                int_config("dfs.replication", "HDFS", "cluster", 3),
                int_config("DataNode Heap Size", "HDFS", "node", 1024),
            ],
            node_processes: processes(&[
                ("HDFS", &["namenode", "datanode"]),
                ("YARN", &["resourcemanager", "nodemanager"]),
            ]),
            ..Default::default()
        }
    }

    pub fn plugin(name: &str, versions: &[&str]) -> Plugin {
        Plugin {
            name: name.into(),
            title: name.to_uppercase(),
            description: None,
            versions: versions.iter().map(|v| (*v).into()).collect(),
            plugin_labels: BTreeMap::from([("enabled".to_string(), Label::new(true))]),
            version_labels: BTreeMap::new(),
        }
    }
}
