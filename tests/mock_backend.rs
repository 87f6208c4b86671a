//! Workflow tests against the in-memory backend.

#![cfg(feature = "mock")]

use std::collections::BTreeMap;

use sahara_dashboard::workflow::{
    Choice, ConfigureNodegroupTemplate, FormData, NodeGroupTemplateWorkflow,
    WorkflowBuildIssueCode, WorkflowOptions,
};
use sahara_dashboard::{
    fixtures, ApiVersion, ClusterTemplateWorkflow, ConfigDescriptor, ConfigureClusterTemplate,
    MockClient, MockConfig, PluginSelection, RecordedCall,
};
use serde_json::json;
use uuid::Uuid;

fn mock() -> MockClient {
    MockClient::new(
        MockConfig::default()
            .with_version_details("vanilla", "2.7.1", fixtures::vanilla_details())
            .with_version_details("hdp", "2.0", fixtures::hdp_details()),
    )
}

fn hdp() -> PluginSelection {
    PluginSelection::new("hdp", "2.0")
}

#[tokio::test]
async fn node_group_skips_services_without_selected_processes() {
    let backend = mock();
    let mut wf = ConfigureNodegroupTemplate::load(
        NodeGroupTemplateWorkflow,
        &backend,
        hdp(),
        WorkflowOptions::new(ApiVersion::V2),
    )
    .await
    .expect("workflow should load");
    assert_eq!(wf.step_slugs(), vec!["details", "processes", "security", "HDFS"]);

    let form = FormData::new()
        .with("general_nodegroup_name", "compute")
        .with("general_flavor", "2")
        .with("general_storage", "ephemeral_drive")
        .with("general_processes", "YARN:nodemanager")
        .with("security_autogroup", "on")
        .with("CONF:HDFS:DataNode Heap Size", "not a number");
    let created = wf.submit(&form, &backend).await.expect("submit should succeed");
    assert_eq!(created.node_processes, vec!["nodemanager".to_string()]);
    assert!(created.node_configs.is_empty());
    assert!(created.auto_security_group);
    assert_eq!(created.boot_from_volume, None);
    assert_eq!(backend.submissions(), 1);
}

#[tokio::test]
async fn node_group_validates_selected_service_parameters() {
    let backend = mock();
    let mut wf = ConfigureNodegroupTemplate::load(
        NodeGroupTemplateWorkflow,
        &backend,
        hdp(),
        WorkflowOptions::new(ApiVersion::V1_1),
    )
    .await
    .expect("workflow should load");

    let form = FormData::new()
        .with("general_nodegroup_name", "storage")
        .with("general_flavor", "2")
        .with("general_storage", "cinder_volume")
        .with("general_volumes_per_node", "2")
        .with("general_volumes_size", "100")
        .with("general_processes", "HDFS:datanode")
        .with("CONF:HDFS:DataNode Heap Size", "not a number");
    let err = wf.submit(&form, &backend).await.unwrap_err();
    assert!(err.report().and_then(|r| r.for_step("HDFS")).is_some());
    assert_eq!(backend.submissions(), 0);

    let form = FormData::new()
        .with("general_nodegroup_name", "storage")
        .with("general_flavor", "2")
        .with("general_storage", "cinder_volume")
        .with("general_volumes_per_node", "2")
        .with("general_volumes_size", "100")
        .with("general_processes", "HDFS:datanode")
        .with("CONF:HDFS:DataNode Heap Size", "2048");
    let created = wf.submit(&form, &backend).await.expect("submit should succeed");
    assert_eq!(created.volumes_per_node, 2);
    assert_eq!(created.volumes_size, Some(100));
    assert_eq!(
        created.node_configs.get("HDFS").and_then(|c| c.get("DataNode Heap Size")),
        Some(&json!(2048))
    );
    assert_eq!(created.boot_from_volume, None);
}

#[tokio::test]
async fn edit_mode_updates_the_given_template() {
    let backend = mock();
    let id = Uuid::new_v4();
    let mut wf = ConfigureClusterTemplate::load(
        ClusterTemplateWorkflow,
        &backend,
        PluginSelection::new("vanilla", "2.7.1"),
        WorkflowOptions::new(ApiVersion::V2)
            .edit(id)
            .with_initial("general_cluster_template_name", "small"),
    )
    .await
    .expect("workflow should load");
    let name_field = wf
        .step("details")
        .and_then(|s| s.field_by_key("general_cluster_template_name"))
        .expect("name field");
    assert_eq!(name_field.initial_value(), Some(&json!("small")));

    let form = FormData::new()
        .with("general_cluster_template_name", "small-edited")
        .with("ng_forms_ids", "[0]")
        .with("ng_group_name_0", "workers")
        .with("ng_count_0", "3")
        .with("ng_template_id_0", "0b8e9c5a-2b1f-4a83-9d0d-3c2a1e5f7b64");
    let updated = wf.submit(&form, &backend).await.expect("update should succeed");
    assert_eq!(updated.id, id);
    assert_eq!(updated.node_groups.len(), 1);
    assert_eq!(updated.node_groups[0].count, 3);
    assert_eq!(
        wf.success_message().as_deref(),
        Some("Updated Cluster Template small-edited")
    );

    let calls = backend.calls();
    assert!(matches!(
        calls.last(),
        Some(RecordedCall::UpdateClusterTemplate(called, _)) if *called == id
    ));
}

#[tokio::test]
async fn cluster_template_with_shares_and_copied_node_group() {
    let backend = mock();
    let mut wf = ConfigureClusterTemplate::load(
        ClusterTemplateWorkflow,
        &backend,
        PluginSelection::new("vanilla", "2.7.1"),
        WorkflowOptions::new(ApiVersion::V2)
            .with_shares(vec![Choice::new("8a1c2f3e", "datasets")]),
    )
    .await
    .expect("workflow should load");
    assert_eq!(wf.step_slugs(), vec!["details", "node_groups", "shares"]);

    // base64 of {"flavor_id": "2"}
    let form = FormData::new()
        .with("general_cluster_template_name", "shared")
        .with("ng_forms_ids", "[1]")
        .with("ng_group_name_1", "workers")
        .with("ng_count_1", "2")
        .with("ng_template_id_1", "None")
        .with("ng_serialized_1", "eyJmbGF2b3JfaWQiOiAiMiJ9")
        .with("shares_0", "8a1c2f3e")
        .with("shares_1", "/mnt/datasets")
        .with("shares_2", "ro");
    let created = wf.submit(&form, &backend).await.expect("submit should succeed");
    assert_eq!(created.node_groups[0].extra.get("flavor_id"), Some(&json!("2")));
    assert_eq!(created.shares.len(), 1);
    assert_eq!(created.shares[0].id, "8a1c2f3e");
    assert_eq!(created.shares[0].access_level, "ro");
}

#[tokio::test]
async fn node_group_template_sends_selected_shares() {
    let backend = mock();
    let mut wf = ConfigureNodegroupTemplate::load(
        NodeGroupTemplateWorkflow,
        &backend,
        PluginSelection::new("vanilla", "2.7.1"),
        WorkflowOptions::new(ApiVersion::V2)
            .with_shares(vec![Choice::new("8a1c2f3e", "datasets")]),
    )
    .await
    .expect("workflow should load");
    assert_eq!(wf.step_slugs(), vec!["details", "processes", "security", "shares"]);

    let form = FormData::new()
        .with("general_nodegroup_name", "compute")
        .with("general_flavor", "2")
        .with("general_storage", "ephemeral_drive")
        .with("general_processes", "YARN:nodemanager")
        .with("shares_0", "8a1c2f3e");
    let created = wf.submit(&form, &backend).await.expect("submit should succeed");
    assert_eq!(created.shares.len(), 1);
    assert_eq!(created.shares[0].path, None);
    assert_eq!(created.shares[0].access_level, "rw");
}

#[test]
fn service_named_like_a_fixed_step_is_reported() {
    let mut details = fixtures::vanilla_details();
    details
        .node_processes
        .insert("security".to_string(), vec!["keyserver".to_string()]);
    details.configs.push(ConfigDescriptor {
        name: "kdc.port".into(),
        description: None,
        is_optional: true,
        default_value: Some(json!(88)),
        config_type: "int".into(),
        config_values: None,
        priority: None,
        scope: "node".into(),
        applicable_target: "security".into(),
    });

    let err = ConfigureNodegroupTemplate::from_details(
        NodeGroupTemplateWorkflow,
        PluginSelection::new("vanilla", "2.7.1"),
        &details,
        WorkflowOptions::new(ApiVersion::V2),
    )
    .unwrap_err();
    assert_eq!(err.issues[0].code, WorkflowBuildIssueCode::StepSlugConflict);
}

#[test]
fn copied_configs_become_initial_values() {
    let copied = BTreeMap::from([(
        "HDFS".to_string(),
        BTreeMap::from([("dfs.replication".to_string(), json!(5))]),
    )]);
    let wf = ConfigureClusterTemplate::from_details(
        ClusterTemplateWorkflow,
        hdp(),
        &fixtures::hdp_details(),
        WorkflowOptions::new(ApiVersion::V2).copy_configs(copied),
    )
    .expect("workflow should build");
    let view = serde_json::to_value(wf.view()).unwrap();
    let hdfs = &view["steps"][2];
    assert_eq!(hdfs["slug"], json!("HDFS"));
    assert_eq!(hdfs["fields"][0]["initial"], json!(5));
    assert_eq!(hdfs["fields"][0]["placeholder"], json!(3));
}

#[test]
fn unsupported_types_are_skipped_or_rejected() {
    let mut details = fixtures::hdp_details();
    details.configs.push(ConfigDescriptor {
        name: "hdfs.topology".into(),
        description: None,
        is_optional: true,
        default_value: None,
        config_type: "topology_map".into(),
        config_values: None,
        priority: None,
        scope: "cluster".into(),
        applicable_target: "general".into(),
    });

    let lenient = ConfigureClusterTemplate::from_details(
        ClusterTemplateWorkflow,
        hdp(),
        &details,
        WorkflowOptions::new(ApiVersion::V2),
    )
    .expect("lenient build should succeed");
    assert_eq!(lenient.skipped_parameters().len(), 1);
    assert_eq!(lenient.skipped_parameters()[0].config_type, "topology_map");
    assert!(lenient.step("general").is_none());

    let err = ConfigureClusterTemplate::from_details(
        ClusterTemplateWorkflow,
        hdp(),
        &details,
        WorkflowOptions::new(ApiVersion::V2).strict(true),
    )
    .unwrap_err();
    assert_eq!(err.issues[0].code, WorkflowBuildIssueCode::UnsupportedParameterType);
}

#[test]
fn parallel_constructions_share_nothing() {
    let vanilla = fixtures::vanilla_details();
    let hdp_details = fixtures::hdp_details();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (selection, details) = if i % 2 == 0 {
                    (PluginSelection::new("vanilla", "2.7.1"), &vanilla)
                } else {
                    (hdp(), &hdp_details)
                };
                scope.spawn(move || {
                    let wf = ConfigureClusterTemplate::from_details(
                        ClusterTemplateWorkflow,
                        selection,
                        details,
                        WorkflowOptions::default(),
                    )
                    .expect("workflow should build");
                    let slugs: Vec<String> =
                        wf.step_slugs().into_iter().map(str::to_string).collect();
                    (i, slugs)
                })
            })
            .collect();
        for handle in handles {
            let (i, slugs) = handle.join().expect("thread should not panic");
            if i % 2 == 0 {
                assert_eq!(slugs, vec!["details", "node_groups"]);
            } else {
                assert_eq!(slugs, vec!["details", "node_groups", "HDFS"]);
            }
        }
    });
}
