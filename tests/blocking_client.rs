//! Blocking client tests for template endpoints.

#![cfg(feature = "blocking")]

use sahara_dashboard::{
    ApiVersion, BlockingClient, BlockingConfig, ClusterTemplateRequest, ListOptions, NotFoundExt,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEMPLATE_ID: &str = "6f3c2a8e-1d43-4a4c-8f39-0c1f6f3a9b10";

#[test]
fn blocking_create_and_update_follow_api_version() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime should start");
    let server = rt.block_on(async { MockServer::start().await });

    rt.block_on(async {
        Mock::given(method("POST"))
            .and(path("/v1.1/proj/cluster-templates"))
            .and(header("x-auth-token", "token"))
            .and(body_partial_json(json!({"hadoop_version": "2.7.1"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "cluster_template": {"id": TEMPLATE_ID, "name": "small", "hadoop_version": "2.7.1"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/v1.1/proj/cluster-templates/{TEMPLATE_ID}")))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "cluster_template": {"id": TEMPLATE_ID, "name": "small", "description": "edited"}
            })))
            .expect(1)
            .mount(&server)
            .await;
    });

    let client = BlockingClient::new(BlockingConfig {
        base_url: Some(server.uri()),
        auth_token: Some("token".to_string()),
        project_id: Some("proj".to_string()),
        ..Default::default()
    })
    .expect("client creation should succeed");
    assert_eq!(client.api_version(), ApiVersion::V1_1);

    let req = ClusterTemplateRequest {
        name: "small".into(),
        plugin_name: "vanilla".into(),
        plugin_version: "2.7.1".into(),
        ..Default::default()
    };
    let created = client
        .cluster_templates()
        .create(&req)
        .expect("create should succeed");
    assert_eq!(created.plugin_version.as_str(), "2.7.1");

    let updated = client
        .cluster_templates()
        .update(created.id, &req)
        .expect("update should succeed");
    assert_eq!(updated.description.as_deref(), Some("edited"));
}

#[test]
fn blocking_listing_and_missing_lookup() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime should start");
    let server = rt.block_on(async { MockServer::start().await });

    rt.block_on(async {
        Mock::given(method("GET"))
            .and(path("/v2/node-group-templates"))
            .and(query_param("limit", "15"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "node_group_templates": [{"id": TEMPLATE_ID, "name": "worker"}],
                "markers": {"next": null, "prev": null}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/node-group-templates/{TEMPLATE_ID}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error_code": 404,
                "error_name": "NOT_FOUND",
                "error_message": "NodeGroupTemplate id not found"
            })))
            .mount(&server)
            .await;
    });

    let client = BlockingClient::new(BlockingConfig {
        base_url: Some(server.uri()),
        auth_token: Some("token".to_string()),
        api_version: Some(ApiVersion::V2),
        ..Default::default()
    })
    .expect("client creation should succeed");

    let page = client
        .node_group_templates()
        .list(ListOptions::default())
        .expect("list should succeed");
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more());

    let missing = client
        .node_group_templates()
        .get(TEMPLATE_ID.parse().unwrap())
        .optional()
        .expect("404 should be absorbed");
    assert!(missing.is_none());
}
