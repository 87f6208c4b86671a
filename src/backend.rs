//! The service operations the configuration workflows depend on.
//!
//! Workflows talk to the service through [`DataProcessingBackend`] so they can
//! run against the HTTP [`Client`](crate::Client) or an in-memory double.

use std::{future::Future, pin::Pin};

use uuid::Uuid;

use crate::errors::Result;
use crate::identifiers::{PluginName, PluginVersion};
use crate::types::{
    ClusterTemplate, ClusterTemplateRequest, NodeGroupTemplate, NodeGroupTemplateRequest,
    PluginVersionDetails,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait DataProcessingBackend: Send + Sync {
    fn plugin_version_details<'a>(
        &'a self,
        plugin: &'a PluginName,
        version: &'a PluginVersion,
    ) -> BoxFuture<'a, Result<PluginVersionDetails>>;

    fn create_cluster_template<'a>(
        &'a self,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>>;

    fn update_cluster_template<'a>(
        &'a self,
        id: Uuid,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>>;

    fn create_node_group_template<'a>(
        &'a self,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>>;

    fn update_node_group_template<'a>(
        &'a self,
        id: Uuid,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>>;
}

#[cfg(feature = "client")]
impl DataProcessingBackend for crate::client::Client {
    fn plugin_version_details<'a>(
        &'a self,
        plugin: &'a PluginName,
        version: &'a PluginVersion,
    ) -> BoxFuture<'a, Result<PluginVersionDetails>> {
        Box::pin(async move { self.plugins().version_details(plugin, version).await })
    }

    fn create_cluster_template<'a>(
        &'a self,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>> {
        Box::pin(async move { self.cluster_templates().create(request).await })
    }

    fn update_cluster_template<'a>(
        &'a self,
        id: Uuid,
        request: &'a ClusterTemplateRequest,
    ) -> BoxFuture<'a, Result<ClusterTemplate>> {
        Box::pin(async move { self.cluster_templates().update(id, request).await })
    }

    fn create_node_group_template<'a>(
        &'a self,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>> {
        Box::pin(async move { self.node_group_templates().create(request).await })
    }

    fn update_node_group_template<'a>(
        &'a self,
        id: Uuid,
        request: &'a NodeGroupTemplateRequest,
    ) -> BoxFuture<'a, Result<NodeGroupTemplate>> {
        Box::pin(async move { self.node_group_templates().update(id, request).await })
    }
}
