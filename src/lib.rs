//! Typed client and plugin-driven configuration workflows for the Sahara
//! data-processing API.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::result_large_err)]

/// Default User-Agent header value.
pub const DEFAULT_CLIENT_HEADER: &str =
    concat!("sahara-dashboard-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Page size used by list calls that do not set a limit.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// HTTP header carrying the service request id.
pub const REQUEST_ID_HEADER: &str = "x-openstack-request-id";

/// HTTP header carrying the Keystone token.
#[cfg(any(feature = "client", feature = "blocking"))]
pub(crate) const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

mod backend;
#[cfg(feature = "blocking")]
mod blocking;
#[cfg(feature = "client")]
mod client;
pub mod compat;
#[cfg(any(feature = "client", feature = "blocking"))]
mod core;
mod errors;
#[cfg(any(feature = "client", feature = "blocking"))]
mod http;
mod identifiers;
#[cfg(any(test, feature = "mock"))]
mod mock;
pub mod plugins;
mod types;
pub mod workflow;

pub use backend::{BoxFuture, DataProcessingBackend};
#[cfg(feature = "blocking")]
pub use blocking::{
    BlockingClient, BlockingClusterTemplatesClient, BlockingConfig,
    BlockingNodeGroupTemplatesClient, BlockingPluginsClient,
};
#[cfg(feature = "client")]
pub use client::{Client, ClusterTemplatesClient, Config, NodeGroupTemplatesClient, PluginsClient};
pub use compat::{ApiVersion, VersionedRequest};
pub use errors::{APIError, Error, NotFoundExt, Result, ValidationError};
#[cfg(any(feature = "client", feature = "blocking"))]
pub use errors::{TransportError, TransportErrorKind};
#[cfg(any(feature = "client", feature = "blocking"))]
pub use http::{HeaderEntry, HeaderList, RequestOptions};
pub use identifiers::{PluginName, PluginVersion, ServiceName};
#[cfg(any(test, feature = "mock"))]
pub use mock::{fixtures, MockClient, MockConfig, RecordedCall};
pub use plugins::PluginSelection;
pub use types::{
    AclUpdate, ClusterTemplate, ClusterTemplateRequest, ConfigDescriptor, ConfigsPayload, Label,
    Labels, ListOptions, NodeGroup, NodeGroupTemplate, NodeGroupTemplateRequest, Page, Plugin,
    PluginVersionDetails, Share, TemplateFilter,
};
pub use workflow::{
    ClusterTemplateWorkflow, ConfigureClusterTemplate, ConfigureNodegroupTemplate, FormData,
    NodeGroupTemplateWorkflow, WorkflowError, WorkflowOptions,
};
