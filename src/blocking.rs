use std::{sync::Arc, time::Duration};

use reqwest::{
    blocking::{Client as HttpClient, RequestBuilder},
    header::ACCEPT,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    compat::{filter_query, versioned_payload, ApiVersion},
    core::{
        list_query, plugin_version_path, resource_path, unwrap_envelope, unwrap_page, Endpoints,
        CLUSTER_TEMPLATES, NODE_GROUP_TEMPLATES, PLUGINS,
    },
    errors::{Error, Result, TransportError, TransportErrorKind},
    http::{apply_header_list, parse_api_error_parts, HeaderList, RequestOptions},
    identifiers::{PluginName, PluginVersion},
    types::{
        AclUpdate, ClusterTemplate, ClusterTemplateRequest, ListOptions, NodeGroupTemplate,
        NodeGroupTemplateRequest, Page, Plugin, PluginVersionDetails, TemplateFilter,
    },
    AUTH_TOKEN_HEADER, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT, REQUEST_ID_HEADER,
};

#[derive(Clone, Debug, Default)]
pub struct BlockingConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub project_id: Option<String>,
    pub api_version: Option<ApiVersion>,
    pub client_header: Option<String>,
    pub http_client: Option<HttpClient>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    pub default_headers: Option<HeaderList>,
    pub page_size: Option<u32>,
}

#[derive(Clone)]
pub struct BlockingClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    endpoints: Endpoints,
    auth_token: String,
    client_header: String,
    http: HttpClient,
    request_timeout: Duration,
    default_headers: Option<HeaderList>,
    page_size: u32,
}

impl BlockingClient {
    pub fn new(cfg: BlockingConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
        let auth_token = cfg
            .auth_token
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("auth token is required".to_string()))?;
        let endpoints = Endpoints::new(
            &base_url,
            cfg.api_version.unwrap_or_default(),
            cfg.project_id.as_deref(),
        )?;

        let connect_timeout = cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http = match cfg.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|err| TransportError {
                    kind: TransportErrorKind::Connect,
                    message: "failed to build http client".to_string(),
                    source: Some(err),
                })?,
        };

        let client_header = cfg
            .client_header
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string());

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoints,
                auth_token,
                client_header,
                http,
                request_timeout,
                default_headers: cfg.default_headers,
                page_size: cfg.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE),
            }),
        })
    }

    pub fn api_version(&self) -> ApiVersion {
        self.inner.endpoints.api()
    }

    pub fn plugins(&self) -> BlockingPluginsClient {
        BlockingPluginsClient {
            inner: self.inner.clone(),
            options: RequestOptions::default(),
        }
    }

    pub fn cluster_templates(&self) -> BlockingClusterTemplatesClient {
        BlockingClusterTemplatesClient {
            inner: self.inner.clone(),
            options: RequestOptions::default(),
        }
    }

    pub fn node_group_templates(&self) -> BlockingNodeGroupTemplatesClient {
        BlockingNodeGroupTemplatesClient {
            inner: self.inner.clone(),
            options: RequestOptions::default(),
        }
    }
}

#[derive(Clone)]
pub struct BlockingPluginsClient {
    inner: Arc<ClientInner>,
    options: RequestOptions,
}

impl BlockingPluginsClient {
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn list(&self) -> Result<Vec<Plugin>> {
        let path = self.inner.endpoints.path(PLUGINS);
        self.inner.get_json(&path, &[], &self.options, "plugins")
    }

    pub fn get(&self, name: &PluginName) -> Result<Plugin> {
        if name.is_empty() {
            return Err(Error::Config("plugin name is required".into()));
        }
        let path = self.inner.endpoints.path(&format!("{PLUGINS}/{name}"));
        self.inner.get_json(&path, &[], &self.options, "plugin")
    }

    pub fn version_details(
        &self,
        name: &PluginName,
        version: &PluginVersion,
    ) -> Result<PluginVersionDetails> {
        let path = self
            .inner
            .endpoints
            .path(&plugin_version_path(name.as_str(), version.as_str())?);
        self.inner.get_json(&path, &[], &self.options, "plugin")
    }
}

#[derive(Clone)]
pub struct BlockingClusterTemplatesClient {
    inner: Arc<ClientInner>,
    options: RequestOptions,
}

impl BlockingClusterTemplatesClient {
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn list(&self, options: ListOptions) -> Result<Page<ClusterTemplate>> {
        let path = self.inner.endpoints.path(CLUSTER_TEMPLATES);
        let query = list_query(&options, self.inner.page_size);
        self.inner
            .get_page(&path, &query, &self.options, "cluster_templates")
    }

    pub fn find(&self, filter: &TemplateFilter) -> Result<Vec<ClusterTemplate>> {
        let path = self.inner.endpoints.path(CLUSTER_TEMPLATES);
        let query = filter_query(filter, self.inner.endpoints.api());
        self.inner
            .get_page(&path, &query, &self.options, "cluster_templates")
            .map(|page| page.items)
    }

    pub fn get(&self, id: Uuid) -> Result<ClusterTemplate> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner
            .get_json(&path, &[], &self.options, "cluster_template")
    }

    pub fn create(&self, req: &ClusterTemplateRequest) -> Result<ClusterTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self.inner.endpoints.path(CLUSTER_TEMPLATES);
        self.inner
            .send_json(Method::POST, &path, body, &self.options, "cluster_template")
    }

    pub fn update(&self, id: Uuid, req: &ClusterTemplateRequest) -> Result<ClusterTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner.send_json(
            self.inner.update_method(),
            &path,
            body,
            &self.options,
            "cluster_template",
        )
    }

    pub fn update_acl(&self, id: Uuid, update: AclUpdate) -> Result<ClusterTemplate> {
        update.validate()?;
        let body = serde_json::to_value(update)?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner.send_json(
            self.inner.update_method(),
            &path,
            body,
            &self.options,
            "cluster_template",
        )
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner.delete(&path, &self.options)
    }
}

#[derive(Clone)]
pub struct BlockingNodeGroupTemplatesClient {
    inner: Arc<ClientInner>,
    options: RequestOptions,
}

impl BlockingNodeGroupTemplatesClient {
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn list(&self, options: ListOptions) -> Result<Page<NodeGroupTemplate>> {
        let path = self.inner.endpoints.path(NODE_GROUP_TEMPLATES);
        let query = list_query(&options, self.inner.page_size);
        self.inner
            .get_page(&path, &query, &self.options, "node_group_templates")
    }

    pub fn find(&self, filter: &TemplateFilter) -> Result<Vec<NodeGroupTemplate>> {
        let path = self.inner.endpoints.path(NODE_GROUP_TEMPLATES);
        let query = filter_query(filter, self.inner.endpoints.api());
        self.inner
            .get_page(&path, &query, &self.options, "node_group_templates")
            .map(|page| page.items)
    }

    pub fn get(&self, id: Uuid) -> Result<NodeGroupTemplate> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner
            .get_json(&path, &[], &self.options, "node_group_template")
    }

    pub fn create(&self, req: &NodeGroupTemplateRequest) -> Result<NodeGroupTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self.inner.endpoints.path(NODE_GROUP_TEMPLATES);
        self.inner
            .send_json(Method::POST, &path, body, &self.options, "node_group_template")
    }

    pub fn update(&self, id: Uuid, req: &NodeGroupTemplateRequest) -> Result<NodeGroupTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner.send_json(
            self.inner.update_method(),
            &path,
            body,
            &self.options,
            "node_group_template",
        )
    }

    pub fn update_acl(&self, id: Uuid, update: AclUpdate) -> Result<NodeGroupTemplate> {
        update.validate()?;
        let body = serde_json::to_value(update)?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner.send_json(
            self.inner.update_method(),
            &path,
            body,
            &self.options,
            "node_group_template",
        )
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner.delete(&path, &self.options)
    }
}

impl ClientInner {
    fn update_method(&self) -> Method {
        match self.endpoints.api() {
            ApiVersion::V1_1 => Method::PUT,
            ApiVersion::V2 => Method::PATCH,
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        options: &RequestOptions,
    ) -> Result<RequestBuilder> {
        let url = self.endpoints.url(path, query)?;
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(AUTH_TOKEN_HEADER, self.auth_token.as_str())
            .header("User-Agent", self.client_header.as_str());
        if let Some(req_id) = options.request_id.as_deref() {
            if !req_id.trim().is_empty() {
                builder = builder.header(REQUEST_ID_HEADER, req_id);
            }
        }
        if let Some(defaults) = &self.default_headers {
            builder = apply_header_list(builder, defaults)?;
        }
        builder = apply_header_list(builder, &options.headers)?;
        Ok(builder.timeout(options.timeout.unwrap_or(self.request_timeout)))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &RequestOptions,
        key: &str,
    ) -> Result<T> {
        let builder = self.request(Method::GET, path, query, options)?;
        let bytes = self.send(builder, &Method::GET, path)?;
        unwrap_envelope(&bytes, key)
    }

    fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &RequestOptions,
        key: &str,
    ) -> Result<Page<T>> {
        let builder = self.request(Method::GET, path, query, options)?;
        let bytes = self.send(builder, &Method::GET, path)?;
        unwrap_page(&bytes, key)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
        options: &RequestOptions,
        key: &str,
    ) -> Result<T> {
        let builder = self.request(method.clone(), path, &[], options)?.json(&body);
        let bytes = self.send(builder, &method, path)?;
        unwrap_envelope(&bytes, key)
    }

    fn delete(&self, path: &str, options: &RequestOptions) -> Result<()> {
        let builder = self.request(Method::DELETE, path, &[], options)?;
        self.send(builder, &Method::DELETE, path).map(|_| ())
    }

    fn send(&self, builder: RequestBuilder, method: &Method, path: &str) -> Result<Vec<u8>> {
        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!("sahara.http", method = %method, path = %path);
        #[cfg(feature = "tracing")]
        let _guard = span.enter();
        #[cfg(feature = "tracing")]
        let start = std::time::Instant::now();
        #[cfg(not(feature = "tracing"))]
        let _ = (method, path);

        match builder.send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        status = %status,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    let bytes = resp.bytes().map_err(TransportError::from_reqwest)?;
                    return Ok(bytes.to_vec());
                }
                let headers = resp.headers().clone();
                #[cfg(feature = "tracing")]
                tracing::warn!(status = %status, "request failed");
                let body = resp.text().unwrap_or_default();
                Err(parse_api_error_parts(status, &headers, body))
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "transport error");
                Err(TransportError::from_reqwest(err).into())
            }
        }
    }
}
