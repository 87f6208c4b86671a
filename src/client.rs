use std::{sync::Arc, time::Duration};

use reqwest::{header::ACCEPT, Method};
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
pub struct Config {
    /// Service endpoint, e.g. `http://controller:8386`.
    pub base_url: Option<String>,
    /// Keystone token sent as `X-Auth-Token`.
    pub auth_token: Option<String>,
    /// Project scope; required by API version 1.1.
    pub project_id: Option<String>,
    /// API version (defaults to 1.1).
    pub api_version: Option<ApiVersion>,
    pub client_header: Option<String>,
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Default extra headers applied to all requests.
    pub default_headers: Option<HeaderList>,
    /// Page size for listings (defaults to 15).
    pub page_size: Option<u32>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

struct ClientInner {
    endpoints: Endpoints,
    auth_token: String,
    client_header: String,
    http: reqwest::Client,
    request_timeout: Duration,
    default_headers: Option<HeaderList>,
    page_size: u32,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let base_url = cfg
            .base_url
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
        let auth_token = cfg
            .auth_token
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("auth token is required".to_string()))?;
        let api = cfg.api_version.unwrap_or_default();
        let endpoints = Endpoints::new(&base_url, api, cfg.project_id.as_deref())?;

        let connect_timeout = cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http = match cfg.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
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

    pub fn plugins(&self) -> PluginsClient {
        PluginsClient {
            inner: self.inner.clone(),
            options: RequestOptions::default(),
        }
    }

    pub fn cluster_templates(&self) -> ClusterTemplatesClient {
        ClusterTemplatesClient {
            inner: self.inner.clone(),
            options: RequestOptions::default(),
        }
    }

    pub fn node_group_templates(&self) -> NodeGroupTemplatesClient {
        NodeGroupTemplatesClient {
            inner: self.inner.clone(),
            options: RequestOptions::default(),
        }
    }
}

#[derive(Clone)]
pub struct PluginsClient {
    inner: Arc<ClientInner>,
    options: RequestOptions,
}

impl PluginsClient {
    /// Applies per-call overrides to every request made through this handle.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn list(&self) -> Result<Vec<Plugin>> {
        let path = self.inner.endpoints.path(PLUGINS);
        self.inner
            .get_json(&path, &[], &self.options, "plugins")
            .await
    }

    pub async fn get(&self, name: &PluginName) -> Result<Plugin> {
        if name.is_empty() {
            return Err(Error::Config("plugin name is required".into()));
        }
        let path = self.inner.endpoints.path(&format!("{PLUGINS}/{name}"));
        self.inner.get_json(&path, &[], &self.options, "plugin").await
    }

    /// Configuration schema and node processes for one plugin version.
    pub async fn version_details(
        &self,
        name: &PluginName,
        version: &PluginVersion,
    ) -> Result<PluginVersionDetails> {
        let path = self
            .inner
            .endpoints
            .path(&plugin_version_path(name.as_str(), version.as_str())?);
        self.inner.get_json(&path, &[], &self.options, "plugin").await
    }
}

#[derive(Clone)]
pub struct ClusterTemplatesClient {
    inner: Arc<ClientInner>,
    options: RequestOptions,
}

impl ClusterTemplatesClient {
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn list(&self, options: ListOptions) -> Result<Page<ClusterTemplate>> {
        let path = self.inner.endpoints.path(CLUSTER_TEMPLATES);
        let query = list_query(&options, self.inner.page_size);
        self.inner
            .get_page(&path, &query, &self.options, "cluster_templates")
            .await
    }

    pub async fn find(&self, filter: &TemplateFilter) -> Result<Vec<ClusterTemplate>> {
        let path = self.inner.endpoints.path(CLUSTER_TEMPLATES);
        let query = filter_query(filter, self.inner.endpoints.api());
        let page: Page<ClusterTemplate> = self
            .inner
            .get_page(&path, &query, &self.options, "cluster_templates")
            .await?;
        Ok(page.items)
    }

    pub async fn get(&self, id: Uuid) -> Result<ClusterTemplate> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner
            .get_json(&path, &[], &self.options, "cluster_template")
            .await
    }

    pub async fn create(&self, req: &ClusterTemplateRequest) -> Result<ClusterTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self.inner.endpoints.path(CLUSTER_TEMPLATES);
        self.inner
            .send_json(Method::POST, &path, body, &self.options, "cluster_template")
            .await
    }

    pub async fn update(&self, id: Uuid, req: &ClusterTemplateRequest) -> Result<ClusterTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner
            .send_json(self.inner.update_method(), &path, body, &self.options, "cluster_template")
            .await
    }

    pub async fn update_acl(&self, id: Uuid, update: AclUpdate) -> Result<ClusterTemplate> {
        update.validate()?;
        let body = serde_json::to_value(update)?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner
            .send_json(self.inner.update_method(), &path, body, &self.options, "cluster_template")
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(CLUSTER_TEMPLATES, id)?);
        self.inner.delete(&path, &self.options).await
    }
}

#[derive(Clone)]
pub struct NodeGroupTemplatesClient {
    inner: Arc<ClientInner>,
    options: RequestOptions,
}

impl NodeGroupTemplatesClient {
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn list(&self, options: ListOptions) -> Result<Page<NodeGroupTemplate>> {
        let path = self.inner.endpoints.path(NODE_GROUP_TEMPLATES);
        let query = list_query(&options, self.inner.page_size);
        self.inner
            .get_page(&path, &query, &self.options, "node_group_templates")
            .await
    }

    pub async fn find(&self, filter: &TemplateFilter) -> Result<Vec<NodeGroupTemplate>> {
        let path = self.inner.endpoints.path(NODE_GROUP_TEMPLATES);
        let query = filter_query(filter, self.inner.endpoints.api());
        let page: Page<NodeGroupTemplate> = self
            .inner
            .get_page(&path, &query, &self.options, "node_group_templates")
            .await?;
        Ok(page.items)
    }

    pub async fn get(&self, id: Uuid) -> Result<NodeGroupTemplate> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner
            .get_json(&path, &[], &self.options, "node_group_template")
            .await
    }

    pub async fn create(&self, req: &NodeGroupTemplateRequest) -> Result<NodeGroupTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self.inner.endpoints.path(NODE_GROUP_TEMPLATES);
        self.inner
            .send_json(Method::POST, &path, body, &self.options, "node_group_template")
            .await
    }

    pub async fn update(
        &self,
        id: Uuid,
        req: &NodeGroupTemplateRequest,
    ) -> Result<NodeGroupTemplate> {
        req.validate()?;
        let body = versioned_payload(req, self.inner.endpoints.api())?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner
            .send_json(self.inner.update_method(), &path, body, &self.options, "node_group_template")
            .await
    }

    pub async fn update_acl(&self, id: Uuid, update: AclUpdate) -> Result<NodeGroupTemplate> {
        update.validate()?;
        let body = serde_json::to_value(update)?;
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner
            .send_json(self.inner.update_method(), &path, body, &self.options, "node_group_template")
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let path = self
            .inner
            .endpoints
            .path(&resource_path(NODE_GROUP_TEMPLATES, id)?);
        self.inner.delete(&path, &self.options).await
    }
}

impl ClientInner {
    /// v1.1 replaces templates with PUT; v2 patches them.
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
    ) -> Result<reqwest::RequestBuilder> {
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

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &RequestOptions,
        key: &str,
    ) -> Result<T> {
        let builder = self.request(Method::GET, path, query, options)?;
        let bytes = self.send(builder, &Method::GET, path).await?;
        unwrap_envelope(&bytes, key)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &RequestOptions,
        key: &str,
    ) -> Result<Page<T>> {
        let builder = self.request(Method::GET, path, query, options)?;
        let bytes = self.send(builder, &Method::GET, path).await?;
        unwrap_page(&bytes, key)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
        options: &RequestOptions,
        key: &str,
    ) -> Result<T> {
        let builder = self.request(method.clone(), path, &[], options)?.json(&body);
        let bytes = self.send(builder, &method, path).await?;
        unwrap_envelope(&bytes, key)
    }

    async fn delete(&self, path: &str, options: &RequestOptions) -> Result<()> {
        let builder = self.request(Method::DELETE, path, &[], options)?;
        self.send(builder, &Method::DELETE, path).await.map(|_| ())
    }

    /// Sends once and returns the success body. Failures are not retried.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        method: &Method,
        path: &str,
    ) -> Result<Vec<u8>> {
        #[cfg(feature = "tracing")]
        let start = std::time::Instant::now();
        let fut = builder.send();
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::debug_span!("sahara.http", method = %method, path = %path))
        };
        #[cfg(not(feature = "tracing"))]
        let _ = (method, path);

        match fut.await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        status = %status,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    let bytes = resp.bytes().await.map_err(TransportError::from_reqwest)?;
                    return Ok(bytes.to_vec());
                }
                let headers = resp.headers().clone();
                #[cfg(feature = "tracing")]
                tracing::warn!(status = %status, method = %method, path = %path, "request failed");
                let body = resp.text().await.unwrap_or_default();
                Err(parse_api_error_parts(status, &headers, body))
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, method = %method, path = %path, "transport error");
                Err(TransportError::from_reqwest(err).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_token_and_base_url() {
        let missing_token = Client::new(Config {
            base_url: Some("http://sahara:8386".into()),
            api_version: Some(ApiVersion::V2),
            ..Default::default()
        });
        assert!(matches!(missing_token, Err(Error::Config(_))));

        let missing_base = Client::new(Config {
            auth_token: Some("tok".into()),
            api_version: Some(ApiVersion::V2),
            ..Default::default()
        });
        assert!(matches!(missing_base, Err(Error::Config(_))));
    }

    #[test]
    fn legacy_api_requires_project() {
        let result = Client::new(Config {
            base_url: Some("http://sahara:8386".into()),
            auth_token: Some("tok".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn defaults_to_legacy_api() {
        let client = Client::new(Config {
            base_url: Some("http://sahara:8386".into()),
            auth_token: Some("tok".into()),
            project_id: Some("p1".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.api_version(), ApiVersion::V1_1);
    }
}
