//! Shared runtime-agnostic logic for async and blocking clients.
//!
//! Both clients build the same URLs and unwrap the same response envelopes;
//! only the transport differs.

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::compat::ApiVersion;
use crate::errors::{Error, Result, ValidationError};
use crate::types::{ListOptions, Page};

/// Resolved endpoint layout for one client.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    base: String,
    prefix: String,
    api: ApiVersion,
}

impl Endpoints {
    pub(crate) fn new(base_url: &str, api: ApiVersion, project_id: Option<&str>) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(Error::Config("base_url is required".into()));
        }
        reqwest::Url::parse(&base).map_err(|err| Error::Config(format!("invalid base url: {err}")))?;
        Ok(Self {
            base,
            prefix: api.path_prefix(project_id)?,
            api,
        })
    }

    pub(crate) fn api(&self) -> ApiVersion {
        self.api
    }

    /// Path of `resource` under the API prefix, e.g. `/v2/cluster-templates`.
    pub(crate) fn path(&self, resource: &str) -> String {
        format!("{}/{}", self.prefix, resource.trim_start_matches('/'))
    }

    pub(crate) fn url(&self, path: &str, query: &[(String, String)]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base, path))
            .map_err(|err| Error::Config(format!("invalid path: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

pub(crate) const PLUGINS: &str = "plugins";
pub(crate) const CLUSTER_TEMPLATES: &str = "cluster-templates";
pub(crate) const NODE_GROUP_TEMPLATES: &str = "node-group-templates";

pub(crate) fn resource_path(collection: &str, id: Uuid) -> Result<String> {
    if id.is_nil() {
        return Err(Error::Validation(
            ValidationError::new("id is required").with_field("id"),
        ));
    }
    Ok(format!("{collection}/{id}"))
}

pub(crate) fn plugin_version_path(plugin: &str, version: &str) -> Result<String> {
    if plugin.trim().is_empty() || version.trim().is_empty() {
        return Err(Error::Validation(ValidationError::new(
            "plugin name and version are required",
        )));
    }
    Ok(format!("{PLUGINS}/{plugin}/{version}"))
}

pub(crate) fn list_query(options: &ListOptions, default_limit: u32) -> Vec<(String, String)> {
    let mut pairs = vec![(
        "limit".to_string(),
        options.limit.unwrap_or(default_limit).to_string(),
    )];
    if let Some(marker) = options.marker.as_deref().filter(|m| !m.is_empty()) {
        pairs.push(("marker".to_string(), marker.to_string()));
    }
    pairs
}

/// Reads `body[key]` as `T`.
pub(crate) fn unwrap_envelope<T: DeserializeOwned>(bytes: &[u8], key: &str) -> Result<T> {
    let mut value: Value = serde_json::from_slice(bytes)?;
    let inner = value.get_mut(key).map(Value::take).ok_or_else(|| {
        Error::Validation(ValidationError::new(format!(
            "response is missing the `{key}` field"
        )))
    })?;
    Ok(serde_json::from_value(inner)?)
}

/// Reads `body[key]` as a list plus the optional `markers` object.
pub(crate) fn unwrap_page<T: DeserializeOwned>(bytes: &[u8], key: &str) -> Result<Page<T>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let items = match value.get(key) {
        Some(list) => serde_json::from_value(list.clone())?,
        None => Vec::new(),
    };
    let marker = |name: &str| {
        value
            .get("markers")
            .and_then(|m| m.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(Page {
        items,
        next_marker: marker("next"),
        prev_marker: marker("prev"),
    })
}
