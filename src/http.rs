use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    StatusCode,
};

use crate::{
    errors::{APIError, Error, Result},
    REQUEST_ID_HEADER,
};

/// Per-call overrides.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub request_id: Option<String>,
    pub headers: HeaderList,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(key.into(), value.into()));
        self
    }

    /// Override the overall request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Structured header list with validation.
#[derive(Clone, Debug, Default)]
pub struct HeaderList(Vec<HeaderEntry>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a header entry.
    ///
    /// # Panics
    /// Panics if the header key or value is empty or contains only whitespace.
    pub fn push(&mut self, entry: HeaderEntry) {
        assert!(
            entry.is_valid(),
            "Invalid header: key and value must be non-empty (got key={:?}, value={:?})",
            entry.key,
            entry.value
        );
        self.0.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.0.iter()
    }
}

#[derive(Clone, Debug)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: String, value: String) -> Self {
        Self { key, value }
    }

    pub fn is_valid(&self) -> bool {
        !(self.key.trim().is_empty() || self.value.trim().is_empty())
    }
}

/// Request builders that accept headers (async and blocking).
pub(crate) trait HeaderTarget: Sized {
    fn set_header(self, name: HeaderName, value: HeaderValue) -> Self;
}

impl HeaderTarget for reqwest::RequestBuilder {
    fn set_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.header(name, value)
    }
}

#[cfg(feature = "blocking")]
impl HeaderTarget for reqwest::blocking::RequestBuilder {
    fn set_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.header(name, value)
    }
}

pub(crate) fn apply_header_list<B: HeaderTarget>(mut builder: B, headers: &HeaderList) -> Result<B> {
    for entry in headers.iter() {
        if !entry.is_valid() {
            continue;
        }
        let name = HeaderName::from_bytes(entry.key.trim().as_bytes())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        let val = HeaderValue::from_str(entry.value.trim())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        builder = builder.set_header(name, val);
    }
    Ok(builder)
}

pub(crate) fn request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    for name in [REQUEST_ID_HEADER, "X-Request-Id"] {
        if let Some(value) = headers.get(name) {
            if let Ok(s) = value.to_str() {
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

pub(crate) fn parse_api_error_parts(status: StatusCode, headers: &HeaderMap, body: String) -> Error {
    let request_id = request_id_from_headers(headers);
    let status_code = status.as_u16();
    let status_text = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();

    if body.trim().is_empty() {
        return APIError {
            status: status_code,
            code: None,
            message: status_text,
            request_id,
            raw_body: None,
        }
        .into();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        // Some deployments wrap the envelope in {"error": {...}}.
        let envelope = value
            .get("error")
            .filter(|v| v.is_object())
            .unwrap_or(&value);

        let message = envelope
            .get("error_message")
            .or_else(|| envelope.get("message"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        if let Some(message) = message {
            let code = envelope
                .get("error_name")
                .or_else(|| envelope.get("code").filter(|v| v.is_string()))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let status_override = envelope
                .get("error_code")
                .or_else(|| envelope.get("code").filter(|v| v.is_u64()))
                .and_then(|v| v.as_u64())
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(status_code);
            return APIError {
                status: status_override,
                code,
                message,
                request_id,
                raw_body: Some(body.clone()),
            }
            .into();
        }
    }

    APIError {
        status: status_code,
        code: None,
        message: body.clone(),
        request_id,
        raw_body: Some(body),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(err: Error) -> APIError {
        match err {
            Error::Api(api) => api,
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn parses_service_error_envelope() {
        let body = r#"{"error_code": 409, "error_name": "NAME_ALREADY_EXISTS", "error_message": "Cluster template with name 'ct' already exists"}"#;
        let err = api(parse_api_error_parts(
            StatusCode::CONFLICT,
            &HeaderMap::new(),
            body.to_string(),
        ));
        assert_eq!(err.status, 409);
        assert_eq!(err.code.as_deref(), Some("NAME_ALREADY_EXISTS"));
        assert_eq!(err.message, "Cluster template with name 'ct' already exists");
    }

    #[test]
    fn empty_body_uses_reason_phrase() {
        let err = api(parse_api_error_parts(
            StatusCode::NOT_FOUND,
            &HeaderMap::new(),
            String::new(),
        ));
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "Not Found");
        assert!(err.raw_body.is_none());
    }

    #[test]
    fn plain_text_body_becomes_message() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "req-abc".parse().unwrap());
        let err = api(parse_api_error_parts(
            StatusCode::BAD_GATEWAY,
            &headers,
            "upstream unavailable".to_string(),
        ));
        assert_eq!(err.message, "upstream unavailable");
        assert_eq!(err.request_id.as_deref(), Some("req-abc"));
    }

    #[test]
    fn request_options_collect_headers() {
        let opts = RequestOptions::default()
            .with_request_id("req-1")
            .with_header("X-Trace", "on");
        assert_eq!(opts.request_id.as_deref(), Some("req-1"));
        assert_eq!(opts.headers.iter().count(), 1);
    }

    #[test]
    #[should_panic(expected = "Invalid header")]
    fn header_list_panics_on_empty_key() {
        let mut list = HeaderList::new();
        list.push(HeaderEntry::new("".to_string(), "value".to_string()));
    }

    #[test]
    #[should_panic(expected = "Invalid header")]
    fn header_list_panics_on_whitespace_only() {
        let mut list = HeaderList::new();
        list.push(HeaderEntry::new("   ".to_string(), "value".to_string()));
    }
}
