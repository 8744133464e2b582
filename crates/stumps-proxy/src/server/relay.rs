//! Upstream relay: forwards an intercepted request to the real host.

use crate::recording::{classify_body, BodyClass, RecordedRequest};
use anyhow::{Context, Result};
use bytes::Bytes;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Shared HTTP client for all relay traffic.
static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(0) // Disable connection pooling to avoid stale connections
            .build()
            .expect("Failed to create HTTP client")
    })
}

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Upstream reply, normalized for the pipeline and the recording buffer.
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    pub status_code: u16,
    pub status_description: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub body_class: BodyClass,
}

/// The absolute URL the relay will request.
pub fn build_target_url(host: &str, secure: bool, path: &str, query: Option<&str>) -> String {
    let scheme = if secure { "https" } else { "http" };
    match query {
        Some(q) => format!("{scheme}://{host}{path}?{q}"),
        None => format!("{scheme}://{host}{path}"),
    }
}

/// Forward a captured request to the upstream host and collect the reply.
///
/// Method, path, query, non-hop-by-hop headers, and the body are carried
/// over. Failures are not retried; the caller maps them to a 502.
pub async fn forward(
    host: &str,
    secure: bool,
    request: &RecordedRequest,
) -> Result<RelayedResponse> {
    let url = build_target_url(host, secure, &request.path, request.query.as_deref());
    debug!("Relaying {} {}", request.method, url);

    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .with_context(|| format!("invalid request method {:?}", request.method))?;

    let mut builder = http_client().request(method, &url);
    for (name, value) in &request.headers {
        if is_hop_by_hop(name)
            || name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("content-length")
        {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }

    let response = builder
        .send()
        .await
        .with_context(|| format!("failed to reach upstream at {url}"))?;

    let status = response.status();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect();

    let content_type = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.clone())
        .unwrap_or_default();

    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read upstream response body from {url}"))?;

    Ok(RelayedResponse {
        status_code: status.as_u16(),
        status_description: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body,
        body_class: classify_body(&content_type),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_detection() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("connection"));
        assert!(is_hop_by_hop("KEEP-ALIVE"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("x-correlation-id"));
    }

    #[test]
    fn test_target_url_plain() {
        let url = build_target_url("example.invalid", false, "/a", None);
        assert_eq!(url, "http://example.invalid/a");
    }

    #[test]
    fn test_target_url_with_query_and_tls() {
        let url = build_target_url("example.invalid:8443", true, "/a/b", Some("x=1&y=2"));
        assert_eq!(url, "https://example.invalid:8443/a/b?x=1&y=2");
    }
}
