//! Recorded traffic types.
//!
//! A [`RecordedContext`] is the immutable snapshot of one request/response
//! exchange. The request half doubles as the value the match rules evaluate
//! against, so it is captured before the pipeline runs.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of a recorded body, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyClass {
    Text,
    Image,
    Binary,
}

/// Classify a body by its `Content-Type` header value.
///
/// `image/*` is an image; `text/*` and the common structured-text
/// application types are text; everything else is opaque binary.
pub fn classify_body(content_type: &str) -> BodyClass {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime.starts_with("image/") {
        return BodyClass::Image;
    }
    if mime.starts_with("text/")
        || mime == "application/json"
        || mime == "application/xml"
        || mime == "application/javascript"
        || mime == "application/x-www-form-urlencoded"
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
    {
        return BodyClass::Text;
    }
    BodyClass::Binary
}

/// Which pipeline stage produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOrigin {
    Stump,
    Proxy,
    Fallback,
}

/// An incoming HTTP request, captured off the wire.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Client socket address the request arrived from.
    pub remote_addr: String,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Ordered header pairs; duplicates preserved, names compared
    /// case-insensitively by accessors.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub body_class: BodyClass,
}

impl RecordedRequest {
    /// First value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }
}

/// The response half of a recorded exchange.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub status_code: u16,
    pub status_description: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub body_class: BodyClass,
    pub origin: ResponseOrigin,
}

impl RecordedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Immutable snapshot of one served request/response pair.
#[derive(Debug, Clone)]
pub struct RecordedContext {
    pub request: RecordedRequest,
    pub response: RecordedResponse,
    pub received_at: DateTime<Utc>,
}

impl RecordedContext {
    pub fn new(request: RecordedRequest, response: RecordedResponse) -> Self {
        Self {
            request,
            response,
            received_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_text_types() {
        assert_eq!(classify_body("text/html"), BodyClass::Text);
        assert_eq!(classify_body("text/plain; charset=utf-8"), BodyClass::Text);
        assert_eq!(classify_body("application/json"), BodyClass::Text);
        assert_eq!(classify_body("application/hal+json"), BodyClass::Text);
        assert_eq!(classify_body("application/soap+xml"), BodyClass::Text);
    }

    #[test]
    fn test_classify_image_types() {
        assert_eq!(classify_body("image/png"), BodyClass::Image);
        assert_eq!(classify_body("IMAGE/JPEG"), BodyClass::Image);
    }

    #[test]
    fn test_classify_binary_fallback() {
        assert_eq!(classify_body("application/octet-stream"), BodyClass::Binary);
        assert_eq!(classify_body(""), BodyClass::Binary);
        assert_eq!(classify_body("application/pdf"), BodyClass::Binary);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let request = RecordedRequest {
            remote_addr: "127.0.0.1:9999".to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            query: None,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: Bytes::new(),
            body_class: BodyClass::Text,
        };
        assert_eq!(request.header("content-type"), Some("text/plain"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(request.header("accept"), None);
    }
}
