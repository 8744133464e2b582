//! Request pipeline: stump match, upstream relay, fallback.
//!
//! Each stage either terminates with a response or passes to the next. After
//! a stage terminates, the exchange is recorded (when recording is on),
//! counters are bumped, and the request-finished notification fires.

use super::instance::ProxyServer;
use super::relay;
use crate::recording::{
    classify_body, RecordedContext, RecordedRequest, RecordedResponse, ResponseOrigin,
};
use crate::stump::CannedResponse;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle one request against an instance.
pub(crate) async fn handle_request(
    req: Request<Incoming>,
    server: Arc<ProxyServer>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect();

    // A request whose body cannot be read never enters the pipeline.
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };

    let content_type = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.as_str())
        .unwrap_or("");
    let body_class = classify_body(content_type);
    let request = RecordedRequest {
        remote_addr: client_addr.to_string(),
        method,
        path,
        query,
        headers,
        body: body_bytes,
        body_class,
    };

    let (response, recorded) = run_stages(&server, &request).await;

    let context = Arc::new(RecordedContext::new(request, recorded));
    if server.record_traffic() {
        server.recordings().append(Arc::clone(&context));
    }
    server.counters().record(context.response.origin);
    server.notify_finished(context);

    Ok(response)
}

/// Run the stage chain and produce the wire response plus its recorded form.
async fn run_stages(
    server: &Arc<ProxyServer>,
    request: &RecordedRequest,
) -> (Response<Full<Bytes>>, RecordedResponse) {
    // Stage A: first matching stump wins, in insertion order, against the
    // stump set as it existed when the request arrived.
    if server.stumps_enabled() {
        for stump in server.stump_snapshot() {
            if stump.is_match(request) {
                debug!("Request {} {} matched stump {}", request.method, request.path, stump.id());
                if let Some(canned) = stump.response() {
                    return canned_stage(canned);
                }
            }
        }
    }

    // Stage B: relay to the real host, when one is configured.
    let external_host = server.external_host_name();
    if !external_host.is_empty() {
        return relay_stage(&external_host, server.use_secure_transport(), request).await;
    }

    // Stage C: synthetic fallback.
    let fallback = server.fallback_response();
    let response = Response::builder()
        .status(fallback.status_code())
        .header(CONTENT_LENGTH, "0")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| status_only(StatusCode::INTERNAL_SERVER_ERROR));
    let recorded = RecordedResponse {
        status_code: fallback.status_code(),
        status_description: fallback.status_description().to_string(),
        headers: vec![("content-length".to_string(), "0".to_string())],
        body: Bytes::new(),
        body_class: classify_body(""),
        origin: ResponseOrigin::Fallback,
    };
    (response, recorded)
}

fn canned_stage(canned: &CannedResponse) -> (Response<Full<Bytes>>, RecordedResponse) {
    let mut builder = Response::builder().status(canned.status_code);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in &canned.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!("Skipping unrepresentable canned header {:?}", name),
            }
        }
    }

    let response = builder
        .body(Full::new(canned.body.clone()))
        .unwrap_or_else(|_| status_only(StatusCode::INTERNAL_SERVER_ERROR));
    let recorded = RecordedResponse {
        status_code: canned.status_code,
        status_description: canned.status_description.clone(),
        headers: canned.headers.clone(),
        body: canned.body.clone(),
        body_class: classify_body(&canned.body_content_type),
        origin: ResponseOrigin::Stump,
    };
    (response, recorded)
}

async fn relay_stage(
    host: &str,
    secure: bool,
    request: &RecordedRequest,
) -> (Response<Full<Bytes>>, RecordedResponse) {
    match relay::forward(host, secure, request).await {
        Ok(relayed) => {
            let mut builder = Response::builder().status(relayed.status_code);
            if let Some(headers) = builder.headers_mut() {
                for (name, value) in &relayed.headers {
                    match (
                        HeaderName::from_bytes(name.as_bytes()),
                        HeaderValue::from_str(value),
                    ) {
                        (Ok(name), Ok(value)) => {
                            headers.append(name, value);
                        }
                        _ => warn!("Skipping unrepresentable upstream header {:?}", name),
                    }
                }
            }
            let response = builder
                .body(Full::new(relayed.body.clone()))
                .unwrap_or_else(|_| status_only(StatusCode::INTERNAL_SERVER_ERROR));
            let recorded = RecordedResponse {
                status_code: relayed.status_code,
                status_description: relayed.status_description,
                headers: relayed.headers,
                body: relayed.body,
                body_class: relayed.body_class,
                origin: ResponseOrigin::Proxy,
            };
            (response, recorded)
        }
        Err(e) => {
            // Upstream failures become a bare 502; the cause stays in the
            // logs, never in the response.
            warn!("Upstream relay failed: {:#}", e);
            let response = status_only(StatusCode::BAD_GATEWAY);
            let recorded = RecordedResponse {
                status_code: StatusCode::BAD_GATEWAY.as_u16(),
                status_description: "Bad Gateway".to_string(),
                headers: Vec::new(),
                body: Bytes::new(),
                body_class: classify_body(""),
                origin: ResponseOrigin::Proxy,
            };
            (response, recorded)
        }
    }
}

fn status_only(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
