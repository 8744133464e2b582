//! Per-host proxy server: configuration, listener, pipeline, and relay.

mod instance;
mod listener;
mod pipeline;
mod relay;

pub use instance::{ProxyServer, ServerCounters};
pub use listener::HttpListener;
pub use relay::{forward, RelayedResponse};

use serde::{Deserialize, Serialize};

/// How an instance reacts when traffic recording is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingBehavior {
    /// Recording turns stumps off, and turning recording off restores the
    /// previous setting.
    #[default]
    DisableStumpsWhileRecording,
    LeaveStumpsUnchanged,
}

/// Synthetic reply served when neither a stump nor the relay handles a
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackResponse {
    Http404NotFound,
    #[default]
    Http503ServiceUnavailable,
}

impl FallbackResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            FallbackResponse::Http404NotFound => 404,
            FallbackResponse::Http503ServiceUnavailable => 503,
        }
    }

    pub fn status_description(&self) -> &'static str {
        match self {
            FallbackResponse::Http404NotFound => "Not Found",
            FallbackResponse::Http503ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// Configuration of one mocked host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique id of this instance, compared case-insensitively.
    pub server_id: String,
    /// Real upstream host (optionally `host:port`). Empty disables the
    /// relay stage entirely.
    #[serde(default)]
    pub external_host_name: String,
    /// Use https towards the upstream.
    #[serde(default)]
    pub use_secure_transport: bool,
    pub listening_port: u16,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_true")]
    pub stumps_enabled: bool,
    #[serde(default)]
    pub record_traffic: bool,
    #[serde(default)]
    pub recording_behavior: RecordingBehavior,
    #[serde(default)]
    pub fallback_response: FallbackResponse,
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_id: String::new(),
            external_host_name: String::new(),
            use_secure_transport: false,
            listening_port: 0,
            auto_start: false,
            stumps_enabled: true,
            record_traffic: false,
            recording_behavior: RecordingBehavior::default(),
            fallback_response: FallbackResponse::default(),
        }
    }
}
