// Library exports for the stumps proxy runtime.

pub mod error;
pub mod host;
pub mod net;
pub mod persistence;
pub mod recording;
pub mod rules;
pub mod server;
pub mod stump;

pub use error::Error;
pub use host::HostRegistry;
pub use recording::{BodyClass, RecordedContext, RecordingBuffer};
pub use server::{FallbackResponse, ProxyServer, RecordingBehavior, ServerConfig};
pub use stump::{CannedResponse, Stump, StumpContract};
