//! Traffic recording: immutable request/response snapshots and the
//! per-instance recording buffer.

mod buffer;
mod types;

pub use buffer::RecordingBuffer;
pub use types::{
    classify_body, BodyClass, RecordedContext, RecordedRequest, RecordedResponse, ResponseOrigin,
};
