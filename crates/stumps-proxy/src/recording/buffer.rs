//! Ordered, append-only buffer of recorded traffic.

use super::types::RecordedContext;
use parking_lot::RwLock;
use std::sync::Arc;

/// Per-instance log of served exchanges.
///
/// Appends are serialized by the internal lock and preserve arrival order.
/// Readers get an owned snapshot that is unaffected by later appends or a
/// concurrent [`clear`](RecordingBuffer::clear). Nothing is ever evicted;
/// callers bound the size by clearing.
#[derive(Default)]
pub struct RecordingBuffer {
    entries: RwLock<Vec<Arc<RecordedContext>>>,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a served exchange. Called by the pipeline after the response
    /// has been written.
    pub fn append(&self, context: Arc<RecordedContext>) {
        self.entries.write().push(context);
    }

    /// Stable snapshot of everything recorded so far, in arrival order.
    pub fn snapshot(&self) -> Vec<Arc<RecordedContext>> {
        self.entries.read().clone()
    }

    /// Atomically discard all recorded entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{BodyClass, RecordedRequest, RecordedResponse, ResponseOrigin};
    use bytes::Bytes;

    fn context(path: &str) -> Arc<RecordedContext> {
        let request = RecordedRequest {
            remote_addr: "127.0.0.1:50000".to_string(),
            method: "GET".to_string(),
            path: path.to_string(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
            body_class: BodyClass::Binary,
        };
        let response = RecordedResponse {
            status_code: 404,
            status_description: "Not Found".to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            body_class: BodyClass::Binary,
            origin: ResponseOrigin::Fallback,
        };
        Arc::new(RecordedContext::new(request, response))
    }

    #[test]
    fn test_append_preserves_order() {
        let buffer = RecordingBuffer::new();
        buffer.append(context("/first"));
        buffer.append(context("/second"));
        buffer.append(context("/third"));

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].request.path, "/first");
        assert_eq!(entries[1].request.path, "/second");
        assert_eq!(entries[2].request.path, "/third");
    }

    #[test]
    fn test_snapshot_is_stable() {
        let buffer = RecordingBuffer::new();
        buffer.append(context("/a"));

        let before = buffer.snapshot();
        buffer.append(context("/b"));
        buffer.clear();

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].request.path, "/a");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear_resets_length() {
        let buffer = RecordingBuffer::new();
        buffer.append(context("/a"));
        buffer.append(context("/b"));
        assert_eq!(buffer.len(), 2);

        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.snapshot().is_empty());
    }
}
