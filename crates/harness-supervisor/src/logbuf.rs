//! Append-only buffer for the managed process's diagnostic output.

use std::sync::Arc;

use parking_lot::Mutex;

/// Ordered sequence of diagnostic chunks.
///
/// The stderr collection task is the sole writer during a process's
/// lifetime; readers get a concatenated snapshot. The buffer is cleared
/// only when the process is replaced by a new `start`.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one chunk in arrival order.
    pub fn append(&self, chunk: String) {
        self.chunks.lock().push(chunk);
    }

    /// Drops all captured output.
    pub fn clear(&self) {
        self.chunks.lock().clear();
    }

    /// Returns everything captured so far as one string. Empty if nothing
    /// has been captured yet.
    pub fn contents(&self) -> String {
        self.chunks.lock().concat()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }
}
