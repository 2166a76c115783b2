use std::sync::Mutex;

/// Receives progress milestones from a running pipeline.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, status: &str);
}

/// Discards all progress.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: u8, _status: &str) {}
}

/// Keeps every milestone in order. Useful for tests and for returning the
/// status trail in API responses.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(u8, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(u8, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().into_iter().map(|(p, _)| p).collect()
    }

    pub fn last_status(&self) -> Option<String> {
        self.events().pop().map(|(_, s)| s)
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: u8, status: &str) {
        tracing::trace!(percent, status, "Pipeline progress");
        if let Ok(mut events) = self.events.lock() {
            events.push((percent.min(100), status.to_string()));
        }
    }
}
