use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::TsdbError;

pub const DEFAULT_ERROR_CHANNEL_CAPACITY: usize = 256;

/// ErrorEvent is published whenever a background pass or a read swallows an error.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// where the error happened, e.g. `"flush"` or `"consolidate"`
    pub source: String,
    pub error: Arc<TsdbError>,
}

/// ErrorNotifier fans error events out to every subscriber. Publishing never
/// waits on a listener; slow listeners observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct ErrorNotifier {
    tx: broadcast::Sender<ErrorEvent>,
}

impl ErrorNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ErrorEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, source: &str, error: TsdbError) {
        error!(source, "{}", error);

        let event = ErrorEvent {
            source: source.to_string(),
            error: Arc::new(error),
        };
        // no subscribers is not an error
        let _ = self.tx.send(event);
    }
}

impl Default for ErrorNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CHANNEL_CAPACITY)
    }
}
