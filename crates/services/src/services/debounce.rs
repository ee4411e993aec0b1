//! Coalesces bursts of search input into a single fetch.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::time::sleep;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Each keystroke submits a new generation; only the submission that is still
/// the latest when its window elapses settles with a value.
#[derive(Clone)]
pub struct SearchDebouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
}

pub struct DebouncedInput {
    text: String,
    generation: u64,
    latest: Arc<AtomicU64>,
    window: Duration,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl SearchDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn submit(&self, text: impl Into<String>) -> DebouncedInput {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        DebouncedInput {
            text: text.into(),
            generation,
            latest: self.generation.clone(),
            window: self.window,
        }
    }
}

impl DebouncedInput {
    /// Wait out the debounce window. Returns the text only if no newer
    /// submission arrived in the meantime.
    pub async fn settle(self) -> Option<String> {
        sleep(self.window).await;
        (self.latest.load(Ordering::SeqCst) == self.generation).then_some(self.text)
    }
}
