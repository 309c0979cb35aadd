//! User-visible notifications.
//!
//! The cart reports failures through a [`Notifier`] the way a UI shows a
//! toast: fire-and-forget, nothing is returned.

use std::fmt::Debug;

use parking_lot::Mutex;

/// Sink for user-visible messages.
pub trait Notifier: Send + Sync + Debug {
    /// Show an error message.
    fn error(&self, message: &str);
}

/// Notifier that emits messages as `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        tracing::warn!(target: "rocketshoes::toast", "{message}");
    }
}

/// Notifier that records messages for later display or inspection.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    errors: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Take all recorded messages, leaving the notifier empty.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock())
    }
}

impl Notifier for MemoryNotifier {
    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}
