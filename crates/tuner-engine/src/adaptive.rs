use std::fmt;

use crate::event::{EventSender, Generation};

/// An adaptive-stream decoding engine: turns a manifest URL into something a
/// sink can play, reporting back through
/// [`PlayerEvent::Engine`](crate::event::PlayerEvent).
pub trait AdaptiveEngine: Send {
    fn name(&self) -> &str;

    /// Start loading `manifest_url`.  Every signal must carry `generation`.
    /// Work stops when the returned handle is dropped.
    fn load(&self, manifest_url: &str, generation: Generation, events: EventSender) -> EngineHandle;
}

/// Exclusive ownership of one engine instance.  Dropping it releases the
/// instance; there is no other way to release it.
pub struct EngineHandle {
    label: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl EngineHandle {
    pub fn new(label: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Handle whose release aborts a spawned task.
    pub fn from_task(label: impl Into<String>, task: tokio::task::JoinHandle<()>) -> Self {
        let abort = task.abort_handle();
        Self::new(label, move || abort.abort())
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!("engine: releasing {}", self.label);
            release();
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
