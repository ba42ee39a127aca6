use std::cell::Cell;
use std::fmt::{self, Write as _};

use thread_local::ThreadLocal;
use tracing::Event;
use tracing::field::{Field, Visit};

/// Reusable per-thread buffers for rendering an event's message key.
///
/// Rendering runs the message's `Display`/`Debug` impls, which may log. The
/// buffer is out of its slot meanwhile, so a nested event renders into a
/// fresh `String`.
#[derive(Default)]
pub(crate) struct KeyBuffers(ThreadLocal<Cell<String>>);

impl KeyBuffers {
    /// Render the message of `event` and pass it to `f`.
    ///
    /// Events without a `message` field are keyed by their callsite name.
    pub(crate) fn with_key<R>(&self, event: &Event<'_>, f: impl FnOnce(&str) -> R) -> R {
        let slot = self.0.get_or_default();
        let mut key = slot.take();
        key.clear();
        event.record(&mut MessageVisitor(&mut key));
        if key.is_empty() {
            key.push_str(event.metadata().name());
        }
        let out = f(&key);
        slot.set(key);
        out
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        }
    }
}
