use std::cell::Cell;
use std::io;

use thread_local::ThreadLocal;
use tracing_subscriber::fmt::MakeWriter;

/// Per-thread buffer the inner fmt layer renders kept events into.
///
/// The buffer is taken out of its slot while in use, so an event emitted from
/// inside the user's writer finds an empty slot and allocates its own.
#[derive(Default)]
pub(crate) struct Capture(ThreadLocal<Cell<Vec<u8>>>);

impl Capture {
    /// Run `f` on whatever has been rendered on this thread since the last
    /// call, then clear it for the next event.
    pub(crate) fn drain_with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let slot = self.0.get_or_default();
        let mut buf = slot.take();
        let out = f(&buf);
        buf.clear();
        slot.set(buf);
        out
    }
}

pub(crate) struct CaptureWriter<'a> {
    slot: &'a Cell<Vec<u8>>,
    buf: Vec<u8>,
}

impl io::Write for CaptureWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for CaptureWriter<'_> {
    fn drop(&mut self) {
        self.slot.set(std::mem::take(&mut self.buf));
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = CaptureWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let slot = self.0.get_or_default();
        CaptureWriter {
            slot,
            buf: slot.take(),
        }
    }
}
