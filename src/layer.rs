use std::io::{self, Write};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber, span};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::fmt::{self, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use crate::capture::Capture;
use crate::key::KeyBuffers;
use crate::severity::Severity;
use crate::table::Counters;

#[derive(Default)]
struct StatsInner {
    received: AtomicU64,
    sampled: AtomicU64,
    dropped: AtomicU64,
}

/// Counters tracking how many events were processed by the layer.
///
/// All counts are cumulative since layer creation. Clones share the same
/// counters.
#[derive(Clone, Default)]
pub struct Stats(Arc<StatsInner>);

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Events that passed the filter and were counted.
    pub fn received(&self) -> u64 {
        self.0.received.load(Ordering::Relaxed)
    }

    /// Events that were written out.
    pub fn sampled(&self) -> u64 {
        self.0.sampled.load(Ordering::Relaxed)
    }

    /// Events suppressed because their bucket was over the threshold.
    pub fn dropped(&self) -> u64 {
        self.0.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stats")
            .field("received", &self.received())
            .field("sampled", &self.sampled())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// A [`tracing_subscriber::Layer`] that keeps the first `threshold` events
/// per level and message in each tick, and a random `rate` of the rest.
///
/// Construct via [`SamplingLayer::builder()`](crate::SamplingLayerBuilder).
pub struct SamplingLayer<S, N = DefaultFields, E = Format<Full>, W = fn() -> io::Stderr> {
    pub(crate) filter: EnvFilter,
    pub(crate) counters: Counters,
    pub(crate) tick: Duration,
    pub(crate) threshold: u64,
    pub(crate) rate: f64,
    pub(crate) keys: KeyBuffers,
    pub(crate) writer: W,
    pub(crate) fmt_layer: fmt::Layer<S, N, E, Capture>,
    pub(crate) stats: Stats,
    pub(crate) _subscriber: PhantomData<fn(S)>,
}

impl<S, N, E, W> SamplingLayer<S, N, E, W> {
    fn keep(&self, occurrences: u64) -> bool {
        occurrences <= self.threshold || (self.rate > 0.0 && fastrand::f64() < self.rate)
    }
}

impl<S, N, E, W> Layer<S> for SamplingLayer<S, N, E, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
    E: FormatEvent<S, N> + 'static,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn register_callsite(&self, meta: &'static Metadata<'static>) -> Interest {
        let interest = <EnvFilter as Layer<S>>::register_callsite(&self.filter, meta);
        if interest.is_never() {
            return interest;
        }
        Interest::sometimes()
    }

    fn enabled(&self, meta: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        <EnvFilter as Layer<S>>::enabled(&self.filter, meta, ctx)
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        self.fmt_layer.on_new_span(attrs, id, ctx);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        self.fmt_layer.on_record(id, values, ctx);
    }

    fn on_enter(&self, id: &span::Id, ctx: Context<'_, S>) {
        self.fmt_layer.on_enter(id, ctx);
    }

    fn on_exit(&self, id: &span::Id, ctx: Context<'_, S>) {
        self.fmt_layer.on_exit(id, ctx);
    }

    fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
        self.fmt_layer.on_close(id, ctx);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let stats = &self.stats.0;
        stats.received.fetch_add(1, Ordering::Relaxed);

        let severity = Severity::from(event.metadata().level());
        let occurrences = self.keys.with_key(event, |key| {
            self.counters
                .get(severity, key)
                .increment(SystemTime::now(), self.tick)
        });

        if !self.keep(occurrences) {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.fmt_layer.on_event(event, ctx);
        self.fmt_layer.writer().drain_with(|line| {
            let _ = self.writer.make_writer().write_all(line);
        });
        stats.sampled.fetch_add(1, Ordering::Relaxed);
    }
}
