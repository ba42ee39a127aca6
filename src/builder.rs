use std::io;
use std::marker::PhantomData;
use std::time::Duration;

use tracing::Subscriber;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::{Compact, DefaultFields, Format, Full};
use tracing_subscriber::fmt::{self, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

use crate::capture::Capture;
use crate::key::KeyBuffers;
use crate::layer::{SamplingLayer, Stats};
use crate::table::Counters;

struct Settings {
    filter: EnvFilter,
    tick: Duration,
    threshold: u64,
    rate: f64,
}

/// Builder for [`SamplingLayer`](crate::SamplingLayer).
///
/// Created via [`SamplingLayer::builder()`](crate::SamplingLayer::builder).
pub struct SamplingLayerBuilder<S, N = DefaultFields, E = Format<Full>, W = fn() -> io::Stderr> {
    settings: Settings,
    writer: W,
    fmt_layer: fmt::Layer<S, N, E, Capture>,
}

impl<S> SamplingLayer<S> {
    pub fn builder() -> SamplingLayerBuilder<S> {
        SamplingLayerBuilder {
            settings: Settings {
                filter: EnvFilter::new("trace"),
                tick: Duration::from_secs(1),
                threshold: 100,
                rate: 0.0,
            },
            writer: io::stderr as fn() -> io::Stderr,
            fmt_layer: fmt::Layer::default().with_writer(Capture::default()),
        }
    }
}

impl<S, N, E, W> SamplingLayerBuilder<S, N, E, W> {
    /// Only count and sample events matching `filter`; everything else is
    /// disabled. Defaults to all events.
    pub fn filter(mut self, filter: EnvFilter) -> Self {
        self.settings.filter = filter;
        self
    }

    /// Set the window length. Defaults to 1s.
    ///
    /// A zero tick starts a new window on every event, so only a threshold of
    /// zero has any effect.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.settings.tick = tick;
        self
    }

    /// Number of events per level and message kept in each tick. Defaults to
    /// 100.
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.settings.threshold = threshold;
        self
    }

    /// Probability of keeping an event once its bucket is over the threshold.
    /// Defaults to 0.
    pub fn rate(mut self, rate: f64) -> Self {
        self.settings.rate = rate;
        self
    }

    /// Set the output writer. Defaults to stderr.
    pub fn writer<W2>(self, writer: W2) -> SamplingLayerBuilder<S, N, E, W2> {
        SamplingLayerBuilder {
            settings: self.settings,
            writer,
            fmt_layer: self.fmt_layer,
        }
    }

    fn map_fmt<N2, E2>(
        self,
        f: impl FnOnce(fmt::Layer<S, N, E, Capture>) -> fmt::Layer<S, N2, E2, Capture>,
    ) -> SamplingLayerBuilder<S, N2, E2, W> {
        SamplingLayerBuilder {
            settings: self.settings,
            writer: self.writer,
            fmt_layer: f(self.fmt_layer),
        }
    }

    /// Sets whether or not ANSI escape codes are written.
    pub fn with_ansi(self, ansi: bool) -> Self {
        self.map_fmt(|l| l.with_ansi(ansi))
    }
}

impl<S, N, E, W> SamplingLayerBuilder<S, N, E, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    /// Format kept events with `e` instead of the default formatter.
    pub fn event_format<E2>(self, e: E2) -> SamplingLayerBuilder<S, N, E2, W>
    where
        E2: FormatEvent<S, N> + 'static,
    {
        self.map_fmt(|l| l.event_format(e))
    }
}

impl<S, N, L, T, W> SamplingLayerBuilder<S, N, Format<L, T>, W>
where
    N: for<'writer> FormatFields<'writer> + 'static,
{
    /// Do not emit timestamps.
    pub fn without_time(self) -> SamplingLayerBuilder<S, N, Format<L, ()>, W> {
        self.map_fmt(fmt::Layer::without_time)
    }

    /// Sets whether or not an event's target is displayed.
    pub fn with_target(self, display_target: bool) -> Self {
        self.map_fmt(|l| l.with_target(display_target))
    }

    /// Use the single-line compact formatter.
    pub fn compact(self) -> SamplingLayerBuilder<S, N, Format<Compact, T>, W> {
        self.map_fmt(fmt::Layer::compact)
    }
}

impl<S, N, E, W> SamplingLayerBuilder<S, N, E, W>
where
    W: for<'a> MakeWriter<'a> + 'static,
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
    E: FormatEvent<S, N> + 'static,
{
    /// Consume the builder and create a [`SamplingLayer`](crate::SamplingLayer)
    /// and a [`Stats`] handle for reading event counters.
    pub fn build(self) -> (SamplingLayer<S, N, E, W>, Stats) {
        let Settings {
            filter,
            tick,
            threshold,
            rate,
        } = self.settings;
        assert!(
            (0.0..=1.0).contains(&rate),
            "rate must be within 0.0..=1.0, got {rate}"
        );

        let stats = Stats::new();
        let layer = SamplingLayer {
            filter,
            counters: Counters::new(),
            tick,
            threshold,
            rate,
            keys: KeyBuffers::default(),
            writer: self.writer,
            fmt_layer: self.fmt_layer,
            stats: stats.clone(),
            _subscriber: PhantomData,
        };
        (layer, stats)
    }
}
