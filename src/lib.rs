//! A [`tracing_subscriber::Layer`] that throttles repetitive log lines.
//!
//! Every event is counted per severity and message in fixed-length ticks. The
//! first `threshold` occurrences in a tick are written out; after that, each
//! occurrence is kept with probability `rate` until the tick rolls over.
//!
//! Counting uses fixed arrays of 4096 lock-free [`Counter`]s per severity,
//! indexed by a hash of the message. Messages that hash to the same slot share
//! a count, which keeps memory bounded no matter how many distinct messages
//! are logged. The [`Counters`] table can be used on its own by handlers that
//! want to make the keep/drop decision themselves.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//! use tracing_tick_sample::SamplingLayer;
//!
//! let (layer, stats) = SamplingLayer::<Registry>::builder()
//!     .tick(Duration::from_secs(1))
//!     .threshold(10)
//!     .rate(0.01)
//!     .build();
//!
//! let subscriber = Registry::default().with(layer);
//! // tracing::subscriber::set_global_default(subscriber).unwrap();
//! # drop(subscriber);
//! # assert_eq!(stats.received(), 0);
//! ```
//!
//! Using the counters directly:
//!
//! ```
//! use std::time::{Duration, SystemTime};
//! use tracing_tick_sample::{Counters, Severity};
//!
//! let counters = Counters::new();
//! let now = SystemTime::now();
//! let tick = Duration::from_secs(1);
//! assert_eq!(counters.get(Severity::INFO, "boom").increment(now, tick), 1);
//! assert_eq!(counters.get(Severity::INFO, "boom").increment(now, tick), 2);
//! ```

mod builder;
mod capture;
mod counter;
mod key;
mod layer;
mod severity;
mod table;

pub use builder::SamplingLayerBuilder;
pub use counter::Counter;
pub use layer::{SamplingLayer, Stats};
pub use severity::Severity;
pub use table::{CounterRef, Counters, SLOTS_PER_LEVEL, slot_index};
