use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let sampled = std::env::args().any(|a| a == "--sampled");

    let stats = if sampled {
        let (layer, stats) = tracing_tick_sample::SamplingLayer::<Registry>::builder()
            .tick(Duration::from_secs(1))
            .threshold(5)
            .rate(0.01)
            .build();
        Registry::default().with(layer).init();
        Some(stats)
    } else {
        Registry::default()
            .with(tracing_subscriber::fmt::layer())
            .init();
        None
    };

    run();

    if let Some(stats) = stats {
        eprintln!("{stats:?}");
    }
}

fn tick_rng(tick: u64) -> fastrand::Rng {
    fastrand::Rng::with_seed(tick)
}

fn run() {
    let duration = Duration::from_secs(10);
    let tick_interval = Duration::from_millis(10);

    let start_tick = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
        / tick_interval.as_millis() as u64;

    let started = Instant::now();
    for t in 0.. {
        let mut rng = tick_rng(start_tick + t);

        let is_outage = rng.f64() < 0.01;
        let burst = if is_outage { rng.usize(50..150) } else { rng.usize(1..5) };

        for i in 0..burst {
            let shard = rng.usize(0..4);
            if is_outage {
                tracing::error!(shard, i, "upstream connection refused");
            } else if rng.f64() < 0.1 {
                tracing::warn!(shard, i, "slow upstream response");
            } else {
                tracing::info!(shard, i, "request served");
            }
        }
        tracing::trace!(t, "tick");

        if started.elapsed() >= duration {
            break;
        }

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let target_ms = (start_tick + t + 1) * tick_interval.as_millis() as u64;
        if let Some(wait) = target_ms.checked_sub(now_ms) {
            std::thread::sleep(Duration::from_millis(wait));
        }
    }
}
