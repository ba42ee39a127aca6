use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Occurrence count for one bucket within the current tick.
///
/// A counter is shared by every message key that hashes to its slot. The
/// window is started lazily by the first increment after it expires.
#[derive(Debug, Default)]
pub struct Counter {
    /// Unix nanoseconds at which the current window ends. Zero until the
    /// first increment.
    reset_at: AtomicI64,
    count: AtomicU64,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            reset_at: AtomicI64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one occurrence at `now` and return the occurrence count for the
    /// window `now` falls into.
    ///
    /// The first call after the window has expired starts a new window of
    /// length `tick` and returns 1. A zero `tick` makes every call start a
    /// new window.
    pub fn increment(&self, now: SystemTime, tick: Duration) -> u64 {
        self.increment_nanos(unix_nanos(now), duration_nanos(tick))
    }

    pub(crate) fn increment_nanos(&self, now: i64, tick: i64) -> u64 {
        let reset_after = self.reset_at.load(Ordering::Acquire);
        if reset_after > now {
            return self.count.fetch_add(1, Ordering::Relaxed) + 1;
        }

        self.count.store(1, Ordering::Relaxed);

        let next_reset = now.saturating_add(tick);
        if self
            .reset_at
            .compare_exchange(reset_after, next_reset, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another caller started the window and stored 1 as well, so
            // this occurrence still has to be added on top.
            return self.count.fetch_add(1, Ordering::Relaxed) + 1;
        }

        1
    }
}

fn unix_nanos(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |n| -n),
    }
}

fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::{Barrier, Mutex};

    use super::*;

    const SEC: i64 = 1_000_000_000;

    fn at_ms(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_millis(ms)
    }

    #[test]
    fn counts_within_window() {
        let counter = Counter::new();
        let seen: Vec<u64> = (0..5)
            .map(|_| counter.increment(at_ms(0), Duration::from_secs(1)))
            .collect();
        assert_eq!(seen, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn resets_after_tick() {
        let counter = Counter::new();
        let tick = Duration::from_secs(1);
        for _ in 0..5 {
            counter.increment(at_ms(0), tick);
        }
        assert_eq!(counter.increment(at_ms(1001), tick), 1);
        assert_eq!(counter.increment(at_ms(1500), tick), 2);
        // the window opened at 1001ms, so 2000ms is still inside it
        assert_eq!(counter.increment(at_ms(2000), tick), 3);
        assert_eq!(counter.increment(at_ms(2001), tick), 1);
    }

    #[test]
    fn window_end_is_exclusive() {
        let counter = Counter::new();
        assert_eq!(counter.increment_nanos(10 * SEC, SEC), 1);
        assert_eq!(counter.increment_nanos(11 * SEC - 1, SEC), 2);
        assert_eq!(counter.increment_nanos(11 * SEC, SEC), 1);
    }

    #[test]
    fn zero_tick_always_expires() {
        let counter = Counter::new();
        for _ in 0..10 {
            assert_eq!(counter.increment(at_ms(0), Duration::ZERO), 1);
        }
    }

    #[test]
    fn out_of_order_timestamps_stay_in_window() {
        let counter = Counter::new();
        let tick = Duration::from_secs(1);
        assert_eq!(counter.increment(at_ms(500), tick), 1);
        assert_eq!(counter.increment(at_ms(100), tick), 2);
        assert_eq!(counter.increment(at_ms(1499), tick), 3);
    }

    #[test]
    fn pre_epoch_timestamps() {
        let counter = Counter::new();
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(counter.increment(before, Duration::from_secs(1)), 1);
        assert_eq!(counter.increment(before, Duration::from_secs(1)), 2);
    }

    #[test]
    fn huge_tick_saturates() {
        let counter = Counter::new();
        assert_eq!(counter.increment(at_ms(0), Duration::MAX), 1);
        assert_eq!(counter.increment(at_ms(u32::MAX as u64), Duration::MAX), 2);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 10_000;

        let counter = Counter::new();
        let tick = Duration::from_secs(3600);
        // open the window up front so every call takes the fast path
        assert_eq!(counter.increment(at_ms(0), tick), 1);

        let barrier = Barrier::new(THREADS);
        let max = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        (0..PER_THREAD)
                            .map(|_| counter.increment(at_ms(1), tick))
                            .max()
                            .unwrap_or(0)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).max()
        });

        assert_eq!(max, Some((THREADS * PER_THREAD) as u64 + 1));
    }

    #[test]
    fn exactly_one_caller_wins_the_reset() {
        const THREADS: usize = 16;

        for round in 0..50u64 {
            let counter = Counter::new();
            let barrier = Barrier::new(THREADS);
            let now = at_ms(round * 10);
            let seen: Vec<u64> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..THREADS)
                    .map(|_| {
                        s.spawn(|| {
                            barrier.wait();
                            counter.increment(now, Duration::from_secs(1))
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(seen.iter().filter(|&&n| n == 1).count(), 1, "{seen:?}");
            assert!(seen.iter().all(|&n| (1..=THREADS as u64).contains(&n)));

            // The racers leave the count at one of the values they returned.
            // When no loser overwrote another caller's add, every racer is
            // accounted for.
            let max = seen.iter().copied().max().unwrap_or(0);
            let next = counter.increment(now, Duration::from_secs(1));
            assert!((2..=max + 1).contains(&next), "{seen:?} then {next}");
            let mut sorted = seen.clone();
            sorted.sort_unstable();
            if sorted == (1..=THREADS as u64).collect::<Vec<_>>() {
                assert_eq!(next, THREADS as u64 + 1, "{seen:?}");
            }
        }
    }

    #[test]
    fn serialized_threads_see_a_sequence() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 250;

        let counter = Counter::new();
        let tick = Duration::from_secs(3600);
        let log = Mutex::new(Vec::new());
        let barrier = Barrier::new(THREADS);
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        let mut log = log.lock().unwrap();
                        log.push(counter.increment(at_ms(0), tick));
                    }
                });
            }
        });

        let log = log.into_inner().unwrap();
        let expected: Vec<u64> = (1..=(THREADS * PER_THREAD) as u64).collect();
        assert_eq!(log, expected);
    }
}
