use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use crate::counter::Counter;
use crate::severity::Severity;

/// Number of counters per severity.
pub const SLOTS_PER_LEVEL: usize = 4096;

/// Per-severity arrays of [`Counter`]s, indexed by a hash of the message key.
///
/// Keys that hash to the same slot share a counter. Tables for the four
/// well-known severities are allocated up front; other severities get a table
/// the first time they are seen, and keep it for the life of `Counters`.
#[derive(Debug)]
pub struct Counters {
    debug: Box<[Counter]>,
    info: Box<[Counter]>,
    warn: Box<[Counter]>,
    error: Box<[Counter]>,
    custom: RwLock<HashMap<Severity, Arc<[Counter]>>>,
}

/// A counter borrowed from [`Counters`].
#[derive(Debug)]
pub enum CounterRef<'a> {
    Fixed(&'a Counter),
    Custom { slots: Arc<[Counter]>, index: usize },
}

impl Deref for CounterRef<'_> {
    type Target = Counter;

    fn deref(&self) -> &Counter {
        match self {
            CounterRef::Fixed(counter) => counter,
            CounterRef::Custom { slots, index } => &slots[*index],
        }
    }
}

fn slots<C: FromIterator<Counter>>() -> C {
    (0..SLOTS_PER_LEVEL).map(|_| Counter::new()).collect()
}

/// 32-bit FNV-1a.
fn fnv32a(key: &str) -> u32 {
    key.bytes().fold(0x811c_9dc5, |hash, b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

/// Slot that `key` maps to in every severity's table.
pub fn slot_index(key: &str) -> usize {
    fnv32a(key) as usize % SLOTS_PER_LEVEL
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub fn new() -> Self {
        Self {
            debug: slots(),
            info: slots(),
            warn: slots(),
            error: slots(),
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Return the counter shared by all keys that hash to `key`'s slot at
    /// `severity`.
    pub fn get(&self, severity: Severity, key: &str) -> CounterRef<'_> {
        let index = slot_index(key);
        match severity {
            Severity::DEBUG => CounterRef::Fixed(&self.debug[index]),
            Severity::INFO => CounterRef::Fixed(&self.info[index]),
            Severity::WARN => CounterRef::Fixed(&self.warn[index]),
            Severity::ERROR => CounterRef::Fixed(&self.error[index]),
            _ => CounterRef::Custom {
                slots: self.custom_slots(severity),
                index,
            },
        }
    }

    fn custom_slots(&self, severity: Severity) -> Arc<[Counter]> {
        // The map only grows, so a poisoned lock still guards valid tables.
        if let Some(slots) = self
            .custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&severity)
        {
            return slots.clone();
        }

        let mut custom = self.custom.write().unwrap_or_else(PoisonError::into_inner);
        custom.entry(severity).or_insert_with(slots).clone()
    }

    /// Number of custom severities that have a table.
    pub fn custom_levels(&self) -> usize {
        self.custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
