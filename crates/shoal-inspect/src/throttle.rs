//! Per-kind refresh throttling
//!
//! Each cached kind has one timer gate deciding whether a refresh is due.
//! `delay` arms the gate for one interval, `invalidate` forces due-now, and
//! `copy` snapshots the state so a refresh can work on a fork and discard
//! its delays if the refresh fails.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::kinds::{ObjectKind, ALL_KINDS};

#[derive(Debug, Clone, Copy, Default)]
struct ThrottleInner {
    /// None means "always due".
    next_allowed: Option<Instant>,
    count: u64,
}

/// A single timer gate.
///
/// A zero interval produces an always-due throttle, used to force
/// unconditional refresh.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    inner: Mutex<ThrottleInner>,
}

impl Throttle {
    /// Create a gate with the given interval. Zero means always due.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            inner: Mutex::new(ThrottleInner::default()),
        }
    }

    /// Create an always-due gate.
    pub fn always_due() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Arm the gate to become due again only after the configured interval,
    /// incrementing the invocation counter.
    pub fn delay(&self) {
        let mut inner = self.lock();
        inner.count += 1;
        if !self.interval.is_zero() {
            inner.next_allowed = Some(Instant::now() + self.interval);
        }
    }

    /// Whether a refresh is due now.
    pub fn throttle(&self) -> bool {
        let inner = self.lock();
        match inner.next_allowed {
            None => true,
            Some(next) => next <= Instant::now(),
        }
    }

    /// Force due-now irrespective of prior arming.
    pub fn invalidate(&self) {
        self.lock().next_allowed = None;
    }

    /// Invocation count so far.
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// Clone the current state into an independent gate.
    pub fn copy(&self) -> Throttle {
        Self {
            interval: self.interval,
            inner: Mutex::new(*self.lock()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleInner> {
        // Inner state is plain data; a poisoned lock can only come from a
        // panic between load and store of two Copy fields.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One throttle per cached kind.
#[derive(Debug)]
pub struct ThrottleSet {
    throttles: HashMap<ObjectKind, Throttle>,
    fallback: Throttle,
}

impl ThrottleSet {
    /// Build a set from per-kind intervals; kinds absent from the map get an
    /// always-due gate.
    pub fn new(intervals: &HashMap<ObjectKind, Duration>) -> Self {
        let throttles = ALL_KINDS
            .iter()
            .map(|k| {
                let interval = intervals.get(k).copied().unwrap_or(Duration::ZERO);
                (*k, Throttle::new(interval))
            })
            .collect();
        Self {
            throttles,
            fallback: Throttle::always_due(),
        }
    }

    /// A set where every kind is always due.
    pub fn always_due() -> Self {
        Self::new(&HashMap::new())
    }

    /// Gate for one kind.
    pub fn get(&self, kind: ObjectKind) -> &Throttle {
        self.throttles.get(&kind).unwrap_or(&self.fallback)
    }

    /// Force several kinds due-now.
    pub fn invalidate(&self, kinds: &[ObjectKind]) {
        for kind in kinds {
            self.get(*kind).invalidate();
        }
    }

    /// Per-kind invocation counts.
    pub fn counts(&self) -> HashMap<ObjectKind, u64> {
        self.throttles
            .iter()
            .map(|(k, t)| (*k, t.count()))
            .collect()
    }

    /// Clone the whole set's state, used when forking for a refresh.
    pub fn copy(&self) -> ThrottleSet {
        Self {
            throttles: self
                .throttles
                .iter()
                .map(|(k, t)| (*k, t.copy()))
                .collect(),
            fallback: self.fallback.copy(),
        }
    }
}
