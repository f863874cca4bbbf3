//! Display counter for the progress collection.
//!
//! `current` moves optimistically when a mutation starts. The change is held
//! by a [`CounterGuard`] and undone when the guard is dropped without being
//! committed, so a failed add or delete leaves the counter where it was.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Sizes of the externally known curriculum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curriculum {
    pub cultural: i64,
    pub profession: i64,
}

impl Curriculum {
    pub fn new(cultural: i64, profession: i64) -> Self {
        Self {
            cultural,
            profession,
        }
    }

    pub fn total(&self) -> i64 {
        self.cultural + self.profession
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub current: i64,
    pub total: i64,
}

#[derive(Debug, Default)]
pub struct ProgressCounter {
    current: AtomicI64,
    total: AtomicI64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            current: self.current.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }

    pub fn set_current(&self, current: i64) {
        self.current.store(current, Ordering::SeqCst);
    }

    pub fn set(&self, snapshot: CounterSnapshot) {
        self.current.store(snapshot.current, Ordering::SeqCst);
        self.total.store(snapshot.total, Ordering::SeqCst);
    }

    /// Apply `delta` to `current` now; undone on drop unless committed.
    pub fn adjust(&self, delta: i64) -> CounterGuard<'_> {
        self.current.fetch_add(delta, Ordering::SeqCst);
        CounterGuard {
            counter: self,
            delta,
            armed: true,
        }
    }
}

#[must_use = "dropping the guard immediately rolls the adjustment back"]
pub struct CounterGuard<'a> {
    counter: &'a ProgressCounter,
    delta: i64,
    armed: bool,
}

impl CounterGuard<'_> {
    /// Keep the full adjustment.
    pub fn commit(self) {
        let delta = self.delta;
        self.settle(delta);
    }

    /// Keep only `applied` of the adjustment, e.g. when a batch turned out to
    /// add fewer records than requested.
    pub fn settle(mut self, applied: i64) {
        let correction = applied - self.delta;
        if correction != 0 {
            self.counter.current.fetch_add(correction, Ordering::SeqCst);
        }
        self.armed = false;
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.counter.current.fetch_sub(self.delta, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rolls_back_on_drop() {
        let counter = ProgressCounter::new();
        counter.set_current(5);

        {
            let _guard = counter.adjust(1);
            assert_eq!(counter.snapshot().current, 6);
        }

        assert_eq!(counter.snapshot().current, 5);
    }

    #[test]
    fn test_commit_and_settle() {
        let counter = ProgressCounter::new();

        counter.adjust(1).commit();
        assert_eq!(counter.snapshot().current, 1);

        counter.adjust(3).settle(1);
        assert_eq!(counter.snapshot().current, 2);

        counter.adjust(-1).commit();
        assert_eq!(counter.snapshot().current, 1);
    }

    #[test]
    fn test_curriculum_total() {
        let counter = ProgressCounter::new();
        let curriculum = Curriculum::new(120, 80);

        counter.set(CounterSnapshot {
            current: 3,
            total: curriculum.total(),
        });

        assert_eq!(
            counter.snapshot(),
            CounterSnapshot {
                current: 3,
                total: 200
            }
        );
    }
}
