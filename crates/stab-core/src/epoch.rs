//! Epoch clock and per-epoch activity accumulators.
//!
//! An epoch is a fixed-duration window. The clock only moves forward, and
//! only when `now - start >= duration`; replaying the same or an earlier
//! `now` is a no-op.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Result of advancing the clock past one or more epoch boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochRollover {
    pub from_index: u64,
    pub to_index: u64,
    pub new_start: Timestamp,
}

impl EpochRollover {
    pub fn epochs_advanced(&self) -> u64 {
        self.to_index - self.from_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    index: u64,
    start: Timestamp,
    duration: u64,
}

impl EpochClock {
    /// Start epoch 0 at `start`. A zero duration is treated as one second.
    pub fn new(start: Timestamp, duration: u64) -> Self {
        Self {
            index: 0,
            start,
            duration: duration.max(1),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Change the duration for subsequent boundaries; the current epoch keeps
    /// its start.
    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration.max(1);
    }

    /// Advance to the epoch containing `now`, if a boundary has been crossed.
    ///
    /// Skips directly over any number of whole epochs. Idempotent: calling
    /// again with the same `now` returns `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stab_core::epoch::EpochClock;
    ///
    /// let mut clock = EpochClock::new(0, 100);
    /// assert!(clock.advance(99).is_none());
    /// let r = clock.advance(350).unwrap();
    /// assert_eq!((r.from_index, r.to_index, r.new_start), (0, 3, 300));
    /// assert!(clock.advance(350).is_none());
    /// ```
    pub fn advance(&mut self, now: Timestamp) -> Option<EpochRollover> {
        let elapsed = now.checked_sub(self.start)?;
        if elapsed < self.duration {
            return None;
        }
        let steps = elapsed / self.duration;
        let from_index = self.index;
        self.index = self.index.saturating_add(steps);
        self.start = self
            .start
            .saturating_add(steps.saturating_mul(self.duration));
        Some(EpochRollover {
            from_index,
            to_index: self.index,
            new_start: self.start,
        })
    }
}

/// Activity accumulated during the current epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: u64,
    pub transfer_count: u64,
    pub transfer_volume: u64,
    /// Distinct senders that committed at least one transfer.
    pub active_senders: u64,
    pub cross_chain_volume: u64,
    pub fees_collected: u64,
}

impl EpochStats {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }
}
