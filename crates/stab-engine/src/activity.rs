//! Epoch clock plus per-epoch activity accumulators.

use std::collections::HashSet;

use parking_lot::Mutex;
use stab_core::epoch::{EpochClock, EpochRollover, EpochStats};
use stab_core::types::{AccountId, Timestamp};
use tracing::info;

struct Inner {
    clock: EpochClock,
    stats: EpochStats,
    senders: HashSet<AccountId>,
}

impl Inner {
    fn advance(&mut self, now: Timestamp) -> Option<EpochRollover> {
        let rollover = self.clock.advance(now)?;
        info!(
            from = rollover.from_index,
            to = rollover.to_index,
            transfers = self.stats.transfer_count,
            volume = self.stats.transfer_volume,
            fees = self.stats.fees_collected,
            "epoch rolled over"
        );
        self.stats = EpochStats::new(rollover.to_index);
        self.senders.clear();
        Some(rollover)
    }
}

pub struct EpochTracker {
    inner: Mutex<Inner>,
}

impl EpochTracker {
    pub fn new(start: Timestamp, duration: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                clock: EpochClock::new(start, duration),
                stats: EpochStats::new(0),
                senders: HashSet::new(),
            }),
        }
    }

    /// Move to the epoch containing `now`, resetting the accumulators.
    pub fn advance(&self, now: Timestamp) -> Option<EpochRollover> {
        self.inner.lock().advance(now)
    }

    pub fn current_epoch(&self) -> u64 {
        self.inner.lock().clock.index()
    }

    pub fn set_duration(&self, duration: u64) {
        self.inner.lock().clock.set_duration(duration);
    }

    pub fn stats(&self) -> EpochStats {
        self.inner.lock().stats.clone()
    }

    /// Record a committed transfer.
    pub fn record_transfer(
        &self,
        sender: &AccountId,
        amount: u64,
        fees: u64,
        cross_chain: bool,
        now: Timestamp,
    ) {
        let mut inner = self.inner.lock();
        inner.advance(now);
        if !inner.senders.contains(sender) {
            inner.senders.insert(sender.clone());
        }
        let active = inner.senders.len() as u64;
        let s = &mut inner.stats;
        s.transfer_count = s.transfer_count.saturating_add(1);
        s.transfer_volume = s.transfer_volume.saturating_add(amount);
        s.fees_collected = s.fees_collected.saturating_add(fees);
        s.active_senders = active;
        if cross_chain {
            s.cross_chain_volume = s.cross_chain_volume.saturating_add(amount);
        }
    }

    /// Record value arriving from another chain.
    pub fn record_inbound_bridge(&self, amount: u64, now: Timestamp) {
        let mut inner = self.inner.lock();
        inner.advance(now);
        inner.stats.cross_chain_volume = inner.stats.cross_chain_volume.saturating_add(amount);
    }
}
