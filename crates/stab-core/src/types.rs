//! Core data model: accounts, transfer history, risk state, and the
//! published network health snapshot.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_RISK_SCORE, MAX_VIOLATION_LOG, PPM, RISK_TIER_COUNT};

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Opaque account identifier.
///
/// Ordered so that multi-account operations can lock accounts in a
/// deterministic total order.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a foreign chain reported by the bridge collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub String);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Transfer history
// ---------------------------------------------------------------------------

/// Direction of a transfer relative to the account that records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A single transfer as seen from one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub amount: u64,
    pub timestamp: Timestamp,
    pub counterparty: AccountId,
    pub direction: Direction,
}

/// Bounded ring buffer of recent transfer events, oldest first.
///
/// # Invariants
///
/// * `len() <= capacity` passed to the last [`push`](Self::push)
/// * events are ordered by insertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferHistory {
    events: VecDeque<TransferEvent>,
}

impl TransferHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, then evict events older than `window_secs` before the
    /// event's timestamp and trim from the front down to `capacity`.
    pub fn push(&mut self, event: TransferEvent, capacity: usize, window_secs: u64) {
        let cutoff = event.timestamp.saturating_sub(window_secs);
        self.events.push_back(event);
        while self.events.front().is_some_and(|e| e.timestamp < cutoff) {
            self.events.pop_front();
        }
        while self.events.len() > capacity {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TransferEvent> {
        self.events.iter()
    }

    pub fn outbound(&self) -> impl DoubleEndedIterator<Item = &TransferEvent> {
        self.events
            .iter()
            .filter(|e| e.direction == Direction::Outbound)
    }

    pub fn last(&self) -> Option<&TransferEvent> {
        self.events.back()
    }
}

// ---------------------------------------------------------------------------
// Settlement (fiat on/off-ramp) totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementDirection {
    /// Fiat converted into tokens.
    Onramp,
    /// Tokens converted into fiat.
    Offramp,
}

/// Cumulative verified settlement volume for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    pub onramp: u64,
    pub offramp: u64,
}

impl SettlementTotals {
    pub fn record(&mut self, direction: SettlementDirection, amount: u64) {
        match direction {
            SettlementDirection::Onramp => self.onramp = self.onramp.saturating_add(amount),
            SettlementDirection::Offramp => self.offramp = self.offramp.saturating_add(amount),
        }
    }

    /// Fiat activity ratio `offramp / onramp` in parts-per-million.
    ///
    /// No onramp volume yields 0 (no verified usage), regardless of offramp.
    ///
    /// # Examples
    ///
    /// ```
    /// use stab_core::types::SettlementTotals;
    ///
    /// let t = SettlementTotals { onramp: 200, offramp: 100 };
    /// assert_eq!(t.fiat_ratio_ppm(), 500_000);
    /// assert_eq!(SettlementTotals::default().fiat_ratio_ppm(), 0);
    /// ```
    pub fn fiat_ratio_ppm(&self) -> u64 {
        if self.onramp == 0 {
            return 0;
        }
        let ratio = self.offramp as u128 * PPM as u128 / self.onramp as u128;
        ratio.min(u64::MAX as u128) as u64
    }
}

// ---------------------------------------------------------------------------
// Risk state
// ---------------------------------------------------------------------------

/// Persisted composite risk score for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskState {
    /// Composite score in `0..=MAX_RISK_SCORE`.
    pub score: u16,
    pub updated_at: Timestamp,
}

impl RiskState {
    /// Set the score, clamping to `0..=MAX_RISK_SCORE`.
    pub fn set(&mut self, score: u64, now: Timestamp) {
        self.score = score.min(MAX_RISK_SCORE as u64) as u16;
        self.updated_at = now;
    }
}

/// Discrete band derived from a risk score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskBand {
    None,
    Tier1,
    Tier2,
    Tier3,
}

impl RiskBand {
    /// Index into per-band tables (`None == 0`).
    pub fn index(self) -> usize {
        match self {
            Self::None => 0,
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
        }
    }

    pub fn is_violation(self) -> bool {
        self != Self::None
    }

    /// Band for `score` given ascending tier thresholds.
    ///
    /// # Examples
    ///
    /// ```
    /// use stab_core::types::RiskBand;
    ///
    /// let t = [300, 500, 800];
    /// assert_eq!(RiskBand::from_score(299, &t), RiskBand::None);
    /// assert_eq!(RiskBand::from_score(300, &t), RiskBand::Tier1);
    /// assert_eq!(RiskBand::from_score(1000, &t), RiskBand::Tier3);
    /// ```
    pub fn from_score(score: u16, thresholds: &[u16; RISK_TIER_COUNT]) -> Self {
        match thresholds.iter().filter(|&&t| score >= t).count() {
            0 => Self::None,
            1 => Self::Tier1,
            2 => Self::Tier2,
            _ => Self::Tier3,
        }
    }
}

/// Behavioral signals derived from a transfer history, each `0..=MAX_RISK_SCORE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub velocity: u16,
    pub concentration: u16,
    pub reciprocity: u16,
}

/// Timestamps of penalized transfers, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationLog {
    at: VecDeque<Timestamp>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, now: Timestamp) {
        self.at.push_back(now);
        while self.at.len() > MAX_VIOLATION_LOG {
            self.at.pop_front();
        }
    }

    /// Violations strictly inside `(now - window_secs, now]`.
    pub fn count_within(&self, now: Timestamp, window_secs: u64) -> u32 {
        let cutoff = now.saturating_sub(window_secs);
        self.at
            .iter()
            .filter(|&&t| t > cutoff && t <= now)
            .count() as u32
    }

    pub fn len(&self) -> usize {
        self.at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.at.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Ledger entry for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Raw balance in the smallest unit, before lazy decay.
    pub balance: u64,
    /// Anchor for both the grace period and elapsed decay.
    pub last_activity: Timestamp,
    /// Reserve / treasury accounts: never decay, never penalized.
    pub exempt: bool,
    pub settlement: SettlementTotals,
    pub history: TransferHistory,
    pub risk: RiskState,
    pub violations: ViolationLog,
}

impl Account {
    pub fn new(id: AccountId, now: Timestamp) -> Self {
        Self {
            id,
            balance: 0,
            last_activity: now,
            exempt: false,
            settlement: SettlementTotals::default(),
            history: TransferHistory::new(),
            risk: RiskState {
                score: 0,
                updated_at: now,
            },
            violations: ViolationLog::new(),
        }
    }

    pub fn exempt(id: AccountId, now: Timestamp) -> Self {
        Self {
            exempt: true,
            ..Self::new(id, now)
        }
    }
}

/// Read-only summary of an account at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub raw_balance: u64,
    pub effective_balance: u64,
    pub last_activity: Timestamp,
    pub exempt: bool,
    pub fiat_ratio_ppm: u64,
    pub risk_score: u16,
    pub history_len: usize,
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

/// Circuit breaker state, ordered from healthiest to most degraded.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub enum BreakerState {
    #[default]
    Normal,
    Congested,
    Emergency,
    Halted,
}

impl BreakerState {
    /// One level healthier; `Normal` stays `Normal`.
    pub fn healthier(self) -> Self {
        match self {
            Self::Normal | Self::Congested => Self::Normal,
            Self::Emergency => Self::Congested,
            Self::Halted => Self::Emergency,
        }
    }

    /// One level more degraded; `Halted` stays `Halted`.
    pub fn degraded(self) -> Self {
        match self {
            Self::Normal => Self::Congested,
            Self::Congested => Self::Emergency,
            Self::Emergency | Self::Halted => Self::Halted,
        }
    }
}

/// Classification of a mutating request for breaker gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Transfer,
    LargeTransfer,
    /// Value leaving the engine's liquidity (bridge outbound).
    LiquidityWithdrawal,
    /// Value entering from outside (bridge inbound).
    Deposit,
    /// Fiat onramp/offramp settlement report.
    Settlement,
    /// Owner-gated controls: configuration and treasury credits.
    EmergencyControl,
}

// ---------------------------------------------------------------------------
// Network health
// ---------------------------------------------------------------------------

/// Observed network metrics fed to a health tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub participants_observed: u64,
    pub participants_target: u64,
    pub volume_observed: u64,
    pub volume_target: u64,
    pub reserve_observed: u64,
    pub reserve_required: u64,
    /// Signed market pressure in ppm; floored at `-PPM`.
    pub market_pressure_ppm: i64,
    /// Host performance multiplier in BPS (`BPS` == 1.0x).
    pub performance_bps: u64,
    pub cross_chain_volume: u64,
}

/// Exact three-way split of collected fees.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct FeeSplit {
    pub host: u64,
    pub pool: u64,
    pub reserve: u64,
}

impl FeeSplit {
    pub fn total(&self) -> u64 {
        self.host.saturating_add(self.pool).saturating_add(self.reserve)
    }
}

/// Versioned, immutable output of one health tick.
///
/// Readers hold an `Arc` of this for the whole duration of a transfer
/// evaluation; it is never mutated after publication.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct NetworkHealthSnapshot {
    /// Monotonic publication counter, 0 for the genesis snapshot.
    pub version: u64,
    pub epoch: u64,
    pub computed_at: Timestamp,
    pub participant_ratio_ppm: u64,
    pub volume_ratio_ppm: u64,
    pub reserve_ratio_ppm: u64,
    /// Liquidity Health Index in ppm, `0..=PPM`.
    pub lhi_ppm: u64,
    pub breaker: BreakerState,
    /// Per-transfer base fee in the smallest unit.
    pub dynamic_fee: u64,
    pub host_reward: u64,
    /// Split of one `dynamic_fee`.
    pub fee_split: FeeSplit,
}

impl NetworkHealthSnapshot {
    /// Snapshot in force before the first tick: fully healthy, base fee.
    pub fn genesis(base_fee: u64, fee_split: FeeSplit) -> Self {
        Self {
            version: 0,
            epoch: 0,
            computed_at: 0,
            participant_ratio_ppm: PPM,
            volume_ratio_ppm: PPM,
            reserve_ratio_ppm: PPM,
            lhi_ppm: PPM,
            breaker: BreakerState::Normal,
            dynamic_fee: base_fee,
            host_reward: fee_split.host,
            fee_split,
        }
    }

    /// BLAKE3 digest of the canonical bincode encoding.
    ///
    /// Two parties that derive a snapshot from the same inputs obtain the same
    /// digest, which makes published snapshots auditable.
    pub fn digest(&self) -> [u8; 32] {
        // Encoding a plain struct of integers into a Vec cannot fail.
        let bytes = bincode::encode_to_vec(self, bincode::config::standard()).unwrap_or_default();
        blake3::hash(&bytes).into()
    }
}

// ---------------------------------------------------------------------------
// Transfer receipt
// ---------------------------------------------------------------------------

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: u64,
    pub base_fee: u64,
    pub surcharge: u64,
    pub risk_score: u16,
    pub band: RiskBand,
    pub sender_effective_balance: u64,
    pub recipient_effective_balance: u64,
    pub breaker: BreakerState,
    pub snapshot_version: u64,
}

impl TransferReceipt {
    pub fn total_fee(&self) -> u64 {
        self.base_fee.saturating_add(self.surcharge)
    }
}
