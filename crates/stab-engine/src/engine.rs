//! Engine facade composing ledger, decay, risk, penalties and health.
//!
//! A transfer runs decay → risk scoring → penalty → breaker gate → commit.
//! Everything before commit reads from locked accounts and a single
//! config/snapshot pair cloned at the start of the attempt; nothing is
//! written until every check has passed, so a rejected transfer leaves no
//! trace.

use std::sync::Arc;

use parking_lot::RwLock;
use stab_core::config::{ConfigOption, EngineConfig};
use stab_core::epoch::EpochStats;
use stab_core::error::{ConfigError, StabilityError, TransferError};
use stab_core::types::{
    Account, AccountId, AccountView, ChainId, Direction, FeeSplit, NetworkHealthSnapshot,
    NetworkMetrics, OperationKind, RiskBand, RiskState, SettlementDirection, Timestamp,
    TransferEvent, TransferHistory, TransferReceipt,
};
use stab_decay::DemurrageEngine;
use stab_health::{breaker, oracle, FeePool, HealthMonitor};
use stab_risk::{signals, PenaltyEngine, RiskScorer};
use tracing::{debug, info, warn};

use crate::activity::EpochTracker;
use crate::ledger::{lock_pair, AccountHandle, Ledger};

/// Prefix of the exempt escrow account that holds value bridged out to a chain.
pub const BRIDGE_ESCROW_PREFIX: &str = "bridge:";

pub fn bridge_escrow(chain: &ChainId) -> AccountId {
    AccountId::new(format!("{BRIDGE_ESCROW_PREFIX}{chain}"))
}

/// Escrow ids are only ever credited through `bridge_outbound`.
fn reject_escrow(to: &AccountId) -> Result<(), TransferError> {
    if to.as_str().starts_with(BRIDGE_ESCROW_PREFIX) {
        warn!(%to, "credit to bridge escrow outside the bridge");
        return Err(TransferError::ReservedAccount(to.clone()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Local,
    BridgeOut,
}

/// Sender-side result of evaluating a transfer. Applied only on commit.
struct DebitPlan {
    new_balance: u64,
    history: TransferHistory,
    risk: Option<RiskState>,
    violation: bool,
    base_fee: u64,
    surcharge: u64,
    risk_score: u16,
    band: RiskBand,
}

impl DebitPlan {
    fn apply(self, sender: &mut Account, now: Timestamp) {
        sender.balance = self.new_balance;
        sender.last_activity = sender.last_activity.max(now);
        sender.history = self.history;
        if let Some(risk) = self.risk {
            sender.risk = risk;
        }
        if self.violation {
            sender.violations.record(now);
        }
    }
}

fn inbound(from: &AccountId, amount: u64, now: Timestamp) -> TransferEvent {
    TransferEvent {
        amount,
        timestamp: now,
        counterparty: from.clone(),
        direction: Direction::Inbound,
    }
}

/// The token economic stability engine.
pub struct StabilityEngine {
    owner: AccountId,
    config: RwLock<Arc<EngineConfig>>,
    ledger: Ledger,
    monitor: HealthMonitor,
    epochs: EpochTracker,
    fees: FeePool,
    decay: DemurrageEngine,
    scorer: RiskScorer,
    penalties: PenaltyEngine,
}

impl StabilityEngine {
    /// Create an engine owned by `owner`, with epoch 0 starting at `genesis`.
    pub fn new(owner: AccountId, config: EngineConfig, genesis: Timestamp) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(%owner, genesis, "stability engine initialized");
        Ok(Self {
            owner,
            monitor: HealthMonitor::new(&config),
            epochs: EpochTracker::new(genesis, config.epoch_duration_secs),
            config: RwLock::new(Arc::new(config)),
            ledger: Ledger::new(),
            fees: FeePool::new(),
            decay: DemurrageEngine::new(),
            scorer: RiskScorer::new(),
            penalties: PenaltyEngine::new(),
        })
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Active configuration.
    pub fn config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn account(&self, id: &AccountId) -> Result<AccountHandle, TransferError> {
        self.ledger
            .get(id)
            .ok_or_else(|| TransferError::UnknownAccount(id.clone()))
    }

    fn require_owner(&self, caller: &AccountId) -> Result<(), TransferError> {
        if caller != &self.owner {
            warn!(%caller, "unauthorized owner operation");
            return Err(TransferError::Unauthorized(caller.clone()));
        }
        Ok(())
    }

    // --- transfers ---

    /// Move `amount` from `from` to `to`, charging the dynamic fee plus any
    /// risk surcharge. Creates `to` if it does not exist yet.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
        now: Timestamp,
    ) -> Result<TransferReceipt, StabilityError> {
        self.execute(from, to, amount, now, Route::Local)
    }

    /// Send `amount` from `from` to the escrow of `destination`.
    ///
    /// Runs the full transfer pipeline but is gated as a liquidity
    /// withdrawal.
    pub fn bridge_outbound(
        &self,
        from: &AccountId,
        destination: &ChainId,
        amount: u64,
        now: Timestamp,
    ) -> Result<TransferReceipt, StabilityError> {
        let escrow = bridge_escrow(destination);
        let receipt = self.execute(from, &escrow, amount, now, Route::BridgeOut)?;
        info!(%from, %destination, amount, "bridged out");
        Ok(receipt)
    }

    fn execute(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
        now: Timestamp,
        route: Route,
    ) -> Result<TransferReceipt, StabilityError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount.into());
        }
        if from == to {
            return Err(TransferError::SelfTransfer(from.clone()).into());
        }
        if route == Route::Local {
            reject_escrow(to)?;
        }

        loop {
            let config = self.config();
            let snapshot = self.monitor.snapshot();
            let operation = match route {
                Route::BridgeOut => OperationKind::LiquidityWithdrawal,
                Route::Local => breaker::classify_transfer(amount, &config),
            };
            breaker::gate(snapshot.breaker, snapshot.lhi_ppm, operation)?;

            let sender = self.account(from)?;
            let committed = match self.ledger.get(to) {
                Some(recipient) => Some(self.commit_existing(
                    (from, &sender),
                    (to, &recipient),
                    amount,
                    now,
                    &config,
                    &snapshot,
                )?),
                None => self.commit_new(
                    (from, &sender),
                    to,
                    amount,
                    now,
                    route,
                    &config,
                    &snapshot,
                )?,
            };

            let Some(receipt) = committed else {
                debug!(%to, "recipient created concurrently; retrying transfer");
                continue;
            };

            let fee = receipt.total_fee();
            self.fees.deposit(oracle::split_fee(fee, &config));
            self.epochs
                .record_transfer(from, amount, fee, route == Route::BridgeOut, now);
            debug!(
                %from,
                %to,
                amount,
                base_fee = receipt.base_fee,
                surcharge = receipt.surcharge,
                risk_score = receipt.risk_score,
                band = ?receipt.band,
                snapshot = receipt.snapshot_version,
                "transfer committed"
            );
            return Ok(receipt);
        }
    }

    fn commit_existing(
        &self,
        sender: (&AccountId, &AccountHandle),
        recipient: (&AccountId, &AccountHandle),
        amount: u64,
        now: Timestamp,
        config: &EngineConfig,
        snapshot: &NetworkHealthSnapshot,
    ) -> Result<TransferReceipt, StabilityError> {
        let (mut s, mut r) = lock_pair(sender, recipient);
        let plan = self.plan_debit(&s, recipient.0, amount, now, config, snapshot)?;
        let credited = self
            .decay
            .effective_balance(&r, now, config)
            .checked_add(amount)
            .ok_or(TransferError::ArithmeticOverflow)?;

        let receipt = self.receipt(sender.0, recipient.0, amount, &plan, credited, snapshot);
        plan.apply(&mut s, now);
        self.decay.realize(&mut r, now, config);
        r.balance = credited;
        r.history.push(
            inbound(sender.0, amount, now),
            config.history_capacity,
            config.history_window_secs,
        );
        Ok(receipt)
    }

    /// Commit to a recipient that did not exist when the attempt started.
    /// Returns `Ok(None)` if another writer created it first.
    #[allow(clippy::too_many_arguments)]
    fn commit_new(
        &self,
        sender: (&AccountId, &AccountHandle),
        to: &AccountId,
        amount: u64,
        now: Timestamp,
        route: Route,
        config: &EngineConfig,
        snapshot: &NetworkHealthSnapshot,
    ) -> Result<Option<TransferReceipt>, StabilityError> {
        let mut s = sender.1.lock();
        let plan = self.plan_debit(&s, to, amount, now, config, snapshot)?;

        self.ledger
            .insert_with(to, || {
                let mut account = match route {
                    Route::BridgeOut => Account::exempt(to.clone(), now),
                    Route::Local => Account::new(to.clone(), now),
                };
                account.balance = amount;
                account.history.push(
                    inbound(sender.0, amount, now),
                    config.history_capacity,
                    config.history_window_secs,
                );
                let receipt = self.receipt(sender.0, to, amount, &plan, amount, snapshot);
                plan.apply(&mut s, now);
                Ok::<_, StabilityError>((account, receipt))
            })
            .transpose()
    }

    fn plan_debit(
        &self,
        sender: &Account,
        to: &AccountId,
        amount: u64,
        now: Timestamp,
        config: &EngineConfig,
        snapshot: &NetworkHealthSnapshot,
    ) -> Result<DebitPlan, StabilityError> {
        let available = self.decay.effective_balance(sender, now, config);
        let base_fee = snapshot.dynamic_fee;
        let event = TransferEvent {
            amount,
            timestamp: now,
            counterparty: to.clone(),
            direction: Direction::Outbound,
        };

        let plan = if sender.exempt {
            DebitPlan {
                new_balance: 0,
                history: signals::with_event(&sender.history, event, config),
                risk: None,
                violation: false,
                base_fee,
                surcharge: 0,
                risk_score: 0,
                band: RiskBand::None,
            }
        } else {
            let assessment = self.scorer.record_and_score(sender, event, config);
            let penalty =
                self.penalties
                    .assess(sender, assessment.score, base_fee, amount, now, config)?;
            DebitPlan {
                new_balance: 0,
                history: assessment.history,
                risk: Some(assessment.state),
                violation: penalty.is_violation(),
                base_fee,
                surcharge: penalty.surcharge,
                risk_score: assessment.score,
                band: penalty.band,
            }
        };

        let required = amount
            .checked_add(plan.base_fee)
            .and_then(|v| v.checked_add(plan.surcharge))
            .ok_or(TransferError::ArithmeticOverflow)?;
        if available < required {
            debug!(
                account = %sender.id,
                available,
                required,
                "insufficient effective balance"
            );
            return Err(TransferError::InsufficientEffectiveBalance {
                available,
                required,
            }
            .into());
        }
        Ok(DebitPlan {
            new_balance: available - required,
            ..plan
        })
    }

    fn receipt(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
        plan: &DebitPlan,
        recipient_balance: u64,
        snapshot: &NetworkHealthSnapshot,
    ) -> TransferReceipt {
        TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            base_fee: plan.base_fee,
            surcharge: plan.surcharge,
            risk_score: plan.risk_score,
            band: plan.band,
            sender_effective_balance: plan.new_balance,
            recipient_effective_balance: recipient_balance,
            breaker: snapshot.breaker,
            snapshot_version: snapshot.version,
        }
    }

    // --- credits ---

    /// Realize the recipient's decay, then add `amount`. Creates the account
    /// if needed. Returns the new balance.
    fn deposit(
        &self,
        to: &AccountId,
        amount: u64,
        now: Timestamp,
        config: &EngineConfig,
    ) -> Result<u64, StabilityError> {
        loop {
            if let Some(handle) = self.ledger.get(to) {
                let mut account = handle.lock();
                let credited = self
                    .decay
                    .effective_balance(&account, now, config)
                    .checked_add(amount)
                    .ok_or(TransferError::ArithmeticOverflow)?;
                self.decay.realize(&mut account, now, config);
                account.balance = credited;
                return Ok(credited);
            }
            let created = self.ledger.insert_with(to, || {
                let mut account = Account::new(to.clone(), now);
                account.balance = amount;
                Ok::<_, StabilityError>((account, amount))
            });
            if let Some(result) = created {
                return result;
            }
        }
    }

    /// Owner-only treasury credit. Allowed even while halted.
    pub fn credit(
        &self,
        caller: &AccountId,
        to: &AccountId,
        amount: u64,
        now: Timestamp,
    ) -> Result<u64, StabilityError> {
        self.require_owner(caller)?;
        if amount == 0 {
            return Err(TransferError::ZeroAmount.into());
        }
        reject_escrow(to)?;
        let snapshot = self.monitor.snapshot();
        breaker::gate(snapshot.breaker, snapshot.lhi_ppm, OperationKind::EmergencyControl)?;
        let balance = self.deposit(to, amount, now, &self.config())?;
        info!(%to, amount, balance, "owner credit");
        Ok(balance)
    }

    /// Value arriving from `source` via the bridge.
    pub fn bridge_inbound(
        &self,
        to: &AccountId,
        source: &ChainId,
        amount: u64,
        now: Timestamp,
    ) -> Result<u64, StabilityError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount.into());
        }
        reject_escrow(to)?;
        let snapshot = self.monitor.snapshot();
        breaker::gate(snapshot.breaker, snapshot.lhi_ppm, OperationKind::Deposit)?;
        let balance = self.deposit(to, amount, now, &self.config())?;
        self.epochs.record_inbound_bridge(amount, now);
        debug!(%to, %source, amount, balance, "bridged in");
        Ok(balance)
    }

    /// Owner-only creation of a reserve or treasury account.
    pub fn open_exempt_account(
        &self,
        caller: &AccountId,
        id: &AccountId,
        now: Timestamp,
    ) -> Result<(), StabilityError> {
        self.require_owner(caller)?;
        if !self.ledger.insert_new(Account::exempt(id.clone(), now)) {
            return Err(TransferError::AccountExists(id.clone()).into());
        }
        info!(%id, "opened exempt account");
        Ok(())
    }

    /// Record verified fiat settlement volume. Returns the updated
    /// offramp/onramp ratio in ppm.
    pub fn report_settlement(
        &self,
        id: &AccountId,
        amount: u64,
        direction: SettlementDirection,
        now: Timestamp,
    ) -> Result<u64, StabilityError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount.into());
        }
        let snapshot = self.monitor.snapshot();
        breaker::gate(snapshot.breaker, snapshot.lhi_ppm, OperationKind::Settlement)?;
        let handle = self.account(id)?;
        let mut account = handle.lock();
        account.settlement.record(direction, amount);
        let ratio = account.settlement.fiat_ratio_ppm();
        debug!(%id, amount, ?direction, ratio_ppm = ratio, now, "settlement reported");
        Ok(ratio)
    }

    // --- reads ---

    pub fn effective_balance(&self, id: &AccountId, now: Timestamp) -> Result<u64, StabilityError> {
        let handle = self.account(id)?;
        let account = handle.lock();
        Ok(self.decay.effective_balance(&account, now, &self.config()))
    }

    pub fn account_view(&self, id: &AccountId, now: Timestamp) -> Result<AccountView, StabilityError> {
        let config = self.config();
        let handle = self.account(id)?;
        let account = handle.lock();
        Ok(AccountView {
            id: account.id.clone(),
            raw_balance: account.balance,
            effective_balance: self.decay.effective_balance(&account, now, &config),
            last_activity: account.last_activity,
            exempt: account.exempt,
            fiat_ratio_ppm: account.settlement.fiat_ratio_ppm(),
            risk_score: self.scorer.current_score(&account, now, &config),
            history_len: account.history.len(),
        })
    }

    pub fn network_health(&self) -> Arc<NetworkHealthSnapshot> {
        self.monitor.snapshot()
    }

    pub fn epoch_stats(&self) -> EpochStats {
        self.epochs.stats()
    }

    pub fn fee_pool(&self) -> FeeSplit {
        self.fees.totals()
    }

    // --- periodic / owner controls ---

    /// Run one health tick and publish the new snapshot.
    pub fn tick(&self, metrics: &NetworkMetrics, now: Timestamp) -> Arc<NetworkHealthSnapshot> {
        let config = self.config();
        self.epochs.advance(now);
        self.monitor
            .tick(metrics, self.epochs.current_epoch(), now, &config)
    }

    /// Apply named options atomically. On error the previous configuration
    /// stays in force.
    pub fn set_configuration(
        &self,
        caller: &AccountId,
        options: &[ConfigOption],
    ) -> Result<Arc<EngineConfig>, ConfigError> {
        if caller != &self.owner {
            warn!(%caller, "unauthorized configuration update");
            return Err(ConfigError::Unauthorized(caller.clone()));
        }
        let mut slot = self.config.write();
        let next = slot.with_options(options).inspect_err(|e| {
            warn!(error = %e, "configuration update rejected");
        })?;
        self.epochs.set_duration(next.epoch_duration_secs);
        let next = Arc::new(next);
        *slot = Arc::clone(&next);
        info!(?options, "configuration updated");
        Ok(next)
    }
}
