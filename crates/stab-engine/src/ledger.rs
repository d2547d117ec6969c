//! Authoritative account store.
//!
//! Accounts live in a sharded concurrent map, each behind its own mutex, so
//! operations on unrelated accounts never contend. Accounts are created on
//! first credit and never removed.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use stab_core::types::{Account, AccountId};

pub type AccountHandle = Arc<Mutex<Account>>;

#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<AccountId, AccountHandle>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to an existing account. The map shard is released before the
    /// caller locks the account.
    pub fn get(&self, id: &AccountId) -> Option<AccountHandle> {
        self.accounts.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    /// Insert `account` only if its id is vacant. Returns `false` if another
    /// writer created it first.
    pub fn insert_new(&self, account: Account) -> bool {
        match self.accounts.entry(account.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(account)));
                true
            }
        }
    }

    /// Run `commit` while holding the vacant slot for `id`, then insert the
    /// account it returns. Returns `None` without calling `commit` if the id
    /// is already taken.
    ///
    /// `commit` must not touch the ledger.
    pub fn insert_with<T, E>(
        &self,
        id: &AccountId,
        commit: impl FnOnce() -> Result<(Account, T), E>,
    ) -> Option<Result<T, E>> {
        match self.accounts.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(commit().map(|(account, out)| {
                slot.insert(Arc::new(Mutex::new(account)));
                out
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Handles to every account. Shard guards are released before return.
    pub fn handles(&self) -> Vec<AccountHandle> {
        self.accounts.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Sum of raw balances. Accounts are locked one at a time after the map
    /// is released, so the total is exact only when the ledger is quiescent.
    pub fn total_raw_balance(&self) -> u128 {
        self.handles()
            .iter()
            .map(|h| h.lock().balance as u128)
            .sum()
    }
}

/// Lock two distinct accounts in id order.
///
/// Returns guards in `(first, second)` argument order regardless of the
/// order they were acquired in.
pub fn lock_pair<'a>(
    first: (&AccountId, &'a AccountHandle),
    second: (&AccountId, &'a AccountHandle),
) -> (MutexGuard<'a, Account>, MutexGuard<'a, Account>) {
    if first.0 <= second.0 {
        let a = first.1.lock();
        let b = second.1.lock();
        (a, b)
    } else {
        let b = second.1.lock();
        let a = first.1.lock();
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str, balance: u64) -> Account {
        let mut a = Account::new(AccountId::from(id), 0);
        a.balance = balance;
        a
    }

    #[test]
    fn insert_new_is_first_writer_wins() {
        let l = Ledger::new();
        assert!(l.insert_new(acct("a", 10)));
        assert!(!l.insert_new(acct("a", 99)));
        assert_eq!(l.get(&AccountId::from("a")).unwrap().lock().balance, 10);
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn insert_with_skips_commit_when_occupied() {
        let l = Ledger::new();
        l.insert_new(acct("a", 1));
        let mut called = false;
        let r: Option<Result<(), ()>> = l.insert_with(&AccountId::from("a"), || {
            called = true;
            Ok((acct("a", 2), ()))
        });
        assert!(r.is_none());
        assert!(!called);
    }

    #[test]
    fn insert_with_error_leaves_slot_vacant() {
        let l = Ledger::new();
        let r = l.insert_with::<(), &str>(&AccountId::from("b"), || Err("nope"));
        assert_eq!(r, Some(Err("nope")));
        assert!(!l.contains(&AccountId::from("b")));
    }

    #[test]
    fn lock_pair_returns_argument_order() {
        let l = Ledger::new();
        l.insert_new(acct("zed", 1));
        l.insert_new(acct("amy", 2));
        let z = l.get(&AccountId::from("zed")).unwrap();
        let a = l.get(&AccountId::from("amy")).unwrap();
        let (zg, ag) = lock_pair((&AccountId::from("zed"), &z), (&AccountId::from("amy"), &a));
        assert_eq!(zg.balance, 1);
        assert_eq!(ag.balance, 2);
    }

    #[test]
    fn totals_do_not_block_account_creation() {
        let l = Arc::new(Ledger::new());
        l.insert_new(acct("a", 7));
        let a = l.get(&AccountId::from("a")).unwrap();
        let held = a.lock();

        let summer = {
            let l = Arc::clone(&l);
            std::thread::spawn(move || l.total_raw_balance())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        // The summing thread is parked on `a`; every shard must stay writable.
        for i in 0..1_000 {
            assert!(l.insert_new(acct(&format!("new-{i}"), 1)));
        }
        drop(held);

        assert!(summer.join().unwrap() >= 7);
        assert_eq!(l.len(), 1_001);
    }

    #[test]
    fn opposing_pairs_do_not_deadlock() {
        let l = Arc::new(Ledger::new());
        l.insert_new(acct("a", 0));
        l.insert_new(acct("b", 0));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let l = Arc::clone(&l);
                std::thread::spawn(move || {
                    let (x, y) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                    let (xi, yi) = (AccountId::from(x), AccountId::from(y));
                    let (xh, yh) = (l.get(&xi).unwrap(), l.get(&yi).unwrap());
                    for _ in 0..1_000 {
                        let (mut g1, mut g2) = lock_pair((&xi, &xh), (&yi, &yh));
                        g1.balance += 1;
                        g2.balance += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(l.total_raw_balance(), 8_000);
        assert_eq!(l.ids(), vec![AccountId::from("a"), AccountId::from("b")]);
    }
}
