//! Per-account mutual exclusion for scheduler runs.
//!
//! Runs for the same account serialize on one mutex; runs for different
//! accounts never contend beyond the brief registry lookup. A slot is
//! removed when its last guard is released with nobody else waiting.

use crate::model::account::AccountId;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

/// Held for the duration of one account's run. Releases on drop.
pub struct AccountGuard<'a> {
    registry: &'a AccountLocks,
    account_id: AccountId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.release(self.account_id);
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until no other run holds `account_id`.
    pub fn lock(&self, account_id: AccountId) -> AccountGuard<'_> {
        let slot = self.slot(account_id);
        AccountGuard {
            registry: self,
            account_id,
            guard: Some(slot.lock_arc()),
        }
    }

    /// Non-blocking variant; `None` when another run holds the account.
    pub fn try_lock(&self, account_id: AccountId) -> Option<AccountGuard<'_>> {
        let slot = self.slot(account_id);
        slot.try_lock_arc().map(|guard| AccountGuard {
            registry: self,
            account_id,
            guard: Some(guard),
        })
    }

    /// Number of accounts with a live slot.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn slot(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.slots
            .lock()
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // Clones are only handed out under the registry lock, so a count of one
    // here means no holder or waiter can still reach this slot.
    fn release(&self, account_id: AccountId) {
        let mut slots = self.slots.lock();
        if slots
            .get(&account_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&account_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AccountLocks;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn same_account_is_exclusive() {
        let locks = AccountLocks::new();
        let account = Uuid::new_v4();

        let guard = locks.lock(account);
        assert!(locks.try_lock(account).is_none());
        drop(guard);
        assert!(locks.try_lock(account).is_some());
    }

    #[test]
    fn different_accounts_do_not_contend() {
        let locks = AccountLocks::new();
        let _first = locks.lock(Uuid::new_v4());
        assert!(locks.try_lock(Uuid::new_v4()).is_some());
    }

    #[test]
    fn released_slots_are_pruned() {
        let locks = AccountLocks::new();
        let account = Uuid::new_v4();

        let guard = locks.lock(account);
        let other = locks.lock(Uuid::new_v4());
        assert_eq!(locks.slot_count(), 2);
        drop(guard);
        assert_eq!(locks.slot_count(), 1);
        drop(other);
        assert_eq!(locks.slot_count(), 0);

        assert!(locks.try_lock(account).is_some());
        assert_eq!(locks.slot_count(), 0);
    }

    #[test]
    fn slot_with_a_waiter_survives_release() {
        let locks = AccountLocks::new();
        let account = Uuid::new_v4();
        let guard = locks.lock(account);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let _guard = locks.lock(account);
            });
            while Arc::strong_count(&locks.slot(account)) < 4 {
                std::thread::yield_now();
            }
            drop(guard);
            waiter.join().unwrap();
        });
        assert_eq!(locks.slot_count(), 0);
    }
}
