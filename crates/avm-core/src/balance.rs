//! Multi-currency accounting ledger keyed by `token_type`.

use rustc_hash::FxHashMap;

use crate::error::VmError;
use crate::U256;

/// Maps `token_type` to accumulated `currency`. Not part of the root
/// hash (spec §3); it is an input to proving, not committed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceTracker {
    balances: FxHashMap<U256, U256>,
}

impl BalanceTracker {
    pub fn new() -> Self {
        BalanceTracker::default()
    }

    pub fn balance_of(&self, token_type: U256) -> U256 {
        self.balances.get(&token_type).copied().unwrap_or(U256::ZERO)
    }

    /// Credits `currency` to `token_type`.
    ///
    /// Spec §9 leaves overflow behavior as an open question; this port
    /// surfaces it as a VM-internal error (`VmError::BalanceOverflow`)
    /// rather than silently wrapping or saturating, since an overflow
    /// here would otherwise corrupt the ledger without any signal.
    pub fn add(&mut self, token_type: U256, currency: U256) -> Result<(), VmError> {
        let entry = self.balances.entry(token_type).or_insert(U256::ZERO);
        let (sum, overflowed) = entry.overflowing_add(currency);
        if overflowed {
            return Err(VmError::BalanceOverflow);
        }
        *entry = sum;
        Ok(())
    }

    /// Attempts to debit `currency` from `token_type`, failing (without
    /// mutating state) if the balance is insufficient. Used by `SEND`
    /// and `NBSEND`.
    pub fn try_debit(&mut self, token_type: U256, currency: U256) -> bool {
        let current = self.balance_of(token_type);
        if current < currency {
            return false;
        }
        self.balances.insert(token_type, current - currency);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&U256, &U256)> {
        self.balances.iter()
    }

    pub fn from_entries(entries: Vec<(U256, U256)>) -> Self {
        BalanceTracker {
            balances: entries.into_iter().collect(),
        }
    }
}
