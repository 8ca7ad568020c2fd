use std::collections::BTreeMap;

use pocc_types::Address;

/// Share of a producer's contribution credited per accepted block.
pub const DEFAULT_REWARD_RATE: f64 = 0.01;

/// Accumulated rewards per producer. Balances never decrease.
///
/// Only [`crate::Pocc`] can credit it.
#[derive(Clone, Debug, Default)]
pub struct RewardLedger {
    balances: BTreeMap<Address, f64>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `address`. Negative or non-finite amounts are ignored.
    pub(crate) fn credit(&mut self, address: &Address, amount: f64) -> f64 {
        let balance = self.balances.entry(address.clone()).or_insert(0.0);
        if amount.is_finite() && amount > 0.0 {
            *balance += amount;
        }
        *balance
    }

    pub fn balance(&self, address: &Address) -> Option<f64> {
        self.balances.get(address).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, f64)> {
        self.balances.iter().map(|(a, b)| (a, *b))
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_accumulate() {
        let mut r = RewardLedger::new();
        let a = Address::from("a");
        assert_eq!(r.credit(&a, 1.0), 1.0);
        assert_eq!(r.credit(&a, 0.5), 1.5);
        assert_eq!(r.balance(&a), Some(1.5));
        assert_eq!(r.balance(&Address::from("b")), None);
    }

    #[test]
    fn never_decreases() {
        let mut r = RewardLedger::new();
        let a = Address::from("a");
        r.credit(&a, 2.0);
        assert_eq!(r.credit(&a, -1.0), 2.0);
        assert_eq!(r.credit(&a, f64::NAN), 2.0);
        assert_eq!(r.len(), 1);
    }
}
