use pocc_registry::IdentityRegistry;
use pocc_types::Address;
use rand::Rng;
use tracing::{debug, info};

use crate::rewards::{RewardLedger, DEFAULT_REWARD_RATE};

/// How a contribution score becomes a selection probability, and what happens
/// when nobody wins.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionPolicy {
    /// Contribution at or above which a node is always selected.
    pub contribution_ceiling: f64,
    /// Lower bound on every registered node's probability. 0 disables it.
    pub selection_floor: f64,
    /// Rounds of draws in [`Pocc::select_producer`] before the deterministic
    /// fallback kicks in.
    pub fallback_after_rounds: u32,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            contribution_ceiling: 1.0,
            selection_floor: 0.0,
            fallback_after_rounds: 16,
        }
    }
}

impl SelectionPolicy {
    /// Probability in `[0, 1]` that a node with `contribution` is selected.
    pub fn probability(&self, contribution: f64) -> f64 {
        if !contribution.is_finite() || self.contribution_ceiling <= 0.0 {
            return self.selection_floor.clamp(0.0, 1.0);
        }
        let normalized = (contribution / self.contribution_ceiling).clamp(0.0, 1.0);
        normalized.max(self.selection_floor).min(1.0)
    }
}

/// Producer selection and reward crediting.
#[derive(Clone, Debug)]
pub struct Pocc {
    policy: SelectionPolicy,
    reward_rate: f64,
}

impl Default for Pocc {
    fn default() -> Self {
        Self::new(SelectionPolicy::default(), DEFAULT_REWARD_RATE)
    }
}

impl Pocc {
    pub fn new(policy: SelectionPolicy, reward_rate: f64) -> Self {
        Self {
            policy,
            reward_rate,
        }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn reward_rate(&self) -> f64 {
        self.reward_rate
    }

    /// One weighted draw for `address`. Unknown nodes are never selected.
    pub fn is_selected_producer<R: Rng + ?Sized>(
        &self,
        registry: &IdentityRegistry,
        address: &Address,
        rng: &mut R,
    ) -> bool {
        let Some(contribution) = registry.contribution_of(address) else {
            debug!(%address, "selection for unregistered node");
            return false;
        };
        let p = self.policy.probability(contribution);
        let draw: f64 = rng.gen();
        draw < p
    }

    /// Resolve one production slot among `candidates`.
    ///
    /// Candidates draw in the given order and the first winner takes the slot.
    /// After `fallback_after_rounds` rounds without a winner the registered
    /// candidate with the highest contribution is chosen, ties going to the
    /// smallest address. Returns `None` only if no candidate is registered.
    pub fn select_producer<R: Rng + ?Sized>(
        &self,
        registry: &IdentityRegistry,
        candidates: &[Address],
        rng: &mut R,
    ) -> Option<Address> {
        for _ in 0..self.policy.fallback_after_rounds {
            for candidate in candidates {
                if self.is_selected_producer(registry, candidate, rng) {
                    return Some(candidate.clone());
                }
            }
        }

        let fallback = candidates
            .iter()
            .filter_map(|a| registry.contribution_of(a).map(|c| (a, c)))
            .fold(None::<(&Address, f64)>, |best, (a, c)| match best {
                Some((ba, bc)) if bc > c || (bc == c && ba <= a) => Some((ba, bc)),
                _ => Some((a, c)),
            })
            .map(|(a, _)| a.clone());

        if let Some(address) = &fallback {
            info!(%address, "no producer drawn; falling back to highest contribution");
        }
        fallback
    }

    /// Credit `contribution * reward_rate` to `address`.
    ///
    /// No-op returning `None` if the address is not registered.
    pub fn reward_producer(
        &self,
        registry: &IdentityRegistry,
        rewards: &mut RewardLedger,
        address: &Address,
    ) -> Option<f64> {
        let contribution = registry.contribution_of(address)?;
        let reward = contribution * self.reward_rate;
        let balance = rewards.credit(address, reward);
        debug!(%address, reward, balance, "producer rewarded");
        Some(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocc_types::{Node, NodeType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn registry_with(nodes: &[(&str, f64)]) -> IdentityRegistry {
        let mut r = IdentityRegistry::new(Address::from("root"));
        for (addr, c) in nodes {
            let node = Node::new(*addr, *addr, NodeType::Personal, Vec::<String>::new())
                .with_contribution(*c);
            r.insert_node(node).unwrap();
        }
        r
    }

    fn rate(pocc: &Pocc, r: &IdentityRegistry, addr: &str, trials: u32) -> f64 {
        let mut rng = StdRng::seed_from_u64(7);
        let addr = Address::from(addr);
        let hits = (0..trials)
            .filter(|_| pocc.is_selected_producer(r, &addr, &mut rng))
            .count();
        hits as f64 / trials as f64
    }

    #[test]
    fn full_contribution_always_selected_zero_never() {
        let r = registry_with(&[("full", 1.0), ("none", 0.0)]);
        let pocc = Pocc::default();
        assert_eq!(rate(&pocc, &r, "full", 2_000), 1.0);
        assert_eq!(rate(&pocc, &r, "none", 2_000), 0.0);
    }

    #[test]
    fn selection_rate_tracks_contribution() {
        let r = registry_with(&[("half", 0.5), ("tenth", 0.1)]);
        let pocc = Pocc::default();
        let half = rate(&pocc, &r, "half", 10_000);
        let tenth = rate(&pocc, &r, "tenth", 10_000);
        assert!((half - 0.5).abs() < 0.05, "half rate was {half}");
        assert!((tenth - 0.1).abs() < 0.03, "tenth rate was {tenth}");
        assert!(half > tenth);
    }

    #[test]
    fn unknown_node_is_never_selected() {
        let r = registry_with(&[]);
        assert_eq!(rate(&Pocc::default(), &r, "ghost", 100), 0.0);
    }

    #[test]
    fn ceiling_and_floor_shape_probability() {
        let policy = SelectionPolicy {
            contribution_ceiling: 100.0,
            selection_floor: 0.05,
            fallback_after_rounds: 1,
        };
        assert_eq!(policy.probability(100.0), 1.0);
        assert_eq!(policy.probability(250.0), 1.0);
        assert_eq!(policy.probability(50.0), 0.5);
        assert_eq!(policy.probability(0.0), 0.05);
        assert_eq!(policy.probability(f64::NAN), 0.05);
    }

    #[test]
    fn first_winner_in_candidate_order_takes_slot() {
        let r = registry_with(&[("a", 1.0), ("b", 1.0)]);
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = [Address::from("b"), Address::from("a")];
        let chosen = Pocc::default().select_producer(&r, &candidates, &mut rng);
        assert_eq!(chosen, Some(Address::from("b")));
    }

    #[test]
    fn stalled_round_falls_back_to_highest_contribution() {
        let r = registry_with(&[("low", 0.0), ("high", 0.0), ("mid", 0.0)]);
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = [Address::from("low"), Address::from("mid"), Address::from("ghost")];
        // All zero: tie goes to the smallest address.
        let chosen = Pocc::default().select_producer(&r, &candidates, &mut rng);
        assert_eq!(chosen, Some(Address::from("low")));

        let r = registry_with(&[("low", 0.0), ("mid", 2.0)]);
        let pocc = Pocc::new(
            SelectionPolicy {
                contribution_ceiling: 1_000.0,
                selection_floor: 0.0,
                fallback_after_rounds: 0,
            },
            DEFAULT_REWARD_RATE,
        );
        let chosen = pocc.select_producer(&r, &candidates, &mut rng);
        assert_eq!(chosen, Some(Address::from("mid")));
    }

    #[test]
    fn no_registered_candidate_yields_none() {
        let r = registry_with(&[]);
        let mut rng = StdRng::seed_from_u64(1);
        let chosen = Pocc::default().select_producer(&r, &[Address::from("ghost")], &mut rng);
        assert_eq!(chosen, None);
    }

    #[test]
    fn rewards_accumulate_and_ignore_unknown() {
        let r = registry_with(&[("a", 50.0)]);
        let pocc = Pocc::default();
        let mut rewards = RewardLedger::new();
        let a = Address::from("a");

        assert_eq!(pocc.reward_producer(&r, &mut rewards, &a), Some(0.5));
        assert_eq!(pocc.reward_producer(&r, &mut rewards, &a), Some(1.0));
        assert_eq!(pocc.reward_producer(&r, &mut rewards, &Address::from("x")), None);
        assert_eq!(rewards.len(), 1);
    }
}
