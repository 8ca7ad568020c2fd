//! Proof of Civil Contribution.
//!
//! Producer selection is a weighted coin flip per candidate; rewards are a
//! fixed share of the producer's contribution; validation checks hash linkage
//! and a hex-zero difficulty prefix.

mod rewards;
mod selection;
mod validator;

pub use rewards::{RewardLedger, DEFAULT_REWARD_RATE};
pub use selection::{Pocc, SelectionPolicy};
pub use validator::{BlockValidator, ValidationFailure, DEFAULT_DIFFICULTY};
