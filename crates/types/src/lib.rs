//! Plain data records shared by every ledger crate.
//!
//! Nothing in here enforces registry or chain invariants; those live with the
//! component that owns the record.

mod block;
mod identity;
mod tx;

pub use block::{Block, BlockVersion, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
pub use identity::{Address, Capability, Did, DidId, Node, NodeType};
pub use tx::{Transaction, TxKind, TxVersion};

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;
