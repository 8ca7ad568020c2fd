use serde::{Deserialize, Serialize};

use crate::{Timestamp, Transaction};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// `proof` of the genesis block.
pub const GENESIS_PROOF: u64 = 100;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockVersion {
    V1 = 1,
}

impl BlockVersion {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(BlockVersion::V1),
            _ => None,
        }
    }
}

/// One unit of the chain.
///
/// `hash` is derived from the other fields and is not itself hashed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub version: BlockVersion,
    /// 1-based; genesis is 1.
    pub index: u64,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }
}
