use pocc_chain::Chain;
use pocc_codec::{block_hash, CodecError};
use pocc_types::{Block, GENESIS_PREVIOUS_HASH};
use tracing::{debug, warn};

/// Leading hex zeros a block hash needs by default.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Why a block was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("block index {index} has no predecessor on this chain")]
    UnknownPosition { index: u64 },
    #[error("block {index} links to {got}, expected {expected}")]
    BrokenLink {
        index: u64,
        expected: String,
        got: String,
    },
    #[error("block {index} stored hash does not match its contents")]
    HashMismatch { index: u64 },
    #[error("block {index} hash does not start with {difficulty} zero digits")]
    BelowTarget { index: u64, difficulty: usize },
    #[error("block {index} cannot be encoded: {source}")]
    Unencodable { index: u64, source: CodecError },
}

/// Linkage and difficulty checks against a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockValidator {
    difficulty: usize,
}

impl Default for BlockValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl BlockValidator {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// True when the first `difficulty` hex digits of `hash` are `'0'`.
    pub fn meets_target(&self, hash: &str) -> bool {
        hash.len() >= self.difficulty && hash.bytes().take(self.difficulty).all(|b| b == b'0')
    }

    /// Check `block` against the predecessor recorded in `chain`.
    ///
    /// Works for blocks already on the chain and for a candidate at
    /// `chain.next_index()`.
    pub fn check_block(&self, chain: &Chain, block: &Block) -> Result<(), ValidationFailure> {
        let index = block.index;
        let expected = match index {
            0 => return Err(ValidationFailure::UnknownPosition { index }),
            1 => GENESIS_PREVIOUS_HASH,
            _ => chain
                .get(index - 1)
                .map(|prev| prev.hash.as_str())
                .ok_or(ValidationFailure::UnknownPosition { index })?,
        };
        if block.previous_hash != expected {
            return Err(ValidationFailure::BrokenLink {
                index,
                expected: expected.to_owned(),
                got: block.previous_hash.clone(),
            });
        }

        let recomputed =
            block_hash(block).map_err(|source| ValidationFailure::Unencodable { index, source })?;
        if recomputed != block.hash {
            return Err(ValidationFailure::HashMismatch { index });
        }
        if !self.meets_target(&recomputed) {
            return Err(ValidationFailure::BelowTarget {
                index,
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }

    /// Boolean form of [`Self::check_block`]; failures are logged.
    pub fn validate_block(&self, chain: &Chain, block: &Block) -> bool {
        match self.check_block(chain, block) {
            Ok(()) => true,
            Err(e) => {
                warn!(index = block.index, error = %e, "block rejected");
                false
            }
        }
    }

    /// Search `proof` values from 0 until the block hash meets the target.
    ///
    /// On success the block carries the winning proof and hash. Returns
    /// `Ok(None)` if `max_attempts` is exhausted; the block is then left with
    /// its last tried proof.
    pub fn seal(&self, block: &mut Block, max_attempts: u64) -> Result<Option<u64>, CodecError> {
        for proof in 0..max_attempts {
            block.proof = proof;
            block.hash = block_hash(block)?;
            if self.meets_target(&block.hash) {
                debug!(index = block.index, proof, difficulty = self.difficulty, "proof found");
                return Ok(Some(proof));
            }
        }
        Ok(None)
    }
}
