//! Append-only block sequence.

use pocc_codec::{block_hash, CodecError};
use pocc_mempool::TxPool;
use pocc_types::{
    Block, BlockVersion, Timestamp, Transaction, GENESIS_PREVIOUS_HASH, GENESIS_PROOF,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("block index {got} does not extend the chain (expected {expected})")]
    OutOfOrder { expected: u64, got: u64 },
    #[error("stored hash of block {index} does not match its contents")]
    HashMismatch { index: u64 },
}

/// The chain. Never empty: it is born with its genesis block.
#[derive(Debug)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Chain holding only the genesis block.
    pub fn new(genesis_timestamp: Timestamp) -> Result<Self, ChainError> {
        let mut genesis = Block {
            version: BlockVersion::V1,
            index: 1,
            timestamp: genesis_timestamp,
            transactions: Vec::new(),
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_owned(),
            hash: String::new(),
        };
        genesis.hash = block_hash(&genesis)?;
        Ok(Self {
            blocks: vec![genesis],
        })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last(&self) -> &Block {
        // `new` seeds genesis and nothing removes blocks.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn tip_hash(&self) -> &str {
        &self.last().hash
    }

    pub fn next_index(&self) -> u64 {
        self.last().index + 1
    }

    /// Block by 1-based index.
    pub fn get(&self, index: u64) -> Option<&Block> {
        let pos = usize::try_from(index.checked_sub(1)?).ok()?;
        self.blocks.get(pos)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block that would extend the chain, with `hash` left empty.
    ///
    /// `previous_hash` defaults to the hash of the current last block.
    pub fn assemble(
        &self,
        proof: u64,
        previous_hash: Option<String>,
        transactions: Vec<Transaction>,
        timestamp: Timestamp,
    ) -> Block {
        Block {
            version: BlockVersion::V1,
            index: self.next_index(),
            timestamp,
            transactions,
            proof,
            previous_hash: previous_hash.unwrap_or_else(|| self.tip_hash().to_owned()),
            hash: String::new(),
        }
    }

    /// Build (but do not append) the block that would extend the chain.
    pub fn candidate(
        &self,
        proof: u64,
        previous_hash: Option<String>,
        transactions: Vec<Transaction>,
        timestamp: Timestamp,
    ) -> Result<Block, ChainError> {
        let mut block = self.assemble(proof, previous_hash, transactions, timestamp);
        block.hash = block_hash(&block)?;
        Ok(block)
    }

    /// Append a fully built block.
    ///
    /// The block must carry the next index and a hash matching its contents.
    pub fn commit(&mut self, block: Block) -> Result<&Block, ChainError> {
        let expected = self.next_index();
        if block.index != expected {
            return Err(ChainError::OutOfOrder {
                expected,
                got: block.index,
            });
        }
        if block_hash(&block)? != block.hash {
            return Err(ChainError::HashMismatch { index: block.index });
        }

        info!(
            index = block.index,
            txs = block.transactions.len(),
            hash = %block.hash,
            "block appended"
        );
        self.blocks.push(block);
        Ok(self.last())
    }

    /// Drain `pool` into a new block and append it.
    ///
    /// On error neither the pool nor the chain is modified.
    pub fn append_block(
        &mut self,
        proof: u64,
        previous_hash_override: Option<String>,
        pool: &mut TxPool,
        timestamp: Timestamp,
    ) -> Result<&Block, ChainError> {
        let mut block = self.assemble(
            proof,
            previous_hash_override,
            pool.drain_for_block(),
            timestamp,
        );
        match block_hash(&block) {
            Ok(hash) => block.hash = hash,
            Err(e) => {
                pool.requeue(block.transactions);
                return Err(e.into());
            }
        }
        self.commit(block)
    }
}
