use pocc_types::Transaction;

/// Pending transactions since the last block.
///
/// Notes:
/// - Ordering is FIFO by submission.
/// - No dedup: two identical submissions are two entries.
/// - Not synchronized on its own; the owner serializes `submit` against
///   `drain_for_block` together with the chain append.
#[derive(Debug)]
pub struct TxPool<Tx = Transaction> {
    pending: Vec<Tx>,
}

impl<Tx> Default for TxPool<Tx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tx> TxPool<Tx> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Append a transaction. Returns its 0-based position in the pending batch.
    pub fn submit(&mut self, tx: Tx) -> usize {
        self.pending.push(tx);
        self.pending.len() - 1
    }

    /// Empty the pool, returning everything in submission order.
    pub fn drain_for_block(&mut self) -> Vec<Tx> {
        std::mem::take(&mut self.pending)
    }

    /// Put a drained batch back ahead of anything submitted since.
    pub fn requeue(&mut self, mut drained: Vec<Tx>) {
        drained.append(&mut self.pending);
        self.pending = drained;
    }

    /// Pending transactions in submission order, without draining.
    pub fn pending(&self) -> &[Tx] {
        &self.pending
    }

    /// Number of currently-pending transactions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
