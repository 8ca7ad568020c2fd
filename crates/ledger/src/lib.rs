//! The ledger aggregate.
//!
//! One [`Ledger`] owns the chain, the transaction pool, the identity registry
//! and the reward ledger behind a single lock. Everything that touches the
//! pool or the chain takes the write side, so a drain can never race a
//! submission and two producers can never append competing blocks. Producer
//! selection only needs the read side.

mod config;
mod error;

pub use config::{ConfigError, LedgerConfig};
pub use error::LedgerError;

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, info};

use pocc_chain::Chain;
use pocc_consensus::{BlockValidator, Pocc, RewardLedger, ValidationFailure};
use pocc_crypto::{ApplicationSalt, IdentityCrypto, PersonalInfo};
use pocc_mempool::TxPool;
use pocc_registry::IdentityRegistry;
use pocc_types::{Address, Block, Did, DidId, Node, Timestamp, Transaction, TxKind};

/// Ledger clock: milliseconds since the UNIX epoch, 0 before it.
pub fn now_millis() -> Timestamp {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

struct LedgerState {
    chain: Chain,
    pool: TxPool,
    registry: IdentityRegistry,
    rewards: RewardLedger,
}

impl LedgerState {
    /// Queue a ledger-generated transaction; returns the predicted block index.
    fn record(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: f64,
        kind: TxKind,
        extra_data: Option<String>,
    ) -> u64 {
        let tx = Transaction::new(sender, recipient, amount, kind, extra_data, now_millis());
        self.submit(tx)
    }

    fn submit(&mut self, tx: Transaction) -> u64 {
        debug!(kind = ?tx.kind, sender = %tx.sender, "transaction queued");
        self.pool.submit(tx);
        self.chain.next_index()
    }
}

/// A speculative win in the producer lottery, bound to the tip it was drawn on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundTicket {
    pub producer: Address,
    pub tip_index: u64,
    pub tip_hash: String,
}

pub struct Ledger {
    config: LedgerConfig,
    pocc: Pocc,
    validator: BlockValidator,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Genesis first, then the root's own registration, so the root's
    /// `register` transaction lands in block 2.
    pub fn new(config: LedgerConfig, root: Node) -> Result<Self, LedgerError> {
        config.validate()?;

        let state = LedgerState {
            chain: Chain::new(now_millis())?,
            pool: TxPool::new(),
            registry: IdentityRegistry::new(root.address.clone()),
            rewards: RewardLedger::new(),
        };
        let ledger = Self {
            pocc: Pocc::new(config.selection_policy(), config.reward_rate),
            validator: BlockValidator::new(config.difficulty),
            config,
            state: RwLock::new(state),
        };
        info!(root = %root.address, difficulty = ledger.config.difficulty, "ledger created");
        ledger.register_node(root)?;
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ---- identity registry ----

    pub fn register_node(&self, node: Node) -> Result<u64, LedgerError> {
        let mut st = self.state.write();
        let address = node.address.clone();
        st.registry.insert_node(node)?;
        info!(%address, "node registered");
        Ok(st.record(
            address.as_str(),
            address.as_str(),
            0.0,
            TxKind::Register,
            Some(format!("Node {address} is now registered in the ledger.")),
        ))
    }

    /// Register `child` under `parent`. Queues the child's `register`
    /// transaction followed by the `affiliation` transaction.
    pub fn create_affiliated_node(&self, parent: &Address, child: Node) -> Result<u64, LedgerError> {
        let mut st = self.state.write();
        let child_address = child.address.clone();
        st.registry.insert_affiliate(parent, child)?;
        info!(%parent, child = %child_address, "affiliated node registered");

        st.record(
            child_address.as_str(),
            child_address.as_str(),
            0.0,
            TxKind::Register,
            Some(format!("Node {child_address} is now registered in the ledger.")),
        );
        Ok(st.record(
            parent.as_str(),
            child_address.as_str(),
            0.0,
            TxKind::Affiliation,
            Some(format!("Node {child_address} is now an affiliated node of {parent}.")),
        ))
    }

    /// Record a DID request. Only `privacy_digest` reaches the ledger.
    pub fn apply_for_did(
        &self,
        applicant: &Address,
        root: &Address,
        privacy_digest: &str,
    ) -> Result<u64, LedgerError> {
        let mut st = self.state.write();
        st.registry.check_application(applicant, root)?;
        Ok(st.record(
            applicant.as_str(),
            root.as_str(),
            0.0,
            TxKind::DidApply,
            Some(privacy_digest.to_owned()),
        ))
    }

    /// [`Self::apply_for_did`] with the digest derived from `info` and the
    /// application's `salt`. The salt goes to the issuer with `info`.
    pub fn apply_for_did_with(
        &self,
        crypto: &impl IdentityCrypto,
        applicant: &Address,
        root: &Address,
        info: &PersonalInfo,
        salt: &ApplicationSalt,
    ) -> Result<u64, LedgerError> {
        let digest = crypto.derive_personal_digest(info, salt)?;
        self.apply_for_did(applicant, root, &digest)
    }

    /// Derive a DID id for `holder` and fix its validity against the root.
    /// Nothing is registered.
    pub fn mint_did(
        &self,
        crypto: &impl IdentityCrypto,
        attested_info: &str,
        holder: &Address,
        issuer: &Address,
        civil_contribution: f64,
    ) -> Result<Did, LedgerError> {
        let did_id = crypto.derive_did(attested_info, holder)?;
        let st = self.state.read();
        Ok(st
            .registry
            .mint_did(did_id, civil_contribution, issuer.clone(), holder.clone())?)
    }

    /// Register a DID as-is; validity is not re-checked.
    pub fn register_did(&self, did: Did) -> Result<u64, LedgerError> {
        let mut st = self.state.write();
        let (id, holder, issuer) = (
            did.did_id.clone(),
            did.holder_address.clone(),
            did.issuer_address.clone(),
        );
        st.registry.insert_did(did)?;
        info!(did = %id, %holder, %issuer, "DID registered");
        Ok(st.record(
            issuer.as_str(),
            holder.as_str(),
            0.0,
            TxKind::DidRegister,
            Some(format!("Node {holder} holds DID {id}, verified by {issuer}.")),
        ))
    }

    /// Register a DID only if its issuer was legitimate.
    pub fn approve_did(&self, did: Did) -> Result<u64, LedgerError> {
        if !did.is_valid() {
            return Err(pocc_registry::RegistryError::InvalidDid(did.did_id).into());
        }
        self.register_did(did)
    }

    pub fn verify_did(&self, did_id: &DidId, expected_holder: &Address) -> bool {
        self.state.read().registry.verify_did(did_id, expected_holder)
    }

    /// Credit later activity to a DID and its holder node.
    pub fn record_contribution(&self, did_id: &DidId, amount: f64) -> Result<Option<f64>, LedgerError> {
        Ok(self.state.write().registry.record_contribution(did_id, amount)?)
    }

    // ---- transaction pool ----

    /// Queue an arbitrary transaction. Returns the index of the block that
    /// will contain it if the next append drains the pool.
    pub fn submit(&self, tx: Transaction) -> u64 {
        self.state.write().submit(tx)
    }

    /// Queue a `value-transfer` from a registered sender.
    pub fn transfer(&self, sender: &Address, recipient: &str, amount: f64) -> Result<u64, LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut st = self.state.write();
        if !st.registry.contains_node(sender) {
            return Err(pocc_registry::RegistryError::UnknownNode(sender.clone()).into());
        }
        Ok(st.record(sender.as_str(), recipient, amount, TxKind::ValueTransfer, None))
    }

    pub fn pending_len(&self) -> usize {
        self.state.read().pool.len()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.state.read().pool.pending().to_vec()
    }

    // ---- block assembly ----

    /// Drain the pool into a new block with the given proof and append it.
    pub fn append_block(
        &self,
        proof: u64,
        previous_hash_override: Option<String>,
    ) -> Result<Block, LedgerError> {
        let mut st = self.state.write();
        let LedgerState { chain, pool, .. } = &mut *st;
        let block = chain.append_block(proof, previous_hash_override, pool, now_millis())?;
        Ok(block.clone())
    }

    /// Search for a proof meeting the configured difficulty, then drain and
    /// append. The pool is untouched if no proof is found.
    pub fn seal_block(&self) -> Result<Block, LedgerError> {
        let mut st = self.state.write();
        self.seal_locked(&mut st)
    }

    fn seal_locked(&self, st: &mut LedgerState) -> Result<Block, LedgerError> {
        let mut candidate = st
            .chain
            .assemble(0, None, st.pool.drain_for_block(), now_millis());
        let attempts = self.config.max_seal_attempts;
        let outcome = self.validator.seal(&mut candidate, attempts);
        if !matches!(outcome, Ok(Some(_))) {
            st.pool.requeue(candidate.transactions);
            return Err(match outcome {
                Err(e) => e.into(),
                _ => LedgerError::ProofNotFound {
                    difficulty: self.validator.difficulty(),
                    attempts,
                },
            });
        }

        Ok(st.chain.commit(candidate)?.clone())
    }

    // ---- validation ----

    pub fn check_block(&self, block: &Block) -> Result<(), ValidationFailure> {
        self.validator.check_block(&self.state.read().chain, block)
    }

    pub fn validate_block(&self, block: &Block) -> bool {
        self.validator.validate_block(&self.state.read().chain, block)
    }

    // ---- consensus ----

    pub fn is_selected_producer(&self, address: &Address) -> bool {
        self.is_selected_producer_with(address, &mut rand::thread_rng())
    }

    pub fn is_selected_producer_with<R: Rng + ?Sized>(&self, address: &Address, rng: &mut R) -> bool {
        let selected = self
            .pocc
            .is_selected_producer(&self.state.read().registry, address, rng);
        debug!(%address, selected, "producer draw");
        selected
    }

    /// Pick the producer of the next block among `candidates`.
    pub fn select_producer<R: Rng + ?Sized>(&self, candidates: &[Address], rng: &mut R) -> Option<Address> {
        self.pocc
            .select_producer(&self.state.read().registry, candidates, rng)
    }

    /// Credit the producer of an accepted block. `None` for unknown nodes.
    pub fn reward_producer(&self, address: &Address) -> Option<f64> {
        let mut st = self.state.write();
        let LedgerState {
            registry, rewards, ..
        } = &mut *st;
        self.pocc.reward_producer(registry, rewards, address)
    }

    /// Draw for `producer` against the current tip. `Some` means the
    /// producer may try [`Self::commit_round`].
    pub fn begin_round<R: Rng + ?Sized>(&self, producer: &Address, rng: &mut R) -> Option<RoundTicket> {
        let st = self.state.read();
        if !self.pocc.is_selected_producer(&st.registry, producer, rng) {
            return None;
        }
        let tip = st.chain.last();
        Some(RoundTicket {
            producer: producer.clone(),
            tip_index: tip.index,
            tip_hash: tip.hash.clone(),
        })
    }

    /// Seal and append a block for a winning ticket, then reward its producer.
    ///
    /// Fails with [`LedgerError::StaleTip`] if another producer appended
    /// since the ticket was drawn; the caller should start a new round.
    pub fn commit_round(&self, ticket: &RoundTicket) -> Result<Block, LedgerError> {
        let mut st = self.state.write();
        let tip = st.chain.last();
        if tip.index != ticket.tip_index || tip.hash != ticket.tip_hash {
            return Err(LedgerError::StaleTip {
                producer: ticket.producer.clone(),
                expected: ticket.tip_hash.clone(),
                found: tip.hash.clone(),
            });
        }

        let block = self.seal_locked(&mut st)?;
        let LedgerState {
            registry, rewards, ..
        } = &mut *st;
        self.pocc.reward_producer(registry, rewards, &ticket.producer);
        info!(index = block.index, producer = %ticket.producer, "round committed");
        Ok(block)
    }

    // ---- reads ----

    pub fn chain_len(&self) -> usize {
        self.state.read().chain.len()
    }

    pub fn last_block(&self) -> Block {
        self.state.read().chain.last().clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        self.state.read().chain.get(index).cloned()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.state.read().chain.blocks().to_vec()
    }

    pub fn root_address(&self) -> Address {
        self.state.read().registry.root_address().clone()
    }

    pub fn node(&self, address: &Address) -> Option<Node> {
        self.state.read().registry.node(address).cloned()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.state.read().registry.nodes().cloned().collect()
    }

    pub fn did(&self, did_id: &DidId) -> Option<Did> {
        self.state.read().registry.did(did_id).cloned()
    }

    pub fn dids(&self) -> Vec<Did> {
        self.state.read().registry.dids().cloned().collect()
    }

    pub fn reward_of(&self, address: &Address) -> Option<f64> {
        self.state.read().rewards.balance(address)
    }

    pub fn rewards(&self) -> Vec<(Address, f64)> {
        self.state
            .read()
            .rewards
            .iter()
            .map(|(a, b)| (a.clone(), b))
            .collect()
    }
}
