use pocc_chain::ChainError;
use pocc_codec::CodecError;
use pocc_crypto::CryptoError;
use pocc_registry::RegistryError;
use pocc_types::Address;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no proof met difficulty {difficulty} within {attempts} attempts")]
    ProofNotFound { difficulty: usize, attempts: u64 },
    #[error("round of {producer} started at tip {expected}, chain has moved to {found}")]
    StaleTip {
        producer: Address,
        expected: String,
        found: String,
    },
    #[error("transfer amount {0} must be finite and non-negative")]
    InvalidAmount(f64),
}

impl LedgerError {
    /// The registry rejected an address or DID id already in use.
    pub fn is_duplicate_identity(&self) -> bool {
        matches!(self, LedgerError::Registry(RegistryError::DuplicateIdentity(_)))
    }
}
