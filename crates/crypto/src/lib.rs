//! Identity capability the ledger core calls into.
//!
//! The core never sees plaintext personal data: applicants hand it a digest,
//! issuers hand it a derived DID id. Both derivations sit behind
//! [`IdentityCrypto`] so a deployment can swap the scheme.

use blake3::Hasher;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use pocc_codec::{encode_fields, CodecError};
use pocc_types::{Address, DidId};

/// Prefix of every DID minted by [`Sha256Identity`].
pub const DID_PREFIX: &str = "did:pocc:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Personal data an applicant shares with an issuer off-ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub postal_address: String,
    pub passport: String,
}

impl PersonalInfo {
    /// Canonical bytes of the record. Callers own the returned buffer and
    /// should zeroize it once hashed.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(encode_fields(&[
            self.name.as_bytes(),
            self.email.as_bytes(),
            self.phone.as_bytes(),
            self.postal_address.as_bytes(),
            self.passport.as_bytes(),
        ])?)
    }
}

/// Per-application random salt.
///
/// Travels with the personal data in the off-ledger handoff to the issuer and
/// never appears on the ledger, so the published digest cannot be confirmed
/// by guessing the applicant's details.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApplicationSalt([u8; 32]);

impl ApplicationSalt {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Digest and DID derivation used by the ledger's identity workflows.
pub trait IdentityCrypto {
    /// One-way salted digest of personal data, safe to place in a transaction.
    fn derive_personal_digest(
        &self,
        info: &PersonalInfo,
        salt: &ApplicationSalt,
    ) -> Result<String, CryptoError>;

    /// Deterministic DID id for `attested_info` held by `holder`.
    fn derive_did(&self, attested_info: &str, holder: &Address) -> Result<DidId, CryptoError>;
}

/// SHA-256 based default scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Identity;

impl IdentityCrypto for Sha256Identity {
    fn derive_personal_digest(
        &self,
        info: &PersonalInfo,
        salt: &ApplicationSalt,
    ) -> Result<String, CryptoError> {
        let mut bytes = info.canonical_bytes()?;
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(&bytes);
        bytes.zeroize();
        Ok(hex::encode(hasher.finalize()))
    }

    fn derive_did(&self, attested_info: &str, holder: &Address) -> Result<DidId, CryptoError> {
        let bytes = encode_fields(&[attested_info.as_bytes(), holder.as_str().as_bytes()])?;
        let digest = Sha256::digest(&bytes);
        Ok(DidId::new(format!("{DID_PREFIX}{}", hex::encode(digest))))
    }
}

/// Derive the ledger Address from a public key:
/// address = hex(blake3(pubkey_bytes))
pub fn address_from_pubkey(pk: &VerifyingKey) -> Address {
    let mut hasher = Hasher::new();
    hasher.update(pk.as_bytes());
    Address::new(hex::encode(hasher.finalize().as_bytes()))
}

/// Fresh ed25519 keypair from the OS RNG.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let sk = SigningKey::generate(&mut OsRng);
    let pk = sk.verifying_key();
    (sk, pk)
}

/// Parse a VerifyingKey from raw 32-byte public key bytes.
pub fn pubkey_from_bytes(bytes: &[u8; 32]) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn john() -> PersonalInfo {
        PersonalInfo {
            name: "John Doe".into(),
            email: "john.doe@example.com".into(),
            phone: "1234567890".into(),
            postal_address: "123 Main St, Anytown, USA".into(),
            passport: "P1234567".into(),
        }
    }

    #[test]
    fn address_is_hex_and_deterministic() {
        let pk1 = SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        let pk2 = SigningKey::from_bytes(&[2u8; 32]).verifying_key();

        let a1 = address_from_pubkey(&pk1);
        let a1_again = address_from_pubkey(&pk1);
        let a2 = address_from_pubkey(&pk2);

        assert_eq!(a1.as_str().len(), 64);
        assert_eq!(a1, a1_again);
        assert_ne!(a1, a2);
    }

    #[test]
    fn pubkey_bytes_roundtrip_through_parser() {
        let pk = SigningKey::from_bytes(&[5u8; 32]).verifying_key();
        let parsed = pubkey_from_bytes(pk.as_bytes()).unwrap();
        assert_eq!(address_from_pubkey(&parsed), address_from_pubkey(&pk));
    }

    #[test]
    fn personal_digest_hides_plaintext() {
        let salt = ApplicationSalt::from_bytes([9u8; 32]);
        let digest = Sha256Identity.derive_personal_digest(&john(), &salt).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(!digest.contains("John"));
        assert_eq!(digest, Sha256Identity.derive_personal_digest(&john(), &salt).unwrap());
    }

    #[test]
    fn personal_digest_depends_on_salt() {
        let a = ApplicationSalt::from_bytes([1u8; 32]);
        let b = ApplicationSalt::from_bytes([2u8; 32]);
        let da = Sha256Identity.derive_personal_digest(&john(), &a).unwrap();
        let db = Sha256Identity.derive_personal_digest(&john(), &b).unwrap();
        assert_ne!(da, db);

        let unsalted = hex::encode(Sha256::digest(john().canonical_bytes().unwrap()));
        assert_ne!(da, unsalted);
        assert_ne!(ApplicationSalt::generate(), ApplicationSalt::generate());
    }

    #[test]
    fn did_depends_on_info_and_holder() {
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        let d1 = Sha256Identity.derive_did("info", &alice).unwrap();
        let d2 = Sha256Identity.derive_did("info", &alice).unwrap();
        let d3 = Sha256Identity.derive_did("info", &bob).unwrap();
        let d4 = Sha256Identity.derive_did("other", &alice).unwrap();

        assert!(d1.as_str().starts_with(DID_PREFIX));
        assert_eq!(d1, d2);
        assert_ne!(d1, d3);
        assert_ne!(d1, d4);
    }

    #[test]
    fn generated_keys_give_distinct_addresses() {
        let (_, pk1) = generate_keypair();
        let (_, pk2) = generate_keypair();
        assert_ne!(address_from_pubkey(&pk1), address_from_pubkey(&pk2));
    }
}
