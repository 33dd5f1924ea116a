//! Master key material derived from the bot's recovery phrase
//!
//! ## Key Hierarchy
//!
//! ```text
//! Recovery phrase (13 words, or 25 for a full seed)
//!         │
//!         ▼
//! seed (16 bytes, zero-padded to 32) or (32 bytes)     → Ed25519 seed
//!         │
//!         ├─► Ed25519 signing keypair (seed ‖ public)
//!         │
//!         └─► SHA-512(seed)[0..32], clamped             → X25519 private key
//!                     │
//!                     └─► X25519 public key (account ID "05…")
//! ```
//!
//! The X25519 private key is also the Ed25519 private scalar; the blinding
//! engine multiplies it by the per-server factor.

use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::montgomery::MontgomeryPoint;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use thiserror::Error;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::mnemonic;

/// Prefix of the X25519 account ID.
pub const ACCOUNT_ID_PREFIX: &str = "05";

/// Prefix of the unblinded Ed25519 identity sent to community servers.
pub const UNBLINDED_ID_PREFIX: &str = "00";

/// Length of the short seed encoded by a 13-word phrase.
const SHORT_SEED_LEN: usize = 16;

/// Errors that can occur while building key material
#[derive(Debug, Error)]
pub enum KeyError {
    /// Invalid recovery phrase
    #[error("Invalid recovery phrase: {0}")]
    InvalidMnemonic(String),

    /// Key bytes have the wrong length or encoding
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// The bot's long-term identity.
///
/// Created once at startup and never mutated. Secret halves are zeroized on
/// drop; the public halves are plain copies.
#[derive(ZeroizeOnDrop)]
pub struct KeyMaterial {
    #[zeroize(skip)]
    signing_public: [u8; 32],

    /// seed ‖ public, the 64-byte Ed25519 secret key layout
    signing_private: [u8; 64],

    encryption_private: [u8; 32],

    #[zeroize(skip)]
    encryption_public: [u8; 32],
}

impl KeyMaterial {
    /// Build key material from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_bytes(seed);
        let signing_public = signing_key.verifying_key().to_bytes();

        let mut signing_private = [0u8; 64];
        signing_private[..32].copy_from_slice(seed);
        signing_private[32..].copy_from_slice(&signing_public);

        let encryption_private = ed25519_sk_to_x25519(&signing_private);
        let encryption_public = ed25519_pk_to_x25519(&signing_public)?;

        Ok(Self {
            signing_public,
            signing_private,
            encryption_private,
            encryption_public,
        })
    }

    /// Build key material from arbitrary seed bytes.
    ///
    /// A 16-byte seed is zero-padded to 32 bytes; a 32-byte seed is used as is.
    pub fn from_seed_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        match bytes.len() {
            SHORT_SEED_LEN => seed[..SHORT_SEED_LEN].copy_from_slice(bytes),
            32 => seed.copy_from_slice(bytes),
            n => {
                return Err(KeyError::InvalidKey(format!(
                    "seed must be 16 or 32 bytes, got {}",
                    n
                )))
            }
        }
        Self::from_seed(&seed)
    }

    /// Build key material from a recovery phrase.
    ///
    /// Case and spacing are ignored so phrases pasted from a password vault
    /// work unchanged.
    pub fn from_recovery_phrase(phrase: &str) -> Result<Self, KeyError> {
        let seed = mnemonic::decode(phrase)?;
        Self::from_seed_bytes(&seed)
    }

    /// Ed25519 public key.
    pub fn signing_public_key(&self) -> &[u8; 32] {
        &self.signing_public
    }

    /// Ed25519 secret key in seed ‖ public layout.
    pub fn signing_private_key(&self) -> &[u8; 64] {
        &self.signing_private
    }

    /// The 32-byte Ed25519 seed.
    pub fn seed(&self) -> &[u8] {
        &self.signing_private[..32]
    }

    /// X25519 private key (clamped).
    pub fn encryption_private_key(&self) -> &[u8; 32] {
        &self.encryption_private
    }

    /// X25519 public key.
    pub fn encryption_public_key(&self) -> &[u8; 32] {
        &self.encryption_public
    }

    /// dalek signing key for standard Ed25519 operations.
    pub fn signing_key(&self) -> SigningKey {
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(self.seed());
        SigningKey::from_bytes(&seed)
    }

    /// Account ID: `05` followed by the hex X25519 public key.
    pub fn account_id(&self) -> String {
        format!("{}{}", ACCOUNT_ID_PREFIX, hex::encode(self.encryption_public))
    }

    /// Unblinded server identity: `00` followed by the hex Ed25519 public key.
    pub fn unblinded_id(&self) -> String {
        format!("{}{}", UNBLINDED_ID_PREFIX, hex::encode(self.signing_public))
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("account_id", &self.account_id())
            .finish_non_exhaustive()
    }
}

/// Convert an Ed25519 secret key to its X25519 private key.
///
/// Output is always exactly 32 bytes: the clamped low half of
/// `SHA-512(seed)`, which is the Ed25519 private scalar.
pub fn ed25519_sk_to_x25519(signing_private: &[u8; 64]) -> [u8; 32] {
    let digest = Sha512::digest(&signing_private[..32]);
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&digest[..32]);
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    scalar
}

/// Convert an Ed25519 public key to its X25519 public key.
pub fn ed25519_pk_to_x25519(signing_public: &[u8; 32]) -> Result<[u8; 32], KeyError> {
    let point = CompressedEdwardsY(*signing_public)
        .decompress()
        .ok_or_else(|| KeyError::InvalidKey("public key is not a curve point".to_string()))?;
    Ok(point.to_montgomery().to_bytes())
}

/// X25519 public key for a clamped private key.
pub fn x25519_public(private: &[u8; 32]) -> [u8; 32] {
    MontgomeryPoint::mul_base_clamped(*private).to_bytes()
}

/// Generate a fresh 16-byte seed and its 13-word recovery phrase.
pub fn generate_recovery_phrase() -> Result<(Zeroizing<String>, KeyMaterial), KeyError> {
    let mut seed = Zeroizing::new([0u8; SHORT_SEED_LEN]);
    OsRng.fill_bytes(&mut seed[..]);

    let phrase = mnemonic::encode(&seed[..])?;
    let keys = KeyMaterial::from_seed_bytes(&seed[..])?;

    Ok((phrase, keys))
}
