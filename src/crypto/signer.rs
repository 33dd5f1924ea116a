//! Request and message signing
//!
//! Three schemes are in play:
//!
//! - standard Ed25519 with the master key, for unblinded requests
//! - XEd25519 with the X25519 private key, for unblinded message bodies
//! - the blinded scheme below, for both requests and messages in blinded mode
//!
//! The blinded scheme is a deterministic Schnorr signature under `kA`:
//!
//! ```text
//! Hrh  = SHA-512(seed)[32..64]
//! r    = reduce(SHA-512(Hrh ‖ kA ‖ M))
//! R    = r * B
//! HRAM = reduce(SHA-512(R ‖ kA ‖ M))
//! S    = r + HRAM * ka
//! sig  = R ‖ S
//! ```
//!
//! Any standard Ed25519 verifier accepts `sig` for public key `kA`.

use super::blinding::{BlindingContext, BlindingEngine};
use super::keys::{KeyError, KeyMaterial};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::{Signer as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::sync::Arc;
use zeroize::Zeroizing;

/// A 64-byte Ed25519 signature (standard or blinded).
pub type Signature = [u8; 64];

/// Which identity the bot presents to the server.
///
/// This is a local configuration switch; the client does not negotiate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Sign with the raw Ed25519 key, identity `00…`
    Unblinded,
    /// Sign with the per-server blinded key, identity `15…`
    Blinded,
}

impl SigningMode {
    pub fn from_flag(blinded: bool) -> Self {
        if blinded {
            SigningMode::Blinded
        } else {
            SigningMode::Unblinded
        }
    }
}

/// Standard Ed25519 detached signature with the master key.
pub fn sign_unblinded(keys: &KeyMaterial, message: &[u8]) -> Signature {
    keys.signing_key().sign(message).to_bytes()
}

/// XEd25519 signature with the X25519 private key.
///
/// Deterministic: `r = reduce(SHA-512(a ‖ M))`. The Ed25519 form of the
/// public key hashes in unchanged, and its sign bit is carried in the top bit
/// of `S` so a verifier holding only the X25519 key can rebuild it.
pub fn sign_xed25519(keys: &KeyMaterial, message: &[u8]) -> Signature {
    let private = keys.encryption_private_key();
    let a = Scalar::from_bytes_mod_order(*private);
    let public = keys.signing_public_key();

    let r = reduce(Sha512::new().chain_update(private).chain_update(message));
    let big_r = EdwardsPoint::mul_base(&r).compress().to_bytes();

    let hram = reduce(
        Sha512::new()
            .chain_update(big_r)
            .chain_update(public)
            .chain_update(message),
    );
    let s = r + hram * a;

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&big_r);
    signature[32..].copy_from_slice(s.as_bytes());
    signature[63] |= public[31] & 0x80;
    signature
}

/// Check an XEd25519 signature against an X25519 public key.
pub fn verify_xed25519(x25519_public: &[u8; 32], message: &[u8], signature: &Signature) -> bool {
    let sign_bit = signature[63] >> 7;
    let Some(point) = MontgomeryPoint(*x25519_public).to_edwards(sign_bit) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&point.compress().to_bytes()) else {
        return false;
    };

    let mut stripped = *signature;
    stripped[63] &= 0x7f;
    key.verify_strict(message, &ed25519_dalek::Signature::from_bytes(&stripped))
        .is_ok()
}

/// Blinded signature over `message` verifiable with `ctx.blinded_public_key()`.
pub fn sign_blinded(keys: &KeyMaterial, ctx: &BlindingContext, message: &[u8]) -> Signature {
    let blinded_public = ctx.blinded_public_key();

    let mut seed_hash = Zeroizing::new([0u8; 64]);
    seed_hash.copy_from_slice(&Sha512::digest(keys.seed()));
    let hrh = &seed_hash[32..];

    let r = reduce(
        Sha512::new()
            .chain_update(hrh)
            .chain_update(blinded_public)
            .chain_update(message),
    );
    let big_r = EdwardsPoint::mul_base(&r).compress().to_bytes();

    let hram = reduce(
        Sha512::new()
            .chain_update(big_r)
            .chain_update(blinded_public)
            .chain_update(message),
    );
    let s = r + hram * ctx.blinded_secret();

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&big_r);
    signature[32..].copy_from_slice(s.as_bytes());
    signature
}

fn reduce(hasher: Sha512) -> Scalar {
    let mut wide = Zeroizing::new([0u8; 64]);
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Signs on behalf of the bot for one server, in one mode.
#[derive(Clone)]
pub struct Signer {
    keys: Arc<KeyMaterial>,
    mode: SigningMode,
    blinding: Arc<BlindingContext>,
}

impl Signer {
    /// Build a signer for `server_public_key`, pulling the blinding context
    /// from `engine`.
    ///
    /// The context is derived even in unblinded mode so the blinded ID can
    /// always be reported.
    pub fn new(
        engine: &BlindingEngine,
        keys: Arc<KeyMaterial>,
        server_public_key: &[u8],
        mode: SigningMode,
    ) -> Result<Self, KeyError> {
        let blinding = engine.context_for(server_public_key)?;
        Ok(Self {
            keys,
            mode,
            blinding,
        })
    }

    pub fn mode(&self) -> SigningMode {
        self.mode
    }

    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    pub fn blinding(&self) -> &BlindingContext {
        &self.blinding
    }

    pub fn server_public_key(&self) -> &[u8; 32] {
        self.blinding.server_public_key()
    }

    /// Identity string matching the signing mode (`00…` or `15…`).
    pub fn identity(&self) -> String {
        match self.mode {
            SigningMode::Unblinded => self.keys.unblinded_id(),
            SigningMode::Blinded => self.blinding.blinded_id(),
        }
    }

    /// Public key a verifier must use for signatures from this signer.
    pub fn verifying_key(&self) -> [u8; 32] {
        match self.mode {
            SigningMode::Unblinded => *self.keys.signing_public_key(),
            SigningMode::Blinded => *self.blinding.blinded_public_key(),
        }
    }

    /// Sign a request payload.
    pub fn sign(&self, message: &[u8]) -> Signature {
        match self.mode {
            SigningMode::Unblinded => sign_unblinded(&self.keys, message),
            SigningMode::Blinded => sign_blinded(&self.keys, &self.blinding, message),
        }
    }

    /// Sign a message body. Unblinded bodies are signed with XEd25519, so
    /// readers check them against the `05…` account key.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        match self.mode {
            SigningMode::Unblinded => sign_xed25519(&self.keys, message),
            SigningMode::Blinded => sign_blinded(&self.keys, &self.blinding, message),
        }
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("mode", &self.mode)
            .field("identity", &self.identity())
            .finish()
    }
}
