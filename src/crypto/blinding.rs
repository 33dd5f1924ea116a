//! Per-server key blinding
//!
//! A community server only ever sees the blinded public key `kA`, where
//! `k` is derived from the server's own public key and `A` is the bot's
//! Ed25519 public key. Different servers get unlinkable identities, while the
//! bot can still sign for each of them with the matching scalar `ka`.
//!
//! ```text
//! k  = reduce(BLAKE2b-512(server_pk))
//! a  = X25519 private key (clamped Ed25519 scalar, 32 bytes)
//! ka = k * a  mod L
//! kA = ka * B             (no clamping: ka is already reduced)
//! ```

use super::keys::{ed25519_sk_to_x25519, KeyError, KeyMaterial};
use blake2::{Blake2b512, Digest};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zeroize::Zeroize;

/// Prefix of the blinded identity sent to community servers.
pub const BLINDED_ID_PREFIX: &str = "15";

/// Per-server blinding values, immutable once derived.
pub struct BlindingContext {
    server_public_key: [u8; 32],
    blinding_factor: Scalar,
    blinded_secret: Scalar,
    blinded_public: [u8; 32],
}

impl BlindingContext {
    /// Derive the blinding context for one server key.
    ///
    /// Fails with `InvalidKey` when `server_public_key` is not 32 bytes; no
    /// scalar arithmetic runs on malformed input.
    pub fn derive(keys: &KeyMaterial, server_public_key: &[u8]) -> Result<Self, KeyError> {
        let server_public_key: [u8; 32] = server_public_key.try_into().map_err(|_| {
            KeyError::InvalidKey(format!(
                "server public key must be 32 bytes, got {}",
                server_public_key.len()
            ))
        })?;

        let k = server_scalar(&server_public_key);

        let mut a_bytes = ed25519_sk_to_x25519(keys.signing_private_key());
        let a = Scalar::from_bytes_mod_order(a_bytes);
        a_bytes.zeroize();

        let ka = k * a;
        let blinded_public = EdwardsPoint::mul_base(&ka).compress().to_bytes();

        Ok(Self {
            server_public_key,
            blinding_factor: a,
            blinded_secret: ka,
            blinded_public,
        })
    }

    /// The server key this context was derived for.
    pub fn server_public_key(&self) -> &[u8; 32] {
        &self.server_public_key
    }

    /// `a`, the unblinded private scalar.
    pub fn blinding_factor(&self) -> &Scalar {
        &self.blinding_factor
    }

    /// `ka`, the blinded private scalar.
    pub fn blinded_secret(&self) -> &Scalar {
        &self.blinded_secret
    }

    /// `kA`, the blinded public key.
    pub fn blinded_public_key(&self) -> &[u8; 32] {
        &self.blinded_public
    }

    /// Blinded server identity: `15` followed by the hex `kA`.
    pub fn blinded_id(&self) -> String {
        format!("{}{}", BLINDED_ID_PREFIX, hex::encode(self.blinded_public))
    }
}

impl Drop for BlindingContext {
    fn drop(&mut self) {
        self.blinding_factor.zeroize();
        self.blinded_secret.zeroize();
    }
}

impl std::fmt::Debug for BlindingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlindingContext")
            .field("server_public_key", &hex::encode(self.server_public_key))
            .field("blinded_id", &self.blinded_id())
            .finish_non_exhaustive()
    }
}

/// `k = reduce(BLAKE2b-512(server_pk))`
fn server_scalar(server_public_key: &[u8; 32]) -> Scalar {
    let digest = Blake2b512::digest(server_public_key);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&digest);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Derives and caches one `BlindingContext` per server key.
pub struct BlindingEngine {
    keys: Arc<KeyMaterial>,
    cache: Mutex<HashMap<[u8; 32], Arc<BlindingContext>>>,
}

impl BlindingEngine {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self {
            keys,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Context for `server_public_key`, derived on first use.
    pub fn context_for(&self, server_public_key: &[u8]) -> Result<Arc<BlindingContext>, KeyError> {
        if let Ok(key) = <[u8; 32]>::try_from(server_public_key) {
            if let Some(ctx) = self.lock_cache().get(&key) {
                return Ok(Arc::clone(ctx));
            }
        }

        let ctx = Arc::new(BlindingContext::derive(&self.keys, server_public_key)?);
        self.lock_cache()
            .insert(*ctx.server_public_key(), Arc::clone(&ctx));
        Ok(ctx)
    }

    /// Number of cached server contexts.
    pub fn cached(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<[u8; 32], Arc<BlindingContext>>> {
        // Entries are immutable once inserted, so a poisoned map is still valid.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_A: [u8; 32] = [0xa1; 32];
    const SERVER_B: [u8; 32] = [0xb2; 32];

    fn keys() -> KeyMaterial {
        KeyMaterial::from_seed(&[11u8; 32]).unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let keys = keys();
        let first = BlindingContext::derive(&keys, &SERVER_A).unwrap();
        let second = BlindingContext::derive(&keys, &SERVER_A).unwrap();
        assert_eq!(first.blinded_public_key(), second.blinded_public_key());
        assert_eq!(first.blinded_secret(), second.blinded_secret());
    }

    #[test]
    fn test_different_servers_unlinkable() {
        let keys = keys();
        let a = BlindingContext::derive(&keys, &SERVER_A).unwrap();
        let b = BlindingContext::derive(&keys, &SERVER_B).unwrap();
        assert_ne!(a.blinded_public_key(), b.blinded_public_key());
        assert_ne!(a.blinded_public_key(), keys.signing_public_key());
    }

    #[test]
    fn test_blinded_public_matches_secret() {
        let ctx = BlindingContext::derive(&keys(), &SERVER_A).unwrap();
        let expected = EdwardsPoint::mul_base(ctx.blinded_secret())
            .compress()
            .to_bytes();
        assert_eq!(ctx.blinded_public_key(), &expected);
    }

    #[test]
    fn test_blinded_public_is_k_times_identity_key() {
        use curve25519_dalek::edwards::CompressedEdwardsY;

        let keys = keys();
        let ctx = BlindingContext::derive(&keys, &SERVER_A).unwrap();
        let identity = CompressedEdwardsY(*keys.signing_public_key())
            .decompress()
            .unwrap();
        let expected = (server_scalar(&SERVER_A) * identity).compress().to_bytes();
        assert_eq!(ctx.blinded_public_key(), &expected);
    }

    #[test]
    fn test_rejects_wrong_length_server_key() {
        let result = BlindingContext::derive(&keys(), &[0u8; 31]);
        assert!(matches!(result, Err(KeyError::InvalidKey(_))));

        let result = BlindingContext::derive(&keys(), &[0u8; 33]);
        assert!(matches!(result, Err(KeyError::InvalidKey(_))));
    }

    #[test]
    fn test_blinded_id_format() {
        let ctx = BlindingContext::derive(&keys(), &SERVER_A).unwrap();
        let id = ctx.blinded_id();
        assert!(id.starts_with("15"));
        assert_eq!(id.len(), 66);
    }

    #[test]
    fn test_known_blinding_values() {
        let keys = KeyMaterial::from_seed(&[0x11; 32]).unwrap();
        let server: [u8; 32] =
            hex::decode("c3b3c6f32f0ab5a57f853cc4f30f5da7fda5624b0c77b3fb0829de562ada081d")
                .unwrap()
                .try_into()
                .unwrap();
        let ctx = BlindingContext::derive(&keys, &server).unwrap();

        assert_eq!(
            hex::encode(server_scalar(&server).to_bytes()),
            "84e3eb75028a9b73fec031b7448e322a68ca6485fad81ab1bead56f759ebeb0f"
        );
        assert_eq!(
            hex::encode(ctx.blinded_secret().to_bytes()),
            "fee5a94ec4cdc3f362998de5f8bbb5f5dcb8a195dd6391865b2f276ff53bd703"
        );
        assert_eq!(
            ctx.blinded_id(),
            "15436e21b2951aebf8245479ba52d12a3a45ffbde439bf562a71a67793cbd1220b"
        );
    }

    #[test]
    fn test_engine_caches_per_server() {
        let engine = BlindingEngine::new(Arc::new(keys()));

        let first = engine.context_for(&SERVER_A).unwrap();
        let again = engine.context_for(&SERVER_A).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(engine.cached(), 1);

        let other = engine.context_for(&SERVER_B).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(engine.cached(), 2);
    }

    #[test]
    fn test_engine_rejects_bad_key_without_caching() {
        let engine = BlindingEngine::new(Arc::new(keys()));
        assert!(engine.context_for(&[1u8; 5]).is_err());
        assert_eq!(engine.cached(), 0);
    }
}
