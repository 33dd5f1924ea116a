/// Key material and signing for community server authentication
///
/// This module implements:
/// - Recovery phrase encoding (mnemonic)
/// - Master key derivation from a recovery phrase (keys)
/// - Per-server key blinding (blinding)
/// - Request, message and blinded signatures (signer)
pub mod blinding;
pub mod keys;
pub mod mnemonic;
pub mod signer;

pub use blinding::{BlindingContext, BlindingEngine};
pub use keys::{KeyError, KeyMaterial};
pub use signer::{Signature, Signer, SigningMode};
