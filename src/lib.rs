//! sogs-bot - community server bot with blinded-key authentication
//!
//! A bot that polls one room on a Session open group server (SOGS) and
//! answers trigger messages, authenticating either with its long-term
//! Ed25519 key or with a per-server blinded key that cannot be linked to it.
//!
//! Key principles:
//! - Keys derive from one recovery phrase and never leave memory
//! - Blinded identities differ per server
//! - Unverified envelope bytes are never decoded
//! - The poll cursor only moves forward

pub mod config;
pub mod crypto;
pub mod sogs;
