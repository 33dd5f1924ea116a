//! Request signing for community server HTTP calls
//!
//! Every authenticated request carries four headers. The signature covers:
//!
//! ```text
//! server_pk (32) ‖ nonce (16) ‖ timestamp (ASCII decimal) ‖ method ‖ path ‖ BLAKE2b-512(body) (64)
//! ```
//!
//! The server is the only replay authority; this module keeps no nonce cache.

use crate::crypto::Signer;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blake2::{Blake2b512, Digest};
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

pub const HEADER_PUBKEY: &str = "X-SOGS-Pubkey";
pub const HEADER_TIMESTAMP: &str = "X-SOGS-Timestamp";
pub const HEADER_NONCE: &str = "X-SOGS-Nonce";
pub const HEADER_SIGNATURE: &str = "X-SOGS-Signature";

pub const NONCE_LEN: usize = 16;

/// Full 64-byte BLAKE2b digest of a request body.
pub fn body_digest(body: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Blake2b512::digest(body));
    out
}

/// One outgoing request to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest<'a> {
    pub server_public_key: &'a [u8; 32],
    pub nonce: [u8; NONCE_LEN],
    pub timestamp: u64,
    pub method: &'a str,
    pub path: &'a str,
    pub body: &'a [u8],
}

impl SigningRequest<'_> {
    /// The exact bytes that get signed.
    pub fn payload(&self) -> Vec<u8> {
        let timestamp = self.timestamp.to_string();
        let mut payload = Vec::with_capacity(
            32 + NONCE_LEN + timestamp.len() + self.method.len() + self.path.len() + 64,
        );
        payload.extend_from_slice(self.server_public_key);
        payload.extend_from_slice(&self.nonce);
        payload.extend_from_slice(timestamp.as_bytes());
        payload.extend_from_slice(self.method.as_bytes());
        payload.extend_from_slice(self.path.as_bytes());
        payload.extend_from_slice(&body_digest(self.body));
        payload
    }
}

/// Header values for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub pubkey: String,
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
}

impl AuthHeaders {
    /// Header name/value pairs in wire order.
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (HEADER_PUBKEY, self.pubkey.as_str()),
            (HEADER_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_NONCE, self.nonce.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }
}

/// Signs HTTP requests for one server.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    signer: Signer,
}

impl RequestAuthenticator {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Sign a request with a fresh random nonce and the current time.
    pub fn authenticate(&self, method: &str, path: &str, body: &[u8]) -> AuthHeaders {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        self.authenticate_with(method, path, body, nonce, unix_now())
    }

    /// Sign a request with a caller-supplied nonce and timestamp.
    pub fn authenticate_with(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        nonce: [u8; NONCE_LEN],
        timestamp: u64,
    ) -> AuthHeaders {
        let request = SigningRequest {
            server_public_key: self.signer.server_public_key(),
            nonce,
            timestamp,
            method,
            path,
            body,
        };
        let signature = self.signer.sign(&request.payload());

        AuthHeaders {
            pubkey: self.signer.identity(),
            timestamp: timestamp.to_string(),
            nonce: BASE64.encode(nonce),
            signature: BASE64.encode(signature),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
