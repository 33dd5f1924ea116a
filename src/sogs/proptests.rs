//! Property-based tests for the community server protocol
//!
//! Tests for:
//! - Envelope padding: round-trip, no-op on unpadded input, block alignment
//! - Signatures: blinded and unblinded requests verify under standard
//!   Ed25519, unblinded message bodies verify from the account key,
//!   blinded keys differ per server
//! - Polling: pagination totality, cursor monotonicity

use super::envelope::{pad, seal, unpad, Envelope, OutgoingMessage, PADDING_BLOCK};
use super::mock::MockSogsClient;
use super::poller::{MessageSink, PollCursor};
use super::traits::RoomMessage;
use crate::crypto::signer::verify_xed25519;
use crate::crypto::{BlindingEngine, KeyMaterial, Signer, SigningMode};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Default)]
struct SeqnoSink {
    seqnos: Mutex<Vec<i64>>,
}

#[async_trait]
impl MessageSink for SeqnoSink {
    async fn deliver(&self, message: &RoomMessage, _envelope: Envelope) {
        if let Some(seqno) = message.seqno {
            self.seqnos.lock().unwrap().push(seqno);
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn sealed_text() -> String {
    BASE64.encode(seal(&OutgoingMessage {
        body: "x",
        display_name: None,
        timestamp_ms: 0,
    }))
}

fn signer(seed: [u8; 32], server: [u8; 32], mode: SigningMode) -> Signer {
    let keys = Arc::new(KeyMaterial::from_seed(&seed).unwrap());
    let engine = BlindingEngine::new(Arc::clone(&keys));
    Signer::new(&engine, keys, &server, mode).unwrap()
}

// ============================================================================
// PADDING
// ============================================================================

proptest! {
    /// Property: unpad(pad(x)) == x for every input
    #[test]
    fn padding_roundtrip(plain in prop::collection::vec(any::<u8>(), 0..1000)) {
        let padded = pad(&plain);
        prop_assert_eq!(unpad(&padded), plain.as_slice());
    }

    /// Property: padded length is one short of a block boundary
    #[test]
    fn padding_block_aligned(plain in prop::collection::vec(any::<u8>(), 0..1000)) {
        let padded = pad(&plain);
        prop_assert_eq!(padded.len() % PADDING_BLOCK, PADDING_BLOCK - 1);
        prop_assert!(padded.len() > plain.len());
    }

    /// Property: unpad is a no-op when the last byte is neither 0x00 nor 0x80
    #[test]
    fn unpad_noop_on_unpadded(
        mut plain in prop::collection::vec(any::<u8>(), 0..500),
        last in any::<u8>().prop_filter("not padding", |b| *b != 0x00 && *b != 0x80),
    ) {
        plain.push(last);
        prop_assert_eq!(unpad(&plain), plain.as_slice());
    }
}

// ============================================================================
// SIGNATURES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: blinded signatures verify under kA with standard Ed25519
    #[test]
    fn blinded_signature_verifies(
        seed in any::<[u8; 32]>(),
        server in any::<[u8; 32]>(),
        message in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let signer = signer(seed, server, SigningMode::Blinded);
        let key = VerifyingKey::from_bytes(signer.blinding().blinded_public_key()).unwrap();
        let signature = DalekSignature::from_bytes(&signer.sign(&message));

        prop_assert!(key.verify_strict(&message, &signature).is_ok());
    }

    /// Property: unblinded signatures verify under the raw signing key
    #[test]
    fn unblinded_signature_verifies(
        seed in any::<[u8; 32]>(),
        message in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let signer = signer(seed, [1u8; 32], SigningMode::Unblinded);
        let key = VerifyingKey::from_bytes(signer.keys().signing_public_key()).unwrap();
        let signature = DalekSignature::from_bytes(&signer.sign(&message));

        prop_assert!(key.verify_strict(&message, &signature).is_ok());
    }

    /// Property: unblinded message signatures verify from the X25519 key alone
    #[test]
    fn unblinded_message_signature_verifies(
        seed in any::<[u8; 32]>(),
        message in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let signer = signer(seed, [1u8; 32], SigningMode::Unblinded);
        let account = *signer.keys().encryption_public_key();
        let signature = signer.sign_message(&message);

        prop_assert!(verify_xed25519(&account, &message, &signature));
        let mut tampered = message.clone();
        tampered.push(0);
        prop_assert!(!verify_xed25519(&account, &tampered, &signature));
    }

    /// Property: distinct servers see distinct blinded keys and signatures
    #[test]
    fn blinding_unlinkable(
        seed in any::<[u8; 32]>(),
        server_a in any::<[u8; 32]>(),
        server_b in any::<[u8; 32]>(),
    ) {
        prop_assume!(server_a != server_b);

        let a = signer(seed, server_a, SigningMode::Blinded);
        let b = signer(seed, server_b, SigningMode::Blinded);

        prop_assert_ne!(a.blinding().blinded_public_key(), b.blinding().blinded_public_key());
        prop_assert_ne!(a.sign(b"same message"), b.sign(b"same message"));
    }
}

// ============================================================================
// POLLING
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: catching up from s to N takes ceil((N - s) / limit) fetches
    /// and delivers exactly the seqnos in (s, N]
    #[test]
    fn pagination_totality(
        total in 0i64..1200,
        start_fraction in 0.0f64..1.0,
        limit in 1u32..=256,
    ) {
        let since = (total as f64 * start_fraction) as i64;
        let data = sealed_text();
        let mock = MockSogsClient::new();
        for _ in 0..total {
            mock.push_message(Some(data.clone()));
        }

        let sink = SeqnoSink::default();
        let mut cursor = PollCursor::new("room", since, limit);
        let (_tx, rx) = watch::channel(false);
        runtime().block_on(cursor.poll_once(&mock, &sink, &rx)).unwrap();

        let remaining = (total - since) as usize;
        let expected_fetches = remaining.div_ceil(limit as usize);
        prop_assert_eq!(mock.page_fetches().len(), expected_fetches);

        let seqnos = sink.seqnos.lock().unwrap().clone();
        let expected: Vec<i64> = ((since + 1)..=total).collect();
        prop_assert_eq!(seqnos, expected);
        prop_assert_eq!(cursor.position(), total.max(since));
    }

    /// Property: the cursor never decreases across cycles, whether or not
    /// the server reports sequence numbers
    #[test]
    fn cursor_monotonic(
        batches in prop::collection::vec((0usize..300, any::<bool>()), 1..6),
        limit in 1u32..=256,
    ) {
        let rt = runtime();
        let mock = MockSogsClient::new();
        let sink = SeqnoSink::default();
        let mut cursor = PollCursor::new("room", 0, limit);
        let (_tx, rx) = watch::channel(false);

        let mut previous = cursor.position();
        let mut head = 0i64;
        for (count, omit_seqno) in batches {
            mock.push_empty_messages(count);
            mock.omit_seqno(omit_seqno);
            head += count as i64;

            rt.block_on(cursor.poll_once(&mock, &sink, &rx)).unwrap();
            prop_assert!(cursor.position() >= previous);
            prop_assert_eq!(cursor.position(), head);
            previous = cursor.position();
        }
    }
}
