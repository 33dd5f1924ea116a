//! Recovery phrase codec
//!
//! Phrases use the 1626-word English list where every word is unique in its
//! first three letters. Each group of three words carries one little-endian
//! `u32`, so a 16-byte seed becomes 12 data words. A trailing checksum word,
//! picked by CRC-32 over the data words' prefixes, makes 13.
//!
//! Only the three-letter prefix of a word is significant on input.

use lazy_static::lazy_static;
use std::collections::HashMap;
use zeroize::Zeroizing;

use super::keys::KeyError;

const WORDLIST: &str = include_str!("english.txt");

/// Letters of a word that identify it.
pub const PREFIX_LEN: usize = 3;

/// Number of words in the list.
pub const WORD_COUNT: usize = 1626;

/// Words in a phrase for a 16-byte seed, checksum included.
pub const PHRASE_WORDS: usize = 13;

lazy_static! {
    static ref WORDS: Vec<&'static str> = WORDLIST.split_whitespace().collect();
    static ref PREFIXES: HashMap<&'static str, u64> = WORDS
        .iter()
        .enumerate()
        .map(|(i, &w)| (prefix(w), i as u64))
        .collect();
}

fn prefix(word: &str) -> &str {
    match word.char_indices().nth(PREFIX_LEN) {
        Some((end, _)) => &word[..end],
        None => word,
    }
}

/// Encode seed bytes as a phrase.
///
/// `seed` must be a multiple of four bytes long.
pub fn encode(seed: &[u8]) -> Result<Zeroizing<String>, KeyError> {
    if seed.is_empty() || seed.len() % 4 != 0 {
        return Err(KeyError::InvalidKey(format!(
            "seed length {} is not a multiple of 4",
            seed.len()
        )));
    }

    let n = WORD_COUNT as u64;
    let mut words: Vec<&'static str> = Vec::with_capacity(seed.len() / 4 * 3 + 1);
    for chunk in seed.chunks_exact(4) {
        let x = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as u64;
        let w1 = x % n;
        let w2 = (x / n + w1) % n;
        let w3 = (x / n / n + w2) % n;
        words.extend([w1, w2, w3].iter().map(|&i| WORDS[i as usize]));
    }
    let check = words[checksum_index(&words)];
    words.push(check);

    Ok(Zeroizing::new(words.join(" ")))
}

/// Decode a phrase back to its seed bytes.
///
/// Input is whitespace-split and lowercased. The last word must be the
/// checksum word.
pub fn decode(phrase: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let words: Zeroizing<Vec<String>> = Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect(),
    );

    let (checksum, data) = match words.split_last() {
        Some((last, data)) if !data.is_empty() && data.len() % 3 == 0 => (last, data),
        _ => {
            return Err(KeyError::InvalidMnemonic(format!(
                "expected {} words, got {}",
                PHRASE_WORDS,
                words.len()
            )))
        }
    };

    let mut indices = Zeroizing::new(Vec::with_capacity(data.len()));
    for word in data {
        let index = PREFIXES
            .get(prefix(word))
            .ok_or_else(|| KeyError::InvalidMnemonic(format!("unknown word '{}'", word)))?;
        indices.push(*index);
    }

    let expected = prefix(WORDS[checksum_index(data)]);
    if prefix(checksum) != expected {
        return Err(KeyError::InvalidMnemonic("checksum word mismatch".to_string()));
    }

    let n = WORD_COUNT as u64;
    let mut seed = Zeroizing::new(Vec::with_capacity(data.len() / 3 * 4));
    for triple in indices.chunks_exact(3) {
        let (w1, w2, w3) = (triple[0], triple[1], triple[2]);
        let x = w1 + n * ((n - w1 + w2) % n) + n * n * ((n - w2 + w3) % n);
        let x = u32::try_from(x)
            .map_err(|_| KeyError::InvalidMnemonic("word triple out of range".to_string()))?;
        seed.extend_from_slice(&x.to_le_bytes());
    }

    Ok(seed)
}

fn checksum_index<S: AsRef<str>>(data: &[S]) -> usize {
    let joined: String = data.iter().map(|w| prefix(w.as_ref())).collect();
    crc32(joined.as_bytes()) as usize % data.len()
}

/// CRC-32 (IEEE 802.3, reflected).
fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
