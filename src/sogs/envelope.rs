//! Room message envelopes
//!
//! Inbound `data` strings go through four steps:
//!
//! 1. base64 decode
//! 2. strip padding (trailing `0x00` run, then one `0x80` marker)
//! 3. verify against the `Content` schema
//! 4. decode into an [`Envelope`]
//!
//! Only [`verify`] can produce a [`VerifiedContent`], and [`decode`] only
//! accepts that type, so unverified bytes are never decoded.

use super::proto;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use prost::Message as _;
use thiserror::Error;

/// Padded envelopes are a multiple of this many bytes, minus one.
pub const PADDING_BLOCK: usize = 160;

const PADDING_MARKER: u8 = 0x80;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid wire format: {0}")]
    Wire(#[from] prost::DecodeError),

    #[error("Schema violation: {0}")]
    Schema(String),
}

/// Decoded room message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub body: Option<String>,
    pub timestamp: Option<u64>,
    pub attachments: Vec<Attachment>,
    pub quote: Option<Quote>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub content_type: Option<String>,
    pub size: Option<u32>,
    pub file_name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub id: u64,
    pub author: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// Wire content that passed schema verification.
#[derive(Debug, Clone)]
pub struct VerifiedContent(proto::Content);

/// Append the `0x80` marker and zero fill up to the next block boundary.
///
/// Output length is `ceil((n + 2) / 160) * 160 - 1`.
pub fn pad(plain: &[u8]) -> Vec<u8> {
    let blocks = (plain.len() + 2).div_ceil(PADDING_BLOCK);
    let mut padded = vec![0u8; blocks * PADDING_BLOCK - 1];
    padded[..plain.len()].copy_from_slice(plain);
    padded[plain.len()] = PADDING_MARKER;
    padded
}

/// Strip trailing zeros, then a single `0x80` if it is now the last byte.
pub fn unpad(bytes: &[u8]) -> &[u8] {
    let mut len = bytes.len();
    while len > 0 && bytes[len - 1] == 0 {
        len -= 1;
    }
    if len > 0 && bytes[len - 1] == PADDING_MARKER {
        len -= 1;
    }
    &bytes[..len]
}

/// Check `bytes` against the `Content` schema.
pub fn verify(bytes: &[u8]) -> Result<VerifiedContent, EnvelopeError> {
    let content = proto::Content::decode(bytes)?;

    if let Some(data) = &content.data_message {
        for (i, attachment) in data.attachments.iter().enumerate() {
            if attachment.id.is_none() {
                return Err(EnvelopeError::Schema(format!(
                    "dataMessage.attachments[{}].id: required",
                    i
                )));
            }
        }

        if let Some(quote) = &data.quote {
            if quote.id.is_none() {
                return Err(EnvelopeError::Schema("dataMessage.quote.id: required".into()));
            }
            if quote.author.is_none() {
                return Err(EnvelopeError::Schema(
                    "dataMessage.quote.author: required".into(),
                ));
            }
            for (i, quoted) in quote.attachments.iter().enumerate() {
                if quoted.thumbnail.as_ref().is_some_and(|t| t.id.is_none()) {
                    return Err(EnvelopeError::Schema(format!(
                        "dataMessage.quote.attachments[{}].thumbnail.id: required",
                        i
                    )));
                }
            }
        }
    }

    Ok(VerifiedContent(content))
}

/// Convert verified wire content into an [`Envelope`].
pub fn decode(verified: VerifiedContent) -> Envelope {
    let Some(data) = verified.0.data_message else {
        return Envelope::default();
    };

    Envelope {
        body: data.body,
        timestamp: data.timestamp,
        attachments: data
            .attachments
            .into_iter()
            .filter_map(|a| {
                Some(Attachment {
                    id: a.id?,
                    content_type: a.content_type,
                    size: a.size,
                    file_name: a.file_name,
                    url: a.url,
                })
            })
            .collect(),
        quote: data.quote.and_then(|q| {
            Some(Quote {
                id: q.id?,
                author: q.author?,
                text: q.text,
            })
        }),
        profile: data.profile.map(|p| Profile {
            display_name: p.display_name,
            picture_url: p.profile_picture,
        }),
    }
}

/// Full inbound pipeline for a base64 `data` field.
pub fn open(data: &str) -> Result<Envelope, EnvelopeError> {
    let raw = BASE64.decode(data.trim())?;
    let verified = verify(unpad(&raw))?;
    Ok(decode(verified))
}

/// A plain-text message to post.
#[derive(Debug, Clone)]
pub struct OutgoingMessage<'a> {
    pub body: &'a str,
    pub display_name: Option<&'a str>,
    pub timestamp_ms: u64,
}

/// Encode and pad an outgoing message; the result is what gets signed.
pub fn seal(message: &OutgoingMessage<'_>) -> Vec<u8> {
    let content = proto::Content {
        data_message: Some(proto::DataMessage {
            body: Some(message.body.to_string()),
            timestamp: Some(message.timestamp_ms),
            profile: message.display_name.map(|name| proto::LokiProfile {
                display_name: Some(name.to_string()),
                profile_picture: None,
            }),
            ..Default::default()
        }),
    };
    pad(&content.encode_to_vec())
}
