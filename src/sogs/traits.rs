//! Community server client abstraction
//!
//! `SogsClient` is the seam between the bot and the network. The reqwest
//! implementation lives in `client`, the in-memory one in `mock`.

use super::auth::AuthHeaders;
use super::envelope::EnvelopeError;
use crate::crypto::KeyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Room metadata; only the head counter matters to the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub message_sequence: i64,
}

/// One entry of `/messages/since/{n}`.
///
/// `data` is null for deleted messages. `seqno` is optional so that older
/// servers that omit it still paginate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: i64,
    #[serde(default)]
    pub seqno: Option<i64>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub posted: Option<f64>,
}

/// JSON body of `POST /room/{token}/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMessage {
    pub data: String,
    pub signature: String,
}

/// Server reply to a successful post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedMessage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub seqno: Option<i64>,
    #[serde(default)]
    pub posted: Option<f64>,
}

/// A fully signed request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
    pub headers: AuthHeaders,
}

/// Result type for community server operations
pub type SogsResult<T> = Result<T, SogsError>;

/// Community server errors
#[derive(Debug, thiserror::Error)]
pub enum SogsError {
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Community server client.
#[async_trait]
pub trait SogsClient: Send + Sync {
    /// `GET /room/{token}`
    async fn room_info(&self, room: &str) -> SogsResult<RoomInfo>;

    /// `GET /room/{token}/messages/since/{since}?limit={limit}`
    async fn messages_since(
        &self,
        room: &str,
        since: i64,
        limit: u32,
    ) -> SogsResult<Vec<RoomMessage>>;

    /// `POST` a signed request to `request.path` and parse the reply.
    async fn post_message(&self, request: &SignedRequest) -> SogsResult<PostedMessage>;
}

/// Path of the room info endpoint.
pub fn room_path(room: &str) -> String {
    format!("/room/{}", room)
}

/// Path of the paginated message endpoint, without query string.
pub fn messages_since_path(room: &str, since: i64) -> String {
    format!("/room/{}/messages/since/{}", room, since)
}

/// Path of the post endpoint.
pub fn post_message_path(room: &str) -> String {
    format!("/room/{}/message", room)
}
