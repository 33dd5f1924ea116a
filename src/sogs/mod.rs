//! Community server (SOGS) integration
//!
//! Implements the bot side of the room protocol:
//! - Request authentication with blinded or unblinded keys
//! - Envelope padding, validation and decoding
//! - Paginated polling with a persistent cursor
//! - Trigger matching and signed replies

pub mod auth;
pub mod bot;
pub mod client;
pub mod envelope;
pub mod mock;
pub mod poller;
mod proto;
pub mod retry;
pub mod traits;
pub mod triggers;

#[cfg(test)]
mod proptests;

pub use auth::{AuthHeaders, RequestAuthenticator, SigningRequest};
pub use bot::{BotSettings, CycleReport, ReplyComposer, SogsBot};
pub use client::HttpSogsClient;
pub use envelope::{Envelope, EnvelopeError};
pub use mock::MockSogsClient;
pub use poller::{MessageSink, PollCursor, PollOutcome};
pub use retry::RetryPolicy;
pub use traits::{SogsClient, SogsError, SogsResult};
pub use triggers::{ResponseRule, ResponseTable};
