//! Community bot
//!
//! Ties the pieces together:
//! - polls the room through [`PollCursor`]
//! - answers messages whose body matches the [`ResponseTable`]
//! - signs every reply twice: the sealed message for the room, and the
//!   HTTP request for the server
//! - persists the cursor after each cycle and backs off on network failures
//!
//! Unblinded replies carry an XEd25519 message signature under the account
//! key; blinded replies use the blinded key for both signatures.

use super::auth::RequestAuthenticator;
use super::envelope::{seal, Envelope, OutgoingMessage};
use super::poller::{MessageSink, PollCursor, PollOutcome};
use super::retry::{is_retryable, RetryPolicy};
use super::traits::*;
use super::triggers::ResponseTable;
use crate::config::{BotConfig, CursorStore};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Runtime settings, taken from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub room: String,
    pub display_name: Option<String>,
    pub poll_interval: Duration,
    pub page_limit: u32,
    pub retry: RetryPolicy,
}

impl BotSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            room: config.server.room.clone(),
            display_name: config.identity.display_name.clone(),
            poll_interval: config.poll_interval(),
            page_limit: config.poll.page_limit,
            retry: config.poll.retry,
        }
    }
}

/// Builds signed `POST /room/{token}/message` requests.
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    authenticator: RequestAuthenticator,
    path: String,
    display_name: Option<String>,
}

impl ReplyComposer {
    pub fn new(authenticator: RequestAuthenticator, room: &str, display_name: Option<String>) -> Self {
        Self {
            authenticator,
            path: post_message_path(room),
            display_name,
        }
    }

    /// Identity the server will see (`00…` or `15…`).
    pub fn identity(&self) -> String {
        self.authenticator.signer().identity()
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    pub fn compose(&self, text: &str) -> SogsResult<SignedRequest> {
        self.compose_at(text, unix_millis())
    }

    /// Compose with a fixed message timestamp (milliseconds).
    pub fn compose_at(&self, text: &str, timestamp_ms: u64) -> SogsResult<SignedRequest> {
        let sealed = seal(&OutgoingMessage {
            body: text,
            display_name: self.display_name.as_deref(),
            timestamp_ms,
        });
        let signature = self.authenticator.signer().sign_message(&sealed);

        let body = serde_json::to_vec(&PostMessage {
            data: BASE64.encode(&sealed),
            signature: BASE64.encode(signature),
        })
        .map_err(|e| SogsError::Send(format!("failed to encode message body: {}", e)))?;

        let headers = self.authenticator.authenticate("POST", &self.path, &body);
        Ok(SignedRequest {
            method: "POST".to_string(),
            path: self.path.clone(),
            body,
            headers,
        })
    }
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub poll: PollOutcome,
    pub replies_sent: usize,
    pub replies_failed: usize,
}

/// Answers delivered messages during one cycle.
struct Responder<'a, C: SogsClient> {
    client: &'a C,
    composer: &'a ReplyComposer,
    responses: &'a ResponseTable,
    own_identity: String,
    sent: AtomicUsize,
    failed: AtomicUsize,
}

impl<'a, C: SogsClient> Responder<'a, C> {
    async fn reply(&self, text: &str) -> SogsResult<PostedMessage> {
        let request = self.composer.compose(text)?;
        self.client.post_message(&request).await
    }
}

#[async_trait]
impl<'a, C: SogsClient> MessageSink for Responder<'a, C> {
    async fn deliver(&self, message: &RoomMessage, envelope: Envelope) {
        if message.session_id.as_deref() == Some(self.own_identity.as_str()) {
            return;
        }
        let Some(body) = envelope.body.as_deref() else {
            return;
        };

        for response in self.responses.matches(body) {
            match self.reply(response).await {
                Ok(posted) => {
                    self.sent.fetch_add(1, Ordering::Relaxed);
                    info!(reply_to = message.id, seqno = ?posted.seqno, "sent reply");
                }
                Err(e) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(reply_to = message.id, "failed to send reply: {}", e);
                }
            }
        }
    }
}

/// Community bot
pub struct SogsBot<C: SogsClient> {
    client: C,
    composer: ReplyComposer,
    responses: ResponseTable,
    cursor: PollCursor,
    settings: BotSettings,
}

impl<C: SogsClient> SogsBot<C> {
    /// `since` is the last seqno already handled, usually from [`CursorStore`].
    pub fn new(
        client: C,
        authenticator: RequestAuthenticator,
        responses: ResponseTable,
        settings: BotSettings,
        since: i64,
    ) -> Self {
        let composer =
            ReplyComposer::new(authenticator, &settings.room, settings.display_name.clone());
        let cursor = PollCursor::new(settings.room.clone(), since, settings.page_limit);

        Self {
            client,
            composer,
            responses,
            cursor,
            settings,
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor.position()
    }

    pub fn identity(&self) -> String {
        self.composer.identity()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Post `text` to the room outside of the poll loop.
    pub async fn post(&self, text: &str) -> SogsResult<PostedMessage> {
        let request = self.composer.compose(text)?;
        self.client.post_message(&request).await
    }

    /// Catch up once and answer everything that matched.
    pub async fn poll_cycle(&mut self, shutdown: &watch::Receiver<bool>) -> SogsResult<CycleReport> {
        let responder = Responder {
            client: &self.client,
            composer: &self.composer,
            responses: &self.responses,
            own_identity: self.composer.identity(),
            sent: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        };

        let poll = self
            .cursor
            .poll_once(&self.client, &responder, shutdown)
            .await?;

        Ok(CycleReport {
            poll,
            replies_sent: responder.sent.load(Ordering::Relaxed),
            replies_failed: responder.failed.load(Ordering::Relaxed),
        })
    }

    /// Poll until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The cursor is saved after every cycle, including failed ones, since
    /// a failed cycle keeps the pages it finished. A failed save is logged
    /// and tried again after the next cycle. Only network failures are
    /// retried; any other error ends the loop.
    pub async fn run(
        &mut self,
        store: &CursorStore,
        mut shutdown: watch::Receiver<bool>,
    ) -> SogsResult<()> {
        let mut failures: u32 = 0;
        info!(room = %self.settings.room, since = self.cursor(), identity = %self.identity(), "polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = self.poll_cycle(&shutdown).await;
            if let Err(e) = store.save(self.cursor()) {
                warn!(cursor = self.cursor(), path = %store.path().display(), "failed to save cursor: {}", e);
            }

            let delay = match result {
                Ok(report) => {
                    failures = 0;
                    if report.poll.pages > 0 {
                        info!(
                            cursor = report.poll.cursor,
                            delivered = report.poll.delivered,
                            malformed = report.poll.malformed,
                            replies = report.replies_sent,
                            failed = report.replies_failed,
                            "poll cycle complete"
                        );
                    } else {
                        debug!(cursor = report.poll.cursor, "no new messages");
                    }
                    self.settings.poll_interval
                }
                Err(SogsError::Cancelled) => break,
                Err(e) if is_retryable(&e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.settings.retry.delay_for(failures);
                    warn!(
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "poll cycle failed, backing off: {}",
                        e
                    );
                    delay
                }
                Err(e) => return Err(e),
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cursor = self.cursor(), "polling stopped");
        Ok(())
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
