//! Paginated catch-up polling
//!
//! One call to [`PollCursor::poll_once`] reads the room head, then fetches
//! pages of up to `page_limit` messages after the cursor until the head is
//! reached. After each page the cursor moves to the highest `seqno` seen in
//! it; a page without usable sequence numbers moves it by one stride, capped
//! at the head so that it never runs past messages the server has not
//! assigned yet.
//!
//! The cursor only moves forward, and only after a page has been fully
//! dispatched, so a failure mid-cycle never skips or replays a page.

use super::envelope::{self, Envelope};
use super::traits::*;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Largest page the server will return.
pub const MAX_PAGE_LIMIT: u32 = 256;

/// Receives every successfully decoded message.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, message: &RoomMessage, envelope: Envelope);
}

/// Counters for one poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub head: i64,
    pub cursor: i64,
    pub pages: usize,
    pub delivered: usize,
    pub deleted: usize,
    pub malformed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCursor {
    room: String,
    since: i64,
    page_limit: u32,
}

impl PollCursor {
    /// `page_limit` is clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(room: impl Into<String>, since: i64, page_limit: u32) -> Self {
        Self {
            room: room.into(),
            since: since.max(0),
            page_limit: page_limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Last sequence number fully processed.
    pub fn position(&self) -> i64 {
        self.since
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    /// Catch up to the current room head.
    ///
    /// Returns `Cancelled` if `shutdown` flips to `true` between pages;
    /// pages finished before that are kept.
    pub async fn poll_once<C, S>(
        &mut self,
        client: &C,
        sink: &S,
        shutdown: &watch::Receiver<bool>,
    ) -> SogsResult<PollOutcome>
    where
        C: SogsClient + ?Sized,
        S: MessageSink + ?Sized,
    {
        let head = client.room_info(&self.room).await?.message_sequence;
        let mut outcome = PollOutcome {
            head,
            cursor: self.since,
            ..Default::default()
        };

        while self.since < head {
            if *shutdown.borrow() {
                return Err(SogsError::Cancelled);
            }

            let page = client
                .messages_since(&self.room, self.since, self.page_limit)
                .await?;
            debug!(room = %self.room, since = self.since, count = page.len(), "fetched page");

            let mut high_water: Option<i64> = None;
            for message in &page {
                if let Some(seqno) = message.seqno {
                    high_water = Some(high_water.map_or(seqno, |h| h.max(seqno)));
                }
                self.dispatch(message, sink, &mut outcome).await;
            }

            self.since = self.next_position(high_water, head);
            outcome.pages += 1;
            outcome.cursor = self.since;
        }

        Ok(outcome)
    }

    async fn dispatch<S: MessageSink + ?Sized>(
        &self,
        message: &RoomMessage,
        sink: &S,
        outcome: &mut PollOutcome,
    ) {
        let Some(data) = message.data.as_deref() else {
            outcome.deleted += 1;
            return;
        };

        match envelope::open(data) {
            Ok(envelope) => {
                sink.deliver(message, envelope).await;
                outcome.delivered += 1;
            }
            Err(e) => {
                warn!(
                    id = message.id,
                    seqno = ?message.seqno,
                    sender = message.session_id.as_deref().unwrap_or("unknown"),
                    "skipping malformed message: {}",
                    e
                );
                outcome.malformed += 1;
            }
        }
    }

    fn next_position(&self, high_water: Option<i64>, head: i64) -> i64 {
        match high_water {
            Some(seqno) if seqno > self.since => seqno,
            _ => {
                let stride = self.since.saturating_add(i64::from(self.page_limit));
                stride.min(head).max(self.since)
            }
        }
    }
}
