//! Mock community server client for testing
//!
//! Holds a room history in memory and answers the three endpoints the bot
//! uses, recording every call for assertions.

use super::traits::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock community server client
#[derive(Clone, Default)]
pub struct MockSogsClient {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    messages: Vec<RoomMessage>,
    /// Overrides the head reported by `room_info` when set.
    head_override: Option<i64>,
    /// `since` value of every page fetch, in order.
    page_fetches: Vec<i64>,
    posted: Vec<SignedRequest>,
    /// Failures to return from upcoming fetches (room info or pages).
    fetch_failures: VecDeque<SogsError>,
    /// Failure to return from the page fetch with this index.
    page_failure: Option<(usize, SogsError)>,
    /// Failures to return from upcoming posts.
    post_failures: VecDeque<SogsError>,
    omit_seqno: bool,
}

impl MockSogsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message with the next sequence number; returns that seqno.
    pub fn push_message(&self, data: Option<String>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let seqno = state.messages.len() as i64 + 1;
        state.messages.push(RoomMessage {
            id: seqno,
            seqno: Some(seqno),
            data,
            session_id: Some(format!("15{:064x}", seqno)),
            posted: Some(seqno as f64),
        });
        seqno
    }

    /// Like `push_message`, with an explicit sender.
    pub fn push_message_from(&self, session_id: &str, data: Option<String>) -> i64 {
        let seqno = self.push_message(data);
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.messages.last_mut() {
            message.session_id = Some(session_id.to_string());
        }
        seqno
    }

    /// Fill the room with `count` deleted (data-less) messages.
    pub fn push_empty_messages(&self, count: usize) {
        for _ in 0..count {
            self.push_message(None);
        }
    }

    /// Report `head` from `room_info` regardless of stored messages.
    pub fn set_head(&self, head: i64) {
        self.state.lock().unwrap().head_override = Some(head);
    }

    /// Serve pages without `seqno` fields.
    pub fn omit_seqno(&self, omit: bool) {
        self.state.lock().unwrap().omit_seqno = omit;
    }

    /// Make the next fetch fail with `err`.
    pub fn fail_next_fetch(&self, err: SogsError) {
        self.state.lock().unwrap().fetch_failures.push_back(err);
    }

    /// Make the page fetch after `pages` successful ones fail with `err`.
    pub fn fail_page_after(&self, pages: usize, err: SogsError) {
        self.state.lock().unwrap().page_failure = Some((pages, err));
    }

    /// Make the next post fail with `err`.
    pub fn fail_next_post(&self, err: SogsError) {
        self.state.lock().unwrap().post_failures.push_back(err);
    }

    /// `since` of every page fetch so far.
    pub fn page_fetches(&self) -> Vec<i64> {
        self.state.lock().unwrap().page_fetches.clone()
    }

    /// Every request that was posted.
    pub fn posted(&self) -> Vec<SignedRequest> {
        self.state.lock().unwrap().posted.clone()
    }

    /// Clear recorded calls, keeping the room history.
    pub fn clear_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.page_fetches.clear();
        state.posted.clear();
    }
}

#[async_trait]
impl SogsClient for MockSogsClient {
    async fn room_info(&self, room: &str) -> SogsResult<RoomInfo> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fetch_failures.pop_front() {
            return Err(err);
        }

        Ok(RoomInfo {
            token: Some(room.to_string()),
            name: None,
            message_sequence: state
                .head_override
                .unwrap_or(state.messages.len() as i64),
        })
    }

    async fn messages_since(
        &self,
        _room: &str,
        since: i64,
        limit: u32,
    ) -> SogsResult<Vec<RoomMessage>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fetch_failures.pop_front() {
            return Err(err);
        }
        if matches!(state.page_failure, Some((at, _)) if at == state.page_fetches.len()) {
            if let Some((_, err)) = state.page_failure.take() {
                return Err(err);
            }
        }
        state.page_fetches.push(since);

        let omit_seqno = state.omit_seqno;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.seqno.unwrap_or(0) > since)
            .take(limit as usize)
            .cloned()
            .map(|mut m| {
                if omit_seqno {
                    m.seqno = None;
                }
                m
            })
            .collect())
    }

    async fn post_message(&self, request: &SignedRequest) -> SogsResult<PostedMessage> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.post_failures.pop_front() {
            return Err(err);
        }

        state.posted.push(request.clone());
        let seqno = state.messages.len() as i64 + 1;
        Ok(PostedMessage {
            id: Some(seqno),
            seqno: Some(seqno),
            posted: None,
        })
    }
}
