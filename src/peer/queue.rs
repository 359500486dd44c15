use std::collections::VecDeque;

use super::fast::FastExtensionState;
use super::message::Message;

/// What happened to a peer's queued piece uploads when it was choked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChokeOutcome {
    /// Allowed-fast uploads kept in the queue.
    pub retained: usize,
    /// Uploads removed from the queue.
    pub cancelled: usize,
    /// Reject messages queued in place of cancelled uploads.
    pub rejected: usize,
}

/// Messages waiting to be written to a peer, front first.
#[derive(Debug, Clone, Default)]
pub struct OutboundQueue {
    messages: VecDeque<Message>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    /// Queues a control message ahead of everything else.
    pub fn push_front(&mut self, message: Message) {
        self.messages.push_front(message);
    }

    pub fn pop_front(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    pub fn front(&self) -> Option<&Message> {
        self.messages.front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Rewrites queued piece uploads after the peer was choked.
    ///
    /// With the fast extension negotiated (`fast` is `Some`), uploads of
    /// allowed-fast pieces stay queued and every other upload is swapped for a
    /// `Reject` at the same position. Without it, uploads are dropped
    /// silently. Everything that is not a piece upload keeps its place.
    pub fn reconcile_on_choke(&mut self, fast: Option<&FastExtensionState>) -> ChokeOutcome {
        let mut outcome = ChokeOutcome::default();
        if self.messages.is_empty() {
            return outcome;
        }

        let pending = std::mem::take(&mut self.messages);
        for message in pending {
            let Some(request) = message.piece_request() else {
                self.messages.push_back(message);
                continue;
            };

            match fast {
                Some(state) if state.should_serve_choked_request(request.piece) => {
                    outcome.retained += 1;
                    self.messages.push_back(message);
                }
                Some(_) => {
                    outcome.cancelled += 1;
                    outcome.rejected += 1;
                    self.messages.push_back(Message::reject(&request));
                }
                None => outcome.cancelled += 1,
            }
        }

        outcome
    }
}
