use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::{Attachment, ConversationId, MessageId};

/// Outbound chat message handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub conversation: ConversationId,
    /// Empty for attachment-only sends.
    pub body: String,
    pub multi_party: bool,
    pub attachment: Option<Attachment>,
}

/// Requests the core issues to the network layer.
///
/// Every call is fire-and-forget. Results come back to the client as events:
/// pages as `PageReceived`, sends as `SendAcknowledged`, rosters as `RosterReceived` and the
/// recalled message as `LastMessageReceived`.
pub trait ChatTransport: Send + Sync {
    fn fetch_initial_page(&self, conversation: &ConversationId);

    /// Requests the page of messages published strictly before `before`.
    fn fetch_history_page(&self, conversation: &ConversationId, before: Option<DateTime<Utc>>);

    fn send_message(&self, message: OutboundMessage);

    /// Replaces the last sent message of the conversation.
    fn send_correction(&self, conversation: &ConversationId, body: &str);

    fn send_composing(&self, conversation: &ConversationId);

    fn send_paused(&self, conversation: &ConversationId);

    fn send_displayed(&self, conversation: &ConversationId, message: &MessageId);

    fn fetch_roster(&self, conversation: &ConversationId);

    fn fetch_last_message(&self, conversation: &ConversationId);
}

/// One recorded transport request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum TransportCall {
    FetchInitialPage {
        conversation: ConversationId,
    },
    FetchHistoryPage {
        conversation: ConversationId,
        before: Option<DateTime<Utc>>,
    },
    SendMessage(OutboundMessage),
    SendCorrection {
        conversation: ConversationId,
        body: String,
    },
    SendComposing {
        conversation: ConversationId,
    },
    SendPaused {
        conversation: ConversationId,
    },
    SendDisplayed {
        conversation: ConversationId,
        message: MessageId,
    },
    FetchRoster {
        conversation: ConversationId,
    },
    FetchLastMessage {
        conversation: ConversationId,
    },
}

/// Transport that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().clone()
    }

    /// Returns and forgets every call recorded so far.
    pub fn drain(&self) -> Vec<TransportCall> {
        std::mem::take(&mut *self.lock())
    }

    fn record(&self, call: TransportCall) {
        tracing::trace!(?call, "transport call");
        self.lock().push(call);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TransportCall>> {
        // A panic while recording cannot leave the vector half-written.
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChatTransport for RecordingTransport {
    fn fetch_initial_page(&self, conversation: &ConversationId) {
        self.record(TransportCall::FetchInitialPage {
            conversation: conversation.clone(),
        });
    }

    fn fetch_history_page(&self, conversation: &ConversationId, before: Option<DateTime<Utc>>) {
        self.record(TransportCall::FetchHistoryPage {
            conversation: conversation.clone(),
            before,
        });
    }

    fn send_message(&self, message: OutboundMessage) {
        self.record(TransportCall::SendMessage(message));
    }

    fn send_correction(&self, conversation: &ConversationId, body: &str) {
        self.record(TransportCall::SendCorrection {
            conversation: conversation.clone(),
            body: body.to_string(),
        });
    }

    fn send_composing(&self, conversation: &ConversationId) {
        self.record(TransportCall::SendComposing {
            conversation: conversation.clone(),
        });
    }

    fn send_paused(&self, conversation: &ConversationId) {
        self.record(TransportCall::SendPaused {
            conversation: conversation.clone(),
        });
    }

    fn send_displayed(&self, conversation: &ConversationId, message: &MessageId) {
        self.record(TransportCall::SendDisplayed {
            conversation: conversation.clone(),
            message: message.clone(),
        });
    }

    fn fetch_roster(&self, conversation: &ConversationId) {
        self.record(TransportCall::FetchRoster {
            conversation: conversation.clone(),
        });
    }

    fn fetch_last_message(&self, conversation: &ConversationId) {
        self.record(TransportCall::FetchLastMessage {
            conversation: conversation.clone(),
        });
    }
}
