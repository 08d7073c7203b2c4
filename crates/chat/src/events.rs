use tokio::time::Instant;

use crate::message::{Attachment, ConversationId, Message};
use crate::page::{Direction, Page};
use crate::panel::InputAction;
use crate::view::ConversationKind;

/// Everything the client reacts to: UI input, transport results and fired timers.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Open {
        conversation: ConversationId,
        kind: ConversationKind,
    },
    Close {
        conversation: ConversationId,
    },
    Focus {
        conversation: ConversationId,
    },
    /// A history or live page arrived. Routed by the conversation of its first message.
    PageReceived {
        page: Page,
        direction: Direction,
    },
    Input {
        conversation: ConversationId,
        action: InputAction,
    },
    AttachmentUploaded {
        conversation: ConversationId,
        attachment: Attachment,
    },
    SendAcknowledged {
        conversation: ConversationId,
    },
    RosterReceived {
        conversation: ConversationId,
        roster: Vec<String>,
    },
    LastMessageReceived {
        conversation: ConversationId,
        message: Message,
    },
    Scrolled {
        conversation: ConversationId,
        offset: f32,
    },
    Resized {
        conversation: ConversationId,
        viewport_height: f32,
    },
    /// A composing decay timer fired.
    DecayCheckDue {
        conversation: ConversationId,
    },
    /// Deferred draft load scheduled by a focus.
    LoadDraft {
        conversation: ConversationId,
    },
    Shutdown,
}

/// Work a handler defers to the event loop instead of doing inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// Deliver [`ClientEvent::DecayCheckDue`] at `due`.
    DecayCheck {
        conversation: ConversationId,
        due: Instant,
    },
    /// Deliver [`ClientEvent::LoadDraft`] after every event already queued.
    LoadDraft { conversation: ConversationId },
}

impl Deferred {
    /// Event delivered once the deferred work comes due.
    pub fn into_event(self) -> ClientEvent {
        match self {
            Self::DecayCheck { conversation, .. } => ClientEvent::DecayCheckDue { conversation },
            Self::LoadDraft { conversation } => ClientEvent::LoadDraft { conversation },
        }
    }
}
