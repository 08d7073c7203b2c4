use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Typing activity reported to the peer of a direct conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ChatState {
    #[default]
    Idle = 0,
    Composing = 1,
    Paused = 2,
}

/// Chat-state notification the transport must emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatStateSignal {
    Composing,
    Paused,
}

/// Input to [`ComposingMachine::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposingTransition {
    /// Key released with a non-empty field.
    Keystroke(Instant),
    /// A deferred inactivity check fired.
    DecayCheck(Instant),
    Submit,
    Cleared,
}

/// Composing/paused tracker for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposingMachine {
    state: ChatState,
    since: Option<Instant>,
    pause_after: Duration,
}

impl ComposingMachine {
    pub fn new(pause_after: Duration) -> Self {
        Self {
            state: ChatState::Idle,
            since: None,
            pause_after,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn pause_after(&self) -> Duration {
        self.pause_after
    }

    /// Applies one transition and returns the signal to emit, if any.
    ///
    /// Decay checks are self-invalidating: a check fired before `pause_after` has elapsed
    /// since the latest keystroke is a no-op, so stale timers need no cancellation.
    pub fn apply(&mut self, transition: ComposingTransition) -> Option<ChatStateSignal> {
        match transition {
            ComposingTransition::Keystroke(now) => {
                self.since = Some(now);
                match self.state {
                    ChatState::Composing => None,
                    ChatState::Idle | ChatState::Paused => {
                        self.state = ChatState::Composing;
                        Some(ChatStateSignal::Composing)
                    }
                }
            }
            ComposingTransition::DecayCheck(now) => {
                let elapsed = self
                    .since
                    .map(|since| now.saturating_duration_since(since));
                match (self.state, elapsed) {
                    (ChatState::Composing, Some(elapsed)) if elapsed >= self.pause_after => {
                        self.state = ChatState::Paused;
                        Some(ChatStateSignal::Paused)
                    }
                    _ => {
                        tracing::trace!(state = ?self.state, ?elapsed, "decay check is stale");
                        None
                    }
                }
            }
            ComposingTransition::Submit | ComposingTransition::Cleared => {
                self.state = ChatState::Idle;
                self.since = None;
                None
            }
        }
    }
}
