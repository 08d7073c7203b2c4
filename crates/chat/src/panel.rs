use std::sync::Arc;

use murmur_storage::DraftStore;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::autocomplete::{AutocompleteCursor, CompletionOutcome, MENTION_SEPARATOR};
use crate::composing::{ChatState, ChatStateSignal, ComposingMachine, ComposingTransition};
use crate::config::ChatConfig;
use crate::events::Deferred;
use crate::message::{Attachment, ConversationId, Message};
use crate::page::{Direction, Page};
use crate::transport::{ChatTransport, OutboundMessage};
use crate::view::{ConversationKind, ConversationView, PageOutcome};

/// Keyboard and pointer input on the conversation's text field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum InputAction {
    /// Enter without a modifier.
    Submit,
    /// Shift+Enter.
    InsertNewline,
    /// Tab.
    Complete,
    /// Up arrow on an empty field.
    RecallLast,
    /// Down arrow on an empty field or while editing.
    CancelEdit,
    /// The field now holds this text.
    Edit(String),
    /// Click on a room participant's avatar.
    Mention(String),
}

/// Action offered by the button next to the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimaryAction {
    Send,
    Attach,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    pub text: String,
    /// The field holds a correction of the last sent message.
    pub editing: bool,
}

impl InputField {
    pub fn primary_action(&self) -> PrimaryAction {
        if self.text.is_empty() {
            PrimaryAction::Attach
        } else {
            PrimaryAction::Send
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Corrected,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A previous send has not been acknowledged yet.
    InFlight,
    EmptyBody,
}

/// Everything one open conversation owns.
pub struct ChatPanel {
    view: ConversationView,
    composing: ComposingMachine,
    autocomplete: AutocompleteCursor,
    input: InputField,
    sending: bool,
    history_pending: bool,
    transport: Arc<dyn ChatTransport>,
    drafts: Arc<dyn DraftStore>,
}

impl ChatPanel {
    pub fn new(
        conversation: ConversationId,
        kind: ConversationKind,
        config: &ChatConfig,
        transport: Arc<dyn ChatTransport>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            view: ConversationView::new(conversation, kind, config),
            composing: ComposingMachine::new(config.composing.pause_after()),
            autocomplete: AutocompleteCursor::new(),
            input: InputField::default(),
            sending: false,
            history_pending: false,
            transport,
            drafts,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.view.conversation_id()
    }

    pub fn kind(&self) -> ConversationKind {
        self.view.kind()
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn input(&self) -> &InputField {
        &self.input
    }

    pub fn chat_state(&self) -> ChatState {
        self.composing.state()
    }

    pub fn autocomplete(&self) -> &AutocompleteCursor {
        &self.autocomplete
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn history_pending(&self) -> bool {
        self.history_pending
    }

    /// Requests the most recent page for a freshly opened panel.
    pub fn request_initial_page(&self) {
        self.transport.fetch_initial_page(self.conversation_id());
    }

    /// Re-arms sending and defers the draft load until queued events have run.
    pub fn focus(&mut self) -> Deferred {
        self.sending = false;
        Deferred::LoadDraft {
            conversation: self.conversation_id().clone(),
        }
    }

    pub fn load_draft(&mut self) {
        match self.drafts.load_draft(self.conversation_id().as_str()) {
            Ok(draft) => self.input.text = draft.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(
                    conversation = %self.conversation_id(),
                    error = %error,
                    "failed to load draft"
                );
            }
        }
    }

    pub fn input_action(&mut self, action: InputAction, now: Instant) -> Option<Deferred> {
        match action {
            InputAction::Submit => {
                let outcome = self.submit();
                tracing::debug!(conversation = %self.conversation_id(), ?outcome, "submit");
                None
            }
            // Shift+Enter edits the field without counting as a keystroke.
            InputAction::InsertNewline => {
                self.input.text.push('\n');
                self.persist_draft();
                None
            }
            InputAction::Edit(text) => self.edit(text, now),
            InputAction::Complete => {
                self.request_completion();
                None
            }
            InputAction::RecallLast => {
                self.recall_last();
                None
            }
            InputAction::CancelEdit => {
                self.cancel_edit();
                None
            }
            InputAction::Mention(nickname) => {
                self.mention(&nickname);
                None
            }
        }
    }

    /// Sends the field content, or a correction while editing.
    pub fn submit(&mut self) -> SendOutcome {
        self.composing.apply(ComposingTransition::Submit);
        self.autocomplete.reset();

        if self.sending {
            return SendOutcome::Dropped(DropReason::InFlight);
        }
        if self.input.text.trim().is_empty() {
            return SendOutcome::Dropped(DropReason::EmptyBody);
        }

        self.sending = true;
        let conversation = self.conversation_id().clone();
        if self.input.editing {
            self.input.editing = false;
            self.transport
                .send_correction(&conversation, &self.input.text);
            SendOutcome::Corrected
        } else {
            self.transport.send_message(OutboundMessage {
                conversation,
                body: self.input.text.clone(),
                multi_party: self.kind().is_multi_party(),
                attachment: None,
            });
            SendOutcome::Sent
        }
    }

    /// Sends an uploaded attachment with an empty body, under the same guard as text.
    pub fn send_attachment(&mut self, attachment: Attachment) -> SendOutcome {
        if self.sending {
            return SendOutcome::Dropped(DropReason::InFlight);
        }

        self.sending = true;
        self.transport.send_message(OutboundMessage {
            conversation: self.conversation_id().clone(),
            body: String::new(),
            multi_party: self.kind().is_multi_party(),
            attachment: Some(attachment),
        });
        SendOutcome::Sent
    }

    /// The transport confirmed the outstanding send.
    pub fn acknowledge_send(&mut self) {
        self.sending = false;
        self.clear_field();
        if let Err(error) = self.drafts.clear_draft(self.conversation_id().as_str()) {
            tracing::warn!(
                conversation = %self.conversation_id(),
                error = %error,
                "failed to clear draft"
            );
        }
    }

    /// Replaces the field text, persisting it and driving the composing machine.
    pub fn edit(&mut self, text: String, now: Instant) -> Option<Deferred> {
        self.input.text = text;
        self.persist_draft();

        if self.input.text.is_empty() {
            self.field_cleared();
            return None;
        }

        if self.kind().is_multi_party() {
            return None;
        }

        if let Some(signal) = self.composing.apply(ComposingTransition::Keystroke(now)) {
            self.emit(signal);
        }
        Some(Deferred::DecayCheck {
            conversation: self.conversation_id().clone(),
            due: now + self.composing.pause_after(),
        })
    }

    pub fn decay_check(&mut self, now: Instant) {
        if self.kind().is_multi_party() {
            return;
        }
        if let Some(signal) = self.composing.apply(ComposingTransition::DecayCheck(now)) {
            self.emit(signal);
        }
    }

    pub fn request_completion(&self) {
        if !self.kind().is_multi_party() {
            return;
        }
        self.transport.fetch_roster(self.conversation_id());
    }

    pub fn roster_received(&mut self, roster: &[String]) -> CompletionOutcome {
        let outcome = self.autocomplete.advance(roster, &mut self.input.text);
        self.persist_draft();
        outcome
    }

    pub fn recall_last(&self) {
        if !self.input.text.is_empty() {
            return;
        }
        self.transport.fetch_last_message(self.conversation_id());
    }

    /// Loads the recalled message into the field as a correction.
    pub fn last_message_received(&mut self, message: &Message) {
        let Some(body) = message.body.as_ref() else {
            return;
        };
        self.input.text = body.clone();
        self.input.editing = true;
    }

    pub fn cancel_edit(&mut self) {
        if !self.input.text.is_empty() && !self.input.editing {
            return;
        }
        self.clear_field();
        self.persist_draft();
    }

    pub fn mention(&mut self, nickname: &str) {
        self.input.text = format!("{nickname}{MENTION_SEPARATOR}{}", self.input.text);
        self.persist_draft();
    }

    /// Merges a page and signals a displayed receipt for a trailing peer message.
    pub fn apply_page(&mut self, page: Page, direction: Direction) -> PageOutcome {
        let outcome = self.view.apply_page(page, direction);
        if !matches!(outcome, PageOutcome::Applied(_)) {
            return outcome;
        }

        if direction == Direction::Prepend {
            self.history_pending = false;
        }
        if let Some(message) = self.view.mark_displayed() {
            self.transport
                .send_displayed(self.conversation_id(), &message);
        }
        outcome
    }

    /// Records a user scroll and asks for older history when the top is reached.
    pub fn scrolled(&mut self, offset: f32) {
        self.view.scroll_to(offset);

        if !self.view.scroll().is_at_top() {
            self.history_pending = false;
            return;
        }
        if self.kind().is_multi_party() || self.history_pending {
            return;
        }

        self.history_pending = true;
        self.transport
            .fetch_history_page(self.conversation_id(), self.view.earliest_loaded());
    }

    pub fn resized(&mut self, viewport_height: f32) {
        self.view.resize(viewport_height);
    }

    fn clear_field(&mut self) {
        self.input = InputField::default();
        self.field_cleared();
    }

    /// An empty field drops any completion cycle and returns the chat state to idle.
    fn field_cleared(&mut self) {
        self.autocomplete.reset();
        self.composing.apply(ComposingTransition::Cleared);
    }

    fn emit(&self, signal: ChatStateSignal) {
        match signal {
            ChatStateSignal::Composing => self.transport.send_composing(self.conversation_id()),
            ChatStateSignal::Paused => self.transport.send_paused(self.conversation_id()),
        }
    }

    fn persist_draft(&self) {
        if let Err(error) = self
            .drafts
            .save_draft(self.conversation_id().as_str(), &self.input.text)
        {
            tracing::warn!(
                conversation = %self.conversation_id(),
                error = %error,
                "failed to save draft"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use murmur_storage::MemoryDraftStore;

    use super::*;
    use crate::message::{Jid, MessageId};
    use crate::page::{BubbleKey, DayBatch, KeyedMessage, PageDay};
    use crate::transport::{RecordingTransport, TransportCall};

    const PEER: &str = "peer@example.org";
    const ROOM: &str = "room@conference.example.org";

    struct Fixture {
        panel: ChatPanel,
        transport: Arc<RecordingTransport>,
        drafts: Arc<MemoryDraftStore>,
    }

    fn fixture(conversation: &str, kind: ConversationKind) -> Fixture {
        let transport = Arc::new(RecordingTransport::new());
        let drafts = Arc::new(MemoryDraftStore::new());
        let panel = ChatPanel::new(
            ConversationId::new(conversation),
            kind,
            &ChatConfig::default(),
            transport.clone(),
            drafts.clone(),
        );
        Fixture {
            panel,
            transport,
            drafts,
        }
    }

    fn sends(transport: &RecordingTransport) -> usize {
        transport
            .calls()
            .iter()
            .filter(|call| matches!(call, TransportCall::SendMessage(_)))
            .count()
    }

    #[test]
    fn second_submit_before_ack_is_dropped() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);
        let now = Instant::now();

        panel.edit("hello".to_string(), now);
        assert_eq!(panel.submit(), SendOutcome::Sent);
        assert_eq!(panel.submit(), SendOutcome::Dropped(DropReason::InFlight));
        assert_eq!(sends(&transport), 1);

        panel.acknowledge_send();
        assert!(panel.input().text.is_empty());
        panel.edit("again".to_string(), now);
        assert_eq!(panel.submit(), SendOutcome::Sent);
        assert_eq!(sends(&transport), 2);
    }

    #[test]
    fn blank_fields_are_not_sent() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);

        panel.edit("   ".to_string(), Instant::now());
        assert_eq!(panel.submit(), SendOutcome::Dropped(DropReason::EmptyBody));
        assert!(!panel.is_sending());
        assert_eq!(sends(&transport), 0);
        assert_eq!(panel.input().primary_action(), PrimaryAction::Send);
    }

    #[test]
    fn focus_rearms_a_stuck_send() {
        let Fixture { mut panel, .. } = fixture(PEER, ConversationKind::Direct);
        panel.edit("hello".to_string(), Instant::now());
        panel.submit();
        assert!(panel.is_sending());

        let deferred = panel.focus();
        assert!(!panel.is_sending());
        assert_eq!(
            deferred,
            Deferred::LoadDraft {
                conversation: ConversationId::new(PEER)
            }
        );
    }

    #[test]
    fn edits_persist_drafts_and_ack_clears_them() {
        let Fixture {
            mut panel, drafts, ..
        } = fixture(PEER, ConversationKind::Direct);

        panel.edit("unfinished".to_string(), Instant::now());
        assert_eq!(
            drafts.load_draft(PEER).unwrap().as_deref(),
            Some("unfinished")
        );

        panel.submit();
        panel.acknowledge_send();
        assert_eq!(drafts.load_draft(PEER).unwrap(), None);
    }

    #[test]
    fn keystrokes_signal_composing_and_schedule_decay() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);
        let now = Instant::now();

        let deferred = panel.edit("h".to_string(), now);
        panel.edit("hi".to_string(), now + Duration::from_millis(100));

        assert_eq!(
            deferred,
            Some(Deferred::DecayCheck {
                conversation: ConversationId::new(PEER),
                due: now + Duration::from_millis(5_000),
            })
        );
        assert_eq!(
            transport.calls(),
            vec![TransportCall::SendComposing {
                conversation: ConversationId::new(PEER)
            }]
        );
        assert_eq!(panel.chat_state(), ChatState::Composing);

        panel.edit(String::new(), now + Duration::from_millis(200));
        assert_eq!(panel.chat_state(), ChatState::Idle);
    }

    #[test]
    fn rooms_never_signal_composing_or_paginate() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(ROOM, ConversationKind::Room);

        assert_eq!(panel.edit("hi all".to_string(), Instant::now()), None);
        panel.scrolled(0.0);

        assert!(transport.calls().is_empty());
    }

    #[test]
    fn tab_completion_runs_through_the_roster() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(ROOM, ConversationKind::Room);

        panel.input_action(InputAction::Complete, Instant::now());
        assert_eq!(
            transport.drain(),
            vec![TransportCall::FetchRoster {
                conversation: ConversationId::new(ROOM)
            }]
        );

        let roster = ["alice", "bob"].map(String::from).to_vec();
        panel.roster_received(&roster);
        assert_eq!(panel.input().text, "alice, ");

        panel.submit();
        assert_eq!(panel.autocomplete(), &AutocompleteCursor::default());
    }

    #[test]
    fn direct_panels_ignore_tab() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);

        panel.input_action(InputAction::Complete, Instant::now());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn recalled_message_is_sent_as_a_correction() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);
        let me = Jid::new("me@example.org");
        let last = Message::new(
            "m9",
            me.clone(),
            me,
            Jid::new(PEER),
            "teh answer",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        );

        panel.input_action(InputAction::RecallLast, Instant::now());
        panel.last_message_received(&last);
        assert!(panel.input().editing);

        panel.edit("the answer".to_string(), Instant::now());
        assert_eq!(panel.submit(), SendOutcome::Corrected);
        assert!(!panel.input().editing);
        assert!(transport.calls().contains(&TransportCall::SendCorrection {
            conversation: ConversationId::new(PEER),
            body: "the answer".to_string(),
        }));
    }

    #[test]
    fn cancel_edit_only_clears_empty_or_editing_fields() {
        let Fixture { mut panel, .. } = fixture(PEER, ConversationKind::Direct);

        panel.edit("keep me".to_string(), Instant::now());
        panel.cancel_edit();
        assert_eq!(panel.input().text, "keep me");

        panel.last_message_received(&Message::new(
            "m1",
            Jid::new("me@example.org"),
            Jid::new("me@example.org"),
            Jid::new(PEER),
            "old",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        panel.cancel_edit();
        assert_eq!(panel.input(), &InputField::default());
    }

    #[test]
    fn cancelling_a_correction_returns_to_idle() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);
        let now = Instant::now();
        let me = Jid::new("me@example.org");

        panel.input_action(InputAction::RecallLast, now);
        panel.last_message_received(&Message::new(
            "m1",
            me.clone(),
            me,
            Jid::new(PEER),
            "old",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        panel.edit("old!".to_string(), now);
        assert_eq!(panel.chat_state(), ChatState::Composing);
        transport.drain();

        panel.input_action(InputAction::CancelEdit, now);
        assert_eq!(panel.input(), &InputField::default());
        assert_eq!(panel.chat_state(), ChatState::Idle);

        panel.decay_check(now + Duration::from_millis(5_000));
        assert!(transport.calls().is_empty());
        assert_eq!(panel.chat_state(), ChatState::Idle);
    }

    #[test]
    fn acknowledged_sends_leave_the_machine_idle() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(ROOM, ConversationKind::Room);
        let now = Instant::now();

        panel.edit("al".to_string(), now);
        panel.submit();
        panel.roster_received(&["alice".to_string()]);
        assert_eq!(panel.input().text, "alice, ");
        panel.acknowledge_send();

        assert!(panel.input().text.is_empty());
        assert_eq!(panel.chat_state(), ChatState::Idle);
        assert_eq!(panel.autocomplete(), &AutocompleteCursor::default());
        assert_eq!(panel.input().primary_action(), PrimaryAction::Attach);
        assert_eq!(sends(&transport), 1);
    }

    #[test]
    fn newlines_are_not_keystrokes() {
        let Fixture {
            mut panel,
            transport,
            drafts,
        } = fixture(PEER, ConversationKind::Direct);

        let deferred = panel.input_action(InputAction::InsertNewline, Instant::now());

        assert_eq!(deferred, None);
        assert_eq!(panel.input().text, "\n");
        assert_eq!(panel.chat_state(), ChatState::Idle);
        assert!(transport.calls().is_empty());
        assert_eq!(drafts.load_draft(PEER).unwrap().as_deref(), Some("\n"));
    }

    #[test]
    fn mentions_prefix_the_field() {
        let Fixture { mut panel, .. } = fixture(ROOM, ConversationKind::Room);
        panel.edit("see above".to_string(), Instant::now());

        panel.mention("carol");
        assert_eq!(panel.input().text, "carol, see above");
    }

    #[test]
    fn top_of_transcript_requests_one_history_page() {
        let Fixture {
            mut panel,
            transport,
            ..
        } = fixture(PEER, ConversationKind::Direct);
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let message = Message::new(
            "p1",
            Jid::new("me@example.org"),
            Jid::new(PEER),
            Jid::new("me@example.org"),
            "hello",
            published,
        );
        panel.apply_page(
            Page::new(vec![PageDay::new(
                "2024-03-01",
                DayBatch::Direct(vec![KeyedMessage::new(BubbleKey::new("k"), message)]),
            )]),
            Direction::Append,
        );
        assert_eq!(
            transport.drain(),
            vec![TransportCall::SendDisplayed {
                conversation: ConversationId::new(PEER),
                message: MessageId::new("p1"),
            }]
        );

        panel.scrolled(0.0);
        panel.scrolled(0.0);
        assert!(panel.history_pending());
        assert_eq!(
            transport.drain(),
            vec![TransportCall::FetchHistoryPage {
                conversation: ConversationId::new(PEER),
                before: Some(published),
            }]
        );
    }
}
