use std::collections::HashMap;
use std::sync::Arc;

use murmur_storage::DraftStore;
use tokio::time::Instant;

use crate::config::ChatConfig;
use crate::events::{ClientEvent, Deferred};
use crate::message::ConversationId;
use crate::page::{Direction, Page};
use crate::panel::ChatPanel;
use crate::transport::ChatTransport;
use crate::view::{ConversationKind, DiscardReason, PageOutcome};

/// Registry of open conversation panels and the entry point for every client event.
pub struct ChatClient {
    config: ChatConfig,
    transport: Arc<dyn ChatTransport>,
    drafts: Arc<dyn DraftStore>,
    panels: HashMap<ConversationId, ChatPanel>,
    focused: Option<ConversationId>,
}

impl ChatClient {
    pub fn new(
        config: ChatConfig,
        transport: Arc<dyn ChatTransport>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            config,
            transport,
            drafts,
            panels: HashMap::new(),
            focused: None,
        }
    }

    pub fn panel(&self, conversation: &ConversationId) -> Option<&ChatPanel> {
        self.panels.get(conversation)
    }

    pub fn panels(&self) -> impl Iterator<Item = &ChatPanel> {
        self.panels.values()
    }

    pub fn focused(&self) -> Option<&ConversationId> {
        self.focused.as_ref()
    }

    /// Opens a panel (requesting its initial page) and focuses it.
    ///
    /// Re-opening an existing conversation only focuses it.
    pub fn open(&mut self, conversation: ConversationId, kind: ConversationKind) -> Vec<Deferred> {
        if !self.panels.contains_key(&conversation) {
            let panel = ChatPanel::new(
                conversation.clone(),
                kind,
                &self.config,
                Arc::clone(&self.transport),
                Arc::clone(&self.drafts),
            );
            panel.request_initial_page();
            tracing::info!(conversation = %conversation, ?kind, "opened conversation");
            self.panels.insert(conversation.clone(), panel);
        }

        self.focus(&conversation).into_iter().collect()
    }

    /// Drops the panel and all of its transcript state. Drafts survive.
    pub fn close(&mut self, conversation: &ConversationId) -> bool {
        if self.focused.as_ref() == Some(conversation) {
            self.focused = None;
        }

        let closed = self.panels.remove(conversation).is_some();
        if closed {
            tracing::info!(conversation = %conversation, "closed conversation");
        }
        closed
    }

    pub fn focus(&mut self, conversation: &ConversationId) -> Option<Deferred> {
        let panel = self.panels.get_mut(conversation)?;
        self.focused = Some(conversation.clone());
        Some(panel.focus())
    }

    /// Routes a page to the panel of the conversation its first message belongs to.
    pub fn apply_page(&mut self, page: Page, direction: Direction) -> PageOutcome {
        let Some(target) = page.conversation_id() else {
            let reason = if page.is_empty() {
                DiscardReason::EmptyPage
            } else {
                DiscardReason::EmptyFirstDay
            };
            tracing::debug!(?reason, "discarding page");
            return PageOutcome::Discarded(reason);
        };

        match self.panels.get_mut(&target) {
            Some(panel) => panel.apply_page(page, direction),
            None => {
                tracing::debug!(conversation = %target, "discarding page for a closed conversation");
                PageOutcome::Discarded(DiscardReason::ForeignConversation(target))
            }
        }
    }

    /// Runs one event to completion and returns the work it deferred.
    pub fn handle(&mut self, event: ClientEvent, now: Instant) -> Vec<Deferred> {
        match event {
            ClientEvent::Open { conversation, kind } => self.open(conversation, kind),
            ClientEvent::Close { conversation } => {
                self.close(&conversation);
                Vec::new()
            }
            ClientEvent::Focus { conversation } => self.focus(&conversation).into_iter().collect(),
            ClientEvent::PageReceived { page, direction } => {
                self.apply_page(page, direction);
                Vec::new()
            }
            ClientEvent::Input {
                conversation,
                action,
            } => self
                .panel_for(&conversation, "input")
                .and_then(|panel| panel.input_action(action, now))
                .into_iter()
                .collect(),
            ClientEvent::AttachmentUploaded {
                conversation,
                attachment,
            } => {
                if let Some(panel) = self.panel_for(&conversation, "attachment") {
                    let outcome = panel.send_attachment(attachment);
                    tracing::debug!(conversation = %conversation, ?outcome, "attachment send");
                }
                Vec::new()
            }
            ClientEvent::SendAcknowledged { conversation } => {
                if let Some(panel) = self.panel_for(&conversation, "send-ack") {
                    panel.acknowledge_send();
                }
                Vec::new()
            }
            ClientEvent::RosterReceived {
                conversation,
                roster,
            } => {
                if let Some(panel) = self.panel_for(&conversation, "roster") {
                    let outcome = panel.roster_received(&roster);
                    tracing::debug!(conversation = %conversation, ?outcome, "autocomplete");
                }
                Vec::new()
            }
            ClientEvent::LastMessageReceived {
                conversation,
                message,
            } => {
                if let Some(panel) = self.panel_for(&conversation, "last-message") {
                    panel.last_message_received(&message);
                }
                Vec::new()
            }
            ClientEvent::Scrolled {
                conversation,
                offset,
            } => {
                if let Some(panel) = self.panel_for(&conversation, "scroll") {
                    panel.scrolled(offset);
                }
                Vec::new()
            }
            ClientEvent::Resized {
                conversation,
                viewport_height,
            } => {
                if let Some(panel) = self.panel_for(&conversation, "resize") {
                    panel.resized(viewport_height);
                }
                Vec::new()
            }
            ClientEvent::DecayCheckDue { conversation } => {
                if let Some(panel) = self.panel_for(&conversation, "decay-check") {
                    panel.decay_check(now);
                }
                Vec::new()
            }
            ClientEvent::LoadDraft { conversation } => {
                if let Some(panel) = self.panel_for(&conversation, "load-draft") {
                    panel.load_draft();
                }
                Vec::new()
            }
            ClientEvent::Shutdown => Vec::new(),
        }
    }

    fn panel_for(&mut self, conversation: &ConversationId, stage: &'static str) -> Option<&mut ChatPanel> {
        let panel = self.panels.get_mut(conversation);
        if panel.is_none() {
            tracing::debug!(conversation = %conversation, stage, "no open panel for event");
        }
        panel
    }
}
