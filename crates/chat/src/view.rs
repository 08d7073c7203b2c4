use std::collections::HashSet;
use std::iter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::layout::{LayoutConfig, estimate_extent};
use crate::merge::{Bubble, BubbleVariant, MergeDecision, decide};
use crate::message::{ConversationId, Message, MessageId};
use crate::page::{BubbleKey, DayBatch, Direction, KeyedMessage, Page, PageDay};
use crate::scroll::ScrollState;

/// Whether a conversation is one-to-one or a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    #[default]
    Direct,
    Room,
}

impl ConversationKind {
    pub fn is_multi_party(self) -> bool {
        self == Self::Room
    }
}

/// Bubbles displayed under one date label.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSection {
    pub label: String,
    pub bubbles: Vec<Bubble>,
}

impl DateSection {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bubbles: Vec::new(),
        }
    }
}

/// One line of the rendered projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Row<'a> {
    Date(&'a str),
    Bubble(&'a Bubble),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    EmptyPage,
    EmptyFirstDay,
    /// The page belongs to a conversation no panel renders.
    ForeignConversation(ConversationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyStats {
    pub inserted: usize,
    pub merged: usize,
    pub replaced: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Applied(ApplyStats),
    Discarded(DiscardReason),
}

/// In-memory transcript of one conversation. Rendering derives from [`ConversationView::rows`].
#[derive(Debug, Clone)]
pub struct ConversationView {
    conversation_id: ConversationId,
    kind: ConversationKind,
    sections: Vec<DateSection>,
    known_ids: HashSet<MessageId>,
    earliest_loaded: Option<DateTime<Utc>>,
    receipt_marker: Option<MessageId>,
    scroll: ScrollState,
    layout: LayoutConfig,
}

impl ConversationView {
    pub fn new(conversation_id: ConversationId, kind: ConversationKind, config: &ChatConfig) -> Self {
        Self {
            conversation_id,
            kind,
            sections: Vec::new(),
            known_ids: HashSet::new(),
            earliest_loaded: None,
            receipt_marker: None,
            scroll: ScrollState::new(&config.scroll),
            layout: config.layout.clone(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn kind(&self) -> ConversationKind {
        self.kind
    }

    pub fn sections(&self) -> &[DateSection] {
        &self.sections
    }

    /// Pagination cursor: the oldest publication time loaded so far.
    pub fn earliest_loaded(&self) -> Option<DateTime<Utc>> {
        self.earliest_loaded
    }

    /// Last peer message a displayed receipt was requested for.
    pub fn receipt_marker(&self) -> Option<&MessageId> {
        self.receipt_marker.as_ref()
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.known_ids.contains(id)
    }

    pub fn bubble_count(&self) -> usize {
        self.sections.iter().map(|section| section.bubbles.len()).sum()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.sections.iter().flat_map(|section| {
            iter::once(Row::Date(section.label.as_str()))
                .chain(section.bubbles.iter().map(Row::Bubble))
        })
    }

    /// Accepts a page only when its first message targets this conversation.
    pub fn check_page(&self, page: &Page) -> Result<(), DiscardReason> {
        let Some(first_day) = page.days().first() else {
            return Err(DiscardReason::EmptyPage);
        };
        let Some(first_message) = first_day.batch.first_message() else {
            return Err(DiscardReason::EmptyFirstDay);
        };

        let target = first_message.conversation_id();
        if target != self.conversation_id {
            return Err(DiscardReason::ForeignConversation(target));
        }

        Ok(())
    }

    /// Merges a page into the transcript. Rejected pages leave the view untouched.
    pub fn apply_page(&mut self, page: Page, direction: Direction) -> PageOutcome {
        if let Err(reason) = self.check_page(&page) {
            tracing::debug!(
                conversation = %self.conversation_id,
                ?reason,
                "discarding page"
            );
            return PageOutcome::Discarded(reason);
        }

        let was_at_bottom = self.scroll.is_at_bottom();
        let prior_extent = self.scroll.content_height();
        let mut stats = ApplyStats::default();
        let multi_party = self.kind.is_multi_party();

        for PageDay { date, batch } in page.into_days() {
            match (batch, direction) {
                (DayBatch::Direct(messages), _) if multi_party => {
                    stats.skipped += messages.len();
                }
                (DayBatch::Room(messages), _) if !multi_party => {
                    stats.skipped += messages.len();
                }
                (DayBatch::Room(messages), Direction::Prepend) => {
                    tracing::debug!(
                        conversation = %self.conversation_id,
                        count = messages.len(),
                        "room history is append-only, skipping prepended batch"
                    );
                    stats.skipped += messages.len();
                }
                (DayBatch::Room(messages), Direction::Append) => {
                    self.append_room_day(date, messages, &mut stats);
                }
                (DayBatch::Direct(messages), Direction::Append) => {
                    self.append_direct_day(date, messages, &mut stats);
                }
                (DayBatch::Direct(messages), Direction::Prepend) => {
                    self.prepend_direct_day(date, messages, &mut stats);
                }
            }
        }

        self.refresh_extent();
        match direction {
            Direction::Prepend => self.scroll.preserve_after_prepend(prior_extent),
            // Never steal the position from someone reading history.
            Direction::Append if was_at_bottom => self.scroll.scroll_to_bottom(),
            Direction::Append => {}
        }

        tracing::debug!(
            conversation = %self.conversation_id,
            ?direction,
            inserted = stats.inserted,
            merged = stats.merged,
            replaced = stats.replaced,
            skipped = stats.skipped,
            "applied page"
        );
        PageOutcome::Applied(stats)
    }

    /// Moves the displayed-receipt marker to the trailing peer message, if the last row is one.
    pub fn mark_displayed(&mut self) -> Option<MessageId> {
        if self.kind.is_multi_party() {
            return None;
        }

        let id = self.trailing_peer_message()?.clone();
        self.receipt_marker = Some(id.clone());
        Some(id)
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.scroll.scroll_to(offset);
    }

    pub fn resize(&mut self, viewport_height: f32) {
        self.scroll.resize(viewport_height);
    }

    fn trailing_peer_message(&self) -> Option<&MessageId> {
        let bubble = self.sections.last()?.bubbles.last()?;
        if bubble.variant != BubbleVariant::Peer {
            return None;
        }
        bubble.last_message_id()
    }

    fn append_direct_day(&mut self, date: String, messages: Vec<KeyedMessage>, stats: &mut ApplyStats) {
        for KeyedMessage { key, message } in messages {
            if message.body.is_none() {
                stats.skipped += 1;
                continue;
            }

            self.track_published(message.published);
            if self.replace_existing(&message) {
                stats.replaced += 1;
                continue;
            }

            // Only the tail section of the same day can absorb the message.
            let tail = self
                .sections
                .last()
                .filter(|section| section.label == date)
                .and_then(|section| section.bubbles.last());
            match decide(&key, &message, tail) {
                MergeDecision::Extend => {
                    if let Some(bubble) = self
                        .sections
                        .last_mut()
                        .and_then(|section| section.bubbles.last_mut())
                    {
                        bubble.push_back(&message);
                    }
                    stats.merged += 1;
                }
                MergeDecision::NewBubble(variant) => {
                    self.tail_section(&date)
                        .bubbles
                        .push(Bubble::start(key, variant, &message));
                    stats.inserted += 1;
                }
            }
            self.remember(&message);
        }
    }

    fn prepend_direct_day(&mut self, date: String, messages: Vec<KeyedMessage>, stats: &mut ApplyStats) {
        // The head section is opened on first insert and never merges across the seam.
        let mut head_opened = false;

        for KeyedMessage { key, message } in messages {
            if message.body.is_none() {
                stats.skipped += 1;
                continue;
            }

            self.track_published(message.published);
            if self.replace_existing(&message) {
                stats.replaced += 1;
                continue;
            }

            let head = if head_opened {
                self.sections[0].bubbles.first()
            } else {
                None
            };
            match decide(&key, &message, head) {
                MergeDecision::Extend => {
                    if let Some(bubble) = self.sections[0].bubbles.first_mut() {
                        bubble.push_front(&message);
                    }
                    stats.merged += 1;
                }
                MergeDecision::NewBubble(variant) => {
                    if !head_opened {
                        self.sections.insert(0, DateSection::new(date.clone()));
                        head_opened = true;
                    }
                    self.sections[0]
                        .bubbles
                        .insert(0, Bubble::start(key, variant, &message));
                    stats.inserted += 1;
                }
            }
            self.remember(&message);
        }

        // Drop the duplicate date header at the pagination seam.
        if head_opened && self.sections.len() > 1 && self.sections[1].label == date {
            let previous = self.sections.remove(1);
            self.sections[0].bubbles.extend(previous.bubbles);
        }
    }

    fn append_room_day(&mut self, date: String, messages: Vec<Message>, stats: &mut ApplyStats) {
        for message in messages {
            if message.body.is_none() {
                stats.skipped += 1;
                continue;
            }

            if self.replace_existing(&message) {
                stats.replaced += 1;
                continue;
            }

            // Room messages always open their own bubble on the peer side.
            let author = message
                .room_sender
                .as_ref()
                .map_or(message.from.as_str(), |sender| sender.resource.as_str());
            let key = BubbleKey::new(format!("{author}|{}", message.published.timestamp()));
            self.tail_section(&date)
                .bubbles
                .push(Bubble::start(key, BubbleVariant::Peer, &message));
            stats.inserted += 1;
            self.remember(&message);
        }
    }

    /// Tail section labelled `date`, opened when the current tail carries another day.
    fn tail_section(&mut self, date: &str) -> &mut DateSection {
        let reuse = self
            .sections
            .last()
            .is_some_and(|section| section.label == date);
        if !reuse {
            self.sections.push(DateSection::new(date));
        }
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }

    fn replace_existing(&mut self, message: &Message) -> bool {
        let Some(id) = message.id.as_ref() else {
            return false;
        };
        if !self.known_ids.contains(id) {
            return false;
        }

        let Some(bubble) = self
            .sections
            .iter_mut()
            .flat_map(|section| section.bubbles.iter_mut())
            .find(|bubble| bubble.contains(id))
        else {
            return false;
        };
        if !bubble.replace(id, message) {
            return false;
        }

        if let Some(new_id) = &message.new_id {
            self.known_ids.remove(id);
            self.known_ids.insert(new_id.clone());
        }
        true
    }

    fn remember(&mut self, message: &Message) {
        if let Some(id) = message.new_id.as_ref().or(message.id.as_ref()) {
            self.known_ids.insert(id.clone());
        }
    }

    fn track_published(&mut self, published: DateTime<Utc>) {
        self.earliest_loaded = Some(match self.earliest_loaded {
            Some(current) => current.min(published),
            None => published,
        });
    }

    fn refresh_extent(&mut self) {
        let extent = estimate_extent(self.rows(), &self.layout);
        self.scroll.set_content_height(extent);
    }
}
