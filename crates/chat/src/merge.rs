use chrono::{DateTime, Utc};

use crate::message::{Attachment, Jid, Message, MessageId, Receipt, RoomSender, prepare_body};
use crate::page::BubbleKey;

/// Visual side of a bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BubbleVariant {
    /// Authored by the local session.
    Own,
    Peer,
}

/// Content class of a bubble. Sticker and file bubbles never absorb further messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BubbleKind {
    #[default]
    Text,
    Sticker,
    File,
}

/// Outcome of matching an incoming message against the adjacent bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Extend,
    NewBubble(BubbleVariant),
}

/// One message as it is displayed inside a bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub id: Option<MessageId>,
    /// `None` when a sticker replaces the body.
    pub text: Option<String>,
    pub quote: bool,
    pub code: bool,
    pub quoted: bool,
    pub attachment: Option<Attachment>,
    pub edited: bool,
    pub receipt: Option<Receipt>,
    pub published: DateTime<Utc>,
}

impl RenderedMessage {
    /// Builds the displayed form of a message, including `/me` and `/code` handling.
    pub fn from_message(message: &Message) -> Self {
        let room = message.room_sender.is_some();
        let prepared = prepare_body(message.body.as_deref().unwrap_or_default(), room);
        let sticker = message
            .attachment
            .as_ref()
            .is_some_and(Attachment::is_sticker);

        Self {
            id: message.new_id.clone().or_else(|| message.id.clone()),
            text: (!sticker).then_some(prepared.text),
            quote: prepared.quote,
            code: prepared.code,
            quoted: message.quoted,
            attachment: message.attachment.clone(),
            edited: message.edited,
            receipt: message.receipt(),
            published: message.published,
        }
    }
}

/// Contiguous run of messages from one sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub key: BubbleKey,
    pub sender: Jid,
    pub variant: BubbleVariant,
    pub kind: BubbleKind,
    pub rtl: bool,
    pub label: String,
    pub room_sender: Option<RoomSender>,
    pub messages: Vec<RenderedMessage>,
}

impl Bubble {
    /// Opens a bubble whose first message is `message`.
    pub fn start(key: BubbleKey, variant: BubbleVariant, message: &Message) -> Self {
        let label = match &message.room_sender {
            Some(sender) => format!("{} – {}", sender.resource, message.published_label),
            None => message.published_label.clone(),
        };

        let mut bubble = Self {
            key,
            sender: message.from.clone(),
            variant,
            kind: BubbleKind::Text,
            rtl: false,
            label,
            room_sender: message.room_sender.clone(),
            messages: Vec::with_capacity(1),
        };
        bubble.push_back(message);
        bubble
    }

    pub fn push_back(&mut self, message: &Message) {
        self.absorb(message);
        self.messages.push(RenderedMessage::from_message(message));
    }

    pub fn push_front(&mut self, message: &Message) {
        self.absorb(message);
        self.messages.insert(0, RenderedMessage::from_message(message));
    }

    /// Replaces the message stored under `id` in place. Returns false when it is not here.
    pub fn replace(&mut self, id: &MessageId, message: &Message) -> bool {
        let Some(index) = self
            .messages
            .iter()
            .position(|existing| existing.id.as_ref() == Some(id))
        else {
            return false;
        };

        self.absorb(message);
        self.messages[index] = RenderedMessage::from_message(message);
        true
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages
            .iter()
            .any(|message| message.id.as_ref() == Some(id))
    }

    pub fn last_message_id(&self) -> Option<&MessageId> {
        self.messages.last().and_then(|message| message.id.as_ref())
    }

    pub fn carries_attachment(&self) -> bool {
        self.kind != BubbleKind::Text
    }

    fn absorb(&mut self, message: &Message) {
        if message.rtl {
            self.rtl = true;
        }

        match &message.attachment {
            Some(Attachment::Sticker { .. }) => self.kind = BubbleKind::Sticker,
            Some(Attachment::File { .. } | Attachment::Audio { .. }) => self.kind = BubbleKind::File,
            None => {}
        }
    }
}

/// Variant a new bubble for `message` gets.
pub fn variant_for(message: &Message) -> BubbleVariant {
    if message.is_self() {
        BubbleVariant::Own
    } else {
        BubbleVariant::Peer
    }
}

/// Decides whether `message` extends `candidate`, the adjacent rendered bubble.
///
/// `candidate` must be the bubble at the insertion edge (last row when appending, first row
/// when prepending); pass `None` when that edge is a date row or the panel is empty.
pub fn decide(key: &BubbleKey, message: &Message, candidate: Option<&Bubble>) -> MergeDecision {
    let extends = candidate.is_some_and(|bubble| {
        bubble.key == *key
            && message.attachment.is_none()
            && !bubble.carries_attachment()
            && bubble.sender == message.from
    });

    if extends {
        MergeDecision::Extend
    } else {
        MergeDecision::NewBubble(variant_for(message))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn peer_message(id: &str, body: &str) -> Message {
        let me = Jid::new("me@example.org");
        let peer = Jid::new("peer@example.org");
        Message::new(
            id,
            me.clone(),
            peer,
            me,
            body,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        )
    }

    fn sticker() -> Attachment {
        Attachment::Sticker {
            url: "https://example.org/cat.png".to_string(),
            width: Some(120),
            height: None,
        }
    }

    #[test]
    fn same_key_text_messages_extend() {
        let key = BubbleKey::new("peer@example.org|0900");
        let bubble = Bubble::start(key.clone(), BubbleVariant::Peer, &peer_message("1", "a"));

        assert_eq!(
            decide(&key, &peer_message("2", "b"), Some(&bubble)),
            MergeDecision::Extend
        );
    }

    #[test]
    fn missing_candidate_or_other_key_starts_a_bubble() {
        let key = BubbleKey::new("peer@example.org|0900");
        let other = BubbleKey::new("peer@example.org|0915");
        let bubble = Bubble::start(other, BubbleVariant::Peer, &peer_message("1", "a"));

        assert_eq!(
            decide(&key, &peer_message("2", "b"), None),
            MergeDecision::NewBubble(BubbleVariant::Peer)
        );
        assert_eq!(
            decide(&key, &peer_message("2", "b"), Some(&bubble)),
            MergeDecision::NewBubble(BubbleVariant::Peer)
        );
    }

    #[test]
    fn attachments_split_bubbles_both_ways() {
        let key = BubbleKey::new("peer@example.org|0900");
        let text_bubble = Bubble::start(key.clone(), BubbleVariant::Peer, &peer_message("1", "a"));
        let sticker_message = peer_message("2", "").with_attachment(sticker());

        assert!(matches!(
            decide(&key, &sticker_message, Some(&text_bubble)),
            MergeDecision::NewBubble(_)
        ));

        let sticker_bubble = Bubble::start(key.clone(), BubbleVariant::Peer, &sticker_message);
        assert_eq!(sticker_bubble.kind, BubbleKind::Sticker);
        assert!(matches!(
            decide(&key, &peer_message("3", "c"), Some(&sticker_bubble)),
            MergeDecision::NewBubble(_)
        ));
    }

    #[test]
    fn stickers_replace_the_body_and_corrections_rekey() {
        let rendered = RenderedMessage::from_message(&peer_message("1", "x").with_attachment(sticker()));
        assert_eq!(rendered.text, None);

        let corrected = RenderedMessage::from_message(&peer_message("1", "y").with_new_id("1b"));
        assert_eq!(corrected.id, Some(MessageId::new("1b")));
    }
}
