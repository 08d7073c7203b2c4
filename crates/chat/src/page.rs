use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::message::{ConversationId, Message};

/// Where a page lands in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Live messages and the initial load, added at the tail.
    Append,
    /// Older history, added at the head. Pages in this direction list days and messages
    /// newest first.
    Prepend,
}

/// Grouping key shared by every message of one bubble: sender and time of its first message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BubbleKey(pub String);

impl BubbleKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Extracts the grouping key from a composite page key: everything after the first `<`.
    pub fn from_composite(raw: &str) -> Self {
        match raw.split_once('<') {
            Some((_, grouping)) => Self::new(grouping),
            None => Self::new(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One direct message with the bubble key the server grouped it under.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedMessage {
    pub key: BubbleKey,
    pub message: Message,
}

impl KeyedMessage {
    pub fn new(key: BubbleKey, message: Message) -> Self {
        Self { key, message }
    }
}

/// Messages of one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub enum DayBatch {
    Room(Vec<Message>),
    Direct(Vec<KeyedMessage>),
}

impl DayBatch {
    pub fn first_message(&self) -> Option<&Message> {
        match self {
            Self::Room(messages) => messages.first(),
            Self::Direct(messages) => messages.first().map(|keyed| &keyed.message),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Room(messages) => messages.len(),
            Self::Direct(messages) => messages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageDay {
    pub date: String,
    pub batch: DayBatch,
}

impl PageDay {
    pub fn new(date: impl Into<String>, batch: DayBatch) -> Self {
        Self {
            date: date.into(),
            batch,
        }
    }
}

/// Ordered batch of days delivered by one history or live fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    days: Vec<PageDay>,
}

impl Page {
    pub fn new(days: Vec<PageDay>) -> Self {
        Self { days }
    }

    pub fn days(&self) -> &[PageDay] {
        &self.days
    }

    pub fn into_days(self) -> Vec<PageDay> {
        self.days
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// First message of the first day. Later days are never consulted.
    pub fn first_message(&self) -> Option<&Message> {
        self.days.first()?.batch.first_message()
    }

    /// Conversation the page targets, derived from its first message.
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.first_message().map(Message::conversation_id)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PageVisitor;

        impl<'de> Visitor<'de> for PageVisitor {
            type Value = Page;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map from date label to a day batch")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Page, A::Error>
            where
                A: MapAccess<'de>,
            {
                // Map entries are visited in document order, which is the display order.
                let mut days = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((date, batch)) = map.next_entry::<String, DayBatch>()? {
                    days.push(PageDay { date, batch });
                }
                Ok(Page { days })
            }

            fn visit_unit<E>(self) -> Result<Page, E> {
                Ok(Page::default())
            }
        }

        deserializer.deserialize_any(PageVisitor)
    }
}

impl<'de> Deserialize<'de> for DayBatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DayBatchVisitor;

        impl<'de> Visitor<'de> for DayBatchVisitor {
            type Value = DayBatch;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an array of room messages or a map of keyed direct messages")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<DayBatch, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut messages = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(message) = seq.next_element::<Message>()? {
                    messages.push(message);
                }
                Ok(DayBatch::Room(messages))
            }

            fn visit_map<A>(self, mut map: A) -> Result<DayBatch, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut messages = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, message)) = map.next_entry::<String, Message>()? {
                    messages.push(KeyedMessage::new(BubbleKey::from_composite(&key), message));
                }
                Ok(DayBatch::Direct(messages))
            }

            fn visit_unit<E>(self) -> Result<DayBatch, E> {
                Ok(DayBatch::Room(Vec::new()))
            }
        }

        deserializer.deserialize_any(DayBatchVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECT_PAGE: &str = r#"{
        "2024-03-02": {
            "b2<peer@example.org|0930": {
                "id": "b2",
                "session": "me@example.org",
                "from": "peer@example.org",
                "to": "me@example.org",
                "body": "second",
                "published": "2024-03-02T09:30:00Z"
            }
        },
        "2024-03-01": {
            "a1<peer@example.org|0900": {
                "id": "a1",
                "session": "me@example.org",
                "from": "peer@example.org",
                "to": "me@example.org",
                "body": "first",
                "published": "2024-03-01T09:00:00Z"
            }
        }
    }"#;

    #[test]
    fn day_order_follows_the_document() {
        let page = Page::from_json(DIRECT_PAGE).unwrap();
        let dates = page
            .days()
            .iter()
            .map(|day| day.date.as_str())
            .collect::<Vec<_>>();

        assert_eq!(dates, vec!["2024-03-02", "2024-03-01"]);
        assert_eq!(
            page.conversation_id(),
            Some(ConversationId::new("peer@example.org"))
        );
    }

    #[test]
    fn composite_keys_keep_only_the_grouping_part() {
        let page = Page::from_json(DIRECT_PAGE).unwrap();
        let DayBatch::Direct(messages) = &page.days()[0].batch else {
            panic!("expected a direct batch");
        };

        assert_eq!(messages[0].key, BubbleKey::new("peer@example.org|0930"));
        assert_eq!(BubbleKey::from_composite("plain"), BubbleKey::new("plain"));
    }

    #[test]
    fn arrays_are_room_batches_and_null_days_are_empty() {
        let raw = r#"{
            "2024-03-01": [{
                "session": "me@example.org",
                "from": "room@conference.example.org",
                "to": "me@example.org",
                "body": "hello room",
                "published": "2024-03-01T10:00:00Z",
                "resource": "alice"
            }],
            "2024-03-02": null
        }"#;

        let page = Page::from_json(raw).unwrap();

        assert!(matches!(page.days()[0].batch, DayBatch::Room(ref messages) if messages.len() == 1));
        assert!(page.days()[1].batch.is_empty());
        assert_eq!(
            page.first_message()
                .and_then(|message| message.room_sender.as_ref())
                .map(|sender| sender.resource.as_str()),
            Some("alice")
        );
    }
}
