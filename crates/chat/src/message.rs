use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Every address-like identifier shares one shape, so the wrappers are stamped from one macro.
macro_rules! define_chat_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_chat_id!(
    /// Bare address of a participant or a room.
    Jid
);
define_chat_id!(
    /// Stable identifier for one conversation: the address of the other party or the room.
    ConversationId
);
define_chat_id!(
    /// Stable identifier for one message, assigned by the server.
    MessageId
);

impl From<Jid> for ConversationId {
    fn from(value: Jid) -> Self {
        Self(value.0)
    }
}

/// Non-text payload carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    File {
        name: String,
        uri: String,
        /// Human readable size as prepared by the server.
        size: String,
    },
    Audio {
        uri: String,
        mime_type: String,
    },
    Sticker {
        url: String,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
}

impl Attachment {
    pub fn is_sticker(&self) -> bool {
        matches!(self, Self::Sticker { .. })
    }
}

/// Delivery progress of a message as reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Delivered(DateTime<Utc>),
    Displayed(DateTime<Utc>),
}

/// Receipt surfaced next to a self-authored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    Delivered(DateTime<Utc>),
    Displayed(DateTime<Utc>),
}

/// Room occupant details carried by multi-party messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSender {
    /// Nickname inside the room.
    pub resource: String,
    pub color: String,
    pub icon: String,
}

/// One chat message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "MessagePayload")]
pub struct Message {
    pub id: Option<MessageId>,
    /// Replacement identifier sent along with a correction.
    pub new_id: Option<MessageId>,
    /// Local session identity the message was fetched for.
    pub session: Jid,
    pub from: Jid,
    pub to: Jid,
    /// `None` for bodiless stanzas.
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    pub published: DateTime<Utc>,
    pub published_label: String,
    pub delivery: DeliveryStatus,
    pub edited: bool,
    pub rtl: bool,
    pub quoted: bool,
    pub room_sender: Option<RoomSender>,
}

impl Message {
    /// Creates a plain text message with default metadata.
    pub fn new(
        id: impl Into<String>,
        session: Jid,
        from: Jid,
        to: Jid,
        body: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(MessageId::new(id)),
            new_id: None,
            session,
            from,
            to,
            body: Some(body.into()),
            attachment: None,
            published,
            published_label: published.format("%H:%M").to_string(),
            delivery: DeliveryStatus::Sent,
            edited: false,
            rtl: false,
            quoted: false,
            room_sender: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryStatus) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_new_id(mut self, new_id: impl Into<String>) -> Self {
        self.new_id = Some(MessageId::new(new_id));
        self
    }

    pub fn with_room_sender(mut self, sender: RoomSender) -> Self {
        self.room_sender = Some(sender);
        self
    }

    pub fn edited(mut self) -> Self {
        self.edited = true;
        self
    }

    /// True when the local session authored the message.
    pub fn is_self(&self) -> bool {
        self.session == self.from
    }

    /// Conversation the message belongs to: whichever side is not the local session.
    pub fn conversation_id(&self) -> ConversationId {
        if self.is_self() {
            ConversationId::from(self.to.clone())
        } else {
            ConversationId::from(self.from.clone())
        }
    }

    /// Receipt to surface, only ever for self-authored messages.
    pub fn receipt(&self) -> Option<Receipt> {
        if !self.is_self() {
            return None;
        }

        match self.delivery {
            DeliveryStatus::Sent => None,
            DeliveryStatus::Delivered(at) => Some(Receipt::Delivered(at)),
            DeliveryStatus::Displayed(at) => Some(Receipt::Displayed(at)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    id: Option<MessageId>,
    #[serde(default)]
    new_id: Option<MessageId>,
    session: Jid,
    from: Jid,
    to: Jid,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    attachment: Option<Attachment>,
    published: DateTime<Utc>,
    #[serde(default)]
    published_label: String,
    #[serde(default)]
    delivered: Option<DateTime<Utc>>,
    #[serde(default)]
    displayed: Option<DateTime<Utc>>,
    #[serde(default)]
    edited: bool,
    #[serde(default)]
    rtl: bool,
    #[serde(default)]
    quoted: bool,
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

impl From<MessagePayload> for Message {
    fn from(payload: MessagePayload) -> Self {
        // Displayed supersedes delivered when the server reports both.
        let delivery = match (payload.displayed, payload.delivered) {
            (Some(at), _) => DeliveryStatus::Displayed(at),
            (None, Some(at)) => DeliveryStatus::Delivered(at),
            (None, None) => DeliveryStatus::Sent,
        };

        let room_sender = payload.resource.map(|resource| RoomSender {
            resource,
            color: payload.color.unwrap_or_default(),
            icon: payload.icon.unwrap_or_default(),
        });

        Self {
            id: payload.id,
            new_id: payload.new_id,
            session: payload.session,
            from: payload.from,
            to: payload.to,
            body: payload.body,
            attachment: payload.attachment,
            published: payload.published,
            published_label: payload.published_label,
            delivery,
            edited: payload.edited,
            rtl: payload.rtl,
            quoted: payload.quoted,
            room_sender,
        }
    }
}

const QUOTE_MARKER: &str = "/me";
const CODE_MARKER: &str = "/code";

/// Message body after slash-command markers have been interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreparedBody {
    pub text: String,
    pub quote: bool,
    pub code: bool,
}

/// Strips `/me` and `/code` markers from a body.
///
/// Direct messages only treat `/me` as a marker when whitespace follows it; room messages
/// accept it bare. The marker and the character after it are removed in both cases. A code
/// body is also trimmed.
pub fn prepare_body(body: &str, room: bool) -> PreparedBody {
    let mut prepared = PreparedBody {
        text: body.to_string(),
        ..PreparedBody::default()
    };

    if let Some(rest) = strip_marker(&prepared.text, QUOTE_MARKER, !room) {
        prepared.text = rest.to_string();
        prepared.quote = true;
    }

    if let Some(rest) = strip_marker(&prepared.text, CODE_MARKER, false) {
        prepared.text = rest.trim().to_string();
        prepared.code = true;
    }

    prepared
}

fn strip_marker<'a>(body: &'a str, marker: &str, require_space: bool) -> Option<&'a str> {
    let rest = body.strip_prefix(marker)?;
    let mut characters = rest.chars();

    match characters.next() {
        Some(separator) if require_space && !separator.is_whitespace() => None,
        Some(_) => Some(characters.as_str()),
        None if require_space => None,
        None => Some(""),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn conversation_id_is_the_non_self_side() {
        let me = Jid::new("me@example.org");
        let peer = Jid::new("peer@example.org");

        let outgoing = Message::new("1", me.clone(), me.clone(), peer.clone(), "hi", at(9));
        let incoming = Message::new("2", me.clone(), peer.clone(), me.clone(), "yo", at(9));

        assert!(outgoing.is_self());
        assert!(!incoming.is_self());
        assert_eq!(outgoing.conversation_id(), ConversationId::new("peer@example.org"));
        assert_eq!(incoming.conversation_id(), ConversationId::new("peer@example.org"));
    }

    #[test]
    fn displayed_takes_precedence_over_delivered() {
        let raw = r#"{
            "id": "m1",
            "session": "me@example.org",
            "from": "me@example.org",
            "to": "peer@example.org",
            "body": "hello",
            "published": "2024-03-01T09:00:00Z",
            "delivered": "2024-03-01T09:00:05Z",
            "displayed": "2024-03-01T09:01:00Z"
        }"#;

        let message: Message = serde_json::from_str(raw).unwrap();

        assert!(matches!(message.delivery, DeliveryStatus::Displayed(_)));
        assert!(matches!(message.receipt(), Some(Receipt::Displayed(_))));
    }

    #[test]
    fn peer_messages_surface_no_receipt() {
        let me = Jid::new("me@example.org");
        let peer = Jid::new("peer@example.org");
        let message = Message::new("1", me.clone(), peer, me, "hi", at(9))
            .with_delivery(DeliveryStatus::Delivered(at(10)));

        assert_eq!(message.receipt(), None);
    }

    #[test]
    fn quote_marker_requires_whitespace_in_direct_messages() {
        let quoted = prepare_body("/me waves", false);
        assert_eq!(quoted.text, "waves");
        assert!(quoted.quote);

        let unquoted = prepare_body("/meh", false);
        assert_eq!(unquoted.text, "/meh");
        assert!(!unquoted.quote);

        let room = prepare_body("/meh", true);
        assert_eq!(room.text, "");
        assert!(room.quote);
    }

    #[test]
    fn code_marker_is_stripped_and_trimmed() {
        let prepared = prepare_body("/code   fn main() {}  ", false);

        assert!(prepared.code);
        assert!(!prepared.quote);
        assert_eq!(prepared.text, "fn main() {}");
    }
}
