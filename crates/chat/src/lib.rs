#![deny(unsafe_code)]

pub mod autocomplete;
pub mod client;
pub mod composing;
pub mod config;
pub mod events;
pub mod layout;
pub mod merge;
pub mod message;
pub mod page;
pub mod panel;
pub mod runtime;
pub mod scroll;
pub mod transport;
pub mod view;

pub use autocomplete::{AutocompleteCursor, CompletionOutcome};
pub use client::ChatClient;
pub use composing::{ChatState, ChatStateSignal, ComposingMachine, ComposingTransition};
pub use config::{ChatConfig, ComposingConfig, ScrollConfig};
pub use events::{ClientEvent, Deferred};
pub use layout::LayoutConfig;
pub use merge::{Bubble, BubbleKind, BubbleVariant, MergeDecision, RenderedMessage};
pub use message::{Attachment, ConversationId, DeliveryStatus, Jid, Message, MessageId, Receipt};
pub use page::{BubbleKey, DayBatch, Direction, KeyedMessage, Page, PageDay};
pub use panel::{ChatPanel, DropReason, InputAction, InputField, PrimaryAction, SendOutcome};
pub use runtime::{ClientHandle, ClientRuntime};
pub use scroll::ScrollState;
pub use transport::{ChatTransport, OutboundMessage, RecordingTransport, TransportCall};
pub use view::{ConversationKind, ConversationView, DateSection, DiscardReason, PageOutcome, Row};
