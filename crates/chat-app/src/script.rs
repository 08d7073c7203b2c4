use std::path::{Path, PathBuf};
use std::time::Duration;

use murmur_chat::{
    Attachment, ClientEvent, ConversationId, ConversationKind, Direction, InputAction, Message,
    Page,
};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};

/// A scripted session: transport responses and user input, replayed in order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Open {
        conversation: ConversationId,
        #[serde(default)]
        kind: ConversationKind,
    },
    Close {
        conversation: ConversationId,
    },
    Focus {
        conversation: ConversationId,
    },
    Page {
        #[serde(default = "default_direction")]
        direction: Direction,
        page: Page,
    },
    Input {
        conversation: ConversationId,
        action: InputAction,
    },
    Attachment {
        conversation: ConversationId,
        attachment: Attachment,
    },
    Ack {
        conversation: ConversationId,
    },
    Roster {
        conversation: ConversationId,
        roster: Vec<String>,
    },
    LastMessage {
        conversation: ConversationId,
        message: Message,
    },
    Scroll {
        conversation: ConversationId,
        offset: f32,
    },
    Resize {
        conversation: ConversationId,
        viewport_height: f32,
    },
    /// Lets wall-clock time pass so deferred checks can fire.
    Wait {
        ms: u64,
    },
}

impl Step {
    /// Event the step feeds to the client, or the pause it asks for.
    pub fn into_action(self) -> StepAction {
        let event = match self {
            Self::Wait { ms } => return StepAction::Wait(Duration::from_millis(ms)),
            Self::Open { conversation, kind } => ClientEvent::Open { conversation, kind },
            Self::Close { conversation } => ClientEvent::Close { conversation },
            Self::Focus { conversation } => ClientEvent::Focus { conversation },
            Self::Page { direction, page } => ClientEvent::PageReceived { page, direction },
            Self::Input {
                conversation,
                action,
            } => ClientEvent::Input {
                conversation,
                action,
            },
            Self::Attachment {
                conversation,
                attachment,
            } => ClientEvent::AttachmentUploaded {
                conversation,
                attachment,
            },
            Self::Ack { conversation } => ClientEvent::SendAcknowledged { conversation },
            Self::Roster {
                conversation,
                roster,
            } => ClientEvent::RosterReceived {
                conversation,
                roster,
            },
            Self::LastMessage {
                conversation,
                message,
            } => ClientEvent::LastMessageReceived {
                conversation,
                message,
            },
            Self::Scroll {
                conversation,
                offset,
            } => ClientEvent::Scrolled {
                conversation,
                offset,
            },
            Self::Resize {
                conversation,
                viewport_height,
            } => ClientEvent::Resized {
                conversation,
                viewport_height,
            },
        };
        StepAction::Send(event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Send(ClientEvent),
    Wait(Duration),
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RunnerError {
    #[snafu(display("failed to read script at {path:?}: {source}"))]
    ReadScript {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse script at {path:?}: {source}"))]
    ParseScript {
        stage: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("draft storage failed: {source}"))]
    Storage {
        stage: &'static str,
        source: murmur_storage::StorageError,
    },
    #[snafu(display("settings failed: {source}"))]
    Settings {
        stage: &'static str,
        source: crate::settings::SettingsError,
    },
    #[snafu(display("chat runtime task failed: {source}"))]
    RuntimeJoin {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
}

pub type RunnerResult<T> = Result<T, RunnerError>;

impl Script {
    pub fn from_path(path: &Path) -> RunnerResult<Self> {
        let raw = std::fs::read_to_string(path).context(ReadScriptSnafu {
            stage: "read-script",
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&raw).context(ParseScriptSnafu {
            stage: "parse-script",
            path: path.to_path_buf(),
        })
    }
}

fn default_direction() -> Direction {
    Direction::Append
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_parse_into_client_events() {
        let script: Script = serde_json::from_str(
            r#"{
                "steps": [
                    { "open": { "conversation": "room@conference.example.org", "kind": "room" } },
                    { "input": {
                        "conversation": "room@conference.example.org",
                        "action": { "action": "edit", "value": "hi" }
                    } },
                    { "input": {
                        "conversation": "room@conference.example.org",
                        "action": { "action": "submit" }
                    } },
                    { "page": { "page": null } },
                    { "wait": { "ms": 250 } }
                ]
            }"#,
        )
        .unwrap();

        let actions = script
            .steps
            .into_iter()
            .map(Step::into_action)
            .collect::<Vec<_>>();

        assert_eq!(
            actions[0],
            StepAction::Send(ClientEvent::Open {
                conversation: ConversationId::new("room@conference.example.org"),
                kind: ConversationKind::Room,
            })
        );
        assert!(matches!(
            &actions[1],
            StepAction::Send(ClientEvent::Input { action: InputAction::Edit(text), .. }) if text == "hi"
        ));
        assert!(matches!(
            &actions[2],
            StepAction::Send(ClientEvent::Input {
                action: InputAction::Submit,
                ..
            })
        ));
        assert!(matches!(
            &actions[3],
            StepAction::Send(ClientEvent::PageReceived { page, direction: Direction::Append }) if page.is_empty()
        ));
        assert_eq!(actions[4], StepAction::Wait(Duration::from_millis(250)));
    }

    #[test]
    fn unreadable_scripts_report_the_path() {
        let directory = tempfile::tempdir().unwrap();
        let missing = directory.path().join("missing.json");

        let error = Script::from_path(&missing).unwrap_err();
        assert!(matches!(error, RunnerError::ReadScript { .. }));
        assert!(error.to_string().contains("missing.json"));
    }
}
