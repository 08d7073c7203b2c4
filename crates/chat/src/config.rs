use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutConfig;

pub const DEFAULT_PAUSE_AFTER_MS: u64 = 5_000;
pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 600.0;
/// Near-bottom distance that still counts as following the tail.
pub const DEFAULT_FOLLOW_THRESHOLD: f32 = 24.0;
/// Distance from the top that requests older history.
pub const DEFAULT_PAGINATION_TRIGGER: f32 = 1.0;

/// Tunables shared by every conversation panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChatConfig {
    pub composing: ComposingConfig,
    pub scroll: ScrollConfig,
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposingConfig {
    /// Inactivity after the last keystroke before a paused signal goes out.
    pub pause_after_ms: u64,
}

impl Default for ComposingConfig {
    fn default() -> Self {
        Self {
            pause_after_ms: DEFAULT_PAUSE_AFTER_MS,
        }
    }
}

impl ComposingConfig {
    pub fn pause_after(&self) -> Duration {
        Duration::from_millis(self.pause_after_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub viewport_height: f32,
    pub follow_threshold: f32,
    pub pagination_trigger: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            follow_threshold: DEFAULT_FOLLOW_THRESHOLD,
            pagination_trigger: DEFAULT_PAGINATION_TRIGGER,
        }
    }
}
