use serde::{Deserialize, Serialize};

use crate::merge::{Bubble, RenderedMessage};
use crate::message::Attachment;
use crate::view::Row;

/// Metrics used to estimate rendered heights without a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub content_width: f32,
    pub bubble_max_width: f32,
    pub bubble_padding_x: f32,
    pub bubble_padding_y: f32,
    pub line_height: f32,
    pub char_width: f32,
    /// Height of the time/receipt line under each message.
    pub info_line_height: f32,
    pub message_gap: f32,
    pub row_gap: f32,
    pub date_row_height: f32,
    /// Height of a file or audio card.
    pub attachment_height: f32,
    /// Used for stickers that do not declare a height.
    pub sticker_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            content_width: 680.0,
            bubble_max_width: 540.0,
            bubble_padding_x: 14.0,
            bubble_padding_y: 10.0,
            line_height: 18.0,
            char_width: 7.0,
            info_line_height: 16.0,
            message_gap: 8.0,
            row_gap: 16.0,
            date_row_height: 32.0,
            attachment_height: 48.0,
            sticker_height: 170.0,
        }
    }
}

/// Total content height of a row sequence, gaps included.
pub fn estimate_extent<'a>(rows: impl IntoIterator<Item = Row<'a>>, config: &LayoutConfig) -> f32 {
    let mut total = 0.0;
    let mut row_count = 0usize;

    for row in rows {
        total += estimate_row_height(row, config);
        row_count += 1;
    }

    total + config.row_gap * row_count.saturating_sub(1) as f32
}

pub fn estimate_row_height(row: Row<'_>, config: &LayoutConfig) -> f32 {
    match row {
        Row::Date(_) => config.date_row_height,
        Row::Bubble(bubble) => estimate_bubble_height(bubble, config),
    }
}

pub fn estimate_bubble_height(bubble: &Bubble, config: &LayoutConfig) -> f32 {
    let bubble_width = config.content_width.min(config.bubble_max_width);
    let text_width = (bubble_width - config.bubble_padding_x * 2.0).max(1.0);

    let content_height = bubble
        .messages
        .iter()
        .map(|message| estimate_message_height(message, text_width, config))
        .sum::<f32>();
    let gaps = config.message_gap * bubble.messages.len().saturating_sub(1) as f32;

    config.bubble_padding_y * 2.0 + content_height + gaps
}

fn estimate_message_height(message: &RenderedMessage, text_width: f32, config: &LayoutConfig) -> f32 {
    let mut height = config.info_line_height;

    if let Some(text) = &message.text {
        // Attachment-only messages carry an empty body that renders nothing.
        if !text.is_empty() || message.attachment.is_none() {
            height += estimate_text_height(text, text_width, config);
        }
    }

    match &message.attachment {
        Some(Attachment::Sticker {
            height: sticker_height,
            ..
        }) => height += sticker_height.map_or(config.sticker_height, |value| value as f32),
        Some(Attachment::File { .. } | Attachment::Audio { .. }) => {
            height += config.attachment_height
        }
        None => {}
    }

    height
}

pub fn estimate_text_height(content: &str, width: f32, config: &LayoutConfig) -> f32 {
    if content.is_empty() {
        return config.line_height;
    }

    let chars_per_line = (width / config.char_width).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    // Account for the trailing empty line when content ends with a newline.
    if content.ends_with('\n') {
        line_count += 1;
    }

    config.line_height * line_count.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_wraps_by_estimated_character_width() {
        let config = LayoutConfig::default();
        // 70 px at 7 px per character fits ten characters per line.
        assert_eq!(estimate_text_height("0123456789", 70.0, &config), 18.0);
        assert_eq!(estimate_text_height("0123456789a", 70.0, &config), 36.0);
        assert_eq!(estimate_text_height("one\ntwo\n", 70.0, &config), 54.0);
        assert_eq!(estimate_text_height("", 70.0, &config), 18.0);
    }

    #[test]
    fn extent_counts_gaps_between_rows_only() {
        let config = LayoutConfig::default();
        let rows = vec![Row::Date("2024-03-01"), Row::Date("2024-03-02")];

        assert_eq!(
            estimate_extent(rows, &config),
            config.date_row_height * 2.0 + config.row_gap
        );
        assert_eq!(estimate_extent(Vec::new(), &config), 0.0);
    }
}
