use crate::config::ScrollConfig;

/// Scroll bookkeeping for one transcript, in top-down offsets (0 is the top).
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollState {
    offset: f32,
    viewport_height: f32,
    content_height: f32,
    follow_threshold: f32,
    pagination_trigger: f32,
}

impl ScrollState {
    pub fn new(config: &ScrollConfig) -> Self {
        Self {
            offset: 0.0,
            viewport_height: config.viewport_height.max(0.0),
            content_height: 0.0,
            follow_threshold: config.follow_threshold,
            pagination_trigger: config.pagination_trigger,
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    pub fn max_offset(&self) -> f32 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    /// True while the viewport shows the tail of the transcript.
    pub fn is_at_bottom(&self) -> bool {
        let max_offset = self.max_offset();
        if max_offset <= 0.0 {
            return true;
        }

        (max_offset - self.offset).abs() <= self.follow_threshold
    }

    /// True when the viewport is close enough to the top to load older history.
    pub fn is_at_top(&self) -> bool {
        self.offset < self.pagination_trigger
    }

    pub fn set_content_height(&mut self, content_height: f32) {
        self.content_height = content_height.max(0.0);
        self.offset = self.clamp(self.offset);
    }

    /// Records a user scroll.
    pub fn scroll_to(&mut self, offset: f32) {
        self.offset = self.clamp(offset);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// Shifts the offset by the height added above the viewport so the reading position holds.
    pub fn preserve_after_prepend(&mut self, prior_content_height: f32) {
        let added = self.content_height - prior_content_height;
        self.offset = self.clamp(self.offset + added);
    }

    /// Keeps the bottom edge of the reading position anchored across a viewport resize.
    pub fn resize(&mut self, viewport_height: f32) {
        let viewport_height = viewport_height.max(0.0);
        let shrink = self.viewport_height - viewport_height;
        self.viewport_height = viewport_height;
        self.offset = self.clamp(self.offset + shrink);
    }

    fn clamp(&self, offset: f32) -> f32 {
        offset.clamp(0.0, self.max_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(viewport_height: f32) -> ScrollState {
        ScrollState::new(&ScrollConfig {
            viewport_height,
            ..ScrollConfig::default()
        })
    }

    #[test]
    fn bottom_detection_uses_the_follow_threshold() {
        let mut scroll = state(100.0);
        assert!(scroll.is_at_bottom());

        scroll.set_content_height(500.0);
        scroll.scroll_to(390.0);
        assert!(scroll.is_at_bottom());

        scroll.scroll_to(300.0);
        assert!(!scroll.is_at_bottom());
    }

    #[test]
    fn prepend_shifts_by_added_height() {
        let mut scroll = state(100.0);
        scroll.set_content_height(500.0);
        scroll.scroll_to(0.0);
        assert!(scroll.is_at_top());

        scroll.set_content_height(740.0);
        scroll.preserve_after_prepend(500.0);

        assert_eq!(scroll.offset(), 240.0);
        assert!(!scroll.is_at_top());
    }

    #[test]
    fn shrinking_viewport_moves_offset_down() {
        let mut scroll = state(300.0);
        scroll.set_content_height(1_000.0);
        scroll.scroll_to(200.0);

        scroll.resize(250.0);
        assert_eq!(scroll.offset(), 250.0);

        scroll.resize(400.0);
        assert_eq!(scroll.offset(), 100.0);
    }

    #[test]
    fn offsets_are_clamped_to_content() {
        let mut scroll = state(100.0);
        scroll.set_content_height(150.0);

        scroll.scroll_to(400.0);
        assert_eq!(scroll.offset(), 50.0);

        scroll.scroll_to(-5.0);
        assert_eq!(scroll.offset(), 0.0);
    }
}
