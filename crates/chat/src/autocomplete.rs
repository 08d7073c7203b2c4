/// Separator appended after every completed mention.
pub const MENTION_SEPARATOR: &str = ", ";

/// Result of one Tab press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed { candidate: String, index: usize },
    /// No further candidate; the field was cleared and the cursor reset.
    Exhausted,
}

/// Cyclic mention completion over a roster, one per input field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutocompleteCursor {
    target: Option<String>,
    last_completed: Option<String>,
    last_completed_index: Option<usize>,
}

impl AutocompleteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower-cased prefix being completed, unset until the first Tab press.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn last_completed(&self) -> Option<&str> {
        self.last_completed.as_deref()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Completes the field to the next matching roster entry.
    ///
    /// Completed text always ends with [`MENTION_SEPARATOR`], so a following Tab keeps the
    /// current target and moves on to the next candidate.
    pub fn advance(&mut self, roster: &[String], field: &mut String) -> CompletionOutcome {
        if field.is_empty() && self.last_completed.is_some() {
            self.last_completed = None;
            self.last_completed_index = None;
        }

        let lowered = field.to_lowercase();
        let retarget = match &self.target {
            None => true,
            Some(target) => *target != lowered && !lowered.contains(','),
        };
        if retarget {
            self.target = Some(lowered);
        }
        let target = self.target.as_deref().unwrap_or_default();

        match self.next_candidate(roster, target) {
            Some(index) => {
                let candidate = roster[index].clone();
                field.clear();
                field.push_str(&candidate);
                field.push_str(MENTION_SEPARATOR);

                self.last_completed = Some(candidate.clone());
                self.last_completed_index = Some(index);
                CompletionOutcome::Completed { candidate, index }
            }
            None => {
                field.clear();
                self.reset();
                CompletionOutcome::Exhausted
            }
        }
    }

    fn next_candidate(&self, roster: &[String], target: &str) -> Option<usize> {
        let start = self.last_completed_index.map_or(0, |index| index + 1);

        if target.is_empty() {
            return (start < roster.len()).then_some(start);
        }

        roster
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, name)| {
                name.to_lowercase().starts_with(target)
                    && self.last_completed.as_deref() != Some(name.as_str())
            })
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<String> {
        ["alice", "bob", "carol"].map(String::from).to_vec()
    }

    #[test]
    fn empty_target_cycles_through_the_roster_then_gives_up() {
        let roster = roster();
        let mut cursor = AutocompleteCursor::new();
        let mut field = String::new();

        let mut seen = Vec::new();
        for _ in 0..3 {
            cursor.advance(&roster, &mut field);
            seen.push(field.clone());
        }
        assert_eq!(seen, vec!["alice, ", "bob, ", "carol, "]);

        assert_eq!(cursor.advance(&roster, &mut field), CompletionOutcome::Exhausted);
        assert!(field.is_empty());
        assert_eq!(cursor, AutocompleteCursor::default());
    }

    #[test]
    fn prefix_target_matches_case_insensitively() {
        let roster = roster();
        let mut cursor = AutocompleteCursor::new();
        let mut field = String::from("CA");

        assert_eq!(
            cursor.advance(&roster, &mut field),
            CompletionOutcome::Completed {
                candidate: "carol".to_string(),
                index: 2
            }
        );
        assert_eq!(field, "carol, ");
        assert_eq!(cursor.target(), Some("ca"));

        assert_eq!(cursor.advance(&roster, &mut field), CompletionOutcome::Exhausted);
        assert!(field.is_empty());
    }

    #[test]
    fn prefix_scan_skips_the_previous_candidate() {
        let roster = ["bea", "bob", "carol", "bert"].map(String::from).to_vec();
        let mut cursor = AutocompleteCursor::new();
        let mut field = String::from("b");

        cursor.advance(&roster, &mut field);
        assert_eq!(field, "bea, ");
        cursor.advance(&roster, &mut field);
        assert_eq!(field, "bob, ");
        cursor.advance(&roster, &mut field);
        assert_eq!(field, "bert, ");
        assert_eq!(cursor.last_completed(), Some("bert"));
    }

    #[test]
    fn empty_roster_exhausts_immediately() {
        let mut cursor = AutocompleteCursor::new();
        let mut field = String::from("al");

        assert_eq!(cursor.advance(&[], &mut field), CompletionOutcome::Exhausted);
        assert!(field.is_empty());
        assert_eq!(cursor.target(), None);
    }

    #[test]
    fn clearing_the_field_restarts_from_the_top() {
        let roster = roster();
        let mut cursor = AutocompleteCursor::new();
        let mut field = String::new();

        cursor.advance(&roster, &mut field);
        cursor.advance(&roster, &mut field);
        assert_eq!(field, "bob, ");

        field.clear();
        cursor.advance(&roster, &mut field);
        assert_eq!(field, "alice, ");
    }
}
