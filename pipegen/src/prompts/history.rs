//! Conversation history rendering for the generation prompt

use tracing::debug;

use crate::config::GenerationConfig;
use crate::domain::{ConversationTurn, Role};

const TRUNCATION_MARKER: &str = "... [truncated]";

/// How much prior conversation goes into a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Most recent turns kept
    pub limit: usize,
    /// Assistant turns longer than this many characters are cut
    pub truncate_chars: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            limit: 10,
            truncate_chars: 500,
        }
    }
}

impl HistoryWindow {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            limit: config.history_limit,
            truncate_chars: config.history_truncate_chars,
        }
    }
}

/// Render the last turns of a conversation, or `None` when there are none
///
/// User turns are kept verbatim; assistant turns are usually whole
/// artifacts and get truncated.
pub fn format_history(turns: &[ConversationTurn], window: HistoryWindow) -> Option<String> {
    debug!(turns = turns.len(), ?window, "format_history: called");
    if turns.is_empty() || window.limit == 0 {
        debug!("format_history: nothing to render");
        return None;
    }

    // The window counts every turn; non-conversation entries are then dropped
    let start = turns.len().saturating_sub(window.limit);
    let lines: Vec<String> = turns[start..]
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User => Some(format!("[User]: {}", turn.content)),
            Role::Assistant => Some(format!("[Assistant]: {}", truncate(&turn.content, window.truncate_chars))),
            Role::Other => None,
        })
        .collect();
    if lines.is_empty() {
        debug!("format_history: no user or assistant turns in window");
        return None;
    }
    Some(lines.join("\n"))
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        assert_eq!(format_history(&[], HistoryWindow::default()), None);
    }

    #[test]
    fn test_roles_and_truncation() {
        let long = "x".repeat(600);
        let turns = vec![ConversationTurn::user("load sales"), ConversationTurn::assistant(long)];
        let rendered = format_history(&turns, HistoryWindow::default()).unwrap();

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "[User]: load sales");
        assert_eq!(lines[1], format!("[Assistant]: {}... [truncated]", "x".repeat(500)));
    }

    #[test]
    fn test_user_turns_not_truncated() {
        let long = "y".repeat(600);
        let rendered = format_history(&[ConversationTurn::user(long.clone())], HistoryWindow::default()).unwrap();
        assert_eq!(rendered, format!("[User]: {}", long));
    }

    #[test]
    fn test_only_recent_turns_kept() {
        let turns: Vec<ConversationTurn> = (0..15).map(|i| ConversationTurn::user(format!("turn {}", i))).collect();
        let rendered = format_history(&turns, HistoryWindow::default()).unwrap();

        assert_eq!(rendered.lines().count(), 10);
        assert!(rendered.starts_with("[User]: turn 5"));
        assert!(rendered.ends_with("[User]: turn 14"));
    }

    #[test]
    fn test_other_turns_are_dropped() {
        let error = ConversationTurn {
            role: Role::Other,
            content: "Generation failed".to_string(),
        };
        let turns = vec![ConversationTurn::user("load sales"), error.clone()];
        assert_eq!(format_history(&turns, HistoryWindow::default()).unwrap(), "[User]: load sales");
        assert_eq!(format_history(&[error], HistoryWindow::default()), None);
    }

    #[test]
    fn test_truncation_counts_characters() {
        let turns = vec![ConversationTurn::assistant("ééééé")];
        let window = HistoryWindow {
            limit: 10,
            truncate_chars: 3,
        };
        assert_eq!(format_history(&turns, window).unwrap(), "[Assistant]: ééé... [truncated]");
    }
}
