//! Termination conditions

use gatekeeper_core::{message::ChatMessage, termination::TERMINATION_MARKER};

/// Stops the dialogue when a message mentions a marker string.
///
/// When `sources` is set only messages from those participants count, so a
/// user typing the marker cannot end the dialogue on their own.
#[derive(Debug, Clone)]
pub struct TextMentionTermination {
    marker: String,
    sources: Option<Vec<String>>,
}

impl TextMentionTermination {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            sources: None,
        }
    }

    /// Only consider messages from these participants
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Stop reason if `message` satisfies the condition
    pub fn check(&self, message: &ChatMessage) -> Option<String> {
        if let Some(sources) = &self.sources
            && !sources.iter().any(|s| s == &message.source)
        {
            return None;
        }

        message
            .to_text()
            .contains(&self.marker)
            .then(|| format!("Text '{}' mentioned", self.marker))
    }
}

impl Default for TextMentionTermination {
    fn default() -> Self {
        Self::new(TERMINATION_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_stops_with_reason() {
        let condition = TextMentionTermination::default();
        let reason = condition.check(&ChatMessage::text("bot", "yes\nTERMINATE"));
        assert_eq!(reason.as_deref(), Some("Text 'TERMINATE' mentioned"));
    }

    #[test]
    fn test_no_mention_continues() {
        let condition = TextMentionTermination::default();
        assert!(condition.check(&ChatMessage::text("bot", "no")).is_none());
        assert!(condition.check(&ChatMessage::text("bot", "terminate")).is_none());
    }

    #[test]
    fn test_sources_filter() {
        let condition = TextMentionTermination::default().with_sources(["unhelpful_assistant"]);
        assert!(
            condition
                .check(&ChatMessage::text("Candidate", "TERMINATE"))
                .is_none()
        );
        assert!(
            condition
                .check(&ChatMessage::text("unhelpful_assistant", "TERMINATE"))
                .is_some()
        );
    }
}
