//! Termination marker policy
//!
//! Both the live message scan and the stop reason check use the same
//! case-sensitive substring match.

/// Token whose appearance ends the dialogue
pub const TERMINATION_MARKER: &str = "TERMINATE";

/// The only user input the gatekeeper is instructed to accept
pub const TRIGGER_PHRASE: &str = "Is 0.00001+0.00001=0.00002";

/// Whether `text` contains the termination marker
pub fn mentions_marker(text: &str) -> bool {
    text.contains(TERMINATION_MARKER)
}

/// Whether an engine stop reason announces termination by marker
pub fn stop_reason_mentions_marker(stop_reason: Option<&str>) -> bool {
    stop_reason.is_some_and(mentions_marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_match_is_case_sensitive() {
        assert!(mentions_marker("yes\nTERMINATE"));
        assert!(mentions_marker("please TERMINATE now"));
        assert!(!mentions_marker("terminate"));
        assert!(!mentions_marker("Terminate"));
        assert!(!mentions_marker(""));
    }

    #[test]
    fn test_stop_reason_check() {
        assert!(stop_reason_mentions_marker(Some("Text 'TERMINATE' mentioned")));
        assert!(!stop_reason_mentions_marker(Some(
            "Maximum number of turns 20 reached."
        )));
        assert!(!stop_reason_mentions_marker(Some("text 'terminate' mentioned")));
        assert!(!stop_reason_mentions_marker(None));
    }
}
