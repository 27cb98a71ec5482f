use chrono::{DateTime, TimeDelta, Utc};

use crate::remote::JobMessage;

const QUESTION_TAGS: &[&str] = &["needs_input", "needs-input"];
const AGENT_ROLES: &[&str] = &["assistant", "agent"];

/// Whether a message is the agent waiting for input.
///
/// Either it is tagged as a question (`question`, `needs_input`), or it is
/// written by the agent and contains a question mark. A heuristic, not a parser.
pub fn is_question(message: &JobMessage) -> bool {
    let tagged = message.tags.iter().any(|tag| {
        let tag = tag.to_lowercase();
        tag.contains("question") || QUESTION_TAGS.contains(&tag.as_str())
    });
    if tagged {
        return true;
    }
    let role = message.role.to_lowercase();
    AGENT_ROLES.contains(&role.as_str()) && message.content.contains('?')
}

/// First question in batch order.
pub fn first_question(messages: &[JobMessage]) -> Option<&JobMessage> {
    messages.iter().find(|m| is_question(m))
}

/// True once `threshold` has elapsed since `last_activity`. Never true without activity.
pub fn stuck_due(last_activity: Option<DateTime<Utc>>, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
    last_activity.is_some_and(|last| now - last >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn msg(role: &str, content: &str, tags: &[&str]) -> JobMessage {
        JobMessage {
            role: role.into(),
            content: content.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            extra: Map::new(),
        }
    }

    #[test]
    fn tagged_messages_are_questions_regardless_of_role() {
        assert!(is_question(&msg("user", "fyi", &["question"])));
        assert!(is_question(&msg("system", "", &["Needs_Input"])));
        assert!(is_question(&msg("assistant", "", &["open-question"])));
        assert!(is_question(&msg("assistant", "", &["needs-input"])));
    }

    #[test]
    fn agent_text_with_question_mark() {
        assert!(is_question(&msg("assistant", "Should I use main?", &[])));
        assert!(is_question(&msg("Agent", "Which one?", &[])));
    }

    #[test]
    fn operator_questions_and_plain_agent_text_are_not() {
        assert!(!is_question(&msg("user", "Is it done?", &[])));
        assert!(!is_question(&msg("assistant", "Running the tests now.", &["progress"])));
    }

    #[test]
    fn first_question_keeps_batch_order() {
        let batch = vec![
            msg("assistant", "Cloning.", &[]),
            msg("assistant", "First?", &[]),
            msg("assistant", "Second?", &[]),
        ];
        assert_eq!(first_question(&batch).unwrap().content, "First?");
        assert!(first_question(&batch[..1]).is_none());
    }

    #[test]
    fn stuck_threshold_is_inclusive() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        let threshold = TimeDelta::minutes(20);
        assert!(!stuck_due(Some(t0), threshold, t0 + TimeDelta::minutes(19)));
        assert!(stuck_due(Some(t0), threshold, t0 + TimeDelta::minutes(20)));
        assert!(!stuck_due(None, threshold, t0 + TimeDelta::days(3)));
    }
}
