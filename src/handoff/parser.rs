//! Handoff extraction from free-form worker output.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::HandoffError;
use crate::handoff::record::HandoffRecord;

/// Fenced block tagged `handoff`, JSON body inside.
static HANDOFF_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```handoff\s*\n(.*?)```").expect("handoff block regex is valid")
});

/// Find the handoff block in raw worker output and return its body.
///
/// If several blocks are present the last one wins — workers sometimes echo
/// the template they were given before filling in the real one.
pub fn extract_handoff(raw_output: &str) -> Result<&str, HandoffError> {
    HANDOFF_BLOCK
        .captures_iter(raw_output)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(HandoffError::MissingBlock)
}

/// Extract, parse, and validate a handoff record from raw worker output.
pub fn parse_handoff(raw_output: &str) -> Result<HandoffRecord, HandoffError> {
    let body = extract_handoff(raw_output)?;
    let record: HandoffRecord =
        serde_json::from_str(body.trim()).map_err(|e| HandoffError::Malformed(e.to_string()))?;
    validate(&record)?;
    Ok(record)
}

fn validate(record: &HandoffRecord) -> Result<(), HandoffError> {
    if record.task_id.trim().is_empty() {
        return Err(HandoffError::MissingField("taskId"));
    }
    if record.agent.trim().is_empty() {
        return Err(HandoffError::MissingField("agent"));
    }
    if record.summary.trim().is_empty() {
        return Err(HandoffError::MissingField("summary"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::record::HandoffOutcome;

    fn wrap(body: &str) -> String {
        format!("Some preamble.\n\n```handoff\n{body}\n```\n\nTrailing prose.")
    }

    #[test]
    fn parses_complete_record() {
        let raw = wrap(
            r#"{
                "taskId": "3.2",
                "agent": "backend-developer",
                "status": "completed",
                "summary": "Implemented the retry queue",
                "filesTouched": ["src/queue.rs"],
                "decisions": [
                    {
                        "decision": "Bounded retries at 3",
                        "rationale": "Infinite loops are worse than escalation",
                        "alternatives": ["exponential backoff forever"]
                    }
                ],
                "contextForNext": {
                    "keyPatterns": ["retry queue drains between waves"],
                    "integrationPoints": ["session loop"],
                    "testCoverage": "unit tests for exhaustion"
                }
            }"#,
        );

        let record = parse_handoff(&raw).unwrap();
        assert_eq!(record.task_id, "3.2");
        assert_eq!(record.status, HandoffOutcome::Completed);
        assert_eq!(record.decisions.len(), 1);
        assert!(record.context_for_next.is_some());
    }

    #[test]
    fn missing_block_is_reported() {
        let err = parse_handoff("I did some work but forgot the handoff.").unwrap_err();
        assert!(matches!(err, HandoffError::MissingBlock));
    }

    #[test]
    fn malformed_json_is_reported() {
        let raw = wrap("{not json at all");
        let err = parse_handoff(&raw).unwrap_err();
        assert!(matches!(err, HandoffError::Malformed(_)));
    }

    #[test]
    fn empty_required_field_is_reported() {
        let raw = wrap(
            r#"{"taskId": "1", "agent": "", "status": "failed", "summary": "nope"}"#,
        );
        let err = parse_handoff(&raw).unwrap_err();
        assert!(matches!(err, HandoffError::MissingField("agent")));
    }

    #[test]
    fn unrecognized_status_is_reported() {
        let raw = wrap(
            r#"{"taskId": "1", "agent": "tester", "status": "exploded", "summary": "boom"}"#,
        );
        let err = parse_handoff(&raw).unwrap_err();
        // serde surfaces the bad enum variant as a parse error.
        assert!(matches!(err, HandoffError::Malformed(_)));
    }

    #[test]
    fn last_block_wins() {
        let raw = format!(
            "{}\n\n{}",
            wrap(r#"{"taskId": "template", "agent": "x", "status": "failed", "summary": "template"}"#),
            wrap(r#"{"taskId": "1", "agent": "tester", "status": "completed", "summary": "real"}"#),
        );
        let record = parse_handoff(&raw).unwrap();
        assert_eq!(record.task_id, "1");
        assert_eq!(record.summary, "real");
    }
}
