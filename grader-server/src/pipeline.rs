//! Submission grading pipeline
//!
//! content type check → parse → look up activity → grade → record.
//! Recording never blocks or fails the response: the feedback is returned
//! whatever the record queue does with the record.

use axum::http::StatusCode;
use chrono::Utc;
use grader_core::{ActivityStore, GraderError, Submission, SubmissionFeedback, SubmissionRecord};
use thiserror::Error;

use crate::subsystems::recorder::RecordQueue;

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Per-request client errors. Neither affects other in-flight requests.
#[derive(Error, Debug, PartialEq)]
pub enum SubmissionError {
    #[error("Unsupported media type: expected Content-Type: application/json")]
    UnsupportedMediaType,

    #[error("Invalid activity identifier '{0}'")]
    UnknownActivity(String),
}

impl SubmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmissionError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            SubmissionError::UnknownActivity(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// True if the header names the JSON media type, ignoring parameters and case.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Parse a submission body field by field, matching keys
/// case-insensitively. A field that is absent, `null`, or not a
/// string keeps its empty default without affecting the others; a body that
/// is not a JSON object yields an empty submission, which then fails lookup
/// as an unknown activity.
pub fn parse_submission(body: &[u8]) -> Submission {
    let mut submission = Submission::default();

    let fields = match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(fields)) => fields,
        Ok(other) => {
            tracing::debug!(
                body = %other,
                "Submission body is not an object, treating as empty"
            );
            return submission;
        }
        Err(e) => {
            tracing::debug!(error = %e, "Malformed submission body, treating as empty");
            return submission;
        }
    };

    for (key, value) in &fields {
        let target = if key.eq_ignore_ascii_case("identifier") {
            &mut submission.identifier
        } else if key.eq_ignore_ascii_case("answer") {
            &mut submission.answer
        } else if key.eq_ignore_ascii_case("session") {
            &mut submission.session
        } else {
            continue;
        };

        match value {
            serde_json::Value::String(text) => *target = text.clone(),
            serde_json::Value::Null => {}
            other => {
                tracing::debug!(
                    field = %key,
                    value = %other,
                    "Ignoring non-string submission field"
                );
            }
        }
    }

    submission
}

pub fn grade_submission(
    store: &ActivityStore,
    recorder: &RecordQueue,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<SubmissionFeedback, SubmissionError> {
    if !is_json_content_type(content_type) {
        return Err(SubmissionError::UnsupportedMediaType);
    }
    let accepted_at = Utc::now();

    let submission = parse_submission(body);

    let activity = match store.get(&submission.identifier) {
        Ok(activity) => activity,
        Err(GraderError::NotFound(identifier)) => {
            tracing::info!(identifier = %identifier, "Invalid activity identifier");
            return Err(SubmissionError::UnknownActivity(identifier));
        }
        Err(e) => {
            tracing::error!(error = %e, "Unexpected activity store error");
            return Err(SubmissionError::UnknownActivity(submission.identifier));
        }
    };

    let feedback = activity.grade(&submission);
    tracing::debug!(
        identifier = %submission.identifier,
        session = %submission.session,
        grade = feedback.grade,
        "Graded submission"
    );

    recorder.submit(SubmissionRecord::new(submission, accepted_at));

    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::recorder::record_channel;
    use grader_core::{Activity, AnswerOption};
    use std::time::Duration;

    fn store() -> ActivityStore {
        ActivityStore::from_activities(vec![
            Activity::new(
                "q1",
                vec![AnswerOption::new("4", 1.0, "correct")],
                "try again",
            )
            .unwrap(),
            Activity::new(
                "dup",
                vec![
                    AnswerOption::new("a", 0.5, "partial"),
                    AnswerOption::new("a", 1.0, "full"),
                ],
                "no",
            )
            .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_content_type_matching() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("application/json; charset=utf-8")));
        assert!(is_json_content_type(Some("Application/JSON")));
        assert!(!is_json_content_type(Some("text/plain")));
        assert!(!is_json_content_type(Some("application/jsonl")));
        assert!(!is_json_content_type(None));
    }

    #[test]
    fn test_parse_submission_degrades_to_empty() {
        assert_eq!(parse_submission(b"not json"), Submission::default());
        assert_eq!(parse_submission(b""), Submission::default());

        let partial = parse_submission(br#"{"identifier":"q1"}"#);
        assert_eq!(partial.identifier, "q1");
        assert_eq!(partial.answer, "");
    }

    #[tokio::test]
    async fn test_correct_answer_is_graded_and_recorded() {
        let (queue, logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"identifier":"q1","answer":"4","session":"s1"}"#;

        let feedback = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
        assert_eq!(feedback.grade, 1.0);
        assert_eq!(feedback.hint, "correct");

        drop(queue);
        let sink = logger.run().await;
        let line: serde_json::Value =
            serde_json::from_slice(sink.strip_suffix(b"\n").unwrap()).unwrap();
        assert_eq!(line["identifier"], "q1");
        assert_eq!(line["answer"], "4");
        assert_eq!(line["session"], "s1");
    }

    #[tokio::test]
    async fn test_wrong_answer_gets_activity_hint() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"identifier":"q1","answer":"5","session":"s1"}"#;

        let feedback = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
        assert_eq!(feedback.grade, 0.0);
        assert_eq!(feedback.hint, "try again");
    }

    #[tokio::test]
    async fn test_duplicate_answer_first_option_wins() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"identifier":"dup","answer":"a","session":"s1"}"#;

        let feedback = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
        assert_eq!(feedback.grade, 0.5);
        assert_eq!(feedback.hint, "partial");
    }

    #[tokio::test]
    async fn test_unknown_activity_is_not_recorded() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"identifier":"unknown","answer":"4","session":"s1"}"#;

        let err = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap_err();
        assert_eq!(err, SubmissionError::UnknownActivity("unknown".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(queue.snapshot().queued, 0);
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_rejected_before_parsing() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"identifier":"q1","answer":"4","session":"s1"}"#;

        let err = grade_submission(&store(), &queue, Some("text/plain"), body).unwrap_err();
        assert_eq!(err, SubmissionError::UnsupportedMediaType);
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(queue.snapshot().queued, 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_unknown_activity() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());

        let err = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), b"{oops").unwrap_err();
        assert_eq!(err, SubmissionError::UnknownActivity(String::new()));
    }

    #[test]
    fn test_parse_submission_keeps_fields_around_bad_ones() {
        let null_answer = parse_submission(br#"{"identifier":"q1","answer":null,"session":"s1"}"#);
        assert_eq!(null_answer.identifier, "q1");
        assert_eq!(null_answer.answer, "");
        assert_eq!(null_answer.session, "s1");

        let numeric_answer = parse_submission(br#"{"identifier":"q1","answer":4,"session":"s1"}"#);
        assert_eq!(numeric_answer.identifier, "q1");
        assert_eq!(numeric_answer.answer, "");
        assert_eq!(numeric_answer.session, "s1");

        let capitalized = parse_submission(br#"{"Identifier":"q1","ANSWER":"4","Session":"s1"}"#);
        assert_eq!(capitalized.identifier, "q1");
        assert_eq!(capitalized.answer, "4");
        assert_eq!(capitalized.session, "s1");

        assert_eq!(parse_submission(br#"["q1","4"]"#), Submission::default());
    }

    #[tokio::test]
    async fn test_null_and_mistyped_answers_are_graded_as_wrong() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());

        for body in [
            &br#"{"identifier":"q1","answer":null,"session":"s1"}"#[..],
            &br#"{"identifier":"q1","answer":4,"session":"s1"}"#[..],
        ] {
            let feedback = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
            assert_eq!(feedback.grade, 0.0);
            assert_eq!(feedback.hint, "try again");
        }
        assert_eq!(queue.snapshot().queued, 2);
    }

    #[tokio::test]
    async fn test_capitalized_keys_are_graded() {
        let (queue, _logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"Identifier":"q1","Answer":"4","Session":"s1"}"#;

        let feedback = grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
        assert_eq!(feedback.grade, 1.0);
        assert_eq!(feedback.hint, "correct");
    }

    #[tokio::test]
    async fn test_record_is_stamped_at_acceptance() {
        let (queue, logger) = record_channel(4, Duration::from_secs(1), Vec::new());
        let body = br#"{"identifier":"q1","answer":"4","session":"s1"}"#;

        let before = Utc::now();
        grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
        let after = Utc::now();

        drop(queue);
        let sink = logger.run().await;
        let record: SubmissionRecord =
            serde_json::from_slice(sink.strip_suffix(b"\n").unwrap()).unwrap();
        assert!(record.timestamp >= before && record.timestamp <= after);
        assert_eq!(record.submission.session, "s1");
    }

    #[tokio::test]
    async fn test_feedback_returned_when_queue_is_full() {
        let (queue, _logger) = record_channel(1, Duration::from_secs(5), Vec::new());
        let body = br#"{"identifier":"q1","answer":"4","session":"s1"}"#;

        for _ in 0..5 {
            let feedback =
                grade_submission(&store(), &queue, Some(JSON_MEDIA_TYPE), body).unwrap();
            assert_eq!(feedback.grade, 1.0);
        }
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.pending, 4);
    }
}
