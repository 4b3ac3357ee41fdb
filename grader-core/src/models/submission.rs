use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A caller's attempt at an activity. Absent fields default to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub identifier: String,
    pub answer: String,
    pub session: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionFeedback {
    pub grade: f64,
    pub hint: String,
}

/// Audit copy of an accepted submission, stamped when it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(flatten)]
    pub submission: Submission,
    pub timestamp: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(submission: Submission, timestamp: DateTime<Utc>) -> Self {
        Self {
            submission,
            timestamp,
        }
    }

    /// Stamp a submission with the current UTC time.
    pub fn now(submission: Submission) -> Self {
        Self::new(submission, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_submission_missing_fields_default_to_empty() {
        let submission: Submission = serde_json::from_str(r#"{"answer":"4"}"#).unwrap();
        assert_eq!(submission.identifier, "");
        assert_eq!(submission.answer, "4");
        assert_eq!(submission.session, "");
    }

    #[test]
    fn test_record_serializes_flat_with_utc_timestamp() {
        let record = SubmissionRecord::new(
            Submission {
                identifier: "q1".to_string(),
                answer: "4".to_string(),
                session: "s1".to_string(),
            },
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["identifier"], "q1");
        assert_eq!(value["answer"], "4");
        assert_eq!(value["session"], "s1");
        assert_eq!(value["timestamp"], "2026-03-01T12:30:00Z");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_feedback_wire_shape() {
        let feedback = SubmissionFeedback {
            grade: 1.0,
            hint: "correct".to_string(),
        };
        let json = serde_json::to_value(&feedback).unwrap();
        assert_eq!(json, serde_json::json!({"grade": 1.0, "hint": "correct"}));
    }
}
