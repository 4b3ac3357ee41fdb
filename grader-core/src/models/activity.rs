use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::submission::{Submission, SubmissionFeedback};

/// One scored answer alternative within an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub answer: String,
    pub grade: f64,
    pub hint: String,
}

impl AnswerOption {
    pub fn new(answer: impl Into<String>, grade: f64, hint: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            grade,
            hint: hint.into(),
        }
    }
}

/// A gradable prompt: its scored options plus the fallback hint returned
/// when no option matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub identifier: String,
    pub options: Vec<AnswerOption>,
    pub hint: String,
}

impl Activity {
    /// Build an activity, rejecting it if it breaks any invariant.
    pub fn new(
        identifier: impl Into<String>,
        options: Vec<AnswerOption>,
        hint: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let activity = Self {
            identifier: identifier.into(),
            options,
            hint: hint.into(),
        };
        activity.validate()?;
        Ok(activity)
    }

    /// Check the answer-key invariants in one pass over the options.
    ///
    /// An activity needs an identifier, at least one option, every grade in
    /// `[0, 1]`, and at least one option worth full credit.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.identifier.is_empty() {
            return Err(ValidationError::MissingIdentifier);
        }

        let mut maximum_grade = 0.0_f64;
        let mut minimum_grade = 1.0_f64;
        for option in &self.options {
            // NaN fails the range check and never reaches the running bounds
            if !(0.0..=1.0).contains(&option.grade) {
                return Err(ValidationError::GradeOutOfRange {
                    identifier: self.identifier.clone(),
                    grade: option.grade,
                });
            }
            maximum_grade = maximum_grade.max(option.grade);
            minimum_grade = minimum_grade.min(option.grade);
        }

        if self.options.is_empty() {
            return Err(ValidationError::NoOptions {
                identifier: self.identifier.clone(),
            });
        }
        if maximum_grade != 1.0 {
            return Err(ValidationError::NoFullCredit {
                identifier: self.identifier.clone(),
            });
        }

        tracing::trace!(
            identifier = %self.identifier,
            options = self.options.len(),
            minimum_grade,
            "Activity validated"
        );
        Ok(())
    }

    /// Grade a submission: the first option whose answer is byte-equal to
    /// the submitted answer wins. Anything else scores 0 with the
    /// activity's own hint.
    pub fn grade(&self, submission: &Submission) -> SubmissionFeedback {
        self.options
            .iter()
            .find(|option| option.answer == submission.answer)
            .map(|option| SubmissionFeedback {
                grade: option.grade,
                hint: option.hint.clone(),
            })
            .unwrap_or_else(|| SubmissionFeedback {
                grade: 0.0,
                hint: self.hint.clone(),
            })
    }
}
