pub mod activity;
pub mod submission;

pub use activity::{Activity, AnswerOption};
pub use submission::{Submission, SubmissionFeedback, SubmissionRecord};
