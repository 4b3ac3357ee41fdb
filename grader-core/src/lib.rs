pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use config::GraderConfig;
pub use error::{GraderError, ValidationError};
pub use models::{Activity, AnswerOption, Submission, SubmissionFeedback, SubmissionRecord};
pub use store::ActivityStore;
