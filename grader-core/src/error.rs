use thiserror::Error;

/// An activity that breaks one of the answer-key invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing identifier for activity")]
    MissingIdentifier,

    #[error("activity '{identifier}' cannot have a grade of {grade}")]
    GradeOutOfRange { identifier: String, grade: f64 },

    #[error("there must be at least one option for activity '{identifier}'")]
    NoOptions { identifier: String },

    #[error("there must be at least one option with a grade of 1.0 for activity '{identifier}'")]
    NoFullCredit { identifier: String },
}

#[derive(Error, Debug)]
pub enum GraderError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed activity on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid activity: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot add activity with duplicate identifier '{0}'")]
    DuplicateIdentifier(String),

    #[error("invalid activity identifier '{0}'")]
    NotFound(String),
}
