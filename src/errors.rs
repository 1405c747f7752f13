//! Error types for pulse-runner

use thiserror::Error;

use crate::status::ExitStatus;

/// Main error type for pulse-runner
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A collection node could not be loaded or resolved
    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Environment not found: {0}")]
    EnvNotFound(String),

    #[error("Overridable environment variable not correct: use name=value - presented: {0}")]
    MalformedEnvOverride(String),

    #[error("Cannot use both env and env file options together")]
    ConflictingEnvOptions,

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Too many jumps ({0}), possible infinite loop")]
    InfiniteLoop(usize),

    #[error("Output directory {0} does not exist")]
    MissingOutputDir(String),

    #[error("Reporter {0} does not exist")]
    UnknownReportFormat(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl RunnerError {
    /// Exit status reported by the CLI when this error ends a run
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            RunnerError::PathNotFound(_) => ExitStatus::FileNotFound,
            RunnerError::EnvNotFound(_) => ExitStatus::EnvNotFound,
            RunnerError::ConflictingEnvOptions => ExitStatus::MalformedEnvOverride,
            RunnerError::MalformedEnvOverride(_) => ExitStatus::IncorrectEnvOverride,
            RunnerError::InfiniteLoop(_) => ExitStatus::InfiniteLoop,
            RunnerError::MissingOutputDir(_) => ExitStatus::MissingOutputDir,
            RunnerError::UnknownReportFormat(_) => ExitStatus::IncorrectOutputFormat,
            _ => ExitStatus::Generic,
        }
    }
}

impl From<rquickjs::Error> for RunnerError {
    fn from(err: rquickjs::Error) -> Self {
        RunnerError::Script(format!("JavaScript error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
