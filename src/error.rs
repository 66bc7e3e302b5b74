use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Object store error: {0}")]
    Store(String),

    #[error("Task {task} failed after {attempts} attempts: {error}")]
    RetriesExhausted {
        task: String,
        attempts: u32,
        error: String,
    },

    #[error("Run failed: {0}")]
    RunFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
