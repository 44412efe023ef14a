use thiserror::Error;

/// All errors that can occur in tickscope-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid date \"{0}\", expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the CLI. Usage errors exit through clap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    GeneralError = 1,
}

pub type Result<T> = std::result::Result<T, CoreError>;
