use thiserror::Error;

/// Errors that can occur while ingesting events from files or live feeds
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to spawn subscriber process: {0}")]
    SubprocessSpawn(String),

    #[error("Subscriber process terminated unexpectedly: {0}")]
    SubprocessTerminated(String),

    #[error("Failed to parse event data: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors raised by the event and incident store
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Event has no event_id")]
    MissingEventId,

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Incident already exists for event {0}")]
    DuplicateIncident(String),

    #[error("Unknown incident: {0}")]
    UnknownIncident(u64),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Errors that can occur while writing reports
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
