//! Error type shared by configuration, channel I/O and the cycle

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Malformed link '{link}': {reason}")]
    MalformedLink { link: String, reason: String },

    #[error("Unknown channel role '{0}'")]
    UnknownRole(String),

    #[error("Invalid link option '{0}'")]
    InvalidOption(String),

    #[error("Channel {channel} ({role}) cannot {action}")]
    RoleMismatch {
        channel: String,
        role: &'static str,
        action: &'static str,
    },

    #[error("Unknown window type index {0}")]
    UnknownWindowType(u32),

    #[error("Required output size of channel {0} is already registered")]
    RequiredSizeAlreadySet(String),

    #[error("Instance {0} has no valid result")]
    InvalidResult(String),

    #[error("No transform plan (no input collected yet)")]
    NoPlan,

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Channel {0} is not bound to a live instance")]
    Detached(String),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Job scheduler has shut down")]
    SchedulerClosed,

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
