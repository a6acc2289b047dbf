// Error taxonomy for flythrough construction and playback.
// Per-frame geometry edge cases never surface here; they resolve to defined values.

use thiserror::Error;

pub type FlythroughResult<T> = Result<T, FlythroughError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlythroughError {
    #[error("waypoint list is empty")]
    EmptyPath,

    #[error("waypoint {index}: `{field}` is not finite")]
    NonFinite { index: usize, field: &'static str },

    #[error("waypoint {index}: `{field}` {reason}")]
    InvalidValue {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("setting `{field}` {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("unknown easing type: {0}")]
    UnknownEasing(String),

    #[error("unknown look-at mode: {0}")]
    UnknownLookAt(String),

    #[error("unknown playback mode: {0}")]
    UnknownMode(String),

    #[error("no output transform is bound")]
    UnboundOutput,

    #[error("config error [{path}]: {reason}")]
    Config { path: String, reason: String },

    #[error("heightmap error: {0}")]
    Heightmap(String),
}
