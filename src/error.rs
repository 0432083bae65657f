use reqwest::StatusCode;
use thiserror::Error;

/// The one failure mode of a session refresh.
///
/// Transport problems, bad status codes and undecodable payloads all
/// collapse into this type at the fetch boundary; callers only ever see
/// "the refresh failed", with the cause attached for logging.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Session endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Session endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Malformed session payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Rejections raised while validating a configuration entry.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum ConfigFlowError {
    #[error("Entry {0:?} selects no friend code and no aggregate sensors")]
    NoOptionSelected(String),

    #[error("Entries {0:?} and {1:?} share unique id {2:?}")]
    DuplicateUniqueId(String, String, String),
}

#[derive(Error, Debug)]
pub enum BridgeError {
    /* mapped errors */
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    ConfigFlowError(#[from] ConfigFlowError),

    #[error(transparent)]
    UpdateError(#[from] UpdateError),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    /* bridge errors */
    #[error("Service error: {0}")]
    Service(String),
}

impl BridgeError {
    pub fn service_error(msg: impl ToString) -> Self {
        Self::Service(msg.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
