use thiserror::Error;

use crate::inventory::InventoryObjectKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("pending confirmation not found: {0}")]
    PendingNotFound(String),

    #[error("{kind} '{id}' references unknown zone '{zone_id}'")]
    InvalidReference {
        kind: InventoryObjectKind,
        id: String,
        zone_id: String,
    },

    #[error("unknown {kind} '{id}' and commits are restricted to known objects")]
    UnknownObject { kind: InventoryObjectKind, id: String },

    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::PendingNotFound(_)
                | Error::InvalidReference { .. }
                | Error::UnknownObject { .. }
                | Error::InvalidSignal(_)
                | Error::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
