use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::config::RuntimeVersion;
use crate::protocol::{ERR_BACKEND_UNAVAILABLE, ERR_INVALID_PARAMETERS, ERR_UNSUPPORTED_RUNTIME};

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("unsupported runtime version - requires {0}+")]
    UnsupportedRuntime(RuntimeVersion),

    #[error("invalid parameters")]
    MissingParameters,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid action '{0}'")]
    InvalidAction(String),

    #[error("MySQL not supported on the server")]
    BackendUnavailable,

    #[error("{0}")]
    Connect(BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type TunnelResult<T> = Result<T, TunnelError>;

impl TunnelError {
    /// Error code written into the response header, for errors the client is told about.
    pub fn wire_code(&self) -> Option<u32> {
        match self {
            TunnelError::UnsupportedRuntime(_) => Some(ERR_UNSUPPORTED_RUNTIME),
            TunnelError::MissingParameters
            | TunnelError::InvalidParameters(_)
            | TunnelError::InvalidAction(_) => Some(ERR_INVALID_PARAMETERS),
            TunnelError::BackendUnavailable => Some(ERR_BACKEND_UNAVAILABLE),
            TunnelError::Connect(err) => Some(err.code),
            TunnelError::Io(_) | TunnelError::Internal(_) => None,
        }
    }
}

impl From<BackendError> for TunnelError {
    fn from(err: BackendError) -> Self {
        TunnelError::Connect(err)
    }
}

impl IntoResponse for TunnelError {
    fn into_response(self) -> Response {
        let status = match &self {
            TunnelError::MissingParameters
            | TunnelError::InvalidParameters(_)
            | TunnelError::InvalidAction(_) => StatusCode::BAD_REQUEST,
            TunnelError::BackendUnavailable => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
