//! Error responses.
//!
//! Every failure becomes a status code with a plain-text body, and is logged
//! once, here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing key")]
    MissingKey,

    #[error("missing value")]
    MissingValue,

    #[error("key not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("failed to get value")]
    Get(#[source] StoreError),

    #[error("failed to set value")]
    Set(#[source] StoreError),

    #[error("failed to reach upstream")]
    Upstream(#[source] StoreError),

    #[error("failed to render page")]
    Render(#[from] minijinja::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingKey | RelayError::MissingValue => StatusCode::BAD_REQUEST,
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Get(_) | RelayError::Set(_) | RelayError::Upstream(_) | RelayError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let cause = std::error::Error::source(&self).map(ToString::to_string);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, cause = ?cause, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, self.to_string()).into_response()
    }
}
