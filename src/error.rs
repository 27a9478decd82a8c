use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// `axum`-compatible error handler.
///
/// Client errors carry their message back to the caller as `{"error": "..."}`.
/// Server errors only expose their detail in debug builds.
#[derive(Error)]
pub struct Error {
    status: StatusCode,
    err: anyhow::Error,
}

impl Error {
    pub fn with_status(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            err: err.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, anyhow::anyhow!(msg.into()))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, anyhow::anyhow!(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!(msg.into()))
    }

    pub fn bad_gateway(err: impl Into<anyhow::Error>) -> Self {
        Self::with_status(StatusCode::BAD_GATEWAY, err)
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.status, self.err)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.err.fmt(f)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = if self.status.is_client_error() {
            warn!("{}: {}", self.status, self.err);
            self.err.to_string()
        } else {
            error!("{:?}", self.err);

            // N.B: Forward out the error chain to the requester if this is a debug build.
            // This is insecure for production builds, so release builds only get the
            // status text.
            if cfg!(debug_assertions) {
                format!("{:?}", self.err)
            } else {
                self.status
                    .canonical_reason()
                    .unwrap_or("Internal Server Error")
                    .to_owned()
            }
        };

        (self.status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
