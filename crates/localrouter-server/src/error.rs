//! HTTP error mapping for the gateway surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A client-visible error with its HTTP status.
///
/// The bodies are intentionally terse; details stay in the logs, where the
/// provider error boundary has already redacted anything sensitive.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    /// 400: the request body was not valid JSON for the chat schema.
    pub fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request JSON",
        }
    }

    /// 500: no provider could be selected.
    pub fn routing() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Routing Error",
        }
    }

    /// 502: the upstream call failed.
    pub fn bad_gateway() -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: "Bad Gateway",
        }
    }

    /// 500: the response could not be constructed.
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error",
        }
    }

    /// The mapped status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::bad_request().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::routing().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::bad_gateway().status(), StatusCode::BAD_GATEWAY);
    }
}
