use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cali_providers::google::api::ApiErrorBody;
use thiserror::Error;
use tracing::debug;

pub type MockResult<T> = Result<T, MockError>;

/// Failures the mock reports to its HTTP clients.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("calendar not found")]
    CalendarNotFound,

    #[error("event not found")]
    EventNotFound,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid page token: {0}")]
    InvalidPageToken(String),

    #[error("invalid query parameter {name}: {value}")]
    InvalidQuery { name: &'static str, value: String },
}

impl MockError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CalendarNotFound | Self::EventNotFound => StatusCode::NOT_FOUND,
            Self::InvalidJson(_) | Self::InvalidPageToken(_) | Self::InvalidQuery { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::BAD_REQUEST {
            debug!(error = %self, "rejected request");
        }
        (status, Json(ApiErrorBody::new(status.as_u16(), self.to_string()))).into_response()
    }
}
