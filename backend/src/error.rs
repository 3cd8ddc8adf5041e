use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::llm::UpstreamError;
use crate::pipeline::{PipelineError, REPORT_GENERATION_FAILED};

pub const CHAT_INVALID_INPUT: &str =
    "Invalid input. Please provide 'prompt', 'user_data', and 'language' in JSON format.";
pub const REPORT_MISSING_PATH: &str = "No file path or URL provided";
const CHAT_INTERNAL_ERROR: &str = "Internal server error.";

/// Request-boundary error. Validation is the only 4xx; every dependency
/// failure is a 500 carrying a stable message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("{0}")]
    Report(#[from] PipelineError),
    #[error("{0}")]
    Chat(#[from] UpstreamError),
}

impl ApiError {
    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Validation(message) => ErrorResponse {
                error: (*message).to_string(),
                details: None,
            },
            ApiError::Report(err) => ErrorResponse {
                error: err.public_message(),
                details: None,
            },
            ApiError::Chat(_) => ErrorResponse {
                error: CHAT_INTERNAL_ERROR.to_string(),
                details: Some(REPORT_GENERATION_FAILED.to_string()),
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Report(_) | ApiError::Chat(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}
