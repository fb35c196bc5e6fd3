use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Every failure the service can report, at startup or per request.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("model load failed: {0}")]
    ModelLoadError(String),
    #[error("image decode failed: {0}")]
    ImageDecodeError(#[from] image::ImageError),
    #[error("invalid input shape: expected {expected:?}, got {actual:?}")]
    InvalidInputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("model produced {actual} outputs for {expected} labels")]
    OutputWidthMismatch { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("no file uploaded")]
    MissingFile,
    #[error("upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("malformed multipart body: {0}")]
    Multipart(String),
    #[error("inference worker unavailable")]
    Blocking,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<actix_multipart::MultipartError> for ServiceError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        Self::Multipart(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for ServiceError {
    fn from(_: actix_web::error::BlockingError) -> Self {
        Self::Blocking
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::ImageDecodeError(_) | Self::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ModelLoadError(_)
            | Self::InvalidInputShape { .. }
            | Self::OutputWidthMismatch { .. }
            | Self::Inference(_)
            | Self::Blocking => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
