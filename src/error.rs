use crate::engine::HexColor;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// The uploaded bytes could not be turned into pixels.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode image: {0}")]
    Raster(#[from] image::ImageError),
    #[error("Failed to parse SVG: {0}")]
    Svg(#[from] resvg::usvg::Error),
    #[error("SVG viewport must have a finite, positive size")]
    InvalidViewport,
    #[error("Image has no opaque pixels to take colors from")]
    NoOpaquePixels,
    #[error("Image decoding was interrupted")]
    Interrupted,
}

/// A request broke one of the upload or selection rules.
#[derive(Error, Debug)]
pub enum RejectionError {
    #[error("File {name} was rejected: unsupported type {mime}")]
    UnsupportedType { name: String, mime: String },
    #[error("File {name} was rejected: larger than {limit} bytes")]
    TooLarge { name: String, limit: usize },
    #[error("File {name} was rejected: file is empty")]
    Empty { name: String },
    #[error("File {name} was superseded by a newer upload")]
    Superseded { name: String },
    #[error("No image provided or invalid file")]
    MissingFile,
    #[error("Only one logo can be uploaded at a time")]
    TooManyFiles,
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
    #[error("You can only select a primary and a secondary color.")]
    SelectionFull,
    #[error("Color {0} is not part of the extracted palette")]
    UnknownSwatch(HexColor),
    #[error("Select a primary and a secondary color first")]
    IncompleteSelection,
    #[error("Upload a logo first")]
    NoLogo,
}

/// The remote text-extraction call failed or answered with nothing usable.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Text extraction is not configured")]
    NotConfigured,
    #[error("Text extraction request failed: {0}")]
    Transport(#[from] ureq::Error),
    #[error("Text extraction returned an unusable payload: {0}")]
    Payload(String),
    #[error("Text extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
#[error("Invalid hex color: {0}")]
pub struct ColorError(pub String);

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Rejected(#[from] RejectionError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    InvalidColor(#[from] ColorError),
    #[error("Session {0} not found")]
    SessionNotFound(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Rejected(rejection) => match rejection {
                RejectionError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                RejectionError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                RejectionError::Empty { .. }
                | RejectionError::MissingFile
                | RejectionError::TooManyFiles
                | RejectionError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
                RejectionError::Superseded { .. }
                | RejectionError::SelectionFull
                | RejectionError::UnknownSwatch(_)
                | RejectionError::IncompleteSelection
                | RejectionError::NoLogo => StatusCode::CONFLICT,
            },
            AppError::Service(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidColor(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Text shown to the user. Service failures stay generic; the detail
    /// only goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Service(_) => "Text extraction failed. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.user_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
