use crate::analyzer::Swatch;
use crate::guide::StyleGuide;
use crate::selection::{Selection, SelectionChange};
use crate::upload::ImageKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient message for the user, shown once and forgotten.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeEvent {
    pub level: NoticeLevel,
    pub message: String,
    pub time: i64,
}

impl NoticeEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            time: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SwatchesEvent {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub swatches: Vec<Swatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionEvent {
    pub change: SelectionChange,
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextEvent {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsEvent {
    #[serde(rename = "clientCount")]
    pub client_count: usize,
    #[serde(rename = "connCount")]
    pub conn_count: usize,
    pub clients: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoSummary {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub kind: ImageKind,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub logo: Option<LogoSummary>,
    pub swatches: Vec<Swatch>,
    pub selection: Selection,
    #[serde(rename = "brandText")]
    pub brand_text: Option<String>,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    pub hex: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextResponse {
    pub message: &'static str,
    pub data: String,
}

impl TextResponse {
    pub fn success(data: String) -> Self {
        Self {
            message: "Success.",
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub guide: StyleGuide,
}
