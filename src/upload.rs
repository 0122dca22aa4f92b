use crate::error::RejectionError;
use axum::body::Bytes;
use axum::extract::Multipart;
use serde::Serialize;

/// Multipart field carrying the logo.
pub const LOGO_FIELD: &str = "logo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Svg,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/svg+xml" => Some(Self::Svg),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// A logo that passed the type and size checks.
#[derive(Debug, Clone)]
pub struct LogoUpload {
    pub file_name: String,
    pub kind: ImageKind,
    pub bytes: Bytes,
}

impl LogoUpload {
    pub fn validate(
        file_name: String,
        content_type: Option<&str>,
        bytes: Bytes,
        max_bytes: usize,
    ) -> Result<Self, RejectionError> {
        // Browsers send octet-stream for files they cannot classify
        let declared = content_type.filter(|mime| !mime.starts_with("application/octet-stream"));
        let kind = match declared {
            Some(mime) => ImageKind::from_mime(mime).ok_or_else(|| {
                RejectionError::UnsupportedType {
                    name: file_name.clone(),
                    mime: mime.to_string(),
                }
            })?,
            None => ImageKind::from_file_name(&file_name).ok_or_else(|| {
                RejectionError::UnsupportedType {
                    name: file_name.clone(),
                    mime: content_type.unwrap_or("unknown").to_string(),
                }
            })?,
        };

        if bytes.len() > max_bytes {
            return Err(RejectionError::TooLarge {
                name: file_name,
                limit: max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(RejectionError::Empty { name: file_name });
        }

        Ok(Self {
            file_name,
            kind,
            bytes,
        })
    }

    /// The logo inlined as a `data:` URI.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime(), base64_encode(&self.bytes))
    }
}

/// Reads the single `logo` field out of a multipart body. Reading stops as
/// soon as the file grows past `max_bytes`.
pub async fn read_logo(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<LogoUpload, RejectionError> {
    let mut logo = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| RejectionError::MalformedUpload(e.body_text()))?
    {
        if field.name() != Some(LOGO_FIELD) {
            continue;
        }
        if logo.is_some() {
            return Err(RejectionError::TooManyFiles);
        }

        let file_name = field.file_name().unwrap_or(LOGO_FIELD).to_string();
        let content_type = field.content_type().map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| RejectionError::MalformedUpload(e.body_text()))?
        {
            if data.len() + chunk.len() > max_bytes {
                return Err(RejectionError::TooLarge {
                    name: file_name,
                    limit: max_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        logo = Some(LogoUpload::validate(
            file_name,
            content_type.as_deref(),
            Bytes::from(data),
            max_bytes,
        )?);
    }

    logo.ok_or(RejectionError::MissingFile)
}

/// Standard padded base64, enough for a `data:` URI.
fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut encoded = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for group in bytes.chunks(3) {
        let mut triple = [0u8; 3];
        triple[..group.len()].copy_from_slice(group);
        let word = u32::from_be_bytes([0, triple[0], triple[1], triple[2]]);

        // n input bytes carry n + 1 significant sextets
        for index in 0..4 {
            if index <= group.len() {
                let sextet = (word >> (18 - 6 * index)) & 0x3f;
                encoded.push(ALPHABET[sextet as usize] as char);
            } else {
                encoded.push('=');
            }
        }
    }
    encoded
}
