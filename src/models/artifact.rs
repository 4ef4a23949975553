use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

use crate::error::{EditError, Result};

/// One immutable image in the edit history.
///
/// The payload is reference counted, so cloning an artifact (into the
/// history, a request, a display handle) never copies the image bytes.
#[derive(Clone)]
pub struct ImageArtifact {
    id: Uuid,
    mime_type: String,
    data: Arc<[u8]>,
}

impl ImageArtifact {
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: mime_type.into(),
            data: Arc::from(data.into()),
        }
    }

    /// Builds an artifact from raw bytes, sniffing the MIME type from the
    /// image header.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&data)
            .map_err(|e| EditError::InvalidInput(format!("Unrecognized image data: {}", e)))?;
        let mime_type = mime_for_format(format).ok_or_else(|| {
            EditError::InvalidInput(format!("Unsupported image format: {:?}", format))
        })?;
        Ok(Self::new(data, mime_type))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            EditError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(data)
    }

    /// Decodes a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| EditError::InvalidInput("Not a data URL".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| EditError::InvalidInput("Data URL has no payload".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| EditError::InvalidInput("Data URL is not base64 encoded".into()))?;
        if mime_type.is_empty() {
            return Err(EditError::InvalidInput("Data URL has no MIME type".into()));
        }

        let data = STANDARD
            .decode(payload)
            .map_err(|e| EditError::InvalidInput(format!("Invalid base64 payload: {}", e)))?;
        Ok(Self::new(data, mime_type))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Natural pixel dimensions, decoded from the payload.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let decoded = image::load_from_memory(&self.data)
            .map_err(|e| EditError::Transform(format!("Failed to decode image: {}", e)))?;
        Ok((decoded.width(), decoded.height()))
    }
}

impl PartialEq for ImageArtifact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImageArtifact {}

impl fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageArtifact")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub(crate) fn mime_for_format(format: image::ImageFormat) -> Option<&'static str> {
    match format {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}
