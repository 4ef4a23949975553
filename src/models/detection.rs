use serde::{Deserialize, Serialize};

use super::ImageArtifact;

/// Face region normalized to the image dimensions; every field is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    #[serde(alias = "w")]
    pub width: f64,
    #[serde(alias = "h")]
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// NaN and infinities are never in range.
    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    /// Pixel rectangle `(x, y, width, height)` for an image of the given size.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let w = image_width as f64;
        let h = image_height as f64;
        (
            (self.x * w).round() as u32,
            (self.y * h).round() as u32,
            (self.width * w).round() as u32,
            (self.height * h).round() as u32,
        )
    }
}

/// Outcome of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Image(ImageArtifact),
    Text(String),
    Faces(Vec<BoundingBox>),
}

impl OperationResult {
    pub fn as_image(&self) -> Option<&ImageArtifact> {
        match self {
            OperationResult::Image(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OperationResult::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_faces(&self) -> Option<&[BoundingBox]> {
        match self {
            OperationResult::Faces(faces) => Some(faces),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_covers_every_field() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_normalized());
        assert!(!BoundingBox::new(1.5, 0.1, 0.1, 0.1).is_normalized());
        assert!(!BoundingBox::new(0.1, -0.01, 0.1, 0.1).is_normalized());
        assert!(!BoundingBox::new(0.1, 0.1, 0.1, f64::NAN).is_normalized());
    }

    #[test]
    fn short_field_names_deserialize() {
        let face: BoundingBox =
            serde_json::from_str(r#"{"x":0.1,"y":0.2,"w":0.3,"h":0.4}"#).unwrap();
        assert_eq!(face, BoundingBox::new(0.1, 0.2, 0.3, 0.4));
    }

    #[test]
    fn converts_to_pixel_space() {
        let face = BoundingBox::new(0.25, 0.5, 0.5, 0.25);
        assert_eq!(face.to_pixels(200, 100), (50, 50, 100, 25));
    }
}
