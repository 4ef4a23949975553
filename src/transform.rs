//! Local image-surface operations: crop, resize and export.
//!
//! Each takes an artifact and returns a new one; inputs are never modified.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::{
    error::{EditError, Result},
    models::ImageArtifact,
};

/// Pixel rectangle on the natural-size image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scales a selection made on the displayed image to natural pixels.
    pub fn from_display(
        selection: (f64, f64, f64, f64),
        display: (f64, f64),
        natural: (u32, u32),
    ) -> Option<Self> {
        let (sel_x, sel_y, sel_w, sel_h) = selection;
        if display.0 <= 0.0 || display.1 <= 0.0 || sel_w <= 0.0 || sel_h <= 0.0 {
            return None;
        }
        let scale_x = natural.0 as f64 / display.0;
        let scale_y = natural.1 as f64 / display.1;
        Some(Self {
            x: (sel_x.max(0.0) * scale_x).round() as u32,
            y: (sel_y.max(0.0) * scale_y).round() as u32,
            width: (sel_w * scale_x).round() as u32,
            height: (sel_h * scale_y).round() as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Exactly the requested size.
    Exact,
    /// Fit inside the requested box, preserving aspect ratio.
    Fit,
}

/// Export encoding. Quality is in `[0, 1]`, as with a canvas export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportFormat {
    Png,
    Jpeg { quality: f32 },
    /// Encoded losslessly; `quality` is accepted for API symmetry.
    Webp { quality: f32 },
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg { .. } => "image/jpeg",
            ExportFormat::Webp { .. } => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg { .. } => "jpg",
            ExportFormat::Webp { .. } => "webp",
        }
    }

    /// Maps a MIME type or file extension to a format with default quality.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" | "image/jpeg" => Some(ExportFormat::Jpeg { quality: 0.92 }),
            "webp" | "image/webp" => Some(ExportFormat::Webp { quality: 0.92 }),
            _ => None,
        }
    }
}

pub fn crop(artifact: &ImageArtifact, rect: CropRect) -> Result<ImageArtifact> {
    if rect.width == 0 || rect.height == 0 {
        return Err(EditError::InvalidInput("Please select an area to crop.".into()));
    }

    let image = decode(artifact)?;
    let right = rect.x.checked_add(rect.width);
    let bottom = rect.y.checked_add(rect.height);
    match (right, bottom) {
        (Some(r), Some(b)) if r <= image.width() && b <= image.height() => {}
        _ => {
            return Err(EditError::InvalidInput(format!(
                "Crop {}x{}+{}+{} exceeds image bounds {}x{}",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                image.width(),
                image.height()
            )))
        }
    }

    let cropped = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    encode(&cropped, ExportFormat::Png)
}

pub fn resize(artifact: &ImageArtifact, width: u32, height: u32, mode: ResizeMode) -> Result<ImageArtifact> {
    if width == 0 || height == 0 {
        return Err(EditError::InvalidInput("Width and height must be greater than zero.".into()));
    }

    let image = decode(artifact)?;
    let resized = match mode {
        ResizeMode::Exact => image.resize_exact(width, height, FilterType::Lanczos3),
        ResizeMode::Fit => image.resize(width, height, FilterType::Lanczos3),
    };
    encode(&resized, ExportFormat::Png)
}

/// Re-encodes the artifact, e.g. for download.
pub fn export(artifact: &ImageArtifact, format: ExportFormat) -> Result<ImageArtifact> {
    if let ExportFormat::Jpeg { quality } | ExportFormat::Webp { quality } = format {
        if !(0.0..=1.0).contains(&quality) {
            return Err(EditError::InvalidInput(format!(
                "Quality must be between 0.0 and 1.0, got {}",
                quality
            )));
        }
    }
    let image = decode(artifact)?;
    encode(&image, format)
}

fn decode(artifact: &ImageArtifact) -> Result<DynamicImage> {
    image::load_from_memory(artifact.data())
        .map_err(|e| EditError::Transform(format!("Failed to decode image: {}", e)))
}

fn encode(image: &DynamicImage, format: ExportFormat) -> Result<ImageArtifact> {
    let mut buf = Cursor::new(Vec::new());
    let written = match format {
        ExportFormat::Png => image.write_to(&mut buf, ImageFormat::Png),
        ExportFormat::Webp { .. } => image.write_to(&mut buf, ImageFormat::WebP),
        ExportFormat::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = image.to_rgb8();
            let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            JpegEncoder::new_with_quality(&mut buf, q).encode_image(&rgb)
        }
    };
    written.map_err(|e| EditError::Transform(format!("Failed to encode {}: {}", format.mime_type(), e)))?;

    Ok(ImageArtifact::new(buf.into_inner(), format.mime_type()))
}
