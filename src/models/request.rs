use serde::{Deserialize, Serialize};
use std::fmt;

use super::ImageArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Retouch,
    Filter,
    Adjustment,
    Enhance,
    BackgroundRemoval,
    Ocr,
    FaceDetect,
    // Local surface operations, never sent to the service.
    Crop,
    Resize,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Retouch => "retouch",
            TaskKind::Filter => "filter",
            TaskKind::Adjustment => "adjustment",
            TaskKind::Enhance => "enhance",
            TaskKind::BackgroundRemoval => "background-removal",
            TaskKind::Ocr => "ocr",
            TaskKind::FaceDetect => "face-detect",
            TaskKind::Crop => "crop",
            TaskKind::Resize => "resize",
        }
    }

    /// What a successful service call for this task yields.
    pub fn expected_output(&self) -> ExpectedOutput {
        match self {
            TaskKind::Ocr => ExpectedOutput::Text,
            TaskKind::FaceDetect => ExpectedOutput::Faces,
            _ => ExpectedOutput::Image,
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, TaskKind::Crop | TaskKind::Resize)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedOutput {
    Image,
    Text,
    Faces,
}

/// Pixel coordinate on the natural-size image where a retouch applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusPoint {
    pub x: u32,
    pub y: u32,
}

impl FocusPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Maps a click on an image displayed at `display` size back to pixel
    /// coordinates of the image at its `natural` size.
    pub fn from_display(
        click_x: f64,
        click_y: f64,
        display: (f64, f64),
        natural: (u32, u32),
    ) -> Option<Self> {
        let (display_w, display_h) = display;
        if display_w <= 0.0 || display_h <= 0.0 || natural.0 == 0 || natural.1 == 0 {
            return None;
        }
        if !(0.0..=display_w).contains(&click_x) || !(0.0..=display_h).contains(&click_y) {
            return None;
        }

        let scale_x = natural.0 as f64 / display_w;
        let scale_y = natural.1 as f64 / display_h;
        let x = ((click_x * scale_x).round() as u32).min(natural.0 - 1);
        let y = ((click_y * scale_y).round() as u32).min(natural.1 - 1);
        Some(Self { x, y })
    }
}

/// Task tag plus the per-task user input.
#[derive(Debug, Clone, PartialEq)]
pub enum EditTask {
    Retouch { instruction: String, focus: FocusPoint },
    Filter { instruction: String },
    Adjustment { instruction: String },
    Enhance,
    BackgroundRemoval,
    Ocr,
    FaceDetect,
}

impl EditTask {
    pub fn kind(&self) -> TaskKind {
        match self {
            EditTask::Retouch { .. } => TaskKind::Retouch,
            EditTask::Filter { .. } => TaskKind::Filter,
            EditTask::Adjustment { .. } => TaskKind::Adjustment,
            EditTask::Enhance => TaskKind::Enhance,
            EditTask::BackgroundRemoval => TaskKind::BackgroundRemoval,
            EditTask::Ocr => TaskKind::Ocr,
            EditTask::FaceDetect => TaskKind::FaceDetect,
        }
    }

    pub fn instruction(&self) -> Option<&str> {
        match self {
            EditTask::Retouch { instruction, .. }
            | EditTask::Filter { instruction }
            | EditTask::Adjustment { instruction } => Some(instruction),
            _ => None,
        }
    }

    pub fn focus(&self) -> Option<FocusPoint> {
        match self {
            EditTask::Retouch { focus, .. } => Some(*focus),
            _ => None,
        }
    }
}

/// A fully validated request, ready for any service transport.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub task: EditTask,
    pub source: ImageArtifact,
    /// Rendered instruction sent to the model, policy text included.
    pub prompt: String,
}

impl EditRequest {
    pub fn kind(&self) -> TaskKind {
        self.task.kind()
    }

    pub fn expected_output(&self) -> ExpectedOutput {
        self.kind().expected_output()
    }
}

/// One-click styles offered alongside free-text filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPreset {
    Synthwave,
    Anime,
    Lomo,
    Glitch,
    Noir,
}

impl FilterPreset {
    pub fn all() -> &'static [FilterPreset] {
        &[
            FilterPreset::Synthwave,
            FilterPreset::Anime,
            FilterPreset::Lomo,
            FilterPreset::Glitch,
            FilterPreset::Noir,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterPreset::Synthwave => "Synthwave",
            FilterPreset::Anime => "Anime",
            FilterPreset::Lomo => "Lomo",
            FilterPreset::Glitch => "Glitch",
            FilterPreset::Noir => "Noir",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            FilterPreset::Synthwave => {
                "Apply a vibrant 80s synthwave look with neon magenta and cyan glows and subtle scan lines."
            }
            FilterPreset::Anime => {
                "Give the image a Japanese anime style with bold outlines, cel shading and saturated colors."
            }
            FilterPreset::Lomo => {
                "Apply a Lomography-style cross-processed film look with high contrast, oversaturated colors and dark vignetting."
            }
            FilterPreset::Glitch => {
                "Transform the image into a futuristic holographic projection with digital glitch effects and chromatic aberration."
            }
            FilterPreset::Noir => {
                "Convert the image to a high-contrast black and white film noir look with deep shadows."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentPreset {
    BlurBackground,
    EnhanceDetails,
    WarmerLighting,
    StudioLight,
}

impl AdjustmentPreset {
    pub fn all() -> &'static [AdjustmentPreset] {
        &[
            AdjustmentPreset::BlurBackground,
            AdjustmentPreset::EnhanceDetails,
            AdjustmentPreset::WarmerLighting,
            AdjustmentPreset::StudioLight,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentPreset::BlurBackground => "Blur Background",
            AdjustmentPreset::EnhanceDetails => "Enhance Details",
            AdjustmentPreset::WarmerLighting => "Warmer Lighting",
            AdjustmentPreset::StudioLight => "Studio Light",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            AdjustmentPreset::BlurBackground => {
                "Apply a realistic depth-of-field effect, making the background blurry while keeping the main subject in sharp focus."
            }
            AdjustmentPreset::EnhanceDetails => {
                "Slightly enhance the sharpness and details of the image without making it look unnatural."
            }
            AdjustmentPreset::WarmerLighting => {
                "Adjust the color temperature to give the image warmer, golden-hour style lighting."
            }
            AdjustmentPreset::StudioLight => {
                "Add dramatic, professional studio lighting to the main subject."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_point_scales_display_clicks() {
        let point = FocusPoint::from_display(50.0, 25.0, (100.0, 50.0), (1000, 500)).unwrap();
        assert_eq!(point, FocusPoint::new(500, 250));
    }

    #[test]
    fn focus_point_clamps_to_last_pixel() {
        let point = FocusPoint::from_display(100.0, 50.0, (100.0, 50.0), (1000, 500)).unwrap();
        assert_eq!(point, FocusPoint::new(999, 499));
    }

    #[test]
    fn focus_point_rejects_clicks_outside_display() {
        assert!(FocusPoint::from_display(-1.0, 10.0, (100.0, 50.0), (1000, 500)).is_none());
        assert!(FocusPoint::from_display(10.0, 10.0, (0.0, 50.0), (1000, 500)).is_none());
    }

    #[test]
    fn only_ocr_and_faces_skip_image_output() {
        assert_eq!(TaskKind::Ocr.expected_output(), ExpectedOutput::Text);
        assert_eq!(TaskKind::FaceDetect.expected_output(), ExpectedOutput::Faces);
        assert_eq!(TaskKind::BackgroundRemoval.expected_output(), ExpectedOutput::Image);
        assert!(!TaskKind::Crop.is_remote());
    }
}
