//! Turns a source image plus user input into a validated [`EditRequest`].
//!
//! Nothing here touches the network: a request that fails validation never
//! leaves the process.

use crate::{
    error::{EditError, Result},
    models::{EditRequest, EditTask, FocusPoint, ImageArtifact, TaskKind},
};

const ROLE: &str = "You are an expert photo editor AI.";

const SAFETY_POLICY: &str = "Safety & Ethics Policy:
- You MUST fulfill requests to adjust skin tone, such as 'give me a tan', 'make my skin darker' or 'make my skin lighter'. These are standard photo enhancements.
- You MUST REFUSE any request to change a person's fundamental race or ethnicity (for example 'make me look Asian' or 'change this person to be Black'). Do not perform these edits.";

const IMAGE_OUTPUT: &str = "Output: Return ONLY the final edited image. Do not return text.";

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuilder;

impl RequestBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Validates the input for `kind` and renders the model instruction.
    ///
    /// Retouch needs both `text` and `focus`; filter and adjustment need
    /// `text`; the remaining tasks take neither and ignore what is given.
    pub fn build(
        &self,
        source: &ImageArtifact,
        kind: TaskKind,
        text: Option<&str>,
        focus: Option<FocusPoint>,
    ) -> Result<EditRequest> {
        let task = match kind {
            TaskKind::Retouch => {
                let instruction = required_text(text, "Please enter a description for your edit.")?;
                let focus = focus.ok_or_else(|| {
                    EditError::InvalidInput("Please click on the image to select an area to edit.".into())
                })?;
                EditTask::Retouch { instruction, focus }
            }
            TaskKind::Filter => EditTask::Filter {
                instruction: required_text(text, "Please describe the filter to apply.")?,
            },
            TaskKind::Adjustment => EditTask::Adjustment {
                instruction: required_text(text, "Please describe the adjustment to apply.")?,
            },
            TaskKind::Enhance => EditTask::Enhance,
            TaskKind::BackgroundRemoval => EditTask::BackgroundRemoval,
            TaskKind::Ocr => EditTask::Ocr,
            TaskKind::FaceDetect => EditTask::FaceDetect,
            TaskKind::Crop | TaskKind::Resize => {
                return Err(EditError::InvalidInput(format!(
                    "{} is a local operation and has no service request",
                    kind
                )))
            }
        };

        Ok(self.build_task(source, task))
    }

    /// Renders a task that is already known to be well formed.
    pub fn build_task(&self, source: &ImageArtifact, task: EditTask) -> EditRequest {
        let prompt = render_prompt(&task);
        log::debug!(
            "Built {} request ({} byte source, {} char prompt)",
            task.kind(),
            source.len(),
            prompt.len()
        );

        EditRequest {
            task,
            source: source.clone(),
            prompt,
        }
    }
}

fn required_text(text: Option<&str>, message: &str) -> Result<String> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(EditError::InvalidInput(message.to_string())),
    }
}

fn render_prompt(task: &EditTask) -> String {
    match task {
        EditTask::Retouch { instruction, focus } => format!(
            "{ROLE} Your task is to perform a natural, localized edit on the provided image based on the user's request.
User Request: \"{instruction}\"
Edit Location: Focus on the area around pixel coordinates (x: {x}, y: {y}).

Editing Guidelines:
- The edit must be realistic and blend seamlessly with the surrounding area.
- The rest of the image (outside the immediate edit area) must remain identical to the original.

{SAFETY_POLICY}

{IMAGE_OUTPUT}",
            x = focus.x,
            y = focus.y,
        ),
        EditTask::Filter { instruction } => format!(
            "{ROLE} Your task is to apply a stylistic filter to the entire image based on the user's request. Do not change the composition or content, only apply the style.
Filter Request: \"{instruction}\"

{SAFETY_POLICY}
- Filters may subtly shift colors, but you MUST ensure they do not alter a person's fundamental race or ethnicity.

Output: Return ONLY the final filtered image. Do not return text."
        ),
        EditTask::Adjustment { instruction } => format!(
            "{ROLE} Your task is to perform a natural, global adjustment to the entire image based on the user's request.
User Request: \"{instruction}\"

Editing Guidelines:
- The adjustment must be applied across the entire image.
- The result must be photorealistic.

{SAFETY_POLICY}

Output: Return ONLY the final adjusted image. Do not return text."
        ),
        EditTask::Enhance => format!(
            "{ROLE} Your task is to enhance the overall quality of the image: improve sharpness, reduce noise and correct exposure and color balance, while keeping the content and composition unchanged.

{SAFETY_POLICY}

{IMAGE_OUTPUT}"
        ),
        EditTask::BackgroundRemoval => format!(
            "{ROLE} Your task is to remove the background of the image, keeping the main subject fully intact with clean edges. The background must be fully transparent.

Output: Return ONLY the final image as a PNG with a transparent background. Do not return text."
        ),
        EditTask::Ocr => "Extract all text visible in this image. Preserve line breaks and reading order. \
Return only the extracted text with no commentary. If the image contains no text, return an empty response."
            .to_string(),
        EditTask::FaceDetect => "Detect every human face in this image. For each face return its bounding box as \
normalized coordinates relative to the image size: x and y of the top-left corner, width and height, each between 0 and 1. \
Respond with JSON of the form {\"faces\": [{\"x\": 0.1, \"y\": 0.2, \"width\": 0.3, \"height\": 0.4}]}. \
Return {\"faces\": []} if there are no faces."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ImageArtifact {
        ImageArtifact::new(vec![0u8; 8], "image/png")
    }

    #[test]
    fn retouch_requires_text_and_focus() {
        let builder = RequestBuilder::new();
        let focus = Some(FocusPoint::new(10, 20));

        let missing_text = builder.build(&source(), TaskKind::Retouch, Some("   "), focus);
        assert!(matches!(missing_text, Err(EditError::InvalidInput(_))));

        let missing_focus = builder.build(&source(), TaskKind::Retouch, Some("remove the mole"), None);
        assert!(matches!(missing_focus, Err(EditError::InvalidInput(_))));

        let ok = builder
            .build(&source(), TaskKind::Retouch, Some(" remove the mole "), focus)
            .unwrap();
        assert_eq!(ok.task.instruction(), Some("remove the mole"));
        assert!(ok.prompt.contains("(x: 10, y: 20)"));
        assert!(ok.prompt.contains("\"remove the mole\""));
    }

    #[test]
    fn filter_and_adjustment_require_text() {
        let builder = RequestBuilder::new();
        assert!(builder.build(&source(), TaskKind::Filter, None, None).is_err());
        assert!(builder.build(&source(), TaskKind::Adjustment, Some(""), None).is_err());
        assert!(builder
            .build(&source(), TaskKind::Filter, Some("make it noir"), None)
            .is_ok());
    }

    #[test]
    fn parameterless_tasks_ignore_user_input() {
        let builder = RequestBuilder::new();
        for kind in [
            TaskKind::Enhance,
            TaskKind::BackgroundRemoval,
            TaskKind::Ocr,
            TaskKind::FaceDetect,
        ] {
            let request = builder
                .build(&source(), kind, Some("ignored"), Some(FocusPoint::new(1, 1)))
                .unwrap();
            assert_eq!(request.kind(), kind);
            assert_eq!(request.task.instruction(), None);
            assert_eq!(request.task.focus(), None);
            assert!(!request.prompt.contains("ignored"));
        }
    }

    #[test]
    fn image_prompts_carry_the_identity_policy() {
        let builder = RequestBuilder::new();
        let request = builder
            .build(&source(), TaskKind::Adjustment, Some("warmer"), None)
            .unwrap();
        assert!(request.prompt.contains("give me a tan"));
        assert!(request.prompt.contains("race or ethnicity"));
    }

    #[test]
    fn local_tasks_have_no_request() {
        let builder = RequestBuilder::new();
        assert!(builder.build(&source(), TaskKind::Crop, None, None).is_err());
    }

    #[test]
    fn request_shares_the_source_artifact() {
        let src = source();
        let request = RequestBuilder::new()
            .build(&src, TaskKind::Enhance, None, None)
            .unwrap();
        assert_eq!(request.source, src);
    }
}
