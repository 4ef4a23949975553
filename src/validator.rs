//! Interpretation of [`ServiceResponse`]s.
//!
//! Image responses are classified into a [`Verdict`] first and then mapped
//! to a result, so the precedence between the rules lives in one `match`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::{
    error::{EditError, Result},
    models::{
        BlockFeedback, BoundingBox, ExpectedOutput, FinishReason, ImageArtifact, InlineImage,
        OperationResult, ServiceResponse,
    },
};

/// Classification of a response to an image-producing task.
#[derive(Debug, PartialEq)]
pub enum Verdict<'a> {
    Blocked(&'a BlockFeedback),
    Image(&'a InlineImage),
    Stopped(&'a FinishReason),
    NoImage(Option<String>),
}

impl<'a> Verdict<'a> {
    /// First matching rule wins: block, image, abnormal finish, nothing.
    pub fn classify(response: &'a ServiceResponse) -> Self {
        match (
            response.block.as_ref(),
            response.first_image(),
            response.finish_reason.as_ref(),
        ) {
            (Some(block), _, _) => Verdict::Blocked(block),
            (None, Some(image), _) => Verdict::Image(image),
            (None, None, Some(reason)) if !reason.is_normal() => Verdict::Stopped(reason),
            (None, None, _) => Verdict::NoImage(response.text()),
        }
    }
}

/// Dispatches on the output kind expected by the task.
pub fn interpret(
    response: &ServiceResponse,
    expected: ExpectedOutput,
    context: &str,
) -> Result<OperationResult> {
    match expected {
        ExpectedOutput::Image => interpret_image(response, context).map(OperationResult::Image),
        ExpectedOutput::Text => interpret_text(response, context).map(OperationResult::Text),
        ExpectedOutput::Faces => interpret_faces(response, context).map(OperationResult::Faces),
    }
}

pub fn interpret_image(response: &ServiceResponse, context: &str) -> Result<ImageArtifact> {
    log::debug!("Interpreting {} response: {} part(s)", context, response.parts.len());

    match Verdict::classify(response) {
        Verdict::Blocked(block) => Err(blocked(block, context)),
        Verdict::Image(image) => {
            if !response.safety_flags.is_empty() {
                log::warn!(
                    "{}: image returned despite safety flags {:?}",
                    context,
                    response.safety_flags
                );
            }
            let data = STANDARD.decode(image.data.trim()).map_err(|e| {
                EditError::InvalidFormat(format!("{}: image payload is not valid base64: {}", context, e))
            })?;
            log::info!("{}: received {} ({} bytes)", context, image.mime_type, data.len());
            Ok(ImageArtifact::new(data, image.mime_type.clone()))
        }
        Verdict::Stopped(reason) => {
            log::warn!("{}: generation stopped unexpectedly ({})", context, reason);
            Err(EditError::StoppedUnexpectedly(reason.clone()))
        }
        Verdict::NoImage(commentary) => {
            log::warn!(
                "{}: model returned no image{}",
                context,
                if commentary.is_some() { " (text only)" } else { "" }
            );
            Err(EditError::NoImageReturned { commentary })
        }
    }
}

/// OCR: the raw text content, unmodified.
pub fn interpret_text(response: &ServiceResponse, context: &str) -> Result<String> {
    if let Some(block) = &response.block {
        return Err(blocked(block, context));
    }

    match (response.text(), response.finish_reason.as_ref()) {
        (Some(text), _) => Ok(text),
        (None, Some(reason)) if !reason.is_normal() => {
            log::warn!("{}: no text, finish reason {}", context, reason);
            Err(EditError::StoppedUnexpectedly(reason.clone()))
        }
        (None, _) => Ok(String::new()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FacePayload {
    Wrapped { faces: Vec<BoundingBox> },
    Bare(Vec<BoundingBox>),
}

/// Face detection: parses the structured face list and keeps only boxes
/// whose coordinates all lie in `[0, 1]`.
pub fn interpret_faces(response: &ServiceResponse, context: &str) -> Result<Vec<BoundingBox>> {
    if let Some(block) = &response.block {
        return Err(blocked(block, context));
    }

    let text = match (response.text(), response.finish_reason.as_ref()) {
        (Some(text), _) => text,
        (None, Some(reason)) if !reason.is_normal() => {
            return Err(EditError::StoppedUnexpectedly(reason.clone()))
        }
        (None, _) => {
            return Err(EditError::InvalidFormat(format!(
                "{}: response contained no structured output",
                context
            )))
        }
    };

    let payload: FacePayload = serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
        EditError::InvalidFormat(format!("{}: could not parse face list: {}", context, e))
    })?;
    let faces = match payload {
        FacePayload::Wrapped { faces } | FacePayload::Bare(faces) => faces,
    };

    let total = faces.len();
    let valid: Vec<BoundingBox> = faces.into_iter().filter(BoundingBox::is_normalized).collect();
    if valid.len() != total {
        log::warn!(
            "{}: dropped {} face(s) with coordinates outside [0, 1]",
            context,
            total - valid.len()
        );
    }
    log::info!("{}: detected {} face(s)", context, valid.len());
    Ok(valid)
}

fn blocked(block: &BlockFeedback, context: &str) -> EditError {
    log::warn!("{}: request blocked ({})", context, block.reason);
    EditError::Blocked {
        reason: block.reason.clone(),
        message: block.message.clone(),
    }
}

/// Models sometimes wrap JSON in a markdown fence even when asked not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_B64: &str = "iVBORw0KGgo=";

    #[test]
    fn block_wins_over_accompanying_text() {
        let response = ServiceResponse::new()
            .with_block("SAFETY", Some("Prompt rejected".into()))
            .with_text("I cannot help with that");
        match interpret_image(&response, "retouch") {
            Err(EditError::Blocked { reason, message }) => {
                assert_eq!(reason, "SAFETY");
                assert_eq!(message.as_deref(), Some("Prompt rejected"));
            }
            other => panic!("expected Blocked, got {:?}", other),
        }
    }

    #[test]
    fn image_wins_over_abnormal_finish_and_safety_flags() {
        let response = ServiceResponse::new()
            .with_text("Here you go")
            .with_image("image/png", PNG_B64)
            .with_finish_reason(FinishReason::Safety)
            .with_safety_flag("HARM_CATEGORY_DANGEROUS_CONTENT");
        let artifact = interpret_image(&response, "filter").unwrap();
        assert_eq!(artifact.mime_type(), "image/png");
        assert_eq!(&artifact.data()[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn abnormal_finish_without_image_is_a_stop() {
        let response = ServiceResponse::new().with_finish_reason(FinishReason::MaxTokens);
        assert!(matches!(
            interpret_image(&response, "enhance"),
            Err(EditError::StoppedUnexpectedly(FinishReason::MaxTokens))
        ));
    }

    #[test]
    fn text_only_response_carries_commentary() {
        let response = ServiceResponse::new()
            .with_text("I'd rather describe it")
            .with_finish_reason(FinishReason::Stop);
        match interpret_image(&response, "adjustment") {
            Err(EditError::NoImageReturned { commentary }) => {
                assert_eq!(commentary.as_deref(), Some("I'd rather describe it"));
            }
            other => panic!("expected NoImageReturned, got {:?}", other),
        }
        assert!(matches!(
            interpret_image(&ServiceResponse::new(), "adjustment"),
            Err(EditError::NoImageReturned { commentary: None })
        ));
    }

    #[test]
    fn undecodable_image_is_invalid_format() {
        let response = ServiceResponse::new().with_image("image/png", "not base64!!");
        assert!(matches!(
            interpret_image(&response, "retouch"),
            Err(EditError::InvalidFormat(_))
        ));
    }

    #[test]
    fn ocr_returns_raw_text() {
        let response = ServiceResponse::new().with_text("Line one\nLine two\n");
        assert_eq!(interpret_text(&response, "ocr").unwrap(), "Line one\nLine two\n");
        assert_eq!(interpret_text(&ServiceResponse::new(), "ocr").unwrap(), "");
    }

    #[test]
    fn ocr_respects_block() {
        let response = ServiceResponse::new().with_block("OTHER", None).with_text("x");
        assert!(matches!(
            interpret_text(&response, "ocr"),
            Err(EditError::Blocked { .. })
        ));
    }

    #[test]
    fn out_of_range_faces_are_dropped() {
        let response = ServiceResponse::new().with_text(
            r#"{"faces":[{"x":0.1,"y":0.1,"w":0.2,"h":0.2},{"x":1.5,"y":0.1,"w":0.1,"h":0.1}]}"#,
        );
        let faces = interpret_faces(&response, "face-detect").unwrap();
        assert_eq!(faces, vec![BoundingBox::new(0.1, 0.1, 0.2, 0.2)]);
    }

    #[test]
    fn bare_and_fenced_face_lists_parse() {
        let bare = ServiceResponse::new()
            .with_text(r#"[{"x":0.0,"y":0.0,"width":1.0,"height":1.0}]"#);
        assert_eq!(interpret_faces(&bare, "face-detect").unwrap().len(), 1);

        let fenced = ServiceResponse::new().with_text("```json\n{\"faces\": []}\n```");
        assert!(interpret_faces(&fenced, "face-detect").unwrap().is_empty());
    }

    #[test]
    fn malformed_face_output_is_an_error_not_an_empty_list() {
        for text in ["faces: none", r#"{"faces":[{"x":"left"}]}"#, ""] {
            let response = ServiceResponse::new().with_text(text);
            assert!(matches!(
                interpret_faces(&response, "face-detect"),
                Err(EditError::InvalidFormat(_))
            ));
        }
        assert!(matches!(
            interpret_faces(&ServiceResponse::new(), "face-detect"),
            Err(EditError::InvalidFormat(_))
        ));
    }

    #[test]
    fn interpret_dispatches_on_expected_output() {
        let response = ServiceResponse::new().with_text("hello");
        assert_eq!(
            interpret(&response, ExpectedOutput::Text, "ocr").unwrap(),
            OperationResult::Text("hello".into())
        );
        assert!(interpret(&response, ExpectedOutput::Image, "enhance").is_err());

        let text = interpret(&response, ExpectedOutput::Text, "ocr").unwrap();
        assert_eq!(text.as_text(), Some("hello"));
        assert!(text.as_image().is_none());

        let image = interpret(
            &ServiceResponse::new().with_image("image/png", "AQID"),
            ExpectedOutput::Image,
            "enhance",
        )
        .unwrap();
        assert_eq!(image.as_image().map(|a| a.data().to_vec()), Some(vec![1, 2, 3]));
        assert!(image.as_faces().is_none());

        let faces = interpret(
            &ServiceResponse::new().with_text(r#"[{"x":0.1,"y":0.2,"width":0.3,"height":0.3}]"#),
            ExpectedOutput::Faces,
            "faces",
        )
        .unwrap();
        assert_eq!(faces.as_faces().map(<[BoundingBox]>::len), Some(1));
        assert!(faces.as_text().is_none());
    }
}
