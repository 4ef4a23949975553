use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    ProhibitedContent,
    Other(String),
}

impl FinishReason {
    /// Normalizes the finish / stop reason strings used by the supported
    /// providers (Gemini `finishReason`, Anthropic `stop_reason`).
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "STOP" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "MAX_TOKENS" | "max_tokens" => FinishReason::MaxTokens,
            "SAFETY" | "IMAGE_SAFETY" => FinishReason::Safety,
            "RECITATION" => FinishReason::Recitation,
            "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" => FinishReason::ProhibitedContent,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => f.write_str("STOP"),
            FinishReason::MaxTokens => f.write_str("MAX_TOKENS"),
            FinishReason::Safety => f.write_str("SAFETY"),
            FinishReason::Recitation => f.write_str("RECITATION"),
            FinishReason::ProhibitedContent => f.write_str("PROHIBITED_CONTENT"),
            FinishReason::Other(raw) => f.write_str(raw),
        }
    }
}

/// Prompt-level refusal reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFeedback {
    pub reason: String,
    pub message: Option<String>,
}

/// Image bytes as delivered by the service (still base64 encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponsePart {
    Image(InlineImage),
    Text(String),
}

/// Provider-neutral view of one service response. Transports translate
/// their wire format into this; the validator only ever sees this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub block: Option<BlockFeedback>,
    pub parts: Vec<ResponsePart>,
    pub finish_reason: Option<FinishReason>,
    /// Candidate-level safety ratings flagged as blocked. Informational only.
    pub safety_flags: Vec<String>,
}

impl ServiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        self.parts.push(ResponsePart::Image(InlineImage {
            mime_type: mime_type.into(),
            data: base64_data.into(),
        }));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ResponsePart::Text(text.into()));
        self
    }

    pub fn with_block(mut self, reason: impl Into<String>, message: Option<String>) -> Self {
        self.block = Some(BlockFeedback {
            reason: reason.into(),
            message,
        });
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub fn with_safety_flag(mut self, category: impl Into<String>) -> Self {
        self.safety_flags.push(category.into());
        self
    }

    pub fn first_image(&self) -> Option<&InlineImage> {
        self.parts.iter().find_map(|part| match part {
            ResponsePart::Image(image) => Some(image),
            ResponsePart::Text(_) => None,
        })
    }

    /// All text parts joined together, or `None` when there are none.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::Text(text) => Some(text.as_str()),
                ResponsePart::Image(_) => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reasons_from_both_providers() {
        assert!(FinishReason::from_wire("STOP").is_normal());
        assert!(FinishReason::from_wire("end_turn").is_normal());
        assert_eq!(FinishReason::from_wire("max_tokens"), FinishReason::MaxTokens);
        assert_eq!(
            FinishReason::from_wire("NEW_THING"),
            FinishReason::Other("NEW_THING".into())
        );
        assert_eq!(FinishReason::from_wire("IMAGE_SAFETY").to_string(), "SAFETY");
    }

    #[test]
    fn text_concatenates_parts_in_order() {
        let response = ServiceResponse::new()
            .with_text("Hello, ")
            .with_image("image/png", "AAAA")
            .with_text("world");
        assert_eq!(response.text().as_deref(), Some("Hello, world"));
        assert_eq!(response.first_image().unwrap().mime_type, "image/png");
        assert_eq!(ServiceResponse::new().text(), None);
    }
}
