use crate::{
    config::GeminiConfig,
    error::{EditError, Result},
    models::{EditRequest, ExpectedOutput, FinishReason, ServiceResponse},
    service::ImageService,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// `generateContent` over the Generative Language REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(EditError::Config("Gemini API key is not set".into()));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| EditError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn supported_models() -> Vec<(&'static str, &'static str)> {
        vec![
            ("gemini-2.5-flash-image-preview", "image editing"),
            ("gemini-2.5-flash", "text extraction and face detection"),
        ]
    }

    fn model_for(&self, expected: ExpectedOutput) -> &str {
        match expected {
            ExpectedOutput::Image => &self.config.image_model,
            ExpectedOutput::Text | ExpectedOutput::Faces => &self.config.text_model,
        }
    }

    pub(crate) fn build_payload(request: &EditRequest) -> serde_json::Value {
        let generation_config = match request.expected_output() {
            ExpectedOutput::Image => json!({ "responseModalities": ["IMAGE", "TEXT"] }),
            ExpectedOutput::Text => json!({ "temperature": 0.0 }),
            ExpectedOutput::Faces => json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "faces": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "x": { "type": "NUMBER" },
                                    "y": { "type": "NUMBER" },
                                    "width": { "type": "NUMBER" },
                                    "height": { "type": "NUMBER" }
                                },
                                "required": ["x", "y", "width", "height"]
                            }
                        }
                    },
                    "required": ["faces"]
                }
            }),
        };

        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": request.source.mime_type(),
                            "data": request.source.to_base64()
                        }
                    },
                    { "text": request.prompt }
                ]
            }],
            "generationConfig": generation_config
        })
    }
}

#[async_trait]
impl ImageService for GeminiClient {
    async fn invoke(&self, request: &EditRequest) -> Result<ServiceResponse> {
        let model = self.model_for(request.expected_output());
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let payload = Self::build_payload(request);

        log::info!("Invoking {} for {} task", model, request.kind());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                log::error!("Gemini transport error: {:?}", e);
                EditError::NetworkOrServiceFailure(format!("Request to {} failed: {}", model, e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EditError::NetworkOrServiceFailure(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            log::error!("Gemini service error {}: {}", status, message);
            return Err(EditError::NetworkOrServiceFailure(format!(
                "{} returned {}: {}",
                model, status, message
            )));
        }

        let wire: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| EditError::InvalidFormat(format!("Unreadable Gemini response: {}", e)))?;
        Ok(wire.into_service_response())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    text: Option<String>,
    inline_data: Option<WireBlob>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SafetyRating {
    category: String,
    #[serde(default)]
    blocked: bool,
}

impl GenerateContentResponse {
    fn into_service_response(self) -> ServiceResponse {
        let mut response = ServiceResponse::new();

        if let Some(reason) = self.prompt_feedback.and_then(|feedback| {
            feedback
                .block_reason
                .map(|reason| (reason, feedback.block_reason_message))
        }) {
            response = response.with_block(reason.0, reason.1);
        }

        // Only the first candidate is ever requested.
        if let Some(candidate) = self.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for part in content.parts.into_iter().filter(|p| !p.thought) {
                    if let Some(blob) = part.inline_data {
                        response = response.with_image(blob.mime_type, blob.data);
                    } else if let Some(text) = part.text {
                        response = response.with_text(text);
                    }
                }
            }
            if let Some(reason) = candidate.finish_reason {
                response = response.with_finish_reason(FinishReason::from_wire(&reason));
            }
            for rating in candidate.safety_ratings.into_iter().filter(|r| r.blocked) {
                response = response.with_safety_flag(rating.category);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RequestBuilder;
    use crate::models::{ImageArtifact, ResponsePart, TaskKind};

    fn parse(body: &str) -> ServiceResponse {
        serde_json::from_str::<GenerateContentResponse>(body)
            .unwrap()
            .into_service_response()
    }

    #[test]
    fn maps_image_and_text_parts() {
        let response = parse(
            r#"{
                "candidates": [{
                    "content": {"parts": [
                        {"text": "Here is your image"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]},
                    "finishReason": "STOP"
                }]
            }"#,
        );
        assert_eq!(response.parts.len(), 2);
        assert!(matches!(&response.parts[1], ResponsePart::Image(img) if img.mime_type == "image/png"));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert!(response.block.is_none());
    }

    #[test]
    fn maps_prompt_feedback_block() {
        let response = parse(
            r#"{"promptFeedback": {"blockReason": "SAFETY", "blockReasonMessage": "nope"}}"#,
        );
        let block = response.block.unwrap();
        assert_eq!(block.reason, "SAFETY");
        assert_eq!(block.message.as_deref(), Some("nope"));
        assert!(response.parts.is_empty());
    }

    #[test]
    fn collects_blocked_safety_ratings_and_skips_thoughts() {
        let response = parse(
            r#"{"candidates": [{
                "content": {"parts": [{"text": "thinking...", "thought": true}, {"text": "done"}]},
                "finishReason": "IMAGE_SAFETY",
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "LOW"},
                    {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "probability": "HIGH", "blocked": true}
                ]
            }]}"#,
        );
        assert_eq!(response.text().as_deref(), Some("done"));
        assert_eq!(response.safety_flags, vec!["HARM_CATEGORY_DANGEROUS_CONTENT".to_string()]);
        assert_eq!(response.finish_reason, Some(FinishReason::Safety));
    }

    #[test]
    fn face_requests_ask_for_json() {
        let source = ImageArtifact::new(vec![1, 2, 3], "image/jpeg");
        let request = RequestBuilder::new()
            .build(&source, TaskKind::FaceDetect, None, None)
            .unwrap();
        let payload = GeminiClient::build_payload(&request);
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            payload["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(payload["contents"][0]["parts"][0]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = GeminiConfig::new();
        assert!(matches!(GeminiClient::new(config), Err(EditError::Config(_))));
    }
}
