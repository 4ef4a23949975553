use crate::{
    config::BedrockConfig,
    error::{EditError, Result},
    models::{EditRequest, EditTask, ExpectedOutput, FinishReason, ServiceResponse},
    service::ImageService,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::{error::ProvideErrorMetadata, primitives::Blob, Client};
use serde::Deserialize;
use serde_json::json;

/// Nova Canvas caps the variation prompt length.
const MAX_IMAGE_PROMPT_CHARS: usize = 1024;

/// Image tasks go to an image model (Nova Canvas / Titan request shape),
/// text and face tasks to an Anthropic messages model.
#[derive(Clone)]
pub struct BedrockClient {
    client: Client,
    config: BedrockConfig,
}

impl BedrockClient {
    pub async fn new(bedrock_config: BedrockConfig) -> Result<Self> {
        let aws_config = if let (Some(access_key), Some(secret_key)) =
            (&bedrock_config.access_key, &bedrock_config.secret_key)
        {
            aws_config::defaults(BehaviorVersion::latest())
                .credentials_provider(aws_sdk_bedrockruntime::config::Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "rgenedit",
                ))
                .region(aws_sdk_bedrockruntime::config::Region::new(
                    bedrock_config
                        .region
                        .clone()
                        .unwrap_or_else(|| "us-east-1".to_string()),
                ))
                .load()
                .await
        } else {
            aws_config::load_defaults(BehaviorVersion::latest()).await
        };

        Ok(Self {
            client: Client::new(&aws_config),
            config: bedrock_config,
        })
    }

    pub fn supported_models() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("amazon.nova-canvas-v1:0", "Nova Canvas", "Amazon"),
            ("amazon.titan-image-generator-v2:0", "Titan Image Generator G1 v2", "Amazon"),
            ("anthropic.claude-3-haiku-20240307-v1:0", "Claude 3 Haiku", "Anthropic"),
            ("anthropic.claude-3-5-sonnet-20240620-v1:0", "Claude 3.5 Sonnet", "Anthropic"),
        ]
    }

    fn model_for(&self, expected: ExpectedOutput) -> &str {
        match expected {
            ExpectedOutput::Image => &self.config.image_model_id,
            ExpectedOutput::Text | ExpectedOutput::Faces => &self.config.text_model_id,
        }
    }

    pub(crate) fn build_payload(request: &EditRequest) -> serde_json::Value {
        let image = request.source.to_base64();

        match (&request.task, request.expected_output()) {
            (EditTask::BackgroundRemoval, _) => json!({
                "taskType": "BACKGROUND_REMOVAL",
                "backgroundRemovalParams": { "image": image }
            }),
            (_, ExpectedOutput::Image) => json!({
                "taskType": "IMAGE_VARIATION",
                "imageVariationParams": {
                    "text": truncate_chars(&request.prompt, MAX_IMAGE_PROMPT_CHARS),
                    "images": [image],
                    "similarityStrength": 0.8
                },
                "imageGenerationConfig": {
                    "numberOfImages": 1,
                    "quality": "standard",
                    "cfgScale": 8.0
                }
            }),
            (_, ExpectedOutput::Text | ExpectedOutput::Faces) => json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 4096,
                "temperature": 0.0,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": request.source.mime_type(),
                                "data": image
                            }
                        },
                        { "type": "text", "text": request.prompt }
                    ]
                }]
            }),
        }
    }

    /// Translates a successful model invocation body.
    pub(crate) fn parse_body(expected: ExpectedOutput, body: &str) -> Result<ServiceResponse> {
        match expected {
            ExpectedOutput::Image => {
                let wire: CanvasResponse = serde_json::from_str(body)
                    .map_err(|e| EditError::InvalidFormat(format!("Unreadable image model response: {}", e)))?;
                let mut response = ServiceResponse::new();
                if wire.images.is_empty() {
                    let finish = match wire.error {
                        Some(error) => {
                            response = response.with_block("CONTENT_FILTERED", Some(error));
                            FinishReason::Other("CONTENT_FILTERED".to_string())
                        }
                        None => FinishReason::Other("NO_IMAGES".to_string()),
                    };
                    return Ok(response.with_finish_reason(finish));
                }
                for image in wire.images {
                    response = response.with_image("image/png", image);
                }
                Ok(response.with_finish_reason(FinishReason::Stop))
            }
            ExpectedOutput::Text | ExpectedOutput::Faces => {
                let wire: MessagesResponse = serde_json::from_str(body)
                    .map_err(|e| EditError::InvalidFormat(format!("Unreadable messages response: {}", e)))?;
                let mut response = ServiceResponse::new();
                for block in wire.content {
                    if block.kind == "text" {
                        if let Some(text) = block.text {
                            response = response.with_text(text);
                        }
                    }
                }
                if let Some(reason) = wire.stop_reason {
                    response = response.with_finish_reason(FinishReason::from_wire(&reason));
                }
                Ok(response)
            }
        }
    }
}

#[async_trait]
impl ImageService for BedrockClient {
    async fn invoke(&self, request: &EditRequest) -> Result<ServiceResponse> {
        let expected = request.expected_output();
        let model_id = self.model_for(expected);
        let request_json = serde_json::to_string(&Self::build_payload(request))
            .map_err(|e| EditError::InvalidInput(format!("Failed to serialize request: {}", e)))?;

        log::info!("Invoking model: {} for {} task", model_id, request.kind());
        log::debug!("Request payload size: {} bytes", request_json.len());

        let output = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request_json.into_bytes()))
            .send()
            .await;

        let response = match output {
            Ok(response) => response,
            Err(e) => {
                log::error!("AWS SDK image edit error details: {:?}", e);

                if let Some(service_error) = e.as_service_error() {
                    let message = service_error.message().unwrap_or("no message").to_string();
                    // Content moderation surfaces as a validation error, not a body field.
                    if message.contains("content filters") {
                        return Ok(ServiceResponse::new().with_block("CONTENT_FILTERED", Some(message)));
                    }
                    return Err(EditError::NetworkOrServiceFailure(format!(
                        "Bedrock service error: {} - {}",
                        service_error.code().unwrap_or("unknown"),
                        message
                    )));
                }
                return Err(EditError::NetworkOrServiceFailure(format!("AWS SDK error: {}", e)));
            }
        };

        let response_bytes = response.body.into_inner();
        let body = String::from_utf8(response_bytes)
            .map_err(|e| EditError::InvalidFormat(e.to_string()))?;

        Self::parse_body(expected, &body)
    }

    fn name(&self) -> &str {
        "bedrock"
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[derive(Deserialize)]
struct CanvasResponse {
    #[serde(default)]
    images: Vec<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RequestBuilder;
    use crate::models::{FocusPoint, ImageArtifact, TaskKind};

    fn request(kind: TaskKind, text: Option<&str>) -> EditRequest {
        let source = ImageArtifact::new(vec![7u8; 4], "image/png");
        RequestBuilder::new()
            .build(&source, kind, text, Some(FocusPoint::new(3, 4)))
            .unwrap()
    }

    #[test]
    fn background_removal_uses_dedicated_task() {
        let payload = BedrockClient::build_payload(&request(TaskKind::BackgroundRemoval, None));
        assert_eq!(payload["taskType"], "BACKGROUND_REMOVAL");
    }

    #[test]
    fn image_prompts_are_truncated() {
        let payload = BedrockClient::build_payload(&request(TaskKind::Retouch, Some("brighten the eyes")));
        assert_eq!(payload["taskType"], "IMAGE_VARIATION");
        let text = payload["imageVariationParams"]["text"].as_str().unwrap();
        assert!(text.chars().count() <= MAX_IMAGE_PROMPT_CHARS);
    }

    #[test]
    fn text_tasks_use_messages_with_image_block() {
        let payload = BedrockClient::build_payload(&request(TaskKind::Ocr, None));
        assert_eq!(payload["messages"][0]["content"][0]["type"], "image");
        assert_eq!(
            payload["messages"][0]["content"][0]["source"]["media_type"],
            "image/png"
        );
    }

    #[test]
    fn filtered_canvas_response_becomes_a_block() {
        let response = BedrockClient::parse_body(
            ExpectedOutput::Image,
            r#"{"images": [], "error": "blocked by content filters"}"#,
        )
        .unwrap();
        assert_eq!(response.block.unwrap().reason, "CONTENT_FILTERED");
        assert!(!response.finish_reason.unwrap().is_normal());
    }

    #[test]
    fn empty_canvas_response_is_not_a_normal_stop() {
        let response = BedrockClient::parse_body(ExpectedOutput::Image, r#"{"images": []}"#).unwrap();
        assert!(response.block.is_none());
        assert_eq!(
            response.finish_reason,
            Some(FinishReason::Other("NO_IMAGES".to_string()))
        );
        assert!(matches!(
            crate::validator::interpret_image(&response, "background removal"),
            Err(EditError::StoppedUnexpectedly(_))
        ));

        let ok = BedrockClient::parse_body(ExpectedOutput::Image, r#"{"images": ["AQID"]}"#).unwrap();
        assert_eq!(ok.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn messages_response_maps_text_and_stop_reason() {
        let response = BedrockClient::parse_body(
            ExpectedOutput::Text,
            r#"{"content": [{"type": "text", "text": "EXIT"}], "stop_reason": "max_tokens"}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("EXIT"));
        assert_eq!(response.finish_reason, Some(FinishReason::MaxTokens));
    }
}
