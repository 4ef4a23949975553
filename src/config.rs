use std::env;
use std::time::Duration;

use crate::error::{EditError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Bedrock,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "bedrock" | "aws" => Some(ProviderKind::Bedrock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub text_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_model: "gemini-2.5-flash-image-preview".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.is_empty());

        GeminiConfig {
            api_key,
            base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            image_model: env::var("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: env::var("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(mut self, image_model: impl Into<String>, text_model: impl Into<String>) -> Self {
        self.image_model = image_model.into();
        self.text_model = text_model.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub image_model_id: String,
    pub text_model_id: String,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        BedrockConfig {
            region: None,
            access_key: None,
            secret_key: None,
            image_model_id: "amazon.nova-canvas-v1:0".to_string(),
            text_model_id: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
        }
    }
}

impl BedrockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        BedrockConfig {
            region: env::var("AWS_REGION")
                .or_else(|_| env::var("AWS_DEFAULT_REGION"))
                .ok(),
            access_key: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            image_model_id: env::var("BEDROCK_IMAGE_MODEL").unwrap_or(defaults.image_model_id),
            text_model_id: env::var("BEDROCK_TEXT_MODEL").unwrap_or(defaults.text_model_id),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_models(mut self, image_model_id: impl Into<String>, text_model_id: impl Into<String>) -> Self {
        self.image_model_id = image_model_id.into();
        self.text_model_id = text_model_id.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub provider: ProviderKind,
    pub gemini: Option<GeminiConfig>,
    pub bedrock: Option<BedrockConfig>,
    /// Upper bound on a single service call.
    pub request_timeout: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            provider: ProviderKind::Gemini,
            gemini: None,
            bedrock: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let provider = env::var("EDITOR_PROVIDER")
            .ok()
            .and_then(|val| ProviderKind::parse(&val))
            .unwrap_or(ProviderKind::Gemini);
        let request_timeout = env::var("EDITOR_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let (gemini, bedrock) = match provider {
            ProviderKind::Gemini => (Some(GeminiConfig::from_env()), None),
            ProviderKind::Bedrock => (None, Some(BedrockConfig::from_env())),
        };

        EditorConfig {
            provider,
            gemini,
            bedrock,
            request_timeout,
        }
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = Some(config);
        self.provider = ProviderKind::Gemini;
        self
    }

    pub fn with_bedrock(mut self, config: BedrockConfig) -> Self {
        self.bedrock = Some(config);
        self.provider = ProviderKind::Bedrock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(EditError::Config("Request timeout must be greater than zero".into()));
        }

        match self.provider {
            ProviderKind::Gemini => {
                let gemini = self
                    .gemini
                    .as_ref()
                    .ok_or_else(|| EditError::Config("Gemini config required".into()))?;
                if gemini.api_key.as_deref().map_or(true, str::is_empty) {
                    return Err(EditError::Config(
                        "GEMINI_API_KEY is not set".into(),
                    ));
                }
            }
            ProviderKind::Bedrock => {
                // Credentials may come from the default provider chain.
                if let Some(bedrock) = &self.bedrock {
                    if bedrock.access_key.is_some() != bedrock.secret_key.is_some() {
                        return Err(EditError::Config(
                            "AWS access key and secret key must be set together".into(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse() {
        assert_eq!(ProviderKind::parse(" Gemini "), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::parse("aws"), Some(ProviderKind::Bedrock));
        assert_eq!(ProviderKind::parse("openai"), None);
    }

    #[test]
    fn gemini_requires_api_key() {
        let config = EditorConfig::new().with_gemini(GeminiConfig::new());
        assert!(matches!(config.validate(), Err(EditError::Config(_))));

        let config = EditorConfig::new().with_gemini(GeminiConfig::new().with_api_key("k"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bedrock_rejects_half_credentials() {
        let mut bedrock = BedrockConfig::new();
        bedrock.access_key = Some("AKIA".into());
        let config = EditorConfig::new().with_bedrock(bedrock);
        assert!(config.validate().is_err());

        let config = EditorConfig::new().with_bedrock(BedrockConfig::new().with_region("eu-west-1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = EditorConfig::new()
            .with_gemini(GeminiConfig::new().with_api_key("k"))
            .with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
