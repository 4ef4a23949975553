#[cfg(feature = "bedrock")]
pub mod bedrock;
#[cfg(feature = "gemini")]
pub mod gemini;

use crate::{
    config::{EditorConfig, ProviderKind},
    error::{EditError, Result},
    models::{EditRequest, ServiceResponse},
};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "bedrock")]
pub use bedrock::BedrockClient;
#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;

/// The generative image model, seen only through its request/response
/// contract. Implementations own the wire format; they must not interpret
/// the response beyond translating it into a [`ServiceResponse`].
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn invoke(&self, request: &EditRequest) -> Result<ServiceResponse>;

    fn name(&self) -> &str;
}

/// Builds the transport selected by `config.provider`.
pub async fn connect(config: &EditorConfig) -> Result<Arc<dyn ImageService>> {
    config.validate()?;

    let service: Arc<dyn ImageService> = match config.provider {
        ProviderKind::Gemini => {
            #[cfg(feature = "gemini")]
            {
                let gemini = config
                    .gemini
                    .clone()
                    .ok_or_else(|| EditError::Config("Gemini config required".into()))?;
                Arc::new(GeminiClient::new(gemini)?)
            }
            #[cfg(not(feature = "gemini"))]
            {
                return Err(EditError::Config("Gemini feature not enabled".into()));
            }
        }
        ProviderKind::Bedrock => {
            #[cfg(feature = "bedrock")]
            {
                let bedrock = config.bedrock.clone().unwrap_or_default();
                Arc::new(BedrockClient::new(bedrock).await?)
            }
            #[cfg(not(feature = "bedrock"))]
            {
                return Err(EditError::Config("Bedrock feature not enabled".into()));
            }
        }
    };

    log::info!("Connected image service: {}", service.name());
    Ok(service)
}
