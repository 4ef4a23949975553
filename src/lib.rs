pub mod builder;
pub mod cancel;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod logger;
pub mod models;
pub mod service;
pub mod session;
pub mod transform;
pub mod validator;

pub use builder::RequestBuilder;
pub use cancel::CancelToken;
pub use config::{BedrockConfig, EditorConfig, GeminiConfig, ProviderKind};
pub use editor::{Editor, EditorState};
pub use error::{EditError, Result};
pub use history::History;
pub use models::*;
pub use service::ImageService;
#[cfg(feature = "bedrock")]
pub use service::BedrockClient;
#[cfg(feature = "gemini")]
pub use service::GeminiClient;
pub use session::{DataUrlSurface, DisplayHandle, DisplaySurface, EditSession};
pub use transform::{CropRect, ExportFormat, ResizeMode};
