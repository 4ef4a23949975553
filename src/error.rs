use std::time::Duration;

use thiserror::Error;

use crate::models::FinishReason;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request was blocked ({reason}){}", detail_suffix(.message))]
    Blocked {
        reason: String,
        message: Option<String>,
    },

    #[error("Generation stopped unexpectedly: {0}")]
    StoppedUnexpectedly(FinishReason),

    #[error("The model did not return an image")]
    NoImageReturned { commentary: Option<String> },

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Network or service failure: {0}")]
    NetworkOrServiceFailure(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Image transform error: {0}")]
    Transform(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EditError {
    /// Message suitable for showing to the person using the editor.
    pub fn user_message(&self) -> String {
        match self {
            EditError::InvalidInput(msg) => msg.clone(),
            EditError::Blocked { reason, message } => match message {
                Some(message) => format!("Your request was blocked. Reason: {}. {}", reason, message),
                None => format!("Your request was blocked. Reason: {}.", reason),
            },
            EditError::StoppedUnexpectedly(reason) => format!(
                "Image generation stopped unexpectedly (reason: {}). This is often related to safety settings.",
                reason
            ),
            EditError::NoImageReturned { commentary } => match commentary {
                Some(text) => format!("The AI model did not return an image. The model responded with: \"{}\"", text),
                None => "The AI model did not return an image. Try rephrasing your request to be more direct.".to_string(),
            },
            EditError::InvalidFormat(_) => {
                "The AI model returned a response that could not be understood. Please try again.".to_string()
            }
            EditError::NetworkOrServiceFailure(msg) => {
                format!("Could not reach the AI service: {}", msg)
            }
            other => other.to_string(),
        }
    }

    /// True for failures raised before any network call was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            EditError::InvalidInput(_) | EditError::Busy | EditError::Transform(_) | EditError::Config(_)
        )
    }
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, EditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_display_includes_message() {
        let err = EditError::Blocked {
            reason: "SAFETY".into(),
            message: Some("policy".into()),
        };
        assert_eq!(err.to_string(), "Request was blocked (SAFETY): policy");

        let bare = EditError::Blocked {
            reason: "OTHER".into(),
            message: None,
        };
        assert_eq!(bare.to_string(), "Request was blocked (OTHER)");
    }

    #[test]
    fn no_image_message_surfaces_commentary() {
        let err = EditError::NoImageReturned {
            commentary: Some("I can't do that".into()),
        };
        assert!(err.user_message().contains("I can't do that"));
    }

    #[test]
    fn local_errors_are_flagged() {
        assert!(EditError::InvalidInput("x".into()).is_local());
        assert!(EditError::Busy.is_local());
        assert!(!EditError::Cancelled.is_local());
        assert!(!EditError::NetworkOrServiceFailure("down".into()).is_local());
    }
}
