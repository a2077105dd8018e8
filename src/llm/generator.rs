use std::future::Future;

use crate::llm::media::{GeneratedImage, InlineImage};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Gemini API key is not configured. Set GEMINI_API_KEY in the environment or .env file.")]
    MissingApiKey,
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini request failed with status {status}: {detail}")]
    Service { status: u16, detail: String },
    #[error("No image generated by {model}. API response: {commentary}")]
    NoImage { model: String, commentary: String },
    #[error("Invalid image data: {0}")]
    Decode(String),
    #[error("Failed to watermark image: {0}")]
    Watermark(String),
    #[error("A generation is already running for session {0}")]
    Busy(String),
}

impl GenerationError {
    /// Only a credential problem is fatal; everything else can be retried by the user.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerationError::MissingApiKey)
    }
}

/// What gets sent to the generation service.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    /// Fresh context: background photo, product reference and the full instruction.
    Composite {
        prompt: String,
        photo: InlineImage,
        product: InlineImage,
    },
    /// Continuation of the previous result; only that image and a narrower instruction.
    ConversationalEdit { prompt: String, image: InlineImage },
}

impl GenerationRequest {
    pub fn prompt(&self) -> &str {
        match self {
            GenerationRequest::Composite { prompt, .. } => prompt,
            GenerationRequest::ConversationalEdit { prompt, .. } => prompt,
        }
    }

    pub fn images(&self) -> Vec<&InlineImage> {
        match self {
            GenerationRequest::Composite { photo, product, .. } => vec![photo, product],
            GenerationRequest::ConversationalEdit { image, .. } => vec![image],
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            GenerationRequest::Composite { .. } => "composite",
            GenerationRequest::ConversationalEdit { .. } => "conversational_edit",
        }
    }
}

/// Capability contract for anything that can turn a request into an image.
pub trait ImageGenerator {
    fn has_credential(&self) -> bool;

    fn model_name(&self) -> &str;

    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GeneratedImage, GenerationError>> + Send;
}
