pub mod gemini;
pub mod generator;
pub mod media;
pub mod stream;

pub use gemini::{GeminiClient, GeminiSettings};
