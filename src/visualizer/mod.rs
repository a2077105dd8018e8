pub mod command;
pub mod lighting;
pub mod orchestrator;
pub mod position;
pub mod prompts;
pub mod watermark;

pub use orchestrator::{GenerationMode, Orchestrator, VisualizationInput, VisualizationResult};
pub use position::Position;
pub use watermark::Watermarker;
