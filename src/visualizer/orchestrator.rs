use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::models::SpaModel;
use crate::llm::generator::{GenerationError, GenerationRequest, ImageGenerator};
use crate::llm::media::{GeneratedImage, InlineImage};
use crate::visualizer::command::{parse_commands, AdjustCommand};
use crate::visualizer::position::{apply_commands, Position};
use crate::visualizer::prompts::{adjustment_prompt, composite_prompt, lighting_only_prompt};
use crate::visualizer::watermark::Watermarker;

const LIGHTING_ONLY_MARKERS: [&str; 2] = ["change lighting only", "maintain current position"];

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationMode {
    /// Fresh composite from the uploaded photo; regenerations pass `first_of_session = false`.
    Initial { first_of_session: bool },
    Adjust { commands: Vec<AdjustCommand> },
    LightingOnly,
}

impl GenerationMode {
    /// Classifies typed input the way the old free-text command channel did.
    pub fn from_command_text(text: &str) -> Self {
        let lowered = text.to_lowercase();
        if LIGHTING_ONLY_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return GenerationMode::LightingOnly;
        }
        GenerationMode::Adjust {
            commands: parse_commands(text),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::Initial { .. } => "initial",
            GenerationMode::Adjust { .. } => "adjust",
            GenerationMode::LightingOnly => "lighting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationResult {
    #[serde(skip)]
    pub image: GeneratedImage,
    pub position: Position,
    pub watermarked: bool,
}

/// Everything one generation needs from the caller's session.
#[derive(Debug, Clone, Copy)]
pub struct VisualizationInput<'a> {
    pub photo: &'a InlineImage,
    pub spa: &'a SpaModel,
    pub product: &'a InlineImage,
    pub position: Position,
    pub lighting: &'a str,
    pub previous: Option<&'a GeneratedImage>,
}

pub struct Orchestrator<G> {
    generator: G,
    watermarker: Option<Watermarker>,
}

impl<G: ImageGenerator + Sync> Orchestrator<G> {
    pub fn new(generator: G, watermarker: Option<Watermarker>) -> Self {
        Self {
            generator,
            watermarker,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    fn composite(&self, input: &VisualizationInput<'_>, prompt: String) -> GenerationRequest {
        GenerationRequest::Composite {
            prompt,
            photo: input.photo.clone(),
            product: input.product.clone(),
        }
    }

    fn plan(
        &self,
        input: &VisualizationInput<'_>,
        mode: &GenerationMode,
    ) -> Result<(GenerationRequest, Position), GenerationError> {
        match mode {
            GenerationMode::Initial { .. } => Ok((
                self.composite(input, composite_prompt(input.spa, input.lighting)),
                Position::default(),
            )),
            GenerationMode::Adjust { commands } => {
                let position = apply_commands(input.position, commands);
                let prompt = adjustment_prompt(input.spa, commands, input.lighting);
                Ok((self.composite(input, prompt), position))
            }
            GenerationMode::LightingOnly => {
                let lighting = input.lighting.trim();
                match input.previous {
                    Some(previous) if !lighting.is_empty() => {
                        let image = previous
                            .to_inline()
                            .map_err(|err| GenerationError::Decode(err.to_string()))?;
                        Ok((
                            GenerationRequest::ConversationalEdit {
                                prompt: lighting_only_prompt(lighting),
                                image,
                            },
                            input.position,
                        ))
                    }
                    _ => {
                        debug!("No previous result to relight; running a fresh composite");
                        Ok((
                            self.composite(input, composite_prompt(input.spa, lighting)),
                            input.position,
                        ))
                    }
                }
            }
        }
    }

    pub async fn visualize(
        &self,
        input: VisualizationInput<'_>,
        mode: &GenerationMode,
    ) -> Result<VisualizationResult, GenerationError> {
        if !self.generator.has_credential() {
            return Err(GenerationError::MissingApiKey);
        }

        let (request, position) = self.plan(&input, mode)?;
        info!(
            mode = mode.label(),
            operation = request.operation(),
            spa = %input.spa.id,
            model = self.generator.model_name(),
            "Requesting visualization"
        );
        let generated = self.generator.generate(&request).await?;

        let wants_watermark = matches!(
            mode,
            GenerationMode::Initial {
                first_of_session: true
            }
        );
        let (image, watermarked) = match (&self.watermarker, wants_watermark) {
            (Some(watermarker), true) => {
                let stamped = watermarker.apply(&generated)?;
                let applied = stamped != generated;
                (stamped, applied)
            }
            _ => (generated, false),
        };

        Ok(VisualizationResult {
            image,
            position,
            watermarked,
        })
    }
}
