use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::models::SpaModel;
use crate::handlers::upload::UploadedImage;
use crate::llm::generator::{GenerationError, ImageGenerator};
use crate::llm::media::InlineImage;
use crate::state::AppState;
use crate::utils::timing::{complete_action_timer, start_action_timer};
use crate::visualizer::lighting::{format_hour_12, lighting_description, TimeOfDay};
use crate::visualizer::{GenerationMode, Orchestrator, Position, VisualizationInput, VisualizationResult};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> String {
    let sequence = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("session-{}-{}", Utc::now().timestamp_millis(), sequence)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Initial,
    Regenerate,
    Adjust,
    Lighting,
    Reset,
}

impl SessionAction {
    pub fn name(self) -> &'static str {
        match self {
            SessionAction::Initial => "initial",
            SessionAction::Regenerate => "regenerate",
            SessionAction::Adjust => "adjust",
            SessionAction::Lighting => "lighting",
            SessionAction::Reset => "reset",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            SessionAction::Initial | SessionAction::Reset => {
                "Failed to process image. Please try again."
            }
            SessionAction::Regenerate => "Failed to regenerate image. Please try again.",
            SessionAction::Adjust => "Failed to adjust position. Please try again.",
            SessionAction::Lighting => "Failed to update lighting. Please try again.",
        }
    }
}

/// The product picked in the select step, with its reference image already loaded.
#[derive(Debug, Clone)]
pub struct SelectedSpa {
    pub model: SpaModel,
    pub image: InlineImage,
}

/// State of the visualize step. Dropped when the user goes back or exits.
#[derive(Debug)]
pub struct GenerationSession {
    id: String,
    photo: UploadedImage,
    photo_inline: InlineImage,
    spa: SelectedSpa,
    position: Position,
    hour: u8,
    default_hour: u8,
    region: String,
    result: Option<VisualizationResult>,
    completed: usize,
    last_failed: Option<(SessionAction, GenerationMode)>,
}

impl GenerationSession {
    pub fn new(photo: UploadedImage, spa: SelectedSpa, hour: u8, region: &str) -> Self {
        let photo_inline = photo.to_inline();
        Self {
            id: next_session_id(),
            photo,
            photo_inline,
            spa,
            position: Position::default(),
            hour,
            default_hour: hour,
            region: region.to_string(),
            result: None,
            completed: 0,
            last_failed: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn spa(&self) -> &SpaModel {
        &self.spa.model
    }

    pub fn photo(&self) -> &UploadedImage {
        &self.photo
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn result(&self) -> Option<&VisualizationResult> {
        self.result.as_ref()
    }

    /// Only moves the slider; `apply_lighting` sends it to the service.
    pub fn set_hour(&mut self, hour: u8) {
        self.hour = hour;
    }

    pub fn time_label(&self) -> String {
        format!(
            "{} - {}",
            format_hour_12(self.hour),
            TimeOfDay::from_hour(self.hour).label()
        )
    }

    pub fn lighting(&self) -> String {
        lighting_description(self.hour, &self.region)
    }

    async fn run<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
        action: SessionAction,
        mode: GenerationMode,
    ) -> Result<&VisualizationResult, GenerationError> {
        let _guard = state
            .begin_generation(&self.id)
            .ok_or_else(|| GenerationError::Busy(self.id.clone()))?;
        let mut timer = start_action_timer(action.name(), &self.id, Some(mode.label()));

        let lighting = self.lighting();
        let input = VisualizationInput {
            photo: &self.photo_inline,
            spa: &self.spa.model,
            product: &self.spa.image,
            position: self.position,
            lighting: &lighting,
            previous: self.result.as_ref().map(|result| &result.image),
        };

        let outcome = orchestrator.visualize(input, &mode).await;
        match outcome {
            Ok(result) => {
                self.completed += 1;
                self.position = result.position;
                self.last_failed = None;
                info!(
                    session_id = %self.id,
                    action = action.name(),
                    watermarked = result.watermarked,
                    "Visualization updated: {}",
                    result.position
                );
                complete_action_timer(&mut timer, "success", None);
                Ok(self.result.insert(result))
            }
            Err(err) => {
                warn!(session_id = %self.id, action = action.name(), "Generation failed: {}", err);
                complete_action_timer(&mut timer, "error", Some(err.to_string()));
                self.last_failed = Some((action, mode));
                Err(err)
            }
        }
    }

    /// The first success of a session carries the watermark.
    pub async fn generate_initial<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
    ) -> Result<&VisualizationResult, GenerationError> {
        let mode = GenerationMode::Initial {
            first_of_session: self.completed == 0,
        };
        self.run(orchestrator, state, SessionAction::Initial, mode).await
    }

    /// Watermarked too when no earlier generation has succeeded.
    pub async fn regenerate<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
    ) -> Result<&VisualizationResult, GenerationError> {
        let mode = GenerationMode::Initial {
            first_of_session: self.completed == 0,
        };
        self.run(orchestrator, state, SessionAction::Regenerate, mode).await
    }

    /// Typed input; lighting-only phrasing is routed to a relight.
    pub async fn adjust<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
        text: &str,
    ) -> Result<&VisualizationResult, GenerationError> {
        let mode = GenerationMode::from_command_text(text);
        let action = match mode {
            GenerationMode::LightingOnly => SessionAction::Lighting,
            _ => SessionAction::Adjust,
        };
        self.run(orchestrator, state, action, mode).await
    }

    pub async fn apply_lighting<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
    ) -> Result<&VisualizationResult, GenerationError> {
        self.run(orchestrator, state, SessionAction::Lighting, GenerationMode::LightingOnly)
            .await
    }

    /// Back to the default slider hour and a fresh placement.
    pub async fn reset<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
    ) -> Result<&VisualizationResult, GenerationError> {
        self.hour = self.default_hour;
        let mode = GenerationMode::Initial {
            first_of_session: self.completed == 0,
        };
        self.run(orchestrator, state, SessionAction::Reset, mode).await
    }

    /// Repeats the last failed action, or the initial placement when nothing failed.
    pub async fn retry<G: ImageGenerator + Sync>(
        &mut self,
        orchestrator: &Orchestrator<G>,
        state: &AppState,
    ) -> Result<&VisualizationResult, GenerationError> {
        match self.last_failed.take() {
            Some((action, mode)) => self.run(orchestrator, state, action, mode).await,
            None => self.generate_initial(orchestrator, state).await,
        }
    }

    pub fn summary(&self) -> String {
        let spa = &self.spa.model;
        let mut lines = vec![
            spa.name.clone(),
            format!("Capacity: {} people", spa.capacity),
            format!("Size: {}", spa.size_label()),
            format!("Price: {}", spa.price_label()),
        ];
        if let Some(color) = spa.selected_color.as_deref() {
            lines.push(format!("Color: {color}"));
        }
        if let Some(sku) = spa.sku.as_deref() {
            lines.push(format!("SKU: {sku}"));
        }
        if let Some(url) = spa.product_url.as_deref() {
            lines.push(format!("Product details: {url}"));
        }
        lines.push(format!("Space: {}", self.photo.describe()));
        lines.push(format!("Time of day: {}", self.time_label()));
        lines.push(format!("Position: {}", self.position));
        lines.push(format!("Generations: {}", self.completed));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::builtin_spa_models;
    use crate::llm::generator::testing::{solid_png, FakeGenerator};
    use crate::llm::generator::GenerationRequest;
    use crate::visualizer::watermark::tests::write_overlay;
    use crate::visualizer::watermark::Watermarker;

    fn session() -> GenerationSession {
        let photo = UploadedImage::from_bytes(solid_png(16, 9, [20, 90, 20, 255]), "deck1.png").unwrap();
        let spa = SelectedSpa {
            model: builtin_spa_models().remove(0),
            image: InlineImage::new(solid_png(4, 4, [200, 200, 200, 255]), "image/png"),
        };
        GenerationSession::new(photo, spa, 12, "New Zealand")
    }

    fn transport_error() -> GenerationError {
        GenerationError::Transport("connection reset".to_string())
    }

    #[tokio::test]
    async fn adjust_updates_position_and_counts() {
        let orchestrator = Orchestrator::new(FakeGenerator::default(), None);
        let state = AppState::new();
        let mut session = session();

        session.generate_initial(&orchestrator, &state).await.unwrap();
        session.adjust(&orchestrator, &state, "move right").await.unwrap();
        session.adjust(&orchestrator, &state, "move right").await.unwrap();

        assert_eq!(session.position().x, 70.0);
        assert_eq!(session.completed, 3);
        assert!(state.begin_generation(session.id()).is_some());
    }

    #[tokio::test]
    async fn failure_keeps_previous_result_and_retry_repeats_it() {
        let orchestrator = Orchestrator::new(FakeGenerator::default(), None);
        let state = AppState::new();
        let mut session = session();
        session.generate_initial(&orchestrator, &state).await.unwrap();
        let before = session.result().cloned().unwrap();

        *orchestrator.generator().fail_next.lock() = Some(transport_error());
        let err = session.adjust(&orchestrator, &state, "move left").await;
        assert!(err.is_err());
        assert_eq!(session.result(), Some(&before));
        assert_eq!(session.position(), Position::default());
        assert!(session.last_failed.is_some());

        session.retry(&orchestrator, &state).await.unwrap();
        assert_eq!(session.position().x, 40.0);
        assert!(session.last_failed.is_none());
    }

    #[tokio::test]
    async fn lighting_keeps_position_and_edits_previous_image() {
        let orchestrator = Orchestrator::new(FakeGenerator::default(), None);
        let state = AppState::new();
        let mut session = session();
        session.generate_initial(&orchestrator, &state).await.unwrap();
        session.adjust(&orchestrator, &state, "move up").await.unwrap();
        let moved = session.position();

        session.set_hour(19);
        session.apply_lighting(&orchestrator, &state).await.unwrap();

        assert_eq!(session.position(), moved);
        match orchestrator.generator().last_request() {
            Some(GenerationRequest::ConversationalEdit { prompt, .. }) => {
                assert!(prompt.contains("golden"));
            }
            other => panic!("expected conversational edit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn regenerate_after_failed_first_placement_is_watermarked() {
        let overlay = write_overlay("session-regen");
        let orchestrator = Orchestrator::new(
            FakeGenerator::failing_once(transport_error()),
            Some(Watermarker::new(&overlay)),
        );
        let state = AppState::new();
        let mut session = session();

        assert!(session.generate_initial(&orchestrator, &state).await.is_err());
        let first = session.regenerate(&orchestrator, &state).await.unwrap().watermarked;
        let second = session.regenerate(&orchestrator, &state).await.unwrap().watermarked;
        let _ = std::fs::remove_file(&overlay);

        assert!(first);
        assert!(!second);
        assert_eq!(orchestrator.generator().call_count(), 3);
    }

    #[tokio::test]
    async fn busy_session_is_rejected_without_calling_service() {
        let orchestrator = Orchestrator::new(FakeGenerator::default(), None);
        let state = AppState::new();
        let mut session = session();
        let _held = state.begin_generation(session.id()).unwrap();

        let result = session.generate_initial(&orchestrator, &state).await;
        assert!(matches!(result, Err(GenerationError::Busy(_))));
        assert_eq!(orchestrator.generator().call_count(), 0);
    }

    #[tokio::test]
    async fn reset_restores_default_hour_and_position() {
        let orchestrator = Orchestrator::new(FakeGenerator::default(), None);
        let state = AppState::new();
        let mut session = session();
        session.generate_initial(&orchestrator, &state).await.unwrap();
        session.adjust(&orchestrator, &state, "move to the top left corner").await.unwrap();
        session.set_hour(22);

        session.reset(&orchestrator, &state).await.unwrap();
        assert_eq!(session.hour, 12);
        assert_eq!(session.position(), Position::default());
    }

    #[test]
    fn summary_lists_product_details() {
        let session = session();
        let summary = session.summary();
        assert!(summary.contains("Capacity:"));
        assert!(summary.contains("12:00 PM"));
        assert!(summary.contains("Position:"));
    }
}
