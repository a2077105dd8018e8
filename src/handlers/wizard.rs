use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::info;

use crate::catalog::{load_product_image, CapacityBucket, Catalog, CatalogFilter, PlanShape, SpaModel};
use crate::handlers::export::{save_result, ExportOutcome};
use crate::handlers::session::{GenerationSession, SelectedSpa, SessionAction};
use crate::handlers::upload::{load_example, load_upload, UploadedImage, EXAMPLE_SPACES};
use crate::llm::generator::{GenerationError, ImageGenerator};
use crate::state::AppState;
use crate::visualizer::lighting::parse_hour;
use crate::visualizer::position::adjust_position;
use crate::visualizer::{Orchestrator, VisualizationResult};

const PROCESSING_TIPS: [&str; 7] = [
    "If the positioning looks weird, try generating another placement (regen).",
    "Use `time <hour>` and `light` to see your spa at different times of day.",
    "left/right/up/down give you a little control over where the spa sits.",
    "Save your image to print or share with family and friends.",
    "Try different times of day to see how lighting affects the spa's appearance.",
    "The spa is sized from its real dimensions and the objects in your photo.",
    "Each generation is unique; experiment with different placements.",
];

static TIP_INDEX: AtomicUsize = AtomicUsize::new(0);

fn next_tip() -> &'static str {
    let index = TIP_INDEX.fetch_add(1, Ordering::Relaxed);
    PROCESSING_TIPS[index % PROCESSING_TIPS.len()]
}

/// Everything the interactive session shares across steps.
pub struct Wizard<G> {
    pub catalog: Catalog,
    pub orchestrator: Orchestrator<G>,
    pub state: AppState,
    pub assets_dir: PathBuf,
    pub examples_dir: PathBuf,
    pub output_dir: PathBuf,
    pub default_hour: u8,
    pub region: String,
}

enum Step {
    Upload,
    Select(UploadedImage),
    Visualize(Box<GenerationSession>),
}

#[derive(Debug, Clone, PartialEq)]
enum UploadAction {
    Example(usize),
    Source(String),
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
enum SelectAction {
    List,
    Capacity(Option<CapacityBucket>),
    Shape(Option<PlanShape>),
    Choose { id: String, color: Option<String> },
    Back,
    Quit,
    Help,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
enum VisualizeAction {
    Adjust(String),
    Lighting(Option<u8>),
    SetTime(u8),
    Regenerate,
    Reset,
    Retry,
    Save(Option<PathBuf>),
    Info,
    Back,
    Quit,
    Help,
    Invalid(String),
}

fn split_command(line: &str) -> (String, String) {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head.to_lowercase(), rest.trim().to_string()),
        None => (trimmed.to_lowercase(), String::new()),
    }
}

fn parse_upload_action(line: &str) -> UploadAction {
    let (head, rest) = split_command(line);
    match head.as_str() {
        "quit" | "exit" => UploadAction::Quit,
        "help" | "?" => UploadAction::Help,
        "example" => match rest.parse::<usize>() {
            Ok(number) => UploadAction::Example(number),
            Err(_) => UploadAction::Help,
        },
        _ => UploadAction::Source(line.trim().to_string()),
    }
}

fn parse_filter_value<T: std::str::FromStr<Err = String>>(
    value: &str,
) -> Result<Option<T>, String> {
    if value.is_empty() || value.eq_ignore_ascii_case("any") {
        return Ok(None);
    }
    value.parse::<T>().map(Some)
}

fn parse_select_action(line: &str) -> SelectAction {
    let (head, rest) = split_command(line);
    match head.as_str() {
        "" | "list" => SelectAction::List,
        "back" => SelectAction::Back,
        "quit" | "exit" => SelectAction::Quit,
        "help" | "?" => SelectAction::Help,
        "capacity" => match parse_filter_value(&rest) {
            Ok(bucket) => SelectAction::Capacity(bucket),
            Err(err) => SelectAction::Invalid(err),
        },
        "shape" => match parse_filter_value(&rest) {
            Ok(shape) => SelectAction::Shape(shape),
            Err(err) => SelectAction::Invalid(err),
        },
        _ => {
            let mut parts = line.trim().splitn(2, char::is_whitespace);
            let id = parts.next().unwrap_or_default().to_string();
            let color = parts
                .next()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            SelectAction::Choose { id, color }
        }
    }
}

fn parse_visualize_action(line: &str) -> VisualizeAction {
    let (head, rest) = split_command(line);
    match head.as_str() {
        "left" | "right" | "up" | "down" if rest.is_empty() => {
            VisualizeAction::Adjust(format!("move {head}"))
        }
        "light" | "lighting" => {
            if rest.is_empty() {
                return VisualizeAction::Lighting(None);
            }
            match parse_hour(&rest) {
                Some(hour) => VisualizeAction::Lighting(Some(hour)),
                None => VisualizeAction::Invalid("Hour must be between 0 and 23.".to_string()),
            }
        }
        "time" => match parse_hour(&rest) {
            Some(hour) => VisualizeAction::SetTime(hour),
            None => VisualizeAction::Invalid("Hour must be between 0 and 23.".to_string()),
        },
        "regen" | "regenerate" => VisualizeAction::Regenerate,
        "reset" => VisualizeAction::Reset,
        "retry" => VisualizeAction::Retry,
        "save" | "download" => {
            VisualizeAction::Save((!rest.is_empty()).then(|| PathBuf::from(rest)))
        }
        "info" => VisualizeAction::Info,
        "back" => VisualizeAction::Back,
        "quit" | "exit" => VisualizeAction::Quit,
        "help" | "?" => VisualizeAction::Help,
        "" => VisualizeAction::Help,
        _ => VisualizeAction::Adjust(line.trim().to_string()),
    }
}

pub fn spa_listing_line(spa: &SpaModel) -> String {
    let colors = if spa.colors.is_empty() {
        String::new()
    } else {
        format!(" [{}]", spa.colors.join(", "))
    };
    format!(
        "{:<12} {:<24} {} people, {}, {}{}",
        spa.id,
        spa.name,
        spa.capacity,
        spa.size_label(),
        spa.price_label(),
        colors
    )
}

pub fn describe_result(result: &VisualizationResult) -> String {
    let mut text = format!("Visualization ready. Position: {}", result.position);
    if result.watermarked {
        text.push_str(" (watermarked)");
    }
    text
}

fn print_upload_help() {
    println!("Step 1 of 3: upload a photo of your outdoor space.");
    println!("  <path or URL>   JPEG, PNG, WebP or HEIC, up to 20 MB");
    for (index, example) in EXAMPLE_SPACES.iter().enumerate() {
        println!("  example {}       {}", index + 1, example.name);
    }
    println!("  quit");
}

fn print_select_help() {
    println!("Step 2 of 3: select a spa.");
    println!("  <id> [color]             choose a spa (and optionally a color)");
    println!("  capacity <2-4|5-6|7+|any>");
    println!("  shape <round|square|rectangular|any>");
    println!("  list, back, quit");
}

fn print_visualize_help() {
    println!("Step 3 of 3: visualize.");
    println!("  left | right | up | down   nudge the spa");
    println!("  <free text>                e.g. \"rotate 90 and make it smaller\"");
    println!("  time <0-23>                move the time-of-day slider");
    println!("  light [0-23]               apply lighting for the current (or given) hour");
    println!("  regen | reset | retry");
    println!("  save [dir] | info | back | quit");
}

/// Races `pending` against Ctrl-C; `None` means the user cancelled.
async fn cancellable<T>(pending: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        outcome = pending => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    }
}

async fn perform(
    action: SessionAction,
    pending: impl Future<Output = Result<String, GenerationError>>,
) -> Result<()> {
    println!("Processing your image... Tip: {}", next_tip());
    match cancellable(pending).await {
        None => println!("Cancelled. The previous visualization is unchanged."),
        Some(Ok(text)) => println!("{text}"),
        Some(Err(err)) if err.is_fatal() => return Err(err.into()),
        Some(Err(err)) => {
            println!("{} ({})", action.failure_message(), err);
            println!("Type `retry` to try again.");
        }
    }
    Ok(())
}

async fn prompt_line(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{label}> ").as_bytes()).await?;
    stdout.flush().await?;
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}

impl<G: ImageGenerator + Sync> Wizard<G> {
    async fn upload_step(&self, line: &str) -> Result<Option<Step>> {
        let loaded = match parse_upload_action(line) {
            UploadAction::Quit => return Ok(None),
            UploadAction::Help => {
                print_upload_help();
                return Ok(Some(Step::Upload));
            }
            UploadAction::Example(number) => load_example(number, &self.examples_dir).await,
            UploadAction::Source(source) => load_upload(&source).await,
        };
        match loaded {
            Ok(upload) => {
                println!("Loaded {}", upload.describe());
                self.list_spas(&CatalogFilter::default());
                Ok(Some(Step::Select(upload)))
            }
            Err(err) => {
                println!("{err}");
                Ok(Some(Step::Upload))
            }
        }
    }

    fn list_spas(&self, filter: &CatalogFilter) {
        let spas = self.catalog.filtered(filter);
        if !filter.is_empty() {
            println!("{} of {} spas match the current filters:", spas.len(), self.catalog.all().len());
        }
        if spas.is_empty() {
            println!("No spas match the current filters.");
            return;
        }
        for spa in spas {
            println!("  {}", spa_listing_line(spa));
        }
    }

    async fn select_spa(&self, id: &str, color: Option<&str>) -> Result<SelectedSpa, String> {
        let base = self
            .catalog
            .find(id)
            .ok_or_else(|| format!("Unknown spa '{id}'. Type `list` to see the options."))?;
        let model = match color {
            Some(color) => base.with_color(color).ok_or_else(|| {
                format!("{} is available in: {}", base.name, base.colors.join(", "))
            })?,
            None => base.clone(),
        };
        let image = load_product_image(&model, &self.assets_dir)
            .await
            .map_err(|err| format!("Could not load the product image: {err:#}"))?;
        Ok(SelectedSpa { model, image })
    }

    async fn select_step(
        &self,
        line: &str,
        upload: UploadedImage,
        filter: &mut CatalogFilter,
    ) -> Result<Option<Step>> {
        match parse_select_action(line) {
            SelectAction::Quit => return Ok(None),
            SelectAction::Back => {
                print_upload_help();
                return Ok(Some(Step::Upload));
            }
            SelectAction::Help => print_select_help(),
            SelectAction::List => self.list_spas(filter),
            SelectAction::Capacity(bucket) => {
                filter.capacity = bucket;
                self.list_spas(filter);
            }
            SelectAction::Shape(shape) => {
                filter.shape = shape;
                self.list_spas(filter);
            }
            SelectAction::Invalid(message) => println!("{message}"),
            SelectAction::Choose { id, color } => {
                match self.select_spa(&id, color.as_deref()).await {
                    Ok(spa) => {
                        let mut session = Box::new(GenerationSession::new(
                            upload,
                            spa,
                            self.default_hour,
                            &self.region,
                        ));
                        info!(session_id = session.id(), spa = %session.spa().id, "Starting visualization");
                        println!("{}", session.summary());
                        perform(SessionAction::Initial, async {
                            session
                                .generate_initial(&self.orchestrator, &self.state)
                                .await
                                .map(describe_result)
                        })
                        .await?;
                        return Ok(Some(Step::Visualize(session)));
                    }
                    Err(message) => println!("{message}"),
                }
            }
        }
        Ok(Some(Step::Select(upload)))
    }

    async fn visualize_step(
        &self,
        line: &str,
        mut session: Box<GenerationSession>,
    ) -> Result<Option<Step>> {
        let orchestrator = &self.orchestrator;
        let state = &self.state;
        match parse_visualize_action(line) {
            VisualizeAction::Quit => return Ok(None),
            VisualizeAction::Back => {
                let photo = session.photo().clone();
                print_select_help();
                return Ok(Some(Step::Select(photo)));
            }
            VisualizeAction::Help => print_visualize_help(),
            VisualizeAction::Info => println!("{}", session.summary()),
            VisualizeAction::Invalid(message) => println!("{message}"),
            VisualizeAction::SetTime(hour) => {
                session.set_hour(hour);
                println!("Time of day: {}. Type `light` to apply it.", session.time_label());
            }
            VisualizeAction::Lighting(hour) => {
                if let Some(hour) = hour {
                    session.set_hour(hour);
                }
                println!("Applying {}", session.time_label());
                perform(SessionAction::Lighting, async {
                    session
                        .apply_lighting(orchestrator, state)
                        .await
                        .map(describe_result)
                })
                .await?;
            }
            VisualizeAction::Adjust(text) => {
                println!("Target position: {}", adjust_position(&text, session.position()));
                perform(SessionAction::Adjust, async {
                    session
                        .adjust(orchestrator, state, &text)
                        .await
                        .map(describe_result)
                })
                .await?;
            }
            VisualizeAction::Regenerate => {
                perform(SessionAction::Regenerate, async {
                    session
                        .regenerate(orchestrator, state)
                        .await
                        .map(describe_result)
                })
                .await?;
            }
            VisualizeAction::Reset => {
                perform(SessionAction::Reset, async {
                    session.reset(orchestrator, state).await.map(describe_result)
                })
                .await?;
            }
            VisualizeAction::Retry => {
                perform(SessionAction::Initial, async {
                    session.retry(orchestrator, state).await.map(describe_result)
                })
                .await?;
            }
            VisualizeAction::Save(dir) => match session.result() {
                None => println!("Nothing to save yet."),
                Some(result) => {
                    let dir = dir.unwrap_or_else(|| self.output_dir.clone());
                    match save_result(&result.image, &dir).await {
                        ExportOutcome::Saved(path) => println!("Saved to {}", path.display()),
                        ExportOutcome::Manual(instructions) => println!("{instructions}"),
                    }
                }
            },
        }
        Ok(Some(Step::Visualize(session)))
    }

    pub async fn run(&self) -> Result<()> {
        println!("AquaVision: see a spa in your own outdoor space.");
        print_upload_help();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut step = Step::Upload;
        let mut filter = CatalogFilter::default();

        loop {
            let label = match &step {
                Step::Upload => "upload",
                Step::Select(_) => "select",
                Step::Visualize(_) => "visualize",
            };
            let Some(line) = prompt_line(&mut lines, label).await? else {
                break;
            };
            if line.trim().is_empty() && !matches!(step, Step::Select(_)) {
                continue;
            }

            let next = match step {
                Step::Upload => self.upload_step(&line).await?,
                Step::Select(upload) => self.select_step(&line, upload, &mut filter).await?,
                Step::Visualize(session) => self.visualize_step(&line, session).await?,
            };
            match next {
                Some(next) => step = next,
                None => break,
            }
        }

        println!("Goodbye.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_buttons_map_to_move_commands() {
        assert_eq!(
            parse_visualize_action("LEFT"),
            VisualizeAction::Adjust("move left".to_string())
        );
        assert_eq!(
            parse_visualize_action("down"),
            VisualizeAction::Adjust("move down".to_string())
        );
        assert_eq!(
            parse_visualize_action("rotate 90 and make it smaller"),
            VisualizeAction::Adjust("rotate 90 and make it smaller".to_string())
        );
    }

    #[test]
    fn lighting_and_time_validate_hours() {
        assert_eq!(parse_visualize_action("light"), VisualizeAction::Lighting(None));
        assert_eq!(parse_visualize_action("light 19"), VisualizeAction::Lighting(Some(19)));
        assert_eq!(parse_visualize_action("time 6"), VisualizeAction::SetTime(6));
        assert!(matches!(parse_visualize_action("time 24"), VisualizeAction::Invalid(_)));
        assert!(matches!(parse_visualize_action("light soon"), VisualizeAction::Invalid(_)));
    }

    #[test]
    fn save_accepts_optional_directory() {
        assert_eq!(parse_visualize_action("save"), VisualizeAction::Save(None));
        assert_eq!(
            parse_visualize_action("save /tmp/out"),
            VisualizeAction::Save(Some(PathBuf::from("/tmp/out")))
        );
    }

    #[test]
    fn select_step_parses_filters_and_choices() {
        assert_eq!(
            parse_select_action("capacity 7+"),
            SelectAction::Capacity(Some(CapacityBucket::SevenPlus))
        );
        assert_eq!(parse_select_action("shape any"), SelectAction::Shape(None));
        assert!(matches!(parse_select_action("shape hexagon"), SelectAction::Invalid(_)));
        assert_eq!(
            parse_select_action("oslo Grey Marble"),
            SelectAction::Choose {
                id: "oslo".to_string(),
                color: Some("Grey Marble".to_string())
            }
        );
    }

    #[test]
    fn upload_step_recognises_examples() {
        assert_eq!(parse_upload_action("example 2"), UploadAction::Example(2));
        assert_eq!(
            parse_upload_action("photos/deck.jpg"),
            UploadAction::Source("photos/deck.jpg".to_string())
        );
    }

    #[test]
    fn tips_cycle() {
        let first = next_tip();
        for _ in 1..PROCESSING_TIPS.len() {
            next_tip();
        }
        assert_eq!(next_tip(), first);
    }

    #[test]
    fn listing_line_shows_price_and_capacity() {
        let catalog = Catalog::load(None);
        let line = spa_listing_line(&catalog.all()[0]);
        assert!(line.contains("people"));
        assert!(line.contains('$'));
    }
}
