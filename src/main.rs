use std::path::PathBuf;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{error, info};

mod catalog;
mod config;
mod handlers;
mod llm;
mod state;
mod utils;
mod visualizer;

use catalog::{load_product_image, Catalog, CatalogFilter};
use config::CONFIG;
use handlers::export::{save_result, ExportOutcome};
use handlers::session::{GenerationSession, SelectedSpa};
use handlers::upload::{load_example, load_upload};
use handlers::wizard::{describe_result, spa_listing_line, Wizard};
use llm::{GeminiClient, GeminiSettings};
use state::AppState;
use utils::logging::init_logging;
use visualizer::lighting::parse_hour;
use visualizer::{Orchestrator, Watermarker};

fn usage() -> &'static str {
    "Usage:\n  \
     aquavision [wizard]\n  \
     aquavision visualize (--photo <path|url> | --example <1-3>) --spa <id> [--color <name>] [--hour <0-23>] [--command <text>]... [--lighting <0-23>]... [--out <dir>]\n  \
     aquavision catalog [--capacity <2-4|5-6|7+>] [--shape <round|square|rectangular>] [--json]"
}

#[derive(Debug, Clone, PartialEq)]
enum BatchStep {
    Command(String),
    Lighting(u8),
}

#[derive(Debug, Clone, PartialEq)]
enum PhotoSource {
    Path(String),
    Example(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct VisualizeArgs {
    photo: PhotoSource,
    spa: String,
    color: Option<String>,
    hour: Option<u8>,
    steps: Vec<BatchStep>,
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
struct CatalogArgs {
    filter: CatalogFilter,
    json: bool,
}

#[derive(Debug, Clone)]
enum Invocation {
    Wizard,
    Visualize(VisualizeArgs),
    Catalog(CatalogArgs),
    Help,
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_hour_arg(value: &str, flag: &str) -> anyhow::Result<u8> {
    parse_hour(value).ok_or_else(|| anyhow!("Invalid {flag} value: {value} (expected 0-23)"))
}

fn parse_visualize_args(args: &[String]) -> anyhow::Result<VisualizeArgs> {
    let mut photo = None;
    let mut spa = None;
    let mut color = None;
    let mut hour = None;
    let mut steps = Vec::new();
    let mut out = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--photo" => {
                let value = take_value(args, &mut index, "--photo")?;
                photo = Some(PhotoSource::Path(value.to_string()));
            }
            "--example" => {
                let value = take_value(args, &mut index, "--example")?;
                let number = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("Invalid --example value: {value}"))?;
                photo = Some(PhotoSource::Example(number));
            }
            "--spa" => spa = Some(take_value(args, &mut index, "--spa")?.to_string()),
            "--color" => color = Some(take_value(args, &mut index, "--color")?.to_string()),
            "--hour" => {
                let value = take_value(args, &mut index, "--hour")?;
                hour = Some(parse_hour_arg(value, "--hour")?);
            }
            "--command" => {
                let value = take_value(args, &mut index, "--command")?;
                steps.push(BatchStep::Command(value.to_string()));
            }
            "--lighting" => {
                let value = take_value(args, &mut index, "--lighting")?;
                steps.push(BatchStep::Lighting(parse_hour_arg(value, "--lighting")?));
            }
            "--out" => out = Some(PathBuf::from(take_value(args, &mut index, "--out")?)),
            other => {
                return Err(anyhow!("Unknown visualize argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    Ok(VisualizeArgs {
        photo: photo.ok_or_else(|| anyhow!("--photo or --example is required"))?,
        spa: spa.ok_or_else(|| anyhow!("--spa is required"))?,
        color,
        hour,
        steps,
        out,
    })
}

fn parse_catalog_args(args: &[String]) -> anyhow::Result<CatalogArgs> {
    let mut parsed = CatalogArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--capacity" => {
                let value = take_value(args, &mut index, "--capacity")?;
                parsed.filter.capacity = Some(value.parse().map_err(|err: String| anyhow!(err))?);
            }
            "--shape" => {
                let value = take_value(args, &mut index, "--shape")?;
                parsed.filter.shape = Some(value.parse().map_err(|err: String| anyhow!(err))?);
            }
            "--json" => parsed.json = true,
            other => {
                return Err(anyhow!("Unknown catalog argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }
    Ok(parsed)
}

fn parse_invocation(args: &[String]) -> anyhow::Result<Invocation> {
    let rest = args.get(2..).unwrap_or_default();
    match args.get(1).map(|value| value.as_str()) {
        None | Some("wizard") => Ok(Invocation::Wizard),
        Some("visualize") => Ok(Invocation::Visualize(parse_visualize_args(rest)?)),
        Some("catalog") => Ok(Invocation::Catalog(parse_catalog_args(rest)?)),
        Some("help") | Some("--help") | Some("-h") => Ok(Invocation::Help),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn build_orchestrator() -> anyhow::Result<Orchestrator<GeminiClient>> {
    let client = GeminiClient::new(GeminiSettings::from_config(&CONFIG))?;
    let watermarker = CONFIG
        .enable_watermark
        .then(|| Watermarker::new(CONFIG.watermark_path.clone()));
    Ok(Orchestrator::new(client, watermarker))
}

fn run_catalog(args: CatalogArgs) -> anyhow::Result<()> {
    let catalog = Catalog::load(CONFIG.spa_catalog_path.as_deref());
    let spas = catalog.filtered(&args.filter);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&spas)?);
        return Ok(());
    }
    if spas.is_empty() {
        println!("No spas match the given filters.");
    }
    for spa in spas {
        println!("{}", spa_listing_line(spa));
    }
    Ok(())
}

async fn run_visualize(args: VisualizeArgs) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator()?;
    let state = AppState::new();
    let catalog = Catalog::load(CONFIG.spa_catalog_path.as_deref());

    let photo = match &args.photo {
        PhotoSource::Path(source) => load_upload(source).await?,
        PhotoSource::Example(number) => load_example(*number, &CONFIG.example_spaces_dir).await?,
    };
    let base = catalog
        .find(&args.spa)
        .ok_or_else(|| anyhow!("Unknown spa '{}'", args.spa))?;
    let model = match args.color.as_deref() {
        Some(color) => base.with_color(color).ok_or_else(|| {
            anyhow!("{} is available in: {}", base.name, base.colors.join(", "))
        })?,
        None => base.clone(),
    };
    let image = load_product_image(&model, &CONFIG.assets_dir)
        .await
        .context("Failed to load product image")?;

    let hour = args.hour.unwrap_or(CONFIG.default_hour);
    let mut session = GenerationSession::new(
        photo,
        SelectedSpa { model, image },
        hour,
        &CONFIG.lighting_region,
    );
    info!(session_id = session.id(), steps = args.steps.len(), "Starting batch visualization");

    let summary = describe_result(session.generate_initial(&orchestrator, &state).await?);
    println!("{summary}");
    for step in &args.steps {
        let summary = match step {
            BatchStep::Command(text) => {
                describe_result(session.adjust(&orchestrator, &state, text).await?)
            }
            BatchStep::Lighting(hour) => {
                session.set_hour(*hour);
                describe_result(session.apply_lighting(&orchestrator, &state).await?)
            }
        };
        println!("{summary}");
    }

    let result = session
        .result()
        .ok_or_else(|| anyhow!("No visualization was produced"))?;
    println!("{}", serde_json::to_string(result)?);
    let out = args.out.unwrap_or_else(|| CONFIG.output_dir.clone());
    match save_result(&result.image, &out).await {
        ExportOutcome::Saved(path) => println!("Saved to {}", path.display()),
        ExportOutcome::Manual(instructions) => println!("{instructions}"),
    }
    Ok(())
}

async fn run_wizard() -> anyhow::Result<()> {
    let wizard = Wizard {
        catalog: Catalog::load(CONFIG.spa_catalog_path.as_deref()),
        orchestrator: build_orchestrator()?,
        state: AppState::new(),
        assets_dir: CONFIG.assets_dir.clone(),
        examples_dir: CONFIG.example_spaces_dir.clone(),
        output_dir: CONFIG.output_dir.clone(),
        default_hour: CONFIG.default_hour,
        region: CONFIG.lighting_region.clone(),
    };
    wizard.run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level);

    let args: Vec<String> = std::env::args().collect();
    let invocation = parse_invocation(&args)?;
    info!("Starting AquaVision ({:?})", invocation);

    let outcome = match invocation {
        Invocation::Help => {
            println!("{}", usage());
            Ok(())
        }
        Invocation::Catalog(args) => run_catalog(args),
        Invocation::Visualize(args) => run_visualize(args).await,
        Invocation::Wizard => run_wizard().await,
    };
    if let Err(err) = &outcome {
        error!("AquaVision exited with error: {err:#}");
    }
    outcome
}
