use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod app;
mod client;
mod config;
mod handler;
mod preview;
mod tui;
mod ui;

use app::App;
use client::{BackendClient, DEFAULT_BACKEND_URL};
use config::Config;

#[derive(Parser)]
#[command(name = "sketch2code")]
#[command(about = "Turn hand-drawn sketches into HTML via an AI backend")]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate HTML from a sketch image and write it to a file
    Generate {
        /// Sketch or screenshot to upload
        image: PathBuf,
        /// Output file for the generated document
        #[arg(short, long, default_value = "index.html")]
        output: PathBuf,
    },
    /// Refine an existing HTML file with a natural-language instruction
    Refine {
        /// HTML file to refine
        file: PathBuf,
        /// What to change, in plain language
        instruction: String,
        /// Output file; the input file is overwritten when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_default();
    let base_url = cli
        .backend
        .or(config.backend_url)
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let client = BackendClient::new(&base_url);

    match cli.command {
        Some(Commands::Generate { image, output }) => generate_once(&client, &image, &output).await,
        Some(Commands::Refine {
            file,
            instruction,
            output,
        }) => refine_once(&client, &file, &instruction, output.as_deref()).await,
        None => run_tui(client).await,
    }
}

async fn generate_once(client: &BackendClient, image: &Path, output: &Path) -> Result<()> {
    let generation = client.generate(image).await?;
    std::fs::write(output, generation.html.as_bytes())?;
    match generation.model {
        Some(model) => println!("Wrote {} (model: {})", output.display(), model),
        None => println!("Wrote {}", output.display()),
    }
    Ok(())
}

async fn refine_once(
    client: &BackendClient,
    file: &Path,
    instruction: &str,
    output: Option<&Path>,
) -> Result<()> {
    let code = std::fs::read_to_string(file)?;
    let generation = client.refine(&code, instruction).await?;
    let target = output.unwrap_or(file);
    std::fs::write(target, generation.html.as_bytes())?;
    println!("Wrote {}", target.display());
    Ok(())
}

async fn run_tui(client: BackendClient) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::Events::new();

    let mut app = App::new(client);
    if let Ok(dir) = std::env::current_dir() {
        app.scan_images(&dir);
    }

    let result = run_loop(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, events: &mut tui::Events, app: &mut App) -> Result<()> {
    while !app.should_quit {
        settle_exchanges(app).await;
        terminal.draw(|frame| ui::render(app, frame))?;
        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }
    Ok(())
}

/// Fold finished background requests into app state. Requests are never
/// aborted; state changes only on settlement, at most one per kind.
async fn settle_exchanges(app: &mut App) {
    let generate_done = app
        .generate_task
        .as_ref()
        .map(|task| task.is_finished())
        .unwrap_or(false);
    if generate_done {
        if let Some(task) = app.generate_task.take() {
            match task.await {
                Ok(Ok(generation)) => app.complete_generate(generation),
                _ => app.fail_generate(),
            }
        }
    }

    let refine_done = app
        .refine_task
        .as_ref()
        .map(|task| task.is_finished())
        .unwrap_or(false);
    if refine_done {
        if let Some(task) = app.refine_task.take() {
            match task.await {
                Ok(Ok(generation)) => app.complete_refine(generation),
                _ => app.fail_refine(),
            }
        }
    }
}
