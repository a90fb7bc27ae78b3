use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::Parser;
use parley_core::{Config, ConversationStore, DeepSeekClient};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod markdown;
mod theme;
mod tui;
mod ui;

use app::App;
use theme::Theme;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat client for DeepSeek with saved conversations")]
#[command(version)]
struct Cli {
    /// Model to use (deepseek-chat, deepseek-reasoner)
    #[arg(short, long, env = "PARLEY_MODEL")]
    model: Option<String>,

    /// Directory for saved conversations
    #[arg(short, long, env = "PARLEY_SAVE_DIR")]
    dir: Option<PathBuf>,

    /// Color theme (dark, light)
    #[arg(long)]
    theme: Option<String>,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Log to a file; the terminal belongs to the UI
fn init_logging() -> Result<PathBuf> {
    let log_dir = dirs::data_dir()
        .map(|dir| dir.join("parley"))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("parley.log");
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(log_path)
}

/// A missing config directory or a bad file falls back to defaults
fn load_config(path: Result<PathBuf>) -> (Config, Option<PathBuf>) {
    let path = match path {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("no config file: {:#}", e);
            return (Config::new(), None);
        }
    };
    let config = Config::load_from(&path).unwrap_or_else(|e| {
        tracing::warn!("ignoring config: {:#}", e);
        Config::new()
    });
    (config, Some(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env in the working directory may carry DEEPSEEK_API_KEY
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {:#}", e);
    }

    let config_path = match cli.config {
        Some(path) => Ok(path),
        None => Config::default_path(),
    };
    let (config, config_path) = load_config(config_path);

    let save_dir = config.resolve_save_dir(cli.dir);
    let store = ConversationStore::open(&save_dir)
        .with_context(|| format!("Could not create save directory {}", save_dir.display()))?;

    let resolved_key = config.resolve_api_key(Config::api_key_from_env());
    let key_source = resolved_key.as_ref().map(|(_, source)| *source);
    let client = DeepSeekClient::new(resolved_key.map(|(key, _)| key))
        .with_model(config.resolve_model(cli.model.as_deref()))
        .with_api_url(config.resolve_api_url());

    let theme_name = cli
        .theme
        .or_else(|| config.theme.clone())
        .unwrap_or_else(|| "dark".to_string());
    let theme = Theme::by_name(&theme_name);

    tracing::info!(
        dir = %save_dir.display(),
        model = %client.model(),
        theme = theme.name,
        "starting parley"
    );
    let mut app = App::new(store, client, config, config_path, key_source, theme);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !app.should_quit {
        app.poll_pending().await;
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => {
                // Keep running on handler errors; show them in the status bar
                if let Err(e) = handler::handle_event(app, event) {
                    app.report_error(e);
                }
            }
            None => break,
        }
    }

    Ok(())
}
