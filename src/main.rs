use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shoplist_voice::{
    create_router, AppState, Config, FileCapture, SessionCallbacks, SessionController,
    ShoppingListSnapshot, VoiceAssistant,
};
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shoplist-voice")]
#[command(about = "Voice session client for the shopping list backend")]
struct Cli {
    /// Config file (defaults to config/shoplist-voice.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured user id
    #[arg(long)]
    user_id: Option<String>,

    /// Override the configured backend URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a WAV file through a voice session and print the shopping list
    Listen {
        /// 16-bit PCM WAV file
        #[arg(short, long)]
        file: String,

        /// Seconds to wait for the final list after the file ends
        #[arg(long, default_value_t = 3)]
        linger_secs: u64,
    },

    /// Send a text phrase instead of audio
    Say {
        text: String,

        /// Seconds to wait for the backend's answer
        #[arg(long, default_value_t = 5)]
        wait_secs: u64,
    },

    /// Serve the local control API
    Serve {
        /// WAV file used as the capture source
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(user_id) = cli.user_id.clone() {
        cfg.voice.user_id = user_id;
    }
    if let Some(backend_url) = cli.backend_url.clone() {
        cfg.voice.backend_url = backend_url;
    }
    cfg.voice.debug |= cli.debug;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Shoplist Voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {} (user {})", cfg.voice.backend_url, cfg.voice.user_id);

    match cli.command {
        Command::Listen { file, linger_secs } => listen(&cfg, &file, linger_secs).await,
        Command::Say { text, wait_secs } => say(&cfg, &text, wait_secs).await,
        Command::Serve { file } => serve(&cfg, &file).await,
    }
}

fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(path).with_context(|| format!("Failed to expand path: {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Print transcripts and list updates as they arrive
fn console_callbacks() -> SessionCallbacks {
    SessionCallbacks::new()
        .on_transcript_received(|text, is_user| {
            let speaker = if is_user { "you" } else { "assistant" };
            println!("[{}] {}", speaker, text);
        })
        .on_shopping_list_updated(|list| {
            println!("-- shopping list: {} items", list.len());
        })
        .on_error(|err| {
            eprintln!("error: {}", err.user_message());
        })
}

fn print_list(list: Option<&ShoppingListSnapshot>) {
    match list {
        Some(list) if !list.is_empty() => {
            println!("Shopping list ({} items):", list.len());
            for item in &list.items {
                let unit = item.unit.as_deref().unwrap_or("");
                println!("  - {} {}{} [{}]", item.name, item.quantity, unit, item.category);
            }
        }
        _ => println!("Shopping list is empty"),
    }
}

async fn listen(cfg: &Config, file: &str, linger_secs: u64) -> Result<()> {
    let path = expand_path(file)?;
    let controller = SessionController::with_websocket(cfg.session_config());
    let assistant = VoiceAssistant::new(
        controller,
        Box::new(FileCapture::new(path)),
        cfg.assistant_config(),
        console_callbacks(),
    );

    let mut updates = assistant.subscribe();
    assistant.start_listening().await;

    let state = assistant.state();
    if !state.is_recording {
        anyhow::bail!(
            "Could not start listening: {}",
            state.last_error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    // Wait for the file to run out
    while updates.borrow_and_update().is_recording {
        if updates.changed().await.is_err() {
            break;
        }
    }

    info!("Audio finished, waiting {}s for the final list", linger_secs);
    tokio::time::sleep(Duration::from_secs(linger_secs)).await;

    let stats = assistant.controller().stats();
    info!(
        "Sent {} chunks ({} dropped)",
        stats.chunks_sent,
        assistant.bridge().chunks_dropped()
    );

    print_list(assistant.state().shopping_list.as_ref());
    assistant.end_session().await;
    Ok(())
}

async fn say(cfg: &Config, text: &str, wait_secs: u64) -> Result<()> {
    let controller = SessionController::with_websocket(cfg.session_config());
    controller.set_callbacks(console_callbacks());

    controller
        .start_session()
        .await
        .context("Failed to start voice session")?;

    if !controller.send_test_audio(text) {
        warn!("Phrase was not sent: session not active");
    }

    tokio::time::sleep(Duration::from_secs(wait_secs)).await;

    print_list(controller.shopping_list().as_ref());
    controller.stop_session().await;
    Ok(())
}

async fn serve(cfg: &Config, file: &str) -> Result<()> {
    let path = expand_path(file)?;
    let controller = SessionController::with_websocket(cfg.session_config());
    let assistant = VoiceAssistant::new(
        controller,
        Box::new(FileCapture::new(path)),
        cfg.assistant_config(),
        SessionCallbacks::default(),
    );

    let app = create_router(AppState::new(assistant.clone())).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Control API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");
    assistant.end_session().await;
    Ok(())
}
