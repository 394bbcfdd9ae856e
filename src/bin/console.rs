//! Interactive console for the SenseGuide voice controller.
//!
//! Each line typed on stdin is treated as recognized speech; spoken output is
//! printed to stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use senseguide::conversation::{FocusedConversation, VoiceController};
use senseguide::navigation::{Navigator, RouteId};
use senseguide::responder::{ApiResponseGenerator, CannedResponder, ResponseGenerator};
use senseguide::runtime::RuntimeEvent;
use senseguide::speech::loopback::{LoopbackDriver, LoopbackProvider, SynthesisMode};
use senseguide::speech::{HttpTokenSource, StaticToken, TokenSource};
use senseguide::{ControllerHandle, VoiceConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SenseGuide voice controller console.
#[derive(Parser)]
#[command(name = "senseguide-console", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL serving `/speech/token` (overrides the config file).
    #[arg(long, env = "SENSEGUIDE_TOKEN_URL")]
    token_url: Option<String>,

    /// Simulated playback time per utterance, in milliseconds.
    #[arg(long, default_value_t = 1500)]
    speech_ms: u64,

    /// Start without entering voice mode.
    #[arg(long)]
    no_start: bool,
}

/// Navigator that feeds requests back as page changes, like a host view would.
struct ConsoleNavigator {
    tx: mpsc::UnboundedSender<RouteId>,
}

impl Navigator for ConsoleNavigator {
    fn navigate_to(&self, route: RouteId) {
        let _ = self.tx.send(route);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("senseguide=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VoiceConfig::from_file(path)?,
        None => {
            let path = VoiceConfig::default_config_path();
            if path.exists() {
                VoiceConfig::from_file(&path)?
            } else {
                VoiceConfig::default()
            }
        }
    };
    config.apply_env();
    if cli.token_url.is_some() {
        config.speech.token_url = cli.token_url.clone();
    }

    let tokens: Arc<dyn TokenSource> = match &config.speech.token_url {
        Some(url) => Arc::new(HttpTokenSource::new(Some(url.clone()))),
        None => Arc::new(StaticToken::new("console", "local")),
    };
    let generator: Arc<dyn ResponseGenerator> = if config.responder.api_key.is_some() {
        Arc::new(ApiResponseGenerator::new(config.responder.clone()))
    } else {
        info!("no responder API key configured, questions get the apology");
        Arc::new(CannedResponder::new(config.responder.apology.clone()))
    };

    let provider = LoopbackProvider::new()
        .with_synthesis(SynthesisMode::After(Duration::from_millis(cli.speech_ms)));
    let driver = provider.driver();

    let (nav_tx, mut nav_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let (handle, controller_task) = VoiceController::new(config, Arc::new(provider), tokens)
        .with_generator(generator)
        .with_navigator(Arc::new(ConsoleNavigator { tx: nav_tx }))
        .spawn(cancel.clone());

    tokio::spawn(print_events(handle.subscribe()));

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    println!("SenseGuide console v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Type what you would say. `~text` is a partial result, `:page <path>`, `:focus`, `:start`, `:stop`, `:quit`.\n"
    );

    if !cli.no_start {
        handle.start().await?;
    }

    let mut focus = FocusedConversation::new(handle.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            Some(route) = nav_rx.recv() => handle.page_changed(route).await?,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(line.trim(), &handle, &driver, &mut focus).await? {
                    break;
                }
            }
        }
    }

    focus.deactivate();
    if !cancel.is_cancelled() {
        handle.stop().await?;
        cancel.cancel();
    }
    controller_task.await?;
    Ok(())
}

/// Apply one console line. Returns `false` to quit.
async fn handle_line(
    line: &str,
    handle: &ControllerHandle,
    driver: &LoopbackDriver,
    focus: &mut FocusedConversation,
) -> anyhow::Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }

    if let Some(partial) = line.strip_prefix('~') {
        driver.partial(partial);
        return Ok(true);
    }

    let mut parts = line.splitn(2, ' ');
    match parts.next() {
        Some(":quit") => return Ok(false),
        Some(":start") => handle.start().await?,
        Some(":stop") => handle.stop().await?,
        Some(":focus") => {
            if focus.is_active() {
                focus.deactivate();
                println!("[focus] off");
            } else {
                focus.activate().await?;
                println!("[focus] on");
            }
        }
        Some(":page") => match parts.next().and_then(RouteId::from_path) {
            Some(route) => handle.page_changed(route).await?,
            None => println!("[page] unknown path"),
        },
        _ => {
            if !driver.final_result(line) {
                println!("[mic] not listening, type :start");
            }
        }
    }
    Ok(true)
}

async fn print_events(mut events: broadcast::Receiver<RuntimeEvent>) {
    loop {
        match events.recv().await {
            Ok(RuntimeEvent::Speaking { text, .. }) => println!("SenseGuide: {text}"),
            Ok(RuntimeEvent::StateChanged { to, .. }) => println!("[{to}]"),
            Ok(RuntimeEvent::BargeIn { .. }) => println!("[interrupted]"),
            Ok(RuntimeEvent::NavigationRequested { route }) => println!("[navigate] {route}"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
