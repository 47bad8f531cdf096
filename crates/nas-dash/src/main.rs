use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::{FutureExt, StreamExt};
use nas_dash::config::Config;
use nas_dash::{ui, AppEvent, Connector, Controller, ControllerOptions, EventPoster, KeyOutcome};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nas-dash", version, about = "Live terminal dashboard for a storage appliance")]
struct Cli {
    /// Server profile name from the config file.
    #[arg(long)]
    server: Option<String>,
    /// Path to the config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write logs to this file; logging is discarded otherwise.
    #[arg(long, env = "NAS_DASH_LOG_FILE")]
    log_file: Option<PathBuf>,
    /// Seconds before a polled tab is refetched on revisit.
    #[arg(long, value_name = "SECS")]
    stale_ttl: Option<u64>,
}

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&path)?;
    let (server_name, server) = config.select_server(cli.server.as_deref())?;

    let options = ControllerOptions {
        server_name: server_name.clone(),
        stale_ttl: cli
            .stale_ttl
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.stale_ttl()),
        retry_base: config.retry_base(),
    };
    let client_config = server.client_config();
    let connector: Connector =
        Box::new(move || async move { nas_client::connect(&client_config).await }.boxed());

    let (poster, events) = EventPoster::channel();
    let mut controller = Controller::connecting(options, poster, connector);
    info!(server = %server_name, config = %path.display(), "starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut controller, events).await;
    controller.shutdown().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn run(
    terminal: &mut Tui,
    controller: &mut Controller,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    let mut input = EventStream::new();
    let mut redraw = true;
    controller.on_ready();

    loop {
        if redraw {
            terminal.draw(|frame| ui::render(frame, controller))?;
            redraw = false;
        }
        tokio::select! {
            Some(event) = events.recv() => {
                redraw = controller.handle_event(event);
            }
            maybe_input = input.next() => {
                match maybe_input {
                    Some(Ok(Event::Key(key))) => match controller.handle_key(key) {
                        KeyOutcome::Quit => break,
                        KeyOutcome::Redraw => redraw = true,
                        KeyOutcome::Ignored => {}
                    },
                    Some(Ok(Event::Resize(_, _))) => redraw = true,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err).context("reading terminal input"),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}
