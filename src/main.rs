use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;

use voice_navigator::command::{self, Outcome};
use voice_navigator::config::{Config, DEFAULT_CONFIG_PATH};
use voice_navigator::coordinator::Coordinator;
use voice_navigator::dom::PageSnapshot;
use voice_navigator::page::PageEvent;
use voice_navigator::repl;
use voice_navigator::resolve::resolve_at;
use voice_navigator::speech::{ChannelRecognizer, ConsoleSpeech};
use voice_navigator::{TabId, clean, logging, ui};

const DEMO_PAGE: &str = include_str!("../demos/article.json");
const FALLBACK_URL: &str = "https://example.com";

#[derive(Parser)]
#[command(name = "voice-navigator", about = "Voice navigation and read-aloud for web pages")]
struct Cli {
    /// Config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print text the way it would be spoken
    Clean { text: String },
    /// Show which page command a phrase maps to
    Interpret { utterance: String },
    /// Print the readable text at a point of a page snapshot
    Resolve {
        #[arg(long)]
        page: PathBuf,
        x: f64,
        y: f64,
    },
    /// Interactive session against a page
    Run {
        /// Page snapshot (JSON); a built-in article when omitted
        #[arg(long)]
        page: Option<PathBuf>,
        /// Page URL, overriding the snapshot's
        #[arg(long)]
        url: Option<String>,
    },
}

#[hotpath::main]
fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config);

    match cli.command {
        Command::Clean { text } => {
            println!("{}", clean::clean(&text));
            Ok(())
        }
        Command::Interpret { utterance } => {
            let interpreter = command::CommandInterpreter::new(&config.commands);
            match interpreter.interpret(&utterance) {
                Some(command) => println!("{}", command),
                None => println!("no command"),
            }
            Ok(())
        }
        Command::Resolve { page, x, y } => {
            let doc = load_snapshot(&page)?.into_document();
            match resolve_at(&doc, x, y) {
                Some(resolved) => println!("{}", clean::clean(&resolved.text)),
                None => println!("nothing readable at ({}, {})", x, y),
            }
            Ok(())
        }
        Command::Run { page, url } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start runtime")?;
            let result = runtime.block_on(run(config, page, url));
            // Don't wait on the blocked stdin reader
            runtime.shutdown_background();
            result
        }
    }
}

fn load_snapshot(path: &Path) -> Result<PageSnapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    PageSnapshot::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))
}

async fn run(config: Config, page: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let snapshot = match page {
        Some(path) => load_snapshot(&path)?,
        None => PageSnapshot::from_json(DEMO_PAGE).context("built-in page")?,
    };
    let url = url
        .or_else(|| snapshot.url.clone())
        .unwrap_or_else(|| FALLBACK_URL.to_string());

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || on_signal.cancel()).context("failed to set Ctrl-C handler")?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut coordinator =
        Coordinator::new(config, Box::new(ConsoleSpeech)).with_events(event_tx);

    let (recognizer, feed) = ChannelRecognizer::new();
    let tab = coordinator.open_tab(&url, snapshot.into_document(), Box::new(recognizer));
    let microphones = BTreeMap::from([(tab, feed)]);

    ui::info(&format!("{} on tab {}: {}", coordinator.config().name, tab, url));
    ui::info("type /help for commands");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = LinesStream::new(stdin.lines());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some((tab, event)) = event_rx.recv() => show_event(tab, event),
            line = lines.next() => {
                let Some(line) = line else { break };
                let line = line.context("failed to read stdin")?;
                match repl::parse_line(&line) {
                    Ok(input) => {
                        let flow = repl::handle_input(input, &mut coordinator, &microphones).await;
                        if flow.is_break() {
                            break;
                        }
                    }
                    Err(message) => ui::error(&message),
                }
            }
        }
    }

    coordinator.shutdown();
    ui::info("bye");
    Ok(())
}

fn show_event(tab: TabId, event: PageEvent) {
    match event {
        PageEvent::Interim(text) => ui::show_interim(&text),
        PageEvent::Final(text) => ui::show_final(&text),
        PageEvent::Executed { command, outcome } => {
            let result = match outcome {
                Outcome::Opened(url) => format!("opened {} in a new tab", url),
                Outcome::Scrolled(dy) => format!("scrolled by {}", dy),
                Outcome::Reloaded => "reloaded".to_string(),
                Outcome::Clicked(node) => format!("clicked element #{}", node),
                Outcome::NoMatch => "nothing matched".to_string(),
            };
            ui::command(&format!("[tab {}] {}: {}", tab, command, result));
        }
        PageEvent::Ignored(text) => ui::info(&format!("[tab {}] not a command: {}", tab, text)),
        PageEvent::RecognitionError(message) => ui::error(&message),
        PageEvent::ListeningEnded => ui::info(&format!("[tab {}] stopped listening", tab)),
    }
}
