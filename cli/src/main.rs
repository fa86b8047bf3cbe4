//! CLI entrypoint for review-council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use council_application::{
    ConversationLogger, CouncilEvent, EventPublisher, ReviewOrchestrator, SessionStore, events,
    lock_session,
};
use council_domain::SessionStatus;
use council_infrastructure::{
    BroadcastEventPublisher, CliTriggerFactory, ConfigLoader, DefaultPromptBuilder, FileConfig,
    InMemorySessionStore, JsonlConversationLogger,
};
use council_presentation::{
    AgentsArgs, Cli, Command, ConsoleFormatter, CouncilObserver, CouncilReport, ProgressReporter,
    ReportFormat, RunArgs, SimpleProgress, activity_sink, follow_events,
};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting review-council");

    let config = load_config(&cli)?;
    for warning in config.validate() {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    match &cli.command {
        Command::Run(args) => run(&cli, args, &config).await,
        Command::Agents(args) => {
            list_agents(args, &config);
            Ok(())
        }
    }
}

/// Initialize logging based on verbosity level; `RUST_LOG` wins when set.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    if cli.no_config {
        return Ok(ConfigLoader::load_defaults());
    }
    ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")
}

fn read_diff(path: &Path) -> Result<String> {
    let diff = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read diff from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read diff {}", path.display()))?
    };
    if diff.trim().is_empty() {
        bail!("The diff is empty; nothing to review.");
    }
    Ok(diff)
}

async fn run(cli: &Cli, args: &RunArgs, config: &FileConfig) -> Result<()> {
    let diff = read_diff(&args.diff)?;

    let session_config = config.session_config();
    if session_config.roster.iter().all(|a| !a.enabled) {
        bail!("No enabled agents are configured. Add [[agents]] entries to council.toml.");
    }

    let session_id = args
        .session_id
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("review-%Y%m%d-%H%M%S").to_string());

    // === Dependency Injection ===
    let store = Arc::new(InMemorySessionStore::new());
    let publisher = Arc::new(BroadcastEventPublisher::default());
    let factory = Arc::new(config.trigger_factory());

    let mut orchestrator = ReviewOrchestrator::new(
        store.clone() as Arc<dyn SessionStore>,
        factory,
        Arc::new(DefaultPromptBuilder),
    )
    .with_publisher(publisher.clone() as Arc<dyn EventPublisher>)
    .with_params(config.trigger.to_params());

    let log_path = args
        .conversation_log
        .clone()
        .or_else(|| config.logging.conversation_log.clone());
    if let Some(path) = log_path {
        match JsonlConversationLogger::new(&path) {
            Some(logger) => {
                info!("Conversation log: {}", path.display());
                orchestrator =
                    orchestrator.with_conversation_logger(Arc::new(logger) as Arc<dyn ConversationLogger>);
            }
            None => warn!("Conversation logging disabled"),
        }
    }

    let observer: Option<Arc<dyn CouncilObserver>> = if cli.quiet {
        None
    } else if std::io::stderr().is_terminal() {
        Some(Arc::new(ProgressReporter::new()))
    } else {
        Some(Arc::new(SimpleProgress))
    };
    if let Some(observer) = &observer {
        orchestrator = orchestrator.with_activity_sink(activity_sink(observer.clone()));
    }

    // Subscribe before the first transition so no phase change is missed
    let phases = publisher.subscribe();
    let stop_progress = CancellationToken::new();
    let progress_task = observer.clone().map(|observer| {
        tokio::spawn(follow_events(
            publisher.subscribe(),
            observer,
            stop_progress.clone(),
        ))
    });

    store.create(&session_id, session_config)?;
    orchestrator.begin_collecting(&session_id, diff)?;
    orchestrator.start_review(&session_id)?;

    let reached = wait_for_outcome(&orchestrator, &session_id, phases).await;
    match reached {
        Some(status) => info!(session = %session_id, "Stopped at phase {}", status),
        None => warn!(session = %session_id, "Interrupted before the council finished"),
    }

    orchestrator.close_session(&session_id).await;
    stop_progress.cancel();
    if let Some(task) = progress_task {
        let _ = task.await;
    }
    if let Some(observer) = &observer {
        observer.finish();
    }

    let report = {
        let shared = store.get(&session_id)?;
        let session = lock_session(&shared);
        CouncilReport::from_session(&session)
    };
    let output = match args.output {
        ReportFormat::Text => ConsoleFormatter::format(&report),
        ReportFormat::Json => ConsoleFormatter::format_json(&report),
    };
    println!("{}", output);

    Ok(())
}

/// Wait until the session reaches FIXING or COMPLETE, runs out of work, or
/// the user interrupts. Returns the status reached, `None` on interrupt.
async fn wait_for_outcome(
    orchestrator: &ReviewOrchestrator,
    session_id: &str,
    mut phases: broadcast::Receiver<CouncilEvent>,
) -> Option<SessionStatus> {
    let idle = orchestrator.wait_for_tasks(session_id);
    tokio::pin!(idle);
    let mut listening = true;

    loop {
        tokio::select! {
            received = phases.recv(), if listening => match received {
                Ok(event) if is_outcome(&event, session_id) => break,
                Ok(_) => {}
                // Missed events are recovered from the store below
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => listening = false,
            },
            // No agent is working and none will be prompted again
            _ = &mut idle => break,
            _ = tokio::signal::ctrl_c() => return None,
        }
    }

    orchestrator.status(session_id).ok()
}

fn is_outcome(event: &CouncilEvent, session_id: &str) -> bool {
    event.name == events::PHASE_CHANGED
        && event.payload.get("session_id").and_then(|v| v.as_str()) == Some(session_id)
        && matches!(
            event.payload.get("to").and_then(|v| v.as_str()),
            Some(to) if to == SessionStatus::Fixing.as_str() || to == SessionStatus::Complete.as_str()
        )
}

fn list_agents(args: &AgentsArgs, config: &FileConfig) {
    let factory: CliTriggerFactory = config.trigger_factory();
    let roster = config.roster();

    if roster.is_empty() {
        println!("No agents configured.");
        if let Some(path) = ConfigLoader::global_config_path() {
            println!("Add [[agents]] entries to ./council.toml or {}", path.display());
        }
        return;
    }

    for agent in roster.iter().filter(|a| args.all || a.enabled) {
        let program = factory.program_for(agent);
        let located = match factory.locate(agent) {
            Some(path) => format!("{}", path.display()).green(),
            None => format!("{} not found on PATH", program).red(),
        };
        let model = if agent.model.is_empty() {
            "default model".to_string()
        } else {
            agent.model.clone()
        };
        let enabled = if agent.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "{:<12} {:<7} {:<9} {:<20} {}",
            agent.id.bold(),
            agent.kind.as_str(),
            enabled,
            model,
            located
        );
    }
}
