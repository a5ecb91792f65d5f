//! CLI entrypoint for conclave
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use conclave_application::{
    AgentRegistry, Explorer, LlmNegotiator, MemorySearch, MessageBus, NoMemory, PatternEngine,
    ProviderClient, ToolExecutorPort, TurnExecutor, event_types,
};
use conclave_domain::{AgentId, PatternDef, SessionStatus};
use conclave_infrastructure::{
    BroadcastLiveEvents, ConfigLoader, FileConfig, JsonlEventRecorder, LocalExplorationBackend,
    LocalMemorySearch, LocalToolExecutor, TomlAgentRegistry, build_providers,
    check_agent_references, load_pattern,
};
use conclave_presentation::{
    Cli, Command, ConsoleFormatter, OutputFormat, ProgressReporter, RunArgs, SessionProgress,
    SimpleProgress, ValidateArgs,
};
use futures::StreamExt;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Command::Config = cli.command {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    let config = ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow!("failed to load configuration: {}", e))?;
    config.validate().context("invalid configuration")?;

    let _log_guard = init_logging(cli.verbose, config.logging.log_dir.as_deref())?;
    info!("Starting conclave");

    match cli.command {
        Command::Run(args) => run(args, config).await,
        Command::Validate(args) => validate(args),
        Command::Config => Ok(ExitCode::SUCCESS),
    }
}

/// Install the stderr subscriber and, when configured, a daily-rolling
/// file layer. `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "conclave.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            Ok(None)
        }
    }
}

/// Load and cross-check the pattern and agents files.
fn load_definitions(pattern: &Path, agents: &Path) -> Result<(PatternDef, TomlAgentRegistry)> {
    let pattern = load_pattern(pattern)?;
    let registry = TomlAgentRegistry::load(agents)?;
    if registry.is_empty() {
        bail!("agents file {} defines no agents", agents.display());
    }
    check_agent_references(&pattern, &registry)?;
    Ok((pattern, registry))
}

fn validate(args: ValidateArgs) -> Result<ExitCode> {
    let (pattern, registry) = load_definitions(&args.pattern, &args.agents)?;
    let agents = registry.get_agents(registry.ids())?;

    println!(
        "Pattern '{}' ({} phases), {} agents",
        pattern.name,
        pattern.phases.len(),
        agents.len()
    );
    let mut ok = true;
    for (index, phase) in pattern.phases.iter().enumerate() {
        let selected = phase.participants.select(&agents);
        let ids: Vec<&str> = selected.iter().map(|a| a.id.as_str()).collect();
        println!(
            "  {}. {} [{}, gate {}]: {}",
            index + 1,
            phase.id,
            phase.topology,
            phase.gate,
            if ids.is_empty() {
                "no participants".to_string()
            } else {
                ids.join(", ")
            }
        );
        ok &= !ids.is_empty();
    }

    if ok {
        println!("OK");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Some phases select no participants");
        Ok(ExitCode::FAILURE)
    }
}

async fn run(args: RunArgs, config: FileConfig) -> Result<ExitCode> {
    let (pattern, registry) = load_definitions(&args.pattern, &args.agents)?;
    let agent_ids: Vec<AgentId> = if args.agent_ids.is_empty() {
        registry.ids().to_vec()
    } else {
        args.agent_ids.iter().map(|id| AgentId::from(id.as_str())).collect()
    };

    if config.providers.is_empty() {
        bail!("no providers configured; add a [[providers]] section to the config file");
    }

    // === Dependency Injection ===
    let providers = build_providers(&config.providers)?;
    let client = Arc::new(ProviderClient::new(providers, config.to_provider_config()));

    let tools = LocalToolExecutor::from_config(&config.tools).context("opening tool workspace")?;
    let backend = Arc::new(LocalExplorationBackend::new(tools.workspace().clone()));
    let tools: Arc<dyn ToolExecutorPort> = Arc::new(tools);

    let memory: Arc<dyn MemorySearch> = match &config.memory.notes_dir {
        Some(dir) => Arc::new(LocalMemorySearch::new(dir, config.memory.max_snippets)),
        None => Arc::new(NoMemory),
    };

    let explorer = Arc::new(Explorer::new(
        Arc::clone(&client),
        backend,
        config.to_exploration_params(),
    ));
    let executor = Arc::new(TurnExecutor::new(
        Arc::clone(&client),
        tools,
        explorer,
        memory,
        config.to_executor_params(),
    ));
    let bus = Arc::new(MessageBus::new(config.to_bus_config()));
    let live = Arc::new(BroadcastLiveEvents::default());

    let mut engine = PatternEngine::new(executor, bus)
        .with_params(config.to_engine_params())
        .with_negotiator(Arc::new(LlmNegotiator::new(Arc::clone(&client))))
        .with_live_events(live.clone());

    if let Some(dir) = args.events_dir.as_ref().or(config.logging.events_dir.as_ref()) {
        let recorder = JsonlEventRecorder::new(dir)
            .with_context(|| format!("opening events directory {}", dir.display()))?;
        engine = engine.with_event_recorder(Arc::new(recorder));
    }

    let session = engine.prepare_session(&registry, &pattern, &agent_ids, args.task.clone())?;
    info!("Session {} prepared", session.id);

    // Progress display follows the live feed
    let watcher = if args.quiet || args.output == OutputFormat::Json {
        None
    } else {
        let progress: Arc<dyn SessionProgress> = if std::io::stderr().is_terminal() {
            Arc::new(ProgressReporter::new())
        } else {
            Arc::new(SimpleProgress)
        };
        let mut events = Box::pin(live.subscribe_session(session.id));
        Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                progress.on_event(&event.event_type, &event.payload);
                if event.event_type == event_types::SESSION_FINISHED {
                    break;
                }
            }
        }))
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next phase boundary");
            interrupt.cancel();
        }
    });

    let session = engine.run(&pattern, session, &cancel).await;
    for (provider, usage) in client.usage() {
        info!(
            "Provider {} used {} input / {} output tokens",
            provider, usage.input_tokens, usage.output_tokens
        );
    }

    // Dropping every sender ends the live stream
    drop(engine);
    drop(live);
    if let Some(watcher) = watcher {
        let _ = watcher.await;
    }

    let output = match args.output {
        OutputFormat::Full => ConsoleFormatter::format(&session),
        OutputFormat::Summary => ConsoleFormatter::format_summary(&session),
        OutputFormat::Json => ConsoleFormatter::format_json(&session),
    };
    println!("{}", output);

    Ok(match session.status {
        SessionStatus::Completed => ExitCode::SUCCESS,
        SessionStatus::Blocked => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    })
}
