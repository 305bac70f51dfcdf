//! bullysim - Bully Leader Election Simulator
//!
//! Command line front-end: configuration management, a scripted failure
//! scenario, and an interactive console for injecting failures by hand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bully_sim::config::{BullyConfig, ClusterConfig};
use bully_sim::error::{Error, Result};
use bully_sim::events::{ElectionEvent, EventKind, EventLog, EventSink, TracingSink};
use bully_sim::state::{FailOutcome, NodeId, NodeSnapshot, NodeStatus};
use bully_sim::{Cluster, Simulation};

/// bullysim - Bully Leader Election Simulator
#[derive(Parser)]
#[command(name = "bullysim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bullysim.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "bullysim.toml")]
        output: PathBuf,

        /// Number of nodes, numbered from 1
        #[arg(short, long, default_value_t = 5)]
        nodes: usize,

        /// Initial leader (defaults to the highest id)
        #[arg(long)]
        leader: Option<NodeId>,
    },

    /// Validate configuration file
    Validate,

    /// Show the effective configuration
    Info,

    /// Fail the leader repeatedly until no node is left
    Scenario {
        /// Seed for the choice of failure detectors
        #[arg(long)]
        seed: Option<u64>,

        /// Send events to the log instead of printing them
        #[arg(short, long)]
        quiet: bool,
    },

    /// Start the interactive console
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config);
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    init_logging(level, &logging.format);

    match cli.command {
        Commands::Init { output, nodes, leader } => run_init(output, nodes, leader),
        Commands::Validate => run_validate(&cli.config),
        Commands::Info => run_info(loaded?),
        Commands::Scenario { seed, quiet } => run_scenario(loaded?, seed, quiet),
        Commands::Run => run_console(loaded?).await,
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "compact" {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Load the configuration file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<BullyConfig> {
    if path.exists() {
        BullyConfig::from_file(path)
    } else {
        Ok(BullyConfig::default())
    }
}

/// Prints events to the console the way an event log panel shows them
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn on_event(&self, event: &ElectionEvent) {
        let icon = match event.kind() {
            EventKind::Started | EventKind::Detected => '!',
            EventKind::Failed | EventKind::Leaderless => 'x',
            EventKind::Elected | EventKind::Recovered => '+',
            EventKind::Message => ' ',
        };
        println!("[{}] {} {}", chrono::Local::now().format("%H:%M:%S"), icon, event);
    }
}

/// Write a new configuration file
fn run_init(output: PathBuf, nodes: usize, leader: Option<NodeId>) -> Result<()> {
    let mut config = BullyConfig::default();
    config.cluster = ClusterConfig::sequential(nodes);
    config.cluster.initial_leader = leader;
    config.validate()?;

    let content = format!(
        "# bullysim configuration\n# Generated configuration file\n\n{}",
        config.to_toml()?
    );
    std::fs::write(&output, content)?;

    println!("Configuration file created: {}", output.display());
    println!("Then start with: bullysim --config {} run", output.display());
    Ok(())
}

/// Validate configuration
fn run_validate(config_path: &Path) -> Result<()> {
    match BullyConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Nodes: {:?}", config.cluster.ids);
            if let Some(leader) = config.cluster.initial_leader_id() {
                println!("  Initial Leader: P{}", leader);
            }
            println!("  Size Range: {}..={}", config.cluster.min_size, config.cluster.max_size);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show the effective configuration
fn run_info(config: BullyConfig) -> Result<()> {
    println!("Bully Simulator Configuration");
    println!("=============================");
    println!();
    println!("Cluster:");
    println!("  Nodes:          {:?}", config.cluster.ids);
    println!(
        "  Initial Leader: {}",
        config
            .cluster
            .initial_leader_id()
            .map(|id| format!("P{}", id))
            .unwrap_or_else(|| "none".into())
    );
    println!("  Size Range:     {}..={}", config.cluster.min_size, config.cluster.max_size);
    match config.cluster.seed {
        Some(seed) => println!("  Seed:           {}", seed),
        None => println!("  Seed:           (random)"),
    }
    println!();
    println!("Timing:");
    println!("  Re-election:    {} ms", config.timing.reelection_delay_ms);
    println!("  Detection:      {} ms", config.timing.detection_interval_ms);
    println!();
    println!("Logging:");
    println!("  Level:          {}", config.logging.level);
    println!("  Format:         {}", config.logging.format);

    Ok(())
}

/// Fail the coordinator until the cluster is leaderless
fn run_scenario(mut config: BullyConfig, seed: Option<u64>, quiet: bool) -> Result<()> {
    if seed.is_some() {
        config.cluster.seed = seed;
    }

    let mut cluster = Cluster::from_config(&config.cluster)?;
    let log = EventLog::new();
    if quiet {
        cluster.subscribe(Arc::new(TracingSink));
    } else {
        cluster.subscribe(Arc::new(ConsoleSink));
    }
    cluster.subscribe(Arc::new(log.clone()));

    print_snapshot(&cluster.snapshot());
    loop {
        match cluster.fail_leader()? {
            FailOutcome::Leaderless => break,
            FailOutcome::LeaderFailed => {
                cluster.elect_after_failure()?;
            }
            FailOutcome::Failed | FailOutcome::Unchanged => {}
        }
    }
    println!();
    print_snapshot(&cluster.snapshot());

    println!();
    println!(
        "{} elections, {} messages, {} failures",
        log.count(EventKind::Elected),
        log.count(EventKind::Message),
        log.count(EventKind::Failed)
    );
    Ok(())
}

/// Interactive console over a running simulation
async fn run_console(config: BullyConfig) -> Result<()> {
    let sim = Simulation::from_config(&config)?;
    let history = EventLog::new();
    sim.subscribe(Arc::new(ConsoleSink)).await;
    sim.subscribe(Arc::new(history.clone())).await;

    tracing::info!("Simulation ready with {} nodes", config.cluster.ids.len());
    print_help();
    print_snapshot(&sim.snapshot().await);

    let console = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading input: {}", e);
                    break;
                }
            };

            let parts: Vec<&str> = line.split_whitespace().collect();
            let Some(command) = parts.first() else {
                continue;
            };
            if matches!(*command, "quit" | "exit") {
                break;
            }

            // Command errors are reported and the console keeps running
            if let Err(e) = handle_command(&sim, &history, command, &parts[1..]).await {
                println!("Error: {}", e);
            }
        }
    };

    tokio::select! {
        _ = console => tracing::info!("Console closed"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Received shutdown signal"),
    }

    sim.stop_failure_detection().await;
    Ok(())
}

async fn handle_command(
    sim: &Simulation,
    history: &EventLog,
    command: &str,
    args: &[&str],
) -> Result<()> {
    match command {
        "fail" => {
            let outcome = sim.fail(parse_id(args)?).await?;
            if outcome == FailOutcome::Unchanged {
                println!("Node already failed");
            }
        }
        "fail-leader" => {
            sim.fail_leader().await?;
        }
        "fail-random" => {
            sim.fail_random_non_leader().await?;
        }
        "recover" => {
            if !sim.recover(parse_id(args)?).await? {
                println!("Node already active");
            }
        }
        "recover-all" => {
            let recovered = sim.recover_all().await?;
            if recovered.is_empty() {
                println!("No failed nodes");
            }
        }
        "elect" => {
            if sim.start_election(parse_id(args)?).await?.is_none() {
                println!("Node cannot start an election");
            }
        }
        "status" => {
            let snapshot = sim.snapshot().await;
            if args.first() == Some(&"json") {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
                let summary = sim.summary().await;
                println!(
                    "Active: {}  Failed: {}  Leader: {}",
                    summary.active_nodes,
                    summary.failed_nodes,
                    summary
                        .leader_id
                        .map(|id| format!("P{}", id))
                        .unwrap_or_else(|| "none".into())
                );
            }
        }
        "history" => {
            for event in history.events() {
                println!("  {}", event);
            }
        }
        "auto" => match args.first().copied() {
            Some("on") => {
                if !sim.start_failure_detection().await {
                    println!("Automatic detection already running");
                }
            }
            Some("off") => {
                if !sim.stop_failure_detection().await {
                    println!("Automatic detection is not running");
                }
            }
            _ => println!("Usage: auto on|off"),
        },
        "help" => print_help(),
        other => println!("Unknown command: '{}'. Type 'help' for available commands.", other),
    }
    Ok(())
}

fn parse_id(args: &[&str]) -> Result<NodeId> {
    let raw = args
        .first()
        .ok_or_else(|| Error::InvalidCommand("missing node id".into()))?;
    raw.trim_start_matches(|c| c == 'P' || c == 'p')
        .parse()
        .map_err(|_| Error::InvalidCommand(format!("invalid node id '{}'", raw)))
}

fn print_help() {
    println!("Commands:");
    println!("  fail <id>         - Fail a node");
    println!("  fail-leader       - Fail the current coordinator");
    println!("  fail-random       - Fail a random non-leader node");
    println!("  recover <id>      - Recover a failed node");
    println!("  recover-all       - Recover every failed node");
    println!("  elect <id>        - Start an election from a node");
    println!("  status [json]     - Show node states");
    println!("  history           - Show every event so far");
    println!("  auto on|off       - Toggle automatic failure detection");
    println!("  help              - Show this help message");
    println!("  quit              - Exit");
}

fn print_snapshot(snapshot: &[NodeSnapshot]) {
    println!("{:<6} {:<8} {:<10} {}", "NODE", "STATUS", "ROLE", "COORDINATOR");
    for node in snapshot {
        let role = match node.status {
            NodeStatus::Failed => "-".to_string(),
            NodeStatus::Active => node.role.to_string(),
        };
        println!(
            "{:<6} {:<8} {:<10} {}",
            format!("P{}", node.id),
            node.status.to_string(),
            role,
            node.coordinator_id
                .map(|id| format!("P{}", id))
                .unwrap_or_else(|| "-".into())
        );
    }
}
