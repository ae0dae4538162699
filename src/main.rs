use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use astroflow_core::config::Settings;
use astroflow_core::event::EventBus;
use astroflow_core::types::RunEvent;

use astroflow_engine::{ExecutionController, ExecutionState, Graph, VariableEnvironment};

#[derive(Parser)]
#[command(name = "astroflow", version, about = "Step-by-step executor for observatory workflows")]
struct Cli {
    /// Path to settings file
    #[arg(short, long, default_value = "astroflow.toml", env = "ASTROFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow file for structural errors
    Validate {
        /// Workflow graph (JSON with `nodes` and `edges`)
        workflow: PathBuf,
    },
    /// Run a workflow until it completes or Ctrl-C is pressed
    Run {
        workflow: PathBuf,
        /// Override the delay between steps, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Initial variable as NAME=JSON (bare strings are accepted)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Advance through a workflow by hand, printing each visited node
    Step {
        workflow: PathBuf,
        /// Maximum number of steps
        #[arg(long, short = 'n', default_value = "100")]
        count: usize,
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
    /// Drive a workflow interactively (start, pause, step, stop)
    Repl {
        workflow: PathBuf,
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before settings loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "astroflow", &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings::load_or_default(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log.filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Validate { workflow } => {
            let graph = load_graph(&workflow)?;
            graph.validate()?;
            println!(
                "{}: {} nodes, {} edges, ok",
                workflow.display(),
                graph.nodes().len(),
                graph.edges().len()
            );
        }
        Commands::Run {
            workflow,
            delay_ms,
            vars,
            json,
        } => {
            let mut settings = settings;
            if let Some(delay_ms) = delay_ms {
                settings.execution.step_delay_ms = delay_ms;
            }
            let controller = build_controller(&workflow, &settings, &vars)?;
            run_workflow(&controller, json).await?;
        }
        Commands::Step {
            workflow,
            count,
            vars,
        } => {
            let controller = build_controller(&workflow, &settings, &vars)?;
            for _ in 0..count {
                match controller.step()? {
                    Some(node_id) => print_visit(controller.graph(), &node_id, &mut io::stdout())?,
                    None => break,
                }
            }
            print_summary(&controller.snapshot());
        }
        Commands::Repl { workflow, vars } => {
            let controller = build_controller(&workflow, &settings, &vars)?;
            run_repl(&controller).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before settings load"),
    }

    Ok(())
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow {}", path.display()))?;
    let graph = Graph::from_json(&content)
        .with_context(|| format!("parsing workflow {}", path.display()))?;
    info!(
        path = %path.display(),
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "Workflow loaded"
    );
    Ok(graph)
}

/// Parse `NAME=VALUE` pairs. Values are JSON; anything that fails to parse is a string.
fn parse_vars(pairs: &[String]) -> anyhow::Result<VariableEnvironment> {
    let mut env = VariableEnvironment::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid variable '{}', expected NAME=VALUE", pair))?;
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        env.set(name.trim(), value);
    }
    Ok(env)
}

fn build_controller(
    workflow: &Path,
    settings: &Settings,
    vars: &[String],
) -> anyhow::Result<ExecutionController> {
    let graph = load_graph(workflow)?;
    Ok(ExecutionController::builder(graph)
        .with_settings(&settings.execution)
        .with_simulation(&settings.simulation)
        .with_initial_variables(parse_vars(vars)?)
        .with_event_bus(Arc::new(EventBus::default()))
        .build())
}

async fn run_workflow(controller: &ExecutionController, json: bool) -> anyhow::Result<()> {
    let events = controller.subscribe();
    let handle = controller.start()?;

    let printer = {
        let controller = controller.clone();
        tokio::spawn(async move {
            print_events(controller.graph(), events, &mut io::stdout(), true).await;
        })
    };

    // Stop on Ctrl-C
    let stopper = {
        let controller = controller.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Stopping workflow...");
            controller.stop();
        })
    };

    handle.await?;
    printer.await.ok();
    stopper.abort();

    let state = controller.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_summary(&state);
    }
    if let Some(ref error) = state.error {
        anyhow::bail!("Workflow failed: {}", error);
    }
    Ok(())
}

fn print_visit(graph: &Graph, node_id: &str, out: &mut impl Write) -> io::Result<()> {
    let kind = graph
        .find_node(node_id)
        .map(|n| n.kind.name())
        .unwrap_or("?");
    writeln!(out, "-> {} [{}]", node_id, kind)
}

/// Print run events until the bus closes, or until the run ends when
/// `until_run_ends` is set. A lagging receiver skips ahead instead of quitting.
async fn print_events(
    graph: &Graph,
    mut events: broadcast::Receiver<RunEvent>,
    out: &mut impl Write,
    until_run_ends: bool,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Output fell behind, some visited nodes were not printed");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let (printed, ended) = match event {
            RunEvent::NodeVisited { node_id, .. } => (print_visit(graph, &node_id, out), false),
            RunEvent::RunCompleted { steps, .. } => {
                (writeln!(out, "Run completed after {} steps", steps), true)
            }
            RunEvent::RunFailed { error, .. } => (writeln!(out, "Run failed: {}", error), true),
            RunEvent::RunStopped { .. } => (Ok(()), true),
            _ => (Ok(()), false),
        };
        if let Err(e) = printed {
            warn!(error = %e, "Failed to write run output");
        }
        if ended && until_run_ends {
            break;
        }
    }
}

fn print_summary(state: &ExecutionState) {
    println!("Steps: {}", state.steps());
    println!("Path: {}", state.execution_path.join(" -> "));
    if !state.variables.is_empty() {
        let mut names: Vec<_> = state.variables.data().iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in names {
            println!("  {} = {}", name, value);
        }
    }
    if let Some(ref error) = state.error {
        println!("Error: {}", error);
    }
}

async fn run_repl(controller: &ExecutionController) -> anyhow::Result<()> {
    println!("Astroflow v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.\n");

    let events = controller.subscribe();
    let watcher = {
        let controller = controller.clone();
        tokio::spawn(async move {
            print_events(controller.graph(), events, &mut io::stdout(), false).await;
        })
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(command) = parts.first() else {
            continue;
        };

        match *command {
            "/quit" | "/exit" | "/q" => break,
            "/help" => {
                println!("  /start           Run from the start node");
                println!("  /pause           Pause or resume the run");
                println!("  /stop            Stop the run");
                println!("  /step            Advance one node");
                println!("  /delay <ms>      Set the delay between steps");
                println!("  /center on|off   Toggle view centering hints");
                println!("  /state           Show the current state");
                println!("  /quit            Exit");
            }
            "/start" => {
                if let Err(e) = controller.start() {
                    println!("Error: {}", e);
                }
            }
            "/pause" => {
                if controller.pause() {
                    println!("Paused");
                } else {
                    println!("Resumed");
                }
            }
            "/stop" => controller.stop(),
            "/step" => match controller.step() {
                Ok(Some(_)) => {}
                Ok(None) => println!("End of workflow"),
                Err(e) => println!("Error: {}", e),
            },
            "/delay" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(ms) => controller.set_step_delay(ms),
                None => println!("Usage: /delay <ms>"),
            },
            "/center" => match parts.get(1).copied() {
                Some("on") => controller.set_center_on_step(true),
                Some("off") => controller.set_center_on_step(false),
                _ => println!("Usage: /center on|off"),
            },
            "/state" => {
                let state = controller.snapshot();
                println!(
                    "running={} paused={} current={} delay={}ms",
                    state.is_running,
                    state.is_paused,
                    state.current_node_id.as_deref().unwrap_or("-"),
                    state.step_delay_ms
                );
                print_summary(&state);
            }
            other => warn!(command = %other, "Unknown command, try /help"),
        }
    }

    controller.stop();
    watcher.abort();
    Ok(())
}
