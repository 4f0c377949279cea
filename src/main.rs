use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trellis_config::{EngineConfig, WorkflowDef};
use trellis_effects::StandardDispatcher;
use trellis_engine::{RunRegistry, RunStatus, Scheduler};
use trellis_workflow::Workflow;

/// Trellis - a workflow engine for agent, action, condition and delay nodes
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.trellis)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Engine config file (default: <data-dir>/engine.json when present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow, reading initial variables as JSON from stdin
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Check a workflow file without running it
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis=info,warn")),
    )
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".trellis"),
  };

  match cli.command {
    Some(Commands::Run { workflow_file }) => {
      let config = load_config(cli.config.as_deref(), &data_dir)?;
      let rt = tokio::runtime::Runtime::new()?;
      let status = rt.block_on(run_workflow(workflow_file, config))?;
      if status == RunStatus::Failed {
        std::process::exit(1);
      }
    }
    Some(Commands::Validate { workflow_file }) => {
      let workflow = load_workflow(&workflow_file)?;
      println!(
        "{}: {} nodes, {} edges",
        workflow.workflow_id,
        workflow.nodes.len(),
        workflow.edges.len()
      );
    }
    None => {
      println!("trellis - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_workflow(workflow_file: PathBuf, config: EngineConfig) -> Result<RunStatus> {
  let workflow = load_workflow(&workflow_file)?;
  info!(workflow_id = %workflow.workflow_id, nodes = workflow.nodes.len(), "loaded workflow");

  let variables = read_variables_from_stdin()?;

  let dispatcher =
    StandardDispatcher::from_config(&config).context("failed to create agent client")?;
  let scheduler = Scheduler::new(Arc::new(dispatcher)).with_config(&config);
  let registry = RunRegistry::new(scheduler);

  let run_id = registry
    .submit(workflow, variables)
    .await
    .context("workflow rejected")?;

  let ctx = tokio::select! {
    ctx = registry.wait(&run_id) => ctx,
    _ = tokio::signal::ctrl_c() => {
      registry.cancel(&run_id).await;
      registry.wait(&run_id).await
    }
  }
  .with_context(|| format!("run '{}' disappeared", run_id))?;

  println!("{}", serde_json::to_string_pretty(&ctx)?);
  Ok(ctx.status)
}

fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<EngineConfig> {
  let config = match path {
    Some(path) => EngineConfig::from_path(path)?,
    None => {
      let default_path = data_dir.join("engine.json");
      if default_path.exists() {
        EngineConfig::from_path(&default_path)?
      } else {
        EngineConfig::default()
      }
    }
  };
  config.validate()?;
  Ok(config)
}

fn load_workflow(workflow_file: &Path) -> Result<Workflow> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let def = WorkflowDef::from_json(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  Workflow::from_def(def)
    .with_context(|| format!("invalid workflow: {}", workflow_file.display()))
}

fn read_variables_from_stdin() -> Result<serde_json::Map<String, serde_json::Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::Map::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read variables from stdin")?;

  if input.trim().is_empty() {
    return Ok(serde_json::Map::new());
  }
  serde_json::from_str(&input).context("variables on stdin must be a JSON object")
}
