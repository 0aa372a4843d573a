use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use orchid::config::Config;
use orchid::llm::LlmClient;
use orchid::olog;
use orchid::orchestrator::{CriteriaVerifier, Orchestrator, Plan, ToolTaskExecutor};
use orchid::tools::ToolRegistry;
use orchid::workflow::{compiler, to_visualization_json, WorkflowExecutor};
use orchid::{Context, Result, Value};

/// Orchid - recursive task orchestration and declarative workflow engine
#[derive(Parser, Debug)]
#[command(name = "orchid")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    ORCHID_DEBUG=1    Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.orchid/orchid.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile and run a workflow file
    Run {
        /// Path to the workflow YAML
        file: PathBuf,

        /// Simulate agents instead of executing them
        #[arg(long)]
        dry_run: bool,

        /// Input binding, repeatable: -i name=value
        #[arg(short = 'i', long = "input", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
    },
    /// Compile a workflow file without running it
    Check {
        /// Path to the workflow YAML
        file: PathBuf,
    },
    /// Solve a declarative plan with the meta-orchestrator
    Solve {
        /// Path to the plan YAML
        file: PathBuf,

        /// Input binding, repeatable: -i name=value
        #[arg(short = 'i', long = "input", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,

        /// Override the decomposition depth cap
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Export a workflow as visualization JSON
    Export {
        /// Path to the workflow YAML
        file: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Draft a workflow skeleton from free-form spec text
    Draft {
        /// The spec in natural language
        spec: String,
    },
}

fn parse_input(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    // YAML scalar parsing gives numbers/bools/lists for free; anything that
    // fails to parse stays a plain string.
    let parsed = serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::from(value));
    Ok((name.to_string(), parsed))
}

fn to_context(inputs: Vec<(String, Value)>) -> Context {
    let mut context = Context::new();
    for (name, value) in inputs {
        context.insert(name, value);
    }
    context
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    orchid::log::init_with_debug(cli.debug);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Run {
            file,
            dry_run,
            inputs,
        } => {
            let workflow = compiler::compile(&std::fs::read_to_string(&file)?)?;
            let registry = Arc::new(ToolRegistry::with_builtins());
            let executor = WorkflowExecutor::new(registry);
            let outputs = executor.run(&workflow, &to_context(inputs), dry_run)?;
            println!("{}", serde_json::to_string_pretty(&outputs)?);
            Ok(())
        }
        Command::Check { file } => {
            let workflow = compiler::compile(&std::fs::read_to_string(&file)?)?;
            println!(
                "workflow '{}' compiles: {} nodes, {} edges",
                workflow.name,
                workflow.nodes.len(),
                workflow.edges.len()
            );
            Ok(())
        }
        Command::Solve {
            file,
            inputs,
            max_depth,
        } => {
            let plan = Plan::from_file(&file)?;
            let config = Config::load().unwrap_or_default();
            let registry = Arc::new(ToolRegistry::with_builtins());
            let mut orchestrator = Orchestrator::new(
                Box::new(plan.decomposer()),
                Box::new(ToolTaskExecutor::new(registry)),
                Box::new(CriteriaVerifier::new()),
                plan.combiner(),
            )
            .with_max_depth(max_depth.unwrap_or_else(|| config.effective_max_depth()));

            let root = plan.root_task().with_inputs(to_context(inputs));
            let report = orchestrator.solve(root);
            olog!(
                "plan '{}' solved: verified={}, atomic_executions={}",
                plan.name(),
                report.verified,
                report.atomic_executions
            );

            println!("verified: {}", report.verified);
            if let Some(result) = &report.result {
                println!("result: {}", serde_json::to_string_pretty(result)?);
            }
            if let Some(error) = &report.error {
                println!("error: {error}");
            }
            println!("atomic executions: {}", report.atomic_executions);
            Ok(())
        }
        Command::Export { file, output } => {
            let workflow = compiler::compile(&std::fs::read_to_string(&file)?)?;
            let doc = to_visualization_json(&workflow);
            let json = serde_json::to_string_pretty(&doc)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("wrote visualization JSON to {}", path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Command::Draft { spec } => {
            let draft = LlmClient::stub().draft_workflow(&spec);
            for warning in &draft.warnings {
                eprintln!("warning: {warning}");
            }
            print!("{}", draft.yaml_text);
            Ok(())
        }
    }
}
