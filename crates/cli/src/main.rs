//! modspec CLI - modular design documents for feature specs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modspec_core::{ModuleError, ModuleType, WorkflowState};
use modspec_generation::{OllamaContentGenerator, DEFAULT_OLLAMA_URL};
use modspec_orchestrator::{GenerationOptions, ModuleOrchestrator, OrchestratorConfig};
use modspec_storage::FsDocumentStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "modspec")]
#[command(about = "Modular design documents for feature specs", long_about = None)]
struct Cli {
    /// Directory holding one sub-directory per feature
    #[arg(long, global = true, env = "MODSPEC_BASE_PATH")]
    base_path: Option<PathBuf>,

    /// Feature to operate on
    #[arg(long, short, global = true, env = "MODSPEC_FEATURE")]
    feature: Option<String>,

    /// JSON configuration file
    #[arg(long, global = true, env = "MODSPEC_CONFIG")]
    config: Option<PathBuf>,

    /// Ollama server URL
    #[arg(long, global = true, env = "MODSPEC_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Model used for generation
    #[arg(long, global = true, env = "MODSPEC_MODEL", default_value = "llama3")]
    model: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the feature's modules
    List,
    /// Generate modules from the requirements
    Generate {
        /// Module types (comma separated); detected when omitted
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        /// Overwrite existing modules
        #[arg(long)]
        force: bool,
        /// Generate one module at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Generate a single module
    GenerateModule {
        /// Module type
        module_type: String,
    },
    /// Regenerate a module and send it back to review
    Regenerate {
        /// Module type
        module_type: String,
    },
    /// Approve a module
    Approve {
        /// Module type
        module_type: String,
        /// Approver name
        #[arg(long)]
        by: Option<String>,
    },
    /// Reject a module
    Reject {
        /// Module type
        module_type: String,
    },
    /// Delete a module
    Delete {
        /// Module type
        module_type: String,
    },
    /// Split a legacy design.md into modules
    Migrate {
        /// Only show how sections would be classified
        #[arg(long)]
        dry_run: bool,
    },
    /// Check references across modules
    Analyze,
    /// Print a module
    Show {
        /// Module type
        module_type: String,
    },
    /// Replace a module's content
    Update {
        /// Module type
        module_type: String,
        /// File with the new content
        #[arg(long)]
        from: PathBuf,
    },
    /// Show review progress
    Status,
    /// Check whether a module was edited outside modspec
    Modified {
        /// Module type
        module_type: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ModuleError>() {
                Some(module_err) => {
                    let report = module_err.report();
                    eprintln!("error: {}", report.message);
                    eprintln!("  {}", report.detail);
                    if report.retryable {
                        eprintln!("  (retrying may help)");
                    }
                }
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!("Using feature base path {}", config.feature_base_path.display());

    let generator = Arc::new(OllamaContentGenerator::new(&cli.ollama_url, &cli.model));
    let store = Arc::new(FsDocumentStore::new());
    let orchestrator = ModuleOrchestrator::new(store, generator, config)?;

    let feature = cli
        .feature
        .as_deref()
        .context("no feature given (use --feature or MODSPEC_FEATURE)")?;
    let parse = |id: &str| orchestrator.catalog().parse(id);

    match cli.command {
        Commands::List => {
            let modules = orchestrator.get_module_list(feature).await?;
            println!("Modules of {}", feature);
            for module in modules {
                let size = module
                    .file_size
                    .map(|s| format!("{} bytes", s))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<16} | {:<14} | {:<5} | {}",
                    module.module_type,
                    module.workflow_state,
                    if module.exists { "yes" } else { "no" },
                    size,
                );
            }
        }
        Commands::Generate {
            types,
            force,
            sequential,
        } => {
            let mut options = GenerationOptions::default().with_force(force);
            if !types.is_empty() {
                let types = types
                    .iter()
                    .map(|t| parse(t.trim()))
                    .collect::<Result<Vec<_>, _>>()?;
                options = options.with_module_types(types);
            }
            if sequential {
                options = options.sequential();
            }

            let result = orchestrator.generate_modules(feature, options).await?;
            for t in &result.generated_modules {
                println!("  generated  {}", t);
            }
            for t in &result.skipped_modules {
                println!("  skipped    {}", t);
            }
            for failed in &result.failed_modules {
                println!("  failed     {}: {}", failed.module_type, failed.error);
            }
            if let Some(stats) = &result.stats {
                println!(
                    "Done in {:.1}s ({} ok, {} failed)",
                    stats.wall_time.as_secs_f64(),
                    stats.succeeded,
                    stats.failed
                );
            }
            if !result.success {
                anyhow::bail!("{} module(s) failed", result.failed_modules.len());
            }
        }
        Commands::GenerateModule { module_type } => {
            let module_type = parse(&module_type)?;
            orchestrator.generate_specific_module(feature, &module_type).await?;
            println!("Generated {}", module_type);
        }
        Commands::Regenerate { module_type } => {
            let module_type = parse(&module_type)?;
            let meta = orchestrator.regenerate_module(feature, &module_type).await?;
            println!("Regenerated {} ({})", module_type, meta.workflow_state);
        }
        Commands::Approve { module_type, by } => {
            let module_type = parse(&module_type)?;
            orchestrator
                .approve_module(feature, &module_type, by.as_deref())
                .await?;
            println!("Approved {}", module_type);
            print_gate(orchestrator.can_progress_to_tasks(feature).await?);
        }
        Commands::Reject { module_type } => {
            let module_type = parse(&module_type)?;
            orchestrator.reject_module(feature, &module_type).await?;
            println!("Rejected {}", module_type);
        }
        Commands::Delete { module_type } => {
            let module_type = parse(&module_type)?;
            orchestrator.delete_module(feature, &module_type).await?;
            println!("Deleted {}", module_type);
        }
        Commands::Migrate { dry_run } => {
            if !orchestrator.is_legacy_design(feature).await? {
                println!("{} has no legacy design to migrate", feature);
                return Ok(());
            }
            if dry_run {
                let analysis = orchestrator.analyze_legacy_design(feature).await?;
                for section in &analysis.sections {
                    println!(
                        "  {:<40} -> {:<16} ({:.0}%)",
                        section.title,
                        section.suggested_module,
                        section.confidence * 100.0
                    );
                }
                return Ok(());
            }

            let result = orchestrator.migrate_legacy_design(feature).await?;
            for t in &result.migrated_modules {
                println!("  migrated {}", t);
            }
            for failed in &result.failed_modules {
                println!("  failed   {}: {}", failed.module_type, failed.error);
            }
            if result.success {
                println!("Legacy design kept as design.md.backup");
            } else {
                anyhow::bail!("migration incomplete; design.md left in place");
            }
        }
        Commands::Analyze => {
            let analysis = orchestrator.analyze_references(feature).await?;
            if analysis.inconsistencies.is_empty() {
                println!("No inconsistencies found");
            }
            for issue in &analysis.inconsistencies {
                println!(
                    "  [{:?}] {} -> {}: {}",
                    issue.severity, issue.module1, issue.module2, issue.description
                );
                if let Some(suggestion) = &issue.suggestion {
                    println!("      {}", suggestion);
                }
            }
        }
        Commands::Show { module_type } => {
            let module_type = parse(&module_type)?;
            print!("{}", orchestrator.get_module_content(feature, &module_type).await?);
            let links = orchestrator.cross_links(feature, &module_type).await?;
            if !links.is_empty() {
                println!();
                println!("Related:");
                for link in links {
                    let marker = if link.exists { "" } else { " (missing)" };
                    println!("  {}{}", link.label, marker);
                }
            }
        }
        Commands::Update { module_type, from } => {
            let module_type = parse(&module_type)?;
            let content = tokio::fs::read_to_string(&from)
                .await
                .with_context(|| format!("reading {}", from.display()))?;
            let meta = orchestrator
                .update_module(feature, &module_type, &content)
                .await?;
            println!("Updated {} ({})", module_type, meta.workflow_state);
        }
        Commands::Status => {
            let modules = orchestrator.get_module_list(feature).await?;
            println!("modspec status for {}", feature);
            for state in [
                WorkflowState::NotGenerated,
                WorkflowState::PendingReview,
                WorkflowState::Approved,
                WorkflowState::Rejected,
            ] {
                let count = modules.iter().filter(|m| m.workflow_state == state).count();
                println!("  {}: {}", state, count);
            }
            if orchestrator.is_legacy_design(feature).await? {
                println!("  legacy design.md present (run `modspec migrate`)");
            }
            print_gate(orchestrator.can_progress_to_tasks(feature).await?);
        }
        Commands::Modified { module_type } => {
            let module_type: ModuleType = parse(&module_type)?;
            if orchestrator.is_module_modified(feature, &module_type).await? {
                println!("{} was edited outside modspec", module_type);
            } else {
                println!("{} is unchanged", module_type);
            }
        }
    }

    Ok(())
}

/// Config file first, then flags on top.
fn load_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let mut config = match &cli.config {
        Some(path) => OrchestratorConfig::from_json_file(path)?,
        None => OrchestratorConfig::default(),
    };
    if let Some(base) = &cli.base_path {
        config.feature_base_path = base.clone();
    }
    if config.feature_base_path.as_os_str().is_empty() {
        config.feature_base_path = PathBuf::from(".specs");
    }
    Ok(config)
}

fn print_gate(can_progress: bool) {
    if can_progress {
        println!("All generated modules approved; ready for tasks");
    } else {
        println!("Waiting on module reviews before tasks");
    }
}
