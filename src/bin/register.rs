//! Schema Register CLI
//!
//! Registers schema files with a schema-repo registry and previews the
//! subject names they map to.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schema_register::{
    discover_schema_files, BatchResult, InMemoryGateway, ReconciliationEngine, RegisterConfig,
    RegistryGateway, SchemaRepoClient, StrategyKind, StrategyOptions, SubjectNameStrategy,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-register")]
#[command(about = "Register schema files with a schema-repo registry")]
struct Cli {
    /// Configuration file (layered over schema-register.toml and the environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that derives subject names
#[derive(clap::Args)]
struct SourceArgs {
    /// Schema root directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// File extension to match (empty matches every file)
    #[arg(short, long)]
    ext: Option<String>,

    /// Subject naming strategy
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Strategy option, e.g. -D schema-register.hierarchical.separator=.
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    define: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing subjects and register every schema file
    Register {
        #[command(flatten)]
        source: SourceArgs,

        /// Registration workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write a JSON report of the run
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Run against an in-memory copy of the registry subject list
        #[arg(long)]
        dry_run: bool,
    },

    /// List the subjects currently in the registry
    Subjects,

    /// Show the subject name each schema file maps to
    Names {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Write the default configuration as TOML
    InitConfig {
        /// Output file
        #[arg(default_value = "schema-register.toml")]
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config =
        RegisterConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.url {
        config.registry.url = url;
    }
    if let Some(timeout) = cli.timeout_secs {
        config.registry.timeout_secs = timeout;
    }

    match cli.command {
        Commands::Register {
            source,
            workers,
            report,
            dry_run,
        } => {
            source.apply(&mut config);
            if let Some(workers) = workers {
                config.engine.workers = workers;
            }
            let strategy = source.strategy(&config)?;
            let files = discover(&config)?;

            let client = connect(&config)?;
            let gateway: Box<dyn RegistryGateway> = if dry_run {
                let live = client
                    .list_subjects()
                    .context("Failed to list registry subjects")?;
                info!(subjects = live.len(), "Dry run against an in-memory registry copy");
                Box::new(InMemoryGateway::with_subjects(
                    live.into_iter().map(|handle| handle.name().to_string()),
                ))
            } else {
                Box::new(client)
            };

            let engine =
                ReconciliationEngine::new(gateway, strategy).with_workers(config.engine.workers);
            let result = engine.reconcile(&files)?;

            print_result(&result, dry_run);
            if let Some(path) = report {
                write_report(&path, &config, &result, dry_run)?;
                println!("📄 Report written to {}", path.display());
            }

            result.into_result()?;
            Ok(())
        }

        Commands::Subjects => {
            let client = connect(&config)?;
            let subjects = client
                .list_subjects()
                .context("Failed to list registry subjects")?;

            println!("📚 {} subject(s) in {}", subjects.len(), config.registry.url);
            for subject in subjects {
                println!("  {}", subject);
            }
            Ok(())
        }

        Commands::Names { source } => {
            source.apply(&mut config);
            let strategy = source.strategy(&config)?;
            let files = discover(&config)?;
            let root = config.schema_dir();

            println!("🏷️  Subject names ({})", strategy);
            for file in &files {
                let shown = file.strip_prefix(&root).unwrap_or(file);
                match strategy.subject_name(file) {
                    Ok(subject) => println!("  {} -> {}", shown.display(), subject),
                    Err(e) => println!("  ❌ {}: {}", shown.display(), e),
                }
            }
            Ok(())
        }

        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            RegisterConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

impl SourceArgs {
    /// Let command-line values override the loaded configuration
    fn apply(&self, config: &mut RegisterConfig) {
        if let Some(dir) = &self.dir {
            config.source.dir = dir.clone();
        }
        if let Some(ext) = &self.ext {
            config.source.extension = ext.clone();
        }
        if let Some(strategy) = self.strategy {
            config.naming.strategy = strategy;
        }
    }

    fn strategy(&self, config: &RegisterConfig) -> Result<Box<dyn SubjectNameStrategy>> {
        let mut options: StrategyOptions = config.naming.strategy_options();
        for assignment in &self.define {
            options
                .insert_assignment(assignment)
                .map_err(anyhow::Error::msg)
                .context("Invalid -D option")?;
        }
        let strategy = config.naming.strategy.build(&options)?;
        info!(%strategy, "Using subject name strategy");
        Ok(strategy)
    }
}

fn connect(config: &RegisterConfig) -> Result<SchemaRepoClient> {
    SchemaRepoClient::with_timeout(&config.registry.url, config.registry.timeout())
        .with_context(|| format!("Cannot use registry URL {}", config.registry.url))
}

fn discover(config: &RegisterConfig) -> Result<Vec<PathBuf>> {
    let root = config.schema_dir();
    Ok(discover_schema_files(&root, &config.source.extension)?)
}

fn print_result(result: &BatchResult, dry_run: bool) {
    if dry_run {
        println!("🔍 Dry run, the registry was not modified\n");
    }
    for outcome in result.outcomes() {
        if outcome.is_success() {
            println!("  ✅ {}", outcome);
        } else {
            println!("  ❌ {}", outcome);
        }
    }

    let elapsed = (result.finished_at() - result.started_at())
        .to_std()
        .unwrap_or(Duration::ZERO);
    println!();
    println!("📊 SUMMARY:");
    println!("   Registered:       {}", result.success_count());
    println!("   Failed:           {}", result.failure_count());
    println!("   Subjects created: {}", result.subjects_created().len());
    println!("   Took:             {:.2?}", elapsed);
}

fn write_report(path: &Path, config: &RegisterConfig, result: &BatchResult, dry_run: bool) -> Result<()> {
    let report = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "registry": config.registry.url,
        "schema_dir": config.schema_dir(),
        "strategy": config.naming.strategy,
        "dry_run": dry_run,
        "summary": {
            "total": result.len(),
            "registered": result.success_count(),
            "failed": result.failure_count(),
            "subjects_created": result.subjects_created().len(),
        },
        "result": result,
    });
    std::fs::write(path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(())
}
