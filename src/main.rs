use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use labmirror::config::LoggingConfig;
use labmirror::sync::matches_exclusion_pattern;
use labmirror::{Config, SyncEngine, SyncResult};

#[derive(Parser)]
#[command(name = "labmirror")]
#[command(about = "GitLab group backup tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and create the backup root
    Init {
        /// Base directory for mirrored repositories
        #[arg(short, long, default_value = "~/gitlab-backup")]
        base_dir: String,
    },

    /// Mirror every reachable project (default when no command is given)
    Run,

    /// List projects that would be mirrored
    List {
        /// Show clone URLs alongside project paths
        #[arg(long)]
        details: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config)?;

    // Keep the guard alive so buffered file-log lines flush on exit
    let _guard = init_logging(&config.logging, cli.verbose)?;

    info!("Starting labmirror v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None | Some(Commands::Run) => cmd_run(&config).await,
        Some(Commands::Init { base_dir }) => cmd_init(base_dir, &config),
        Some(Commands::List { details }) => cmd_list(details, &config).await,
    }
}

/// Initialize logging: console plus a rotating file under the log directory
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<WorkerGuard> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    std::fs::create_dir_all(&logging.directory)
        .with_context(|| format!("Failed to create log directory: {}", logging.directory))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("backup")
        .filename_suffix("log")
        .max_log_files(logging.max_files)
        .build(&logging.directory)
        .context("Failed to create rotating log file")?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Initialize labmirror configuration and the backup root
fn cmd_init(base_dir: String, config: &Config) -> Result<()> {
    info!("Initializing labmirror...");

    // Create directory structure
    let expanded_base_dir = shellexpand::full(&base_dir)?;
    std::fs::create_dir_all(expanded_base_dir.as_ref())?;

    info!("Backup root set to: {}", expanded_base_dir);

    // Update config with new base directory if different
    let mut new_config = config.clone();
    new_config.base_directory = base_dir.clone();

    // Save updated config
    let config_path = Config::default_config_path()?;
    new_config.save(&config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ labmirror initialized successfully!");
    println!("   Config: {:?}", config_path);
    println!("   Backup root: {}", expanded_base_dir);
    println!("   Next: set GITLAB_TOKEN and run 'labmirror run'");

    Ok(())
}

/// Mirror every reachable project
async fn cmd_run(config: &Config) -> Result<()> {
    let engine = SyncEngine::new(config.clone())?;

    let summary = engine.run().await?;

    println!("\n🎉 Backup Complete!");
    println!("   🗂️  Groups processed: {}", summary.groups_processed);
    println!("   📊 Total projects: {}", summary.total_projects);
    println!("   📥 Cloned: {}", summary.cloned);
    println!("   🔄 Pulled: {}", summary.pulled);
    println!("   ⏭️  Skipped: {}", summary.skipped);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed > 0 {
        println!("\n🔍 Failed Operations:");
        for result in &summary.results {
            if let SyncResult::Failed { path, error } = result {
                println!("   ❌ {}: {}", path.display(), error);
            }
        }
    }

    // Individual failures are observable in logs and the summary; the
    // process still exits 0 once the traversal finishes.
    Ok(())
}

/// List projects that would be mirrored
async fn cmd_list(details: bool, config: &Config) -> Result<()> {
    let engine = SyncEngine::new(config.clone())?;

    let projects = engine.discover_projects().await;

    println!("Projects ({}):", projects.len());

    for project in projects {
        let excluded = matches_exclusion_pattern(
            &project.path_with_namespace,
            &config.gitlab.exclude_patterns,
        );

        if details {
            println!("  📁 {}", project.path_with_namespace);
            println!("     🔗 {}", project.http_url_to_repo);
            if excluded {
                println!("     ⏭️  Excluded by pattern");
            }
        } else if excluded {
            println!("  ⏭️  {} (excluded)", project.path_with_namespace);
        } else {
            println!("  📁 {}", project.path_with_namespace);
        }
    }

    Ok(())
}
