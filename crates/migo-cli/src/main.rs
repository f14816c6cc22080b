mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use migo_config::{ConfigLoader, LogFormat, MigoConfig};
use migo_db::{DirSource, Migrator, RunContext};
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "migo", version, about = "Apply numbered SQL migrations exactly once")]
struct Cli {
    /// Config file (.yml, .yaml or .toml)
    #[arg(short, long, env = "MIGO_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Directory containing the migrations/ folder
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Stop starting new migrations after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending forward migrations
    Apply,
    /// Drop migo bookkeeping, leaving applied schema changes in place
    Purge,
    /// Show applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("migo: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    match run(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("migo: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<MigoConfig> {
    let mut config =
        ConfigLoader::load_or_default(cli.config.as_deref()).context("failed to load config")?;

    if let Some(db) = &cli.database {
        config.database_path = db.clone();
    }
    if let Some(root) = &cli.root {
        config.migrations_root = root.clone();
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = Some(secs);
    }
    Ok(config)
}

fn init_tracing(config: &MigoConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "migo={0},migo_db={0},migo_config={0}",
            config.log_level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn open_database(config: &MigoConfig) -> Result<Connection> {
    info!("opening database at {}", config.database_path.display());
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .context("failed to set pragmas")?;
    Ok(conn)
}

/// Returns whether the command fully succeeded.
async fn run(command: Command, config: MigoConfig) -> Result<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut ctx = RunContext::background().with_shutdown(shutdown_rx);
    if let Some(timeout) = config.timeout() {
        ctx = ctx.with_timeout(timeout);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current migration");
            let _ = shutdown_tx.send(true);
        }
    });

    // rusqlite is blocking; keep it off the async workers.
    tokio::task::spawn_blocking(move || execute(command, &config, &ctx))
        .await
        .context("migration task panicked")?
}

fn execute(command: Command, config: &MigoConfig, ctx: &RunContext) -> Result<bool> {
    let mut conn = open_database(config)?;
    let source = DirSource::new(&config.migrations_root);
    let migrator = Migrator::default();

    match command {
        Command::Apply => {
            let report = match migrator.apply_with(ctx, &mut conn, &source) {
                Ok(r) => r,
                Err(e) if e.is_unrecoverable() => {
                    bail!("{e}; database state is ambiguous, stopping")
                }
                Err(e) => return Err(e).context("migration run aborted"),
            };
            report::print_apply(&report);
            Ok(report.is_success())
        }
        Command::Purge => {
            migrator
                .purge_with(ctx, &mut conn)
                .context("failed to purge migo metadata")?;
            println!("Dropped {}", migrator.store().table());
            Ok(true)
        }
        Command::Status => {
            let status = migrator
                .status(&mut conn, &source)
                .context("failed to read migration status")?;
            report::print_status(&status);
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "migo",
            "--database",
            "flag.db",
            "--root",
            "/flag/root",
            "--timeout",
            "9",
            "apply",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.database_path, PathBuf::from("flag.db"));
        assert_eq!(config.migrations_root, PathBuf::from("/flag/root"));
        assert_eq!(config.timeout_secs, Some(9));
        assert!(matches!(cli.command, Command::Apply));
    }

    #[test]
    fn execute_apply_then_status_against_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let migrations = tmp.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("1_a.sql"), "CREATE TABLE a (id INTEGER);").unwrap();

        let config = MigoConfig {
            database_path: tmp.path().join("app.db"),
            migrations_root: tmp.path().to_path_buf(),
            ..MigoConfig::default()
        };
        let ctx = RunContext::background();

        assert!(execute(Command::Apply, &config, &ctx).unwrap());
        assert!(execute(Command::Status, &config, &ctx).unwrap());
        assert!(execute(Command::Purge, &config, &ctx).unwrap());
    }

    #[test]
    fn execute_apply_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let migrations = tmp.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("1_bad.sql"), "CREATE TABL a;").unwrap();

        let config = MigoConfig {
            database_path: tmp.path().join("app.db"),
            migrations_root: tmp.path().to_path_buf(),
            ..MigoConfig::default()
        };

        assert!(!execute(Command::Apply, &config, &RunContext::background()).unwrap());
    }
}
