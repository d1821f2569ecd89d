use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use cim_store_core::{MetadataCollection, NetworkService, validate_service};
use cim_store_db::{PersistenceConfig, Snapshot, WriterConfig};
use cim_store_sqlite::{
    DatabaseReader, DatabaseWriter, UpgradeRunner, backup_if_pending, status,
};
use rusqlite::{Connection, OpenFlags};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "cim-db")]
#[command(version, about = "Upgrade, inspect, import and export CIM network databases")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upgrade a database file to the current schema version in place.
    Upgrade(UpgradeArgs),
    /// Show the schema version, pending upgrades and table sizes of a database.
    Status(StatusArgs),
    /// Write a JSON snapshot to a new database file.
    Import(ImportArgs),
    /// Read a database file and write it out as a JSON snapshot.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct ConfigArg {
    /// YAML persistence configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct UpgradeArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    #[command(flatten)]
    config: ConfigArg,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    #[command(flatten)]
    config: ConfigArg,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// JSON snapshot to import.
    #[arg(long)]
    input: PathBuf,
    /// Database file to create.
    #[arg(long)]
    db: PathBuf,
    /// Overwrite the database file if it already exists.
    #[arg(long)]
    replace: bool,
    #[command(flatten)]
    config: ConfigArg,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Database file to read. Older files are upgraded first.
    #[arg(long)]
    db: PathBuf,
    /// JSON snapshot to write.
    #[arg(long)]
    output: PathBuf,
    #[command(flatten)]
    config: ConfigArg,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Upgrade(args) => run_upgrade(args),
        Command::Status(args) => run_status(args),
        Command::Import(args) => run_import(args),
        Command::Export(args) => run_export(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_upgrade(args: UpgradeArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let mut conn = open_existing(&args.db, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    let runner = UpgradeRunner::default();

    if config.reader.backup_before_upgrade {
        backup_if_pending(&args.db, &conn, &runner)
            .map_err(|e| format!("Failed to back up '{}': {e}", args.db.display()))?;
    }

    let report = runner
        .run(&mut conn)
        .map_err(|e| format!("Upgrade failed: {e}"))?;
    if report.is_noop() {
        println!(
            "'{}' is already at version {}.",
            args.db.display(),
            report.to
        );
    } else {
        let applied: Vec<String> = report.applied.iter().map(u32::to_string).collect();
        println!(
            "Upgraded '{}' from {} to {} (applied {}).",
            args.db.display(),
            describe_version(report.from),
            report.to,
            applied.join(", ")
        );
    }
    Ok(())
}

fn run_status(args: StatusArgs) -> Result<(), String> {
    // Status never needs configuration, but a bad config file is still reported.
    load_config(&args.config)?;
    let conn = open_existing(&args.db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let status = status(&conn, &UpgradeRunner::default())
        .map_err(|e| format!("Failed to read database status: {e}"))?;

    println!("Database Status:");
    println!("  Version: {}", describe_version(status.version));
    if status.pending.is_empty() {
        println!("  Pending upgrades: none");
    } else {
        let pending: Vec<String> = status.pending.iter().map(u32::to_string).collect();
        println!("  Pending upgrades: {}", pending.join(", "));
    }
    println!("  Tables:");
    for (table, rows) in &status.row_counts {
        println!("    {table}: {rows}");
    }
    Ok(())
}

fn run_import(args: ImportArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let snapshot = Snapshot::load(&args.input)
        .map_err(|e| format!("Failed to load snapshot '{}': {e}", args.input.display()))?;
    let (metadata, service) = snapshot
        .into_parts()
        .map_err(|e| format!("Invalid snapshot '{}': {e}", args.input.display()))?;

    for issue in validate_service(&service) {
        warn!(%issue, "Snapshot reference problem");
    }

    let writer_config = WriterConfig {
        replace_existing: args.replace || config.writer.replace_existing,
    };
    let report = DatabaseWriter::new(&args.db)
        .map_err(|e| format!("Failed to prepare writer: {e}"))?
        .with_config(writer_config)
        .save(&metadata, &service)
        .map_err(|e| format!("Failed to write '{}': {e}", args.db.display()))?;

    println!(
        "Imported {} objects into '{}' ({} rows, version {}).",
        service.len(),
        args.db.display(),
        report.total_rows(),
        report.version
    );
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let mut metadata = MetadataCollection::new();
    let mut service = NetworkService::new();
    let report = DatabaseReader::new(&args.db)
        .map_err(|e| format!("Failed to prepare reader: {e}"))?
        .with_config(config.reader)
        .load(&mut metadata, &mut service)
        .map_err(|e| format!("Failed to read '{}': {e}", args.db.display()))?;

    Snapshot::capture(&metadata, &service)
        .save(&args.output)
        .map_err(|e| format!("Failed to write snapshot '{}': {e}", args.output.display()))?;

    println!(
        "Exported {} objects from '{}' to '{}'.",
        report.objects_read,
        args.db.display(),
        args.output.display()
    );
    if !report.warnings.is_empty() {
        eprintln!("{} warnings:", report.warnings.len());
        for warning in &report.warnings {
            eprintln!("  {warning}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(arg: &ConfigArg) -> Result<PersistenceConfig, String> {
    PersistenceConfig::load_or_default(arg.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))
}

/// Opens a database that must already exist, so a mistyped path is not
/// silently created as an empty file.
fn open_existing(path: &Path, flags: OpenFlags) -> Result<Connection, String> {
    if !path.exists() {
        return Err(format!("Database '{}' does not exist", path.display()));
    }
    Connection::open_with_flags(path, flags)
        .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

fn describe_version(version: Option<u32>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "unversioned".to_string(),
    }
}
