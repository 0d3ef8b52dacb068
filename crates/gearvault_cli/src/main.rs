//! Offline snapshot tool.
//!
//! # Responsibility
//! - Export or restore an inventory database without running the server.
//! - Print the table order the snapshot path uses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gearvault_core::db::StorageLocation;
use gearvault_core::registry::{inventory_dependencies, INVENTORY_TABLES};
use gearvault_core::{
    init_logging, LogSink, RestoreMode, RestoreProgress, Snapshot, SnapshotBackend,
    SqliteSnapshotBackend, TableRegistry,
};
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "gearvault", version, about = "GearVault snapshot tool")]
struct Cli {
    /// Log level written to stderr
    #[arg(long, global = true, env = "GEARVAULT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write every registered table as one JSON document
    Export {
        #[arg(long, env = "GEARVAULT_STORAGE_URL")]
        storage_url: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace every registered table with the contents of a snapshot file
    Restore {
        #[arg(long, env = "GEARVAULT_STORAGE_URL")]
        storage_url: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = RestoreMode::Atomic)]
        mode: RestoreMode,
    },
    /// Print the forward table order, one table per line
    Order {
        /// Compute the order from foreign-key edges instead of the built-in list
        #[arg(long)]
        derive: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, LogSink::Stderr).map_err(anyhow::Error::msg)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Export { storage_url, out: path } => {
            let snapshot = export(&storage_url)?;
            match path {
                Some(path) => write_snapshot_file(&snapshot, &path)?,
                None => {
                    out.write_all(&snapshot.to_json()?)?;
                    writeln!(out)?;
                }
            }
        }
        Command::Restore {
            storage_url,
            input,
            mode,
        } => {
            let progress = restore(&storage_url, &input, mode)?;
            writeln!(out, "{}", serde_json::to_string(&progress)?)?;
        }
        Command::Order { derive } => {
            for table in table_order(derive)?.forward_order() {
                writeln!(out, "{table}")?;
            }
        }
    }
    Ok(())
}

fn open_backend(storage_url: &str, mode: RestoreMode) -> Result<SqliteSnapshotBackend> {
    let location = StorageLocation::parse(storage_url)?;
    SqliteSnapshotBackend::open_inventory(&location, false, mode)
        .with_context(|| format!("failed to open inventory storage at `{location}`"))
}

fn export(storage_url: &str) -> Result<Snapshot> {
    let backend = open_backend(storage_url, RestoreMode::default())?;
    let snapshot = backend.export_all()?;
    info!(
        "event=cli_export module=cli status=ok tables={} rows={}",
        snapshot.len(),
        snapshot.total_rows()
    );
    Ok(snapshot)
}

fn write_snapshot_file(snapshot: &Snapshot, path: &Path) -> Result<()> {
    std::fs::write(path, snapshot.to_json()?)
        .with_context(|| format!("failed to write `{}`", path.display()))
}

fn restore(storage_url: &str, input: &Path, mode: RestoreMode) -> Result<RestoreProgress> {
    let bytes =
        std::fs::read(input).with_context(|| format!("failed to read `{}`", input.display()))?;
    let snapshot = Snapshot::from_json(&bytes)?;
    let backend = open_backend(storage_url, mode)?;

    let progress = backend.restore_all(&snapshot).map_err(|failure| {
        anyhow::anyhow!(
            "{failure}; cleared={:?} loaded={:?}",
            failure.progress.cleared,
            failure.progress.loaded
        )
    })?;
    info!(
        "event=cli_restore module=cli status=ok mode={mode} rows_inserted={}",
        progress.rows_inserted
    );
    Ok(progress)
}

fn table_order(derive: bool) -> Result<TableRegistry> {
    if derive {
        Ok(TableRegistry::derive(
            INVENTORY_TABLES.iter().copied(),
            &inventory_dependencies(),
        )?)
    } else {
        Ok(TableRegistry::inventory())
    }
}
