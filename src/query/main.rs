//! Command-line timezone lookup.
//!
//! Resolves single coordinates or CSV batches against a memory-mapped
//! boundary database and can dump the database's table of contents.

mod config;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tzfence::{Entry, Geofence, LookupError, MmapStorage, StorageBackend};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "tzquery")]
#[command(about = "Resolve coordinates to timezone rule strings")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database image (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a single coordinate
    Lookup {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up every `latitude,longitude` row of a CSV file
    Batch {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the database header and table of contents
    Info {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Deserialize)]
struct CoordinateRow {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct ResultRow {
    latitude: f64,
    longitude: f64,
    name: Option<String>,
    timezone: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct LookupReport {
    latitude: f64,
    longitude: f64,
    name: Option<String>,
    timezone: Option<String>,
}

#[derive(Serialize)]
struct InfoReport {
    version: u8,
    signature: String,
    precision: u8,
    creation_date: String,
    entries: Vec<Entry>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    // Initialize logging
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level).context("Invalid log level")?,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database.path.clone())
        .context("No database given; pass --db or set database.path in the config file")?;
    let geofence = open_database(&db_path, &config)?;

    match args.command {
        Command::Lookup {
            latitude,
            longitude,
            json,
        } => run_lookup(&geofence, latitude, longitude, json),
        Command::Batch { input } => run_batch(&geofence, &input),
        Command::Info { json } => run_info(&geofence, json),
    }
}

fn open_database(path: &Path, config: &Config) -> Result<Geofence<MmapStorage>> {
    let storage = MmapStorage::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let geofence =
        Geofence::new(storage).with_expected_signature(config.database.expected_signature()?);

    let header = geofence
        .header()
        .context("Failed to read database header")?;
    info!(
        "Opened {} (version {}, precision {}, created {})",
        path.display(),
        header.version,
        header.precision,
        header.creation_date_str()
    );
    Ok(geofence)
}

fn run_lookup(
    geofence: &Geofence<MmapStorage>,
    latitude: f64,
    longitude: f64,
    json: bool,
) -> Result<()> {
    let found = geofence.lookup(latitude, longitude)?;

    if json {
        let report = LookupReport {
            latitude,
            longitude,
            name: found.as_ref().map(|m| m.name.clone()),
            timezone: found.as_ref().map(|m| m.timezone.clone()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(found) = &found {
        println!("{}", found.timezone);
    }

    if found.is_none() {
        eprintln!("No timezone found for ({}, {})", latitude, longitude);
        std::process::exit(1);
    }
    Ok(())
}

fn run_batch(geofence: &Geofence<MmapStorage>, input: &Path) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let rows: Vec<CoordinateRow> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .context("Failed to parse coordinate rows")?;
    info!("Resolving {} coordinates", rows.len());

    let results = resolve_rows(geofence, &rows)?;

    let mut writer = csv::Writer::from_writer(io::stdout().lock());
    for row in &results {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let found = results.iter().filter(|r| r.timezone.is_some()).count();
    info!("Resolved {} of {} coordinates", found, results.len());
    Ok(())
}

/// Resolves rows in parallel. Output order follows input order.
fn resolve_rows<S: StorageBackend + Sync>(
    geofence: &Geofence<S>,
    rows: &[CoordinateRow],
) -> Result<Vec<ResultRow>, LookupError> {
    rows.par_iter()
        .map(|row| resolve_row(geofence, row))
        .collect()
}

/// Bad coordinates are reported per row; database errors abort the batch.
fn resolve_row<S: StorageBackend>(
    geofence: &Geofence<S>,
    row: &CoordinateRow,
) -> Result<ResultRow, LookupError> {
    let mut result = ResultRow {
        latitude: row.latitude,
        longitude: row.longitude,
        name: None,
        timezone: None,
        error: None,
    };

    match geofence.lookup(row.latitude, row.longitude) {
        Ok(Some(found)) => {
            result.name = Some(found.name);
            result.timezone = Some(found.timezone);
        }
        Ok(None) => {}
        Err(e @ LookupError::InvalidCoordinate { .. }) => {
            warn!("Skipping row: {}", e);
            result.error = Some(e.to_string());
        }
        Err(e) => return Err(e),
    }
    Ok(result)
}

fn run_info(geofence: &Geofence<MmapStorage>, json: bool) -> Result<()> {
    let header = geofence.header()?;
    let entries = geofence.entries()?;

    if json {
        let report = InfoReport {
            version: header.version,
            signature: header.signature_str(),
            precision: header.precision,
            creation_date: header.creation_date_str(),
            entries,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Version:       {}", header.version);
    println!("Signature:     {}", header.signature_str());
    println!("Precision:     {}", header.precision);
    match header.creation_date() {
        Some(date) => println!("Created:       {}", date),
        None => println!("Created:       {:?}", header.creation_date_str()),
    }
    println!("Entries:       {}", entries.len());
    for entry in &entries {
        println!(
            "  {:<40} {:<40} @{}",
            entry.name, entry.value, entry.position
        );
    }
    Ok(())
}
