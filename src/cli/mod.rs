//! Command-line interface: demonstration scenario and table file inspection

pub mod commands;

pub use commands::{Cli, Commands};

use crate::config::StoreConfig;
use crate::core::record::{KeyFilter, RecordInput, VersionedRecord};
use crate::core::schema::{Schema, CHANGE_TIME, FROM_TIME, SNAPSHOT_TIME, TO_TIME};
use crate::db::PitDB;
use crate::engine::{OverlapMode, SnapshotRow, VersionedTable};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::info;

/// Execute a parsed command
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Demo { save, mode } => {
            let db = demo(mode.parse()?).await?;
            if let Some(path) = save {
                db.save(&path).await?;
                println!("\nSaved table to {}", path.display());
            }
            Ok(())
        }
        Commands::Import {
            file,
            records,
            config,
            mode,
        } => {
            let mode = mode.as_deref().map(str::parse::<OverlapMode>).transpose()?;
            let db = open_or_create(&file, config.as_deref())?;
            let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&records)?)?;
            let inputs = RecordInput::batch_from_json(&json)?;

            let outcomes = db.batch_upsert(&inputs, mode).await?;
            for (i, outcome) in outcomes.iter().enumerate() {
                println!("record {i}: {outcome:?}");
            }
            db.save(&file).await?;
            info!(records = inputs.len(), path = %file.display(), "import complete");
            Ok(())
        }
        Commands::AsOf { file, timestamp } => {
            let db = PitDB::open(&file, OverlapMode::default())?;
            print_rows(&db.schema().await, &db.get_active(timestamp).await?);
            Ok(())
        }
        Commands::Latest { file } => {
            let db = PitDB::open(&file, OverlapMode::default())?;
            print_rows(&db.schema().await, &db.latest().await);
            Ok(())
        }
        Commands::History { file, filters } => {
            let db = PitDB::open(&file, OverlapMode::default())?;
            let filter = filters
                .iter()
                .try_fold(KeyFilter::new(), |filter, pair| filter.parse_pair(pair))?;
            print_rows(&db.schema().await, &db.full_history(Some(&filter)).await?);
            Ok(())
        }
        Commands::Snapshot { file, timestamps } => {
            let db = PitDB::open(&file, OverlapMode::default())?;
            print_snapshot(&db.schema().await, &db.snapshot(timestamps).await?);
            Ok(())
        }
    }
}

fn open_or_create(file: &Path, config: Option<&Path>) -> Result<PitDB> {
    if file.exists() {
        let Some(config_path) = config else {
            return PitDB::open(file, OverlapMode::default());
        };
        let config = StoreConfig::from_file(config_path)?;
        let table = VersionedTable::load(file, config.overlap_mode()?)?;
        let expected = config.schema()?;
        if table.schema() != &expected {
            return Err(Error::InvalidConfiguration(format!(
                "{} has key fields {:?} and value fields {:?}, but {} declares {:?} and {:?}",
                file.display(),
                table.schema().key_fields(),
                table.schema().value_fields(),
                config_path.display(),
                expected.key_fields(),
                expected.value_fields()
            )));
        }
        return Ok(PitDB::new(table));
    }
    let config = config.ok_or_else(|| {
        Error::InvalidConfiguration(format!(
            "{} does not exist; pass --config to create it",
            file.display()
        ))
    })?;
    PitDB::from_config(&StoreConfig::from_file(config)?)
}

/// Quotes keyed by symbol and source: versioning, a logical delete, then
/// as-of, history and latest reads.
pub async fn demo(mode: OverlapMode) -> Result<PitDB> {
    let table = VersionedTable::with_fields(["symbol", "source"], ["price", "volume"], mode)?;
    let db = PitDB::new(table);
    let quote = |symbol: &str, source: &str, from: &str, price: i64, volume: i64| {
        RecordInput::new()
            .field("symbol", symbol)
            .field("source", source)
            .field("price", price)
            .field("volume", volume)
            .from_time(from)
    };

    db.batch_upsert(
        &[
            quote("AAPL", "vendor1", "2024-01-01", 150, 10_000),
            quote("AAPL", "vendor2", "2024-01-01", 151, 11_000),
            quote("MSFT", "vendor1", "2024-01-01", 300, 20_000),
        ],
        None,
    )
    .await?;
    db.upsert(&quote("AAPL", "vendor1", "2024-03-01", 155, 10_500), None)
        .await?;
    db.delete(
        &KeyFilter::new().field("symbol", "MSFT").field("source", "vendor1"),
        "2024-04-15",
    )
    .await?;

    let schema = db.schema().await;

    println!("Snapshot on 2024-03-15:");
    print_rows(&schema, &db.get_active("2024-03-15").await?);

    println!("\nFull history for AAPL:");
    let aapl = KeyFilter::new().field("symbol", "AAPL");
    print_rows(&schema, &db.full_history(Some(&aapl)).await?);

    println!("\nLatest active rows:");
    print_rows(&schema, &db.latest().await);

    Ok(db)
}

fn header(schema: &Schema) -> Vec<String> {
    schema
        .key_fields()
        .iter()
        .cloned()
        .chain([FROM_TIME, TO_TIME, CHANGE_TIME].map(String::from))
        .chain(schema.value_fields().iter().cloned())
        .collect()
}

fn cells(schema: &Schema, record: &VersionedRecord) -> Vec<String> {
    let mut cells: Vec<String> = record.key.values().iter().map(|v| v.to_string()).collect();
    cells.push(record.from_time.to_string());
    cells.push(record.to_time.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()));
    cells.push(record.change_time.to_string());
    cells.extend(schema.value_fields().iter().map(|name| {
        record
            .value(name)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }));
    cells
}

fn print_table(header: Vec<String>, rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("(no rows)");
        return;
    }
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", line(&header));
    for row in &rows {
        println!("{}", line(row));
    }
}

/// Print rows as an aligned text table
pub fn print_rows(schema: &Schema, rows: &[VersionedRecord]) {
    print_table(
        header(schema),
        rows.iter().map(|record| cells(schema, record)).collect(),
    );
}

/// Print snapshot rows with their instant as the first column
pub fn print_snapshot(schema: &Schema, rows: &[SnapshotRow]) {
    let mut columns = vec![SNAPSHOT_TIME.to_string()];
    columns.extend(header(schema));
    let body = rows
        .iter()
        .map(|row| {
            let mut line = vec![row.snapshot_time.to_string()];
            line.extend(cells(schema, &row.record));
            line
        })
        .collect();
    print_table(columns, body);
}
