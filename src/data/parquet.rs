//! Parquet capture files for quotes and movements

use crate::movement::MarketMovement;
use crate::odds::{GameId, MarketStatus, MarketType, OddsQuote, Side, SidePrice, Sportsbook};
use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const QUOTES_PREFIX: &str = "quotes";
pub const MOVEMENTS_PREFIX: &str = "movements";

fn utc_timestamp(name: &str) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// Quote schema. Decimals are stored as strings for precision; the side map
/// is stored as JSON.
pub fn quote_schema() -> Schema {
    Schema::new(vec![
        utc_timestamp("observed_at"),
        Field::new("game_id", DataType::Utf8, false),
        Field::new("sportsbook", DataType::Utf8, false),
        Field::new("market_type", DataType::Utf8, false),
        Field::new("market_status", DataType::Utf8, false),
        Field::new("side_values", DataType::Utf8, false),
        Field::new("limit_amount", DataType::Utf8, true),
    ])
}

/// Movement schema
pub fn movement_schema() -> Schema {
    Schema::new(vec![
        utc_timestamp("detected_at"),
        Field::new("id", DataType::Utf8, false),
        Field::new("game_id", DataType::Utf8, false),
        Field::new("sportsbook", DataType::Utf8, false),
        Field::new("market_type", DataType::Utf8, false),
        Field::new("reference_side", DataType::Utf8, false),
        Field::new("basis", DataType::Utf8, false),
        utc_timestamp("previous_observed_at"),
        utc_timestamp("current_observed_at"),
        Field::new("movement_size", DataType::Utf8, false),
        Field::new("direction", DataType::Utf8, false),
        Field::new("impact_class", DataType::Utf8, false),
    ])
}

fn strings<T>(items: &[Arc<T>], f: impl Fn(&T) -> String) -> ArrayRef {
    let values: Vec<String> = items.iter().map(|i| f(i)).collect();
    Arc::new(StringArray::from(values))
}

fn timestamps<T>(items: &[Arc<T>], f: impl Fn(&T) -> DateTime<Utc>) -> ArrayRef {
    let micros: Vec<i64> = items.iter().map(|i| f(i).timestamp_micros()).collect();
    Arc::new(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
}

/// Writes one Parquet file per flush, named by prefix, time and sequence
pub struct ParquetWriter {
    output_dir: PathBuf,
    sequence: u64,
}

impl ParquetWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            sequence: 0,
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Next file path, e.g. `quotes_20250726_180000_3.parquet`
    pub fn next_path(&mut self, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.sequence += 1;
        let filename = format!(
            "{}_{}_{}.parquet",
            prefix,
            timestamp.format("%Y%m%d_%H%M%S"),
            self.sequence
        );
        self.output_dir.join(filename)
    }

    fn write_batch(&self, path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> anyhow::Result<()> {
        self.ensure_dir()?;
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        let batch = RecordBatch::try_new(schema, columns)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    /// Write quotes to a Parquet file
    pub fn write_quotes(&self, path: &Path, quotes: &[Arc<OddsQuote>]) -> anyhow::Result<()> {
        if quotes.is_empty() {
            return Ok(());
        }

        let side_values = quotes
            .iter()
            .map(|q| serde_json::to_string(&q.side_values))
            .collect::<Result<Vec<_>, _>>()?;
        let limits: Vec<Option<String>> = quotes
            .iter()
            .map(|q| q.limit_amount.map(|l| l.to_string()))
            .collect();

        let columns = vec![
            timestamps(quotes, |q| q.observed_at),
            strings(quotes, |q| q.game_id.to_string()),
            strings(quotes, |q| q.sportsbook.to_string()),
            strings(quotes, |q| q.market_type.to_string()),
            strings(quotes, |q| q.market_status.to_string()),
            Arc::new(StringArray::from(side_values)) as ArrayRef,
            Arc::new(StringArray::from(limits)) as ArrayRef,
        ];
        self.write_batch(path, Arc::new(quote_schema()), columns)?;

        tracing::debug!(path = ?path, count = quotes.len(), "Wrote quotes to Parquet");
        Ok(())
    }

    /// Write movements to a Parquet file
    pub fn write_movements(
        &self,
        path: &Path,
        movements: &[Arc<MarketMovement>],
    ) -> anyhow::Result<()> {
        if movements.is_empty() {
            return Ok(());
        }

        let columns = vec![
            timestamps(movements, |m| m.detected_at),
            strings(movements, |m| m.id.to_string()),
            strings(movements, |m| m.game_id.to_string()),
            strings(movements, |m| m.sportsbook.to_string()),
            strings(movements, |m| m.market_type.to_string()),
            strings(movements, |m| m.reference_side.to_string()),
            strings(movements, |m| m.basis.to_string()),
            timestamps(movements, |m| m.previous_quote.observed_at),
            timestamps(movements, |m| m.current_quote.observed_at),
            strings(movements, |m| m.movement_size.to_string()),
            strings(movements, |m| m.direction.to_string()),
            strings(movements, |m| m.impact_class.to_string()),
        ];
        self.write_batch(path, Arc::new(movement_schema()), columns)?;

        tracing::debug!(path = ?path, count = movements.len(), "Wrote movements to Parquet");
        Ok(())
    }
}

/// Reader for captured quote files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// All `quotes_*.parquet` files in a directory, in name order
    pub fn quote_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension().map(|e| e == "parquet").unwrap_or(false)
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(&format!("{}_", QUOTES_PREFIX)))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read quotes from a Parquet file
    pub fn read_quotes(&self) -> anyhow::Result<Vec<OddsQuote>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut quotes = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;

            let observed = batch
                .column(0)
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .ok_or_else(|| anyhow::anyhow!("Invalid observed_at column"))?;
            let text = |i: usize, name: &str| -> anyhow::Result<&StringArray> {
                batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
            };
            let game_ids = text(1, "game_id")?;
            let books = text(2, "sportsbook")?;
            let markets = text(3, "market_type")?;
            let statuses = text(4, "market_status")?;
            let sides = text(5, "side_values")?;
            let limits = text(6, "limit_amount")?;

            for i in 0..batch.num_rows() {
                let observed_at = DateTime::from_timestamp_micros(observed.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?;
                let side_values: BTreeMap<Side, SidePrice> = serde_json::from_str(sides.value(i))?;
                let limit_amount = if limits.is_null(i) {
                    None
                } else {
                    Some(Decimal::from_str(limits.value(i))?)
                };

                quotes.push(OddsQuote {
                    game_id: GameId::new(game_ids.value(i)),
                    sportsbook: Sportsbook::new(books.value(i)),
                    market_type: MarketType::from_str(markets.value(i))?,
                    side_values,
                    limit_amount,
                    market_status: MarketStatus::from_str(statuses.value(i))?,
                    observed_at,
                });
            }
        }

        Ok(quotes)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
