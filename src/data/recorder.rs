//! Data recorder for quote and movement capture

use super::parquet::{ParquetWriter, MOVEMENTS_PREFIX, QUOTES_PREFIX};
use super::OddsSink;
use crate::config::DataConfig;
use crate::movement::MarketMovement;
use crate::odds::OddsQuote;
use chrono::{Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Configuration for data recording
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Output directory for Parquet files
    pub output_dir: PathBuf,
    /// Buffer size before flushing
    pub buffer_size: usize,
    /// Maximum time between flushes
    pub flush_interval_secs: u64,
    /// Pending records per channel before new ones are dropped
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data"),
            buffer_size: 1000,
            flush_interval_secs: 60,
            channel_capacity: 10_000,
        }
    }
}

impl From<&DataConfig> for RecorderConfig {
    fn from(config: &DataConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            buffer_size: config.buffer_size.max(1),
            flush_interval_secs: config.flush_interval_secs.max(1),
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

/// Recording statistics
#[derive(Debug, Default, Clone)]
pub struct RecorderStats {
    pub quotes_received: u64,
    pub quotes_written: u64,
    pub movements_received: u64,
    pub movements_written: u64,
    pub dropped: u64,
    pub files_written: u64,
    pub last_flush: Option<chrono::DateTime<Utc>>,
}

/// A record kind the recorder knows how to buffer and write
trait Capture: Send + Sync + 'static {
    const PREFIX: &'static str;

    fn write(writer: &ParquetWriter, path: &Path, batch: &[Arc<Self>]) -> anyhow::Result<()>;
    fn on_received(stats: &mut RecorderStats);
    fn on_written(stats: &mut RecorderStats, count: u64);
}

impl Capture for OddsQuote {
    const PREFIX: &'static str = QUOTES_PREFIX;

    fn write(writer: &ParquetWriter, path: &Path, batch: &[Arc<Self>]) -> anyhow::Result<()> {
        writer.write_quotes(path, batch)
    }

    fn on_received(stats: &mut RecorderStats) {
        stats.quotes_received += 1;
    }

    fn on_written(stats: &mut RecorderStats, count: u64) {
        stats.quotes_written += count;
    }
}

impl Capture for MarketMovement {
    const PREFIX: &'static str = MOVEMENTS_PREFIX;

    fn write(writer: &ParquetWriter, path: &Path, batch: &[Arc<Self>]) -> anyhow::Result<()> {
        writer.write_movements(path, batch)
    }

    fn on_received(stats: &mut RecorderStats) {
        stats.movements_received += 1;
    }

    fn on_written(stats: &mut RecorderStats, count: u64) {
        stats.movements_written += count;
    }
}

/// Records accepted quotes and detected movements to Parquet files.
///
/// Appends never block the caller: when a channel is full the record is
/// dropped and counted.
pub struct DataRecorder {
    config: RecorderConfig,
    quote_tx: mpsc::Sender<Arc<OddsQuote>>,
    movement_tx: mpsc::Sender<Arc<MarketMovement>>,
    stats: Arc<RwLock<RecorderStats>>,
    dropped: AtomicU64,
    writers: Vec<JoinHandle<()>>,
}

impl DataRecorder {
    /// Create a new data recorder. Must be called inside a tokio runtime.
    pub fn new(config: RecorderConfig) -> Self {
        let (quote_tx, quote_rx) = mpsc::channel(config.channel_capacity);
        let (movement_tx, movement_rx) = mpsc::channel(config.channel_capacity);
        let stats = Arc::new(RwLock::new(RecorderStats::default()));

        let writers = vec![
            tokio::spawn(Self::run_writer(
                quote_rx,
                ParquetWriter::new(config.output_dir.clone()),
                config.clone(),
                stats.clone(),
            )),
            tokio::spawn(Self::run_writer(
                movement_rx,
                ParquetWriter::new(config.output_dir.clone()),
                config.clone(),
                stats.clone(),
            )),
        ];

        Self {
            config,
            quote_tx,
            movement_tx,
            stats,
            dropped: AtomicU64::new(0),
            writers,
        }
    }

    /// Create a new recorder with default config
    pub fn with_output_dir(output_dir: PathBuf) -> Self {
        let config = RecorderConfig {
            output_dir,
            ..Default::default()
        };
        Self::new(config)
    }

    /// Buffer records and flush on size or interval
    async fn run_writer<T: Capture>(
        mut rx: mpsc::Receiver<Arc<T>>,
        mut writer: ParquetWriter,
        config: RecorderConfig,
        stats: Arc<RwLock<RecorderStats>>,
    ) {
        let mut buffer: Vec<Arc<T>> = Vec::with_capacity(config.buffer_size);
        let mut last_flush = Utc::now();
        let flush_interval = Duration::seconds(config.flush_interval_secs as i64);

        loop {
            let timeout = tokio::time::Duration::from_secs(config.flush_interval_secs);

            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Some(record) => {
                            {
                                let mut s = stats.write().await;
                                T::on_received(&mut s);
                            }

                            buffer.push(record);

                            if buffer.len() >= config.buffer_size {
                                Self::flush(&mut buffer, &mut writer, &stats).await;
                                last_flush = Utc::now();
                            }
                        }
                        None => {
                            // Channel closed, flush remaining and exit
                            Self::flush(&mut buffer, &mut writer, &stats).await;
                            tracing::info!(kind = T::PREFIX, "Capture writer shutting down");
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep(timeout) => {
                    let now = Utc::now();
                    if now - last_flush >= flush_interval && !buffer.is_empty() {
                        Self::flush(&mut buffer, &mut writer, &stats).await;
                        last_flush = now;
                    }
                }
            }
        }
    }

    /// Flush buffer to a new file
    async fn flush<T: Capture>(
        buffer: &mut Vec<Arc<T>>,
        writer: &mut ParquetWriter,
        stats: &Arc<RwLock<RecorderStats>>,
    ) {
        if buffer.is_empty() {
            return;
        }

        let now = Utc::now();
        let path = writer.next_path(T::PREFIX, now);
        let count = buffer.len();

        match T::write(writer, &path, buffer) {
            Ok(()) => {
                let mut s = stats.write().await;
                T::on_written(&mut s, count as u64);
                s.files_written += 1;
                s.last_flush = Some(now);
                tracing::debug!(count, path = ?path, kind = T::PREFIX, "Flushed capture buffer");
            }
            Err(e) => {
                tracing::error!(error = %e, kind = T::PREFIX, "Failed to write capture file");
            }
        }

        buffer.clear();
    }

    fn offer<T>(&self, tx: &mpsc::Sender<T>, record: T, kind: &'static str) {
        match tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind, "Capture channel full, dropping record");
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind, "Capture writer stopped, dropping record");
            }
        }
    }

    /// Get output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.config.output_dir
    }

    /// Get current statistics
    pub async fn stats(&self) -> RecorderStats {
        let mut stats = self.stats.read().await.clone();
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }

    /// Close the channels and wait for writers to flush what they hold
    pub async fn shutdown(self) -> RecorderStats {
        let DataRecorder {
            quote_tx,
            movement_tx,
            stats,
            dropped,
            writers,
            ..
        } = self;
        drop(quote_tx);
        drop(movement_tx);

        for handle in writers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Capture writer task failed");
            }
        }

        let mut final_stats = stats.read().await.clone();
        final_stats.dropped = dropped.load(Ordering::Relaxed);
        final_stats
    }
}

impl OddsSink for DataRecorder {
    fn append_quote(&self, quote: Arc<OddsQuote>) {
        self.offer(&self.quote_tx, quote, QUOTES_PREFIX);
    }

    fn append_movement(&self, movement: Arc<MarketMovement>) {
        self.offer(&self.movement_tx, movement, MOVEMENTS_PREFIX);
    }
}
