//! Cross-book arbitrage detection

mod scanner;
mod types;

pub use scanner::{scan_quotes, ArbitrageScanner, ArbitrageScannerConfig};
pub use types::{ArbitrageLeg, ArbitrageOpportunity};
