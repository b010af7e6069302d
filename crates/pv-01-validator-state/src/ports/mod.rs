//! Ports layer: inbound API and outbound SPI.

pub mod inbound;
pub mod outbound;

pub use inbound::{CreateOutcome, ValidatorStateStore};
pub use outbound::{KeyValueStore, ScanResult, SystemTimeSource, TimeSource};
