//! Tick data ingestion and synthetic generation.

pub mod ingest;
pub mod synthetic;

pub use ingest::{load_ticks, write_ticks, FileFormat, LoadError, REQUIRED_COLUMNS};
pub use synthetic::{generate, SyntheticSpec};
