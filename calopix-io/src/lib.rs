//! calopix-io: event input and result output for calopix.
//!
//! Events are read from JSON-lines files, one serialized
//! [`calopix_core::Event`] per line. Results (clusters, flow candidates,
//! event plane resolution records) are written as CSV or JSON lines, and
//! task configurations are loaded from JSON documents.
//!

mod config;
mod error;
mod reader;
mod writer;

pub use config::{load_json, save_json};
pub use error::{Error, Result};
pub use reader::{read_events, EventReader};
pub use writer::{write_cluster_output, DataFileWriter, OutputFormat};
