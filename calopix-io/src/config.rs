//! JSON configuration files (reconstruction parameters, calibration stores).

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Loads a JSON document.
///
/// # Errors
/// Returns an error if the file cannot be read or does not match `T`.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    log::debug!("loaded {}", path.display());
    Ok(value)
}

/// Writes a value as pretty-printed JSON.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
