//! JSON-lines event reader.
//!
//! One event per line. Blank lines and lines starting with `#` are skipped.

use crate::{Error, Result};
use calopix_core::Event;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Streaming reader over a JSON-lines event file.
pub struct EventReader<R> {
    input: R,
    line: usize,
    buffer: String,
}

impl EventReader<BufReader<File>> {
    /// Opens an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EventReader<R> {
    /// Wraps any buffered reader.
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: 0,
            buffer: String::new(),
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            self.buffer.clear();
            if self.input.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buffer.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return serde_json::from_str(text)
                .map(Some)
                .map_err(|source| Error::InvalidEvent {
                    line: self.line,
                    source,
                });
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Reads every event of a file.
///
/// # Errors
/// Returns the first I/O or parse error.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let events = EventReader::open(path)?.collect::<Result<Vec<_>>>()?;
    log::info!("read {} events from {}", events.len(), path.display());
    Ok(events)
}
