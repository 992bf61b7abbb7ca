//! Result writers.

use crate::{Error, Result};
use calopix_algorithms::{ClusterizeConfig, EventPlaneResolution, FlowCandidate};
use calopix_core::CaloCluster;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// On-disk layout of a result file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// One JSON object per line.
    JsonLines,
}

impl OutputFormat {
    /// Picks the format from the file extension (`csv`, `jsonl`, `json`).
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for any other extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "json" => Ok(Self::JsonLines),
            _ => Err(Error::UnsupportedFormat(ext)),
        }
    }
}

const CLUSTER_HEADER: &str = "event,id,energy,eta,phi,x,y,z,n_cells,n_local_maxima,\
                              dispersion,m02,m20,tof,dist_to_bad_channel,n_matched_tracks";

const CANDIDATE_HEADER: &str = "centrality,event_type,has_tof,pt,mass,uq_vzero_a,uq_vzero_c,\
                                charge,cos2dphi_tpc,cos2dphi_vzero,cos2dphi_vzero_a,\
                                cos2dphi_vzero_c,impact_xy,impact_z,tpc_pull,phi";

const RESOLUTION_HEADER: &str = "centrality,tpc_vzero_a,tpc_vzero_c,vzero_a_vzero_c,\
                                 vzero_vzero_a,vzero_vzero_c,vzero_a_tpc,vzero_c_tpc,\
                                 vzero_c_vzero_a,vzero_tpc_pos,vzero_tpc_neg,tpc_pos_tpc_neg,\
                                 q_vzero_a_vzero_c";

#[derive(Serialize)]
struct ClusterRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    event: usize,
    #[serde(flatten)]
    cluster: &'a CaloCluster,
}

/// Writer for analysis results.
///
/// The CSV header is written before the first record of the file.
pub struct DataFileWriter {
    writer: BufWriter<File>,
    format: OutputFormat,
    branch: Option<String>,
    wrote_header: bool,
    records: usize,
}

impl DataFileWriter {
    /// Creates a writer, choosing the format from the extension.
    ///
    /// # Errors
    /// Returns an error for an unknown extension or if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = OutputFormat::from_path(&path)?;
        Self::create_with_format(path, format)
    }

    /// Creates a writer with an explicit format.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create_with_format<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            format,
            branch: None,
            wrote_header: false,
            records: 0,
        })
    }

    /// Tags JSON cluster records with a branch name.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Records written so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    fn header(&mut self, header: &str) -> Result<()> {
        if self.format == OutputFormat::Csv && !self.wrote_header {
            writeln!(self.writer, "{header}")?;
            self.wrote_header = true;
        }
        Ok(())
    }

    fn json_line<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Writes the clusters of one event.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_clusters(&mut self, event: usize, clusters: &[CaloCluster]) -> Result<()> {
        self.header(CLUSTER_HEADER)?;
        for cluster in clusters {
            match self.format {
                OutputFormat::Csv => {
                    let [x, y, z] = cluster.position;
                    let dist = cluster
                        .dist_to_bad_channel
                        .map_or_else(String::new, |d| d.to_string());
                    writeln!(
                        self.writer,
                        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                        event,
                        cluster.id,
                        cluster.energy,
                        cluster.eta(),
                        cluster.phi(),
                        x,
                        y,
                        z,
                        cluster.n_cells(),
                        cluster.n_local_maxima,
                        cluster.dispersion,
                        cluster.m02,
                        cluster.m20,
                        cluster.tof,
                        dist,
                        cluster.matched_tracks.len()
                    )?;
                }
                OutputFormat::JsonLines => {
                    let record = ClusterRecord {
                        branch: self.branch.as_deref(),
                        event,
                        cluster,
                    };
                    serde_json::to_writer(&mut self.writer, &record)?;
                    self.writer.write_all(b"\n")?;
                }
            }
            self.records += 1;
        }
        Ok(())
    }

    /// Writes flow candidates.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_candidates(&mut self, candidates: &[FlowCandidate]) -> Result<()> {
        self.header(CANDIDATE_HEADER)?;
        for c in candidates {
            match self.format {
                OutputFormat::Csv => writeln!(
                    self.writer,
                    "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                    c.centrality,
                    c.event_type.code(),
                    u8::from(c.has_tof),
                    c.pt,
                    c.mass,
                    c.uq_vzero_a,
                    c.uq_vzero_c,
                    c.charge,
                    c.cos2dphi_tpc,
                    c.cos2dphi_vzero,
                    c.cos2dphi_vzero_a,
                    c.cos2dphi_vzero_c,
                    c.impact_xy,
                    c.impact_z,
                    c.tpc_pull,
                    c.phi
                )?,
                OutputFormat::JsonLines => self.json_line(c)?,
            }
            self.records += 1;
        }
        Ok(())
    }

    /// Writes event plane resolution records.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_resolutions(&mut self, resolutions: &[EventPlaneResolution]) -> Result<()> {
        self.header(RESOLUTION_HEADER)?;
        for r in resolutions {
            match self.format {
                OutputFormat::Csv => writeln!(
                    self.writer,
                    "{},{},{},{},{},{},{},{},{},{},{},{},{}",
                    r.centrality,
                    r.tpc_vzero_a,
                    r.tpc_vzero_c,
                    r.vzero_a_vzero_c,
                    r.vzero_vzero_a,
                    r.vzero_vzero_c,
                    r.vzero_a_tpc,
                    r.vzero_c_tpc,
                    r.vzero_c_vzero_a,
                    r.vzero_tpc_pos,
                    r.vzero_tpc_neg,
                    r.tpc_pos_tpc_neg,
                    r.q_vzero_a_vzero_c
                )?,
                OutputFormat::JsonLines => self.json_line(r)?,
            }
            self.records += 1;
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the clusters of every event under the configured output branch.
///
/// Nothing is written, and no file is created, when `fill_aod` is off.
/// Returns the number of clusters written.
///
/// # Errors
/// Returns an error for an unknown extension or if writing fails.
pub fn write_cluster_output<P: AsRef<Path>>(
    path: P,
    config: &ClusterizeConfig,
    clusters: &[Vec<CaloCluster>],
) -> Result<usize> {
    let path = path.as_ref();
    if !config.fill_aod {
        log::info!(
            "output branch {} not written (fill_aod off)",
            config.output_branch
        );
        return Ok(0);
    }
    let mut writer = DataFileWriter::create(path)?.with_branch(config.output_branch.as_str());
    for (event, event_clusters) in clusters.iter().enumerate() {
        writer.write_clusters(event, event_clusters)?;
    }
    writer.flush()?;
    log::info!(
        "wrote {} clusters of branch {} to {}",
        writer.records(),
        config.output_branch,
        path.display()
    );
    Ok(writer.records())
}
