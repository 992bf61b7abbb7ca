//! Calorimeter cells and clusters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single calorimeter tower readout.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CaloCell {
    /// Absolute tower id.
    pub abs_id: u16,
    /// Calibrated amplitude (GeV).
    pub amplitude: f64,
    /// Cell time (s).
    pub time: f64,
}

impl CaloCell {
    /// Creates a new cell.
    #[inline]
    #[must_use]
    pub fn new(abs_id: u16, amplitude: f64, time: f64) -> Self {
        Self {
            abs_id,
            amplitude,
            time,
        }
    }
}

/// Detector a cluster was reconstructed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClusterKind {
    /// Electromagnetic calorimeter.
    #[default]
    Emcal,
    /// Photon spectrometer.
    Phos,
}

/// A reconstructed calorimeter cluster.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CaloCluster {
    /// Position of the cluster in the output list.
    pub id: i32,
    /// Detector.
    pub kind: ClusterKind,
    /// Energy (GeV).
    pub energy: f64,
    /// Global position (cm).
    pub position: [f64; 3],
    /// Absolute ids of the contributing cells.
    pub cell_ids: Vec<u16>,
    /// Fraction of each cell's amplitude assigned to this cluster.
    pub cell_fractions: Vec<f64>,
    /// Shower dispersion (cell units).
    pub dispersion: f64,
    /// Shower fit quality, -1 when not computed.
    pub chi2: f64,
    /// Time of flight (s).
    pub tof: f64,
    /// Number of local maxima.
    pub n_local_maxima: u16,
    /// Long axis of the shower ellipse squared.
    pub m02: f64,
    /// Short axis of the shower ellipse squared.
    pub m20: f64,
    /// Distance of the leading cell to the closest bad channel (cell units).
    pub dist_to_bad_channel: Option<f64>,
    /// Ids of tracks matched to the cluster.
    pub matched_tracks: Vec<i32>,
}

impl Default for CaloCluster {
    fn default() -> Self {
        Self {
            id: -1,
            kind: ClusterKind::Emcal,
            energy: 0.0,
            position: [0.0; 3],
            cell_ids: Vec::new(),
            cell_fractions: Vec::new(),
            dispersion: 0.0,
            chi2: -1.0,
            tof: 0.0,
            n_local_maxima: 0,
            m02: 0.0,
            m20: 0.0,
            dist_to_bad_channel: None,
            matched_tracks: Vec::new(),
        }
    }
}

impl CaloCluster {
    /// Number of cells in the cluster.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }

    /// Returns true for EMCAL clusters.
    #[must_use]
    pub fn is_emcal(&self) -> bool {
        self.kind == ClusterKind::Emcal
    }

    /// Pseudorapidity of the cluster position seen from the origin.
    #[must_use]
    pub fn eta(&self) -> f64 {
        let [x, y, z] = self.position;
        let r = x.hypot(y);
        if r == 0.0 {
            return 0.0;
        }
        (z / r).asinh()
    }

    /// Azimuth of the cluster position in `[0, 2π)`.
    #[must_use]
    pub fn phi(&self) -> f64 {
        let [x, y, _] = self.position;
        y.atan2(x).rem_euclid(std::f64::consts::TAU)
    }

    /// Attaches a matched track.
    pub fn add_track_matched(&mut self, track_id: i32) {
        self.matched_tracks.push(track_id);
    }
}
