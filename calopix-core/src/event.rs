//! Event-level data: vertices, trigger, event plane and detector content.

use crate::calo::{CaloCell, CaloCluster};
use crate::track::Track;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two-dimensional flow vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QVector {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
}

impl QVector {
    /// Creates a new flow vector.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Adds the unit vector of a particle at azimuth `phi` for harmonic `n`.
    #[inline]
    pub fn add_particle(&mut self, phi: f64, harmonic: f64) {
        self.x += (harmonic * phi).cos();
        self.y += (harmonic * phi).sin();
    }

    /// Symmetry-plane angle, `atan2(y, x) / harmonic`.
    #[inline]
    #[must_use]
    pub fn angle(&self, harmonic: f64) -> f64 {
        self.y.atan2(self.x) / harmonic
    }

    /// Azimuth of the vector in `[0, 2π)`; zero for the null vector.
    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        std::f64::consts::PI + (-self.y).atan2(-self.x)
    }

    /// Scalar product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y
    }
}

impl std::ops::Sub for QVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Event plane information provided by the reconstruction.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EventPlaneInfo {
    /// Second-harmonic TPC flow vector.
    pub q_tpc: QVector,
    /// Per-track x contributions to `q_tpc`, indexed by track id.
    pub contributions_x: Vec<f64>,
    /// Per-track y contributions to `q_tpc`, indexed by track id.
    pub contributions_y: Vec<f64>,
    /// VZERO-A flow vector (recentred).
    pub q_vzero_a: QVector,
    /// VZERO-C flow vector (recentred).
    pub q_vzero_c: QVector,
    /// Combined VZERO flow vector.
    pub q_vzero: QVector,
}

impl EventPlaneInfo {
    /// Contribution of a track to the TPC flow vector, zero if unknown.
    #[must_use]
    pub fn contribution(&self, track_id: i32) -> QVector {
        let Ok(index) = usize::try_from(track_id) else {
            return QVector::default();
        };
        match (
            self.contributions_x.get(index),
            self.contributions_y.get(index),
        ) {
            (Some(&x), Some(&y)) => QVector::new(x, y),
            _ => QVector::default(),
        }
    }
}

/// Reconstructed primary vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Longitudinal position (cm).
    pub z: f64,
    /// Number of contributing tracks or tracklets.
    pub n_contributors: u32,
}

impl Vertex {
    /// Returns true if at least one track contributed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.n_contributors >= 1
    }
}

/// Trigger classes fired for an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerMask(pub u32);

impl TriggerMask {
    /// Minimum bias.
    pub const MB: Self = Self(1 << 0);
    /// Central trigger.
    pub const CENTRAL: Self = Self(1 << 4);
    /// Semi-central trigger.
    pub const SEMI_CENTRAL: Self = Self(1 << 7);

    /// Returns true if all bits of `other` are set.
    #[inline]
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TriggerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Storage format the event was read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventFormat {
    /// Full reconstruction output (tracks usable for matching).
    #[default]
    Esd,
    /// Reduced analysis output.
    Aod,
}

/// One collision event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Event {
    /// Run number.
    pub run_number: i32,
    /// Storage format.
    pub format: EventFormat,
    /// Primary vertex from tracks.
    pub vertex_tracks: Option<Vertex>,
    /// Primary vertex from the SPD.
    pub vertex_spd: Option<Vertex>,
    /// V0M centrality percentile.
    pub centrality: f64,
    /// Fired trigger classes.
    pub trigger: TriggerMask,
    /// TOF event start time (ps).
    pub tof_start_time: f64,
    /// Reconstructed tracks.
    pub tracks: Vec<Track>,
    /// EMCAL cells.
    pub cells: Vec<CaloCell>,
    /// Calorimeter clusters from the reconstruction.
    pub clusters: Vec<CaloCluster>,
    /// Event plane, if it was computed.
    pub event_plane: Option<EventPlaneInfo>,
}

impl Event {
    /// Best primary vertex: tracks vertex, falling back to the SPD one.
    #[must_use]
    pub fn primary_vertex(&self) -> Option<Vertex> {
        match self.vertex_tracks {
            Some(vertex) if vertex.is_valid() => Some(vertex),
            _ => self.vertex_spd.filter(Vertex::is_valid),
        }
    }
}
