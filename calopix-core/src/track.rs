//! Reconstructed charged-particle tracks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reconstruction status bits of a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackStatus(pub u64);

impl TrackStatus {
    /// ITS refit succeeded.
    pub const ITS_REFIT: Self = Self(0x4);
    /// TPC refit succeeded.
    pub const TPC_REFIT: Self = Self(0x40);
    /// Track propagated out of the TOF.
    pub const TOF_OUT: Self = Self(0x2000);

    /// Returns true if all bits of `other` are set.
    #[inline]
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TrackStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A reconstructed track with the quantities used by the analyses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Track {
    /// Track id, also the index into the event-plane Q contribution arrays.
    pub id: i32,
    /// Transverse momentum (GeV/c).
    pub pt: f64,
    /// Total momentum (GeV/c).
    pub p: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle (rad).
    pub phi: f64,
    /// Electric charge sign.
    pub charge: i8,
    /// TPC specific energy loss.
    pub tpc_signal: f64,
    /// Number of TPC clusters.
    pub tpc_clusters: u16,
    /// Momentum at the TPC inner wall, if propagated there.
    pub inner_p: Option<f64>,
    /// TOF signal (ps).
    pub tof_signal: f64,
    /// Integrated track length (cm).
    pub length: f64,
    /// Reconstruction status bits.
    pub status: TrackStatus,
    /// Transverse impact parameter (cm).
    pub impact_xy: f64,
    /// Longitudinal impact parameter (cm).
    pub impact_z: f64,
    /// Extrapolated (eta, phi) at the EMCAL surface.
    pub emcal_eta_phi: Option<(f64, f64)>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            id: 0,
            pt: 0.0,
            p: 0.0,
            eta: 0.0,
            phi: 0.0,
            charge: 1,
            tpc_signal: 0.0,
            tpc_clusters: 0,
            inner_p: None,
            tof_signal: 0.0,
            length: 0.0,
            status: TrackStatus::default(),
            impact_xy: 0.0,
            impact_z: 0.0,
            emcal_eta_phi: None,
        }
    }
}

impl Track {
    /// Creates a track from its kinematics; other fields take defaults.
    #[must_use]
    pub fn new(id: i32, pt: f64, eta: f64, phi: f64) -> Self {
        Self {
            id,
            pt,
            p: pt * eta.cosh(),
            eta,
            phi,
            ..Self::default()
        }
    }

    /// Returns true if the track reached the TOF detector.
    #[must_use]
    pub fn has_tof_out(&self) -> bool {
        self.status.contains(TrackStatus::TOF_OUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_track_momentum_from_eta() {
        let track = Track::new(3, 2.0, 0.5, 1.0);
        assert_eq!(track.id, 3);
        assert_relative_eq!(track.p, 2.0 * 0.5_f64.cosh());
        assert_eq!(track.charge, 1);
    }

    #[test]
    fn test_status_bits() {
        let mut track = Track::new(0, 1.0, 0.0, 0.0);
        assert!(!track.has_tof_out());
        track.status = TrackStatus::TPC_REFIT | TrackStatus::TOF_OUT;
        assert!(track.has_tof_out());
        assert!(track.status.contains(TrackStatus::TPC_REFIT));
        assert!(!track.status.contains(TrackStatus::ITS_REFIT));
    }
}
