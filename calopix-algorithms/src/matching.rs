//! Cluster-track matching.

use std::f64::consts::{PI, TAU};

use calopix_core::{CaloCluster, Track};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Attaches tracks to clusters.
pub trait TrackMatcher: Send + Sync {
    /// Matches `tracks` to `clusters`, recording track ids on the clusters.
    /// Returns the number of clusters that received a track.
    fn match_tracks(&self, clusters: &mut [CaloCluster], tracks: &[Track]) -> usize;
}

/// Matches each cluster with the closest track extrapolation in (eta, phi).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResidualTrackMatcher {
    /// Maximum |Δη| between cluster and track.
    pub max_deta: f64,
    /// Maximum |Δφ| between cluster and track (rad).
    pub max_dphi: f64,
}

impl Default for ResidualTrackMatcher {
    fn default() -> Self {
        Self {
            max_deta: 0.025,
            max_dphi: 0.05,
        }
    }
}

impl ResidualTrackMatcher {
    /// Sets the residual window.
    #[must_use]
    pub fn with_residuals(mut self, deta: f64, dphi: f64) -> Self {
        self.max_deta = deta;
        self.max_dphi = dphi;
        self
    }

    /// Residuals of a track with respect to a cluster, `None` without extrapolation.
    #[must_use]
    pub fn residuals(cluster: &CaloCluster, track: &Track) -> Option<(f64, f64)> {
        let (eta, phi) = track.emcal_eta_phi?;
        let deta = eta - cluster.eta();
        let dphi = (phi - cluster.phi() + PI).rem_euclid(TAU) - PI;
        Some((deta, dphi))
    }
}

impl TrackMatcher for ResidualTrackMatcher {
    fn match_tracks(&self, clusters: &mut [CaloCluster], tracks: &[Track]) -> usize {
        let mut matched = 0;
        for cluster in clusters.iter_mut() {
            let best = tracks
                .iter()
                .filter_map(|track| {
                    let (deta, dphi) = Self::residuals(cluster, track)?;
                    (deta.abs() < self.max_deta && dphi.abs() < self.max_dphi)
                        .then_some((track.id, deta.hypot(dphi)))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((id, _)) = best {
                cluster.add_track_matched(id);
                matched += 1;
            }
        }
        matched
    }
}
