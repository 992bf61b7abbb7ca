//! Second-harmonic event plane from TPC and VZERO flow vectors.
//!
//! The TPC flow vectors are built from the tracks accepted by the TPC-only
//! selection: `Q_pos` from `0 < η < 0.8`, `Q_neg` from `-0.8 < η < 0`. The
//! full TPC vector is taken over the positive half only. VZERO vectors come
//! with the event.

use std::f64::consts::PI;

use calopix_core::{EventPlaneInfo, QVector, Track, TrackContainer, TrackCuts};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Harmonic of the analysis.
pub const HARMONIC: f64 = 2.0;

/// |η| limit of the TPC sub-events.
const TPC_ETA_EDGE: f64 = 0.8;

/// Folds an angle into `[0, π]`.
///
/// Angles already in `[0, π]` are returned unchanged; positive multiples of
/// π fold to π, negative ones to 0.
#[must_use]
pub fn phi_0_pi(phi: f64) -> f64 {
    if !phi.is_finite() || (0.0..=PI).contains(&phi) {
        return phi;
    }
    let folded = phi.rem_euclid(PI);
    if phi > PI && folded == 0.0 {
        PI
    } else {
        folded
    }
}

/// TPC flow vectors of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TpcSubEvents {
    /// Full TPC vector (positive-η tracks).
    pub q: QVector,
    /// Positive-η sub-event.
    pub q_pos: QVector,
    /// Negative-η sub-event.
    pub q_neg: QVector,
}

impl TpcSubEvents {
    /// Sums the flow vectors of the tracks passing `cuts`.
    #[must_use]
    pub fn from_tracks(tracks: &[Track], cuts: &TrackCuts) -> Self {
        let container = TrackContainer::new(tracks, cuts.clone());
        let mut sub = Self::default();
        for track in &container.accepted() {
            if track.eta > 0.0 && track.eta < TPC_ETA_EDGE {
                sub.q_pos.add_particle(track.phi, HARMONIC);
                sub.q.add_particle(track.phi, HARMONIC);
            }
            if track.eta < 0.0 && track.eta > -TPC_ETA_EDGE {
                sub.q_neg.add_particle(track.phi, HARMONIC);
            }
        }
        sub
    }
}

/// Event plane angles of one event (rad).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventPlaneAngles {
    /// Full TPC.
    pub tpc: f64,
    /// Positive-η TPC.
    pub tpc_pos: f64,
    /// Negative-η TPC.
    pub tpc_neg: f64,
    /// VZERO-A.
    pub vzero_a: f64,
    /// VZERO-C.
    pub vzero_c: f64,
    /// Combined VZERO.
    pub vzero: f64,
}

impl EventPlaneAngles {
    /// Angles of the TPC sub-events and of the event's VZERO vectors.
    #[must_use]
    pub fn new(tpc: &TpcSubEvents, info: &EventPlaneInfo) -> Self {
        Self {
            tpc: tpc.q.angle(HARMONIC),
            tpc_pos: tpc.q_pos.angle(HARMONIC),
            tpc_neg: tpc.q_neg.angle(HARMONIC),
            vzero_a: info.q_vzero_a.angle(HARMONIC),
            vzero_c: info.q_vzero_c.angle(HARMONIC),
            vzero: info.q_vzero.angle(HARMONIC),
        }
    }
}

/// TPC event plane with the candidate's own contribution removed.
///
/// Track ids without an entry in the contribution arrays subtract nothing.
#[must_use]
pub fn candidate_event_plane(track: &Track, info: &EventPlaneInfo) -> f64 {
    (info.q_tpc - info.contribution(track.id)).phi() / HARMONIC
}

/// `cos(2 (a - b))`.
#[inline]
fn cos2(a: f64, b: f64) -> f64 {
    (HARMONIC * (a - b)).cos()
}

/// Sub-event correlations used to compute the event plane resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventPlaneResolution {
    /// V0M centrality of the event.
    pub centrality: f64,
    /// cos 2(ψ_TPC − ψ_V0A).
    pub tpc_vzero_a: f64,
    /// cos 2(ψ_TPC − ψ_V0C).
    pub tpc_vzero_c: f64,
    /// cos 2(ψ_V0A − ψ_V0C).
    pub vzero_a_vzero_c: f64,
    /// cos 2(ψ_V0M − ψ_V0A).
    pub vzero_vzero_a: f64,
    /// cos 2(ψ_V0M − ψ_V0C).
    pub vzero_vzero_c: f64,
    /// cos 2(ψ_V0A − ψ_TPC).
    pub vzero_a_tpc: f64,
    /// cos 2(ψ_V0C − ψ_TPC).
    pub vzero_c_tpc: f64,
    /// cos 2(ψ_V0C − ψ_V0A).
    pub vzero_c_vzero_a: f64,
    /// cos 2(ψ_V0M − ψ_TPC,pos).
    pub vzero_tpc_pos: f64,
    /// cos 2(ψ_V0M − ψ_TPC,neg).
    pub vzero_tpc_neg: f64,
    /// cos 2(ψ_TPC,pos − ψ_TPC,neg).
    pub tpc_pos_tpc_neg: f64,
    /// Scalar product Q_V0A · Q_V0C.
    pub q_vzero_a_vzero_c: f64,
}

impl EventPlaneResolution {
    /// Correlations of one event.
    #[must_use]
    pub fn new(centrality: f64, angles: &EventPlaneAngles, info: &EventPlaneInfo) -> Self {
        let a = angles;
        Self {
            centrality,
            tpc_vzero_a: cos2(a.tpc, a.vzero_a),
            tpc_vzero_c: cos2(a.tpc, a.vzero_c),
            vzero_a_vzero_c: cos2(a.vzero_a, a.vzero_c),
            vzero_vzero_a: cos2(a.vzero, a.vzero_a),
            vzero_vzero_c: cos2(a.vzero, a.vzero_c),
            vzero_a_tpc: cos2(a.vzero_a, a.tpc),
            vzero_c_tpc: cos2(a.vzero_c, a.tpc),
            vzero_c_vzero_a: cos2(a.vzero_c, a.vzero_a),
            vzero_tpc_pos: cos2(a.vzero, a.tpc_pos),
            vzero_tpc_neg: cos2(a.vzero, a.tpc_neg),
            tpc_pos_tpc_neg: cos2(a.tpc_pos, a.tpc_neg),
            q_vzero_a_vzero_c: info.q_vzero_a.dot(&info.q_vzero_c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn ep_track(id: i32, eta: f64, phi: f64) -> Track {
        Track {
            tpc_clusters: 100,
            ..Track::new(id, 1.0, eta, phi)
        }
    }

    #[test]
    fn test_phi_0_pi() {
        assert_relative_eq!(phi_0_pi(-0.5), PI - 0.5, epsilon = 1e-12);
        assert_relative_eq!(phi_0_pi(2.0 * PI + 0.25), 0.25, epsilon = 1e-12);
        assert_relative_eq!(phi_0_pi(PI), PI);
        assert_relative_eq!(phi_0_pi(0.0), 0.0);
        assert!(phi_0_pi(f64::NAN).is_nan());
        assert_relative_eq!(phi_0_pi(-PI), 0.0);
    }

    #[test]
    fn test_phi_0_pi_huge_angles() {
        for phi in [1.0e17, -1.0e17, f64::MAX, f64::MIN] {
            let folded = phi_0_pi(phi);
            assert!((0.0..=PI).contains(&folded), "{phi} -> {folded}");
        }
    }

    #[test]
    fn test_sub_events_split_by_eta() {
        let tracks = vec![
            ep_track(0, 0.3, 0.2),
            ep_track(1, -0.3, 1.0),
            ep_track(2, 0.0, 2.0),
            ep_track(3, 0.85, 0.7),
            Track {
                pt: 0.1,
                ..ep_track(4, 0.5, 0.4)
            },
        ];
        let sub = TpcSubEvents::from_tracks(&tracks, &TrackCuts::tpc_only());

        assert_relative_eq!(sub.q_pos.x, 0.4_f64.cos(), epsilon = 1e-12);
        assert_relative_eq!(sub.q_neg.y, 2.0_f64.sin(), epsilon = 1e-12);
        assert_eq!(sub.q, sub.q_pos);
        assert_relative_eq!(sub.q_pos.angle(HARMONIC), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_candidate_plane_removes_own_contribution() {
        let info = EventPlaneInfo {
            q_tpc: QVector::new(1.0, 1.0),
            contributions_x: vec![0.0, 1.0],
            contributions_y: vec![0.0, 0.0],
            ..EventPlaneInfo::default()
        };
        // Full vector at 45 degrees, plane at π/8.
        assert_relative_eq!(
            candidate_event_plane(&ep_track(0, 0.1, 0.0), &info),
            FRAC_PI_4 / 2.0,
            epsilon = 1e-12
        );
        // Removing (1, 0) leaves (0, 1): plane at π/4.
        assert_relative_eq!(
            candidate_event_plane(&ep_track(1, 0.1, 0.0), &info),
            FRAC_PI_4,
            epsilon = 1e-12
        );
        // Unknown id subtracts nothing.
        assert_relative_eq!(
            candidate_event_plane(&ep_track(5, 0.1, 0.0), &info),
            FRAC_PI_4 / 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_resolution_terms() {
        let info = EventPlaneInfo {
            q_vzero_a: QVector::new(1.0, 0.0),
            q_vzero_c: QVector::new(-2.0, 0.0),
            q_vzero: QVector::new(1.0, 0.0),
            ..EventPlaneInfo::default()
        };
        let angles = EventPlaneAngles::new(&TpcSubEvents::default(), &info);
        assert_relative_eq!(angles.vzero_c, 2.0 * FRAC_PI_4, epsilon = 1e-12);

        let res = EventPlaneResolution::new(12.5, &angles, &info);
        assert_relative_eq!(res.vzero_a_vzero_c, -1.0, epsilon = 1e-12);
        assert_relative_eq!(res.vzero_vzero_a, 1.0, epsilon = 1e-12);
        assert_relative_eq!(res.vzero_c_vzero_a, res.vzero_a_vzero_c, epsilon = 1e-12);
        assert_relative_eq!(res.q_vzero_a_vzero_c, -2.0);
        assert_relative_eq!(res.centrality, 12.5);
    }
}
