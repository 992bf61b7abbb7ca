//! Track and cluster selections and the containers that apply them.
//!
//! [`TrackContainer`] and [`ClusterContainer`] wrap the object lists of an
//! event together with a set of cuts. They implement [`Container`], so
//! [`FilteredView`] can iterate over all or only accepted objects:
//!
//! ```
//! use calopix_core::selection::{TrackContainer, TrackCuts};
//! use calopix_core::track::Track;
//!
//! let tracks = vec![Track::new(0, 0.1, 0.0, 0.0), Track::new(1, 1.0, 0.2, 0.0)];
//! let cuts = TrackCuts::default().with_pt_range(0.15, f64::INFINITY);
//! let container = TrackContainer::new(&tracks, cuts);
//! assert_eq!(container.accepted().len(), 1);
//! assert_eq!(container.all().len(), 2);
//! ```

use crate::calo::CaloCluster;
use crate::container::{Acceptance, Container, RejectionMask};
use crate::iterable::FilteredView;
use crate::track::{Track, TrackStatus};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kinematic and quality cuts on tracks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackCuts {
    /// Minimum pt (inclusive).
    pub min_pt: f64,
    /// Maximum pt (exclusive).
    pub max_pt: f64,
    /// Maximum |eta| (inclusive).
    pub max_abs_eta: f64,
    /// Minimum number of TPC clusters.
    pub min_tpc_clusters: u16,
    /// Maximum transverse distance of closest approach.
    pub max_dca_xy: Option<f64>,
    /// Maximum longitudinal distance of closest approach.
    pub max_dca_z: Option<f64>,
    /// Status bits that must all be set.
    pub required_status: TrackStatus,
}

impl Default for TrackCuts {
    fn default() -> Self {
        Self {
            min_pt: 0.0,
            max_pt: f64::INFINITY,
            max_abs_eta: f64::INFINITY,
            min_tpc_clusters: 0,
            max_dca_xy: None,
            max_dca_z: None,
            required_status: TrackStatus::default(),
        }
    }
}

impl TrackCuts {
    /// pt outside the allowed range.
    pub const PT: RejectionMask = RejectionMask(1 << 0);
    /// |eta| too large.
    pub const ETA: RejectionMask = RejectionMask(1 << 1);
    /// Too few TPC clusters.
    pub const TPC_CLUSTERS: RejectionMask = RejectionMask(1 << 2);
    /// Transverse DCA too large.
    pub const DCA_XY: RejectionMask = RejectionMask(1 << 3);
    /// Longitudinal DCA too large.
    pub const DCA_Z: RejectionMask = RejectionMask(1 << 4);
    /// Required status bits missing.
    pub const STATUS: RejectionMask = RejectionMask(1 << 5);

    /// Global ITS+TPC tracks, 2011 settings, as used for the flow candidates.
    #[must_use]
    pub fn standard_its_tpc_2011() -> Self {
        Self {
            min_pt: 0.0,
            max_pt: f64::INFINITY,
            max_abs_eta: 0.8,
            min_tpc_clusters: 70,
            max_dca_xy: Some(3.0),
            max_dca_z: Some(2.0),
            required_status: TrackStatus::ITS_REFIT | TrackStatus::TPC_REFIT,
        }
    }

    /// TPC-only tracks used to build the TPC event plane.
    #[must_use]
    pub fn tpc_only() -> Self {
        Self {
            min_pt: 0.2,
            max_pt: 20.0,
            max_abs_eta: 0.8,
            min_tpc_clusters: 70,
            max_dca_xy: Some(2.4),
            max_dca_z: Some(3.2),
            required_status: TrackStatus::default(),
        }
    }

    /// Sets the pt range `[min, max)`.
    #[must_use]
    pub fn with_pt_range(mut self, min: f64, max: f64) -> Self {
        self.min_pt = min;
        self.max_pt = max;
        self
    }

    /// Sets the maximum |eta|.
    #[must_use]
    pub fn with_max_abs_eta(mut self, eta: f64) -> Self {
        self.max_abs_eta = eta;
        self
    }

    /// Sets the minimum number of TPC clusters.
    #[must_use]
    pub fn with_min_tpc_clusters(mut self, clusters: u16) -> Self {
        self.min_tpc_clusters = clusters;
        self
    }

    /// Sets the DCA limits.
    #[must_use]
    pub fn with_max_dca(mut self, xy: f64, z: f64) -> Self {
        self.max_dca_xy = Some(xy);
        self.max_dca_z = Some(z);
        self
    }

    /// Collects every cut the track fails.
    #[must_use]
    pub fn rejection(&self, track: &Track) -> RejectionMask {
        let mut mask = RejectionMask::NONE;
        if track.pt < self.min_pt || track.pt >= self.max_pt {
            mask.insert(Self::PT);
        }
        if track.eta.abs() > self.max_abs_eta {
            mask.insert(Self::ETA);
        }
        if track.tpc_clusters < self.min_tpc_clusters {
            mask.insert(Self::TPC_CLUSTERS);
        }
        if self.max_dca_xy.is_some_and(|max| track.impact_xy.abs() > max) {
            mask.insert(Self::DCA_XY);
        }
        if self.max_dca_z.is_some_and(|max| track.impact_z.abs() > max) {
            mask.insert(Self::DCA_Z);
        }
        if !track.status.contains(self.required_status) {
            mask.insert(Self::STATUS);
        }
        mask
    }

    /// Returns true if the track passes every cut.
    #[must_use]
    pub fn accept(&self, track: &Track) -> bool {
        self.rejection(track).is_empty()
    }
}

/// Cuts on calorimeter clusters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterCuts {
    /// Minimum energy (GeV).
    pub min_energy: f64,
    /// Allowed time window (s).
    pub time_window: (f64, f64),
    /// Minimum number of cells.
    pub min_cells: usize,
    /// Reject non-EMCAL clusters.
    pub emcal_only: bool,
}

impl Default for ClusterCuts {
    fn default() -> Self {
        Self {
            min_energy: 0.0,
            time_window: (f64::NEG_INFINITY, f64::INFINITY),
            min_cells: 1,
            emcal_only: true,
        }
    }
}

impl ClusterCuts {
    /// Energy below threshold.
    pub const ENERGY: RejectionMask = RejectionMask(1 << 0);
    /// Time outside window.
    pub const TIME: RejectionMask = RejectionMask(1 << 1);
    /// Too few cells.
    pub const CELLS: RejectionMask = RejectionMask(1 << 2);
    /// Wrong detector.
    pub const DETECTOR: RejectionMask = RejectionMask(1 << 3);

    /// Sets the minimum energy.
    #[must_use]
    pub fn with_min_energy(mut self, energy: f64) -> Self {
        self.min_energy = energy;
        self
    }

    /// Sets the time window.
    #[must_use]
    pub fn with_time_window(mut self, min: f64, max: f64) -> Self {
        self.time_window = (min, max);
        self
    }

    /// Sets the minimum number of cells.
    #[must_use]
    pub fn with_min_cells(mut self, cells: usize) -> Self {
        self.min_cells = cells;
        self
    }

    /// Collects every cut the cluster fails.
    #[must_use]
    pub fn rejection(&self, cluster: &CaloCluster) -> RejectionMask {
        let mut mask = RejectionMask::NONE;
        if cluster.energy < self.min_energy {
            mask.insert(Self::ENERGY);
        }
        if cluster.tof < self.time_window.0 || cluster.tof > self.time_window.1 {
            mask.insert(Self::TIME);
        }
        if cluster.n_cells() < self.min_cells {
            mask.insert(Self::CELLS);
        }
        if self.emcal_only && !cluster.is_emcal() {
            mask.insert(Self::DETECTOR);
        }
        mask
    }
}

/// Tracks of an event together with a selection.
#[derive(Debug, Clone)]
pub struct TrackContainer<'a> {
    tracks: &'a [Track],
    cuts: TrackCuts,
    accepted_hint: usize,
}

impl<'a> TrackContainer<'a> {
    /// Wraps `tracks`; the accepted hint starts at the number of tracks.
    #[must_use]
    pub fn new(tracks: &'a [Track], cuts: TrackCuts) -> Self {
        Self {
            tracks,
            cuts,
            accepted_hint: tracks.len(),
        }
    }

    /// The cuts applied by this container.
    #[must_use]
    pub fn cuts(&self) -> &TrackCuts {
        &self.cuts
    }

    /// The wrapped tracks.
    #[must_use]
    pub fn tracks(&self) -> &'a [Track] {
        self.tracks
    }

    /// Counts accepted tracks and stores the result as the sizing hint.
    pub fn count_accepted(&mut self) -> usize {
        let count = self.tracks.iter().filter(|t| self.cuts.accept(t)).count();
        self.accepted_hint = count;
        count
    }

    /// View over the accepted tracks.
    #[must_use]
    pub fn accepted(&self) -> FilteredView<'_, Self> {
        FilteredView::accepted(self)
    }

    /// View over all tracks.
    #[must_use]
    pub fn all(&self) -> FilteredView<'_, Self> {
        FilteredView::all(self)
    }
}

impl Container for TrackContainer<'_> {
    type Item = Track;

    fn len(&self) -> usize {
        self.tracks.len()
    }

    fn accepted_hint(&self) -> usize {
        self.accepted_hint
    }

    fn accept(&self, position: usize) -> Acceptance {
        match self.tracks.get(position) {
            Some(track) => Acceptance::from_mask(self.cuts.rejection(track)),
            None => Acceptance::rejected(RejectionMask::NONE),
        }
    }

    fn get(&self, position: usize) -> Option<&Track> {
        self.tracks.get(position)
    }
}

/// Calorimeter clusters together with a selection.
#[derive(Debug, Clone)]
pub struct ClusterContainer<'a> {
    clusters: &'a [CaloCluster],
    cuts: ClusterCuts,
    accepted_hint: usize,
}

impl<'a> ClusterContainer<'a> {
    /// Wraps `clusters`; the accepted hint starts at the number of clusters.
    #[must_use]
    pub fn new(clusters: &'a [CaloCluster], cuts: ClusterCuts) -> Self {
        Self {
            clusters,
            cuts,
            accepted_hint: clusters.len(),
        }
    }

    /// The cuts applied by this container.
    #[must_use]
    pub fn cuts(&self) -> &ClusterCuts {
        &self.cuts
    }

    /// Counts accepted clusters and stores the result as the sizing hint.
    pub fn count_accepted(&mut self) -> usize {
        let count = self
            .clusters
            .iter()
            .filter(|c| self.cuts.rejection(c).is_empty())
            .count();
        self.accepted_hint = count;
        count
    }

    /// View over the accepted clusters.
    #[must_use]
    pub fn accepted(&self) -> FilteredView<'_, Self> {
        FilteredView::accepted(self)
    }

    /// View over all clusters.
    #[must_use]
    pub fn all(&self) -> FilteredView<'_, Self> {
        FilteredView::all(self)
    }
}

impl Container for ClusterContainer<'_> {
    type Item = CaloCluster;

    fn len(&self) -> usize {
        self.clusters.len()
    }

    fn accepted_hint(&self) -> usize {
        self.accepted_hint
    }

    fn accept(&self, position: usize) -> Acceptance {
        match self.clusters.get(position) {
            Some(cluster) => Acceptance::from_mask(self.cuts.rejection(cluster)),
            None => Acceptance::rejected(RejectionMask::NONE),
        }
    }

    fn get(&self, position: usize) -> Option<&CaloCluster> {
        self.clusters.get(position)
    }
}
