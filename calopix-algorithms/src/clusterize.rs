//! EMCAL re-clusterization task.
//!
//! For each event the task either re-runs the clusterizer on the event's
//! EMCAL cells, or (in just-unfold mode) splits the event's existing EMCAL
//! clusters. Calibration is fetched from a [`CalibrationSource`] whenever the
//! run number changes. For ESD events the new clusters are matched to tracks.
//! Output clusters carry ids `0..n` in output order.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::collections::HashMap;

use calopix_core::{CaloCell, CaloCluster, ClusterContainer, ClusterCuts, Event, EventFormat};

use crate::calibration::{CalibrationSource, RunConditions};
use crate::clusterizer::{build_clusterizer, Clusterizer, Digit};
use crate::error::Result;
use crate::geometry::TowerGeometry;
use crate::matching::{ResidualTrackMatcher, TrackMatcher};
use crate::recparam::RecParam;
use crate::recpoints::{shower_cells, ShapeCalculator, ShowerCell};
use crate::unfolding::{LocalMaximaUnfolder, Unfolder};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default name of the output cluster branch.
pub const DEFAULT_OUTPUT_BRANCH: &str = "newEMCALClusters";

/// Configuration of the clusterization task.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterizeConfig {
    /// Reconstruction parameters.
    pub rec_param: RecParam,
    /// Tower geometry.
    pub geometry: TowerGeometry,
    /// Name under which the new clusters are published.
    pub output_branch: String,
    /// Only unfold the event's existing clusters instead of re-clustering.
    pub just_unfold: bool,
    /// Write the output branch to the output file.
    pub fill_aod: bool,
    /// Residual window of the track matching.
    pub matcher: ResidualTrackMatcher,
}

impl Default for ClusterizeConfig {
    fn default() -> Self {
        Self {
            rec_param: RecParam::default(),
            geometry: TowerGeometry::default(),
            output_branch: DEFAULT_OUTPUT_BRANCH.to_string(),
            just_unfold: false,
            fill_aod: true,
            matcher: ResidualTrackMatcher::default(),
        }
    }
}

impl ClusterizeConfig {
    /// Sets the reconstruction parameters.
    #[must_use]
    pub fn with_rec_param(mut self, rec_param: RecParam) -> Self {
        self.rec_param = rec_param;
        self
    }

    /// Sets the geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: TowerGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Sets the output branch name.
    #[must_use]
    pub fn with_output_branch(mut self, name: impl Into<String>) -> Self {
        self.output_branch = name.into();
        self
    }

    /// Enables or disables writing of the output branch.
    #[must_use]
    pub fn with_fill_aod(mut self, fill_aod: bool) -> Self {
        self.fill_aod = fill_aod;
        self
    }

    /// Enables just-unfold mode.
    #[must_use]
    pub fn with_just_unfold(mut self, just_unfold: bool) -> Self {
        self.just_unfold = just_unfold;
        self
    }

    /// Sets the track matching window.
    #[must_use]
    pub fn with_matcher(mut self, matcher: ResidualTrackMatcher) -> Self {
        self.matcher = matcher;
        self
    }
}

/// Counters accumulated over processed events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterizeStatistics {
    /// Events processed.
    pub events: u64,
    /// Calibration loads (run changes).
    pub calibration_loads: u64,
    /// Digits handed to the clusterizer.
    pub digits: u64,
    /// Cells dropped because their id is outside the geometry.
    pub invalid_cells: u64,
    /// Rec points produced by the clusterizer.
    pub rec_points: u64,
    /// Rec points without any significant cell.
    pub skipped_rec_points: u64,
    /// Clusters split by the unfolding.
    pub unfolded_clusters: u64,
    /// Clusters published.
    pub clusters: u64,
    /// Clusters with a matched track.
    pub matched_clusters: u64,
}

impl std::ops::AddAssign for ClusterizeStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.events += rhs.events;
        self.calibration_loads += rhs.calibration_loads;
        self.digits += rhs.digits;
        self.invalid_cells += rhs.invalid_cells;
        self.rec_points += rhs.rec_points;
        self.skipped_rec_points += rhs.skipped_rec_points;
        self.unfolded_clusters += rhs.unfolded_clusters;
        self.clusters += rhs.clusters;
        self.matched_clusters += rhs.matched_clusters;
    }
}

/// Objects rebuilt on every run change.
struct RunState {
    conditions: RunConditions,
    clusterizer: Option<Box<dyn Clusterizer>>,
    unfolder: Option<Box<dyn Unfolder>>,
}

/// EMCAL re-clusterization task.
pub struct EmcalClusterizeTask<S> {
    config: ClusterizeConfig,
    source: S,
    matcher: Box<dyn TrackMatcher>,
    run: Option<RunState>,
    output: Vec<CaloCluster>,
    stats: ClusterizeStatistics,
}

impl<S: CalibrationSource> EmcalClusterizeTask<S> {
    /// Creates a task; calibration is loaded with the first event.
    #[must_use]
    pub fn new(config: ClusterizeConfig, source: S) -> Self {
        let matcher = Box::new(config.matcher.clone());
        Self {
            config,
            source,
            matcher,
            run: None,
            output: Vec::new(),
            stats: ClusterizeStatistics::default(),
        }
    }

    /// Replaces the track matcher.
    #[must_use]
    pub fn with_track_matcher(mut self, matcher: Box<dyn TrackMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// The task configuration.
    #[must_use]
    pub fn config(&self) -> &ClusterizeConfig {
        &self.config
    }

    /// Run whose calibration is loaded.
    #[must_use]
    pub fn current_run(&self) -> Option<i32> {
        self.run.as_ref().map(|state| state.conditions.run)
    }

    /// Clusters of the last processed event.
    #[must_use]
    pub fn clusters(&self) -> &[CaloCluster] {
        &self.output
    }

    /// Takes the clusters of the last processed event.
    pub fn take_clusters(&mut self) -> Vec<CaloCluster> {
        std::mem::take(&mut self.output)
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn statistics(&self) -> ClusterizeStatistics {
        self.stats
    }

    /// Loads the calibration and rebuilds the clusterizer if the run changed.
    ///
    /// # Errors
    /// Fails on invalid parameters or when the calibration source has no
    /// entry for the run.
    pub fn init_run(&mut self, run: i32) -> Result<()> {
        if self.current_run() == Some(run) {
            return Ok(());
        }
        self.config.rec_param.validate()?;
        log::info!("loading EMCAL calibration for run {run}");
        let conditions = self.source.load(run)?;
        self.stats.calibration_loads += 1;

        let params = &self.config.rec_param;
        let geometry = &self.config.geometry;
        let (clusterizer, unfolder): (Option<Box<dyn Clusterizer>>, Option<Box<dyn Unfolder>>) =
            if self.config.just_unfold {
                (
                    None,
                    Some(Box::new(LocalMaximaUnfolder::new(
                        geometry.clone(),
                        params.loc_max_cut,
                    )) as Box<dyn Unfolder>),
                )
            } else {
                let clusterizer = build_clusterizer(params, geometry);
                log::info!(
                    "clusterizer {} initialised for run {run} (threshold {} GeV, w0 {})",
                    clusterizer.name(),
                    params.clustering_threshold,
                    params.w0
                );
                let unfolder = params.unfold.then(|| {
                    Box::new(LocalMaximaUnfolder::new(geometry.clone(), params.loc_max_cut))
                        as Box<dyn Unfolder>
                });
                (Some(clusterizer), unfolder)
            };

        self.run = Some(RunState {
            conditions,
            clusterizer,
            unfolder,
        });
        Ok(())
    }

    /// Processes one event and returns its new clusters.
    ///
    /// # Errors
    /// Propagates calibration loading errors.
    pub fn process_event(&mut self, event: &Event) -> Result<&[CaloCluster]> {
        self.output.clear();
        self.init_run(event.run_number)?;
        self.stats.events += 1;

        let Some(state) = self.run.as_ref() else {
            return Ok(&self.output);
        };
        let shapes = ShapeCalculator::new(
            &self.config.geometry,
            self.config.rec_param.w0,
            self.config.rec_param.loc_max_cut,
        );

        let mut clusters = if self.config.just_unfold {
            unfold_existing(event, state, &shapes, &mut self.stats)
        } else {
            recluster(event, state, &shapes, &mut self.stats)
        };

        if event.format == EventFormat::Esd {
            let matched = self.matcher.match_tracks(&mut clusters, &event.tracks);
            self.stats.matched_clusters += matched as u64;
        }

        for (i, cluster) in clusters.iter_mut().enumerate() {
            cluster.id = i as i32;
        }
        self.stats.clusters += clusters.len() as u64;
        log::debug!(
            "run {}: {} clusters from {} cells",
            event.run_number,
            clusters.len(),
            event.cells.len()
        );
        self.output = clusters;
        Ok(&self.output)
    }
}

/// Calibrated digits of the event's cells.
fn digitize(
    cells: &[CaloCell],
    geometry: &TowerGeometry,
    conditions: &RunConditions,
    stats: &mut ClusterizeStatistics,
) -> Vec<Digit> {
    let mut digits = Vec::with_capacity(cells.len());
    for (index_in_list, cell) in cells.iter().enumerate() {
        if geometry.tower_index(cell.abs_id).is_none() {
            log::debug!("dropping cell with unknown id {}", cell.abs_id);
            stats.invalid_cells += 1;
            continue;
        }
        digits.push(Digit {
            abs_id: cell.abs_id,
            amplitude: conditions.calibration.calibrate(cell.abs_id, cell.amplitude),
            time: cell.time,
            index_in_list,
        });
    }
    stats.digits += digits.len() as u64;
    digits
}

/// Builds clusters, splitting them first when an unfolder is configured.
fn finish_clusters(
    cells: &[ShowerCell],
    state: &RunState,
    shapes: &ShapeCalculator<'_>,
    stats: &mut ClusterizeStatistics,
    out: &mut Vec<CaloCluster>,
) {
    let parts = match &state.unfolder {
        Some(unfolder) => unfolder.unfold(cells),
        None => vec![cells.to_vec()],
    };
    if parts.len() > 1 {
        stats.unfolded_clusters += 1;
    }
    out.extend(
        parts
            .iter()
            .filter_map(|part| shapes.build_cluster(part, &state.conditions)),
    );
}

fn recluster(
    event: &Event,
    state: &RunState,
    shapes: &ShapeCalculator<'_>,
    stats: &mut ClusterizeStatistics,
) -> Vec<CaloCluster> {
    let Some(clusterizer) = &state.clusterizer else {
        return Vec::new();
    };
    let digits = digitize(&event.cells, shapes.geometry(), &state.conditions, stats);
    let rec_points = clusterizer.clusterize(&digits, &state.conditions);
    stats.rec_points += rec_points.len() as u64;

    let mut clusters = Vec::with_capacity(rec_points.len());
    for point in &rec_points {
        let cells = shower_cells(point, &digits);
        if cells.is_empty() {
            log::warn!("skipping cluster with no cells");
            stats.skipped_rec_points += 1;
            continue;
        }
        finish_clusters(&cells, state, shapes, stats, &mut clusters);
    }
    clusters
}

fn unfold_existing(
    event: &Event,
    state: &RunState,
    shapes: &ShapeCalculator<'_>,
    stats: &mut ClusterizeStatistics,
) -> Vec<CaloCluster> {
    let Some(unfolder) = &state.unfolder else {
        return Vec::new();
    };
    let amplitudes: HashMap<u16, &CaloCell> =
        event.cells.iter().map(|cell| (cell.abs_id, cell)).collect();
    let cuts = ClusterCuts::default().with_min_cells(0);
    let container = ClusterContainer::new(&event.clusters, cuts);

    let mut clusters = Vec::with_capacity(event.clusters.len());
    for cluster in &container.accepted() {
        let cells: Vec<ShowerCell> = cluster
            .cell_ids
            .iter()
            .zip(&cluster.cell_fractions)
            .filter_map(|(&abs_id, &fraction)| {
                let cell = amplitudes.get(&abs_id)?;
                let amplitude = state.conditions.calibration.calibrate(abs_id, cell.amplitude);
                Some(ShowerCell {
                    abs_id,
                    energy: amplitude * fraction,
                    amplitude,
                    time: cell.time,
                })
            })
            .collect();

        let parts = unfolder.unfold(&cells);
        if parts.len() < 2 {
            clusters.push(CaloCluster {
                matched_tracks: Vec::new(),
                ..cluster.clone()
            });
            continue;
        }
        stats.unfolded_clusters += 1;
        clusters.extend(
            parts
                .iter()
                .filter_map(|part| shapes.build_cluster(part, &state.conditions)),
        );
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Calibration, StaticCalibration};
    use crate::error::ClusterizeError;
    use crate::recparam::ClusterizerKind;
    use approx::assert_relative_eq;
    use calopix_core::{ClusterKind, Track};

    fn event(run: i32, cells: Vec<CaloCell>) -> Event {
        Event {
            run_number: run,
            cells,
            ..Event::default()
        }
    }

    fn config() -> ClusterizeConfig {
        ClusterizeConfig::default().with_rec_param(
            RecParam::default()
                .with_clustering_threshold(0.5)
                .with_min_digit_energy(0.05),
        )
    }

    #[test]
    fn test_reclusters_cells_and_assigns_ids() {
        let source = StaticCalibration::uniform(Calibration::default());
        let mut task = EmcalClusterizeTask::new(config(), &source);
        let cells = vec![
            CaloCell::new(100, 2.0, 0.0),
            CaloCell::new(101, 0.5, 0.0),
            CaloCell::new(700, 1.0, 0.0),
            CaloCell::new(60_000, 5.0, 0.0),
        ];
        let clusters = task.process_event(&event(1, cells)).unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, 0);
        assert_eq!(clusters[1].id, 1);
        assert_relative_eq!(clusters[0].energy, 2.5);
        assert_eq!(clusters[0].cell_ids, vec![100, 101]);
        assert_relative_eq!(clusters[0].chi2, -1.0);

        let stats = task.statistics();
        assert_eq!(stats.invalid_cells, 1);
        assert_eq!(stats.digits, 3);
        assert_eq!(stats.clusters, 2);
    }

    #[test]
    fn test_calibration_reloaded_on_run_change_only() {
        let source = StaticCalibration::default()
            .with_run(1, Calibration::default())
            .with_run(2, Calibration::default().with_bad_channels([100]));
        let mut task = EmcalClusterizeTask::new(config(), &source);
        let cells = vec![CaloCell::new(100, 2.0, 0.0)];

        assert_eq!(task.process_event(&event(1, cells.clone())).unwrap().len(), 1);
        task.process_event(&event(1, cells.clone())).unwrap();
        assert_eq!(task.statistics().calibration_loads, 1);

        assert!(task.process_event(&event(2, cells.clone())).unwrap().is_empty());
        assert_eq!(task.statistics().calibration_loads, 2);
        assert_eq!(task.current_run(), Some(2));

        let err = task.process_event(&event(3, cells)).unwrap_err();
        assert!(matches!(err, ClusterizeError::MissingCalibration { run: 3 }));
        assert!(task.clusters().is_empty());
    }

    #[test]
    fn test_track_matching_only_for_esd() {
        let source = StaticCalibration::uniform(Calibration::default());
        let geometry = TowerGeometry::default();
        let (eta, phi) = geometry.eta_phi(300).unwrap();
        let track = Track {
            emcal_eta_phi: Some((eta, phi)),
            ..Track::new(42, 2.0, eta, phi)
        };
        let mut esd = event(5, vec![CaloCell::new(300, 1.5, 0.0)]);
        esd.tracks = vec![track];
        let mut aod = esd.clone();
        aod.format = EventFormat::Aod;

        let mut task = EmcalClusterizeTask::new(config(), &source);
        assert_eq!(task.process_event(&esd).unwrap()[0].matched_tracks, vec![42]);
        assert!(task.process_event(&aod).unwrap()[0].matched_tracks.is_empty());
        assert_eq!(task.statistics().matched_clusters, 1);
    }

    #[test]
    fn test_just_unfold_splits_emcal_clusters_only() {
        let source = StaticCalibration::uniform(Calibration::default());
        let mut task =
            EmcalClusterizeTask::new(config().with_just_unfold(true), &source);

        let cells = vec![
            CaloCell::new(0, 2.0, 0.0),
            CaloCell::new(1, 0.4, 0.0),
            CaloCell::new(2, 1.0, 0.0),
            CaloCell::new(500, 1.0, 0.0),
        ];
        let mut ev = event(9, cells);
        ev.format = EventFormat::Aod;
        ev.clusters = vec![
            CaloCluster {
                energy: 3.4,
                cell_ids: vec![0, 1, 2],
                cell_fractions: vec![1.0, 1.0, 1.0],
                ..CaloCluster::default()
            },
            CaloCluster {
                energy: 1.0,
                cell_ids: vec![500],
                cell_fractions: vec![1.0],
                ..CaloCluster::default()
            },
            CaloCluster {
                kind: ClusterKind::Phos,
                energy: 7.0,
                cell_ids: vec![3],
                cell_fractions: vec![1.0],
                ..CaloCluster::default()
            },
        ];

        let clusters = task.process_event(&ev).unwrap();
        assert_eq!(clusters.len(), 3);
        let total: f64 = clusters.iter().map(|c| c.energy).sum();
        assert_relative_eq!(total, 4.4, epsilon = 1e-9);
        assert!(clusters.iter().all(CaloCluster::is_emcal));
        assert_eq!(
            clusters.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(task.statistics().unfolded_clusters, 1);
    }

    #[test]
    fn test_just_unfold_keeps_empty_emcal_clusters() {
        let source = StaticCalibration::uniform(Calibration::default());
        let mut task = EmcalClusterizeTask::new(config().with_just_unfold(true), &source);
        let mut ev = event(9, Vec::new());
        ev.clusters = vec![CaloCluster {
            energy: 0.8,
            ..CaloCluster::default()
        }];

        let clusters = task.process_event(&ev).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].n_cells(), 0);
        assert_relative_eq!(clusters[0].energy, 0.8);
        assert_eq!(clusters[0].id, 0);
    }

    #[test]
    fn test_output_branch_defaults() {
        let config = ClusterizeConfig::default();
        assert_eq!(config.output_branch, "newEMCALClusters");
        assert!(config.fill_aod);
        assert!(!config.just_unfold);

        let config = config.with_output_branch("caloClusters").with_fill_aod(false);
        assert_eq!(config.output_branch, "caloClusters");
        assert!(!config.fill_aod);
    }

    #[test]
    fn test_nxn_through_task() {
        let source = StaticCalibration::uniform(Calibration::default());
        let params = config()
            .rec_param
            .with_clusterizer(ClusterizerKind::NxnExtended);
        let mut task = EmcalClusterizeTask::new(config().with_rec_param(params), &source);
        let cells = vec![CaloCell::new(98, 2.0, 0.0), CaloCell::new(196, 0.3, 0.0)];
        let clusters = task.process_event(&event(1, cells)).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].n_cells(), 2);
    }

    #[test]
    fn test_invalid_params_fail_at_first_event() {
        let source = StaticCalibration::uniform(Calibration::default());
        let bad = config().with_rec_param(RecParam::default().with_w0(-1.0));
        let mut task = EmcalClusterizeTask::new(bad, &source);
        assert!(matches!(
            task.process_event(&event(1, Vec::new())),
            Err(ClusterizeError::Core(_))
        ));
    }
}
