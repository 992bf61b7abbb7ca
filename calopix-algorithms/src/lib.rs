//! calopix-algorithms: EMCAL re-clusterization and light-nuclei flow tasks.
//!
//! This crate provides the analysis tasks built on `calopix-core`:
//! - **Clusterization** - cells to clusters with the v1 (connected towers)
//!   or NxN (fixed window) clusterizer, optional unfolding, shower shape
//!   evaluation and cluster-track matching
//! - **Event plane** - TPC sub-event and VZERO event planes, resolution terms
//! - **Nuclei flow** - d, t and ³He selection with TPC and TOF, v2 candidates
//! - **Processing** - rayon batch drivers for both tasks
//!
#![warn(missing_docs)]

pub mod calibration;
pub mod clusterize;
pub mod clusterizer;
mod error;
pub mod eventplane;
pub mod geometry;
pub mod matching;
pub mod nuclei;
mod processing;
pub mod recparam;
pub mod recpoints;
pub mod unfolding;

pub use calibration::{Calibration, CalibrationSource, DeadMap, RunConditions, StaticCalibration};
pub use clusterize::{
    ClusterizeConfig, ClusterizeStatistics, EmcalClusterizeTask, DEFAULT_OUTPUT_BRANCH,
};
pub use clusterizer::{Clusterizer, Digit, NxnClusterizer, RecPoint, V1Clusterizer};
pub use error::{ClusterizeError, Result};
pub use eventplane::{
    candidate_event_plane, phi_0_pi, EventPlaneAngles, EventPlaneResolution, TpcSubEvents,
};
pub use geometry::{TowerGeometry, TowerIndex};
pub use matching::{ResidualTrackMatcher, TrackMatcher};
pub use nuclei::{
    bethe_bloch_aleph, EventCounters, EventType, FlowCandidate, NucleiFlowConfig, NucleiFlowTask,
    Species, TrackDecision,
};
pub use processing::{
    clusterize_events, process_events, ClusterizeOutput, FlowOutput, EVENTS_PER_JOB,
};
pub use recparam::{ClusterizerKind, RecParam};
pub use recpoints::{ShapeCalculator, ShowerCell};
pub use unfolding::{LocalMaximaUnfolder, Unfolder};
