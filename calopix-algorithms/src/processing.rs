//! Parallel processing of event collections.
//!
//! Events are split into contiguous chunks; each rayon job runs its own task
//! instance over one chunk, so calibration is reloaded per chunk and run.
//! Outputs keep the input event order.

use rayon::prelude::*;

use calopix_core::{CaloCluster, Event};

use crate::calibration::CalibrationSource;
use crate::clusterize::{ClusterizeConfig, ClusterizeStatistics, EmcalClusterizeTask};
use crate::error::Result;
use crate::eventplane::EventPlaneResolution;
use crate::nuclei::{EventCounters, FlowCandidate, NucleiFlowConfig, NucleiFlowTask};

/// Events handled by one job.
pub const EVENTS_PER_JOB: usize = 64;

/// Clusters of every event plus merged statistics.
#[derive(Debug, Clone, Default)]
pub struct ClusterizeOutput {
    /// New clusters, one list per input event.
    pub clusters: Vec<Vec<CaloCluster>>,
    /// Statistics summed over all jobs.
    pub statistics: ClusterizeStatistics,
}

/// Flow candidates and resolution records plus merged counters.
#[derive(Debug, Clone, Default)]
pub struct FlowOutput {
    /// Candidates in event order.
    pub candidates: Vec<FlowCandidate>,
    /// One record per selected event.
    pub resolutions: Vec<EventPlaneResolution>,
    /// Counters summed over all jobs.
    pub counters: EventCounters,
}

/// Re-clusters a collection of events in parallel.
///
/// # Errors
/// Returns the first calibration error encountered.
pub fn clusterize_events<S>(
    events: &[Event],
    config: &ClusterizeConfig,
    source: &S,
) -> Result<ClusterizeOutput>
where
    S: CalibrationSource + Sync,
{
    let jobs = events
        .par_chunks(EVENTS_PER_JOB)
        .map(|chunk| {
            let mut task = EmcalClusterizeTask::new(config.clone(), source);
            let mut clusters = Vec::with_capacity(chunk.len());
            for event in chunk {
                task.process_event(event)?;
                clusters.push(task.take_clusters());
            }
            Ok((clusters, task.statistics()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut output = ClusterizeOutput {
        clusters: Vec::with_capacity(events.len()),
        ..ClusterizeOutput::default()
    };
    for (clusters, statistics) in jobs {
        output.clusters.extend(clusters);
        output.statistics += statistics;
    }
    log::info!(
        "clusterized {} events into {} clusters",
        output.statistics.events,
        output.statistics.clusters
    );
    Ok(output)
}

/// Runs the flow task over a collection of events in parallel.
#[must_use]
pub fn process_events(events: &[Event], config: &NucleiFlowConfig) -> FlowOutput {
    let jobs: Vec<_> = events
        .par_chunks(EVENTS_PER_JOB)
        .map(|chunk| {
            let mut task = NucleiFlowTask::new(config.clone());
            for event in chunk {
                task.process_event(event);
            }
            task.into_parts()
        })
        .collect();

    let mut output = FlowOutput::default();
    for (candidates, resolutions, counters) in jobs {
        output.candidates.extend(candidates);
        output.resolutions.extend(resolutions);
        output.counters += counters;
    }
    log::info!(
        "{} of {} events selected, {} candidates",
        output.counters.selected,
        output.counters.all_events,
        output.counters.candidates
    );
    output
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
mod tests {
    use super::*;
    use crate::calibration::{Calibration, StaticCalibration};
    use crate::error::ClusterizeError;
    use calopix_core::{CaloCell, Vertex};

    fn cell_event(run: i32, abs_id: u16) -> Event {
        Event {
            run_number: run,
            cells: vec![CaloCell::new(abs_id, 1.0, 0.0)],
            ..Event::default()
        }
    }

    #[test]
    fn test_clusterize_events_keeps_order() {
        let events: Vec<Event> = (0..200)
            .map(|i| cell_event(1 + i / 50, (i * 7) as u16))
            .collect();
        let source = StaticCalibration::uniform(Calibration::default());
        let output = clusterize_events(&events, &ClusterizeConfig::default(), &source).unwrap();

        assert_eq!(output.clusters.len(), 200);
        for (i, clusters) in output.clusters.iter().enumerate() {
            assert_eq!(clusters.len(), 1);
            assert_eq!(clusters[0].cell_ids, vec![(i * 7) as u16]);
        }
        assert_eq!(output.statistics.events, 200);
        assert_eq!(output.statistics.clusters, 200);
        assert!(output.statistics.calibration_loads >= 4);
    }

    #[test]
    fn test_clusterize_events_propagates_missing_calibration() {
        let events = vec![cell_event(1, 0), cell_event(2, 0)];
        let source = StaticCalibration::default().with_run(1, Calibration::default());
        let err = clusterize_events(&events, &ClusterizeConfig::default(), &source).unwrap_err();
        assert!(matches!(err, ClusterizeError::MissingCalibration { run: 2 }));
    }

    #[test]
    fn test_process_events_merges_counters() {
        let events: Vec<Event> = (0..150)
            .map(|i| Event {
                vertex_tracks: Some(Vertex {
                    z: if i % 3 == 0 { 15.0 } else { 0.0 },
                    n_contributors: 5,
                }),
                ..Event::default()
            })
            .collect();
        let output = process_events(&events, &NucleiFlowConfig::default());
        assert_eq!(output.counters.all_events, 150);
        assert_eq!(output.counters.with_vertex, 150);
        assert_eq!(output.counters.vertex_z, 100);
        assert_eq!(output.counters.selected, 0);
        assert!(output.candidates.is_empty());
    }
}
