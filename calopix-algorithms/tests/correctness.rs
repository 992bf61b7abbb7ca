#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
use approx::assert_relative_eq;
use calopix_algorithms::{
    clusterize_events, process_events, Calibration, ClusterizeConfig, ClusterizerKind,
    EmcalClusterizeTask, NucleiFlowConfig, RecParam, Species, StaticCalibration, TowerGeometry,
};
use calopix_core::{
    CaloCell, ClusterContainer, ClusterCuts, Event, EventPlaneInfo, QVector, Track, TrackStatus,
    TriggerMask, Vertex,
};

/// Two showers: a 3x3 block around tower (row 5, col 10) of SM 0 and a
/// single hot tower in SM 3.
fn shower_cells(geometry: &TowerGeometry) -> Vec<CaloCell> {
    let mut cells = Vec::new();
    for dr in 0..3u16 {
        for dc in 0..3u16 {
            let id = (4 + dr) * geometry.cols + 9 + dc;
            let amplitude = if dr == 1 && dc == 1 { 3.0 } else { 0.2 };
            cells.push(CaloCell::new(id, amplitude, 0.0));
        }
    }
    cells.push(CaloCell::new(3 * 1152 + 500, 1.2, 0.0));
    cells
}

fn config(kind: ClusterizerKind) -> ClusterizeConfig {
    ClusterizeConfig::default().with_rec_param(
        RecParam::default()
            .with_clusterizer(kind)
            .with_clustering_threshold(0.5)
            .with_min_digit_energy(0.05),
    )
}

#[test]
fn test_all_clusterizers_find_two_showers() {
    let geometry = TowerGeometry::default();
    let event = Event {
        run_number: 100,
        cells: shower_cells(&geometry),
        ..Event::default()
    };
    let source = StaticCalibration::uniform(Calibration::default());

    for kind in [
        ClusterizerKind::V1,
        ClusterizerKind::Nxn,
        ClusterizerKind::NxnExtended,
    ] {
        let mut task = EmcalClusterizeTask::new(config(kind), &source);
        let clusters = task.process_event(&event).unwrap();
        assert_eq!(clusters.len(), 2, "{kind:?}");
        assert_relative_eq!(clusters[0].energy, 3.0 + 8.0 * 0.2, epsilon = 1e-9);
        assert_eq!(clusters[0].n_cells(), 9);
        assert_eq!(clusters[0].n_local_maxima, 1);
        assert_relative_eq!(clusters[1].energy, 1.2);

        // Symmetric block: the shower is round.
        assert_relative_eq!(clusters[0].m02, clusters[0].m20, epsilon = 1e-9);

        let (eta, phi) = geometry.eta_phi(5 * 48 + 10).unwrap();
        assert_relative_eq!(clusters[0].eta(), eta, epsilon = 1e-3);
        assert_relative_eq!(clusters[0].phi(), phi, epsilon = 1e-3);
    }
}

#[test]
fn test_cluster_selection_on_output() {
    let geometry = TowerGeometry::default();
    let events = vec![Event {
        run_number: 7,
        cells: shower_cells(&geometry),
        ..Event::default()
    }];
    let source = StaticCalibration::uniform(Calibration::default());
    let output = clusterize_events(&events, &config(ClusterizerKind::V1), &source).unwrap();

    let cuts = ClusterCuts::default().with_min_cells(2);
    let container = ClusterContainer::new(&output.clusters[0], cuts);
    let accepted = container.accepted();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted.element_at(0).map(|c| c.id), Some(0));
}

fn flow_event(i: usize) -> Event {
    let species = Species::Deuteron;
    let p = 1.0 + (i % 5) as f64 * 0.2;
    let length = 420.0;
    let phi = 0.3 * (i % 7) as f64;
    let candidate = Track {
        p,
        inner_p: Some(p),
        tpc_signal: species.expected_tpc_signal(p),
        tpc_clusters: 130,
        length,
        tof_signal: length / (2.997_924_58e-2 * species.expected_beta(p)),
        status: TrackStatus::ITS_REFIT | TrackStatus::TPC_REFIT | TrackStatus::TOF_OUT,
        charge: if i % 2 == 0 { 1 } else { -1 },
        ..Track::new(i as i32, p * 0.8, 0.3, phi)
    };
    Event {
        run_number: 1,
        vertex_tracks: Some(Vertex {
            z: 2.0,
            n_contributors: 20,
        }),
        centrality: 30.0,
        trigger: TriggerMask::MB,
        tracks: vec![candidate],
        event_plane: Some(EventPlaneInfo {
            q_tpc: QVector::new(1.0, 0.5),
            q_vzero_a: QVector::new(0.3, 0.1),
            q_vzero_c: QVector::new(0.2, -0.1),
            q_vzero: QVector::new(0.5, 0.0),
            ..EventPlaneInfo::default()
        }),
        ..Event::default()
    }
}

#[test]
fn test_flow_candidates_over_many_events() {
    let events: Vec<Event> = (0..300).map(flow_event).collect();
    let output = process_events(&events, &NucleiFlowConfig::default());

    assert_eq!(output.counters.all_events, 300);
    assert_eq!(output.counters.minimum_bias, 300);
    assert_eq!(output.counters.selected, 300);
    assert_eq!(output.resolutions.len(), 300);
    assert_eq!(output.candidates.len(), 300);
    assert_eq!(output.counters.candidates, 300);

    for (i, candidate) in output.candidates.iter().enumerate() {
        assert_relative_eq!(candidate.phi, 0.3 * (i % 7) as f64, epsilon = 1e-12);
        assert_relative_eq!(candidate.mass, Species::Deuteron.mass(), epsilon = 1e-6);
        assert!(candidate.cos2dphi_tpc.abs() <= 1.0);
        assert_relative_eq!(candidate.centrality, 30.0);
    }
}
