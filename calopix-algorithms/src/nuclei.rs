//! Light-nuclei elliptic flow task.
//!
//! Selects deuteron, triton or ³He candidates with TPC dE/dx and TOF, and
//! records for each one its azimuth relative to the TPC and VZERO event
//! planes together with the scalar-product terms `u·Q`. Each selected event
//! also yields one [`EventPlaneResolution`] record.

use calopix_core::{Event, EventPlaneInfo, Track, TrackCuts, TriggerMask};

use crate::eventplane::{
    candidate_event_plane, phi_0_pi, EventPlaneAngles, EventPlaneResolution, TpcSubEvents,
    HARMONIC,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Speed of light in cm/ps.
const SPEED_OF_LIGHT: f64 = 2.997_924_579_999_999_84e-2;

/// Proton mass used to scale βγ in the dE/dx parametrisation (GeV/c²).
const NUCLEON_MASS: f64 = 0.938;

/// ALEPH parametrisation of the specific energy loss as a function of βγ.
#[must_use]
pub fn bethe_bloch_aleph(bg: f64, p1: f64, p2: f64, p3: f64, p4: f64, p5: f64) -> f64 {
    let beta = bg / (1.0 + bg * bg).sqrt();
    let aa = beta.powf(p4);
    let bb = (p3 + (1.0 / bg).powf(p5)).ln();
    (p2 - aa - bb) * p1 / aa
}

/// Nucleus selected by the task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Species {
    /// Deuteron.
    #[default]
    Deuteron,
    /// Triton.
    Triton,
    /// Helium-3.
    Helium3,
}

impl Species {
    /// Mass (GeV/c²).
    #[must_use]
    pub fn mass(self) -> f64 {
        match self {
            Self::Deuteron => 1.875_612_762,
            Self::Triton => 2.808_939,
            Self::Helium3 => 2.808_92,
        }
    }

    /// Expected TPC signal at inner-wall momentum `ptot`.
    #[must_use]
    pub fn expected_tpc_signal(self, ptot: f64) -> f64 {
        const P: (f64, f64, f64, f64, f64) =
            (1.458_02, 27.4992, 4.003_13e-15, 2.484_85, 8.317_68);
        match self {
            Self::Deuteron => {
                bethe_bloch_aleph(ptot / (NUCLEON_MASS * 2.0), P.0, P.1, P.2, P.3, P.4)
            }
            Self::Triton => {
                bethe_bloch_aleph(ptot / (NUCLEON_MASS * 3.0), P.0, P.1, P.2, P.3, P.4)
            }
            Self::Helium3 => {
                4.0 * bethe_bloch_aleph(
                    2.0 * ptot / (NUCLEON_MASS * 3.0),
                    1.749_62,
                    27.4992,
                    4.003_13e-15,
                    2.424_85,
                    8.317_68,
                )
            }
        }
    }

    /// Expected velocity at momentum `p`.
    #[must_use]
    pub fn expected_beta(self, p: f64) -> f64 {
        let m2 = self.mass() * self.mass();
        (1.0 - m2 / (p * p + m2)).sqrt()
    }

    /// Accepted TOF mass range.
    #[must_use]
    pub fn mass_window(self) -> (f64, f64) {
        match self {
            Self::Deuteron => (1.05, 2.65),
            Self::Triton | Self::Helium3 => (1.8, 5.0),
        }
    }

    /// Factor applied to the reconstructed pt (charge two for ³He).
    #[must_use]
    pub fn pt_scale(self) -> f64 {
        match self {
            Self::Helium3 => 2.0,
            Self::Deuteron | Self::Triton => 1.0,
        }
    }
}

impl TryFrom<u8> for Species {
    type Error = calopix_core::Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Deuteron),
            2 => Ok(Self::Triton),
            3 => Ok(Self::Helium3),
            other => Err(calopix_core::Error::ConfigError(format!(
                "unknown particle species {other}"
            ))),
        }
    }
}

/// Trigger class of a selected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventType {
    /// Central trigger.
    Central,
    /// Semi-central trigger.
    SemiCentral,
    /// Minimum bias within the centrality range.
    MinimumBias,
}

impl EventType {
    /// Numeric code (1, 2, 3).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Central => 1,
            Self::SemiCentral => 2,
            Self::MinimumBias => 3,
        }
    }
}

/// Event and candidate bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventCounters {
    /// Events seen.
    pub all_events: u64,
    /// Events with a primary vertex.
    pub with_vertex: u64,
    /// Events with |vz| within range.
    pub vertex_z: u64,
    /// Events with the central trigger.
    pub central: u64,
    /// Events with the semi-central trigger.
    pub semi_central: u64,
    /// Minimum-bias events within the centrality range.
    pub minimum_bias: u64,
    /// Events entering the analysis.
    pub analysed: u64,
    /// Events passing the full event selection.
    pub selected: u64,
    /// Candidates written.
    pub candidates: u64,
    /// Tracks outside the momentum range of the TOF analysis.
    pub out_of_pt_bounds: u64,
    /// Tracks failing the TOF requirement, a PID pull or the mass window.
    pub mismatch: u64,
    /// Selected events without event plane information.
    pub invalid_tpc_ep: u64,
}

impl EventCounters {
    /// Counters with their labels, in bin order.
    #[must_use]
    pub fn labeled(&self) -> [(&'static str, u64); 12] {
        [
            ("All Events", self.all_events),
            ("Events w/PV", self.with_vertex),
            ("Events w/|Vz|<10cm", self.vertex_z),
            ("Central Events", self.central),
            ("Semi-Central Events", self.semi_central),
            ("MB Events", self.minimum_bias),
            ("nEventsAnal", self.analysed),
            ("nEvSelected", self.selected),
            ("nCandidatesSelected", self.candidates),
            ("out of pt bounds", self.out_of_pt_bounds),
            ("mismatch lab", self.mismatch),
            ("non valid TPC EP", self.invalid_tpc_ep),
        ]
    }
}

impl std::ops::AddAssign for EventCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.all_events += rhs.all_events;
        self.with_vertex += rhs.with_vertex;
        self.vertex_z += rhs.vertex_z;
        self.central += rhs.central;
        self.semi_central += rhs.semi_central;
        self.minimum_bias += rhs.minimum_bias;
        self.analysed += rhs.analysed;
        self.selected += rhs.selected;
        self.candidates += rhs.candidates;
        self.out_of_pt_bounds += rhs.out_of_pt_bounds;
        self.mismatch += rhs.mismatch;
        self.invalid_tpc_ep += rhs.invalid_tpc_ep;
    }
}

/// Configuration of the flow task.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NucleiFlowConfig {
    /// Nucleus to select.
    pub species: Species,
    /// Cuts on candidate tracks.
    pub track_cuts: TrackCuts,
    /// Cuts on event plane tracks.
    pub event_plane_cuts: TrackCuts,
    /// Maximum |vz| (cm).
    pub max_vertex_z: f64,
    /// Accepted minimum-bias centrality range `[min, max)`.
    pub mb_centrality: (f64, f64),
    /// Accepted TPC signal range.
    pub tpc_signal_range: (f64, f64),
    /// Minimum momentum at the TPC inner wall (GeV/c).
    pub min_inner_p: f64,
    /// Minimum track length for a usable TOF signal (cm).
    pub min_tof_length: f64,
    /// Upper bound on inner-wall momentum of analysed tracks.
    pub max_p: f64,
    /// Upper bound on (scaled) pt of analysed tracks.
    pub max_pt: f64,
    /// TPC pull cut is applied below this momentum.
    pub tpc_pull_max_p: f64,
    /// Maximum |TPC pull|.
    pub max_tpc_pull: f64,
    /// Maximum |TOF pull|.
    pub max_tof_pull: f64,
}

impl Default for NucleiFlowConfig {
    fn default() -> Self {
        Self {
            species: Species::Deuteron,
            track_cuts: TrackCuts::standard_its_tpc_2011(),
            event_plane_cuts: TrackCuts::tpc_only(),
            max_vertex_z: 10.0,
            mb_centrality: (0.0, 80.0),
            tpc_signal_range: (10.0, 1000.0),
            min_inner_p: 0.6,
            min_tof_length: 350.0,
            max_p: 10.0,
            max_pt: 10.0,
            tpc_pull_max_p: 2.0,
            max_tpc_pull: 3.0,
            max_tof_pull: 3.0,
        }
    }
}

impl NucleiFlowConfig {
    /// Sets the species.
    #[must_use]
    pub fn with_species(mut self, species: Species) -> Self {
        self.species = species;
        self
    }

    /// Sets the candidate track cuts.
    #[must_use]
    pub fn with_track_cuts(mut self, cuts: TrackCuts) -> Self {
        self.track_cuts = cuts;
        self
    }

    /// Sets the maximum |vz|.
    #[must_use]
    pub fn with_max_vertex_z(mut self, z: f64) -> Self {
        self.max_vertex_z = z;
        self
    }
}

/// One selected nucleus.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlowCandidate {
    /// V0M centrality.
    pub centrality: f64,
    /// Trigger class.
    pub event_type: EventType,
    /// Track has a usable TOF signal.
    pub has_tof: bool,
    /// Transverse momentum, doubled for ³He (GeV/c).
    pub pt: f64,
    /// TOF mass (GeV/c²).
    pub mass: f64,
    /// u·Q with the VZERO-A vector.
    pub uq_vzero_a: f64,
    /// u·Q with the VZERO-C vector.
    pub uq_vzero_c: f64,
    /// Charge sign.
    pub charge: i8,
    /// cos 2(φ − ψ_TPC) with autocorrelation removed.
    pub cos2dphi_tpc: f64,
    /// cos 2(φ − ψ_V0M).
    pub cos2dphi_vzero: f64,
    /// cos 2(φ − ψ_V0A).
    pub cos2dphi_vzero_a: f64,
    /// cos 2(φ − ψ_V0C).
    pub cos2dphi_vzero_c: f64,
    /// Transverse impact parameter (cm).
    pub impact_xy: f64,
    /// Longitudinal impact parameter (cm).
    pub impact_z: f64,
    /// TPC dE/dx pull.
    pub tpc_pull: f64,
    /// Azimuth (rad).
    pub phi: f64,
}

/// PID quantities of a track that passed the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidInfo {
    /// Momentum at the TPC inner wall.
    pub ptot: f64,
    /// Scaled transverse momentum.
    pub pt: f64,
    /// TOF mass.
    pub mass: f64,
    /// TPC pull.
    pub tpc_pull: f64,
    /// TOF pull.
    pub tof_pull: f64,
}

/// Outcome of the candidate selection for one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackDecision {
    /// Fails the quality cuts.
    Rejected,
    /// Outside the momentum range of the analysis.
    OutOfBounds,
    /// No TOF, or a PID pull or the mass outside its window.
    Mismatch,
    /// Candidate.
    Accepted(PidInfo),
}

/// The flow analysis task.
#[derive(Debug, Clone, Default)]
pub struct NucleiFlowTask {
    config: NucleiFlowConfig,
    counters: EventCounters,
    candidates: Vec<FlowCandidate>,
    resolutions: Vec<EventPlaneResolution>,
}

impl NucleiFlowTask {
    /// Creates a task.
    #[must_use]
    pub fn new(config: NucleiFlowConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The task configuration.
    #[must_use]
    pub fn config(&self) -> &NucleiFlowConfig {
        &self.config
    }

    /// Accumulated counters.
    #[must_use]
    pub fn counters(&self) -> EventCounters {
        self.counters
    }

    /// Candidates collected so far.
    #[must_use]
    pub fn candidates(&self) -> &[FlowCandidate] {
        &self.candidates
    }

    /// Resolution records of the selected events.
    #[must_use]
    pub fn resolutions(&self) -> &[EventPlaneResolution] {
        &self.resolutions
    }

    /// Consumes the task, returning its outputs.
    #[must_use]
    pub fn into_parts(self) -> (Vec<FlowCandidate>, Vec<EventPlaneResolution>, EventCounters) {
        (self.candidates, self.resolutions, self.counters)
    }

    /// Applies the event selection, updating the counters.
    pub fn select_event(&mut self, event: &Event) -> Option<EventType> {
        self.counters.all_events += 1;
        self.counters.analysed += 1;

        let Some(vertex) = event.primary_vertex() else {
            log::debug!("no good vertex, skipping event");
            return None;
        };
        self.counters.with_vertex += 1;

        if vertex.z.abs() > self.config.max_vertex_z {
            return None;
        }
        self.counters.vertex_z += 1;

        let mut event_type = None;
        if event.trigger.contains(TriggerMask::CENTRAL) {
            self.counters.central += 1;
            event_type = Some(EventType::Central);
        }
        if event.trigger.contains(TriggerMask::SEMI_CENTRAL) {
            self.counters.semi_central += 1;
            event_type = Some(EventType::SemiCentral);
        }
        if event.trigger.contains(TriggerMask::MB) {
            let (min, max) = self.config.mb_centrality;
            if event.centrality < min || event.centrality >= max {
                return None;
            }
            self.counters.minimum_bias += 1;
            event_type = Some(EventType::MinimumBias);
        }
        event_type
    }

    /// Applies the candidate selection to one track.
    #[must_use]
    pub fn select_track(&self, track: &Track, tof_start_time: f64) -> TrackDecision {
        let cfg = &self.config;
        if !cfg.track_cuts.accept(track) {
            return TrackDecision::Rejected;
        }
        let (signal_min, signal_max) = cfg.tpc_signal_range;
        if track.tpc_signal < signal_min || track.tpc_signal > signal_max {
            return TrackDecision::Rejected;
        }
        let Some(ptot) = track.inner_p else {
            return TrackDecision::Rejected;
        };
        if ptot < cfg.min_inner_p {
            return TrackDecision::Rejected;
        }

        let species = cfg.species;
        let expected = species.expected_tpc_signal(ptot);
        let tpc_pull = (track.tpc_signal - expected) / (0.07 * expected);
        let expected_beta = species.expected_beta(ptot);
        let pt = track.pt * species.pt_scale();

        if ptot.abs() >= cfg.max_p || pt.abs() >= cfg.max_pt {
            return TrackDecision::OutOfBounds;
        }

        let has_tof = track.has_tof_out() && track.length >= cfg.min_tof_length;
        if !has_tof {
            return TrackDecision::Mismatch;
        }
        let tof = track.tof_signal - tof_start_time;
        let beta = track.length / (SPEED_OF_LIGHT * tof);
        let gamma = 1.0 / (1.0 - beta * beta).sqrt();
        let mass = ptot / (gamma * gamma - 1.0).sqrt();
        let tof_pull = (beta - expected_beta) / (0.01 * expected_beta);

        if ptot.abs() < cfg.tpc_pull_max_p && tpc_pull.abs() > cfg.max_tpc_pull {
            return TrackDecision::Mismatch;
        }
        if tof_pull.abs() > cfg.max_tof_pull {
            return TrackDecision::Mismatch;
        }
        let (mass_min, mass_max) = species.mass_window();
        if !(mass_min..=mass_max).contains(&mass.abs()) {
            return TrackDecision::Mismatch;
        }

        TrackDecision::Accepted(PidInfo {
            ptot,
            pt,
            mass,
            tpc_pull,
            tof_pull,
        })
    }

    /// Processes one event; returns the number of candidates it produced.
    pub fn process_event(&mut self, event: &Event) -> usize {
        let Some(event_type) = self.select_event(event) else {
            return 0;
        };
        let Some(info) = event.event_plane.as_ref() else {
            log::error!(
                "run {}: no event plane, flow analysis not possible",
                event.run_number
            );
            self.counters.invalid_tpc_ep += 1;
            return 0;
        };
        self.counters.selected += 1;

        let sub = TpcSubEvents::from_tracks(&event.tracks, &self.config.event_plane_cuts);
        let angles = EventPlaneAngles::new(&sub, info);
        self.resolutions
            .push(EventPlaneResolution::new(event.centrality, &angles, info));

        let before = self.candidates.len();
        for track in &event.tracks {
            match self.select_track(track, event.tof_start_time) {
                TrackDecision::Rejected => {}
                TrackDecision::OutOfBounds => self.counters.out_of_pt_bounds += 1,
                TrackDecision::Mismatch => self.counters.mismatch += 1,
                TrackDecision::Accepted(pid) => {
                    let candidate = self.candidate(track, &pid, event, event_type, &angles, info);
                    self.candidates.push(candidate);
                }
            }
        }
        let added = self.candidates.len() - before;
        self.counters.candidates += added as u64;
        added
    }

    fn candidate(
        &self,
        track: &Track,
        pid: &PidInfo,
        event: &Event,
        event_type: EventType,
        angles: &EventPlaneAngles,
        info: &EventPlaneInfo,
    ) -> FlowCandidate {
        let phi = track.phi;
        let cos2dphi = |psi: f64| (HARMONIC * phi_0_pi(phi - psi)).cos();
        let (cos2phi, sin2phi) = ((HARMONIC * phi).cos(), (HARMONIC * phi).sin());
        FlowCandidate {
            centrality: event.centrality,
            event_type,
            has_tof: true,
            pt: pid.pt,
            mass: pid.mass,
            uq_vzero_a: cos2phi * info.q_vzero_a.x + sin2phi * info.q_vzero_a.y,
            uq_vzero_c: cos2phi * info.q_vzero_c.x + sin2phi * info.q_vzero_c.y,
            charge: track.charge,
            cos2dphi_tpc: cos2dphi(candidate_event_plane(track, info)),
            cos2dphi_vzero: cos2dphi(angles.vzero),
            cos2dphi_vzero_a: cos2dphi(angles.vzero_a),
            cos2dphi_vzero_c: cos2dphi(angles.vzero_c),
            impact_xy: track.impact_xy,
            impact_z: track.impact_z,
            tpc_pull: pid.tpc_pull,
            phi,
        }
    }
}
