//! Per-run calibration and channel status.
//!
//! The calibration database lives outside this crate; tasks only see it
//! through [`CalibrationSource`].

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ClusterizeError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Energy calibration and bad-channel map of one run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Calibration {
    /// Gain per tower; towers without an entry keep unit gain.
    pub gains: BTreeMap<u16, f64>,
    /// Towers flagged bad.
    pub bad_channels: BTreeSet<u16>,
    /// Cell amplitudes are already calibrated and gains are not applied.
    pub input_calibrated: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gains: BTreeMap::new(),
            bad_channels: BTreeSet::new(),
            input_calibrated: true,
        }
    }
}

impl Calibration {
    /// Marks towers as bad.
    #[must_use]
    pub fn with_bad_channels(mut self, ids: impl IntoIterator<Item = u16>) -> Self {
        self.bad_channels.extend(ids);
        self
    }

    /// Sets per-tower gains and switches to uncalibrated input.
    #[must_use]
    pub fn with_gains(mut self, gains: impl IntoIterator<Item = (u16, f64)>) -> Self {
        self.gains.extend(gains);
        self.input_calibrated = false;
        self
    }

    /// Amplitude of a tower after calibration.
    #[must_use]
    pub fn calibrate(&self, abs_id: u16, amplitude: f64) -> f64 {
        if self.input_calibrated {
            amplitude
        } else {
            amplitude * self.gains.get(&abs_id).copied().unwrap_or(1.0)
        }
    }
}

/// Pedestal run result: towers without signal.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeadMap {
    /// Dead or hot towers.
    pub dead_channels: BTreeSet<u16>,
}

/// Everything the clusterizer needs to know about a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConditions {
    /// Run the conditions belong to.
    pub run: i32,
    /// Energy calibration.
    pub calibration: Calibration,
    /// Dead channel map.
    pub dead_map: DeadMap,
}

impl RunConditions {
    /// Returns true if the tower is flagged bad or dead.
    #[must_use]
    pub fn is_bad(&self, abs_id: u16) -> bool {
        self.calibration.bad_channels.contains(&abs_id)
            || self.dead_map.dead_channels.contains(&abs_id)
    }

    /// All unusable towers, sorted.
    pub fn bad_channels(&self) -> impl Iterator<Item = u16> + '_ {
        self.calibration
            .bad_channels
            .union(&self.dead_map.dead_channels)
            .copied()
    }
}

/// Access to the calibration database.
pub trait CalibrationSource {
    /// Calibration of a run.
    ///
    /// # Errors
    /// Returns [`ClusterizeError::MissingCalibration`] if the run is unknown.
    fn calibration(&self, run: i32) -> Result<Calibration>;

    /// Dead channel map of a run.
    ///
    /// # Errors
    /// Returns [`ClusterizeError::MissingDeadMap`] if the run is unknown.
    fn dead_map(&self, run: i32) -> Result<DeadMap>;

    /// Loads both objects of a run.
    ///
    /// # Errors
    /// Propagates the errors of [`Self::calibration`] and [`Self::dead_map`].
    fn load(&self, run: i32) -> Result<RunConditions> {
        Ok(RunConditions {
            run,
            calibration: self.calibration(run)?,
            dead_map: self.dead_map(run)?,
        })
    }
}

impl<T: CalibrationSource + ?Sized> CalibrationSource for &T {
    fn calibration(&self, run: i32) -> Result<Calibration> {
        (**self).calibration(run)
    }

    fn dead_map(&self, run: i32) -> Result<DeadMap> {
        (**self).dead_map(run)
    }
}

/// In-memory calibration store, optionally with a fallback for any run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StaticCalibration {
    /// Calibration per run.
    pub runs: BTreeMap<i32, Calibration>,
    /// Dead maps per run.
    pub dead_maps: BTreeMap<i32, DeadMap>,
    /// Used for runs without their own calibration.
    pub fallback: Option<Calibration>,
}

impl StaticCalibration {
    /// Store answering every run with the same calibration and no dead channels.
    #[must_use]
    pub fn uniform(calibration: Calibration) -> Self {
        Self {
            fallback: Some(calibration),
            ..Self::default()
        }
    }

    /// Adds the calibration of one run.
    #[must_use]
    pub fn with_run(mut self, run: i32, calibration: Calibration) -> Self {
        self.runs.insert(run, calibration);
        self
    }

    /// Adds the dead map of one run.
    #[must_use]
    pub fn with_dead_map(mut self, run: i32, dead_map: DeadMap) -> Self {
        self.dead_maps.insert(run, dead_map);
        self
    }
}

impl CalibrationSource for StaticCalibration {
    fn calibration(&self, run: i32) -> Result<Calibration> {
        self.runs
            .get(&run)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or(ClusterizeError::MissingCalibration { run })
    }

    fn dead_map(&self, run: i32) -> Result<DeadMap> {
        match self.dead_maps.get(&run) {
            Some(map) => Ok(map.clone()),
            // Runs with a calibration but no pedestal entry have no dead towers.
            None if self.runs.contains_key(&run) || self.fallback.is_some() => {
                Ok(DeadMap::default())
            }
            None => Err(ClusterizeError::MissingDeadMap { run }),
        }
    }
}
