//! Reconstruction parameters of the EMCAL clusterizer.

use calopix_core::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clustering strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClusterizerKind {
    /// Connected towers grown from seeds.
    #[default]
    V1,
    /// 3x3 window around each seed.
    Nxn,
    /// 5x5 window around each seed.
    NxnExtended,
}

impl ClusterizerKind {
    /// Half-width of the NxN window in towers.
    #[must_use]
    pub fn window_half_width(self) -> u16 {
        match self {
            Self::NxnExtended => 2,
            Self::V1 | Self::Nxn => 1,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::Nxn => "NxN",
            Self::NxnExtended => "NxN-extended",
        }
    }
}

impl TryFrom<u8> for ClusterizerKind {
    type Error = Error;

    fn try_from(flag: u8) -> Result<Self, Self::Error> {
        match flag {
            0 => Ok(Self::V1),
            1 => Ok(Self::Nxn),
            2 => Ok(Self::NxnExtended),
            other => Err(Error::ConfigError(format!(
                "unknown clusterizer flag {other}"
            ))),
        }
    }
}

/// Reconstruction parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecParam {
    /// Clustering strategy.
    pub clusterizer: ClusterizerKind,
    /// Minimum seed energy (GeV).
    pub clustering_threshold: f64,
    /// Logarithmic weight of the position and shape computation.
    pub w0: f64,
    /// Minimum cell energy to enter a cluster (GeV).
    pub min_digit_energy: f64,
    /// Split clusters with several local maxima.
    pub unfold: bool,
    /// Minimum energy difference between a local maximum and its neighbours (GeV).
    pub loc_max_cut: f64,
    /// Maximum time difference between cells of one cluster (s).
    pub time_cut: f64,
    /// Earliest accepted cell time (s).
    pub time_min: f64,
    /// Latest accepted cell time (s).
    pub time_max: f64,
    /// Shower shape parameters used by the unfolding.
    pub ss_pars: [f64; 8],
    /// Energy dependence of the shower width (sigma).
    pub par5: [f64; 3],
    /// Energy dependence of the shower width (tail).
    pub par6: [f64; 3],
}

impl Default for RecParam {
    fn default() -> Self {
        Self {
            clusterizer: ClusterizerKind::V1,
            clustering_threshold: 0.1,
            w0: 4.5,
            min_digit_energy: 0.05,
            unfold: false,
            loc_max_cut: 0.03,
            time_cut: 1.0,
            time_min: -1.0,
            time_max: 1.0,
            ss_pars: [
                0.9262, 3.365, 1.548, 0.1625, -0.4195, 0.0, 0.0, 2.332,
            ],
            par5: [12.31, -0.007_381, -0.068_908],
            par6: [0.2, 0.0, 0.0],
        }
    }
}

impl RecParam {
    /// Sets the clustering strategy.
    #[must_use]
    pub fn with_clusterizer(mut self, kind: ClusterizerKind) -> Self {
        self.clusterizer = kind;
        self
    }

    /// Sets the seed threshold.
    #[must_use]
    pub fn with_clustering_threshold(mut self, threshold: f64) -> Self {
        self.clustering_threshold = threshold;
        self
    }

    /// Sets the minimum cell energy.
    #[must_use]
    pub fn with_min_digit_energy(mut self, energy: f64) -> Self {
        self.min_digit_energy = energy;
        self
    }

    /// Sets the logarithmic weight.
    #[must_use]
    pub fn with_w0(mut self, w0: f64) -> Self {
        self.w0 = w0;
        self
    }

    /// Enables or disables unfolding.
    #[must_use]
    pub fn with_unfold(mut self, unfold: bool) -> Self {
        self.unfold = unfold;
        self
    }

    /// Sets the local maximum cut.
    #[must_use]
    pub fn with_loc_max_cut(mut self, cut: f64) -> Self {
        self.loc_max_cut = cut;
        self
    }

    /// Sets the cell time acceptance and the intra-cluster time cut.
    #[must_use]
    pub fn with_time_window(mut self, min: f64, max: f64, cut: f64) -> Self {
        self.time_min = min;
        self.time_max = max;
        self.time_cut = cut;
        self
    }

    /// Checks the parameters for values the clusterizers cannot work with.
    ///
    /// # Errors
    /// Returns a configuration error for negative thresholds, a non-positive
    /// `w0` or an empty time window.
    pub fn validate(&self) -> calopix_core::Result<()> {
        if self.clustering_threshold < 0.0 || self.min_digit_energy < 0.0 {
            return Err(Error::ConfigError(
                "energy thresholds must not be negative".into(),
            ));
        }
        if self.w0 <= 0.0 {
            return Err(Error::ConfigError(format!(
                "w0 must be positive, got {}",
                self.w0
            )));
        }
        if self.time_min > self.time_max {
            return Err(Error::ConfigError(format!(
                "empty time window [{}, {}]",
                self.time_min, self.time_max
            )));
        }
        Ok(())
    }
}
