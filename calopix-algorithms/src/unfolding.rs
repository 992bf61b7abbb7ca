//! Splitting of clusters with several local maxima.

use crate::geometry::TowerGeometry;
use crate::recpoints::{ShapeCalculator, ShowerCell, MIN_CELL_FRACTION};

/// Splits overlapping showers.
pub trait Unfolder: Send + Sync {
    /// Returns the cell lists of the sub-clusters; a single list when the
    /// cluster is not split.
    fn unfold(&self, cells: &[ShowerCell]) -> Vec<Vec<ShowerCell>>;
}

/// Shares each tower between the local maxima of its cluster.
///
/// Tower `i` gives maximum `k` the share `E_k exp(-d_ik) / sum_j E_j exp(-d_ij)`
/// of its energy, with `d` the distance in tower units.
#[derive(Debug, Clone)]
pub struct LocalMaximaUnfolder {
    geometry: TowerGeometry,
    loc_max_cut: f64,
}

impl LocalMaximaUnfolder {
    /// Creates an unfolder.
    #[must_use]
    pub fn new(geometry: TowerGeometry, loc_max_cut: f64) -> Self {
        Self {
            geometry,
            loc_max_cut,
        }
    }
}

impl Unfolder for LocalMaximaUnfolder {
    fn unfold(&self, cells: &[ShowerCell]) -> Vec<Vec<ShowerCell>> {
        // w0 does not enter the maxima search.
        let maxima = ShapeCalculator::new(&self.geometry, 1.0, self.loc_max_cut).local_maxima(cells);
        if maxima.len() < 2 {
            return vec![cells.to_vec()];
        }

        let mut parts = vec![Vec::with_capacity(cells.len()); maxima.len()];
        for cell in cells {
            let weights: Vec<f64> = maxima
                .iter()
                .map(|&m| {
                    let d = self
                        .geometry
                        .distance(cell.abs_id, cells[m].abs_id)
                        .unwrap_or(f64::INFINITY);
                    cells[m].energy * (-d).exp()
                })
                .collect();
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (part, w) in parts.iter_mut().zip(weights) {
                let share = ShowerCell {
                    energy: cell.energy * w / total,
                    ..*cell
                };
                if share.fraction() > MIN_CELL_FRACTION {
                    part.push(share);
                }
            }
        }
        parts.retain(|part| !part.is_empty());
        log::debug!(
            "unfolded {} cells into {} clusters",
            cells.len(),
            parts.len()
        );
        parts
    }
}
