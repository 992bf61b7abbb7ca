//! Rec point to cluster conversion and shower shape evaluation.
//!
//! Position and shape use logarithmic weights
//! `w_i = max(0, w0 + ln(e_i / E))`. M02 and M20 are the eigenvalues of the
//! weighted covariance of the tower (column, row) coordinates, so they are
//! given in tower units squared, as is the dispersion.
#![allow(clippy::cast_possible_truncation)]

use calopix_core::CaloCluster;

use crate::calibration::RunConditions;
use crate::clusterizer::{Digit, RecPoint};
use crate::geometry::TowerGeometry;

/// Cells whose fraction is at or below this value are dropped.
pub const MIN_CELL_FRACTION: f64 = 0.001;

/// One tower of a cluster under construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowerCell {
    /// Absolute tower id.
    pub abs_id: u16,
    /// Energy assigned to the cluster (GeV).
    pub energy: f64,
    /// Full tower amplitude (GeV).
    pub amplitude: f64,
    /// Tower time (s).
    pub time: f64,
}

impl ShowerCell {
    /// Share of the tower amplitude assigned to the cluster.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.amplitude > 0.0 {
            self.energy / self.amplitude
        } else {
            0.0
        }
    }
}

/// Cells of a rec point that carry a significant fraction of their tower.
#[must_use]
pub fn shower_cells(point: &RecPoint, digits: &[Digit]) -> Vec<ShowerCell> {
    point
        .digits
        .iter()
        .zip(&point.energies)
        .filter_map(|(&index, &energy)| {
            let digit = digits.get(index)?;
            let cell = ShowerCell {
                abs_id: digit.abs_id,
                energy,
                amplitude: digit.amplitude,
                time: digit.time,
            };
            (cell.fraction() > MIN_CELL_FRACTION).then_some(cell)
        })
        .collect()
}

/// Computes cluster kinematics and shower shape from its cells.
#[derive(Debug, Clone, Copy)]
pub struct ShapeCalculator<'a> {
    geometry: &'a TowerGeometry,
    w0: f64,
    loc_max_cut: f64,
}

impl<'a> ShapeCalculator<'a> {
    /// Creates a calculator.
    #[must_use]
    pub fn new(geometry: &'a TowerGeometry, w0: f64, loc_max_cut: f64) -> Self {
        Self {
            geometry,
            w0,
            loc_max_cut,
        }
    }

    /// The geometry used for positions.
    #[must_use]
    pub fn geometry(&self) -> &'a TowerGeometry {
        self.geometry
    }

    /// Positions (in `cells`) of the local maxima.
    ///
    /// A tower is a maximum if it exceeds every touching tower of the
    /// cluster by more than the local maximum cut. The hottest tower is
    /// returned when no tower qualifies.
    #[must_use]
    pub fn local_maxima(&self, cells: &[ShowerCell]) -> Vec<usize> {
        let maxima: Vec<usize> = (0..cells.len())
            .filter(|&i| {
                cells.iter().enumerate().all(|(j, other)| {
                    i == j
                        || !self.geometry.are_neighbours(cells[i].abs_id, other.abs_id)
                        || cells[i].energy - other.energy > self.loc_max_cut
                })
            })
            .collect();
        if maxima.is_empty() {
            leading_cell(cells).into_iter().collect()
        } else {
            maxima
        }
    }

    /// Builds a cluster from its cells; `None` for an empty cell list.
    #[must_use]
    pub fn build_cluster(
        &self,
        cells: &[ShowerCell],
        conditions: &RunConditions,
    ) -> Option<CaloCluster> {
        let leading = leading_cell(cells)?;
        let energy: f64 = cells.iter().map(|c| c.energy).sum();

        let weights: Vec<f64> = cells
            .iter()
            .map(|c| {
                if energy > 0.0 && c.energy > 0.0 {
                    (self.w0 + (c.energy / energy).ln()).max(0.0)
                } else {
                    0.0
                }
            })
            .collect();
        // Fall back to linear weights when every tower is below the log cutoff.
        let weights = if weights.iter().sum::<f64>() > 0.0 {
            weights
        } else {
            cells.iter().map(|c| c.energy.max(0.0)).collect()
        };
        let total_weight: f64 = weights.iter().sum();

        let mut position = [0.0; 3];
        let (mut mc, mut mr, mut mcc, mut mrr, mut mcr) = (0.0, 0.0, 0.0, 0.0, 0.0);
        if total_weight > 0.0 {
            for (cell, &w) in cells.iter().zip(&weights) {
                let (Some(xyz), Some((row, col))) = (
                    self.geometry.global_position(cell.abs_id),
                    self.geometry.global_row_col(cell.abs_id),
                ) else {
                    continue;
                };
                for (p, x) in position.iter_mut().zip(xyz) {
                    *p += w * x;
                }
                mc += w * col;
                mr += w * row;
                mcc += w * col * col;
                mrr += w * row * row;
                mcr += w * col * row;
            }
            for p in &mut position {
                *p /= total_weight;
            }
            mc /= total_weight;
            mr /= total_weight;
            mcc /= total_weight;
            mrr /= total_weight;
            mcr /= total_weight;
        }

        let dxx = (mcc - mc * mc).max(0.0);
        let dzz = (mrr - mr * mr).max(0.0);
        let dxz = mcr - mc * mr;
        let centre = 0.5 * (dxx + dzz);
        let spread = (0.25 * (dxx - dzz).powi(2) + dxz * dxz).sqrt();

        let leading_id = cells[leading].abs_id;
        let dist_to_bad_channel = conditions
            .bad_channels()
            .filter_map(|bad| self.geometry.distance(leading_id, bad))
            .min_by(f64::total_cmp);

        Some(CaloCluster {
            energy,
            position,
            cell_ids: cells.iter().map(|c| c.abs_id).collect(),
            cell_fractions: cells.iter().map(ShowerCell::fraction).collect(),
            dispersion: (dxx + dzz).sqrt(),
            chi2: -1.0,
            tof: cells[leading].time,
            n_local_maxima: self.local_maxima(cells).len() as u16,
            m02: centre + spread,
            m20: (centre - spread).max(0.0),
            dist_to_bad_channel,
            ..CaloCluster::default()
        })
    }
}

/// Position of the highest-energy cell.
fn leading_cell(cells: &[ShowerCell]) -> Option<usize> {
    cells
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.energy.total_cmp(&b.energy))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cell(abs_id: u16, energy: f64) -> ShowerCell {
        ShowerCell {
            abs_id,
            energy,
            amplitude: energy,
            time: f64::from(abs_id) * 1e-9,
        }
    }

    #[test]
    fn test_fraction_filter() {
        let digits = vec![
            Digit {
                abs_id: 0,
                amplitude: 1.0,
                time: 0.0,
                index_in_list: 0,
            },
            Digit {
                abs_id: 1,
                amplitude: 1.0,
                time: 0.0,
                index_in_list: 1,
            },
        ];
        let point = RecPoint {
            digits: vec![0, 1],
            energies: vec![0.5, 0.0005],
        };
        let cells = shower_cells(&point, &digits);
        assert_eq!(cells.len(), 1);
        assert_relative_eq!(cells[0].fraction(), 0.5);

        let empty = RecPoint {
            digits: vec![1],
            energies: vec![0.001],
        };
        assert!(shower_cells(&empty, &digits).is_empty());
    }

    #[test]
    fn test_single_cell_cluster() {
        let geometry = TowerGeometry::default();
        let calc = ShapeCalculator::new(&geometry, 4.5, 0.03);
        let cluster = calc
            .build_cluster(&[cell(100, 2.0)], &RunConditions::default())
            .unwrap();

        assert_relative_eq!(cluster.energy, 2.0);
        assert_eq!(cluster.cell_ids, vec![100]);
        assert_relative_eq!(cluster.m02, 0.0);
        assert_relative_eq!(cluster.m20, 0.0);
        assert_relative_eq!(cluster.dispersion, 0.0);
        assert_relative_eq!(cluster.chi2, -1.0);
        assert_eq!(cluster.n_local_maxima, 1);
        assert!(cluster.dist_to_bad_channel.is_none());

        let [x, y, z] = geometry.global_position(100).unwrap();
        assert_relative_eq!(cluster.position[0], x, epsilon = 1e-9);
        assert_relative_eq!(cluster.position[1], y, epsilon = 1e-9);
        assert_relative_eq!(cluster.position[2], z, epsilon = 1e-9);
    }

    #[test]
    fn test_elongated_shower_shape() {
        let geometry = TowerGeometry::default();
        let calc = ShapeCalculator::new(&geometry, 4.5, 0.03);
        // Three towers in a row along eta: equal side towers around a hot centre.
        let cells = [cell(99, 0.5), cell(100, 2.0), cell(101, 0.5)];
        let cluster = calc
            .build_cluster(&cells, &RunConditions::default())
            .unwrap();

        assert_relative_eq!(cluster.energy, 3.0);
        assert!(cluster.m02 > 0.0);
        assert_relative_eq!(cluster.m20, 0.0, epsilon = 1e-12);
        assert_relative_eq!(cluster.dispersion * cluster.dispersion, cluster.m02, epsilon = 1e-12);
        assert_relative_eq!(cluster.tof, 100e-9);
        assert_eq!(cluster.n_local_maxima, 1);
    }

    #[test]
    fn test_local_maxima_and_bad_channel_distance() {
        let geometry = TowerGeometry::default();
        let calc = ShapeCalculator::new(&geometry, 4.5, 0.1);
        let cells = [cell(96, 1.0), cell(97, 0.2), cell(98, 0.9)];
        assert_eq!(calc.local_maxima(&cells), vec![0, 2]);

        let flat = [cell(96, 1.0), cell(97, 0.95)];
        assert_eq!(calc.local_maxima(&flat), vec![0]);

        let mut conditions = RunConditions::default();
        conditions.calibration.bad_channels.insert(99);
        let cluster = calc.build_cluster(&cells, &conditions).unwrap();
        assert_eq!(cluster.n_local_maxima, 2);
        assert_relative_eq!(cluster.dist_to_bad_channel.unwrap(), 3.0);
    }
}
