//! EMCAL tower geometry.
//!
//! Towers are numbered super module by super module, row (phi) major:
//! `abs_id = sm * rows * cols + row * cols + col`. Super modules come in
//! pairs sharing a phi sector; the even one covers negative eta, the odd
//! one positive eta. The layout is ideal (no alignment corrections).
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position of a tower inside its super module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TowerIndex {
    /// Super module number.
    pub super_module: u16,
    /// Row inside the super module (phi direction).
    pub row: u16,
    /// Column inside the super module (eta direction).
    pub col: u16,
}

/// Ideal EMCAL tower layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TowerGeometry {
    /// Number of super modules (even: one per eta side and phi sector).
    pub super_modules: u16,
    /// Tower rows per super module.
    pub rows: u16,
    /// Tower columns per super module.
    pub cols: u16,
    /// Inner radius of the calorimeter (cm).
    pub radius: f64,
    /// Lower eta edge of the acceptance.
    pub eta_min: f64,
    /// Upper eta edge of the acceptance.
    pub eta_max: f64,
    /// Lower phi edge of the acceptance (rad).
    pub phi_min: f64,
    /// Phi span of one sector (rad).
    pub sector_phi: f64,
}

impl Default for TowerGeometry {
    fn default() -> Self {
        Self::first_year()
    }
}

impl TowerGeometry {
    /// Ten super modules, 24 x 48 towers each, starting at 80 degrees.
    #[must_use]
    pub fn first_year() -> Self {
        Self {
            super_modules: 10,
            rows: 24,
            cols: 48,
            radius: 428.0,
            eta_min: -0.7,
            eta_max: 0.7,
            phi_min: 80.0_f64.to_radians(),
            sector_phi: 20.0_f64.to_radians(),
        }
    }

    fn cells_per_module(&self) -> u32 {
        u32::from(self.rows) * u32::from(self.cols)
    }

    /// Total number of towers.
    #[must_use]
    pub fn n_cells(&self) -> u32 {
        u32::from(self.super_modules) * self.cells_per_module()
    }

    /// Eta width of one tower.
    #[must_use]
    pub fn cell_eta(&self) -> f64 {
        (self.eta_max - self.eta_min) / (2.0 * f64::from(self.cols))
    }

    /// Phi width of one tower (rad).
    #[must_use]
    pub fn cell_phi(&self) -> f64 {
        self.sector_phi / f64::from(self.rows)
    }

    /// Splits an absolute id into super module, row and column.
    #[must_use]
    pub fn tower_index(&self, abs_id: u16) -> Option<TowerIndex> {
        let id = u32::from(abs_id);
        if id >= self.n_cells() {
            return None;
        }
        let per_module = self.cells_per_module();
        let local = id % per_module;
        Some(TowerIndex {
            super_module: (id / per_module) as u16,
            row: (local / u32::from(self.cols)) as u16,
            col: (local % u32::from(self.cols)) as u16,
        })
    }

    /// Absolute id of a tower, `None` outside the detector.
    #[must_use]
    pub fn abs_id(&self, index: TowerIndex) -> Option<u16> {
        if index.super_module >= self.super_modules || index.row >= self.rows || index.col >= self.cols
        {
            return None;
        }
        let id = u32::from(index.super_module) * self.cells_per_module()
            + u32::from(index.row) * u32::from(self.cols)
            + u32::from(index.col);
        u16::try_from(id).ok()
    }

    /// Global (row, column) of a tower over the whole calorimeter, in tower units.
    #[must_use]
    pub fn global_row_col(&self, abs_id: u16) -> Option<(f64, f64)> {
        let index = self.tower_index(abs_id)?;
        let sector = index.super_module / 2;
        let side = index.super_module % 2;
        let row = f64::from(sector) * f64::from(self.rows) + f64::from(index.row);
        let col = f64::from(side) * f64::from(self.cols) + f64::from(index.col);
        Some((row, col))
    }

    /// Eta and phi of the tower centre.
    #[must_use]
    pub fn eta_phi(&self, abs_id: u16) -> Option<(f64, f64)> {
        let (row, col) = self.global_row_col(abs_id)?;
        let eta = self.eta_min + (col + 0.5) * self.cell_eta();
        let phi = self.phi_min + (row + 0.5) * self.cell_phi();
        Some((eta, phi))
    }

    /// Global position of the tower centre (cm).
    #[must_use]
    pub fn global_position(&self, abs_id: u16) -> Option<[f64; 3]> {
        let (eta, phi) = self.eta_phi(abs_id)?;
        Some([
            self.radius * phi.cos(),
            self.radius * phi.sin(),
            self.radius * eta.sinh(),
        ])
    }

    /// Towers sharing a side inside the same super module.
    #[must_use]
    pub fn share_side(&self, a: u16, b: u16) -> bool {
        match (self.tower_index(a), self.tower_index(b)) {
            (Some(a), Some(b)) if a.super_module == b.super_module => {
                a.row.abs_diff(b.row) + a.col.abs_diff(b.col) == 1
            }
            _ => false,
        }
    }

    /// Towers touching by side or corner inside the same super module.
    #[must_use]
    pub fn are_neighbours(&self, a: u16, b: u16) -> bool {
        match (self.tower_index(a), self.tower_index(b)) {
            (Some(a), Some(b)) if a.super_module == b.super_module => {
                let (dr, dc) = (a.row.abs_diff(b.row), a.col.abs_diff(b.col));
                dr <= 1 && dc <= 1 && (dr, dc) != (0, 0)
            }
            _ => false,
        }
    }

    /// Distance between two towers in tower units, across super modules.
    #[must_use]
    pub fn distance(&self, a: u16, b: u16) -> Option<f64> {
        let (ra, ca) = self.global_row_col(a)?;
        let (rb, cb) = self.global_row_col(b)?;
        Some((ra - rb).hypot(ca - cb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_index_round_trip_corners() {
        let geom = TowerGeometry::first_year();
        assert_eq!(geom.n_cells(), 11_520);

        let last = geom.tower_index(11_519).unwrap();
        assert_eq!(
            last,
            TowerIndex {
                super_module: 9,
                row: 23,
                col: 47
            }
        );
        assert_eq!(geom.abs_id(last), Some(11_519));
        assert!(geom.tower_index(11_520).is_none());
        assert!(geom
            .abs_id(TowerIndex {
                super_module: 0,
                row: 24,
                col: 0
            })
            .is_none());
    }

    #[test]
    fn test_neighbours() {
        let geom = TowerGeometry::first_year();
        // 0 -> (0,0,0), 1 -> (0,0,1), 48 -> (0,1,0), 49 -> (0,1,1)
        assert!(geom.share_side(0, 1));
        assert!(geom.share_side(0, 48));
        assert!(!geom.share_side(0, 49));
        assert!(geom.are_neighbours(0, 49));
        assert!(!geom.are_neighbours(0, 0));
        // Last column of SM 0 and first column of SM 1 are in different modules.
        assert!(!geom.are_neighbours(47, 1152));
    }

    #[test]
    fn test_eta_phi_and_position() {
        let geom = TowerGeometry::first_year();
        let (eta, phi) = geom.eta_phi(0).unwrap();
        assert_relative_eq!(eta, -0.7 + 0.5 * geom.cell_eta(), epsilon = 1e-12);
        assert_relative_eq!(phi, geom.phi_min + 0.5 * geom.cell_phi(), epsilon = 1e-12);

        // SM 1 starts at eta 0.
        let (eta, _) = geom.eta_phi(1152).unwrap();
        assert_relative_eq!(eta, 0.5 * geom.cell_eta(), epsilon = 1e-12);

        let [x, y, _] = geom.global_position(0).unwrap();
        assert_relative_eq!(x.hypot(y), 428.0, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_across_modules() {
        let geom = TowerGeometry::first_year();
        assert_relative_eq!(geom.distance(47, 1152).unwrap(), 1.0);
        assert_relative_eq!(geom.distance(0, 49).unwrap(), 2.0_f64.sqrt());
    }
}
