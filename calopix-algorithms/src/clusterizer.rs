//! Tower clusterizers.
//!
//! Both strategies turn the digits of one event into rec points, lists of
//! digit indices with the energy each digit deposits in the rec point.
//!
//! - [`V1Clusterizer`]: connected components of side-sharing towers
//!   (union-find), kept if the hottest tower passes the seed threshold.
//! - [`NxnClusterizer`]: fixed window around the hottest unassigned seed.

use std::collections::HashMap;

use crate::calibration::RunConditions;
use crate::geometry::{TowerGeometry, TowerIndex};
use crate::recparam::{ClusterizerKind, RecParam};

/// A calibrated tower signal handed to the clusterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Digit {
    /// Absolute tower id.
    pub abs_id: u16,
    /// Calibrated amplitude (GeV).
    pub amplitude: f64,
    /// Time (s).
    pub time: f64,
    /// Position of the originating cell in the event's cell list.
    pub index_in_list: usize,
}

/// Clusterizer output: digits and the energy each one deposits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecPoint {
    /// Indices into the digit list.
    pub digits: Vec<usize>,
    /// Energy of each digit assigned to this rec point (GeV).
    pub energies: Vec<f64>,
}

impl RecPoint {
    fn push(&mut self, digit: usize, energy: f64) {
        self.digits.push(digit);
        self.energies.push(energy);
    }

    /// Sum of the assigned energies.
    #[must_use]
    pub fn energy(&self) -> f64 {
        self.energies.iter().sum()
    }

    /// Number of digits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    /// Returns true if no digit is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}

/// Groups digits into rec points.
pub trait Clusterizer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Clusters the digits of one event.
    fn clusterize(&self, digits: &[Digit], conditions: &RunConditions) -> Vec<RecPoint>;
}

/// Builds the clusterizer selected by the parameters.
#[must_use]
pub fn build_clusterizer(params: &RecParam, geometry: &TowerGeometry) -> Box<dyn Clusterizer> {
    match params.clusterizer {
        ClusterizerKind::V1 => Box::new(V1Clusterizer::new(params.clone(), geometry.clone())),
        ClusterizerKind::Nxn | ClusterizerKind::NxnExtended => {
            Box::new(NxnClusterizer::new(params.clone(), geometry.clone()))
        }
    }
}

/// Digits that may enter a cluster, with their tower index.
fn eligible_digits(
    digits: &[Digit],
    params: &RecParam,
    geometry: &TowerGeometry,
    conditions: &RunConditions,
) -> Vec<(usize, TowerIndex)> {
    digits
        .iter()
        .enumerate()
        .filter(|(_, d)| {
            d.amplitude > params.min_digit_energy
                && d.time >= params.time_min
                && d.time <= params.time_max
                && !conditions.is_bad(d.abs_id)
        })
        .filter_map(|(i, d)| geometry.tower_index(d.abs_id).map(|index| (i, index)))
        .collect()
}

/// Orders rec points by decreasing energy, ties by first digit.
fn sort_rec_points(points: &mut [RecPoint]) {
    points.sort_by(|a, b| {
        b.energy()
            .total_cmp(&a.energy())
            .then_with(|| a.digits.first().cmp(&b.digits.first()))
    });
}

/// Union-find over digit positions.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

/// Connected-tower clusterizer.
#[derive(Debug, Clone)]
pub struct V1Clusterizer {
    params: RecParam,
    geometry: TowerGeometry,
}

impl V1Clusterizer {
    /// Creates a clusterizer.
    #[must_use]
    pub fn new(params: RecParam, geometry: TowerGeometry) -> Self {
        Self { params, geometry }
    }
}

impl Clusterizer for V1Clusterizer {
    fn name(&self) -> &'static str {
        "v1"
    }

    fn clusterize(&self, digits: &[Digit], conditions: &RunConditions) -> Vec<RecPoint> {
        let eligible = eligible_digits(digits, &self.params, &self.geometry, conditions);
        if eligible.is_empty() {
            return Vec::new();
        }

        let by_tower: HashMap<TowerIndex, usize> = eligible
            .iter()
            .enumerate()
            .map(|(a, &(_, tower))| (tower, a))
            .collect();

        let mut uf = UnionFind::new(eligible.len());
        for (a, &(i, tower)) in eligible.iter().enumerate() {
            // Right and upper neighbours; the other two sides are visited from them.
            let right = TowerIndex {
                col: tower.col + 1,
                ..tower
            };
            let up = TowerIndex {
                row: tower.row + 1,
                ..tower
            };
            for neighbour in [right, up] {
                let Some(&b) = by_tower.get(&neighbour) else {
                    continue;
                };
                let j = eligible[b].0;
                if (digits[i].time - digits[j].time).abs() < self.params.time_cut {
                    uf.union(a, b);
                }
            }
        }

        let mut groups: std::collections::BTreeMap<usize, RecPoint> =
            std::collections::BTreeMap::new();
        for (a, &(i, _)) in eligible.iter().enumerate() {
            let root = uf.find(a);
            groups
                .entry(root)
                .or_default()
                .push(i, digits[i].amplitude);
        }

        let mut points: Vec<RecPoint> = groups
            .into_values()
            .filter(|point| {
                point
                    .digits
                    .iter()
                    .any(|&i| digits[i].amplitude >= self.params.clustering_threshold)
            })
            .collect();
        sort_rec_points(&mut points);
        points
    }
}

/// Fixed-window clusterizer (3x3, or 5x5 when extended).
#[derive(Debug, Clone)]
pub struct NxnClusterizer {
    params: RecParam,
    geometry: TowerGeometry,
}

impl NxnClusterizer {
    /// Creates a clusterizer; the window size follows the parameters' flag.
    #[must_use]
    pub fn new(params: RecParam, geometry: TowerGeometry) -> Self {
        Self { params, geometry }
    }

    fn half_width(&self) -> u16 {
        self.params.clusterizer.window_half_width()
    }
}

impl Clusterizer for NxnClusterizer {
    fn name(&self) -> &'static str {
        self.params.clusterizer.name()
    }

    fn clusterize(&self, digits: &[Digit], conditions: &RunConditions) -> Vec<RecPoint> {
        let mut eligible = eligible_digits(digits, &self.params, &self.geometry, conditions);
        eligible.sort_by(|(a, _), (b, _)| {
            digits[*b]
                .amplitude
                .total_cmp(&digits[*a].amplitude)
                .then(a.cmp(b))
        });

        let half = self.half_width();
        let mut assigned = vec![false; eligible.len()];
        let mut points = Vec::new();

        for seed in 0..eligible.len() {
            let (seed_digit, seed_tower) = eligible[seed];
            if assigned[seed] || digits[seed_digit].amplitude < self.params.clustering_threshold {
                continue;
            }
            let mut point = RecPoint::default();
            for (k, &(i, tower)) in eligible.iter().enumerate() {
                if assigned[k]
                    || tower.super_module != seed_tower.super_module
                    || tower.row.abs_diff(seed_tower.row) > half
                    || tower.col.abs_diff(seed_tower.col) > half
                    || (digits[i].time - digits[seed_digit].time).abs() >= self.params.time_cut
                {
                    continue;
                }
                assigned[k] = true;
                point.push(i, digits[i].amplitude);
            }
            points.push(point);
        }
        // Seeds were visited by decreasing energy; keep that order.
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit(abs_id: u16, amplitude: f64) -> Digit {
        Digit {
            abs_id,
            amplitude,
            time: 0.0,
            index_in_list: usize::from(abs_id),
        }
    }

    fn params(kind: ClusterizerKind) -> RecParam {
        RecParam::default()
            .with_clusterizer(kind)
            .with_clustering_threshold(0.5)
            .with_min_digit_energy(0.05)
    }

    #[test]
    fn test_v1_connects_side_neighbours() {
        // 0-1-2 chain in row 0; 49 is (row 1, col 1), below tower 1.
        let digits = vec![
            digit(0, 1.0),
            digit(1, 0.3),
            digit(2, 0.2),
            digit(49, 0.1),
            digit(200, 0.8),
        ];
        let clusterizer = V1Clusterizer::new(params(ClusterizerKind::V1), TowerGeometry::default());
        let points = clusterizer.clusterize(&digits, &RunConditions::default());

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].digits, vec![0, 1, 2, 3]);
        assert_eq!(points[1].digits, vec![4]);
    }

    #[test]
    fn test_v1_drops_groups_without_seed_and_bad_channels() {
        let digits = vec![digit(0, 0.2), digit(1, 0.2), digit(10, 1.0), digit(11, 0.4)];
        let mut conditions = RunConditions::default();
        conditions.dead_map.dead_channels.insert(11);

        let clusterizer = V1Clusterizer::new(params(ClusterizerKind::V1), TowerGeometry::default());
        let points = clusterizer.clusterize(&digits, &conditions);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].digits, vec![2]);
    }

    #[test]
    fn test_v1_full_super_modules() {
        // Two fully lit super modules: one cluster each.
        let digits: Vec<Digit> = (0..2 * 1152).map(|id| digit(id, 0.6)).collect();
        let points = V1Clusterizer::new(params(ClusterizerKind::V1), TowerGeometry::default())
            .clusterize(&digits, &RunConditions::default());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].len(), 1152);
        assert_eq!(points[1].len(), 1152);
    }

    #[test]
    fn test_v1_time_cut_splits() {
        let mut late = digit(1, 0.6);
        late.time = 0.5;
        let digits = vec![digit(0, 1.0), late];
        let p = params(ClusterizerKind::V1).with_time_window(-1.0, 1.0, 0.1);
        let points = V1Clusterizer::new(p, TowerGeometry::default())
            .clusterize(&digits, &RunConditions::default());
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_nxn_window_sizes() {
        // Seed at (row 2, col 2) = 98; tower at (row 4, col 4) = 196 is two towers away.
        let digits = vec![digit(98, 2.0), digit(99, 0.3), digit(196, 0.2)];
        let conditions = RunConditions::default();

        let narrow = NxnClusterizer::new(params(ClusterizerKind::Nxn), TowerGeometry::default());
        let points = narrow.clusterize(&digits, &conditions);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].digits, vec![0, 1]);

        let wide = NxnClusterizer::new(
            params(ClusterizerKind::NxnExtended),
            TowerGeometry::default(),
        );
        let points = wide.clusterize(&digits, &conditions);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].digits, vec![0, 1, 2]);
        assert_eq!(wide.name(), "NxN-extended");
    }

    #[test]
    fn test_nxn_seeds_in_energy_order() {
        let digits = vec![digit(0, 0.7), digit(500, 3.0)];
        let points = NxnClusterizer::new(params(ClusterizerKind::Nxn), TowerGeometry::default())
            .clusterize(&digits, &RunConditions::default());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].digits, vec![1]);
        assert_eq!(points[1].digits, vec![0]);
    }

    #[test]
    fn test_build_clusterizer_dispatch() {
        let geometry = TowerGeometry::default();
        assert_eq!(build_clusterizer(&params(ClusterizerKind::V1), &geometry).name(), "v1");
        assert_eq!(build_clusterizer(&params(ClusterizerKind::Nxn), &geometry).name(), "NxN");
    }
}
