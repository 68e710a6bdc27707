//! Manifold-approximation dimensionality reduction.
//!
//! Builds a fuzzy k-nearest-neighbour graph over the input rows, then lays the
//! points out in a dense low-dimensional space by stochastic gradient descent:
//! graph edges attract, randomly sampled non-edges repel. The attraction curve
//! `1 / (1 + a * d^(2b))` is fitted to `min_dist` so that neighbours settle
//! roughly that far apart.
//!
//! All randomness comes from one `StdRng`. With a seed, output is identical
//! across runs.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::matrix::SparseMatrix;

const SPREAD: f32 = 1.0;
const INIT_RANGE: f32 = 10.0;
const GRADIENT_CLIP: f32 = 4.0;
const NEGATIVE_SAMPLE_RATE: usize = 5;
const SIGMA_SEARCH_ITERATIONS: usize = 64;
const SIGMA_TOLERANCE: f32 = 1e-5;
const MIN_K_DIST_SCALE: f32 = 1e-3;
/// Above this many rows the default epoch count drops to `LARGE_INPUT_EPOCHS`.
const SMALL_INPUT_ROWS: usize = 10_000;
const SMALL_INPUT_EPOCHS: usize = 500;
const LARGE_INPUT_EPOCHS: usize = 200;

/// Weighted edge `(i, j, weight)`. The symmetric graph keeps `i < j`; the
/// optimisation schedule holds both directions.
type Edge = (usize, usize, f32);

#[derive(Debug, Clone)]
pub struct ManifoldReducer {
    n_components: usize,
    n_neighbors: usize,
    min_dist: f32,
    /// Unset picks 500 epochs up to 10,000 rows and 200 beyond.
    n_epochs: Option<usize>,
    seed: Option<u64>,
}

impl ManifoldReducer {
    pub fn new(n_components: usize, n_neighbors: usize, min_dist: f32) -> Self {
        Self {
            n_components,
            n_neighbors,
            min_dist,
            n_epochs: None,
            seed: None,
        }
    }

    /// Fixed epoch count in place of the size-dependent default.
    #[must_use]
    pub fn with_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = Some(n_epochs);
        self
    }

    /// Epoch count used for an input of `n_rows` rows.
    pub fn epochs_for(&self, n_rows: usize) -> usize {
        self.n_epochs.unwrap_or(if n_rows <= SMALL_INPUT_ROWS {
            SMALL_INPUT_EPOCHS
        } else {
            LARGE_INPUT_EPOCHS
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(AnalysisError::InvalidParameter(
                "n_components must be >= 1".to_string(),
            ));
        }
        if self.n_neighbors < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "n_neighbors must be >= 2, got {}",
                self.n_neighbors
            )));
        }
        if !(self.min_dist >= 0.0 && self.min_dist < 3.0 * SPREAD) {
            return Err(AnalysisError::InvalidParameter(format!(
                "min_dist must be in [0, {}), got {}",
                3.0 * SPREAD,
                self.min_dist
            )));
        }
        Ok(())
    }

    /// One dense `n_components`-long row per input row.
    pub fn fit_transform(&self, matrix: &SparseMatrix) -> Result<Vec<Vec<f32>>> {
        self.validate()?;
        let n = matrix.n_rows();
        if n == 0 {
            return Err(AnalysisError::Shape(
                "cannot embed a matrix with no rows".to_string(),
            ));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut embedding: Vec<Vec<f32>> = (0..n)
            .map(|_| {
                (0..self.n_components)
                    .map(|_| rng.random_range(-INIT_RANGE..INIT_RANGE))
                    .collect()
            })
            .collect();

        if n == 1 {
            return Ok(embedding);
        }

        let k = self.n_neighbors.min(n - 1);
        let knn = nearest_neighbors(matrix, k);
        let n_epochs = self.epochs_for(n);
        let graph = prune_weak_edges(fuzzy_union(&knn, n), n_epochs);
        let (a, b) = fit_curve(self.min_dist, SPREAD);
        debug!(points = n, k, edges = graph.len(), n_epochs, a, b, "Neighbour graph built");

        let schedule = both_directions(&graph);
        optimize(&mut embedding, &schedule, n_epochs, a, b, &mut rng);
        Ok(embedding)
    }
}

impl Default for ManifoldReducer {
    fn default() -> Self {
        Self::new(50, 15, 0.1)
    }
}

/// Drop edges too weak to be sampled even once in `n_epochs`.
fn prune_weak_edges(graph: Vec<Edge>, n_epochs: usize) -> Vec<Edge> {
    let Some(max_weight) = graph.iter().map(|e| e.2).reduce(f32::max) else {
        return graph;
    };
    let floor = max_weight / n_epochs.max(1) as f32;
    graph.into_iter().filter(|e| e.2 >= floor).collect()
}

/// Each undirected edge as `(i, j)` and `(j, i)`, ordered by head then tail,
/// so both endpoints draw negative samples.
fn both_directions(graph: &[Edge]) -> Vec<Edge> {
    let mut directed: Vec<Edge> = graph
        .iter()
        .flat_map(|&(i, j, w)| [(i, j, w), (j, i, w)])
        .collect();
    directed.sort_by_key(|&(i, j, _)| (i, j));
    directed
}

/// Edge-sampled SGD. Edge `e` is sampled every `max_weight / w_e` epochs and
/// moves both endpoints together; each sample also pushes the head away from
/// `NEGATIVE_SAMPLE_RATE` random points.
fn optimize(
    embedding: &mut [Vec<f32>],
    schedule: &[Edge],
    n_epochs: usize,
    a: f32,
    b: f32,
    rng: &mut StdRng,
) {
    let Some(max_weight) = schedule.iter().map(|e| e.2).reduce(f32::max) else {
        return;
    };
    let n = embedding.len();

    let epochs_per_sample: Vec<f32> = schedule.iter().map(|e| max_weight / e.2).collect();
    let epochs_per_negative: Vec<f32> = epochs_per_sample
        .iter()
        .map(|eps| eps / NEGATIVE_SAMPLE_RATE as f32)
        .collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    for epoch in 0..n_epochs {
        let alpha = 1.0 - epoch as f32 / n_epochs as f32;
        let now = epoch as f32;

        for (e, &(head, tail, _)) in schedule.iter().enumerate() {
            if next_sample[e] > now {
                continue;
            }

            let d2 = squared_distance(&embedding[head], &embedding[tail]);
            if d2 > 0.0 {
                let coeff = -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0);
                for d in 0..embedding[head].len() {
                    let grad = clip(coeff * (embedding[head][d] - embedding[tail][d]));
                    embedding[head][d] += grad * alpha;
                    embedding[tail][d] -= grad * alpha;
                }
            }
            next_sample[e] += epochs_per_sample[e];

            let negatives =
                ((now - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
            for _ in 0..negatives {
                let other = rng.random_range(0..n);
                if other == head {
                    continue;
                }
                let d2 = squared_distance(&embedding[head], &embedding[other]);
                if d2 <= 0.0 {
                    continue;
                }
                let coeff = 2.0 * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0));
                for d in 0..embedding[head].len() {
                    let grad = clip(coeff * (embedding[head][d] - embedding[other][d]));
                    embedding[head][d] += grad * alpha;
                }
            }
            next_negative[e] += negatives as f32 * epochs_per_negative[e];
        }
    }
}

fn clip(value: f32) -> f32 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn squared_distance(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// The `k` nearest other rows of every row, closest first. Ties go to the
/// lower row index.
fn nearest_neighbors(matrix: &SparseMatrix, k: usize) -> Vec<Vec<(usize, f32)>> {
    let n = matrix.n_rows();
    (0..n)
        .map(|i| {
            let mut dists: Vec<(usize, f32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, matrix.squared_distance(i, j).sqrt()))
                .collect();
            dists.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
            dists.truncate(k);
            dists
        })
        .collect()
}

/// Per-point membership strengths, symmetrised with the fuzzy union
/// `w_ij + w_ji - w_ij * w_ji`.
fn fuzzy_union(knn: &[Vec<(usize, f32)>], n: usize) -> Vec<Edge> {
    let mean_all = {
        let (sum, count) = knn
            .iter()
            .flatten()
            .fold((0.0f32, 0usize), |(s, c), &(_, d)| (s + d, c + 1));
        if count > 0 { sum / count as f32 } else { 0.0 }
    };

    let mut directed: BTreeMap<(usize, usize), (f32, f32)> = BTreeMap::new();
    for (i, neighbours) in knn.iter().enumerate().take(n) {
        let (rho, sigma) = smooth_distances(neighbours, mean_all);
        for &(j, d) in neighbours {
            let excess = d - rho;
            let weight = if excess <= 0.0 || sigma <= 0.0 {
                1.0
            } else {
                (-excess / sigma).exp()
            };
            let entry = directed.entry((i.min(j), i.max(j))).or_insert((0.0, 0.0));
            if i < j {
                entry.0 = weight;
            } else {
                entry.1 = weight;
            }
        }
    }

    directed
        .into_iter()
        .map(|((i, j), (w_ij, w_ji))| (i, j, w_ij + w_ji - w_ij * w_ji))
        .filter(|e| e.2 > 0.0)
        .collect()
}

/// `rho` is the nearest non-zero distance; `sigma` is chosen so the summed
/// memberships equal `log2(k)`.
fn smooth_distances(neighbours: &[(usize, f32)], mean_all: f32) -> (f32, f32) {
    let rho = neighbours
        .iter()
        .map(|&(_, d)| d)
        .find(|&d| d > 0.0)
        .unwrap_or(0.0);
    let target = (neighbours.len() as f32).log2();

    let (mut lo, mut hi, mut mid) = (0.0f32, f32::INFINITY, 1.0f32);
    for _ in 0..SIGMA_SEARCH_ITERATIONS {
        let psum: f32 = neighbours
            .iter()
            .map(|&(_, d)| {
                let excess = d - rho;
                if excess > 0.0 { (-excess / mid).exp() } else { 1.0 }
            })
            .sum();
        if (psum - target).abs() < SIGMA_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let floor = if rho > 0.0 {
        let mean_local =
            neighbours.iter().map(|&(_, d)| d).sum::<f32>() / neighbours.len().max(1) as f32;
        MIN_K_DIST_SCALE * mean_local
    } else {
        MIN_K_DIST_SCALE * mean_all
    };
    (rho, mid.max(floor))
}

/// Fit `a`, `b` so `1 / (1 + a * x^(2b))` approximates a curve that is flat
/// at 1 until `min_dist`, then decays exponentially with `spread`.
fn fit_curve(min_dist: f32, spread: f32) -> (f32, f32) {
    const SAMPLES: usize = 300;
    let xs: Vec<f64> = (0..SAMPLES)
        .map(|i| 3.0 * spread as f64 * i as f64 / (SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist as f64 {
                1.0
            } else {
                (-(x - min_dist as f64) / spread as f64).exp()
            }
        })
        .collect();
    let loss = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let fitted = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (fitted - y) * (fitted - y)
            })
            .sum()
    };

    // Pattern search; the loss surface is smooth and unimodal near (1, 1).
    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut best = loss(a, b);
    let (mut step_a, mut step_b) = (0.5f64, 0.25f64);
    for _ in 0..10_000 {
        let mut improved = false;
        for (da, db) in [(step_a, 0.0), (-step_a, 0.0), (0.0, step_b), (0.0, -step_b)] {
            let (na, nb) = (a + da, b + db);
            if na <= 0.0 || nb <= 0.0 {
                continue;
            }
            let candidate = loss(na, nb);
            if candidate < best {
                best = candidate;
                a = na;
                b = nb;
                improved = true;
            }
        }
        if !improved {
            step_a /= 2.0;
            step_b /= 2.0;
            if step_a < 1e-7 {
                break;
            }
        }
    }
    (a as f32, b as f32)
}
