//! Hierarchical density-based clustering.
//!
//! Points are linked by mutual reachability distance, the single-linkage
//! hierarchy is condensed so that only splits into two groups of at least
//! `min_cluster_size` count as new clusters, and the final flat clustering is
//! chosen by excess of mass. Points not claimed by a selected cluster are
//! labelled [`NOISE`].
//!
//! The whole pass is deterministic: ties are broken by index and nothing
//! iterates a hash map.

use tracing::debug;

use crate::error::{AnalysisError, Result};

/// Label for points that belong to no cluster.
pub const NOISE: i32 = -1;

#[derive(Debug, Clone)]
pub struct DensityClusterer {
    min_cluster_size: usize,
    /// Neighbourhood size for core distances. Defaults to `min_cluster_size`.
    min_samples: Option<usize>,
}

/// Node `n + i` of the single-linkage tree joins `left` and `right`.
#[derive(Debug, Clone)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// Row of the condensed tree. Children below `n` are points, the rest are
/// clusters; the root cluster is `n`.
#[derive(Debug, Clone)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

impl DensityClusterer {
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size,
            min_samples: None,
        }
    }

    #[must_use]
    pub fn with_min_samples(mut self, min_samples: Option<usize>) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn min_cluster_size(&self) -> usize {
        self.min_cluster_size
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }
        if self.min_samples == Some(0) {
            return Err(AnalysisError::InvalidParameter(
                "min_samples must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// One label per point: a cluster index from 0, or [`NOISE`].
    ///
    /// Fewer points than `min_cluster_size` cannot form a cluster, so every
    /// point is noise.
    pub fn fit_predict(&self, points: &[Vec<f32>]) -> Result<Vec<i32>> {
        self.validate()?;
        let n = points.len();
        if let Some(first) = points.first() {
            let dim = first.len();
            if let Some(bad) = points.iter().position(|p| p.len() != dim) {
                return Err(AnalysisError::Shape(format!(
                    "point {bad} has {} coordinates, expected {dim}",
                    points[bad].len()
                )));
            }
        }
        if n < self.min_cluster_size {
            return Ok(vec![NOISE; n]);
        }

        let min_samples = self.min_samples.unwrap_or(self.min_cluster_size).min(n);
        let distances = pairwise_distances(points);
        let core = core_distances(&distances, min_samples);
        let mst = minimum_spanning_tree(&distances, &core);
        let merges = single_linkage(&mst, n);
        let (tree, n_clusters) = condense(&merges, n, self.min_cluster_size);
        let selected = select_clusters(&tree, n, n_clusters);
        let labels = assign_labels(&tree, &selected, n);

        debug!(
            points = n,
            min_samples,
            clusters = selected.iter().filter(|&&s| s).count(),
            noise = labels.iter().filter(|&&l| l == NOISE).count(),
            "Density clustering finished"
        );
        Ok(labels)
    }
}

impl Default for DensityClusterer {
    fn default() -> Self {
        Self::new(5)
    }
}

fn pairwise_distances(points: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut distances = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| {
                    let diff = f64::from(*a) - f64::from(*b);
                    diff * diff
                })
                .sum::<f64>()
                .sqrt();
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }
    distances
}

/// Distance to the `k`-th nearest point, counting the point itself.
fn core_distances(distances: &[Vec<f64>], k: usize) -> Vec<f64> {
    distances
        .iter()
        .map(|row| {
            let mut sorted = row.clone();
            sorted.sort_by(f64::total_cmp);
            sorted[k - 1]
        })
        .collect()
}

/// Prim's algorithm over the complete mutual-reachability graph. Edges come
/// back sorted by weight; equal weights keep discovery order.
fn minimum_spanning_tree(distances: &[Vec<f64>], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = distances.len();
    let reach = |i: usize, j: usize| distances[i][j].max(core[i]).max(core[j]);

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    let mut current = 0;
    in_tree[current] = true;
    for _ in 1..n {
        for j in 0..n {
            if !in_tree[j] {
                let w = reach(current, j);
                if w < best[j] {
                    best[j] = w;
                    from[j] = current;
                }
            }
        }
        let Some(next) = (0..n)
            .filter(|&j| !in_tree[j])
            .min_by(|&a, &b| best[a].total_cmp(&best[b]).then(a.cmp(&b)))
        else {
            break;
        };
        edges.push((from[next], next, best[next]));
        in_tree[next] = true;
        current = next;
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[x] != root {
        let up = parent[x];
        parent[x] = root;
        x = up;
    }
    root
}

fn single_linkage(mst: &[(usize, usize, f64)], n: usize) -> Vec<Merge> {
    let total = n + mst.len();
    let mut parent: Vec<usize> = (0..total).collect();
    let mut size = vec![1usize; total];
    let mut merges = Vec::with_capacity(mst.len());

    for (idx, &(a, b, distance)) in mst.iter().enumerate() {
        let left = find(&mut parent, a);
        let right = find(&mut parent, b);
        let node = n + idx;
        parent[left] = node;
        parent[right] = node;
        size[node] = size[left] + size[right];
        merges.push(Merge {
            left,
            right,
            distance,
            size: size[node],
        });
    }
    merges
}

/// `node` and everything below it, breadth first.
fn descendants(merges: &[Merge], n: usize, node: usize) -> Vec<usize> {
    let mut out = vec![node];
    let mut i = 0;
    while i < out.len() {
        let current = out[i];
        if current >= n {
            let m = &merges[current - n];
            out.push(m.left);
            out.push(m.right);
        }
        i += 1;
    }
    out
}

/// Returns the condensed tree and the number of clusters in it (root
/// included).
fn condense(merges: &[Merge], n: usize, min_cluster_size: usize) -> (Vec<CondensedEdge>, usize) {
    let root = n + merges.len() - 1;
    let size_of = |node: usize| if node < n { 1 } else { merges[node - n].size };

    let mut relabel = vec![0usize; root + 1];
    let mut ignore = vec![false; root + 1];
    let mut next_label = n + 1;
    let mut tree = Vec::new();
    relabel[root] = n;

    for node in descendants(merges, n, root) {
        if ignore[node] || node < n {
            continue;
        }
        let merge = &merges[node - n];
        let lambda = 1.0 / merge.distance.max(f64::EPSILON);
        let parent = relabel[node];
        let (left, right) = (merge.left, merge.right);
        let (left_size, right_size) = (size_of(left), size_of(right));

        let mut fall_out = |child: usize, tree: &mut Vec<CondensedEdge>| {
            for sub in descendants(merges, n, child) {
                if sub < n {
                    tree.push(CondensedEdge {
                        parent,
                        child: sub,
                        lambda,
                        size: 1,
                    });
                }
                ignore[sub] = true;
            }
        };

        match (left_size >= min_cluster_size, right_size >= min_cluster_size) {
            (true, true) => {
                for (child, size) in [(left, left_size), (right, right_size)] {
                    relabel[child] = next_label;
                    tree.push(CondensedEdge {
                        parent,
                        child: next_label,
                        lambda,
                        size,
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(left, &mut tree);
                fall_out(right, &mut tree);
            }
            (false, true) => {
                fall_out(left, &mut tree);
                relabel[right] = parent;
            }
            (true, false) => {
                fall_out(right, &mut tree);
                relabel[left] = parent;
            }
        }
    }

    (tree, next_label - n)
}

/// Excess-of-mass selection. Returns, per cluster index (`label - n`),
/// whether that cluster is part of the flat clustering. The root never is.
fn select_clusters(tree: &[CondensedEdge], n: usize, n_clusters: usize) -> Vec<bool> {
    let mut births = vec![0.0f64; n_clusters];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n_clusters];
    for edge in tree.iter().filter(|e| e.child >= n) {
        births[edge.child - n] = edge.lambda;
        children[edge.parent - n].push(edge.child - n);
    }

    let mut stability = vec![0.0f64; n_clusters];
    for edge in tree {
        let c = edge.parent - n;
        stability[c] += (edge.lambda - births[c]) * edge.size as f64;
    }

    let mut selected = vec![true; n_clusters];
    selected[0] = false;
    for c in (1..n_clusters).rev() {
        let subtree: f64 = children[c].iter().map(|&k| stability[k]).sum();
        if subtree > stability[c] {
            selected[c] = false;
            stability[c] = subtree;
        } else {
            let mut stack = children[c].clone();
            while let Some(k) = stack.pop() {
                selected[k] = false;
                stack.extend_from_slice(&children[k]);
            }
        }
    }
    selected
}

/// Each point takes the label of the nearest selected cluster above it.
/// Labels are numbered from 0 in ascending cluster order.
fn assign_labels(tree: &[CondensedEdge], selected: &[bool], n: usize) -> Vec<i32> {
    let mut cluster_parent: Vec<Option<usize>> = vec![None; selected.len()];
    let mut point_parent = vec![0usize; n];
    for edge in tree {
        if edge.child >= n {
            cluster_parent[edge.child - n] = Some(edge.parent - n);
        } else {
            point_parent[edge.child] = edge.parent - n;
        }
    }

    let mut label_of = vec![NOISE; selected.len()];
    let mut next = 0;
    for (c, &is_selected) in selected.iter().enumerate() {
        if is_selected {
            label_of[c] = next;
            next += 1;
        }
    }

    point_parent
        .into_iter()
        .map(|mut c| loop {
            if selected[c] {
                break label_of[c];
            }
            match cluster_parent[c] {
                Some(up) => c = up,
                None => break NOISE,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(cx: f32, cy: f32) -> Vec<Vec<f32>> {
        [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5), (0.5, 0.5), (0.25, 0.25), (0.1, 0.4)]
            .iter()
            .map(|(x, y)| vec![cx + x, cy + y])
            .collect()
    }

    fn two_blobs_and_outlier() -> Vec<Vec<f32>> {
        let mut points = blob(0.0, 0.0);
        points.extend(blob(10.0, 10.0));
        points.push(vec![50.0, -50.0]);
        points
    }

    #[test]
    fn separates_two_blobs_and_flags_outlier() {
        let labels = DensityClusterer::new(5)
            .fit_predict(&two_blobs_and_outlier())
            .unwrap();

        assert_eq!(labels.len(), 13);
        let first = labels[0];
        let second = labels[6];
        assert!(labels[..6].iter().all(|&l| l == first));
        assert!(labels[6..12].iter().all(|&l| l == second));
        assert_ne!(first, second);
        let mut found = [first, second];
        found.sort();
        assert_eq!(found, [0, 1]);
        assert_eq!(labels[12], NOISE);
    }

    #[test]
    fn clusters_too_small_for_min_size_are_noise() {
        let labels = DensityClusterer::new(7)
            .fit_predict(&two_blobs_and_outlier())
            .unwrap();
        assert!(labels.iter().all(|&l| l == NOISE), "{labels:?}");
    }

    #[test]
    fn fewer_points_than_min_cluster_size_are_all_noise() {
        let points = vec![vec![0.0, 0.0], vec![0.0, 0.1], vec![0.1, 0.0]];
        let labels = DensityClusterer::new(5).fit_predict(&points).unwrap();
        assert_eq!(labels, vec![NOISE; 3]);
    }

    #[test]
    fn empty_input_gives_empty_labels() {
        let labels = DensityClusterer::default().fit_predict(&[]).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn duplicate_points_do_not_break_lambdas() {
        let mut points = vec![vec![1.0, 1.0]; 6];
        points.extend(vec![vec![20.0, 20.0]; 6]);
        let labels = DensityClusterer::new(5).fit_predict(&points).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE || l == 0 || l == 1));
        assert!(labels[..6].iter().all(|&l| l == labels[0]));
        assert!(labels[6..].iter().all(|&l| l == labels[6]));
    }

    #[test]
    fn result_is_deterministic() {
        let points = two_blobs_and_outlier();
        let clusterer = DensityClusterer::new(5).with_min_samples(Some(3));
        assert_eq!(
            clusterer.fit_predict(&points).unwrap(),
            clusterer.fit_predict(&points).unwrap()
        );
    }

    #[test]
    fn ragged_input_and_bad_parameters_are_rejected() {
        let ragged = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(matches!(
            DensityClusterer::new(2).fit_predict(&ragged),
            Err(AnalysisError::Shape(_))
        ));
        assert!(DensityClusterer::new(1).validate().is_err());
        assert!(DensityClusterer::new(5)
            .with_min_samples(Some(0))
            .validate()
            .is_err());
    }

    #[test]
    fn mst_spans_every_point_in_weight_order() {
        let points = two_blobs_and_outlier();
        let distances = pairwise_distances(&points);
        let core = core_distances(&distances, 5);
        let mst = minimum_spanning_tree(&distances, &core);
        assert_eq!(mst.len(), points.len() - 1);
        assert!(mst.windows(2).all(|w| w[0].2 <= w[1].2));
    }
}
