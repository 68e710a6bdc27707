use crate::error::{AnalysisError, Result};

/// Row-compressed sparse matrix. Each row holds `(column, value)` pairs in
/// strictly increasing column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    n_cols: usize,
    rows: Vec<Vec<(usize, f32)>>,
}

impl SparseMatrix {
    pub fn new(n_cols: usize, rows: Vec<Vec<(usize, f32)>>) -> Result<Self> {
        for (r, row) in rows.iter().enumerate() {
            for pair in row.windows(2) {
                if pair[0].0 >= pair[1].0 {
                    return Err(AnalysisError::Shape(format!(
                        "row {r}: columns must be strictly increasing"
                    )));
                }
            }
            if let Some(&(col, _)) = row.last() {
                if col >= n_cols {
                    return Err(AnalysisError::Shape(format!(
                        "row {r}: column {col} out of bounds for {n_cols} columns"
                    )));
                }
            }
        }
        Ok(Self { n_cols, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, r: usize) -> &[(usize, f32)] {
        &self.rows[r]
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.rows[r]
            .binary_search_by_key(&c, |&(col, _)| col)
            .map(|i| self.rows[r][i].1)
            .unwrap_or(0.0)
    }

    /// Squared Euclidean distance between rows `a` and `b`.
    pub fn squared_distance(&self, a: usize, b: usize) -> f32 {
        let (x, y) = (&self.rows[a], &self.rows[b]);
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < x.len() && j < y.len() {
            let (cx, vx) = x[i];
            let (cy, vy) = y[j];
            if cx == cy {
                sum += (vx - vy) * (vx - vy);
                i += 1;
                j += 1;
            } else if cx < cy {
                sum += vx * vx;
                i += 1;
            } else {
                sum += vy * vy;
                j += 1;
            }
        }
        sum += x[i..].iter().map(|&(_, v)| v * v).sum::<f32>();
        sum += y[j..].iter().map(|&(_, v)| v * v).sum::<f32>();
        sum
    }

    pub fn to_dense(&self) -> Vec<Vec<f32>> {
        self.rows
            .iter()
            .map(|row| {
                let mut dense = vec![0.0; self.n_cols];
                for &(c, v) in row {
                    dense[c] = v;
                }
                dense
            })
            .collect()
    }
}
