//! Dynamic time warping with traceback

use std::fmt;

/// Move taken into a cell of the cost matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// From `(i-1, j-1)`.
    Diagonal,
    /// From `(i-1, j)`.
    Up,
    /// From `(i, j-1)`.
    Left,
}

/// Optimal alignment of two series.
#[derive(Debug, Clone, PartialEq)]
pub struct DtwAlignment {
    /// Sum of `|x[i] - y[j]|` along the path.
    pub cost: f64,
    /// Matched sample indices `(i, j)`, zero-based, start to end.
    pub path: Vec<(usize, usize)>,
}

impl DtwAlignment {
    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Whether nothing was matched.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for DtwAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cost of best path = {}", self.cost)?;
        write!(f, "best path length = {}", self.path.len())?;
        for (i, j) in &self.path {
            write!(f, "\n({}, {})", i, j)?;
        }
        Ok(())
    }
}

/// Align `x` against `y` minimising total absolute difference.
///
/// Ties prefer the diagonal, then a step in `x` alone, then a step in `y`
/// alone. If exactly one series is empty there is no alignment and the
/// cost is infinite.
pub fn dtw_alignment(x: &[f64], y: &[f64]) -> DtwAlignment {
    let (n_x, n_y) = (x.len(), y.len());
    if n_x == 0 || n_y == 0 {
        let cost = if n_x == n_y { 0.0 } else { f64::INFINITY };
        return DtwAlignment {
            cost,
            path: Vec::new(),
        };
    }

    let width = n_y + 1;
    let mut gamma = vec![f64::INFINITY; (n_x + 1) * width];
    let mut best_in = vec![Step::Diagonal; (n_x + 1) * width];
    gamma[0] = 0.0;

    for i in 1..=n_x {
        for j in 1..=n_y {
            let cost = (x[i - 1] - y[j - 1]).abs();
            let diagonal = gamma[(i - 1) * width + j - 1];
            let up = gamma[(i - 1) * width + j];
            let left = gamma[i * width + j - 1];

            let (best, step) = if diagonal <= up && diagonal <= left {
                (diagonal, Step::Diagonal)
            } else if up <= left {
                (up, Step::Up)
            } else {
                (left, Step::Left)
            };
            gamma[i * width + j] = cost + best;
            best_in[i * width + j] = step;
        }
    }

    let mut path = Vec::with_capacity(n_x + n_y);
    let (mut i, mut j) = (n_x, n_y);
    while i != 0 && j != 0 {
        path.push((i - 1, j - 1));
        match best_in[i * width + j] {
            Step::Diagonal => {
                i -= 1;
                j -= 1;
            }
            Step::Up => i -= 1,
            Step::Left => j -= 1,
        }
    }
    path.reverse();

    DtwAlignment {
        cost: gamma[n_x * width + n_y],
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_series_align_diagonally() {
        let x = [1.0, 2.0, 3.0];
        let alignment = dtw_alignment(&x, &x);
        assert_eq!(alignment.cost, 0.0);
        assert_eq!(alignment.path, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_repeated_sample_warps() {
        let alignment = dtw_alignment(&[0.0, 1.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
        assert_eq!(alignment.cost, 0.0);
        assert_eq!(alignment.path, vec![(0, 0), (1, 1), (2, 1), (3, 2)]);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(dtw_alignment(&[], &[]).cost, 0.0);
        let one_sided = dtw_alignment(&[1.0], &[]);
        assert!(one_sided.cost.is_infinite());
        assert!(one_sided.is_empty());
    }

    #[test]
    fn test_display_lists_path() {
        let text = dtw_alignment(&[1.0], &[3.0]).to_string();
        assert!(text.starts_with("cost of best path = 2"));
        assert!(text.ends_with("(0, 0)"));
    }
}
