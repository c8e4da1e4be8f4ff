//! Dense row-major point storage and node-range iteration

use serde::{Deserialize, Serialize};

use crate::{GnpError, Result};

/// Row-major set of points with a fixed dimensionality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    dims: usize,
    coords: Vec<f64>,
}

impl PointSet {
    /// Wrap flat row-major coordinates.
    pub fn new(dims: usize, coords: Vec<f64>) -> Result<Self> {
        if dims == 0 {
            return Err(GnpError::InvalidConfiguration(
                "points must have at least one dimension".to_string(),
            ));
        }
        if coords.len() % dims != 0 {
            return Err(GnpError::InvalidConfiguration(format!(
                "{} coordinates do not divide into {}-dimensional points",
                coords.len(),
                dims
            )));
        }
        Ok(Self { dims, coords })
    }

    /// Build from one vector per point; all rows must share a length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let dims = rows.first().map(Vec::len).unwrap_or(1);
        let mut coords = Vec::with_capacity(rows.len() * dims);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dims {
                return Err(GnpError::InvalidConfiguration(format!(
                    "row {} has {} coordinates, expected {}",
                    i,
                    row.len(),
                    dims
                )));
            }
            coords.extend_from_slice(row);
        }
        Self::new(dims, coords)
    }

    /// Dimensionality (0 only for the zeroed default).
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.coords.len() / self.dims
        }
    }

    /// Whether the set holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates of point `index`.
    pub fn point(&self, index: usize) -> &[f64] {
        &self.coords[index * self.dims..(index + 1) * self.dims]
    }

    /// Single coordinate of point `index`.
    #[inline]
    pub fn coord(&self, index: usize, dim: usize) -> f64 {
        self.coords[index * self.dims + dim]
    }

    /// Iterate over points `[begin, begin + count)`, clamped to the set.
    pub fn range(&self, begin: usize, count: usize) -> PointIter<'_> {
        let end = begin.saturating_add(count).min(self.len());
        PointIter {
            coords: &self.coords,
            dims: self.dims,
            next: begin.min(end),
            end,
        }
    }

    /// Reorder so that new position `k` holds old point `order[k]`.
    pub(crate) fn permute(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.len());
        let mut coords = Vec::with_capacity(self.coords.len());
        for &old in order {
            coords.extend_from_slice(self.point(old));
        }
        self.coords = coords;
    }
}

/// Iterator over the points owned by one tree node.
#[derive(Debug, Clone)]
pub struct PointIter<'a> {
    coords: &'a [f64],
    dims: usize,
    next: usize,
    end: usize,
}

impl<'a> PointIter<'a> {
    /// Iterator that yields nothing.
    pub fn empty() -> Self {
        Self {
            coords: &[],
            dims: 0,
            next: 0,
            end: 0,
        }
    }

    /// Dimensionality of the yielded points.
    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl<'a> Iterator for PointIter<'a> {
    type Item = &'a [f64];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let start = self.next * self.dims;
        self.next += 1;
        Some(&self.coords[start..start + self.dims])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PointIter<'_> {}

/// Anything that can hand out the points covered by a node's range.
pub trait PointSource {
    /// Points `[begin, begin + count)` in this source's index space.
    fn node_points(&self, begin: usize, count: usize) -> PointIter<'_>;
}

impl PointSource for PointSet {
    fn node_points(&self, begin: usize, count: usize) -> PointIter<'_> {
        self.range(begin, count)
    }
}

/// View of a rank's local points through global point indices.
///
/// Only the resident partition `[offset, offset + local.len())` is
/// visible; ranges owned by other ranks yield nothing.
#[derive(Debug, Clone, Copy)]
pub struct GlobalPoints<'a> {
    local: &'a PointSet,
    offset: usize,
}

impl<'a> GlobalPoints<'a> {
    pub(crate) fn new(local: &'a PointSet, offset: usize) -> Self {
        Self { local, offset }
    }

    /// Resident points among global indices `[begin, begin + count)`.
    pub fn range(&self, begin: usize, count: usize) -> PointIter<'a> {
        let lo = begin.max(self.offset);
        let hi = begin.saturating_add(count).min(self.offset + self.local.len());
        if lo >= hi {
            return PointIter::empty();
        }
        self.local.range(lo - self.offset, hi - lo)
    }
}

impl PointSource for GlobalPoints<'_> {
    fn node_points(&self, begin: usize, count: usize) -> PointIter<'_> {
        self.range(begin, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_clamps() {
        let points = PointSet::new(2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let rows: Vec<&[f64]> = points.range(1, 10).collect();
        assert_eq!(rows, vec![&[2.0, 3.0][..], &[4.0, 5.0][..]]);
        assert_eq!(points.range(5, 2).len(), 0);
    }

    #[test]
    fn test_rejects_ragged_input() {
        assert!(PointSet::new(3, vec![1.0, 2.0]).is_err());
        assert!(PointSet::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(PointSet::new(0, vec![]).is_err());
    }

    #[test]
    fn test_global_view_intersects_partition() {
        let local = PointSet::new(1, vec![10.0, 11.0, 12.0]).unwrap();
        let view = GlobalPoints::new(&local, 5);

        let inside: Vec<f64> = view.node_points(4, 3).map(|p| p[0]).collect();
        assert_eq!(inside, vec![10.0, 11.0]);
        assert_eq!(view.node_points(0, 5).len(), 0);
        assert_eq!(view.node_points(8, 4).len(), 0);
    }

    #[test]
    fn test_default_is_empty() {
        let points = PointSet::default();
        assert!(points.is_empty());
        assert_eq!(points.range(0, 4).count(), 0);
    }
}
