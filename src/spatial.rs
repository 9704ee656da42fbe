//! Uniform bucket grid over the fuel lattice
//!
//! Atoms never move, but the index is cheap enough to rebuild every
//! frame, which keeps it trivially in sync with the atom list.

use glam::DVec2;

/// Spatial index bucketing atom indices by `floor(position / cell_size)`
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    nx: usize,
    ny: usize,
    cells: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Create an empty index covering `[0, width] x [0, height]`
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let nx = ((width / cell_size).ceil() as usize).max(1);
        let ny = ((height / cell_size).ceil() as usize).max(1);

        Self {
            cell_size,
            nx,
            ny,
            cells: vec![Vec::new(); nx * ny],
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Re-bucket the given positions; the index of each item in the
    /// iterator is what queries return
    pub fn rebuild<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = DVec2>,
    {
        for cell in &mut self.cells {
            cell.clear();
        }

        for (i, pos) in positions.into_iter().enumerate() {
            let cx = self.axis_cell(pos.x, self.nx);
            let cy = self.axis_cell(pos.y, self.ny);
            let idx = cy * self.nx + cx;
            self.cells[idx].push(i);
        }
    }

    /// Collect every item in cells overlapping the square of half-size
    /// `radius` around `point`. Candidates only: callers still need an
    /// exact distance check.
    pub fn query_into(&self, point: DVec2, radius: f64, out: &mut Vec<usize>) {
        out.clear();

        let Some((x0, x1)) = self.axis_range(point.x - radius, point.x + radius, self.nx) else {
            return;
        };
        let Some((y0, y1)) = self.axis_range(point.y - radius, point.y + radius, self.ny) else {
            return;
        };

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                out.extend_from_slice(&self.cells[cy * self.nx + cx]);
            }
        }
    }

    pub fn query(&self, point: DVec2, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        self.query_into(point, radius, &mut out);
        out
    }

    // Items outside the covered area land in the nearest edge cell
    fn axis_cell(&self, coord: f64, n: usize) -> usize {
        let c = (coord / self.cell_size).floor();
        if c.is_nan() || c < 0.0 {
            0
        } else {
            (c as usize).min(n - 1)
        }
    }

    fn axis_range(&self, lo: f64, hi: f64, n: usize) -> Option<(usize, usize)> {
        let lo = (lo / self.cell_size).floor();
        let hi = (hi / self.cell_size).floor();
        if lo.is_nan() || hi.is_nan() || hi < 0.0 || lo >= n as f64 {
            return None;
        }
        let lo = lo.max(0.0) as usize;
        let hi = (hi as usize).min(n - 1);
        Some((lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> Vec<DVec2> {
        let mut points = Vec::new();
        for row in 0..5 {
            for col in 0..5 {
                points.push(DVec2::new(10.0 + col as f64 * 20.0, 10.0 + row as f64 * 20.0));
            }
        }
        points
    }

    #[test]
    fn test_query_finds_nearby_atoms() {
        let points = lattice();
        let mut grid = SpatialGrid::new(100.0, 100.0, 20.0);
        grid.rebuild(points.iter().copied());

        // Point right next to atom (2, 2) at (50, 50)
        let found = grid.query(DVec2::new(52.0, 49.0), 5.0);
        assert!(found.contains(&12));
        for &i in &found {
            assert!(points[i].distance(DVec2::new(52.0, 49.0)) < 40.0);
        }
    }

    #[test]
    fn test_query_covers_neighbouring_cells() {
        let points = lattice();
        let mut grid = SpatialGrid::new(100.0, 100.0, 20.0);
        grid.rebuild(points.iter().copied());

        // On the border between cells; both sides must be returned
        let found = grid.query(DVec2::new(40.0, 10.0), 12.0);
        assert!(found.contains(&1));
        assert!(found.contains(&2));
    }

    #[test]
    fn test_query_outside_is_empty() {
        let mut grid = SpatialGrid::new(100.0, 100.0, 20.0);
        grid.rebuild(lattice());

        assert!(grid.query(DVec2::new(-50.0, -50.0), 5.0).is_empty());
        assert!(grid.query(DVec2::new(500.0, 50.0), 5.0).is_empty());
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut grid = SpatialGrid::new(100.0, 100.0, 20.0);
        grid.rebuild(lattice());
        grid.rebuild(vec![DVec2::new(90.0, 90.0)]);

        assert!(grid.query(DVec2::new(10.0, 10.0), 1.0).is_empty());
        assert_eq!(grid.query(DVec2::new(90.0, 90.0), 1.0), vec![0]);
    }
}
