//! Heat and coolant fields
//!
//! Two co-registered grids cover the vessel interior: temperature and
//! water density (1 = full liquid, 0 = all steam). Each frame runs three
//! passes in a fixed order:
//!
//! 1. generation from atom energy into the 3x3 neighbourhood,
//! 2. 4-neighbour diffusion out of the active heat buffer into the back
//!    buffer, followed by a buffer flip,
//! 3. cooling, whose rate depends on local water density, combined with
//!    boiling and condensation.
//!
//! Less water means less cooling, which means more boiling: the positive
//! void coefficient.

use glam::DVec2;
use ndarray::Array2;

use crate::clamp_unit;
use crate::config::ThermalConfig;
use crate::error::{ReactorError, ReactorResult};

#[derive(Debug, Clone)]
pub struct ThermalField {
    cell_size: f64,
    heat: [Array2<f64>; 2], // Double-buffered, indexed by `active`
    active: usize,
    water: Array2<f64>,
}

impl ThermalField {
    /// Cold, fully flooded field covering `[0, width] x [0, height]`
    pub fn new(width: f64, height: f64, cell_size: f64) -> ReactorResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ReactorError::Config(format!(
                "heat cell size must be positive, got {}",
                cell_size
            )));
        }
        let cols = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);

        Self::from_grids(
            Array2::zeros((rows, cols)),
            Array2::ones((rows, cols)),
            cell_size,
        )
    }

    /// Build a field from existing grids; their shapes must agree
    pub fn from_grids(heat: Array2<f64>, water: Array2<f64>, cell_size: f64) -> ReactorResult<Self> {
        if heat.dim() != water.dim() {
            return Err(ReactorError::GridMismatch {
                heat: heat.dim(),
                water: water.dim(),
            });
        }
        let back = heat.clone();

        Ok(Self {
            cell_size,
            heat: [heat, back],
            active: 0,
            water,
        })
    }

    /// Grid shape as (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.water.dim()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Current temperature grid
    pub fn temperature(&self) -> &Array2<f64> {
        &self.heat[self.active]
    }

    /// Current water density grid
    pub fn water(&self) -> &Array2<f64> {
        &self.water
    }

    /// Cell containing `pos`, as (row, column)
    pub fn cell_of(&self, pos: DVec2) -> Option<(usize, usize)> {
        let col = (pos.x / self.cell_size).floor();
        let row = (pos.y / self.cell_size).floor();
        let (rows, cols) = self.dim();
        if col.is_nan() || row.is_nan() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < rows && col < cols).then_some((row, col))
    }

    /// Temperature at a world position; zero outside the vessel
    pub fn temperature_at(&self, pos: DVec2) -> f64 {
        self.cell_of(pos)
            .map(|cell| self.temperature()[cell])
            .unwrap_or(0.0)
    }

    /// Water density at a world position; full water outside the vessel
    pub fn water_at(&self, pos: DVec2) -> f64 {
        self.cell_of(pos).map(|cell| self.water[cell]).unwrap_or(1.0)
    }

    pub fn void_at(&self, pos: DVec2) -> f64 {
        1.0 - self.water_at(pos)
    }

    pub fn set_temperature(&mut self, cell: (usize, usize), value: f64) {
        self.heat[self.active][cell] = clamp_unit(value);
    }

    pub fn set_water(&mut self, cell: (usize, usize), value: f64) {
        self.water[cell] = clamp_unit(value);
    }

    /// Run all three passes for one frame
    pub fn step<I>(&mut self, sources: I, params: &ThermalConfig, frame_scale: f64)
    where
        I: IntoIterator<Item = (DVec2, f64)>,
    {
        self.generate(sources, params, frame_scale);
        self.diffuse(params, frame_scale);
        self.cool_and_boil(params, frame_scale);
    }

    /// Deposit heat from each `(position, energy)` source with inverse
    /// distance falloff over its 3x3 neighbourhood
    pub fn generate<I>(&mut self, sources: I, params: &ThermalConfig, frame_scale: f64)
    where
        I: IntoIterator<Item = (DVec2, f64)>,
    {
        let (rows, cols) = self.dim();
        let cell_size = self.cell_size;
        let heat = &mut self.heat[self.active];

        for (pos, energy) in sources {
            if energy <= 0.0 {
                continue;
            }
            let cx = (pos.x / cell_size).floor() as i64;
            let cy = (pos.y / cell_size).floor() as i64;

            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (x, y) = (cx + dx, cy + dy);
                    if x < 0 || y < 0 || x >= cols as i64 || y >= rows as i64 {
                        continue;
                    }
                    let center = DVec2::new((x as f64 + 0.5) * cell_size, (y as f64 + 0.5) * cell_size);
                    let weight = 1.0 / (1.0 + pos.distance(center) / cell_size);
                    let cell = &mut heat[[y as usize, x as usize]];
                    *cell = clamp_unit(*cell + energy * params.heat_generation * weight * frame_scale);
                }
            }
        }
    }

    /// Blend each cell toward the mean of its von Neumann neighbours.
    /// Reads only the active buffer, writes only the back buffer.
    pub fn diffuse(&mut self, params: &ThermalConfig, frame_scale: f64) {
        let rate = (params.diffusion_rate * frame_scale).min(1.0);
        let (rows, cols) = self.dim();

        let [a, b] = &mut self.heat;
        let (src, dst) = if self.active == 0 { (&*a, b) } else { (&*b, a) };

        for r in 0..rows {
            for c in 0..cols {
                let mut sum = 0.0;
                let mut count = 0.0;
                if r > 0 {
                    sum += src[[r - 1, c]];
                    count += 1.0;
                }
                if r + 1 < rows {
                    sum += src[[r + 1, c]];
                    count += 1.0;
                }
                if c > 0 {
                    sum += src[[r, c - 1]];
                    count += 1.0;
                }
                if c + 1 < cols {
                    sum += src[[r, c + 1]];
                    count += 1.0;
                }

                let current = src[[r, c]];
                dst[[r, c]] = if count > 0.0 {
                    clamp_unit(current + rate * (sum / count - current))
                } else {
                    current
                };
            }
        }

        self.active ^= 1;
    }

    /// Cool every cell at a water-dependent rate, then boil or condense
    pub fn cool_and_boil(&mut self, params: &ThermalConfig, frame_scale: f64) {
        let heat = &mut self.heat[self.active];

        for (t, w) in heat.iter_mut().zip(self.water.iter_mut()) {
            let cooling = (cooling_rate(params, *w) * frame_scale).min(1.0);
            *t = clamp_unit(*t * (1.0 - cooling));

            if *t > params.boil_threshold {
                *w -= params.boil_rate * (*t - params.boil_threshold) * frame_scale;
            } else if *t < params.condense_threshold {
                *w += params.condense_rate * (params.condense_threshold - *t) * frame_scale;
            }
            *w = clamp_unit(*w);
        }
    }

    pub fn average_temperature(&self) -> f64 {
        self.temperature().mean().unwrap_or(0.0)
    }

    /// Grid-average of `1 - water density`
    pub fn average_void(&self) -> f64 {
        1.0 - self.water.mean().unwrap_or(1.0)
    }

    /// Vessel pressure, increasing in both average temperature and void
    pub fn pressure(&self, params: &ThermalConfig) -> f64 {
        pressure(params, self.average_temperature(), self.average_void())
    }
}

/// Fractional heat loss per baseline frame for a cell holding `water`.
/// Falls to `void_cooling_floor` of the base rate once the cell is all steam.
pub fn cooling_rate(params: &ThermalConfig, water: f64) -> f64 {
    let water = clamp_unit(water);
    params.base_cooling * (params.void_cooling_floor + (1.0 - params.void_cooling_floor) * water)
}

pub fn pressure(params: &ThermalConfig, avg_temperature: f64, avg_void: f64) -> f64 {
    params.base_pressure
        + params.temperature_pressure * avg_temperature
        + params.void_pressure * avg_void
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ThermalConfig {
        ThermalConfig::default()
    }

    #[test]
    fn test_mismatched_grids_are_rejected() {
        let err = ThermalField::from_grids(Array2::zeros((4, 5)), Array2::ones((5, 4)), 10.0).unwrap_err();
        assert!(matches!(err, ReactorError::GridMismatch { .. }));
    }

    #[test]
    fn test_lookups_outside_are_ambient() {
        let field = ThermalField::new(100.0, 100.0, 10.0).unwrap();
        assert_eq!(field.dim(), (10, 10));
        assert_eq!(field.temperature_at(DVec2::new(-1.0, 5.0)), 0.0);
        assert_eq!(field.water_at(DVec2::new(5.0, 250.0)), 1.0);
        assert_eq!(field.void_at(DVec2::new(f64::NAN, 5.0)), 0.0);
    }

    #[test]
    fn test_generation_heats_until_saturation() {
        let mut field = ThermalField::new(100.0, 100.0, 10.0).unwrap();
        let atom = DVec2::new(55.0, 55.0);
        let mut last = field.temperature_at(atom);

        for _ in 0..200 {
            field.generate([(atom, 1.0)], &params(), 1.0);
            let now = field.temperature_at(atom);
            assert!(now > last || now == 1.0, "temperature stalled at {}", now);
            last = now;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_cooling_returns_toward_zero() {
        let mut field = ThermalField::new(100.0, 100.0, 10.0).unwrap();
        let atom = DVec2::new(55.0, 55.0);
        for _ in 0..20 {
            field.generate([(atom, 1.0)], &params(), 1.0);
        }

        let mut last = field.temperature_at(atom);
        for _ in 0..500 {
            field.step(std::iter::empty(), &params(), 1.0);
            let now = field.temperature_at(atom);
            assert!(now <= last);
            last = now;
        }
        assert!(last < 0.05);
    }

    #[test]
    fn test_void_cools_less_than_water() {
        let p = params();
        assert!(cooling_rate(&p, 0.0) < cooling_rate(&p, 1.0));

        let mut field = ThermalField::new(20.0, 10.0, 10.0).unwrap();
        field.set_temperature((0, 0), 0.9);
        field.set_temperature((0, 1), 0.9);
        field.set_water((0, 0), 0.0);
        field.set_water((0, 1), 1.0);

        field.cool_and_boil(&p, 1.0);
        let voided = field.temperature()[[0, 0]];
        let flooded = field.temperature()[[0, 1]];
        assert!(0.9 - voided < 0.9 - flooded);
    }

    #[test]
    fn test_hot_cells_boil_and_cold_cells_condense() {
        let p = params();
        let mut field = ThermalField::new(20.0, 10.0, 10.0).unwrap();
        field.set_temperature((0, 0), 1.0);
        field.set_water((0, 1), 0.5);

        field.cool_and_boil(&p, 1.0);
        assert!(field.water()[[0, 0]] < 1.0);
        assert!(field.water()[[0, 1]] > 0.5);
    }

    #[test]
    fn test_diffusion_is_symmetric() {
        let mut field = ThermalField::new(50.0, 50.0, 10.0).unwrap();
        field.set_temperature((2, 2), 1.0);
        field.diffuse(&params(), 1.0);

        let t = field.temperature();
        let around = [t[[1, 2]], t[[3, 2]], t[[2, 1]], t[[2, 3]]];
        assert!(around.iter().all(|&v| v > 0.0 && (v - around[0]).abs() < 1e-12));
        assert!(t[[2, 2]] < 1.0);
        assert_eq!(t[[0, 0]], 0.0);
    }

    #[test]
    fn test_pressure_rises_with_temperature_and_void() {
        let p = params();
        let base = pressure(&p, 0.2, 0.1);
        assert!(pressure(&p, 0.5, 0.1) > base);
        assert!(pressure(&p, 0.2, 0.6) > base);
    }
}
