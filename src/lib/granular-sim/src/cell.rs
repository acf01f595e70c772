use serde::{Deserialize, Serialize};

use crate::error::CellError;
use crate::material::{MaterialType, MATERIAL_COUNT};
use crate::vector::Vector2;

/// Minimum fill before a cell is considered "empty" and its residual mass
/// is folded into `World::removed_mass`.
pub const MIN_DIRT_THRESHOLD: f64 = 0.01;

/// Width of the COM coordinate system, in cell-local units, per cell.
pub const COM_CELL_WIDTH: f64 = 2.0;

/// Dead-zone boundary: COM motion beyond this (in either axis, normalized
/// frame) triggers a transfer proposal.
pub const COM_DEFLECTION_THRESHOLD: f64 = 1.0;

/// Multiplier on `COM_DEFLECTION_THRESHOLD` past which a cell's COM is
/// considered an invariant violation and forcibly reflected back in.
pub const REFLECTION_THRESHOLD: f64 = 1.2;

/// Fraction of available transfer mass moved in a single proposal, before
/// `dirt_fragmentation_factor` is applied.
pub const TRANSFER_FACTOR: f64 = 1.0;

/// A per-cell structured pressure quantity. `gradient` is the vector Rules
/// write and `apply_pressure_forces` consumes directly as a force
/// direction; `hydrostatic` and `dynamic` are the decomposed contributions
/// a pressure generator accumulated this step, kept for diagnostics and
/// for `perf_stats_get`-style introspection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pressure {
    pub gradient: Vector2,
    pub hydrostatic: f64,
    pub dynamic: f64,
}

impl Pressure {
    pub fn total(&self) -> f64 {
        self.gradient.magnitude()
    }

    pub fn clear(&mut self) {
        *self = Pressure::default();
    }
}

/// The grid's leaf datum. Holds a fill-fraction per material (the sum is
/// `percent_full`, interpreted as the cell's aggregate occupancy), a
/// center-of-mass offset in the cell-local `[-1,1]` frame, a velocity in
/// cells/second, a structured pressure value written by Rules and
/// consumed by the transfer engine, and a dirty flag plus an opaque
/// render buffer that the physics core never reads — it only passes them
/// through for a renderer to consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    composition: [f64; MATERIAL_COUNT],
    pub com: Vector2,
    pub velocity: Vector2,
    pub pressure: Pressure,
    pub dirty: bool,
    #[serde(skip)]
    pub render_buffer: Vec<u8>,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            composition: [0.0; MATERIAL_COUNT],
            com: Vector2::ZERO,
            velocity: Vector2::ZERO,
            pressure: Pressure::default(),
            dirty: false,
            render_buffer: Vec::new(),
        }
    }
}

impl Cell {
    pub fn new() -> Self {
        Cell::default()
    }

    /// A cell wholly filled with `material`, fraction `fill` (clamped to
    /// `[0,1]`).
    pub fn with_material(material: MaterialType, fill: f64) -> Self {
        let mut cell = Cell::default();
        cell.set(material, fill.clamp(0.0, 1.0));
        cell
    }

    pub fn get(&self, material: MaterialType) -> f64 {
        self.composition[material.index()]
    }

    /// Replaces (does not merge with) the fraction held of `material`.
    pub fn set(&mut self, material: MaterialType, fill: f64) {
        self.composition[material.index()] = fill;
        self.dirty = true;
    }

    pub fn add(&mut self, material: MaterialType, amount: f64) {
        self.composition[material.index()] += amount;
        self.dirty = true;
    }

    /// Clears the cell back to empty air, preserving neither velocity nor
    /// COM — used when a cell's residual mass drops below the empty
    /// threshold and is folded into `removed_mass`.
    pub fn clear(&mut self) {
        *self = Cell::default();
    }

    pub fn water(&self) -> f64 {
        self.get(MaterialType::Water)
    }

    pub fn dirt(&self) -> f64 {
        self.get(MaterialType::Dirt)
    }

    pub fn percent_full(&self) -> f64 {
        self.composition.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.percent_full() < MIN_DIRT_THRESHOLD
    }

    pub fn is_wall(&self) -> bool {
        self.get(MaterialType::Wall) >= MIN_DIRT_THRESHOLD
    }

    /// Fill-weighted mean density, excluding Wall (which is never blended
    /// and reports no density contribution). Zero for an empty cell.
    pub fn effective_density(&self) -> f64 {
        if self.is_wall() {
            return f64::INFINITY;
        }
        let mut mass = 0.0;
        let mut fill = 0.0;
        for m in MaterialType::ALL {
            if m.is_wall() {
                continue;
            }
            let f = self.get(m);
            mass += f * m.density();
            fill += f;
        }
        if fill < f64::EPSILON {
            0.0
        } else {
            mass / fill
        }
    }

    /// The material with the largest fill fraction; used for the sparse
    /// wire representation (`cell_get`/`state_get`), which reports one
    /// material per cell rather than the full composition map. Ties break
    /// toward the first material in declaration order, with `Air` as the
    /// default for an empty cell.
    pub fn dominant_material(&self) -> MaterialType {
        let mut best = MaterialType::Air;
        let mut best_fill = self.get(MaterialType::Air);
        for m in MaterialType::ALL {
            let f = self.get(m);
            if f > best_fill {
                best_fill = f;
                best = m;
            }
        }
        best
    }

    /// The COM offset normalized by `COM_DEFLECTION_THRESHOLD`, clamped to
    /// `[-1,1]` per axis; used by the Original pressure generator.
    pub fn normalized_deflection(&self) -> Vector2 {
        (self.com / COM_DEFLECTION_THRESHOLD).clamp_magnitude_per_axis(1.0)
    }

    /// Checks that every material's fill is finite and within `[0,1]`.
    /// `set`/`add` never call this themselves (they're on the per-step hot
    /// path and a transient intermediate over-fill is resolved by the
    /// commit/validation phases in `world::advance_time`, not rejected
    /// here); this is for debug-assertion paths and test helpers that
    /// build a `Cell` directly from raw composition data, bypassing
    /// `with_material`'s clamp.
    pub fn validate(&self) -> Result<(), CellError> {
        for m in MaterialType::ALL {
            let fill = self.get(m);
            if !fill.is_finite() {
                return Err(CellError::NotFinite);
            }
            if !(0.0..=1.0).contains(&fill) {
                return Err(CellError::FillOutOfRange(fill));
            }
        }
        Ok(())
    }

    /// Test/debug helper: builds a cell from a raw per-material fill
    /// array, rejecting it outright rather than silently clamping like
    /// `with_material` does.
    pub fn from_raw_composition(composition: [f64; MATERIAL_COUNT]) -> Result<Self, CellError> {
        let mut cell = Cell::default();
        cell.composition = composition;
        cell.validate()?;
        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_has_zero_percent_full() {
        assert_eq!(Cell::new().percent_full(), 0.0);
        assert!(Cell::new().is_empty());
    }

    #[test]
    fn set_replaces_not_merges() {
        let mut cell = Cell::new();
        cell.set(MaterialType::Dirt, 0.4);
        cell.set(MaterialType::Dirt, 0.9);
        assert_eq!(cell.get(MaterialType::Dirt), 0.9);
    }

    #[test]
    fn effective_density_is_fill_weighted_mean() {
        let mut cell = Cell::new();
        cell.set(MaterialType::Dirt, 0.5);
        cell.set(MaterialType::Water, 0.5);
        let expected = (0.5 * MaterialType::Dirt.density() + 0.5 * MaterialType::Water.density()) / 1.0;
        assert!((cell.effective_density() - expected).abs() < 1e-12);
    }

    #[test]
    fn wall_cell_reports_infinite_density_and_excludes_from_blend() {
        let cell = Cell::with_material(MaterialType::Wall, 1.0);
        assert!(cell.is_wall());
        assert!(cell.effective_density().is_infinite());
    }

    #[test]
    fn dominant_material_picks_largest_fraction() {
        let mut cell = Cell::new();
        cell.set(MaterialType::Dirt, 0.3);
        cell.set(MaterialType::Water, 0.6);
        assert_eq!(cell.dominant_material(), MaterialType::Water);
    }

    #[test]
    fn from_raw_composition_accepts_in_range_fills() {
        let mut composition = [0.0; MATERIAL_COUNT];
        composition[MaterialType::Dirt.index()] = 0.4;
        let cell = Cell::from_raw_composition(composition).unwrap();
        assert_eq!(cell.get(MaterialType::Dirt), 0.4);
    }

    #[test]
    fn from_raw_composition_rejects_out_of_range_fill() {
        let mut composition = [0.0; MATERIAL_COUNT];
        composition[MaterialType::Dirt.index()] = 1.5;
        let err = Cell::from_raw_composition(composition).unwrap_err();
        assert_eq!(err, CellError::FillOutOfRange(1.5));
    }

    #[test]
    fn from_raw_composition_rejects_non_finite_fill() {
        let mut composition = [0.0; MATERIAL_COUNT];
        composition[MaterialType::Water.index()] = f64::NAN;
        let err = Cell::from_raw_composition(composition).unwrap_err();
        assert_eq!(err, CellError::NotFinite);
    }
}
