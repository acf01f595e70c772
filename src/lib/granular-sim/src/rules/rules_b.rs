//! RulesB: the clamped-velocity variant, used for parameter studies and
//! baseline tests. Pressure and all transfer hooks are no-ops; the only
//! behavior is density-weighted gravity with a hard velocity clamp.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, MIN_DIRT_THRESHOLD};
use crate::rules::TransferProposal;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RulesBParams {
    pub gravity: f64,
    pub elasticity_factor: f64,
    pub pressure_scale: f64,
    pub water_pressure_threshold: f64,
}

impl Default for RulesBParams {
    fn default() -> Self {
        RulesBParams {
            gravity: 9.81,
            elasticity_factor: 0.8,
            pressure_scale: 1.0,
            water_pressure_threshold: 0.0004,
        }
    }
}

const MAX_VELOCITY: f64 = 0.9;

pub fn apply_physics(params: &RulesBParams, cell: &mut Cell, dt: f64) {
    if cell.percent_full() < MIN_DIRT_THRESHOLD {
        return;
    }
    // Density-weighted gravity uses dirt+water, not total fill: a cell's
    // wall/air/wood/etc. fraction doesn't contribute the same way the
    // original's `totalMass = cell.dirt + cell.water` weighting did.
    let total_mass = cell.dirt() + cell.water();
    cell.velocity.y += params.gravity * total_mass * dt;

    let speed = cell.velocity.magnitude();
    if speed > MAX_VELOCITY {
        cell.velocity = cell.velocity.normalize() * MAX_VELOCITY;
    } else if speed > 0.5 {
        cell.velocity *= 0.9;
    }

    cell.com += cell.velocity * dt;
    cell.com = cell.com.clamp_magnitude_per_axis(1.0);
}

pub fn should_transfer(_cell: &Cell) -> bool {
    false
}

pub fn calculate_transfer_direction(cell: &Cell, x: u32, y: u32) -> TransferProposal {
    TransferProposal {
        transfer_x: false,
        transfer_y: false,
        target_x: x as i64,
        target_y: y as i64,
        com_offset: cell.com,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialType;

    #[test]
    fn velocity_is_hard_capped() {
        let params = RulesBParams::default();
        let mut cell = Cell::with_material(MaterialType::Water, 1.0);
        for _ in 0..1000 {
            apply_physics(&params, &mut cell, 0.016);
        }
        assert!(cell.velocity.magnitude() <= MAX_VELOCITY + 1e-9);
    }

    #[test]
    fn com_stays_within_unit_bounds() {
        let params = RulesBParams::default();
        let mut cell = Cell::with_material(MaterialType::Dirt, 1.0);
        for _ in 0..1000 {
            apply_physics(&params, &mut cell, 0.016);
        }
        assert!(cell.com.x.abs() <= 1.0 + 1e-9);
        assert!(cell.com.y.abs() <= 1.0 + 1e-9);
    }

    #[test]
    fn gravity_is_weighted_by_dirt_and_water_only() {
        let params = RulesBParams::default();
        let mut sand_only = Cell::with_material(MaterialType::Sand, 1.0);
        apply_physics(&params, &mut sand_only, 0.016);
        assert_eq!(sand_only.velocity.y, 0.0);

        let mut dirt_cell = Cell::with_material(MaterialType::Dirt, 1.0);
        apply_physics(&params, &mut dirt_cell, 0.016);
        assert!((dirt_cell.velocity.y - params.gravity * 1.0 * 0.016).abs() < 1e-12);
    }

    #[test]
    fn empty_cell_is_unaffected() {
        let params = RulesBParams::default();
        let mut cell = Cell::new();
        apply_physics(&params, &mut cell, 0.016);
        assert_eq!(cell.velocity.y, 0.0);
    }
}
