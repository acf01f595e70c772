//! RulesA: the reference physics. COM-deflection driven pressure, 8-neighbor
//! water cohesion/viscosity/buoyancy, elastic boundary and in-bounds
//! collision.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Pressure, COM_DEFLECTION_THRESHOLD, MIN_DIRT_THRESHOLD, REFLECTION_THRESHOLD};
use crate::rules::pressure::{self, PressureSystem};
use crate::rules::{calculate_natural_com, clamp_com_to_dead_zone, is_within_bounds, TransferProposal};
use crate::vector::Vector2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RulesAParams {
    pub gravity: f64,
    pub elasticity_factor: f64,
    pub pressure_scale: f64,
    pub water_pressure_threshold: f64,
    pub pressure_system: PressureSystem,
}

impl Default for RulesAParams {
    fn default() -> Self {
        RulesAParams {
            gravity: 9.81,
            elasticity_factor: 0.8,
            pressure_scale: 1.0,
            water_pressure_threshold: 0.0004,
            pressure_system: PressureSystem::Original,
        }
    }
}

const CURSOR_FORCE_STRENGTH: f64 = 10.0;
const CURSOR_FORCE_RADIUS: f64 = 5.0;

/// Cohesion pulls a water cell's velocity toward a neighbor in proportion
/// to how much water that neighbor holds — denser neighboring water draws
/// a stronger pull, producing the surface-tension-like clumping water
/// scenarios rely on.
fn water_cohesion(neighbor: &Cell, dx: i64, dy: i64) -> Vector2 {
    const COHESION_STRENGTH: f64 = 0.05;
    let direction = Vector2::new(dx as f64, dy as f64).normalize();
    direction * (COHESION_STRENGTH * neighbor.water())
}

fn apply_viscosity(v: &mut Vector2) {
    const VISCOSITY_DAMPING: f64 = 0.98;
    *v *= VISCOSITY_DAMPING;
}

/// A cell less dense than a neighbor it is adjacent to (vertically) rises
/// relative to it; the reverse sinks. Horizontal neighbors contribute no
/// buoyancy.
fn buoyancy(cell: &Cell, neighbor: &Cell, dx: i64, dy: i64) -> Vector2 {
    if dx != 0 || dy == 0 {
        return Vector2::ZERO;
    }
    const BUOYANCY_STRENGTH: f64 = 0.01;
    let density_diff = neighbor.effective_density() - cell.effective_density();
    // dy > 0 means neighbor is below; being lighter than what's below you
    // pushes you up (negative y).
    Vector2::new(0.0, -density_diff * BUOYANCY_STRENGTH * dy.signum() as f64)
}

pub fn apply_physics(
    params: &RulesAParams,
    cell: &mut Cell,
    x: u32,
    y: u32,
    dt: f64,
    cells: &[Cell],
    width: u32,
    height: u32,
) {
    if cell.is_wall() {
        return;
    }

    cell.velocity.y += params.gravity * dt;

    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if !is_within_bounds(nx, ny, width, height) {
                continue;
            }
            let neighbor = &cells[ny as usize * width as usize + nx as usize];
            if cell.water() >= MIN_DIRT_THRESHOLD {
                cell.velocity += water_cohesion(neighbor, dx, dy) * dt;
                apply_viscosity(&mut cell.velocity);
            }
            cell.velocity += buoyancy(cell, neighbor, dx, dy) * dt;
        }
    }

    // Integrate the velocity accumulated above into the COM offset. A
    // per-axis clamp to the reflection bound (not the dead zone) keeps a
    // single step from driving the COM further than the invariant allows
    // while still letting it cross COM_DEFLECTION_THRESHOLD so
    // should_transfer can fire downstream this same step.
    cell.com += cell.velocity * dt;
    cell.com = cell.com.clamp_magnitude_per_axis(REFLECTION_THRESHOLD * COM_DEFLECTION_THRESHOLD);
}

pub fn update_pressures(params: &RulesAParams, cells: &[Cell], width: u32, height: u32, dt: f64) -> Vec<Pressure> {
    pressure::compute(params.pressure_system, cells, width, height, dt, params.gravity)
}

pub fn apply_pressure_forces(params: &RulesAParams, cell: &mut Cell, dt: f64) {
    if cell.is_empty() {
        return;
    }
    let threshold = if cell.water() > cell.dirt() {
        params.water_pressure_threshold
    } else {
        0.005
    };
    let magnitude = cell.pressure.total();
    if magnitude < threshold {
        return;
    }
    let force = cell.pressure.gradient.normalize() * magnitude * params.pressure_scale;
    cell.velocity += force * dt;

    let cap = if cell.water() > cell.dirt() { 4.0 } else { 8.0 };
    if cell.velocity.magnitude() > cap {
        cell.velocity = cell.velocity.normalize() * cap;
    }
}

pub fn should_transfer(cell: &Cell) -> bool {
    cell.com.x.abs() > COM_DEFLECTION_THRESHOLD || cell.com.y.abs() > COM_DEFLECTION_THRESHOLD
}

pub fn calculate_transfer_direction(cell: &Cell, x: u32, y: u32) -> TransferProposal {
    let mut proposal = TransferProposal {
        transfer_x: false,
        transfer_y: false,
        target_x: x as i64,
        target_y: y as i64,
        com_offset: Vector2::ZERO,
    };

    if cell.com.x > COM_DEFLECTION_THRESHOLD {
        proposal.transfer_x = true;
        proposal.target_x = x as i64 + 1;
        proposal.com_offset.x = clamp_com_to_dead_zone(calculate_natural_com(cell.com, 1, 0)).x;
    } else if cell.com.x < -COM_DEFLECTION_THRESHOLD {
        proposal.transfer_x = true;
        proposal.target_x = x as i64 - 1;
        proposal.com_offset.x = clamp_com_to_dead_zone(calculate_natural_com(cell.com, -1, 0)).x;
    }

    if cell.com.y > COM_DEFLECTION_THRESHOLD {
        proposal.transfer_y = true;
        proposal.target_y = y as i64 + 1;
        proposal.com_offset.y = clamp_com_to_dead_zone(calculate_natural_com(cell.com, 0, 1)).y;
    } else if cell.com.y < -COM_DEFLECTION_THRESHOLD {
        proposal.transfer_y = true;
        proposal.target_y = y as i64 - 1;
        proposal.com_offset.y = clamp_com_to_dead_zone(calculate_natural_com(cell.com, 0, -1)).y;
    }

    proposal
}

/// Reflects the axis/axes that attempted to transfer, in place. Used both
/// for an in-bounds collision against a full or wall cell and for a
/// boundary reflection off the grid edge.
pub fn handle_collision(params: &RulesAParams, cell: &mut Cell, transfer_x: bool, transfer_y: bool) {
    if transfer_x {
        cell.velocity.x = -cell.velocity.x * params.elasticity_factor;
        cell.com.x = cell.com.x.signum() * COM_DEFLECTION_THRESHOLD;
    }
    if transfer_y {
        cell.velocity.y = -cell.velocity.y * params.elasticity_factor;
        cell.com.y = cell.com.y.signum() * COM_DEFLECTION_THRESHOLD;
    }
}

pub fn check_excessive_deflection_reflection(params: &RulesAParams, cell: &mut Cell) {
    const REFLECTION_THRESHOLD: f64 = crate::cell::REFLECTION_THRESHOLD;
    let limit = REFLECTION_THRESHOLD * COM_DEFLECTION_THRESHOLD;
    if cell.com.x.abs() > limit {
        cell.velocity.x = -cell.velocity.x * params.elasticity_factor;
        cell.com.x = cell.com.x.signum() * COM_DEFLECTION_THRESHOLD;
    }
    if cell.com.y.abs() > limit {
        cell.velocity.y = -cell.velocity.y * params.elasticity_factor;
        cell.com.y = cell.com.y.signum() * COM_DEFLECTION_THRESHOLD;
    }
}

/// Radial impulse toward (attractor) or away from (repulsor) a cursor
/// position, falling off linearly with distance; applied at the World
/// level (not per-Rules), but the strength/radius constants are Rules
/// properties since they describe how "forceful" a given rule set's
/// interaction model is.
pub fn cursor_force(cell_pos: Vector2, cursor_pos: Vector2, is_repulsor: bool) -> Vector2 {
    let delta = cell_pos - cursor_pos;
    let distance = delta.magnitude();
    if distance >= CURSOR_FORCE_RADIUS || distance < f64::EPSILON {
        return Vector2::ZERO;
    }
    let falloff = 1.0 - (distance / CURSOR_FORCE_RADIUS);
    let direction = if is_repulsor { delta.normalize() } else { -delta.normalize() };
    direction * (CURSOR_FORCE_STRENGTH * falloff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialType;

    #[test]
    fn gravity_increases_downward_velocity() {
        let params = RulesAParams::default();
        let mut cell = Cell::with_material(MaterialType::Dirt, 1.0);
        let cells = vec![cell.clone()];
        apply_physics(&params, &mut cell, 0, 0, 0.016, &cells, 1, 1);
        assert!(cell.velocity.y > 0.0);
    }

    #[test]
    fn should_transfer_past_dead_zone() {
        let mut cell = Cell::new();
        cell.com = Vector2::new(1.01, 0.0);
        assert!(should_transfer(&cell));
        cell.com = Vector2::new(0.5, 0.5);
        assert!(!should_transfer(&cell));
    }

    #[test]
    fn transfer_direction_picks_positive_x_neighbor() {
        let mut cell = Cell::new();
        cell.com = Vector2::new(1.5, 0.0);
        let proposal = calculate_transfer_direction(&cell, 2, 2);
        assert!(proposal.transfer_x);
        assert!(!proposal.transfer_y);
        assert_eq!(proposal.target_x, 3);
    }

    #[test]
    fn collision_reflects_with_elasticity_factor() {
        let params = RulesAParams::default();
        let mut cell = Cell::new();
        cell.velocity.x = 2.0;
        cell.com.x = 1.5;
        handle_collision(&params, &mut cell, true, false);
        assert!((cell.velocity.x - (-2.0 * params.elasticity_factor)).abs() < 1e-12);
        assert_eq!(cell.com.x, COM_DEFLECTION_THRESHOLD);
    }
}
