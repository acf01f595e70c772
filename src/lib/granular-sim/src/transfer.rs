//! The transfer engine: proposal, then atomic commit. A proposal pass
//! scans every cell once (an arena allocated at the start of the phase
//! and cleared, never freed, between steps — see `World::advance_time`),
//! converting any proposal that targets an out-of-bounds or overfull
//! destination into an in-place reflection rather than enqueuing it.
//! Queued moves are replayed in a second pass so that no handler ever
//! observes a partially committed step.

use crate::cell::{Cell, MIN_DIRT_THRESHOLD, TRANSFER_FACTOR};
use crate::error::TransferError;
use crate::material::MaterialType;
use crate::rules::{is_within_bounds, Rules};
use crate::vector::Vector2;

const OVERFULL_THRESHOLD: f64 = 0.95;

/// Checks whether `(target_x, target_y)` can receive a transfer: in
/// bounds, not a Wall, not already at/above `OVERFULL_THRESHOLD`. Every
/// rejection is consumed entirely inside `propose_transfers`, converted
/// into an in-place reflection; `TransferError` never escapes this
/// module.
fn validate_target(
    cells: &[Cell],
    target_x: i64,
    target_y: i64,
    width: u32,
    height: u32,
) -> Result<(u32, u32), TransferError> {
    if !is_within_bounds(target_x, target_y, width, height) {
        return Err(TransferError::OutOfBounds(target_x, target_y));
    }
    let tx = target_x as u32;
    let ty = target_y as u32;
    let idx = coord_to_index(tx, ty, width);
    if cells[idx].is_wall() {
        return Err(TransferError::TargetIsWall(tx, ty));
    }
    if cells[idx].percent_full() >= OVERFULL_THRESHOLD {
        return Err(TransferError::TargetFull(tx, ty));
    }
    Ok((tx, ty))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirtMove {
    pub from_x: u32,
    pub from_y: u32,
    pub to_x: u32,
    pub to_y: u32,
    pub fraction: f64,
    pub com_offset: Vector2,
}

fn coord_to_index(x: u32, y: u32, width: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Scans every cell, enqueuing a `DirtMove` for any cell whose COM has
/// left the dead zone toward an open, in-bounds destination; cells whose
/// proposed destination is out of bounds or already at/above
/// `OVERFULL_THRESHOLD` are reflected in place instead.
pub fn propose_transfers(
    rules: &Rules,
    cells: &mut [Cell],
    width: u32,
    height: u32,
    dirt_fragmentation_factor: f64,
    moves: &mut Vec<DirtMove>,
) {
    moves.clear();

    for y in 0..height {
        for x in 0..width {
            let idx = coord_to_index(x, y, width);
            if cells[idx].is_wall() || cells[idx].is_empty() {
                continue;
            }
            if !rules.should_transfer(&cells[idx]) {
                continue;
            }

            let proposal = rules.calculate_transfer_direction(&cells[idx], x, y);
            if !proposal.transfer_x && !proposal.transfer_y {
                continue;
            }

            let (to_x, to_y) = match validate_target(cells, proposal.target_x, proposal.target_y, width, height) {
                Ok(target) => target,
                Err(TransferError::OutOfBounds(..)) => {
                    rules.handle_boundary_reflection(&mut cells[idx], proposal.transfer_x, proposal.transfer_y);
                    continue;
                }
                Err(TransferError::TargetIsWall(..)) | Err(TransferError::TargetFull(..)) => {
                    rules.handle_collision(&mut cells[idx], proposal.transfer_x, proposal.transfer_y);
                    continue;
                }
            };

            let mass_to_move = cells[idx].percent_full() * TRANSFER_FACTOR * (1.0 - dirt_fragmentation_factor);
            let fraction = (mass_to_move / cells[idx].percent_full()).clamp(0.0, 1.0);

            moves.push(DirtMove {
                from_x: x,
                from_y: y,
                to_x,
                to_y,
                fraction,
                com_offset: proposal.com_offset,
            });
        }
    }
}

/// Replays queued moves atomically, folding any residual below
/// `MIN_DIRT_THRESHOLD` into `removed_mass`. Drains `moves` rather than
/// consuming it so the caller's arena keeps its allocation across steps.
pub fn commit_transfers(moves: &mut Vec<DirtMove>, cells: &mut [Cell], width: u32, removed_mass: &mut f64) {
    for mv in moves.drain(..) {
        let from_idx = coord_to_index(mv.from_x, mv.from_y, width);
        let to_idx = coord_to_index(mv.to_x, mv.to_y, width);

        if cells[from_idx].is_empty() {
            // Already cleaned up by an earlier move this step (shouldn't
            // happen since each cell proposes at most once, but guards
            // against a cell being both a source and, via another cell's
            // move, emptied before its own move replays).
            continue;
        }

        let source_mass = cells[from_idx].percent_full();
        let dest_mass_before = cells[to_idx].percent_full();

        let mut moved = [0.0_f64; crate::material::MATERIAL_COUNT];
        for m in MaterialType::ALL {
            let amount = cells[from_idx].get(m) * mv.fraction;
            moved[m.index()] = amount;
        }

        for m in MaterialType::ALL {
            let amount = moved[m.index()];
            if amount > 0.0 {
                cells[to_idx].add(m, amount);
            }
        }
        cells[to_idx].com = mv.com_offset;
        let total_mass = source_mass + dest_mass_before;
        if total_mass > f64::EPSILON {
            let source_velocity = cells[from_idx].velocity;
            let dest_velocity = cells[to_idx].velocity;
            cells[to_idx].velocity =
                (source_velocity * source_mass + dest_velocity * dest_mass_before) / total_mass;
        }

        for m in MaterialType::ALL {
            let amount = moved[m.index()];
            if amount > 0.0 {
                cells[from_idx].add(m, -amount);
            }
        }
        cells[from_idx].com *= 1.0 - mv.fraction;
        cells[from_idx].velocity *= 1.0 - mv.fraction;

        if cells[from_idx].percent_full() < MIN_DIRT_THRESHOLD {
            *removed_mass += cells[from_idx].percent_full();
            cells[from_idx].clear();
        }
    }
}

/// Invariant I2 enforcement: any cell whose COM escaped the dead zone
/// beyond `REFLECTION_THRESHOLD` (multiple forces piling onto a cell that
/// also failed to transfer) is snapped back and its velocity reflected.
pub fn check_excessive_deflection(rules: &Rules, cells: &mut [Cell]) {
    for cell in cells.iter_mut() {
        if !cell.is_wall() {
            rules.check_excessive_deflection_reflection(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rules;

    #[test]
    fn transfer_conserves_mass_between_two_cells() {
        let rules = Rules::a();
        let mut cells = vec![Cell::new(), Cell::new()];
        cells[0].set(MaterialType::Dirt, 1.0);
        cells[0].com = Vector2::new(1.5, 0.0);
        let total_before: f64 = cells.iter().map(|c| c.percent_full()).sum();

        let mut moves = Vec::new();
        propose_transfers(&rules, &mut cells, 2, 1, 0.0, &mut moves);
        assert_eq!(moves.len(), 1);
        let mut removed = 0.0;
        commit_transfers(&mut moves, &mut cells, 2, &mut removed);

        let total_after: f64 = cells.iter().map(|c| c.percent_full()).sum::<f64>() + removed;
        assert!((total_after - total_before).abs() < 1e-9);
        assert!(cells[1].percent_full() > 0.0);
    }

    #[test]
    fn validate_target_reports_each_rejection_reason() {
        let mut cells = vec![Cell::new(), Cell::with_material(MaterialType::Wall, 1.0)];
        cells[1].set(MaterialType::Wall, 1.0);
        assert_eq!(validate_target(&cells, 1, 0, 2, 1), Err(TransferError::TargetIsWall(1, 0)));
        assert_eq!(validate_target(&cells, 2, 0, 2, 1), Err(TransferError::OutOfBounds(2, 0)));

        cells[1].clear();
        cells[1].set(MaterialType::Dirt, 0.99);
        assert_eq!(validate_target(&cells, 1, 0, 2, 1), Err(TransferError::TargetFull(1, 0)));

        cells[1].clear();
        assert_eq!(validate_target(&cells, 1, 0, 2, 1), Ok((1, 0)));
    }

    #[test]
    fn transfer_into_wall_is_converted_to_collision() {
        let rules = Rules::a();
        let mut cells = vec![Cell::new(), Cell::with_material(MaterialType::Wall, 1.0)];
        cells[0].set(MaterialType::Dirt, 1.0);
        cells[0].com = Vector2::new(1.5, 0.0);
        cells[0].velocity.x = 2.0;

        let mut moves = Vec::new();
        propose_transfers(&rules, &mut cells, 2, 1, 0.0, &mut moves);
        assert!(moves.is_empty());
        assert!(cells[0].velocity.x < 0.0, "velocity should have reflected");
    }

    #[test]
    fn small_residual_is_folded_into_removed_mass() {
        let rules = Rules::a();
        let mut cells = vec![Cell::new(), Cell::new()];
        cells[0].set(MaterialType::Dirt, 0.015);
        cells[0].com = Vector2::new(1.5, 0.0);

        let mut moves = Vec::new();
        propose_transfers(&rules, &mut cells, 2, 1, 0.0, &mut moves);
        let mut removed = 0.0;
        commit_transfers(&mut moves, &mut cells, 2, &mut removed);
        assert!(cells[0].is_empty());
    }
}
