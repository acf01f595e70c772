//! The three interchangeable pressure generators. Each is a pure function
//! of `(cells, width, height, dt, gravity)` producing a freshly computed
//! pressure per cell — they share no state and are selected by
//! `PressureSystem`, built once as a small closed variant rather than a
//! trait object (see the module-level note in `rules/mod.rs`).

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Pressure, MIN_DIRT_THRESHOLD};
use crate::vector::Vector2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureSystem {
    Original,
    TopDown,
    IterativeSettling,
}

impl Default for PressureSystem {
    fn default() -> Self {
        PressureSystem::Original
    }
}

impl PressureSystem {
    pub fn name(self) -> &'static str {
        match self {
            PressureSystem::Original => "Original",
            PressureSystem::TopDown => "TopDown",
            PressureSystem::IterativeSettling => "IterativeSettling",
        }
    }

    pub fn from_name(name: &str) -> Option<PressureSystem> {
        Some(match name {
            "Original" => PressureSystem::Original,
            "TopDown" => PressureSystem::TopDown,
            "IterativeSettling" => PressureSystem::IterativeSettling,
            _ => return None,
        })
    }
}

fn index(x: i64, y: i64, width: u32, height: u32) -> Option<usize> {
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        None
    } else {
        Some(y as usize * width as usize + x as usize)
    }
}

pub fn compute(
    system: PressureSystem,
    cells: &[Cell],
    width: u32,
    height: u32,
    dt: f64,
    gravity: f64,
) -> Vec<Pressure> {
    match system {
        PressureSystem::Original => original(cells, width, height, dt),
        PressureSystem::TopDown => top_down(cells, width, height, dt, gravity),
        PressureSystem::IterativeSettling => iterative_settling(cells, width, height, dt, gravity),
    }
}

fn original(cells: &[Cell], width: u32, height: u32, dt: f64) -> Vec<Pressure> {
    let mut out = vec![Pressure::default(); cells.len()];
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let idx = index(x, y, width, height).unwrap();
            let cell = &cells[idx];
            if cell.percent_full() < MIN_DIRT_THRESHOLD {
                continue;
            }
            let d = cell.normalized_deflection();
            let m = cell.percent_full();
            if d.x.abs() > f64::EPSILON {
                if let Some(target) = index(x + d.x.signum() as i64, y, width, height) {
                    out[target].gradient.x += d.x * m * dt;
                    out[target].dynamic += (d.x * m * dt).abs();
                }
            }
            if d.y.abs() > f64::EPSILON {
                if let Some(target) = index(x, y + d.y.signum() as i64, width, height) {
                    out[target].gradient.y += d.y * m * dt;
                    out[target].dynamic += (d.y * m * dt).abs();
                }
            }
        }
    }
    out
}

fn top_down(cells: &[Cell], width: u32, height: u32, dt: f64, gravity: f64) -> Vec<Pressure> {
    let mut out = vec![Pressure::default(); cells.len()];
    let w = width as usize;
    let h = height as usize;

    for x in 0..w {
        let mut accumulated_mass = 0.0;
        for y in 0..h {
            let idx = y * w + x;
            let cell = &cells[idx];
            accumulated_mass += cell.percent_full();

            let hydrostatic = accumulated_mass * gravity * dt * 0.1;
            out[idx].gradient.y += hydrostatic;
            out[idx].hydrostatic += hydrostatic;

            let mut lateral = 0.0;
            for k in 0..=y {
                let above = &cells[k * w + x];
                let weight = 1.0 / (1.0 + 0.5 * (y - k) as f64);
                lateral += above.normalized_deflection().x * above.percent_full() * weight;
            }
            let lateral_contribution = lateral * dt * 0.05;
            out[idx].gradient.x += lateral_contribution;
            out[idx].dynamic += lateral_contribution.abs();
        }
    }

    // Second pass: propagate horizontal gradients between column neighbors
    // at the same row, using the freshly written pressure.y values.
    let snapshot_y: Vec<f64> = out.iter().map(|p| p.gradient.y).collect();
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            for nx in [x.checked_sub(1), Some(x + 1)].into_iter().flatten() {
                if nx >= w {
                    continue;
                }
                let nidx = y * w + nx;
                let delta = snapshot_y[idx] - snapshot_y[nidx];
                if delta.abs() > 1e-3 {
                    out[nidx].gradient.x += 0.1 * delta;
                    out[nidx].dynamic += (0.1 * delta).abs();
                }
            }
        }
    }

    out
}

fn iterative_settling(cells: &[Cell], width: u32, height: u32, dt: f64, gravity: f64) -> Vec<Pressure> {
    let w = width as usize;
    let h = height as usize;
    let n = 3;
    let pass_dt = dt / n as f64;

    let mut pressure = vec![Pressure::default(); cells.len()];

    for pass in 0..n {
        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let cell = &cells[idx];

                let mut pressure_from_above = 0.0;
                for k in 0..y {
                    let above = &cells[k * w + x];
                    pressure_from_above += above.percent_full() * gravity / (1.0 + 0.3 * (y - k) as f64);
                }
                let settling = pressure_from_above * pass_dt * (pass + 1) as f64 * 0.02;
                pressure[idx].gradient.y += settling;
                pressure[idx].hydrostatic += settling;

                let deflection = cell.normalized_deflection();
                let com_contribution = deflection * cell.percent_full() * pass_dt * 0.02;
                pressure[idx].gradient += com_contribution;
                pressure[idx].dynamic += com_contribution.magnitude();
            }
        }

        // lateral redistribution of vertical-pressure differences
        let snapshot_y: Vec<f64> = pressure.iter().map(|p| p.gradient.y).collect();
        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                for nx in [x.checked_sub(1), Some(x + 1)].into_iter().flatten() {
                    if nx >= w {
                        continue;
                    }
                    let nidx = y * w + nx;
                    let delta = snapshot_y[idx] - snapshot_y[nidx];
                    pressure[nidx].gradient.x += 0.1 * delta;
                }
            }
        }

        // smoothing stencil between passes (not after the last one)
        if pass + 1 < n {
            let snapshot: Vec<Vector2> = pressure.iter().map(|p| p.gradient).collect();
            for y in 0..h {
                for x in 0..w {
                    let idx = y * w + x;
                    let mut sum = snapshot[idx];
                    let mut count = 0;
                    for dy in -1i64..=1 {
                        for dx in -1i64..=1 {
                            if dx == 0 && dy == 0 {
                                continue;
                            }
                            if let Some(nidx) = index(x as i64 + dx, y as i64 + dy, width, height) {
                                sum += snapshot[nidx] * 0.3;
                                count += 1;
                            }
                        }
                    }
                    pressure[idx].gradient = sum / (1.0 + count as f64);
                }
            }
        }
    }

    pressure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialType;

    fn grid(w: u32, h: u32) -> Vec<Cell> {
        vec![Cell::new(); (w * h) as usize]
    }

    #[test]
    fn original_pushes_pressure_toward_deflection_side() {
        let mut cells = grid(3, 1);
        cells[1].set(MaterialType::Dirt, 1.0);
        cells[1].com = Vector2::new(0.5, 0.0);
        let out = compute(PressureSystem::Original, &cells, 3, 1, 0.016, 9.81);
        assert!(out[2].gradient.x > 0.0);
        assert_eq!(out[0].gradient.x, 0.0);
    }

    #[test]
    fn top_down_accumulates_hydrostatic_pressure_with_depth() {
        let mut cells = grid(1, 3);
        for c in cells.iter_mut() {
            c.set(MaterialType::Water, 1.0);
        }
        let out = compute(PressureSystem::TopDown, &cells, 1, 3, 0.016, 9.81);
        assert!(out[2].gradient.y > out[0].gradient.y);
    }

    #[test]
    fn iterative_settling_produces_finite_pressure() {
        let mut cells = grid(4, 4);
        for c in cells.iter_mut() {
            c.set(MaterialType::Sand, 0.8);
        }
        let out = compute(PressureSystem::IterativeSettling, &cells, 4, 4, 0.016, 9.81);
        assert!(out.iter().all(|p| p.gradient.x.is_finite() && p.gradient.y.is_finite()));
    }
}
