//! Scenario setup is an external collaborator, not physics: it seeds the
//! grid and may periodically emit particles. The core only needs an
//! injectable trait object and a no-op default.

use serde::{Deserialize, Serialize};

use crate::material::MaterialType;
use crate::world::World;

pub trait ScenarioEmitter: Send {
    /// Called once, immediately after a fresh or resized grid is built.
    fn setup(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Called at the start of every `advance_time`, when particle
    /// addition is enabled; may deposit material into cells.
    fn emit(&mut self, world: &mut World, timestep: u32, dt: f64) {
        let _ = (world, timestep, dt);
    }

    fn scenario_id(&self) -> &str {
        "sandbox"
    }
}

/// The core's default: seeds nothing and emits nothing.
#[derive(Debug, Default)]
pub struct NoopScenario;

impl ScenarioEmitter for NoopScenario {}

/// The `scenario_config_set` knobs: which of the sandbox's built-in seed
/// patterns and periodic emitters are active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub quadrant_enabled: bool,
    pub water_column_enabled: bool,
    pub right_throw_enabled: bool,
    pub rain_rate: f64,
    pub walls_enabled: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            quadrant_enabled: false,
            water_column_enabled: false,
            right_throw_enabled: false,
            rain_rate: 0.0,
            walls_enabled: false,
        }
    }
}

const RIGHT_THROW_PERIOD: f64 = 0.83;

/// The sandbox's configurable demo scenario: fills a lower-right
/// quadrant and/or a left-side water column at setup, then periodically
/// throws dirt from the right wall and rains water from the top while
/// running, each gated by its own `ScenarioConfig` flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxScenario {
    config: ScenarioConfig,
    next_right_throw: f64,
    next_rain_drop: f64,
    elapsed: f64,
}

impl SandboxScenario {
    pub fn new(config: ScenarioConfig) -> Self {
        SandboxScenario { config, next_right_throw: RIGHT_THROW_PERIOD, next_rain_drop: 0.0, elapsed: 0.0 }
    }

    pub fn config(&self) -> ScenarioConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ScenarioConfig) {
        self.config = config;
    }

    fn fill_lower_right_quadrant(world: &mut World) {
        for y in world.height() / 2..world.height() {
            for x in world.width() / 2..world.width() {
                let _ = world.cell_set(x, y, MaterialType::Dirt, 1.0);
            }
        }
    }

    fn make_walls(world: &mut World) {
        let (w, h) = (world.width(), world.height());
        if w == 0 || h == 0 {
            return;
        }
        for x in 0..w {
            let _ = world.cell_set(x, h - 1, MaterialType::Wall, 1.0);
        }
        for y in 1..h.saturating_sub(1) {
            let _ = world.cell_set(0, y, MaterialType::Wall, 1.0);
            let _ = world.cell_set(w - 1, y, MaterialType::Wall, 1.0);
        }
    }

    fn fill_water_column(world: &mut World) {
        for y in 0..world.height() {
            let _ = world.cell_set(0, y, MaterialType::Water, 1.0);
            if world.width() > 1 {
                let _ = world.cell_set(1, y, MaterialType::Water, 1.0);
            }
        }
    }
}

impl ScenarioEmitter for SandboxScenario {
    fn setup(&mut self, world: &mut World) {
        if self.config.quadrant_enabled {
            Self::fill_lower_right_quadrant(world);
        }
        if self.config.water_column_enabled {
            Self::fill_water_column(world);
        }
        if self.config.walls_enabled {
            Self::make_walls(world);
        }
        self.next_right_throw = RIGHT_THROW_PERIOD;
        self.next_rain_drop = 0.0;
        self.elapsed = 0.0;
    }

    fn emit(&mut self, world: &mut World, _timestep: u32, dt: f64) {
        self.elapsed += dt;

        if self.config.right_throw_enabled && self.elapsed >= self.next_right_throw && world.width() > 2 {
            let center_y = world.height() / 2;
            let x = world.width() - 3;
            let _ = world.cell_set(x, center_y, MaterialType::Dirt, 1.0);
            self.next_right_throw += RIGHT_THROW_PERIOD;
        }

        if self.config.rain_rate > 0.0 && self.elapsed >= self.next_rain_drop && world.width() > 2 {
            // The original draws the drop column from a normal
            // distribution; a uniform spread across the top row keeps
            // this deterministic without a rand::Rng dependency here.
            let x = 1 + (world.timestep() as u32 % (world.width() - 2).max(1));
            if let Some(existing) = world.cell(x, 1) {
                let fill = (existing.water() + 0.8).min(1.0);
                let _ = world.cell_set(x, 1, MaterialType::Water, fill);
            }
            self.next_rain_drop = self.elapsed + 1.0 / self.config.rain_rate;
        }
    }

    fn scenario_id(&self) -> &str {
        "sandbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    #[test]
    fn noop_scenario_leaves_world_untouched() {
        let mut world = World::new(2, 2);
        let mut scenario = NoopScenario;
        scenario.emit(&mut world, 0, 0.016);
        assert_eq!(world.total_mass(), 0.0);
    }

    #[test]
    fn sandbox_scenario_quadrant_seeds_dirt() {
        let config = ScenarioConfig { quadrant_enabled: true, ..ScenarioConfig::default() };
        let mut world = World::with_scenario(4, 4, Box::new(SandboxScenario::new(config)));
        assert!(world.cell(3, 3).unwrap().dirt() > 0.0);
        assert_eq!(world.cell(0, 0).unwrap().percent_full(), 0.0);
    }

    #[test]
    fn sandbox_scenario_walls_seed_border() {
        let config = ScenarioConfig { walls_enabled: true, ..ScenarioConfig::default() };
        let mut world = World::with_scenario(3, 3, Box::new(SandboxScenario::new(config)));
        assert!(world.cell(0, 1).unwrap().is_wall());
        assert!(world.cell(1, 2).unwrap().is_wall());
    }

    #[test]
    fn sandbox_scenario_right_throw_emits_on_schedule() {
        let config = ScenarioConfig { right_throw_enabled: true, ..ScenarioConfig::default() };
        let mut scenario = SandboxScenario::new(config);
        let mut world = World::new(5, 5);
        scenario.emit(&mut world, 0, 0.9);
        assert!(world.total_mass() > 0.0);
    }
}
