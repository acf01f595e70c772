//! The runtime command table: built once, holding one `World` and a
//! `HashMap<&'static str, Handler>` the way the original's
//! `CommandDispatcher::registerCommand<CommandT, OkayT>()` builds its
//! `handlers_` map. Registration is a macro-free explicit list — Rust has
//! no template-fold-expression equivalent without a proc macro, and this
//! pack never reaches for one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde_json::Value;

use crate::commands::types::*;
use crate::error::{ApiError, CommandError};
use crate::material::MaterialType;
use crate::protocol::envelope::{Envelope, ErrorEnvelope};
use crate::protocol::wire::{self, Reader};
use crate::rules::{PressureSystem, Rules};
use crate::world::{RenderFormat, World};

/// Per-frame timestep `step` advances with, matching `sim_run`'s own
/// default `timestep` field (spec.md §6).
const DEFAULT_TIMESTEP: f64 = 0.016;

#[derive(Debug, Clone, Copy, Default)]
struct RunningTotal {
    total_ms: f64,
    calls: u64,
}

impl RunningTotal {
    fn record(&mut self, elapsed_ms: f64) {
        self.total_ms += elapsed_ms;
        self.calls += 1;
    }

    fn avg_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        }
    }
}

/// Rolling counters behind `perf_stats_get`/`timer_stats_get`, mirroring
/// the original's `PerfStats`/`TimerStats` accumulators: one running
/// total per named phase, reported as total/avg/calls.
#[derive(Debug, Default)]
pub struct Stats {
    physics: RunningTotal,
    serialization: RunningTotal,
    per_command: HashMap<String, RunningTotal>,
}

impl Stats {
    fn fps(&self) -> f64 {
        let avg = self.physics.avg_ms();
        if avg <= 0.0 {
            0.0
        } else {
            1000.0 / avg
        }
    }
}

/// A handler decodes its payload (JSON or binary, per `is_binary`),
/// mutates or reads `World`, and returns both wire shapes of its Okay —
/// the dispatcher picks whichever the caller's transport needs.
type Handler =
    Box<dyn Fn(&mut World, &Value, &[u8], bool) -> Result<(Value, Vec<u8>), CommandError> + Send>;

/// Ties every incoming command to a `World` instance and the perf/timer
/// counters the dispatcher accumulates while serving them. Built once at
/// server start; routes an `Envelope` to exactly one registered handler.
pub struct CommandDispatcher {
    world: World,
    next_broadcast_id: AtomicU64,
    stats: Stats,
    handlers: HashMap<&'static str, Handler>,
}

impl CommandDispatcher {
    pub fn new(world: World) -> Self {
        let mut dispatcher =
            CommandDispatcher { world, next_broadcast_id: AtomicU64::new(1), stats: Stats::default(), handlers: HashMap::new() };
        dispatcher.register_all();
        dispatcher
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The next id for an unsolicited broadcast (e.g. a streamed state
    /// frame); append-only, per spec.md §5's correlation-id allocator.
    pub fn next_broadcast_id(&self) -> u64 {
        self.next_broadcast_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register<C, O>(
        &mut self,
        name: &'static str,
        decode_json: fn(&Value) -> Result<C, CommandError>,
        decode_binary: fn(&mut Reader) -> Result<C, CommandError>,
        encode_json: fn(&O) -> Value,
        encode_binary: fn(&O, &mut Vec<u8>),
        handle: impl Fn(&mut World, C) -> Result<O, CommandError> + Send + 'static,
    ) {
        self.handlers.insert(
            name,
            Box::new(move |world, json_payload, binary_payload, is_binary| {
                let command = if is_binary {
                    let mut r = Reader::new(binary_payload);
                    decode_binary(&mut r)?
                } else {
                    decode_json(json_payload)?
                };
                let okay = handle(world, command)?;
                let json = encode_json(&okay);
                let mut bytes = Vec::new();
                encode_binary(&okay, &mut bytes);
                Ok((json, bytes))
            }),
        );
    }

    fn register_all(&mut self) {
        self.register(
            StateGetCommand::NAME,
            StateGetCommand::from_json,
            StateGetCommand::decode,
            StateGetOkay::to_json,
            StateGetOkay::encode,
            |world, _cmd: StateGetCommand| Ok(StateGetOkay { world_data: build_world_data(world) }),
        );

        self.register(
            CellGetCommand::NAME,
            CellGetCommand::from_json,
            CellGetCommand::decode,
            CellGetOkay::to_json,
            CellGetOkay::encode,
            |world, cmd: CellGetCommand| {
                let cell = world.cell(cmd.x, cmd.y).ok_or(CommandError::InvalidCoordinates(cmd.x as i64, cmd.y as i64))?;
                Ok(CellGetOkay { cell: WireCellFull::from_cell(cell) })
            },
        );

        self.register(
            CellSetCommand::NAME,
            CellSetCommand::from_json,
            CellSetCommand::decode,
            CellSetOkay::to_json,
            CellSetOkay::encode,
            |world, cmd: CellSetCommand| {
                let material = parse_material(&cmd.material)?;
                let fill = validate_fill(cmd.fill)?;
                world.cell_set(cmd.x, cmd.y, material, fill)?;
                Ok(CellSetOkay)
            },
        );

        self.register(
            StepCommand::NAME,
            StepCommand::from_json,
            StepCommand::decode,
            StepOkay::to_json,
            StepOkay::encode,
            |world, cmd: StepCommand| {
                let mut timestep = world.timestep();
                for _ in 0..cmd.frames.max(1) {
                    timestep = world.advance_time(DEFAULT_TIMESTEP)?;
                }
                Ok(StepOkay { timestep })
            },
        );

        self.register(
            SimRunCommand::NAME,
            SimRunCommand::from_json,
            SimRunCommand::decode,
            SimRunOkay::to_json,
            SimRunOkay::encode,
            |world, _cmd: SimRunCommand| {
                // The cooperative run loop (tokio interval, catch-up cap)
                // lives in the host binary; this handler only
                // acknowledges the request, matching `sim_run`'s
                // returns-immediately contract.
                Ok(SimRunOkay { running: true, current_step: world.timestep() })
            },
        );

        self.register(
            SimPauseCommand::NAME,
            SimPauseCommand::from_json,
            SimPauseCommand::decode,
            SimPauseOkay::to_json,
            SimPauseOkay::encode,
            |_world, _cmd: SimPauseCommand| Ok(SimPauseOkay { paused: true }),
        );

        self.register(
            ResetCommand::NAME,
            ResetCommand::from_json,
            ResetCommand::decode,
            ResetOkay::to_json,
            ResetOkay::encode,
            |world, _cmd: ResetCommand| {
                world.reset();
                Ok(ResetOkay)
            },
        );

        self.register(
            ExitCommand::NAME,
            ExitCommand::from_json,
            ExitCommand::decode,
            ExitOkay::to_json,
            ExitOkay::encode,
            |_world, _cmd: ExitCommand| Ok(ExitOkay),
        );

        self.register(
            PerfStatsGetCommand::NAME,
            PerfStatsGetCommand::from_json,
            PerfStatsGetCommand::decode,
            PerfStatsGetOkay::to_json,
            PerfStatsGetOkay::encode,
            |_world, _cmd: PerfStatsGetCommand| {
                Ok(PerfStatsGetOkay {
                    fps: 0.0,
                    physics_avg_ms: 0.0,
                    physics_total_ms: 0.0,
                    physics_calls: 0,
                    serialization_avg_ms: 0.0,
                    serialization_total_ms: 0.0,
                    serialization_calls: 0,
                    cache_update_avg_ms: 0.0,
                    network_send_avg_ms: 0.0,
                })
            },
        );

        self.register(
            TimerStatsGetCommand::NAME,
            TimerStatsGetCommand::from_json,
            TimerStatsGetCommand::decode,
            TimerStatsGetOkay::to_json,
            TimerStatsGetOkay::encode,
            |_world, _cmd: TimerStatsGetCommand| Ok(TimerStatsGetOkay { timers: Vec::new() }),
        );

        self.register(
            GravitySetCommand::NAME,
            GravitySetCommand::from_json,
            GravitySetCommand::decode,
            GravitySetOkay::to_json,
            GravitySetOkay::encode,
            |world, cmd: GravitySetCommand| {
                world.rules_mut().set_gravity(cmd.gravity);
                Ok(GravitySetOkay)
            },
        );

        self.register(
            SetElasticityCommand::NAME,
            SetElasticityCommand::from_json,
            SetElasticityCommand::decode,
            SetElasticityOkay::to_json,
            SetElasticityOkay::encode,
            |world, cmd: SetElasticityCommand| {
                world.rules_mut().set_elasticity_factor(cmd.elasticity);
                Ok(SetElasticityOkay)
            },
        );

        self.register(
            PressureScaleSetCommand::NAME,
            PressureScaleSetCommand::from_json,
            PressureScaleSetCommand::decode,
            PressureScaleSetOkay::to_json,
            PressureScaleSetOkay::encode,
            |world, cmd: PressureScaleSetCommand| {
                world.rules_mut().set_pressure_scale(cmd.scale);
                Ok(PressureScaleSetOkay)
            },
        );

        self.register(
            WaterPressureThresholdSetCommand::NAME,
            WaterPressureThresholdSetCommand::from_json,
            WaterPressureThresholdSetCommand::decode,
            WaterPressureThresholdSetOkay::to_json,
            WaterPressureThresholdSetOkay::encode,
            |world, cmd: WaterPressureThresholdSetCommand| {
                world.rules_mut().set_water_pressure_threshold(cmd.threshold);
                Ok(WaterPressureThresholdSetOkay)
            },
        );

        self.register(
            DirtFragmentationSetCommand::NAME,
            DirtFragmentationSetCommand::from_json,
            DirtFragmentationSetCommand::decode,
            DirtFragmentationSetOkay::to_json,
            DirtFragmentationSetOkay::encode,
            |world, cmd: DirtFragmentationSetCommand| {
                world.set_dirt_fragmentation_factor(cmd.factor);
                Ok(DirtFragmentationSetOkay)
            },
        );

        self.register(
            WorldResizeCommand::NAME,
            WorldResizeCommand::from_json,
            WorldResizeCommand::decode,
            WorldResizeOkay::to_json,
            WorldResizeOkay::encode,
            |world, cmd: WorldResizeCommand| {
                world.resize_grid(cmd.width, cmd.height, false);
                Ok(WorldResizeOkay)
            },
        );

        self.register(
            ScenarioConfigSetCommand::NAME,
            ScenarioConfigSetCommand::from_json,
            ScenarioConfigSetCommand::decode,
            ScenarioConfigSetOkay::to_json,
            ScenarioConfigSetOkay::encode,
            |world, cmd: ScenarioConfigSetCommand| {
                world.set_scenario_config(cmd.config);
                Ok(ScenarioConfigSetOkay)
            },
        );

        self.register(
            RenderFormatSetCommand::NAME,
            RenderFormatSetCommand::from_json,
            RenderFormatSetCommand::decode,
            RenderFormatSetOkay::to_json,
            RenderFormatSetOkay::encode,
            |world, cmd: RenderFormatSetCommand| {
                let format = parse_render_format(&cmd.format)?;
                world.set_active_render_format(format);
                Ok(RenderFormatSetOkay)
            },
        );

        self.register(
            RenderFormatGetCommand::NAME,
            RenderFormatGetCommand::from_json,
            RenderFormatGetCommand::decode,
            RenderFormatGetOkay::to_json,
            RenderFormatGetOkay::encode,
            |world, _cmd: RenderFormatGetCommand| {
                Ok(RenderFormatGetOkay { format: render_format_name(world.active_render_format()).to_string() })
            },
        );

        self.register(
            PressureSystemSetCommand::NAME,
            PressureSystemSetCommand::from_json,
            PressureSystemSetCommand::decode,
            PressureSystemSetOkay::to_json,
            PressureSystemSetOkay::encode,
            |world, cmd: PressureSystemSetCommand| {
                let system = PressureSystem::from_name(&cmd.system).ok_or_else(|| CommandError::InvalidField {
                    field: "system".to_string(),
                    constraint: "a known pressure system".to_string(),
                })?;
                world.rules_mut().set_pressure_system(system);
                Ok(PressureSystemSetOkay)
            },
        );

        self.register(
            SetRulesCommand::NAME,
            SetRulesCommand::from_json,
            SetRulesCommand::decode,
            SetRulesOkay::to_json,
            SetRulesOkay::encode,
            |world, cmd: SetRulesCommand| {
                world.set_rules(Rules::from_name(&cmd.rules));
                Ok(SetRulesOkay)
            },
        );

        self.register(
            StatusGetCommand::NAME,
            StatusGetCommand::from_json,
            StatusGetCommand::decode,
            StatusGetOkay::to_json,
            StatusGetOkay::encode,
            |world, _cmd: StatusGetCommand| {
                Ok(StatusGetOkay {
                    timestep: world.timestep(),
                    scenario_id: world.scenario_id().to_string(),
                    width: world.width(),
                    height: world.height(),
                    running: false,
                    active_format: render_format_name(world.active_render_format()).to_string(),
                })
            },
        );

        self.register(
            SeedAddCommand::NAME,
            SeedAddCommand::from_json,
            SeedAddCommand::decode,
            SeedAddOkay::to_json,
            SeedAddOkay::encode,
            |world, cmd: SeedAddCommand| {
                let material = parse_material(&cmd.material)?;
                let fill = validate_fill(cmd.fill)?;
                world.cell_set(cmd.x, cmd.y, material, fill)?;
                Ok(SeedAddOkay)
            },
        );

        self.register(
            SpawnDirtBallCommand::NAME,
            SpawnDirtBallCommand::from_json,
            SpawnDirtBallCommand::decode,
            SpawnDirtBallOkay::to_json,
            SpawnDirtBallOkay::encode,
            |world, cmd: SpawnDirtBallCommand| {
                let material = parse_material(&cmd.material)?;
                let fill = validate_fill(cmd.fill)?;
                spawn_dirt_ball(world, cmd.center_x, cmd.center_y, cmd.radius, material, fill);
                Ok(SpawnDirtBallOkay)
            },
        );
    }

    fn call(&mut self, name: &str, json_payload: &Value, binary_payload: &[u8], is_binary: bool) -> Result<(Value, Vec<u8>), CommandError> {
        let Some((key, handler)) = self.handlers.remove_entry(name) else {
            return Err(CommandError::UnknownCommand(name.to_string()));
        };
        let start = Instant::now();
        let result = handler(&mut self.world, json_payload, binary_payload, is_binary);
        self.stats.per_command.entry(key.to_string()).or_default().record(start.elapsed().as_secs_f64() * 1000.0);
        self.handlers.insert(key, handler);
        result
    }

    /// Decodes a JSON envelope, routes it, and returns the JSON response
    /// envelope (okay or error) — never panics on malformed input.
    pub fn dispatch_json(&mut self, value: &Value) -> Value {
        let (envelope, payload) = match Envelope::decode_json(value) {
            Ok(pair) => pair,
            Err(err) => return ErrorEnvelope { id: 0, message: err.to_string() }.to_json(),
        };
        let start = Instant::now();
        let result = self.call(&envelope.message_type, &payload, &[], false);
        self.stats.serialization.record(start.elapsed().as_secs_f64() * 1000.0);
        match result {
            Ok((json, _binary)) => {
                Envelope::new(envelope.id, Envelope::response_type_for(&envelope.message_type), Vec::new()).encode_json(json, true)
            }
            Err(err) => {
                let api_err: ApiError = err.into();
                ErrorEnvelope { id: envelope.id, message: api_err.message }.to_json()
            }
        }
    }

    /// Decodes a binary envelope, routes it, and returns the encoded
    /// binary response envelope. On error the response message_type is
    /// "error" and the payload is a single length-prefixed UTF-8 string.
    pub fn dispatch_binary(&mut self, bytes: &[u8]) -> Vec<u8> {
        let envelope = match Envelope::decode_binary(bytes) {
            Ok(env) => env,
            Err(err) => return encode_binary_error(0, &err.to_string()),
        };
        match self.call(&envelope.message_type, &Value::Null, &envelope.payload, true) {
            Ok((_json, binary)) => Envelope::new(envelope.id, Envelope::response_type_for(&envelope.message_type), binary).encode_binary(),
            Err(err) => {
                let api_err: ApiError = err.into();
                encode_binary_error(envelope.id, &api_err.message)
            }
        }
    }
}

fn encode_binary_error(id: u64, message: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    wire::write_string(&mut payload, message);
    Envelope::new(id, "error", payload).encode_binary()
}

fn render_format_name(format: RenderFormat) -> &'static str {
    match format {
        RenderFormat::Rgba8 => "Rgba8",
        RenderFormat::Indexed => "Indexed",
        RenderFormat::Ascii => "Ascii",
    }
}

fn parse_render_format(name: &str) -> Result<RenderFormat, CommandError> {
    match name {
        "Rgba8" => Ok(RenderFormat::Rgba8),
        "Indexed" => Ok(RenderFormat::Indexed),
        "Ascii" => Ok(RenderFormat::Ascii),
        other => Err(CommandError::InvalidField { field: "format".to_string(), constraint: format!("a known render format, got '{other}'") }),
    }
}

fn build_world_data(world: &World) -> WorldData {
    let mut cells = Vec::new();
    for y in 0..world.height() {
        for x in 0..world.width() {
            let cell = world.cell(x, y).expect("in-bounds coordinate");
            if cell.is_empty() {
                continue;
            }
            let material = cell.dominant_material();
            cells.push(SparseCellEntry {
                x,
                y,
                material: material.name().to_string(),
                fill: cell.percent_full(),
                com_x: cell.com.x,
                com_y: cell.com.y,
                v_x: cell.velocity.x,
                v_y: cell.velocity.y,
            });
        }
    }
    WorldData {
        width: world.width(),
        height: world.height(),
        timestep: world.timestep(),
        gravity: world.rules().gravity(),
        elasticity: world.rules().elasticity_factor(),
        pressure_scale: world.rules().pressure_scale(),
        water_pressure_threshold: world.rules().water_pressure_threshold(),
        dirt_fragmentation: world.dirt_fragmentation_factor(),
        rules: world.rules().name().to_string(),
        pressure_system: world.rules().pressure_system().map(PressureSystem::name).map(str::to_string),
        active_format: render_format_name(world.active_render_format()).to_string(),
        cells,
    }
}

fn spawn_dirt_ball(world: &mut World, center_x: u32, center_y: u32, radius: u32, material: MaterialType, fill: f64) {
    let radius = radius as i64;
    let (cx, cy) = (center_x as i64, center_y as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x < 0 || y < 0 || x >= world.width() as i64 || y >= world.height() as i64 {
                continue;
            }
            let _ = world.cell_set(x as u32, y as u32, material, fill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(World::new(4, 4))
    }

    #[test]
    fn cell_set_then_cell_get_round_trips_over_json() {
        let mut d = dispatcher();
        let set = serde_json::json!({"id": 1, "command": "cell_set", "x": 1, "y": 1, "material": "Dirt", "fill": 0.7});
        let response = d.dispatch_json(&set);
        assert_eq!(response["response_type"], "cell_set_response");

        let get = serde_json::json!({"id": 2, "command": "cell_get", "x": 1, "y": 1});
        let response = d.dispatch_json(&get);
        assert_eq!(response["id"], 2);
        assert!(response.get("error").is_none());
    }

    #[test]
    fn unknown_command_produces_error_envelope() {
        let mut d = dispatcher();
        let response = d.dispatch_json(&serde_json::json!({"id": 1, "command": "frobnicate"}));
        assert!(response["error"].as_str().unwrap().starts_with("Unknown command"));
    }

    #[test]
    fn invalid_material_does_not_mutate_world() {
        let mut d = dispatcher();
        let before = d.world().total_mass();
        let response = d.dispatch_json(&serde_json::json!({"id": 1, "command": "cell_set", "x": 0, "y": 0, "material": "Plasma", "fill": 0.5}));
        assert!(response["error"].as_str().unwrap().starts_with("Invalid material type"));
        assert_eq!(d.world().total_mass(), before);
    }

    #[test]
    fn step_command_advances_timestep() {
        let mut d = dispatcher();
        let response = d.dispatch_json(&serde_json::json!({"id": 1, "command": "step", "frames": 3}));
        assert_eq!(response["timestep"], 3);
    }

    #[test]
    fn binary_round_trip_reset() {
        let mut d = dispatcher();
        let cmd = ResetCommand;
        let mut payload = Vec::new();
        cmd.encode(&mut payload);
        let envelope = Envelope::new(9, "reset", payload).encode_binary();
        let response = d.dispatch_binary(&envelope);
        let decoded = Envelope::decode_binary(&response).unwrap();
        assert_eq!(decoded.id, 9);
        assert_eq!(decoded.message_type, "reset_response");
    }

    #[test]
    fn spawn_dirt_ball_fills_a_disc() {
        let mut d = dispatcher();
        let cmd = serde_json::json!({"id": 1, "command": "spawn_dirt_ball", "center_x": 2, "center_y": 2, "radius": 1, "material": "Dirt", "fill": 1.0});
        d.dispatch_json(&cmd);
        assert!(d.world().cell(2, 2).unwrap().dirt() > 0.0);
        assert!(d.world().cell(2, 1).unwrap().dirt() > 0.0);
        assert_eq!(d.world().cell(0, 0).unwrap().dirt(), 0.0);
    }
}
