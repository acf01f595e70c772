//! One struct pair (`XyzCommand`, `XyzOkay`) per command named in
//! spec.md §6, plus the commands SPEC_FULL.md §4.4 restores from
//! `original_source`'s full `server/api/`/`ui/state-machine/api/`
//! surface. Each pair carries a stable wire `NAME`, a structural JSON
//! codec (thin wrappers over `serde_json`, matching the original's
//! `nlohmann::json` `toJson`/`fromJson`), and a compact binary codec
//! (ordered field writes via `protocol::wire`, the Rust analogue of the
//! original's non-reflective `zpp_bits` serializer).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::cell::Cell;
use crate::error::CommandError;
use crate::material::MaterialType;
use crate::protocol::wire::{self, Reader};
use crate::scenario::ScenarioConfig;

fn require_object(value: &Value) -> Result<&Map<String, Value>, CommandError> {
    value.as_object().ok_or(CommandError::NotAnObject)
}

fn invalid(field: &str, constraint: &str) -> CommandError {
    CommandError::InvalidField { field: field.to_string(), constraint: constraint.to_string() }
}

fn require_f64(obj: &Map<String, Value>, field: &str) -> Result<f64, CommandError> {
    obj.get(field).and_then(Value::as_f64).ok_or_else(|| invalid(field, "a number"))
}

fn require_u32(obj: &Map<String, Value>, field: &str) -> Result<u32, CommandError> {
    obj.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| invalid(field, "a non-negative integer"))
}

fn require_i64(obj: &Map<String, Value>, field: &str) -> Result<i64, CommandError> {
    obj.get(field).and_then(Value::as_i64).ok_or_else(|| invalid(field, "an integer"))
}

fn require_bool(obj: &Map<String, Value>, field: &str) -> Result<bool, CommandError> {
    obj.get(field).and_then(Value::as_bool).ok_or_else(|| invalid(field, "a boolean"))
}

fn require_string(obj: &Map<String, Value>, field: &str) -> Result<String, CommandError> {
    obj.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| invalid(field, "a string"))
}

fn optional_u32(obj: &Map<String, Value>, field: &str, default: u32) -> u32 {
    obj.get(field).and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok()).unwrap_or(default)
}

fn optional_i64(obj: &Map<String, Value>, field: &str, default: i64) -> i64 {
    obj.get(field).and_then(Value::as_i64).unwrap_or(default)
}

fn optional_f64(obj: &Map<String, Value>, field: &str, default: f64) -> f64 {
    obj.get(field).and_then(Value::as_f64).unwrap_or(default)
}

fn optional_bool(obj: &Map<String, Value>, field: &str, default: bool) -> bool {
    obj.get(field).and_then(Value::as_bool).unwrap_or(default)
}

fn optional_string(obj: &Map<String, Value>, field: &str, default: &str) -> String {
    obj.get(field).and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| default.to_string())
}

/// Parses a wire-level material name into `MaterialType`, surfacing the
/// exact error string spec.md §6 names: `"Invalid material type: <name>"`.
pub fn parse_material(name: &str) -> Result<MaterialType, CommandError> {
    MaterialType::from_name(name).ok_or_else(|| CommandError::InvalidMaterial(name.to_string()))
}

/// Validates a wire `fill` value against `[0,1]`, surfacing the exact
/// constraint-error shape spec.md §6 names for out-of-range fields.
pub fn validate_fill(fill: f64) -> Result<f64, CommandError> {
    if (0.0..=1.0).contains(&fill) {
        Ok(fill)
    } else {
        Err(invalid("fill", "in [0,1]"))
    }
}

/// Generates the boilerplate `NAME` const plus an always-empty
/// JSON/binary codec for commands and okays that carry no fields
/// (`reset`, `exit`, `sim_pause`'s command half, ...).
macro_rules! empty_payload {
    ($name:ident, $wire_name:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name;

        impl $name {
            pub const NAME: &'static str = $wire_name;

            pub fn to_json(&self) -> Value {
                json!({})
            }

            pub fn from_json(_value: &Value) -> Result<Self, CommandError> {
                Ok($name)
            }

            pub fn encode(&self, _out: &mut Vec<u8>) {}

            pub fn decode(_r: &mut Reader) -> Result<Self, CommandError> {
                Ok($name)
            }
        }
    };
}

/// Generates a single-`f64`-field command (the five scalar physics
/// setters in spec.md §6's "Recognized configuration" table) paired
/// with an empty okay.
macro_rules! scalar_setter {
    ($cmd:ident, $wire_name:expr, $field:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        pub struct $cmd {
            pub $field: f64,
        }

        impl $cmd {
            pub const NAME: &'static str = $wire_name;

            pub fn to_json(&self) -> Value {
                json!({ stringify!($field): self.$field })
            }

            pub fn from_json(value: &Value) -> Result<Self, CommandError> {
                let obj = require_object(value)?;
                Ok($cmd { $field: require_f64(obj, stringify!($field))? })
            }

            pub fn encode(&self, out: &mut Vec<u8>) {
                wire::write_f64(out, self.$field);
            }

            pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
                Ok($cmd { $field: r.read_f64()? })
            }
        }
    };
}

// --- state_get -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseCellEntry {
    pub x: u32,
    pub y: u32,
    pub material: String,
    pub fill: f64,
    pub com_x: f64,
    pub com_y: f64,
    pub v_x: f64,
    pub v_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldData {
    pub width: u32,
    pub height: u32,
    pub timestep: u32,
    pub gravity: f64,
    pub elasticity: f64,
    pub pressure_scale: f64,
    pub water_pressure_threshold: f64,
    pub dirt_fragmentation: f64,
    pub rules: String,
    pub pressure_system: Option<String>,
    pub active_format: String,
    pub cells: Vec<SparseCellEntry>,
}

empty_payload!(StateGetCommand, "state_get");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateGetOkay {
    pub world_data: WorldData,
}

impl StateGetOkay {
    pub const NAME: &'static str = "state_get";

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        serde_json::from_value(value.clone()).map_err(|e| CommandError::JsonParse(e.to_string()))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.world_data.width);
        wire::write_u32(out, self.world_data.height);
        wire::write_u32(out, self.world_data.timestep);
        wire::write_f64(out, self.world_data.gravity);
        wire::write_f64(out, self.world_data.elasticity);
        wire::write_f64(out, self.world_data.pressure_scale);
        wire::write_f64(out, self.world_data.water_pressure_threshold);
        wire::write_f64(out, self.world_data.dirt_fragmentation);
        wire::write_string(out, &self.world_data.rules);
        wire::write_string(out, self.world_data.pressure_system.as_deref().unwrap_or(""));
        wire::write_string(out, &self.world_data.active_format);
        wire::write_u32(out, self.world_data.cells.len() as u32);
        for cell in &self.world_data.cells {
            wire::write_u32(out, cell.x);
            wire::write_u32(out, cell.y);
            wire::write_string(out, &cell.material);
            wire::write_f64(out, cell.fill);
            wire::write_f64(out, cell.com_x);
            wire::write_f64(out, cell.com_y);
            wire::write_f64(out, cell.v_x);
            wire::write_f64(out, cell.v_y);
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        let width = r.read_u32()?;
        let height = r.read_u32()?;
        let timestep = r.read_u32()?;
        let gravity = r.read_f64()?;
        let elasticity = r.read_f64()?;
        let pressure_scale = r.read_f64()?;
        let water_pressure_threshold = r.read_f64()?;
        let dirt_fragmentation = r.read_f64()?;
        let rules = r.read_string()?;
        let pressure_system_raw = r.read_string()?;
        let active_format = r.read_string()?;
        let count = r.read_u32()?;
        let mut cells = Vec::with_capacity(count as usize);
        for _ in 0..count {
            cells.push(SparseCellEntry {
                x: r.read_u32()?,
                y: r.read_u32()?,
                material: r.read_string()?,
                fill: r.read_f64()?,
                com_x: r.read_f64()?,
                com_y: r.read_f64()?,
                v_x: r.read_f64()?,
                v_y: r.read_f64()?,
            });
        }
        Ok(StateGetOkay {
            world_data: WorldData {
                width,
                height,
                timestep,
                gravity,
                elasticity,
                pressure_scale,
                water_pressure_threshold,
                dirt_fragmentation,
                rules,
                pressure_system: if pressure_system_raw.is_empty() { None } else { Some(pressure_system_raw) },
                active_format,
                cells,
            },
        })
    }
}

// --- cell_get --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellGetCommand {
    pub x: u32,
    pub y: u32,
}

impl CellGetCommand {
    pub const NAME: &'static str = "cell_get";

    pub fn to_json(&self) -> Value {
        json!({ "x": self.x, "y": self.y })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(CellGetCommand { x: require_u32(obj, "x")?, y: require_u32(obj, "y")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.x);
        wire::write_u32(out, self.y);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(CellGetCommand { x: r.read_u32()?, y: r.read_u32()? })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCellFull {
    /// One entry per non-zero material fraction, material name ->
    /// fill fraction.
    pub composition: Vec<(String, f64)>,
    pub com_x: f64,
    pub com_y: f64,
    pub v_x: f64,
    pub v_y: f64,
    pub pressure_x: f64,
    pub pressure_y: f64,
    pub pressure_hydrostatic: f64,
    pub pressure_dynamic: f64,
    pub dirty: bool,
}

impl WireCellFull {
    pub fn from_cell(cell: &Cell) -> Self {
        let composition = MaterialType::ALL
            .into_iter()
            .map(|m| (m.name().to_string(), cell.get(m)))
            .filter(|(_, fill)| *fill > 0.0)
            .collect();
        WireCellFull {
            composition,
            com_x: cell.com.x,
            com_y: cell.com.y,
            v_x: cell.velocity.x,
            v_y: cell.velocity.y,
            pressure_x: cell.pressure.gradient.x,
            pressure_y: cell.pressure.gradient.y,
            pressure_hydrostatic: cell.pressure.hydrostatic,
            pressure_dynamic: cell.pressure.dynamic,
            dirty: cell.dirty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellGetOkay {
    pub cell: WireCellFull,
}

impl CellGetOkay {
    pub const NAME: &'static str = "cell_get";

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        serde_json::from_value(value.clone()).map_err(|e| CommandError::JsonParse(e.to_string()))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.cell.composition.len() as u32);
        for (name, fill) in &self.cell.composition {
            wire::write_string(out, name);
            wire::write_f64(out, *fill);
        }
        wire::write_f64(out, self.cell.com_x);
        wire::write_f64(out, self.cell.com_y);
        wire::write_f64(out, self.cell.v_x);
        wire::write_f64(out, self.cell.v_y);
        wire::write_f64(out, self.cell.pressure_x);
        wire::write_f64(out, self.cell.pressure_y);
        wire::write_f64(out, self.cell.pressure_hydrostatic);
        wire::write_f64(out, self.cell.pressure_dynamic);
        wire::write_bool(out, self.cell.dirty);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        let count = r.read_u32()?;
        let mut composition = Vec::with_capacity(count as usize);
        for _ in 0..count {
            composition.push((r.read_string()?, r.read_f64()?));
        }
        Ok(CellGetOkay {
            cell: WireCellFull {
                composition,
                com_x: r.read_f64()?,
                com_y: r.read_f64()?,
                v_x: r.read_f64()?,
                v_y: r.read_f64()?,
                pressure_x: r.read_f64()?,
                pressure_y: r.read_f64()?,
                pressure_hydrostatic: r.read_f64()?,
                pressure_dynamic: r.read_f64()?,
                dirty: r.read_bool()?,
            },
        })
    }
}

// --- cell_set --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSetCommand {
    pub x: u32,
    pub y: u32,
    pub material: String,
    pub fill: f64,
}

impl CellSetCommand {
    pub const NAME: &'static str = "cell_set";

    pub fn to_json(&self) -> Value {
        json!({ "x": self.x, "y": self.y, "material": self.material, "fill": self.fill })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(CellSetCommand {
            x: require_u32(obj, "x")?,
            y: require_u32(obj, "y")?,
            material: require_string(obj, "material")?,
            fill: require_f64(obj, "fill")?,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.x);
        wire::write_u32(out, self.y);
        wire::write_string(out, &self.material);
        wire::write_f64(out, self.fill);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(CellSetCommand { x: r.read_u32()?, y: r.read_u32()?, material: r.read_string()?, fill: r.read_f64()? })
    }
}

empty_payload!(CellSetOkay, "cell_set");

// --- step --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepCommand {
    pub frames: u32,
}

impl Default for StepCommand {
    fn default() -> Self {
        StepCommand { frames: 1 }
    }
}

impl StepCommand {
    pub const NAME: &'static str = "step";

    pub fn to_json(&self) -> Value {
        json!({ "frames": self.frames })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(StepCommand { frames: optional_u32(obj, "frames", 1).max(1) })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.frames);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(StepCommand { frames: r.read_u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOkay {
    pub timestep: u32,
}

impl StepOkay {
    pub const NAME: &'static str = "step";

    pub fn to_json(&self) -> Value {
        json!({ "timestep": self.timestep })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(StepOkay { timestep: require_u32(obj, "timestep")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.timestep);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(StepOkay { timestep: r.read_u32()? })
    }
}

// --- sim_run / sim_pause -----------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRunCommand {
    pub timestep: f64,
    pub max_steps: i64,
    pub scenario_id: String,
    pub use_realtime: bool,
}

impl Default for SimRunCommand {
    fn default() -> Self {
        SimRunCommand { timestep: 0.016, max_steps: -1, scenario_id: "sandbox".to_string(), use_realtime: true }
    }
}

impl SimRunCommand {
    pub const NAME: &'static str = "sim_run";

    pub fn to_json(&self) -> Value {
        json!({
            "timestep": self.timestep,
            "max_steps": self.max_steps,
            "scenario_id": self.scenario_id,
            "use_realtime": self.use_realtime,
        })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        let defaults = SimRunCommand::default();
        Ok(SimRunCommand {
            timestep: optional_f64(obj, "timestep", defaults.timestep),
            max_steps: optional_i64(obj, "max_steps", defaults.max_steps),
            scenario_id: optional_string(obj, "scenario_id", &defaults.scenario_id),
            use_realtime: optional_bool(obj, "use_realtime", defaults.use_realtime),
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_f64(out, self.timestep);
        wire::write_i64(out, self.max_steps);
        wire::write_string(out, &self.scenario_id);
        wire::write_bool(out, self.use_realtime);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(SimRunCommand {
            timestep: r.read_f64()?,
            max_steps: r.read_i64()?,
            scenario_id: r.read_string()?,
            use_realtime: r.read_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRunOkay {
    pub running: bool,
    pub current_step: u32,
}

impl SimRunOkay {
    pub const NAME: &'static str = "sim_run";

    pub fn to_json(&self) -> Value {
        json!({ "running": self.running, "current_step": self.current_step })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(SimRunOkay { running: require_bool(obj, "running")?, current_step: require_u32(obj, "current_step")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_bool(out, self.running);
        wire::write_u32(out, self.current_step);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(SimRunOkay { running: r.read_bool()?, current_step: r.read_u32()? })
    }
}

empty_payload!(SimPauseCommand, "sim_pause");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimPauseOkay {
    pub paused: bool,
}

impl SimPauseOkay {
    pub const NAME: &'static str = "sim_pause";

    pub fn to_json(&self) -> Value {
        json!({ "paused": self.paused })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(SimPauseOkay { paused: require_bool(obj, "paused")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_bool(out, self.paused);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(SimPauseOkay { paused: r.read_bool()? })
    }
}

// --- reset / exit --------------------------------------------------------

empty_payload!(ResetCommand, "reset");
empty_payload!(ResetOkay, "reset");
empty_payload!(ExitCommand, "exit");
empty_payload!(ExitOkay, "exit");

// --- perf_stats_get / timer_stats_get ------------------------------------

empty_payload!(PerfStatsGetCommand, "perf_stats_get");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerfStatsGetOkay {
    pub fps: f64,
    pub physics_avg_ms: f64,
    pub physics_total_ms: f64,
    pub physics_calls: u64,
    pub serialization_avg_ms: f64,
    pub serialization_total_ms: f64,
    pub serialization_calls: u64,
    pub cache_update_avg_ms: f64,
    pub network_send_avg_ms: f64,
}

impl PerfStatsGetOkay {
    pub const NAME: &'static str = "perf_stats_get";

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        serde_json::from_value(value.clone()).map_err(|e| CommandError::JsonParse(e.to_string()))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_f64(out, self.fps);
        wire::write_f64(out, self.physics_avg_ms);
        wire::write_f64(out, self.physics_total_ms);
        wire::write_u64(out, self.physics_calls);
        wire::write_f64(out, self.serialization_avg_ms);
        wire::write_f64(out, self.serialization_total_ms);
        wire::write_u64(out, self.serialization_calls);
        wire::write_f64(out, self.cache_update_avg_ms);
        wire::write_f64(out, self.network_send_avg_ms);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(PerfStatsGetOkay {
            fps: r.read_f64()?,
            physics_avg_ms: r.read_f64()?,
            physics_total_ms: r.read_f64()?,
            physics_calls: r.read_u64()?,
            serialization_avg_ms: r.read_f64()?,
            serialization_total_ms: r.read_f64()?,
            serialization_calls: r.read_u64()?,
            cache_update_avg_ms: r.read_f64()?,
            network_send_avg_ms: r.read_f64()?,
        })
    }
}

empty_payload!(TimerStatsGetCommand, "timer_stats_get");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TimerStat {
    pub total_ms: f64,
    pub avg_ms: f64,
    pub calls: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimerStatsGetOkay {
    pub timers: Vec<(String, TimerStat)>,
}

impl TimerStatsGetOkay {
    pub const NAME: &'static str = "timer_stats_get";

    pub fn to_json(&self) -> Value {
        let timers: Map<String, Value> = self
            .timers
            .iter()
            .map(|(name, stat)| (name.clone(), serde_json::to_value(stat).unwrap_or(Value::Null)))
            .collect();
        json!({ "timers": Value::Object(timers) })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        let timers_obj = obj.get("timers").and_then(Value::as_object).ok_or_else(|| invalid("timers", "an object"))?;
        let mut timers = Vec::with_capacity(timers_obj.len());
        for (name, v) in timers_obj {
            let stat: TimerStat = serde_json::from_value(v.clone()).map_err(|e| CommandError::JsonParse(e.to_string()))?;
            timers.push((name.clone(), stat));
        }
        Ok(TimerStatsGetOkay { timers })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.timers.len() as u32);
        for (name, stat) in &self.timers {
            wire::write_string(out, name);
            wire::write_f64(out, stat.total_ms);
            wire::write_f64(out, stat.avg_ms);
            wire::write_u64(out, stat.calls);
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        let count = r.read_u32()?;
        let mut timers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.read_string()?;
            let total_ms = r.read_f64()?;
            let avg_ms = r.read_f64()?;
            let calls = r.read_u64()?;
            timers.push((name, TimerStat { total_ms, avg_ms, calls }));
        }
        Ok(TimerStatsGetOkay { timers })
    }
}

// --- scalar physics setters ---------------------------------------------

scalar_setter!(GravitySetCommand, "gravity_set", gravity);
empty_payload!(GravitySetOkay, "gravity_set");

scalar_setter!(SetElasticityCommand, "set_elasticity", elasticity);
empty_payload!(SetElasticityOkay, "set_elasticity");

scalar_setter!(PressureScaleSetCommand, "pressure_scale", scale);
empty_payload!(PressureScaleSetOkay, "pressure_scale");

scalar_setter!(WaterPressureThresholdSetCommand, "water_pressure_threshold", threshold);
empty_payload!(WaterPressureThresholdSetOkay, "water_pressure_threshold");

scalar_setter!(DirtFragmentationSetCommand, "dirt_fragmentation", factor);
empty_payload!(DirtFragmentationSetOkay, "dirt_fragmentation");

// --- world_resize --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldResizeCommand {
    pub width: u32,
    pub height: u32,
}

impl WorldResizeCommand {
    pub const NAME: &'static str = "world_resize";

    pub fn to_json(&self) -> Value {
        json!({ "width": self.width, "height": self.height })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        let width = require_u32(obj, "width")?;
        let height = require_u32(obj, "height")?;
        if width == 0 || height == 0 {
            return Err(invalid("width/height", "at least 1"));
        }
        Ok(WorldResizeCommand { width, height })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.width);
        wire::write_u32(out, self.height);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(WorldResizeCommand { width: r.read_u32()?, height: r.read_u32()? })
    }
}

empty_payload!(WorldResizeOkay, "world_resize");

// --- scenario_config_set --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfigSetCommand {
    pub config: ScenarioConfig,
}

impl ScenarioConfigSetCommand {
    pub const NAME: &'static str = "scenario_config_set";

    pub fn to_json(&self) -> Value {
        json!({ "config": serde_json::to_value(self.config).unwrap_or(Value::Null) })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        let config_value = obj.get("config").ok_or_else(|| invalid("config", "an object"))?;
        let config: ScenarioConfig =
            serde_json::from_value(config_value.clone()).map_err(|e| CommandError::JsonParse(e.to_string()))?;
        Ok(ScenarioConfigSetCommand { config })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_bool(out, self.config.quadrant_enabled);
        wire::write_bool(out, self.config.water_column_enabled);
        wire::write_bool(out, self.config.right_throw_enabled);
        wire::write_f64(out, self.config.rain_rate);
        wire::write_bool(out, self.config.walls_enabled);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(ScenarioConfigSetCommand {
            config: ScenarioConfig {
                quadrant_enabled: r.read_bool()?,
                water_column_enabled: r.read_bool()?,
                right_throw_enabled: r.read_bool()?,
                rain_rate: r.read_f64()?,
                walls_enabled: r.read_bool()?,
            },
        })
    }
}

empty_payload!(ScenarioConfigSetOkay, "scenario_config_set");

// --- render_format_set / render_format_get --------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFormatSetCommand {
    pub format: String,
}

impl RenderFormatSetCommand {
    pub const NAME: &'static str = "render_format_set";

    pub fn to_json(&self) -> Value {
        json!({ "format": self.format })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(RenderFormatSetCommand { format: require_string(obj, "format")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_string(out, &self.format);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(RenderFormatSetCommand { format: r.read_string()? })
    }
}

empty_payload!(RenderFormatSetOkay, "render_format_set");
empty_payload!(RenderFormatGetCommand, "render_format_get");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFormatGetOkay {
    pub format: String,
}

impl RenderFormatGetOkay {
    pub const NAME: &'static str = "render_format_get";

    pub fn to_json(&self) -> Value {
        json!({ "format": self.format })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(RenderFormatGetOkay { format: require_string(obj, "format")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_string(out, &self.format);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(RenderFormatGetOkay { format: r.read_string()? })
    }
}

// --- pressure_system -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureSystemSetCommand {
    pub system: String,
}

impl PressureSystemSetCommand {
    pub const NAME: &'static str = "pressure_system";

    pub fn to_json(&self) -> Value {
        json!({ "system": self.system })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(PressureSystemSetCommand { system: require_string(obj, "system")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_string(out, &self.system);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(PressureSystemSetCommand { system: r.read_string()? })
    }
}

empty_payload!(PressureSystemSetOkay, "pressure_system");

// --- set_rules -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRulesCommand {
    pub rules: String,
}

impl SetRulesCommand {
    pub const NAME: &'static str = "set_rules";

    pub fn to_json(&self) -> Value {
        json!({ "rules": self.rules })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(SetRulesCommand { rules: require_string(obj, "rules")? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_string(out, &self.rules);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(SetRulesCommand { rules: r.read_string()? })
    }
}

empty_payload!(SetRulesOkay, "set_rules");

// --- status_get -------------------------------------------------------------

empty_payload!(StatusGetCommand, "status_get");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusGetOkay {
    pub timestep: u32,
    pub scenario_id: String,
    pub width: u32,
    pub height: u32,
    pub running: bool,
    pub active_format: String,
}

impl StatusGetOkay {
    pub const NAME: &'static str = "status_get";

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        serde_json::from_value(value.clone()).map_err(|e| CommandError::JsonParse(e.to_string()))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.timestep);
        wire::write_string(out, &self.scenario_id);
        wire::write_u32(out, self.width);
        wire::write_u32(out, self.height);
        wire::write_bool(out, self.running);
        wire::write_string(out, &self.active_format);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(StatusGetOkay {
            timestep: r.read_u32()?,
            scenario_id: r.read_string()?,
            width: r.read_u32()?,
            height: r.read_u32()?,
            running: r.read_bool()?,
            active_format: r.read_string()?,
        })
    }
}

// --- seed_add / spawn_dirt_ball (scenario-adjacent mutation helpers) -------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedAddCommand {
    pub x: u32,
    pub y: u32,
    pub material: String,
    pub fill: f64,
}

impl SeedAddCommand {
    pub const NAME: &'static str = "seed_add";

    pub fn to_json(&self) -> Value {
        json!({ "x": self.x, "y": self.y, "material": self.material, "fill": self.fill })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(SeedAddCommand {
            x: require_u32(obj, "x")?,
            y: require_u32(obj, "y")?,
            material: require_string(obj, "material")?,
            fill: require_f64(obj, "fill")?,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.x);
        wire::write_u32(out, self.y);
        wire::write_string(out, &self.material);
        wire::write_f64(out, self.fill);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(SeedAddCommand { x: r.read_u32()?, y: r.read_u32()?, material: r.read_string()?, fill: r.read_f64()? })
    }
}

empty_payload!(SeedAddOkay, "seed_add");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnDirtBallCommand {
    pub center_x: u32,
    pub center_y: u32,
    pub radius: u32,
    pub material: String,
    pub fill: f64,
}

impl SpawnDirtBallCommand {
    pub const NAME: &'static str = "spawn_dirt_ball";

    pub fn to_json(&self) -> Value {
        json!({
            "center_x": self.center_x,
            "center_y": self.center_y,
            "radius": self.radius,
            "material": self.material,
            "fill": self.fill,
        })
    }

    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let obj = require_object(value)?;
        Ok(SpawnDirtBallCommand {
            center_x: require_u32(obj, "center_x")?,
            center_y: require_u32(obj, "center_y")?,
            radius: require_u32(obj, "radius")?,
            material: require_string(obj, "material")?,
            fill: require_f64(obj, "fill")?,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        wire::write_u32(out, self.center_x);
        wire::write_u32(out, self.center_y);
        wire::write_u32(out, self.radius);
        wire::write_string(out, &self.material);
        wire::write_f64(out, self.fill);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CommandError> {
        Ok(SpawnDirtBallCommand {
            center_x: r.read_u32()?,
            center_y: r.read_u32()?,
            radius: r.read_u32()?,
            material: r.read_string()?,
            fill: r.read_f64()?,
        })
    }
}

empty_payload!(SpawnDirtBallOkay, "spawn_dirt_ball");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_set_json_round_trips() {
        let cmd = CellSetCommand { x: 2, y: 3, material: "Water".to_string(), fill: 0.5 };
        let json = cmd.to_json();
        let decoded = CellSetCommand::from_json(&json).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn cell_set_binary_round_trips() {
        let cmd = CellSetCommand { x: 2, y: 3, material: "Water".to_string(), fill: 0.5 };
        let mut bytes = Vec::new();
        cmd.encode(&mut bytes);
        let mut r = Reader::new(&bytes);
        let decoded = CellSetCommand::decode(&mut r).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn sim_run_defaults_fill_missing_fields() {
        let cmd = SimRunCommand::from_json(&json!({})).unwrap();
        assert_eq!(cmd, SimRunCommand::default());
    }

    #[test]
    fn invalid_material_name_is_rejected() {
        assert!(matches!(parse_material("Plasma"), Err(CommandError::InvalidMaterial(_))));
    }

    #[test]
    fn fill_out_of_range_is_rejected() {
        assert!(validate_fill(1.5).is_err());
        assert!(validate_fill(0.5).is_ok());
    }

    #[test]
    fn world_resize_rejects_zero_dimension() {
        assert!(WorldResizeCommand::from_json(&json!({"width": 0, "height": 4})).is_err());
    }

    #[test]
    fn timer_stats_json_round_trips() {
        let okay = TimerStatsGetOkay {
            timers: vec![("advance_time".to_string(), TimerStat { total_ms: 10.0, avg_ms: 1.0, calls: 10 })],
        };
        let json = okay.to_json();
        let decoded = TimerStatsGetOkay::from_json(&json).unwrap();
        assert_eq!(decoded, okay);
    }
}
