//! Grid-based granular/fluid continuum simulator core. Headless: this
//! crate owns the cell grid, the physics pipeline, time-reversal history,
//! and the command/response protocol that drives it. Rendering, process
//! orchestration, and the socket listener are the host binary's job, not
//! this crate's (see `granular-sim-server`).

pub mod cell;
pub mod commands;
pub mod error;
pub mod history;
pub mod material;
pub mod protocol;
pub mod rules;
pub mod scenario;
pub mod transfer;
pub mod vector;
pub mod world;

pub use cell::Cell;
pub use commands::CommandDispatcher;
pub use error::{ApiError, CommandError};
pub use material::MaterialType;
pub use rules::Rules;
pub use vector::Vector2;
pub use world::World;
