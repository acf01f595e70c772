//! The command surface: one wire-codec module (`types`) plus the
//! dispatcher that routes a decoded envelope to a `World` method and
//! encodes the result back.

pub mod dispatcher;
pub mod types;

pub use dispatcher::CommandDispatcher;
