use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by test helpers and debug-assertion paths that construct cells
/// from raw data; never surfaced across the command boundary.
#[derive(Debug, Error, PartialEq)]
pub enum CellError {
    #[error("fill {0} is not in [0,1]")]
    FillOutOfRange(f64),
    #[error("material composition is not finite")]
    NotFinite,
}

/// Raised inside the transfer engine; always converted into an in-place
/// reflection before `advance_time` returns, never surfaced to a caller.
#[derive(Debug, Error, PartialEq)]
pub enum TransferError {
    #[error("target ({0}, {1}) is out of bounds")]
    OutOfBounds(i64, i64),
    #[error("target ({0}, {1}) is a wall")]
    TargetIsWall(u32, u32),
    #[error("target ({0}, {1}) is already at or above capacity")]
    TargetFull(u32, u32),
}

/// The one error type that crosses the dispatcher boundary. Converted 1:1
/// into `ApiError` at the edge so that internal error detail never leaks
/// an implementation type onto the wire.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("JSON parse error: {0}")]
    JsonParse(String),
    #[error("Command must be a JSON object")]
    NotAnObject,
    #[error("Command must have 'command' field with string value")]
    MissingCommandField,
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid coordinates ({0}, {1})")]
    InvalidCoordinates(i64, i64),
    #[error("Invalid material type: {0}")]
    InvalidMaterial(String),
    #[error("'{field}' must be {constraint}")]
    InvalidField { field: String, constraint: String },
    #[error("step failed at ({0}, {1}): {2}")]
    StepFailed(u32, u32, String),
    #[error("binary decode error: {0}")]
    BinaryDecode(String),
}

/// The wire-level error payload. Deliberately a plain struct, not an enum,
/// matching the external protocol's flat `{ "message": ... }` shape —
/// only `message` ever crosses the boundary, never a typed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        ApiError { message: message.into() }
    }
}

impl Default for ApiError {
    fn default() -> Self {
        ApiError::new("Unknown error")
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        ApiError::new(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

pub type Response<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_converts_to_api_error_message() {
        let err: ApiError = CommandError::UnknownCommand("frobnicate".into()).into();
        assert_eq!(err.message, "Unknown command: frobnicate");
    }

    #[test]
    fn default_api_error_matches_original_message() {
        assert_eq!(ApiError::default().message, "Unknown error");
    }
}
