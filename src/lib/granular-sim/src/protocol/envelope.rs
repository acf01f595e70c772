//! The transport envelope: a length-prefixed binary frame, and a
//! semantically equivalent JSON form. Both carry a correlation `id`
//! (0 for unsolicited broadcasts), a `message_type` tag, and an opaque
//! payload — `CommandDispatcher` is the only thing that knows how to
//! interpret the payload bytes for a given `message_type`.

use serde_json::{Map, Value};

use crate::error::CommandError;
use crate::protocol::wire::{self, Reader};

/// 10 MiB, per spec.md §6's per-message cap for the WebSocket framing.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: u64,
    pub message_type: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(id: u64, message_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Envelope { id, message_type: message_type.into(), payload }
    }

    pub fn response_type_for(command_name: &str) -> String {
        format!("{command_name}_response")
    }

    /// `uint64 id | len16 type_len + type bytes | len32 payload_len + payload bytes`.
    pub fn encode_binary(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 2 + self.message_type.len() + 4 + self.payload.len());
        wire::write_u64(&mut out, self.id);
        let type_bytes = self.message_type.as_bytes();
        wire::write_u16(&mut out, type_bytes.len() as u16);
        out.extend_from_slice(type_bytes);
        wire::write_u32(&mut out, self.payload.len() as u32);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode_binary(bytes: &[u8]) -> Result<Self, CommandError> {
        if bytes.len() > MAX_MESSAGE_BYTES {
            return Err(CommandError::BinaryDecode("message exceeds 10 MiB cap".into()));
        }
        let mut r = Reader::new(bytes);
        let id = r.read_u64()?;
        let type_len = r.read_u16()? as usize;
        let type_bytes = r.read_bytes(type_len)?;
        let message_type = std::str::from_utf8(type_bytes)
            .map_err(|e| CommandError::BinaryDecode(e.to_string()))?
            .to_string();
        let payload_len = r.read_u32()? as usize;
        let payload = r.read_bytes(payload_len)?.to_vec();
        Ok(Envelope { id, message_type, payload })
    }

    /// `{ "id": ..., "command" | "response_type": ..., ...payload fields }`.
    /// `is_response` selects which of the two field names carries
    /// `message_type`, per spec.md §6.
    pub fn encode_json(&self, payload_fields: Value, is_response: bool) -> Value {
        let mut obj = match payload_fields {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        obj.insert("id".to_string(), Value::from(self.id));
        let key = if is_response { "response_type" } else { "command" };
        obj.insert(key.to_string(), Value::String(self.message_type.clone()));
        Value::Object(obj)
    }

    pub fn decode_json(value: &Value) -> Result<(Self, Value), CommandError> {
        let obj = value.as_object().ok_or(CommandError::NotAnObject)?;
        let id = obj.get("id").and_then(Value::as_u64).unwrap_or(0);
        let message_type = obj
            .get("command")
            .or_else(|| obj.get("response_type"))
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingCommandField)?
            .to_string();
        let mut fields = obj.clone();
        fields.remove("id");
        fields.remove("command");
        fields.remove("response_type");
        Ok((Envelope { id, message_type, payload: Vec::new() }, Value::Object(fields)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub id: u64,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "id": self.id, "error": self.message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip_preserves_id_type_and_payload() {
        let env = Envelope::new(7, "state_get", vec![1, 2, 3, 4]);
        let bytes = env.encode_binary();
        let decoded = Envelope::decode_binary(&bytes).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn json_round_trip_preserves_command_name_and_fields() {
        let env = Envelope::new(3, "cell_set", Vec::new());
        let json = env.encode_json(serde_json::json!({"x": 1, "y": 2}), false);
        let (decoded, fields) = Envelope::decode_json(&json).unwrap();
        assert_eq!(decoded.id, 3);
        assert_eq!(decoded.message_type, "cell_set");
        assert_eq!(fields["x"], 1);
        assert_eq!(fields["y"], 2);
    }

    #[test]
    fn response_json_uses_response_type_key() {
        let env = Envelope::new(3, "cell_set_response", Vec::new());
        let json = env.encode_json(serde_json::json!({}), true);
        assert_eq!(json["response_type"], "cell_set_response");
        assert!(json.get("command").is_none());
    }

    #[test]
    fn oversized_binary_message_is_rejected() {
        let bytes = vec![0u8; MAX_MESSAGE_BYTES + 1];
        assert!(Envelope::decode_binary(&bytes).is_err());
    }

    #[test]
    fn malformed_json_command_is_missing_command_field() {
        let value = serde_json::json!({"id": 1});
        assert_eq!(Envelope::decode_json(&value).unwrap_err(), CommandError::MissingCommandField);
    }
}
