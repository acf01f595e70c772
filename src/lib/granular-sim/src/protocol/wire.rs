//! Primitive little-endian binary encode/decode helpers shared by the
//! envelope header (`protocol::envelope`) and every command/okay payload
//! in `commands::types`. No type tags: each field's wire shape is fixed
//! by its Rust type at the call site, matching the original's
//! reflection-free `zpp_bits`-style ordered field writes (Rust has no
//! reflection, so each struct spells out its own field order here).

use crate::error::CommandError;

pub fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_bool(out: &mut Vec<u8>, v: bool) {
    out.push(v as u8);
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

/// A cursor over a borrowed byte slice. Every `read_*` advances the
/// cursor and returns `CommandError::BinaryDecode` on truncation rather
/// than panicking, since a malformed binary envelope is a boundary
/// error (spec.md §7), never a fatal assertion.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CommandError> {
        if self.pos + n > self.bytes.len() {
            return Err(CommandError::BinaryDecode("unexpected end of payload".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CommandError> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, CommandError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CommandError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, CommandError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, CommandError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, CommandError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64, CommandError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_bool(&mut self) -> Result<bool, CommandError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_string(&mut self) -> Result<String, CommandError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|e| CommandError::BinaryDecode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_primitive() {
        let mut out = Vec::new();
        write_u32(&mut out, 42);
        write_f64(&mut out, 3.5);
        write_bool(&mut out, true);
        write_string(&mut out, "hello");
        write_i64(&mut out, -7);
        write_u64(&mut out, u64::MAX);

        let mut r = Reader::new(&out);
        assert_eq!(r.read_u32().unwrap(), 42);
        assert_eq!(r.read_f64().unwrap(), 3.5);
        assert_eq!(r.read_bool().unwrap(), true);
        assert_eq!(r.read_string().unwrap(), "hello");
        assert_eq!(r.read_i64().unwrap(), -7);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
    }

    #[test]
    fn truncated_payload_errors_instead_of_panicking() {
        let out = vec![1, 2, 3];
        let mut r = Reader::new(&out);
        assert!(r.read_u32().is_err());
    }
}
