// src/protocol/wire.rs

//! Primitive encoding used by every message payload.
//!
//! All integers are little-endian, booleans occupy one byte and strings are a
//! `u32` byte count followed by UTF-8 bytes. Writers buffer a whole message so
//! it reaches the socket in a single `write_all`; readers pull fields directly
//! from the stream and block until each one is complete.

use crate::error::ChannelError;
use std::io::{self, Read};

/// Default upper bound for a single string payload.
pub const DEFAULT_MAX_STRING_LEN: usize = 1 << 20;

/// A type with a fixed binary layout on the controller connection.
pub trait WireFormat: Sized {
    fn encode(&self, w: &mut WireWriter);
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ChannelError>;
}

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed string.
    pub fn put_str(&mut self, s: &str) {
        self.put_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn put<T: WireFormat>(&mut self, value: &T) {
        value.encode(self);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct WireReader<'a> {
    src: &'a mut dyn Read,
    max_string_len: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(src: &'a mut dyn Read) -> Self {
        Self::with_limit(src, DEFAULT_MAX_STRING_LEN)
    }

    pub fn with_limit(src: &'a mut dyn Read, max_string_len: usize) -> Self {
        Self {
            src,
            max_string_len,
        }
    }

    fn fill<const N: usize>(&mut self) -> Result<[u8; N], ChannelError> {
        let mut bytes = [0u8; N];
        self.src
            .read_exact(&mut bytes)
            .map_err(ChannelError::from_io)?;
        Ok(bytes)
    }

    pub fn i32(&mut self) -> Result<i32, ChannelError> {
        Ok(i32::from_le_bytes(self.fill()?))
    }

    pub fn u32(&mut self) -> Result<u32, ChannelError> {
        Ok(u32::from_le_bytes(self.fill()?))
    }

    pub fn i16(&mut self) -> Result<i16, ChannelError> {
        Ok(i16::from_le_bytes(self.fill()?))
    }

    pub fn u16(&mut self) -> Result<u16, ChannelError> {
        Ok(u16::from_le_bytes(self.fill()?))
    }

    pub fn i64(&mut self) -> Result<i64, ChannelError> {
        Ok(i64::from_le_bytes(self.fill()?))
    }

    pub fn u64(&mut self) -> Result<u64, ChannelError> {
        Ok(u64::from_le_bytes(self.fill()?))
    }

    pub fn f32(&mut self) -> Result<f32, ChannelError> {
        Ok(f32::from_le_bytes(self.fill()?))
    }

    pub fn u8(&mut self) -> Result<u8, ChannelError> {
        Ok(self.fill::<1>()?[0])
    }

    pub fn bool(&mut self) -> Result<bool, ChannelError> {
        Ok(self.u8()? != 0)
    }

    pub fn bytes<const N: usize>(&mut self) -> Result<[u8; N], ChannelError> {
        self.fill()
    }

    pub fn string(&mut self) -> Result<String, ChannelError> {
        let len = self.u32()? as usize;
        if len > self.max_string_len {
            // Skip the payload so the next message starts on a tag.
            io::copy(&mut (&mut *self.src).take(len as u64), &mut io::sink())
                .map_err(ChannelError::from_io)?;
            return Err(ChannelError::Oversized {
                len,
                limit: self.max_string_len,
            });
        }
        let mut bytes = vec![0u8; len];
        self.src
            .read_exact(&mut bytes)
            .map_err(ChannelError::from_io)?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn get<T: WireFormat>(&mut self) -> Result<T, ChannelError> {
        T::decode(self)
    }
}
