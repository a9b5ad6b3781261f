//! Little-endian field access over packet bodies.
//!
//! Reads never go out of bounds: every accessor returns a [`DecodeReason`]
//! describing what was missing, which the protocol tables wrap into a
//! [`DecodeError`](crate::error::DecodeError) together with the opcode.

use bytes::BufMut;

use crate::error::DecodeReason;

/// Read cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

type Field<T> = std::result::Result<T, DecodeReason>;

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn skip(&mut self, n: usize) -> Field<()> {
        self.bytes(n).map(|_| ())
    }

    pub fn bytes(&mut self, n: usize) -> Field<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeReason::TooShort {
                need: self.pos + n,
                have: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Field<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Field<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Field<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Network-order u16, used for ports inside `sockaddr_in` blocks.
    pub fn read_u16_be(&mut self) -> Field<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn read_u32_le(&mut self) -> Field<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Null-terminated string; the terminator is consumed but not returned.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, since realm servers pass
    /// through whatever the remote client typed.
    pub fn read_cstring(&mut self, field: &'static str) -> Field<String> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeReason::MissingTerminator { field })?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(value)
    }

    /// Like [`read_cstring`](Self::read_cstring) but an unterminated tail is
    /// accepted as the final value.
    pub fn read_cstring_lenient(&mut self) -> String {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.pos += end + 1;
                String::from_utf8_lossy(&rest[..end]).into_owned()
            }
            None => {
                self.pos = self.buf.len();
                String::from_utf8_lossy(rest).into_owned()
            }
        }
    }
}

/// Write helpers for packet bodies.
pub trait PutExt: BufMut {
    /// Appends the string bytes plus a null terminator.
    fn put_cstring(&mut self, value: &str) {
        self.put_slice(value.as_bytes());
        self.put_u8(0);
    }

    /// Appends a four-character tag exactly as given (tags such as `68XI` are
    /// already stored in wire order).
    fn put_tag(&mut self, tag: &[u8; 4]) {
        self.put_slice(tag);
    }
}

impl<B: BufMut + ?Sized> PutExt for B {}
