//! Primitive RowBinary wire helpers.
//!
//! Fixed-width numbers are little-endian. Lengths and counts are LEB128
//! varints (7 value bits per byte, high bit = more bytes follow).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, DecodeResult};

/// Longest LEB128 encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` as a minimal LEB128 varint.
#[inline]
pub fn put_varint(buf: &mut BytesMut, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            break;
        } else {
            buf.put_u8(byte | 0x80);
        }
    }
}

/// Encoded size of `value` in bytes.
#[inline]
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Append a length-prefixed byte string.
#[inline]
pub fn put_string(buf: &mut BytesMut, s: &[u8]) {
    put_varint(buf, s.len() as u64);
    buf.extend_from_slice(s);
}

/// Cursor over a response buffer.
///
/// Reads never copy: `read_bytes` hands out `Bytes` slices that share the
/// underlying allocation. Every failed read reports the absolute offset.
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Bytes,
    pos: usize,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes.
    pub fn take(&mut self, n: usize) -> DecodeResult<&[u8]> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..self.pos])
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read exactly `N` bytes, e.g. for `u32::from_le_bytes`.
    pub fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Zero-copy slice of the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> DecodeResult<Bytes> {
        let start = self.pos;
        self.take(n)?;
        Ok(self.buf.slice(start..self.pos))
    }

    pub fn read_varint(&mut self) -> DecodeResult<u64> {
        let start = self.pos;
        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(DecodeError::VarintOverflow(start));
            }
            result |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::VarintOverflow(start))
    }

    /// Varint used as a length or count, bounded by what is left in the buffer
    /// so a corrupt prefix cannot trigger a huge allocation.
    pub fn read_len(&mut self) -> DecodeResult<usize> {
        let len = self.read_varint()?;
        match usize::try_from(len) {
            Ok(n) if n <= self.remaining() => Ok(n),
            _ => Err(DecodeError::Truncated {
                offset: self.pos,
                needed: usize::try_from(len)
                    .unwrap_or(usize::MAX)
                    .saturating_sub(self.remaining()),
            }),
        }
    }

    /// Length-prefixed byte string.
    pub fn read_string(&mut self) -> DecodeResult<Bytes> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: u64) -> BytesMut {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, v);
        buf
    }

    #[test]
    fn test_varint_boundaries() {
        for (value, len) in [
            (0u64, 1usize),
            (127, 1),
            (128, 2),
            (16383, 2),
            (16384, 3),
            (u64::MAX, 10),
        ] {
            let buf = encode(value);
            assert_eq!(buf.len(), len, "length of {}", value);
            assert_eq!(varint_len(value), len);
            let mut r = Reader::new(buf.freeze());
            assert_eq!(r.read_varint().unwrap(), value);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_varint_known_bytes() {
        assert_eq!(&encode(300)[..], &[0xAC, 0x02]);
        assert_eq!(&encode(128)[..], &[0x80, 0x01]);
    }

    #[test]
    fn test_varint_truncated() {
        let mut r = Reader::new(Bytes::from_static(&[0x80, 0x80]));
        assert_eq!(
            r.read_varint(),
            Err(DecodeError::Truncated {
                offset: 2,
                needed: 1
            })
        );
    }

    #[test]
    fn test_varint_overflow() {
        let mut r = Reader::new(Bytes::from_static(&[0xFF; 11]));
        assert_eq!(r.read_varint(), Err(DecodeError::VarintOverflow(0)));

        // 10th byte may only carry the top bit of a u64
        let mut bytes = vec![0xFF; 9];
        bytes.push(0x02);
        let mut r = Reader::new(Bytes::from(bytes));
        assert_eq!(r.read_varint(), Err(DecodeError::VarintOverflow(0)));
    }

    #[test]
    fn test_read_string_is_zero_copy() {
        let buf = Bytes::from_static(b"\x05hello\x01");
        let mut r = Reader::new(buf.clone());
        let s = r.read_string().unwrap();
        assert_eq!(&s[..], b"hello");
        assert_eq!(s.as_ptr(), buf[1..].as_ptr());
        assert_eq!(r.position(), 6);
        assert_eq!(r.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_read_len_bounded_by_buffer() {
        let mut r = Reader::new(Bytes::from_static(&[0x0A, b'a', b'b']));
        assert_eq!(
            r.read_string(),
            Err(DecodeError::Truncated {
                offset: 1,
                needed: 8
            })
        );
    }

    #[test]
    fn test_read_array() {
        let mut r = Reader::new(Bytes::from_static(&[1, 0, 0, 0, 9]));
        assert_eq!(u32::from_le_bytes(r.read_array().unwrap()), 1);
        assert_eq!(
            r.read_array::<2>(),
            Err(DecodeError::Truncated {
                offset: 4,
                needed: 1
            })
        );
    }
}
