//! Bounds-checked big-endian reader over a record payload.
//!
//! Every record codec reads through [`Reader`], so a short or malformed
//! reply turns into [`ProtocolError::Truncated`] instead of a panic.

use bytes::Buf;
use gwlib_core::ProtocolError;

#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> Reader<'a> {
    /// Read `buf`, naming the record in errors as `what`.
    pub(crate) fn new(buf: &'a [u8], what: &'static str) -> Self {
        Reader { buf, what }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the next `n` bytes.
    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.buf.len() < n {
            return Err(ProtocolError::Truncated {
                what: self.what,
                needed: n,
                available: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), ProtocolError> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?.get_u8())
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(self.take(2)?.get_u16())
    }

    pub(crate) fn i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(self.take(2)?.get_i16())
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(self.take(4)?.get_u32())
    }

    /// A one-byte length followed by that many bytes, decoded lossily as text.
    pub(crate) fn short_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u8()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let data = [0x01, 0x02, 0x03, 0xFF, 0xF6, 0x00, 0x00, 0x01, 0x00];
        let mut r = Reader::new(&data, "test");
        assert_eq!(r.u8().unwrap(), 0x01);
        assert_eq!(r.u16().unwrap(), 0x0203);
        assert_eq!(r.i16().unwrap(), -10);
        assert_eq!(r.u32().unwrap(), 256);
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_is_truncated() {
        let mut r = Reader::new(&[0x01], "rain data");
        assert_eq!(
            r.u32(),
            Err(ProtocolError::Truncated {
                what: "rain data",
                needed: 4,
                available: 1
            })
        );
        // A failed read consumes nothing.
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn length_prefixed_string() {
        let mut r = Reader::new(&[3, b'a', b'b', b'c', 9], "test");
        assert_eq!(r.short_string().unwrap(), "abc");
        assert_eq!(r.remaining(), 1);

        let mut r = Reader::new(&[5, b'a'], "test");
        assert!(r.short_string().is_err());
    }
}
