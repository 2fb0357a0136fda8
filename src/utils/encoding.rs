use anyhow::{Result, bail};

/// Append a u32 in little-endian format
pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append a u64 in little-endian format
pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append a length-prefixed string: u32 byte length, then the raw bytes
pub fn put_str(buf: &mut Vec<u8>, value: &str) {
    put_u32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}

/// Bounds-checked forward cursor over a byte slice.
///
/// All reads fail (rather than panic) when the slice runs out, so a
/// truncated file surfaces as an error carrying the decode position.
pub struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Start a cursor at an absolute offset into `buf`
    pub fn at(buf: &'a [u8], offset: usize) -> Result<Self> {
        if offset > buf.len() {
            bail!("offset {} is beyond end of data ({} bytes)", offset, buf.len());
        }
        Ok(Self { buf, pos: offset })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = match self.pos.checked_add(len) {
            Some(end) if end <= self.buf.len() => end,
            _ => bail!("unexpected end of data at offset {}", self.pos),
        };
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut array = [0u8; 8];
        array.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(array))
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a length-prefixed string written by [`put_str`]
    pub fn get_str(&mut self) -> Result<&'a str> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(_) => bail!("invalid UTF-8 in string at offset {}", self.pos - len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 0xdead_beef);
        put_u64(&mut buf, u64::MAX);
        put_str(&mut buf, "v5/units");

        let mut reader = SliceReader::new(&buf);
        assert_eq!(reader.get_u32().unwrap(), 0xdead_beef);
        assert_eq!(reader.get_u64().unwrap(), u64::MAX);
        assert_eq!(reader.get_str().unwrap(), "v5/units");
        assert_eq!(reader.position(), buf.len());
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut buf = Vec::new();
        put_str(&mut buf, "hello");
        buf.truncate(buf.len() - 2);

        let mut reader = SliceReader::new(&buf);
        assert!(reader.get_str().is_err());
    }

    #[test]
    fn test_empty_string() {
        let mut buf = Vec::new();
        put_str(&mut buf, "");
        let mut reader = SliceReader::new(&buf);
        assert_eq!(reader.get_str().unwrap(), "");
    }

    #[test]
    fn test_at_rejects_out_of_range_offset() {
        let buf = [0u8; 4];
        assert!(SliceReader::at(&buf, 5).is_err());
        assert!(SliceReader::at(&buf, 4).is_ok());
    }
}
