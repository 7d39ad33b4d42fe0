//! Bounds-checked byte cursor used by the decoders.

use ivd_types::{Hash, HashAlgo};

use crate::error::{ObjectError, ObjectResult};

pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == self.data.len()
    }

    pub fn error(&self, reason: impl Into<String>) -> ObjectError {
        ObjectError::Decode {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    pub fn take(&mut self, n: usize) -> ObjectResult<&'a [u8]> {
        if self.offset + n > self.data.len() {
            return Err(self.error(format!(
                "short read: need {n} bytes, {} remain",
                self.data.len() - self.offset
            )));
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> ObjectResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_be(&mut self) -> ObjectResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32_be(&mut self) -> ObjectResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64_be(&mut self) -> ObjectResult<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    /// Read an algorithm tag byte followed by a 32-byte hash value.
    pub fn hash(&mut self) -> ObjectResult<Hash> {
        let tag_offset = self.offset;
        let tag = self.u8()?;
        let algo = HashAlgo::from_tag(tag).ok_or(ObjectError::Decode {
            offset: tag_offset,
            reason: format!("unknown hash algorithm tag: {tag}"),
        })?;
        let value = self.take(32)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(value);
        Ok(Hash::from_raw(algo, bytes))
    }

    /// Read a u16-length-prefixed UTF-8 string.
    pub fn string_u16(&mut self, what: &str) -> ObjectResult<String> {
        let len = self.u16_be()? as usize;
        let start = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ObjectError::Decode {
            offset: start,
            reason: format!("{what} is not valid UTF-8"),
        })
    }
}

/// Append an algorithm tag byte and the 32-byte hash value.
pub(crate) fn put_hash(out: &mut Vec<u8>, hash: &Hash) {
    out.push(hash.algo().tag());
    out.extend_from_slice(hash.as_bytes());
}

/// Append a u16-length-prefixed string.
pub(crate) fn put_string_u16(out: &mut Vec<u8>, s: &str) -> ObjectResult<()> {
    if s.len() > u16::MAX as usize {
        return Err(ObjectError::IdentityTooLong(s.len()));
    }
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}
