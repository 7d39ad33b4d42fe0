use serde::{Deserialize, Serialize};

use ivd_types::{Hash, Identity};

use crate::cursor::{put_hash, put_string_u16, Cursor};
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;

/// A named, annotated pointer at another object.
///
/// Encoded in the same length-prefixed style as seals:
/// `[target_algo: u8][target: 32][target_kind: u8][name: u16 + bytes]`
/// `[tagger_name: u16 + bytes][tagger_email: u16 + bytes]`
/// `[timestamp: u64 BE][message_len: u32 BE][message]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// The object this tag points at.
    pub target: Hash,
    /// Kind of the target object (almost always a seal).
    pub target_kind: ObjectKind,
    /// Tag name.
    pub name: String,
    /// Who created the tag.
    pub tagger: Identity,
    /// UTC nanoseconds since the Unix epoch.
    pub timestamp: u64,
    /// Annotation message.
    pub message: String,
}

impl Tag {
    /// Encode to the deterministic wire format.
    pub fn encode(&self) -> ObjectResult<Vec<u8>> {
        if self.name.len() > u16::MAX as usize {
            return Err(ObjectError::NameTooLong(self.name.len()));
        }
        let mut out = Vec::with_capacity(96 + self.message.len());
        put_hash(&mut out, &self.target);
        out.push(self.target_kind.kind_byte());
        put_string_u16(&mut out, &self.name)?;
        put_string_u16(&mut out, &self.tagger.name)?;
        put_string_u16(&mut out, &self.tagger.email)?;
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&(self.message.len() as u32).to_be_bytes());
        out.extend_from_slice(self.message.as_bytes());
        Ok(out)
    }

    /// Decode from the wire format.
    pub fn decode(data: &[u8]) -> ObjectResult<Self> {
        let mut cursor = Cursor::new(data);

        let target = cursor.hash()?;
        let kind_offset = cursor.offset();
        let kind_byte = cursor.u8()?;
        let target_kind = ObjectKind::from_kind_byte(kind_byte).ok_or(ObjectError::Decode {
            offset: kind_offset,
            reason: format!("unknown object kind byte: {kind_byte}"),
        })?;
        let name = cursor.string_u16("tag name")?;
        let tagger_name = cursor.string_u16("tagger name")?;
        let tagger_email = cursor.string_u16("tagger email")?;
        let timestamp = cursor.u64_be()?;
        let message_len = cursor.u32_be()? as usize;
        let message_offset = cursor.offset();
        let message_bytes = cursor.take(message_len)?;
        let message = String::from_utf8(message_bytes.to_vec()).map_err(|_| {
            ObjectError::Decode {
                offset: message_offset,
                reason: "message is not valid UTF-8".into(),
            }
        })?;

        if !cursor.is_empty() {
            return Err(cursor.error("trailing bytes after tag payload"));
        }

        Ok(Self {
            target,
            target_kind,
            name,
            tagger: Identity {
                name: tagger_name,
                email: tagger_email,
            },
            timestamp,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tag() -> Tag {
        Tag {
            target: Hash::blake3(b"a seal"),
            target_kind: ObjectKind::Seal,
            name: "v1.0.0".into(),
            tagger: Identity::new("sindri", "sindri@forge.example").unwrap(),
            timestamp: 1_722_000_000_000_000_000,
            message: "first stable release".into(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let tag = sample_tag();
        let encoded = tag.encode().unwrap();
        let decoded = Tag::decode(&encoded).unwrap();
        assert_eq!(decoded, tag);
        assert_eq!(decoded.encode().unwrap(), encoded);
    }

    #[test]
    fn decode_rejects_truncation() {
        let bytes = sample_tag().encode().unwrap();
        assert!(Tag::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(Tag::decode(&bytes[..10]).is_err());
    }

    #[test]
    fn decode_rejects_bad_target_kind() {
        let mut bytes = sample_tag().encode().unwrap();
        bytes[33] = 77;
        assert!(Tag::decode(&bytes).is_err());
    }
}
