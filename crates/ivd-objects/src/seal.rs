use serde::{Deserialize, Serialize};

use ivd_types::{Hash, Identity};

use crate::cursor::{put_hash, put_string_u16, Cursor};
use crate::error::{ObjectError, ObjectResult};

/// An immutable commit object.
///
/// A seal with no parents is a root; with two or more it is a merge (a
/// "fuse"). The memorable name and iteration number are deliberately NOT part
/// of the hashed content; they live in the position catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    /// Root tree captured by this seal.
    pub tree: Hash,
    /// Parent seals, `parents[0]` being the primary line of history.
    pub parents: Vec<Hash>,
    /// Who wrote the change.
    pub author: Identity,
    /// Who created the seal.
    pub committer: Identity,
    /// Seal message.
    pub message: String,
    /// UTC nanoseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Seal {
    /// Returns `true` if this seal has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this seal has two or more parents.
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    /// The primary parent, if any.
    pub fn primary_parent(&self) -> Option<&Hash> {
        self.parents.first()
    }

    /// Encode to the deterministic wire format:
    ///
    /// ```text
    /// [tree_algo: u8][tree_hash: 32]
    /// [parent_count: u16 BE][{algo: u8, hash: 32} x n]
    /// [author_name: u16 BE + bytes][author_email: ...]
    /// [committer_name: ...][committer_email: ...]
    /// [timestamp_nanos: u64 BE]
    /// [message_len: u32 BE][message]
    /// ```
    pub fn encode(&self) -> ObjectResult<Vec<u8>> {
        if self.parents.len() > u16::MAX as usize {
            return Err(ObjectError::TooManyParents(self.parents.len()));
        }
        if self.message.len() > u32::MAX as usize {
            return Err(ObjectError::MessageTooLong(self.message.len()));
        }

        let mut out = Vec::with_capacity(128 + self.message.len());
        put_hash(&mut out, &self.tree);
        out.extend_from_slice(&(self.parents.len() as u16).to_be_bytes());
        for parent in &self.parents {
            put_hash(&mut out, parent);
        }
        put_string_u16(&mut out, &self.author.name)?;
        put_string_u16(&mut out, &self.author.email)?;
        put_string_u16(&mut out, &self.committer.name)?;
        put_string_u16(&mut out, &self.committer.email)?;
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&(self.message.len() as u32).to_be_bytes());
        out.extend_from_slice(self.message.as_bytes());
        Ok(out)
    }

    /// Decode from the wire format with bound checks on every length field.
    pub fn decode(data: &[u8]) -> ObjectResult<Self> {
        let mut cursor = Cursor::new(data);

        let tree = cursor.hash()?;
        let parent_count = cursor.u16_be()? as usize;
        let mut parents = Vec::with_capacity(parent_count);
        for _ in 0..parent_count {
            parents.push(cursor.hash()?);
        }

        let author_name = cursor.string_u16("author name")?;
        let author_email = cursor.string_u16("author email")?;
        let committer_name = cursor.string_u16("committer name")?;
        let committer_email = cursor.string_u16("committer email")?;
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
            return Err(cursor.error("trailing bytes after seal payload"));
        }

        Ok(Self {
            tree,
            parents,
            author: Identity {
                name: author_name,
                email: author_email,
            },
            committer: Identity {
                name: committer_name,
                email: committer_email,
            },
            message,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivd_types::HashAlgo;
    use proptest::prelude::*;

    fn ident(name: &str) -> Identity {
        Identity::new(name, format!("{name}@forge.example")).unwrap()
    }

    fn sample_seal(parents: Vec<Hash>) -> Seal {
        Seal {
            tree: Hash::blake3(b"tree bytes"),
            parents,
            author: ident("eitri"),
            committer: ident("brokkr"),
            message: "forge the first piece".into(),
            timestamp: 1_722_000_000_000_000_000,
        }
    }

    #[test]
    fn root_and_merge_flags() {
        assert!(sample_seal(vec![]).is_root());
        let merge = sample_seal(vec![Hash::blake3(b"p1"), Hash::blake3(b"p2")]);
        assert!(merge.is_merge());
        assert!(!merge.is_root());
        assert_eq!(merge.primary_parent(), Some(&Hash::blake3(b"p1")));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let seal = sample_seal(vec![Hash::blake3(b"parent")]);
        let encoded = seal.encode().unwrap();
        let decoded = Seal::decode(&encoded).unwrap();
        assert_eq!(decoded, seal);
        assert_eq!(decoded.encode().unwrap(), encoded);
    }

    #[test]
    fn encoding_is_deterministic_across_calls() {
        let seal = sample_seal(vec![]);
        assert_eq!(seal.encode().unwrap(), seal.encode().unwrap());
    }

    #[test]
    fn mixed_algorithm_parents_roundtrip() {
        let seal = sample_seal(vec![
            Hash::blake3(b"p1"),
            Hash::compute(b"p2", HashAlgo::Sha256),
        ]);
        let decoded = Seal::decode(&seal.encode().unwrap()).unwrap();
        assert_eq!(decoded.parents[1].algo(), HashAlgo::Sha256);
    }

    #[test]
    fn empty_message_roundtrip() {
        let mut seal = sample_seal(vec![]);
        seal.message = String::new();
        let decoded = Seal::decode(&seal.encode().unwrap()).unwrap();
        assert_eq!(decoded.message, "");
    }

    #[test]
    fn decode_rejects_truncation() {
        let bytes = sample_seal(vec![Hash::blake3(b"p")]).encode().unwrap();
        for cut in [0, 1, 33, 35, 70, bytes.len() - 1] {
            let err = Seal::decode(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, ObjectError::Decode { .. }), "cut at {cut}");
        }
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = sample_seal(vec![]).encode().unwrap();
        bytes.push(0);
        let err = Seal::decode(&bytes).unwrap_err();
        assert!(matches!(err, ObjectError::Decode { .. }));
    }

    #[test]
    fn decode_rejects_unknown_algo_tag() {
        let mut bytes = sample_seal(vec![]).encode().unwrap();
        bytes[0] = 9;
        let err = Seal::decode(&bytes).unwrap_err();
        assert!(matches!(err, ObjectError::Decode { offset: 0, .. }));
    }

    #[test]
    fn decode_offset_points_at_failure() {
        // Corrupt the parent count so the parent hash read runs short.
        let mut bytes = sample_seal(vec![]).encode().unwrap();
        bytes[33..35].copy_from_slice(&500u16.to_be_bytes());
        match Seal::decode(&bytes).unwrap_err() {
            ObjectError::Decode { offset, .. } => assert!(offset >= 35),
            other => panic!("unexpected error: {other}"),
        }
    }

    proptest! {
        #[test]
        fn roundtrip_law(
            message in "[ -~]{0,100}",
            timestamp in any::<u64>(),
            parent_seeds in proptest::collection::vec(any::<[u8; 4]>(), 0..4),
        ) {
            let seal = Seal {
                tree: Hash::blake3(b"t"),
                parents: parent_seeds.iter().map(|s| Hash::blake3(s)).collect(),
                author: ident("a"),
                committer: ident("c"),
                message,
                timestamp,
            };
            let encoded = seal.encode().unwrap();
            let decoded = Seal::decode(&encoded).unwrap();
            prop_assert_eq!(&decoded, &seal);
            prop_assert_eq!(decoded.encode().unwrap(), encoded);
        }
    }
}
