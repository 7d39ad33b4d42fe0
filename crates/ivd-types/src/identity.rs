use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length ceiling per identity field, matching the u16 length prefix used by
/// the seal wire encoding.
pub const MAX_IDENTITY_FIELD_BYTES: usize = 65_535;

/// Who authored or committed a seal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    /// Create a validated identity. Fields must be non-empty and each at
    /// most 65535 bytes of UTF-8.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let email = email.into();
        if name.is_empty() {
            return Err(TypeError::InvalidIdentity("name must not be empty".into()));
        }
        if email.is_empty() {
            return Err(TypeError::InvalidIdentity("email must not be empty".into()));
        }
        for (label, value) in [("name", &name), ("email", &email)] {
            if value.len() > MAX_IDENTITY_FIELD_BYTES {
                return Err(TypeError::InvalidIdentity(format!(
                    "{label} exceeds {MAX_IDENTITY_FIELD_BYTES} bytes"
                )));
            }
        }
        Ok(Self { name, email })
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
