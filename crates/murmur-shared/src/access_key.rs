use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::KeyError;

/// A user's opaque identity token. No email, no phone number, no session:
/// whoever holds the key is the identity.
///
/// Canonical form is `WSP-XXXX-XXXX-XXXX`: the fixed `WSP` prefix followed
/// by three dash-separated groups of four uppercase alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessKey(String);

/// Characters allowed in key groups.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

impl AccessKey {
    pub const PREFIX: &'static str = "WSP";
    pub const GROUPS: usize = 3;
    pub const GROUP_LEN: usize = 4;

    /// Validate a raw string and wrap it as an access key.
    ///
    /// Malformed input is rejected here, before any store lookup; an
    /// identity is never created for a key that fails this check.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let raw = raw.trim();

        let mut parts = raw.split('-');
        if parts.next() != Some(Self::PREFIX) {
            return Err(KeyError::BadPrefix);
        }

        let mut groups = 0;
        for group in parts {
            if group.len() != Self::GROUP_LEN
                || !group.bytes().all(|b| CHARSET.contains(&b))
            {
                return Err(KeyError::BadGroup(groups + 1));
            }
            groups += 1;
        }
        if groups != Self::GROUPS {
            return Err(KeyError::WrongGroupCount(groups));
        }

        Ok(Self(raw.to_string()))
    }

    /// Generate a new random, well-formed key.
    ///
    /// The server never mints keys on its own; this exists for clients,
    /// seeding tools, and tests.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let mut key = String::from(Self::PREFIX);
        for _ in 0..Self::GROUPS {
            key.push('-');
            for _ in 0..Self::GROUP_LEN {
                let idx = rng.gen_range(0..CHARSET.len());
                key.push(CHARSET[idx] as char);
            }
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AccessKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccessKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AccessKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}
