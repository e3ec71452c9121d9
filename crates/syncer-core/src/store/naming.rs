//! Key naming for the exports bucket.
//!
//! ```text
//! {base_prefix}/{instance}.{iteration}.tgz
//! ```
//!
//! Keys are flat under the prefix so that both sides of an exchange can
//! derive the key from nothing more than the instance code and the
//! iteration number.

use object_store::path::Path;

use crate::types::PacketName;

#[derive(Debug, Clone)]
pub struct KeyBuilder {
    /// Base prefix inside the bucket (e.g. "avapolos/exports")
    base_prefix: String,
}

impl KeyBuilder {
    pub fn new(base_prefix: impl Into<String>) -> Self {
        let prefix = base_prefix.into().trim_matches('/').to_string();
        Self {
            base_prefix: prefix,
        }
    }

    /// Key for a packet name (`<instance>.<iteration>.tgz`).
    pub fn packet_key(&self, name: &str) -> Path {
        if self.base_prefix.is_empty() {
            Path::from(name)
        } else {
            Path::from(format!("{}/{}", self.base_prefix, name))
        }
    }

    /// Prefix for listing packets.
    pub fn prefix(&self) -> Option<Path> {
        if self.base_prefix.is_empty() {
            None
        } else {
            Some(Path::from(self.base_prefix.as_str()))
        }
    }

    /// Extract the packet name from a listed key, ignoring foreign objects.
    pub fn parse_packet_key(&self, key: &Path) -> Option<PacketName> {
        let filename = key.filename()?;
        PacketName::parse(filename)
    }
}
