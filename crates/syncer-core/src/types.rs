//! Core data types: instance codes, ledger records and packet names.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};

/// Length of every instance code.
pub const INSTANCE_CODE_LEN: usize = 4;

/// Packet file extension (without the leading dot).
pub const PACKET_EXT: &str = "tgz";

/// A 4-character code identifying a participating deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceCode(String);

impl InstanceCode {
    pub fn new(code: impl Into<String>) -> SyncResult<Self> {
        let code = code.into();
        if code.chars().count() != INSTANCE_CODE_LEN {
            return Err(SyncError::Config(format!(
                "instance code must be exactly {} characters, got {:?}",
                INSTANCE_CODE_LEN, code
            )));
        }
        // Codes end up in object keys and file names.
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SyncError::Config(format!(
                "instance code must be ASCII alphanumeric, got {:?}",
                code
            )));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstanceCode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for InstanceCode {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceCode> for String {
    fn from(value: InstanceCode) -> Self {
        value.0
    }
}

/// Kind of synchronization recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Clone,
    Export,
    Import,
}

impl Operation {
    /// Single-character code stored in the ledger's `operation` column.
    pub fn code(self) -> char {
        match self {
            Operation::Clone => 'C',
            Operation::Export => 'E',
            Operation::Import => 'I',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'C' => Some(Operation::Clone),
            'E' => Some(Operation::Export),
            'I' => Some(Operation::Import),
            _ => None,
        }
    }

    pub(crate) fn code_str(self) -> &'static str {
        match self {
            Operation::Clone => "C",
            Operation::Export => "E",
            Operation::Import => "I",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Clone => "clone",
            Operation::Export => "export",
            Operation::Import => "import",
        };
        f.write_str(name)
    }
}

impl FromStr for Operation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clone" | "c" => Ok(Operation::Clone),
            "export" | "e" => Ok(Operation::Export),
            "import" | "i" => Ok(Operation::Import),
            other => Err(SyncError::Config(format!("unknown operation: {}", other))),
        }
    }
}

/// One row of the iteration ledger. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub instance: InstanceCode,
    pub iteration: u32,
    pub operation: Operation,
}

/// Name of an exchanged archive: `<instance>.<iteration>.tgz`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketName {
    pub instance: InstanceCode,
    pub iteration: u32,
}

impl PacketName {
    pub fn new(instance: InstanceCode, iteration: u32) -> Self {
        Self {
            instance,
            iteration,
        }
    }

    /// Parse `<instance>.<iteration>.tgz`. Iterations are positive with no fixed width.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(PACKET_EXT)?.strip_suffix('.')?;
        let (instance, iteration) = stem.split_once('.')?;
        if iteration.is_empty() || !iteration.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let iteration: u32 = iteration.parse().ok()?;
        if iteration == 0 {
            return None;
        }
        let instance = InstanceCode::new(instance).ok()?;
        Some(Self {
            instance,
            iteration,
        })
    }
}

impl fmt::Display for PacketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.instance, self.iteration, PACKET_EXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_code_requires_four_chars() {
        assert!(InstanceCode::new("IES1").is_ok());
        assert!(InstanceCode::new("IES").is_err());
        assert!(InstanceCode::new("IES12").is_err());
        assert!(InstanceCode::new("IE/1").is_err());
    }

    #[test]
    fn operation_codes() {
        for op in [Operation::Clone, Operation::Export, Operation::Import] {
            assert_eq!(Operation::from_code(op.code()), Some(op));
        }
        assert_eq!(Operation::from_code('X'), None);
        assert_eq!("Export".parse::<Operation>().unwrap(), Operation::Export);
    }

    #[test]
    fn packet_name_format() {
        let name = PacketName::new(InstanceCode::new("POLO").unwrap(), 12);
        assert_eq!(name.to_string(), "POLO.12.tgz");
    }

    #[test]
    fn packet_name_parse() {
        let name = PacketName::parse("POLO.123.tgz").unwrap();
        assert_eq!(name.instance.as_str(), "POLO");
        assert_eq!(name.iteration, 123);

        assert!(PacketName::parse("POLO.0.tgz").is_none());
        assert!(PacketName::parse("POLO.x.tgz").is_none());
        assert!(PacketName::parse("POL.1.tgz").is_none());
        assert!(PacketName::parse("POLO.1.tar.gz").is_none());
        assert!(PacketName::parse("POLO..tgz").is_none());
    }
}
