//! Cluster commands - operations that go through Raft consensus.
//!
//! A command is encoded before it is proposed. The encoded bytes are the unit
//! of replication: the Raft log stores them untouched and every replica decodes
//! them again inside the state machine, in commit order.

use crate::error::ApplyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The mutation a command performs on the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert or overwrite a key.
    Set,
    /// Remove a key if present.
    Delete,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ApplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Operation::Set),
            "delete" => Ok(Operation::Delete),
            other => Err(ApplyError::UnknownOperation(other.to_string())),
        }
    }
}

/// A key-value mutation replicated through the Raft log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The operation to perform.
    pub op: Operation,
    /// Target key.
    pub key: String,
    /// New value. Only meaningful for [`Operation::Set`].
    pub value: String,
}

/// Wire representation.
///
/// `op` stays a plain string here so that an unknown operation is reported as
/// [`ApplyError::UnknownOperation`] rather than as a decode failure.
#[derive(Serialize, Deserialize)]
struct WireCommand {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    op: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    value: String,
}

impl Command {
    /// Build a set command.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: Operation::Set,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build a delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            op: Operation::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Encode the command into the bytes that are proposed to the Raft log.
    pub fn encode(&self) -> Result<EncodedCommand, serde_json::Error> {
        let wire = WireCommand {
            op: self.op.as_str().to_string(),
            key: self.key.clone(),
            value: match self.op {
                Operation::Set => self.value.clone(),
                Operation::Delete => String::new(),
            },
        };
        serde_json::to_vec(&wire).map(EncodedCommand)
    }

    /// Decode a command from its replicated form.
    pub fn decode(bytes: &[u8]) -> Result<Self, ApplyError> {
        let wire: WireCommand =
            serde_json::from_slice(bytes).map_err(|e| ApplyError::decode("command", e))?;
        let op = wire.op.parse::<Operation>()?;

        Ok(Self {
            op,
            key: wire.key,
            value: wire.value,
        })
    }
}

/// An encoded [`Command`] as stored in a Raft log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedCommand(Vec<u8>);

impl EncodedCommand {
    /// Wrap raw bytes. Nothing is validated until the entry is applied.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
