//! Merge cursor checkpoint
//!
//! ```text
//! [bincode(MergeCheckpoint)][CRC32: u32 LE]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LStoreError, Result};

/// Durable merge progress of one table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCheckpoint {
    /// Tail records already folded into base pages
    pub tps: u64,

    /// Tail writes since the last merge trigger
    pub pending: u64,
}

impl MergeCheckpoint {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = bincode::serialize(self)?;
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(LStoreError::Corruption(format!(
                "merge checkpoint too short: {} bytes",
                bytes.len()
            )));
        }
        let (body, tail) = bytes.split_at(bytes.len() - 4);
        let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(LStoreError::Corruption(format!(
                "merge checkpoint checksum mismatch: stored {:08x}, computed {:08x}",
                stored, computed
            )));
        }
        Ok(bincode::deserialize(body)?)
    }
}
