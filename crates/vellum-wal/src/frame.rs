use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vellum_types::{FileKey, SessionId};

use crate::error::{WalError, WalResult};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// The unsaved state of one open document.
///
/// On-disk format (one frame per file):
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized WalEntry)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    pub file_key: FileKey,
    pub content: String,
    pub updated_at: DateTime<Utc>,
    /// Engine session that wrote the entry.
    pub session_id: SessionId,
}

/// Serialize and frame an entry.
pub fn encode_frame(entry: &WalEntry) -> WalResult<Vec<u8>> {
    let payload = bincode::serialize(entry).map_err(|e| WalError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| WalError::Serialization(format!("entry of {} bytes is too large", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Validate and decode a frame produced by [`encode_frame`].
///
/// A torn write shows up as [`WalError::InvalidLength`], bit rot as
/// [`WalError::CrcMismatch`].
pub fn decode_frame(bytes: &[u8]) -> WalResult<WalEntry> {
    if bytes.len() < HEADER_SIZE {
        return Err(WalError::InvalidLength {
            length: 0,
            available: bytes.len(),
        });
    }
    let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let expected = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != length as usize {
        return Err(WalError::InvalidLength {
            length,
            available: payload.len(),
        });
    }

    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(WalError::CrcMismatch { expected, actual });
    }

    bincode::deserialize(payload).map_err(|e| WalError::Serialization(e.to_string()))
}
