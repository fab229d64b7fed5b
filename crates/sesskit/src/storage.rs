//! Session file format reader/writer.
//!
//! A session file is a fixed 40-byte little-endian header followed by the
//! store mapping as a JSON object.

use std::io::{Read, Write};
use std::path::Path;

use crate::types::{SessionData, SessionError, SessionResult};

/// Magic bytes: "SESS"
const SESS_MAGIC: u32 = 0x53455353;

/// Current format version.
const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 40;

/// In-memory image of one persisted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFile {
    pub data: SessionData,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SessionFile {
    pub fn new(data: SessionData) -> Self {
        let now = unix_now();
        Self {
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Writer for session files.
pub struct SessWriter;

/// Reader for session files.
pub struct SessReader;

impl SessWriter {
    /// Write a session to a file, creating parent directories.
    pub fn write_to_file(file: &SessionFile, path: &Path) -> SessionResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = std::fs::File::create(path)?;
        Self::write_to(file, &mut out)
    }

    /// Write a session to any writer.
    pub fn write_to<W: Write>(file: &SessionFile, writer: &mut W) -> SessionResult<()> {
        let payload = serde_json::to_vec(&file.data)
            .map_err(|e| SessionError::Storage(format!("Serialization failed: {e}")))?;

        let mut header = [0u8; HEADER_SIZE];
        write_u32(&mut header[0..4], SESS_MAGIC);
        write_u16(&mut header[4..6], FORMAT_VERSION);
        write_u16(&mut header[6..8], 0); // flags
        write_u64(&mut header[8..16], file.data.len() as u64);
        write_u64(&mut header[16..24], file.created_at);
        write_u64(&mut header[24..32], file.updated_at);
        write_u64(&mut header[32..40], payload.len() as u64);

        writer.write_all(&header)?;
        writer.write_all(&payload)?;

        Ok(())
    }
}

impl SessReader {
    /// Read a session from a file.
    pub fn read_from_file(path: &Path) -> SessionResult<SessionFile> {
        let mut file = std::fs::File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Read a session from any reader.
    pub fn read_from<R: Read>(reader: &mut R) -> SessionResult<SessionFile> {
        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|e| SessionError::Storage(format!("Truncated header: {e}")))?;

        let magic = read_u32(&header[0..4]);
        if magic != SESS_MAGIC {
            return Err(SessionError::Storage(format!(
                "Invalid magic: expected 0x{SESS_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = read_u16(&header[4..6]);
        if version != FORMAT_VERSION {
            return Err(SessionError::Storage(format!(
                "Unsupported version: {version}"
            )));
        }

        let entry_count = read_u64(&header[8..16]);
        let created_at = read_u64(&header[16..24]);
        let updated_at = read_u64(&header[24..32]);
        let payload_len = read_u64(&header[32..40]);

        // Header length is untrusted: never preallocate from it.
        let mut payload = Vec::new();
        reader.by_ref().take(payload_len).read_to_end(&mut payload)?;
        if payload.len() as u64 != payload_len {
            return Err(SessionError::Storage(format!(
                "Truncated payload: header declares {payload_len} bytes, found {}",
                payload.len()
            )));
        }

        let data: SessionData = serde_json::from_slice(&payload)
            .map_err(|e| SessionError::Storage(format!("Deserialization failed: {e}")))?;

        if data.len() as u64 != entry_count {
            tracing::warn!(
                "Session file header lists {entry_count} entries, payload has {}",
                data.len()
            );
        }

        Ok(SessionFile {
            data,
            created_at,
            updated_at,
        })
    }
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// Little-endian byte helpers
fn write_u16(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}
fn write_u32(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}
fn write_u64(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}
fn read_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SessionFile {
        let mut data = SessionData::new();
        data.insert("app_user".to_string(), json!({"id": 7, "name": "ada"}));
        data.insert("app_success".to_string(), json!("Saved!"));
        SessionFile::new(data)
    }

    #[test]
    fn test_roundtrip_with_entries() {
        let file = sample();
        let mut buf = Vec::new();
        SessWriter::write_to(&file, &mut buf).unwrap();

        let loaded = SessReader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.data["app_user"]["name"], "ada");
    }

    #[test]
    fn test_invalid_magic() {
        let mut buf = [0u8; HEADER_SIZE + 2];
        buf[HEADER_SIZE..].copy_from_slice(b"{}");
        let result = SessReader::read_from(&mut &buf[..]);
        assert!(matches!(result, Err(SessionError::Storage(_))));
    }

    #[test]
    fn test_truncated_file() {
        let mut buf = Vec::new();
        SessWriter::write_to(&sample(), &mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(SessReader::read_from(&mut &buf[..]).is_err());
    }

    #[test]
    fn test_forged_payload_length() {
        let mut buf = Vec::new();
        SessWriter::write_to(&sample(), &mut buf).unwrap();
        buf[32..40].copy_from_slice(&u64::MAX.to_le_bytes());

        let result = SessReader::read_from(&mut &buf[..]);
        assert!(matches!(result, Err(SessionError::Storage(_))));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sess_test");

        SessWriter::write_to_file(&sample(), &path).unwrap();
        let loaded = SessReader::read_from_file(&path).unwrap();
        assert_eq!(loaded.data.len(), 2);
    }
}
