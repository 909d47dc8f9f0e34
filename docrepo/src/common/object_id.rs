use crate::common::OBJECT_ID_LENGTH;
use crate::errors::{ErrorKind, RepoError, RepoResult};
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU32, Ordering};

static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| OsRng.gen::<[u8; 5]>());

static COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(OsRng.gen_range(0..0x00ff_ffff)));

/// A 12-byte globally unique identifier.
///
/// Layout: 4 bytes of big-endian seconds since the Unix epoch, 5 bytes unique to
/// the process and a 3-byte big-endian counter. Identifiers created by one process
/// therefore sort by creation second.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId {
    bytes: [u8; OBJECT_ID_LENGTH],
}

impl ObjectId {
    /// Generates a new identifier.
    pub fn new() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) & 0x00ff_ffff;

        let mut bytes = [0u8; OBJECT_ID_LENGTH];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId { bytes }
    }

    pub fn from_bytes(bytes: [u8; OBJECT_ID_LENGTH]) -> Self {
        ObjectId { bytes }
    }

    /// Parses an identifier from its 24-character hexadecimal form.
    pub fn parse_str(hex: &str) -> RepoResult<Self> {
        if hex.len() != OBJECT_ID_LENGTH * 2 || !hex.is_ascii() {
            log::error!("Invalid object id {}", hex);
            return Err(RepoError::new(
                &format!("Invalid object id '{}': expected 24 hexadecimal characters", hex),
                ErrorKind::ValidationError,
            ));
        }

        let mut bytes = [0u8; OBJECT_ID_LENGTH];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &hex[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                log::error!("Invalid object id {}", hex);
                RepoError::new(
                    &format!("Invalid object id '{}': not hexadecimal", hex),
                    ErrorKind::ValidationError,
                )
            })?;
        }
        Ok(ObjectId { bytes })
    }

    pub fn bytes(&self) -> [u8; OBJECT_ID_LENGTH] {
        self.bytes
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Returns the creation time encoded in the identifier.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let seconds = u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        Utc.timestamp_opt(seconds as i64, 0)
            .single()
            .unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
