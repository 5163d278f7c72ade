//! TLS 1.x record layer.
//!
//! ```text
//! bytes --> reader (frame, decrypt via ConnectionState) --> plaintext
//!              |
//!              +--> alert::classify on type mismatch
//!
//! plaintext --> writer (chunk, encrypt via ConnectionState) --> bytes
//!
//! raw ClientHello record --> handshake::validate_client_hello (no keys needed)
//! ```
//!
//! Key material is supplied by the caller; nothing here performs a handshake
//! or derives keys.

pub mod alert;
pub(crate) mod cipher;
pub mod handshake;
pub mod keylog;
pub mod reader;
pub mod state;
pub mod suite;
pub mod writer;

use std::fmt;

use crate::error::{Field, FramingError};

/// type(1) + version(2) + length(2)
pub const RECORD_HEADER_LEN: usize = 5;

/// Maximum plaintext carried by one record (2^14).
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Wire protocol versions.
pub mod version {
    pub const TLS10: u16 = 0x0301;
    pub const TLS11: u16 = 0x0302;
    pub const TLS12: u16 = 0x0303;
    pub const TLS13: u16 = 0x0304;
}

/// Record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = FramingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            other => Err(FramingError::InvalidRecordType(other)),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentType::ChangeCipherSpec => "change_cipher_spec",
            ContentType::Alert => "alert",
            ContentType::Handshake => "handshake",
            ContentType::ApplicationData => "application_data",
        };
        write!(f, "{}({})", name, self.as_u8())
    }
}

/// A parsed 5-byte record header. `len` is the declared payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: u16,
    pub len: usize,
}

impl RecordHeader {
    /// Parse the first five bytes of `buf`. Trailing bytes are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(FramingError::Truncated {
                field: Field::RecordHeader,
                needed: RECORD_HEADER_LEN,
                available: buf.len(),
            });
        }
        let content_type = ContentType::try_from(buf[0])?;
        let version = u16::from_be_bytes([buf[1], buf[2]]);
        if buf[1] != 3 {
            return Err(FramingError::InvalidVersion(version));
        }
        let len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
        Ok(RecordHeader {
            content_type,
            version,
            len,
        })
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let len = (self.len as u16).to_be_bytes();
        let ver = self.version.to_be_bytes();
        [self.content_type.as_u8(), ver[0], ver[1], len[0], len[1]]
    }
}

/// One decoded record: content type, wire version and decrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub version: u16,
    pub data: Vec<u8>,
}
