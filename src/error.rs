//! Error types for tlscodec.
//!
//! - [`enum@Error`] - Umbrella error returned by every record-layer entry point
//! - [`FramingError`] - Header/length inconsistencies and truncated input
//! - [`DecryptError`] - Authentication or padding failure; fatal for the state
//! - [`UnexpectedAlertError`] - An alert arrived where other content was expected
//! - [`UnsupportedSuiteError`] - No registered descriptor for a (version, suite) pair
//! - [`WriteError`] - A writer failure together with the bytes already emitted
//! - [`ReadRecordsError`] - A reader failure together with the records already decoded

use std::fmt;

use thiserror::Error;

use crate::tls::alert::Alert;
use crate::tls::{ContentType, Record};

/// Main error type for record-layer operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("decrypt error: {0}")]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    UnexpectedAlert(#[from] UnexpectedAlertError),

    #[error(transparent)]
    UnsupportedSuite(#[from] UnsupportedSuiteError),

    #[error("unexpected record type: expected {expected}, got {actual}")]
    UnexpectedRecordType {
        expected: ContentType,
        actual: ContentType,
    },

    /// Every sequence number up to 2^64-1 has been used on this state.
    #[error("sequence number space exhausted")]
    SequenceExhausted,

    #[error("{what} too short: need {needed} bytes, got {got}")]
    KeyMaterial {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("record encryption failed: {0}")]
    Seal(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The decryption-layer classification carried by this error, if any.
    ///
    /// Besides plain [`Error::Decrypt`], this also looks inside an
    /// [`UnexpectedAlertError`] that was raised on a state without a
    /// cipher context.
    pub fn decrypt_error(&self) -> Option<DecryptError> {
        match self {
            Error::Decrypt(e) => Some(*e),
            Error::UnexpectedAlert(e) => e.decrypt,
            _ => None,
        }
    }

    /// The alert carried by this error, if it is an unexpected-alert error.
    pub fn alert(&self) -> Option<Alert> {
        match self {
            Error::UnexpectedAlert(e) => Some(e.alert),
            _ => None,
        }
    }

    /// The framing failure carried by this error, if any.
    pub fn framing_error(&self) -> Option<&FramingError> {
        match self {
            Error::Framing(e) => Some(e),
            _ => None,
        }
    }
}

/// Which structural field a [`FramingError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RecordHeader,
    RecordPayload,
    HandshakeHeader,
    HandshakeBody,
    ClientVersionAndRandom,
    SessionId,
    CipherSuites,
    CompressionMethods,
    Extensions,
    Extension,
    AlertPayload,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::RecordHeader => "record header",
            Field::RecordPayload => "record payload",
            Field::HandshakeHeader => "handshake header",
            Field::HandshakeBody => "handshake body",
            Field::ClientVersionAndRandom => "client version and random",
            Field::SessionId => "session id",
            Field::CipherSuites => "cipher suites",
            Field::CompressionMethods => "compression methods",
            Field::Extensions => "extensions",
            Field::Extension => "extension",
            Field::AlertPayload => "alert payload",
        };
        f.write_str(name)
    }
}

/// Structural errors. Always locally detectable and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes are present than the field needs.
    #[error("{field} truncated: need {needed} bytes, {available} available")]
    Truncated {
        field: Field,
        needed: usize,
        available: usize,
    },

    /// A length prefix disagrees with the bytes that enclose it.
    #[error("{field} length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        field: Field,
        declared: usize,
        actual: usize,
    },

    #[error("{0} must not be empty")]
    Empty(Field),

    #[error("invalid record type {0}")]
    InvalidRecordType(u8),

    #[error("record type {actual} where {expected} was required")]
    WrongRecordType {
        expected: ContentType,
        actual: ContentType,
    },

    #[error("invalid record version {0:#06x}")]
    InvalidVersion(u16),

    #[error("record length {len} exceeds maximum {max}")]
    RecordOverflow { len: usize, max: usize },

    #[error("unexpected handshake message type {0}")]
    UnexpectedHandshakeType(u8),

    #[error("cipher suites length {0} is odd")]
    OddCipherSuitesLength(usize),

    #[error("session id length {0} exceeds 32")]
    SessionIdTooLong(usize),

    #[error("{0} trailing bytes after extensions")]
    TrailingBytes(usize),

    #[error("alert payload is {0} bytes, expected 2")]
    MalformedAlert(usize),
}

/// Record protection failures. Fatal for the connection state that produced
/// them: sequence/nonce alignment cannot be trusted afterwards.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptError {
    /// MAC, padding or AEAD tag verification failed.
    #[error("bad record MAC")]
    BadRecordMac,

    /// The state has no cipher context to check the record against.
    #[error("no cipher context established")]
    NoCipherContext,

    /// A previous decryption failure left this state unusable.
    #[error("connection state is broken by an earlier decryption failure")]
    ConnectionBroken,
}

/// An alert record was found in place of the caller's expected content.
///
/// `decrypt` is set when the alert arrived on a state with no valid cipher
/// context, so callers can branch on either facet.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unexpected alert: {alert}")]
pub struct UnexpectedAlertError {
    pub alert: Alert,
    pub decrypt: Option<DecryptError>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unsupported cipher suite {suite:#06x} for version {version:#06x}")]
pub struct UnsupportedSuiteError {
    pub version: u16,
    pub suite: u16,
}

/// A writer failure. `written` counts the bytes that reached the sink
/// before the failure; a partially written record is never resumed.
#[derive(Error, Debug)]
#[error("wrote {written} bytes before failing: {source}")]
pub struct WriteError {
    pub written: usize,
    #[source]
    pub source: Error,
}

/// A failure part way through a stream of records. `records` holds every
/// record decoded before the failure; their sequence numbers are already
/// spent, so they cannot be read again.
#[derive(Error, Debug)]
#[error("decoded {} records before failing: {source}", .records.len())]
pub struct ReadRecordsError {
    pub records: Vec<Record>,
    #[source]
    pub source: Error,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
