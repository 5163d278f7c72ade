//! Per-direction record protection state.

use std::fmt;

use log::debug;

use crate::error::{DecryptError, Error};
use crate::tls::cipher::{self, RecordCipher};
use crate::tls::suite::{self, CipherSuiteDescriptor, KeyLayout};
use crate::tls::version::TLS13;
use crate::tls::{ContentType, RecordHeader, MAX_PLAINTEXT_LEN};

/// Smallest writer fragment accepted by [`ConnectionState::with_max_fragment_len`].
pub const MIN_FRAGMENT_LEN: usize = 64;

/// Mutable crypto context for one traffic direction.
///
/// Read and write directions always get separate instances, even when they
/// are seeded with the same material. Not shareable across threads without
/// external synchronisation; the reader or writer that owns it is the only
/// thing that advances it.
pub struct ConnectionState {
    version: u16,
    descriptor: Option<&'static CipherSuiteDescriptor>,
    cipher: Option<Box<dyn RecordCipher>>,
    seq: u64,
    exhausted: bool,
    broken: bool,
    max_fragment_len: usize,
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("version", &format_args!("{:#06x}", self.version))
            .field("suite", &self.descriptor.map(|d| d.name))
            .field("seq", &self.seq)
            .field("exhausted", &self.exhausted)
            .field("broken", &self.broken)
            .finish()
    }
}

impl ConnectionState {
    /// Build a state for `(version, suite)`.
    ///
    /// `key_material` is a single secret blob; the suite takes
    /// `mac_key || enc_key` from its front. `iv` supplies the fixed IV/salt
    /// (ignored by suites that carry their IV in each record).
    pub fn new(
        version: u16,
        suite: u16,
        key_material: &[u8],
        iv: &[u8],
        sequence: u64,
    ) -> Result<Self, Error> {
        let descriptor = suite::lookup(version, suite)?;
        let layout = descriptor.layout(version);
        if key_material.len() < layout.key_material_len() {
            return Err(Error::KeyMaterial {
                what: "key material",
                needed: layout.key_material_len(),
                got: key_material.len(),
            });
        }
        if iv.len() < layout.fixed_iv_len {
            return Err(Error::KeyMaterial {
                what: "IV",
                needed: layout.fixed_iv_len,
                got: iv.len(),
            });
        }
        let cipher = cipher::build(descriptor, version, key_material, iv)?;
        debug!(
            "connection state: {} version {:#06x} seq {}",
            descriptor.name, version, sequence
        );
        Ok(ConnectionState {
            version,
            descriptor: Some(descriptor),
            cipher: Some(cipher),
            seq: sequence,
            exhausted: false,
            broken: false,
            max_fragment_len: MAX_PLAINTEXT_LEN,
        })
    }

    /// A state with no cipher context: records pass through unprotected.
    ///
    /// Used to read a cleartext handshake before any keys exist.
    pub fn cleartext(version: u16) -> Self {
        ConnectionState {
            version,
            descriptor: None,
            cipher: None,
            seq: 0,
            exhausted: false,
            broken: false,
            max_fragment_len: MAX_PLAINTEXT_LEN,
        }
    }

    /// Cap the plaintext size of records produced by the writer
    /// (RFC 6066 max_fragment_length style).
    pub fn with_max_fragment_len(mut self, len: usize) -> Result<Self, Error> {
        if !(MIN_FRAGMENT_LEN..=MAX_PLAINTEXT_LEN).contains(&len) {
            return Err(Error::InvalidConfig(format!(
                "max fragment length {} outside {}..={}",
                len, MIN_FRAGMENT_LEN, MAX_PLAINTEXT_LEN
            )));
        }
        self.max_fragment_len = len;
        Ok(self)
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn suite(&self) -> Option<&'static CipherSuiteDescriptor> {
        self.descriptor
    }

    pub fn is_cleartext(&self) -> bool {
        self.cipher.is_none()
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn max_fragment_len(&self) -> usize {
        self.max_fragment_len
    }

    /// Sequence number the next record will use.
    pub fn sequence(&self) -> Result<u64, Error> {
        if self.exhausted {
            return Err(Error::SequenceExhausted);
        }
        Ok(self.seq)
    }

    /// Return the sequence number for the next record and advance past it.
    ///
    /// 2^64-1 is usable once; after that every call fails instead of wrapping.
    pub fn next_sequence(&mut self) -> Result<u64, Error> {
        let current = self.sequence()?;
        match current.checked_add(1) {
            Some(next) => self.seq = next,
            None => self.exhausted = true,
        }
        Ok(current)
    }

    /// Largest declared record payload accepted from the wire.
    pub fn max_record_len(&self) -> usize {
        self.layout()
            .map(|l| l.max_record_len())
            .unwrap_or(MAX_PLAINTEXT_LEN)
    }

    pub(crate) fn is_tls13(&self) -> bool {
        self.version == TLS13 && self.cipher.is_some()
    }

    fn layout(&self) -> Option<KeyLayout> {
        self.descriptor.map(|d| d.layout(self.version))
    }

    fn check_usable(&self) -> Result<(), Error> {
        if self.broken {
            return Err(DecryptError::ConnectionBroken.into());
        }
        Ok(())
    }

    /// Protect one record's plaintext under the next sequence number.
    /// Returns the outer content type and the record payload.
    pub(crate) fn seal(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        self.check_usable()?;
        let seq = self.next_sequence()?;
        match self.cipher.as_mut() {
            Some(cipher) => cipher.seal(seq, content_type, self.version, plaintext),
            None => Ok((content_type, plaintext.to_vec())),
        }
    }

    /// Remove protection from one framed record.
    ///
    /// The sequence number advances once the record authenticates. A
    /// decryption failure, or a TLS 1.3 inner plaintext with no valid content
    /// type, breaks the state.
    pub(crate) fn open(
        &mut self,
        header: &RecordHeader,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        self.check_usable()?;
        let seq = self.sequence()?;
        let result = match self.cipher.as_mut() {
            Some(cipher) => cipher.open(seq, header, payload),
            None => Ok((header.content_type, payload.to_vec())),
        };
        let (content_type, data) = match result {
            Ok(opened) => opened,
            Err(e) => {
                if matches!(e, Error::Decrypt(_)) {
                    self.broken = true;
                }
                return Err(e);
            }
        };
        self.next_sequence()?;
        if !self.is_tls13() {
            return Ok((content_type, data));
        }
        cipher::split_inner_plaintext(data).inspect_err(|e| {
            debug!("authenticated record at seq {} is unusable: {}", seq, e);
            self.broken = true;
        })
    }
}
