//! ClientHello validation.
//!
//! [`validate_client_hello`] takes a raw, untouched record and checks every
//! length field against the bytes that actually remain before reading past
//! it. It needs no key material and never panics, whatever the input.

use tls_parser::{parse_tls_client_hello_extensions, SNIType, TlsCipherSuite, TlsExtension};

use crate::error::{Field, FramingError};
use crate::tls::{ContentType, RecordHeader, RECORD_HEADER_LEN};

/// Handshake message type of a ClientHello.
pub const CLIENT_HELLO: u8 = 1;

/// type(1) + length(3)
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// client_version(2) + random(32)
const VERSION_AND_RANDOM_LEN: usize = 34;

const MAX_SESSION_ID_LEN: usize = 32;

/// Bounds-checked cursor over a byte slice. Every read compares against the
/// bytes remaining and reports the field that came up short.
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize, field: Field) -> Result<&'a [u8], FramingError> {
        if n > self.buf.len() {
            return Err(FramingError::Truncated {
                field,
                needed: n,
                available: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self, field: Field) -> Result<u8, FramingError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: Field) -> Result<u16, FramingError> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self, field: Field) -> Result<usize, FramingError> {
        let b = self.take(3, field)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]) as usize)
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }
}

/// Borrowed view of a validated ClientHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientHello<'a> {
    /// Version from the record header.
    pub record_version: u16,
    /// Legacy client_version from the message body.
    pub client_version: u16,
    pub random: &'a [u8],
    pub session_id: &'a [u8],
    pub compression_methods: &'a [u8],
    cipher_suites: &'a [u8],
    extensions: Option<&'a [u8]>,
}

impl<'a> ClientHello<'a> {
    /// Offered cipher suite ids, in preference order.
    pub fn cipher_suites(&self) -> impl Iterator<Item = u16> + 'a {
        self.cipher_suites
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
    }

    /// IANA names of the offered suites; unknown ids are skipped.
    pub fn cipher_suite_names(&self) -> impl Iterator<Item = &'static str> + 'a {
        self.cipher_suites()
            .filter_map(TlsCipherSuite::from_id)
            .map(|cs| cs.name)
    }

    /// Whether an extensions block was present (it may still be empty).
    pub fn has_extensions(&self) -> bool {
        self.extensions.is_some()
    }

    /// Raw `(type, data)` pairs from the extensions block.
    pub fn extensions(&self) -> Extensions<'a> {
        Extensions {
            cursor: Cursor::new(self.extensions.unwrap_or_default()),
        }
    }

    /// Host name from the server_name extension.
    pub fn server_name(&self) -> Option<&'a str> {
        let (_, exts) = parse_tls_client_hello_extensions(self.extensions?).ok()?;
        exts.into_iter().find_map(|ext| match ext {
            TlsExtension::SNI(names) => names
                .into_iter()
                .find(|(kind, _)| *kind == SNIType::HostName)
                .and_then(|(_, name)| std::str::from_utf8(name).ok()),
            _ => None,
        })
    }

    /// Versions listed in the supported_versions extension. Empty when the
    /// extension is absent or does not decode.
    pub fn supported_versions(&self) -> Vec<u16> {
        let Some(block) = self.extensions else {
            return Vec::new();
        };
        let Ok((_, exts)) = parse_tls_client_hello_extensions(block) else {
            return Vec::new();
        };
        exts.into_iter()
            .find_map(|ext| match ext {
                TlsExtension::SupportedVersions(versions) => {
                    Some(versions.into_iter().map(|v| v.0).collect())
                }
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Iterator over an extensions block that has already been walked once by
/// the validator.
pub struct Extensions<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Iterator for Extensions<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let ext_type = self.cursor.u16(Field::Extension).ok()?;
        let len = self.cursor.u16(Field::Extension).ok()? as usize;
        let data = self.cursor.take(len, Field::Extension).ok()?;
        Some((ext_type, data))
    }
}

/// Validate a raw record as a ClientHello and return a view of its fields.
///
/// 1. The record header must be complete, of type handshake, and declare
///    exactly the number of bytes that follow it.
/// 2. The handshake header must be complete and name a ClientHello.
/// 3. The handshake length must be non-zero and match the remaining bytes.
/// 4. client_version and random must be present before anything else is read.
/// 5. session_id, cipher_suites, compression_methods and the optional
///    extensions block must each fit in what remains, and the extensions
///    block must consume it exactly.
pub fn validate_client_hello(raw: &[u8]) -> Result<ClientHello<'_>, FramingError> {
    let header = RecordHeader::parse(raw)?;
    if header.content_type != ContentType::Handshake {
        return Err(FramingError::WrongRecordType {
            expected: ContentType::Handshake,
            actual: header.content_type,
        });
    }
    let payload = &raw[RECORD_HEADER_LEN..];
    if header.len != payload.len() {
        return Err(FramingError::LengthMismatch {
            field: Field::RecordPayload,
            declared: header.len,
            actual: payload.len(),
        });
    }

    let mut msg = Cursor::new(payload);
    if msg.remaining() < HANDSHAKE_HEADER_LEN {
        return Err(FramingError::Truncated {
            field: Field::HandshakeHeader,
            needed: HANDSHAKE_HEADER_LEN,
            available: msg.remaining(),
        });
    }
    let msg_type = msg.u8(Field::HandshakeHeader)?;
    if msg_type != CLIENT_HELLO {
        return Err(FramingError::UnexpectedHandshakeType(msg_type));
    }
    let body_len = msg.u24(Field::HandshakeHeader)?;
    if body_len == 0 {
        return Err(FramingError::Empty(Field::HandshakeBody));
    }
    if body_len != msg.remaining() {
        return Err(FramingError::LengthMismatch {
            field: Field::HandshakeBody,
            declared: body_len,
            actual: msg.remaining(),
        });
    }

    let mut body = Cursor::new(msg.rest());
    let fixed = body.take(VERSION_AND_RANDOM_LEN, Field::ClientVersionAndRandom)?;
    let client_version = u16::from_be_bytes([fixed[0], fixed[1]]);
    let random = &fixed[2..];

    let session_id_len = body.u8(Field::SessionId)? as usize;
    if session_id_len > MAX_SESSION_ID_LEN {
        return Err(FramingError::SessionIdTooLong(session_id_len));
    }
    let session_id = body.take(session_id_len, Field::SessionId)?;

    let suites_len = body.u16(Field::CipherSuites)? as usize;
    if suites_len % 2 != 0 {
        return Err(FramingError::OddCipherSuitesLength(suites_len));
    }
    let cipher_suites = body.take(suites_len, Field::CipherSuites)?;

    let compression_len = body.u8(Field::CompressionMethods)? as usize;
    let compression_methods = body.take(compression_len, Field::CompressionMethods)?;

    let extensions = if body.remaining() == 0 {
        None
    } else {
        let ext_len = body.u16(Field::Extensions)? as usize;
        let block = body.take(ext_len, Field::Extensions)?;
        if body.remaining() != 0 {
            return Err(FramingError::TrailingBytes(body.remaining()));
        }
        walk_extensions(block)?;
        Some(block)
    };

    Ok(ClientHello {
        record_version: header.version,
        client_version,
        random,
        session_id,
        compression_methods,
        cipher_suites,
        extensions,
    })
}

/// Check that every `type(2) || len(2) || data` entry fits in the block.
fn walk_extensions(block: &[u8]) -> Result<(), FramingError> {
    let mut cursor = Cursor::new(block);
    while cursor.remaining() > 0 {
        cursor.u16(Field::Extension)?;
        let len = cursor.u16(Field::Extension)? as usize;
        cursor.take(len, Field::Extension)?;
    }
    Ok(())
}
