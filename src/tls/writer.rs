//! Record writer: split plaintext into records, protect each one, and write
//! them to a sink.

use std::io::{self, ErrorKind, Write};

use log::debug;

use crate::error::{Error, WriteError};
use crate::tls::cipher::outer_header;
use crate::tls::state::ConnectionState;
use crate::tls::{ContentType, RECORD_HEADER_LEN};

/// Write `plaintext` as application data records.
///
/// Returns the number of bytes written to `sink`, headers included.
pub fn write_records<W: Write + ?Sized>(
    sink: &mut W,
    plaintext: &[u8],
    state: &mut ConnectionState,
) -> Result<usize, WriteError> {
    write_records_of_type(sink, ContentType::ApplicationData, plaintext, state)
}

/// Write `plaintext` as records of `content_type`.
///
/// Chunks are at most the state's fragment length. An empty `plaintext`
/// still produces one (empty) record. On failure the error reports how many
/// bytes reached the sink; a record cut short is never resumed, so a retry
/// must start from a fresh record.
pub fn write_records_of_type<W: Write + ?Sized>(
    sink: &mut W,
    content_type: ContentType,
    plaintext: &[u8],
    state: &mut ConnectionState,
) -> Result<usize, WriteError> {
    let mut written = 0;
    let fragment = state.max_fragment_len();
    let chunks: Vec<&[u8]> = if plaintext.is_empty() {
        vec![plaintext]
    } else {
        plaintext.chunks(fragment).collect()
    };

    for chunk in chunks {
        let record = build_record(content_type, chunk, state)
            .map_err(|source| WriteError { written, source })?;
        match write_fully(sink, &record) {
            Ok(n) => written += n,
            Err((n, e)) => {
                return Err(WriteError {
                    written: written + n,
                    source: e.into(),
                })
            }
        }
    }

    sink.flush().map_err(|e| WriteError {
        written,
        source: e.into(),
    })?;
    debug!("wrote {} bytes of {} as {} bytes", plaintext.len(), content_type, written);
    Ok(written)
}

/// Assemble header and protected payload for one chunk.
fn build_record(
    content_type: ContentType,
    chunk: &[u8],
    state: &mut ConnectionState,
) -> Result<Vec<u8>, Error> {
    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + chunk.len() + 64);
    record.extend_from_slice(&outer_header(content_type, state.version(), 0).encode());

    let (outer_type, payload) = state.seal(content_type, chunk)?;
    let len = u16::try_from(payload.len())
        .map_err(|_| Error::Seal("protected record exceeds 65535 bytes"))?;
    record[0] = outer_type.as_u8();
    record[3..RECORD_HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Like `write_all`, but reports how far it got before failing.
fn write_fully<W: Write + ?Sized>(sink: &mut W, buf: &[u8]) -> Result<usize, (usize, io::Error)> {
    let mut off = 0;
    while off < buf.len() {
        match sink.write(&buf[off..]) {
            Ok(0) => return Err((off, io::Error::from(ErrorKind::WriteZero))),
            Ok(n) => off += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err((off, e)),
        }
    }
    Ok(off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::version::{TLS12, TLS13};

    /// Sink that accepts `limit` bytes and then fails.
    struct FailingSink {
        accepted: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.accepted.len();
            if room == 0 {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "peer went away"));
            }
            let n = room.min(buf.len());
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_plaintext_writes_one_empty_record() {
        let mut out = Vec::new();
        let mut state = ConnectionState::cleartext(TLS12);
        let n = write_records(&mut out, b"", &mut state).unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, [0x17, 0x03, 0x03, 0x00, 0x00]);
        assert_eq!(state.sequence().unwrap(), 1);
    }

    #[test]
    fn plaintext_is_split_at_fragment_len() {
        let mut out = Vec::new();
        let mut state = ConnectionState::cleartext(TLS12)
            .with_max_fragment_len(100)
            .unwrap();
        let n = write_records(&mut out, &[7u8; 250], &mut state).unwrap();
        assert_eq!(n, 250 + 3 * 5);
        assert_eq!(&out[..5], &[0x17, 0x03, 0x03, 0x00, 100]);
        assert_eq!(&out[105..110], &[0x17, 0x03, 0x03, 0x00, 100]);
        assert_eq!(&out[210..215], &[0x17, 0x03, 0x03, 0x00, 50]);
        assert_eq!(state.sequence().unwrap(), 3);
    }

    #[test]
    fn length_field_covers_protected_payload() {
        let mut out = Vec::new();
        let mut state = ConnectionState::new(TLS12, 0xC02F, &[1; 52], &[2; 16], 0).unwrap();
        write_records(&mut out, b"hello", &mut state).unwrap();
        // explicit nonce (8) + plaintext (5) + tag (16)
        assert_eq!(&out[..5], &[0x17, 0x03, 0x03, 0x00, 29]);
        assert_eq!(out.len(), 5 + 29);
    }

    #[test]
    fn tls13_records_use_legacy_outer_header() {
        let mut out = Vec::new();
        let mut state = ConnectionState::new(TLS13, 0x1303, &[1; 52], &[2; 16], 0).unwrap();
        write_records_of_type(&mut out, ContentType::Handshake, b"finished", &mut state).unwrap();
        assert_eq!(&out[..3], &[0x17, 0x03, 0x03]);
        let len = u16::from_be_bytes([out[3], out[4]]) as usize;
        assert_eq!(len, 8 + 1 + 16);
    }

    #[test]
    fn failed_write_reports_bytes_written() {
        let mut sink = FailingSink {
            accepted: Vec::new(),
            limit: 107,
        };
        let mut state = ConnectionState::cleartext(TLS12)
            .with_max_fragment_len(100)
            .unwrap();
        let err = write_records(&mut sink, &[0u8; 300], &mut state).unwrap_err();
        assert_eq!(err.written, 107);
        assert!(matches!(err.source, Error::Io(ref e) if e.kind() == ErrorKind::BrokenPipe));
        assert_eq!(sink.accepted.len(), 107);
    }

    #[test]
    fn broken_state_refuses_to_write() {
        use crate::error::DecryptError;
        use crate::tls::RecordHeader;

        let mut state = ConnectionState::new(TLS12, 0xC02F, &[1; 52], &[2; 16], 0).unwrap();
        let header = RecordHeader {
            content_type: ContentType::ApplicationData,
            version: TLS12,
            len: 32,
        };
        assert!(state.open(&header, &[0; 32]).is_err());
        let err = write_records(&mut Vec::new(), b"x", &mut state).unwrap_err();
        assert_eq!(err.written, 0);
        assert_eq!(err.source.decrypt_error(), Some(DecryptError::ConnectionBroken));
    }
}
