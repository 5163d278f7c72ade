//! Record reader.
//!
//! Two front ends share one framing/decoding core:
//!
//! - **Blocking stream**: [`read_record`], [`read_record_with`] and
//!   [`read_records`] pull from any [`Read`] until a record is complete.
//! - **Buffered**: [`RecordReader`] is fed bytes as they arrive and yields
//!   `Ok(None)` until a whole record is buffered.
//!
//! Records are returned one at a time in arrival order. Handshake messages
//! spanning several records are not reassembled.

use std::io::{ErrorKind, Read};

use log::{debug, warn};

use crate::error::{
    DecryptError, Error, Field, FramingError, ReadRecordsError, UnexpectedAlertError,
};
use crate::tls::alert;
use crate::tls::state::ConnectionState;
use crate::tls::{ContentType, Record, RecordHeader, MAX_PLAINTEXT_LEN, RECORD_HEADER_LEN};

/// Bytes requested from the source per read call.
const READ_CHUNK: usize = 4096;

/// Outcome of looking for one record at the front of a buffer.
enum Frame {
    /// A complete record: header plus `header.len` payload bytes are present.
    Complete(RecordHeader),
    /// This many bytes in total are needed before the record is complete.
    Need(usize),
}

/// Validate the header at the front of `buf` and report whether the whole
/// record is present. Nothing is consumed.
fn frame(buf: &[u8], state: &ConnectionState) -> Result<Frame, FramingError> {
    if buf.len() < RECORD_HEADER_LEN {
        return Ok(Frame::Need(RECORD_HEADER_LEN));
    }
    let header = RecordHeader::parse(buf)?;
    let max = state.max_record_len();
    if header.len > max {
        return Err(FramingError::RecordOverflow {
            len: header.len,
            max,
        });
    }
    let total = RECORD_HEADER_LEN + header.len;
    if buf.len() < total {
        return Ok(Frame::Need(total));
    }
    Ok(Frame::Complete(header))
}

/// Remove protection from one framed record.
fn decode(
    header: &RecordHeader,
    payload: &[u8],
    state: &mut ConnectionState,
) -> Result<Record, Error> {
    if state.is_tls13() && header.content_type == ContentType::ChangeCipherSpec {
        debug!("passing through TLS 1.3 compatibility change_cipher_spec");
        return Ok(Record {
            content_type: header.content_type,
            version: header.version,
            data: payload.to_vec(),
        });
    }

    let (content_type, data) = state.open(header, payload).inspect_err(|e| {
        if let Some(kind) = e.decrypt_error() {
            warn!(
                "dropping {} record of {} bytes: {}",
                header.content_type, header.len, kind
            );
        }
    })?;
    if data.len() > MAX_PLAINTEXT_LEN {
        return Err(FramingError::RecordOverflow {
            len: data.len(),
            max: MAX_PLAINTEXT_LEN,
        }
        .into());
    }
    debug!(
        "read {} record: {} bytes on the wire, {} bytes of content",
        content_type,
        header.len,
        data.len()
    );
    Ok(Record {
        content_type,
        version: header.version,
        data,
    })
}

/// Frame and decode one record from the front of `buf`, consuming its bytes.
fn take_record(buf: &mut Vec<u8>, state: &mut ConnectionState) -> Result<Option<Record>, Error> {
    let header = match frame(buf, state)? {
        Frame::Complete(header) => header,
        Frame::Need(_) => return Ok(None),
    };
    let raw: Vec<u8> = buf.drain(..RECORD_HEADER_LEN + header.len).collect();
    decode(&header, &raw[RECORD_HEADER_LEN..], state).map(Some)
}

/// Match a decoded record against the caller's expected type.
///
/// An alert in place of other content is reported as an
/// [`UnexpectedAlertError`]. When the state has no cipher context the error
/// also carries [`DecryptError::NoCipherContext`].
fn expect_type(
    record: Record,
    expected: ContentType,
    state: &ConnectionState,
) -> Result<Record, Error> {
    if record.content_type == expected {
        return Ok(record);
    }
    if record.content_type == ContentType::Alert {
        let alert = alert::classify(&record)?;
        debug!("unexpected {} while waiting for {}", alert, expected);
        return Err(UnexpectedAlertError {
            alert,
            decrypt: state
                .is_cleartext()
                .then_some(DecryptError::NoCipherContext),
        }
        .into());
    }
    Err(Error::UnexpectedRecordType {
        expected,
        actual: record.content_type,
    })
}

/// TLS 1.3 peers may send a cleartext change_cipher_spec that carries no
/// content; skip it unless the caller asked for one.
fn is_compat_ccs(record: &Record, expected: ContentType, state: &ConnectionState) -> bool {
    state.is_tls13()
        && record.content_type == ContentType::ChangeCipherSpec
        && expected != ContentType::ChangeCipherSpec
}

/// Pull one chunk from `source` into `buf`. Returns 0 at end of stream.
fn fill<R: Read + ?Sized>(source: &mut R, buf: &mut Vec<u8>) -> Result<usize, Error> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match source.read(&mut chunk) {
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                return Ok(n);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn truncated(buf: &[u8], state: &ConnectionState) -> Error {
    let needed = match frame(buf, state) {
        Ok(Frame::Need(n)) => n,
        Ok(Frame::Complete(_)) => buf.len(),
        Err(e) => return e.into(),
    };
    let field = if buf.len() < RECORD_HEADER_LEN {
        Field::RecordHeader
    } else {
        Field::RecordPayload
    };
    FramingError::Truncated {
        field,
        needed,
        available: buf.len(),
    }
    .into()
}

/// Read one application data record from a blocking source.
///
/// Returns the plaintext and any bytes read past the end of the record.
/// Those leftover bytes belong to the next record; use
/// [`read_record_with`] to keep them across calls.
pub fn read_record<R: Read + ?Sized>(
    source: &mut R,
    state: &mut ConnectionState,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let mut carry = Vec::new();
    let plaintext = read_record_with(source, &mut carry, state, ContentType::ApplicationData)?;
    Ok((plaintext, carry))
}

/// Read one record of type `expected`, using `carry` as the buffer of bytes
/// already pulled from `source`. Bytes past the record stay in `carry`.
pub fn read_record_with<R: Read + ?Sized>(
    source: &mut R,
    carry: &mut Vec<u8>,
    state: &mut ConnectionState,
    expected: ContentType,
) -> Result<Vec<u8>, Error> {
    loop {
        if let Some(record) = take_record(carry, state)? {
            if is_compat_ccs(&record, expected, state) {
                continue;
            }
            return expect_type(record, expected, state).map(|r| r.data);
        }
        if fill(source, carry)? == 0 {
            return Err(truncated(carry, state));
        }
    }
}

/// Read records until the source ends at a record boundary.
///
/// End of stream inside a record is a truncation error. Any framing or
/// decryption error stops the loop; the records decoded before it are
/// returned inside the [`ReadRecordsError`].
pub fn read_records<R: Read + ?Sized>(
    source: &mut R,
    state: &mut ConnectionState,
) -> Result<Vec<Record>, ReadRecordsError> {
    let mut reader = RecordReader::new();
    let mut records = Vec::new();
    match drain_into(source, state, &mut reader, &mut records) {
        Ok(()) => {
            debug!("read {} records to end of stream", records.len());
            Ok(records)
        }
        Err(err) => {
            debug!("read {} records before failing: {}", records.len(), err);
            Err(ReadRecordsError {
                records,
                source: err,
            })
        }
    }
}

fn drain_into<R: Read + ?Sized>(
    source: &mut R,
    state: &mut ConnectionState,
    reader: &mut RecordReader,
    records: &mut Vec<Record>,
) -> Result<(), Error> {
    loop {
        while let Some(record) = reader.next_record(state)? {
            records.push(record);
        }
        if fill(source, &mut reader.buf)? == 0 {
            if reader.buf.is_empty() {
                return Ok(());
            }
            return Err(truncated(&reader.buf, state));
        }
    }
}

/// Incremental reader for callers that receive bytes on their own schedule.
///
/// ```
/// use tlscodec::tls::reader::RecordReader;
/// use tlscodec::tls::state::ConnectionState;
/// use tlscodec::tls::version::TLS12;
///
/// let mut state = ConnectionState::cleartext(TLS12);
/// let mut reader = RecordReader::new();
/// reader.feed(&[0x17, 0x03, 0x03, 0x00, 0x02, b'h']);
/// assert!(reader.next_record(&mut state).unwrap().is_none());
/// reader.feed(b"i");
/// let record = reader.next_record(&mut state).unwrap().unwrap();
/// assert_eq!(record.data, b"hi");
/// ```
#[derive(Debug, Default)]
pub struct RecordReader {
    buf: Vec<u8>,
}

impl RecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from bytes already read past a previous record.
    pub fn with_leftover(leftover: Vec<u8>) -> Self {
        RecordReader { buf: leftover }
    }

    /// Append newly received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed by a record.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take back the unconsumed bytes.
    pub fn into_leftover(self) -> Vec<u8> {
        self.buf
    }

    /// Decode the next record if it is fully buffered.
    ///
    /// `Ok(None)` means more input is needed; nothing is consumed in that
    /// case. An invalid header leaves its bytes in place. Once a whole record
    /// is buffered its bytes are consumed, whether or not it decodes.
    pub fn next_record(&mut self, state: &mut ConnectionState) -> Result<Option<Record>, Error> {
        take_record(&mut self.buf, state)
    }

    /// Like [`next_record`](Self::next_record), but the record must be of
    /// type `expected`.
    pub fn next_record_of_type(
        &mut self,
        state: &mut ConnectionState,
        expected: ContentType,
    ) -> Result<Option<Record>, Error> {
        loop {
            match take_record(&mut self.buf, state)? {
                Some(record) if is_compat_ccs(&record, expected, state) => continue,
                Some(record) => return expect_type(record, expected, state).map(Some),
                None => return Ok(None),
            }
        }
    }
}
