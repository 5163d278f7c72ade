//! Alerts arriving where other content was expected.

use std::io::Cursor;

use tlscodec::tls::version::TLS12;
use tlscodec::{
    classify, read_record, read_record_with, read_records, write_records_of_type, AlertDescription,
    AlertLevel, ConnectionState, ContentType, DecryptError, Error, FramingError, RecordReader,
};

fn cleartext_record(ct: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![ct, 0x03, 0x03];
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// A server that rejects the client certificate: a couple of cleartext
/// handshake records followed by a fatal bad_certificate alert.
fn rejected_handshake() -> Vec<u8> {
    let mut wire = cleartext_record(22, &[0x02, 0x00, 0x00, 0x02, 0x03, 0x03]);
    wire.extend_from_slice(&cleartext_record(22, &[0x0B, 0x00, 0x00, 0x00]));
    wire.extend_from_slice(&cleartext_record(21, &[0x02, 42]));
    wire
}

#[test]
fn bad_certificate_during_cleartext_handshake() {
    let mut source = Cursor::new(rejected_handshake());
    let mut carry = Vec::new();
    let mut state = ConnectionState::cleartext(TLS12);

    for _ in 0..2 {
        read_record_with(&mut source, &mut carry, &mut state, ContentType::Handshake).unwrap();
    }
    let err =
        read_record_with(&mut source, &mut carry, &mut state, ContentType::Handshake).unwrap_err();

    // Either facet can be branched on.
    assert_eq!(err.decrypt_error(), Some(DecryptError::NoCipherContext));
    let alert = err.alert().unwrap();
    assert_eq!(alert.level, AlertLevel::FATAL);
    assert_eq!(alert.description, AlertDescription::BAD_CERTIFICATE);
    match err {
        Error::UnexpectedAlert(inner) => {
            assert_eq!(inner.alert, alert);
            assert_eq!(inner.decrypt, Some(DecryptError::NoCipherContext));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(carry.is_empty());
}

#[test]
fn buffered_reader_reports_the_same_alert() {
    let mut state = ConnectionState::cleartext(TLS12);
    let mut reader = RecordReader::new();
    reader.feed(&rejected_handshake());
    assert!(reader
        .next_record_of_type(&mut state, ContentType::Handshake)
        .unwrap()
        .is_some());
    assert!(reader
        .next_record_of_type(&mut state, ContentType::Handshake)
        .unwrap()
        .is_some());
    let err = reader
        .next_record_of_type(&mut state, ContentType::Handshake)
        .unwrap_err();
    assert_eq!(err.decrypt_error(), Some(DecryptError::NoCipherContext));
    assert_eq!(
        err.alert().map(|a| a.description),
        Some(AlertDescription::BAD_CERTIFICATE)
    );
}

#[test]
fn encrypted_alert_has_no_decrypt_facet() {
    let key = [0x61; 16];
    let iv = [0x62; 4];
    let mut w = ConnectionState::new(TLS12, 0xC02B, &key, &iv, 0).unwrap();
    let mut wire = Vec::new();
    write_records_of_type(&mut wire, ContentType::Alert, &[0x01, 0x00], &mut w).unwrap();

    let mut r = ConnectionState::new(TLS12, 0xC02B, &key, &iv, 0).unwrap();
    let err = read_record(&mut Cursor::new(wire), &mut r).unwrap_err();
    assert!(err.decrypt_error().is_none());
    let alert = err.alert().unwrap();
    assert!(alert.is_close_notify());
    assert_eq!(alert.level, AlertLevel::WARNING);
    // The alert decrypted fine, so the state stays usable.
    assert!(!r.is_broken());
    assert_eq!(r.sequence().unwrap(), 1);
}

#[test]
fn read_records_returns_alerts_as_records() {
    let mut state = ConnectionState::cleartext(TLS12);
    let records = read_records(&mut Cursor::new(rejected_handshake()), &mut state).unwrap();
    assert_eq!(records.len(), 3);
    let alert = classify(&records[2]).unwrap();
    assert_eq!(alert.description, AlertDescription::BAD_CERTIFICATE);
    assert!(classify(&records[0]).is_err());
}

#[test]
fn unknown_description_code_is_preserved() {
    let wire = cleartext_record(21, &[0x02, 0xEE]);
    let mut state = ConnectionState::cleartext(TLS12);
    let err = read_record(&mut Cursor::new(wire), &mut state).unwrap_err();
    assert_eq!(err.alert().map(|a| a.description), Some(AlertDescription(0xEE)));
}

#[test]
fn malformed_alert_is_a_framing_error() {
    let wire = cleartext_record(21, &[0x02, 42, 0x00]);
    let mut state = ConnectionState::cleartext(TLS12);
    let err = read_record(&mut Cursor::new(wire), &mut state).unwrap_err();
    assert_eq!(err.framing_error(), Some(&FramingError::MalformedAlert(3)));
    assert!(err.decrypt_error().is_none());
    assert!(err.alert().is_none());
}
