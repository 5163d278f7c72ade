#![no_main]
use libfuzzer_sys::fuzz_target;
use tlscodec::tls::version::TLS12;
use tlscodec::{ConnectionState, RecordReader};

fuzz_target!(|data: &[u8]| {
    let mut state = ConnectionState::cleartext(TLS12);
    let _ = tlscodec::read_records(&mut &data[..], &mut state);

    // Same bytes through the buffered path, split at an arbitrary point.
    let split = data.first().map(|b| *b as usize % (data.len() + 1)).unwrap_or(0);
    let mut state = ConnectionState::cleartext(TLS12);
    let mut reader = RecordReader::new();
    reader.feed(&data[..split]);
    while let Ok(Some(_)) = reader.next_record(&mut state) {}
    reader.feed(&data[split..]);
    while let Ok(Some(_)) = reader.next_record(&mut state) {}

    if let Ok(mut state) = ConnectionState::new(TLS12, 0xC02F, &[0u8; 16], &[0u8; 4], 0) {
        let _ = tlscodec::read_records(&mut &data[..], &mut state);
    }
});
