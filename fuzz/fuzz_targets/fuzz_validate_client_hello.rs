#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(hello) = tlscodec::validate_client_hello(data) {
        let _ = hello.cipher_suites().count();
        let _ = hello.extensions().count();
        let _ = hello.server_name();
        let _ = hello.supported_versions();
    }
});
