#![allow(clippy::uninlined_format_args)]

pub mod error;
pub mod tls;

pub use error::{
    DecryptError, Error, FramingError, ReadRecordsError, Result, UnexpectedAlertError,
    UnsupportedSuiteError, WriteError,
};
pub use tls::alert::{classify, Alert, AlertDescription, AlertLevel};
pub use tls::handshake::{validate_client_hello, ClientHello};
pub use tls::reader::{read_record, read_record_with, read_records, RecordReader};
pub use tls::state::ConnectionState;
pub use tls::writer::{write_records, write_records_of_type};
pub use tls::{ContentType, Record};
