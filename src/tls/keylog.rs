//! Record key file loader.
//!
//! One line per traffic direction:
//!
//! ```text
//! # comment
//! CLIENT_WRITE 0303 c02f <key hex> <iv hex> [sequence]
//! SERVER_WRITE 0304 1301 <key hex> <iv hex>
//! SERVER_WRITE 0302 002f <key hex> -
//! ```
//!
//! `-` stands for an empty IV, used by suites that carry their IV in each
//! record. Unlike SSLKEYLOGFILE parsing, malformed lines are errors: a replay
//! that silently drops a key produces garbage instead of a diagnosis.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::Error;
use crate::tls::state::ConnectionState;
use crate::tls::suite;

/// Environment variable naming the key file read by [`KeyLog::from_env`].
pub const KEYFILE_ENV: &str = "TLSCODEC_KEYFILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientWrite,
    ServerWrite,
}

impl Direction {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "CLIENT_WRITE" => Some(Direction::ClientWrite),
            "SERVER_WRITE" => Some(Direction::ServerWrite),
            _ => None,
        }
    }
}

/// Keys for one traffic direction. Secrets are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DirectionKeys {
    #[zeroize(skip)]
    pub direction: Direction,
    pub version: u16,
    pub suite: u16,
    key_material: Vec<u8>,
    iv: Vec<u8>,
    pub sequence: u64,
}

impl fmt::Debug for DirectionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionKeys")
            .field("direction", &self.direction)
            .field("version", &format_args!("{:#06x}", self.version))
            .field("suite", &format_args!("{:#06x}", self.suite))
            .field("key_material", &format_args!("<{} bytes>", self.key_material.len()))
            .field("iv", &format_args!("<{} bytes>", self.iv.len()))
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl DirectionKeys {
    /// Fresh connection state seeded from these keys.
    pub fn connection_state(&self) -> Result<ConnectionState, Error> {
        ConnectionState::new(
            self.version,
            self.suite,
            &self.key_material,
            &self.iv,
            self.sequence,
        )
    }
}

/// Parsed key file, entries in file order.
#[derive(Debug, Default)]
pub struct KeyLog {
    entries: Vec<DirectionKeys>,
}

impl KeyLog {
    /// Maximum key file size (1 MiB).
    const MAX_KEYFILE_SIZE: u64 = 1024 * 1024;

    /// Load the file named by `TLSCODEC_KEYFILE`. `Ok(None)` if it is unset.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var_os(KEYFILE_ENV) {
            Some(path) => Self::from_file(Path::new(&path)).map(Some),
            None => Ok(None),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat key file: {}", path.display()))?;
        if meta.len() > Self::MAX_KEYFILE_SIZE {
            bail!(
                "Key file too large ({} bytes, max {}): {}",
                meta.len(),
                Self::MAX_KEYFILE_SIZE,
                path.display()
            );
        }
        let contents = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read key file: {}", path.display()))?,
        );
        Self::parse(&contents).with_context(|| format!("In key file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut keylog = KeyLog::default();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let keys = parse_line(line).with_context(|| format!("line {}", idx + 1))?;
            keylog.entries.push(keys);
        }
        Ok(keylog)
    }

    pub fn entries(&self) -> &[DirectionKeys] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry for `direction`.
    pub fn get(&self, direction: Direction) -> Option<&DirectionKeys> {
        self.entries.iter().find(|k| k.direction == direction)
    }
}

fn parse_line(line: &str) -> Result<DirectionKeys> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(5..=6).contains(&fields.len()) {
        bail!("expected 5 or 6 fields, found {}", fields.len());
    }

    let direction = Direction::from_label(fields[0])
        .with_context(|| format!("unknown direction label {:?}", fields[0]))?;
    let version = parse_u16_hex(fields[1]).context("bad version")?;
    let suite_id = parse_u16_hex(fields[2]).context("bad cipher suite")?;
    let descriptor = suite::lookup(version, suite_id)?;
    let layout = descriptor.layout(version);

    let key_material = Zeroizing::new(decode_hex(fields[3]).context("bad key hex")?);
    let iv = match fields[4] {
        "-" => Zeroizing::new(Vec::new()),
        hex => Zeroizing::new(decode_hex(hex).context("bad IV hex")?),
    };
    if key_material.len() < layout.key_material_len() {
        bail!(
            "{} needs {} bytes of key material, got {}",
            descriptor.name,
            layout.key_material_len(),
            key_material.len()
        );
    }
    if iv.len() < layout.fixed_iv_len {
        bail!(
            "{} needs a {}-byte IV, got {}",
            descriptor.name,
            layout.fixed_iv_len,
            iv.len()
        );
    }
    let sequence = match fields.get(5) {
        Some(s) => s
            .parse::<u64>()
            .with_context(|| format!("bad sequence number {:?}", s))?,
        None => 0,
    };

    Ok(DirectionKeys {
        direction,
        version,
        suite: suite_id,
        key_material: key_material.to_vec(),
        iv: iv.to_vec(),
        sequence,
    })
}

fn parse_u16_hex(s: &str) -> Option<u16> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if !s.len().is_multiple_of(2) || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
