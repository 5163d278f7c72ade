//! Fixed registry of supported (version, cipher suite) pairs.
//!
//! This is a lookup, not a negotiation: the caller has already picked the
//! suite out of band.

use crate::error::UnsupportedSuiteError;
use crate::tls::version::{TLS10, TLS12, TLS13};
use crate::tls::MAX_PLAINTEXT_LEN;

/// Largest key-material blob any suite in the table slices from
/// (AES-256-CBC with a 20-byte HMAC-SHA1 key).
pub const MAX_KEY_MATERIAL_LEN: usize = 52;

/// Largest fixed IV any suite needs (TLS 1.0 CBC initial IV).
pub const MAX_IV_LEN: usize = 16;

/// Upper bound on the ciphertext expansion of a TLS 1.3 record
/// (RFC 8446 allows 2^14 + 256 on the wire).
const TLS13_MAX_OVERHEAD: usize = 256;

/// Maximum CBC padding (pad bytes plus the length byte).
const CBC_MAX_PADDING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
}

impl AeadAlgorithm {
    pub fn key_len(self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm | AeadAlgorithm::Chacha20Poly1305 => 32,
        }
    }

    pub fn tag_len(self) -> usize {
        16
    }

    pub(crate) fn ring_algorithm(self) -> &'static ring::aead::Algorithm {
        match self {
            AeadAlgorithm::Aes128Gcm => &ring::aead::AES_128_GCM,
            AeadAlgorithm::Aes256Gcm => &ring::aead::AES_256_GCM,
            AeadAlgorithm::Chacha20Poly1305 => &ring::aead::CHACHA20_POLY1305,
        }
    }
}

/// How the per-record AEAD nonce is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceRule {
    /// salt(4) || explicit_nonce(8); the explicit part travels in the record.
    Explicit,
    /// iv(12) XOR big-endian sequence number, nothing carried in the record.
    XorSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAlgorithm {
    Aes128Cbc,
    Aes256Cbc,
}

impl BlockAlgorithm {
    pub fn key_len(self) -> usize {
        match self {
            BlockAlgorithm::Aes128Cbc => 16,
            BlockAlgorithm::Aes256Cbc => 32,
        }
    }

    pub fn block_len(self) -> usize {
        16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha256,
}

impl MacAlgorithm {
    /// Key and tag length are equal for both supported MACs.
    pub fn output_len(self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacSha256 => 32,
        }
    }

    pub(crate) fn ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            MacAlgorithm::HmacSha1 => ring::hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            MacAlgorithm::HmacSha256 => ring::hmac::HMAC_SHA256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFamily {
    Aead {
        algorithm: AeadAlgorithm,
        nonce: NonceRule,
    },
    /// MAC-then-encrypt CBC (RFC 5246 §6.2.3.2).
    CbcHmac {
        cipher: BlockAlgorithm,
        mac: MacAlgorithm,
    },
}

/// Immutable description of one cipher suite.
#[derive(Debug, PartialEq, Eq)]
pub struct CipherSuiteDescriptor {
    pub id: u16,
    pub name: &'static str,
    pub min_version: u16,
    pub max_version: u16,
    pub family: SuiteFamily,
}

/// Byte layout a suite needs from the caller's key material at a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    pub mac_key_len: usize,
    pub enc_key_len: usize,
    /// Bytes of the caller's IV the suite consumes.
    pub fixed_iv_len: usize,
    /// Bytes of per-record IV/nonce carried in each record.
    pub record_iv_len: usize,
    /// Largest possible ciphertext expansion of one record.
    pub max_overhead: usize,
}

impl KeyLayout {
    pub fn key_material_len(&self) -> usize {
        self.mac_key_len + self.enc_key_len
    }

    /// Largest declared record length accepted for this layout.
    pub fn max_record_len(&self) -> usize {
        MAX_PLAINTEXT_LEN + self.max_overhead
    }
}

impl CipherSuiteDescriptor {
    pub fn supports(&self, version: u16) -> bool {
        (self.min_version..=self.max_version).contains(&version)
    }

    pub fn is_aead(&self) -> bool {
        matches!(self.family, SuiteFamily::Aead { .. })
    }

    pub fn layout(&self, version: u16) -> KeyLayout {
        match self.family {
            SuiteFamily::Aead { algorithm, nonce } => {
                let tag = algorithm.tag_len();
                let (fixed_iv_len, record_iv_len) = match nonce {
                    NonceRule::Explicit => (4, 8),
                    NonceRule::XorSequence => (12, 0),
                };
                let max_overhead = if version == TLS13 {
                    TLS13_MAX_OVERHEAD
                } else {
                    record_iv_len + tag
                };
                KeyLayout {
                    mac_key_len: 0,
                    enc_key_len: algorithm.key_len(),
                    fixed_iv_len,
                    record_iv_len,
                    max_overhead,
                }
            }
            SuiteFamily::CbcHmac { cipher, mac } => {
                // TLS 1.0 chains the IV across records; later versions carry it.
                let (fixed_iv_len, record_iv_len) = if version == TLS10 {
                    (cipher.block_len(), 0)
                } else {
                    (0, cipher.block_len())
                };
                KeyLayout {
                    mac_key_len: mac.output_len(),
                    enc_key_len: cipher.key_len(),
                    fixed_iv_len,
                    record_iv_len,
                    max_overhead: record_iv_len + mac.output_len() + CBC_MAX_PADDING,
                }
            }
        }
    }
}

macro_rules! cbc {
    ($id:expr, $name:expr, $min:expr, $cipher:ident, $mac:ident) => {
        CipherSuiteDescriptor {
            id: $id,
            name: $name,
            min_version: $min,
            max_version: TLS12,
            family: SuiteFamily::CbcHmac {
                cipher: BlockAlgorithm::$cipher,
                mac: MacAlgorithm::$mac,
            },
        }
    };
}

macro_rules! aead {
    ($id:expr, $name:expr, $ver:expr, $algo:ident, $nonce:ident) => {
        CipherSuiteDescriptor {
            id: $id,
            name: $name,
            min_version: $ver,
            max_version: $ver,
            family: SuiteFamily::Aead {
                algorithm: AeadAlgorithm::$algo,
                nonce: NonceRule::$nonce,
            },
        }
    };
}

static SUITES: &[CipherSuiteDescriptor] = &[
    // CBC + HMAC-SHA1, TLS 1.0 - 1.2
    cbc!(0x002F, "TLS_RSA_WITH_AES_128_CBC_SHA", TLS10, Aes128Cbc, HmacSha1),
    cbc!(0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA", TLS10, Aes256Cbc, HmacSha1),
    cbc!(0xC009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", TLS10, Aes128Cbc, HmacSha1),
    cbc!(0xC00A, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", TLS10, Aes256Cbc, HmacSha1),
    cbc!(0xC013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", TLS10, Aes128Cbc, HmacSha1),
    cbc!(0xC014, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", TLS10, Aes256Cbc, HmacSha1),
    // CBC + HMAC-SHA256, TLS 1.2 only
    cbc!(0x003C, "TLS_RSA_WITH_AES_128_CBC_SHA256", TLS12, Aes128Cbc, HmacSha256),
    cbc!(0xC023, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256", TLS12, Aes128Cbc, HmacSha256),
    cbc!(0xC027, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", TLS12, Aes128Cbc, HmacSha256),
    // TLS 1.2 AES-GCM
    aead!(0x009C, "TLS_RSA_WITH_AES_128_GCM_SHA256", TLS12, Aes128Gcm, Explicit),
    aead!(0x009D, "TLS_RSA_WITH_AES_256_GCM_SHA384", TLS12, Aes256Gcm, Explicit),
    aead!(0xC02B, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", TLS12, Aes128Gcm, Explicit),
    aead!(0xC02C, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", TLS12, Aes256Gcm, Explicit),
    aead!(0xC02F, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", TLS12, Aes128Gcm, Explicit),
    aead!(0xC030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", TLS12, Aes256Gcm, Explicit),
    // TLS 1.2 ChaCha20-Poly1305 (RFC 7905)
    aead!(0xCCA8, "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", TLS12, Chacha20Poly1305, XorSequence),
    aead!(0xCCA9, "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", TLS12, Chacha20Poly1305, XorSequence),
    // TLS 1.3
    aead!(0x1301, "TLS_AES_128_GCM_SHA256", TLS13, Aes128Gcm, XorSequence),
    aead!(0x1302, "TLS_AES_256_GCM_SHA384", TLS13, Aes256Gcm, XorSequence),
    aead!(0x1303, "TLS_CHACHA20_POLY1305_SHA256", TLS13, Chacha20Poly1305, XorSequence),
];

/// Look up the descriptor for `(version, suite)`.
pub fn lookup(
    version: u16,
    suite: u16,
) -> Result<&'static CipherSuiteDescriptor, UnsupportedSuiteError> {
    SUITES
        .iter()
        .find(|d| d.id == suite && d.supports(version))
        .ok_or(UnsupportedSuiteError { version, suite })
}

/// Every registered descriptor.
pub fn all() -> &'static [CipherSuiteDescriptor] {
    SUITES
}

/// Every supported `(version, suite id)` pair.
pub fn supported_pairs() -> impl Iterator<Item = (u16, u16)> {
    SUITES
        .iter()
        .flat_map(|d| (d.min_version..=d.max_version).map(move |v| (v, d.id)))
}
