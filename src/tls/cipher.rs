//! Record protection strategies.
//!
//! One [`RecordCipher`] is built per connection state from its suite
//! descriptor and is not re-dispatched per record.
//!
//! AEAD (RFC 5246 §6.2.3.3, RFC 7905, RFC 8446 §5.2):
//! - TLS 1.2 GCM: nonce = salt(4) || explicit(8), explicit = sequence number
//! - TLS 1.2 ChaCha20 and TLS 1.3: nonce = iv(12) XOR sequence number
//! - TLS 1.2 AAD = seq(8) || type(1) || version(2) || plaintext_len(2)
//! - TLS 1.3 AAD = outer record header
//!
//! CBC (RFC 5246 §6.2.3.2): MAC-then-encrypt with HMAC over
//! seq(8) || type(1) || version(2) || length(2) || content.

use aes::{Aes128, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit};
use log::trace;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use crate::error::{DecryptError, Error, Field, FramingError};
use crate::tls::suite::{
    AeadAlgorithm, BlockAlgorithm, CipherSuiteDescriptor, MacAlgorithm, NonceRule, SuiteFamily,
};
use crate::tls::version::{TLS10, TLS12, TLS13};
use crate::tls::{ContentType, RecordHeader};

const BLOCK_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt/decrypt one record under a sequence number.
pub(crate) trait RecordCipher: Send {
    /// Protect `plaintext`. Returns the outer content type and record payload.
    fn seal(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error>;

    /// Remove protection from a framed record payload. Returns the content
    /// type and plaintext; under TLS 1.3 the plaintext still ends with the
    /// inner content type and padding (see [`split_inner_plaintext`]).
    fn open(
        &mut self,
        seq: u64,
        header: &RecordHeader,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error>;
}

/// Build the strategy for `descriptor`. Lengths of `key_material` and `iv`
/// must already have been checked against the descriptor's layout.
pub(crate) fn build(
    descriptor: &CipherSuiteDescriptor,
    version: u16,
    key_material: &[u8],
    iv: &[u8],
) -> Result<Box<dyn RecordCipher>, Error> {
    let layout = descriptor.layout(version);
    match descriptor.family {
        SuiteFamily::Aead { algorithm, nonce } => {
            let key = &key_material[..layout.enc_key_len];
            let iv = &iv[..layout.fixed_iv_len];
            Ok(Box::new(AeadCipher::new(algorithm, nonce, version == TLS13, key, iv)?))
        }
        SuiteFamily::CbcHmac { cipher, mac } => {
            let mac_key = &key_material[..layout.mac_key_len];
            let enc_key = &key_material[layout.mac_key_len..layout.key_material_len()];
            let chained_iv = if version == TLS10 {
                let mut first = [0u8; BLOCK_LEN];
                first.copy_from_slice(&iv[..BLOCK_LEN]);
                Some(first)
            } else {
                None
            };
            Ok(Box::new(CbcCipher::new(cipher, mac, mac_key, enc_key, chained_iv)?))
        }
    }
}

struct AeadCipher {
    key: LessSafeKey,
    tag_len: usize,
    /// Full IV for XorSequence; only the first four bytes (salt) for Explicit.
    iv: [u8; NONCE_LEN],
    nonce_rule: NonceRule,
    tls13: bool,
}

impl Drop for AeadCipher {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

impl AeadCipher {
    fn new(
        algorithm: AeadAlgorithm,
        nonce_rule: NonceRule,
        tls13: bool,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self, Error> {
        let unbound =
            UnboundKey::new(algorithm.ring_algorithm(), key).map_err(|_| Error::KeyMaterial {
                what: "AEAD key",
                needed: algorithm.key_len(),
                got: key.len(),
            })?;
        let mut fixed = [0u8; NONCE_LEN];
        let n = iv.len().min(NONCE_LEN);
        fixed[..n].copy_from_slice(&iv[..n]);
        Ok(AeadCipher {
            key: LessSafeKey::new(unbound),
            tag_len: algorithm.tag_len(),
            iv: fixed,
            nonce_rule,
            tls13,
        })
    }

    fn xor_nonce(&self, seq: u64) -> [u8; NONCE_LEN] {
        let mut nonce = self.iv;
        for (n, s) in nonce[NONCE_LEN - 8..].iter_mut().zip(seq.to_be_bytes()) {
            *n ^= s;
        }
        nonce
    }

    fn explicit_nonce(&self, explicit: &[u8]) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        nonce[..4].copy_from_slice(&self.iv[..4]);
        nonce[4..].copy_from_slice(explicit);
        nonce
    }

    fn open_tls13(
        &self,
        seq: u64,
        header: &RecordHeader,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        if header.content_type != ContentType::ApplicationData {
            return Err(FramingError::WrongRecordType {
                expected: ContentType::ApplicationData,
                actual: header.content_type,
            }
            .into());
        }
        if payload.len() < self.tag_len {
            return Err(DecryptError::BadRecordMac.into());
        }
        let aad = header.encode();
        let mut buf = payload.to_vec();
        let nonce = Nonce::assume_unique_for_key(self.xor_nonce(seq));
        let len = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut buf)
            .map_err(|_| DecryptError::BadRecordMac)?
            .len();
        buf.truncate(len);
        Ok((ContentType::ApplicationData, buf))
    }
}

/// Split an authenticated TLS 1.3 inner plaintext into its content type and
/// content.
pub(crate) fn split_inner_plaintext(plaintext: Vec<u8>) -> Result<(ContentType, Vec<u8>), Error> {
    let (inner, content_type) =
        strip_inner_content_type(plaintext).ok_or(FramingError::Empty(Field::RecordPayload))?;
    Ok((ContentType::try_from(content_type)?, inner))
}

/// Strip TLS 1.3 zero padding and the trailing inner content type byte.
fn strip_inner_content_type(mut plaintext: Vec<u8>) -> Option<(Vec<u8>, u8)> {
    while plaintext.last() == Some(&0) {
        plaintext.pop();
    }
    let content_type = plaintext.pop()?;
    Some((plaintext, content_type))
}

fn tls12_aad(seq: u64, content_type: u8, version: u16, plaintext_len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type;
    aad[9..11].copy_from_slice(&version.to_be_bytes());
    aad[11..13].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
    aad
}

impl RecordCipher for AeadCipher {
    fn seal(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        if self.tls13 {
            let mut buf = Vec::with_capacity(plaintext.len() + 1 + self.tag_len);
            buf.extend_from_slice(plaintext);
            buf.push(content_type.as_u8());
            let header = RecordHeader {
                content_type: ContentType::ApplicationData,
                version: TLS12,
                len: buf.len() + self.tag_len,
            };
            let nonce = Nonce::assume_unique_for_key(self.xor_nonce(seq));
            self.key
                .seal_in_place_append_tag(nonce, Aad::from(header.encode()), &mut buf)
                .map_err(|_| Error::Seal("AEAD seal failed"))?;
            return Ok((ContentType::ApplicationData, buf));
        }

        let aad = tls12_aad(seq, content_type.as_u8(), version, plaintext.len());
        let (nonce, mut buf) = match self.nonce_rule {
            NonceRule::Explicit => {
                let explicit = seq.to_be_bytes();
                (self.explicit_nonce(&explicit), explicit.to_vec())
            }
            NonceRule::XorSequence => (self.xor_nonce(seq), Vec::new()),
        };
        let mut body = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad),
                &mut body,
            )
            .map_err(|_| Error::Seal("AEAD seal failed"))?;
        buf.extend_from_slice(&body);
        Ok((content_type, buf))
    }

    fn open(
        &mut self,
        seq: u64,
        header: &RecordHeader,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        if self.tls13 {
            return self.open_tls13(seq, header, payload);
        }

        let explicit_len = match self.nonce_rule {
            NonceRule::Explicit => 8,
            NonceRule::XorSequence => 0,
        };
        if payload.len() < explicit_len + self.tag_len {
            trace!("AEAD record of {} bytes is shorter than nonce+tag", payload.len());
            return Err(DecryptError::BadRecordMac.into());
        }
        let nonce = match self.nonce_rule {
            NonceRule::Explicit => self.explicit_nonce(&payload[..explicit_len]),
            NonceRule::XorSequence => self.xor_nonce(seq),
        };
        let mut buf = payload[explicit_len..].to_vec();
        let plaintext_len = buf.len() - self.tag_len;
        let aad = tls12_aad(seq, header.content_type.as_u8(), header.version, plaintext_len);
        let len = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::from(aad), &mut buf)
            .map_err(|_| DecryptError::BadRecordMac)?
            .len();
        buf.truncate(len);
        Ok((header.content_type, buf))
    }
}

enum BlockKey {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl BlockKey {
    fn new(algorithm: BlockAlgorithm, key: &[u8]) -> Result<Self, Error> {
        let invalid = |_| Error::KeyMaterial {
            what: "CBC key",
            needed: algorithm.key_len(),
            got: key.len(),
        };
        Ok(match algorithm {
            BlockAlgorithm::Aes128Cbc => {
                BlockKey::Aes128(Aes128::new_from_slice(key).map_err(invalid)?)
            }
            BlockAlgorithm::Aes256Cbc => {
                BlockKey::Aes256(Aes256::new_from_slice(key).map_err(invalid)?)
            }
        })
    }

    /// CBC-encrypt `data` (a whole number of blocks) in place.
    fn cbc_encrypt(&self, iv: &[u8; BLOCK_LEN], data: &mut [u8]) -> Result<(), Error> {
        let len = data.len();
        let sealed = match self {
            BlockKey::Aes128(c) => Aes128CbcEnc::inner_iv_init(c.clone(), iv.into())
                .encrypt_padded_mut::<NoPadding>(data, len)
                .is_ok(),
            BlockKey::Aes256(c) => Aes256CbcEnc::inner_iv_init(c.clone(), iv.into())
                .encrypt_padded_mut::<NoPadding>(data, len)
                .is_ok(),
        };
        if !sealed {
            return Err(Error::Seal("CBC body is not block aligned"));
        }
        Ok(())
    }

    /// CBC-decrypt `data` in place. Callers check block alignment first.
    fn cbc_decrypt(&self, iv: &[u8; BLOCK_LEN], data: &mut [u8]) -> Result<(), DecryptError> {
        let opened = match self {
            BlockKey::Aes128(c) => Aes128CbcDec::inner_iv_init(c.clone(), iv.into())
                .decrypt_padded_mut::<NoPadding>(data)
                .is_ok(),
            BlockKey::Aes256(c) => Aes256CbcDec::inner_iv_init(c.clone(), iv.into())
                .decrypt_padded_mut::<NoPadding>(data)
                .is_ok(),
        };
        if !opened {
            return Err(DecryptError::BadRecordMac);
        }
        Ok(())
    }
}

struct CbcCipher {
    block: BlockKey,
    mac_key: hmac::Key,
    mac_len: usize,
    /// TLS 1.0 only: IV for the next record (last ciphertext block so far).
    chained_iv: Option<[u8; BLOCK_LEN]>,
    rng: SystemRandom,
}

impl Drop for CbcCipher {
    fn drop(&mut self) {
        if let Some(iv) = self.chained_iv.as_mut() {
            iv.zeroize();
        }
    }
}

impl CbcCipher {
    fn new(
        cipher: BlockAlgorithm,
        mac: MacAlgorithm,
        mac_key: &[u8],
        enc_key: &[u8],
        chained_iv: Option<[u8; BLOCK_LEN]>,
    ) -> Result<Self, Error> {
        Ok(CbcCipher {
            block: BlockKey::new(cipher, enc_key)?,
            mac_key: hmac::Key::new(mac.ring_algorithm(), mac_key),
            mac_len: mac.output_len(),
            chained_iv,
            rng: SystemRandom::new(),
        })
    }

    fn mac(&self, seq: u64, content_type: u8, version: u16, content: &[u8]) -> hmac::Tag {
        let mut ctx = hmac::Context::with_key(&self.mac_key);
        ctx.update(&seq.to_be_bytes());
        ctx.update(&[content_type]);
        ctx.update(&version.to_be_bytes());
        ctx.update(&(content.len() as u16).to_be_bytes());
        ctx.update(content);
        ctx.sign()
    }
}

impl RecordCipher for CbcCipher {
    fn seal(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        let tag = self.mac(seq, content_type.as_u8(), version, plaintext);
        let unpadded = plaintext.len() + self.mac_len;
        let pad = BLOCK_LEN - 1 - unpadded % BLOCK_LEN;

        let mut buf = Vec::with_capacity(BLOCK_LEN + unpadded + pad + 1);
        let iv = match self.chained_iv {
            Some(iv) => iv,
            None => {
                let mut iv = [0u8; BLOCK_LEN];
                self.rng
                    .fill(&mut iv)
                    .map_err(|_| Error::Seal("random IV generation failed"))?;
                buf.extend_from_slice(&iv);
                iv
            }
        };
        let body_start = buf.len();
        buf.extend_from_slice(plaintext);
        buf.extend_from_slice(tag.as_ref());
        buf.resize(buf.len() + pad + 1, pad as u8);

        self.block.cbc_encrypt(&iv, &mut buf[body_start..])?;
        if self.chained_iv.is_some() {
            let mut last = [0u8; BLOCK_LEN];
            last.copy_from_slice(&buf[buf.len() - BLOCK_LEN..]);
            self.chained_iv = Some(last);
        }
        Ok((content_type, buf))
    }

    fn open(
        &mut self,
        seq: u64,
        header: &RecordHeader,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), Error> {
        let (iv, body) = match self.chained_iv {
            Some(iv) => (iv, payload),
            None => {
                if payload.len() < BLOCK_LEN {
                    return Err(DecryptError::BadRecordMac.into());
                }
                let mut iv = [0u8; BLOCK_LEN];
                iv.copy_from_slice(&payload[..BLOCK_LEN]);
                (iv, &payload[BLOCK_LEN..])
            }
        };
        if body.is_empty() || body.len() % BLOCK_LEN != 0 || body.len() < self.mac_len + 1 {
            trace!("CBC record body of {} bytes cannot hold MAC and padding", body.len());
            return Err(DecryptError::BadRecordMac.into());
        }

        let mut next_iv = [0u8; BLOCK_LEN];
        next_iv.copy_from_slice(&body[body.len() - BLOCK_LEN..]);

        let mut buf = body.to_vec();
        self.block.cbc_decrypt(&iv, &mut buf)?;

        let pad = buf[buf.len() - 1] as usize;
        if pad + 1 + self.mac_len > buf.len() {
            return Err(DecryptError::BadRecordMac.into());
        }
        let pad_start = buf.len() - pad - 1;
        let pad_ok = buf[pad_start..]
            .iter()
            .fold(Choice::from(1), |acc, b| acc & b.ct_eq(&(pad as u8)));

        let content_len = pad_start - self.mac_len;
        let expected = self.mac(
            seq,
            header.content_type.as_u8(),
            header.version,
            &buf[..content_len],
        );
        let mac_ok = expected.as_ref().ct_eq(&buf[content_len..pad_start]);
        if (pad_ok & mac_ok).unwrap_u8() == 0 {
            return Err(DecryptError::BadRecordMac.into());
        }

        if self.chained_iv.is_some() {
            self.chained_iv = Some(next_iv);
        }
        buf.truncate(content_len);
        Ok((header.content_type, buf))
    }
}

/// Outer header a sealed payload will be framed with.
pub(crate) fn outer_header(content_type: ContentType, version: u16, len: usize) -> RecordHeader {
    RecordHeader {
        content_type,
        version: if version == TLS13 { TLS12 } else { version },
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::suite::lookup;
    use crate::tls::version::TLS11;

    fn cipher(version: u16, suite: u16) -> Box<dyn RecordCipher> {
        let d = lookup(version, suite).unwrap();
        build(d, version, &[0x42; 52], &[0x07; 16]).unwrap()
    }

    fn header_for(version: u16, outer: ContentType, payload: &[u8]) -> RecordHeader {
        outer_header(outer, version, payload.len())
    }

    #[test]
    fn xor_nonce_seq_zero_equals_iv() {
        let c = AeadCipher::new(
            AeadAlgorithm::Chacha20Poly1305,
            NonceRule::XorSequence,
            false,
            &[0; 32],
            &[1; 12],
        )
        .unwrap();
        assert_eq!(c.xor_nonce(0), [1; 12]);
    }

    #[test]
    fn xor_nonce_only_touches_last_eight_bytes() {
        let iv = [0xAA, 0xBB, 0xCC, 0xDD, 0, 0, 0, 0, 0, 0, 0, 0];
        let c = AeadCipher::new(
            AeadAlgorithm::Aes128Gcm,
            NonceRule::XorSequence,
            true,
            &[0; 16],
            &iv,
        )
        .unwrap();
        let nonce = c.xor_nonce(0x0102030405060708);
        assert_eq!(nonce, [0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn explicit_nonce_is_salt_and_sequence() {
        let c = AeadCipher::new(
            AeadAlgorithm::Aes128Gcm,
            NonceRule::Explicit,
            false,
            &[0; 16],
            &[9, 8, 7, 6],
        )
        .unwrap();
        let nonce = c.explicit_nonce(&5u64.to_be_bytes());
        assert_eq!(nonce, [9, 8, 7, 6, 0, 0, 0, 0, 0, 0, 0, 5]);
    }

    #[test]
    fn gcm_payload_carries_explicit_nonce() {
        let mut c = cipher(TLS12, 0xC02F);
        let (ct, payload) = c.seal(7, ContentType::ApplicationData, TLS12, b"hello").unwrap();
        assert_eq!(ct, ContentType::ApplicationData);
        assert_eq!(payload.len(), 8 + 5 + 16);
        assert_eq!(&payload[..8], &7u64.to_be_bytes());
        let hdr = header_for(TLS12, ct, &payload);
        let (ct, pt) = c.open(7, &hdr, &payload).unwrap();
        assert_eq!(ct, ContentType::ApplicationData);
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn aead_wrong_sequence_fails() {
        let mut c = cipher(TLS12, 0xCCA8);
        let (ct, payload) = c.seal(1, ContentType::ApplicationData, TLS12, b"data").unwrap();
        let hdr = header_for(TLS12, ct, &payload);
        assert!(matches!(
            c.open(2, &hdr, &payload),
            Err(Error::Decrypt(DecryptError::BadRecordMac))
        ));
    }

    #[test]
    fn tls13_hides_content_type() {
        let mut c = cipher(TLS13, 0x1301);
        let (outer, payload) = c.seal(0, ContentType::Handshake, TLS13, b"fin").unwrap();
        assert_eq!(outer, ContentType::ApplicationData);
        assert_eq!(payload.len(), 3 + 1 + 16);
        let hdr = header_for(TLS13, outer, &payload);
        assert_eq!(hdr.version, TLS12);
        let (outer, raw) = c.open(0, &hdr, &payload).unwrap();
        assert_eq!(outer, ContentType::ApplicationData);
        let (inner, pt) = split_inner_plaintext(raw).unwrap();
        assert_eq!(inner, ContentType::Handshake);
        assert_eq!(pt, b"fin");
    }

    #[test]
    fn strip_inner_content_type_handles_padding() {
        assert_eq!(
            strip_inner_content_type(vec![b'h', b'i', 0x17, 0, 0]),
            Some((b"hi".to_vec(), 0x17))
        );
        assert_eq!(strip_inner_content_type(vec![]), None);
        assert_eq!(strip_inner_content_type(vec![0, 0, 0]), None);
        assert!(matches!(
            split_inner_plaintext(vec![0, 0]),
            Err(Error::Framing(FramingError::Empty(Field::RecordPayload)))
        ));
        assert!(matches!(
            split_inner_plaintext(vec![b'x', 0x63]),
            Err(Error::Framing(FramingError::InvalidRecordType(0x63)))
        ));
    }

    #[test]
    fn cbc_record_is_block_aligned_with_explicit_iv() {
        let mut c = cipher(TLS12, 0x002F);
        for len in [0usize, 1, 11, 12, 13, 100] {
            let pt = vec![0x5A; len];
            let (ct, payload) = c.seal(3, ContentType::ApplicationData, TLS12, &pt).unwrap();
            assert_eq!(payload.len() % 16, 0);
            assert!(payload.len() >= 16 + len + 20 + 1);
            let hdr = header_for(TLS12, ct, &payload);
            let (_, out) = c.open(3, &hdr, &payload).unwrap();
            assert_eq!(out, pt);
        }
    }

    #[test]
    fn cbc_tampered_byte_is_bad_mac() {
        let mut c = cipher(TLS11, 0x0035);
        let (ct, mut payload) = c
            .seal(0, ContentType::ApplicationData, TLS11, b"attack at dawn")
            .unwrap();
        payload[20] ^= 0x01;
        let hdr = header_for(TLS11, ct, &payload);
        assert!(matches!(
            c.open(0, &hdr, &payload),
            Err(Error::Decrypt(DecryptError::BadRecordMac))
        ));
    }

    #[test]
    fn cbc_tls10_chains_iv_between_records() {
        let d = lookup(TLS10, 0xC013).unwrap();
        let mut writer = build(d, TLS10, &[1; 52], &[2; 16]).unwrap();
        let mut reader = build(d, TLS10, &[1; 52], &[2; 16]).unwrap();
        let (ct1, p1) = writer.seal(0, ContentType::ApplicationData, TLS10, b"first").unwrap();
        let (ct2, p2) = writer.seal(1, ContentType::ApplicationData, TLS10, b"first").unwrap();
        // Same plaintext, different IV -> different ciphertext.
        assert_ne!(p1, p2);
        assert_eq!(p1.len() % 16, 0);
        let (_, out1) = reader.open(0, &header_for(TLS10, ct1, &p1), &p1).unwrap();
        let (_, out2) = reader.open(1, &header_for(TLS10, ct2, &p2), &p2).unwrap();
        assert_eq!(out1, b"first");
        assert_eq!(out2, b"first");
    }

    #[test]
    fn cbc_short_or_misaligned_payloads_rejected() {
        let mut c = cipher(TLS12, 0x003C);
        let hdr = RecordHeader {
            content_type: ContentType::ApplicationData,
            version: TLS12,
            len: 0,
        };
        for len in [0usize, 1, 15, 16, 17, 31, 33, 47] {
            let payload = vec![0u8; len];
            assert!(matches!(
                c.open(0, &hdr, &payload),
                Err(Error::Decrypt(DecryptError::BadRecordMac))
            ));
        }
    }

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn cbc_matches_nist_aes128_vector() {
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let block = BlockKey::new(BlockAlgorithm::Aes128Cbc, &key).unwrap();
        let iv: [u8; BLOCK_LEN] = std::array::from_fn(|i| i as u8);
        let plaintext = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let mut data = plaintext.clone();
        block.cbc_encrypt(&iv, &mut data).unwrap();
        assert_eq!(
            data,
            hex("7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2")
        );
        block.cbc_decrypt(&iv, &mut data).unwrap();
        assert_eq!(data, plaintext);
    }

    #[test]
    fn cbc_misaligned_body_is_an_error() {
        let block = BlockKey::new(BlockAlgorithm::Aes256Cbc, &[1; 32]).unwrap();
        assert!(block.cbc_encrypt(&[0; BLOCK_LEN], &mut [0u8; 17]).is_err());
    }

    /// Explicit IV followed by an encrypted content || MAC || padding body.
    fn cbc_payload(c: &CbcCipher, seq: u64, content: &[u8], padding: &[u8]) -> Vec<u8> {
        let tag = c.mac(seq, ContentType::ApplicationData.as_u8(), TLS12, content);
        let iv = [0x3C; BLOCK_LEN];
        let mut body = content.to_vec();
        body.extend_from_slice(tag.as_ref());
        body.extend_from_slice(padding);
        c.block.cbc_encrypt(&iv, &mut body).unwrap();
        let mut payload = iv.to_vec();
        payload.extend_from_slice(&body);
        payload
    }

    #[test]
    fn cbc_long_padding_accepted_and_wrong_padding_byte_rejected() {
        let mut c = CbcCipher::new(
            BlockAlgorithm::Aes128Cbc,
            MacAlgorithm::HmacSha1,
            &[5; 20],
            &[6; 16],
            None,
        )
        .unwrap();
        // 12 content + 20 MAC + 32 padding bytes of value 31.
        let good = cbc_payload(&c, 9, &[0xAB; 12], &[31; 32]);
        let hdr = header_for(TLS12, ContentType::ApplicationData, &good);
        let (_, out) = c.open(9, &hdr, &good).unwrap();
        assert_eq!(out, [0xAB; 12]);

        let mut padding = [31u8; 32];
        padding[3] = 30;
        let bad = cbc_payload(&c, 9, &[0xAB; 12], &padding);
        let hdr = header_for(TLS12, ContentType::ApplicationData, &bad);
        assert!(matches!(
            c.open(9, &hdr, &bad),
            Err(Error::Decrypt(DecryptError::BadRecordMac))
        ));
    }
}
