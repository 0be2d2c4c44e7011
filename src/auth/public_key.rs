//! Device-format RSA public key.
//!
//! adbd stores and compares public keys as a raw little-endian C struct:
//!
//! ```text
//! struct {
//!     i32 len;            // modulus length in u32 words (64)
//!     u32 n0inv;          // -1 / n[0] mod 2^32
//!     u32 n[64];          // modulus, little-endian words
//!     u32 rr[64];         // R^2 mod n, R = 2^2048
//!     i32 exponent;       // public exponent
//! }                       // 524 bytes
//! ```
//!
//! On disk it is base64-encoded followed by ` unknown@unknown`.

use base64::Engine as _;
use bytes::{Buf, BufMut};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};

use crate::auth::SIGNATURE_PADDING;
use crate::error::{AdbError, Result};

pub const KEY_LENGTH_BITS: usize = 2048;
pub const KEY_LENGTH_BYTES: usize = KEY_LENGTH_BITS / 8;
pub const KEY_LENGTH_WORDS: usize = KEY_LENGTH_BYTES / 4;

/// Encoded struct size.
pub const ENCODED_LEN: usize = 4 + 4 + KEY_LENGTH_BYTES * 2 + 4;

/// Comment appended to the base64 text in `adbkey.pub`.
pub const KEY_COMMENT: &str = " unknown@unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbPublicKey {
    pub n0inv: u32,
    pub n: [u32; KEY_LENGTH_WORDS],
    pub rr: [u32; KEY_LENGTH_WORDS],
    pub exponent: u32,
}

fn to_words(value: &BigUint) -> Result<[u32; KEY_LENGTH_WORDS]> {
    let bytes = value.to_bytes_le();
    if bytes.len() > KEY_LENGTH_BYTES {
        return Err(AdbError::Key(format!(
            "Value needs {} bytes, key format holds {KEY_LENGTH_BYTES}",
            bytes.len()
        )));
    }
    let mut padded = [0u8; KEY_LENGTH_BYTES];
    padded[..bytes.len()].copy_from_slice(&bytes);

    let mut words = [0u32; KEY_LENGTH_WORDS];
    let mut buf = &padded[..];
    for word in words.iter_mut() {
        *word = buf.get_u32_le();
    }
    Ok(words)
}

fn from_words(words: &[u32; KEY_LENGTH_WORDS]) -> BigUint {
    let mut bytes = Vec::with_capacity(KEY_LENGTH_BYTES);
    for word in words {
        bytes.put_u32_le(*word);
    }
    BigUint::from_bytes_le(&bytes)
}

/// Inverse of an odd `n0` modulo 2^32 by Newton iteration.
fn inverse_mod_2_32(n0: u32) -> u32 {
    // Correct bits double each round: 3, 6, 12, 24, 48.
    let mut inv = n0;
    for _ in 0..4 {
        inv = inv.wrapping_mul(2u32.wrapping_sub(n0.wrapping_mul(inv)));
    }
    inv
}

impl AdbPublicKey {
    /// Precompute the Montgomery parameters for `key`.
    ///
    /// # Errors
    /// `AdbError::Key` if the modulus is wider than 2048 bits, even, or the
    /// exponent does not fit in 32 bits.
    pub fn from_rsa(key: &RsaPublicKey) -> Result<Self> {
        let modulus = key.n();
        let n = to_words(modulus)?;
        if n[0] & 1 == 0 {
            return Err(AdbError::Key("RSA modulus must be odd".to_string()));
        }

        let r_squared = BigUint::from(1u8) << (2 * KEY_LENGTH_BITS);
        let rr = to_words(&(r_squared % modulus))?;

        let exponent_bytes = key.e().to_bytes_le();
        if exponent_bytes.len() > 4 {
            return Err(AdbError::Key("Public exponent exceeds 32 bits".to_string()));
        }
        let mut exponent = [0u8; 4];
        exponent[..exponent_bytes.len()].copy_from_slice(&exponent_bytes);

        Ok(Self {
            n0inv: inverse_mod_2_32(n[0]).wrapping_neg(),
            n,
            rr,
            exponent: u32::from_le_bytes(exponent),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENCODED_LEN);
        buf.put_i32_le(KEY_LENGTH_WORDS as i32);
        buf.put_u32_le(self.n0inv);
        for word in &self.n {
            buf.put_u32_le(*word);
        }
        for word in &self.rr {
            buf.put_u32_le(*word);
        }
        buf.put_u32_le(self.exponent);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENCODED_LEN {
            return Err(AdbError::Key(format!(
                "Public key struct must be {ENCODED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = bytes;
        let len = buf.get_i32_le();
        if len != KEY_LENGTH_WORDS as i32 {
            return Err(AdbError::Key(format!("Unsupported key length: {len} words")));
        }
        let n0inv = buf.get_u32_le();
        let mut n = [0u32; KEY_LENGTH_WORDS];
        for word in n.iter_mut() {
            *word = buf.get_u32_le();
        }
        let mut rr = [0u32; KEY_LENGTH_WORDS];
        for word in rr.iter_mut() {
            *word = buf.get_u32_le();
        }
        let exponent = buf.get_u32_le();
        Ok(Self {
            n0inv,
            n,
            rr,
            exponent,
        })
    }

    /// `adbkey.pub` contents: base64 struct plus comment.
    pub fn to_file_string(&self) -> String {
        let mut text = base64::engine::general_purpose::STANDARD.encode(self.to_bytes());
        text.push_str(KEY_COMMENT);
        text
    }

    /// Parse `adbkey.pub` contents; the comment and trailing NULs are optional.
    pub fn from_file_string(text: &str) -> Result<Self> {
        let encoded = text
            .trim_end_matches('\0')
            .split_whitespace()
            .next()
            .ok_or_else(|| AdbError::Key("Empty public key file".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AdbError::Key(format!("Invalid base64 public key: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn modulus(&self) -> BigUint {
        from_words(&self.n)
    }

    /// Check a token signature the way adbd does: raw RSA with the public
    /// exponent must reproduce the fixed padding followed by the token.
    pub fn verify(&self, token: &[u8], signature: &[u8]) -> bool {
        let modulus = self.modulus();
        let s = BigUint::from_bytes_be(signature);
        if s >= modulus {
            return false;
        }
        let recovered = s.modpow(&BigUint::from(self.exponent), &modulus);

        let mut expected = Vec::with_capacity(SIGNATURE_PADDING.len() + token.len());
        expected.extend_from_slice(&SIGNATURE_PADDING);
        expected.extend_from_slice(token);
        recovered == BigUint::from_bytes_be(&expected)
    }
}
