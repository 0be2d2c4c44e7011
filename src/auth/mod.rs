//! # Authentication
//!
//! RSA material used to answer a device's AUTH challenge.
//!
//! - **keypair**: PEM private key loading, generation and token signing
//! - **public_key**: the device-format public key (`adbkey.pub`)
//!
//! adbd verifies signatures with raw RSA against a PKCS#1 v1.5 SHA-1 layout
//! whose digest slot is filled by the 20-byte token itself, so signing is a
//! bare modular exponentiation over [`SIGNATURE_PADDING`] followed by the
//! token.

pub mod keypair;
pub mod public_key;

pub use keypair::AdbKeyPair;
pub use public_key::AdbPublicKey;

/// `00 01`, 218 bytes of `FF`, `00`, then the SHA-1 DigestInfo prefix.
pub const SIGNATURE_PADDING: [u8; 236] = {
    const DIGEST_INFO: [u8; 15] = [
        0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
    ];
    let mut padding = [0xFFu8; 236];
    padding[0] = 0x00;
    padding[1] = 0x01;
    padding[220] = 0x00;
    let mut i = 0;
    while i < DIGEST_INFO.len() {
        padding[221 + i] = DIGEST_INFO[i];
        i += 1;
    }
    padding
};

/// Token size adbd sends; padding plus token fills one 2048-bit block.
pub const TOKEN_SIZE: usize = 20;
