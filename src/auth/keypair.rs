//! Host key pair.
//!
//! The private key lives in a PEM file (PKCS#8, with PKCS#1 accepted on
//! read). The public half is sent to the device verbatim as the contents of
//! `adbkey.pub` plus a trailing NUL.

use std::fs;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use tracing::{debug, info, instrument};

use crate::auth::public_key::{AdbPublicKey, KEY_LENGTH_BITS, KEY_LENGTH_BYTES};
use crate::auth::SIGNATURE_PADDING;
use crate::config::AuthConfig;
use crate::error::{constants, AdbError, Result};

pub struct AdbKeyPair {
    private_key: RsaPrivateKey,
    public_key_bytes: Vec<u8>,
}

impl std::fmt::Debug for AdbKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdbKeyPair")
            .field("modulus_bits", &self.private_key.n().bits())
            .field("public_key_len", &self.public_key_bytes.len())
            .finish_non_exhaustive()
    }
}

impl AdbKeyPair {
    /// `public_key_bytes` is the RSA_PUBLIC payload, NUL included.
    pub fn new(private_key: RsaPrivateKey, public_key_bytes: Vec<u8>) -> Self {
        Self {
            private_key,
            public_key_bytes,
        }
    }

    /// Build a pair whose public bytes are derived from the private key.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public = AdbPublicKey::from_rsa(&private_key.to_public_key())?;
        let public_key_bytes = nul_terminated(public.to_file_string().into_bytes());
        Ok(Self::new(private_key, public_key_bytes))
    }

    /// Parse a PEM private key, PKCS#8 first, then PKCS#1.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_private_key(parse_private_key(pem)?)
    }

    /// Raw RSA over `SIGNATURE_PADDING || payload`, left-padded to the key size.
    ///
    /// # Errors
    /// `AdbError::Crypto` if the padded payload is not smaller than the modulus.
    pub fn sign_payload(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut message = Vec::with_capacity(SIGNATURE_PADDING.len() + payload.len());
        message.extend_from_slice(&SIGNATURE_PADDING);
        message.extend_from_slice(payload);

        let m = BigUint::from_bytes_be(&message);
        let n = self.private_key.n();
        if &m >= n {
            return Err(AdbError::Crypto(constants::ERR_MESSAGE_TOO_LARGE.to_string()));
        }

        let signature = m.modpow(self.private_key.d(), n).to_bytes_be();
        let width = n.bits().div_ceil(8).max(KEY_LENGTH_BYTES);
        let mut out = vec![0u8; width - signature.len()];
        out.extend_from_slice(&signature);
        Ok(out)
    }

    /// Sign the payload of an AUTH TOKEN frame.
    pub fn sign_token(&self, token: &[u8]) -> Result<Vec<u8>> {
        self.sign_payload(token)
    }

    /// Payload for AUTH RSA_PUBLIC. May be empty if no public key was found.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Load a pair from disk. A missing public key file is derived from the
    /// private key instead of being sent empty.
    #[instrument(skip_all, fields(private = %private_key_file.as_ref().display()))]
    pub fn read(
        private_key_file: impl AsRef<Path>,
        public_key_file: Option<&Path>,
    ) -> Result<Self> {
        let pem = fs::read_to_string(private_key_file.as_ref()).map_err(|e| {
            AdbError::Key(format!(
                "Failed to read private key {}: {e}",
                private_key_file.as_ref().display()
            ))
        })?;
        let private_key = parse_private_key(&pem)?;

        match public_key_file.filter(|path| path.exists()) {
            Some(path) => {
                let bytes = fs::read(path).map_err(|e| {
                    AdbError::Key(format!("Failed to read public key {}: {e}", path.display()))
                })?;
                debug!(public = %path.display(), "Loaded public key file");
                Ok(Self::new(private_key, nul_terminated(bytes)))
            }
            None => {
                debug!("No public key file, deriving from private key");
                Self::from_private_key(private_key)
            }
        }
    }

    /// Write a fresh 2048-bit pair: PKCS#8 PEM private key and device-format
    /// public key. Parent directories are created as needed.
    #[instrument(skip_all, fields(private = %private_key_file.display()))]
    pub fn generate(private_key_file: &Path, public_key_file: &Path) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, KEY_LENGTH_BITS)
            .map_err(|e| AdbError::Crypto(format!("Key generation failed: {e}")))?;
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AdbError::Key(format!("Failed to encode private key: {e}")))?;
        let public = AdbPublicKey::from_rsa(&private_key.to_public_key())?;

        for path in [private_key_file, public_key_file] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(private_key_file, pem.as_bytes())?;
        restrict_permissions(private_key_file)?;
        fs::write(public_key_file, public.to_file_string())?;

        info!(public = %public_key_file.display(), "Generated new ADB key pair");
        Ok(Self::new(
            private_key,
            nul_terminated(public.to_file_string().into_bytes()),
        ))
    }

    /// Load the pair named by `config`, generating it first if allowed.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let private = config.private_key_file()?;
        let public = config.public_key_file()?;
        if !private.exists() {
            if !config.generate_if_missing {
                return Err(AdbError::Key(format!(
                    "Private key not found: {}",
                    private.display()
                )));
            }
            return Self::generate(&private, &public);
        }
        Self::read(&private, Some(&public))
    }

    /// `$HOME/.android/adbkey`, generated when absent.
    pub fn read_default() -> Result<Self> {
        Self::from_config(&AuthConfig::default())
    }
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|pkcs8_err| {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                AdbError::Key(format!(
                    "Unrecognised private key (pkcs8: {pkcs8_err}; pkcs1: {pkcs1_err})"
                ))
            })
        })
}

fn nul_terminated(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(0);
    bytes
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
