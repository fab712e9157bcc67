//! Key material provider.
//!
//! Keys are loaded once at startup and shared read-only for the process
//! lifetime. A missing or unreadable key is fatal, never a per-request error.

use crate::signature::{Signer, Verifier};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};

/// Smallest modulus accepted by [`KeyPair::generate`]
pub const MIN_KEY_BITS: usize = 1024;

/// File name of the generated private key
pub const PRIVATE_KEY_FILE: &str = "private.pem";
/// File name of the generated public key
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Key material errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Key file could not be read or written
    #[error("key file {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// PEM text is not an RSA key
    #[error("failed to parse {kind} key: {reason}")]
    Parse {
        /// "private" or "public"
        kind: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Public key does not belong to the private key
    #[error("public key does not match private key")]
    Mismatch,

    /// Key generation failed
    #[error("key generation failed: {0}")]
    Generate(String),

    /// Key could not be encoded
    #[error("key encoding failed: {0}")]
    Encode(String),

    /// Signing operation failed
    #[error("signing failed: {0}")]
    Sign(String),
}

/// The service signing keypair
#[derive(Debug, Clone)]
pub struct KeyPair {
    signer: Signer,
    verifier: Verifier,
}

impl KeyPair {
    /// Generate a fresh keypair
    ///
    /// # Errors
    ///
    /// Returns error if `bits` is below [`MIN_KEY_BITS`] or generation fails
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_KEY_BITS {
            return Err(KeyError::Generate(format!(
                "{bits}-bit keys are too small (minimum {MIN_KEY_BITS})"
            )));
        }
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, bits).map_err(|e| KeyError::Generate(e.to_string()))?;
        Ok(Self::from_private(key))
    }

    /// Build from a private key, deriving the public half
    #[must_use]
    pub fn from_private(key: RsaPrivateKey) -> Self {
        let signer = Signer::new(key);
        let verifier = signer.verifier();
        Self { signer, verifier }
    }

    /// Parse PEM text
    ///
    /// The private key may be PKCS#8 or PKCS#1. The public key, if given,
    /// may be SPKI or PKCS#1 and must match the private key.
    ///
    /// # Errors
    ///
    /// Returns error if either key fails to parse or they do not match
    pub fn from_pem(private_pem: &str, public_pem: Option<&str>) -> Result<Self, KeyError> {
        let key = parse_private(private_pem)?;
        let pair = Self::from_private(key);
        if let Some(public_pem) = public_pem {
            let public = parse_public(public_pem)?;
            if &public != pair.verifier.public_key() {
                return Err(KeyError::Mismatch);
            }
        }
        Ok(pair)
    }

    /// Load PEM files from disk
    ///
    /// # Errors
    ///
    /// Returns error if a file is missing, unreadable or malformed
    pub fn load(private_path: &Path, public_path: Option<&Path>) -> Result<Self, KeyError> {
        let private_pem = read(private_path)?;
        let public_pem = public_path.map(read).transpose()?;
        Self::from_pem(&private_pem, public_pem.as_deref())
    }

    /// Signing half
    #[must_use]
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Verifying half
    #[must_use]
    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Private key as PKCS#8 PEM
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn private_pem(&self) -> Result<String, KeyError> {
        let pem = self
            .signer
            .private_key()
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encode(e.to_string()))?;
        Ok(pem.to_string())
    }

    /// Public key as SPKI PEM
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn public_pem(&self) -> Result<String, KeyError> {
        self.verifier
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encode(e.to_string()))
    }

    /// Write `private.pem` and `public.pem` into `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory or files cannot be written
    pub fn write_pem(&self, dir: &Path) -> Result<(PathBuf, PathBuf), KeyError> {
        std::fs::create_dir_all(dir).map_err(|source| KeyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);
        write(&private_path, &self.private_pem()?)?;
        restrict(&private_path)?;
        write(&public_path, &self.public_pem()?)?;
        Ok((private_path, public_path))
    }
}

/// Load a verifier from a public key PEM file (SPKI or PKCS#1)
///
/// # Errors
///
/// Returns error if the file is missing or not an RSA public key
pub fn load_verifier(path: &Path) -> Result<Verifier, KeyError> {
    Ok(Verifier::new(parse_public(&read(path)?)?))
}

fn parse_private(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| KeyError::Parse {
            kind: "private",
            reason: e.to_string(),
        })
}

fn parse_public(pem: &str) -> Result<RsaPublicKey, KeyError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| KeyError::Parse {
            kind: "public",
            reason: e.to_string(),
        })
}

fn read(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), KeyError> {
    std::fs::write(path, contents).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn restrict(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        KeyError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

/// Shared 1024-bit keypair for unit tests
#[cfg(test)]
pub(crate) fn test_keys() -> &'static KeyPair {
    static KEYS: std::sync::OnceLock<KeyPair> = std::sync::OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(1024).unwrap())
}
