//! RSA PKCS#1 v1.5 signatures over SHA-256.
//!
//! Signatures travel as standard base64 text. That text, not the raw bytes,
//! is what gets appended to the canonical form before digesting.

use crate::keys::KeyError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest as _, Sha256};

/// Creates signatures with the service private key
#[derive(Debug, Clone)]
pub struct Signer {
    key: RsaPrivateKey,
}

impl Signer {
    /// Wrap a private key
    #[must_use]
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Matching verifier
    #[must_use]
    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.key.to_public_key())
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }

    /// Sign a message and return the base64 signature text
    ///
    /// # Errors
    ///
    /// Returns error if the key cannot produce a signature
    pub fn sign(&self, message: &[u8]) -> Result<String, KeyError> {
        let hashed = Sha256::digest(message);
        let mut rng = rand::thread_rng();
        let signature = self
            .key
            .sign_with_rng(&mut rng, Pkcs1v15Sign::new::<Sha256>(), &hashed)
            .map_err(|e| KeyError::Sign(e.to_string()))?;
        Ok(STANDARD.encode(signature))
    }
}

/// Checks signatures against the service public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier {
    key: RsaPublicKey,
}

impl Verifier {
    /// Wrap a public key
    #[must_use]
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    pub(crate) fn public_key(&self) -> &RsaPublicKey {
        &self.key
    }

    /// Check `signature_text` over `message`
    ///
    /// Mismatches and undecodable signature text both yield `false`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature_text: &str) -> bool {
        let Ok(signature) = STANDARD.decode(signature_text.trim()) else {
            return false;
        };
        let hashed = Sha256::digest(message);
        self.key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature)
            .is_ok()
    }

    /// SHA-256 of the SPKI DER encoding, hex
    ///
    /// # Errors
    ///
    /// Returns error if the key cannot be DER-encoded
    pub fn fingerprint(&self) -> Result<String, KeyError> {
        let der = self
            .key
            .to_public_key_der()
            .map_err(|e| KeyError::Encode(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(der.as_bytes())))
    }
}
