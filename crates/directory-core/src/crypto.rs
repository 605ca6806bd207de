//! Identity keys, address derivation and signatures
//!
//! Node identity is a secp256k1 key. Signatures are ECDSA with SHA-256,
//! DER encoded and carried as hex. The node address is
//! `hex(SHA-256(SPKI-DER(public_key)))`.

use crate::error::{Error, Result};
use crate::types::Address;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use k256::SecretKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

// =============================================================================
// ADDRESS DERIVATION
// =============================================================================

/// Derive a node address from SPKI-DER public key bytes.
///
/// `Address = hex(SHA-256(spki_der))`
pub fn derive_address(spki_der: &[u8]) -> Address {
    Address(hex::encode(Sha256::digest(spki_der)))
}

/// Derive a node address from an SPKI PEM public key.
pub fn address_from_pem(public_key_pem: &str) -> Result<Address> {
    let verifying_key = parse_public_key(public_key_pem)?;
    let der = verifying_key
        .to_public_key_der()
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    Ok(derive_address(der.as_bytes()))
}

fn parse_public_key(public_key_pem: &str) -> Result<VerifyingKey> {
    VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))
}

// =============================================================================
// IDENTITY KEYS
// =============================================================================

/// A node's signing identity
#[derive(Clone)]
pub struct IdentityKeys {
    signing_key: SigningKey,
    public_key_pem: String,
    public_key_der: Vec<u8>,
    address: Address,
}

impl IdentityKeys {
    /// Load a private key from a PEM file (PKCS#8 or SEC1).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let pem = String::from_utf8(bytes)
            .map_err(|_| Error::KeyFormat("key file is not valid UTF-8 PEM".into()))?;
        Self::from_pem(&pem)
    }

    /// Parse a private key from PEM text (PKCS#8 or SEC1).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem).map(SigningKey::from))
            .map_err(|e| Error::KeyFormat(e.to_string()))?;
        Self::from_signing_key(signing_key)
    }

    /// Generate a new random identity
    pub fn generate() -> Result<Self> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self> {
        let verifying_key = *signing_key.verifying_key();
        let public_key_pem = verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        let public_key_der = verifying_key
            .to_public_key_der()
            .map_err(|e| Error::InvalidPublicKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        let address = derive_address(&public_key_der);

        Ok(Self {
            signing_key,
            public_key_pem,
            public_key_der,
            address,
        })
    }

    /// Write the private key as PKCS#8 PEM
    pub fn save_pem(&self, path: impl AsRef<Path>) -> Result<()> {
        let pem = self
            .signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::KeyFormat(e.to_string()))?;
        std::fs::write(path.as_ref(), pem.as_bytes())?;
        Ok(())
    }

    /// SPKI public key, PEM encoded
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// SPKI public key, DER encoded
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// This identity's node address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign canonical bytes, returning the hex DER signature
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(message);
        hex::encode(signature.to_der().as_bytes())
    }
}

impl fmt::Debug for IdentityKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeys")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// VERIFICATION
// =============================================================================

/// Verify a hex DER signature over `message` with an SPKI PEM public key.
pub fn check_signature(message: &[u8], signature_hex: &str, public_key_pem: &str) -> Result<()> {
    let verifying_key = parse_public_key(public_key_pem)?;
    let der = hex::decode(signature_hex).map_err(|_| Error::InvalidSignature)?;
    let signature = Signature::from_der(&der).map_err(|_| Error::InvalidSignature)?;
    // Other signers are not required to emit low-S signatures
    let signature = signature.normalize_s().unwrap_or(signature);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| Error::InvalidSignature)
}

/// Boolean form of [`check_signature`].
pub fn verify_signature(message: &[u8], signature_hex: &str, public_key_pem: &str) -> bool {
    check_signature(message, signature_hex, public_key_pem).is_ok()
}
