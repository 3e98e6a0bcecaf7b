//! Ed25519 key pairs for license signing.
//!
//! Private keys travel as PKCS#8 PEM (`PRIVATE KEY`), public keys as SPKI
//! PEM (`PUBLIC KEY`). The verifying side is expected to compile its public
//! key in, see [`PublicKey::to_rust_const`].

use crate::error::{LicenseError, LicenseResult};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::spki::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey as DalekSigningKey,
    VerifyingKey as DalekVerifyingKey,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// Length of a raw Ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Issuer-side signing key. Never shipped with a verifying application.
#[derive(Clone)]
pub struct PrivateKey(DalekSigningKey);

/// Verifier-side public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(DalekVerifyingKey);

/// A signing key together with its derived public key.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generates a fresh key pair from the operating system entropy source.
    ///
    /// May block until system entropy is available; run it on a setup path.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyGeneration`] if the entropy source fails.
    pub fn generate() -> LicenseResult<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generates a key pair from the given cryptographic RNG.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyGeneration`] if the RNG fails.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> LicenseResult<Self> {
        let mut seed = [0u8; 32];
        rng.try_fill_bytes(&mut seed)
            .map_err(|e| LicenseError::KeyGeneration(e.to_string()))?;
        let private_key = PrivateKey::from_seed(&seed);
        seed.zeroize();
        Ok(Self::from_private_key(private_key))
    }

    /// Rebuilds the pair from a private key.
    #[must_use]
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Returns the signing half.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Exports the private key as PKCS#8 PEM.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn export_private(&self) -> LicenseResult<String> {
        self.private_key.to_pem()
    }

    /// Exports the public key as SPKI PEM.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn export_public(&self) -> LicenseResult<String> {
        self.public_key.to_pem()
    }
}

impl PrivateKey {
    /// Creates a private key from a raw 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(DalekSigningKey::from_bytes(seed))
    }

    /// Parses a PKCS#8 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if markers or body are malformed.
    pub fn from_pem(pem: &str) -> LicenseResult<Self> {
        DalekSigningKey::from_pkcs8_pem(pem.trim())
            .map(Self)
            .map_err(|e| LicenseError::KeyParse(format!("private key PEM: {e}")))
    }

    /// Parses a PKCS#8 PEM private key from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if the bytes are not UTF-8 PEM.
    pub fn from_pem_bytes(bytes: &[u8]) -> LicenseResult<Self> {
        let pem = std::str::from_utf8(bytes)
            .map_err(|_| LicenseError::KeyParse("private key PEM is not UTF-8".to_string()))?;
        Self::from_pem(pem)
    }

    /// Encodes the key as PKCS#8 PEM with LF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn to_pem(&self) -> LicenseResult<String> {
        let pem = self
            .0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| LicenseError::KeyParse(format!("private key encoding: {e}")))?;
        Ok(pem.to_string())
    }

    /// Derives the matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub(crate) fn sign(&self, message: &[u8]) -> LicenseResult<Vec<u8>> {
        let signature: DalekSignature = self
            .0
            .try_sign(message)
            .map_err(|e| LicenseError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").field(&"[REDACTED]").finish()
    }
}

impl PublicKey {
    /// Creates a public key from its raw 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if the bytes are not a valid point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> LicenseResult<Self> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| LicenseError::KeyParse("invalid Ed25519 public key".to_string()))
    }

    /// Parses an SPKI PEM public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if markers or body are malformed.
    pub fn from_pem(pem: &str) -> LicenseResult<Self> {
        DalekVerifyingKey::from_public_key_pem(pem.trim())
            .map(Self)
            .map_err(|e| LicenseError::KeyParse(format!("public key PEM: {e}")))
    }

    /// Parses an SPKI PEM public key from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if the bytes are not UTF-8 PEM.
    pub fn from_pem_bytes(bytes: &[u8]) -> LicenseResult<Self> {
        let pem = std::str::from_utf8(bytes)
            .map_err(|_| LicenseError::KeyParse("public key PEM is not UTF-8".to_string()))?;
        Self::from_pem(pem)
    }

    /// Parses a DER-encoded SPKI public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if the structure is malformed.
    pub fn from_der(der: &[u8]) -> LicenseResult<Self> {
        DalekVerifyingKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| LicenseError::KeyParse(format!("public key DER: {e}")))
    }

    /// Encodes the key as SPKI PEM with LF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn to_pem(&self) -> LicenseResult<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| LicenseError::KeyParse(format!("public key encoding: {e}")))
    }

    /// Encodes the key as SPKI DER.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn to_der(&self) -> LicenseResult<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| LicenseError::KeyParse(format!("public key encoding: {e}")))
    }

    /// Encodes the key as lowercase hex of its SPKI DER form.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn to_der_hex(&self) -> LicenseResult<String> {
        self.to_der().map(hex::encode)
    }

    /// Returns the raw 32-byte key.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Renders a Rust `const` holding the PEM, for compiling into a verifier.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if encoding fails.
    pub fn to_rust_const(&self, name: &str) -> LicenseResult<String> {
        let pem = self.to_pem()?;
        Ok(format!(
            "/// SPKI public key used to verify license signatures.\npub const {name}: &str = {pem:?};\n"
        ))
    }

    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> LicenseResult<()> {
        let signature =
            DalekSignature::from_slice(signature).map_err(|_| LicenseError::SignatureInvalid)?;
        self.0
            .verify_strict(message, &signature)
            .map_err(|_| LicenseError::SignatureInvalid)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}
