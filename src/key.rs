//! Key specifications, key pairs and the signing primitives behind them.
//!
//! Every supported algorithm is a variant of [`KeySpec`], [`KeyPair`] and
//! [`PublicKey`]. Generation, signing, verification and DER export all
//! dispatch on that closed set, so adding an algorithm means adding one arm
//! to each match below.

use std::fmt;

use der::{Decode, Encode};
use ecdsa::signature::{SignatureEncoding, Signer, Verifier};
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{KeyweaverError, Result};

/// RSA modulus size used when a specification leaves the size unset.
pub const DEFAULT_RSA_BITS: usize = 4096;
/// Smallest RSA modulus accepted for a CA key.
pub const MIN_RSA_BITS: usize = 2048;
/// Largest RSA modulus accepted for a CA key.
pub const MAX_RSA_BITS: usize = 16384;

/// Algorithm and size of a key to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Rsa { bits: usize },
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl Default for KeySpec {
    fn default() -> Self {
        KeySpec::Rsa {
            bits: DEFAULT_RSA_BITS,
        }
    }
}

impl KeySpec {
    /// Resolves an RSA size as written in configuration.
    ///
    /// `None` and `0` select [`DEFAULT_RSA_BITS`]. Anything outside
    /// `MIN_RSA_BITS..=MAX_RSA_BITS`, negatives included, is rejected.
    pub fn rsa(bits: Option<i64>) -> Result<Self> {
        match bits {
            None | Some(0) => Ok(KeySpec::default()),
            Some(bits) if bits >= MIN_RSA_BITS as i64 && bits <= MAX_RSA_BITS as i64 => {
                Ok(KeySpec::Rsa {
                    bits: bits as usize,
                })
            }
            Some(bits) => Err(KeyweaverError::InvalidInput(format!(
                "RSA key size {bits} is outside {MIN_RSA_BITS}..={MAX_RSA_BITS}"
            ))),
        }
    }

    /// Generates a key pair for this specification.
    pub fn generate(&self) -> Result<KeyPair> {
        match self {
            KeySpec::Rsa { bits } => KeyPair::generate_rsa(*bits),
            KeySpec::EcdsaP256 => Ok(KeyPair::generate_ecdsa_p256()),
            KeySpec::EcdsaP384 => Ok(KeyPair::generate_ecdsa_p384()),
            KeySpec::Ed25519 => Ok(KeyPair::generate_ed25519()),
        }
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Rsa { bits } => write!(f, "RSA-{bits}"),
            KeySpec::EcdsaP256 => f.write_str("ECDSA P-256"),
            KeySpec::EcdsaP384 => f.write_str("ECDSA P-384"),
            KeySpec::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

/// A private key together with its public half.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.signature_algorithm())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| KeyweaverError::KeyGenerationFailure(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P384SigningKey::random(&mut rng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = Ed25519SigningKey::generate(&mut rng);
        KeyPair::Ed25519 { signing_key }
    }

    /// The algorithm this key signs certificates with.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Signs `data`, returning the signature in the encoding X.509 expects
    /// (PKCS#1 v1.5 bytes, DER `Ecdsa-Sig-Value`, or raw Ed25519).
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_failure = |e: ecdsa::signature::Error| {
            KeyweaverError::SigningFailure(e.to_string())
        };
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private.as_ref().clone());
                let signature = signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::DerSignature =
                    signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: p384::ecdsa::DerSignature =
                    signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.to_vec())
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature = signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// Encodes the private key as an unencrypted PKCS#8 `PrivateKeyInfo`.
    pub fn private_key_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der(),
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der(),
            KeyPair::EcdsaP384 { signing_key, .. } => signing_key.to_pkcs8_der(),
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der(),
        }
        .map_err(|e| KeyweaverError::EncodingFailure(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }
}

/// The public half of a [`KeyPair`], or a key recovered from a certificate.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Encodes the key as a DER `SubjectPublicKeyInfo`.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(key) => key.to_public_key_der(),
            PublicKey::EcdsaP256(key) => key.to_public_key_der(),
            PublicKey::EcdsaP384(key) => key.to_public_key_der(),
            PublicKey::Ed25519(key) => key.to_public_key_der(),
        }
        .map_err(|e| KeyweaverError::EncodingFailure(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned::from_der(&self.to_der()?)?)
    }

    /// Recovers a key from a certificate's `SubjectPublicKeyInfo`.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let decoding_failure =
            |e: x509_cert::spki::Error| KeyweaverError::EncodingFailure(e.to_string());

        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => RsaPublicKey::from_public_key_der(&der)
                .map(PublicKey::Rsa)
                .map_err(decoding_failure),
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                // The curve is named in the algorithm parameters; each decoder
                // rejects a curve other than its own.
                P256VerifyingKey::from_public_key_der(&der)
                    .map(PublicKey::EcdsaP256)
                    .or_else(|_| {
                        P384VerifyingKey::from_public_key_der(&der).map(PublicKey::EcdsaP384)
                    })
                    .map_err(decoding_failure)
            }
            const_oid::db::rfc8410::ID_ED_25519 => Ed25519VerifyingKey::from_public_key_der(&der)
                .map(PublicKey::Ed25519)
                .map_err(decoding_failure),
            oid => Err(KeyweaverError::InvalidInput(format!(
                "unsupported public key algorithm {oid}"
            ))),
        }
    }

    /// Checks `signature` over `data`, in the encoding produced by
    /// [`KeyPair::sign_data`].
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let rejected = |e: ecdsa::signature::Error| KeyweaverError::SigningFailure(e.to_string());
        match self {
            PublicKey::Rsa(key) => {
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                let signature =
                    rsa::pkcs1v15::Signature::try_from(signature).map_err(rejected)?;
                verifying_key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::EcdsaP256(key) => {
                let signature = p256::ecdsa::DerSignature::try_from(signature).map_err(rejected)?;
                key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::EcdsaP384(key) => {
                let signature = p384::ecdsa::DerSignature::try_from(signature).map_err(rejected)?;
                key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::Ed25519(key) => {
                let signature =
                    ed25519_dalek::Signature::from_slice(signature).map_err(rejected)?;
                key.verify(data, &signature).map_err(rejected)
            }
        }
    }

    /// SHA-1 over the `subjectPublicKey` bits (RFC 5280 section 4.2.1.2, method 1).
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.to_spki()?;
        let digest = <Sha1 as sha1::Digest>::digest(spki.subject_public_key.raw_bytes());
        Ok(digest.to_vec())
    }
}
