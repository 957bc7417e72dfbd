pub mod extensions;
pub mod params;

use der::asn1::AnyRef;
use der::{Decode, DecodePem, Encode};
use extensions::{BasicConstraints, ToAndFromX509Extension};
use params::{DistinguishedName, Validity};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::error::{KeyweaverError, Result};
use crate::key::PublicKey;
use crate::tbs_certificate::from_x509_time;

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// Ed25519 (pure EdDSA, no separate digest).
    Ed25519,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA carries explicit NULL parameters (RFC 4055); ECDSA and Ed25519
    /// omit them (RFC 5758, RFC 8410).
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(AnyRef::NULL.into()),
            },
            SignatureAlgorithm::Sha256WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
            SignatureAlgorithm::Sha384WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
                parameters: None,
            },
            SignatureAlgorithm::Ed25519 => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc8410::ID_ED_25519,
                parameters: None,
            },
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER, to
/// decode it from DER or PEM, and to read the fields the hierarchy cares
/// about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| KeyweaverError::EncodingFailure(e.to_string()))
    }

    /// Decodes a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| KeyweaverError::EncodingFailure(format!("malformed certificate: {e}")))?;
        Ok(Self { inner })
    }

    /// Decodes a PEM `CERTIFICATE` block.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self> {
        let inner = CertificateInner::from_pem(pem)
            .map_err(|e| KeyweaverError::EncodingFailure(format!("malformed certificate: {e}")))?;
        Ok(Self { inner })
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.inner.tbs_certificate.serial_number
    }

    /// The subject as plain attribute values.
    pub fn subject_dn(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.subject())
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: from_x509_time(&validity.not_before),
            not_after: from_x509_time(&validity.not_after),
        }
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Looks up an extension by type and decodes it.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// True when basic constraints are present and mark a CA.
    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }

    /// True when issuer and subject are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.issuer() == self.subject()
    }

    /// Checks that `issuer` issued this certificate: the issuer field
    /// must equal the issuer's subject and the signature must verify
    /// against the issuer's public key.
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<()> {
        if self.issuer() != issuer.subject() {
            return Err(KeyweaverError::SigningFailure(format!(
                "issuer `{}` does not match `{}`",
                self.issuer(),
                issuer.subject()
            )));
        }

        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.raw_bytes();
        issuer.public_key()?.verify(&tbs, signature)
    }
}
