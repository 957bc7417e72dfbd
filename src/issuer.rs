use der::Encode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::AuthorityKeyIdentifier;
use crate::cert::extensions::BasicConstraints;
use crate::cert::extensions::ExtendedKeyUsage;
use crate::cert::extensions::KeyUsage;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::error::{KeyweaverError, Result};
use crate::key::KeyPair;
use crate::serial::generate_serial_number;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// Implementors supply the name that goes into the issuer field and the
/// key that signs; [`Issuer::issue`] does the rest.
pub trait Issuer {
    /// Returns the issuer name, exactly as it must appear in issued certificates.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// A fresh serial number is drawn for every call. The certificate
    /// always carries basic constraints, key usage, subject and authority
    /// key identifiers; extended key usage is added when `usages` is
    /// non-empty.
    ///
    /// # Arguments
    /// * `cert_request` - Subject, subject key and usages of the new certificate.
    /// * `validity` - The validity window.
    fn issue(&self, cert_request: &CertificationRequestInfo, validity: Validity) -> Result<Certificate> {
        let signing_key = self.signing_key();
        let signature_algo = signing_key.signature_algorithm();
        let serial_number = generate_serial_number()?;

        let subject_key_id = cert_request.subject_public_key.key_identifier()?;
        let authority_key_id = signing_key.public_key().key_identifier()?;

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(basic_constraints, true)?,
            ExtensionParam::from_extension(
                SubjectKeyIdentifier {
                    key_identifier: subject_key_id,
                },
                false,
            )?,
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: authority_key_id,
                },
                false,
            )?,
        ];

        if cert_request.is_ca {
            extensions.push(ExtensionParam::from_extension(
                KeyUsage::certificate_authority(),
                true,
            )?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm: signature_algo.clone(),
            issuer: self.issuer_name()?,
            not_before: validity.not_before,
            not_after: validity.not_after,
            subject: cert_request.subject.as_x509_name()?,
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = signing_key.sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// Issuer for a root: the subject signs itself and names itself as issuer.
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// The private key and parsed certificate of the CA currently acting as
/// issuer for its children.
///
/// `cert` must be the certificate as decoded from its encoded form, so the
/// issuer name copied into children is byte-for-byte what verifiers see.
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for SigningContext {
    fn issuer_name(&self) -> Result<Name> {
        // The name of the issuer is the subject of the certificate
        Ok(self.cert.subject().clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}

impl Certificate {
    /// Creates a new self-signed certificate.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.as_x509_name()?,
            key,
        };
        self_issuer.issue(cert_info, validity)
    }
}

/// Issues a CA certificate for `subject_key`.
///
/// Without a signing context the certificate is self-signed (a root).
/// With one, the parent's key signs it and the parent's certificate
/// supplies the issuer name (an intermediate). Only the subject's public
/// key is embedded.
pub fn issue_ca_certificate(
    cert_info: &CertificationRequestInfo,
    subject_key: &KeyPair,
    validity: Validity,
    parent: Option<&SigningContext>,
) -> Result<Certificate> {
    if cert_info.subject_public_key.to_der()? != subject_key.public_key().to_der()? {
        return Err(KeyweaverError::InvalidInput(
            "request public key does not belong to the subject key pair".to_string(),
        ));
    }

    match parent {
        None => Certificate::new_self_signed(cert_info, subject_key, validity),
        Some(parent) => parent.issue(cert_info, validity),
    }
}
