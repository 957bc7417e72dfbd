use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::{Tag, Tagged};
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::error::{KeyweaverError, Result};
use crate::key::PublicKey;

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsageOption;

/// Parameters for a CA certificate, before issuer and serial are known.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - Extended key usages to grant.
/// * `is_ca` - Marks the certificate as a CA (basic constraints `cA`).
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509 `Name`.
    ///
    /// Attributes are emitted from the least to the most specific
    /// (C, ST, L, O, OU, CN), one per RDN, skipping unset fields. Country is
    /// a `PrintableString` as RFC 5280 requires; everything else is UTF-8.
    pub fn as_x509_name(&self) -> Result<Name> {
        if self.common_name.trim().is_empty() {
            return Err(KeyweaverError::InvalidInput(
                "common name must not be empty".to_string(),
            ));
        }

        let attributes = [
            (rfc4519::C, self.country.as_deref()),
            (rfc4519::ST, self.state.as_deref()),
            (rfc4519::L, self.locality.as_deref()),
            (rfc4519::O, self.organization.as_deref()),
            (rfc4519::OU, self.organization_unit.as_deref()),
            (rfc4519::CN, Some(self.common_name.as_str())),
        ];

        let mut rdns = Vec::new();
        for (oid, value) in attributes {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let attribute = AttributeTypeAndValue {
                oid,
                value: encode_attribute_value(oid, value)?,
            };
            let set = SetOfVec::try_from(vec![attribute])?;
            rdns.push(RelativeDistinguishedName(set));
        }

        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 `Name`.
    ///
    /// Attributes other than the six above are ignored, as are values that
    /// are not text strings.
    pub fn from_x509_name(x509dn: &Name) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = decode_attribute_value(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    rfc4519::CN => dn.common_name = value,
                    rfc4519::C => dn.country = Some(value),
                    rfc4519::ST => dn.state = Some(value),
                    rfc4519::L => dn.locality = Some(value),
                    rfc4519::O => dn.organization = Some(value),
                    rfc4519::OU => dn.organization_unit = Some(value),
                    _ => {}
                }
            }
        }

        dn
    }
}

fn encode_attribute_value(oid: ObjectIdentifier, value: &str) -> Result<Any> {
    if oid == rfc4519::C {
        PrintableStringRef::new(value).map_err(|e| {
            KeyweaverError::InvalidInput(format!("country `{value}` is not printable: {e}"))
        })?;
        Ok(Any::new(Tag::PrintableString, value.as_bytes())?)
    } else {
        Ok(Any::new(Tag::Utf8String, value.as_bytes())?)
    }
}

fn decode_attribute_value(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
            std::str::from_utf8(value.value()).ok().map(str::to_string)
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// The start is truncated to whole seconds, the precision X.509 time
    /// values carry, so the encoded window is exactly `days` long.
    pub fn for_days(days: u32) -> Result<Self> {
        if days == 0 {
            return Err(KeyweaverError::InvalidInput(
                "validity must be at least one day".to_string(),
            ));
        }
        let now = OffsetDateTime::now_utc();
        let not_before = now
            .replace_nanosecond(0)
            .map_err(|e| KeyweaverError::InvalidInput(e.to_string()))?;
        let not_after = not_before
            .checked_add(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                KeyweaverError::InvalidInput(format!(
                    "validity of {days} days ends beyond the representable date range"
                ))
            })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }
}

/// Represents an X.509 extension ready to be placed in a certificate.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }
}
