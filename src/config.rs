//! The declarative description of a CA hierarchy.
//!
//! ```yaml
//! output_dir: ./pki
//! cas:
//!   root-ca:
//!     common_name: Example Root
//!     organization: Example
//!     country: "NO"
//!     validity_days: 3650
//!     issued_cas:
//!       intermediate-ca:
//!         common_name: Example Intermediate
//!         organization: Example
//!         country: "NO"
//!         validity_days: 1825
//!         key_type: ecdsa-p256
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::params::{CertificationRequestInfo, DistinguishedName};
use crate::error::{KeyweaverError, Result};
use crate::key::{KeySpec, PublicKey};

/// Path used when no configuration file is given.
pub const DEFAULT_CONFIG_PATH: &str = "ca.yaml";

/// A whole issuance run: where to write, and the root CAs to create.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfig {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub cas: BTreeMap<String, CaSpecification>,
    #[serde(default)]
    pub on_root_failure: FailurePolicy,
}

/// What happens to the remaining roots when one root's subtree fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run at the first failing CA.
    #[default]
    Abort,
    /// Abandon the failing root's subtree, carry on with the next root and
    /// report every failure at the end.
    Continue,
}

/// Key algorithm selection as written in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    #[default]
    Rsa,
    #[serde(alias = "ecdsa", alias = "p256")]
    EcdsaP256,
    #[serde(alias = "p384")]
    EcdsaP384,
    Ed25519,
}

/// One CA in the tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaSpecification {
    pub common_name: String,
    pub organization: String,
    pub country: String,
    #[serde(default)]
    pub organizational_unit: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    pub validity_days: u32,
    #[serde(default)]
    pub key_type: KeyType,
    /// RSA modulus size; signed so that negative values reach validation
    /// instead of failing deserialization.
    #[serde(default)]
    pub key_size: Option<i64>,
    #[serde(default)]
    pub issued_cas: BTreeMap<String, CaSpecification>,
}

impl CaConfig {
    /// Reads and validates a configuration file.
    ///
    /// The format follows the extension: `.json`, `.toml`, otherwise YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeyweaverError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
        .map_err(|e| match e {
            KeyweaverError::ConfigError(msg) => {
                KeyweaverError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| KeyweaverError::ConfigError(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| KeyweaverError::ConfigError(e.to_string()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KeyweaverError::ConfigError(e.to_string()))
    }

    /// Checks every CA in the tree, reporting the first problem with its path.
    pub fn validate(&self) -> Result<()> {
        fn walk(prefix: &str, cas: &BTreeMap<String, CaSpecification>) -> Result<()> {
            for (name, spec) in cas {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                validate_ca_name(name)
                    .and_then(|()| spec.validate())
                    .map_err(|e| KeyweaverError::ConfigError(format!("CA `{path}`: {e}")))?;
                walk(&path, &spec.issued_cas)?;
            }
            Ok(())
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(KeyweaverError::ConfigError(
                "output_dir must not be empty".to_string(),
            ));
        }
        walk("", &self.cas)
    }
}

impl CaSpecification {
    /// Checks this node's own fields; children are not visited.
    pub fn validate(&self) -> Result<()> {
        if self.common_name.trim().is_empty() {
            return Err(KeyweaverError::InvalidInput(
                "common_name must not be empty".to_string(),
            ));
        }
        if self.validity_days == 0 {
            return Err(KeyweaverError::InvalidInput(
                "validity_days must be positive".to_string(),
            ));
        }
        self.key_spec().map(|_| ())
    }

    /// Resolves `key_type` and `key_size` to a concrete key specification.
    pub fn key_spec(&self) -> Result<KeySpec> {
        let size = self.key_size.filter(|size| *size != 0);
        match (self.key_type, size) {
            (KeyType::Rsa, size) => KeySpec::rsa(size),
            (KeyType::EcdsaP256, None) => Ok(KeySpec::EcdsaP256),
            (KeyType::EcdsaP384, None) => Ok(KeySpec::EcdsaP384),
            (KeyType::Ed25519, None) => Ok(KeySpec::Ed25519),
            (key_type, Some(size)) => Err(KeyweaverError::InvalidInput(format!(
                "key_size {size} does not apply to key type {key_type:?}"
            ))),
        }
    }

    pub fn distinguished_name(&self) -> DistinguishedName {
        DistinguishedName::builder()
            .common_name(self.common_name.clone())
            .organization(self.organization.clone())
            .country(self.country.clone())
            .maybe_organization_unit(self.organizational_unit.clone())
            .maybe_state(self.province.clone())
            .maybe_locality(self.locality.clone())
            .build()
    }

    /// The request for this CA's certificate: a CA usable for both TLS
    /// client and server chains.
    pub fn certification_request(&self, subject_public_key: PublicKey) -> CertificationRequestInfo {
        CertificationRequestInfo::builder()
            .subject(self.distinguished_name())
            .subject_public_key(subject_public_key)
            .usages(vec![
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth,
            ])
            .is_ca(true)
            .build()
    }
}

/// A CA name becomes one directory level, so it must be a single, plain
/// path component.
pub fn validate_ca_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(KeyweaverError::InvalidInput(format!(
            "`{name}` is not usable as a directory name"
        )));
    }
    Ok(())
}
