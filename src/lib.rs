//! # Keyweaver - Bootstrapping CA Hierarchies in Pure Rust
//!
//! Keyweaver turns a declarative description of certificate authorities into
//! keys and certificates on disk: one or more self-signed roots, each with an
//! optional tree of intermediate CAs signed by their parent. It is built
//! entirely on the RustCrypto crates.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 to 16384-bit keys, 4096 by default (PKCS#1 v1.5 with SHA-256)
//! - **ECDSA**: P-256 (SHA-256) and P-384 (SHA-384)
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Output Layout
//!
//! Every CA gets a directory named after its position in the tree:
//!
//! ```text
//! <output_dir>/root-ca/private.pem                        PKCS#8, mode 0600
//! <output_dir>/root-ca/public.pem                         SPKI
//! <output_dir>/root-ca/certificate.crt                    X.509
//! <output_dir>/root-ca/intermediate-ca/certificate.crt    signed by root-ca
//! ```
//!
//! Each certificate carries critical basic constraints (`cA`), critical key
//! usage (digitalSignature, keyCertSign, cRLSign), server and client auth
//! extended key usage, and subject and authority key identifiers. Every
//! certificate gets its own random 128-bit serial.
//!
//! ## Quick Start
//!
//! ### Issuing a Hierarchy From Configuration
//!
//! ```rust,no_run
//! use keyweaver::{config::CaConfig, hierarchy::create_cas};
//!
//! # fn main() -> Result<(), keyweaver::error::KeyweaverError> {
//! let config = CaConfig::from_file("ca.yaml")?;
//! let report = create_cas(&config)?;
//! for ca in &report.issued {
//!     println!("{} ({}) serial {}", ca.path, ca.common_name, ca.serial_hex);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing Certificates Directly
//!
//! ```rust,no_run
//! use keyweaver::{
//!     cert::{Certificate, extensions::ExtendedKeyUsageOption, params::{CertificationRequestInfo, DistinguishedName, Validity}},
//!     issuer::{SigningContext, issue_ca_certificate},
//!     key::{KeyPair, PublicKey},
//! };
//!
//! # fn main() -> Result<(), keyweaver::error::KeyweaverError> {
//! let root_key = KeyPair::generate_ecdsa_p384();
//! let root_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::builder().common_name("Example Root".to_string()).build())
//!     .subject_public_key(PublicKey::from_key_pair(&root_key))
//!     .is_ca(true)
//!     .build();
//! let root_cert = issue_ca_certificate(&root_info, &root_key, Validity::for_days(3650)?, None)?;
//!
//! // Children must be issued from the decoded certificate
//! let root = SigningContext {
//!     cert: Certificate::from_der(&root_cert.to_der()?)?,
//!     key: root_key,
//! };
//!
//! let key = KeyPair::generate_ed25519();
//! let info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::builder().common_name("Example Intermediate".to_string()).build())
//!     .subject_public_key(PublicKey::from_key_pair(&key))
//!     .usages(vec![ExtendedKeyUsageOption::ServerAuth])
//!     .is_ca(true)
//!     .build();
//! let intermediate = issue_ca_certificate(&info, &key, Validity::for_days(1825)?, Some(&root))?;
//! intermediate.verify_issued_by(&root.cert)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Failures during a run name the CA and the step that failed:
//!
//! ```rust
//! use keyweaver::error::{IssuanceStep, KeyweaverError};
//!
//! let err = KeyweaverError::InvalidInput("RSA key size -1 is outside 2048..=16384".to_string())
//!     .at_node("root-ca/intermediate-ca", IssuanceStep::GenerateKey);
//! match &err {
//!     KeyweaverError::Node { path, step, .. } => println!("{path} failed while {step}"),
//!     other => println!("{other}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: The CA tree description and its loading and validation
//! - [`hierarchy`]: Depth-first issuance of the whole tree
//! - [`issuer`]: Self-signed and parent-signed CA certificate issuance
//! - [`key`]: Key generation, signing and DER export
//! - [`cert`]: Certificate encoding, decoding, extensions and inspection
//! - [`storage`]: Where the artifacts go and how they are written
//! - [`serial`]: Random certificate serial numbers
//! - [`error`]: Error types shared by all of the above
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod cert;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod issuer;
pub mod key;
pub mod serial;
pub mod storage;
pub mod tbs_certificate;
