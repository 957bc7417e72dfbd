//! Depth-first issuance of a CA tree.
//!
//! Every node goes through the same steps: generate its key, issue its
//! certificate (self-signed for roots, signed by the parent otherwise),
//! persist private key, public key and certificate, then decode the
//! certificate from its encoded bytes. The decoded certificate and the
//! node's key form the [`SigningContext`] handed to the node's children.
//! Nothing is shared between nodes except that context, passed by
//! reference down the recursion.
//!
//! A failing node abandons its whole subtree. Artifacts already written for
//! other nodes stay where they are. Whether the remaining roots are still
//! attempted is decided by the [`FailurePolicy`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::cert::Certificate;
use crate::cert::params::Validity;
use crate::config::{CaConfig, CaSpecification, FailurePolicy, validate_ca_name};
use crate::error::{IssuanceStep, KeyweaverError, Result};
use crate::issuer::{SigningContext, issue_ca_certificate};
use crate::serial::serial_to_hex;
use crate::storage::{Artifact, ArtifactKind, ArtifactStore, FileSystemStore};

/// A CA that was issued and persisted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCa {
    /// Position in the tree, CA names joined with `/`.
    pub path: String,
    pub common_name: String,
    pub serial_hex: String,
    pub not_after: OffsetDateTime,
}

/// Outcome of a run.
///
/// `issued` lists CAs in the order they were completed (pre-order).
/// `failures` is only ever non-empty under [`FailurePolicy::Continue`]; with
/// [`FailurePolicy::Abort`] the first failure is returned as the error.
#[derive(Debug, Default)]
pub struct IssuanceReport {
    pub issued: Vec<IssuedCa>,
    pub failures: Vec<KeyweaverError>,
}

impl IssuanceReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walks CA specification trees and issues every node into an
/// [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct HierarchyBuilder<S> {
    store: S,
    policy: FailurePolicy,
}

impl<S: ArtifactStore> HierarchyBuilder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issues every root in `cas` together with its subtree.
    ///
    /// Roots are processed in name order, each without a signing context.
    pub fn build(&self, cas: &BTreeMap<String, CaSpecification>) -> Result<IssuanceReport> {
        let mut report = IssuanceReport::default();

        for (name, spec) in cas {
            let Err(err) = self.issue_tree("", name, spec, None, &mut report) else {
                continue;
            };
            match self.policy {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::Continue => {
                    warn!(root = %name, error = %err, "root CA subtree abandoned");
                    report.failures.push(err);
                }
            }
        }

        Ok(report)
    }

    /// Issues the node `name` below `parent_path`, then its children.
    fn issue_tree(
        &self,
        parent_path: &str,
        name: &str,
        spec: &CaSpecification,
        parent: Option<&SigningContext>,
        report: &mut IssuanceReport,
    ) -> Result<()> {
        let path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}/{name}")
        };
        let fail = |step: IssuanceStep| {
            let path = path.clone();
            move |err: KeyweaverError| err.at_node(path, step)
        };

        // The name becomes a directory, so reject it before any work is done
        validate_ca_name(name).map_err(fail(IssuanceStep::PersistArtifacts))?;
        let ca_dir: PathBuf = path.split('/').collect();

        let key_spec = spec.key_spec().map_err(fail(IssuanceStep::GenerateKey))?;
        debug!(ca = %path, key = %key_spec, "generating key");
        let key = key_spec.generate().map_err(fail(IssuanceStep::GenerateKey))?;

        debug!(ca = %path, self_signed = parent.is_none(), "issuing certificate");
        let certificate = Validity::for_days(spec.validity_days)
            .and_then(|validity| {
                let request = spec.certification_request(key.public_key());
                issue_ca_certificate(&request, &key, validity, parent)
            })
            .map_err(fail(IssuanceStep::IssueCertificate))?;

        // Encode everything up front so a failure cannot leave a partial set
        let encode = || -> Result<_> {
            Ok((
                key.private_key_der()?,
                key.public_key().to_der()?,
                certificate.to_der()?,
            ))
        };
        let (private_key, public_key, certificate_der) =
            encode().map_err(fail(IssuanceStep::PersistArtifacts))?;
        let private_key = Artifact::new(ArtifactKind::PrivateKey, private_key);
        let public_key = Artifact::new(ArtifactKind::PublicKey, public_key);
        let certificate = Artifact::new(ArtifactKind::Certificate, certificate_der);

        for artifact in [&private_key, &public_key, &certificate] {
            self.store
                .persist(&ca_dir, artifact)
                .map_err(fail(IssuanceStep::PersistArtifacts))?;
        }

        let certificate =
            Certificate::from_der(&certificate.der).map_err(fail(IssuanceStep::ParseCertificate))?;

        let issued = IssuedCa {
            path: path.clone(),
            common_name: spec.common_name.clone(),
            serial_hex: serial_to_hex(certificate.serial_number()),
            not_after: certificate.validity().not_after,
        };
        info!(
            ca = %issued.path,
            common_name = %issued.common_name,
            serial = %issued.serial_hex,
            not_after = %issued.not_after,
            "issued CA certificate"
        );
        report.issued.push(issued);

        if spec.issued_cas.is_empty() {
            return Ok(());
        }

        let context = SigningContext {
            cert: certificate,
            key,
        };
        for (child_name, child) in &spec.issued_cas {
            self.issue_tree(&path, child_name, child, Some(&context), report)?;
        }
        Ok(())
    }
}

/// Issues the whole hierarchy described by `config` into its `output_dir`.
pub fn create_cas(config: &CaConfig) -> Result<IssuanceReport> {
    HierarchyBuilder::new(FileSystemStore::new(&config.output_dir))
        .with_policy(config.on_root_failure)
        .build(&config.cas)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use crate::config::KeyType;

    /// Keeps artifacts in memory, keyed by `<ca_dir>/<file_name>`.
    #[derive(Default)]
    struct MemoryStore {
        written: Mutex<Vec<(PathBuf, Artifact)>>,
    }

    impl MemoryStore {
        fn paths(&self) -> Vec<String> {
            self.written
                .lock()
                .unwrap()
                .iter()
                .map(|(path, _)| path.to_string_lossy().replace('\\', "/"))
                .collect()
        }

        fn certificate(&self, ca_dir: &str) -> Certificate {
            let written = self.written.lock().unwrap();
            let (_, artifact) = written
                .iter()
                .find(|(path, artifact)| {
                    artifact.kind == ArtifactKind::Certificate
                        && path.parent() == Some(Path::new(ca_dir))
                })
                .unwrap();
            Certificate::from_der(&artifact.der).unwrap()
        }
    }

    impl ArtifactStore for MemoryStore {
        fn persist(&self, ca_dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
            let path = ca_dir.join(artifact.kind.file_name());
            self.written
                .lock()
                .unwrap()
                .push((path.clone(), artifact.clone()));
            Ok(path)
        }
    }

    fn spec(common_name: &str) -> CaSpecification {
        CaSpecification {
            common_name: common_name.to_string(),
            organization: "Keyweaver".to_string(),
            country: "NO".to_string(),
            organizational_unit: None,
            province: None,
            locality: None,
            validity_days: 30,
            key_type: KeyType::Ed25519,
            key_size: None,
            issued_cas: BTreeMap::new(),
        }
    }

    fn tree(entries: Vec<(&str, CaSpecification)>) -> BTreeMap<String, CaSpecification> {
        entries
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect()
    }

    #[test]
    fn test_pre_order_with_artifacts_in_order() {
        let mut root = spec("Root");
        root.issued_cas = tree(vec![("b", spec("B")), ("a", spec("A"))]);
        let builder = HierarchyBuilder::new(MemoryStore::default());

        let report = builder.build(&tree(vec![("root", root)])).unwrap();

        let order: Vec<_> = report.issued.iter().map(|ca| ca.path.as_str()).collect();
        assert_eq!(order, ["root", "root/a", "root/b"]);
        assert_eq!(
            builder.store().paths()[..3],
            [
                "root/private.pem".to_string(),
                "root/public.pem".to_string(),
                "root/certificate.crt".to_string()
            ]
        );
        assert_eq!(builder.store().paths().len(), 9);
    }

    #[test]
    fn test_children_signed_by_parent() {
        let mut intermediate = spec("Intermediate");
        intermediate.key_type = KeyType::EcdsaP256;
        intermediate.issued_cas = tree(vec![("issuing", spec("Issuing"))]);
        let mut root = spec("Root");
        root.issued_cas = tree(vec![("intermediate", intermediate)]);
        let builder = HierarchyBuilder::new(MemoryStore::default());

        builder.build(&tree(vec![("root", root)])).unwrap();

        let store = builder.store();
        let root = store.certificate("root");
        let intermediate = store.certificate("root/intermediate");
        let issuing = store.certificate("root/intermediate/issuing");
        root.verify_issued_by(&root).unwrap();
        intermediate.verify_issued_by(&root).unwrap();
        issuing.verify_issued_by(&intermediate).unwrap();
        assert!(issuing.verify_issued_by(&root).is_err());
    }

    #[test]
    fn test_invalid_key_size_fails_before_writing_node() {
        let mut child = spec("Child");
        child.key_type = KeyType::Rsa;
        child.key_size = Some(-1);
        let mut root = spec("Root");
        root.issued_cas = tree(vec![("child", child)]);
        let builder = HierarchyBuilder::new(MemoryStore::default());

        let err = builder.build(&tree(vec![("root", root)])).unwrap_err();

        assert!(matches!(
            &err,
            KeyweaverError::Node { path, step: IssuanceStep::GenerateKey, .. } if path == "root/child"
        ));
        assert!(matches!(err.root_cause(), KeyweaverError::InvalidInput(_)));
        // The parent stays; nothing for the child
        let paths = builder.store().paths();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|path| path.starts_with("root/") && !path.contains("child")));
    }

    #[test]
    fn test_validity_out_of_range_names_node_and_step() {
        let mut child = spec("Child");
        child.validity_days = 3_000_000;
        let mut root = spec("Root");
        root.issued_cas = tree(vec![("child", child)]);
        let builder = HierarchyBuilder::new(MemoryStore::default());

        let err = builder.build(&tree(vec![("root", root)])).unwrap_err();

        assert!(matches!(
            &err,
            KeyweaverError::Node { path, step: IssuanceStep::IssueCertificate, .. } if path == "root/child"
        ));
        assert!(matches!(err.root_cause(), KeyweaverError::InvalidInput(_)));
        assert_eq!(builder.store().paths().len(), 3);
    }

    #[test]
    fn test_abort_policy_stops_at_first_root() {
        let mut broken = spec("Broken");
        broken.validity_days = 0;
        let cas = tree(vec![("a-broken", broken), ("b-fine", spec("Fine"))]);
        let builder = HierarchyBuilder::new(MemoryStore::default());

        let err = builder.build(&cas).unwrap_err();

        assert!(matches!(
            err,
            KeyweaverError::Node { step: IssuanceStep::IssueCertificate, .. }
        ));
        assert!(builder.store().paths().is_empty());
    }

    #[test]
    fn test_continue_policy_isolates_roots() {
        let mut broken = spec("Broken");
        broken.key_type = KeyType::Ed25519;
        broken.key_size = Some(4096);
        broken.issued_cas = tree(vec![("child", spec("Child"))]);
        let cas = tree(vec![("a-broken", broken), ("b-fine", spec("Fine"))]);
        let builder = HierarchyBuilder::new(MemoryStore::default()).with_policy(FailurePolicy::Continue);

        let report = builder.build(&cas).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.issued.len(), 1);
        assert_eq!(report.issued[0].path, "b-fine");
    }

    #[test]
    fn test_invalid_ca_name_rejected() {
        let builder = HierarchyBuilder::new(MemoryStore::default());
        let err = builder.build(&tree(vec![("..", spec("Escape"))])).unwrap_err();
        assert!(matches!(
            err,
            KeyweaverError::Node { step: IssuanceStep::PersistArtifacts, .. }
        ));
        assert!(builder.store().paths().is_empty());
    }

    #[test]
    fn test_report_carries_serial_and_expiry() {
        let builder = HierarchyBuilder::new(MemoryStore::default());
        let report = builder.build(&tree(vec![("root", spec("Root"))])).unwrap();

        let issued = &report.issued[0];
        let cert = builder.store().certificate("root");
        assert_eq!(issued.common_name, "Root");
        assert_eq!(issued.serial_hex, serial_to_hex(cert.serial_number()));
        assert_eq!(issued.not_after, cert.validity().not_after);
    }
}
