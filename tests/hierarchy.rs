mod util;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use keyweaver::cert::params::DistinguishedName;
use keyweaver::config::{CaConfig, FailurePolicy, KeyType};
use keyweaver::error::{IssuanceStep, KeyweaverError, Result};
use keyweaver::hierarchy::{HierarchyBuilder, create_cas};
use keyweaver::storage::{Artifact, ArtifactKind, ArtifactStore, FileSystemStore};
use time::Duration;

#[test]
fn single_root_writes_three_self_signed_artifacts() {
    let temp = tempfile::tempdir().unwrap();
    let config = util::config(temp.path(), vec![("root-ca", util::ca("Root"))]);

    let report = create_cas(&config).unwrap();

    assert_eq!(report.issued.len(), 1);
    assert_eq!(
        util::files_below(temp.path()),
        vec![
            PathBuf::from("root-ca/certificate.crt"),
            PathBuf::from("root-ca/private.pem"),
            PathBuf::from("root-ca/public.pem"),
        ]
    );

    let cert = util::read_certificate(&temp.path().join("root-ca"));
    assert_eq!(cert.subject_dn().common_name, "Root");
    assert_eq!(DistinguishedName::from_x509_name(cert.issuer()).common_name, "Root");
    assert!(cert.is_self_issued());
    assert!(cert.is_ca());
    cert.verify_issued_by(&cert).unwrap();
}

#[test]
fn intermediate_is_signed_by_root() {
    let temp = tempfile::tempdir().unwrap();
    let root = util::with_children(
        util::ca("Root"),
        vec![("intermediate-ca", util::with_key(util::ca("Intermediate"), KeyType::EcdsaP256, None))],
    );
    let config = util::config(temp.path(), vec![("root-ca", root)]);

    create_cas(&config).unwrap();

    assert_eq!(util::files_below(temp.path()).len(), 6);
    let root = util::read_certificate(&temp.path().join("root-ca"));
    let intermediate = util::read_certificate(&temp.path().join("root-ca/intermediate-ca"));
    assert_eq!(intermediate.issuer(), root.subject());
    assert_eq!(intermediate.subject_dn().common_name, "Intermediate");
    intermediate.verify_issued_by(&root).unwrap();
    assert!(intermediate.is_ca());
}

#[test]
fn three_level_chain_verifies_link_by_link() {
    let temp = tempfile::tempdir().unwrap();
    let issuing = util::ca("Issuing");
    let intermediate = util::with_children(util::ca("Intermediate"), vec![("issuing-ca", issuing)]);
    let root = util::with_children(util::ca("Root"), vec![("intermediate-ca", intermediate)]);
    let config = util::config(temp.path(), vec![("root-ca", root)]);

    create_cas(&config).unwrap();

    let dir = temp.path().join("root-ca");
    let root = util::read_certificate(&dir);
    let intermediate = util::read_certificate(&dir.join("intermediate-ca"));
    let issuing = util::read_certificate(&dir.join("intermediate-ca/issuing-ca"));
    intermediate.verify_issued_by(&root).unwrap();
    issuing.verify_issued_by(&intermediate).unwrap();
    assert!(issuing.verify_issued_by(&root).is_err());
}

#[test]
fn invalid_key_size_leaves_no_artifacts_for_node() {
    let temp = tempfile::tempdir().unwrap();
    let root = util::with_children(
        util::ca("Root"),
        vec![("broken-ca", util::with_key(util::ca("Broken"), KeyType::Rsa, Some(-1)))],
    );
    let config = util::config(temp.path(), vec![("root-ca", root)]);

    let err = create_cas(&config).unwrap_err();

    match &err {
        KeyweaverError::Node { path, step, .. } => {
            assert_eq!(path, "root-ca/broken-ca");
            assert_eq!(*step, IssuanceStep::GenerateKey);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("root-ca/broken-ca"));
    // The parent was completed before the child failed
    assert_eq!(util::files_below(&temp.path().join("root-ca")).len(), 3);
    assert!(!temp.path().join("root-ca/broken-ca").exists());
}

#[test]
fn serials_are_distinct_across_the_tree() {
    let temp = tempfile::tempdir().unwrap();
    let children = (0..4)
        .map(|i| (format!("child-{i}"), util::ca(&format!("Child {i}"))))
        .collect::<Vec<_>>();
    let root = util::with_children(
        util::ca("Root"),
        children.iter().map(|(name, spec)| (name.as_str(), spec.clone())).collect(),
    );
    let config = util::config(temp.path(), vec![("root-a", root), ("root-b", util::ca("Other Root"))]);

    let report = create_cas(&config).unwrap();

    assert_eq!(report.issued.len(), 6);
    let serials: HashSet<_> = report.issued.iter().map(|ca| ca.serial_hex.clone()).collect();
    assert_eq!(serials.len(), 6);
}

#[test]
fn validity_spans_exactly_the_configured_days() {
    let temp = tempfile::tempdir().unwrap();
    let mut spec = util::ca("Root");
    spec.validity_days = 3650;
    let config = util::config(temp.path(), vec![("root-ca", spec)]);

    create_cas(&config).unwrap();

    let validity = util::read_certificate(&temp.path().join("root-ca")).validity();
    assert_eq!(validity.not_after - validity.not_before, Duration::days(3650));
    let age = time::OffsetDateTime::now_utc() - validity.not_before;
    assert!(age >= Duration::ZERO && age < Duration::minutes(5));
}

#[test]
fn rerun_overwrites_and_keeps_removed_cas() {
    let temp = tempfile::tempdir().unwrap();
    let first = util::config(
        temp.path(),
        vec![("root-ca", util::ca("Root")), ("retired-ca", util::ca("Retired"))],
    );
    create_cas(&first).unwrap();
    let before = util::read_certificate(&temp.path().join("root-ca"));

    let second = util::config(temp.path(), vec![("root-ca", util::ca("Root"))]);
    create_cas(&second).unwrap();
    let after = util::read_certificate(&temp.path().join("root-ca"));

    assert_ne!(before.serial_number(), after.serial_number());
    // No pruning of CAs that left the configuration
    assert!(temp.path().join("retired-ca/certificate.crt").exists());
    assert_eq!(util::files_below(temp.path()).len(), 6);
}

#[test]
fn continue_policy_reports_failures_and_issues_other_roots() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = util::config(
        temp.path(),
        vec![
            ("a-root", util::with_key(util::ca("A"), KeyType::EcdsaP256, Some(384))),
            ("b-root", util::with_children(util::ca("B"), vec![("b-child", util::ca("B Child"))])),
        ],
    );
    config.on_root_failure = FailurePolicy::Continue;

    let report = create_cas(&config).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].root_cause(),
        KeyweaverError::InvalidInput(_)
    ));
    let paths: Vec<_> = report.issued.iter().map(|ca| ca.path.as_str()).collect();
    assert_eq!(paths, ["b-root", "b-root/b-child"]);
    assert!(!temp.path().join("a-root").exists());
}

#[test]
fn abort_policy_stops_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let config = util::config(
        temp.path(),
        vec![
            ("a-root", util::with_key(util::ca("A"), KeyType::Rsa, Some(1024))),
            ("b-root", util::ca("B")),
        ],
    );

    assert!(create_cas(&config).is_err());
    assert!(util::files_below(temp.path()).is_empty());
}

/// Refuses certificates for one CA directory and writes everything else.
struct RefusingStore {
    inner: FileSystemStore,
    refuse: PathBuf,
}

impl ArtifactStore for RefusingStore {
    fn persist(&self, ca_dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
        if ca_dir == self.refuse && artifact.kind == ArtifactKind::Certificate {
            return Err(KeyweaverError::StorageFailure {
                path: ca_dir.join(artifact.kind.file_name()),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.persist(ca_dir, artifact)
    }
}

#[test]
fn storage_failure_abandons_subtree_without_rollback() {
    let temp = tempfile::tempdir().unwrap();
    let store = RefusingStore {
        inner: FileSystemStore::new(temp.path()),
        refuse: PathBuf::from("root-ca"),
    };
    let root = util::with_children(util::ca("Root"), vec![("child-ca", util::ca("Child"))]);

    let err = HierarchyBuilder::new(store)
        .build(&util::tree(vec![("root-ca", root)]))
        .unwrap_err();

    assert!(matches!(
        err,
        KeyweaverError::Node { step: IssuanceStep::PersistArtifacts, .. }
    ));
    assert!(matches!(err.root_cause(), KeyweaverError::StorageFailure { .. }));
    // Keys written before the failure stay, children are never attempted
    assert_eq!(
        util::files_below(temp.path()),
        vec![PathBuf::from("root-ca/private.pem"), PathBuf::from("root-ca/public.pem")]
    );
}

#[test]
fn config_file_drives_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let output_dir = temp.path().join("pki");
    let config_path = temp.path().join("ca.yaml");
    std::fs::write(
        &config_path,
        format!(
            r#"
output_dir: {}
cas:
  root-ca:
    common_name: Config Root
    organization: Keyweaver Test
    country: "NO"
    province: Vestland
    validity_days: 365
    key_type: ed25519
    issued_cas:
      intermediate-ca:
        common_name: Config Intermediate
        organization: Keyweaver Test
        country: "NO"
        validity_days: 180
        key_type: ecdsa-p384
"#,
            output_dir.display()
        ),
    )
    .unwrap();

    let config = CaConfig::from_file(&config_path).unwrap();
    create_cas(&config).unwrap();

    let root = util::read_certificate(&output_dir.join("root-ca"));
    assert_eq!(root.subject_dn().state.as_deref(), Some("Vestland"));
    let intermediate = util::read_certificate(&output_dir.join("root-ca/intermediate-ca"));
    intermediate.verify_issued_by(&root).unwrap();
}
