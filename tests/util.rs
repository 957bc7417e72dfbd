#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keyweaver::cert::Certificate;
use keyweaver::config::{CaConfig, CaSpecification, FailurePolicy, KeyType};

/// An Ed25519 CA with a short validity and no children.
pub fn ca(common_name: &str) -> CaSpecification {
    CaSpecification {
        common_name: common_name.to_string(),
        organization: "Keyweaver Test".to_string(),
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

pub fn with_key(mut spec: CaSpecification, key_type: KeyType, key_size: Option<i64>) -> CaSpecification {
    spec.key_type = key_type;
    spec.key_size = key_size;
    spec
}

pub fn with_children(mut spec: CaSpecification, children: Vec<(&str, CaSpecification)>) -> CaSpecification {
    spec.issued_cas = tree(children);
    spec
}

pub fn tree(entries: Vec<(&str, CaSpecification)>) -> BTreeMap<String, CaSpecification> {
    entries
        .into_iter()
        .map(|(name, spec)| (name.to_string(), spec))
        .collect()
}

pub fn config(output_dir: &Path, cas: Vec<(&str, CaSpecification)>) -> CaConfig {
    CaConfig {
        output_dir: output_dir.to_path_buf(),
        cas: tree(cas),
        on_root_failure: FailurePolicy::Abort,
    }
}

/// Reads `<dir>/certificate.crt`.
pub fn read_certificate(dir: &Path) -> Certificate {
    let pem = std::fs::read_to_string(dir.join("certificate.crt")).expect("certificate.crt missing");
    Certificate::from_pem(pem).expect("certificate.crt is not a certificate")
}

/// All regular files below `root`, relative to it, sorted.
pub fn files_below(root: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut files = Vec::new();
    if root.exists() {
        walk(root, root, &mut files);
    }
    files.sort();
    files
}
