//! Persisting CA artifacts.
//!
//! The hierarchy hands each artifact over as DER plus its [`ArtifactKind`];
//! a store decides where it goes and how it is encoded. [`FileSystemStore`]
//! writes PEM files under an output root:
//!
//! ```text
//! <output_dir>/<root>/<intermediate>/.../
//!     private.pem      PRIVATE KEY   0600
//!     public.pem       PUBLIC KEY    0644
//!     certificate.crt  CERTIFICATE   0644
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{KeyweaverError, Result};

/// The three artifacts produced for every CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    PrivateKey,
    PublicKey,
    Certificate,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::PrivateKey => "private.pem",
            ArtifactKind::PublicKey => "public.pem",
            ArtifactKind::Certificate => "certificate.crt",
        }
    }

    pub fn pem_label(&self) -> &'static str {
        match self {
            ArtifactKind::PrivateKey => "PRIVATE KEY",
            ArtifactKind::PublicKey => "PUBLIC KEY",
            ArtifactKind::Certificate => "CERTIFICATE",
        }
    }

    /// Unix permission bits for the written file.
    pub fn mode(&self) -> u32 {
        match self {
            ArtifactKind::PrivateKey => 0o600,
            ArtifactKind::PublicKey | ArtifactKind::Certificate => 0o644,
        }
    }
}

/// One DER-encoded artifact bound for storage.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub der: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, der: Vec<u8>) -> Self {
        Self { kind, der }
    }

    /// The artifact wrapped in its PEM armor, with LF line endings.
    pub fn to_pem(&self) -> String {
        let block = pem::Pem::new(self.kind.pem_label(), self.der.as_slice());
        pem::encode_config(
            &block,
            pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
        )
    }
}

/// Destination for CA artifacts.
///
/// `ca_dir` is the CA's position in the tree relative to the store's root,
/// one path component per CA name.
pub trait ArtifactStore {
    /// Persists `artifact`, replacing any previous artifact of the same
    /// kind for that CA, and returns where it went.
    fn persist(&self, ca_dir: &Path, artifact: &Artifact) -> Result<PathBuf>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for &S {
    fn persist(&self, ca_dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
        (**self).persist(ca_dir, artifact)
    }
}

/// Writes artifacts as PEM files below a root directory.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FileSystemStore {
    fn persist(&self, ca_dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
        let dir = self.root.join(ca_dir);
        create_dir_all(&dir)?;

        let path = dir.join(artifact.kind.file_name());
        write_file_with_mode(&path, artifact.to_pem().as_bytes(), artifact.kind.mode())?;
        debug!(path = %path.display(), kind = ?artifact.kind, "wrote artifact");
        Ok(path)
    }
}

/// Creates `dir` and any missing parents. Succeeds if the directory
/// already exists, including when another writer created it concurrently.
fn create_dir_all(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(dir)
        .map_err(|source| KeyweaverError::StorageFailure {
            path: dir.to_path_buf(),
            source,
        })
}

/// Writes `contents` to `path`, truncating an existing file, and leaves the
/// file with exactly `mode` regardless of umask or previous permissions.
/// The handle is synced and closed before returning, on success or error.
fn write_file_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let storage_failure = |source| KeyweaverError::StorageFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut file = open_with_mode(path, mode).map_err(storage_failure)?;
    restrict_permissions(&file, mode).map_err(storage_failure)?;
    file.write_all(contents).map_err(storage_failure)?;
    file.sync_all().map_err(storage_failure)?;
    Ok(())
}

fn open_with_mode(path: &Path, mode: u32) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    opts.open(path)
}

/// `OpenOptions::mode` only applies to newly created files and is masked by
/// the umask, so the mode is set again on the open handle.
fn restrict_permissions(file: &File, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = (file, mode);
    Ok(())
}
