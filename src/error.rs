//! Error types shared by every stage of CA issuance.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Represents errors that can occur while bootstrapping a CA hierarchy.
///
/// The first group mirrors the failure classes of a single issuance step.
/// [`KeyweaverError::Node`] wraps one of them with the position in the tree
/// and the step that failed.
#[derive(Debug, Error)]
pub enum KeyweaverError {
    /// The randomness source failed while drawing key material or a serial.
    #[error("Randomness source failed: {0}")]
    EntropyFailure(String),

    /// The key primitive rejected its parameters.
    #[error("Key generation error: {0}")]
    KeyGenerationFailure(String),

    /// The signing operation rejected its inputs.
    #[error("Signing failed: {0}")]
    SigningFailure(String),

    /// A structure could not be encoded, or a freshly issued certificate
    /// could not be decoded back.
    #[error("Encoding error: {0}")]
    EncodingFailure(String),

    /// A directory could not be created or an artifact could not be written.
    #[error("Storage error at {}: {source}", path.display())]
    StorageFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A CA node failed; its subtree was abandoned.
    #[error("CA `{path}` failed while {step}: {source}")]
    Node {
        path: String,
        step: IssuanceStep,
        #[source]
        source: Box<KeyweaverError>,
    },
}

/// The step of a node's issuance that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceStep {
    GenerateKey,
    IssueCertificate,
    PersistArtifacts,
    ParseCertificate,
}

impl fmt::Display for IssuanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            IssuanceStep::GenerateKey => "generating key",
            IssuanceStep::IssueCertificate => "issuing certificate",
            IssuanceStep::PersistArtifacts => "persisting artifacts",
            IssuanceStep::ParseCertificate => "parsing certificate",
        };
        f.write_str(step)
    }
}

impl KeyweaverError {
    /// Attaches the node path and step to an error raised while issuing that node.
    pub fn at_node(self, path: impl Into<String>, step: IssuanceStep) -> Self {
        KeyweaverError::Node {
            path: path.into(),
            step,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any node wrappers.
    pub fn root_cause(&self) -> &KeyweaverError {
        match self {
            KeyweaverError::Node { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<der::Error> for KeyweaverError {
    /// Converts a `der::Error` into a `KeyweaverError`.
    fn from(err: der::Error) -> Self {
        KeyweaverError::EncodingFailure(err.to_string())
    }
}

/// A specialized Result type for keyweaver operations.
pub type Result<T> = std::result::Result<T, KeyweaverError>;
