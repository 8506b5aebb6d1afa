// error.rs — Fatal conversion errors
//
// Every stage returns `Result<_, ConvertError>`. All variants are fatal to the
// run: the pipeline surfaces the first one and stops. Variants carry enough
// context (file, line, symbol or key) to diagnose without extra tracing.

use std::fmt;
use std::path::PathBuf;

use crate::diag::Diagnostic;

#[derive(Debug)]
pub enum ConvertError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A byte-array line held a token that is not a hex byte.
    MalformedByteToken {
        file: PathBuf,
        line: usize,
        token: String,
    },
    /// A `<name>_len` scalar disagrees with the bytes written for the array.
    CorruptArtifact {
        path: PathBuf,
        key: String,
        declared: String,
        actual: usize,
    },
    /// End of stream reached inside an array initializer.
    UnterminatedBlock { file: PathBuf, path: PathBuf },
    /// Record initializer values do not line up with the declared schema.
    SchemaMismatch {
        file: PathBuf,
        line: usize,
        message: String,
    },
    /// A descriptor needs a key that is absent or still unset.
    MissingField { descriptor: &'static str, key: String },
    /// A key is present but its value has the wrong shape or cannot be parsed.
    InvalidField {
        key: String,
        value: String,
        reason: String,
    },
    LabelCountMismatch { expected: usize, found: usize },
    NoOutputGrids,
    UnsupportedClassifier { classification: String },
    AnchorsNotFound { missing: Vec<u32> },
    /// The tensor dump handed to the anchor projector is unusable.
    TensorDump { path: PathBuf, message: String },
    /// A warning diagnostic promoted to an error by strict mode.
    Rejected(Diagnostic),
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ConvertError::MalformedByteToken { file, line, token } => write!(
                f,
                "{}:{}: malformed byte token '{}'",
                file.display(),
                line,
                token
            ),
            ConvertError::CorruptArtifact {
                path,
                key,
                declared,
                actual,
            } => write!(
                f,
                "{} seems to be corrupt: {} = {} but {} bytes were written",
                path.display(),
                key,
                declared,
                actual
            ),
            ConvertError::UnterminatedBlock { file, path } => write!(
                f,
                "{}: array for {} is never closed",
                file.display(),
                path.display()
            ),
            ConvertError::SchemaMismatch {
                file,
                line,
                message,
            } => write!(f, "{}:{}: schema mismatch: {}", file.display(), line, message),
            ConvertError::MissingField { descriptor, key } => {
                write!(f, "{}: required field '{}' is missing", descriptor, key)
            }
            ConvertError::InvalidField { key, value, reason } => {
                write!(f, "invalid value '{}' for '{}': {}", value, key, reason)
            }
            ConvertError::LabelCountMismatch { expected, found } => write!(
                f,
                "the loaded labels seem to be corrupt: expected {} labels, found {}",
                expected, found
            ),
            ConvertError::NoOutputGrids => {
                write!(f, "the loaded declarations don't have any output grids")
            }
            ConvertError::UnsupportedClassifier { classification } => {
                write!(f, "unsupported classification '{}'", classification)
            }
            ConvertError::AnchorsNotFound { missing } => {
                write!(f, "no anchors found for grid sizes {:?}", missing)
            }
            ConvertError::TensorDump { path, message } => {
                write!(f, "{}: {}", path.display(), message)
            }
            ConvertError::Rejected(diag) => write!(f, "{} (strict mode)", diag),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
