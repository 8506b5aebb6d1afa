// diag.rs — Non-fatal diagnostics
//
// The header formats are inferred, not specified, so readers skip what they do
// not recognize. Every skip is reported as a warning diagnostic instead of being
// dropped silently. Strict mode turns the first warning into a fatal error.
//
// Preconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `W0101`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Scalar assignment with too few tokens in the declarations file.
    pub const SHORT_ASSIGNMENT: DiagCode = DiagCode("W0101");
    /// Record member line that does not look like `type name;`.
    pub const SHORT_MEMBER: DiagCode = DiagCode("W0201");
    /// Metadata header ended inside a record definition.
    pub const UNCLOSED_RECORD: DiagCode = DiagCode("W0202");
    /// Record initializer for a type with no declared fields.
    pub const UNDECLARED_RECORD: DiagCode = DiagCode("W0301");
    /// Record initializer closed before every field was bound.
    pub const SHORT_INITIALIZER: DiagCode = DiagCode("W0302");
    /// Plain declaration with too few tokens in the values header.
    pub const SHORT_DECLARATION: DiagCode = DiagCode("W0303");
    /// Classification needs anchors but no tensor source was configured.
    pub const NO_TENSOR_SOURCE: DiagCode = DiagCode("W0701");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Source location ──────────────────────────────────────────────────────

/// File and 1-based line a diagnostic refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLoc {
    pub fn new(file: &Path, line: usize) -> Self {
        Self {
            file: file.to_path_buf(),
            line,
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub loc: Option<SourceLoc>,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            loc: None,
            message: message.into(),
            hint: None,
        }
    }

    /// Shorthand for a located warning with a code.
    pub fn warning(code: DiagCode, loc: SourceLoc, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message)
            .with_code(code)
            .at(loc)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.loc {
            write!(f, "{}:{}: ", loc.file.display(), loc.line)?;
        }
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────

/// Collects diagnostics for one stage. In strict mode the first warning
/// is returned as `ConvertError::Rejected` instead of being collected.
#[derive(Debug, Default)]
pub struct DiagSink {
    strict: bool,
    diagnostics: Vec<Diagnostic>,
}

impl DiagSink {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            diagnostics: Vec::new(),
        }
    }

    pub fn report(&mut self, diag: Diagnostic) -> Result<(), ConvertError> {
        if self.strict || diag.level == DiagLevel::Error {
            return Err(ConvertError::Rejected(diag));
        }
        self.diagnostics.push(diag);
        Ok(())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
