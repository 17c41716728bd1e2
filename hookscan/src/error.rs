//! The error and diagnostic taxonomy shared by every module in this crate.
//!
//! Two error types matter at runtime: [`ScanError`], a positioned failure
//! that aborts a run, and [`Diagnostic`], a severity-tagged message that may
//! or may not abort depending on [`Severity`]. [`ConfigError`] is the
//! equivalent for failures discovered before scanning starts, in
//! [`crate::builder::Builder`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use bstr::BString;
use thiserror::Error;

use crate::hook::{HookConfigError, MULTI_LIMIT};

/// How a diagnostic should be reported, and whether the run continues.
///
/// `Error` and `Fatal` have identical process-exit behavior; only the
/// reported phrase differs (see the diagnostic format below).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        })
    }
}

/// The distinguishable conditions the scanner, dispatcher, and evaluator
/// bridge can raise.
#[derive(Debug, Error)]
pub enum ScanErrorKind {
    #[error("got EOF within macro")]
    EofInMacro,
    #[error("unknown internal command: {0:?}")]
    UnknownDirective(BString),
    #[error("escape hook is not allowed to match multihooks")]
    MultihookEscapeClash,
    #[error("too many multihooks, {MULTI_LIMIT} allowed")]
    MultihookCapacity,
    #[error("can't open {0:?}")]
    FileOpen(PathBuf),
    #[error("internal error in macro status")]
    MacroDepthInvariant,
    #[error("eater must be a string or none")]
    EaterType,
    #[error("evaluator exception: {0}")]
    Evaluator(String),
}

impl ScanErrorKind {
    /// Only the macro-depth invariant is fatal; every other kind is a plain
    /// error. Both exit the process the same way — this only picks the
    /// reported phrase.
    pub fn severity(&self) -> Severity {
        match self {
            ScanErrorKind::MacroDepthInvariant => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl From<HookConfigError> for ScanErrorKind {
    fn from(err: HookConfigError) -> Self {
        match err {
            HookConfigError::EscapeClash => ScanErrorKind::MultihookEscapeClash,
            HookConfigError::Capacity => ScanErrorKind::MultihookCapacity,
        }
    }
}

/// A [`ScanErrorKind`] located at a source position, in the engine's
/// diagnostic format: `hookscan <severity> in "<file>:<line>:<col>": <kind>`.
///
/// `line`/`col` are 0-based internally and rendered 1-based, matching the
/// user-facing convention. When raised while a macro is open, `file`/`line`/
/// `col` should be the macro's origin position, not the current byte.
#[derive(Debug, Error)]
#[error("hookscan {sev} in \"{file}:{l}:{c}\": {kind}", sev = kind.severity(), l = line + 1, c = col + 1)]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, file: impl Into<String>, line: usize, col: usize) -> Self {
        ScanError { kind, file: file.into(), line, col }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: self.severity(),
            file: self.file.clone(),
            line: self.line,
            col: self.col,
            message: self.kind.to_string(),
        }
    }
}

/// A failure discovered while assembling a [`crate::builder::Builder`],
/// before any byte has been scanned and so before any source position
/// exists to attach to a [`ScanError`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't open {path:?}")]
    FileOpen { path: PathBuf, #[source] source: io::Error },
    #[error(transparent)]
    Hook(#[from] HookConfigError),
}

/// A scanning run ends either because of a positioned [`ScanError`] or
/// because the underlying byte stream itself failed (disk error, broken
/// pipe). Both unwind the same way; this just lets `Scanner::run` return a
/// single `Result` without inventing a `ScanErrorKind` for stream failures
/// that can't carry a meaningful source position.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The evaluator's own exception text, surfaced as an "evaluator exception"
/// per the error taxonomy.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        EvalError(message.into())
    }
}

/// A severity-tagged, positioned message. Warnings are reported and the run
/// continues; everything a [`ScanError`] carries can also be rendered as one
/// via [`ScanError::diagnostic`] for uniform reporting.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hookscan {} in \"{}:{}:{}\": {}",
            self.severity,
            self.file,
            self.line + 1,
            self.col + 1,
            self.message
        )
    }
}

/// Decouples diagnostic reporting from stderr so embedders and tests can
/// capture diagnostics instead of the process writing directly to a stream.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// The default [`DiagnosticSink`]: mirrors every diagnostic through the
/// `log` facade and writes it to stderr.
#[derive(Debug, Default)]
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error | Severity::Fatal => log::error!("{diagnostic}"),
        }
        eprintln!("{diagnostic}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_formats_one_based_position() {
        let err = ScanError::new(ScanErrorKind::EofInMacro, "in.txt", 4, 9);
        assert_eq!(
            err.to_string(),
            "hookscan error in \"in.txt:5:10\": got EOF within macro"
        );
    }

    #[test]
    fn macro_depth_invariant_is_fatal() {
        let err = ScanError::new(ScanErrorKind::MacroDepthInvariant, "in.txt", 0, 0);
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.to_string().contains("fatal error"));
    }

    #[test]
    fn multihook_capacity_message_names_the_limit() {
        let err = ScanErrorKind::MultihookCapacity;
        assert!(err.to_string().contains(&MULTI_LIMIT.to_string()));
    }
}
