//! A character-level macro-scanning engine: configurable hook delimiters,
//! nested macro collection, and an embeddable-[`Evaluator`] contract.
//!
//! Reads a stack of input [`source::Source`]s, recognizes hook delimiters
//! described by a per-source [`hook::HookConfig`], accumulates macro bodies,
//! hands them to [`dispatch::eval_macro`], and routes result text to a stack
//! of output [`sink::Sink`]s. The scanning loop itself ([`scanner::Scanner`])
//! knows nothing about any particular scripting language — that boundary is
//! the [`evaluator::Evaluator`] / [`evaluator::HostBindings`] trait pair.
//! `hookscan-pyo3` is the CPython-backed implementation of that boundary.

pub mod builder;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod hook;
pub mod scanner;
pub mod sink;
pub mod source;
pub mod source_stack;
pub mod state;

pub use builder::Builder;
pub use error::{
    ConfigError, Diagnostic, DiagnosticSink, RunError, ScanError, ScanErrorKind, Severity,
    StderrDiagnostics,
};
pub use evaluator::{Evaluator, HostBindings};
pub use hook::{HookConfig, HookKind, HookTriple};
pub use scanner::Scanner;
pub use state::ParserState;
