//! The boundary between the scanning engine and an embedded script
//! interpreter. Neither trait here knows anything about a particular
//! scripting language; `hookscan-pyo3` is one concrete [`Evaluator`].

use std::path::Path;

use crate::error::{EvalError, ScanError};

/// An embedded script interpreter, from the engine's point of view: it can
/// load a file wholesale (`:source`) and evaluate one expression, coercing
/// the result to a string when the caller asks for one (`.expr`).
pub trait Evaluator {
    fn load_file(&mut self, path: &Path) -> Result<(), EvalError>;

    /// Evaluates `source`. When `want_string` is set, a non-`None` result is
    /// coerced to its string representation (the way `.expr` wants its
    /// value rendered); when clear, the result is discarded and only
    /// success/failure matters (a bare macro body, or `:source`'s tail
    /// evaluation).
    fn eval(&mut self, source: &str, want_string: bool) -> Result<Option<String>, EvalError>;
}

/// Functions the evaluator calls back into, reaching into the very scanner
/// state that invoked it. Implemented by [`crate::state::ParserState`],
/// the only type with direct access to the source/sink stacks and the
/// current source's `HookConfig`.
pub trait HostBindings {
    fn write(&mut self, s: &[u8]);
    fn puts(&mut self, s: &[u8]);

    fn hookbeg(&self) -> &[u8];
    fn hookend(&self) -> &[u8];
    fn hookesc(&self) -> &[u8];

    fn sethook(&mut self, begin: &[u8], end: &[u8]);
    fn sethookbeg(&mut self, s: &[u8]);
    fn sethookend(&mut self, s: &[u8]);
    fn sethookesc(&mut self, s: &[u8]);
    fn seteater(&mut self, s: Option<&[u8]>);

    /// Adds one or more `(begin, end, suspend?)` triples, switching the
    /// current source to multi mode.
    fn multihook(
        &mut self,
        triples: &[(Vec<u8>, Vec<u8>, Option<Vec<u8>>)],
    ) -> Result<(), ScanError>;

    /// 1-based line number, for user-facing display only; internal state
    /// stays 0-based.
    fn ifilename(&self) -> &str;
    fn ilinenumber(&self) -> usize;
    fn ofilename(&self) -> &str;
    fn olinenumber(&self) -> usize;

    /// Same deferred semantics as `:include`: queued, applied once the
    /// macro that called it has fully closed.
    fn pushinput(&mut self, name: Option<&Path>) -> Result<(), ScanError>;
    /// Queues a pop of the current input, applied at the same point.
    fn closeinput(&mut self);

    /// The output stack has no deferral requirement — these apply at once.
    fn pushoutput(&mut self, name: Option<&Path>) -> Result<(), ScanError>;
    fn closeoutput(&mut self);

    fn block(&mut self);
    fn unblock(&mut self);
}
