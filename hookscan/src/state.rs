//! The process-wide coordinator: the source/sink stacks, macro-collection
//! state, and the deferred structural mutations an evaluator callback can
//! queue mid-macro. [`ParserState`] is threaded explicitly through the
//! [`crate::scanner::Scanner`] and the [`crate::dispatch`] functions rather
//! than reached through a process global — see `DESIGN.md` for the one
//! place (`hookscan-pyo3`) that still needs a single global handle, because
//! pyo3's `#[pyfunction]` ABI has no closure environment.

use std::path::Path;

use crate::error::{Diagnostic, DiagnosticSink, ScanError, ScanErrorKind};
use crate::evaluator::{Evaluator, HostBindings};
use crate::sink::SinkStack;
use crate::source::Source;
use crate::source_stack::SourceStack;

/// Coordinates everything a scanning run touches: the input/output stacks,
/// macro nesting depth, scratch buffers, and the embedded evaluator.
pub struct ParserState<E> {
    sources: SourceStack,
    sinks: SinkStack,
    macro_depth: usize,
    suspend_depth: usize,
    macro_buf: Vec<u8>,
    check_buf: Vec<u8>,
    match_buf: Vec<u8>,
    flush: bool,
    post_push: Option<Source>,
    post_pop: bool,
    evaluator: E,
    diagnostics: Box<dyn DiagnosticSink>,
}

impl<E: Evaluator> ParserState<E> {
    pub fn new(
        sources: SourceStack,
        sinks: SinkStack,
        flush: bool,
        evaluator: E,
        diagnostics: Box<dyn DiagnosticSink>,
    ) -> Self {
        ParserState {
            sources,
            sinks,
            macro_depth: 0,
            suspend_depth: 0,
            macro_buf: Vec::new(),
            check_buf: Vec::new(),
            match_buf: Vec::new(),
            flush,
            post_push: None,
            post_pop: false,
            evaluator,
            diagnostics,
        }
    }

    /// Replaces the diagnostic sink a run-ending [`ScanError`] is reported
    /// through. Defaults to [`crate::error::StderrDiagnostics`].
    pub fn set_diagnostics(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.diagnostics = sink;
    }

    pub(crate) fn report_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    pub(crate) fn sources(&self) -> &SourceStack {
        &self.sources
    }

    pub(crate) fn sources_mut(&mut self) -> &mut SourceStack {
        &mut self.sources
    }

    pub(crate) fn sinks(&self) -> &SinkStack {
        &self.sinks
    }

    pub(crate) fn sinks_mut(&mut self) -> &mut SinkStack {
        &mut self.sinks
    }

    pub(crate) fn macro_depth(&self) -> usize {
        self.macro_depth
    }

    pub(crate) fn suspend_depth(&self) -> usize {
        self.suspend_depth
    }

    pub(crate) fn macro_buf(&self) -> &[u8] {
        &self.macro_buf
    }

    pub(crate) fn flush(&self) -> bool {
        self.flush
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    /// Writes `bytes` to the top sink.
    pub(crate) fn emit(&mut self, bytes: &[u8]) {
        let flush = self.flush;
        let _ = self.sinks.top_mut().write_bytes(bytes, flush);
    }

    pub(crate) fn emit_byte(&mut self, b: u8) {
        let flush = self.flush;
        let _ = self.sinks.top_mut().write_byte(b, flush);
    }

    /// Probes for `token` at the head of the source stack: copies it into
    /// the `match_buf` scratch space (it may be borrowed from the very
    /// `HookConfig` a read mutates), reads up to its length into the
    /// `check_buf` scratch space, and reports whether they matched. On a
    /// miss, whatever was read is put back unconsumed; on a hit, the bytes
    /// are already consumed. Both buffers are reused across calls rather
    /// than allocated fresh, matching how the scanner's inner loop runs
    /// once per input byte.
    pub(crate) fn probe(&mut self, token: &[u8]) -> std::io::Result<bool> {
        self.match_buf.clear();
        self.match_buf.extend_from_slice(token);
        self.sources.get_n(self.match_buf.len(), &mut self.check_buf)?;
        if self.check_buf == self.match_buf {
            Ok(true)
        } else {
            self.sources.put_n(&self.check_buf);
            Ok(false)
        }
    }

    /// Opens a new macro: bumps `macro_depth`, marks the current source's
    /// macro origin (for diagnostics), and resets `macro_buf`.
    pub(crate) fn enter_macro(&mut self) {
        self.macro_depth += 1;
        if let Some(top) = self.sources.top_mut() {
            top.mark_macro();
        }
        self.macro_buf.clear();
    }

    pub(crate) fn collect(&mut self, b: u8) {
        self.macro_buf.push(b);
    }

    pub(crate) fn collect_slice(&mut self, bytes: &[u8]) {
        self.macro_buf.extend_from_slice(bytes);
    }

    pub(crate) fn suspend_depth_mut(&mut self) -> &mut usize {
        &mut self.suspend_depth
    }

    /// Closes the innermost macro. Returns `Err` if `macro_depth` would go
    /// negative — an internal invariant violation, fatal. Does not itself
    /// evaluate the macro body or apply deferred mutations; the caller
    /// ([`crate::scanner::Scanner`]) does that only once depth reaches zero.
    pub(crate) fn close_one_level(&mut self) -> Result<(), ScanError> {
        if self.macro_depth == 0 {
            return Err(self.position_error(ScanErrorKind::MacroDepthInvariant));
        }
        self.macro_depth -= 1;
        Ok(())
    }

    pub(crate) fn unmark_macro(&mut self) {
        self.suspend_depth = 0;
        if let Some(top) = self.sources.top_mut() {
            top.unmark_macro();
        }
    }

    /// Applies any deferred `:include`/`pushinput`/`closeinput` mutation
    /// queued while the macro that just closed was being evaluated.
    pub(crate) fn apply_deferred_mutations(&mut self) {
        if let Some(source) = self.post_push.take() {
            self.sources.apply_push(source);
        }
        if std::mem::take(&mut self.post_pop) {
            self.sources.pop();
        }
    }

    /// The diagnostic position for an error raised right now: the open
    /// macro's origin if one is open in the current source, else the
    /// current byte position.
    fn current_position(&self) -> (String, usize, usize) {
        match self.sources.top() {
            Some(top) if top.in_macro() => {
                let (line, col) = top.macro_origin();
                (top.name().to_string(), line, col)
            }
            Some(top) => (top.name().to_string(), top.line(), top.col()),
            None => (String::from("<none>"), 0, 0),
        }
    }

    /// Builds a [`ScanError`] of `kind` positioned at the current macro's
    /// origin (if one is open) or the current byte — public so embedders
    /// that validate evaluator-callback arguments outside this crate (e.g.
    /// `hookscan-pyo3`'s type checks on `HostBindings` arguments) can raise
    /// the same positioned error an in-crate check would.
    pub fn position_error(&self, kind: ScanErrorKind) -> ScanError {
        let (file, line, col) = self.current_position();
        ScanError::new(kind, file, line, col)
    }
}

impl<E: Evaluator> HostBindings for ParserState<E> {
    fn write(&mut self, s: &[u8]) {
        self.emit(s);
    }

    fn puts(&mut self, s: &[u8]) {
        self.emit(s);
        self.emit_byte(b'\n');
    }

    fn hookbeg(&self) -> &[u8] {
        match self.sources.top() {
            Some(top) => &top.hooks().single().begin,
            None => &[],
        }
    }

    fn hookend(&self) -> &[u8] {
        match self.sources.top() {
            Some(top) => &top.hooks().single().end,
            None => &[],
        }
    }

    fn hookesc(&self) -> &[u8] {
        self.sources
            .top()
            .map(|s| s.hooks().escape())
            .unwrap_or_default()
    }

    fn sethook(&mut self, begin: &[u8], end: &[u8]) {
        use crate::hook::HookKind;
        if let Some(top) = self.sources.top_mut() {
            top.hooks_mut().set(HookKind::Begin, begin.to_vec());
            top.hooks_mut().set(HookKind::End, end.to_vec());
        }
    }

    fn sethookbeg(&mut self, s: &[u8]) {
        use crate::hook::HookKind;
        if let Some(top) = self.sources.top_mut() {
            top.hooks_mut().set(HookKind::Begin, s.to_vec());
        }
    }

    fn sethookend(&mut self, s: &[u8]) {
        use crate::hook::HookKind;
        if let Some(top) = self.sources.top_mut() {
            top.hooks_mut().set(HookKind::End, s.to_vec());
        }
    }

    fn sethookesc(&mut self, s: &[u8]) {
        use crate::hook::HookKind;
        if let Some(top) = self.sources.top_mut() {
            top.hooks_mut().set(HookKind::Escape, s.to_vec());
        }
    }

    fn seteater(&mut self, s: Option<&[u8]>) {
        if let Some(top) = self.sources.top_mut() {
            top.hooks_mut().set_eater(s.map(|s| s.to_vec().into_boxed_slice()));
        }
    }

    fn multihook(
        &mut self,
        triples: &[(Vec<u8>, Vec<u8>, Option<Vec<u8>>)],
    ) -> Result<(), ScanError> {
        use crate::hook::HookTriple;

        for (begin, end, suspend) in triples {
            let triple =
                HookTriple::new(begin.clone(), end.clone(), suspend.clone().map(Into::into));
            let result = match self.sources.top_mut() {
                Some(top) => top.hooks_mut().add_multi(triple),
                None => return Ok(()),
            };
            result.map_err(|e| self.position_error(e.into()))?;
        }
        Ok(())
    }

    fn ifilename(&self) -> &str {
        self.sources.top().map(Source::name).unwrap_or_default()
    }

    fn ilinenumber(&self) -> usize {
        self.sources.top().map(|s| s.line() + 1).unwrap_or(0)
    }

    fn ofilename(&self) -> &str {
        self.sinks.top().name()
    }

    fn olinenumber(&self) -> usize {
        self.sinks.top().line() + 1
    }

    fn pushinput(&mut self, name: Option<&Path>) -> Result<(), ScanError> {
        let source = self
            .sources
            .prepare_push(name)
            .map_err(|_| self.position_error(ScanErrorKind::FileOpen(path_buf(name))))?;
        self.post_push = Some(source);
        Ok(())
    }

    fn closeinput(&mut self) {
        self.post_pop = true;
    }

    fn pushoutput(&mut self, name: Option<&Path>) -> Result<(), ScanError> {
        self.sinks
            .push(name)
            .map_err(|_| self.position_error(ScanErrorKind::FileOpen(path_buf(name))))
    }

    fn closeoutput(&mut self) {
        self.sinks.pop();
    }

    fn block(&mut self) {
        self.sinks.top_mut().block();
    }

    fn unblock(&mut self) {
        self.sinks.top_mut().unblock();
    }
}

fn path_buf(name: Option<&Path>) -> std::path::PathBuf {
    name.map(Path::to_path_buf).unwrap_or_default()
}
