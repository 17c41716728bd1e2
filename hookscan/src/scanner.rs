//! The character-level state machine: reads through a [`crate::source_stack::SourceStack`],
//! classifies each byte against the current source's [`crate::hook::HookConfig`],
//! and either routes it to the top sink, appends it to the open macro's
//! accumulation buffer, or dispatches a just-closed macro body.
//!
//! Fixed match priority per byte, escape first: **escape → suspend → end →
//! begin**. Inside a macro, end always wins over begin. The one documented
//! deviation from the byte-for-byte original is the escape-then-eater
//! ordering, described on [`Scanner::handle_escape`].

use crate::error::{RunError, ScanErrorKind};
use crate::evaluator::Evaluator;
use crate::hook::HookTriple;
use crate::state::ParserState;
use crate::{dispatch, source::STDIN_NAME};

/// Drives one [`ParserState`] to completion. Holds no state of its own
/// beyond the borrow — all state lives in `ParserState`, consistent with
/// threading it explicitly rather than through a process global.
pub struct Scanner<'s, E> {
    state: &'s mut ParserState<E>,
}

impl<'s, E: Evaluator> Scanner<'s, E> {
    pub fn new(state: &'s mut ParserState<E>) -> Self {
        Scanner { state }
    }

    /// Runs the main loop to completion: normal end-of-input, or `:exit`.
    pub fn run(&mut self) -> Result<(), RunError> {
        while !self.step()? {}
        Ok(())
    }

    fn read_one(&mut self) -> Result<Option<u8>, RunError> {
        Ok(self.state.sources_mut().get_one()?)
    }

    fn put_back(&mut self, b: u8) {
        self.state.sources_mut().put_n(&[b]);
    }

    fn probe(&mut self, token: &[u8]) -> Result<bool, RunError> {
        Ok(self.state.probe(token)?)
    }

    fn escape_token(&self) -> Vec<u8> {
        self.state
            .sources()
            .top()
            .map(|s| s.hooks().escape().to_vec())
            .unwrap_or_default()
    }

    fn eater_token(&self) -> Option<Vec<u8>> {
        self.state
            .sources()
            .top()
            .and_then(|s| s.hooks().eater())
            .map(|e| e.to_vec())
    }

    fn escape_eq_begin(&self) -> bool {
        self.state.sources().top().map(|s| s.hooks().escape_eq_begin()).unwrap_or(false)
    }

    fn escape_eq_end(&self) -> bool {
        self.state.sources().top().map(|s| s.hooks().escape_eq_end()).unwrap_or(false)
    }

    /// The `HookTriple` that closes the innermost currently-open macro.
    fn current_hook(&self) -> Option<HookTriple> {
        self.state.sources().top().and_then(|s| s.current_hook().cloned())
    }

    fn single_triple(&self) -> HookTriple {
        self.state
            .sources()
            .top()
            .map(|s| s.hooks().single().clone())
            .unwrap_or_else(|| HookTriple::new(Vec::new(), Vec::new(), None))
    }

    /// Begin candidates in probe order: the sole triple in single mode, or
    /// every triple in multi mode (list order — first hit wins).
    fn begin_candidates(&self) -> Vec<HookTriple> {
        match self.state.sources().top() {
            Some(s) => match s.hooks().multi() {
                Some(multi) => multi.to_vec(),
                None => vec![s.hooks().single().clone()],
            },
            None => Vec::new(),
        }
    }

    /// One iteration: reads a byte, classifies it, and returns whether the
    /// loop should stop.
    fn step(&mut self) -> Result<bool, RunError> {
        match self.read_one()? {
            None => {
                if self.state.macro_depth() > 0 {
                    Err(self.state.position_error(ScanErrorKind::EofInMacro).into())
                } else {
                    Ok(true)
                }
            }
            Some(c) => {
                let first_byte_hit = self
                    .state
                    .sources()
                    .top()
                    .map(|s| s.hooks().first_byte_match(c))
                    .unwrap_or(false);
                if first_byte_hit {
                    self.put_back(c);
                    self.probe_hooks()
                } else {
                    self.non_hook(c);
                    Ok(false)
                }
            }
        }
    }

    fn non_hook(&mut self, c: u8) {
        if self.state.macro_depth() > 0 {
            self.state.collect(c);
        } else {
            self.state.emit_byte(c);
        }
    }

    /// Probes candidate tokens in fixed priority order — escape, suspend
    /// (in-macro only), end (in-macro only, priority over begin), begin —
    /// falling back to plain-text handling if nothing matches.
    fn probe_hooks(&mut self) -> Result<bool, RunError> {
        let escape = self.escape_token();
        if !escape.is_empty() && self.probe(&escape)? {
            return self.handle_escape();
        }

        if self.state.macro_depth() > 0 {
            if let Some(hook) = self.current_hook() {
                if let Some(suspend) = &hook.suspend {
                    if self.probe(suspend)? {
                        self.handle_suspend(suspend);
                        return Ok(false);
                    }
                }
                if self.probe(&hook.end)? {
                    return self.handle_end();
                }
            }
        }

        if self.probe_begin()? {
            return Ok(false);
        }

        let c = self
            .read_one()?
            .expect("a first-byte hit guarantees the put-back byte is still there");
        self.non_hook(c);
        Ok(false)
    }

    /// Escape causes the following byte to be read with altered meaning.
    ///
    /// The eater check runs ahead of the escape-equals-end shortcut,
    /// uniformly for both the in-macro and outside-macro branches — see
    /// `DESIGN.md` for why this orders the two differently from the
    /// reference C implementation's in-macro branch.
    fn handle_escape(&mut self) -> Result<bool, RunError> {
        let next = match self.read_one()? {
            Some(b) => b,
            None => {
                return if self.state.macro_depth() > 0 {
                    Err(self.state.position_error(ScanErrorKind::EofInMacro).into())
                } else {
                    Ok(true)
                };
            }
        };

        if let Some(eater) = self.eater_token() {
            // `next` already is the eater's first byte; only the remainder
            // needs probing, so a miss restores the stream to exactly
            // after `next` instead of re-reading (and re-accounting for)
            // a byte this function already holds as a value.
            if eater.first() == Some(&next) && self.probe(&eater[1..])? {
                return Ok(false);
            }
        }

        if self.state.macro_depth() > 0 {
            if (next == b' ' || next == b'\n') && self.escape_eq_end() {
                self.handle_end()
            } else {
                self.state.collect(next);
                Ok(false)
            }
        } else {
            match next {
                b'\n' | b' ' => Ok(false),
                _ => {
                    if self.escape_eq_begin() {
                        let escape = self.escape_token();
                        if escape.len() == 1 && next == escape[0] {
                            self.state.emit_byte(next);
                        } else {
                            self.put_back(next);
                            self.open_macro_via_escape();
                        }
                    } else {
                        self.state.emit_byte(next);
                    }
                    Ok(false)
                }
            }
        }
    }

    fn open_macro_via_escape(&mut self) {
        let triple = self.single_triple();
        if let Some(top) = self.state.sources_mut().top_mut() {
            top.push_hook(triple);
        }
        self.state.enter_macro();
    }

    fn handle_suspend(&mut self, suspend: &[u8]) {
        self.state.bump_suspend_depth();
        self.state.collect_slice(suspend);
    }

    /// Closes the innermost macro, or — while a suspend is still open —
    /// treats the end token as literal text instead.
    fn handle_end(&mut self) -> Result<bool, RunError> {
        if self.state.suspend_depth() > 0 {
            self.state.drop_suspend_depth();
            let end = self.current_hook().map(|h| h.end.to_vec()).unwrap_or_default();
            self.state.collect_slice(&end);
            return Ok(false);
        }

        self.state.close_one_level()?;

        if self.state.macro_depth() > 0 {
            let end = self.current_hook().map(|h| h.end.to_vec()).unwrap_or_default();
            self.state.emit(&end);
            if let Some(top) = self.state.sources_mut().top_mut() {
                top.pop_hook();
            }
            Ok(false)
        } else {
            let stop = dispatch::eval_macro(self.state)?;
            self.state.unmark_macro();
            if let Some(top) = self.state.sources_mut().top_mut() {
                top.pop_hook();
            }
            self.state.apply_deferred_mutations();
            Ok(stop)
        }
    }

    /// Probes every begin candidate in priority order; the winner is
    /// pushed onto the current source's hook stack.
    fn probe_begin(&mut self) -> Result<bool, RunError> {
        for triple in self.begin_candidates() {
            if self.probe(&triple.begin)? {
                if self.state.macro_depth() > 0 {
                    let begin = triple.begin.to_vec();
                    if let Some(top) = self.state.sources_mut().top_mut() {
                        top.push_hook(triple);
                    }
                    self.state.nest_macro();
                    self.state.emit(&begin);
                } else {
                    if let Some(top) = self.state.sources_mut().top_mut() {
                        top.push_hook(triple);
                    }
                    self.state.enter_macro();
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Runs one file (or standard input) through `state` from the top of its
/// already-pushed source stack. A terminating [`crate::error::ScanError`] is
/// reported through `state`'s [`crate::error::DiagnosticSink`] (and, via the
/// default sink, the `log` facade) before being returned, so a caller that
/// only checks the `Result` still gets the positioned diagnostic on stderr.
pub fn run<E: Evaluator>(state: &mut ParserState<E>) -> Result<(), RunError> {
    let result = Scanner::new(state).run();
    if let Err(RunError::Scan(ref err)) = result {
        state.report_diagnostic(err.diagnostic());
    }
    result
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::builder::Builder;
    use crate::error::EvalError;
    use crate::evaluator::Evaluator;
    use crate::test_support::SharedBuf;

    /// An evaluator that returns a fixed string for every `.expr`, and
    /// otherwise no-ops — enough to drive the scanner end to end without
    /// a real scripting language.
    struct ConstEvaluator(&'static str);

    impl Evaluator for ConstEvaluator {
        fn load_file(&mut self, _path: &std::path::Path) -> Result<(), EvalError> {
            Ok(())
        }

        fn eval(&mut self, _source: &str, want_string: bool) -> Result<Option<String>, EvalError> {
            Ok(want_string.then(|| self.0.to_string()))
        }
    }

    fn run_str(input: &str, evaluator: ConstEvaluator) -> String {
        let out = SharedBuf::new();
        let mut builder = Builder::new(evaluator);
        builder.push_source_reader(Box::new(Cursor::new(input.as_bytes().to_vec())));
        builder.set_sink_writer(Box::new(out.clone()));
        let mut state = builder.build().unwrap();
        super::run(&mut state).unwrap();
        String::from_utf8(out.take()).unwrap()
    }

    #[test]
    fn plain_text_passes_through_unchanged() {
        assert_eq!(run_str("hello world", ConstEvaluator("x")), "hello world");
    }

    #[test]
    fn macro_is_replaced_by_the_evaluator_result() {
        assert_eq!(run_str("hello -<.1+2>- world", ConstEvaluator("3")), "hello 3 world");
    }

    #[test]
    fn comment_macro_is_dropped() {
        assert_eq!(run_str("a-</ignored>-b", ConstEvaluator("x")), "ab");
    }

    #[test]
    fn quote_macro_reemits_with_one_fewer_hash() {
        assert_eq!(run_str("-<#inner>-", ConstEvaluator("x")), "-<inner>-");
    }

    #[test]
    fn escaped_newline_outside_macro_is_swallowed() {
        assert_eq!(run_str("pre\\\npost", ConstEvaluator("x")), "prepost");
    }

    #[test]
    fn exit_directive_stops_the_scan_immediately() {
        assert_eq!(run_str("-<:exit>-unread", ConstEvaluator("x")), "");
    }

    #[test]
    fn self_escaping_hookall_round_trips() {
        // `:hookall %` (set via the default `-<`/`>-` delimiters) makes
        // begin == end == escape == "%" for the rest of this source. Escape
        // always wins the match-priority race, so opening the next macro
        // goes through the escape-equals-begin shortcut, and closing it
        // requires escape followed by whitespace (escape-equals-end) rather
        // than a bare second "%" — both documented in `scanner.rs`.
        assert_eq!(run_str("-<:hookall %>-%.1+2%\n", ConstEvaluator("3")), "3");
    }

    #[test]
    fn a_terminating_scan_error_is_reported_through_the_diagnostic_sink() {
        use std::cell::RefCell;
        use std::rc::Rc;

        use crate::error::{Diagnostic, DiagnosticSink};

        #[derive(Clone, Default)]
        struct CapturingSink(Rc<RefCell<Vec<Diagnostic>>>);

        impl DiagnosticSink for CapturingSink {
            fn report(&mut self, diagnostic: Diagnostic) {
                self.0.borrow_mut().push(diagnostic);
            }
        }

        let captured = CapturingSink::default();
        let out = SharedBuf::new();
        let mut builder = Builder::new(ConstEvaluator("x"));
        builder.push_source_reader(Box::new(Cursor::new(b"-<unterminated".to_vec())));
        builder.set_sink_writer(Box::new(out));
        builder.set_diagnostics(Box::new(captured.clone()));
        let mut state = builder.build().unwrap();

        let err = super::run(&mut state).unwrap_err();
        assert!(err.to_string().contains("got EOF within macro"));

        let diagnostics = captured.0.borrow();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("got EOF within macro"));
    }
}
