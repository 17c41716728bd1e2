//! Interprets a just-closed macro body: the `:…` built-in directives,
//! `.expr` value output, `/comment`, `#quote` pass-through, and raw
//! evaluator dispatch for everything else.
//!
//! Called once per macro, from [`crate::scanner::Scanner`] only after
//! `macro_depth` has returned to zero — nested macro bodies are never
//! dispatched, only emitted textually (see `scanner.rs`).

use bstr::BString;
use memchr::memchr;

use crate::error::{RunError, ScanErrorKind};
use crate::evaluator::{Evaluator, HostBindings};
use crate::state::ParserState;

/// Evaluates the current macro body in `state.macro_buf()` and reports
/// whether the scanning loop should stop (`:exit`).
pub fn eval_macro<E: Evaluator>(state: &mut ParserState<E>) -> Result<bool, RunError> {
    let mut body = state.macro_buf().to_vec();

    // A leading `+` arms the one-shot eat-tail flag on the source the macro
    // opened in, then is stripped before dispatch proceeds.
    if body.first() == Some(&b'+') {
        if let Some(top) = state.sources_mut().top_mut() {
            top.set_eat_tail();
        }
        body.remove(0);
    }

    match body.first() {
        Some(b':') => dispatch_directive(state, &body[1..]),
        Some(b'.') => {
            let source = bytes_to_str(&body[1..]);
            let result = state
                .evaluator_mut()
                .eval(&source, true)
                .map_err(|e| state.position_error(ScanErrorKind::Evaluator(e.0)))?;
            if let Some(text) = result {
                state.emit(text.as_bytes());
            }
            Ok(false)
        }
        Some(b'/') => Ok(false),
        Some(b'#') => {
            let begin = state.hookbeg().to_vec();
            let end = state.hookend().to_vec();
            state.emit(&begin);
            state.emit(&body[1..]);
            state.emit(&end);
            Ok(false)
        }
        _ => {
            let source = bytes_to_str(&body);
            state
                .evaluator_mut()
                .eval(&source, false)
                .map_err(|e| state.position_error(ScanErrorKind::Evaluator(e.0)))?;
            Ok(false)
        }
    }
}

/// Dispatches the bytes following the leading `:` of an internal directive.
/// A directive name matches only when it is a prefix of `body` immediately
/// followed by a single space or the end of the buffer — located with
/// `memchr` rather than a manual byte scan, the way the rest of this crate
/// reaches for it on the scanner's hot path.
fn dispatch_directive<E: Evaluator>(
    state: &mut ParserState<E>,
    body: &[u8],
) -> Result<bool, RunError> {
    let (name, rest) = match memchr(b' ', body) {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => (body, &body[body.len()..]),
    };

    match name {
        b"hookbeg" => {
            state.sethookbeg(rest);
            Ok(false)
        }
        b"hookend" => {
            state.sethookend(rest);
            Ok(false)
        }
        b"hookesc" => {
            state.sethookesc(rest);
            Ok(false)
        }
        b"hookall" => {
            state.sethookbeg(rest);
            state.sethookend(rest);
            state.sethookesc(rest);
            Ok(false)
        }
        b"hook" => {
            match memchr(b' ', rest) {
                Some(i) => state.sethook(&rest[..i], &rest[i + 1..]),
                None => state.sethook(rest, rest),
            }
            Ok(false)
        }
        b"eater" => {
            if rest.is_empty() {
                state.seteater(None);
            } else {
                state.seteater(Some(rest));
            }
            Ok(false)
        }
        b"include" => {
            let path = bytes_to_path(rest);
            state.pushinput(Some(&path))?;
            Ok(false)
        }
        b"source" => {
            let path = bytes_to_path(rest);
            state
                .evaluator_mut()
                .load_file(&path)
                .map_err(|e| state.position_error(ScanErrorKind::Evaluator(e.0)))?;
            Ok(false)
        }
        b"block" => {
            state.block();
            Ok(false)
        }
        b"unblock" => {
            state.unblock();
            Ok(false)
        }
        b"comment" => Ok(false),
        b"exit" => Ok(true),
        _ => Err(state
            .position_error(ScanErrorKind::UnknownDirective(BString::from(name.to_vec())))
            .into()),
    }
}

/// Macro bodies are treated as UTF-8 text at the evaluator boundary;
/// invalid sequences are replaced rather than rejected, since a stray
/// non-UTF-8 byte in a macro body is far more likely than the bytes being
/// meaningfully binary.
fn bytes_to_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn bytes_to_path(bytes: &[u8]) -> std::path::PathBuf {
    std::path::PathBuf::from(bytes_to_str(bytes))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::builder::Builder;
    use crate::error::EvalError;
    use crate::evaluator::Evaluator;
    use crate::test_support::SharedBuf;

    struct RecordingEvaluator {
        result: &'static str,
        seen: Vec<String>,
    }

    impl Evaluator for RecordingEvaluator {
        fn load_file(&mut self, path: &std::path::Path) -> Result<(), EvalError> {
            self.seen.push(format!("load:{}", path.display()));
            Ok(())
        }

        fn eval(&mut self, source: &str, want_string: bool) -> Result<Option<String>, EvalError> {
            self.seen.push(format!("eval:{source}"));
            Ok(want_string.then(|| self.result.to_string()))
        }
    }

    fn run_str(input: &str, evaluator: RecordingEvaluator) -> (String, Vec<String>) {
        let out = SharedBuf::new();
        let mut builder = Builder::new(evaluator);
        builder.push_source_reader(Box::new(Cursor::new(input.as_bytes().to_vec())));
        builder.set_sink_writer(Box::new(out.clone()));
        let mut state = builder.build().unwrap();
        crate::scanner::run(&mut state).unwrap();
        (String::from_utf8(out.take()).unwrap(), state.evaluator().seen.clone())
    }

    #[test]
    fn hookbeg_directive_takes_effect_for_the_rest_of_the_source() {
        // `:hookbeg` changes only `begin`, so the very next macro (changing
        // `end`) must already open with the new `[[` and still close with
        // the old `>-`, which is still in force until it runs.
        let evaluator = RecordingEvaluator { result: "42", seen: Vec::new() };
        let (out, _) = run_str("-<:hookbeg [[>-[[:hookend ]]>-x[[.ignored]]y", evaluator);
        assert_eq!(out, "x42y");
    }

    #[test]
    fn bare_directive_with_no_argument_gets_an_empty_argument() {
        let evaluator = RecordingEvaluator { result: "x", seen: Vec::new() };
        let (out, _) = run_str("a-<:block>-b-<:unblock>-c", evaluator);
        assert_eq!(out, "ac");
    }

    #[test]
    fn unknown_directive_is_an_error() {
        let evaluator = RecordingEvaluator { result: "x", seen: Vec::new() };
        let mut builder = Builder::new(evaluator);
        builder.push_source_reader(Box::new(Cursor::new(b"-<:bogus>-".to_vec())));
        builder.set_sink_writer(Box::new(SharedBuf::new()));
        let mut state = builder.build().unwrap();
        let err = crate::scanner::run(&mut state).unwrap_err();
        assert!(err.to_string().contains("unknown internal command"));
    }

    #[test]
    fn raw_body_is_evaluated_for_side_effect_only() {
        let evaluator = RecordingEvaluator { result: "x", seen: Vec::new() };
        let (out, seen) = run_str("-<puts 1>-", evaluator);
        assert_eq!(out, "");
        assert_eq!(seen, vec!["eval:puts 1"]);
    }

    #[test]
    fn leading_plus_arms_eat_tail_and_is_stripped_before_dispatch() {
        let evaluator = RecordingEvaluator { result: "x", seen: Vec::new() };
        let (out, seen) = run_str("-<+puts 1>- z", evaluator);
        assert_eq!(out, "z");
        assert_eq!(seen, vec!["eval:puts 1"]);
    }
}
