//! End-to-end scenarios from the engine's specification (concrete examples
//! with default delimiters), driven through the public `Builder`/`Scanner`
//! API with a minimal arithmetic stand-in for a real scripting language.

use std::io::Cursor;
use std::path::Path;

use hookscan::error::EvalError;
use hookscan::{Builder, Evaluator};

/// Evaluates `N+N` as integer addition, echoes a bare integer literal, and
/// otherwise ignores the expression — just enough to drive every scenario
/// without embedding a real interpreter.
struct ArithEvaluator;

impl Evaluator for ArithEvaluator {
    fn load_file(&mut self, _path: &Path) -> Result<(), EvalError> {
        Ok(())
    }

    fn eval(&mut self, source: &str, want_string: bool) -> Result<Option<String>, EvalError> {
        if !want_string {
            return Ok(None);
        }
        let result = match source.split_once('+') {
            Some((a, b)) => {
                let a: i64 = a.trim().parse().map_err(|_| EvalError::new("bad int"))?;
                let b: i64 = b.trim().parse().map_err(|_| EvalError::new("bad int"))?;
                (a + b).to_string()
            }
            None => source.trim().to_string(),
        };
        Ok(Some(result))
    }
}

fn run(input: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    let out = hookscan_test_support::SharedBuf::new();
    let mut builder = Builder::new(ArithEvaluator);
    builder.push_source_reader(Box::new(Cursor::new(input.as_bytes().to_vec())));
    builder.set_sink_writer(Box::new(out.clone()));
    let mut state = builder.build().unwrap();
    hookscan::scanner::run(&mut state).unwrap();
    String::from_utf8(out.take()).unwrap()
}

mod hookscan_test_support {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        pub fn new() -> Self {
            SharedBuf::default()
        }

        pub fn take(&self) -> Vec<u8> {
            self.0.borrow().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

/// Scenario 1: a macro evaluates an expression and its result replaces it.
#[test]
fn scenario_value_output() {
    assert_eq!(run("hello -<.1+2>- world"), "hello 3 world");
}

/// Scenario 2: a delimiter change inside a macro takes effect for the
/// current source immediately after that macro closes — so the second
/// directive here must already open with the *new* begin (`[[`) set by the
/// first, and close with the *old* end (`>-`), which is still in force
/// until this very macro changes it.
#[test]
fn scenario_hook_redefinition_takes_effect_after_the_macro_closes() {
    assert_eq!(
        run("-<:hookbeg [[>-[[:hookend ]]>-x[[.42]]y"),
        "x42y"
    );
}

/// Scenario 3: an escaped newline outside a macro is a line continuation.
#[test]
fn scenario_escaped_newline_is_swallowed() {
    assert_eq!(run("pre\\\npost"), "prepost");
}

/// Scenario 4: `#` quoting re-emits with one less level of quoting, so a
/// later pass would see the hook.
#[test]
fn scenario_quote_round_trips_one_level() {
    assert_eq!(run("-<#inner>-"), "-<inner>-");
}

/// Scenario 5: `/` opens a comment macro that produces no output.
#[test]
fn scenario_comment_macro_is_dropped() {
    assert_eq!(run("a-</ignored>-b"), "ab");
}

/// Scenario 6: `:include` fully consumes the included file before resuming
/// the includer's remaining text.
#[test]
fn scenario_include_is_fully_consumed_before_resuming() {
    let dir = std::env::temp_dir().join(format!(
        "hookscan-scenario-include-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let included = dir.join("other.txt");
    std::fs::write(&included, "X").unwrap();

    let input = format!("-<:include {}>-post", included.display());
    assert_eq!(run(&input), "Xpost");

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Scenario 7: `:exit` stops the scan immediately; anything after it is
/// never read.
#[test]
fn scenario_exit_stops_immediately() {
    assert_eq!(run("-<:exit>-unread"), "");
}

/// Scenario 8: a macro with `begin == end == escape` still works, via the
/// escape-equals-begin shortcut to open and the escape-equals-end shortcut
/// (escape followed by whitespace) to close — see `scanner.rs` for the full
/// trace of why a bare second `%` can't close it.
#[test]
fn scenario_self_escaping_hookall() {
    assert_eq!(run("-<:hookall %>-%.1+2%\n"), "3");
}

/// Round-trip law: text with no occurrence of any hook first byte passes
/// through completely unchanged.
#[test]
fn law_hookless_text_passes_through_unchanged() {
    let text = "there are no hooks in this sentence at all, just words.";
    assert_eq!(run(text), text);
}

/// Round-trip law: with a single-byte escape equal to begin, doubling it
/// emits the byte literally instead of opening a macro.
#[test]
fn law_escaped_escape_emits_literal_byte_when_escape_equals_begin() {
    assert_eq!(run("-<:hookall @>-pre@@post"), "pre@post");
}
