//! Pre-run configuration: the default [`HookConfig`] template, the initial
//! input and output, and the flush policy, assembled into a [`ParserState`]
//! ready for [`crate::scanner::run`]. A value type that is consumed once,
//! not a long-lived handle.

use std::io::{Read, Write};
use std::path::PathBuf;

use crate::error::{ConfigError, DiagnosticSink, StderrDiagnostics};
use crate::evaluator::Evaluator;
use crate::hook::HookConfig;
use crate::sink::SinkStack;
use crate::source::Source;
use crate::source_stack::SourceStack;
use crate::state::ParserState;

enum PendingInput {
    Path(PathBuf),
    Stdin,
    Reader(Box<dyn Read>),
}

enum PendingOutput {
    Path(PathBuf),
    Stdout,
    Writer(Box<dyn Write>),
}

/// Assembles a [`ParserState`]. A host driver is expected to configure a
/// `Builder` from its parsed arguments, then hand off to
/// [`crate::scanner::run`].
pub struct Builder<E> {
    evaluator: E,
    defaults: HookConfig,
    flush: bool,
    source: Option<PendingInput>,
    sink: Option<PendingOutput>,
    diagnostics: Option<Box<dyn DiagnosticSink>>,
}

impl<E: Evaluator> Builder<E> {
    pub fn new(evaluator: E) -> Self {
        Builder {
            evaluator,
            defaults: HookConfig::default(),
            flush: false,
            source: None,
            sink: None,
            diagnostics: None,
        }
    }

    /// Preconfigures the default `HookConfig` template new sources inherit,
    /// so a host driver can change the default delimiter syntax before
    /// processing begins.
    pub fn set_defaults(&mut self, defaults: HookConfig) -> &mut Self {
        self.defaults = defaults;
        self
    }

    pub fn set_flush(&mut self, flush: bool) -> &mut Self {
        self.flush = flush;
        self
    }

    pub fn push_source_path(&mut self, path: PathBuf) -> &mut Self {
        self.source = Some(PendingInput::Path(path));
        self
    }

    pub fn push_source_stdin(&mut self) -> &mut Self {
        self.source = Some(PendingInput::Stdin);
        self
    }

    /// Test/embedder hook: scans an already-open reader instead of opening a
    /// path or standard input.
    pub fn push_source_reader(&mut self, reader: Box<dyn Read>) -> &mut Self {
        self.source = Some(PendingInput::Reader(reader));
        self
    }

    pub fn set_sink_path(&mut self, path: PathBuf) -> &mut Self {
        self.sink = Some(PendingOutput::Path(path));
        self
    }

    pub fn set_sink_stdout(&mut self) -> &mut Self {
        self.sink = Some(PendingOutput::Stdout);
        self
    }

    /// Test/embedder hook: writes to an already-open writer instead of
    /// opening a path or standard output.
    pub fn set_sink_writer(&mut self, writer: Box<dyn Write>) -> &mut Self {
        self.sink = Some(PendingOutput::Writer(writer));
        self
    }

    /// Replaces the sink a terminating `ScanError` is reported through.
    /// Defaults to [`StderrDiagnostics`] if never called.
    pub fn set_diagnostics(&mut self, sink: Box<dyn DiagnosticSink>) -> &mut Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Consumes the builder into a [`ParserState`] with its input pushed and
    /// output pushed, ready to run. Defaults to standard input and standard
    /// output if neither was configured.
    pub fn build(self) -> Result<ParserState<E>, ConfigError> {
        let mut sources = SourceStack::new(self.defaults.clone());
        match self.source.unwrap_or(PendingInput::Stdin) {
            PendingInput::Path(path) => sources
                .push(Some(&path))
                .map_err(|source| ConfigError::FileOpen { path, source })?,
            PendingInput::Stdin => sources
                .push(None)
                .map_err(|source| ConfigError::FileOpen { path: PathBuf::new(), source })?,
            PendingInput::Reader(reader) => {
                sources.apply_push(Source::new("<input>", reader, self.defaults));
            }
        }

        let sinks = match self.sink.unwrap_or(PendingOutput::Stdout) {
            PendingOutput::Path(path) => {
                SinkStack::new(Box::new(
                    std::fs::File::create(&path).map_err(|source| ConfigError::FileOpen {
                        path,
                        source,
                    })?,
                ))
            }
            PendingOutput::Stdout => SinkStack::new(Box::new(std::io::stdout())),
            PendingOutput::Writer(writer) => SinkStack::new(writer),
        };

        let diagnostics = self.diagnostics.unwrap_or_else(|| Box::new(StderrDiagnostics));
        Ok(ParserState::new(sources, sinks, self.flush, self.evaluator, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::error::EvalError;
    use crate::evaluator::Evaluator;
    use crate::test_support::SharedBuf;

    use super::*;

    struct NoopEvaluator;

    impl Evaluator for NoopEvaluator {
        fn load_file(&mut self, _path: &std::path::Path) -> Result<(), EvalError> {
            Ok(())
        }

        fn eval(&mut self, _source: &str, want_string: bool) -> Result<Option<String>, EvalError> {
            Ok(want_string.then(String::new))
        }
    }

    #[test]
    fn build_with_a_reader_and_writer_scans_immediately() {
        let out = SharedBuf::new();
        let mut builder = Builder::new(NoopEvaluator);
        builder.push_source_reader(Box::new(Cursor::new(b"hi".to_vec())));
        builder.set_sink_writer(Box::new(out.clone()));
        let mut state = builder.build().unwrap();
        crate::scanner::run(&mut state).unwrap();
        assert_eq!(out.take(), b"hi");
    }

    #[test]
    fn missing_source_path_is_a_config_error() {
        let mut builder = Builder::new(NoopEvaluator);
        builder.push_source_path(PathBuf::from("/nonexistent/does-not-exist"));
        builder.set_sink_writer(Box::new(Vec::new()));
        assert!(builder.build().is_err());
    }
}
