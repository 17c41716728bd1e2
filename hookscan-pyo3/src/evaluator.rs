//! A CPython-backed [`hookscan::Evaluator`]: `:source` loads a file into a
//! persistent globals dict, `.expr` evaluates an expression and renders its
//! result, and a bare macro body is executed for side effect only.
//!
//! Wraps untrusted source in a controlled namespace before running it; the
//! namespace persists for the life of the evaluator rather than being
//! rebuilt per call, since macro bodies are expected to see each other's
//! definitions within one scan.

use std::fs;
use std::path::Path;

use pyo3::types::PyDict;
use pyo3::{PyErr, Py, Python};

use hookscan::error::EvalError;
use hookscan::Evaluator;

/// Owns one Python namespace for the life of a scan. `Py<PyDict>` is a
/// GIL-independent handle, so this type carries no lifetime and can sit in
/// a `hookscan::Builder<PyEvaluator>` the way any other `Evaluator` does.
pub struct PyEvaluator {
    globals: Py<PyDict>,
}

impl PyEvaluator {
    /// Creates an evaluator with a fresh namespace seeded with a handful of
    /// standard-library imports macro bodies commonly reach for.
    pub fn new() -> Self {
        Python::with_gil(|py| {
            let globals = PyDict::new(py);
            seed_globals(py, globals);
            PyEvaluator { globals: globals.into() }
        })
    }
}

impl Default for PyEvaluator {
    fn default() -> Self {
        PyEvaluator::new()
    }
}

impl Evaluator for PyEvaluator {
    fn load_file(&mut self, path: &Path) -> Result<(), EvalError> {
        log::debug!("loading {}", path.display());
        let code = fs::read_to_string(path)
            .map_err(|e| EvalError::new(format!("can't read {}: {e}", path.display())))?;
        Python::with_gil(|py| {
            let globals = self.globals.as_ref(py);
            py.run(&code, Some(globals), None).map_err(|e| py_eval_error(py, e))
        })
    }

    fn eval(&mut self, source: &str, want_string: bool) -> Result<Option<String>, EvalError> {
        Python::with_gil(|py| {
            let globals = self.globals.as_ref(py);
            if want_string {
                let value = py
                    .eval(source, Some(globals), None)
                    .map_err(|e| py_eval_error(py, e))?;
                let text = value.str().map_err(|e| py_eval_error(py, e))?;
                Ok(Some(text.to_string_lossy().into_owned()))
            } else {
                py.run(source, Some(globals), None).map_err(|e| py_eval_error(py, e))?;
                Ok(None)
            }
        })
    }
}

fn py_eval_error(py: Python<'_>, err: PyErr) -> EvalError {
    EvalError::new(err.value(py).to_string())
}

fn seed_globals(py: Python<'_>, globals: &PyDict) {
    for import in ["os", "re", "sys", "textwrap"] {
        if let Ok(module) = py.import(import) {
            let _ = globals.set_item(import, module);
        }
    }
}
