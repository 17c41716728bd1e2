//! A CPython-backed [`hookscan::Evaluator`], and the `hookscan` Python
//! module it registers `HostBindings` under so macro bodies can call back
//! into the running scan.

pub mod bindings;
pub mod evaluator;
pub(crate) mod py_bytes;

pub use evaluator::PyEvaluator;

use std::path::Path;

use anyhow::Context;
use pyo3::types::PyModule;
use pyo3::{PyResult, Python};

use hookscan::Builder;

/// Builds and registers the embedded `hookscan` Python module: every
/// `HostBindings` function, callable as `hookscan.write(...)`,
/// `hookscan.sethookbeg(...)`, and so on.
pub fn module(py: Python<'_>) -> PyResult<&PyModule> {
    // Lifetime tied to `py` via elision (pyo3's own convention).
    let module = PyModule::new(py, "hookscan")?;
    bindings::register(module)?;
    Ok(module)
}

/// Convenience entrypoint for an embedder that just wants to run one file
/// through one Python-backed scan: builds a [`PyEvaluator`], registers the
/// `hookscan` module, scans `path`, and writes the result to `output`.
///
/// The command-line driver that would parse arguments and pick this
/// function's inputs apart is out of scope for this crate, same as for the
/// core `hookscan` crate.
pub fn run_file(path: &Path, output: &Path) -> anyhow::Result<()> {
    Python::with_gil(|py| {
        module(py).context("registering the hookscan Python module")?;
        let mut builder = Builder::new(PyEvaluator::new());
        builder.push_source_path(path.to_path_buf());
        builder.set_sink_path(output.to_path_buf());
        let mut state = builder.build().context("opening source or sink")?;
        bindings::run(py, &mut state).context("running the scan")?;
        Ok(())
    })
}
