//! Registers [`hookscan::HostBindings`] as Python-callable functions, and
//! drives a scan with the live [`ParserState`] reachable from them.
//!
//! `#[pyfunction]` has no closure environment — a registered function can't
//! capture the `ParserState` it should call back into the way a Rust
//! closure would, so one module-level cell holds the live state instead,
//! populated only for the duration of one `run` call (see `DESIGN.md` for
//! why that scoping is safe).

use std::cell::RefCell;
use std::path::Path;
use std::ptr::NonNull;

use pyo3::exceptions::{PyRuntimeError, PyTypeError};
use pyo3::sync::GILOnceCell;
use pyo3::types::{PyAny, PyBytes, PyList, PyModule, PyString, PyTuple};
use pyo3::{wrap_pyfunction, Py, PyErr, PyResult, Python};

use hookscan::error::{RunError, ScanError, ScanErrorKind};
use hookscan::ParserState;

use crate::evaluator::PyEvaluator;
use crate::py_bytes::PyLazyBytes;

/// `NonNull` isn't `Send` on its own; this asserts it's sound to move
/// across threads because every access is already serialized by the GIL —
/// no two Python threads can run a registered function concurrently.
struct StatePtr(NonNull<ParserState<PyEvaluator>>);
unsafe impl Send for StatePtr {}

static ACTIVE_STATE: GILOnceCell<RefCell<Option<StatePtr>>> = GILOnceCell::new();

fn active_cell(py: Python<'_>) -> &RefCell<Option<StatePtr>> {
    ACTIVE_STATE.get_or_init(py, || RefCell::new(None))
}

fn scan_err(err: ScanError) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

/// Runs `state` to completion with every registered `HostBindings` function
/// able to reach it, then clears the module global again regardless of how
/// the run ended.
pub fn run(py: Python<'_>, state: &mut ParserState<PyEvaluator>) -> PyResult<()> {
    log::debug!("registering active scan state for host bindings");
    *active_cell(py).borrow_mut() = Some(StatePtr(NonNull::from(&mut *state)));
    let result = hookscan::scanner::run(state);
    *active_cell(py).borrow_mut() = None;
    result.map_err(run_err)
}

fn run_err(err: RunError) -> PyErr {
    match err {
        RunError::Scan(e) => scan_err(e),
        RunError::Io(e) => PyErr::from(e),
    }
}

/// Looks up the currently active `ParserState` and hands it to `f`.
///
/// # Safety
///
/// The pointer in `ACTIVE_STATE` is only ever set by [`run`] for the
/// duration of its call, and only one Python thread can be executing at a
/// time (the GIL), so the exclusive borrow handed to `f` cannot alias any
/// other live reference to the same `ParserState`.
fn with_state<R>(py: Python<'_>, f: impl FnOnce(&mut ParserState<PyEvaluator>) -> R) -> PyResult<R> {
    let cell = active_cell(py);
    let guard = cell.borrow();
    let ptr = guard
        .as_ref()
        .map(|p| p.0)
        .ok_or_else(|| PyRuntimeError::new_err("hookscan: no scan is currently running"))?;
    drop(guard);
    // SAFETY: see the function doc comment.
    let state = unsafe { &mut *ptr.as_ptr() };
    Ok(f(state))
}

/// Generates one `#[pyfunction]` wrapper per `HostBindings` method.
///
/// The `fn` form is for infallible bindings, whose body evaluates directly
/// to the return type. The `try fn` form is for the handful (`pushinput`,
/// `pushoutput`) that can fail with a `ScanError`; their body evaluates to a
/// `PyResult` that is propagated rather than wrapped again. `seteater` and
/// `multihook` need their own argument dispatch ahead of `HostBindings` and
/// are written out by hand instead of through this macro.
macro_rules! host_fn {
    (fn $name:ident($($arg:ident : $ty:ty),* $(,)?) -> $ret:ty { $($body:tt)* }) => {
        #[pyfunction]
        fn $name(py: Python<'_>, $($arg: $ty),*) -> PyResult<$ret> {
            with_state(py, |state: &mut ParserState<PyEvaluator>| { $($body)* })
        }
    };
    (try fn $name:ident($($arg:ident : $ty:ty),* $(,)?) -> $ret:ty { $($body:tt)* }) => {
        #[pyfunction]
        fn $name(py: Python<'_>, $($arg: $ty),*) -> PyResult<$ret> {
            with_state(py, |state: &mut ParserState<PyEvaluator>| -> PyResult<$ret> {
                $($body)*
            })?
        }
    };
}

host_fn! {
    fn write(data: &PyBytes) -> () {
        state.write(data.as_bytes());
    }
}

host_fn! {
    fn puts(data: &PyBytes) -> () {
        state.puts(data.as_bytes());
    }
}

host_fn! {
    fn hookbeg() -> Py<PyBytes> {
        PyLazyBytes::new(state.hookbeg()).to_python(py).into()
    }
}

host_fn! {
    fn hookend() -> Py<PyBytes> {
        PyLazyBytes::new(state.hookend()).to_python(py).into()
    }
}

host_fn! {
    fn hookesc() -> Py<PyBytes> {
        PyLazyBytes::new(state.hookesc()).to_python(py).into()
    }
}

host_fn! {
    fn sethook(begin: &PyBytes, end: &PyBytes) -> () {
        state.sethook(begin.as_bytes(), end.as_bytes());
    }
}

host_fn! {
    fn sethookbeg(data: &PyBytes) -> () {
        state.sethookbeg(data.as_bytes());
    }
}

host_fn! {
    fn sethookend(data: &PyBytes) -> () {
        state.sethookend(data.as_bytes());
    }
}

host_fn! {
    fn sethookesc(data: &PyBytes) -> () {
        state.sethookesc(data.as_bytes());
    }
}

/// Coerces a Python value accepted wherever a hook token is expected to its
/// bytes: `bytes` as-is, `str` UTF-8-encoded. Anything else is `None`, for
/// the caller to turn into a positioned error.
fn as_hook_bytes<'a>(obj: &'a PyAny) -> Option<std::borrow::Cow<'a, [u8]>> {
    if let Ok(b) = obj.downcast::<PyBytes>() {
        Some(std::borrow::Cow::Borrowed(b.as_bytes()))
    } else if let Ok(s) = obj.downcast::<PyString>() {
        s.to_str().ok().map(|s| std::borrow::Cow::Owned(s.as_bytes().to_vec()))
    } else {
        None
    }
}

#[pyfunction]
fn seteater(py: Python<'_>, data: &PyAny) -> PyResult<()> {
    let eater = if data.is_none() {
        None
    } else {
        match as_hook_bytes(data) {
            Some(bytes) => Some(bytes.into_owned()),
            None => {
                return with_state(py, |state: &mut ParserState<PyEvaluator>| {
                    Err(scan_err(state.position_error(ScanErrorKind::EaterType)))
                })?
            }
        }
    };
    with_state(py, |state: &mut ParserState<PyEvaluator>| {
        state.seteater(eater.as_deref());
    })
}

/// Splits a flat sequence of hook tokens into begin/end pairs with no
/// suspend token, used by both of the calling forms that pass bare strings
/// rather than sub-lists.
fn pairs_to_triples(tokens: Vec<Vec<u8>>) -> PyResult<Vec<(Vec<u8>, Vec<u8>, Option<Vec<u8>>)>> {
    if tokens.len() % 2 != 0 {
        return Err(PyTypeError::new_err(
            "multihook: a flat sequence of strings must have an even number of elements",
        ));
    }
    Ok(tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone(), None))
        .collect())
}

/// Reads a sub-list calling form: each element is itself a 2- or 3-element
/// list/tuple of hook tokens, the third (if present) the suspend token.
fn sublists_to_triples(
    items: &PyAny,
) -> PyResult<Vec<(Vec<u8>, Vec<u8>, Option<Vec<u8>>)>> {
    let mut triples = Vec::new();
    for item in items.iter()? {
        let item = item?;
        let elems: Vec<&PyAny> = item.iter()?.collect::<PyResult<_>>()?;
        let bytes: Vec<Vec<u8>> = elems
            .iter()
            .map(|e| {
                as_hook_bytes(e).map(|b| b.into_owned()).ok_or_else(|| {
                    PyTypeError::new_err("multihook: hook tokens must be strings")
                })
            })
            .collect::<PyResult<_>>()?;
        match bytes.len() {
            2 => triples.push((bytes[0].clone(), bytes[1].clone(), None)),
            3 => triples.push((bytes[0].clone(), bytes[1].clone(), Some(bytes[2].clone()))),
            _ => {
                return Err(PyTypeError::new_err(
                    "multihook: each sub-list must have 2 or 3 elements",
                ))
            }
        }
    }
    Ok(triples)
}

/// Parses `multihook`'s three accepted calling forms: a flat sequence of
/// strings (even count, read as begin/end pairs), a single list of such
/// strings, or a list of 2- or 3-element sub-lists (the third element, if
/// present, a suspend token).
fn parse_multihook_args(
    args: &PyTuple,
) -> PyResult<Vec<(Vec<u8>, Vec<u8>, Option<Vec<u8>>)>> {
    if args.len() > 1 {
        // A flat sequence of strings passed as separate positional arguments.
        let tokens = args
            .iter()
            .map(|a| {
                as_hook_bytes(a)
                    .map(|b| b.into_owned())
                    .ok_or_else(|| PyTypeError::new_err("multihook: hook tokens must be strings"))
            })
            .collect::<PyResult<Vec<_>>>()?;
        return pairs_to_triples(tokens);
    }

    let only = args
        .get_item(0)
        .map_err(|_| PyTypeError::new_err("multihook: expected at least one argument"))?;

    if let Some(token) = as_hook_bytes(only) {
        // A single string: degenerate one-element "flat sequence", rejected
        // below by the even-count check unless it is itself the whole list.
        return pairs_to_triples(vec![token.into_owned()]);
    }

    if let Ok(list) = only.downcast::<PyList>() {
        let all_strings = list.iter().all(|e| as_hook_bytes(e).is_some());
        if all_strings {
            let tokens = list
                .iter()
                .map(|e| as_hook_bytes(e).unwrap().into_owned())
                .collect();
            return pairs_to_triples(tokens);
        }
        return sublists_to_triples(list);
    }

    sublists_to_triples(only)
}

#[pyfunction(signature = (*args))]
fn multihook(py: Python<'_>, args: &PyTuple) -> PyResult<()> {
    let triples = parse_multihook_args(args)?;
    with_state(py, |state: &mut ParserState<PyEvaluator>| {
        state.multihook(&triples).map_err(scan_err)
    })?
}

host_fn! {
    fn ifilename() -> String {
        state.ifilename().to_string()
    }
}

host_fn! {
    fn ilinenumber() -> usize {
        state.ilinenumber()
    }
}

host_fn! {
    fn ofilename() -> String {
        state.ofilename().to_string()
    }
}

host_fn! {
    fn olinenumber() -> usize {
        state.olinenumber()
    }
}

host_fn! {
    try fn pushinput(name: Option<String>) -> () {
        state.pushinput(name.as_deref().map(Path::new)).map_err(scan_err)
    }
}

host_fn! {
    fn closeinput() -> () {
        state.closeinput();
    }
}

host_fn! {
    try fn pushoutput(name: Option<String>) -> () {
        state.pushoutput(name.as_deref().map(Path::new)).map_err(scan_err)
    }
}

host_fn! {
    fn closeoutput() -> () {
        state.closeoutput();
    }
}

host_fn! {
    fn block() -> () {
        state.block();
    }
}

host_fn! {
    fn unblock() -> () {
        state.unblock();
    }
}

/// Adds every generated wrapper to the embedding's module namespace.
pub fn register(m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(write, m)?)?;
    m.add_function(wrap_pyfunction!(puts, m)?)?;
    m.add_function(wrap_pyfunction!(hookbeg, m)?)?;
    m.add_function(wrap_pyfunction!(hookend, m)?)?;
    m.add_function(wrap_pyfunction!(hookesc, m)?)?;
    m.add_function(wrap_pyfunction!(sethook, m)?)?;
    m.add_function(wrap_pyfunction!(sethookbeg, m)?)?;
    m.add_function(wrap_pyfunction!(sethookend, m)?)?;
    m.add_function(wrap_pyfunction!(sethookesc, m)?)?;
    m.add_function(wrap_pyfunction!(seteater, m)?)?;
    m.add_function(wrap_pyfunction!(multihook, m)?)?;
    m.add_function(wrap_pyfunction!(ifilename, m)?)?;
    m.add_function(wrap_pyfunction!(ilinenumber, m)?)?;
    m.add_function(wrap_pyfunction!(ofilename, m)?)?;
    m.add_function(wrap_pyfunction!(olinenumber, m)?)?;
    m.add_function(wrap_pyfunction!(pushinput, m)?)?;
    m.add_function(wrap_pyfunction!(closeinput, m)?)?;
    m.add_function(wrap_pyfunction!(pushoutput, m)?)?;
    m.add_function(wrap_pyfunction!(closeoutput, m)?)?;
    m.add_function(wrap_pyfunction!(block, m)?)?;
    m.add_function(wrap_pyfunction!(unblock, m)?)?;
    Ok(())
}
