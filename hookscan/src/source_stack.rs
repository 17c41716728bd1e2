//! A LIFO stack of [`Source`]s with transparent read-through and the
//! deferred-push hook that lets `:include`/`pushinput` queue a push without
//! redirecting reads until the enclosing macro has fully closed.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::hook::HookConfig;
use crate::source::{Source, STDIN_NAME};

/// Ordered sequence of [`Source`]s; the last element is the current top.
pub struct SourceStack {
    sources: Vec<Source>,
    defaults: HookConfig,
}

impl SourceStack {
    pub fn new(defaults: HookConfig) -> Self {
        SourceStack { sources: Vec::new(), defaults }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn top(&self) -> Option<&Source> {
        self.sources.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Source> {
        self.sources.last_mut()
    }

    /// Opens `name` (or standard input if `None`), deep-copying the current
    /// top's `HookConfig` — or the process-wide defaults template if the
    /// stack is empty — into the new `Source`, without making it visible on
    /// the stack yet.
    fn open(&self, name: Option<&Path>) -> io::Result<Source> {
        let hooks = match self.sources.last() {
            Some(top) => top.hooks().clone(),
            None => self.defaults.clone(),
        };
        let (display_name, handle): (String, Box<dyn io::Read>) = match name {
            Some(path) => {
                let file = File::open(path)?;
                (path.display().to_string(), Box::new(BufReader::new(file)))
            }
            None => (STDIN_NAME.to_string(), Box::new(io::stdin())),
        };
        Ok(Source::new(display_name, handle, hooks))
    }

    /// Opens `name` and pushes it as the new top immediately.
    pub fn push(&mut self, name: Option<&Path>) -> io::Result<()> {
        let source = self.open(name)?;
        self.sources.push(source);
        Ok(())
    }

    /// Opens `name` without touching the stack. The caller stashes the
    /// result (e.g. as `ParserState::post_push`) and applies it later via
    /// [`SourceStack::apply_push`], once the macro that triggered the
    /// include has fully closed — so reads keep coming from the previous
    /// top until then, with no reseating of a "current" pointer into the
    /// middle of the stack.
    pub fn prepare_push(&self, name: Option<&Path>) -> io::Result<Source> {
        self.open(name)
    }

    /// Makes a source prepared by [`SourceStack::prepare_push`] the new top.
    pub fn apply_push(&mut self, source: Source) {
        self.sources.push(source);
    }

    /// Closes the top source (unless it is standard input) and drops it.
    pub fn pop(&mut self) {
        self.sources.pop();
    }

    /// Reads one byte from the top source; whenever EOF is returned and the
    /// top has no putback — which, since `get` serves putback first, is
    /// every EOF — pops it and retries. Returns `None` once the stack is
    /// empty.
    pub fn get_one(&mut self) -> io::Result<Option<u8>> {
        loop {
            let Some(top) = self.sources.last_mut() else {
                return Ok(None);
            };
            match top.get()? {
                Some(b) => return Ok(Some(b)),
                None => self.sources.pop(),
            };
        }
    }

    /// Reads one byte from the top source without popping on EOF, for
    /// callers that intend to put bytes back on a miss.
    pub fn get_no_pop(&mut self) -> io::Result<Option<u8>> {
        match self.sources.last_mut() {
            Some(top) => top.get(),
            None => Ok(None),
        }
    }

    /// Accumulates up to `n` bytes via `get_no_pop` into `out` (cleared
    /// first), reusing the caller's buffer rather than allocating a fresh
    /// one on every probe. Leaves fewer than `n` bytes in `out` on EOF.
    pub fn get_n(&mut self, n: usize, out: &mut Vec<u8>) -> io::Result<()> {
        out.clear();
        for _ in 0..n {
            match self.get_no_pop()? {
                Some(b) => out.push(b),
                None => break,
            }
        }
        Ok(())
    }

    /// Puts bytes back in reverse order, so `bytes[0]` is the next byte read.
    pub fn put_n(&mut self, bytes: &[u8]) {
        if let Some(top) = self.sources.last_mut() {
            for &b in bytes.iter().rev() {
                top.put(b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_through_pops_exhausted_sources() {
        let mut stack = SourceStack::new(HookConfig::default());
        stack
            .sources
            .push(Source::new("a", Box::new(&b"x"[..]), HookConfig::default()));
        stack
            .sources
            .push(Source::new("b", Box::new(&b"y"[..]), HookConfig::default()));
        assert_eq!(stack.get_one().unwrap(), Some(b'y'));
        assert_eq!(stack.get_one().unwrap(), Some(b'x'));
        assert_eq!(stack.get_one().unwrap(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn get_n_returns_fewer_bytes_at_eof_without_popping() {
        let mut stack = SourceStack::new(HookConfig::default());
        stack
            .sources
            .push(Source::new("a", Box::new(&b"xy"[..]), HookConfig::default()));
        let mut got = Vec::new();
        stack.get_n(5, &mut got).unwrap();
        assert_eq!(got, b"xy");
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn put_n_restores_forward_order() {
        let mut stack = SourceStack::new(HookConfig::default());
        stack
            .sources
            .push(Source::new("a", Box::new(&b"z"[..]), HookConfig::default()));
        stack.put_n(b"ab");
        assert_eq!(stack.get_one().unwrap(), Some(b'a'));
        assert_eq!(stack.get_one().unwrap(), Some(b'b'));
        assert_eq!(stack.get_one().unwrap(), Some(b'z'));
    }

    #[test]
    fn cloned_hooks_are_independent_of_the_parent() {
        use crate::hook::HookKind;

        let mut parent_hooks = HookConfig::default();
        parent_hooks.set(HookKind::Begin, b"[[".to_vec());

        // What `open` does when pushing a child onto a non-empty stack.
        let child_hooks = parent_hooks.clone();
        parent_hooks.set(HookKind::Begin, b"((".to_vec());

        assert_eq!(child_hooks.single().begin.as_ref(), b"[[");
        assert_eq!(parent_hooks.single().begin.as_ref(), b"((");
    }
}
