//! Per-source delimiter configuration: one or many `(begin, end, suspend)`
//! triples, an escape token, an optional eater token, and the first-byte
//! bitmap the scanner uses to fast-reject non-hook bytes.

use static_assertions::const_assert;
use thiserror::Error;

/// Multi mode holds at most this many triples.
pub const MULTI_LIMIT: usize = 127;
const_assert!(MULTI_LIMIT <= u8::MAX as usize);

/// One `(begin, end, suspend?)` delimiter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookTriple {
    pub begin: Box<[u8]>,
    pub end: Box<[u8]>,
    pub suspend: Option<Box<[u8]>>,
}

impl HookTriple {
    pub fn new(
        begin: impl Into<Box<[u8]>>,
        end: impl Into<Box<[u8]>>,
        suspend: Option<Box<[u8]>>,
    ) -> Self {
        HookTriple { begin: begin.into(), end: end.into(), suspend }
    }
}

/// Failures that can only be raised while mutating a [`HookConfig`], before
/// any source position exists to attach to them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HookConfigError {
    #[error("escape hook is not allowed to match multihooks")]
    EscapeClash,
    #[error("too many multihooks, {MULTI_LIMIT} allowed")]
    Capacity,
}

/// Which field `HookConfig::set` replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Begin,
    End,
    Escape,
}

/// A source's delimiter set. Always has a `single` triple, even while
/// `multi` mode is active — `set()` can collapse back out of multi mode and
/// needs a single triple to fall back to, so it is maintained separately
/// rather than reconstructed from whatever was last in the multi list.
#[derive(Debug, Clone)]
pub struct HookConfig {
    single: HookTriple,
    escape: Box<[u8]>,
    eater: Option<Box<[u8]>>,
    multi: Option<Vec<HookTriple>>,
    first_byte_table: [bool; 256],
    escape_eq_begin: bool,
    escape_eq_end: bool,
}

impl HookConfig {
    pub fn new(
        begin: impl Into<Box<[u8]>>,
        end: impl Into<Box<[u8]>>,
        escape: impl Into<Box<[u8]>>,
    ) -> Self {
        let mut config = HookConfig {
            single: HookTriple { begin: begin.into(), end: end.into(), suspend: None },
            escape: escape.into(),
            eater: None,
            multi: None,
            first_byte_table: [false; 256],
            escape_eq_begin: false,
            escape_eq_end: false,
        };
        config.rebuild();
        config
    }

    pub fn is_multi(&self) -> bool {
        self.multi.is_some()
    }

    pub fn single(&self) -> &HookTriple {
        &self.single
    }

    pub fn multi(&self) -> Option<&[HookTriple]> {
        self.multi.as_deref()
    }

    pub fn escape(&self) -> &[u8] {
        &self.escape
    }

    pub fn eater(&self) -> Option<&[u8]> {
        self.eater.as_deref()
    }

    pub fn escape_eq_begin(&self) -> bool {
        self.escape_eq_begin
    }

    pub fn escape_eq_end(&self) -> bool {
        self.escape_eq_end
    }

    /// Replaces `begin`, `end`, or `escape`. Setting `begin`/`end` while in
    /// multi mode collapses back to single mode first, discarding the multi
    /// list; `escape` is shared by both modes and never collapses it.
    pub fn set(&mut self, kind: HookKind, value: impl Into<Box<[u8]>>) {
        if !matches!(kind, HookKind::Escape) {
            self.multi = None;
        }
        match kind {
            HookKind::Begin => self.single.begin = value.into(),
            HookKind::End => self.single.end = value.into(),
            HookKind::Escape => self.escape = value.into(),
        }
        self.rebuild();
    }

    pub fn set_eater(&mut self, value: Option<Box<[u8]>>) {
        self.eater = value;
    }

    /// Switches to (or extends) multi mode with one more triple. Rejects a
    /// triple whose begin or end equals the current escape token, and
    /// rejects growing past [`MULTI_LIMIT`].
    pub fn add_multi(&mut self, triple: HookTriple) -> Result<(), HookConfigError> {
        if triple.begin.as_ref() == self.escape.as_ref() || triple.end.as_ref() == self.escape.as_ref()
        {
            return Err(HookConfigError::EscapeClash);
        }
        let multi = self.multi.get_or_insert_with(Vec::new);
        if multi.len() >= MULTI_LIMIT {
            return Err(HookConfigError::Capacity);
        }
        multi.push(triple);
        self.rebuild();
        Ok(())
    }

    /// O(1) fast-reject: does any recognized token (any begin/end/suspend
    /// currently in use, or escape) start with byte `b`? The eater token is
    /// deliberately excluded — it is only ever probed for right after an
    /// escape has already matched.
    pub fn first_byte_match(&self, b: u8) -> bool {
        self.first_byte_table[b as usize]
    }

    /// Zeroes and fully reconstructs `first_byte_table`, and in single mode
    /// the escape-equality flags, from the currently recognized tokens.
    /// Always a clean rebuild, never an incremental add, so no bit can
    /// linger from a configuration that is no longer active.
    fn rebuild(&mut self) {
        let mut table = [false; 256];
        let mut mark = |token: &[u8]| {
            if let Some(&b) = token.first() {
                table[b as usize] = true;
            }
        };
        match &self.multi {
            Some(multi) => {
                for triple in multi {
                    mark(&triple.begin);
                    mark(&triple.end);
                    if let Some(suspend) = &triple.suspend {
                        mark(suspend);
                    }
                }
                mark(&self.escape);
                self.escape_eq_begin = false;
                self.escape_eq_end = false;
            }
            None => {
                mark(&self.single.begin);
                mark(&self.single.end);
                if let Some(suspend) = &self.single.suspend {
                    mark(suspend);
                }
                mark(&self.escape);
                self.escape_eq_begin = self.escape.as_ref() == self.single.begin.as_ref();
                self.escape_eq_end = self.escape.as_ref() == self.single.end.as_ref();
            }
        }
        self.first_byte_table = table;
    }
}

impl Default for HookConfig {
    /// `-<` / `>-` / `\`, no default suspend or eater.
    fn default() -> Self {
        HookConfig::new(b"-<".to_vec(), b">-".to_vec(), b"\\".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_syntax() {
        let hooks = HookConfig::default();
        assert_eq!(hooks.single().begin.as_ref(), b"-<");
        assert_eq!(hooks.single().end.as_ref(), b">-");
        assert_eq!(hooks.escape(), b"\\");
        assert!(hooks.eater().is_none());
        assert!(!hooks.is_multi());
    }

    #[test]
    fn first_byte_table_tracks_default_tokens() {
        let hooks = HookConfig::default();
        assert!(hooks.first_byte_match(b'-'));
        assert!(hooks.first_byte_match(b'>'));
        assert!(hooks.first_byte_match(b'\\'));
        assert!(!hooks.first_byte_match(b'x'));
    }

    #[test]
    fn escape_equal_begin_sets_the_shortcut_flag() {
        let mut hooks = HookConfig::default();
        hooks.set(HookKind::Escape, b"-<".to_vec());
        assert!(hooks.escape_eq_begin());
        assert!(!hooks.escape_eq_end());
    }

    #[test]
    fn setting_begin_while_multi_collapses_to_single() {
        let mut hooks = HookConfig::default();
        hooks
            .add_multi(HookTriple::new(b"[[".to_vec(), b"]]".to_vec(), None))
            .unwrap();
        assert!(hooks.is_multi());
        hooks.set(HookKind::Begin, b"<<".to_vec());
        assert!(!hooks.is_multi());
        assert_eq!(hooks.single().begin.as_ref(), b"<<");
    }

    #[test]
    fn add_multi_rejects_escape_clash() {
        let mut hooks = HookConfig::default();
        let err = hooks
            .add_multi(HookTriple::new(b"\\".to_vec(), b"]]".to_vec(), None))
            .unwrap_err();
        assert_eq!(err, HookConfigError::EscapeClash);
    }

    #[test]
    fn add_multi_enforces_capacity() {
        let mut hooks = HookConfig::default();
        for i in 0..MULTI_LIMIT {
            let begin = format!("b{i}").into_bytes();
            let end = format!("e{i}").into_bytes();
            hooks.add_multi(HookTriple::new(begin, end, None)).unwrap();
        }
        let err = hooks
            .add_multi(HookTriple::new(b"bN".to_vec(), b"eN".to_vec(), None))
            .unwrap_err();
        assert_eq!(err, HookConfigError::Capacity);
    }

    #[test]
    fn multi_mode_disables_escape_equality_shortcuts() {
        let mut hooks = HookConfig::default();
        hooks
            .add_multi(HookTriple::new(b"[[".to_vec(), b"]]".to_vec(), None))
            .unwrap();
        assert!(!hooks.escape_eq_begin());
        assert!(!hooks.escape_eq_end());
    }
}
