use std::collections::HashMap;

use crate::handle::HandleVec;

crate::simple_handle! { pub KeywordHandle }

/// One interned keyword. The handle allocated at interning time is the
/// keyword's dense ID: handles are assigned sequentially and never reused,
/// which is exactly what the per-rule FIRST-keyword bitmaps need. Ordering
/// is stable within a compilation and deliberately not lexical.
#[derive(Debug)]
pub struct Keyword {
    pub name: String,
}

/// Keyword table. Two live per grammar: one for the `.syn` language itself
/// and one for the target language, filled while reading `.syn` literals.
///
/// Every table starts with the synthetic `"\n"` keyword; the lexer emits
/// newlines as keyword tokens rather than skipping them as whitespace.
#[derive(Debug)]
pub struct Keytab {
    keywords: HandleVec<KeywordHandle, Keyword>,
    by_name: HashMap<String, KeywordHandle>,
    newline: KeywordHandle,
}

impl Keytab {
    pub const NEWLINE: &'static str = "\n";

    pub fn new() -> Keytab {
        let mut keytab = Keytab {
            keywords: HandleVec::new(),
            by_name: HashMap::new(),
            newline: crate::handle::TypedHandle::new(0),
        };
        keytab.newline = keytab.intern(Self::NEWLINE);
        keytab
    }

    /// Gets or creates the keyword with this name. Idempotent.
    pub fn intern(&mut self, name: &str) -> KeywordHandle {
        if let Some(&handle) = self.by_name.get(name) {
            return handle;
        }
        let handle = self.keywords.push(Keyword {
            name: name.to_owned(),
        });
        self.by_name.insert(name.to_owned(), handle);
        handle
    }

    pub fn lookup(&self, name: &str) -> Option<KeywordHandle> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, handle: KeywordHandle) -> &str {
        &self.keywords[handle].name
    }

    pub fn newline(&self) -> KeywordHandle {
        self.newline
    }

    /// Number of keywords, which is also the width of FIRST-keyword bitmaps
    /// once compilation stops interning.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeywordHandle, &Keyword)> {
        self.keywords.iter_kv()
    }
}

impl Default for Keytab {
    fn default() -> Self {
        Keytab::new()
    }
}
