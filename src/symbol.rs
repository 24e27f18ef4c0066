//! String interning. The translator never owns source text itself — names
//! arrive already interned by the lexer/parser (out of scope) — but it
//! mints new symbols for compiler-generated names (temporaries, string
//! pool entries, GNU-inline aliases), so the interner lives here.

use std::fmt;
use hashbrown::HashMap;

/// An interned string. Cheap to copy and compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }
}

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    INTERNER.with(|i| write!(f, "{:?}", i.borrow().resolve(*self)))
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    INTERNER.with(|i| f.write_str(i.borrow().resolve(*self)))
  }
}

/// The string interner. One instance normally backs an entire compilation
/// session; translator-local helpers go through the thread-local default
/// instance via [`intern`]/[`resolve`].
#[derive(Default)]
pub struct Interner {
  map: HashMap<Box<str>, Symbol>,
  strings: Vec<Box<str>>,
}

impl Interner {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.map.get(s) { return sym }
    let sym = Symbol(u32::try_from(self.strings.len()).expect("too many symbols"));
    let boxed: Box<str> = s.into();
    self.strings.push(boxed.clone());
    self.map.insert(boxed, sym);
    sym
  }

  #[must_use] pub fn resolve(&self, sym: Symbol) -> &str { &self.strings[sym.into_usize()] }
}

std::thread_local! {
  static INTERNER: std::cell::RefCell<Interner> = std::cell::RefCell::new(Interner::new());
}

/// Intern a string in the thread-local default interner.
pub fn intern(s: &str) -> Symbol {
  INTERNER.with(|i| i.borrow_mut().intern(s))
}

/// Resolve a symbol back to its string in the thread-local default
/// interner. Returns an owned `String` rather than borrowing, since the
/// interner's `RefCell` can't outlive this call.
#[must_use] pub fn resolve(sym: Symbol) -> String {
  INTERNER.with(|i| i.borrow().resolve(sym).to_owned())
}

/// Build a dense lookup table keyed by [`Symbol`], for primitives whose
/// symbol is known ahead of time — maps keyword spellings to enum variants
/// without a hash lookup per use.
#[must_use] pub fn init_dense_symbol_map<T: Copy>(entries: &[(Symbol, T)]) -> Box<[Option<T>]> {
  let len = entries.iter().map(|(s, _)| s.into_usize() + 1).max().unwrap_or(0);
  let mut out = vec![None; len].into_boxed_slice();
  for &(s, v) in entries { out[s.into_usize()] = Some(v) }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let mut i = Interner::new();
    let a = i.intern("foo");
    let b = i.intern("foo");
    let c = i.intern("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(i.resolve(a), "foo");
    assert_eq!(i.resolve(c), "bar");
  }
}
