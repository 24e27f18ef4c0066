//! Symbol-naming helpers shared between the lvalue translator (C5) and the
//! function-definition translator (C10) (`spec.md` §4.7.2 "GNU-inline
//! function references route to an alias symbol"; SPEC_FULL.md §F.1).

use crate::symbol::{self, Symbol};
use crate::types::scope::FunctionIdentifier;

/// The linkage symbol a call site or definition should use for a
/// function: the `asm` label if present (it short-circuits GNU-inline
/// aliasing, SPEC_FULL.md §F.2), otherwise the GNU-inline alias if the
/// function is declared `inline extern`, otherwise its ordinary linkage
/// name.
#[must_use] pub fn function_symbol(func: &FunctionIdentifier) -> Symbol {
  if let Some(label) = func.asm_label { return label }
  if func.specifiers.gnu_inline { return gnu_inline_alias(func.linkage_name) }
  func.linkage_name
}

/// Builds the `__kefir_gnu_inline_<name>` alias symbol for a GNU-inline
/// function (`spec.md` §4.7.2).
#[must_use] pub fn gnu_inline_alias(name: Symbol) -> Symbol {
  symbol::intern(&format!("__kefir_gnu_inline_{}", symbol::resolve(name)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::scope::StorageClass;
  use crate::types::ty::TypeKind;
  use crate::types::scope::{FunctionSpecifiers, TranslatorPayload};

  fn func(linkage: &str, gnu_inline: bool, asm: Option<&str>) -> FunctionIdentifier {
    FunctionIdentifier {
      storage: StorageClass::Extern,
      specifiers: FunctionSpecifiers { inline: gnu_inline, gnu_inline },
      linkage_name: symbol::intern(linkage),
      asm_label: asm.map(symbol::intern),
      ty: TypeKind::void(),
      payload: TranslatorPayload::default(),
    }
  }

  #[test]
  fn plain_function_uses_linkage_name() {
    let f = func("foo", false, None);
    assert_eq!(symbol::resolve(function_symbol(&f)), "foo");
  }

  #[test]
  fn gnu_inline_function_uses_mangled_alias() {
    let f = func("foo", true, None);
    assert_eq!(symbol::resolve(function_symbol(&f)), "__kefir_gnu_inline_foo");
  }

  #[test]
  fn asm_label_overrides_gnu_inline_alias() {
    let f = func("foo", true, Some("bar_asm"));
    assert_eq!(symbol::resolve(function_symbol(&f)), "bar_asm");
  }
}
