//! Scoped identifiers (`spec.md` §3 "ScopedIdentifier", §9 "Scoped
//! identifier payload").
//!
//! The original stores a size-bounded inline byte buffer as an opaque
//! payload in every scoped identifier. Per `spec.md` §9's own guidance,
//! this crate instead gives [`ScopedIdentifier`] a `payload` field typed
//! directly as [`TranslatorPayload`] — no `void*`, no downcast, the
//! analyzer and translator share one enum definition.

use std::cell::Cell;

use crate::symbol::Symbol;
use crate::types::ty::Type;
use crate::types::ir::IrTypeId;
use crate::types::debug::DebugEntryId;

/// An object's storage class (`spec.md` §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
  Auto,
  Register,
  Static,
  Extern,
  ThreadLocal,
  ExternThreadLocal,
  StaticThreadLocal,
  Typedef,
  Constexpr,
  Unknown,
}

impl StorageClass {
  #[must_use] pub fn is_thread_local(self) -> bool {
    matches!(self, StorageClass::ThreadLocal | StorageClass::ExternThreadLocal | StorageClass::StaticThreadLocal)
  }
  #[must_use] pub fn is_static_duration(self) -> bool {
    matches!(self,
      StorageClass::Static | StorageClass::Extern |
      StorageClass::ThreadLocal | StorageClass::ExternThreadLocal | StorageClass::StaticThreadLocal)
  }
}

/// `inline`/GNU-inline specifier flags on a function (`spec.md` §9
/// "GNU-inline aliasing").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FunctionSpecifiers {
  pub inline: bool,
  /// `__gnu_inline__`-style `inline extern`: calls route through a
  /// mangled alias rather than the canonical symbol.
  pub gnu_inline: bool,
}

/// A unique id naming a VLA's runtime-allocated data element, used by the
/// flow-control collaborator to track per-scope dealloc lists
/// (`spec.md` §3 invariant (iv), §4.9 "VLA declaration").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

/// Per-identifier metadata the translator materializes once, the first
/// time the identifier is translated (`spec.md` §3 "opaque payload
/// slot"). `None` until the translator has visited the identifier.
///
/// Held behind `Cell` rather than plain fields: identifiers live inside a
/// shared `Rc<ScopedIdentifier>` (the declaration site and every later
/// reference to the same name clone the same `Rc`), so populating this
/// lazily on first visit needs interior mutability through a `&`
/// reference rather than an exclusive one.
#[derive(Clone, Debug, Default)]
pub struct TranslatorPayload {
  pub ir_type: Cell<Option<IrTypeId>>,
  pub root_layout_value: Cell<Option<u32>>,
  pub debug_entry: Cell<Option<DebugEntryId>>,
}

/// An object identifier (variable, parameter, compound-literal/temporary
/// backing store).
#[derive(Clone, Debug)]
pub struct ObjectIdentifier {
  pub name: Symbol,
  pub storage: StorageClass,
  pub ty: Type,
  pub has_initializer: bool,
  pub asm_label: Option<Symbol>,
  pub vla_object: Option<ObjectId>,
  pub payload: TranslatorPayload,
}

/// A function identifier.
#[derive(Clone, Debug)]
pub struct FunctionIdentifier {
  pub storage: StorageClass,
  pub specifiers: FunctionSpecifiers,
  pub linkage_name: Symbol,
  pub asm_label: Option<Symbol>,
  pub ty: Type,
  pub payload: TranslatorPayload,
}

/// An enumeration constant.
#[derive(Clone, Debug)]
pub struct EnumConstantIdentifier {
  pub value: i128,
  pub ty: Type,
}

/// A `goto`/computed-goto label, with its enclosing block chain (used to
/// detect VLA-crossing label addresses, `spec.md` §4.7 "Label address").
#[derive(Clone, Debug)]
pub struct LabelIdentifier {
  pub name: Symbol,
  pub enclosing_blocks_have_vla: bool,
}

/// `spec.md` §3 "ScopedIdentifier": a tagged variant over everything a
/// name in scope can denote.
#[derive(Clone, Debug)]
pub enum ScopedIdentifier {
  Object(ObjectIdentifier),
  Function(FunctionIdentifier),
  EnumConstant(EnumConstantIdentifier),
  Label(LabelIdentifier),
  TypeTag(Type),
  TypeDefinition(Type),
}

impl ScopedIdentifier {
  #[must_use] pub fn as_object(&self) -> Option<&ObjectIdentifier> {
    if let ScopedIdentifier::Object(o) = self { Some(o) } else { None }
  }
  pub fn as_object_mut(&mut self) -> Option<&mut ObjectIdentifier> {
    if let ScopedIdentifier::Object(o) = self { Some(o) } else { None }
  }
  #[must_use] pub fn as_function(&self) -> Option<&FunctionIdentifier> {
    if let ScopedIdentifier::Function(f) = self { Some(f) } else { None }
  }
  pub fn as_function_mut(&mut self) -> Option<&mut FunctionIdentifier> {
    if let ScopedIdentifier::Function(f) = self { Some(f) } else { None }
  }
}
