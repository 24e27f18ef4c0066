//! ABI-informed layout data (`spec.md` §3 "TypeLayout", §4.1 the
//! type-layout oracle C1).
//!
//! Layout trees are immutable once built and shared via `Rc`, the same way
//! [`crate::types::ty::Type`] is: a struct's field layouts are computed
//! once by the oracle and then read from many call sites (the lvalue
//! translator, the value translator, `sizeof`) without ever being mutated,
//! so the "only arena-like allocations and owned objects" guidance of
//! `spec.md` §5 is satisfied by reference counting rather than by a
//! borrowed-arena lifetime threaded through every translator signature.

use std::rc::Rc;
use smallvec::SmallVec;
use crate::symbol::Symbol;
use super::ir::IrTypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signedness { Signed, Unsigned }

/// Configuration flags consulted by the value translator and binary
/// arithmetic translator (`spec.md` §4.6, §4.7.4, §9).
#[derive(Clone, Copy, Debug)]
pub struct TranslatorConfiguration {
  /// When a bit-field spans 24/40/48/56 bits, synthesize two sub-loads
  /// and combine them instead of touching a wider-than-declared storage
  /// unit.
  pub precise_bitfield_load_store: bool,
  /// Allow `void*`/function-pointer arithmetic by substituting an
  /// incomplete-type stand-in for the referenced type.
  pub ext_pointer_arithmetics: bool,
  /// Whether plain `char` is signed on this target.
  pub character_type_signedness: Signedness,
}

impl Default for TranslatorConfiguration {
  fn default() -> Self {
    Self {
      precise_bitfield_load_store: true,
      ext_pointer_arithmetics: false,
      character_type_signedness: Signedness::Signed,
    }
  }
}

/// Target-specific ABI parameters the layout oracle consults: pointer
/// width, the natural alignment for each scalar width, and the active
/// [`TranslatorConfiguration`].
pub struct TargetEnvironment {
  pub pointer_size: u32,
  pub pointer_align: u32,
  pub long_double_size: u32,
  pub long_double_align: u32,
  pub config: TranslatorConfiguration,
}

impl Default for TargetEnvironment {
  fn default() -> Self {
    // A generic LP64 System V target.
    Self { pointer_size: 8, pointer_align: 8, long_double_size: 16, long_double_align: 16,
      config: TranslatorConfiguration::default() }
  }
}

/// Absolute bit-placement of a bit-field within its enclosing storage
/// unit (`spec.md` §3 "Bit-field layouts carry absolute bit-offset").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitfieldProps {
  /// Bit offset from the start of the *enclosing aggregate* (not the
  /// storage unit) — `value.rs` derives `byte_offset = offset / 8`,
  /// `bit_offset = offset % 8` from this.
  pub offset: u32,
  pub width: u32,
}

/// The two synthetic fields of a VLA's layout record (`spec.md` §3
/// "VLA layouts carry two synthetic fields").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VlaFields {
  /// Byte offset of the `array_ptr` field (holds the allocated base).
  pub array_ptr_offset: u32,
  /// Byte offset of the `array_size` field (holds element-count × element-size).
  pub array_size_offset: u32,
}

/// A concrete, ABI-informed layout for a type, relative to its parent
/// (`spec.md` §3 "TypeLayout").
#[derive(Clone, Debug)]
pub struct TypeLayout {
  pub size: u64,
  pub alignment: u32,
  /// Offset in bytes from the start of the parent aggregate (0 for a
  /// root/standalone layout).
  pub offset: u32,
  pub ir_type: IrTypeId,
  pub bitfield: Option<BitfieldProps>,
  pub vla: Option<VlaFields>,
  pub children: Rc<[(Option<Symbol>, TypeLayout)]>,
}

impl TypeLayout {
  #[must_use] pub fn scalar(size: u64, alignment: u32, ir_type: IrTypeId) -> Self {
    Self { size, alignment, offset: 0, ir_type, bitfield: None, vla: None, children: Rc::from([]) }
  }

  /// Find a direct member by name (for struct/union member resolution,
  /// `spec.md` §4.5 "Struct member").
  #[must_use] pub fn member(&self, name: Symbol) -> Option<&TypeLayout> {
    self.children.iter().find(|(n, _)| *n == Some(name)).map(|(_, l)| l)
  }

  #[must_use] pub fn at_offset(&self, offset: u32) -> Self {
    Self { offset, ..self.clone() }
  }
}

/// Whether a computed layout lives in the current function's locals IR
/// type or is registered as a new named module type (`spec.md` §4.1:
/// "either a *local* layout ... or a *global/module* layout").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutHome { Local, Module }

/// A fully resolved layout plus where it lives.
#[derive(Clone, Debug)]
pub struct ResolvedLayout {
  pub home: LayoutHome,
  pub layout: TypeLayout,
}

/// Scratch collector used while a struct/union layout is being computed,
/// before it is frozen into an `Rc`-shared slice.
#[derive(Default)]
pub struct FieldLayoutBuilder {
  pub fields: SmallVec<[(Option<Symbol>, TypeLayout); 8]>,
}

impl FieldLayoutBuilder {
  #[must_use] pub fn finish(self) -> Rc<[(Option<Symbol>, TypeLayout)]> {
    Rc::from(self.fields.into_vec())
  }
}
