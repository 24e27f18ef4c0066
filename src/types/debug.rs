//! Debug-information tree — a DWARF v5 subset (`spec.md` §3 "DebugInfo",
//! §6 "Debug-info — DWARF v5 subset").

use smallvec::SmallVec;
use crate::symbol::Symbol;
use super::ir::{InstIndex, IrTypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DebugEntryId(pub u32);

/// DWARF tags this crate emits (`spec.md` §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugTag {
  CompileUnit,
  Subprogram,
  LexicalBlock,
  Variable,
  FormalParameter,
  Label,
  BaseType,
  PointerType,
  ArrayType,
  EnumerationType,
  Enumerator,
  StructureType,
  UnionType,
  Member,
  SubrangeType,
  Typedef,
  SubroutineType,
  ConstType,
  VolatileType,
  RestrictType,
  AtomicType,
  UnspecifiedParameters,
}

/// DWARF location expression operations this crate can emit (`spec.md` §6).
#[derive(Clone, Debug, PartialEq)]
pub enum LocationOp {
  Addr(Symbol),
  Const8u(u64),
  Const8s(i64),
  Plus,
  Reg6,
  Breg6(i64),
  Regx(u32),
  Fbreg(i64),
  Bregx(u32, i64),
  Piece(u32),
  FormTlsAddress,
  ImplicitValue(Box<[u8]>),
}

/// A start/end instruction-index pair for a piecewise location list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationRange { pub start: InstIndex, pub end: InstIndex }

/// The attribute set on a debug entry. Not every field applies to every
/// tag; unused fields stay `None`.
#[derive(Clone, Debug, Default)]
pub struct DebugAttributes {
  pub name: Option<Symbol>,
  pub byte_size: Option<u64>,
  pub bit_size: Option<u64>,
  pub decl_file: Option<Symbol>,
  pub decl_line: Option<u32>,
  pub decl_column: Option<u32>,
  pub declaration: bool,
  pub encoding: Option<u32>,
  pub ty: Option<DebugEntryId>,
  pub data_member_location: Option<u64>,
  pub data_bit_offset: Option<u64>,
  pub low_pc: Option<InstIndex>,
  pub high_pc: Option<InstIndex>,
  pub language_c11: bool,
  pub producer: Option<Symbol>,
  pub external: bool,
  pub frame_base: Option<LocationOp>,
  pub location: SmallVec<[(LocationRange, LocationOp); 1]>,
  pub linkage_name: Option<Symbol>,
  pub alignment: Option<u32>,
  pub ir_type: Option<IrTypeId>,
}

/// A node in the debug-information tree.
#[derive(Clone, Debug)]
pub struct DebugEntry {
  pub tag: DebugTag,
  pub parent: Option<DebugEntryId>,
  pub children: Vec<DebugEntryId>,
  pub attrs: DebugAttributes,
}

/// The whole per-module debug tree, plus the per-function source map
/// (`spec.md` §3 "A per-function source map records (begin-ir-index,
/// end-ir-index) for each source location span").
#[derive(Default)]
pub struct DebugTree {
  entries: Vec<DebugEntry>,
  pub compile_unit: Option<DebugEntryId>,
}

impl DebugTree {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, tag: DebugTag, parent: Option<DebugEntryId>, attrs: DebugAttributes) -> DebugEntryId {
    let id = DebugEntryId(u32::try_from(self.entries.len()).expect("too many debug entries"));
    self.entries.push(DebugEntry { tag, parent, children: Vec::new(), attrs });
    if let Some(p) = parent { self.entries[p.0 as usize].children.push(id) }
    id
  }

  #[must_use] pub fn get(&self, id: DebugEntryId) -> &DebugEntry { &self.entries[id.0 as usize] }
  pub fn get_mut(&mut self, id: DebugEntryId) -> &mut DebugEntry { &mut self.entries[id.0 as usize] }

  /// Checks invariant (viii) from `spec.md` §8: for every lexical-block or
  /// subprogram entry, `low_pc <= high_pc`, and nested ranges respect
  /// source-level nesting.
  #[must_use] pub fn check_range_monotonicity(&self) -> bool {
    self.entries.iter().all(|e| {
      match (e.attrs.low_pc, e.attrs.high_pc) {
        (Some(lo), Some(hi)) => lo.0 <= hi.0 && e.children.iter().all(|&c| {
          let child = &self.entries[c.0 as usize];
          match (child.attrs.low_pc, child.attrs.high_pc) {
            (Some(clo), Some(chi)) => clo.0 >= lo.0 && chi.0 <= hi.0,
            _ => true,
          }
        }),
        _ => true,
      }
    })
  }
}
