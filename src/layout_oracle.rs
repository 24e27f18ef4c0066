//! Type-layout oracle (`spec.md` §4.1 "C1 Type-layout oracle").
//!
//! Given a semantic [`Type`] and a [`TargetEnvironment`], produces a
//! concrete [`TypeLayout`]: size, alignment, field offsets, bit-field
//! placement, and an IR type id. Struct/union layout follows ordinary C
//! sequential-allocation rules (each field placed at the next offset
//! aligned to its own alignment, bit-fields packed into the storage unit
//! implied by their declared type) — the target ABI this crate targets
//! does not reorder or otherwise specialize layout beyond that.

use bumpalo::Bump;
use crate::error::{ErrorKind, TResult, TranslateError};
use crate::symbol::Symbol;
use crate::types::ir::{IrModule, IrType, IrTypeEntry, IrTypeId};
use crate::types::layout::{BitfieldProps, FieldLayoutBuilder, LayoutHome, ResolvedLayout, TargetEnvironment, TypeLayout, VlaFields};
use crate::types::ty::{AggregateKind, ArrayLen, Completeness, FloatKind, IntWidth, Type, TypeKind};

/// Size in bytes of a complete, non-VLA type (`spec.md` §4.7 "sizeof").
pub fn size_of_complete(ty: &Type) -> TResult<u64> {
  Ok(compute_layout_uncached(ty, &TargetEnvironment::default())?.size)
}

/// Alignment in bytes of a complete type (`spec.md` §4.7 "alignof").
pub fn align_of(ty: &Type) -> TResult<u32> {
  Ok(compute_layout_uncached(ty, &TargetEnvironment::default())?.alignment)
}

fn round_up(n: u64, align: u32) -> u64 {
  let align = u64::from(align.max(1));
  n.div_ceil(align) * align
}

/// Computes a type's concrete layout against a target environment,
/// registering any newly seen aggregate as a named IR type in `module`
/// (`spec.md` §4.1: "either a local layout... or a global/module
/// layout").
pub fn resolve_layout(ty: &Type, target: &TargetEnvironment, module: &mut IrModule, home: LayoutHome) -> TResult<ResolvedLayout> {
  let layout = compute_layout(ty, target, module)?;
  Ok(ResolvedLayout { home, layout })
}

fn compute_layout_uncached(ty: &Type, target: &TargetEnvironment) -> TResult<TypeLayout> {
  let mut scratch_module = IrModule::new();
  compute_layout(ty, target, &mut scratch_module)
}

fn compute_layout(ty: &Type, target: &TargetEnvironment, module: &mut IrModule) -> TResult<TypeLayout> {
  match &**ty {
    TypeKind::Void => Err(TranslateError::new(ErrorKind::TypeIncomplete, "cannot lay out void")),
    TypeKind::Integer { width, .. } => {
      let (size, align) = (u64::from(width.bytes()), width.bytes());
      let ir_type = module.new_type(IrType { entries: vec![IrTypeEntry::Primitive { size: width.bytes(), align }] });
      Ok(TypeLayout::scalar(size, align, ir_type))
    }
    TypeKind::BitPrecise { bits, .. } => {
      let bytes = u64::from(*bits).div_ceil(8);
      let align = (bytes.min(8)) as u32;
      let ir_type = module.new_type(IrType { entries: vec![IrTypeEntry::Primitive { size: bytes as u32, align }] });
      Ok(TypeLayout::scalar(bytes, align, ir_type))
    }
    TypeKind::Floating(kind) | TypeKind::Complex(kind) => {
      let scalar = float_size_align(*kind, target);
      let mult = if matches!(&**ty, TypeKind::Complex(_)) { 2 } else { 1 };
      let ir_type = module.new_type(IrType { entries: vec![IrTypeEntry::Primitive { size: scalar.0 * mult, align: scalar.1 }] });
      Ok(TypeLayout::scalar(u64::from(scalar.0) * u64::from(mult), scalar.1, ir_type))
    }
    TypeKind::Pointer { .. } => {
      let ir_type = module.new_type(IrType { entries: vec![IrTypeEntry::Pointer] });
      Ok(TypeLayout::scalar(u64::from(target.pointer_size), target.pointer_align, ir_type))
    }
    TypeKind::Enum { underlying, .. } => compute_layout(underlying, target, module),
    TypeKind::Qualified { base, .. } => compute_layout(base, target, module),
    TypeKind::Array { element, len } => compute_array_layout(element, len, target, module),
    TypeKind::Aggregate { kind, completeness, fields, .. } => {
      if *completeness == Completeness::Incomplete {
        return Err(TranslateError::new(ErrorKind::TypeIncomplete, "member access on incomplete aggregate"));
      }
      compute_aggregate_layout(*kind, fields, target, module)
    }
    TypeKind::Function { .. } => Err(TranslateError::new(ErrorKind::TypeUnsupported, "function type has no object layout")),
  }
}

fn float_size_align(kind: FloatKind, target: &TargetEnvironment) -> (u32, u32) {
  match kind {
    FloatKind::F32 => (4, 4),
    FloatKind::F64 => (8, 8),
    FloatKind::LongDouble => (target.long_double_size, target.long_double_align),
  }
}

fn compute_array_layout(element: &Type, len: &ArrayLen, target: &TargetEnvironment, module: &mut IrModule) -> TResult<TypeLayout> {
  let elem_layout = compute_layout(element, target, module)?;
  match len {
    ArrayLen::Constant(n) => {
      let ir_type = module.new_type(IrType { entries: vec![IrTypeEntry::Array { element: elem_layout.ir_type, count: *n }] });
      Ok(TypeLayout { size: elem_layout.size * n, alignment: elem_layout.alignment, offset: 0, ir_type, bitfield: None, vla: None, children: elem_layout.children.clone() })
    }
    ArrayLen::VariableLength(_) => {
      // Synthetic two-field record: `array_ptr` (pointer) then
      // `array_size` (size_t), per `spec.md` §4.1.
      let ptr_ty = module.new_type(IrType { entries: vec![IrTypeEntry::Pointer] });
      let size_ty = module.new_type(IrType { entries: vec![IrTypeEntry::Primitive { size: 8, align: 8 }] });
      let struct_ty = module.new_type(IrType { entries: vec![IrTypeEntry::Struct { members: Box::new([ptr_ty, size_ty]) }] });
      Ok(TypeLayout {
        size: u64::from(target.pointer_size) + 8, alignment: target.pointer_align, offset: 0,
        ir_type: struct_ty, bitfield: None,
        vla: Some(VlaFields { array_ptr_offset: 0, array_size_offset: target.pointer_size }),
        children: std::rc::Rc::from([]),
      })
    }
    ArrayLen::Unbounded | ArrayLen::Expression(_) => {
      Err(TranslateError::new(ErrorKind::TypeIncomplete, "array of unresolved length has no object layout"))
    }
  }
}

fn compute_aggregate_layout(
  kind: AggregateKind, fields: &[crate::types::ty::Field], target: &TargetEnvironment, module: &mut IrModule,
) -> TResult<TypeLayout> {
  let scratch = Bump::new();
  let mut cursor: u64 = 0;
  let mut bit_cursor: u32 = 0;
  let mut max_align: u32 = 1;
  let mut builder = FieldLayoutBuilder::default();
  let mut member_ids = bumpalo::collections::Vec::new_in(&scratch);

  for field in fields {
    let mut field_layout = compute_layout(&field.ty, target, module)?;
    max_align = max_align.max(field_layout.alignment);

    if let Some(width) = field.bitfield_width {
      if bit_cursor + width > field_layout.size as u32 * 8 {
        cursor = round_up(cursor, field_layout.alignment);
        bit_cursor = 0;
      }
      field_layout.bitfield = Some(BitfieldProps { offset: u32::try_from(cursor).unwrap_or(u32::MAX) * 8 + bit_cursor, width });
      field_layout.offset = u32::try_from(cursor).unwrap_or(u32::MAX);
      bit_cursor += width;
      if kind == AggregateKind::Struct && bit_cursor >= field_layout.size as u32 * 8 {
        cursor += field_layout.size;
        bit_cursor = 0;
      }
    } else {
      if kind == AggregateKind::Struct {
        cursor = round_up(cursor, field_layout.alignment);
      }
      field_layout.offset = u32::try_from(cursor).unwrap_or(u32::MAX);
      if kind == AggregateKind::Struct { cursor += field_layout.size; }
      bit_cursor = 0;
    }

    member_ids.push(field_layout.ir_type);
    builder.fields.push((field.name, field_layout));
  }

  if kind == AggregateKind::Struct && bit_cursor > 0 { cursor += u64::from(max_align); }
  let size = round_up(cursor.max(if kind == AggregateKind::Union {
    builder.fields.iter().map(|(_, l)| l.size).max().unwrap_or(0)
  } else { cursor }), max_align);

  let entry = if kind == AggregateKind::Struct {
    IrTypeEntry::Struct { members: member_ids.into_iter().collect() }
  } else {
    IrTypeEntry::Union { members: member_ids.into_iter().collect() }
  };
  let ir_type = module.new_type(IrType { entries: vec![entry] });

  Ok(TypeLayout { size, alignment: max_align, offset: 0, ir_type, bitfield: None, vla: None, children: builder.finish() })
}

/// Resolves a member's layout within an aggregate type by name, for the
/// lvalue translator's struct-member rule (`spec.md` §4.5).
pub fn member_layout(base_ty: &Type, field: Symbol, target: &TargetEnvironment, module: &mut IrModule) -> TResult<TypeLayout> {
  let agg = compute_layout(base_ty, target, module)?;
  agg.member(field).cloned().ok_or_else(|| TranslateError::new(ErrorKind::TypeUnsupported, "no such member in aggregate"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ty::IntMarker;
  use std::rc::Rc;

  fn int_ty(width: IntWidth, signed: bool) -> Type { Rc::new(TypeKind::Integer { width, signed, marker: IntMarker::Plain }) }

  #[test]
  fn struct_fields_pack_sequentially_with_padding() {
    let fields = Box::new([
      crate::types::ty::Field { name: Some(crate::symbol::intern("a")), ty: int_ty(IntWidth::W8, true), bitfield_width: None },
      crate::types::ty::Field { name: Some(crate::symbol::intern("b")), ty: int_ty(IntWidth::W32, true), bitfield_width: None },
    ]);
    let ty: Type = Rc::new(TypeKind::Aggregate { kind: AggregateKind::Struct, tag: None, completeness: Completeness::Complete, fields });
    let mut module = IrModule::new();
    let layout = compute_layout(&ty, &TargetEnvironment::default(), &mut module).unwrap();
    assert_eq!(layout.member(crate::symbol::intern("a")).unwrap().offset, 0);
    assert_eq!(layout.member(crate::symbol::intern("b")).unwrap().offset, 4);
    assert_eq!(layout.size, 8);
    assert_eq!(layout.alignment, 4);
  }

  #[test]
  fn union_members_share_offset_zero() {
    let fields = Box::new([
      crate::types::ty::Field { name: Some(crate::symbol::intern("x")), ty: int_ty(IntWidth::W32, true), bitfield_width: None },
      crate::types::ty::Field { name: Some(crate::symbol::intern("y")), ty: int_ty(IntWidth::W64, true), bitfield_width: None },
    ]);
    let ty: Type = Rc::new(TypeKind::Aggregate { kind: AggregateKind::Union, tag: None, completeness: Completeness::Complete, fields });
    let mut module = IrModule::new();
    let layout = compute_layout(&ty, &TargetEnvironment::default(), &mut module).unwrap();
    assert_eq!(layout.member(crate::symbol::intern("x")).unwrap().offset, 0);
    assert_eq!(layout.member(crate::symbol::intern("y")).unwrap().offset, 0);
    assert_eq!(layout.size, 8);
  }
}
