//! Type conversion protocol (`spec.md` §4.7.1).
//!
//! Decomposed by (source, destination) data-model-classification pairs.
//! Assumes the value to convert is already on top of the virtual stack and
//! replaces it in place with the converted value.

use crate::context::{LocalContext, TranslatorContext};
use crate::error::TResult;
use crate::types::ir::{Opcode, Sign};
use crate::types::ty::{classify, DataModelClass, FloatKind, IntWidth, Type, TypeKind};

fn int_width(class: DataModelClass) -> Option<IntWidth> {
  match class {
    DataModelClass::Int8 => Some(IntWidth::W8),
    DataModelClass::Int16 => Some(IntWidth::W16),
    DataModelClass::Int32 => Some(IntWidth::W32),
    DataModelClass::Int64 => Some(IntWidth::W64),
    _ => None,
  }
}

fn is_signed(ty: &Type) -> bool {
  match &**ty {
    TypeKind::Integer { signed, .. } => *signed,
    TypeKind::BitPrecise { signed, .. } => *signed,
    TypeKind::Pointer { .. } | TypeKind::Enum { .. } => false,
    TypeKind::Qualified { base, .. } => is_signed(base),
    _ => false,
  }
}

/// Converts the value on top of the stack from `src` to `dst`. A no-op if
/// the two classify identically.
pub fn convert(ctx: &mut TranslatorContext, local: &mut LocalContext, src: &Type, dst: &Type) -> TResult<()> {
  let _ = ctx;
  if matches!(&**dst, TypeKind::Void) { return Ok(()) }
  let src_class = classify(&TypeKind::unqualified(src));
  let dst_class = classify(&TypeKind::unqualified(dst));
  if src_class == dst_class { return Ok(()) }

  match (int_width(src_class), int_width(dst_class)) {
    (Some(from), Some(to)) => {
      if to.bits() > from.bits() {
        local.builder.append(if is_signed(src) {
          Opcode::SignExtend { from, to }
        } else {
          Opcode::ZeroExtend { from, to }
        })?;
      } else if to.bits() < from.bits() {
        local.builder.append(Opcode::Truncate { to })?;
      }
      return Ok(());
    }
    _ => {}
  }

  match (src_class, dst_class) {
    (DataModelClass::Float, DataModelClass::Double) => { local.builder.append(Opcode::FloatToFloat { from: FloatKind::F32, to: FloatKind::F64 })?; }
    (DataModelClass::Double, DataModelClass::Float) => { local.builder.append(Opcode::FloatToFloat { from: FloatKind::F64, to: FloatKind::F32 })?; }
    (DataModelClass::Float, DataModelClass::LongDouble) => { local.builder.append(Opcode::FloatToFloat { from: FloatKind::F32, to: FloatKind::LongDouble })?; }
    (DataModelClass::LongDouble, DataModelClass::Float) => { local.builder.append(Opcode::FloatToFloat { from: FloatKind::LongDouble, to: FloatKind::F32 })?; }
    (DataModelClass::Double, DataModelClass::LongDouble) => { local.builder.append(Opcode::FloatToFloat { from: FloatKind::F64, to: FloatKind::LongDouble })?; }
    (DataModelClass::LongDouble, DataModelClass::Double) => { local.builder.append(Opcode::FloatToFloat { from: FloatKind::LongDouble, to: FloatKind::F64 })?; }

    _ if matches!(src_class, DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64)
      && matches!(dst_class, DataModelClass::Float | DataModelClass::Double | DataModelClass::LongDouble) => {
      let from = int_width(src_class).expect("integer class always has a width");
      let to = float_kind(dst_class);
      local.builder.append(Opcode::IntToFloat { from, sign: sign_of(src), to })?;
    }
    _ if matches!(src_class, DataModelClass::Float | DataModelClass::Double | DataModelClass::LongDouble)
      && matches!(dst_class, DataModelClass::Int8 | DataModelClass::Int16 | DataModelClass::Int32 | DataModelClass::Int64) => {
      let from = float_kind(src_class);
      let to = int_width(dst_class).expect("integer class always has a width");
      local.builder.append(Opcode::FloatToInt { from, sign: sign_of(dst), to })?;
    }

    (DataModelClass::ComplexFloat | DataModelClass::ComplexDouble | DataModelClass::ComplexLongDouble, _)
      if !matches!(dst_class, DataModelClass::ComplexFloat | DataModelClass::ComplexDouble | DataModelClass::ComplexLongDouble) => {
      local.builder.append(Opcode::ComplexToScalar(complex_kind(src_class)))?;
    }
    (_, DataModelClass::ComplexFloat | DataModelClass::ComplexDouble | DataModelClass::ComplexLongDouble)
      if !matches!(src_class, DataModelClass::ComplexFloat | DataModelClass::ComplexDouble | DataModelClass::ComplexLongDouble) => {
      local.builder.append(Opcode::ScalarToComplex(complex_kind(dst_class)))?;
    }

    (DataModelClass::BitInt(_), _) | (_, DataModelClass::BitInt(_)) => {
      // Bit-precise conversions share the same sign/zero-extend/truncate
      // shape as fixed-width integers but with an explicit bit count; the
      // bit-precise arithmetic opcodes carry that count directly, so no
      // conversion opcode is needed beyond re-masking, which the
      // bit-precise arithmetic opcodes already perform on use.
    }

    _ => {}
  }
  Ok(())
}

fn float_kind(class: DataModelClass) -> FloatKind {
  match class {
    DataModelClass::Float => FloatKind::F32,
    DataModelClass::Double => FloatKind::F64,
    DataModelClass::LongDouble => FloatKind::LongDouble,
    other => unreachable!("float_kind called on non-floating class {other:?}"),
  }
}

fn complex_kind(class: DataModelClass) -> FloatKind {
  match class {
    DataModelClass::ComplexFloat | DataModelClass::Float => FloatKind::F32,
    DataModelClass::ComplexDouble | DataModelClass::Double => FloatKind::F64,
    DataModelClass::ComplexLongDouble | DataModelClass::LongDouble => FloatKind::LongDouble,
    other => unreachable!("complex_kind called on {other:?}"),
  }
}

fn sign_of(ty: &Type) -> Sign { if is_signed(ty) { Sign::Signed } else { Sign::Unsigned } }

/// Conversion to `_Bool` (`spec.md` §4.7.3 "Convert-to-bool").
pub fn convert_to_bool(local: &mut LocalContext, src: &Type) -> TResult<()> {
  let unqualified = TypeKind::unqualified(src);
  match &*unqualified {
    TypeKind::Integer { width, .. } => { local.builder.append(Opcode::ToBool(*width))?; }
    TypeKind::BitPrecise { bits, .. } => { local.builder.append(Opcode::BitIntToBool(*bits))?; }
    TypeKind::Floating(kind) => {
      local.builder.append(Opcode::FloatCmp { kind: *kind, op: crate::types::ir::CmpOp::Ne })?;
    }
    TypeKind::Complex(kind) => { local.builder.append(Opcode::ComplexRealNotZero(*kind))?; }
    TypeKind::Pointer { .. } | TypeKind::Enum { .. } => { local.builder.append(Opcode::ToBool(IntWidth::W64))?; }
    other => unreachable!("convert_to_bool called on non-scalar type {other:?}"),
  }
  Ok(())
}
